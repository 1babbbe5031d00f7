use std::sync::Arc;

use actix_web::middleware::NormalizePath;
use actix_web::web::Data;
use actix_web::{App, HttpResponse, HttpServer, Responder, get};
use anyhow::Context;
use chrono::Utc;
use serde_json::json;
use tracing::info;
use tracing_appender::rolling;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

mod api;
mod auth;
mod chat;
mod config;
mod db;
mod docs;
mod error;
mod knowledge;
mod leave;
mod model;
mod routes;
mod store;

use crate::api::AppState;
use crate::chat::OpenAiClient;
use crate::config::Config;
use crate::db::init_db;
use crate::docs::ApiDoc;
use crate::routes::Limiters;
use crate::store::MySqlStore;

#[get("/health")]
async fn health() -> impl Responder {
    HttpResponse::Ok().json(json!({
        "status": "ok",
        "timestamp": Utc::now().to_rfc3339(),
        "service": "HR Assistant API",
    }))
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    // Rolling daily log
    let file_appender = rolling::daily(&config.log_dir, "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_max_level(config.log_level)
        .with_ansi(false)
        .with_target(false)
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .init();

    info!(addr = %config.server_addr, model = %config.model.model, "Server starting...");

    let pool = init_db(&config.database_url).await?;
    let store = Arc::new(MySqlStore::new(pool.clone()));
    let model = Arc::new(OpenAiClient::new(config.model.clone())?);
    let state = Data::new(AppState::new(store, model, config.chat_history_limit));
    let limiters = Limiters::from_config(&config)?;

    let server_addr = config.server_addr.clone();
    let config = Data::new(config);
    let pool = Data::new(pool);

    HttpServer::new(move || {
        App::new()
            .wrap(actix_web::middleware::Logger::default())
            .wrap(NormalizePath::trim())
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-doc/openapi.json", ApiDoc::openapi()),
            )
            .app_data(pool.clone())
            .app_data(config.clone())
            .app_data(state.clone())
            .service(health)
            .configure(|cfg| routes::configure(cfg, &config, &limiters))
    })
    .bind(&server_addr)
    .with_context(|| format!("failed to bind {server_addr}"))?
    .run()
    .await?;

    Ok(())
}
