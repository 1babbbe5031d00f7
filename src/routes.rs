use crate::{
    api::{analytics, chat, knowledge, leave, users},
    auth::{handlers, middleware::auth_middleware},
    config::Config,
};
use actix_governor::{
    Governor, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::{middleware::from_fn, web};
use std::sync::Arc;

/// Per-IP limiter allowing `requests_per_min` with a burst of the same size.
fn build_limiter(requests_per_min: u32) -> anyhow::Result<Governor<PeerIpKeyExtractor, NoOpMiddleware>> {
    let requests_per_min = requests_per_min.max(1);
    let cfg = GovernorConfigBuilder::default()
        .per_millisecond((60_000 / requests_per_min as u64).max(1))
        .burst_size(requests_per_min)
        .key_extractor(PeerIpKeyExtractor)
        .finish()
        .ok_or_else(|| anyhow::anyhow!("invalid rate limit: {requests_per_min}/min"))?;
    Ok(Governor::new(&cfg))
}

/// Rate limiters built once at startup and shared by every worker.
#[derive(Clone)]
pub struct Limiters {
    login: Arc<Governor<PeerIpKeyExtractor, NoOpMiddleware>>,
    register: Arc<Governor<PeerIpKeyExtractor, NoOpMiddleware>>,
    refresh: Arc<Governor<PeerIpKeyExtractor, NoOpMiddleware>>,
    protected: Arc<Governor<PeerIpKeyExtractor, NoOpMiddleware>>,
}

impl Limiters {
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        Ok(Self {
            login: Arc::new(build_limiter(config.rate_login_per_min)?),
            register: Arc::new(build_limiter(config.rate_register_per_min)?),
            refresh: Arc::new(build_limiter(config.rate_refresh_per_min)?),
            protected: Arc::new(build_limiter(config.rate_protected_per_min)?),
        })
    }
}

pub fn configure(cfg: &mut web::ServiceConfig, config: &Config, limiters: &Limiters) {
    // Public routes
    cfg.service(
        web::scope("/auth")
            .service(
                web::resource("/login")
                    .wrap(limiters.login.clone())
                    .route(web::post().to(handlers::login)),
            )
            .service(
                web::resource("/register")
                    .wrap(limiters.register.clone())
                    .route(web::post().to(handlers::register)),
            )
            .service(
                web::resource("/refresh")
                    .wrap(limiters.refresh.clone())
                    .route(web::post().to(handlers::refresh_token)),
            )
            .service(
                web::resource("/logout")
                    .wrap(limiters.login.clone())
                    .route(web::post().to(handlers::logout)),
            ),
    );

    // Protected routes
    cfg.service(
        web::scope(&config.api_prefix)
            .wrap(from_fn(auth_middleware))
            .wrap(limiters.protected.clone())
            .service(web::resource("/auth/me").route(web::get().to(handlers::me)))
            .service(
                web::scope("/chat")
                    .service(web::resource("/message").route(web::post().to(chat::send_message)))
                    .service(
                        web::resource("/conversations")
                            .route(web::get().to(chat::list_conversations)),
                    )
                    .service(
                        web::resource("/conversations/{id}")
                            .route(web::get().to(chat::get_conversation))
                            .route(web::delete().to(chat::delete_conversation)),
                    ),
            )
            .service(
                web::scope("/leave")
                    .service(web::resource("/my-requests").route(web::get().to(leave::my_requests)))
                    .service(
                        web::resource("/all-requests").route(web::get().to(leave::all_requests)),
                    )
                    .service(web::resource("/request").route(web::post().to(leave::create_request)))
                    .service(
                        web::resource("/{id}/status").route(web::patch().to(leave::update_status)),
                    )
                    .service(web::resource("/balance").route(web::get().to(leave::balance))),
            )
            .service(
                web::scope("/knowledge")
                    .service(
                        web::resource("")
                            .route(web::get().to(knowledge::list_articles))
                            .route(web::post().to(knowledge::create_article)),
                    )
                    // literal segments before /{id}
                    .service(web::resource("/search").route(web::get().to(knowledge::search)))
                    .service(
                        web::resource("/categories").route(web::get().to(knowledge::categories)),
                    )
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(knowledge::get_article))
                            .route(web::put().to(knowledge::update_article))
                            .route(web::delete().to(knowledge::delete_article)),
                    ),
            )
            .service(
                web::scope("/users")
                    .service(web::resource("").route(web::get().to(users::list_users)))
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(users::get_user))
                            .route(web::put().to(users::update_user)),
                    ),
            )
            .service(
                web::scope("/analytics")
                    .service(
                        web::resource("/dashboard").route(web::get().to(analytics::dashboard)),
                    )
                    .service(web::resource("/activity").route(web::get().to(analytics::activity))),
            ),
    );
}

// LOGIN
//  ├─ token (access, ACCESS_TOKEN_TTL)
//  └─ refresh_token (REFRESH_TOKEN_TTL, single use)

// API REQUEST
//  └─ Authorization: Bearer token

// ACCESS EXPIRED
//  └─ POST /auth/refresh with refresh_token
//       └─ returns a new pair, old refresh token revoked
