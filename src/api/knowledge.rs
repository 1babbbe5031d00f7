use actix_web::{HttpResponse, web};
use serde::Deserialize;
use serde_json::json;
use tracing::info;
use utoipa::IntoParams;

use crate::api::AppState;
use crate::auth::auth::AuthUser;
use crate::auth::policy::{self, Action, Resource};
use crate::error::AppError;
use crate::knowledge::search::ENDPOINT_RESULT_LIMIT;
use crate::model::analytics::{ActionType, LogEntry};
use crate::model::knowledge::{ArticlePatch, Category, NewArticle};

#[derive(Debug, Deserialize, IntoParams)]
pub struct KnowledgeFilter {
    /// Only articles in this category
    pub category: Option<Category>,
    /// Substring of title or content
    pub search: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct SearchQuery {
    /// Text to look for
    pub query: Option<String>,
    pub category: Option<Category>,
}

#[utoipa::path(
    get,
    path = "/api/knowledge",
    params(KnowledgeFilter),
    responses((status = 200, description = "Articles, newest first", body = Object)),
    security(("bearer_auth" = [])),
    tag = "Knowledge"
)]
pub async fn list_articles(
    _auth: AuthUser,
    state: web::Data<AppState>,
    query: web::Query<KnowledgeFilter>,
) -> Result<HttpResponse, AppError> {
    let search = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty());
    let articles = state.articles.list(query.category, search).await?;
    Ok(HttpResponse::Ok().json(json!({ "knowledge": articles })))
}

#[utoipa::path(
    get,
    path = "/api/knowledge/search",
    params(SearchQuery),
    responses(
        (status = 200, description = "At most five matches", body = Object),
        (status = 400, description = "Search query is required")
    ),
    security(("bearer_auth" = [])),
    tag = "Knowledge"
)]
pub async fn search(
    auth: AuthUser,
    state: web::Data<AppState>,
    query: web::Query<SearchQuery>,
) -> Result<HttpResponse, AppError> {
    let text = query.query.as_deref().unwrap_or_default();
    let results = state
        .knowledge
        .search(text, query.category, ENDPOINT_RESULT_LIMIT)
        .await?;

    state
        .analytics
        .record(
            LogEntry::new(auth.user_id, ActionType::KnowledgeSearch)
                .with_query(text)
                .with_metadata(json!({ "category": query.category, "results": results.len() })),
        )
        .await?;

    Ok(HttpResponse::Ok().json(json!({ "results": results })))
}

#[utoipa::path(
    get,
    path = "/api/knowledge/categories",
    responses((status = 200, description = "Article count per category", body = Object)),
    security(("bearer_auth" = [])),
    tag = "Knowledge"
)]
pub async fn categories(
    _auth: AuthUser,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let categories = state.articles.categories().await?;
    Ok(HttpResponse::Ok().json(json!({ "categories": categories })))
}

#[utoipa::path(
    get,
    path = "/api/knowledge/{id}",
    params(("id" = u64, Path, description = "Article id")),
    responses(
        (status = 200, description = "Article", body = Object),
        (status = 404, description = "Knowledge article not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Knowledge"
)]
pub async fn get_article(
    _auth: AuthUser,
    state: web::Data<AppState>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    let article = state
        .articles
        .get(path.into_inner())
        .await?
        .ok_or_else(|| AppError::not_found("Knowledge article"))?;
    Ok(HttpResponse::Ok().json(json!({ "knowledge": article })))
}

#[utoipa::path(
    post,
    path = "/api/knowledge",
    request_body = NewArticle,
    responses(
        (status = 201, description = "Article created", body = Object),
        (status = 400, description = "Title and content are required"),
        (status = 403, description = "HR/Admin only")
    ),
    security(("bearer_auth" = [])),
    tag = "Knowledge"
)]
pub async fn create_article(
    auth: AuthUser,
    state: web::Data<AppState>,
    payload: web::Json<NewArticle>,
) -> Result<HttpResponse, AppError> {
    policy::require(auth.actor(), Action::WriteKnowledge, Resource::Organization)?;

    let article = payload.into_inner();
    if article.title.trim().is_empty() || article.content.trim().is_empty() {
        return Err(AppError::InvalidInput("Title and content are required".into()));
    }

    let created = state.articles.create(article, auth.user_id).await?;
    info!(article_id = created.id, author = auth.user_id, "Knowledge article created");
    Ok(HttpResponse::Created().json(json!({
        "message": "Knowledge article created successfully",
        "knowledge": created,
    })))
}

#[utoipa::path(
    put,
    path = "/api/knowledge/{id}",
    params(("id" = u64, Path, description = "Article id")),
    request_body = ArticlePatch,
    responses(
        (status = 200, description = "Article updated", body = Object),
        (status = 403, description = "HR/Admin only"),
        (status = 404, description = "Knowledge article not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Knowledge"
)]
pub async fn update_article(
    auth: AuthUser,
    state: web::Data<AppState>,
    path: web::Path<u64>,
    payload: web::Json<ArticlePatch>,
) -> Result<HttpResponse, AppError> {
    policy::require(auth.actor(), Action::WriteKnowledge, Resource::Organization)?;

    let updated = state
        .articles
        .update(path.into_inner(), payload.into_inner())
        .await?
        .ok_or_else(|| AppError::not_found("Knowledge article"))?;

    Ok(HttpResponse::Ok().json(json!({
        "message": "Knowledge article updated successfully",
        "knowledge": updated,
    })))
}

#[utoipa::path(
    delete,
    path = "/api/knowledge/{id}",
    params(("id" = u64, Path, description = "Article id")),
    responses(
        (status = 200, description = "Article deleted"),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Knowledge article not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Knowledge"
)]
pub async fn delete_article(
    auth: AuthUser,
    state: web::Data<AppState>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    policy::require(auth.actor(), Action::DeleteKnowledge, Resource::Organization)?;

    let id = path.into_inner();
    if !state.articles.delete(id).await? {
        return Err(AppError::not_found("Knowledge article"));
    }

    info!(article_id = id, "Knowledge article deleted");
    Ok(HttpResponse::Ok().json(json!({ "message": "Knowledge article deleted successfully" })))
}
