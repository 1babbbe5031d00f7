use actix_web::{HttpRequest, HttpResponse, web};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::MySqlPool;
use tracing::{debug, info, instrument, warn};
use utoipa::ToSchema;

use crate::api::users::find_user;
use crate::auth::auth::AuthUser;
use crate::auth::jwt::{TokenType, generate_access_token, generate_refresh_token, verify_token};
use crate::auth::middleware::bearer_token;
use crate::auth::password::{hash_password, verify_password};
use crate::config::Config;
use crate::error::AppError;
use crate::model::role::Role;
use crate::model::user::User;

#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterRequest {
    #[schema(example = "jane.doe@company.com")]
    pub email: String,
    #[schema(example = "P@ssw0rd!")]
    pub password: String,
    #[schema(example = "Jane Doe")]
    pub name: String,
    #[schema(example = "Engineering")]
    pub department: Option<String>,
    /// Only `employee` may be self-registered.
    pub role: Option<Role>,
    #[schema(example = "2024-01-01", value_type = Option<String>, format = "date")]
    pub hire_date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    #[schema(example = "jane.doe@company.com")]
    pub email: String,
    #[schema(example = "P@ssw0rd!")]
    pub password: String,
}

#[derive(Serialize, ToSchema)]
pub struct AuthResponse {
    pub message: String,
    pub token: String,
    pub refresh_token: String,
    pub user: User,
}

#[derive(Serialize, ToSchema)]
pub struct TokenPair {
    pub token: String,
    pub refresh_token: String,
}

#[derive(sqlx::FromRow)]
struct Credentials {
    id: u64,
    password_hash: String,
}

/// Signs a fresh access/refresh pair and records the refresh token's jti.
async fn issue_token_pair(
    pool: &MySqlPool,
    config: &Config,
    user_id: u64,
    email: &str,
    role: Role,
) -> Result<TokenPair, AppError> {
    let token = generate_access_token(
        user_id,
        email,
        role,
        &config.jwt_secret,
        config.access_token_ttl,
    )?;
    let (refresh_token, claims) = generate_refresh_token(
        user_id,
        email,
        role,
        &config.jwt_secret,
        config.refresh_token_ttl,
    )?;

    debug!(user_id, jti = %claims.jti, "Storing refresh token");
    sqlx::query(
        r#"
        INSERT INTO refresh_tokens (user_id, jti, expires_at)
        VALUES (?, ?, FROM_UNIXTIME(?))
        "#,
    )
    .bind(user_id)
    .bind(&claims.jti)
    .bind(claims.exp as i64)
    .execute(pool)
    .await?;

    Ok(TokenPair {
        token,
        refresh_token,
    })
}

/// Payload checks that need no database.
fn validate_registration(payload: &RegisterRequest) -> Result<(), AppError> {
    if payload.email.trim().is_empty() || payload.password.is_empty() || payload.name.trim().is_empty()
    {
        return Err(AppError::InvalidInput(
            "Email, password, and name are required".into(),
        ));
    }
    if payload.role.is_some_and(|role| role != Role::Employee) {
        return Err(AppError::AccessDenied(
            "Only employee accounts can be self-registered".into(),
        ));
    }
    Ok(())
}

#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User registered", body = AuthResponse),
        (status = 400, description = "Missing fields"),
        (status = 403, description = "Privileged role requested"),
        (status = 409, description = "Email already registered")
    ),
    tag = "Auth"
)]
#[instrument(name = "auth_register", skip(pool, config, payload), fields(email = %payload.email))]
pub async fn register(
    payload: web::Json<RegisterRequest>,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> Result<HttpResponse, AppError> {
    validate_registration(&payload)?;

    let email = payload.email.trim();
    let password_hash = hash_password(&payload.password)?;

    let inserted = sqlx::query(
        r#"
        INSERT INTO users (email, password_hash, name, department, role, hire_date)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(email)
    .bind(&password_hash)
    .bind(payload.name.trim())
    .bind(payload.department.as_deref())
    .bind(Role::Employee.as_ref())
    .bind(payload.hire_date)
    .execute(pool.get_ref())
    .await
    .map_err(|e| match AppError::from(e) {
        AppError::Conflict(_) => AppError::Conflict("User already exists".into()),
        other => other,
    })?;

    let user = find_user(pool.get_ref(), inserted.last_insert_id())
        .await?
        .ok_or_else(|| AppError::not_found("User"))?;

    let tokens = issue_token_pair(pool.get_ref(), &config, user.id, &user.email, user.role).await?;

    info!(user_id = user.id, "User registered");
    Ok(HttpResponse::Created().json(AuthResponse {
        message: "User registered successfully".into(),
        token: tokens.token,
        refresh_token: tokens.refresh_token,
        user,
    }))
}

#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = AuthResponse),
        (status = 400, description = "Missing fields"),
        (status = 401, description = "Invalid credentials")
    ),
    tag = "Auth"
)]
#[instrument(name = "auth_login", skip(pool, config, payload), fields(email = %payload.email))]
pub async fn login(
    payload: web::Json<LoginRequest>,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> Result<HttpResponse, AppError> {
    info!("Login request received");

    if payload.email.trim().is_empty() || payload.password.is_empty() {
        return Err(AppError::InvalidInput(
            "Email and password are required".into(),
        ));
    }

    let credentials = sqlx::query_as::<_, Credentials>(
        "SELECT id, password_hash FROM users WHERE email = ?",
    )
    .bind(payload.email.trim())
    .fetch_optional(pool.get_ref())
    .await?
    .ok_or_else(|| {
        info!("Invalid credentials: user not found");
        AppError::Unauthorized("Invalid credentials".into())
    })?;

    verify_password(&payload.password, &credentials.password_hash)
        .inspect_err(|_| info!("Invalid credentials: password mismatch"))?;

    let user = find_user(pool.get_ref(), credentials.id)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Invalid credentials".into()))?;

    let tokens = issue_token_pair(pool.get_ref(), &config, user.id, &user.email, user.role).await?;

    info!(user_id = user.id, "Login successful");
    Ok(HttpResponse::Ok().json(AuthResponse {
        message: "Login successful".into(),
        token: tokens.token,
        refresh_token: tokens.refresh_token,
        user,
    }))
}

#[utoipa::path(
    post,
    path = "/auth/refresh",
    responses(
        (status = 200, description = "Rotated token pair", body = TokenPair),
        (status = 401, description = "Missing, revoked or expired refresh token")
    ),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn refresh_token(
    req: HttpRequest,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> Result<HttpResponse, AppError> {
    let header = req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok());
    let claims = verify_token(bearer_token(header)?, &config.jwt_secret)?;

    if claims.token_type != TokenType::Refresh {
        return Err(AppError::Unauthorized("Refresh token required".into()));
    }

    // Revoking with a guard on `revoked = 0` makes each refresh token single use.
    let revoked = sqlx::query(
        r#"
        UPDATE refresh_tokens
        SET revoked = 1
        WHERE jti = ? AND user_id = ? AND revoked = 0 AND expires_at > NOW()
        "#,
    )
    .bind(&claims.jti)
    .bind(claims.user_id)
    .execute(pool.get_ref())
    .await?;

    if revoked.rows_affected() != 1 {
        warn!(user_id = claims.user_id, "Refresh with unknown or revoked token");
        return Err(AppError::Unauthorized("Invalid refresh token".into()));
    }

    // Role and email may have changed since the token was issued.
    let user = find_user(pool.get_ref(), claims.user_id)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Invalid refresh token".into()))?;

    let tokens = issue_token_pair(pool.get_ref(), &config, user.id, &user.email, user.role).await?;
    Ok(HttpResponse::Ok().json(tokens))
}

#[utoipa::path(
    post,
    path = "/auth/logout",
    responses((status = 204, description = "Refresh token revoked")),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn logout(
    req: HttpRequest,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> HttpResponse {
    let header = req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok());

    let claims = match bearer_token(header).and_then(|t| verify_token(t, &config.jwt_secret)) {
        Ok(c) if c.token_type == TokenType::Refresh => c,
        _ => return HttpResponse::NoContent().finish(),
    };

    if let Err(e) = sqlx::query("UPDATE refresh_tokens SET revoked = 1 WHERE jti = ?")
        .bind(&claims.jti)
        .execute(pool.get_ref())
        .await
    {
        warn!(error = %e, "Failed to revoke refresh token on logout");
    }

    HttpResponse::NoContent().finish()
}

#[utoipa::path(
    get,
    path = "/api/auth/me",
    responses(
        (status = 200, description = "Current user", body = Object),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "User not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn me(auth: AuthUser, pool: web::Data<MySqlPool>) -> Result<HttpResponse, AppError> {
    let user = find_user(pool.get_ref(), auth.user_id)
        .await?
        .ok_or_else(|| AppError::not_found("User"))?;
    Ok(HttpResponse::Ok().json(json!({ "user": user })))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registration(role: Option<Role>) -> RegisterRequest {
        RegisterRequest {
            email: "new.hire@corp.test".into(),
            password: "hunter22".into(),
            name: "New Hire".into(),
            department: None,
            role,
            hire_date: None,
        }
    }

    #[test]
    fn employees_may_self_register() {
        assert!(validate_registration(&registration(None)).is_ok());
        assert!(validate_registration(&registration(Some(Role::Employee))).is_ok());
    }

    #[test]
    fn privileged_self_registration_is_denied() {
        for role in [Role::Hr, Role::Admin] {
            assert!(matches!(
                validate_registration(&registration(Some(role))),
                Err(AppError::AccessDenied(_))
            ));
        }
    }

    #[test]
    fn blank_fields_are_rejected() {
        let mut payload = registration(None);
        payload.name = "  ".into();
        assert!(matches!(
            validate_registration(&payload),
            Err(AppError::InvalidInput(_))
        ));
    }
}
