use actix_web::middleware::Next;
use actix_web::{
    Error, HttpMessage, ResponseError,
    body::BoxBody,
    dev::{ServiceRequest, ServiceResponse},
    web::Data,
};

use crate::auth::auth::AuthUser;
use crate::auth::jwt::{TokenType, verify_token};
use crate::config::Config;
use crate::error::AppError;

/// Pulls the token out of an `Authorization: Bearer ...` header value.
pub fn bearer_token(header: Option<&str>) -> Result<&str, AppError> {
    header
        .ok_or_else(|| AppError::Unauthorized("Access token required".into()))?
        .strip_prefix("Bearer ")
        .ok_or_else(|| {
            AppError::Unauthorized("Authorization header must start with Bearer".into())
        })
}

pub async fn auth_middleware(
    req: ServiceRequest,
    next: Next<BoxBody>,
) -> Result<ServiceResponse<BoxBody>, Error> {
    let config = req
        .app_data::<Data<Config>>()
        .ok_or_else(|| actix_web::error::ErrorInternalServerError("App config missing"))?;

    let header = req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok());

    let claims = bearer_token(header).and_then(|token| verify_token(token, &config.jwt_secret));

    let claims = match claims {
        Ok(c) if c.token_type == TokenType::Access => c,
        Ok(_) => {
            let err = AppError::Unauthorized("Access token required".into());
            return Ok(req.into_response(err.error_response()));
        }
        Err(err) => {
            tracing::debug!(error = %err, path = %req.path(), "Rejected token");
            return Ok(req.into_response(err.error_response()));
        }
    };

    req.extensions_mut().insert(AuthUser {
        user_id: claims.user_id,
        email: claims.sub,
        role: claims.role,
    });

    next.call(req).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{
        App, HttpResponse, http::StatusCode, middleware::from_fn, test as actix_test, web,
    };

    use crate::auth::jwt::{generate_access_token, generate_refresh_token};
    use crate::model::role::Role;

    async fn whoami(user: AuthUser) -> HttpResponse {
        HttpResponse::Ok().body(user.email)
    }

    #[test]
    fn bearer_prefix_is_required() {
        assert_eq!(bearer_token(Some("Bearer abc")).unwrap(), "abc");
        assert!(bearer_token(Some("Basic abc")).is_err());
        assert!(bearer_token(None).is_err());
    }

    #[actix_web::test]
    async fn only_access_tokens_pass() {
        let config = Config::for_tests();
        let app = actix_test::init_service(
            App::new().app_data(Data::new(config.clone())).service(
                web::scope("/api")
                    .wrap(from_fn(auth_middleware))
                    .route("/whoami", web::get().to(whoami)),
            ),
        )
        .await;

        let access =
            generate_access_token(3, "hr@corp.test", Role::Hr, &config.jwt_secret, 60).unwrap();
        let req = actix_test::TestRequest::get()
            .uri("/api/whoami")
            .insert_header(("Authorization", format!("Bearer {access}")))
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(actix_test::read_body(resp).await, "hr@corp.test");

        let (refresh, _) =
            generate_refresh_token(3, "hr@corp.test", Role::Hr, &config.jwt_secret, 60).unwrap();
        let req = actix_test::TestRequest::get()
            .uri("/api/whoami")
            .insert_header(("Authorization", format!("Bearer {refresh}")))
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let req = actix_test::TestRequest::get().uri("/api/whoami").to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }
}
