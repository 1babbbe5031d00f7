use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use derive_more::Display;
use serde_json::json;

/// Every failure a handler or service can report.
///
/// Model-protocol and storage variants carry details for the log only;
/// clients receive a generic message for them.
#[derive(Debug, Display)]
pub enum AppError {
    #[display(fmt = "{}", _0)]
    InvalidInput(String),

    #[display(fmt = "{}", _0)]
    Unauthorized(String),

    #[display(fmt = "{}", _0)]
    AccessDenied(String),

    #[display(fmt = "{}", _0)]
    NotFound(String),

    #[display(fmt = "Leave request has already been processed")]
    AlreadyProcessed,

    #[display(fmt = "Insufficient {} balance", leave_type)]
    InsufficientBalance {
        leave_type: String,
        current_balance: i32,
        requested_days: i32,
    },

    #[display(fmt = "{}", _0)]
    Conflict(String),

    #[display(fmt = "Referenced resource does not exist")]
    InvalidReference,

    #[display(fmt = "unknown function: {}", _0)]
    UnknownFunction(String),

    #[display(fmt = "malformed function call: {}", _0)]
    MalformedFunctionCall(String),

    #[display(fmt = "upstream error: {}", _0)]
    Upstream(String),

    #[display(fmt = "upstream timed out")]
    UpstreamTimeout,

    #[display(fmt = "storage error: {}", _0)]
    Storage(String),
}

impl std::error::Error for AppError {}

impl AppError {
    pub fn not_found(what: &str) -> Self {
        AppError::NotFound(format!("{what} not found"))
    }

    /// Message safe to show to API clients.
    fn public_message(&self) -> String {
        match self {
            AppError::UnknownFunction(_)
            | AppError::MalformedFunctionCall(_)
            | AppError::Upstream(_) => {
                "The assistant is unavailable right now, please try again".to_string()
            }
            AppError::UpstreamTimeout => "The assistant took too long to respond".to_string(),
            AppError::Storage(_) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::InvalidInput(_)
            | AppError::AlreadyProcessed
            | AppError::InsufficientBalance { .. }
            | AppError::InvalidReference => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::AccessDenied(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::UnknownFunction(_)
            | AppError::MalformedFunctionCall(_)
            | AppError::Upstream(_) => StatusCode::BAD_GATEWAY,
            AppError::UpstreamTimeout => StatusCode::GATEWAY_TIMEOUT,
            AppError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }

        let body = match self {
            AppError::InsufficientBalance {
                current_balance,
                requested_days,
                ..
            } => json!({
                "error": self.public_message(),
                "current_balance": current_balance,
                "requested_days": requested_days,
            }),
            _ => json!({ "error": self.public_message() }),
        };

        HttpResponse::build(status).json(body)
    }
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &e {
            if db_err.is_unique_violation() {
                return AppError::Conflict("Resource already exists".into());
            }
            if db_err.is_foreign_key_violation() {
                return AppError::InvalidReference;
            }
        }
        AppError::Storage(e.to_string())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            AppError::UpstreamTimeout
        } else {
            AppError::Upstream(e.to_string())
        }
    }
}
