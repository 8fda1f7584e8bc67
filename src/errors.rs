use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequest, Request},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};

/// Domain error taxonomy. Every failure a handler can surface maps to one
/// variant, and every variant maps to a stable HTTP status and wire code.
#[derive(Error, Debug)]
pub enum ApiError {
    /// Missing or malformed request data.
    #[error("{0}")]
    Validation(String),

    /// A resource with the same identity already exists.
    #[error("{0}")]
    Conflict(String),

    /// A well-formed request asking for something semantically disallowed.
    #[error("{0}")]
    InvalidOperation(String),

    /// The resource does not exist, or a lookup the operation depends on failed.
    #[error("{0}")]
    NotFound(String),

    /// A password-reset token past its validity window.
    #[error("token is expired")]
    TokenExpired,

    /// Missing or invalid bearer token.
    #[error("{0}")]
    Unauthorized(String),

    /// Authenticated, but not allowed to act on this resource.
    #[error("{0}")]
    Forbidden(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Wire shape for every error response.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub status: u16,
    pub message: String,
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::InvalidOperation(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::TokenExpired => StatusCode::GONE,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Machine-readable code. Historically every client-side failure reports
    /// `BAD_REQUEST` with a varying status; only the expired-token case and
    /// the auth layer are distinguishable by code.
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Validation(_)
            | ApiError::Conflict(_)
            | ApiError::InvalidOperation(_)
            | ApiError::NotFound(_) => "BAD_REQUEST",
            ApiError::TokenExpired => "TOKEN_EXPIRED",
            ApiError::Unauthorized(_) => "UNAUTHORIZED",
            ApiError::Forbidden(_) => "FORBIDDEN",
            ApiError::Internal(_) => "INTERNAL_SERVER_ERROR",
        }
    }

    fn user_message(&self) -> String {
        match self {
            // Internal details stay in the logs.
            ApiError::Internal(_) => "internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(error = ?self, %status, "request failed");
        } else {
            warn!(error = %self, %status, "request rejected");
        }
        let body = ErrorBody {
            code: self.code(),
            status: status.as_u16(),
            message: self.user_message(),
        };
        (status, Json(body)).into_response()
    }
}

/// `Json<T>` wrapper whose rejection is a 422 in the crate's wire shape
/// instead of axum's plain-text body.
pub struct AppJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for AppJson<T>
where
    S: Send + Sync,
    T: serde::de::DeserializeOwned,
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(AppJson(value)),
            Err(rejection) => Err(ApiError::Validation(rejection.body_text())),
        }
    }
}
