use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use store::{AuthError, SessionError, StoreError};
use thiserror::Error;
use tracing::{error, warn};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error("Sign in to continue")]
    Unauthorized,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Session(#[from] SessionError),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::MalformedPayload(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Store(e) | AppError::Session(SessionError::Store(e)) => store_status(e),
            AppError::Session(SessionError::NotAuthorized) => StatusCode::FORBIDDEN,
            AppError::Session(SessionError::Auth(AuthError::Rejected { .. })) => {
                StatusCode::UNAUTHORIZED
            }
            AppError::Session(SessionError::Auth(_)) => StatusCode::BAD_GATEWAY,
        }
    }
}

fn store_status(e: &StoreError) -> StatusCode {
    match e {
        StoreError::NotFound { .. } => StatusCode::NOT_FOUND,
        StoreError::Remote { status: 401 | 403, .. } => StatusCode::FORBIDDEN,
        StoreError::Remote { status: 409, .. } => StatusCode::CONFLICT,
        StoreError::Remote { status: 400..=499, .. } => StatusCode::BAD_REQUEST,
        _ => StatusCode::BAD_GATEWAY,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            error!("{self}");
        } else {
            warn!("{self}");
        }

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let rls = AppError::Store(StoreError::Remote {
            status: 403,
            code: "42501".to_string(),
            message: "permission denied".to_string(),
        });
        assert_eq!(rls.status(), StatusCode::FORBIDDEN);
        assert_eq!(rls.to_string(), "permission denied");

        let missing = AppError::Store(StoreError::NotFound {
            collection: "restaurants",
        });
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);

        let refused = AppError::Session(SessionError::NotAuthorized);
        assert_eq!(refused.status(), StatusCode::FORBIDDEN);
        assert_eq!(refused.to_string(), "You are not authorized to login.");

        let unreachable = AppError::Session(SessionError::Auth(AuthError::Malformed(
            "missing access_token".to_string(),
        )));
        assert_eq!(unreachable.status(), StatusCode::BAD_GATEWAY);

        assert_eq!(AppError::Unauthorized.status(), StatusCode::UNAUTHORIZED);
    }
}
