//! Errors surfaced by the HTTP frontend.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use waybackproxy_core::Error;

/// Failures that end a request early.
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    /// Neither an absolute-form URI nor a Host header to build the target from.
    #[error("INVALID_REQUEST: {0}")]
    InvalidRequest(String),

    /// The coordinator or the store failed.
    #[error(transparent)]
    Core(#[from] Error),
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        match self {
            ProxyError::InvalidRequest(reason) => {
                tracing::warn!(%reason, "rejecting request");
                (StatusCode::BAD_REQUEST, reason).into_response()
            }
            ProxyError::Core(err) => {
                tracing::error!(error = %err, "request failed");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_error_is_bare_500() {
        let response = ProxyError::from(Error::MigrationFailed("disk".into())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_invalid_request_is_400() {
        let response = ProxyError::InvalidRequest("no host".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
