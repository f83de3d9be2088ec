//! HTTP error response mapping.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tokio::task::JoinError;

use tally_domain::error::{StoreError, TallyError};

/// JSON error body returned by API endpoints.
#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
}

/// Maps application failures to an HTTP response.
///
/// Every failure is a server error: the counter endpoint takes no input
/// that could be wrong. The body never carries counter state.
pub enum ApiError {
    /// The use-case failed.
    App(TallyError),
    /// The detached increment task panicked or was cancelled.
    Task(JoinError),
}

impl From<TallyError> for ApiError {
    fn from(err: TallyError) -> Self {
        Self::App(err)
    }
}

impl From<JoinError> for ApiError {
    fn from(err: JoinError) -> Self {
        Self::Task(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::App(
                TallyError::Store(StoreError::Unreachable(_)) | TallyError::Contention { .. },
            ) => {
                (StatusCode::SERVICE_UNAVAILABLE, "service unavailable")
            }
            Self::App(_) | Self::Task(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal server error")
            }
        };

        match &self {
            Self::App(err) => {
                let source = std::error::Error::source(err).map(ToString::to_string);
                tracing::error!(error = %err, ?source, "counter increment failed");
            }
            Self::Task(err) => tracing::error!(error = %err, "counter increment task failed"),
        }

        (status, Json(ErrorBody { error: message })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_domain::error::ValidationError;

    #[test]
    fn should_map_unreachable_store_to_service_unavailable() {
        let err = ApiError::from(TallyError::Store(StoreError::Unreachable(
            "connection refused".into(),
        )));
        assert_eq!(err.into_response().status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn should_map_contention_to_service_unavailable() {
        let err = ApiError::from(TallyError::Contention { attempts: 3 });
        assert_eq!(err.into_response().status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn should_map_unauthorized_store_to_internal_error() {
        let err = ApiError::from(TallyError::Store(StoreError::Unauthorized(
            "signature mismatch".into(),
        )));
        assert_eq!(
            err.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn should_map_overflow_to_internal_error() {
        let err = ApiError::from(TallyError::from(ValidationError::CountOverflow));
        assert_eq!(
            err.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
