//! Table-service error type and its classification into store error kinds.

use reqwest::StatusCode;
use tally_domain::error::StoreError;

/// Error code for a missing entity (as opposed to a missing table).
const RESOURCE_NOT_FOUND: &str = "ResourceNotFound";
/// Error code for an insert whose keys are already taken.
const ENTITY_ALREADY_EXISTS: &str = "EntityAlreadyExists";

/// Errors originating from the Azure Table adapter.
#[derive(Debug, thiserror::Error)]
pub enum AzureTableError {
    /// The configured endpoint is not a usable base URL.
    #[error("invalid table endpoint: {0}")]
    InvalidEndpoint(String),

    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client")]
    Client(#[source] reqwest::Error),

    /// The request did not produce a response (connect, timeout, body read).
    #[error("request to the table service failed")]
    Transport(#[from] reqwest::Error),

    /// The service answered with a non-success status.
    #[error("table service answered {status} ({})", .code.as_deref().unwrap_or("no error code"))]
    Status {
        status: StatusCode,
        code: Option<String>,
    },

    /// A successful write response carried no `ETag` header.
    #[error("response is missing the ETag header")]
    MissingETag,

    /// The entity body could not be decoded.
    #[error("malformed entity body")]
    MalformedEntity(#[from] serde_json::Error),

    /// The entity has no `count` property usable as a non-negative integer.
    #[error("entity has no usable count property")]
    InvalidCount,
}

impl AzureTableError {
    /// The service positively reported that the entity does not exist.
    ///
    /// A 404 without that code (missing table, wrong endpoint path, a proxy
    /// page) says nothing about the record.
    pub(crate) fn is_entity_missing(&self) -> bool {
        self.has_code(StatusCode::NOT_FOUND, RESOURCE_NOT_FOUND)
    }

    fn is_entity_taken(&self) -> bool {
        self.has_code(StatusCode::CONFLICT, ENTITY_ALREADY_EXISTS)
    }

    fn has_code(&self, expected: StatusCode, expected_code: &str) -> bool {
        matches!(
            self,
            Self::Status { status, code: Some(code) }
                if *status == expected && code == expected_code
        )
    }
}

impl From<AzureTableError> for StoreError {
    fn from(err: AzureTableError) -> Self {
        if err.is_entity_missing() {
            return Self::NotFound;
        }
        if err.is_entity_taken() {
            return Self::AlreadyExists;
        }
        match err {
            AzureTableError::Transport(ref source)
                if source.is_connect() || source.is_timeout() =>
            {
                Self::Unreachable(Box::new(err))
            }
            AzureTableError::Status { status, .. } => match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                    Self::Unauthorized(Box::new(err))
                }
                StatusCode::PRECONDITION_FAILED => Self::Conflict,
                StatusCode::SERVICE_UNAVAILABLE | StatusCode::GATEWAY_TIMEOUT => {
                    Self::Unreachable(Box::new(err))
                }
                _ => Self::Other(Box::new(err)),
            },
            other => Self::Other(Box::new(other)),
        }
    }
}
