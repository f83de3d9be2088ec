//! Visitor counter handler.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

use tally_app::ports::CounterTable;

use crate::error::ApiError;
use crate::state::AppState;

/// Response body of the counter endpoint.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct VisitorsBody {
    pub visitors: u64,
}

/// Possible responses from the increment endpoint.
pub enum IncrementResponse {
    Ok(Json<VisitorsBody>),
}

impl IntoResponse for IncrementResponse {
    fn into_response(self) -> Response {
        match self {
            Self::Ok(json) => json.into_response(),
        }
    }
}

/// `ANY /api/visitor`
///
/// The request method, query and body are ignored: every call counts.
pub async fn increment<T>(
    State(state): State<AppState<T>>,
) -> Result<IncrementResponse, ApiError>
where
    T: CounterTable + Send + Sync + 'static,
{
    // Runs on its own task so a client disconnect cannot drop the
    // increment between the read and the write.
    let service = Arc::clone(&state.counter_service);
    let visitors = tokio::spawn(async move { service.increment().await }).await??;
    Ok(IncrementResponse::Ok(Json(VisitorsBody { visitors })))
}
