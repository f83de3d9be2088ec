//! Axum router assembly.

use axum::Router;
use axum::http::HeaderValue;
use axum::http::header::InvalidHeaderValue;
use axum::routing::get;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use tally_app::ports::CounterTable;

use crate::state::AppState;

/// Build the top-level axum [`Router`].
///
/// Nests API routes under `/api` and adds `/health`.
/// Includes a [`TraceLayer`] that logs each HTTP request/response at the
/// `DEBUG` level using the `tracing` ecosystem, and the CORS layer when one
/// is given.
pub fn build<T>(state: AppState<T>, cors: Option<CorsLayer>) -> Router
where
    T: CounterTable + Send + Sync + 'static,
{
    let router = Router::new()
        .route("/health", get(health_check))
        .nest("/api", crate::api::routes())
        .layer(TraceLayer::new_for_http());

    let router = match cors {
        Some(cors) => router.layer(cors),
        None => router,
    };

    router.with_state(state)
}

/// Build a CORS layer from configured origins.
///
/// An empty list disables CORS; `*` allows any origin.
///
/// # Errors
///
/// Returns [`InvalidHeaderValue`] when an origin is not a valid header value.
pub fn cors_layer(allowed_origins: &[String]) -> Result<Option<CorsLayer>, InvalidHeaderValue> {
    if allowed_origins.is_empty() {
        return Ok(None);
    }
    let origins = if allowed_origins.iter().any(|origin| origin == "*") {
        AllowOrigin::from(Any)
    } else {
        let values = allowed_origins
            .iter()
            .map(|origin| HeaderValue::from_str(origin))
            .collect::<Result<Vec<_>, _>>()?;
        AllowOrigin::list(values)
    };
    Ok(Some(
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any),
    ))
}

async fn health_check() -> &'static str {
    "OK"
}
