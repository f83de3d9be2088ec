//! JSON API handler modules.

#[allow(clippy::missing_errors_doc)]
pub mod visitors;

use axum::Router;
use axum::routing::any;

use tally_app::ports::CounterTable;

use crate::state::AppState;

/// Build the `/api` sub-router.
pub fn routes<T>() -> Router<AppState<T>>
where
    T: CounterTable + Send + Sync + 'static,
{
    Router::new().route("/visitor", any(visitors::increment::<T>))
}
