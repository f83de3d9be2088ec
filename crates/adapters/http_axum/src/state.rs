//! Shared application state for axum handlers.

use std::sync::Arc;

use tally_app::ports::CounterTable;
use tally_app::services::counter_service::CounterService;

/// Application state shared across all axum handlers.
///
/// Generic over the counter table to avoid dynamic dispatch.
/// `Clone` is implemented manually so the table itself does not need to be
/// `Clone` — only the `Arc` wrapper is cloned.
pub struct AppState<T> {
    /// Visitor counter use-case.
    pub counter_service: Arc<CounterService<T>>,
}

impl<T> Clone for AppState<T> {
    fn clone(&self) -> Self {
        Self {
            counter_service: Arc::clone(&self.counter_service),
        }
    }
}

impl<T> AppState<T>
where
    T: CounterTable + Send + Sync + 'static,
{
    /// Create a new application state from a service instance.
    pub fn new(counter_service: CounterService<T>) -> Self {
        Self {
            counter_service: Arc::new(counter_service),
        }
    }
}
