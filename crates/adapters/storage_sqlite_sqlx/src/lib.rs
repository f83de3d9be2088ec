//! # tally-adapter-storage-sqlite-sqlx
//!
//! `SQLite` persistence adapter using [sqlx](https://docs.rs/sqlx).
//!
//! ## Responsibilities
//! - Implement the `CounterTable` port defined in `tally-app::ports`
//! - Manage `SQLite` connection pool lifecycle
//! - Run database migrations (using sqlx embedded migrations)
//! - Emulate table-storage concurrency tokens with a per-row version column
//!
//! Meant for local development and tests; production deployments use the
//! Azure Table adapter.
//!
//! ## Dependency rule
//! Depends on `tally-app` (for port traits) and `tally-domain` (for domain types).
//! The `app` and `domain` crates must never reference this adapter.

mod counter_table;
mod error;
mod pool;

pub use counter_table::SqliteCounterTable;
pub use error::StorageError;
pub use pool::{Config, Database};
