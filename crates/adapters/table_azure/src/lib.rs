//! # tally-adapter-table-azure
//!
//! Azure Table Storage adapter built on [reqwest](https://docs.rs/reqwest).
//!
//! ## Responsibilities
//! - Implement the `CounterTable` port defined in `tally-app::ports` over the
//!   Table service REST API (OData JSON, no metadata)
//! - Authenticate with a shared access signature appended to every URL
//! - Build one HTTP client at startup and reuse its connection pool
//! - Classify HTTP outcomes into store error kinds: 404 on read is "no
//!   record", 409 on insert is "already exists", 412 on merge is a
//!   concurrency conflict, 401/403 are credential failures
//!
//! ## Dependency rule
//! Depends on `tally-app` (for port traits) and `tally-domain` (for domain types).
//! The `app` and `domain` crates must never reference this adapter.

mod config;
mod counter_table;
mod error;

pub use config::{Config, DEFAULT_TIMEOUT, SasToken};
pub use counter_table::AzureCounterTable;
pub use error::AzureTableError;
