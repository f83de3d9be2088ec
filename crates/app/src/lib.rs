//! # tally-app
//!
//! Application layer — the increment use-case and its **port definition**.
//!
//! ## Responsibilities
//! - Define the `CounterTable` port that store adapters must implement
//!   (driven/outbound port): read, create-if-absent, conditional merge
//! - Define the `CounterService` use-case (driving/inbound port): the
//!   read-increment-write sequence with create-vs-update branching and
//!   bounded retry on concurrent-write collisions
//! - Orchestrate domain objects without knowing *how* the store works
//!
//! ## Dependency rule
//! Depends on `tally-domain` only.
//! Never imports adapter crates. Adapters depend on *this* crate, not the reverse.

pub mod ports;
pub mod services;
