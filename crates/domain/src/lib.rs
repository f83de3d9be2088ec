//! # tally-domain
//!
//! Pure domain model for the tally visitor counter.
//!
//! ## Responsibilities
//! - Define the **Counter Record** (a named count living in a key-value table)
//!   and its composite **Counter Key** (partition key + row key)
//! - Define the opaque **ETag** concurrency token issued by the store
//! - Define the error taxonomy shared by every layer, including the
//!   store error kinds the application branches on
//! - Enforce key rules and the no-overflow increment rule
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or external IO crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod counter;
pub mod error;
