//! Repository layer.
//!
//! # Responsibility
//! - Own the stateful builder lifecycle for one entity type.
//! - Execute reads, writes, retry reads and morph batch operations against a
//!   borrowed SQLite connection.
//!
//! # Invariants
//! - Terminal operations leave a fresh builder behind, success or failure.
//! - Failures are returned as [`crate::error::RepoError`], never panics.

mod continuous;
mod morph;
mod mutation;
mod pagination;
mod reads;
mod repository;

pub use continuous::{RetryPolicy, MAX_DELAY_CEILING_MS, MAX_RETRIES_CEILING};
pub use pagination::{Page, SimplePage};
pub use repository::{Repository, ALL_COLUMNS};
