//! Entity-facing model types.
//!
//! # Responsibility
//! - Define the contract every repository-bound record type implements.
//! - Provide the row currency (`Attributes`) and timestamp helpers.
//!
//! # Invariants
//! - Entities are identified by an `EntityId` primary key.
//! - Soft deletion is a `deleted_at` stamp, never a physical removal.

pub mod attributes;
pub mod date;
pub mod entity;
