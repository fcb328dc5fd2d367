//! SQL composition used by repositories.
//!
//! # Responsibility
//! - Provide the stateful builder a repository owns.
//! - Render bound statements for diagnostics.
//!
//! # Invariants
//! - Builders never perform I/O; execution belongs to the repository.

pub mod builder;
mod render;

pub use builder::{Aggregate, CompiledQuery, Operator, QueryBuilder, QueryError, TrashScope};
pub use render::render_sql;
