//! Repository layer over SQLite with soft-delete scoping, retry reads and
//! polymorphic batch operations.
//!
//! A [`Repository`] owns one live [`QueryBuilder`] per entity type. Chained
//! predicate calls compose it; terminal calls execute it and leave a fresh
//! builder behind.

pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod model;
pub mod query;
pub mod repo;

pub use config::{ConfigError, CoreConfig};
pub use db::{open_db, open_db_in_memory, DbError, DbResult, Migration};
pub use error::{RepoError, RepoResult, SaveFailure};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::attributes::Attributes;
pub use model::date::{humanize_timestamp, humanize_timestamp_at, timestamp_from_millis};
pub use model::entity::{Entity, EntityId};
pub use query::{render_sql, Aggregate, Operator, QueryBuilder, QueryError, TrashScope};
pub use repo::{Page, Repository, RetryPolicy, SimplePage, ALL_COLUMNS};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
