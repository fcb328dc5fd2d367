//! Connection bootstrap for repositories.
//!
//! # Responsibility
//! - Hand out SQLite connections configured the way repositories expect.
//! - Bring the schema up to the caller's latest migration before use.
//!
//! # Invariants
//! - Schema state lives in `PRAGMA user_version`; nothing else is tracked.
//! - A connection is only returned once every pending migration committed.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod migrations;
mod open;

pub use migrations::{apply_migrations, latest_version, Migration};
pub use open::{open_db, open_db_in_memory};

pub type DbResult<T> = Result<T, DbError>;

/// Bootstrap and migration failures.
#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    /// The file was migrated by a newer build than the caller knows about.
    UnsupportedSchemaVersion { db_version: u32, latest_supported: u32 },
    NonMonotonicMigration { previous: u32, version: u32 },
    /// One migration script failed; the whole batch was rolled back.
    MigrationFailed { version: u32, source: rusqlite::Error },
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "sqlite failure: {err}"),
            Self::UnsupportedSchemaVersion {
                db_version,
                latest_supported,
            } => write!(
                f,
                "schema version {db_version} is ahead of the latest known migration {latest_supported}"
            ),
            Self::NonMonotonicMigration { previous, version } => write!(
                f,
                "migration {version} listed after {previous}; versions must strictly increase"
            ),
            Self::MigrationFailed { version, source } => {
                write!(f, "migration {version} failed: {source}")
            }
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) | Self::MigrationFailed { source: err, .. } => Some(err),
            Self::UnsupportedSchemaVersion { .. } | Self::NonMonotonicMigration { .. } => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}
