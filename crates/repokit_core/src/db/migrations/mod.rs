//! Caller-owned schema migrations.
//!
//! # Responsibility
//! - Reject migration lists that are not strictly ordered.
//! - Run every pending step inside one transaction.
//!
//! # Invariants
//! - After success `PRAGMA user_version` equals the last step's version.
//! - A failing step leaves schema and `user_version` as they were.

use crate::db::{DbError, DbResult};
use log::{error, info};
use rusqlite::Connection;

/// One schema step owned by the application that binds repositories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Migration {
    pub version: u32,
    pub sql: &'static str,
}

impl Migration {
    pub const fn new(version: u32, sql: &'static str) -> Self {
        Self { version, sql }
    }
}

/// Version of the last step, `0` for an empty list.
pub fn latest_version(migrations: &[Migration]) -> u32 {
    migrations.last().map_or(0, |migration| migration.version)
}

/// Brings `conn` up to `latest_version(migrations)`.
///
/// # Errors
/// - `NonMonotonicMigration` for an unordered list, before touching `conn`.
/// - `UnsupportedSchemaVersion` when the database is already ahead.
/// - `MigrationFailed` naming the step whose script failed.
pub fn apply_migrations(conn: &mut Connection, migrations: &[Migration]) -> DbResult<()> {
    if let Some(pair) = migrations
        .windows(2)
        .find(|pair| pair[1].version <= pair[0].version)
    {
        return Err(DbError::NonMonotonicMigration {
            previous: pair[0].version,
            version: pair[1].version,
        });
    }

    let from_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    let to_version = latest_version(migrations);
    if from_version > to_version {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: from_version,
            latest_supported: to_version,
        });
    }

    let pending: Vec<&Migration> = migrations
        .iter()
        .filter(|migration| migration.version > from_version)
        .collect();
    if pending.is_empty() {
        return Ok(());
    }

    let tx = conn.transaction()?;
    for migration in &pending {
        let step = format!("{}\nPRAGMA user_version = {};", migration.sql, migration.version);
        if let Err(source) = tx.execute_batch(&step) {
            error!(
                "event=migrations_apply module=db status=error version={} error={}",
                migration.version, source
            );
            return Err(DbError::MigrationFailed {
                version: migration.version,
                source,
            });
        }
    }
    tx.commit()?;

    info!(
        "event=migrations_apply module=db status=ok from_version={} to_version={} steps={}",
        from_version,
        to_version,
        pending.len()
    );
    Ok(())
}
