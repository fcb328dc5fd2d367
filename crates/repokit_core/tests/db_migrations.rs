mod common;

use common::SCHEMA;
use repokit_core::db::{latest_version, open_db, open_db_in_memory, DbError, Migration};
use rusqlite::Connection;

#[test]
fn in_memory_open_applies_every_migration() {
    let conn = open_db_in_memory(SCHEMA).unwrap();

    assert_eq!(user_version(&conn), latest_version(SCHEMA));
    for table in ["posts", "comments", "tags"] {
        assert!(table_exists(&conn, table), "table {table} does not exist");
    }
    let foreign_keys: i64 = conn
        .query_row("PRAGMA foreign_keys;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(foreign_keys, 1);
}

#[test]
fn later_migrations_apply_on_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("repokit.sqlite3");

    drop(open_db(&path, SCHEMA).unwrap());

    let extended = [
        SCHEMA[0],
        Migration::new(2, "ALTER TABLE tags ADD COLUMN color TEXT;"),
    ];
    let conn = open_db(&path, &extended).unwrap();
    assert_eq!(user_version(&conn), 2);
    conn.execute("INSERT INTO tags (name, color) VALUES ('a', 'red')", [])
        .unwrap();

    drop(conn);
    let conn = open_db(&path, &extended).unwrap();
    assert_eq!(user_version(&conn), 2);
}

#[test]
fn newer_database_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.sqlite3");
    Connection::open(&path)
        .unwrap()
        .execute_batch("PRAGMA user_version = 42;")
        .unwrap();

    match open_db(&path, SCHEMA).unwrap_err() {
        DbError::UnsupportedSchemaVersion {
            db_version,
            latest_supported,
        } => {
            assert_eq!(db_version, 42);
            assert_eq!(latest_supported, 1);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn unordered_migrations_are_rejected() {
    let migrations = [
        Migration::new(2, "CREATE TABLE a (id INTEGER);"),
        Migration::new(2, "CREATE TABLE b (id INTEGER);"),
    ];
    let err = open_db_in_memory(&migrations).unwrap_err();
    assert!(matches!(
        err,
        DbError::NonMonotonicMigration {
            previous: 2,
            version: 2
        }
    ));
}

#[test]
fn failing_migration_leaves_version_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.sqlite3");
    let migrations = [
        Migration::new(1, "CREATE TABLE ok (id INTEGER);"),
        Migration::new(2, "CREATE TABLE broken (;"),
    ];

    let err = open_db(&path, &migrations).unwrap_err();
    assert!(matches!(err, DbError::MigrationFailed { version: 2, .. }));
    assert!(std::error::Error::source(&err).is_some());

    let conn = Connection::open(&path).unwrap();
    assert_eq!(user_version(&conn), 0);
    assert!(!table_exists(&conn, "ok"));
}

fn user_version(conn: &Connection) -> u32 {
    conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap()
}

fn table_exists(conn: &Connection, table: &str) -> bool {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1);",
        [table],
        |row| row.get::<_, i64>(0),
    )
    .unwrap()
        == 1
}
