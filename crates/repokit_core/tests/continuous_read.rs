mod common;

use common::{open, Post, Tag, SCHEMA};
use repokit_core::{open_db, Attributes, RepoError, Repository, RetryPolicy, ALL_COLUMNS};
use std::thread;
use std::time::{Duration, Instant};

#[test]
fn missing_row_returns_none_after_all_attempts() {
    let conn = open();
    let mut repo = Repository::<Tag>::bind(&conn);

    let started_at = Instant::now();
    let found = repo
        .get_by_continuously("name", "never".to_string(), ALL_COLUMNS, &RetryPolicy::new(3, 10))
        .unwrap();

    assert!(found.is_none());
    assert!(started_at.elapsed() >= Duration::from_millis(20));
}

#[test]
fn existing_row_is_returned_without_waiting() {
    let conn = open();
    let mut repo = Repository::<Tag>::bind(&conn);
    let id = repo
        .insert_get_id(Attributes::new().set("name", "ready".to_string()))
        .unwrap();

    let started_at = Instant::now();
    let found = repo
        .get_by_id_continuously(id, ALL_COLUMNS, &RetryPolicy::new(5, 500))
        .unwrap()
        .unwrap();
    assert_eq!(found.name, "ready");
    assert!(started_at.elapsed() < Duration::from_millis(500));
}

#[test]
fn delay_over_ceiling_is_invalid_argument() {
    let conn = open();
    let mut repo = Repository::<Tag>::bind(&conn);
    let policy = RetryPolicy {
        delay_ms: 3000,
        max_delay_ms: 2000,
        ..RetryPolicy::default()
    };

    let started_at = Instant::now();
    let err = repo
        .get_by_id_continuously(1, ALL_COLUMNS, &policy)
        .unwrap_err();
    assert!(matches!(err, RepoError::InvalidArgument(_)));
    assert!(err.should_report());
    assert!(started_at.elapsed() < Duration::from_millis(1000));
}

#[test]
fn retries_over_ceiling_are_invalid_argument() {
    let conn = open();
    let mut repo = Repository::<Tag>::bind(&conn);
    let policy = RetryPolicy {
        retries: 101,
        max_retries: 1000,
        ..RetryPolicy::default()
    };
    let err = repo.get_by_id_continuously(1, ALL_COLUMNS, &policy).unwrap_err();
    assert!(matches!(err, RepoError::InvalidArgument(_)));
}

#[test]
fn or_fail_variant_maps_exhaustion_to_not_found() {
    let conn = open();
    let mut repo = Repository::<Post>::bind(&conn);
    let err = repo
        .get_by_id_continuously_or_fail(42, ALL_COLUMNS, &RetryPolicy::new(2, 1))
        .unwrap_err();
    assert!(err.is_not_found());
    assert!(err.to_string().contains("[42]"));
}

#[test]
fn row_committed_by_another_connection_becomes_visible() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("replica.sqlite3");
    let conn = open_db(&path, SCHEMA).unwrap();

    let writer_path = path.clone();
    let writer = thread::spawn(move || {
        let writer_conn = open_db(&writer_path, SCHEMA).unwrap();
        thread::sleep(Duration::from_millis(40));
        Repository::<Tag>::bind(&writer_conn)
            .insert_get_id(Attributes::new().set("name", "late".to_string()))
            .unwrap()
    });

    let mut repo = Repository::<Tag>::bind(&conn);
    let found = repo
        .get_by_continuously("name", "late".to_string(), ALL_COLUMNS, &RetryPolicy::new(100, 10))
        .unwrap()
        .unwrap();

    let written_id = writer.join().unwrap();
    assert_eq!(found.id, Some(written_id));
}
