mod common;

use common::{open, seed_post, Post, Tag};
use repokit_core::{Attributes, Entity, RepoError, Repository, TrashScope, ALL_COLUMNS};

fn physical_rows(conn: &rusqlite::Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))
        .unwrap()
}

#[test]
fn delete_stamps_rows_instead_of_removing_them() {
    let conn = open();
    let kept = seed_post(&conn, "kept", 1);
    let gone = seed_post(&conn, "gone", 2);
    let mut repo = Repository::<Post>::bind(&conn);

    assert_eq!(repo.where_eq("title", "gone".to_string()).delete().unwrap(), 1);
    assert_eq!(physical_rows(&conn, "posts"), 2);

    let visible = repo.get(ALL_COLUMNS).unwrap();
    assert_eq!(visible.len(), 1);
    assert!(visible[0].is(&kept));

    let trashed = repo.get_by_id_with_trashed_or_fail(gone.id.unwrap(), ALL_COLUMNS).unwrap();
    assert!(trashed.deleted_at.is_some());
    assert!(repo.get_by_id(gone.id.unwrap(), ALL_COLUMNS).unwrap().is_none());
}

#[test]
fn only_trashed_sees_deleted_rows_only() {
    let conn = open();
    seed_post(&conn, "live", 1);
    let dead = seed_post(&conn, "dead", 2);
    let repo = Repository::<Post>::bind(&conn);
    assert!(repo.delete_entity(&dead).unwrap());

    let mut repo = Repository::<Post>::bind(&conn);
    let trashed = repo.only_trashed().unwrap().get(ALL_COLUMNS).unwrap();
    assert_eq!(trashed.len(), 1);
    assert_eq!(trashed[0].title, "dead");

    assert_eq!(repo.with_trashed().unwrap().count().unwrap(), 2);
    assert_eq!(repo.count().unwrap(), 1);
}

#[test]
fn trash_scopes_discard_earlier_predicates() {
    let conn = open();
    let mut repo = Repository::<Post>::bind(&conn);

    repo.where_eq("title", "ignored".to_string());
    repo.with_trashed().unwrap();
    assert_eq!(repo.builder().trash_scope(), TrashScope::WithTrashed);
    assert_eq!(
        repo.builder().to_sql().unwrap(),
        "SELECT * FROM posts"
    );
}

#[test]
fn trash_scopes_fail_without_soft_delete_and_leave_builder() {
    let conn = open();
    let mut repo = Repository::<Tag>::bind(&conn);
    repo.where_eq("name", "x".to_string());
    let before = repo.builder().clone();

    let err = repo.with_trashed().map(|_| ()).unwrap_err();
    assert!(matches!(err, RepoError::ModelNotSoftDeletable("tags")));
    assert_eq!(err.status_code(), Some(500));
    assert!(err.should_report());

    let err = repo.only_trashed().map(|_| ()).unwrap_err();
    assert!(matches!(err, RepoError::ModelNotSoftDeletable(_)));
    assert_eq!(repo.builder(), &before);

    let err = repo.get_by_id_with_trashed(1, ALL_COLUMNS).unwrap_err();
    assert!(matches!(err, RepoError::ModelNotSoftDeletable(_)));
}

#[test]
fn restore_entity_clears_the_stamp() {
    let conn = open();
    let post = seed_post(&conn, "back", 1);
    let repo = Repository::<Post>::bind(&conn);
    assert!(repo.delete_entity(&post).unwrap());
    assert!(!repo.delete_entity(&post).unwrap());

    assert!(repo.restore_entity(&post).unwrap());
    let mut reader = Repository::<Post>::bind(&conn);
    let restored = reader.find_or_fail(post.id.unwrap(), ALL_COLUMNS).unwrap();
    assert_eq!(restored.deleted_at, None);
    assert!(!repo.restore_entity(&post).unwrap());
}

#[test]
fn restore_entity_requires_soft_delete() {
    let conn = open();
    let repo = Repository::<Tag>::bind(&conn);
    let tag = repo
        .create(Attributes::new().set("name", "plain".to_string()))
        .unwrap();
    assert!(matches!(
        repo.restore_entity(&tag),
        Err(RepoError::ModelNotSoftDeletable("tags"))
    ));
}

#[test]
fn force_delete_removes_trashed_rows_too() {
    let conn = open();
    let trashed = seed_post(&conn, "trashed", 1);
    seed_post(&conn, "live", 2);
    let mut repo = Repository::<Post>::bind(&conn);
    assert!(repo.delete_entity(&trashed).unwrap());

    assert_eq!(repo.only_trashed().unwrap().force_delete().unwrap(), 1);
    assert_eq!(physical_rows(&conn, "posts"), 1);

    assert_eq!(repo.force_delete().unwrap(), 1);
    assert_eq!(physical_rows(&conn, "posts"), 0);
}

#[test]
fn delete_on_plain_entity_removes_rows() {
    let conn = open();
    let mut repo = Repository::<Tag>::bind(&conn);
    let tag = repo
        .create(Attributes::new().set("name", "temp".to_string()))
        .unwrap();

    assert!(repo.force_delete_entity(&tag).unwrap());
    assert_eq!(physical_rows(&conn, "tags"), 0);
    assert_eq!(repo.delete().unwrap(), 0);
}
