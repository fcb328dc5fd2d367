//! Entity contract consumed by [`crate::repo::Repository`].
//!
//! # Responsibility
//! - Describe the table, key and capabilities of one persisted record type.
//! - Convert between stored rows ([`Attributes`]) and the record type.
//! - Offer lifecycle hooks that row-by-row operations run through.
//!
//! # Invariants
//! - Two entities are the same record iff both carry the same primary key.
//! - A hook returning `false` aborts the operation for that one record.

use crate::error::{RepoError, RepoResult};
use crate::model::attributes::Attributes;
use crate::query::QueryBuilder;
use rusqlite::Connection;

/// Primary-key type shared by all entities.
pub type EntityId = i64;

/// A persisted record type bound to one table.
///
/// # Example
///
/// ```ignore
/// impl Entity for Comment {
///     fn table_name() -> &'static str { "comments" }
///     fn soft_deletes() -> bool { true }
///     fn from_attributes(attributes: Attributes) -> RepoResult<Self> { .. }
///     fn to_attributes(&self) -> Attributes { .. }
///     fn id(&self) -> Option<EntityId> { self.id }
/// }
/// ```
pub trait Entity: Sized {
    fn table_name() -> &'static str;

    fn primary_key() -> &'static str {
        "id"
    }

    /// Primary key prefixed with the table name, e.g. `posts.id`.
    fn qualified_key_name() -> String {
        format!("{}.{}", Self::table_name(), Self::primary_key())
    }

    /// Identifier stored in `<relation>_type` columns of morph relations.
    fn morph_type() -> &'static str {
        Self::table_name()
    }

    fn soft_deletes() -> bool {
        false
    }

    fn deleted_at_column() -> &'static str {
        "deleted_at"
    }

    /// Whether saves stamp `created_at` / `updated_at`.
    fn timestamps() -> bool {
        false
    }

    /// Fresh builder scoped to this entity, hiding trashed rows when soft
    /// delete is supported.
    fn new_query() -> QueryBuilder {
        let mut builder = QueryBuilder::new(Self::table_name());
        if Self::soft_deletes() {
            builder.soft_deletes(Self::deleted_at_column());
        }
        builder
    }

    fn from_attributes(attributes: Attributes) -> RepoResult<Self>;

    /// Persistable attributes. The primary key may be omitted.
    fn to_attributes(&self) -> Attributes;

    fn id(&self) -> Option<EntityId>;

    fn is(&self, other: &Self) -> bool {
        self.id().is_some() && self.id() == other.id()
    }

    fn saving(&self) -> bool {
        true
    }

    fn deleting(&self) -> bool {
        true
    }

    fn restoring(&self) -> bool {
        true
    }

    /// Loads the named relations into freshly fetched models.
    fn load_relations(
        _conn: &Connection,
        _models: &mut [Self],
        relations: &[String],
    ) -> RepoResult<()> {
        match relations.first() {
            Some(relation) => Err(RepoError::InvalidArgument(format!(
                "entity [{}] has no relation `{relation}`",
                Self::table_name()
            ))),
            None => Ok(()),
        }
    }
}
