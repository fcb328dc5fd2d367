//! Write paths: builder-wide mutations and per-entity persistence.
//!
//! # Responsibility
//! - Settle the live builder into INSERT / UPDATE / DELETE statements.
//! - Save, delete and restore single entities through their lifecycle hooks.
//!
//! # Invariants
//! - `delete` on a soft-deleting entity stamps the deletion column instead of
//!   removing rows; `force_delete` always removes rows.
//! - Timestamps are epoch milliseconds in UTC.
//! - Every save failure surfaces as `SaveFailed` with the underlying error as
//!   its cause.

use crate::error::{RepoError, RepoResult};
use crate::model::attributes::Attributes;
use crate::model::entity::{Entity, EntityId};
use crate::query::{render_sql, QueryBuilder, TrashScope};
use crate::repo::repository::{ensure_soft_deletes, Repository};
use chrono::Utc;
use log::{info, warn};
use rusqlite::types::Value;

const CREATED_AT: &str = "created_at";
const UPDATED_AT: &str = "updated_at";

impl<E: Entity> Repository<'_, E> {
    /// Inserts `rows` in one statement. No rows means nothing to do.
    pub fn insert(&mut self, rows: &[Attributes]) -> RepoResult<bool> {
        let builder = self.take_builder();
        if rows.is_empty() {
            return Ok(true);
        }
        self.execute(&builder.compile_insert(rows)?)?;
        Ok(true)
    }

    /// Inserts one row and returns its rowid.
    pub fn insert_get_id(&mut self, values: Attributes) -> RepoResult<EntityId> {
        let builder = self.take_builder();
        self.execute(&builder.compile_insert(&[values])?)?;
        Ok(self.connection().last_insert_rowid())
    }

    /// Updates every row matched by the builder; returns the changed count.
    pub fn update(&mut self, values: Attributes) -> RepoResult<usize> {
        let builder = self.take_builder();
        let values = touch_updated_at::<E>(values);
        self.execute(&builder.compile_update(&values)?)
    }

    /// Deletes matched rows, soft deleting them when the entity supports it.
    pub fn delete(&mut self) -> RepoResult<usize> {
        let builder = self.take_builder();
        self.delete_matching(&builder, false)
    }

    /// Physically deletes matched rows, trashed ones included unless the
    /// builder was scoped to only trashed rows.
    pub fn force_delete(&mut self) -> RepoResult<usize> {
        let mut builder = self.take_builder();
        if builder.trash_scope() == TrashScope::WithoutTrashed {
            builder.with_trashed();
        }
        self.delete_matching(&builder, true)
    }

    pub fn increment(&mut self, column: &str, amount: i64, extra: Attributes) -> RepoResult<usize> {
        let builder = self.take_builder();
        let extra = touch_updated_at::<E>(extra);
        self.execute(&builder.compile_increment(column, amount, &extra)?)
    }

    pub fn decrement(&mut self, column: &str, amount: i64, extra: Attributes) -> RepoResult<usize> {
        self.increment(column, -amount, extra)
    }

    /// Removes every row of the table, trashed or not.
    pub fn truncate(&mut self) -> RepoResult<usize> {
        self.take_builder();
        let compiled = QueryBuilder::new(E::table_name()).compile_delete()?;
        self.execute(&compiled)
    }

    /// SQL of the pending select, with `?` placeholders.
    pub fn to_sql(&mut self) -> RepoResult<String> {
        let builder = self.take_builder();
        Ok(builder.to_sql()?)
    }

    /// SQL of the pending select with bindings inlined.
    pub fn render_sql(&mut self) -> RepoResult<String> {
        let builder = self.take_builder();
        let compiled = builder.compile_select()?;
        Ok(render_sql(&compiled.sql, &compiled.bindings))
    }

    /// Inserts `entity` when it has no id, updates it otherwise, and returns
    /// the stored row.
    ///
    /// # Errors
    /// - `SaveFailed` when the `saving` hook refuses, when an update touches
    ///   no row, or when storage fails; the cause is kept as `source()`.
    #[track_caller]
    pub fn save(&self, entity: &E) -> RepoResult<E> {
        if !entity.saving() {
            warn!(
                "event=entity_save module=repo status=refused table={}",
                E::table_name()
            );
            return Err(RepoError::save_failed(
                format!(
                    "Could not save model [{}]. Reason: Save returned false.",
                    E::table_name()
                ),
                None,
            ));
        }

        match self.persist(entity) {
            Ok(saved) => {
                info!(
                    "event=entity_save module=repo status=ok table={} id={}",
                    E::table_name(),
                    saved.id().unwrap_or_default()
                );
                Ok(saved)
            }
            Err(err) => {
                warn!(
                    "event=entity_save module=repo status=error table={} error={}",
                    E::table_name(),
                    err
                );
                Err(RepoError::save_failed(
                    format!(
                        "Could not save model [{}]. Reason: {err}",
                        E::table_name()
                    ),
                    Some(Box::new(err)),
                ))
            }
        }
    }

    /// Hydrates `attributes` and saves the result.
    #[track_caller]
    pub fn create(&self, attributes: Attributes) -> RepoResult<E> {
        let entity = match self.new_instance(attributes) {
            Ok(entity) => entity,
            Err(err) => {
                return Err(RepoError::save_failed(
                    format!(
                        "Could not save model [{}]. Reason: {err}",
                        E::table_name()
                    ),
                    Some(Box::new(err)),
                ))
            }
        };
        self.save(&entity)
    }

    /// Deletes one stored entity, softly when supported.
    ///
    /// Returns `false` when the entity was never saved, the `deleting` hook
    /// refused, or no row changed.
    pub fn delete_entity(&self, entity: &E) -> RepoResult<bool> {
        let Some(id) = entity.id() else {
            return Ok(false);
        };
        if !entity.deleting() {
            return Ok(false);
        }

        let mut builder = E::new_query();
        builder.where_eq(E::primary_key(), id);
        Ok(self.delete_matching(&builder, false)? > 0)
    }

    /// Physically deletes one entity, trashed or not.
    pub fn force_delete_entity(&self, entity: &E) -> RepoResult<bool> {
        let Some(id) = entity.id() else {
            return Ok(false);
        };
        if !entity.deleting() {
            return Ok(false);
        }

        let mut builder = E::new_query();
        builder.with_trashed().where_eq(E::primary_key(), id);
        Ok(self.delete_matching(&builder, true)? > 0)
    }

    /// Clears the deletion stamp of one trashed entity.
    ///
    /// # Errors
    /// - `ModelNotSoftDeletable` when the entity lacks soft delete.
    pub fn restore_entity(&self, entity: &E) -> RepoResult<bool> {
        ensure_soft_deletes::<E>()?;
        let Some(id) = entity.id() else {
            return Ok(false);
        };
        if !entity.restoring() {
            return Ok(false);
        }

        let mut builder = E::new_query();
        builder.only_trashed().where_eq(E::primary_key(), id);
        let values = touch_updated_at::<E>(
            Attributes::new().set(E::deleted_at_column(), Value::Null),
        );
        Ok(self.execute(&builder.compile_update(&values)?)? > 0)
    }

    fn delete_matching(&self, builder: &QueryBuilder, force: bool) -> RepoResult<usize> {
        if force || !E::soft_deletes() {
            return self.execute(&builder.compile_delete()?);
        }

        let values = touch_updated_at::<E>(
            Attributes::new().set(E::deleted_at_column(), now_millis()),
        );
        self.execute(&builder.compile_update(&values)?)
    }

    fn persist(&self, entity: &E) -> RepoResult<E> {
        let mut attributes = entity.to_attributes();
        attributes.remove(E::primary_key());

        let id = match entity.id() {
            None => {
                if E::timestamps() {
                    let now = now_millis();
                    if matches!(attributes.get(CREATED_AT), None | Some(Value::Null)) {
                        attributes.insert(CREATED_AT, now);
                    }
                    attributes.insert(UPDATED_AT, now);
                }
                self.execute(&E::new_query().compile_insert(&[attributes])?)?;
                self.connection().last_insert_rowid()
            }
            Some(id) => {
                if E::timestamps() {
                    attributes.insert(UPDATED_AT, now_millis());
                }
                if !attributes.is_empty() {
                    let mut builder = E::new_query();
                    builder.with_trashed().where_eq(E::primary_key(), id);
                    if self.execute(&builder.compile_update(&attributes)?)? == 0 {
                        return Err(RepoError::EntityNotFound(format!(
                            "{} with id [{id}] not found",
                            E::table_name()
                        )));
                    }
                }
                id
            }
        };

        let mut builder = E::new_query();
        builder.with_trashed().where_eq(E::primary_key(), id).limit(1);
        self.fetch(&builder)?.into_iter().next().ok_or_else(|| {
            RepoError::EntityNotFound(format!(
                "{} with id [{id}] vanished after save",
                E::table_name()
            ))
        })
    }
}

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

fn touch_updated_at<E: Entity>(mut values: Attributes) -> Attributes {
    if E::timestamps() && !values.contains(UPDATED_AT) {
        values.insert(UPDATED_AT, now_millis());
    }
    values
}
