//! Repository facade and its builder lifecycle.
//!
//! # Responsibility
//! - Bind one entity type to one borrowed SQLite connection and one live
//!   `QueryBuilder`.
//! - Expose chainable predicate methods and executing (terminal) reads.
//! - Classify retrieval failures into typed `RepoError` variants.
//!
//! # Invariants
//! - Every terminal method swaps in a fresh `E::new_query()` builder before
//!   executing, so the reset also happens when execution fails.
//! - Chainable methods never perform I/O.
//! - A repository is driven through `&mut self`; share one per call chain.

use crate::error::{RepoError, RepoResult};
use crate::model::attributes::{value_to_text, Attributes};
use crate::model::entity::{Entity, EntityId};
use crate::query::{CompiledQuery, Operator, QueryBuilder};
use log::{debug, info};
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection};
use std::collections::HashSet;
use std::marker::PhantomData;
use std::time::Instant;

/// Projection selecting every column.
pub const ALL_COLUMNS: &[&str] = &["*"];

/// Stateful data-access facade for entity type `E`.
pub struct Repository<'conn, E: Entity> {
    conn: &'conn Connection,
    builder: QueryBuilder,
    _entity: PhantomData<fn() -> E>,
}

impl<'conn, E: Entity> Repository<'conn, E> {
    /// Binds `E` to `conn` with a freshly scoped builder.
    pub fn bind(conn: &'conn Connection) -> Self {
        Self {
            conn,
            builder: E::new_query(),
            _entity: PhantomData,
        }
    }

    pub fn connection(&self) -> &'conn Connection {
        self.conn
    }

    pub fn builder(&self) -> &QueryBuilder {
        &self.builder
    }

    pub fn builder_mut(&mut self) -> &mut QueryBuilder {
        &mut self.builder
    }

    pub fn set_builder(&mut self, builder: QueryBuilder) -> &mut Self {
        self.builder = builder;
        self
    }

    pub fn reset_builder(&mut self) -> &mut Self {
        self.builder = E::new_query();
        self
    }

    /// Hands out the live builder and leaves a fresh one in its slot.
    pub(crate) fn take_builder(&mut self) -> QueryBuilder {
        debug!(
            "event=builder_reset module=repo table={}",
            E::table_name()
        );
        std::mem::replace(&mut self.builder, E::new_query())
    }

    pub fn select(&mut self, columns: &[&str]) -> &mut Self {
        self.builder.select(columns);
        self
    }

    pub fn where_eq(&mut self, column: &str, value: impl Into<Value>) -> &mut Self {
        self.builder.where_eq(column, value);
        self
    }

    pub fn where_op(&mut self, column: &str, operator: Operator, value: impl Into<Value>) -> &mut Self {
        self.builder.where_op(column, operator, value);
        self
    }

    pub fn where_in<I, V>(&mut self, column: &str, values: I) -> &mut Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.builder.where_in(column, values);
        self
    }

    pub fn where_not_in<I, V>(&mut self, column: &str, values: I) -> &mut Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.builder.where_not_in(column, values);
        self
    }

    pub fn where_null(&mut self, column: &str) -> &mut Self {
        self.builder.where_null(column);
        self
    }

    pub fn where_not_null(&mut self, column: &str) -> &mut Self {
        self.builder.where_not_null(column);
        self
    }

    pub fn where_group(&mut self, build: impl FnOnce(&mut QueryBuilder)) -> &mut Self {
        self.builder.where_group(build);
        self
    }

    pub fn order_by(&mut self, column: &str, ascending: bool) -> &mut Self {
        self.builder.order_by(column, ascending);
        self
    }

    pub fn limit(&mut self, limit: u64) -> &mut Self {
        self.builder.limit(limit);
        self
    }

    pub fn offset(&mut self, offset: u64) -> &mut Self {
        self.builder.offset(offset);
        self
    }

    /// Eager loads `relations` on the next fetch.
    pub fn with(&mut self, relations: &[&str]) -> &mut Self {
        self.builder.with(relations);
        self
    }

    /// Mutates the live builder without settling it.
    pub fn tap(&mut self, mutate: impl FnOnce(&mut QueryBuilder)) -> &mut Self {
        mutate(&mut self.builder);
        self
    }

    /// Replaces the builder with one that also sees trashed rows.
    ///
    /// Predicates added before this call are discarded.
    pub fn with_trashed(&mut self) -> RepoResult<&mut Self> {
        ensure_soft_deletes::<E>()?;
        let mut builder = E::new_query();
        builder.with_trashed();
        self.builder = builder;
        Ok(self)
    }

    /// Replaces the builder with one that only sees trashed rows.
    ///
    /// Predicates added before this call are discarded.
    pub fn only_trashed(&mut self) -> RepoResult<&mut Self> {
        ensure_soft_deletes::<E>()?;
        let mut builder = E::new_query();
        builder.only_trashed();
        self.builder = builder;
        Ok(self)
    }

    /// Settles the builder through a caller-provided execution.
    pub fn settle_with<T>(
        &mut self,
        execute: impl FnOnce(&Connection, &QueryBuilder) -> RepoResult<T>,
    ) -> RepoResult<T> {
        let builder = self.take_builder();
        execute(self.conn, &builder)
    }

    pub fn first(&mut self, columns: &[&str]) -> RepoResult<Option<E>> {
        let mut builder = self.take_builder();
        apply_columns(&mut builder, columns);
        builder.limit(1);
        Ok(self.fetch(&builder)?.into_iter().next())
    }

    pub fn first_or_fail(&mut self, columns: &[&str]) -> RepoResult<E> {
        self.first(columns)?.ok_or_else(|| {
            RepoError::EntityNotFound(format!(
                "first record for table [{}] not found",
                E::table_name()
            ))
        })
    }

    pub fn get(&mut self, columns: &[&str]) -> RepoResult<Vec<E>> {
        let mut builder = self.take_builder();
        apply_columns(&mut builder, columns);
        self.fetch(&builder)
    }

    /// `where(column = value)` followed by `first`.
    pub fn get_by(
        &mut self,
        column: &str,
        value: impl Into<Value>,
        columns: &[&str],
    ) -> RepoResult<Option<E>> {
        self.builder.where_eq(column, value);
        self.first(columns)
    }

    pub fn get_by_or_fail(
        &mut self,
        column: &str,
        value: impl Into<Value>,
        columns: &[&str],
    ) -> RepoResult<E> {
        let value = value.into();
        let shown = value_to_text(&value);
        self.get_by(column, value, columns)?.ok_or_else(|| {
            RepoError::EntityNotFound(format!(
                "{} not found for column [{column}] with value [{shown}]",
                E::table_name()
            ))
        })
    }

    pub fn get_by_id(&mut self, id: EntityId, columns: &[&str]) -> RepoResult<Option<E>> {
        self.get_by(E::primary_key(), id, columns)
    }

    pub fn get_by_id_or_fail(&mut self, id: EntityId, columns: &[&str]) -> RepoResult<E> {
        self.get_by_or_fail(E::primary_key(), id, columns)
    }

    pub fn get_by_id_with_trashed(
        &mut self,
        id: EntityId,
        columns: &[&str],
    ) -> RepoResult<Option<E>> {
        self.with_trashed()?.get_by_id(id, columns)
    }

    pub fn get_by_id_with_trashed_or_fail(
        &mut self,
        id: EntityId,
        columns: &[&str],
    ) -> RepoResult<E> {
        self.with_trashed()?.get_by_id_or_fail(id, columns)
    }

    /// Looks up one entity by its qualified primary key.
    pub fn find(&mut self, id: EntityId, columns: &[&str]) -> RepoResult<Option<E>> {
        self.get_by(&E::qualified_key_name(), id, columns)
    }

    /// Looks up several entities by primary key. An empty `ids` slice
    /// returns an empty result without querying.
    pub fn find_many(&mut self, ids: &[EntityId], columns: &[&str]) -> RepoResult<Vec<E>> {
        if ids.is_empty() {
            self.take_builder();
            return Ok(Vec::new());
        }

        self.builder
            .where_in(&E::qualified_key_name(), ids.iter().copied());
        self.get(columns)
    }

    pub fn find_or_fail(&mut self, id: EntityId, columns: &[&str]) -> RepoResult<E> {
        self.find(id, columns)?.ok_or_else(|| {
            RepoError::EntityNotFound(format!("{} with id [{id}] not found", E::table_name()))
        })
    }

    /// Fails unless every distinct id in `ids` matched a row.
    pub fn find_many_or_fail(&mut self, ids: &[EntityId], columns: &[&str]) -> RepoResult<Vec<E>> {
        let found = self.find_many(ids, columns)?;
        let distinct = ids.iter().collect::<HashSet<_>>().len();
        if found.len() == distinct {
            return Ok(found);
        }

        Err(RepoError::EntityNotFound(format!(
            "{} matched {} of {distinct} requested ids",
            E::table_name(),
            found.len()
        )))
    }

    /// Hydrates an entity without persisting it.
    pub fn new_instance(&self, attributes: Attributes) -> RepoResult<E> {
        E::from_attributes(attributes)
    }

    pub fn begin_transaction(&self) -> RepoResult<()> {
        self.run_transaction_statement("BEGIN;", "begin")
    }

    pub fn commit_transaction(&self) -> RepoResult<()> {
        self.run_transaction_statement("COMMIT;", "commit")
    }

    pub fn rollback_transaction(&self) -> RepoResult<()> {
        self.run_transaction_statement("ROLLBACK;", "rollback")
    }

    fn run_transaction_statement(&self, sql: &str, step: &str) -> RepoResult<()> {
        self.conn.execute_batch(sql)?;
        info!(
            "event=transaction module=repo status=ok step={} table={}",
            step,
            E::table_name()
        );
        Ok(())
    }

    /// Runs a compiled select and hydrates entities, then eager loads.
    pub(crate) fn fetch(&self, builder: &QueryBuilder) -> RepoResult<Vec<E>> {
        let rows = self.fetch_rows(&builder.compile_select()?)?;
        let mut models = rows
            .into_iter()
            .map(E::from_attributes)
            .collect::<RepoResult<Vec<_>>>()?;

        if !builder.eager_loads().is_empty() {
            E::load_relations(self.conn, &mut models, builder.eager_loads())?;
        }
        Ok(models)
    }

    pub(crate) fn fetch_rows(&self, compiled: &CompiledQuery) -> RepoResult<Vec<Attributes>> {
        let started_at = Instant::now();
        let mut stmt = self.conn.prepare(&compiled.sql)?;
        let names: Vec<String> = stmt
            .column_names()
            .into_iter()
            .map(str::to_string)
            .collect();

        let mut rows = stmt.query(params_from_iter(compiled.bindings.iter()))?;
        let mut fetched = Vec::new();
        while let Some(row) = rows.next()? {
            let mut attributes = Attributes::new();
            for (index, name) in names.iter().enumerate() {
                attributes.insert(name.clone(), row.get::<_, Value>(index)?);
            }
            fetched.push(attributes);
        }

        debug!(
            "event=query_execute module=repo status=ok kind=select table={} rows={} duration_ms={}",
            E::table_name(),
            fetched.len(),
            started_at.elapsed().as_millis()
        );
        Ok(fetched)
    }

    /// Values of the first column of every row.
    pub(crate) fn fetch_first_column(&self, compiled: &CompiledQuery) -> RepoResult<Vec<Value>> {
        let mut stmt = self.conn.prepare(&compiled.sql)?;
        let mut rows = stmt.query(params_from_iter(compiled.bindings.iter()))?;
        let mut values = Vec::new();
        while let Some(row) = rows.next()? {
            values.push(row.get::<_, Value>(0)?);
        }
        Ok(values)
    }

    pub(crate) fn query_scalar(&self, compiled: &CompiledQuery) -> RepoResult<Value> {
        let value = self.conn.query_row(
            &compiled.sql,
            params_from_iter(compiled.bindings.iter()),
            |row| row.get::<_, Value>(0),
        )?;
        Ok(value)
    }

    pub(crate) fn execute(&self, compiled: &CompiledQuery) -> RepoResult<usize> {
        let started_at = Instant::now();
        let changed = self
            .conn
            .execute(&compiled.sql, params_from_iter(compiled.bindings.iter()))?;
        debug!(
            "event=query_execute module=repo status=ok kind=write table={} changed={} duration_ms={}",
            E::table_name(),
            changed,
            started_at.elapsed().as_millis()
        );
        Ok(changed)
    }
}

pub(crate) fn ensure_soft_deletes<E: Entity>() -> RepoResult<()> {
    if E::soft_deletes() {
        return Ok(());
    }
    Err(RepoError::ModelNotSoftDeletable(E::table_name()))
}

/// Applies a projection unless it asks for every column, which keeps an
/// earlier `select` intact.
pub(crate) fn apply_columns(builder: &mut QueryBuilder, columns: &[&str]) {
    if columns.is_empty() || columns == ALL_COLUMNS {
        return;
    }
    builder.select(columns);
}
