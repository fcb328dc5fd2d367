//! Terminal aggregate, projection and paging reads.
//!
//! Every method here settles the builder: it is swapped for a fresh one
//! before the statement runs.

use crate::error::{RepoError, RepoResult};
use crate::model::attributes::value_to_text;
use crate::model::entity::Entity;
use crate::query::{Aggregate, QueryBuilder};
use crate::repo::pagination::{Page, SimplePage};
use crate::repo::repository::{apply_columns, Repository};
use rusqlite::types::Value;

const SQL_INT_MAX: u64 = i64::MAX as u64;

impl<E: Entity> Repository<'_, E> {
    pub fn count(&mut self) -> RepoResult<u64> {
        let builder = self.take_builder();
        self.count_rows(&builder)
    }

    /// Row count ignoring order, limit and offset.
    pub fn count_for_pagination(&mut self) -> RepoResult<u64> {
        self.count()
    }

    pub fn exists(&mut self) -> RepoResult<bool> {
        let builder = self.take_builder();
        let value = self.query_scalar(&builder.compile_exists()?)?;
        Ok(matches!(value, Value::Integer(flag) if flag != 0))
    }

    /// First row's `column`, or `None` when nothing matches.
    pub fn value(&mut self, column: &str) -> RepoResult<Option<Value>> {
        let mut builder = self.take_builder();
        builder.select(&[column]).limit(1);
        Ok(self
            .fetch_first_column(&builder.compile_select()?)?
            .into_iter()
            .next())
    }

    pub fn pluck(&mut self, column: &str) -> RepoResult<Vec<Value>> {
        let mut builder = self.take_builder();
        builder.select(&[column]);
        self.fetch_first_column(&builder.compile_select()?)
    }

    /// Joins the text form of `column` across rows with `glue`.
    pub fn implode(&mut self, column: &str, glue: &str) -> RepoResult<String> {
        let values = self.pluck(column)?;
        Ok(values
            .iter()
            .map(value_to_text)
            .collect::<Vec<_>>()
            .join(glue))
    }

    pub fn aggregate(&mut self, function: Aggregate, column: &str) -> RepoResult<Value> {
        let builder = self.take_builder();
        self.query_scalar(&builder.compile_aggregate(function, column)?)
    }

    pub fn min(&mut self, column: &str) -> RepoResult<Value> {
        self.aggregate(Aggregate::Min, column)
    }

    pub fn max(&mut self, column: &str) -> RepoResult<Value> {
        self.aggregate(Aggregate::Max, column)
    }

    /// Sum of `column` as stored: integer for integer columns, real
    /// otherwise. `0` when no row matches.
    pub fn sum(&mut self, column: &str) -> RepoResult<Value> {
        match self.aggregate(Aggregate::Sum, column)? {
            Value::Null => Ok(Value::Integer(0)),
            value @ (Value::Integer(_) | Value::Real(_)) => Ok(value),
            other => Err(RepoError::InvalidData(format!(
                "aggregate over `{column}` returned non-numeric {:?}",
                other.data_type()
            ))),
        }
    }

    pub fn avg(&mut self, column: &str) -> RepoResult<Option<f64>> {
        let value = self.aggregate(Aggregate::Avg, column)?;
        numeric(value, column)
    }

    pub fn average(&mut self, column: &str) -> RepoResult<Option<f64>> {
        self.avg(column)
    }

    /// Length-aware page. `page` is 1-based; `0` is treated as `1`.
    pub fn paginate(&mut self, per_page: u64, page: u64, columns: &[&str]) -> RepoResult<Page<E>> {
        let mut builder = self.take_builder();
        let page = page.max(1);
        let (limit, offset) = page_window(per_page, page, 0)?;

        let total = self.count_rows(&builder)?;
        let items = if total == 0 {
            Vec::new()
        } else {
            apply_columns(&mut builder, columns);
            builder.limit(limit).offset(offset);
            self.fetch(&builder)?
        };
        Ok(Page::new(items, page, per_page, total))
    }

    /// Page without a total count; fetches one extra row to detect more.
    pub fn simple_paginate(
        &mut self,
        per_page: u64,
        page: u64,
        columns: &[&str],
    ) -> RepoResult<SimplePage<E>> {
        let mut builder = self.take_builder();
        let page = page.max(1);
        let (limit, offset) = page_window(per_page, page, 1)?;

        apply_columns(&mut builder, columns);
        builder.limit(limit).offset(offset);
        let mut items = self.fetch(&builder)?;
        let has_more = items.len() as u64 > per_page;
        items.truncate(per_page as usize);
        Ok(SimplePage {
            items,
            page,
            per_page,
            has_more,
        })
    }

    /// Feeds results to `callback` in chunks of `count` rows, ordered by the
    /// primary key unless an order is already set.
    ///
    /// Returns `false` when `callback` stopped the iteration early.
    pub fn chunk(
        &mut self,
        count: u64,
        mut callback: impl FnMut(Vec<E>) -> bool,
    ) -> RepoResult<bool> {
        let mut builder = self.take_builder();
        ensure_page_size(count)?;
        if !builder.has_order() {
            builder.order_by(E::primary_key(), true);
        }

        let mut page = 1;
        loop {
            let (limit, offset) = page_window(count, page, 0)?;
            let mut page_builder: QueryBuilder = builder.clone();
            page_builder.limit(limit).offset(offset);
            let models = self.fetch(&page_builder)?;
            let fetched = models.len() as u64;
            if fetched == 0 {
                break;
            }
            if !callback(models) {
                return Ok(false);
            }
            if fetched < count {
                break;
            }
            page += 1;
        }
        Ok(true)
    }

    /// Visits entities one by one, fetched in chunks of `count`.
    pub fn each(&mut self, count: u64, mut callback: impl FnMut(E) -> bool) -> RepoResult<bool> {
        self.chunk(count, |models| {
            for model in models {
                if !callback(model) {
                    return false;
                }
            }
            true
        })
    }

    fn count_rows(&self, builder: &QueryBuilder) -> RepoResult<u64> {
        let value = self.query_scalar(&builder.compile_aggregate(Aggregate::Count, "*")?)?;
        match value {
            Value::Integer(count) => Ok(u64::try_from(count).unwrap_or(0)),
            other => Err(RepoError::InvalidData(format!(
                "count returned non-integer {:?}",
                other.data_type()
            ))),
        }
    }
}

fn ensure_page_size(per_page: u64) -> RepoResult<()> {
    if per_page == 0 {
        return Err(RepoError::InvalidArgument(
            "page size must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

/// `(limit, offset)` for 1-based `page`, fetching `extra` rows past the page.
///
/// Both values must fit SQLite's signed 64-bit `LIMIT` / `OFFSET`.
fn page_window(per_page: u64, page: u64, extra: u64) -> RepoResult<(u64, u64)> {
    ensure_page_size(per_page)?;
    let limit = per_page.checked_add(extra);
    let offset = page
        .checked_sub(1)
        .and_then(|skipped| skipped.checked_mul(per_page));

    match (limit, offset) {
        (Some(limit), Some(offset)) if limit <= SQL_INT_MAX && offset <= SQL_INT_MAX => {
            Ok((limit, offset))
        }
        _ => Err(RepoError::InvalidArgument(format!(
            "page {page} with {per_page} rows per page is out of range"
        ))),
    }
}

fn numeric(value: Value, column: &str) -> RepoResult<Option<f64>> {
    match value {
        Value::Null => Ok(None),
        Value::Integer(value) => Ok(Some(value as f64)),
        Value::Real(value) => Ok(Some(value)),
        other => Err(RepoError::InvalidData(format!(
            "aggregate over `{column}` returned non-numeric {:?}",
            other.data_type()
        ))),
    }
}
