//! Fluent SQL builder scoped to one table.
//!
//! # Responsibility
//! - Accumulate projections, predicates, ordering, paging and eager-load
//!   names through chained `&mut self` calls.
//! - Compile to `(sql, bindings)` for SQLite with `?` placeholders.
//!
//! # Invariants
//! - Every identifier is validated at compile time; values are always bound.
//! - The soft-delete scope is applied to every read and write statement.
//!
//! ```ignore
//! let mut builder = QueryBuilder::new("comments");
//! builder
//!     .where_eq("commentable_type", "posts".to_string())
//!     .order_by("id", true)
//!     .limit(10);
//! let compiled = builder.compile_select()?;
//! ```

use crate::model::attributes::Attributes;
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::types::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};

static IDENTIFIER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)?$").expect("valid identifier regex")
});
static STAR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-Za-z_][A-Za-z0-9_]*\.)?\*$").expect("valid star regex"));

/// Comparison operator for `where_op`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    NotEq,
    Lt,
    Lte,
    Gt,
    Gte,
    Like,
    NotLike,
}

impl Operator {
    fn as_sql(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::NotEq => "!=",
            Self::Lt => "<",
            Self::Lte => "<=",
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::Like => "LIKE",
            Self::NotLike => "NOT LIKE",
        }
    }
}

/// Which rows a soft-deleting builder sees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrashScope {
    #[default]
    WithoutTrashed,
    WithTrashed,
    OnlyTrashed,
}

/// Aggregate function for `compile_aggregate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregate {
    Count,
    Min,
    Max,
    Sum,
    Avg,
}

impl Aggregate {
    fn as_sql(self) -> &'static str {
        match self {
            Self::Count => "COUNT",
            Self::Min => "MIN",
            Self::Max => "MAX",
            Self::Sum => "SUM",
            Self::Avg => "AVG",
        }
    }
}

/// SQL text plus positional bindings.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    pub sql: String,
    pub bindings: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq)]
enum Condition {
    Compare {
        column: String,
        operator: Operator,
        value: Value,
    },
    In {
        column: String,
        values: Vec<Value>,
        negated: bool,
    },
    Null {
        column: String,
        negated: bool,
    },
    Group(Vec<Condition>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryBuilder {
    table: String,
    columns: Vec<String>,
    conditions: Vec<Condition>,
    order: Vec<(String, bool)>,
    limit_val: Option<u64>,
    offset_val: Option<u64>,
    eager_loads: Vec<String>,
    soft_delete_column: Option<String>,
    trash_scope: TrashScope,
}

impl QueryBuilder {
    pub fn new(table: &str) -> Self {
        Self {
            table: table.to_string(),
            columns: Vec::new(),
            conditions: Vec::new(),
            order: Vec::new(),
            limit_val: None,
            offset_val: None,
            eager_loads: Vec::new(),
            soft_delete_column: None,
            trash_scope: TrashScope::default(),
        }
    }

    /// Enables soft-delete scoping on `column`, hiding trashed rows.
    pub fn soft_deletes(&mut self, column: &str) -> &mut Self {
        self.soft_delete_column = Some(column.to_string());
        self.trash_scope = TrashScope::WithoutTrashed;
        self
    }

    pub fn with_trashed(&mut self) -> &mut Self {
        self.trash_scope = TrashScope::WithTrashed;
        self
    }

    pub fn only_trashed(&mut self) -> &mut Self {
        self.trash_scope = TrashScope::OnlyTrashed;
        self
    }

    /// Replaces the projection. `["*"]` or an empty slice selects all columns.
    pub fn select(&mut self, columns: &[&str]) -> &mut Self {
        self.columns = columns
            .iter()
            .filter(|column| **column != "*")
            .map(|column| column.to_string())
            .collect();
        self
    }

    pub fn where_eq(&mut self, column: &str, value: impl Into<Value>) -> &mut Self {
        self.where_op(column, Operator::Eq, value)
    }

    pub fn where_op(&mut self, column: &str, operator: Operator, value: impl Into<Value>) -> &mut Self {
        self.conditions.push(Condition::Compare {
            column: column.to_string(),
            operator,
            value: value.into(),
        });
        self
    }

    pub fn where_in<I, V>(&mut self, column: &str, values: I) -> &mut Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.push_in(column, values, false)
    }

    pub fn where_not_in<I, V>(&mut self, column: &str, values: I) -> &mut Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.push_in(column, values, true)
    }

    pub fn where_null(&mut self, column: &str) -> &mut Self {
        self.conditions.push(Condition::Null {
            column: column.to_string(),
            negated: false,
        });
        self
    }

    pub fn where_not_null(&mut self, column: &str) -> &mut Self {
        self.conditions.push(Condition::Null {
            column: column.to_string(),
            negated: true,
        });
        self
    }

    /// Adds a parenthesized group of predicates built by `build`.
    pub fn where_group(&mut self, build: impl FnOnce(&mut QueryBuilder)) -> &mut Self {
        let mut nested = QueryBuilder::new(&self.table);
        build(&mut nested);
        if !nested.conditions.is_empty() {
            self.conditions.push(Condition::Group(nested.conditions));
        }
        self
    }

    pub fn order_by(&mut self, column: &str, ascending: bool) -> &mut Self {
        self.order.push((column.to_string(), ascending));
        self
    }

    pub fn limit(&mut self, limit: u64) -> &mut Self {
        self.limit_val = Some(limit);
        self
    }

    pub fn offset(&mut self, offset: u64) -> &mut Self {
        self.offset_val = Some(offset);
        self
    }

    /// Records relations to eager load after the next fetch.
    pub fn with(&mut self, relations: &[&str]) -> &mut Self {
        for relation in relations {
            if !self.eager_loads.iter().any(|known| known == relation) {
                self.eager_loads.push(relation.to_string());
            }
        }
        self
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn eager_loads(&self) -> &[String] {
        &self.eager_loads
    }

    pub fn trash_scope(&self) -> TrashScope {
        self.trash_scope
    }

    pub fn soft_delete_column(&self) -> Option<&str> {
        self.soft_delete_column.as_deref()
    }

    pub fn has_order(&self) -> bool {
        !self.order.is_empty()
    }

    pub fn compile_select(&self) -> Result<CompiledQuery, QueryError> {
        let columns = if self.columns.is_empty() {
            "*".to_string()
        } else {
            let mut formatted = Vec::with_capacity(self.columns.len());
            for column in &self.columns {
                formatted.push(checked_identifier(column, true, "column")?);
            }
            formatted.join(", ")
        };

        let mut sql = format!("SELECT {columns} FROM {}", self.checked_table()?);
        let mut bindings = Vec::new();
        self.append_where(&mut sql, &mut bindings)?;
        self.append_order(&mut sql)?;
        self.append_limit_offset(&mut sql);
        Ok(CompiledQuery { sql, bindings })
    }

    /// `SELECT <fn>(<column>) AS aggregate`, ignoring order and paging.
    pub fn compile_aggregate(
        &self,
        function: Aggregate,
        column: &str,
    ) -> Result<CompiledQuery, QueryError> {
        let allow_star = function == Aggregate::Count;
        let column = checked_identifier(column, allow_star, "column")?;
        let mut sql = format!(
            "SELECT {}({column}) AS aggregate FROM {}",
            function.as_sql(),
            self.checked_table()?
        );
        let mut bindings = Vec::new();
        self.append_where(&mut sql, &mut bindings)?;
        Ok(CompiledQuery { sql, bindings })
    }

    pub fn compile_exists(&self) -> Result<CompiledQuery, QueryError> {
        let mut inner = format!("SELECT 1 FROM {}", self.checked_table()?);
        let mut bindings = Vec::new();
        self.append_where(&mut inner, &mut bindings)?;
        Ok(CompiledQuery {
            sql: format!("SELECT EXISTS({inner})"),
            bindings,
        })
    }

    /// Multi-row insert. Every row must carry the same column set; a single
    /// empty row inserts defaults.
    pub fn compile_insert(&self, rows: &[Attributes]) -> Result<CompiledQuery, QueryError> {
        let Some(first) = rows.first() else {
            return Err(QueryError::EmptyInsert);
        };
        let columns: Vec<&str> = first.columns().collect();
        if columns.is_empty() {
            if rows.len() == 1 {
                return Ok(CompiledQuery {
                    sql: format!("INSERT INTO {} DEFAULT VALUES", self.checked_table()?),
                    bindings: Vec::new(),
                });
            }
            return Err(QueryError::EmptyInsert);
        }

        let mut formatted = Vec::with_capacity(columns.len());
        for column in &columns {
            formatted.push(checked_identifier(column, false, "column")?);
        }

        let placeholders = format!("({})", vec!["?"; columns.len()].join(", "));
        let mut bindings = Vec::with_capacity(columns.len() * rows.len());
        for (index, row) in rows.iter().enumerate() {
            if !row.columns().eq(columns.iter().copied()) {
                return Err(QueryError::MismatchedInsertRow { row: index });
            }
            bindings.extend(row.iter().map(|(_, value)| value.clone()));
        }

        let sql = format!(
            "INSERT INTO {} ({}) VALUES {}",
            self.checked_table()?,
            formatted.join(", "),
            vec![placeholders; rows.len()].join(", ")
        );
        Ok(CompiledQuery { sql, bindings })
    }

    pub fn compile_update(&self, values: &Attributes) -> Result<CompiledQuery, QueryError> {
        if values.is_empty() {
            return Err(QueryError::EmptyUpdate);
        }

        let mut assignments = Vec::with_capacity(values.len());
        let mut bindings = Vec::with_capacity(values.len());
        for (column, value) in values.iter() {
            assignments.push(format!("{} = ?", checked_identifier(column, false, "column")?));
            bindings.push(value.clone());
        }

        let mut sql = format!(
            "UPDATE {} SET {}",
            self.checked_table()?,
            assignments.join(", ")
        );
        self.append_where(&mut sql, &mut bindings)?;
        Ok(CompiledQuery { sql, bindings })
    }

    /// `UPDATE .. SET column = column + amount` plus optional extra columns.
    pub fn compile_increment(
        &self,
        column: &str,
        amount: i64,
        extra: &Attributes,
    ) -> Result<CompiledQuery, QueryError> {
        let column = checked_identifier(column, false, "column")?;
        let mut assignments = vec![format!("{column} = {column} + ?")];
        let mut bindings = vec![Value::Integer(amount)];
        for (extra_column, value) in extra.iter() {
            assignments.push(format!(
                "{} = ?",
                checked_identifier(extra_column, false, "column")?
            ));
            bindings.push(value.clone());
        }

        let mut sql = format!(
            "UPDATE {} SET {}",
            self.checked_table()?,
            assignments.join(", ")
        );
        self.append_where(&mut sql, &mut bindings)?;
        Ok(CompiledQuery { sql, bindings })
    }

    pub fn compile_delete(&self) -> Result<CompiledQuery, QueryError> {
        let mut sql = format!("DELETE FROM {}", self.checked_table()?);
        let mut bindings = Vec::new();
        self.append_where(&mut sql, &mut bindings)?;
        Ok(CompiledQuery { sql, bindings })
    }

    pub fn to_sql(&self) -> Result<String, QueryError> {
        Ok(self.compile_select()?.sql)
    }

    pub fn bindings(&self) -> Result<Vec<Value>, QueryError> {
        Ok(self.compile_select()?.bindings)
    }

    fn push_in<I, V>(&mut self, column: &str, values: I, negated: bool) -> &mut Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.conditions.push(Condition::In {
            column: column.to_string(),
            values: values.into_iter().map(Into::into).collect(),
            negated,
        });
        self
    }

    fn checked_table(&self) -> Result<String, QueryError> {
        checked_identifier(&self.table, false, "table")
    }

    fn scope_condition(&self) -> Option<Condition> {
        let column = self.soft_delete_column.as_ref()?;
        match self.trash_scope {
            TrashScope::WithTrashed => None,
            TrashScope::WithoutTrashed => Some(Condition::Null {
                column: column.clone(),
                negated: false,
            }),
            TrashScope::OnlyTrashed => Some(Condition::Null {
                column: column.clone(),
                negated: true,
            }),
        }
    }

    fn append_where(&self, sql: &mut String, bindings: &mut Vec<Value>) -> Result<(), QueryError> {
        let scope = self.scope_condition();
        let mut fragments = Vec::with_capacity(self.conditions.len() + 1);
        for condition in self.conditions.iter().chain(scope.iter()) {
            fragments.push(compile_condition(condition, bindings)?);
        }

        if !fragments.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&fragments.join(" AND "));
        }
        Ok(())
    }

    fn append_order(&self, sql: &mut String) -> Result<(), QueryError> {
        if self.order.is_empty() {
            return Ok(());
        }

        let mut clauses = Vec::with_capacity(self.order.len());
        for (column, ascending) in &self.order {
            let column = checked_identifier(column, false, "column")?;
            let direction = if *ascending { "ASC" } else { "DESC" };
            clauses.push(format!("{column} {direction}"));
        }
        sql.push_str(" ORDER BY ");
        sql.push_str(&clauses.join(", "));
        Ok(())
    }

    fn append_limit_offset(&self, sql: &mut String) {
        match (self.limit_val, self.offset_val) {
            (Some(limit), Some(offset)) => sql.push_str(&format!(" LIMIT {limit} OFFSET {offset}")),
            (Some(limit), None) => sql.push_str(&format!(" LIMIT {limit}")),
            // SQLite requires LIMIT before OFFSET
            (None, Some(offset)) => sql.push_str(&format!(" LIMIT -1 OFFSET {offset}")),
            (None, None) => {}
        }
    }
}

fn compile_condition(condition: &Condition, bindings: &mut Vec<Value>) -> Result<String, QueryError> {
    match condition {
        Condition::Compare {
            column,
            operator,
            value,
        } => {
            let column = checked_identifier(column, false, "column")?;
            // `= NULL` never matches in SQL
            match (operator, value) {
                (Operator::Eq, Value::Null) => Ok(format!("{column} IS NULL")),
                (Operator::NotEq, Value::Null) => Ok(format!("{column} IS NOT NULL")),
                _ => {
                    bindings.push(value.clone());
                    Ok(format!("{column} {} ?", operator.as_sql()))
                }
            }
        }
        Condition::In {
            column,
            values,
            negated,
        } => {
            let column = checked_identifier(column, false, "column")?;
            if values.is_empty() {
                return Ok(if *negated { "1 = 1" } else { "0 = 1" }.to_string());
            }
            bindings.extend(values.iter().cloned());
            let keyword = if *negated { "NOT IN" } else { "IN" };
            Ok(format!(
                "{column} {keyword} ({})",
                vec!["?"; values.len()].join(", ")
            ))
        }
        Condition::Null { column, negated } => {
            let column = checked_identifier(column, false, "column")?;
            let keyword = if *negated { "IS NOT NULL" } else { "IS NULL" };
            Ok(format!("{column} {keyword}"))
        }
        Condition::Group(conditions) => {
            let mut fragments = Vec::with_capacity(conditions.len());
            for nested in conditions {
                fragments.push(compile_condition(nested, bindings)?);
            }
            Ok(format!("({})", fragments.join(" AND ")))
        }
    }
}

fn checked_identifier(ident: &str, allow_star: bool, kind: &'static str) -> Result<String, QueryError> {
    if IDENTIFIER_RE.is_match(ident) || (allow_star && STAR_RE.is_match(ident)) {
        return Ok(ident.to_string());
    }
    Err(QueryError::InvalidIdentifier {
        kind,
        ident: ident.to_string(),
    })
}

/// Statement shape errors detected before any SQL runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    InvalidIdentifier { kind: &'static str, ident: String },
    EmptyInsert,
    EmptyUpdate,
    /// Row at `row` does not share the first row's column set.
    MismatchedInsertRow { row: usize },
}

impl Display for QueryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidIdentifier { kind, ident } => write!(f, "invalid {kind} identifier `{ident}`"),
            Self::EmptyInsert => write!(f, "insert requires at least one row with columns"),
            Self::EmptyUpdate => write!(f, "update requires at least one column"),
            Self::MismatchedInsertRow { row } => {
                write!(f, "insert row {row} does not match the columns of row 0")
            }
        }
    }
}

impl Error for QueryError {}
