//! Repository failure taxonomy.
//!
//! # Responsibility
//! - Classify repository failures into stable, typed variants.
//! - Expose a status code and a "report" flag suitable for API mapping and
//!   alerting decisions.
//!
//! # Invariants
//! - `EntityNotFound` is never reported; every other variant is.
//! - `SaveFailed` keeps the originating error reachable through `source()`.

use crate::db::DbError;
use crate::query::QueryError;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::panic::Location;

pub type RepoResult<T> = Result<T, RepoError>;

/// Boxed cause carried by [`SaveFailure`].
pub type BoxedCause = Box<dyn Error + Send + Sync + 'static>;

pub const ENTITY_NOT_FOUND_CODE: u16 = 445;
pub const MODEL_NOT_SOFT_DELETABLE_CODE: u16 = 500;
pub const SAVE_FAILED_CODE: u16 = 550;

/// Generic repository error for query, retrieval and persistence operations.
#[derive(Debug)]
pub enum RepoError {
    /// A required single or multi row lookup produced no match.
    EntityNotFound(String),
    /// A soft-delete scoped operation ran against an entity without soft delete.
    /// Carries the entity table name.
    ModelNotSoftDeletable(&'static str),
    SaveFailed(SaveFailure),
    InvalidArgument(String),
    Db(DbError),
    /// Persisted value could not hydrate the entity.
    InvalidData(String),
}

/// Details of a failed save, including where it was raised.
#[derive(Debug)]
pub struct SaveFailure {
    message: String,
    location: &'static Location<'static>,
    cause: Option<BoxedCause>,
}

impl SaveFailure {
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Source location of the save call that failed.
    pub fn location(&self) -> &'static Location<'static> {
        self.location
    }

    pub fn cause(&self) -> Option<&(dyn Error + Send + Sync + 'static)> {
        self.cause.as_deref()
    }
}

impl RepoError {
    /// Builds a `SaveFailed` error recording the caller location.
    #[track_caller]
    pub fn save_failed(message: impl Into<String>, cause: Option<BoxedCause>) -> Self {
        Self::SaveFailed(SaveFailure {
            message: message.into(),
            location: Location::caller(),
            cause,
        })
    }

    /// Stable numeric status code, when the variant defines one.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::EntityNotFound(_) => Some(ENTITY_NOT_FOUND_CODE),
            Self::ModelNotSoftDeletable(_) => Some(MODEL_NOT_SOFT_DELETABLE_CODE),
            Self::SaveFailed(_) => Some(SAVE_FAILED_CODE),
            Self::InvalidArgument(_) | Self::Db(_) | Self::InvalidData(_) => None,
        }
    }

    /// Short status text paired with [`RepoError::status_code`].
    pub fn status_message(&self) -> &'static str {
        match self {
            Self::EntityNotFound(_) => "Entity not found",
            Self::ModelNotSoftDeletable(_) => "Model does not have soft delete support",
            Self::SaveFailed(_) => "Could not save to database",
            Self::InvalidArgument(_) => "Invalid argument",
            Self::Db(_) => "Database failure",
            Self::InvalidData(_) => "Invalid persisted data",
        }
    }

    /// Whether an operator should be alerted about this failure.
    pub fn should_report(&self) -> bool {
        !matches!(self, Self::EntityNotFound(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::EntityNotFound(_))
    }
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EntityNotFound(message) => write!(f, "{message}"),
            Self::ModelNotSoftDeletable(model) => {
                write!(f, "model [{model}] does not support soft delete")
            }
            Self::SaveFailed(failure) => write!(f, "{}", failure.message),
            Self::InvalidArgument(message) => write!(f, "invalid argument: {message}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::SaveFailed(failure) => failure
                .cause
                .as_deref()
                .map(|cause| cause as &(dyn Error + 'static)),
            Self::Db(err) => Some(err),
            Self::EntityNotFound(_)
            | Self::ModelNotSoftDeletable(_)
            | Self::InvalidArgument(_)
            | Self::InvalidData(_) => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<QueryError> for RepoError {
    fn from(value: QueryError) -> Self {
        Self::InvalidArgument(value.to_string())
    }
}
