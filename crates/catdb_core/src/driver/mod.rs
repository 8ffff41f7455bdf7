//! Data-source capability consumed by the façade, plus its SQLite driver.
//!
//! # Responsibility
//! - Define the `Driver` trait: the full set of query surfaces the façade
//!   may call (find, save, count, routines, joins, documents).
//! - Define the typed request descriptors passed through those surfaces.
//! - Provide `SqliteDriver`, the concrete implementation.
//!
//! # Invariants
//! - Identifiers are validated before being spliced into SQL; values are
//!   always bound as parameters.
//! - Drivers never cache rows between calls.

use crate::db::DbError;
use serde_json::{Map, Value};
use std::error::Error;
use std::fmt::{Display, Formatter};

mod decompose;
mod ident;
mod query;
mod sqlite;

pub use decompose::{decompose, Decompose};
pub use ident::validate_identifier;
pub use query::{Condition, Criteria, FindOptions, Join, JoinKind, Op};
pub use sqlite::SqliteDriver;

/// One result row keyed by column name or alias.
pub type Row = Map<String, Value>;

pub type DriverResult<T> = Result<T, DriverError>;

/// Failure surfaced by a driver call.
#[derive(Debug)]
pub enum DriverError {
    Db(DbError),
    InvalidIdentifier(String),
    UnknownColumn { table: String, column: String },
    UnknownRoutine(String),
    InvalidData(String),
    Json(serde_json::Error),
}

impl Display for DriverError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidIdentifier(name) => write!(f, "invalid SQL identifier `{name}`"),
            Self::UnknownColumn { table, column } => {
                write!(f, "unknown column `{column}` on `{table}`")
            }
            Self::UnknownRoutine(name) => write!(f, "unknown routine `{name}`"),
            Self::InvalidData(message) => write!(f, "invalid data: {message}"),
            Self::Json(err) => write!(f, "json mapping failed: {err}"),
        }
    }
}

impl Error for DriverError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Json(err) => Some(err),
            Self::InvalidIdentifier(_)
            | Self::UnknownColumn { .. }
            | Self::UnknownRoutine(_)
            | Self::InvalidData(_) => None,
        }
    }
}

impl From<DbError> for DriverError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for DriverError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<serde_json::Error> for DriverError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

/// Query surface of a relational/document data source.
///
/// The façade holds one implementation and forwards each of its
/// operations to exactly one method here.
pub trait Driver {
    /// Creates or upgrades the backing schema. Idempotent.
    fn bootstrap_schema(&self) -> DriverResult<()>;

    /// Returns rows of `table` matching `criteria`.
    fn find(&self, table: &str, criteria: &Criteria, options: &FindOptions)
        -> DriverResult<Vec<Row>>;

    /// Returns the row of `table` whose primary key equals `id`.
    fn find_one(&self, table: &str, id: i64, options: &FindOptions) -> DriverResult<Option<Row>>;

    /// Counts rows of `table` matching `criteria`.
    fn count(&self, table: &str, criteria: &Criteria) -> DriverResult<u64>;

    /// Returns rows of `table` filtered by a raw condition with positional
    /// parameters (`?1`, `?2`, ...).
    fn where_clause(&self, table: &str, condition: &str, params: &[Value])
        -> DriverResult<Vec<Row>>;

    /// Inserts `row`, or upserts it by primary key when `id` is present.
    /// Returns the persisted row.
    fn save(&self, table: &str, row: Row) -> DriverResult<Row>;

    /// Evaluates a scalar function in the data source.
    fn call_scalar(&self, function: &str, args: &[Value]) -> DriverResult<Value>;

    /// Runs a named table-returning routine, optionally decomposing its rows.
    fn call_routine(
        &self,
        routine: &str,
        args: &[Value],
        decompose: Option<&Decompose>,
    ) -> DriverResult<Vec<Value>>;

    /// Joins `origin` with `joins` and returns flat rows keyed
    /// `relation.column`.
    fn join(&self, origin: &str, joins: &[Join], criteria: &Criteria) -> DriverResult<Vec<Row>>;

    /// Saves a JSON object into a document collection and returns it with
    /// its `id` merged in.
    fn save_doc(&self, collection: &str, document: &Value) -> DriverResult<Value>;

    /// Finds documents whose top-level fields equal every entry of `criteria`.
    fn find_doc(&self, collection: &str, criteria: &Row) -> DriverResult<Vec<Value>>;
}
