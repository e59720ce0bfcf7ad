//! SQLite storage bootstrap, schema migrations and shared query helpers.
//!
//! # Responsibility
//! - Open and configure SQLite connections for the space store.
//! - Apply schema migrations in deterministic order.
//! - Host statement helpers shared by every org-scoped table.
//!
//! # Invariants
//! - Migration version is tracked via `PRAGMA user_version`.
//! - Core code must not read/write application data before migrations succeed.

use std::error::Error;
use std::fmt::{Display, Formatter};

mod constrained;
pub mod migrations;
mod open;
mod schema;

pub use constrained::{delete_constrained, CONSTRAINED_TABLES};
pub use open::{open_db, open_db_in_memory};
pub(crate) use schema::{table_exists, table_has_column};

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
    /// Table name is not registered for org-scoped helper statements.
    UnknownTable(String),
}

impl DbError {
    /// Returns whether the failure is a SQLite constraint violation
    /// (unique, check, not-null or foreign key).
    pub fn is_constraint_violation(&self) -> bool {
        matches!(
            self,
            Self::Sqlite(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation
        )
    }
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::UnsupportedSchemaVersion {
                db_version,
                latest_supported,
            } => write!(
                f,
                "database schema version {db_version} is newer than supported {latest_supported}"
            ),
            Self::UnknownTable(table) => {
                write!(f, "table `{table}` is not registered for org-scoped statements")
            }
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::UnsupportedSchemaVersion { .. } => None,
            Self::UnknownTable(_) => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}
