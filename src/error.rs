//! Error types for the adapter.
//!
//! This module defines the adapter error using `thiserror`. Driver failures
//! pass through the transparent variants unchanged; the adapter adds only the
//! no-rows sentinel and SQLSTATE extraction on top.

use thiserror::Error;

/// Code reported by [`AdapterError::code`] when the underlying error does not
/// carry a SQLSTATE.
pub const UNKNOWN_SQL_STATE: &str = "unknown";

#[derive(Error, Debug)]
pub enum AdapterError {
    /// The query succeeded but produced no rows.
    ///
    /// Returned by `query_row` when the result set is empty. Detect it with
    /// [`AdapterError::is_no_rows`] instead of treating it as a failure.
    #[error("query returned no rows")]
    NoRows,

    /// A failure from the sqlx driver, surfaced verbatim.
    #[cfg(feature = "backend-sqlx")]
    #[error(transparent)]
    Sqlx(sqlx::Error),

    /// A failure from the tokio-postgres driver, surfaced verbatim.
    #[cfg(feature = "backend-tokio")]
    #[error(transparent)]
    Postgres(tokio_postgres::Error),

    /// A failure checking a connection out of the deadpool pool.
    #[cfg(feature = "backend-tokio")]
    #[error(transparent)]
    Pool(#[from] deadpool_postgres::PoolError),

    /// Pool construction or settings validation failed before any driver
    /// error value existed.
    #[error("connection failed: {0}")]
    Connection(String),

    /// Operation attempted on a transaction that already terminated.
    ///
    /// Commit and rollback consume the transaction, so this cannot be reached
    /// through the public API.
    #[error("transaction already terminated")]
    TransactionClosed,
}

impl AdapterError {
    /// True for the no-rows sentinel.
    pub fn is_no_rows(&self) -> bool {
        matches!(self, Self::NoRows)
    }

    /// SQLSTATE of the wrapped driver error, if it carries one.
    pub fn sql_state(&self) -> Option<String> {
        match self {
            #[cfg(feature = "backend-sqlx")]
            Self::Sqlx(err) => err
                .as_database_error()
                .and_then(|db| db.code())
                .map(|code| code.into_owned()),
            #[cfg(feature = "backend-tokio")]
            Self::Postgres(err) => err.as_db_error().map(|db| db.code().code().to_string()),
            #[cfg(feature = "backend-tokio")]
            Self::Pool(deadpool_postgres::PoolError::Backend(err)) => {
                err.as_db_error().map(|db| db.code().code().to_string())
            }
            _ => None,
        }
    }

    /// SQLSTATE of the wrapped driver error, or [`UNKNOWN_SQL_STATE`] when
    /// the error does not expose one. Never fails.
    pub fn code(&self) -> String {
        self.sql_state()
            .unwrap_or_else(|| UNKNOWN_SQL_STATE.to_string())
    }
}

#[cfg(feature = "backend-sqlx")]
impl From<sqlx::Error> for AdapterError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => AdapterError::NoRows,
            other => AdapterError::Sqlx(other),
        }
    }
}

#[cfg(feature = "backend-tokio")]
impl From<tokio_postgres::Error> for AdapterError {
    fn from(err: tokio_postgres::Error) -> Self {
        AdapterError::Postgres(err)
    }
}

/// Result type alias for adapter operations.
pub type AdapterResult<T> = Result<T, AdapterError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_rows_sentinel() {
        let err = AdapterError::NoRows;
        assert!(err.is_no_rows());
        assert!(!AdapterError::Connection("refused".to_string()).is_no_rows());
    }

    #[test]
    fn test_no_rows_display() {
        assert!(AdapterError::NoRows.to_string().contains("no rows"));
    }

    #[test]
    fn test_code_falls_back_to_unknown() {
        assert_eq!(AdapterError::NoRows.code(), UNKNOWN_SQL_STATE);
        assert_eq!(
            AdapterError::Connection("refused".to_string()).code(),
            UNKNOWN_SQL_STATE
        );
    }

    #[test]
    fn test_sql_state_absent_for_adapter_errors() {
        assert_eq!(AdapterError::TransactionClosed.sql_state(), None);
    }

    #[cfg(feature = "backend-sqlx")]
    #[test]
    fn test_row_not_found_maps_to_sentinel() {
        let err: AdapterError = sqlx::Error::RowNotFound.into();
        assert!(err.is_no_rows());
    }

    #[cfg(feature = "backend-sqlx")]
    #[test]
    fn test_io_error_passes_through_without_code() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset");
        let err: AdapterError = sqlx::Error::Io(io).into();
        assert!(!err.is_no_rows());
        assert_eq!(err.code(), UNKNOWN_SQL_STATE);
    }
}
