//! PostgreSQL backends.
//!
//! Two backends implement the same capability set against different driver
//! stacks, selected by cargo feature:
//! - `backend-sqlx` (default): a sqlx `PgPool`
//! - `backend-tokio`: tokio-postgres clients pooled by deadpool-postgres
//!
//! Logic that does not touch a driver (transaction-mode rendering, the pool
//! status shape) lives here and is shared by both.

#[cfg(feature = "backend-tokio")]
pub mod postgres_native;
#[cfg(feature = "backend-sqlx")]
pub mod postgres_sqlx;

#[cfg(feature = "backend-tokio")]
pub use postgres_native::NativePostgres;
#[cfg(feature = "backend-sqlx")]
pub use postgres_sqlx::SqlxPostgres;

use crate::adapter::TxOptions;

/// Pool usage snapshot, for leak checks and monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStatus {
    /// Connections currently open, in use or idle.
    pub size: u32,
    /// Connections sitting idle in the pool.
    pub idle: u32,
}

impl PoolStatus {
    /// True when every open connection is idle in the pool.
    pub fn all_idle(&self) -> bool {
        self.size == self.idle
    }
}

/// Render the transaction mode clauses for `BEGIN` / `SET TRANSACTION`.
///
/// The isolation level string is embedded verbatim; the server rejects
/// values it does not recognize.
pub(crate) fn transaction_modes(options: &TxOptions) -> Option<String> {
    let mut modes = Vec::new();
    if let Some(level) = &options.isolation {
        modes.push(format!("ISOLATION LEVEL {level}"));
    }
    if options.read_only {
        modes.push("READ ONLY".to_string());
    }
    if modes.is_empty() {
        None
    } else {
        Some(modes.join(", "))
    }
}

/// Open a pool on the default backend with default settings.
///
/// With `backend-sqlx` enabled this is the sqlx adapter; a build with only
/// `backend-tokio` gets the native adapter instead.
#[cfg(feature = "backend-sqlx")]
pub async fn connect(dsn: &str) -> crate::error::AdapterResult<SqlxPostgres> {
    SqlxPostgres::connect(dsn).await
}

#[cfg(all(feature = "backend-tokio", not(feature = "backend-sqlx")))]
pub async fn connect(dsn: &str) -> crate::error::AdapterResult<NativePostgres> {
    NativePostgres::connect(dsn).await
}

/// Open a pool on the default backend, terminating the process on failure.
/// Bootstrap code paths only.
#[cfg(feature = "backend-sqlx")]
pub async fn must_connect(dsn: &str) -> SqlxPostgres {
    SqlxPostgres::must_connect(dsn).await
}

#[cfg(all(feature = "backend-tokio", not(feature = "backend-sqlx")))]
pub async fn must_connect(dsn: &str) -> NativePostgres {
    NativePostgres::must_connect(dsn).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transaction_modes_empty() {
        assert_eq!(transaction_modes(&TxOptions::new()), None);
    }

    #[test]
    fn test_transaction_modes_isolation_only() {
        let options = TxOptions::new().isolation("serializable");
        assert_eq!(
            transaction_modes(&options).as_deref(),
            Some("ISOLATION LEVEL serializable")
        );
    }

    #[test]
    fn test_transaction_modes_read_only_only() {
        let options = TxOptions::new().read_only();
        assert_eq!(transaction_modes(&options).as_deref(), Some("READ ONLY"));
    }

    #[test]
    fn test_transaction_modes_combined() {
        let options = TxOptions::new().isolation("repeatable read").read_only();
        assert_eq!(
            transaction_modes(&options).as_deref(),
            Some("ISOLATION LEVEL repeatable read, READ ONLY")
        );
    }

    #[test]
    fn test_pool_status_all_idle() {
        assert!(PoolStatus { size: 2, idle: 2 }.all_idle());
        assert!(!PoolStatus { size: 2, idle: 1 }.all_idle());
    }
}
