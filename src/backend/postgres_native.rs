//! tokio-postgres-backed PostgreSQL adapter.
//!
//! Wraps tokio-postgres clients pooled by deadpool-postgres. Transactions
//! hold a checked-out client and drive BEGIN/COMMIT/ROLLBACK as statements,
//! which keeps the client owned by the adapter instead of borrowed from it.

use async_trait::async_trait;
use deadpool_postgres::{Manager, ManagerConfig, Object, Pool, RecyclingMethod, Runtime};
use std::str::FromStr;
use tokio_postgres::NoTls;
use tracing::{debug, error, info, warn};

use super::{PoolStatus, transaction_modes};
use crate::adapter::{Database, ExecResult, Row, RowSet, Transaction, TxOptions};
use crate::config::{PoolSettings, redact_dsn};
use crate::error::{AdapterError, AdapterResult};
use crate::params::{SqlParam, as_pg_args};
use crate::types::pg_rows;

/// PostgreSQL adapter backed by tokio-postgres and deadpool.
#[derive(Clone)]
pub struct NativePostgres {
    pool: Pool,
}

impl NativePostgres {
    /// Open a connection pool with default settings.
    pub async fn connect(dsn: &str) -> AdapterResult<Self> {
        Self::connect_with(dsn, &PoolSettings::default()).await
    }

    /// Open a connection pool with explicit settings.
    ///
    /// deadpool creates connections lazily, so one connection is checked out
    /// here to surface DSN, network, and auth failures at open time the way
    /// an eager pool would.
    pub async fn connect_with(dsn: &str, settings: &PoolSettings) -> AdapterResult<Self> {
        settings.validate().map_err(AdapterError::Connection)?;

        let pg_config = tokio_postgres::Config::from_str(dsn)?;
        let recycling_method = if settings.test_before_acquire_or_default() {
            RecyclingMethod::Verified
        } else {
            RecyclingMethod::Fast
        };
        let manager = Manager::from_config(pg_config, NoTls, ManagerConfig { recycling_method });

        let pool = Pool::builder(manager)
            .max_size(settings.max_connections_or_default() as usize)
            .create_timeout(Some(settings.acquire_timeout()))
            .wait_timeout(Some(settings.acquire_timeout()))
            .runtime(Runtime::Tokio1)
            .build()
            .map_err(|e| AdapterError::Connection(e.to_string()))?;

        let probe = pool.get().await?;
        drop(probe);

        info!(dsn = %redact_dsn(dsn), "connected to PostgreSQL (native backend)");
        Ok(Self { pool })
    }

    /// Open a connection pool, terminating the process on failure.
    ///
    /// Acceptable only in bootstrap code paths; library code should call
    /// [`NativePostgres::connect`] and handle the error.
    pub async fn must_connect(dsn: &str) -> Self {
        match Self::connect(dsn).await {
            Ok(db) => db,
            Err(e) => {
                error!(error = %e, dsn = %redact_dsn(dsn), "failed to open database");
                std::process::exit(1);
            }
        }
    }

    /// Current pool usage.
    pub fn pool_status(&self) -> PoolStatus {
        let status = self.pool.status();
        PoolStatus {
            size: status.size as u32,
            idle: status.available as u32,
        }
    }

    /// Best-effort server version lookup.
    pub async fn server_version(&self) -> Option<String> {
        let client = match self.pool.get().await {
            Ok(client) => client,
            Err(e) => {
                warn!(error = %e, "Failed to get server version");
                return None;
            }
        };
        match client.query_one("SELECT version()", &[]).await {
            Ok(row) => match row.try_get::<_, String>(0) {
                Ok(version) => {
                    debug!(version = %version, "Got server version");
                    Some(version)
                }
                Err(e) => {
                    warn!(error = %e, "Failed to get server version");
                    None
                }
            },
            Err(e) => {
                warn!(error = %e, "Failed to get server version");
                None
            }
        }
    }

    /// Round-trip health check.
    pub async fn ping(&self) -> AdapterResult<()> {
        let client = self.pool.get().await?;
        client.batch_execute("SELECT 1").await?;
        Ok(())
    }
}

#[async_trait]
impl Database for NativePostgres {
    async fn execute(&self, sql: &str, params: &[SqlParam]) -> AdapterResult<ExecResult> {
        debug!(sql = %sql, params = params.len(), "execute");

        let client = self.pool.get().await?;
        let stmt = client.prepare_cached(sql).await?;
        let rows_affected = client.execute(&stmt, &as_pg_args(params)).await?;

        Ok(ExecResult::new(rows_affected))
    }

    async fn query(&self, sql: &str, params: &[SqlParam]) -> AdapterResult<RowSet> {
        debug!(sql = %sql, params = params.len(), "query");

        let client = self.pool.get().await?;
        let stmt = client.prepare_cached(sql).await?;
        let columns = stmt
            .columns()
            .iter()
            .map(|col| col.name().to_string())
            .collect();
        let rows = client.query(&stmt, &as_pg_args(params)).await?;

        let rows = rows.iter().map(pg_rows::to_row).collect();
        Ok(RowSet::new(columns, rows))
    }

    async fn query_row(&self, sql: &str, params: &[SqlParam]) -> AdapterResult<Row> {
        debug!(sql = %sql, params = params.len(), "query_row");

        let client = self.pool.get().await?;
        let stmt = client.prepare_cached(sql).await?;
        let row = client
            .query_opt(&stmt, &as_pg_args(params))
            .await?
            .ok_or(AdapterError::NoRows)?;

        Ok(pg_rows::to_row(&row))
    }

    async fn begin(&self, options: TxOptions) -> AdapterResult<Box<dyn Transaction>> {
        let client = self.pool.get().await?;

        let begin_sql = match transaction_modes(&options) {
            Some(modes) => format!("BEGIN {modes}"),
            None => "BEGIN".to_string(),
        };
        debug!(stmt = %begin_sql, "starting transaction");
        client.batch_execute(&begin_sql).await?;

        Ok(Box::new(NativeTransaction {
            client: Some(client),
        }))
    }

    async fn close(&self) -> AdapterResult<()> {
        info!("closing PostgreSQL pool (native backend)");
        self.pool.close();
        Ok(())
    }
}

/// Transaction on one client checked out of the deadpool pool.
///
/// The client goes back to the pool when the value drops; an abandoned
/// transaction is rolled back first so the next checkout does not inherit
/// it.
struct NativeTransaction {
    /// Some until a terminal operation hands the client back.
    client: Option<Object>,
}

impl NativeTransaction {
    fn client(&self) -> AdapterResult<&Object> {
        self.client.as_ref().ok_or(AdapterError::TransactionClosed)
    }
}

#[async_trait]
impl Transaction for NativeTransaction {
    async fn execute(&mut self, sql: &str, params: &[SqlParam]) -> AdapterResult<ExecResult> {
        debug!(sql = %sql, params = params.len(), "execute in transaction");

        let client = self.client()?;
        let stmt = client.prepare_cached(sql).await?;
        let rows_affected = client.execute(&stmt, &as_pg_args(params)).await?;

        Ok(ExecResult::new(rows_affected))
    }

    async fn query(&mut self, sql: &str, params: &[SqlParam]) -> AdapterResult<RowSet> {
        debug!(sql = %sql, params = params.len(), "query in transaction");

        let client = self.client()?;
        let stmt = client.prepare_cached(sql).await?;
        let columns = stmt
            .columns()
            .iter()
            .map(|col| col.name().to_string())
            .collect();
        let rows = client.query(&stmt, &as_pg_args(params)).await?;

        let rows = rows.iter().map(pg_rows::to_row).collect();
        Ok(RowSet::new(columns, rows))
    }

    async fn query_row(&mut self, sql: &str, params: &[SqlParam]) -> AdapterResult<Row> {
        let client = self.client()?;
        let stmt = client.prepare_cached(sql).await?;
        let row = client
            .query_opt(&stmt, &as_pg_args(params))
            .await?
            .ok_or(AdapterError::NoRows)?;

        Ok(pg_rows::to_row(&row))
    }

    async fn commit(mut self: Box<Self>) -> AdapterResult<()> {
        let client = self.client.take().ok_or(AdapterError::TransactionClosed)?;
        match client.batch_execute("COMMIT").await {
            Ok(()) => {
                debug!("transaction committed");
                Ok(())
            }
            Err(e) => {
                // Put the client back so Drop rolls the transaction back
                // before the connection reaches the pool.
                self.client = Some(client);
                Err(e.into())
            }
        }
    }

    async fn rollback(mut self: Box<Self>) -> AdapterResult<()> {
        let client = self.client.take().ok_or(AdapterError::TransactionClosed)?;
        match client.batch_execute("ROLLBACK").await {
            Ok(()) => {
                debug!("transaction rolled back");
                Ok(())
            }
            Err(e) => {
                self.client = Some(client);
                Err(e.into())
            }
        }
    }
}

impl Drop for NativeTransaction {
    /// Spawns a task for the rollback; if the runtime is shutting down the
    /// task may not run, in which case the connection is torn down with the
    /// runtime rather than reused.
    fn drop(&mut self) {
        if let Some(client) = self.client.take() {
            warn!("transaction dropped without commit or rollback, rolling back");
            tokio::spawn(async move {
                if let Err(e) = client.batch_execute("ROLLBACK").await {
                    warn!(error = %e, "rollback of abandoned transaction failed");
                }
            });
        }
    }
}
