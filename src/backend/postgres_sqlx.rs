//! sqlx-backed PostgreSQL adapter.
//!
//! Wraps a sqlx `PgPool`. Statements with parameters go through the driver's
//! prepared-statement path; parameter-free statements run as raw SQL so that
//! statements the extended protocol rejects (multi-statement batches, some
//! DDL) keep working.

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{Column as _, Executor as _, Statement as _};
use tracing::{debug, error, info, warn};

use super::{PoolStatus, transaction_modes};
use crate::adapter::{Database, ExecResult, Row, RowSet, Transaction, TxOptions};
use crate::config::{PoolSettings, redact_dsn};
use crate::error::{AdapterError, AdapterResult};
use crate::params::{SqlParam, bind_param};
use crate::types::sqlx_rows;

/// PostgreSQL adapter backed by a sqlx connection pool.
#[derive(Debug, Clone)]
pub struct SqlxPostgres {
    pool: PgPool,
}

impl SqlxPostgres {
    /// Open a connection pool with default settings.
    ///
    /// Fails with the driver's error if the DSN is invalid or the server is
    /// unreachable.
    pub async fn connect(dsn: &str) -> AdapterResult<Self> {
        Self::connect_with(dsn, &PoolSettings::default()).await
    }

    /// Open a connection pool with explicit settings.
    pub async fn connect_with(dsn: &str, settings: &PoolSettings) -> AdapterResult<Self> {
        settings.validate().map_err(AdapterError::Connection)?;

        let pool = PgPoolOptions::new()
            .min_connections(settings.min_connections_or_default())
            .max_connections(settings.max_connections_or_default())
            .acquire_timeout(settings.acquire_timeout())
            .idle_timeout(Some(settings.idle_timeout()))
            .test_before_acquire(settings.test_before_acquire_or_default())
            .connect(dsn)
            .await?;

        info!(dsn = %redact_dsn(dsn), "connected to PostgreSQL (sqlx backend)");
        Ok(Self { pool })
    }

    /// Open a connection pool, terminating the process on failure.
    ///
    /// Acceptable only in bootstrap code paths; library code should call
    /// [`SqlxPostgres::connect`] and handle the error.
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
        PoolStatus {
            size: self.pool.size(),
            idle: self.pool.num_idle() as u32,
        }
    }

    /// Best-effort server version lookup.
    pub async fn server_version(&self) -> Option<String> {
        match sqlx::query_scalar::<_, String>("SELECT version()")
            .fetch_one(&self.pool)
            .await
        {
            Ok(version) => {
                debug!(version = %version, "Got server version");
                Some(version)
            }
            Err(e) => {
                warn!(error = %e, "Failed to get server version");
                None
            }
        }
    }

    /// Round-trip health check.
    pub async fn ping(&self) -> AdapterResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl Database for SqlxPostgres {
    async fn execute(&self, sql: &str, params: &[SqlParam]) -> AdapterResult<ExecResult> {
        debug!(sql = %sql, params = params.len(), "execute");

        // When params is empty, run raw SQL to avoid prepared statement
        // issues (some DDL does not support prepared statements).
        let done = if params.is_empty() {
            self.pool.execute(sql).await?
        } else {
            let mut query = sqlx::query(sql);
            for param in params {
                query = bind_param(query, param);
            }
            query.execute(&self.pool).await?
        };

        Ok(ExecResult::new(done.rows_affected()))
    }

    async fn query(&self, sql: &str, params: &[SqlParam]) -> AdapterResult<RowSet> {
        debug!(sql = %sql, params = params.len(), "query");

        let mut conn = self.pool.acquire().await?;
        let stmt = (&mut *conn).prepare(sql).await?;
        let columns = stmt
            .columns()
            .iter()
            .map(|col| col.name().to_string())
            .collect();

        let mut query = stmt.query();
        for param in params {
            query = bind_param(query, param);
        }
        let rows: Vec<PgRow> = query.fetch_all(&mut *conn).await?;

        let rows = rows.iter().map(sqlx_rows::to_row).collect();
        Ok(RowSet::new(columns, rows))
    }

    async fn query_row(&self, sql: &str, params: &[SqlParam]) -> AdapterResult<Row> {
        debug!(sql = %sql, params = params.len(), "query_row");

        let mut query = sqlx::query(sql);
        for param in params {
            query = bind_param(query, param);
        }
        let row = query
            .fetch_optional(&self.pool)
            .await?
            .ok_or(AdapterError::NoRows)?;

        Ok(sqlx_rows::to_row(&row))
    }

    async fn begin(&self, options: TxOptions) -> AdapterResult<Box<dyn Transaction>> {
        let mut tx = self.pool.begin().await?;

        if let Some(modes) = transaction_modes(&options) {
            let stmt = format!("SET TRANSACTION {modes}");
            debug!(stmt = %stmt, "configuring transaction");
            sqlx::query(&stmt).execute(&mut *tx).await?;
        }

        Ok(Box::new(SqlxTransaction { tx }))
    }

    async fn close(&self) -> AdapterResult<()> {
        info!("closing PostgreSQL pool (sqlx backend)");
        self.pool.close().await;
        Ok(())
    }
}

/// Transaction on one connection checked out of the sqlx pool.
///
/// The driver rolls back automatically if the value is dropped without a
/// commit.
struct SqlxTransaction {
    tx: sqlx::Transaction<'static, sqlx::Postgres>,
}

#[async_trait]
impl Transaction for SqlxTransaction {
    async fn execute(&mut self, sql: &str, params: &[SqlParam]) -> AdapterResult<ExecResult> {
        debug!(sql = %sql, params = params.len(), "execute in transaction");

        let done = if params.is_empty() {
            (&mut *self.tx).execute(sql).await?
        } else {
            let mut query = sqlx::query(sql);
            for param in params {
                query = bind_param(query, param);
            }
            query.execute(&mut *self.tx).await?
        };

        Ok(ExecResult::new(done.rows_affected()))
    }

    async fn query(&mut self, sql: &str, params: &[SqlParam]) -> AdapterResult<RowSet> {
        debug!(sql = %sql, params = params.len(), "query in transaction");

        let stmt = (&mut *self.tx).prepare(sql).await?;
        let columns = stmt
            .columns()
            .iter()
            .map(|col| col.name().to_string())
            .collect();

        let mut query = stmt.query();
        for param in params {
            query = bind_param(query, param);
        }
        let rows: Vec<PgRow> = query.fetch_all(&mut *self.tx).await?;

        let rows = rows.iter().map(sqlx_rows::to_row).collect();
        Ok(RowSet::new(columns, rows))
    }

    async fn query_row(&mut self, sql: &str, params: &[SqlParam]) -> AdapterResult<Row> {
        let mut query = sqlx::query(sql);
        for param in params {
            query = bind_param(query, param);
        }
        let row = query
            .fetch_optional(&mut *self.tx)
            .await?
            .ok_or(AdapterError::NoRows)?;

        Ok(sqlx_rows::to_row(&row))
    }

    async fn commit(self: Box<Self>) -> AdapterResult<()> {
        self.tx.commit().await?;
        debug!("transaction committed");
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> AdapterResult<()> {
        self.tx.rollback().await?;
        debug!("transaction rolled back");
        Ok(())
    }
}
