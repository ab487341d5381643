//! Generic database capability set.
//!
//! This module defines the contract every backend implements:
//! - [`Database`]: pool-backed statement execution and transaction start
//! - [`Transaction`]: the same statement operations scoped to one
//!   checked-out connection, ended by exactly one of commit or rollback
//!
//! The shared value types ([`ExecResult`], [`RowSet`], [`TxOptions`]) live
//! here so backends differ only in how they talk to their driver.

use async_trait::async_trait;
use serde_json::Value as JsonValue;

use crate::error::AdapterResult;
use crate::params::SqlParam;

/// A single decoded row, mapping column name to value.
///
/// Map iteration order is not the statement's column order; take declared
/// order from [`RowSet::columns`].
pub type Row = serde_json::Map<String, JsonValue>;

/// Outcome of a statement that does not return rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecResult {
    rows_affected: u64,
}

impl ExecResult {
    pub(crate) fn new(rows_affected: u64) -> Self {
        Self { rows_affected }
    }

    /// Number of rows changed by the statement.
    pub fn rows_affected(&self) -> u64 {
        self.rows_affected
    }
}

/// A fully fetched result set.
///
/// The backend drains the driver cursor before constructing this, so the
/// underlying connection is back in the pool by the time the caller sees the
/// value. Column names come from statement metadata and are correct even
/// when the result holds no rows.
#[derive(Debug, Clone, Default)]
pub struct RowSet {
    columns: Vec<String>,
    rows: Vec<Row>,
}

impl RowSet {
    pub(crate) fn new(columns: Vec<String>, rows: Vec<Row>) -> Self {
        Self { columns, rows }
    }

    /// Column names in declared order. Empty when the statement has no
    /// result fields, never absent.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// The fetched rows.
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Number of fetched rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Consume the result set, keeping only the rows.
    pub fn into_rows(self) -> Vec<Row> {
        self.rows
    }

    /// Release the result set.
    ///
    /// The cursor was already drained when the set was built, so there is no
    /// close-time driver error to report.
    pub fn close(self) -> AdapterResult<()> {
        Ok(())
    }
}

impl IntoIterator for RowSet {
    type Item = Row;
    type IntoIter = std::vec::IntoIter<Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.into_iter()
    }
}

/// Options for starting a transaction.
///
/// The isolation level is forwarded verbatim to the server; values it does
/// not recognize fail there, not here.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TxOptions {
    pub isolation: Option<String>,
    pub read_only: bool,
}

impl TxOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request an isolation level, e.g. "read committed" or "serializable".
    pub fn isolation(mut self, level: impl Into<String>) -> Self {
        self.isolation = Some(level.into());
        self
    }

    /// Request a read-only transaction.
    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }
}

/// The database adapter contract.
///
/// Every operation performs network I/O and may fail with a driver error,
/// surfaced verbatim. Dropping an in-flight future cancels the operation;
/// callers wanting deadlines wrap calls in `tokio::time::timeout`.
#[async_trait]
pub trait Database: Send + Sync {
    /// Execute a statement expected to return no rows.
    async fn execute(&self, sql: &str, params: &[SqlParam]) -> AdapterResult<ExecResult>;

    /// Execute a statement returning a result set.
    async fn query(&self, sql: &str, params: &[SqlParam]) -> AdapterResult<RowSet>;

    /// Execute a statement expected to yield at most one row.
    ///
    /// An empty result reports the no-rows sentinel, detectable via
    /// [`AdapterError::is_no_rows`](crate::error::AdapterError::is_no_rows).
    async fn query_row(&self, sql: &str, params: &[SqlParam]) -> AdapterResult<Row>;

    /// Check out a connection and start a transaction on it.
    async fn begin(&self, options: TxOptions) -> AdapterResult<Box<dyn Transaction>>;

    /// Release the pool. Whether further operations error or hang after
    /// close is driver-defined.
    async fn close(&self) -> AdapterResult<()>;
}

/// A transaction scoped to one checked-out connection.
///
/// Commit and rollback consume the transaction, so exactly one terminal
/// operation can ever run. A transaction dropped without terminating is
/// rolled back.
#[async_trait]
pub trait Transaction: Send {
    async fn execute(&mut self, sql: &str, params: &[SqlParam]) -> AdapterResult<ExecResult>;

    async fn query(&mut self, sql: &str, params: &[SqlParam]) -> AdapterResult<RowSet>;

    async fn query_row(&mut self, sql: &str, params: &[SqlParam]) -> AdapterResult<Row>;

    /// Make the transaction's effects durable.
    async fn commit(self: Box<Self>) -> AdapterResult<()>;

    /// Discard the transaction's effects.
    async fn rollback(self: Box<Self>) -> AdapterResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exec_result_count() {
        let result = ExecResult::new(3);
        assert_eq!(result.rows_affected(), 3);
    }

    #[test]
    fn test_row_set_accessors() {
        let mut row = Row::new();
        row.insert("id".to_string(), JsonValue::from(1));
        let set = RowSet::new(vec!["id".to_string()], vec![row]);

        assert_eq!(set.columns(), ["id".to_string()]);
        assert_eq!(set.len(), 1);
        assert!(!set.is_empty());
        assert!(set.close().is_ok());
    }

    #[test]
    fn test_row_set_empty_columns_never_absent() {
        let set = RowSet::default();
        assert!(set.columns().is_empty());
        assert!(set.is_empty());
    }

    #[test]
    fn test_tx_options_builder() {
        let options = TxOptions::new().isolation("serializable").read_only();
        assert_eq!(options.isolation.as_deref(), Some("serializable"));
        assert!(options.read_only);

        assert_eq!(TxOptions::default(), TxOptions::new());
    }
}
