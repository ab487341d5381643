//! Generic PostgreSQL database adapter.
//!
//! This library adapts PostgreSQL driver stacks to one small capability set:
//! open/close a pool, execute statements, run queries, and manage
//! transactions, with uniform result and row types. Two backends implement
//! the contract, selected by cargo feature:
//!
//! - `backend-sqlx` (default): sqlx `PgPool`
//! - `backend-tokio`: tokio-postgres pooled by deadpool-postgres
//!
//! The adapter adds no concurrency control, caching, or retry of its own;
//! driver failures surface verbatim. On top of the pass-through it offers
//! exactly two error affordances: a no-rows sentinel
//! ([`AdapterError::is_no_rows`]) and SQLSTATE extraction
//! ([`AdapterError::code`]).
//!
//! ```ignore
//! use pg_adapter::{Database, SqlParam, TxOptions};
//!
//! let db = pg_adapter::connect("postgres://localhost/app").await?;
//! db.execute("INSERT INTO t(id) VALUES($1)", &[SqlParam::Int(1)]).await?;
//!
//! let mut tx = db.begin(TxOptions::new().isolation("serializable")).await?;
//! tx.execute("UPDATE t SET id = id + 1", &[]).await?;
//! tx.commit().await?;
//! ```

pub mod adapter;
pub mod backend;
pub mod config;
pub mod error;
pub mod params;
pub mod types;

pub use adapter::{Database, ExecResult, Row, RowSet, Transaction, TxOptions};
pub use backend::PoolStatus;
#[cfg(feature = "backend-tokio")]
pub use backend::NativePostgres;
#[cfg(feature = "backend-sqlx")]
pub use backend::SqlxPostgres;
#[cfg(any(feature = "backend-sqlx", feature = "backend-tokio"))]
pub use backend::{connect, must_connect};
pub use config::PoolSettings;
pub use error::{AdapterError, AdapterResult, UNKNOWN_SQL_STATE};
pub use params::SqlParam;
