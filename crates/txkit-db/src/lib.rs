//! # txkit-db
//!
//! Transactional execution layer over pooled SQL connections.
//!
//! ## Overview
//!
//! This crate wraps a connection borrowed from a [`ConnectionPool`] with
//! transaction semantics: `BEGIN` / `COMMIT` / `ROLLBACK`, isolation levels,
//! read-only and deferrable transactions, and named savepoints.
//!
//! Two APIs are provided on top of the same primitives:
//!
//! - [`with_transaction()`] / [`transaction()`] - run a closure inside one
//!   transaction; commit on `Ok`, rollback on `Err`, always release the
//!   connection
//! - [`TransactionManager`] - an explicit `begin` / `commit` / `rollback`
//!   handle for work that cannot be expressed as a single closure
//!
//! ## Example
//!
//! ```rust,no_run
//! use txkit_db::{IsolationLevel, TransactionOptions, with_transaction};
//! use txkit_db::backends::drivers::sqlx::SqlxPool;
//! use txkit_db::pool::PoolConfig;
//!
//! # async fn example() -> Result<(), anyhow::Error> {
//! let pool = SqlxPool::connect("postgres://localhost/app", PoolConfig::default()).await?;
//! let options = TransactionOptions::new().with_isolation_level(IsolationLevel::Serializable);
//!
//! let count = with_transaction(&pool, options, |tx| async move {
//!     tx.execute("UPDATE accounts SET balance = balance - 10 WHERE id = $1", vec![1.into()])
//!         .await?;
//!     let rows = tx.query("SELECT COUNT(*) AS n FROM accounts", vec![]).await?;
//!     Ok::<_, anyhow::Error>(rows.len())
//! })
//! .await?;
//! # let _ = count;
//! # Ok(())
//! # }
//! ```
//!
//! ## Pool abstraction
//!
//! The layer never pools connections itself. Anything implementing
//! [`ConnectionPool`] can be used; [`backends::drivers::sqlx::SqlxPool`]
//! adapts `sqlx::AnyPool`.

pub mod backends;
pub mod pool;
pub mod transaction;

/// Prelude module for convenient imports
pub mod prelude {
	pub use crate::backends::{Connection, ConnectionPool, DatabaseError, QueryResult, QueryValue, Row};
	pub use crate::pool::{PoolConfig, PoolError};
	pub use crate::transaction::{
		IsolationLevel, TransactionContext, TransactionError, TransactionManager,
		TransactionOptions, TransactionState, create_transaction_manager, transaction,
		with_transaction,
	};
}

pub use backends::{Connection, ConnectionPool, DatabaseError};
pub use pool::{PoolConfig, PoolError};
pub use transaction::{
	IsolationLevel, TransactionContext, TransactionError, TransactionManager, TransactionOptions,
	TransactionState, create_transaction_manager, transaction, with_transaction,
};
