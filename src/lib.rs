//! # txkit
//!
//! Transactional execution over pooled SQL connections.
//!
//! txkit wraps a connection borrowed from a pool with ACID transaction
//! control: `BEGIN` / `COMMIT` / `ROLLBACK`, isolation levels, read-only and
//! deferrable transactions, and named savepoints. Two APIs share the same
//! primitives:
//!
//! - [`with_transaction`] / [`transaction`]: scoped execution; the unit of
//!   work commits on `Ok` and rolls back on `Err` or panic
//! - [`TransactionManager`]: explicit `begin` / `commit` / `rollback` for work
//!   spread across several steps
//!
//! ## Feature Flags
//!
//! - `sqlx` (default) - [`SqlxPool`](backends::drivers::sqlx::SqlxPool), an
//!   adapter over `sqlx::AnyPool` (PostgreSQL, MySQL, SQLite)
//! - `conf` (default) - settings loading from TOML and the environment
//! - `test` - [`RecordingPool`](test::RecordingPool) and rstest fixtures
//! - `full` - all of the above
//!
//! ## Quick Example
//!
//! ```rust,no_run
//! use txkit::prelude::*;
//! use txkit::backends::drivers::sqlx::SqlxPool;
//! use txkit::conf::DatabaseSettings;
//!
//! # async fn example() -> Result<(), anyhow::Error> {
//! let settings = DatabaseSettings::from_env()?;
//! let pool = SqlxPool::from_settings(&settings).await?;
//! let options = TransactionOptions::from_settings(&settings.transaction)?;
//!
//! with_transaction(&pool, options, |tx| async move {
//!     tx.execute("UPDATE accounts SET balance = balance - $1 WHERE id = $2", vec![10.into(), 1.into()])
//!         .await?;
//!     tx.execute("UPDATE accounts SET balance = balance + $1 WHERE id = $2", vec![10.into(), 2.into()])
//!         .await?;
//!     Ok::<_, anyhow::Error>(())
//! })
//! .await?;
//! # Ok(())
//! # }
//! ```

pub use txkit_db::{backends, pool};
// Brings in both the `transaction` module and the `transaction()` function
pub use txkit_db::transaction;

pub use txkit_db::{
	Connection, ConnectionPool, DatabaseError, IsolationLevel, PoolConfig, PoolError,
	TransactionContext, TransactionError, TransactionManager, TransactionOptions,
	TransactionState, create_transaction_manager, with_transaction,
};

#[cfg(feature = "conf")]
pub use txkit_conf as conf;

#[cfg(feature = "test")]
pub use txkit_test as test;

/// Prelude module for convenient imports
pub mod prelude {
	pub use txkit_db::prelude::*;

	#[cfg(feature = "conf")]
	pub use txkit_conf::DatabaseSettings;
}
