//! Scoped transaction execution
//!
//! [`with_transaction`] runs one unit of work inside one transaction:
//!
//! 1. acquire a connection from the pool
//! 2. issue `BEGIN` built from the [`TransactionOptions`]
//! 3. run the unit of work with a [`TransactionContext`] bound to that connection
//! 4. issue `COMMIT` if the work returned `Ok`, `ROLLBACK` otherwise
//! 5. release the connection
//!
//! The connection is released exactly once whichever way the work ends,
//! including when it panics. A panic is resumed after the rollback. If the
//! returned future is dropped before it completes, for example by a timeout,
//! the rollback and release run on a background task.
//!
//! ## Example
//!
//! ```rust,no_run
//! use txkit_db::transaction;
//! # use txkit_db::backends::drivers::sqlx::SqlxPool;
//!
//! # async fn example(pool: SqlxPool) -> Result<(), anyhow::Error> {
//! let id: i64 = transaction(&pool, |tx| async move {
//!     tx.execute("INSERT INTO users (name) VALUES ($1)", vec!["Alice".into()])
//!         .await?;
//!     let row = tx.query_one("SELECT MAX(id) AS id FROM users", vec![]).await?;
//!     Ok::<_, anyhow::Error>(row.get("id")?)
//! })
//! .await?;
//! # let _ = id;
//! # Ok(())
//! # }
//! ```

use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;

use super::context::{Completion, RollbackOnDrop, TransactionContext};
use super::error::{BoxError, TransactionError};
use super::statement::TransactionOptions;
use crate::backends::ConnectionPool;

/// Run `work` inside a transaction opened with `options`
///
/// Returns the work's value after a successful `COMMIT`. If the work fails,
/// the transaction is rolled back and the work's error is returned
/// unchanged. If that rollback fails too, a
/// [`TransactionError::RollbackFailed`] carrying both errors is returned.
///
/// # Errors
///
/// - [`TransactionError::Acquire`] if no connection could be obtained
/// - [`TransactionError::Begin`] if `BEGIN` failed
/// - [`TransactionError::Commit`] if `COMMIT` failed
/// - [`TransactionError::RollbackFailed`] if the work failed and so did `ROLLBACK`
/// - the work's own error otherwise
///
/// # Examples
///
/// ```rust,no_run
/// use txkit_db::{IsolationLevel, TransactionOptions, with_transaction};
/// # use txkit_db::backends::drivers::sqlx::SqlxPool;
///
/// # async fn example(pool: SqlxPool) -> Result<(), anyhow::Error> {
/// let options = TransactionOptions::new()
///     .with_isolation_level(IsolationLevel::Serializable)
///     .read_only(true)
///     .deferrable(true);
///
/// let rows = with_transaction(&pool, options, |tx| async move {
///     Ok::<_, anyhow::Error>(tx.query("SELECT * FROM ledger", vec![]).await?)
/// })
/// .await?;
/// # let _ = rows;
/// # Ok(())
/// # }
/// ```
pub async fn with_transaction<P, F, Fut, T, E>(
	pool: &P,
	options: TransactionOptions,
	work: F,
) -> Result<T, E>
where
	P: ConnectionPool + Clone,
	F: FnOnce(TransactionContext<P::Connection>) -> Fut,
	Fut: Future<Output = Result<T, E>>,
	E: From<TransactionError> + Into<BoxError>,
{
	let context = TransactionContext::open(pool, &options).await?;
	let _abandoned = RollbackOnDrop::new(pool.clone(), &context);
	let outcome = run_work(&context, work).await;
	settle(pool, &context, outcome).await
}

/// Run `work` inside a transaction opened with default options
///
/// Shorthand for [`with_transaction`] with [`TransactionOptions::default`].
pub async fn transaction<P, F, Fut, T, E>(pool: &P, work: F) -> Result<T, E>
where
	P: ConnectionPool + Clone,
	F: FnOnce(TransactionContext<P::Connection>) -> Fut,
	Fut: Future<Output = Result<T, E>>,
	E: From<TransactionError> + Into<BoxError>,
{
	with_transaction(pool, TransactionOptions::default(), work).await
}

/// Drive `work` to completion, capturing a panic instead of unwinding through
/// the caller before the transaction has been ended
pub(crate) async fn run_work<C, F, Fut, T, E>(
	context: &TransactionContext<C>,
	work: F,
) -> std::thread::Result<Result<T, E>>
where
	C: crate::backends::Connection,
	F: FnOnce(TransactionContext<C>) -> Fut,
	Fut: Future<Output = Result<T, E>>,
{
	let handle = context.clone();
	AssertUnwindSafe(async move { work(handle).await })
		.catch_unwind()
		.await
}

/// End the transaction according to the outcome of the unit of work
///
/// The context's connection is back in the pool when this returns, or
/// before the captured panic is resumed.
pub(crate) async fn settle<P, T, E>(
	pool: &P,
	context: &TransactionContext<P::Connection>,
	outcome: std::thread::Result<Result<T, E>>,
) -> Result<T, E>
where
	P: ConnectionPool,
	E: From<TransactionError> + Into<BoxError>,
{
	match outcome {
		Ok(Ok(value)) => {
			context
				.close(pool, Completion::Commit)
				.await
				.map_err(TransactionError::Commit)?;
			tracing::debug!(transaction_id = %context.id(), "transaction committed");
			Ok(value)
		}
		Ok(Err(error)) => match context.close(pool, Completion::Rollback).await {
			Ok(()) => {
				tracing::debug!(transaction_id = %context.id(), "transaction rolled back");
				Err(error)
			}
			Err(rollback) => {
				let error: BoxError = error.into();
				tracing::error!(
					transaction_id = %context.id(),
					error = %error,
					rollback_error = %rollback,
					"rollback failed after unit of work error"
				);
				Err(TransactionError::RollbackFailed { error, rollback }.into())
			}
		},
		Err(panic) => {
			tracing::error!(transaction_id = %context.id(), "unit of work panicked, rolling back");
			if let Err(rollback) = context.close(pool, Completion::Rollback).await {
				tracing::error!(
					transaction_id = %context.id(),
					error = %rollback,
					"rollback after panic failed"
				);
			}
			std::panic::resume_unwind(panic)
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::backends::DatabaseError;
	use crate::pool::PoolError;
	use crate::transaction::mock::MockPool;
	use crate::transaction::statement::IsolationLevel;
	use rstest::*;

	#[derive(Debug, thiserror::Error)]
	enum AppError {
		#[error("insufficient funds")]
		InsufficientFunds,
		#[error(transparent)]
		Transaction(#[from] TransactionError),
	}

	#[fixture]
	fn pool() -> MockPool {
		MockPool::new()
	}

	#[rstest]
	#[tokio::test]
	async fn test_success_commits_once(pool: MockPool) {
		// Act
		let result = transaction(&pool, |tx| async move {
			tx.execute("INSERT INTO t VALUES (1)", vec![]).await?;
			Ok::<_, TransactionError>(42)
		})
		.await;

		// Assert
		assert_eq!(result.unwrap(), 42);
		assert_eq!(
			pool.statements(),
			vec!["BEGIN", "INSERT INTO t VALUES (1)", "COMMIT"]
		);
		assert_eq!(pool.acquired(), 1);
		assert_eq!(pool.released(), 1);
	}

	#[rstest]
	#[tokio::test]
	async fn test_work_error_rolls_back_and_is_returned_unchanged(pool: MockPool) {
		// Act
		let result: Result<(), AppError> =
			transaction(&pool, |_tx| async move { Err(AppError::InsufficientFunds) }).await;

		// Assert
		assert!(matches!(result, Err(AppError::InsufficientFunds)));
		assert_eq!(pool.statements(), vec!["BEGIN", "ROLLBACK"]);
		assert_eq!(pool.released(), 1);
	}

	#[rstest]
	#[tokio::test]
	async fn test_options_shape_begin_statement(pool: MockPool) {
		// Arrange
		let options = TransactionOptions::new()
			.with_isolation_level(IsolationLevel::Serializable)
			.read_only(true)
			.deferrable(true);

		// Act
		with_transaction(&pool, options, |_tx| async move { Ok::<_, TransactionError>(()) })
			.await
			.unwrap();

		// Assert
		assert_eq!(
			pool.statements()[0],
			"BEGIN ISOLATION LEVEL SERIALIZABLE READ ONLY DEFERRABLE"
		);
	}

	#[rstest]
	#[tokio::test]
	async fn test_acquire_failure_never_runs_work() {
		// Arrange
		let pool = MockPool::exhausted();
		let mut ran = false;

		// Act
		let result = transaction(&pool, |_tx| {
			ran = true;
			async move { Ok::<_, TransactionError>(()) }
		})
		.await;

		// Assert
		assert!(matches!(
			result,
			Err(TransactionError::Acquire(PoolError::Exhausted))
		));
		assert!(!ran);
		assert_eq!(pool.released(), 0);
	}

	#[rstest]
	#[tokio::test]
	async fn test_begin_failure_releases_without_running_work() {
		// Arrange
		let pool = MockPool::failing("BEGIN");

		// Act
		let result = transaction(&pool, |_tx| async move {
			if true {
				panic!("work must not run when BEGIN fails");
			}
			Ok::<_, TransactionError>(())
		})
		.await;

		// Assert
		assert!(matches!(result, Err(TransactionError::Begin(_))));
		assert_eq!(pool.statements(), vec!["BEGIN"]);
		assert_eq!(pool.released(), 1);
	}

	#[rstest]
	#[tokio::test]
	async fn test_commit_failure_is_reported() {
		// Arrange
		let pool = MockPool::failing("COMMIT");

		// Act
		let result = transaction(&pool, |_tx| async move { Ok::<_, TransactionError>(1) }).await;

		// Assert
		assert!(matches!(
			result,
			Err(TransactionError::Commit(DatabaseError::Query(_)))
		));
		assert_eq!(pool.released(), 1);
	}

	#[rstest]
	#[tokio::test]
	async fn test_rollback_failure_keeps_original_error() {
		// Arrange
		let pool = MockPool::failing("ROLLBACK");

		// Act
		let result: Result<(), AppError> =
			transaction(&pool, |_tx| async move { Err(AppError::InsufficientFunds) }).await;

		// Assert
		let Err(AppError::Transaction(error)) = result else {
			panic!("expected an aggregated rollback failure");
		};
		assert!(matches!(error, TransactionError::RollbackFailed { .. }));
		assert_eq!(
			error.original_error().map(ToString::to_string).as_deref(),
			Some("insufficient funds")
		);
		assert_eq!(pool.released(), 1);
	}

	#[rstest]
	#[tokio::test]
	async fn test_statement_error_inside_work_rolls_back() {
		// Arrange
		let pool = MockPool::failing("INSERT");

		// Act
		let result = transaction(&pool, |tx| async move {
			tx.execute("INSERT INTO t VALUES (1)", vec![]).await?;
			tx.execute("UPDATE t SET a = 2", vec![]).await?;
			Ok::<_, TransactionError>(())
		})
		.await;

		// Assert
		assert!(matches!(
			result,
			Err(TransactionError::Database(DatabaseError::Query(_)))
		));
		assert_eq!(
			pool.statements(),
			vec!["BEGIN", "INSERT INTO t VALUES (1)", "ROLLBACK"]
		);
	}

	#[rstest]
	#[tokio::test]
	async fn test_panic_rolls_back_releases_and_resumes(pool: MockPool) {
		// Arrange
		let handle = pool.clone();

		// Act
		let joined = tokio::spawn(async move {
			transaction(&handle, |_tx| async move {
				if true {
					panic!("boom");
				}
				Ok::<_, TransactionError>(())
			})
			.await
		})
		.await;

		// Assert
		assert!(joined.unwrap_err().is_panic());
		assert_eq!(pool.statements(), vec!["BEGIN", "ROLLBACK"]);
		assert_eq!(pool.released(), 1);
	}

	#[rstest]
	#[tokio::test]
	async fn test_escaped_context_is_closed(pool: MockPool) {
		// Act
		let escaped = transaction(&pool, |tx| async move { Ok::<_, TransactionError>(tx) })
			.await
			.unwrap();
		let result = escaped.execute("SELECT 1", vec![]).await;

		// Assert
		assert!(matches!(result, Err(TransactionError::Closed(_))));
		assert_eq!(pool.statements(), vec!["BEGIN", "COMMIT"]);
	}

	#[rstest]
	#[tokio::test]
	async fn test_sequential_transactions_each_release(pool: MockPool) {
		// Act
		for _ in 0..3 {
			transaction(&pool, |_tx| async move { Ok::<_, TransactionError>(()) })
				.await
				.unwrap();
		}

		// Assert
		assert_eq!(pool.acquired(), 3);
		assert_eq!(pool.released(), 3);
	}

	#[rstest]
	#[tokio::test]
	async fn test_cancelled_transaction_rolls_back_in_background(pool: MockPool) {
		// Arrange
		let work = transaction(&pool, |_tx| async move {
			tokio::time::sleep(std::time::Duration::from_secs(5)).await;
			Ok::<_, TransactionError>(())
		});

		// Act
		let timed_out = tokio::time::timeout(std::time::Duration::from_millis(20), work).await;
		for _ in 0..10 {
			tokio::task::yield_now().await;
		}

		// Assert
		assert!(timed_out.is_err());
		assert_eq!(pool.statements(), vec!["BEGIN", "ROLLBACK"]);
		assert_eq!(pool.acquired(), 1);
		assert_eq!(pool.released(), 1);
	}
}
