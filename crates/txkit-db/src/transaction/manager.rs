//! Explicit transaction state machine
//!
//! A [`TransactionManager`] drives at most one transaction at a time through
//! `begin` / `commit` / `rollback`. It suits flows where the unit of work
//! cannot be written as a single closure, for example when the decision to
//! commit is made by a different part of the program than the one doing the
//! writes.
//!
//! ```text
//!            begin            commit / rollback
//!   Idle ──────────────▶ Active ─────────────────▶ Idle
//! ```
//!
//! Misuse (`begin` while active, `commit` or `rollback` while idle) is
//! reported as an error and leaves the state unchanged.

use std::future::Future;
use std::sync::Arc;

use tokio::runtime::Handle;
use uuid::Uuid;

use super::context::{Completion, RollbackOnDrop, TransactionContext, spawn_rollback};
use super::error::{BoxError, TransactionError, TransactionResult};
use super::executor::{run_work, settle};
use super::statement::TransactionOptions;
use crate::backends::ConnectionPool;

/// Observable state of a [`TransactionManager`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionState {
	/// No transaction; no connection is held
	Idle,
	/// A transaction is open on a held connection
	Active,
}

/// Explicit begin / commit / rollback handle over a pool
///
/// Not meant to be shared between tasks: every state-changing method takes
/// `&mut self`.
///
/// If a manager is dropped while a transaction is active, it logs a warning
/// and rolls the transaction back on the tokio runtime `begin` ran on, even
/// when the drop happens outside that runtime. Ending the
/// transaction explicitly is still expected; the drop path cannot report
/// failures to the caller.
///
/// # Examples
///
/// ```rust,no_run
/// use txkit_db::{TransactionOptions, create_transaction_manager};
/// # use txkit_db::backends::drivers::sqlx::SqlxPool;
///
/// # async fn example(pool: SqlxPool) -> Result<(), anyhow::Error> {
/// let mut manager = create_transaction_manager(pool);
///
/// manager.begin(TransactionOptions::default()).await?;
/// let tx = manager.context()?.clone();
/// tx.execute("INSERT INTO jobs (name) VALUES ($1)", vec!["cleanup".into()]).await?;
/// manager.commit().await?;
///
/// assert!(!manager.is_transaction_active());
/// # Ok(())
/// # }
/// ```
pub struct TransactionManager<P: ConnectionPool> {
	pool: Arc<P>,
	// The context owns the slot holding the bound connection, so connection
	// and context are always set and cleared together.
	active: Option<TransactionContext<P::Connection>>,
	// Runtime the active transaction was opened on
	runtime: Option<Handle>,
}

impl<P: ConnectionPool> TransactionManager<P> {
	/// Create an idle manager over `pool`
	pub fn new(pool: P) -> Self {
		Self::from_arc(Arc::new(pool))
	}

	/// Create an idle manager over a pool shared with other owners
	pub fn from_arc(pool: Arc<P>) -> Self {
		Self {
			pool,
			active: None,
			runtime: None,
		}
	}

	/// The pool transactions are opened on
	pub fn pool(&self) -> &Arc<P> {
		&self.pool
	}

	/// Acquire a connection and issue `BEGIN`
	///
	/// # Errors
	///
	/// - [`TransactionError::AlreadyActive`] if a transaction is already open;
	///   no connection is acquired
	/// - [`TransactionError::Acquire`] or [`TransactionError::Begin`] if the
	///   transaction could not be opened; the manager stays idle
	pub async fn begin(&mut self, options: TransactionOptions) -> TransactionResult<()> {
		if self.active.is_some() {
			return Err(TransactionError::AlreadyActive);
		}

		let context = TransactionContext::open(&*self.pool, &options).await?;
		self.active = Some(context);
		self.runtime = Handle::try_current().ok();
		Ok(())
	}

	/// Issue `COMMIT` and release the connection
	///
	/// The manager is idle afterwards even when `COMMIT` fails.
	pub async fn commit(&mut self) -> TransactionResult<()> {
		let context = self
			.active
			.take()
			.ok_or(TransactionError::NoActiveToCommit)?;
		context
			.close(&*self.pool, Completion::Commit)
			.await
			.map_err(TransactionError::Commit)?;
		tracing::debug!(transaction_id = %context.id(), "transaction committed");
		Ok(())
	}

	/// Issue `ROLLBACK` and release the connection
	///
	/// The manager is idle afterwards even when `ROLLBACK` fails.
	pub async fn rollback(&mut self) -> TransactionResult<()> {
		let context = self
			.active
			.take()
			.ok_or(TransactionError::NoActiveToRollback)?;
		context
			.close(&*self.pool, Completion::Rollback)
			.await
			.map_err(TransactionError::Rollback)?;
		tracing::debug!(transaction_id = %context.id(), "transaction rolled back");
		Ok(())
	}

	/// Context of the active transaction
	pub fn context(&self) -> TransactionResult<&TransactionContext<P::Connection>> {
		self.active.as_ref().ok_or(TransactionError::NoActive)
	}

	pub fn is_transaction_active(&self) -> bool {
		self.active.is_some()
	}

	pub fn state(&self) -> TransactionState {
		if self.active.is_some() {
			TransactionState::Active
		} else {
			TransactionState::Idle
		}
	}

	/// Identifier of the active transaction
	pub fn transaction_id(&self) -> Option<Uuid> {
		self.active.as_ref().map(TransactionContext::id)
	}

	/// Run `work` in a transaction driven by this manager
	///
	/// Same outcome rules as [`with_transaction`](super::with_transaction):
	/// commit on `Ok`, rollback on `Err` or panic. The manager stays idle
	/// throughout, also when the returned future is dropped before it
	/// completes.
	///
	/// # Errors
	///
	/// [`TransactionError::AlreadyActive`] if a transaction is already open.
	pub async fn run<F, Fut, T, E>(&mut self, options: TransactionOptions, work: F) -> Result<T, E>
	where
		F: FnOnce(TransactionContext<P::Connection>) -> Fut,
		Fut: Future<Output = Result<T, E>>,
		E: From<TransactionError> + Into<BoxError>,
	{
		if self.active.is_some() {
			return Err(TransactionError::AlreadyActive.into());
		}

		let context = TransactionContext::open(&*self.pool, &options).await?;
		let _abandoned = RollbackOnDrop::new(Arc::clone(&self.pool), &context);
		let outcome = run_work(&context, work).await;
		settle(&*self.pool, &context, outcome).await
	}
}

impl<P: ConnectionPool> Drop for TransactionManager<P> {
	fn drop(&mut self) {
		let Some(context) = self.active.take() else {
			return;
		};
		tracing::warn!(
			transaction_id = %context.id(),
			"TransactionManager dropped with an active transaction, rolling back"
		);
		spawn_rollback(self.runtime.take(), Arc::clone(&self.pool), context);
	}
}

/// Create an idle [`TransactionManager`] over `pool`
pub fn create_transaction_manager<P: ConnectionPool>(pool: P) -> TransactionManager<P> {
	TransactionManager::new(pool)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::backends::DatabaseError;
	use crate::pool::PoolError;
	use crate::transaction::mock::MockPool;
	use rstest::*;

	#[fixture]
	fn pool() -> MockPool {
		MockPool::new()
	}

	#[rstest]
	#[tokio::test]
	async fn test_begin_commit_cycle(pool: MockPool) {
		// Arrange
		let mut manager = create_transaction_manager(pool.clone());

		// Act
		manager.begin(TransactionOptions::default()).await.unwrap();
		let active = manager.is_transaction_active();
		manager
			.context()
			.unwrap()
			.execute("INSERT INTO t VALUES (1)", vec![])
			.await
			.unwrap();
		manager.commit().await.unwrap();

		// Assert
		assert!(active);
		assert_eq!(manager.state(), TransactionState::Idle);
		assert_eq!(
			pool.statements(),
			vec!["BEGIN", "INSERT INTO t VALUES (1)", "COMMIT"]
		);
		assert_eq!(pool.released(), 1);
	}

	#[rstest]
	#[tokio::test]
	async fn test_double_begin_is_rejected_without_acquiring(pool: MockPool) {
		// Arrange
		let mut manager = create_transaction_manager(pool.clone());
		manager.begin(TransactionOptions::default()).await.unwrap();
		let first_id = manager.transaction_id();

		// Act
		let result = manager.begin(TransactionOptions::default()).await;

		// Assert
		assert!(matches!(result, Err(TransactionError::AlreadyActive)));
		assert_eq!(pool.acquired(), 1);
		assert_eq!(manager.transaction_id(), first_id);
		manager.rollback().await.unwrap();
	}

	#[rstest]
	#[tokio::test]
	async fn test_idle_operations_fail(pool: MockPool) {
		// Arrange
		let mut manager = create_transaction_manager(pool.clone());

		// Act
		let commit = manager.commit().await;
		let rollback = manager.rollback().await;
		let context = manager.context().map(|_| ());

		// Assert
		assert!(matches!(commit, Err(TransactionError::NoActiveToCommit)));
		assert!(matches!(rollback, Err(TransactionError::NoActiveToRollback)));
		assert!(matches!(context, Err(TransactionError::NoActive)));
		assert_eq!(manager.state(), TransactionState::Idle);
		assert!(pool.statements().is_empty());
	}

	#[rstest]
	#[tokio::test]
	async fn test_manager_is_reusable(pool: MockPool) {
		// Arrange
		let mut manager = create_transaction_manager(pool.clone());

		// Act
		manager.begin(TransactionOptions::default()).await.unwrap();
		let first = manager.transaction_id();
		manager.rollback().await.unwrap();
		manager.begin(TransactionOptions::default()).await.unwrap();
		let second = manager.transaction_id();
		manager.commit().await.unwrap();

		// Assert
		assert!(first.is_some() && second.is_some());
		assert_ne!(first, second);
		assert_eq!(
			pool.statements(),
			vec!["BEGIN", "ROLLBACK", "BEGIN", "COMMIT"]
		);
		assert_eq!(pool.acquired(), 2);
		assert_eq!(pool.released(), 2);
	}

	#[rstest]
	#[tokio::test]
	async fn test_failed_begin_leaves_manager_idle() {
		// Arrange
		let pool = MockPool::failing("BEGIN");
		let mut manager = create_transaction_manager(pool.clone());

		// Act
		let result = manager.begin(TransactionOptions::default()).await;

		// Assert
		assert!(matches!(result, Err(TransactionError::Begin(_))));
		assert!(!manager.is_transaction_active());
		assert_eq!(pool.released(), 1);
	}

	#[rstest]
	#[tokio::test]
	async fn test_failed_acquire_leaves_manager_idle() {
		// Arrange
		let mut manager = create_transaction_manager(MockPool::exhausted());

		// Act
		let result = manager.begin(TransactionOptions::default()).await;

		// Assert
		assert!(matches!(
			result,
			Err(TransactionError::Acquire(PoolError::Exhausted))
		));
		assert_eq!(manager.state(), TransactionState::Idle);
	}

	#[rstest]
	#[tokio::test]
	async fn test_failed_commit_returns_to_idle() {
		// Arrange
		let pool = MockPool::failing("COMMIT");
		let mut manager = create_transaction_manager(pool.clone());
		manager.begin(TransactionOptions::default()).await.unwrap();

		// Act
		let result = manager.commit().await;

		// Assert
		assert!(matches!(
			result,
			Err(TransactionError::Commit(DatabaseError::Query(_)))
		));
		assert!(!manager.is_transaction_active());
		assert_eq!(pool.released(), 1);
	}

	#[rstest]
	#[tokio::test]
	async fn test_context_from_finished_transaction_is_closed(pool: MockPool) {
		// Arrange
		let mut manager = create_transaction_manager(pool);
		manager.begin(TransactionOptions::default()).await.unwrap();
		let stale = manager.context().unwrap().clone();
		manager.commit().await.unwrap();

		// Act
		let result = stale.execute("SELECT 1", vec![]).await;

		// Assert
		assert!(matches!(result, Err(TransactionError::Closed(_))));
	}

	#[rstest]
	#[tokio::test]
	async fn test_run_commits_and_returns_to_idle(pool: MockPool) {
		// Arrange
		let mut manager = create_transaction_manager(pool.clone());

		// Act
		let value = manager
			.run(TransactionOptions::new().read_only(true), |tx| async move {
				let row = tx.query_one("SELECT 1 AS n", vec![]).await?;
				Ok::<_, TransactionError>(row.get::<i64>("n")?)
			})
			.await
			.unwrap();

		// Assert
		assert_eq!(value, 1);
		assert_eq!(manager.state(), TransactionState::Idle);
		assert_eq!(
			pool.statements(),
			vec!["BEGIN READ ONLY", "SELECT 1 AS n", "COMMIT"]
		);
	}

	#[rstest]
	#[tokio::test]
	async fn test_run_rolls_back_on_error(pool: MockPool) {
		// Arrange
		let mut manager = create_transaction_manager(pool.clone());

		// Act
		let result: Result<(), anyhow::Error> = manager
			.run(TransactionOptions::default(), |_tx| async move {
				Err(anyhow::anyhow!("validation failed"))
			})
			.await;

		// Assert
		assert_eq!(result.unwrap_err().to_string(), "validation failed");
		assert!(!manager.is_transaction_active());
		assert_eq!(pool.statements(), vec!["BEGIN", "ROLLBACK"]);
	}

	#[rstest]
	#[tokio::test]
	async fn test_run_while_active_is_rejected(pool: MockPool) {
		// Arrange
		let mut manager = create_transaction_manager(pool.clone());
		manager.begin(TransactionOptions::default()).await.unwrap();

		// Act
		let result = manager
			.run(TransactionOptions::default(), |_tx| async move {
				Ok::<_, TransactionError>(())
			})
			.await;

		// Assert
		assert!(matches!(result, Err(TransactionError::AlreadyActive)));
		assert!(manager.is_transaction_active());
		manager.rollback().await.unwrap();
	}

	#[rstest]
	#[tokio::test]
	async fn test_drop_while_active_rolls_back(pool: MockPool) {
		// Arrange
		let mut manager = create_transaction_manager(pool.clone());
		manager.begin(TransactionOptions::default()).await.unwrap();

		// Act
		drop(manager);
		for _ in 0..10 {
			if pool.released() == 1 {
				break;
			}
			tokio::task::yield_now().await;
		}

		// Assert
		assert_eq!(pool.statements(), vec!["BEGIN", "ROLLBACK"]);
		assert_eq!(pool.released(), 1);
	}

	#[rstest]
	#[tokio::test]
	async fn test_cancelled_run_rolls_back_and_stays_idle(pool: MockPool) {
		// Arrange
		let mut manager = create_transaction_manager(pool.clone());

		// Act
		let timed_out = tokio::time::timeout(
			std::time::Duration::from_millis(20),
			manager.run(TransactionOptions::default(), |_tx| async move {
				tokio::time::sleep(std::time::Duration::from_secs(5)).await;
				Ok::<_, TransactionError>(())
			}),
		)
		.await;
		for _ in 0..10 {
			tokio::task::yield_now().await;
		}

		// Assert
		assert!(timed_out.is_err());
		assert_eq!(manager.state(), TransactionState::Idle);
		assert_eq!(pool.statements(), vec!["BEGIN", "ROLLBACK"]);
		assert_eq!(pool.released(), 1);
	}

	#[rstest]
	fn test_drop_outside_runtime_rolls_back_on_begin_runtime(pool: MockPool) {
		// Arrange
		let runtime = tokio::runtime::Builder::new_current_thread()
			.enable_time()
			.build()
			.unwrap();
		let mut manager = create_transaction_manager(pool.clone());
		runtime
			.block_on(manager.begin(TransactionOptions::default()))
			.unwrap();

		// Act
		drop(manager);
		runtime.block_on(async {
			for _ in 0..10 {
				tokio::task::yield_now().await;
			}
		});

		// Assert
		assert_eq!(pool.statements(), vec!["BEGIN", "ROLLBACK"]);
		assert_eq!(pool.released(), 1);
	}
}
