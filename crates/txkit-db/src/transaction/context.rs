//! Transaction context handed to units of work
//!
//! A [`TransactionContext`] is bound to the connection its transaction was
//! opened on. It is cheap to clone; every clone talks to the same connection.
//! When the transaction ends the connection is detached from the context and
//! handed back to the pool, after which every clone reports
//! [`TransactionError::Closed`].

use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::{MappedMutexGuard, Mutex, MutexGuard};
use uuid::Uuid;

use super::error::{TransactionError, TransactionResult};
use super::statement::{
	COMMIT, ROLLBACK, TransactionOptions, build_begin_statement,
	build_release_savepoint_statement, build_rollback_to_savepoint_statement,
	build_savepoint_statement,
};
use crate::backends::{Connection, ConnectionPool, DatabaseError, QueryValue, Row};

/// How a transaction is brought to an end
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Completion {
	Commit,
	Rollback,
}

impl Completion {
	fn statement(self) -> &'static str {
		match self {
			Completion::Commit => COMMIT,
			Completion::Rollback => ROLLBACK,
		}
	}
}

/// Capability handle for one transaction attempt
///
/// # Examples
///
/// ```rust,no_run
/// use txkit_db::{TransactionOptions, with_transaction};
/// # use txkit_db::backends::drivers::sqlx::SqlxPool;
///
/// # async fn example(pool: SqlxPool) -> Result<(), anyhow::Error> {
/// with_transaction(&pool, TransactionOptions::default(), |tx| async move {
///     tx.execute("INSERT INTO users (name) VALUES ($1)", vec!["Alice".into()]).await?;
///
///     tx.create_savepoint("before_audit").await?;
///     if tx.execute("INSERT INTO audit (event) VALUES ($1)", vec!["signup".into()]).await.is_err() {
///         // Keeps Alice, drops the failed audit insert
///         tx.rollback_to_savepoint("before_audit").await?;
///     }
///     tx.release_savepoint("before_audit").await?;
///     Ok::<_, anyhow::Error>(())
/// })
/// .await?;
/// # Ok(())
/// # }
/// ```
pub struct TransactionContext<C> {
	id: Uuid,
	slot: Arc<Mutex<Option<C>>>,
}

impl<C> Clone for TransactionContext<C> {
	fn clone(&self) -> Self {
		Self {
			id: self.id,
			slot: Arc::clone(&self.slot),
		}
	}
}

impl<C> std::fmt::Debug for TransactionContext<C> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("TransactionContext")
			.field("id", &self.id)
			.finish_non_exhaustive()
	}
}

impl<C: Connection> TransactionContext<C> {
	fn new(conn: C) -> Self {
		Self {
			id: Uuid::new_v4(),
			slot: Arc::new(Mutex::new(Some(conn))),
		}
	}

	/// Acquire a connection and issue `BEGIN` on it
	///
	/// If `BEGIN` fails the connection goes straight back to the pool.
	pub(crate) async fn open<P>(pool: &P, options: &TransactionOptions) -> TransactionResult<Self>
	where
		P: ConnectionPool<Connection = C>,
	{
		let mut conn = pool.acquire().await.map_err(TransactionError::Acquire)?;
		let sql = build_begin_statement(options);
		tracing::debug!(connection_id = conn.connection_id(), sql = %sql, "beginning transaction");

		if let Err(e) = conn.execute(&sql, vec![]).await {
			tracing::error!(
				connection_id = conn.connection_id(),
				error = %e,
				"BEGIN failed, releasing connection"
			);
			pool.release(conn).await;
			return Err(TransactionError::Begin(e));
		}

		let context = Self::new(conn);
		tracing::debug!(transaction_id = %context.id, "transaction started");
		Ok(context)
	}

	/// Issue `COMMIT` or `ROLLBACK` and hand the connection back to the pool
	///
	/// The connection is released whether or not the statement succeeds.
	/// Closing an already closed context is a no-op.
	pub(crate) async fn close<P>(&self, pool: &P, completion: Completion) -> Result<(), DatabaseError>
	where
		P: ConnectionPool<Connection = C>,
	{
		let Some(mut conn) = self.slot.lock().await.take() else {
			tracing::warn!(transaction_id = %self.id, "transaction already closed");
			return Ok(());
		};

		let sql = completion.statement();
		tracing::debug!(transaction_id = %self.id, sql, "ending transaction");
		let result = conn.execute(sql, vec![]).await;

		let connection_id = conn.connection_id().to_string();
		pool.release(conn).await;
		tracing::debug!(transaction_id = %self.id, connection_id = %connection_id, "connection released");

		if let Err(e) = &result {
			tracing::error!(transaction_id = %self.id, sql, error = %e, "failed to end transaction");
		}
		result.map(|_| ())
	}

	/// False once `close` has taken the connection
	///
	/// Reports `true` while another holder has the slot locked.
	fn holds_connection(&self) -> bool {
		self.slot.try_lock().map_or(true, |slot| slot.is_some())
	}

	/// Identifier of the transaction this context belongs to
	pub fn id(&self) -> Uuid {
		self.id
	}

	/// Whether the transaction is still open
	pub async fn is_open(&self) -> bool {
		self.slot.lock().await.is_some()
	}

	async fn connection(&self) -> TransactionResult<MappedMutexGuard<'_, C>> {
		MutexGuard::try_map(self.slot.lock().await, Option::as_mut).map_err(|_| {
			tracing::warn!(transaction_id = %self.id, "transaction context used after the transaction ended");
			TransactionError::Closed(self.id)
		})
	}

	/// Run a statement and return every row it produces
	pub async fn query(&self, sql: &str, params: Vec<QueryValue>) -> TransactionResult<Vec<Row>> {
		let mut conn = self.connection().await?;
		Ok(conn.fetch_all(sql, params).await?)
	}

	/// Run a statement that must produce at least one row
	pub async fn query_one(&self, sql: &str, params: Vec<QueryValue>) -> TransactionResult<Row> {
		self.query_optional(sql, params)
			.await?
			.ok_or(TransactionError::Database(DatabaseError::NotFound))
	}

	/// Run a statement and return its first row, if any
	pub async fn query_optional(
		&self,
		sql: &str,
		params: Vec<QueryValue>,
	) -> TransactionResult<Option<Row>> {
		let mut conn = self.connection().await?;
		Ok(conn.fetch_optional(sql, params).await?)
	}

	/// Run a statement and return the number of affected rows
	pub async fn execute(&self, sql: &str, params: Vec<QueryValue>) -> TransactionResult<u64> {
		let mut conn = self.connection().await?;
		Ok(conn.execute(sql, params).await?.rows_affected)
	}

	/// Issue `SAVEPOINT <name>`
	pub async fn create_savepoint(&self, name: &str) -> TransactionResult<()> {
		self.control(build_savepoint_statement(name)).await
	}

	/// Issue `ROLLBACK TO SAVEPOINT <name>`
	///
	/// Undoes everything after the savepoint; the transaction stays open.
	pub async fn rollback_to_savepoint(&self, name: &str) -> TransactionResult<()> {
		self.control(build_rollback_to_savepoint_statement(name))
			.await
	}

	/// Issue `RELEASE SAVEPOINT <name>`
	pub async fn release_savepoint(&self, name: &str) -> TransactionResult<()> {
		self.control(build_release_savepoint_statement(name)).await
	}

	async fn control(&self, sql: String) -> TransactionResult<()> {
		let mut conn = self.connection().await?;
		tracing::debug!(transaction_id = %self.id, sql = %sql, "savepoint");
		conn.execute(&sql, vec![]).await?;
		Ok(())
	}

	/// Exclusive access to the bound connection
	///
	/// Other statements on this transaction wait until the guard is dropped.
	/// Do not issue `COMMIT` or `ROLLBACK` through it; end the transaction
	/// through the executor or manager instead.
	pub async fn client(&self) -> TransactionResult<MappedMutexGuard<'_, C>> {
		self.connection().await
	}
}

/// Roll back `context` on a background task of `runtime`
///
/// Used where the transaction can no longer be ended by awaiting, such as in
/// `Drop`. Without a runtime the connection is dropped without `ROLLBACK`.
pub(crate) fn spawn_rollback<P>(
	runtime: Option<Handle>,
	pool: P,
	context: TransactionContext<P::Connection>,
) where
	P: ConnectionPool,
{
	let transaction_id = context.id();
	let Some(runtime) = runtime.or_else(|| Handle::try_current().ok()) else {
		tracing::error!(
			transaction_id = %transaction_id,
			"no async runtime available, abandoned transaction dropped without ROLLBACK"
		);
		return;
	};

	runtime.spawn(async move {
		match context.close(&pool, Completion::Rollback).await {
			Ok(()) => tracing::debug!(transaction_id = %transaction_id, "abandoned transaction rolled back"),
			Err(e) => tracing::error!(
				transaction_id = %transaction_id,
				error = %e,
				"rollback of abandoned transaction failed"
			),
		}
	});
}

/// Rolls back a transaction whose owning future was dropped before ending it
///
/// Does nothing once the transaction has been committed or rolled back.
pub(crate) struct RollbackOnDrop<P: ConnectionPool> {
	pool: Option<P>,
	context: TransactionContext<P::Connection>,
	runtime: Option<Handle>,
}

impl<P: ConnectionPool> RollbackOnDrop<P> {
	pub(crate) fn new(pool: P, context: &TransactionContext<P::Connection>) -> Self {
		Self {
			pool: Some(pool),
			context: context.clone(),
			runtime: Handle::try_current().ok(),
		}
	}
}

impl<P: ConnectionPool> Drop for RollbackOnDrop<P> {
	fn drop(&mut self) {
		let Some(pool) = self.pool.take() else {
			return;
		};
		if !self.context.holds_connection() {
			return;
		}
		tracing::warn!(
			transaction_id = %self.context.id(),
			"transaction abandoned before it ended, rolling back"
		);
		spawn_rollback(self.runtime.take(), pool, self.context.clone());
	}
}
