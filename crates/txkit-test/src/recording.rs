//! Recording connection pool
//!
//! [`RecordingPool`] stands in for a real database in tests of code built on
//! the transaction layer. It never talks to a server; instead it records
//! every statement issued on any of its connections, in order, and tracks how
//! many connections were acquired and released.
//!
//! # Example
//!
//! ```rust
//! use txkit_db::{TransactionError, transaction};
//! use txkit_test::RecordingPool;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let pool = RecordingPool::new();
//! pool.fail_statements_starting_with("INSERT");
//!
//! let result = transaction(&pool, |tx| async move {
//!     tx.execute("INSERT INTO t VALUES (1)", vec![]).await?;
//!     Ok::<_, TransactionError>(())
//! })
//! .await;
//!
//! assert!(result.is_err());
//! assert_eq!(pool.statements(), vec!["BEGIN", "INSERT INTO t VALUES (1)", "ROLLBACK"]);
//! assert_eq!(pool.outstanding(), 0);
//! # }
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use txkit_db::backends::{
	Connection, ConnectionPool, DatabaseError, QueryResult, QueryValue, Result, Row,
};
use txkit_db::pool::{PoolError, PoolResult};

#[derive(Default)]
struct PoolState {
	statements: Mutex<Vec<String>>,
	failing_prefixes: Mutex<Vec<String>>,
	rows: Mutex<HashMap<String, Vec<Row>>>,
	fail_acquire: AtomicBool,
	acquired: AtomicUsize,
	released: AtomicUsize,
}

impl PoolState {
	fn should_fail(&self, sql: &str) -> bool {
		self.failing_prefixes
			.lock()
			.iter()
			.any(|prefix| sql.starts_with(prefix.as_str()))
	}

	fn record(&self, connection_id: &str, sql: &str) -> Result<()> {
		tracing::trace!(connection_id, sql, "recorded statement");
		self.statements.lock().push(sql.to_string());
		if self.should_fail(sql) {
			return Err(DatabaseError::Query(format!("injected failure for '{}'", sql)));
		}
		Ok(())
	}
}

/// In-memory pool that records statements instead of running them
///
/// Clones share state, so a test can hand one clone to the code under test
/// and inspect another.
#[derive(Clone, Default)]
pub struct RecordingPool {
	state: Arc<PoolState>,
}

impl RecordingPool {
	pub fn new() -> Self {
		Self::default()
	}

	/// Make every subsequent `acquire` fail with [`PoolError::Exhausted`]
	pub fn fail_acquire(&self, fail: bool) {
		self.state.fail_acquire.store(fail, Ordering::SeqCst);
	}

	/// Make statements starting with `prefix` fail with [`DatabaseError::Query`]
	///
	/// The failing statement is still recorded.
	pub fn fail_statements_starting_with(&self, prefix: impl Into<String>) {
		self.state.failing_prefixes.lock().push(prefix.into());
	}

	/// Remove every injected failure
	pub fn clear_failures(&self) {
		self.state.fail_acquire.store(false, Ordering::SeqCst);
		self.state.failing_prefixes.lock().clear();
	}

	/// Rows returned when exactly `sql` is queried
	///
	/// Queries without scripted rows return no rows.
	pub fn script_rows(&self, sql: impl Into<String>, rows: Vec<Row>) {
		self.state.rows.lock().insert(sql.into(), rows);
	}

	/// Every statement issued so far, in order
	pub fn statements(&self) -> Vec<String> {
		self.state.statements.lock().clone()
	}

	/// How many times `sql` was issued
	pub fn count_of(&self, sql: &str) -> usize {
		self.state
			.statements
			.lock()
			.iter()
			.filter(|s| s.as_str() == sql)
			.count()
	}

	/// Forget recorded statements; counters are kept
	pub fn clear_statements(&self) {
		self.state.statements.lock().clear();
	}

	pub fn acquired(&self) -> usize {
		self.state.acquired.load(Ordering::SeqCst)
	}

	pub fn released(&self) -> usize {
		self.state.released.load(Ordering::SeqCst)
	}

	/// Connections acquired and not yet released
	pub fn outstanding(&self) -> usize {
		self.acquired().saturating_sub(self.released())
	}
}

#[async_trait]
impl ConnectionPool for RecordingPool {
	type Connection = RecordingConnection;

	async fn acquire(&self) -> PoolResult<RecordingConnection> {
		if self.state.fail_acquire.load(Ordering::SeqCst) {
			return Err(PoolError::Exhausted);
		}
		let n = self.state.acquired.fetch_add(1, Ordering::SeqCst) + 1;
		Ok(RecordingConnection {
			id: format!("recording-{}", n),
			state: Arc::clone(&self.state),
		})
	}

	async fn release(&self, conn: RecordingConnection) {
		tracing::trace!(connection_id = %conn.id, "released");
		self.state.released.fetch_add(1, Ordering::SeqCst);
	}
}

/// Connection lent out by a [`RecordingPool`]
pub struct RecordingConnection {
	id: String,
	state: Arc<PoolState>,
}

#[async_trait]
impl Connection for RecordingConnection {
	fn connection_id(&self) -> &str {
		&self.id
	}

	async fn execute(&mut self, sql: &str, _params: Vec<QueryValue>) -> Result<QueryResult> {
		self.state.record(&self.id, sql)?;
		Ok(QueryResult { rows_affected: 1 })
	}

	async fn fetch_all(&mut self, sql: &str, _params: Vec<QueryValue>) -> Result<Vec<Row>> {
		self.state.record(&self.id, sql)?;
		Ok(self.state.rows.lock().get(sql).cloned().unwrap_or_default())
	}
}
