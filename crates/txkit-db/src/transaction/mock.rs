//! In-memory pool used by the transaction unit tests

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::backends::{Connection, ConnectionPool, DatabaseError, QueryResult, QueryValue, Row};
use crate::pool::{PoolError, PoolResult};

#[derive(Default)]
struct Shared {
	statements: Mutex<Vec<String>>,
	acquired: AtomicUsize,
	released: AtomicUsize,
}

pub(crate) struct MockConnection {
	id: String,
	shared: Arc<Shared>,
	fail_on: Vec<&'static str>,
}

#[async_trait]
impl Connection for MockConnection {
	fn connection_id(&self) -> &str {
		&self.id
	}

	async fn execute(
		&mut self,
		sql: &str,
		_params: Vec<QueryValue>,
	) -> crate::backends::Result<QueryResult> {
		self.shared.statements.lock().push(sql.to_string());
		if self.fail_on.iter().any(|prefix| sql.starts_with(prefix)) {
			return Err(DatabaseError::Query(format!("{} rejected", sql)));
		}
		Ok(QueryResult { rows_affected: 1 })
	}

	async fn fetch_all(
		&mut self,
		sql: &str,
		_params: Vec<QueryValue>,
	) -> crate::backends::Result<Vec<Row>> {
		self.shared.statements.lock().push(sql.to_string());
		let mut row = Row::new();
		row.insert("n", QueryValue::Int(1));
		Ok(vec![row])
	}
}

#[derive(Clone, Default)]
pub(crate) struct MockPool {
	shared: Arc<Shared>,
	fail_on: Vec<&'static str>,
	exhausted: bool,
}

impl MockPool {
	pub(crate) fn new() -> Self {
		Self::default()
	}

	/// Statements starting with `prefix` fail
	pub(crate) fn failing(prefix: &'static str) -> Self {
		Self {
			fail_on: vec![prefix],
			..Self::default()
		}
	}

	pub(crate) fn exhausted() -> Self {
		Self {
			exhausted: true,
			..Self::default()
		}
	}

	pub(crate) fn statements(&self) -> Vec<String> {
		self.shared.statements.lock().clone()
	}

	pub(crate) fn acquired(&self) -> usize {
		self.shared.acquired.load(Ordering::SeqCst)
	}

	pub(crate) fn released(&self) -> usize {
		self.shared.released.load(Ordering::SeqCst)
	}
}

#[async_trait]
impl ConnectionPool for MockPool {
	type Connection = MockConnection;

	async fn acquire(&self) -> PoolResult<MockConnection> {
		if self.exhausted {
			return Err(PoolError::Exhausted);
		}
		let n = self.shared.acquired.fetch_add(1, Ordering::SeqCst) + 1;
		Ok(MockConnection {
			id: format!("mock-{}", n),
			shared: Arc::clone(&self.shared),
			fail_on: self.fail_on.clone(),
		})
	}

	async fn release(&self, _conn: MockConnection) {
		self.shared.released.fetch_add(1, Ordering::SeqCst);
	}
}
