//! # Backends
//!
//! The seams this layer consumes from its collaborators.
//!
//! - **[`ConnectionPool`]**: lends an exclusive [`Connection`] and takes it back
//! - **[`Connection`]**: executes raw SQL text with bound parameters
//!
//! The transaction layer only ever talks to these two traits, so any pool
//! (a real sqlx pool, a test double, an instrumented wrapper) can sit behind it.
//!
//! ```rust,ignore
//! use txkit_db::backends::{Connection, ConnectionPool};
//!
//! let mut conn = pool.acquire().await?;
//! conn.execute("SELECT 1", vec![]).await?;
//! pool.release(conn).await;
//! ```

pub mod drivers;
pub mod error;
pub mod types;

pub use error::{DatabaseError, Result};
pub use types::{QueryResult, QueryValue, Row};

use std::sync::Arc;

use async_trait::async_trait;

use crate::pool::PoolResult;

/// A connection lent out by a [`ConnectionPool`]
///
/// A connection is exclusively owned by whoever acquired it until it is handed
/// back through [`ConnectionPool::release`]. Statements run strictly in the
/// order they are issued.
#[async_trait]
pub trait Connection: Send + 'static {
	/// Identifier used to correlate log events for this connection
	fn connection_id(&self) -> &str;

	/// Execute a statement that does not return rows
	async fn execute(&mut self, sql: &str, params: Vec<QueryValue>) -> Result<QueryResult>;

	/// Execute a statement and collect every returned row
	async fn fetch_all(&mut self, sql: &str, params: Vec<QueryValue>) -> Result<Vec<Row>>;

	/// Execute a statement and return the first row, if any
	async fn fetch_optional(&mut self, sql: &str, params: Vec<QueryValue>) -> Result<Option<Row>> {
		let rows = self.fetch_all(sql, params).await?;
		Ok(rows.into_iter().next())
	}
}

/// A pool of reusable database connections
///
/// `acquire` may fail (pool exhausted, acquire timeout, pool closed).
/// `release` is infallible: it is always safe to hand back a connection that
/// was previously acquired from the same pool.
#[async_trait]
pub trait ConnectionPool: Send + Sync + 'static {
	type Connection: Connection;

	/// Borrow an exclusive connection
	async fn acquire(&self) -> PoolResult<Self::Connection>;

	/// Return a connection to the pool
	async fn release(&self, conn: Self::Connection);
}

#[async_trait]
impl<P: ConnectionPool> ConnectionPool for Arc<P> {
	type Connection = P::Connection;

	async fn acquire(&self) -> PoolResult<Self::Connection> {
		(**self).acquire().await
	}

	async fn release(&self, conn: Self::Connection) {
		(**self).release(conn).await
	}
}
