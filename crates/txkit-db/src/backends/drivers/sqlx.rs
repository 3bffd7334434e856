//! sqlx-backed pool
//!
//! [`SqlxPool`] adapts an [`sqlx::AnyPool`] to the [`ConnectionPool`] seam so
//! the transaction layer can run against PostgreSQL, MySQL or SQLite chosen
//! by URL scheme at runtime.
//!
//! Every statement goes through `sqlx::query`; `$1`-style placeholders are
//! passed through to the driver untouched.
//!
//! A [`SqlxConnection`] dropped without going through
//! [`ConnectionPool::release`] may still be inside a transaction, so it is
//! closed instead of being returned to the pool.

use async_trait::async_trait;
use sqlx::any::{AnyArguments, AnyPoolOptions, AnyRow};
use sqlx::pool::PoolConnection;
use sqlx::query::Query;
use sqlx::{Any, AnyPool, Column as _, Row as _};
use uuid::Uuid;

use crate::backends::{
	Connection, ConnectionPool, DatabaseError, QueryResult, QueryValue, Result, Row,
};
use crate::pool::{PoolConfig, PoolError, PoolResult};
use txkit_conf::mask_url_password;

/// Connection pool backed by `sqlx::AnyPool`
///
/// Cloning is cheap; clones share the underlying pool.
#[derive(Clone)]
pub struct SqlxPool {
	pool: AnyPool,
	config: PoolConfig,
	url: String,
}

impl std::fmt::Debug for SqlxPool {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("SqlxPool")
			.field("url", &self.url())
			.field("config", &self.config)
			.finish_non_exhaustive()
	}
}

impl SqlxPool {
	/// Connect a pool to `url` using `config`
	///
	/// # Examples
	///
	/// ```
	/// use txkit_db::backends::drivers::sqlx::SqlxPool;
	/// use txkit_db::pool::PoolConfig;
	///
	/// # async fn example() {
	/// let config = PoolConfig::default().with_max_connections(1);
	/// let pool = SqlxPool::connect("sqlite::memory:", config).await.unwrap();
	/// assert!(pool.url().contains("memory"));
	/// assert_eq!(pool.config().max_connections, 1);
	/// # }
	/// # tokio::runtime::Runtime::new().unwrap().block_on(example());
	/// ```
	pub async fn connect(url: &str, config: PoolConfig) -> PoolResult<Self> {
		config.validate().map_err(PoolError::Config)?;
		sqlx::any::install_default_drivers();

		let pool = AnyPoolOptions::new()
			.min_connections(config.min_connections)
			.max_connections(config.max_connections)
			.acquire_timeout(config.acquire_timeout)
			.idle_timeout(config.idle_timeout)
			.max_lifetime(config.max_lifetime)
			.test_before_acquire(config.test_before_acquire)
			.connect(url)
			.await?;

		tracing::info!(
			url = %mask_url_password(url),
			max_connections = config.max_connections,
			"connection pool created"
		);

		Ok(Self {
			pool,
			config,
			url: url.to_string(),
		})
	}

	/// Connect a pool from loaded settings
	pub async fn from_settings(settings: &txkit_conf::DatabaseSettings) -> PoolResult<Self> {
		Self::connect(&settings.url, PoolConfig::from(&settings.pool)).await
	}

	/// Database URL with the password masked
	pub fn url(&self) -> String {
		mask_url_password(&self.url)
	}

	pub fn config(&self) -> &PoolConfig {
		&self.config
	}

	/// The wrapped sqlx pool
	pub fn inner(&self) -> &AnyPool {
		&self.pool
	}

	/// Number of open connections, idle or in use
	pub fn size(&self) -> u32 {
		self.pool.size()
	}

	pub fn num_idle(&self) -> usize {
		self.pool.num_idle()
	}

	/// Close the pool, waiting for checked out connections to come back
	pub async fn close(&self) {
		self.pool.close().await;
	}

	pub fn is_closed(&self) -> bool {
		self.pool.is_closed()
	}
}

#[async_trait]
impl ConnectionPool for SqlxPool {
	type Connection = SqlxConnection;

	async fn acquire(&self) -> PoolResult<SqlxConnection> {
		let conn = self.pool.acquire().await?;
		let connection = SqlxConnection {
			id: Uuid::new_v4().to_string(),
			conn,
			released: false,
		};
		tracing::debug!(connection_id = %connection.id, "connection acquired");
		Ok(connection)
	}

	async fn release(&self, mut conn: SqlxConnection) {
		tracing::debug!(connection_id = %conn.id, "connection released");
		// Dropping a released PoolConnection hands it back to the pool
		conn.released = true;
		drop(conn);
	}
}

/// A connection checked out of a [`SqlxPool`]
pub struct SqlxConnection {
	id: String,
	conn: PoolConnection<Any>,
	released: bool,
}

impl Drop for SqlxConnection {
	fn drop(&mut self) {
		if !self.released {
			tracing::warn!(
				connection_id = %self.id,
				"connection dropped without release, closing it"
			);
			self.conn.close_on_drop();
		}
	}
}

impl std::fmt::Debug for SqlxConnection {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("SqlxConnection")
			.field("id", &self.id)
			.finish_non_exhaustive()
	}
}

impl SqlxConnection {
	/// The underlying sqlx connection, for statements this layer cannot express
	pub fn raw(&mut self) -> &mut sqlx::AnyConnection {
		&mut self.conn
	}
}

#[async_trait]
impl Connection for SqlxConnection {
	fn connection_id(&self) -> &str {
		&self.id
	}

	async fn execute(&mut self, sql: &str, params: Vec<QueryValue>) -> Result<QueryResult> {
		let result = bind_all(sqlx::query(sql), params)
			.execute(&mut *self.conn)
			.await?;
		Ok(QueryResult {
			rows_affected: result.rows_affected(),
		})
	}

	async fn fetch_all(&mut self, sql: &str, params: Vec<QueryValue>) -> Result<Vec<Row>> {
		let rows = bind_all(sqlx::query(sql), params)
			.fetch_all(&mut *self.conn)
			.await?;
		rows.iter().map(decode_row).collect()
	}
}

fn bind_all<'q>(
	mut query: Query<'q, Any, AnyArguments<'q>>,
	params: Vec<QueryValue>,
) -> Query<'q, Any, AnyArguments<'q>> {
	for value in params {
		query = match value {
			QueryValue::Null => query.bind(Option::<String>::None),
			QueryValue::Bool(b) => query.bind(b),
			QueryValue::Int(i) => query.bind(i),
			QueryValue::Float(f) => query.bind(f),
			QueryValue::String(s) => query.bind(s),
			QueryValue::Bytes(b) => query.bind(b),
			// The Any driver has no native timestamp or uuid type
			QueryValue::Timestamp(dt) => query.bind(dt.to_rfc3339()),
			QueryValue::Uuid(u) => query.bind(u.to_string()),
		};
	}
	query
}

fn decode_row(row: &AnyRow) -> Result<Row> {
	let mut decoded = Row::new();
	for column in row.columns() {
		let value = decode_column(row, column.ordinal(), column.name())?;
		decoded.insert(column.name(), value);
	}
	Ok(decoded)
}

fn decode_column(row: &AnyRow, index: usize, name: &str) -> Result<QueryValue> {
	if let Ok(value) = row.try_get::<Option<i64>, _>(index) {
		return Ok(value.into());
	}
	if let Ok(value) = row.try_get::<Option<f64>, _>(index) {
		return Ok(value.into());
	}
	if let Ok(value) = row.try_get::<Option<String>, _>(index) {
		return Ok(value.into());
	}
	if let Ok(value) = row.try_get::<Option<bool>, _>(index) {
		return Ok(value.into());
	}
	if let Ok(value) = row.try_get::<Option<Vec<u8>>, _>(index) {
		return Ok(value.into());
	}
	Err(DatabaseError::TypeError(format!(
		"Unsupported type for column '{}'",
		name
	)))
}
