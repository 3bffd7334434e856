//! Pool acquisition errors

/// Result type for pool operations
pub type PoolResult<T> = std::result::Result<T, PoolError>;

/// Errors raised while obtaining a connection from a pool
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
	/// Invalid pool configuration
	#[error("Invalid pool configuration: {0}")]
	Config(String),

	/// No connection became available before the acquire timeout elapsed
	#[error("Timed out waiting for a connection")]
	Timeout,

	/// Every connection is checked out and the pool cannot grow
	#[error("Connection pool exhausted")]
	Exhausted,

	/// The pool has been closed
	#[error("Connection pool is closed")]
	Closed,

	/// Establishing a new connection failed
	#[error("Failed to acquire connection: {0}")]
	Acquire(String),

	/// Error raised by the sqlx driver
	#[cfg(feature = "sqlx")]
	#[error("Driver error: {0}")]
	Sqlx(sqlx::Error),
}

#[cfg(feature = "sqlx")]
impl From<sqlx::Error> for PoolError {
	fn from(err: sqlx::Error) -> Self {
		match err {
			sqlx::Error::PoolTimedOut => PoolError::Timeout,
			sqlx::Error::PoolClosed => PoolError::Closed,
			other => PoolError::Sqlx(other),
		}
	}
}
