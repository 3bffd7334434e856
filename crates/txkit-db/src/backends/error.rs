//! Statement execution errors

/// Result type for statement execution
pub type Result<T> = std::result::Result<T, DatabaseError>;

/// Errors reported by a [`Connection`](super::Connection)
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
	/// The database rejected or failed to run a statement
	#[error("Query error: {0}")]
	Query(String),

	/// The connection is broken or was closed underneath the caller
	#[error("Connection error: {0}")]
	Connection(String),

	/// A row did not contain the requested column
	#[error("Column not found: {0}")]
	ColumnNotFound(String),

	/// A value could not be converted to the requested Rust type
	#[error("Type error: {0}")]
	TypeError(String),

	/// A statement expected to return a row returned none
	#[error("No rows returned by a query that expected at least one row")]
	NotFound,

	/// Error raised by the sqlx driver
	#[cfg(feature = "sqlx")]
	#[error("Driver error: {0}")]
	Sqlx(#[from] sqlx::Error),
}
