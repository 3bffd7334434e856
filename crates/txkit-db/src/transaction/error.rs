//! Transaction error types

use crate::backends::DatabaseError;
use crate::pool::PoolError;

/// Boxed caller error preserved inside [`TransactionError::RollbackFailed`]
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type for transaction operations
pub type TransactionResult<T> = std::result::Result<T, TransactionError>;

/// Errors raised by the transaction layer
#[derive(Debug, thiserror::Error)]
pub enum TransactionError {
	/// The pool could not supply a connection; no transaction was opened
	#[error("Failed to acquire connection: {0}")]
	Acquire(#[source] PoolError),

	/// `BEGIN` failed; the connection has been released
	#[error("Failed to begin transaction: {0}")]
	Begin(#[source] DatabaseError),

	/// `COMMIT` failed; the connection has been released
	#[error("Failed to commit transaction: {0}")]
	Commit(#[source] DatabaseError),

	/// `ROLLBACK` failed; the connection has been released
	#[error("Failed to rollback transaction: {0}")]
	Rollback(#[source] DatabaseError),

	/// The unit of work failed and the rollback that followed failed too
	///
	/// `error` is the original failure, unchanged; `rollback` is the
	/// secondary failure of the `ROLLBACK` statement.
	#[error("Transaction failed ({error}) and rollback also failed ({rollback})")]
	RollbackFailed {
		#[source]
		error: BoxError,
		rollback: DatabaseError,
	},

	/// A statement issued inside the transaction failed
	#[error(transparent)]
	Database(#[from] DatabaseError),

	/// `begin` was called while a transaction is already active
	#[error("Transaction already active")]
	AlreadyActive,

	/// `commit` was called without an active transaction
	#[error("No active transaction to commit")]
	NoActiveToCommit,

	/// `rollback` was called without an active transaction
	#[error("No active transaction to rollback")]
	NoActiveToRollback,

	/// The context was requested without an active transaction
	#[error("No active transaction")]
	NoActive,

	/// A context was used after its transaction ended
	#[error("Transaction {0} is no longer active")]
	Closed(uuid::Uuid),
}

impl TransactionError {
	/// Whether this error reports misuse of the manager's state machine
	///
	/// Protocol errors leave the manager unchanged and usable.
	pub fn is_protocol_error(&self) -> bool {
		matches!(
			self,
			TransactionError::AlreadyActive
				| TransactionError::NoActiveToCommit
				| TransactionError::NoActiveToRollback
				| TransactionError::NoActive
		)
	}

	/// The original unit-of-work error carried by [`TransactionError::RollbackFailed`]
	pub fn original_error(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
		match self {
			TransactionError::RollbackFailed { error, .. } => Some(error.as_ref()),
			_ => None,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	#[case(TransactionError::AlreadyActive, "Transaction already active")]
	#[case(TransactionError::NoActiveToCommit, "No active transaction to commit")]
	#[case(
		TransactionError::NoActiveToRollback,
		"No active transaction to rollback"
	)]
	#[case(TransactionError::NoActive, "No active transaction")]
	fn test_protocol_error_messages(#[case] error: TransactionError, #[case] expected: &str) {
		// Assert
		assert_eq!(error.to_string(), expected);
		assert!(error.is_protocol_error());
	}

	#[rstest]
	fn test_rollback_failed_keeps_both_errors() {
		// Arrange
		let original: BoxError = "insert violated constraint".into();
		let error = TransactionError::RollbackFailed {
			error: original,
			rollback: DatabaseError::Connection("socket closed".to_string()),
		};

		// Act
		let message = error.to_string();
		let source = std::error::Error::source(&error).map(ToString::to_string);

		// Assert
		assert!(message.contains("insert violated constraint"));
		assert!(message.contains("socket closed"));
		assert_eq!(source.as_deref(), Some("insert violated constraint"));
		assert_eq!(
			error.original_error().map(ToString::to_string).as_deref(),
			Some("insert violated constraint")
		);
		assert!(!error.is_protocol_error());
	}
}
