//! Transaction management
//!
//! - [`with_transaction`] / [`transaction`]: scoped execution of a unit of work
//! - [`TransactionManager`]: explicit begin / commit / rollback state machine
//! - [`TransactionContext`]: the handle a unit of work uses to issue statements
//! - [`statement`]: the pure SQL builders behind both APIs

pub mod context;
pub mod error;
pub mod executor;
pub mod manager;
pub mod statement;

#[cfg(test)]
mod mock;

pub use context::TransactionContext;
pub use error::{BoxError, TransactionError, TransactionResult};
pub use executor::{transaction, with_transaction};
pub use manager::{TransactionManager, TransactionState, create_transaction_manager};
pub use statement::{
	COMMIT, IsolationLevel, ParseIsolationLevelError, ROLLBACK, TransactionOptions,
	build_begin_statement, build_release_savepoint_statement,
	build_rollback_to_savepoint_statement, build_savepoint_statement,
};
