//! Control statement construction
//!
//! Pure functions turning [`TransactionOptions`] and savepoint names into the
//! literal SQL sent to the database. The generated text follows the
//! PostgreSQL grammar:
//!
//! ```text
//! BEGIN[ ISOLATION LEVEL <level>][ READ ONLY[ DEFERRABLE]]
//! COMMIT
//! ROLLBACK
//! SAVEPOINT <name>
//! ROLLBACK TO SAVEPOINT <name>
//! RELEASE SAVEPOINT <name>
//! ```
//!
//! Savepoint names are substituted verbatim. They are neither validated nor
//! quoted; an invalid name is reported by the database when the statement runs.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Statement that commits the current transaction
pub const COMMIT: &str = "COMMIT";

/// Statement that aborts the current transaction
pub const ROLLBACK: &str = "ROLLBACK";

/// Transaction isolation levels, weakest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IsolationLevel {
	#[serde(rename = "READ UNCOMMITTED")]
	ReadUncommitted,
	#[serde(rename = "READ COMMITTED")]
	ReadCommitted,
	#[serde(rename = "REPEATABLE READ")]
	RepeatableRead,
	#[serde(rename = "SERIALIZABLE")]
	Serializable,
}

impl IsolationLevel {
	/// Convert isolation level to SQL string
	///
	/// # Examples
	///
	/// ```
	/// use txkit_db::IsolationLevel;
	///
	/// assert_eq!(IsolationLevel::Serializable.to_sql(), "SERIALIZABLE");
	/// assert_eq!(IsolationLevel::ReadCommitted.to_sql(), "READ COMMITTED");
	/// ```
	pub fn to_sql(&self) -> &'static str {
		match self {
			IsolationLevel::ReadUncommitted => "READ UNCOMMITTED",
			IsolationLevel::ReadCommitted => "READ COMMITTED",
			IsolationLevel::RepeatableRead => "REPEATABLE READ",
			IsolationLevel::Serializable => "SERIALIZABLE",
		}
	}
}

impl fmt::Display for IsolationLevel {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.to_sql())
	}
}

/// Error returned when parsing an unknown isolation level name
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown isolation level '{0}'")]
pub struct ParseIsolationLevelError(pub String);

impl FromStr for IsolationLevel {
	type Err = ParseIsolationLevelError;

	/// Accepts the SQL spelling and its snake/kebab case variants
	///
	/// # Examples
	///
	/// ```
	/// use txkit_db::IsolationLevel;
	///
	/// assert_eq!("READ COMMITTED".parse(), Ok(IsolationLevel::ReadCommitted));
	/// assert_eq!("repeatable_read".parse(), Ok(IsolationLevel::RepeatableRead));
	/// assert_eq!("read-uncommitted".parse(), Ok(IsolationLevel::ReadUncommitted));
	/// assert!("snapshot".parse::<IsolationLevel>().is_err());
	/// ```
	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let normalized = s.trim().to_ascii_uppercase().replace(['_', '-'], " ");
		match normalized.as_str() {
			"READ UNCOMMITTED" => Ok(IsolationLevel::ReadUncommitted),
			"READ COMMITTED" => Ok(IsolationLevel::ReadCommitted),
			"REPEATABLE READ" => Ok(IsolationLevel::RepeatableRead),
			"SERIALIZABLE" => Ok(IsolationLevel::Serializable),
			_ => Err(ParseIsolationLevelError(s.to_string())),
		}
	}
}

/// Options controlling how a transaction is opened
///
/// `deferrable` only has an effect together with `read_only`; on its own it is
/// ignored when the `BEGIN` statement is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TransactionOptions {
	pub isolation_level: Option<IsolationLevel>,
	pub read_only: bool,
	pub deferrable: bool,
}

impl TransactionOptions {
	/// Options producing a plain `BEGIN`
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_isolation_level(mut self, level: IsolationLevel) -> Self {
		self.isolation_level = Some(level);
		self
	}

	pub fn read_only(mut self, read_only: bool) -> Self {
		self.read_only = read_only;
		self
	}

	pub fn deferrable(mut self, deferrable: bool) -> Self {
		self.deferrable = deferrable;
		self
	}

	/// Render the `BEGIN` statement for these options
	///
	/// # Examples
	///
	/// ```
	/// use txkit_db::{IsolationLevel, TransactionOptions};
	///
	/// let options = TransactionOptions::new()
	///     .with_isolation_level(IsolationLevel::RepeatableRead)
	///     .read_only(true);
	/// assert_eq!(options.begin_statement(), "BEGIN ISOLATION LEVEL REPEATABLE READ READ ONLY");
	/// ```
	pub fn begin_statement(&self) -> String {
		build_begin_statement(self)
	}

	/// Default options taken from loaded settings
	pub fn from_settings(
		settings: &txkit_conf::TransactionSettings,
	) -> Result<Self, ParseIsolationLevelError> {
		let isolation_level = settings
			.isolation_level
			.as_deref()
			.map(str::parse)
			.transpose()?;
		Ok(Self {
			isolation_level,
			read_only: settings.read_only,
			deferrable: settings.deferrable,
		})
	}
}

/// Build the `BEGIN` statement for `options`
///
/// Tokens are appended in a fixed order: isolation level, then `READ ONLY`,
/// then `DEFERRABLE` (only when read-only).
///
/// # Examples
///
/// ```
/// use txkit_db::transaction::statement::build_begin_statement;
/// use txkit_db::{IsolationLevel, TransactionOptions};
///
/// assert_eq!(build_begin_statement(&TransactionOptions::default()), "BEGIN");
///
/// let options = TransactionOptions::new()
///     .with_isolation_level(IsolationLevel::Serializable)
///     .read_only(true)
///     .deferrable(true);
/// assert_eq!(
///     build_begin_statement(&options),
///     "BEGIN ISOLATION LEVEL SERIALIZABLE READ ONLY DEFERRABLE"
/// );
/// ```
pub fn build_begin_statement(options: &TransactionOptions) -> String {
	let mut sql = String::from("BEGIN");

	if let Some(level) = options.isolation_level {
		sql.push_str(" ISOLATION LEVEL ");
		sql.push_str(level.to_sql());
	}

	if options.read_only {
		sql.push_str(" READ ONLY");
		if options.deferrable {
			sql.push_str(" DEFERRABLE");
		}
	}

	sql
}

/// `SAVEPOINT <name>`
pub fn build_savepoint_statement(name: &str) -> String {
	format!("SAVEPOINT {}", name)
}

/// `ROLLBACK TO SAVEPOINT <name>`
pub fn build_rollback_to_savepoint_statement(name: &str) -> String {
	format!("ROLLBACK TO SAVEPOINT {}", name)
}

/// `RELEASE SAVEPOINT <name>`
pub fn build_release_savepoint_statement(name: &str) -> String {
	format!("RELEASE SAVEPOINT {}", name)
}
