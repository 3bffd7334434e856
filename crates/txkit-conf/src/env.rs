//! Environment variable reader
//!
//! Typed access to environment variables under an optional prefix, used by
//! [`DatabaseSettings::from_env`](crate::DatabaseSettings::from_env).

use std::env;
use std::fmt::Display;
use std::str::FromStr;

/// Prefix used by [`Env::default`]
pub const DEFAULT_PREFIX: &str = "TXKIT_";

/// Environment variable reader with prefix support
#[derive(Debug, Clone)]
pub struct Env {
	/// Prefix prepended to every key (e.g., "TXKIT_")
	pub prefix: Option<String>,
}

impl Env {
	/// Reader without a prefix
	pub fn new() -> Self {
		Self { prefix: None }
	}

	/// Set a prefix for all environment variable lookups
	pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
		self.prefix = Some(prefix.into());
		self
	}

	/// Get the full key name with prefix
	pub fn key_name(&self, key: &str) -> String {
		match &self.prefix {
			Some(prefix) => format!("{}{}", prefix, key),
			None => key.to_string(),
		}
	}

	/// Raw value, `None` when unset
	pub fn optional_str(&self, key: &str) -> Result<Option<String>, EnvError> {
		let full_key = self.key_name(key);
		validate_env_var_name(&full_key)?;

		match env::var(&full_key) {
			Ok(val) => Ok(Some(val)),
			Err(env::VarError::NotPresent) => Ok(None),
			Err(env::VarError::NotUnicode(_)) => Err(EnvError::ParseError {
				key: full_key,
				value_len: 0,
				error: "value is not valid unicode".to_string(),
			}),
		}
	}

	/// Read a string value from environment
	pub fn str(&self, key: &str) -> Result<String, EnvError> {
		self.optional_str(key)?
			.ok_or_else(|| EnvError::MissingVariable(self.key_name(key)))
	}

	/// Read a boolean value with a default
	///
	/// Accepts `true/false`, `yes/no`, `on/off` and `1/0`, case-insensitively.
	pub fn bool_with_default(&self, key: &str, default: bool) -> Result<bool, EnvError> {
		match self.optional_str(key)? {
			Some(val) => parse_bool(&val).map_err(|e| EnvError::ParseError {
				key: self.key_name(key),
				value_len: val.len(),
				error: e,
			}),
			None => Ok(default),
		}
	}

	/// Read and parse a value, `None` when unset
	pub fn optional<T>(&self, key: &str) -> Result<Option<T>, EnvError>
	where
		T: FromStr,
		T::Err: Display,
	{
		let Some(val) = self.optional_str(key)? else {
			return Ok(None);
		};
		val.trim()
			.parse::<T>()
			.map(Some)
			.map_err(|e| EnvError::ParseError {
				key: self.key_name(key),
				value_len: val.len(),
				error: e.to_string(),
			})
	}

	/// Read and parse a value with a default
	pub fn parse_with_default<T>(&self, key: &str, default: T) -> Result<T, EnvError>
	where
		T: FromStr,
		T::Err: Display,
	{
		Ok(self.optional(key)?.unwrap_or(default))
	}
}

impl Default for Env {
	fn default() -> Self {
		Self::new().with_prefix(DEFAULT_PREFIX)
	}
}

/// Parse the boolean spellings accepted by [`Env::bool_with_default`]
pub fn parse_bool(value: &str) -> Result<bool, String> {
	match value.trim().to_ascii_lowercase().as_str() {
		"true" | "yes" | "on" | "1" => Ok(true),
		"false" | "no" | "off" | "0" => Ok(false),
		other => Err(format!("'{}' is not a boolean", other)),
	}
}

/// Validates an environment variable name.
///
/// Rejects names that are empty, contain control characters, or contain
/// the `=` character (which is used as the key-value separator).
pub fn validate_env_var_name(name: &str) -> Result<(), EnvError> {
	if name.is_empty() {
		return Err(EnvError::InvalidVariableName {
			name: name.to_string(),
			reason: "environment variable name must not be empty".to_string(),
		});
	}

	if let Some(pos) = name.find(|c: char| c.is_control()) {
		return Err(EnvError::InvalidVariableName {
			name: name.to_string(),
			reason: format!(
				"environment variable name contains control character at position {}",
				pos
			),
		});
	}

	if name.contains('=') {
		return Err(EnvError::InvalidVariableName {
			name: name.to_string(),
			reason: "environment variable name must not contain '='".to_string(),
		});
	}

	Ok(())
}

/// Environment variable errors
#[derive(Debug, thiserror::Error)]
pub enum EnvError {
	#[error("Missing environment variable: {0}")]
	MissingVariable(String),

	#[error("Failed to parse environment variable '{key}' (value length: {value_len}): {error}")]
	ParseError {
		key: String,
		/// Length of the original value (stored instead of the raw value to prevent secret leakage)
		value_len: usize,
		error: String,
	},

	#[error("Invalid environment variable name '{name}': {reason}")]
	InvalidVariableName { name: String, reason: String },
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;
	use serial_test::serial;

	#[rstest]
	#[serial(env)]
	fn test_prefixed_lookup() {
		// Arrange
		// SAFETY: serialized with every other test touching the environment
		unsafe {
			env::set_var("TXKIT_ENV_TEST_STR", "hello");
		}
		let env = Env::default();

		// Act
		let value = env.str("ENV_TEST_STR");

		// Assert
		assert_eq!(value.unwrap(), "hello");
		// SAFETY: serialized with every other test touching the environment
		unsafe {
			env::remove_var("TXKIT_ENV_TEST_STR");
		}
	}

	#[rstest]
	#[serial(env)]
	fn test_missing_variable_reports_full_key() {
		// Arrange
		let env = Env::new().with_prefix("APP_");

		// Act
		let result = env.str("ENV_TEST_ABSENT");

		// Assert
		assert!(matches!(
			result,
			Err(EnvError::MissingVariable(key)) if key == "APP_ENV_TEST_ABSENT"
		));
	}

	#[rstest]
	#[case("true", true)]
	#[case("YES", true)]
	#[case("on", true)]
	#[case("1", true)]
	#[case("false", false)]
	#[case("No", false)]
	#[case("off", false)]
	#[case("0", false)]
	fn test_parse_bool(#[case] input: &str, #[case] expected: bool) {
		// Act
		let parsed = parse_bool(input);

		// Assert
		assert_eq!(parsed, Ok(expected));
	}

	#[rstest]
	#[serial(env)]
	fn test_parse_error_does_not_leak_value() {
		// Arrange
		// SAFETY: serialized with every other test touching the environment
		unsafe {
			env::set_var("TXKIT_ENV_TEST_NUM", "secret-value");
		}
		let env = Env::default();

		// Act
		let result = env.optional::<u32>("ENV_TEST_NUM");

		// Assert
		let message = result.unwrap_err().to_string();
		assert!(message.contains("value length: 12"));
		assert!(!message.contains("secret-value"));
		// SAFETY: serialized with every other test touching the environment
		unsafe {
			env::remove_var("TXKIT_ENV_TEST_NUM");
		}
	}

	#[rstest]
	#[serial(env)]
	fn test_defaults_apply_when_unset() {
		// Arrange
		let env = Env::default();

		// Act
		let flag = env.bool_with_default("ENV_TEST_FLAG_ABSENT", true);
		let number = env.parse_with_default("ENV_TEST_NUMBER_ABSENT", 7_u32);

		// Assert
		assert!(flag.unwrap());
		assert_eq!(number.unwrap(), 7);
	}

	#[rstest]
	fn test_env_rejects_empty_key_name() {
		// Arrange
		let env = Env::new();

		// Act
		let result = env.str("");

		// Assert
		assert!(matches!(
			result.unwrap_err(),
			EnvError::InvalidVariableName { .. }
		));
	}
}
