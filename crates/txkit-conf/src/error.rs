//! Settings loading errors

use std::path::PathBuf;

use crate::env::EnvError;

/// Errors raised while loading or validating [`DatabaseSettings`](crate::DatabaseSettings)
///
/// Messages never include the database URL.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
	#[error("Failed to read settings file {path}: {source}")]
	Io {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("Invalid TOML settings: {0}")]
	Toml(#[from] toml::de::Error),

	#[error(transparent)]
	Env(#[from] EnvError),

	#[error("Invalid settings: {0}")]
	Invalid(String),
}

pub type SettingsResult<T> = std::result::Result<T, SettingsError>;
