//! Pool configuration

use std::time::Duration;

/// Settings applied when building a [`SqlxPool`](crate::backends::drivers::sqlx::SqlxPool)
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
	pub max_connections: u32,
	pub min_connections: u32,
	pub acquire_timeout: Duration,
	pub idle_timeout: Option<Duration>,
	pub max_lifetime: Option<Duration>,
	pub test_before_acquire: bool,
}

impl Default for PoolConfig {
	fn default() -> Self {
		Self {
			max_connections: 10,
			min_connections: 1,
			acquire_timeout: Duration::from_secs(30),
			idle_timeout: Some(Duration::from_secs(600)),
			max_lifetime: Some(Duration::from_secs(1800)),
			test_before_acquire: false,
		}
	}
}

impl PoolConfig {
	/// Create a new pool configuration with default values
	///
	/// # Examples
	///
	/// ```rust
	/// use txkit_db::pool::PoolConfig;
	///
	/// let config = PoolConfig::new();
	/// assert_eq!(config.max_connections, 10);
	/// assert_eq!(config.min_connections, 1);
	/// ```
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_max_connections(mut self, max: u32) -> Self {
		self.max_connections = max;
		self
	}

	pub fn with_min_connections(mut self, min: u32) -> Self {
		self.min_connections = min;
		self
	}

	pub fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
		self.acquire_timeout = timeout;
		self
	}

	pub fn with_idle_timeout(mut self, timeout: Option<Duration>) -> Self {
		self.idle_timeout = timeout;
		self
	}

	pub fn with_max_lifetime(mut self, lifetime: Option<Duration>) -> Self {
		self.max_lifetime = lifetime;
		self
	}

	pub fn with_test_before_acquire(mut self, test: bool) -> Self {
		self.test_before_acquire = test;
		self
	}

	/// Check the configuration for contradictory bounds
	///
	/// # Examples
	///
	/// ```rust
	/// use txkit_db::pool::PoolConfig;
	///
	/// assert!(PoolConfig::new().validate().is_ok());
	/// assert!(PoolConfig::new().with_max_connections(0).validate().is_err());
	/// ```
	pub fn validate(&self) -> Result<(), String> {
		if self.max_connections == 0 {
			return Err("max_connections must be greater than zero".to_string());
		}
		if self.max_connections < self.min_connections {
			return Err("max_connections must be >= min_connections".to_string());
		}
		Ok(())
	}
}

impl From<&txkit_conf::PoolSettings> for PoolConfig {
	fn from(settings: &txkit_conf::PoolSettings) -> Self {
		Self {
			max_connections: settings.max_connections,
			min_connections: settings.min_connections,
			acquire_timeout: Duration::from_secs(settings.acquire_timeout_secs),
			idle_timeout: settings.idle_timeout_secs.map(Duration::from_secs),
			max_lifetime: settings.max_lifetime_secs.map(Duration::from_secs),
			test_before_acquire: settings.test_before_acquire,
		}
	}
}
