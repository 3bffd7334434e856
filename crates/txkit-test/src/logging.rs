//! Test logging utilities
//!
//! Provides utilities for initializing logging in test environments.

use std::sync::Once;

use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

/// Initialize logging for tests (call once)
///
/// Installs a `tracing` subscriber writing through the test harness, so
/// output is captured per test. Filtering follows `RUST_LOG`, defaulting to
/// `txkit_db=debug`.
///
/// # Examples
///
/// ```
/// use txkit_test::logging::init_test_logging;
///
/// init_test_logging();
/// init_test_logging(); // later calls are no-ops
/// ```
pub fn init_test_logging() {
	INIT.call_once(|| {
		let filter = EnvFilter::try_from_default_env()
			.unwrap_or_else(|_| EnvFilter::new("txkit_db=debug"));
		let _ = tracing_subscriber::fmt()
			.with_env_filter(filter)
			.with_test_writer()
			.try_init();
	});
}
