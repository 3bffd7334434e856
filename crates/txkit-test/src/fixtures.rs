//! rstest fixtures

use rstest::fixture;

use crate::recording::RecordingPool;

/// Fixture providing an empty [`RecordingPool`] that never fails
#[fixture]
pub fn recording_pool() -> RecordingPool {
	crate::logging::init_test_logging();
	RecordingPool::new()
}

/// Fixture providing a [`RecordingPool`] whose `acquire` always fails
#[fixture]
pub fn failing_acquire_pool() -> RecordingPool {
	crate::logging::init_test_logging();
	let pool = RecordingPool::new();
	pool.fail_acquire(true);
	pool
}
