//! # txkit-test
//!
//! Test doubles for code built on the transaction layer.
//!
//! - [`RecordingPool`]: an in-memory [`ConnectionPool`](txkit_db::ConnectionPool)
//!   that logs every statement, counts acquires and releases, and fails on
//!   demand
//! - [`fixtures`]: `rstest` fixtures returning ready-made pools
//! - [`logging`]: one-shot `tracing` subscriber for test output

pub mod fixtures;
pub mod logging;
pub mod recording;

pub use fixtures::{failing_acquire_pool, recording_pool};
pub use logging::init_test_logging;
pub use recording::{RecordingConnection, RecordingPool};
