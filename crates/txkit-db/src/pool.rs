//! Connection pool configuration and errors
//!
//! This layer does not implement pooling. It consumes pools through
//! [`ConnectionPool`](crate::backends::ConnectionPool); this module holds the
//! configuration handed to the sqlx adapter and the acquisition error type
//! shared by every pool implementation.

pub mod config;
pub mod errors;

pub use config::PoolConfig;
pub use errors::{PoolError, PoolResult};
