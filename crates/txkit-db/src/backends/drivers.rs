//! Concrete [`ConnectionPool`](super::ConnectionPool) implementations

#[cfg(feature = "sqlx")]
pub mod sqlx;
