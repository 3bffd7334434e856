//! Value types exchanged with a [`Connection`](super::Connection)

use super::error::DatabaseError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Query parameter and column value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum QueryValue {
	Null,
	Bool(bool),
	Int(i64),
	Float(f64),
	String(String),
	Bytes(Vec<u8>),
	Timestamp(chrono::DateTime<chrono::Utc>),
	/// UUID value, bound as text on drivers without a native uuid type
	Uuid(Uuid),
}

impl QueryValue {
	/// Whether this value is SQL `NULL`
	pub fn is_null(&self) -> bool {
		matches!(self, QueryValue::Null)
	}
}

impl From<&str> for QueryValue {
	fn from(s: &str) -> Self {
		QueryValue::String(s.to_string())
	}
}

impl From<String> for QueryValue {
	fn from(s: String) -> Self {
		QueryValue::String(s)
	}
}

impl From<i64> for QueryValue {
	fn from(i: i64) -> Self {
		QueryValue::Int(i)
	}
}

impl From<i32> for QueryValue {
	fn from(i: i32) -> Self {
		QueryValue::Int(i as i64)
	}
}

impl From<f64> for QueryValue {
	fn from(f: f64) -> Self {
		QueryValue::Float(f)
	}
}

impl From<bool> for QueryValue {
	fn from(b: bool) -> Self {
		QueryValue::Bool(b)
	}
}

impl From<Vec<u8>> for QueryValue {
	fn from(b: Vec<u8>) -> Self {
		QueryValue::Bytes(b)
	}
}

impl From<chrono::DateTime<chrono::Utc>> for QueryValue {
	fn from(dt: chrono::DateTime<chrono::Utc>) -> Self {
		QueryValue::Timestamp(dt)
	}
}

impl From<Uuid> for QueryValue {
	fn from(u: Uuid) -> Self {
		QueryValue::Uuid(u)
	}
}

impl<T: Into<QueryValue>> From<Option<T>> for QueryValue {
	fn from(value: Option<T>) -> Self {
		value.map_or(QueryValue::Null, Into::into)
	}
}

/// Outcome of a statement that does not return rows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QueryResult {
	pub rows_affected: u64,
}

/// Row from query result
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
	pub data: HashMap<String, QueryValue>,
}

impl Row {
	pub fn new() -> Self {
		Self {
			data: HashMap::new(),
		}
	}

	pub fn insert(&mut self, key: impl Into<String>, value: QueryValue) {
		self.data.insert(key.into(), value);
	}

	/// Read a column converted to `T`
	///
	/// # Examples
	///
	/// ```
	/// use txkit_db::backends::{QueryValue, Row};
	///
	/// let mut row = Row::new();
	/// row.insert("id", QueryValue::Int(7));
	/// row.insert("name", QueryValue::from("alice"));
	///
	/// assert_eq!(row.get::<i64>("id").unwrap(), 7);
	/// assert_eq!(row.get::<String>("name").unwrap(), "alice");
	/// assert!(row.get::<i64>("missing").is_err());
	/// ```
	pub fn get<T: TryFrom<QueryValue>>(&self, key: &str) -> std::result::Result<T, DatabaseError>
	where
		DatabaseError: From<<T as TryFrom<QueryValue>>::Error>,
	{
		self.data
			.get(key)
			.cloned()
			.ok_or_else(|| DatabaseError::ColumnNotFound(key.to_string()))
			.and_then(|v| v.try_into().map_err(Into::into))
	}

	/// Whether the column is present and `NULL`
	pub fn is_null(&self, key: &str) -> bool {
		self.data.get(key).is_some_and(QueryValue::is_null)
	}

	pub fn len(&self) -> usize {
		self.data.len()
	}

	pub fn is_empty(&self) -> bool {
		self.data.is_empty()
	}
}

impl FromIterator<(String, QueryValue)> for Row {
	fn from_iter<I: IntoIterator<Item = (String, QueryValue)>>(iter: I) -> Self {
		Self {
			data: iter.into_iter().collect(),
		}
	}
}

fn type_error(value: &QueryValue, target: &str) -> DatabaseError {
	DatabaseError::TypeError(format!("Cannot convert {:?} to {}", value, target))
}

/// `TryFrom<QueryValue>` for a column type, listing the accepted variants
macro_rules! impl_try_from_value {
	($target:ty, $name:literal, { $($pattern:pat => $convert:expr),+ $(,)? }) => {
		impl TryFrom<QueryValue> for $target {
			type Error = DatabaseError;

			fn try_from(value: QueryValue) -> Result<Self, DatabaseError> {
				match value {
					$($pattern => $convert,)+
					other => Err(type_error(&other, $name)),
				}
			}
		}
	};
}

impl_try_from_value!(i64, "i64", {
	QueryValue::Int(i) => Ok(i),
	// SQLite has no boolean storage class
	QueryValue::Bool(b) => Ok(i64::from(b)),
});

impl_try_from_value!(i32, "i32", {
	QueryValue::Int(i) => i32::try_from(i)
		.map_err(|_| DatabaseError::TypeError(format!("{} does not fit in i32", i))),
});

impl_try_from_value!(String, "String", {
	QueryValue::String(s) => Ok(s),
});

impl_try_from_value!(bool, "bool", {
	QueryValue::Bool(b) => Ok(b),
	QueryValue::Int(0) => Ok(false),
	QueryValue::Int(1) => Ok(true),
});

impl_try_from_value!(f64, "f64", {
	QueryValue::Float(f) => Ok(f),
	QueryValue::Int(i) => Ok(i as f64),
});

impl_try_from_value!(Vec<u8>, "Vec<u8>", {
	QueryValue::Bytes(b) => Ok(b),
});

impl_try_from_value!(chrono::DateTime<chrono::Utc>, "DateTime<Utc>", {
	QueryValue::Timestamp(dt) => Ok(dt),
	QueryValue::String(s) => chrono::DateTime::parse_from_rfc3339(&s)
		.map(|dt| dt.with_timezone(&chrono::Utc))
		.map_err(|e| DatabaseError::TypeError(format!("'{}' is not an RFC 3339 timestamp: {}", s, e))),
});

impl_try_from_value!(Uuid, "Uuid", {
	QueryValue::Uuid(u) => Ok(u),
	QueryValue::String(s) => Uuid::parse_str(&s)
		.map_err(|e| DatabaseError::TypeError(format!("'{}' is not a UUID: {}", s, e))),
});
