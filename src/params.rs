//! Statement parameters.
//!
//! [`SqlParam`] is the value enum accepted by every execute/query operation,
//! together with the functions that bind it to the backend drivers.

use serde::{Deserialize, Serialize};

/// A positional parameter value for a SQL statement.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SqlParam {
    /// NULL value
    Null,
    /// Boolean value
    Bool(bool),
    /// Integer value (stored as i64 for maximum range)
    Int(i64),
    /// Floating point value
    Float(f64),
    /// String value
    String(String),
    /// Binary data (base64 encoded in JSON)
    #[serde(with = "base64_bytes")]
    Bytes(Vec<u8>),
}

impl SqlParam {
    /// Check if this parameter is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Get the type name of this parameter for debugging.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::Bytes(_) => "bytes",
        }
    }
}

impl From<bool> for SqlParam {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for SqlParam {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for SqlParam {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for SqlParam {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for SqlParam {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<Vec<u8>> for SqlParam {
    fn from(v: Vec<u8>) -> Self {
        Self::Bytes(v)
    }
}

/// Bind a parameter to a sqlx PostgreSQL query.
#[cfg(feature = "backend-sqlx")]
pub(crate) fn bind_param<'q>(
    query: sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments>,
    param: &'q SqlParam,
) -> sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments> {
    match param {
        SqlParam::Null => query.bind(None::<String>),
        SqlParam::Bool(v) => query.bind(*v),
        SqlParam::Int(v) => query.bind(*v),
        SqlParam::Float(v) => query.bind(*v),
        SqlParam::String(v) => query.bind(v.as_str()),
        SqlParam::Bytes(v) => query.bind(v.as_slice()),
    }
}

/// View parameters as the reference slice tokio-postgres expects.
#[cfg(feature = "backend-tokio")]
pub(crate) fn as_pg_args(
    params: &[SqlParam],
) -> Vec<&(dyn tokio_postgres::types::ToSql + Sync)> {
    use tokio_postgres::types::ToSql;

    static NULL_PARAM: Option<String> = None;

    params
        .iter()
        .map(|param| match param {
            SqlParam::Null => &NULL_PARAM as &(dyn ToSql + Sync),
            SqlParam::Bool(v) => v as &(dyn ToSql + Sync),
            SqlParam::Int(v) => v as &(dyn ToSql + Sync),
            SqlParam::Float(v) => v as &(dyn ToSql + Sync),
            SqlParam::String(v) => v as &(dyn ToSql + Sync),
            SqlParam::Bytes(v) => v as &(dyn ToSql + Sync),
        })
        .collect()
}

/// Custom serialization for binary data as base64.
mod base64_bytes {
    use base64::{Engine as _, engine::general_purpose::STANDARD};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(bytes: &Vec<u8>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        STANDARD.encode(bytes).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        STANDARD.decode(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_param_types() {
        assert!(SqlParam::Null.is_null());
        assert!(!SqlParam::Bool(true).is_null());
        assert_eq!(SqlParam::Int(42).type_name(), "int");
        assert_eq!(SqlParam::String("hello".to_string()).type_name(), "string");
        assert_eq!(SqlParam::Bytes(vec![1, 2]).type_name(), "bytes");
    }

    #[test]
    fn test_param_from_conversions() {
        assert_eq!(SqlParam::from(7i64).type_name(), "int");
        assert_eq!(SqlParam::from("x").type_name(), "string");
        assert_eq!(SqlParam::from(vec![0u8]).type_name(), "bytes");
    }

    #[test]
    fn test_bytes_serialize_as_base64() {
        let param = SqlParam::Bytes(vec![0xde, 0xad, 0xbe, 0xef]);
        let json = serde_json::to_string(&param).unwrap();
        assert_eq!(json, "\"3q2+7w==\"");
    }

    #[test]
    fn test_untagged_deserialization() {
        // Untagged enums resolve a JSON string to the String variant; base64
        // text stays text unless the caller constructs Bytes directly.
        assert_eq!(
            serde_json::from_str::<SqlParam>("\"3q2+7w==\"")
                .unwrap()
                .type_name(),
            "string"
        );
        assert_eq!(serde_json::from_str::<SqlParam>("42").unwrap().type_name(), "int");
        assert_eq!(
            serde_json::from_str::<SqlParam>("null").unwrap().type_name(),
            "null"
        );
    }

    #[cfg(feature = "backend-tokio")]
    #[test]
    fn test_as_pg_args_length() {
        let params = vec![SqlParam::Null, SqlParam::Int(1), SqlParam::Bool(false)];
        assert_eq!(as_pg_args(&params).len(), 3);
    }
}
