use rusqlite::types::{ToSqlOutput, ValueRef};
use rusqlite::ToSql;
use serde::{Deserialize, Serialize, Serializer};

use crate::error::Error;

/// Core value types for SQLite operations.
///
/// Caller values arrive as JSON and are narrowed into this closed set at the
/// boundary; the driver only ever sees these five storage classes.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "serde_json::Value")]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(v.into())
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Integer(v.into())
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Real(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Blob(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

impl TryFrom<serde_json::Value> for Value {
    type Error = Error;

    fn try_from(json: serde_json::Value) -> Result<Self, Self::Error> {
        use serde_json::Value as Json;

        match json {
            Json::Null => Ok(Value::Null),
            Json::Bool(b) => Ok(b.into()),
            Json::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(Value::Integer(i))
                } else if let Some(f) = n.as_f64() {
                    Ok(Value::Real(f))
                } else {
                    Err(Error::invalid_input(format!("number {n} does not fit a SQLite value")))
                }
            }
            Json::String(s) => Ok(Value::Text(s)),
            Json::Array(_) | Json::Object(_) => Err(Error::invalid_input(
                "arrays and objects cannot be bound as SQL values",
            )),
        }
    }
}

/// TEXT that is not valid UTF-8 fails as [`Error::Resource`] instead of being
/// rewritten.
impl TryFrom<ValueRef<'_>> for Value {
    type Error = Error;

    fn try_from(value: ValueRef<'_>) -> Result<Self, Self::Error> {
        Ok(match value {
            ValueRef::Null => Value::Null,
            ValueRef::Integer(i) => Value::Integer(i),
            ValueRef::Real(f) => Value::Real(f),
            ValueRef::Text(bytes) => Value::Text(
                std::str::from_utf8(bytes)
                    .map_err(|err| Error::resource(format!("TEXT column is not valid UTF-8: {err}")))?
                    .to_owned(),
            ),
            ValueRef::Blob(bytes) => Value::Blob(bytes.to_vec()),
        })
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        let value = match self {
            Value::Null => ValueRef::Null,
            Value::Integer(i) => ValueRef::Integer(*i),
            Value::Real(f) => ValueRef::Real(*f),
            Value::Text(s) => ValueRef::Text(s.as_bytes()),
            Value::Blob(b) => ValueRef::Blob(b),
        };
        Ok(ToSqlOutput::Borrowed(value))
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Integer(i) => serializer.serialize_i64(*i),
            Value::Real(f) => serializer.serialize_f64(*f),
            Value::Text(s) => serializer.serialize_str(s),
            Value::Blob(b) => serializer.serialize_bytes(b),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_scalars_narrow_to_storage_classes() {
        assert!(Value::try_from(json!(null)).unwrap().is_null());
        assert!(!Value::try_from(json!(0)).unwrap().is_null());
        assert_eq!(Value::try_from(json!(true)).unwrap(), Value::Integer(1));
        assert_eq!(Value::try_from(json!(42)).unwrap(), Value::Integer(42));
        assert_eq!(Value::try_from(json!(1.5)).unwrap(), Value::Real(1.5));
        assert_eq!(
            Value::try_from(json!("abc")).unwrap(),
            Value::Text("abc".to_string())
        );
    }

    #[test]
    fn json_containers_are_rejected() {
        assert!(matches!(
            Value::try_from(json!([1, 2])),
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            Value::try_from(json!({"a": 1})),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn options_map_none_to_null() {
        assert!(Value::from(None::<i64>).is_null());
        assert_eq!(Value::from(Some("x")), Value::Text("x".into()));
    }

    #[test]
    fn engine_text_must_be_utf8() {
        assert_eq!(
            Value::try_from(ValueRef::Text(b"caf\xc3\xa9")).unwrap(),
            Value::Text("café".into())
        );
        let err = Value::try_from(ValueRef::Text(&[0x66, 0xff])).unwrap_err();
        assert!(matches!(err, Error::Resource(_)));
    }

    #[test]
    fn serializes_back_to_plain_json() {
        let row = vec![
            Value::Null,
            Value::Integer(7),
            Value::Real(0.5),
            Value::Text("x".into()),
            Value::Blob(vec![1, 2]),
        ];
        assert_eq!(
            serde_json::to_value(&row).unwrap(),
            json!([null, 7, 0.5, "x", [1, 2]])
        );
    }

    #[test]
    fn deserializes_inside_maps() {
        let map: indexmap::IndexMap<String, Value> =
            serde_json::from_value(json!({"b": 1, "a": "z"})).unwrap();
        let keys: Vec<_> = map.keys().cloned().collect();
        assert_eq!(keys, vec!["b", "a"]);
        assert_eq!(map["a"], Value::Text("z".into()));
    }
}
