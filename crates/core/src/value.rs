//! 필드 값 타입 -- 메시지 필드에 저장되는 동적 값
//!
//! [`Value`]는 JSON과 유사한 태그드 유니온입니다. 규칙 함수는 이 타입을
//! 주고받으며, [`ValueKind`]는 파라미터 타입 검사와 에러 메시지에 사용됩니다.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 메시지 필드 값
///
/// 역직렬화 시 변형 순서대로 시도합니다 (`untagged`).
/// 정수는 `Long`, 소수는 `Double`, 문자열은 형식과 무관하게 `String`이 됩니다.
/// `Timestamp`는 RFC 3339 문자열로 직렬화되지만 역직렬화로는 만들어지지
/// 않습니다. 예약 필드 `timestamp`만 [`Message::from_fields`]에서 변환됩니다.
///
/// [`Message::from_fields`]: crate::message::Message::from_fields
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Long(i64),
    Double(f64),
    String(String),
    Timestamp(DateTime<Utc>),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

/// 값의 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    Bool,
    Long,
    Double,
    Timestamp,
    String,
    List,
    Map,
}

impl ValueKind {
    /// 소문자 이름을 반환합니다.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Long => "long",
            Self::Double => "double",
            Self::Timestamp => "timestamp",
            Self::String => "string",
            Self::List => "list",
            Self::Map => "map",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Value {
    /// 값의 종류를 반환합니다.
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Bool(_) => ValueKind::Bool,
            Self::Long(_) => ValueKind::Long,
            Self::Double(_) => ValueKind::Double,
            Self::Timestamp(_) => ValueKind::Timestamp,
            Self::String(_) => ValueKind::String,
            Self::List(_) => ValueKind::List,
            Self::Map(_) => ValueKind::Map,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Long(n) => Some(*n),
            _ => None,
        }
    }

    /// 숫자 값을 `f64`로 반환합니다 (`Long` 포함).
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Long(n) => Some(*n as f64),
            Self::Double(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<&DateTime<Utc>> {
        match self {
            Self::Timestamp(ts) => Some(ts),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Self::Map(m) => Some(m),
            _ => None,
        }
    }

    /// 숫자 타입(`Long`, `Double`) 여부
    pub fn is_number(&self) -> bool {
        matches!(self, Self::Long(_) | Self::Double(_))
    }
}

impl PartialEq for Value {
    /// `Long`과 `Double`은 수치로 비교합니다. 그 외에는 같은 변형끼리만 같습니다.
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Long(a), Self::Long(b)) => a == b,
            (Self::Timestamp(a), Self::Timestamp(b)) => a == b,
            (Self::String(a), Self::String(b)) => a == b,
            (Self::List(a), Self::List(b)) => a == b,
            (Self::Map(a), Self::Map(b)) => a == b,
            (a, b) if a.is_number() && b.is_number() => a.as_f64() == b.as_f64(),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Long(n) => write!(f, "{n}"),
            Self::Double(n) => write!(f, "{n}"),
            Self::Timestamp(ts) => write!(f, "{}", ts.to_rfc3339()),
            Self::String(s) => f.write_str(s),
            Self::List(_) | Self::Map(_) => {
                let json = serde_json::to_string(self).map_err(|_| fmt::Error)?;
                f.write_str(&json)
            }
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Long(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Double(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::String(v.to_owned())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Self::Timestamp(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Self::List(v)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(v: BTreeMap<String, Value>) -> Self {
        Self::Map(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_and_double_compare_numerically() {
        assert_eq!(Value::Long(3), Value::Double(3.0));
        assert_ne!(Value::Long(3), Value::Double(3.5));
    }

    #[test]
    fn different_kinds_are_not_equal() {
        assert_ne!(Value::String("1".to_owned()), Value::Long(1));
        assert_ne!(Value::Bool(true), Value::Long(1));
    }

    #[test]
    fn deserialize_json_numbers() {
        let v: Value = serde_json::from_str("42").unwrap();
        assert_eq!(v.kind(), ValueKind::Long);
        let v: Value = serde_json::from_str("4.5").unwrap();
        assert_eq!(v.kind(), ValueKind::Double);
    }

    #[test]
    fn rfc3339_string_stays_a_string() {
        let json = "\"2024-01-15T12:00:00+02:00\"";
        let v: Value = serde_json::from_str(json).unwrap();
        assert_eq!(v, Value::from("2024-01-15T12:00:00+02:00"));
        assert_eq!(serde_json::to_string(&v).unwrap(), json);
    }

    #[test]
    fn timestamp_serializes_as_rfc3339() {
        let ts = DateTime::parse_from_rfc3339("2024-01-15T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let json = serde_json::to_string(&Value::Timestamp(ts)).unwrap();
        assert_eq!(json, "\"2024-01-15T10:00:00Z\"");
    }

    #[test]
    fn deserialize_nested_map() {
        let v: Value = serde_json::from_str(r#"{"a": [1, "x", true]}"#).unwrap();
        let map = v.as_map().unwrap();
        assert_eq!(
            map["a"],
            Value::List(vec![Value::Long(1), Value::from("x"), Value::Bool(true)])
        );
    }

    #[test]
    fn display_string_is_unquoted() {
        assert_eq!(Value::from("abc").to_string(), "abc");
        assert_eq!(Value::Long(7).to_string(), "7");
        assert_eq!(
            Value::List(vec![Value::Long(1), Value::Long(2)]).to_string(),
            "[1,2]"
        );
    }
}
