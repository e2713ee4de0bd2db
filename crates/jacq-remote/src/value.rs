//! 远端存储中的值

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// 存储中一个路径上的值
///
/// 叶子是布尔/数字/字符串；父路径是以子键为索引的 `Map`；不存在为 `Null`。
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RemoteValue {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
    Map(BTreeMap<String, RemoteValue>),
}

impl RemoteValue {
    /// 真值判定：`false`、`0`、`NaN`、空串与 `Null` 为假
    pub fn is_truthy(&self) -> bool {
        match self {
            RemoteValue::Null => false,
            RemoteValue::Bool(b) => *b,
            RemoteValue::Number(n) => *n != 0.0 && !n.is_nan(),
            RemoteValue::Text(s) => !s.is_empty(),
            RemoteValue::Map(_) => true,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, RemoteValue::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            RemoteValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            RemoteValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// 非负整数（数字或数字字符串）
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            RemoteValue::Number(n) if *n >= 0.0 && n.fract() == 0.0 => Some(*n as u64),
            RemoteValue::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            RemoteValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, RemoteValue>> {
        match self {
            RemoteValue::Map(map) => Some(map),
            _ => None,
        }
    }
}

impl fmt::Display for RemoteValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(self) {
            Ok(json) => f.write_str(&json),
            Err(_) => write!(f, "{:?}", self),
        }
    }
}

impl From<bool> for RemoteValue {
    fn from(b: bool) -> Self {
        RemoteValue::Bool(b)
    }
}

impl From<f64> for RemoteValue {
    fn from(n: f64) -> Self {
        RemoteValue::Number(n)
    }
}

impl From<u64> for RemoteValue {
    fn from(n: u64) -> Self {
        RemoteValue::Number(n as f64)
    }
}

impl From<usize> for RemoteValue {
    fn from(n: usize) -> Self {
        RemoteValue::Number(n as f64)
    }
}

impl From<i64> for RemoteValue {
    fn from(n: i64) -> Self {
        RemoteValue::Number(n as f64)
    }
}

impl From<&str> for RemoteValue {
    fn from(s: &str) -> Self {
        RemoteValue::Text(s.to_string())
    }
}

impl From<String> for RemoteValue {
    fn from(s: String) -> Self {
        RemoteValue::Text(s)
    }
}

impl From<BTreeMap<String, RemoteValue>> for RemoteValue {
    fn from(map: BTreeMap<String, RemoteValue>) -> Self {
        RemoteValue::Map(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truthiness() {
        assert!(!RemoteValue::Null.is_truthy());
        assert!(!RemoteValue::from(false).is_truthy());
        assert!(!RemoteValue::from(0u64).is_truthy());
        assert!(!RemoteValue::Number(f64::NAN).is_truthy());
        assert!(!RemoteValue::from("").is_truthy());
        assert!(RemoteValue::from("0").is_truthy());
        assert!(RemoteValue::from(3u64).is_truthy());
        assert!(RemoteValue::Map(BTreeMap::new()).is_truthy());
    }

    #[test]
    fn test_as_u64() {
        assert_eq!(RemoteValue::from(4u64).as_u64(), Some(4));
        assert_eq!(RemoteValue::Number(2.5).as_u64(), None);
        assert_eq!(RemoteValue::Number(-1.0).as_u64(), None);
        assert_eq!(RemoteValue::from(" 12 ").as_u64(), Some(12));
        assert_eq!(RemoteValue::from(true).as_u64(), None);
    }

    #[test]
    fn test_json_shape() {
        let mut map = BTreeMap::new();
        map.insert("a".to_string(), RemoteValue::from(true));
        map.insert("b".to_string(), RemoteValue::from("0101"));
        let value = RemoteValue::Map(map);
        assert_eq!(value.to_string(), r#"{"a":true,"b":"0101"}"#);

        let parsed: RemoteValue = serde_json::from_str(r#"{"n":3,"x":null}"#).unwrap();
        let map = parsed.as_map().unwrap();
        assert_eq!(map["n"], RemoteValue::Number(3.0));
        assert_eq!(map["x"], RemoteValue::Null);
    }
}
