use crate::error::{IndexError, IndexResult};
use std::cmp::Ordering;
use std::fmt;

/// Value domain shared by every key of one tree. The discriminant is the
/// on-disk tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[repr(u8)]
pub enum KeyType {
    #[strum(to_string = "integer", serialize = "int")]
    Integer = 0,
    #[strum(to_string = "float", serialize = "double")]
    Float = 1,
    #[strum(to_string = "text", serialize = "string")]
    Text = 2,
}

impl KeyType {
    pub fn tag(&self) -> u8 {
        *self as u8
    }

    pub fn from_tag(tag: u8) -> IndexResult<Self> {
        match tag {
            0 => Ok(KeyType::Integer),
            1 => Ok(KeyType::Float),
            2 => Ok(KeyType::Text),
            _ => Err(IndexError::Corrupt(format!("unknown key type tag {}", tag))),
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, KeyType::Integer | KeyType::Float)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum KeyValue {
    Integer(i64),
    Float(f64),
    Text(String),
}

impl KeyValue {
    pub fn key_type(&self) -> KeyType {
        match self {
            KeyValue::Integer(_) => KeyType::Integer,
            KeyValue::Float(_) => KeyType::Float,
            KeyValue::Text(_) => KeyType::Text,
        }
    }

    /// Parses a raw column value into a key of the requested type.
    pub fn parse(key_type: KeyType, raw: &str) -> IndexResult<Self> {
        let raw = raw.trim();
        match key_type {
            KeyType::Integer => raw
                .parse::<i64>()
                .map(KeyValue::Integer)
                .map_err(|e| IndexError::Parse(format!("'{}' is not an integer: {}", raw, e))),
            KeyType::Float => raw
                .parse::<f64>()
                .map(KeyValue::Float)
                .map_err(|e| IndexError::Parse(format!("'{}' is not a float: {}", raw, e))),
            KeyType::Text => Ok(KeyValue::Text(raw.to_string())),
        }
    }

    /// Fails unless `self` carries the `expected` tag.
    pub fn check_type(&self, expected: KeyType) -> IndexResult<()> {
        let found = self.key_type();
        if found != expected {
            return Err(IndexError::KeyTypeMismatch { expected, found });
        }
        Ok(())
    }

    /// Compares two keys of the same type.
    pub fn compare(&self, other: &KeyValue) -> IndexResult<Ordering> {
        other.check_type(self.key_type())?;
        Ok(self.total_cmp(other))
    }

    /// Total order over all keys: by tag first, then by value. Floats use IEEE
    /// total ordering and text compares bytewise. Callers check tags before
    /// relying on this for tree navigation.
    pub fn total_cmp(&self, other: &KeyValue) -> Ordering {
        match (self, other) {
            (KeyValue::Integer(a), KeyValue::Integer(b)) => a.cmp(b),
            (KeyValue::Float(a), KeyValue::Float(b)) => a.total_cmp(b),
            (KeyValue::Text(a), KeyValue::Text(b)) => a.as_bytes().cmp(b.as_bytes()),
            _ => self.key_type().tag().cmp(&other.key_type().tag()),
        }
    }

    /// Bytes fed to the Bloom filter hashes: the key's canonical text form, so
    /// integer `42` and the raw column value `"42"` probe the same bits.
    pub fn to_bloom_bytes(&self) -> Vec<u8> {
        self.to_string().into_bytes()
    }
}

impl fmt::Display for KeyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyValue::Integer(v) => write!(f, "{}", v),
            KeyValue::Float(v) => write!(f, "{}", v),
            KeyValue::Text(v) => write!(f, "{}", v),
        }
    }
}

impl From<i64> for KeyValue {
    fn from(value: i64) -> Self {
        KeyValue::Integer(value)
    }
}

impl From<i32> for KeyValue {
    fn from(value: i32) -> Self {
        KeyValue::Integer(value as i64)
    }
}

impl From<f64> for KeyValue {
    fn from(value: f64) -> Self {
        KeyValue::Float(value)
    }
}

impl From<&str> for KeyValue {
    fn from(value: &str) -> Self {
        KeyValue::Text(value.to_string())
    }
}

impl From<String> for KeyValue {
    fn from(value: String) -> Self {
        KeyValue::Text(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn key_type_tags_round_trip() {
        for key_type in [KeyType::Integer, KeyType::Float, KeyType::Text] {
            assert_eq!(KeyType::from_tag(key_type.tag()).unwrap(), key_type);
        }
        assert!(matches!(KeyType::from_tag(9), Err(IndexError::Corrupt(_))));
    }

    #[test]
    fn key_type_parses_aliases() {
        assert_eq!(KeyType::from_str("int").unwrap(), KeyType::Integer);
        assert_eq!(KeyType::from_str("double").unwrap(), KeyType::Float);
        assert_eq!(KeyType::from_str("text").unwrap(), KeyType::Text);
        assert_eq!(KeyType::Float.to_string(), "float");
    }

    #[test]
    fn compare_rejects_mixed_tags() {
        let err = KeyValue::from(1).compare(&KeyValue::from("1")).unwrap_err();
        assert!(matches!(
            err,
            IndexError::KeyTypeMismatch {
                expected: KeyType::Integer,
                found: KeyType::Text
            }
        ));
    }

    #[test]
    fn ordering_per_type() {
        assert_eq!(
            KeyValue::from(-5).compare(&KeyValue::from(3)).unwrap(),
            Ordering::Less
        );
        assert_eq!(
            KeyValue::from(2.5).compare(&KeyValue::from(2.5)).unwrap(),
            Ordering::Equal
        );
        assert_eq!(
            KeyValue::from("banana")
                .compare(&KeyValue::from("apple"))
                .unwrap(),
            Ordering::Greater
        );
    }

    #[test]
    fn parse_and_bloom_bytes() {
        let key = KeyValue::parse(KeyType::Integer, " 42 ").unwrap();
        assert_eq!(key, KeyValue::Integer(42));
        assert_eq!(key.to_bloom_bytes(), b"42".to_vec());
        assert!(matches!(
            KeyValue::parse(KeyType::Integer, "4x"),
            Err(IndexError::Parse(_))
        ));
        assert_eq!(
            KeyValue::parse(KeyType::Float, "1.5").unwrap(),
            KeyValue::Float(1.5)
        );
    }
}
