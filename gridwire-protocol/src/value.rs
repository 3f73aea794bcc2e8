//! Native value model and the tagged wire representation of values.

use crate::error::CodecError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// Wire tag identifying how the bytes of an [`EncodedValue`] are laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum EncodingType {
    Int = 0,
    Long = 1,
    Short = 2,
    Byte = 3,
    Boolean = 4,
    Binary = 5,
    Float = 6,
    Double = 7,
    String = 8,
    Json = 9,
}

impl EncodingType {
    /// Every tag defined by the protocol.
    pub const ALL: [EncodingType; 10] = [
        EncodingType::Int,
        EncodingType::Long,
        EncodingType::Short,
        EncodingType::Byte,
        EncodingType::Boolean,
        EncodingType::Binary,
        EncodingType::Float,
        EncodingType::Double,
        EncodingType::String,
        EncodingType::Json,
    ];

    pub fn tag(self) -> u8 {
        self as u8
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EncodingType::Int => "INT",
            EncodingType::Long => "LONG",
            EncodingType::Short => "SHORT",
            EncodingType::Byte => "BYTE",
            EncodingType::Boolean => "BOOLEAN",
            EncodingType::Binary => "BINARY",
            EncodingType::Float => "FLOAT",
            EncodingType::Double => "DOUBLE",
            EncodingType::String => "STRING",
            EncodingType::Json => "JSON",
        }
    }
}

impl TryFrom<u8> for EncodingType {
    type Error = CodecError;

    fn try_from(tag: u8) -> Result<Self, Self::Error> {
        EncodingType::ALL
            .iter()
            .copied()
            .find(|t| t.tag() == tag)
            .ok_or(CodecError::UnsupportedEncoding(tag))
    }
}

impl FromStr for EncodingType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        EncodingType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == upper)
            .ok_or_else(|| format!("unknown encoding type '{}'", s))
    }
}

impl fmt::Display for EncodingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A native key or value held by the backing store.
///
/// Floating point variants compare and hash by bit pattern so that values
/// can be used as map keys.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Value {
    Int(i32),
    Long(i64),
    Short(i16),
    Byte(i8),
    Boolean(bool),
    Binary(Vec<u8>),
    Float(f32),
    Double(f64),
    String(String),
}

impl Value {
    /// Returns the encoding type that represents this value on the wire.
    pub fn encoding_type(&self) -> EncodingType {
        match self {
            Value::Int(_) => EncodingType::Int,
            Value::Long(_) => EncodingType::Long,
            Value::Short(_) => EncodingType::Short,
            Value::Byte(_) => EncodingType::Byte,
            Value::Boolean(_) => EncodingType::Boolean,
            Value::Binary(_) => EncodingType::Binary,
            Value::Float(_) => EncodingType::Float,
            Value::Double(_) => EncodingType::Double,
            Value::String(_) => EncodingType::String,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Long(a), Value::Long(b)) => a == b,
            (Value::Short(a), Value::Short(b)) => a == b,
            (Value::Byte(a), Value::Byte(b)) => a == b,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Binary(a), Value::Binary(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::Double(a), Value::Double(b)) => a.to_bits() == b.to_bits(),
            (Value::String(a), Value::String(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.encoding_type().hash(state);
        match self {
            Value::Int(v) => v.hash(state),
            Value::Long(v) => v.hash(state),
            Value::Short(v) => v.hash(state),
            Value::Byte(v) => v.hash(state),
            Value::Boolean(v) => v.hash(state),
            Value::Binary(v) => v.hash(state),
            Value::Float(v) => v.to_bits().hash(state),
            Value::Double(v) => v.to_bits().hash(state),
            Value::String(v) => v.hash(state),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{}", v),
            Value::Long(v) => write!(f, "{}", v),
            Value::Short(v) => write!(f, "{}", v),
            Value::Byte(v) => write!(f, "{}", v),
            Value::Boolean(v) => write!(f, "{}", v),
            Value::Binary(v) => write!(f, "0x{}", hex::encode(v)),
            Value::Float(v) => write!(f, "{}", v),
            Value::Double(v) => write!(f, "{}", v),
            Value::String(v) => f.write_str(v),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Long(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Binary(v)
    }
}

/// A value as it travels on the wire: an encoding tag plus raw bytes.
///
/// The tag is kept as a raw byte so that an unknown tag reaches the codec
/// registry and is reported as an unsupported encoding rather than failing
/// request parsing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EncodedValue {
    pub encoding_type: u8,
    #[serde(with = "hex_bytes")]
    pub value: Vec<u8>,
}

impl EncodedValue {
    pub fn new(encoding_type: EncodingType, value: Vec<u8>) -> Self {
        Self {
            encoding_type: encoding_type.tag(),
            value,
        }
    }

    /// Resolves the wire tag.
    pub fn encoding(&self) -> Result<EncodingType, CodecError> {
        EncodingType::try_from(self.encoding_type)
    }
}

/// A key/value pair of encoded values.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Entry {
    pub key: EncodedValue,
    pub value: EncodedValue,
}

impl Entry {
    pub fn new(key: EncodedValue, value: EncodedValue) -> Self {
        Self { key, value }
    }
}

/// Serde helper carrying raw bytes as a lowercase hex string.
mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        hex::decode(s).map_err(serde::de::Error::custom)
    }
}
