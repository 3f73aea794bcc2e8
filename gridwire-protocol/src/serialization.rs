//! Codec registry converting between wire bytes and native values.
//!
//! Each [`EncodingType`] maps to at most one [`TypeCodec`]. The registry is
//! populated at startup and shared read-only afterwards.

use crate::error::CodecError;
use crate::value::{EncodedValue, EncodingType, Value};
use bytes::{Buf, BufMut};
use std::collections::HashMap;
use std::sync::Arc;

/// Encode/decode pair for a single encoding type.
pub trait TypeCodec: Send + Sync {
    /// The tag this codec is registered under.
    fn encoding_type(&self) -> EncodingType;

    fn encode(&self, value: &Value) -> Result<Vec<u8>, CodecError>;

    fn decode(&self, bytes: &[u8]) -> Result<Value, CodecError>;
}

fn expect_len(encoding_type: EncodingType, bytes: &[u8], len: usize) -> Result<(), CodecError> {
    if bytes.len() != len {
        return Err(CodecError::Malformed {
            encoding_type,
            reason: format!("expected {} bytes, got {}", len, bytes.len()),
        });
    }
    Ok(())
}

fn mismatch(expected: EncodingType, value: &Value) -> CodecError {
    CodecError::TypeMismatch {
        expected,
        actual: value.encoding_type(),
    }
}

macro_rules! fixed_width_codec {
    ($name:ident, $variant:ident, $width:expr, $put:ident, $get:ident) => {
        struct $name;

        impl TypeCodec for $name {
            fn encoding_type(&self) -> EncodingType {
                EncodingType::$variant
            }

            fn encode(&self, value: &Value) -> Result<Vec<u8>, CodecError> {
                match value {
                    Value::$variant(v) => {
                        let mut buf = Vec::with_capacity($width);
                        buf.$put(*v);
                        Ok(buf)
                    }
                    other => Err(mismatch(EncodingType::$variant, other)),
                }
            }

            fn decode(&self, bytes: &[u8]) -> Result<Value, CodecError> {
                expect_len(EncodingType::$variant, bytes, $width)?;
                let mut buf = bytes;
                Ok(Value::$variant(buf.$get()))
            }
        }
    };
}

fixed_width_codec!(IntCodec, Int, 4, put_i32, get_i32);
fixed_width_codec!(LongCodec, Long, 8, put_i64, get_i64);
fixed_width_codec!(ShortCodec, Short, 2, put_i16, get_i16);
fixed_width_codec!(ByteCodec, Byte, 1, put_i8, get_i8);
fixed_width_codec!(FloatCodec, Float, 4, put_f32, get_f32);
fixed_width_codec!(DoubleCodec, Double, 8, put_f64, get_f64);

struct BooleanCodec;

impl TypeCodec for BooleanCodec {
    fn encoding_type(&self) -> EncodingType {
        EncodingType::Boolean
    }

    fn encode(&self, value: &Value) -> Result<Vec<u8>, CodecError> {
        match value {
            Value::Boolean(b) => Ok(vec![u8::from(*b)]),
            other => Err(mismatch(EncodingType::Boolean, other)),
        }
    }

    fn decode(&self, bytes: &[u8]) -> Result<Value, CodecError> {
        expect_len(EncodingType::Boolean, bytes, 1)?;
        match bytes[0] {
            0 => Ok(Value::Boolean(false)),
            1 => Ok(Value::Boolean(true)),
            b => Err(CodecError::Malformed {
                encoding_type: EncodingType::Boolean,
                reason: format!("invalid boolean byte {}", b),
            }),
        }
    }
}

struct StringCodec;

impl TypeCodec for StringCodec {
    fn encoding_type(&self) -> EncodingType {
        EncodingType::String
    }

    fn encode(&self, value: &Value) -> Result<Vec<u8>, CodecError> {
        match value {
            Value::String(s) => Ok(s.as_bytes().to_vec()),
            other => Err(mismatch(EncodingType::String, other)),
        }
    }

    fn decode(&self, bytes: &[u8]) -> Result<Value, CodecError> {
        let s = std::str::from_utf8(bytes).map_err(|e| CodecError::Malformed {
            encoding_type: EncodingType::String,
            reason: e.to_string(),
        })?;
        Ok(Value::String(s.to_string()))
    }
}

struct BinaryCodec;

impl TypeCodec for BinaryCodec {
    fn encoding_type(&self) -> EncodingType {
        EncodingType::Binary
    }

    fn encode(&self, value: &Value) -> Result<Vec<u8>, CodecError> {
        match value {
            Value::Binary(b) => Ok(b.clone()),
            other => Err(mismatch(EncodingType::Binary, other)),
        }
    }

    fn decode(&self, bytes: &[u8]) -> Result<Value, CodecError> {
        Ok(Value::Binary(bytes.to_vec()))
    }
}

/// Registry of codecs keyed by encoding type.
#[derive(Clone, Default)]
pub struct CodecRegistry {
    codecs: HashMap<EncodingType, Arc<dyn TypeCodec>>,
}

impl CodecRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding a codec for every scalar, string and binary
    /// type. `JSON` has no default codec.
    pub fn with_defaults() -> Self {
        let defaults: [Arc<dyn TypeCodec>; 9] = [
            Arc::new(IntCodec),
            Arc::new(LongCodec),
            Arc::new(ShortCodec),
            Arc::new(ByteCodec),
            Arc::new(BooleanCodec),
            Arc::new(BinaryCodec),
            Arc::new(FloatCodec),
            Arc::new(DoubleCodec),
            Arc::new(StringCodec),
        ];

        let mut registry = Self::new();
        for codec in defaults {
            registry.codecs.insert(codec.encoding_type(), codec);
        }
        registry
    }

    /// Registers a codec. Fails if the tag already has one.
    pub fn register(&mut self, codec: Arc<dyn TypeCodec>) -> Result<(), CodecError> {
        let encoding_type = codec.encoding_type();
        if self.codecs.contains_key(&encoding_type) {
            return Err(CodecError::CodecAlreadyRegistered(encoding_type));
        }
        self.codecs.insert(encoding_type, codec);
        Ok(())
    }

    pub fn is_registered(&self, encoding_type: EncodingType) -> bool {
        self.codecs.contains_key(&encoding_type)
    }

    fn codec(&self, encoding_type: EncodingType) -> Result<&Arc<dyn TypeCodec>, CodecError> {
        self.codecs
            .get(&encoding_type)
            .ok_or(CodecError::CodecNotRegistered(encoding_type))
    }

    /// Encodes `value` using the codec for `encoding_type`.
    pub fn encode(&self, encoding_type: EncodingType, value: &Value) -> Result<Vec<u8>, CodecError> {
        self.codec(encoding_type)?.encode(value)
    }

    /// Decodes `bytes` using the codec for `encoding_type`.
    pub fn decode(&self, encoding_type: EncodingType, bytes: &[u8]) -> Result<Value, CodecError> {
        self.codec(encoding_type)?.decode(bytes)
    }

    /// Decodes a wire value, resolving its raw tag first.
    pub fn decode_value(&self, encoded: &EncodedValue) -> Result<Value, CodecError> {
        let encoding_type = encoded.encoding()?;
        self.decode(encoding_type, &encoded.value)
    }

    /// Encodes a native value using the encoding type it naturally maps to.
    pub fn encode_value(&self, value: &Value) -> Result<EncodedValue, CodecError> {
        let encoding_type = value.encoding_type();
        let bytes = self.encode(encoding_type, value)?;
        Ok(EncodedValue::new(encoding_type, bytes))
    }
}

impl std::fmt::Debug for CodecRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut registered: Vec<_> = self.codecs.keys().copied().collect();
        registered.sort();
        f.debug_struct("CodecRegistry")
            .field("registered", &registered)
            .finish()
    }
}
