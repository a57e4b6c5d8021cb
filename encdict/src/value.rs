//! Value coercion into stored bytes.
//!
//! Every value written through the encrypted mapping is converted to bytes by
//! exactly one rule set:
//!
//! | Variant | Encoding |
//! |---|---|
//! | `Int(i64)` | 8-byte big-endian two's complement |
//! | `Text(String)` | UTF-8 bytes |
//! | `Bytes(Vec<u8>)` | unchanged |

use crate::error::Error;

/// Width of an encoded integer.
pub const INT_SIZE: usize = 8;

/// Application-level value accepted by the encrypted mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// Signed integer.
    Int(i64),
    /// UTF-8 text.
    Text(String),
    /// Raw bytes.
    Bytes(Vec<u8>),
}

impl Value {
    /// Encodes the value into the bytes that get encrypted.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            Self::Int(n) => n.to_be_bytes().to_vec(),
            Self::Text(s) => s.into_bytes(),
            Self::Bytes(b) => b,
        }
    }

    /// Decodes bytes produced from an `Int` value.
    ///
    /// # Errors
    ///
    /// Returns `Error::UnsupportedValueType` if `bytes` is not exactly
    /// [`INT_SIZE`] long.
    ///
    /// # Example
    ///
    /// ```
    /// use encdict::value::Value;
    ///
    /// let encoded = Value::from(10_i64).into_bytes();
    /// assert_eq!(Value::decode_int(&encoded).unwrap(), 10);
    /// ```
    pub fn decode_int(bytes: &[u8]) -> Result<i64, Error> {
        let raw: [u8; INT_SIZE] = bytes.try_into().map_err(|_| {
            Error::UnsupportedValueType(format!(
                "expected {INT_SIZE} bytes for an integer, got {}",
                bytes.len()
            ))
        })?;
        Ok(i64::from_be_bytes(raw))
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Self::Bytes(b)
    }
}

impl From<&[u8]> for Value {
    fn from(b: &[u8]) -> Self {
        Self::Bytes(b.to_vec())
    }
}

impl<const N: usize> From<&[u8; N]> for Value {
    fn from(b: &[u8; N]) -> Self {
        Self::Bytes(b.to_vec())
    }
}

impl TryFrom<serde_json::Value> for Value {
    type Error = Error;

    /// Accepts integers that fit `i64`, strings, and arrays of byte values.
    fn try_from(json: serde_json::Value) -> Result<Self, Self::Error> {
        use serde_json::Value as Json;

        match json {
            Json::Number(n) => n
                .as_i64()
                .map(Self::Int)
                .ok_or_else(|| Error::UnsupportedValueType(format!("number {n} is not an i64"))),
            Json::String(s) => Ok(Self::Text(s)),
            Json::Array(items) => items
                .iter()
                .map(|item| {
                    item.as_u64().and_then(|n| u8::try_from(n).ok()).ok_or_else(|| {
                        Error::UnsupportedValueType(format!("array element {item} is not a byte"))
                    })
                })
                .collect::<Result<Vec<u8>, Error>>()
                .map(Self::Bytes),
            other => Err(Error::UnsupportedValueType(format!("cannot store JSON value {other}"))),
        }
    }
}
