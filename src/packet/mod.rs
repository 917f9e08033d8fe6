//! Log packets
//!
//! A packet is one JSON object, decoded from a single datagram. Anything that
//! is not an object (arrays, scalars, broken text) is rejected.

mod decode;

pub use decode::{decode, is_gzip, GZIP_SIGNATURE};

use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;
use std::ops::Deref;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PacketError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("expected JSON object, got {kind}")]
    NotAnObject { kind: &'static str },
}

/// A parsed log record
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(transparent)]
pub struct Packet(Map<String, Value>);

impl Packet {
    /// Parse already-decoded bytes as a JSON object
    pub fn parse(bytes: &[u8]) -> Result<Self, PacketError> {
        Self::try_from(serde_json::from_slice::<Value>(bytes)?)
    }

    /// Decode (gunzip if needed) and parse a raw datagram
    pub fn from_datagram(bytes: &[u8]) -> Result<Self, PacketError> {
        Self::parse(&decode(bytes))
    }

    /// JSON text of this packet
    pub fn to_json(&self) -> String {
        // A map of `Value`s always serializes
        serde_json::to_string(&self.0).unwrap_or_else(|_| String::from("{}"))
    }
}

impl Deref for Packet {
    type Target = Map<String, Value>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<Map<String, Value>> for Packet {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl TryFrom<Value> for Packet {
    type Error = PacketError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(PacketError::NotAnObject {
                kind: kind_of(&other),
            }),
        }
    }
}

impl fmt::Display for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_json())
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
