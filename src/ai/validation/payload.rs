//! Problem Payload Decoding
//!
//! Providers return either a bare JSON array of problems or an object that
//! wraps the array under `problems`. Both shapes are decoded explicitly;
//! anything else is a [`ParseFailure`]. No partial results are returned.

use serde_json::Value;

use crate::constants::payload::PROBLEMS_FIELD;
use crate::types::ParseFailure;

/// The two response shapes a provider may produce
#[derive(Debug, Clone, PartialEq)]
pub enum PayloadShape {
    /// `[ {...}, {...} ]`
    Bare(Vec<Value>),
    /// `{ "problems": [ {...}, {...} ] }`
    Wrapped(Vec<Value>),
}

impl PayloadShape {
    /// Classify a decoded document into one of the accepted shapes
    pub fn from_value(value: Value) -> Result<Self, String> {
        match value {
            Value::Array(items) => Ok(Self::Bare(items)),
            Value::Object(mut map) => match map.remove(PROBLEMS_FIELD) {
                Some(Value::Array(items)) => Ok(Self::Wrapped(items)),
                Some(other) => Err(format!(
                    "Field '{}' is {}, expected an array",
                    PROBLEMS_FIELD,
                    value_kind(&other)
                )),
                None => Err(format!("Object has no '{}' field", PROBLEMS_FIELD)),
            },
            other => Err(format!(
                "Expected an array or an object, got {}",
                value_kind(&other)
            )),
        }
    }

    pub fn into_items(self) -> Vec<Value> {
        match self {
            Self::Bare(items) | Self::Wrapped(items) => items,
        }
    }
}

/// Decode normalized text into a sequence of opaque problem payloads
pub fn parse(text: &str) -> Result<Vec<Value>, ParseFailure> {
    let value: Value = serde_json::from_str(text)
        .map_err(|e| ParseFailure::new(format!("Invalid JSON: {}", e), text))?;

    PayloadShape::from_value(value)
        .map(PayloadShape::into_items)
        .map_err(|reason| ParseFailure::new(reason, text))
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
