//! Core types shared by the encoder and decoder.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Returns the JSON type name for error messages.
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// The minimal `{type, id}` pair used to reference a resource without
/// embedding its attributes.
///
/// Equality is structural: two identifiers are equal when both members
/// match. Ids are always transmitted as strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceIdentifier {
    #[serde(rename = "type")]
    pub resource_type: String,
    pub id: String,
}

impl ResourceIdentifier {
    pub fn new(resource_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            id: id.into(),
        }
    }
}

/// Cardinality of a relationship.
///
/// Determines whether the relationship's `data` member is a single
/// linkage object (or null) or an array of linkage objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cardinality {
    ToOne,
    ToMany,
}

/// Outcome of a field validator.
///
/// A failed result carries one message per violation; the decoder turns
/// each message into a separate error tagged with the field key.
#[derive(Debug, Clone)]
pub struct ValidationResult {
    valid: bool,
    messages: Vec<String>,
}

impl ValidationResult {
    /// A passing result.
    pub fn ok() -> Self {
        Self {
            valid: true,
            messages: Vec::new(),
        }
    }

    /// A failing result with a single message.
    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            valid: false,
            messages: vec![message.into()],
        }
    }

    /// A failing result with one message per violation.
    pub fn fail_all(messages: Vec<String>) -> Self {
        Self {
            valid: false,
            messages,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn messages(&self) -> &[String] {
        &self.messages
    }
}
