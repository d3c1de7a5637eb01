//! Structural pre-validation of request documents.
//!
//! Before a document reaches the decoder it must match the JSON:API
//! envelope shape for its request kind. The rules are expressed as
//! built-in JSON Schemas and checked with the `jsonschema` crate:
//! resource objects require `type` (PATCH additionally `id`), attribute
//! members must be scalars and must not shadow reserved keys,
//! relationship members are `{ "data": null | linkage | [linkage, ...] }`
//! with linkage carrying string `type` and `id`, and no unknown members
//! are allowed anywhere in the envelope.

use serde_json::{json, Value};

use crate::error::{DecodeError, FieldError};

/// The four request document kinds with distinct envelope rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    /// Resource creation: `id` is optional (ephemeral) on the resource.
    Post,
    /// Resource update: `type` and `id` are both required.
    Patch,
    /// Standalone to-one relationship update: `data` is null or one
    /// linkage.
    ToOneRelationship,
    /// Standalone to-many relationship update: `data` is a linkage
    /// array.
    ToManyRelationship,
}

impl DocumentKind {
    /// Human-readable envelope name used in error messages.
    pub fn name(&self) -> &'static str {
        match self {
            DocumentKind::Post => "POST resource",
            DocumentKind::Patch => "PATCH resource",
            DocumentKind::ToOneRelationship => "to-one relationship",
            DocumentKind::ToManyRelationship => "to-many relationship",
        }
    }
}

/// Returns the built-in JSON Schema for a request document kind.
pub fn envelope_schema(kind: DocumentKind) -> Value {
    match kind {
        DocumentKind::Post => resource_document_schema(false),
        DocumentKind::Patch => resource_document_schema(true),
        DocumentKind::ToOneRelationship => json!({
            "type": "object",
            "required": ["data"],
            "properties": {
                "data": {
                    "anyOf": [
                        { "type": "null" },
                        { "$ref": "#/definitions/linkage" },
                    ],
                },
            },
            "additionalProperties": false,
            "definitions": {
                "linkage": linkage_schema(),
            },
        }),
        DocumentKind::ToManyRelationship => json!({
            "type": "object",
            "required": ["data"],
            "properties": {
                "data": {
                    "type": "array",
                    "items": { "$ref": "#/definitions/linkage" },
                    "uniqueItems": true,
                },
            },
            "additionalProperties": false,
            "definitions": {
                "linkage": linkage_schema(),
            },
        }),
    }
}

/// Check a parsed document against the envelope for its kind.
///
/// # Errors
///
/// Returns `DecodeError::Envelope` carrying one [`FieldError`] per
/// violation, each pointing at the offending document location.
pub fn check_document(kind: DocumentKind, document: &Value) -> Result<(), DecodeError> {
    let schema = envelope_schema(kind);
    let validator =
        jsonschema::validator_for(&schema).map_err(|e| DecodeError::EnvelopeSchema {
            message: e.to_string(),
        })?;

    let errors: Vec<FieldError> = validator
        .iter_errors(document)
        .map(|e| FieldError::new(e.instance_path.to_string(), e.to_string()))
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(DecodeError::Envelope {
            kind: kind.name(),
            errors,
        })
    }
}

// --- Schema fragments ---

fn resource_document_schema(require_id: bool) -> Value {
    let required = if require_id {
        json!(["type", "id"])
    } else {
        json!(["type"])
    };

    json!({
        "type": "object",
        "required": ["data"],
        "properties": {
            "data": { "$ref": "#/definitions/resource" },
        },
        "additionalProperties": false,
        "definitions": {
            "resource": {
                "type": "object",
                "required": required,
                "properties": {
                    "type": { "type": "string" },
                    "id": { "type": "string" },
                    "attributes": { "$ref": "#/definitions/attributes" },
                    "relationships": { "$ref": "#/definitions/relationships" },
                },
                "additionalProperties": false,
            },
            "attributes": {
                "type": "object",
                // Attribute members must not shadow reserved keys and
                // must hold scalar values
                "patternProperties": {
                    "^(?!relationships$|links$|id$|type$)\\w[-\\w_]*$": {
                        "not": { "type": ["object", "array"] },
                    },
                },
                "additionalProperties": false,
            },
            "relationships": {
                "type": "object",
                "patternProperties": {
                    "^(?!id$|type$)\\w[-\\w_]*$": {
                        "type": "object",
                        "required": ["data"],
                        "properties": {
                            "data": {
                                "oneOf": [
                                    { "$ref": "#/definitions/relationshipToOne" },
                                    { "$ref": "#/definitions/relationshipToMany" },
                                ],
                            },
                        },
                        "additionalProperties": false,
                    },
                },
                "additionalProperties": false,
            },
            "relationshipToOne": {
                "anyOf": [
                    { "type": "null" },
                    { "$ref": "#/definitions/linkage" },
                ],
            },
            "relationshipToMany": {
                "type": "array",
                "items": { "$ref": "#/definitions/linkage" },
                "uniqueItems": true,
            },
            "linkage": linkage_schema(),
        },
    })
}

fn linkage_schema() -> Value {
    json!({
        "type": "object",
        "required": ["type", "id"],
        "properties": {
            "type": { "type": "string" },
            "id": { "type": "string" },
        },
        "additionalProperties": false,
    })
}
