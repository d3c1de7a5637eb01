//! Error types for document encoding and decoding.

use serde::ser::{Serialize, SerializeMap, Serializer};
use thiserror::Error;

/// Errors raised by schema registry lookups.
///
/// These indicate configuration mistakes (a schema key that was never
/// registered), not client input problems.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("no schema registered under key \"{key}\"")]
    UnknownSchema { key: String },
}

/// Fatal errors during document decoding.
///
/// Each of these aborts the decode immediately. Recoverable per-field
/// validation problems are accumulated as [`FieldError`]s on the decode
/// result instead.
#[derive(Debug, Error)]
pub enum DecodeError {
    // Parse errors (exit code 2)
    #[error("invalid JSON: {source}")]
    InvalidJson {
        #[source]
        source: serde_json::Error,
    },

    // Envelope violations (exit code 1)
    #[error("document does not match the {kind} envelope: {} violation(s)", errors.len())]
    Envelope {
        kind: &'static str,
        errors: Vec<FieldError>,
    },

    #[error("failed to compile envelope schema: {message}")]
    EnvelopeSchema { message: String },

    // Structural errors (exit code 2)
    #[error("missing top-level 'data' member")]
    MissingData,

    #[error("'data' must be an object, array, or null, got {actual}")]
    InvalidData { actual: &'static str },

    #[error("resource object must be an object, got {actual}")]
    InvalidResource { actual: &'static str },

    #[error("resource object is missing 'type'")]
    MissingResourceType,

    #[error("resource object is missing 'id'")]
    MissingResourceId,

    #[error("ephemeral ids are not allowed for this endpoint")]
    EphemeralIdNotAllowed,

    #[error("no candidate schema declares resource type \"{resource_type}\"")]
    UnknownResourceType { resource_type: String },

    #[error("'attributes' must be an object, got {actual}")]
    InvalidAttributes { actual: &'static str },

    #[error("'relationships' must be an object, got {actual}")]
    InvalidRelationships { actual: &'static str },

    #[error("relationship \"{key}\" is missing its 'data' member")]
    MissingRelationshipData { key: String },

    #[error("invalid to-one relationship \"{key}\": expected null or a linkage object")]
    InvalidToOneLinkage { key: String },

    #[error("invalid to-many relationship \"{key}\": expected an array of linkage objects")]
    InvalidToManyLinkage { key: String },

    #[error("linkage in relationship \"{key}\" must carry string 'type' and 'id' members")]
    InvalidLinkage { key: String },

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Fatal errors during document encoding.
///
/// These indicate programmer errors: the caller handed the encoder an
/// object no candidate schema can map.
#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("no compatible schema found for resource of type {mapping}")]
    NoCompatibleSchema { mapping: &'static str },

    #[error("failed to serialize document: {source}")]
    Serialize {
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

impl DecodeError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            DecodeError::Envelope { .. } => 1,
            _ => 2,
        }
    }
}

impl EncodeError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        2
    }
}

/// Single recoverable field-level error, tagged with the offending
/// field key as its pointer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    /// Field key (or JSON Pointer, for envelope violations) the error
    /// refers to.
    pub pointer: String,
    /// Human-readable explanation of this occurrence of the problem.
    pub detail: String,
}

impl FieldError {
    pub fn new(pointer: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            pointer: pointer.into(),
            detail: detail.into(),
        }
    }
}

impl std::fmt::Display for FieldError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.pointer, self.detail)
    }
}

// Wire shape: {"source": {"pointer": ...}, "detail": ...}
impl Serialize for FieldError {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(serde::Serialize)]
        struct Source<'a> {
            pointer: &'a str,
        }

        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry(
            "source",
            &Source {
                pointer: &self.pointer,
            },
        )?;
        map.serialize_entry("detail", &self.detail)?;
        map.end()
    }
}

/// JSON:API error document assembled from accumulated field errors.
///
/// Serializes to `{"errors": [...]}`. The HTTP status is a side channel
/// for transport layers and is not part of the document body.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ErrorDocument {
    #[serde(skip)]
    status: &'static str,
    errors: Vec<FieldError>,
}

impl ErrorDocument {
    /// Build a 422 Unprocessable Entity document from field errors.
    pub fn unprocessable(errors: Vec<FieldError>) -> Self {
        Self {
            status: "422",
            errors,
        }
    }

    /// The HTTP status conventionally surfaced with this document.
    pub fn status(&self) -> &'static str {
        self.status
    }

    pub fn errors(&self) -> &[FieldError] {
        &self.errors
    }

    /// Serialize the document body, pretty-printed.
    pub fn to_json(&self) -> String {
        // Serialization of this shape cannot fail
        serde_json::to_string_pretty(self).unwrap_or_default()
    }
}
