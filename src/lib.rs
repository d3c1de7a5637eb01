//! JSON:API Codec
//!
//! Schema-driven encoding and decoding of JSON:API resource documents.
//!
//! This library maps domain objects onto JSON:API documents in both
//! directions: encoding walks a domain object graph guided by
//! declarative [`ResourceSchema`]s, extracting attributes and
//! relationships and embedding requested related resources exactly once
//! each; decoding validates a request document field by field and
//! hydrates domain objects through a per-operation identity cache, so
//! every reference to the same `(type, id)` yields one shared instance.
//!
//! # Example
//!
//! ```
//! use jsonapi_codec::{decode_post, Attribute, PostOptions, ResourceSchema, SchemaRegistry};
//! use serde_json::{json, Value};
//!
//! #[derive(Default)]
//! struct Article {
//!     id: Option<String>,
//!     title: Option<String>,
//! }
//!
//! let mut registry = SchemaRegistry::new();
//! registry.register("article", || {
//!     ResourceSchema::builder::<Article>("articles")
//!         .id(|a| a.id.clone(), |a, id| a.id = id)
//!         .attribute(
//!             Attribute::new("title")
//!                 .required(true)
//!                 .getter(|a: &Article| a.title.clone().map(Value::from).unwrap_or(Value::Null))
//!                 .setter(|a: &mut Article, value| a.title = value.as_str().map(String::from)),
//!         )
//!         .build()
//! });
//!
//! let body = json!({
//!     "data": { "type": "articles", "attributes": { "title": "Hi" } }
//! })
//! .to_string();
//!
//! let decoded = decode_post(&body, &registry, &PostOptions::new(["article"])).unwrap();
//! let article = decoded.resource().unwrap();
//! assert_eq!(article.with(|a: &Article| a.title.clone()).unwrap(), Some("Hi".into()));
//! ```
//!
//! # Decode semantics
//!
//! | Input | Result |
//! |-------|--------|
//! | `"data": null` | null (single-resource unset) |
//! | `"data": {}` resource object | one domain object |
//! | `"data": []` | empty collection |
//! | `"data": [{}, ...]` | collection of domain objects |
//!
//! Field validation problems never abort the walk: every violation is
//! collected and reported together through
//! [`Decoded::error_document`], and the decode result is suppressed so
//! callers never see a partially-valid object. PATCH decodes leave
//! fields absent from the request untouched; POST decodes treat them as
//! explicit nulls.

mod context;
mod decoder;
mod encoder;
mod envelope;
mod error;
mod object;
mod registry;
mod schema;
mod types;

pub use context::{AttributeState, DecodeContext, RelationshipData, RelationshipState};
pub use decoder::{
    decode, decode_patch, decode_post, decode_to_many_relationship, decode_to_one_relationship,
    DecodeOptions, Decoded, DecodedData, PostOptions,
};
pub use encoder::{encode_collection, encode_resource, EncodeOptions};
pub use envelope::{check_document, envelope_schema, DocumentKind};
pub use error::{DecodeError, EncodeError, ErrorDocument, FieldError, RegistryError};
pub use object::{Object, ObjectCache};
pub use registry::SchemaRegistry;
pub use schema::{trim_to_null, Attribute, Relationship, ResourceSchema, SchemaBuilder};
pub use types::{Cardinality, ResourceIdentifier, ValidationResult};
