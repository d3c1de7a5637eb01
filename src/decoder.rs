//! Decoder engine: JSON:API request documents into domain objects.
//!
//! Decoding walks each resource object in two passes. The first pass
//! filters every writable field into a [`DecodeContext`], so validators
//! that depend on sibling fields see the whole request before any of
//! them runs. The second pass applies the
//! skip/required/validate-if-empty decision tree per field, accumulating
//! one [`FieldError`] per violation while continuing the walk, and
//! hydrates the domain object through the per-operation identity cache.
//! A result with any accumulated error is suppressed: the caller never
//! receives a partially-valid object.

use std::rc::Rc;

use serde_json::{Map, Value};

use crate::context::{AttributeState, DecodeContext, RelationshipData, RelationshipState};
use crate::envelope::{check_document, DocumentKind};
use crate::error::{DecodeError, ErrorDocument, FieldError};
use crate::object::{Object, ObjectCache};
use crate::registry::SchemaRegistry;
use crate::schema::{Relationship, ResourceSchema};
use crate::types::{json_type_name, Cardinality, ResourceIdentifier};

const FIELD_REQUIRED: &str = "Field is required.";

/// Options for a plain [`decode`] call.
#[derive(Debug, Clone)]
pub struct DecodeOptions {
    /// Registry keys of the schemas acceptable for the primary data.
    pub candidates: Vec<String>,
    /// Leave fields absent from the request untouched instead of
    /// treating them as explicit nulls (partial-update semantics).
    pub ignore_missing_fields: bool,
}

impl DecodeOptions {
    pub fn new<I, S>(candidates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            candidates: candidates.into_iter().map(Into::into).collect(),
            ignore_missing_fields: false,
        }
    }

    pub fn ignore_missing_fields(mut self, ignore: bool) -> Self {
        self.ignore_missing_fields = ignore;
        self
    }
}

/// Options for [`decode_post`].
#[derive(Debug, Clone)]
pub struct PostOptions {
    /// Registry keys of the schemas acceptable for the primary data.
    pub candidates: Vec<String>,
    /// Accept a client-generated id on the new resource.
    pub allow_ephemeral_id: bool,
}

impl PostOptions {
    pub fn new<I, S>(candidates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            candidates: candidates.into_iter().map(Into::into).collect(),
            allow_ephemeral_id: false,
        }
    }

    pub fn allow_ephemeral_id(mut self, allow: bool) -> Self {
        self.allow_ephemeral_id = allow;
        self
    }
}

/// Primary data of a completed decode.
#[derive(Debug)]
pub enum DecodedData {
    /// The document carried an explicit `"data": null`.
    Null,
    /// One resource object.
    One(Object),
    /// A resource collection; empty for `"data": []`.
    Many(Vec<Object>),
}

/// Outcome of one decode operation.
///
/// All per-call state lives here; the decode functions themselves hold
/// none, so one registry can serve any number of concurrent calls.
#[derive(Debug)]
pub struct Decoded {
    data: Option<DecodedData>,
    errors: Vec<FieldError>,
    modified: Vec<String>,
}

impl Decoded {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn errors(&self) -> &[FieldError] {
        &self.errors
    }

    /// JSON:API 422 error document for the accumulated field errors,
    /// when any occurred.
    pub fn error_document(&self) -> Option<ErrorDocument> {
        if self.errors.is_empty() {
            None
        } else {
            Some(ErrorDocument::unprocessable(self.errors.clone()))
        }
    }

    /// Field keys present in the request, for callers that need
    /// partial-update semantics.
    pub fn modified_fields(&self) -> &[String] {
        &self.modified
    }

    /// The decoded data. `None` when validation errors suppressed the
    /// result.
    pub fn data(&self) -> Option<&DecodedData> {
        self.data.as_ref()
    }

    /// The single decoded resource, when the document carried one and
    /// no errors occurred.
    pub fn resource(&self) -> Option<&Object> {
        match &self.data {
            Some(DecodedData::One(object)) => Some(object),
            _ => None,
        }
    }

    /// The decoded collection, when the document carried one and no
    /// errors occurred.
    pub fn collection(&self) -> Option<&[Object]> {
        match &self.data {
            Some(DecodedData::Many(objects)) => Some(objects),
            _ => None,
        }
    }

    /// True when the document carried an explicit `"data": null`.
    pub fn is_null(&self) -> bool {
        matches!(&self.data, Some(DecodedData::Null))
    }
}

/// Decode a JSON:API document into domain objects.
///
/// `data` may be null, a resource object, or a resource array; the
/// result mirrors that cardinality. This entry point performs the
/// minimal structural checks inline and assumes any stricter envelope
/// gate has already run; [`decode_post`] and [`decode_patch`] run the
/// gate themselves.
///
/// # Errors
///
/// Returns `DecodeError` for malformed JSON or structural violations.
/// Field-level validation problems do not error: they are accumulated
/// on the returned [`Decoded`] and suppress its data.
pub fn decode(
    body: &str,
    registry: &SchemaRegistry,
    options: &DecodeOptions,
) -> Result<Decoded, DecodeError> {
    let root = parse_document(body)?;
    let data = root.get("data").ok_or(DecodeError::MissingData)?;
    decode_data(data, registry, &options.candidates, options.ignore_missing_fields)
}

/// Decode a POST resource document.
///
/// Runs the POST envelope gate, rejects a client-supplied id unless
/// `allow_ephemeral_id`, and treats absent fields as explicit nulls.
pub fn decode_post(
    body: &str,
    registry: &SchemaRegistry,
    options: &PostOptions,
) -> Result<Decoded, DecodeError> {
    let root = parse_document(body)?;
    check_document(DocumentKind::Post, &root)?;

    let data = root.get("data").ok_or(DecodeError::MissingData)?;
    if data.get("id").is_some() && !options.allow_ephemeral_id {
        return Err(DecodeError::EphemeralIdNotAllowed);
    }

    decode_data(data, registry, &options.candidates, false)
}

/// Decode a PATCH resource document.
///
/// Runs the PATCH envelope gate (which requires the resource id) and
/// leaves fields absent from the request untouched: the partial-update
/// contract.
pub fn decode_patch<I, S>(
    body: &str,
    registry: &SchemaRegistry,
    candidates: I,
) -> Result<Decoded, DecodeError>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let root = parse_document(body)?;
    check_document(DocumentKind::Patch, &root)?;

    let data = root.get("data").ok_or(DecodeError::MissingData)?;
    let candidates: Vec<String> = candidates.into_iter().map(Into::into).collect();
    decode_data(data, registry, &candidates, true)
}

/// Decode a standalone to-one relationship document into its target
/// object (`None` for `"data": null`).
///
/// Unlike relationship linkage inside a resource document, an unknown
/// resource type here is an error: the endpoint passed its exact
/// acceptable candidate set.
pub fn decode_to_one_relationship<I, S>(
    body: &str,
    registry: &SchemaRegistry,
    candidates: I,
) -> Result<Option<Object>, DecodeError>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let root = parse_document(body)?;
    check_document(DocumentKind::ToOneRelationship, &root)?;

    let data = root.get("data").ok_or(DecodeError::MissingData)?;
    let candidates: Vec<String> = candidates.into_iter().map(Into::into).collect();
    let mut cache = ObjectCache::new();

    match data {
        Value::Null => Ok(None),
        Value::Object(_) => Ok(Some(identifier_object(
            data,
            registry,
            &candidates,
            &mut cache,
        )?)),
        other => Err(DecodeError::InvalidData {
            actual: json_type_name(other),
        }),
    }
}

/// Decode a standalone to-many relationship document into its target
/// objects, materialized through a per-call identity cache.
pub fn decode_to_many_relationship<I, S>(
    body: &str,
    registry: &SchemaRegistry,
    candidates: I,
) -> Result<Vec<Object>, DecodeError>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let root = parse_document(body)?;
    check_document(DocumentKind::ToManyRelationship, &root)?;

    let data = root.get("data").ok_or(DecodeError::MissingData)?;
    let items = match data {
        Value::Array(items) => items,
        other => {
            return Err(DecodeError::InvalidData {
                actual: json_type_name(other),
            })
        }
    };

    let candidates: Vec<String> = candidates.into_iter().map(Into::into).collect();
    let mut cache = ObjectCache::new();
    let mut objects = Vec::with_capacity(items.len());
    for item in items {
        objects.push(identifier_object(item, registry, &candidates, &mut cache)?);
    }
    Ok(objects)
}

// --- Internal implementation ---

fn parse_document(body: &str) -> Result<Value, DecodeError> {
    serde_json::from_str(body).map_err(|source| DecodeError::InvalidJson { source })
}

fn decode_data(
    data: &Value,
    registry: &SchemaRegistry,
    candidates: &[String],
    ignore_missing_fields: bool,
) -> Result<Decoded, DecodeError> {
    let mut cache = ObjectCache::new();
    let mut errors = Vec::new();
    let mut modified = Vec::new();

    let decoded = match data {
        Value::Null => DecodedData::Null,
        Value::Object(_) => DecodedData::One(decode_resource_object(
            data,
            registry,
            candidates,
            ignore_missing_fields,
            &mut cache,
            &mut errors,
            &mut modified,
        )?),
        Value::Array(items) => {
            let mut objects = Vec::with_capacity(items.len());
            for item in items {
                objects.push(decode_resource_object(
                    item,
                    registry,
                    candidates,
                    ignore_missing_fields,
                    &mut cache,
                    &mut errors,
                    &mut modified,
                )?);
            }
            DecodedData::Many(objects)
        }
        other => {
            return Err(DecodeError::InvalidData {
                actual: json_type_name(other),
            })
        }
    };

    // Never hand out a partially-valid result
    let data = if errors.is_empty() { Some(decoded) } else { None };
    Ok(Decoded {
        data,
        errors,
        modified,
    })
}

fn decode_resource_object(
    data: &Value,
    registry: &SchemaRegistry,
    candidates: &[String],
    ignore_missing_fields: bool,
    cache: &mut ObjectCache,
    errors: &mut Vec<FieldError>,
    modified: &mut Vec<String>,
) -> Result<Object, DecodeError> {
    let map = data.as_object().ok_or_else(|| DecodeError::InvalidResource {
        actual: json_type_name(data),
    })?;

    let resource_type = map
        .get("type")
        .and_then(Value::as_str)
        .ok_or(DecodeError::MissingResourceType)?;

    let schema = registry
        .by_resource_type(resource_type, candidates)?
        .ok_or_else(|| DecodeError::UnknownResourceType {
            resource_type: resource_type.to_string(),
        })?;

    let id = map.get("id").and_then(Value::as_str);
    let object = cache.get_or_create(&schema, id);

    // First pass: filter every writable field into the context so
    // interdependent validators see the whole request
    let mut ctx = DecodeContext::new();
    ctx.set_id(id);
    populate_context(&schema, map, &mut ctx)?;

    // Second pass: validate and hydrate from context values
    hydrate_attributes(&schema, &object, &ctx, ignore_missing_fields, errors);
    hydrate_relationships(
        &schema,
        &object,
        &ctx,
        ignore_missing_fields,
        registry,
        cache,
        errors,
    )?;

    for key in ctx.modified() {
        if !modified.iter().any(|k| k == key) {
            modified.push(key.clone());
        }
    }

    Ok(object)
}

fn populate_context(
    schema: &ResourceSchema,
    map: &Map<String, Value>,
    ctx: &mut DecodeContext,
) -> Result<(), DecodeError> {
    let attributes = match map.get("attributes") {
        None => None,
        Some(Value::Object(attrs)) => Some(attrs),
        Some(other) => {
            return Err(DecodeError::InvalidAttributes {
                actual: json_type_name(other),
            })
        }
    };

    for attribute in schema.attributes().iter().filter(|a| a.is_writable()) {
        let state = match attributes.and_then(|attrs| attrs.get(attribute.key())) {
            Some(value) => AttributeState::Present(attribute.filter_value(value.clone())),
            None => AttributeState::Absent,
        };
        ctx.set_attribute(attribute.key(), state);
    }

    let relationships = match map.get("relationships") {
        None => None,
        Some(Value::Object(rels)) => Some(rels),
        Some(other) => {
            return Err(DecodeError::InvalidRelationships {
                actual: json_type_name(other),
            })
        }
    };

    for relationship in schema.relationships().iter().filter(|r| r.is_writable()) {
        let state = match relationships.and_then(|rels| rels.get(relationship.key())) {
            Some(value) => RelationshipState::Present(normalize_relationship(relationship, value)?),
            None => RelationshipState::Absent,
        };
        ctx.set_relationship(relationship.key(), state);
    }

    Ok(())
}

/// Normalize a relationship member into `{type, id}` linkage per its
/// declared cardinality.
fn normalize_relationship(
    relationship: &Relationship,
    value: &Value,
) -> Result<RelationshipData, DecodeError> {
    let key = relationship.key();
    let data = value
        .get("data")
        .ok_or_else(|| DecodeError::MissingRelationshipData {
            key: key.to_string(),
        })?;

    match relationship.cardinality() {
        Cardinality::ToOne => match data {
            Value::Null => Ok(RelationshipData::ToOne(None)),
            Value::Object(_) => Ok(RelationshipData::ToOne(Some(parse_linkage(data, key)?))),
            _ => Err(DecodeError::InvalidToOneLinkage {
                key: key.to_string(),
            }),
        },
        Cardinality::ToMany => match data {
            Value::Array(items) => {
                let idents = items
                    .iter()
                    .map(|item| parse_linkage(item, key))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(RelationshipData::ToMany(idents))
            }
            _ => Err(DecodeError::InvalidToManyLinkage {
                key: key.to_string(),
            }),
        },
    }
}

fn parse_linkage(value: &Value, key: &str) -> Result<ResourceIdentifier, DecodeError> {
    let resource_type = value.get("type").and_then(Value::as_str);
    let id = value.get("id").and_then(Value::as_str);

    match (resource_type, id) {
        (Some(resource_type), Some(id)) => Ok(ResourceIdentifier::new(resource_type, id)),
        _ => Err(DecodeError::InvalidLinkage {
            key: key.to_string(),
        }),
    }
}

fn hydrate_attributes(
    schema: &ResourceSchema,
    object: &Object,
    ctx: &DecodeContext,
    ignore_missing_fields: bool,
    errors: &mut Vec<FieldError>,
) {
    for attribute in schema.attributes().iter().filter(|a| a.is_writable()) {
        let key = attribute.key();
        let state = ctx.attribute_state(key);

        // Absent or explicit null
        if state.is_empty() {
            if ignore_missing_fields && !state.is_present() {
                continue;
            }
            if attribute.is_required() {
                errors.push(FieldError::new(key, FIELD_REQUIRED));
                continue;
            }
            if !attribute.validates_if_empty() {
                attribute.set_value(object, Value::Null);
                continue;
            }
        }

        let value = state.value().cloned().unwrap_or(Value::Null);
        let result = attribute.validate(&value, ctx);
        if result.is_valid() {
            attribute.set_value(object, value);
        } else {
            for message in result.messages() {
                errors.push(FieldError::new(key, message.clone()));
            }
        }
    }
}

fn hydrate_relationships(
    schema: &ResourceSchema,
    object: &Object,
    ctx: &DecodeContext,
    ignore_missing_fields: bool,
    registry: &SchemaRegistry,
    cache: &mut ObjectCache,
    errors: &mut Vec<FieldError>,
) -> Result<(), DecodeError> {
    for relationship in schema.relationships().iter().filter(|r| r.is_writable()) {
        let key = relationship.key();
        let state = ctx.relationship_state(key);

        // Absent, explicit to-one null, or empty to-many list
        if state.is_empty() {
            if ignore_missing_fields && !state.is_present() {
                continue;
            }
            if relationship.is_required() {
                errors.push(FieldError::new(key, FIELD_REQUIRED));
                continue;
            }
            if !relationship.validates_if_empty() {
                hydrate_relationship(relationship, object, &empty_data(relationship), registry, cache)?;
                continue;
            }
        }

        let data = state
            .data()
            .cloned()
            .unwrap_or_else(|| empty_data(relationship));
        let result = relationship.validate(&data, ctx);
        if result.is_valid() {
            hydrate_relationship(relationship, object, &data, registry, cache)?;
        } else {
            for message in result.messages() {
                errors.push(FieldError::new(key, message.clone()));
            }
        }
    }

    Ok(())
}

fn empty_data(relationship: &Relationship) -> RelationshipData {
    match relationship.cardinality() {
        Cardinality::ToOne => RelationshipData::ToOne(None),
        Cardinality::ToMany => RelationshipData::ToMany(Vec::new()),
    }
}

/// Resolve linkage against the relationship's expected schemas and
/// assign through the identity cache.
///
/// Linkage whose type matches no expected schema is dropped without
/// error: polymorphic slots are often only partially known to one
/// endpoint.
fn hydrate_relationship(
    relationship: &Relationship,
    parent: &Object,
    data: &RelationshipData,
    registry: &SchemaRegistry,
    cache: &mut ObjectCache,
) -> Result<(), DecodeError> {
    match data {
        RelationshipData::ToOne(None) => relationship.set_target(parent, None),
        RelationshipData::ToOne(Some(ident)) => {
            if let Some(schema) = expected_schema_for(relationship, ident, registry)? {
                let target = cache.get_or_create(&schema, Some(&ident.id));
                relationship.set_target(parent, Some(target));
            }
        }
        RelationshipData::ToMany(idents) => {
            if idents.is_empty() {
                relationship.clear_collection(parent);
                return Ok(());
            }
            for ident in idents {
                if let Some(schema) = expected_schema_for(relationship, ident, registry)? {
                    let target = cache.get_or_create(&schema, Some(&ident.id));
                    relationship.add_to_collection(parent, target);
                }
            }
        }
    }

    Ok(())
}

fn expected_schema_for(
    relationship: &Relationship,
    ident: &ResourceIdentifier,
    registry: &SchemaRegistry,
) -> Result<Option<Rc<ResourceSchema>>, DecodeError> {
    registry
        .by_resource_type(&ident.resource_type, relationship.expected_schemas())
        .map_err(Into::into)
}

fn identifier_object(
    value: &Value,
    registry: &SchemaRegistry,
    candidates: &[String],
    cache: &mut ObjectCache,
) -> Result<Object, DecodeError> {
    let ident = parse_linkage(value, "data")?;
    let schema = registry
        .by_resource_type(&ident.resource_type, candidates)?
        .ok_or_else(|| DecodeError::UnknownResourceType {
            resource_type: ident.resource_type.clone(),
        })?;
    Ok(cache.get_or_create(&schema, Some(&ident.id)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Attribute;
    use crate::types::ValidationResult;
    use serde_json::json;

    #[derive(Default)]
    struct Note {
        id: Option<String>,
        title: Option<String>,
        body: Option<String>,
        owner: Option<Object>,
        tags: Vec<Object>,
    }

    #[derive(Default)]
    struct Tag {
        id: Option<String>,
        label: Option<String>,
    }

    fn registry() -> SchemaRegistry {
        let mut registry = SchemaRegistry::new();
        registry.register("note", || {
            ResourceSchema::builder::<Note>("notes")
                .id(|n| n.id.clone(), |n, id| n.id = id)
                .attribute(
                    Attribute::new("title")
                        .required(true)
                        .getter(|n: &Note| {
                            n.title.clone().map(Value::from).unwrap_or(Value::Null)
                        })
                        .setter(|n: &mut Note, v| n.title = v.as_str().map(String::from)),
                )
                .attribute(
                    Attribute::new("body")
                        .getter(|n: &Note| n.body.clone().map(Value::from).unwrap_or(Value::Null))
                        .setter(|n: &mut Note, v| n.body = v.as_str().map(String::from)),
                )
                .relationship(
                    Relationship::to_one("owner")
                        .expects(["tag_owner"])
                        .getter(|n: &Note| n.owner.clone())
                        .setter(|n: &mut Note, target| n.owner = target),
                )
                .relationship(
                    Relationship::to_many("tags")
                        .expects(["tag"])
                        .collection_getter(|n: &Note| n.tags.clone())
                        .collection_add(|n: &mut Note, item| n.tags.push(item))
                        .collection_clear(|n: &mut Note| n.tags.clear()),
                )
                .build()
        });
        registry.register("tag", || {
            ResourceSchema::builder::<Tag>("tags")
                .id(|t| t.id.clone(), |t, id| t.id = id)
                .attribute(
                    Attribute::new("label")
                        .getter(|t: &Tag| t.label.clone().map(Value::from).unwrap_or(Value::Null))
                        .setter(|t: &mut Tag, v| t.label = v.as_str().map(String::from)),
                )
                .build()
        });
        registry.register("tag_owner", || {
            ResourceSchema::builder::<Tag>("owners")
                .id(|t| t.id.clone(), |t, id| t.id = id)
                .build()
        });
        registry
    }

    fn note_options() -> DecodeOptions {
        DecodeOptions::new(["note"])
    }

    // === Cardinality disambiguation ===

    #[test]
    fn null_data_decodes_to_null() {
        let decoded = decode(r#"{"data": null}"#, &registry(), &note_options()).unwrap();
        assert!(decoded.is_null());
        assert!(!decoded.has_errors());
    }

    #[test]
    fn empty_array_decodes_to_empty_collection() {
        let decoded = decode(r#"{"data": []}"#, &registry(), &note_options()).unwrap();
        assert_eq!(decoded.collection().unwrap().len(), 0);
    }

    #[test]
    fn object_data_decodes_to_single_resource() {
        let body = json!({
            "data": { "type": "notes", "id": "1", "attributes": { "title": "Hi" } }
        })
        .to_string();
        let decoded = decode(&body, &registry(), &note_options()).unwrap();
        let note = decoded.resource().unwrap();
        assert_eq!(note.with(|n: &Note| n.title.clone()).unwrap(), Some("Hi".into()));
    }

    #[test]
    fn scalar_data_is_invalid() {
        let err = decode(r#"{"data": 5}"#, &registry(), &note_options()).unwrap_err();
        assert!(matches!(err, DecodeError::InvalidData { actual: "number" }));
    }

    #[test]
    fn missing_data_member_is_invalid() {
        let err = decode(r#"{}"#, &registry(), &note_options()).unwrap_err();
        assert!(matches!(err, DecodeError::MissingData));
    }

    #[test]
    fn malformed_json_is_invalid() {
        let err = decode("{", &registry(), &note_options()).unwrap_err();
        assert!(matches!(err, DecodeError::InvalidJson { .. }));
    }

    // === Required fields and error accumulation ===

    #[test]
    fn required_attribute_missing_yields_one_error() {
        let body = json!({ "data": { "type": "notes" } }).to_string();
        let decoded = decode(&body, &registry(), &note_options()).unwrap();

        assert!(decoded.has_errors());
        assert!(decoded.data().is_none());
        assert_eq!(decoded.errors().len(), 1);
        assert_eq!(decoded.errors()[0].pointer, "title");
        assert_eq!(decoded.errors()[0].detail, "Field is required.");
    }

    #[test]
    fn validation_continues_past_first_error() {
        let mut registry = registry();
        registry.register("strict_note", || {
            ResourceSchema::builder::<Note>("notes")
                .id(|n| n.id.clone(), |n, id| n.id = id)
                .attribute(Attribute::new("title").required(true))
                .attribute(Attribute::new("body").required(true))
                .build()
        });

        let body = json!({ "data": { "type": "notes" } }).to_string();
        let decoded = decode(&body, &registry, &DecodeOptions::new(["strict_note"])).unwrap();

        let pointers: Vec<&str> = decoded.errors().iter().map(|e| e.pointer.as_str()).collect();
        assert_eq!(pointers, ["title", "body"]);
    }

    #[test]
    fn validator_failure_emits_one_error_per_message() {
        let mut registry = SchemaRegistry::new();
        registry.register("note", || {
            ResourceSchema::builder::<Note>("notes")
                .attribute(Attribute::new("title").validator(|_, _| {
                    ValidationResult::fail_all(vec!["too short".into(), "not unique".into()])
                }))
                .build()
        });

        let body = json!({ "data": { "type": "notes", "attributes": { "title": "x" } } })
            .to_string();
        let decoded = decode(&body, &registry, &DecodeOptions::new(["note"])).unwrap();

        assert_eq!(decoded.errors().len(), 2);
        assert!(decoded.errors().iter().all(|e| e.pointer == "title"));
    }

    #[test]
    fn validator_sees_sibling_fields_through_context() {
        let mut registry = SchemaRegistry::new();
        registry.register("note", || {
            ResourceSchema::builder::<Note>("notes")
                .attribute(Attribute::new("title").validator(|_, ctx| {
                    // Declared after this attribute, populated before
                    // any validator runs
                    if ctx.attribute("body").is_some() {
                        ValidationResult::ok()
                    } else {
                        ValidationResult::fail("requires body")
                    }
                }))
                .attribute(Attribute::new("body"))
                .build()
        });

        let body = json!({
            "data": { "type": "notes", "attributes": { "title": "a", "body": "b" } }
        })
        .to_string();
        let decoded = decode(&body, &registry, &DecodeOptions::new(["note"])).unwrap();
        assert!(!decoded.has_errors());

        let body = json!({
            "data": { "type": "notes", "attributes": { "title": "a" } }
        })
        .to_string();
        let decoded = decode(&body, &registry, &DecodeOptions::new(["note"])).unwrap();
        assert_eq!(decoded.errors().len(), 1);
    }

    // === Partial update semantics ===

    #[test]
    fn ignore_missing_skips_absent_but_not_explicit_null() {
        let options = DecodeOptions::new(["note"]).ignore_missing_fields(true);

        // Absent required attribute: skipped
        let body = json!({ "data": { "type": "notes", "id": "1" } }).to_string();
        let decoded = decode(&body, &registry(), &options).unwrap();
        assert!(!decoded.has_errors());

        // Explicit null on a required attribute: still an error
        let body = json!({
            "data": { "type": "notes", "id": "1", "attributes": { "title": null } }
        })
        .to_string();
        let decoded = decode(&body, &registry(), &options).unwrap();
        assert_eq!(decoded.errors().len(), 1);
    }

    #[test]
    fn modified_fields_reflect_request_keys() {
        let body = json!({
            "data": {
                "type": "notes",
                "attributes": { "title": "Hi" },
                "relationships": { "tags": { "data": [] } },
            }
        })
        .to_string();
        let decoded = decode(&body, &registry(), &note_options()).unwrap();
        assert_eq!(decoded.modified_fields(), ["title", "tags"]);
    }

    // === Relationship hydration ===

    #[test]
    fn to_many_linkage_hydrates_through_cache() {
        let body = json!({
            "data": {
                "type": "notes",
                "attributes": { "title": "Hi" },
                "relationships": {
                    "tags": { "data": [
                        { "type": "tags", "id": "1" },
                        { "type": "tags", "id": "2" },
                    ] },
                }
            }
        })
        .to_string();
        let decoded = decode(&body, &registry(), &note_options()).unwrap();
        let note = decoded.resource().unwrap();

        let tags = note.with(|n: &Note| n.tags.clone()).unwrap();
        assert_eq!(tags.len(), 2);
        assert!(tags[0].with(|t: &Tag| t.id.clone()).unwrap() == Some("1".into()));
    }

    #[test]
    fn unknown_polymorphic_type_is_silently_dropped() {
        let body = json!({
            "data": {
                "type": "notes",
                "attributes": { "title": "Hi" },
                "relationships": {
                    "owner": { "data": { "type": "groups", "id": "5" } },
                    "tags": { "data": [
                        { "type": "tags", "id": "1" },
                        { "type": "groups", "id": "5" },
                    ] },
                }
            }
        })
        .to_string();
        let decoded = decode(&body, &registry(), &note_options()).unwrap();
        assert!(!decoded.has_errors());

        let note = decoded.resource().unwrap();
        assert!(note.with(|n: &Note| n.owner.clone()).unwrap().is_none());
        assert_eq!(note.with(|n: &Note| n.tags.len()).unwrap(), 1);
    }

    #[test]
    fn explicit_null_to_one_clears_target() {
        let body = json!({
            "data": {
                "type": "notes",
                "attributes": { "title": "Hi" },
                "relationships": { "owner": { "data": null } },
            }
        })
        .to_string();
        let decoded = decode(&body, &registry(), &note_options()).unwrap();
        let note = decoded.resource().unwrap();
        assert!(note.with(|n: &Note| n.owner.clone()).unwrap().is_none());
    }

    #[test]
    fn linkage_without_string_id_is_invalid() {
        let body = json!({
            "data": {
                "type": "notes",
                "attributes": { "title": "Hi" },
                "relationships": { "owner": { "data": { "type": "owners", "id": 5 } } },
            }
        })
        .to_string();
        let err = decode(&body, &registry(), &note_options()).unwrap_err();
        assert!(matches!(err, DecodeError::InvalidLinkage { key } if key == "owner"));
    }

    // === POST / PATCH gates ===

    #[test]
    fn post_rejects_client_id_by_default() {
        let body = json!({
            "data": { "type": "notes", "id": "7", "attributes": { "title": "Hi" } }
        })
        .to_string();
        let err = decode_post(&body, &registry(), &PostOptions::new(["note"])).unwrap_err();
        assert!(matches!(err, DecodeError::EphemeralIdNotAllowed));
    }

    #[test]
    fn post_accepts_ephemeral_id_when_allowed() {
        let body = json!({
            "data": { "type": "notes", "id": "7", "attributes": { "title": "Hi" } }
        })
        .to_string();
        let options = PostOptions::new(["note"]).allow_ephemeral_id(true);
        let decoded = decode_post(&body, &registry(), &options).unwrap();
        let note = decoded.resource().unwrap();
        assert_eq!(note.with(|n: &Note| n.id.clone()).unwrap(), Some("7".into()));
    }

    #[test]
    fn patch_requires_id_via_envelope() {
        let body = json!({
            "data": { "type": "notes", "attributes": { "title": "Hi" } }
        })
        .to_string();
        let err = decode_patch(&body, &registry(), ["note"]).unwrap_err();
        assert!(matches!(err, DecodeError::Envelope { .. }));
    }

    // === Relationship request documents ===

    #[test]
    fn to_one_relationship_request_resolves_target() {
        let body = json!({ "data": { "type": "tags", "id": "3" } }).to_string();
        let target = decode_to_one_relationship(&body, &registry(), ["tag"])
            .unwrap()
            .unwrap();
        assert_eq!(target.with(|t: &Tag| t.id.clone()).unwrap(), Some("3".into()));
    }

    #[test]
    fn to_one_relationship_request_null_unsets() {
        let target = decode_to_one_relationship(r#"{"data": null}"#, &registry(), ["tag"]).unwrap();
        assert!(target.is_none());
    }

    #[test]
    fn to_one_relationship_request_unknown_type_errors() {
        let body = json!({ "data": { "type": "groups", "id": "3" } }).to_string();
        let err = decode_to_one_relationship(&body, &registry(), ["tag"]).unwrap_err();
        assert!(matches!(err, DecodeError::UnknownResourceType { .. }));
    }

    #[test]
    fn to_many_relationship_request_resolves_targets() {
        let body = json!({
            "data": [
                { "type": "tags", "id": "1" },
                { "type": "tags", "id": "2" },
            ]
        })
        .to_string();
        let targets = decode_to_many_relationship(&body, &registry(), ["tag"]).unwrap();
        assert_eq!(targets.len(), 2);
    }

    #[test]
    fn unknown_resource_type_for_primary_errors() {
        let body = json!({ "data": { "type": "unicorns" } }).to_string();
        let err = decode(&body, &registry(), &note_options()).unwrap_err();
        assert!(
            matches!(err, DecodeError::UnknownResourceType { resource_type } if resource_type == "unicorns")
        );
    }

    #[test]
    fn error_document_carries_pointer_and_detail() {
        let body = json!({ "data": { "type": "notes" } }).to_string();
        let decoded = decode(&body, &registry(), &note_options()).unwrap();
        let document = decoded.error_document().unwrap();

        assert_eq!(document.status(), "422");
        assert_eq!(
            serde_json::to_value(&document).unwrap(),
            json!({
                "errors": [
                    { "source": { "pointer": "title" }, "detail": "Field is required." }
                ]
            })
        );
    }
}
