//! Encoder engine: domain objects into JSON:API documents.
//!
//! Extraction walks the object graph depth-first, guided by the schema
//! resolved for each node. Relationships flagged `included` whose dotted
//! path appears in the caller's include list are embedded in the
//! document's `included` array, deduplicated by `(type, id)` so a
//! resource reached through several paths appears exactly once and
//! cyclic graphs terminate.

use std::collections::HashSet;
use std::rc::Rc;

use serde_json::{json, Map, Value};

use crate::error::EncodeError;
use crate::object::Object;
use crate::registry::SchemaRegistry;
use crate::schema::ResourceSchema;
use crate::types::Cardinality;

/// Options for an encode call.
#[derive(Debug, Clone)]
pub struct EncodeOptions {
    /// Registry keys of the schemas acceptable for the root position.
    pub candidates: Vec<String>,
    /// Dotted relationship paths to embed in `included`, e.g.
    /// `"comments"` or `"comments.author"`. A nested path does not
    /// imply its prefix.
    pub included: Vec<String>,
}

impl EncodeOptions {
    pub fn new<I, S>(candidates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            candidates: candidates.into_iter().map(Into::into).collect(),
            included: Vec::new(),
        }
    }

    pub fn included<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.included = paths.into_iter().map(Into::into).collect();
        self
    }
}

/// Encode a single domain object into a JSON:API document string.
///
/// Output is pretty-printed with unicode preserved.
///
/// # Errors
///
/// Returns `EncodeError::NoCompatibleSchema` when no candidate schema
/// maps the object's runtime type.
pub fn encode_resource(
    resource: &Object,
    registry: &SchemaRegistry,
    options: &EncodeOptions,
) -> Result<String, EncodeError> {
    let schema = root_schema(resource, registry, options)?;

    let mut included = IncludedSet::default();
    let mut path = Vec::new();
    let data = extract_resource(resource, &schema, registry, options, &mut path, &mut included)?;

    assemble_document(Value::Object(data), included)
}

/// Encode a collection of domain objects into a JSON:API document
/// string. An empty slice encodes as `"data": []`.
///
/// # Errors
///
/// Returns `EncodeError::NoCompatibleSchema` when any element's runtime
/// type matches no candidate schema.
pub fn encode_collection(
    resources: &[Object],
    registry: &SchemaRegistry,
    options: &EncodeOptions,
) -> Result<String, EncodeError> {
    let mut included = IncludedSet::default();
    let mut items = Vec::with_capacity(resources.len());

    for resource in resources {
        let schema = root_schema(resource, registry, options)?;
        let mut path = Vec::new();
        items.push(Value::Object(extract_resource(
            resource,
            &schema,
            registry,
            options,
            &mut path,
            &mut included,
        )?));
    }

    assemble_document(Value::Array(items), included)
}

// --- Internal implementation ---

/// Included resources in discovery order, deduplicated by identity.
#[derive(Default)]
struct IncludedSet {
    seen: HashSet<(String, String)>,
    resources: Vec<Value>,
}

impl IncludedSet {
    /// Claim an identity. Returns false when it is already present (or
    /// currently being extracted, which is what breaks cycles).
    fn claim(&mut self, resource_type: &str, id: &str) -> bool {
        self.seen
            .insert((resource_type.to_string(), id.to_string()))
    }

    fn push(&mut self, resource: Value) {
        self.resources.push(resource);
    }
}

fn root_schema(
    resource: &Object,
    registry: &SchemaRegistry,
    options: &EncodeOptions,
) -> Result<Rc<ResourceSchema>, EncodeError> {
    registry
        .by_mapping(resource, &options.candidates)?
        .ok_or_else(|| EncodeError::NoCompatibleSchema {
            mapping: resource.mapping_name(),
        })
}

fn extract_resource(
    object: &Object,
    schema: &ResourceSchema,
    registry: &SchemaRegistry,
    options: &EncodeOptions,
    path: &mut Vec<String>,
    included: &mut IncludedSet,
) -> Result<Map<String, Value>, EncodeError> {
    let mut attributes = Map::new();
    for attribute in schema.attributes().iter().filter(|a| a.is_readable()) {
        attributes.insert(attribute.key().to_string(), attribute.get_value(object));
    }

    let relationships = walk_relationships(object, schema, registry, options, path, included)?;

    let mut data = Map::new();
    data.insert("type".to_string(), json!(schema.resource_type()));
    data.insert("id".to_string(), json!(schema.get_id(object)));
    if !attributes.is_empty() {
        data.insert("attributes".to_string(), Value::Object(attributes));
    }
    if !relationships.is_empty() {
        data.insert("relationships".to_string(), Value::Object(relationships));
    }

    Ok(data)
}

fn walk_relationships(
    object: &Object,
    schema: &ResourceSchema,
    registry: &SchemaRegistry,
    options: &EncodeOptions,
    path: &mut Vec<String>,
    included: &mut IncludedSet,
) -> Result<Map<String, Value>, EncodeError> {
    let mut relationships = Map::new();
    for relationship in schema.relationships().iter().filter(|r| r.is_readable()) {
        match relationship.cardinality() {
            Cardinality::ToOne => match relationship.get_target(object) {
                None => {
                    relationships.insert(relationship.key().to_string(), json!({ "data": null }));
                }
                Some(target) => {
                    // A target matching no expected schema omits the
                    // member: polymorphic slots are often only
                    // partially known to one endpoint
                    if let Some(linkage) = extract_relationship(
                        &target,
                        relationship.key(),
                        relationship.expected_schemas(),
                        relationship.is_included(),
                        registry,
                        options,
                        path,
                        included,
                    )? {
                        relationships
                            .insert(relationship.key().to_string(), json!({ "data": linkage }));
                    }
                }
            },
            Cardinality::ToMany => {
                let mut linkages = Vec::new();
                for target in relationship.get_collection(object) {
                    if let Some(linkage) = extract_relationship(
                        &target,
                        relationship.key(),
                        relationship.expected_schemas(),
                        relationship.is_included(),
                        registry,
                        options,
                        path,
                        included,
                    )? {
                        linkages.push(linkage);
                    }
                }
                relationships.insert(
                    relationship.key().to_string(),
                    json!({ "data": linkages }),
                );
            }
        }
    }

    Ok(relationships)
}

/// Resolve one relationship target to its linkage, embedding the target
/// in the included set when the walked dotted path was requested.
///
/// A requested path deeper than the current one (`"comments.author"`
/// while walking `"comments"`) descends through the target without
/// embedding it, so callers can request a nested resource without its
/// intermediates.
///
/// Returns `None` when the target's runtime type matches no expected
/// schema.
#[allow(clippy::too_many_arguments)]
fn extract_relationship(
    target: &Object,
    key: &str,
    expected: &[String],
    relationship_included: bool,
    registry: &SchemaRegistry,
    options: &EncodeOptions,
    path: &mut Vec<String>,
    included: &mut IncludedSet,
) -> Result<Option<Value>, EncodeError> {
    let Some(schema) = registry.by_mapping(target, expected)? else {
        return Ok(None);
    };

    let resource_type = schema.resource_type().to_string();
    let id = schema.get_id(target);

    path.push(key.to_string());
    if relationship_included {
        let dotted = path.join(".");
        let embed = options.included.iter().any(|p| *p == dotted);
        let prefix = format!("{}.", dotted);
        let descend = options.included.iter().any(|p| p.starts_with(&prefix));

        if embed {
            if let Some(id) = &id {
                if included.claim(&resource_type, id) {
                    let resource =
                        extract_resource(target, &schema, registry, options, path, included)?;
                    included.push(Value::Object(resource));
                }
            }
        } else if descend {
            walk_relationships(target, &schema, registry, options, path, included)?;
        }
    }
    path.pop();

    Ok(Some(json!({ "type": resource_type, "id": id })))
}

fn assemble_document(data: Value, included: IncludedSet) -> Result<String, EncodeError> {
    let mut root = Map::new();
    root.insert("data".to_string(), data);
    if !included.resources.is_empty() {
        root.insert("included".to_string(), Value::Array(included.resources));
    }

    serde_json::to_string_pretty(&Value::Object(root))
        .map_err(|source| EncodeError::Serialize { source })
}
