//! Per-operation decode state.
//!
//! All writable fields are pre-filtered into a [`DecodeContext`] before
//! any validator runs, so validators can depend on sibling field values
//! supplied in the same request.

use std::collections::HashMap;

use serde_json::Value;

use crate::types::ResourceIdentifier;

/// Normalized relationship linkage from the request document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelationshipData {
    /// A to-one linkage: `None` means the client sent an explicit null.
    ToOne(Option<ResourceIdentifier>),
    /// A to-many linkage list; may be empty.
    ToMany(Vec<ResourceIdentifier>),
}

impl RelationshipData {
    /// True for an explicit null (to-one) or an empty list (to-many).
    pub fn is_empty(&self) -> bool {
        match self {
            RelationshipData::ToOne(ident) => ident.is_none(),
            RelationshipData::ToMany(idents) => idents.is_empty(),
        }
    }
}

/// Tri-state of an attribute in the request document.
///
/// `Present(Value::Null)` is an explicit client null and is distinct
/// from `Absent` (the key was not sent at all), which is what makes
/// partial-update semantics expressible.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeState {
    Absent,
    Present(Value),
}

impl AttributeState {
    /// The filtered value, when the key was present in the input.
    pub fn value(&self) -> Option<&Value> {
        match self {
            AttributeState::Absent => None,
            AttributeState::Present(value) => Some(value),
        }
    }

    /// True when the field carries no usable value: absent, or an
    /// explicit null.
    pub fn is_empty(&self) -> bool {
        matches!(self, AttributeState::Absent | AttributeState::Present(Value::Null))
    }

    pub fn is_present(&self) -> bool {
        matches!(self, AttributeState::Present(_))
    }
}

/// Tri-state of a relationship in the request document.
#[derive(Debug, Clone, PartialEq)]
pub enum RelationshipState {
    Absent,
    Present(RelationshipData),
}

impl RelationshipState {
    pub fn data(&self) -> Option<&RelationshipData> {
        match self {
            RelationshipState::Absent => None,
            RelationshipState::Present(data) => Some(data),
        }
    }

    /// True when absent, an explicit to-one null, or an empty to-many
    /// list.
    pub fn is_empty(&self) -> bool {
        match self {
            RelationshipState::Absent => true,
            RelationshipState::Present(data) => data.is_empty(),
        }
    }

    pub fn is_present(&self) -> bool {
        matches!(self, RelationshipState::Present(_))
    }
}

static ABSENT_ATTRIBUTE: AttributeState = AttributeState::Absent;
static ABSENT_RELATIONSHIP: RelationshipState = RelationshipState::Absent;

/// Mutable state of one resource decode, discarded when the operation
/// completes.
///
/// Field validators receive a shared reference to the context, giving
/// them read access to every sibling field of the same resource.
#[derive(Debug, Default)]
pub struct DecodeContext {
    id: Option<String>,
    attributes: HashMap<String, AttributeState>,
    relationships: HashMap<String, RelationshipState>,
    modified: Vec<String>,
}

impl DecodeContext {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// The resource id from the request, when one was supplied (PATCH,
    /// or POST with an ephemeral id).
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Filtered value of an attribute, when present in the input.
    ///
    /// `Some(Value::Null)` is an explicit client null.
    pub fn attribute(&self, key: &str) -> Option<&Value> {
        self.attribute_state(key).value()
    }

    /// Full tri-state of an attribute.
    pub fn attribute_state(&self, key: &str) -> &AttributeState {
        self.attributes.get(key).unwrap_or(&ABSENT_ATTRIBUTE)
    }

    /// Normalized linkage of a relationship, when present in the input.
    pub fn relationship(&self, key: &str) -> Option<&RelationshipData> {
        self.relationship_state(key).data()
    }

    /// Full tri-state of a relationship.
    pub fn relationship_state(&self, key: &str) -> &RelationshipState {
        self.relationships.get(key).unwrap_or(&ABSENT_RELATIONSHIP)
    }

    /// True when the key was present in the request document.
    pub fn is_modified(&self, key: &str) -> bool {
        self.modified.iter().any(|k| k == key)
    }

    /// Keys present in the request document, in declaration order.
    pub fn modified(&self) -> &[String] {
        &self.modified
    }

    pub(crate) fn set_id(&mut self, id: Option<&str>) {
        self.id = id.map(String::from);
    }

    pub(crate) fn set_attribute(&mut self, key: &str, state: AttributeState) {
        if state.is_present() {
            self.modified.push(key.to_string());
        }
        self.attributes.insert(key.to_string(), state);
    }

    pub(crate) fn set_relationship(&mut self, key: &str, state: RelationshipState) {
        if state.is_present() {
            self.modified.push(key.to_string());
        }
        self.relationships.insert(key.to_string(), state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn absent_fields_report_absent() {
        let ctx = DecodeContext::new();
        assert_eq!(ctx.attribute("title"), None);
        assert!(ctx.attribute_state("title").is_empty());
        assert!(!ctx.is_modified("title"));
        assert_eq!(ctx.relationship("author"), None);
    }

    #[test]
    fn explicit_null_is_present_and_empty() {
        let mut ctx = DecodeContext::new();
        ctx.set_attribute("title", AttributeState::Present(Value::Null));

        let state = ctx.attribute_state("title");
        assert!(state.is_present());
        assert!(state.is_empty());
        assert!(ctx.is_modified("title"));
        assert_eq!(ctx.attribute("title"), Some(&Value::Null));
    }

    #[test]
    fn present_value_is_readable_by_validators() {
        let mut ctx = DecodeContext::new();
        ctx.set_attribute("title", AttributeState::Present(json!("Hi")));
        assert_eq!(ctx.attribute("title"), Some(&json!("Hi")));
        assert!(!ctx.attribute_state("title").is_empty());
    }

    #[test]
    fn relationship_emptiness_by_cardinality() {
        let to_one_null = RelationshipData::ToOne(None);
        let to_many_empty = RelationshipData::ToMany(vec![]);
        let to_one = RelationshipData::ToOne(Some(crate::types::ResourceIdentifier::new(
            "people", "9",
        )));

        assert!(to_one_null.is_empty());
        assert!(to_many_empty.is_empty());
        assert!(!to_one.is_empty());
    }

    #[test]
    fn modified_tracks_declaration_order() {
        let mut ctx = DecodeContext::new();
        ctx.set_attribute("title", AttributeState::Present(json!("a")));
        ctx.set_attribute("body", AttributeState::Absent);
        ctx.set_relationship(
            "author",
            RelationshipState::Present(RelationshipData::ToOne(None)),
        );

        assert_eq!(ctx.modified(), ["title", "author"]);
    }
}
