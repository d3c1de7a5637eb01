//! Declarative resource schemas.
//!
//! A [`ResourceSchema`] describes how one domain type maps onto a
//! JSON:API resource: its resource type string, identifier accessor, and
//! ordered attribute and relationship strategies. Schemas are built once
//! at configuration time through typed builders; all accessors are
//! closures captured at build time, so a mapping mistake surfaces when
//! the schema is constructed, not per request.

use std::any::TypeId;

use serde_json::Value;

use crate::context::{DecodeContext, RelationshipData};
use crate::object::Object;
use crate::types::{Cardinality, ValidationResult};

type Getter = Box<dyn Fn(&Object) -> Value>;
type Setter = Box<dyn Fn(&Object, Value)>;
type Filter = Box<dyn Fn(Value) -> Value>;
type AttributeValidator = Box<dyn Fn(&Value, &DecodeContext) -> ValidationResult>;
type RelationshipValidator = Box<dyn Fn(&RelationshipData, &DecodeContext) -> ValidationResult>;
type TargetGetter = Box<dyn Fn(&Object) -> Option<Object>>;
type TargetSetter = Box<dyn Fn(&Object, Option<Object>)>;
type CollectionGetter = Box<dyn Fn(&Object) -> Vec<Object>>;
type CollectionAdd = Box<dyn Fn(&Object, Object)>;
type CollectionClear = Box<dyn Fn(&Object)>;
type IdGetter = Box<dyn Fn(&Object) -> Option<String>>;
type IdSetter = Box<dyn Fn(&Object, Option<String>)>;
type Factory = Box<dyn Fn() -> Object>;

/// Value filter that trims a JSON string and turns a blank result into
/// null. Non-string values pass through unchanged.
pub fn trim_to_null(value: Value) -> Value {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                Value::Null
            } else {
                Value::String(trimmed.to_string())
            }
        }
        other => other,
    }
}

/// A scalar field strategy: flags, filter, validator, and the accessor
/// pair bound to the domain type.
pub struct Attribute {
    key: String,
    readable: bool,
    writable: bool,
    required: bool,
    validate_if_empty: bool,
    filter: Option<Filter>,
    validator: Option<AttributeValidator>,
    get: Option<Getter>,
    set: Option<Setter>,
}

impl Attribute {
    /// New attribute, readable and writable, not required.
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            readable: true,
            writable: true,
            required: false,
            validate_if_empty: false,
            filter: None,
            validator: None,
            get: None,
            set: None,
        }
    }

    pub fn readable(mut self, readable: bool) -> Self {
        self.readable = readable;
        self
    }

    pub fn writable(mut self, writable: bool) -> Self {
        self.writable = writable;
        self
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    /// Run the validator even when the value is absent or null.
    pub fn validate_if_empty(mut self, validate: bool) -> Self {
        self.validate_if_empty = validate;
        self
    }

    /// Pre-processing applied before the value enters the decode
    /// context (and therefore before validation).
    pub fn filter(mut self, f: impl Fn(Value) -> Value + 'static) -> Self {
        self.filter = Some(Box::new(f));
        self
    }

    /// Validator invoked with the filtered value and the full decode
    /// context, so it can reference sibling fields.
    pub fn validator(
        mut self,
        f: impl Fn(&Value, &DecodeContext) -> ValidationResult + 'static,
    ) -> Self {
        self.validator = Some(Box::new(f));
        self
    }

    /// Bind the read accessor.
    pub fn getter<T: 'static>(mut self, f: impl Fn(&T) -> Value + 'static) -> Self {
        self.get = Some(Box::new(move |object: &Object| {
            object.with(|target: &T| f(target)).unwrap_or(Value::Null)
        }));
        self
    }

    /// Bind the write accessor.
    pub fn setter<T: 'static>(mut self, f: impl Fn(&mut T, Value) + 'static) -> Self {
        self.set = Some(Box::new(move |object: &Object, value: Value| {
            object.with_mut(|target: &mut T| f(target, value));
        }));
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn is_readable(&self) -> bool {
        self.readable
    }

    pub fn is_writable(&self) -> bool {
        self.writable
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn validates_if_empty(&self) -> bool {
        self.validate_if_empty
    }

    pub(crate) fn filter_value(&self, value: Value) -> Value {
        match &self.filter {
            Some(filter) => filter(value),
            None => value,
        }
    }

    pub(crate) fn validate(&self, value: &Value, ctx: &DecodeContext) -> ValidationResult {
        match &self.validator {
            Some(validator) => validator(value, ctx),
            None => ValidationResult::ok(),
        }
    }

    pub(crate) fn get_value(&self, object: &Object) -> Value {
        match &self.get {
            Some(get) => get(object),
            None => Value::Null,
        }
    }

    pub(crate) fn set_value(&self, object: &Object, value: Value) {
        if let Some(set) = &self.set {
            set(object, value);
        }
    }
}

/// A reference field strategy: cardinality, flags, the set of expected
/// target schemas, and the accessors bound to the parent domain type.
pub struct Relationship {
    key: String,
    cardinality: Cardinality,
    readable: bool,
    writable: bool,
    required: bool,
    validate_if_empty: bool,
    included: bool,
    expects: Vec<String>,
    validator: Option<RelationshipValidator>,
    get_target: Option<TargetGetter>,
    set_target: Option<TargetSetter>,
    get_collection: Option<CollectionGetter>,
    add_item: Option<CollectionAdd>,
    clear_items: Option<CollectionClear>,
}

impl Relationship {
    fn new(key: impl Into<String>, cardinality: Cardinality) -> Self {
        Self {
            key: key.into(),
            cardinality,
            readable: true,
            writable: true,
            required: false,
            validate_if_empty: false,
            included: false,
            expects: Vec::new(),
            validator: None,
            get_target: None,
            set_target: None,
            get_collection: None,
            add_item: None,
            clear_items: None,
        }
    }

    /// New to-one relationship, readable and writable, not required,
    /// not included.
    pub fn to_one(key: impl Into<String>) -> Self {
        Self::new(key, Cardinality::ToOne)
    }

    /// New to-many relationship, readable and writable, not required,
    /// not included.
    pub fn to_many(key: impl Into<String>) -> Self {
        Self::new(key, Cardinality::ToMany)
    }

    pub fn readable(mut self, readable: bool) -> Self {
        self.readable = readable;
        self
    }

    pub fn writable(mut self, writable: bool) -> Self {
        self.writable = writable;
        self
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    /// Run the validator even when the linkage is absent or empty.
    pub fn validate_if_empty(mut self, validate: bool) -> Self {
        self.validate_if_empty = validate;
        self
    }

    /// Embed the target resource(s) in the document's `included` array
    /// when the encoder is asked for this relationship's path.
    pub fn included(mut self, included: bool) -> Self {
        self.included = included;
        self
    }

    /// Registry keys of the schemas acceptable for the target position.
    /// Order matters: resolution scans first match wins.
    pub fn expects<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.expects = keys.into_iter().map(Into::into).collect();
        self
    }

    /// Validator invoked with the normalized linkage and the full
    /// decode context.
    pub fn validator(
        mut self,
        f: impl Fn(&RelationshipData, &DecodeContext) -> ValidationResult + 'static,
    ) -> Self {
        self.validator = Some(Box::new(f));
        self
    }

    /// Bind the to-one read accessor.
    pub fn getter<T: 'static>(mut self, f: impl Fn(&T) -> Option<Object> + 'static) -> Self {
        self.get_target = Some(Box::new(move |object: &Object| {
            object.with(|parent: &T| f(parent)).flatten()
        }));
        self
    }

    /// Bind the to-one write accessor. Receives `None` when the client
    /// sent an explicit null.
    pub fn setter<T: 'static>(mut self, f: impl Fn(&mut T, Option<Object>) + 'static) -> Self {
        self.set_target = Some(Box::new(move |object: &Object, target: Option<Object>| {
            object.with_mut(|parent: &mut T| f(parent, target));
        }));
        self
    }

    /// Bind the to-many read accessor.
    pub fn collection_getter<T: 'static>(
        mut self,
        f: impl Fn(&T) -> Vec<Object> + 'static,
    ) -> Self {
        self.get_collection = Some(Box::new(move |object: &Object| {
            object.with(|parent: &T| f(parent)).unwrap_or_default()
        }));
        self
    }

    /// Bind the to-many append accessor.
    pub fn collection_add<T: 'static>(mut self, f: impl Fn(&mut T, Object) + 'static) -> Self {
        self.add_item = Some(Box::new(move |object: &Object, item: Object| {
            object.with_mut(|parent: &mut T| f(parent, item));
        }));
        self
    }

    /// Bind the to-many clear accessor.
    pub fn collection_clear<T: 'static>(mut self, f: impl Fn(&mut T) + 'static) -> Self {
        self.clear_items = Some(Box::new(move |object: &Object| {
            object.with_mut(|parent: &mut T| f(parent));
        }));
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn cardinality(&self) -> Cardinality {
        self.cardinality
    }

    pub fn is_readable(&self) -> bool {
        self.readable
    }

    pub fn is_writable(&self) -> bool {
        self.writable
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn validates_if_empty(&self) -> bool {
        self.validate_if_empty
    }

    pub fn is_included(&self) -> bool {
        self.included
    }

    pub fn expected_schemas(&self) -> &[String] {
        &self.expects
    }

    pub(crate) fn validate(&self, data: &RelationshipData, ctx: &DecodeContext) -> ValidationResult {
        match &self.validator {
            Some(validator) => validator(data, ctx),
            None => ValidationResult::ok(),
        }
    }

    pub(crate) fn get_target(&self, object: &Object) -> Option<Object> {
        self.get_target.as_ref().and_then(|get| get(object))
    }

    pub(crate) fn set_target(&self, object: &Object, target: Option<Object>) {
        if let Some(set) = &self.set_target {
            set(object, target);
        }
    }

    pub(crate) fn get_collection(&self, object: &Object) -> Vec<Object> {
        self.get_collection
            .as_ref()
            .map(|get| get(object))
            .unwrap_or_default()
    }

    pub(crate) fn add_to_collection(&self, object: &Object, item: Object) {
        if let Some(add) = &self.add_item {
            add(object, item);
        }
    }

    pub(crate) fn clear_collection(&self, object: &Object) {
        if let Some(clear) = &self.clear_items {
            clear(object);
        }
    }
}

/// Resolved mapping between one domain type and one JSON:API resource
/// type.
pub struct ResourceSchema {
    resource_type: String,
    mapping_id: TypeId,
    mapping_name: &'static str,
    factory: Factory,
    id_get: Option<IdGetter>,
    id_set: Option<IdSetter>,
    attributes: Vec<Attribute>,
    relationships: Vec<Relationship>,
}

impl ResourceSchema {
    /// Start building a schema mapping domain type `T` to the given
    /// resource type string.
    pub fn builder<T: Default + 'static>(resource_type: impl Into<String>) -> SchemaBuilder<T> {
        SchemaBuilder::new(resource_type)
    }

    /// Stable resource type string shared between client and server.
    pub fn resource_type(&self) -> &str {
        &self.resource_type
    }

    /// `TypeId` of the mapped domain type.
    pub fn mapping_id(&self) -> TypeId {
        self.mapping_id
    }

    /// Name of the mapped domain type, for error messages.
    pub fn mapping_name(&self) -> &'static str {
        self.mapping_name
    }

    /// True when the object's runtime type is this schema's mapping.
    pub fn matches(&self, object: &Object) -> bool {
        object.mapping_id() == self.mapping_id
    }

    /// Construct an empty domain instance.
    pub(crate) fn new_object(&self) -> Object {
        (self.factory)()
    }

    /// Read the resource id off a domain instance.
    pub fn get_id(&self, object: &Object) -> Option<String> {
        self.id_get.as_ref().and_then(|get| get(object))
    }

    /// Write the resource id onto a domain instance.
    pub(crate) fn set_id(&self, object: &Object, id: Option<String>) {
        if let Some(set) = &self.id_set {
            set(object, id);
        }
    }

    /// Attribute strategies in declaration order.
    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    /// Relationship strategies in declaration order.
    pub fn relationships(&self) -> &[Relationship] {
        &self.relationships
    }
}

impl std::fmt::Debug for ResourceSchema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceSchema")
            .field("resource_type", &self.resource_type)
            .field("mapping", &self.mapping_name)
            .field("attributes", &self.attributes.len())
            .field("relationships", &self.relationships.len())
            .finish()
    }
}

/// Typed builder for [`ResourceSchema`].
///
/// `T` is the mapped domain type; it must be `Default` so the decoder
/// can construct empty instances to hydrate.
pub struct SchemaBuilder<T> {
    resource_type: String,
    id_get: Option<IdGetter>,
    id_set: Option<IdSetter>,
    attributes: Vec<Attribute>,
    relationships: Vec<Relationship>,
    _marker: std::marker::PhantomData<T>,
}

impl<T: Default + 'static> SchemaBuilder<T> {
    fn new(resource_type: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            id_get: None,
            id_set: None,
            attributes: Vec::new(),
            relationships: Vec::new(),
            _marker: std::marker::PhantomData,
        }
    }

    /// Bind the identifier accessor pair. Ids are always strings on the
    /// wire.
    pub fn id(
        mut self,
        get: impl Fn(&T) -> Option<String> + 'static,
        set: impl Fn(&mut T, Option<String>) + 'static,
    ) -> Self {
        self.id_get = Some(Box::new(move |object: &Object| {
            object.with(|target: &T| get(target)).flatten()
        }));
        self.id_set = Some(Box::new(move |object: &Object, id: Option<String>| {
            object.with_mut(|target: &mut T| set(target, id));
        }));
        self
    }

    /// Add an attribute. An attribute with the same key replaces the
    /// earlier one, keeping its position.
    pub fn attribute(mut self, attribute: Attribute) -> Self {
        match self.attributes.iter().position(|a| a.key == attribute.key) {
            Some(index) => self.attributes[index] = attribute,
            None => self.attributes.push(attribute),
        }
        self
    }

    /// Add a relationship. A relationship with the same key replaces
    /// the earlier one, keeping its position.
    pub fn relationship(mut self, relationship: Relationship) -> Self {
        match self
            .relationships
            .iter()
            .position(|r| r.key == relationship.key)
        {
            Some(index) => self.relationships[index] = relationship,
            None => self.relationships.push(relationship),
        }
        self
    }

    pub fn build(self) -> ResourceSchema {
        ResourceSchema {
            resource_type: self.resource_type,
            mapping_id: TypeId::of::<T>(),
            mapping_name: std::any::type_name::<T>(),
            factory: Box::new(|| Object::new(T::default())),
            id_get: self.id_get,
            id_set: self.id_set,
            attributes: self.attributes,
            relationships: self.relationships,
        }
    }
}
