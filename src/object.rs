//! Shared handles to domain object instances and the per-operation
//! identity cache.

use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::schema::ResourceSchema;

/// Type-erased shared handle to a domain object instance.
///
/// A decode operation must yield exactly one instance per resource
/// identity, shared between the primary resource and every relationship
/// that references it, so that attribute population on one reference is
/// visible through all of them. The handle therefore wraps the instance
/// in `Rc<RefCell<T>>` behind type erasure and hands out typed access
/// through [`Object::with`] and [`Object::with_mut`].
#[derive(Clone)]
pub struct Object {
    inner: Rc<dyn Any>,
    mapping_id: TypeId,
    mapping_name: &'static str,
}

impl Object {
    /// Wrap a fresh domain instance.
    pub fn new<T: 'static>(value: T) -> Self {
        Self {
            inner: Rc::new(RefCell::new(value)),
            mapping_id: TypeId::of::<T>(),
            mapping_name: std::any::type_name::<T>(),
        }
    }

    /// Wrap an instance already shared elsewhere in the domain graph.
    pub fn from_rc<T: 'static>(cell: Rc<RefCell<T>>) -> Self {
        Self {
            inner: cell,
            mapping_id: TypeId::of::<T>(),
            mapping_name: std::any::type_name::<T>(),
        }
    }

    /// `TypeId` of the underlying domain type.
    pub fn mapping_id(&self) -> TypeId {
        self.mapping_id
    }

    /// Name of the underlying domain type, for error messages.
    pub fn mapping_name(&self) -> &'static str {
        self.mapping_name
    }

    /// True when the underlying domain type is `T`.
    pub fn is<T: 'static>(&self) -> bool {
        self.mapping_id == TypeId::of::<T>()
    }

    /// The underlying shared cell, when the domain type matches.
    pub fn downcast<T: 'static>(&self) -> Option<Rc<RefCell<T>>> {
        self.inner.clone().downcast::<RefCell<T>>().ok()
    }

    /// Run `f` against a shared borrow of the instance.
    ///
    /// Returns `None` when the domain type does not match.
    pub fn with<T: 'static, R>(&self, f: impl FnOnce(&T) -> R) -> Option<R> {
        self.downcast::<T>().map(|cell| f(&cell.borrow()))
    }

    /// Run `f` against an exclusive borrow of the instance.
    ///
    /// Returns `None` when the domain type does not match.
    pub fn with_mut<T: 'static, R>(&self, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        self.downcast::<T>().map(|cell| f(&mut cell.borrow_mut()))
    }

    /// True when both handles refer to the same instance.
    pub fn ptr_eq(&self, other: &Object) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl std::fmt::Debug for Object {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Object<{}>", self.mapping_name)
    }
}

/// Per-operation identity cache mapping `(mapping type, id)` to the
/// already-materialized instance.
///
/// Created fresh for every decode call and discarded afterwards; no
/// state survives across operations.
#[derive(Default)]
pub struct ObjectCache {
    entries: HashMap<(TypeId, String), Object>,
}

impl ObjectCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the instance for this identity, constructing it at most
    /// once per operation.
    ///
    /// A cache miss constructs an empty instance through the schema's
    /// factory, writes the id onto it via the schema's identifier
    /// accessor, and stores it. Resources without an id have no identity
    /// to share and are constructed uncached.
    pub fn get_or_create(&mut self, schema: &ResourceSchema, id: Option<&str>) -> Object {
        let Some(id) = id else {
            return schema.new_object();
        };

        let key = (schema.mapping_id(), id.to_string());
        if let Some(object) = self.entries.get(&key) {
            return object.clone();
        }

        let object = schema.new_object();
        schema.set_id(&object, Some(id.to_string()));
        self.entries.insert(key, object.clone());
        object
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
