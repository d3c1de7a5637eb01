//! Schema registry: lazy construction and memoization of resource
//! schemas.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::error::RegistryError;
use crate::object::Object;
use crate::schema::ResourceSchema;

type SchemaBuilderFn = Box<dyn Fn() -> ResourceSchema>;

/// Registry of schema builders keyed by a caller-chosen configuration
/// key.
///
/// `resolve` constructs each schema at most once for the lifetime of
/// the registry and hands out shared references afterwards. The
/// candidate scans are intentionally linear: callers always supply the
/// narrow set of keys acceptable for one endpoint, not the whole
/// registry.
#[derive(Default)]
pub struct SchemaRegistry {
    builders: HashMap<String, SchemaBuilderFn>,
    cache: RefCell<HashMap<String, Rc<ResourceSchema>>>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a schema builder under a key. A later registration
    /// under the same key replaces the earlier one and drops its cached
    /// schema.
    pub fn register(&mut self, key: impl Into<String>, build: impl Fn() -> ResourceSchema + 'static) {
        let key = key.into();
        self.cache.borrow_mut().remove(&key);
        self.builders.insert(key, Box::new(build));
    }

    /// Resolve a key to its schema, constructing and memoizing it on
    /// first use.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::UnknownSchema` when no builder was
    /// registered under the key.
    pub fn resolve(&self, key: &str) -> Result<Rc<ResourceSchema>, RegistryError> {
        if let Some(schema) = self.cache.borrow().get(key) {
            return Ok(schema.clone());
        }

        let build = self
            .builders
            .get(key)
            .ok_or_else(|| RegistryError::UnknownSchema {
                key: key.to_string(),
            })?;

        let schema = Rc::new(build());
        self.cache
            .borrow_mut()
            .insert(key.to_string(), schema.clone());
        Ok(schema)
    }

    /// First candidate schema declaring the given resource type, or
    /// `None` when no candidate matches.
    pub fn by_resource_type<S: AsRef<str>>(
        &self,
        resource_type: &str,
        candidates: &[S],
    ) -> Result<Option<Rc<ResourceSchema>>, RegistryError> {
        for key in candidates {
            let schema = self.resolve(key.as_ref())?;
            if schema.resource_type() == resource_type {
                return Ok(Some(schema));
            }
        }
        Ok(None)
    }

    /// First candidate schema whose mapping matches the object's
    /// runtime type, or `None` when no candidate matches.
    pub fn by_mapping<S: AsRef<str>>(
        &self,
        object: &Object,
        candidates: &[S],
    ) -> Result<Option<Rc<ResourceSchema>>, RegistryError> {
        for key in candidates {
            let schema = self.resolve(key.as_ref())?;
            if schema.matches(object) {
                return Ok(Some(schema));
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[derive(Default)]
    struct Person {
        id: Option<String>,
    }

    #[derive(Default)]
    struct Robot {
        id: Option<String>,
    }

    fn person_schema() -> ResourceSchema {
        ResourceSchema::builder::<Person>("people")
            .id(|p| p.id.clone(), |p, id| p.id = id)
            .build()
    }

    fn robot_schema() -> ResourceSchema {
        ResourceSchema::builder::<Robot>("robots")
            .id(|r| r.id.clone(), |r, id| r.id = id)
            .build()
    }

    #[test]
    fn resolve_memoizes_one_schema_per_key() {
        let built = Rc::new(Cell::new(0));
        let counter = built.clone();

        let mut registry = SchemaRegistry::new();
        registry.register("person", move || {
            counter.set(counter.get() + 1);
            person_schema()
        });

        let first = registry.resolve("person").unwrap();
        let second = registry.resolve("person").unwrap();
        assert!(Rc::ptr_eq(&first, &second));
        assert_eq!(built.get(), 1);
    }

    #[test]
    fn resolve_unknown_key_errors() {
        let registry = SchemaRegistry::new();
        let err = registry.resolve("missing").unwrap_err();
        assert!(matches!(err, RegistryError::UnknownSchema { key } if key == "missing"));
    }

    #[test]
    fn by_resource_type_scans_candidates_in_order() {
        let mut registry = SchemaRegistry::new();
        registry.register("person", person_schema);
        registry.register("robot", robot_schema);

        let schema = registry
            .by_resource_type("robots", &["person", "robot"])
            .unwrap()
            .unwrap();
        assert_eq!(schema.resource_type(), "robots");

        // Not in the candidate list: no match even though registered
        let none = registry.by_resource_type("robots", &["person"]).unwrap();
        assert!(none.is_none());
    }

    #[test]
    fn by_mapping_matches_runtime_type() {
        let mut registry = SchemaRegistry::new();
        registry.register("person", person_schema);
        registry.register("robot", robot_schema);

        let object = Object::new(Robot::default());
        let schema = registry
            .by_mapping(&object, &["person", "robot"])
            .unwrap()
            .unwrap();
        assert_eq!(schema.resource_type(), "robots");
    }

    #[test]
    fn reregistering_a_key_drops_the_cached_schema() {
        let mut registry = SchemaRegistry::new();
        registry.register("thing", person_schema);
        assert_eq!(registry.resolve("thing").unwrap().resource_type(), "people");

        registry.register("thing", robot_schema);
        assert_eq!(registry.resolve("thing").unwrap().resource_type(), "robots");
    }
}
