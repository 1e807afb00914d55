//! Component records, blueprints, and the per-type recycling pool.
//!
//! Components are opaque to the runtime: a type tag plus named JSON fields.
//! The world never interprets the fields; systems and queries do. Blueprints
//! are registered once per type and copied on every mint; retired instances
//! are reissued with their fields fully reset to the current blueprint.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ---------------------------------------------------------------------------
// Component
// ---------------------------------------------------------------------------

/// A typed record attachable to an entity.
///
/// The type tag names the component type (`"Position"`, `"Health"`) and is
/// the key under which the instance lives in an entity's map, so an entity
/// holds at most one component per tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Component {
    type_tag: String,
    fields: Map<String, Value>,
}

impl Component {
    /// Create a component with no fields.
    pub fn new(type_tag: impl Into<String>) -> Self {
        Self {
            type_tag: type_tag.into(),
            fields: Map::new(),
        }
    }

    /// Builder-style field setter.
    ///
    /// ```
    /// use warren_ecs::component::Component;
    ///
    /// let position = Component::new("Position").with("x", 0.0).with("y", 0.0);
    /// assert_eq!(position.number("x"), Some(0.0));
    /// ```
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// The tag naming this component's type.
    #[inline]
    pub fn type_tag(&self) -> &str {
        &self.type_tag
    }

    /// Borrow a field value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Set a field value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(key.into(), value.into());
    }

    /// Read a field as an `f64`. `None` when the field is absent or not a
    /// number.
    pub fn number(&self, key: &str) -> Option<f64> {
        self.fields.get(key).and_then(Value::as_f64)
    }

    /// All fields of this component.
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Merge `overrides` over the current fields. Overridden keys are
    /// replaced, everything else is preserved.
    pub fn merge(&mut self, overrides: &Map<String, Value>) {
        for (key, value) in overrides {
            self.fields.insert(key.clone(), value.clone());
        }
    }

    /// Overwrite this instance entirely from `blueprint`. Nothing survives
    /// from the previous owner.
    pub(crate) fn reset_from(&mut self, blueprint: &Component) {
        self.type_tag.clone_from(&blueprint.type_tag);
        self.fields.clone_from(&blueprint.fields);
    }
}

// ---------------------------------------------------------------------------
// BlueprintTable
// ---------------------------------------------------------------------------

/// Registered component blueprints, keyed by type tag.
///
/// Minting copies the blueprint; the blueprint itself is never handed out.
/// Registering a tag twice replaces the previous blueprint (last write
/// wins).
#[derive(Debug)]
pub struct BlueprintTable {
    blueprints: HashMap<String, Component>,
}

impl BlueprintTable {
    pub fn new() -> Self {
        Self {
            blueprints: HashMap::new(),
        }
    }

    /// Store `blueprint` under its own type tag. Returns whether a previous
    /// blueprint was replaced.
    pub fn register(&mut self, blueprint: Component) -> bool {
        self.blueprints
            .insert(blueprint.type_tag().to_owned(), blueprint)
            .is_some()
    }

    /// Borrow the blueprint for `type_tag`.
    pub fn get(&self, type_tag: &str) -> Option<&Component> {
        self.blueprints.get(type_tag)
    }

    /// Whether `type_tag` has a registered blueprint.
    pub fn contains(&self, type_tag: &str) -> bool {
        self.blueprints.contains_key(type_tag)
    }

    /// Number of registered blueprints.
    pub fn len(&self) -> usize {
        self.blueprints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blueprints.is_empty()
    }

    /// Tags of every registered blueprint, sorted for stable error messages.
    pub fn registered_tags(&self) -> Vec<&str> {
        let mut tags: Vec<&str> = self.blueprints.keys().map(|tag| tag.as_str()).collect();
        tags.sort();
        tags
    }
}

impl Default for BlueprintTable {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// ComponentPool
// ---------------------------------------------------------------------------

/// Retired component instances, keyed by type tag, reissued LIFO.
///
/// The boxes themselves are what get recycled: a reissued instance is the
/// same heap allocation that was retired earlier, with its fields reset by
/// the minting path.
#[derive(Debug)]
pub struct ComponentPool {
    retired: HashMap<String, Vec<Box<Component>>>,
}

impl ComponentPool {
    pub fn new() -> Self {
        Self {
            retired: HashMap::new(),
        }
    }

    /// Pop the most recently retired instance of `type_tag`, if any.
    pub fn acquire(&mut self, type_tag: &str) -> Option<Box<Component>> {
        self.retired.get_mut(type_tag).and_then(Vec::pop)
    }

    /// Park a retired instance under its own type tag. The per-tag list is
    /// created on first use.
    pub fn retire(&mut self, component: Box<Component>) {
        self.retired
            .entry(component.type_tag().to_owned())
            .or_default()
            .push(component);
    }

    /// Number of retired instances waiting under `type_tag`.
    pub fn count(&self, type_tag: &str) -> usize {
        self.retired.get(type_tag).map_or(0, Vec::len)
    }

    /// Total retired instances across all tags.
    pub fn total(&self) -> usize {
        self.retired.values().map(Vec::len).sum()
    }
}

impl Default for ComponentPool {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
