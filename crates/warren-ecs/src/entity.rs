//! Entity handles, records, and the recycling pool.
//!
//! An [`EntityId`] is a plain index. Retired handles are reissued unchanged:
//! after an entity is recycled, the next creation hands back the *same* id.
//! Whether a handle currently refers to a live entity is answered by the
//! world, not by the handle itself.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::component::Component;

// ---------------------------------------------------------------------------
// EntityId
// ---------------------------------------------------------------------------

/// A lightweight entity handle.
///
/// Ids are cheap to copy and compare. A recycled id compares equal to the id
/// of the entity that previously owned the slot.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityId(u32);

impl EntityId {
    pub(crate) fn new(index: u32) -> Self {
        Self(index)
    }

    /// The slot index backing this handle.
    #[inline]
    pub fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityId({})", self.0)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Entity
// ---------------------------------------------------------------------------

/// An entity record: a bag of components keyed by type tag.
///
/// Records live in the world's slot table and stay allocated across
/// recycling; `alive` distinguishes a live entity from a pooled slot.
/// Reading is public, but all structural mutation goes through the world so
/// cached queries stay correct.
#[derive(Debug)]
pub struct Entity {
    id: EntityId,
    components: HashMap<String, Box<Component>>,
    alive: bool,
}

impl Entity {
    pub(crate) fn new(id: EntityId) -> Self {
        Self {
            id,
            components: HashMap::new(),
            alive: true,
        }
    }

    /// The handle this record answers for.
    #[inline]
    pub fn id(&self) -> EntityId {
        self.id
    }

    /// Whether a component with the given type tag is attached.
    pub fn has(&self, type_tag: &str) -> bool {
        self.components.contains_key(type_tag)
    }

    /// Borrow the component with the given type tag.
    pub fn component(&self, type_tag: &str) -> Option<&Component> {
        self.components.get(type_tag).map(|c| c.as_ref())
    }

    /// Type tags of every attached component, in no particular order.
    pub fn component_tags(&self) -> impl Iterator<Item = &str> {
        self.components.keys().map(|tag| tag.as_str())
    }

    /// Number of attached components.
    pub fn component_count(&self) -> usize {
        self.components.len()
    }

    #[inline]
    pub(crate) fn is_alive(&self) -> bool {
        self.alive
    }

    pub(crate) fn set_alive(&mut self, alive: bool) {
        self.alive = alive;
    }

    pub(crate) fn component_mut(&mut self, type_tag: &str) -> Option<&mut Component> {
        self.components.get_mut(type_tag).map(|c| c.as_mut())
    }

    /// Attach `component` under its own type tag, replacing any previous
    /// occupant. The replaced component is dropped, not pooled.
    pub(crate) fn attach(&mut self, component: Box<Component>) {
        self.components
            .insert(component.type_tag().to_owned(), component);
    }

    /// Detach the component with the given tag, if present.
    pub(crate) fn detach(&mut self, type_tag: &str) -> Option<Box<Component>> {
        self.components.remove(type_tag)
    }

    /// Move every attached component out of the record.
    pub(crate) fn detach_all(&mut self) -> impl Iterator<Item = Box<Component>> + '_ {
        self.components.drain().map(|(_, component)| component)
    }
}

// ---------------------------------------------------------------------------
// EntityPool
// ---------------------------------------------------------------------------

/// Allocates [`EntityId`]s and recycles retired handles.
///
/// Retired handles are reused LIFO before the counter mints fresh indices,
/// so a kill-then-create churn pattern keeps touching the same slots.
#[derive(Debug)]
pub struct EntityPool {
    next_index: u32,
    free: Vec<EntityId>,
}

impl EntityPool {
    /// Create an empty pool.
    pub fn new() -> Self {
        Self {
            next_index: 0,
            free: Vec::new(),
        }
    }

    /// Hand out a handle: the most recently retired one if any, otherwise a
    /// fresh index.
    pub fn acquire(&mut self) -> EntityId {
        match self.free.pop() {
            Some(id) => id,
            None => {
                let id = EntityId::new(self.next_index);
                self.next_index += 1;
                id
            }
        }
    }

    /// Return a handle to the pool for later reuse.
    pub fn retire(&mut self, id: EntityId) {
        self.free.push(id);
    }

    /// Handles currently waiting for reuse, oldest first.
    pub fn retired(&self) -> &[EntityId] {
        &self.free
    }

    /// Number of handles waiting for reuse.
    pub fn len(&self) -> usize {
        self.free.len()
    }

    /// Whether no handles are waiting.
    pub fn is_empty(&self) -> bool {
        self.free.is_empty()
    }
}

impl Default for EntityPool {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // -- 1. Handle allocation -------------------------------------------------

    #[test]
    fn fresh_handles_count_up_from_zero() {
        let mut pool = EntityPool::new();
        assert_eq!(pool.acquire().index(), 0);
        assert_eq!(pool.acquire().index(), 1);
        assert_eq!(pool.acquire().index(), 2);
        assert!(pool.is_empty());
    }

    #[test]
    fn retired_handle_is_reissued_unchanged() {
        let mut pool = EntityPool::new();
        let a = pool.acquire();
        let _b = pool.acquire();
        pool.retire(a);
        assert_eq!(pool.len(), 1);
        assert_eq!(pool.acquire(), a);
        assert!(pool.is_empty());
    }

    #[test]
    fn reuse_is_last_in_first_out() {
        let mut pool = EntityPool::new();
        let a = pool.acquire();
        let b = pool.acquire();
        pool.retire(a);
        pool.retire(b);
        assert_eq!(pool.retired(), [a, b]);
        assert_eq!(pool.acquire(), b);
        assert_eq!(pool.acquire(), a);
        // Pool exhausted, back to fresh indices.
        assert_eq!(pool.acquire().index(), 2);
    }

    // -- 2. Entity records ----------------------------------------------------

    #[test]
    fn attach_and_detach_components() {
        let mut entity = Entity::new(EntityId::new(0));
        assert!(!entity.has("Position"));

        entity.attach(Box::new(Component::new("Position")));
        assert!(entity.has("Position"));
        assert_eq!(entity.component_count(), 1);

        let detached = entity.detach("Position");
        assert!(detached.is_some());
        assert!(!entity.has("Position"));
        assert!(entity.detach("Position").is_none());
    }

    #[test]
    fn attach_replaces_previous_occupant() {
        let mut entity = Entity::new(EntityId::new(3));
        entity.attach(Box::new(Component::new("Health").with("hp", 100.0)));
        entity.attach(Box::new(Component::new("Health").with("hp", 25.0)));

        assert_eq!(entity.component_count(), 1);
        let health = entity.component("Health").unwrap();
        assert_eq!(health.number("hp"), Some(25.0));
    }

    #[test]
    fn detach_all_empties_the_record() {
        let mut entity = Entity::new(EntityId::new(7));
        entity.attach(Box::new(Component::new("Position")));
        entity.attach(Box::new(Component::new("Velocity")));

        let drained: Vec<_> = entity.detach_all().collect();
        assert_eq!(drained.len(), 2);
        assert_eq!(entity.component_count(), 0);
    }

    #[test]
    fn id_formatting() {
        let id = EntityId::new(42);
        assert_eq!(format!("{id:?}"), "EntityId(42)");
        assert_eq!(format!("{id}"), "42");
    }
}
