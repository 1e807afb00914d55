//! The [`World`] owns every entity, component, query, and system, and
//! drives the update cycle.
//!
//! Mutations land in two tiers. Additive ones (create, add) apply
//! immediately. Destructive ones (kill, remove) are only *marked* during a
//! cycle and applied at the cleanup boundary at the end of
//! [`World::update`], so every system in a cycle sees the same entity set.
//! Cached queries are patched on every mutation, including by the cleanup
//! pass itself.

use std::collections::BTreeSet;

use tracing::{debug, trace};

use crate::component::{BlueprintTable, Component, ComponentPool};
use crate::entity::{Entity, EntityId, EntityPool};
use crate::query::{QueryCache, QueryId};
use crate::system::{SharedSystem, SystemRegistry};
use crate::EcsError;

// ---------------------------------------------------------------------------
// World
// ---------------------------------------------------------------------------

/// The top-level container for one simulation.
pub struct World {
    /// Live entity handles in creation order.
    entities: Vec<EntityId>,
    /// Entity records indexed by handle. Slots persist across recycling.
    slots: Vec<Entity>,
    entity_pool: EntityPool,
    blueprints: BlueprintTable,
    component_pool: ComponentPool,
    /// Kills marked this cycle. Ordered, so cleanup drains deterministically.
    pending_kills: BTreeSet<EntityId>,
    /// Components detached this cycle, waiting to be pooled at cleanup.
    pending_recycle: Vec<Box<Component>>,
    queries: QueryCache,
    systems: SystemRegistry,
}

impl World {
    /// Create an empty world.
    pub fn new() -> Self {
        Self {
            entities: Vec::new(),
            slots: Vec::new(),
            entity_pool: EntityPool::new(),
            blueprints: BlueprintTable::new(),
            component_pool: ComponentPool::new(),
            pending_kills: BTreeSet::new(),
            pending_recycle: Vec::new(),
            queries: QueryCache::new(),
            systems: SystemRegistry::new(),
        }
    }

    /// Create an empty world with room for `entities` live entities before
    /// the slot table reallocates.
    pub fn with_capacity(entities: usize) -> Self {
        let mut world = Self::new();
        world.entities.reserve(entities);
        world.slots.reserve(entities);
        world
    }

    // -- entity lifecycle ---------------------------------------------------

    /// Hand out a live entity: a recycled handle when the pool has one, a
    /// fresh one otherwise. The entity starts with no components and is
    /// immediately visible to every cached query whose predicate matches an
    /// empty entity.
    pub fn create_entity(&mut self) -> EntityId {
        let id = self.entity_pool.acquire();
        let index = id.index() as usize;
        if index == self.slots.len() {
            self.slots.push(Entity::new(id));
        } else {
            // Recycled handle; the slot was emptied at cleanup.
            self.slots[index].set_alive(true);
        }
        self.entities.push(id);
        trace!(entity = %id, "entity created");
        self.refresh_queries(id);
        id
    }

    /// Mark `entity` for removal at the next cleanup boundary. Idempotent,
    /// and a no-op for handles that are not live when cleanup runs. Until
    /// then the entity stays in the live list and in query results.
    pub fn kill_entity(&mut self, entity: EntityId) {
        if self.pending_kills.insert(entity) {
            trace!(entity = %entity, "entity marked for kill");
        }
    }

    /// Whether `entity` is currently live (created and not yet cleaned up;
    /// a kill mark alone does not change this).
    pub fn is_alive(&self, entity: EntityId) -> bool {
        self.slots
            .get(entity.index() as usize)
            .map_or(false, Entity::is_alive)
    }

    /// Live entity handles in creation order.
    pub fn entities(&self) -> &[EntityId] {
        &self.entities
    }

    /// Number of live entities.
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Handles waiting in the entity pool for reuse.
    pub fn entity_pool(&self) -> &[EntityId] {
        self.entity_pool.retired()
    }

    // -- component registry ---------------------------------------------------

    /// Register `blueprint` under its own type tag. Registering a tag again
    /// replaces the previous blueprint; instances minted earlier keep their
    /// fields, instances reissued later reset to the new defaults.
    pub fn register_component_type(&mut self, blueprint: Component) {
        let type_tag = blueprint.type_tag().to_owned();
        let replaced = self.blueprints.register(blueprint);
        debug!(type_tag = %type_tag, replaced, "component type registered");
    }

    /// Mint an instance of `type_tag`: a pooled instance reset to the
    /// current blueprint when one is available, a fresh copy otherwise.
    ///
    /// Fails with [`EcsError::UnregisteredType`] before touching the pool
    /// when no blueprint exists for the tag.
    pub fn mint_component(&mut self, type_tag: &str) -> Result<Box<Component>, EcsError> {
        let blueprint = self
            .blueprints
            .get(type_tag)
            .ok_or_else(|| EcsError::UnregisteredType {
                type_tag: type_tag.to_owned(),
                registered: self.blueprints.registered_tags().join(", "),
            })?;
        match self.component_pool.acquire(type_tag) {
            Some(mut component) => {
                component.reset_from(blueprint);
                Ok(component)
            }
            None => Ok(Box::new(blueprint.clone())),
        }
    }

    /// Mint `count` blueprint copies straight into the component pool, so
    /// later mints reuse them instead of allocating.
    pub fn prewarm_components(&mut self, type_tag: &str, count: usize) -> Result<(), EcsError> {
        let blueprint = self
            .blueprints
            .get(type_tag)
            .ok_or_else(|| EcsError::UnregisteredType {
                type_tag: type_tag.to_owned(),
                registered: self.blueprints.registered_tags().join(", "),
            })?;
        for _ in 0..count {
            self.component_pool.retire(Box::new(blueprint.clone()));
        }
        debug!(type_tag = %type_tag, count, "component pool prewarmed");
        Ok(())
    }

    /// Retired instances of `type_tag` waiting in the component pool.
    pub fn pooled_component_count(&self, type_tag: &str) -> usize {
        self.component_pool.count(type_tag)
    }

    // -- component attachment -------------------------------------------------

    /// Attach every component in `components` to `entity`, each keyed by
    /// its own type tag. An existing component with the same tag is
    /// replaced and dropped (not pooled). Queries are refreshed once after
    /// the whole batch.
    pub fn add_components<I>(&mut self, entity: EntityId, components: I) -> Result<(), EcsError>
    where
        I: IntoIterator<Item = Box<Component>>,
    {
        self.ensure_alive(entity)?;
        let slot = &mut self.slots[entity.index() as usize];
        for component in components {
            slot.attach(component);
        }
        self.refresh_queries(entity);
        Ok(())
    }

    /// Single-component convenience for
    /// [`add_components`](Self::add_components).
    pub fn add_component(
        &mut self,
        entity: EntityId,
        component: Box<Component>,
    ) -> Result<(), EcsError> {
        self.add_components(entity, [component])
    }

    /// Detach the named components from `entity` and mark them for
    /// recycling at the next cleanup. Tags not present on the entity are
    /// skipped. Queries are refreshed once after the whole batch.
    pub fn remove_components<I, S>(&mut self, entity: EntityId, type_tags: I) -> Result<(), EcsError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.ensure_alive(entity)?;
        let slot = &mut self.slots[entity.index() as usize];
        for tag in type_tags {
            if let Some(component) = slot.detach(tag.as_ref()) {
                self.pending_recycle.push(component);
            }
        }
        self.refresh_queries(entity);
        Ok(())
    }

    /// Single-tag convenience for
    /// [`remove_components`](Self::remove_components).
    pub fn remove_component(&mut self, entity: EntityId, type_tag: &str) -> Result<(), EcsError> {
        self.remove_components(entity, [type_tag])
    }

    // -- reads ----------------------------------------------------------------

    /// Borrow the record for `entity`. `None` while the handle sits in the
    /// pool.
    pub fn entity(&self, entity: EntityId) -> Option<&Entity> {
        self.slots
            .get(entity.index() as usize)
            .filter(|slot| slot.is_alive())
    }

    /// Borrow a component on a live entity.
    pub fn component(&self, entity: EntityId, type_tag: &str) -> Option<&Component> {
        self.entity(entity).and_then(|e| e.component(type_tag))
    }

    /// Mutably borrow a component's fields.
    ///
    /// Field edits never trigger query maintenance; predicates must depend
    /// on component presence, not on field values.
    pub fn component_mut(&mut self, entity: EntityId, type_tag: &str) -> Option<&mut Component> {
        self.slots
            .get_mut(entity.index() as usize)
            .filter(|slot| slot.is_alive())
            .and_then(|slot| slot.component_mut(type_tag))
    }

    // -- queries ----------------------------------------------------------------

    /// Register `predicate` as a cached query over live entities and return
    /// its handle. Every live entity is evaluated exactly once here; after
    /// that the cache is patched incrementally and reads never re-evaluate.
    ///
    /// Predicates must be pure functions of an entity's component
    /// structure. Killed-but-not-cleaned entities still match.
    pub fn register_query<P>(&mut self, predicate: P) -> QueryId
    where
        P: Fn(&Entity) -> bool + 'static,
    {
        let slots = &self.slots;
        let live = self.entities.iter().map(|id| &slots[id.index() as usize]);
        let id = self.queries.register(predicate, live);
        debug!(query = ?id, seeded = self.queries.results(id).len(), "query registered");
        id
    }

    /// The current cached results for `query`, in cache order.
    ///
    /// The borrow is tied to the world, so snapshot the slice (for example
    /// with `to_vec()`) before structurally mutating while iterating.
    ///
    /// # Panics
    ///
    /// Panics when `query` was not issued by this world.
    pub fn query(&self, query: QueryId) -> &[EntityId] {
        self.queries.results(query)
    }

    /// Number of registered queries.
    pub fn query_count(&self) -> usize {
        self.queries.len()
    }

    // -- systems ----------------------------------------------------------------

    /// Attach `system` and invoke its `init` hook. Returns a clone of the
    /// handle for later removal.
    ///
    /// Fails with [`EcsError::DuplicateSystem`] when this exact instance is
    /// already attached; `init` is not re-invoked in that case.
    pub fn add_system(&mut self, system: SharedSystem) -> Result<SharedSystem, EcsError> {
        if self.systems.contains(&system) {
            let name = system.borrow().name().to_owned();
            return Err(EcsError::DuplicateSystem { name });
        }
        self.systems.attach(system.clone());
        debug!(system = %system.borrow().name(), total = self.systems.len(), "system attached");
        system.borrow_mut().init(self);
        Ok(system)
    }

    /// Detach `system` by instance identity and invoke its `destroy` hook.
    /// Returns whether anything was detached.
    ///
    /// A system must not detach itself from inside its own hooks.
    pub fn remove_system(&mut self, system: &SharedSystem) -> bool {
        match self.systems.detach(system) {
            Some(detached) => {
                debug!(system = %detached.borrow().name(), total = self.systems.len(), "system detached");
                detached.borrow_mut().destroy(self);
                true
            }
            None => false,
        }
    }

    /// Number of attached systems.
    pub fn system_count(&self) -> usize {
        self.systems.len()
    }

    // -- update cycle -----------------------------------------------------------

    /// Run one cycle: every attached system's `update` hook in attachment
    /// order, then cleanup exactly once.
    ///
    /// Hooks run over a snapshot of the run order, so a hook that attaches
    /// another system changes the registry, not the pass already running;
    /// the newcomer first runs next cycle.
    pub fn update(&mut self, dt: f64) {
        for system in self.systems.snapshot() {
            system.borrow_mut().update(self, dt);
        }
        self.cleanup();
    }

    /// Apply pending kills and recycle detached components.
    ///
    /// Phase one drains the kill set in ascending handle order: the entity
    /// leaves the live list (remaining order preserved), its components
    /// move to the recycle list, the handle returns to the entity pool, and
    /// every cached query forgets it. Phase two drains the recycle list
    /// into the per-type component pool.
    fn cleanup(&mut self) {
        let kills = std::mem::take(&mut self.pending_kills);
        let mut killed = 0usize;
        for id in kills {
            let index = id.index() as usize;
            let Some(slot) = self.slots.get_mut(index) else {
                continue;
            };
            if !slot.is_alive() {
                // Killed again after an earlier recycle, or never created.
                continue;
            }
            slot.set_alive(false);
            self.pending_recycle.extend(slot.detach_all());
            if let Some(at) = self.entities.iter().position(|&e| e == id) {
                self.entities.remove(at);
            }
            self.entity_pool.retire(id);
            self.queries.evict(id);
            killed += 1;
        }

        let recycled = self.pending_recycle.len();
        for component in self.pending_recycle.drain(..) {
            self.component_pool.retire(component);
        }
        if killed > 0 || recycled > 0 {
            trace!(killed, components_recycled = recycled, "cleanup applied");
        }
    }

    // -- internals ----------------------------------------------------------------

    fn ensure_alive(&self, entity: EntityId) -> Result<(), EcsError> {
        if self.is_alive(entity) {
            Ok(())
        } else {
            Err(EcsError::DeadEntity { entity })
        }
    }

    /// Incremental query maintenance for one entity.
    fn refresh_queries(&mut self, entity: EntityId) {
        let slot = &self.slots[entity.index() as usize];
        self.queries.refresh(slot);
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for World {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("World")
            .field("entity_count", &self.entities.len())
            .field("pooled_entities", &self.entity_pool.len())
            .field("query_count", &self.queries.len())
            .field("system_count", &self.systems.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
