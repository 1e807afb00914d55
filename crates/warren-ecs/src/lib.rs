//! Warren ECS -- a pooled, query-cached entity world.
//!
//! Entities are plain recyclable handles, components are tagged JSON
//! records minted from registered blueprints, and queries are predicate
//! views whose cached results are patched incrementally on every structural
//! mutation. Destructive changes (kills, removals) are deferred to a
//! cleanup pass at the end of each update cycle, and the freed records are
//! pooled for reuse instead of reallocated.
//!
//! # Quick Start
//!
//! ```
//! use warren_ecs::prelude::*;
//!
//! let mut world = World::new();
//! world.register_component_type(Component::new("Position").with("x", 0.0).with("y", 0.0));
//!
//! let entity = world.create_entity();
//! let position = world.mint_component("Position").unwrap();
//! world.add_component(entity, position).unwrap();
//!
//! let with_position = world.register_query(|e| e.has("Position"));
//! assert_eq!(world.query(with_position), [entity]);
//!
//! world.kill_entity(entity);
//! world.update(1.0 / 60.0);
//! assert!(world.query(with_position).is_empty());
//!
//! // The handle comes back out of the pool unchanged.
//! assert_eq!(world.create_entity(), entity);
//! ```

#![deny(unsafe_code)]

pub mod component;
pub mod entity;
pub mod query;
pub mod scaffold;
pub mod system;
pub mod world;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced by world operations.
#[derive(Debug, thiserror::Error)]
pub enum EcsError {
    /// A component type was minted without a registered blueprint.
    #[error("component type '{type_tag}' is not registered. Registered types: [{registered}]")]
    UnregisteredType {
        type_tag: String,
        registered: String,
    },

    /// The exact system instance is already attached to the world.
    #[error("system '{name}' is already attached to this world")]
    DuplicateSystem {
        name: String,
    },

    /// A structural mutation targeted a handle that is not live.
    #[error("entity {entity} is not alive")]
    DeadEntity {
        entity: entity::EntityId,
    },

    /// A builder call broke its usage contract.
    #[error("{message}")]
    Precondition {
        message: String,
    },
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::component::{BlueprintTable, Component, ComponentPool};
    pub use crate::entity::{Entity, EntityId, EntityPool};
    pub use crate::query::{QueryCache, QueryId};
    pub use crate::scaffold::Scaffold;
    pub use crate::system::{SharedSystem, System, SystemRegistry};
    pub use crate::world::World;
    pub use crate::EcsError;
}

// ---------------------------------------------------------------------------
// Integration tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    use serde_json::json;

    use crate::prelude::*;

    fn setup_world() -> World {
        let mut world = World::new();
        world.register_component_type(Component::new("Position").with("x", 0.0).with("y", 0.0));
        world.register_component_type(Component::new("Velocity").with("dx", 0.0).with("dy", 0.0));
        world.register_component_type(Component::new("Health").with("hp", 100.0));
        world
    }

    struct CountingSystem {
        inits: Rc<Cell<u32>>,
        updates: Rc<Cell<u32>>,
        destroys: Rc<Cell<u32>>,
    }

    impl CountingSystem {
        fn handles() -> (SharedSystem, Rc<Cell<u32>>, Rc<Cell<u32>>, Rc<Cell<u32>>) {
            let inits = Rc::new(Cell::new(0));
            let updates = Rc::new(Cell::new(0));
            let destroys = Rc::new(Cell::new(0));
            let system: SharedSystem = Rc::new(RefCell::new(CountingSystem {
                inits: inits.clone(),
                updates: updates.clone(),
                destroys: destroys.clone(),
            }));
            (system, inits, updates, destroys)
        }
    }

    impl System for CountingSystem {
        fn name(&self) -> &str {
            "counting"
        }

        fn init(&mut self, _world: &mut World) {
            self.inits.set(self.inits.get() + 1);
        }

        fn update(&mut self, _world: &mut World, _dt: f64) {
            self.updates.set(self.updates.get() + 1);
        }

        fn destroy(&mut self, _world: &mut World) {
            self.destroys.set(self.destroys.get() + 1);
        }
    }

    // -- 1. Lifecycle end to end ------------------------------------------

    #[test]
    fn position_lifecycle_round_trip() {
        let mut world = setup_world();
        let entity = world.create_entity();

        let with_position = world.register_query(|e| e.has("Position"));
        assert!(world.query(with_position).is_empty());

        let position = world.mint_component("Position").unwrap();
        world.add_component(entity, position).unwrap();
        assert_eq!(world.query(with_position), [entity]);

        world.remove_component(entity, "Position").unwrap();
        assert!(world.query(with_position).is_empty());

        world.kill_entity(entity);
        world.update(0.016);

        assert_eq!(world.entity_pool(), [entity]);
        assert_eq!(world.pooled_component_count("Position"), 1);
        assert_eq!(world.entity_count(), 0);
    }

    #[test]
    fn recycled_entity_is_the_same_handle() {
        let mut world = setup_world();
        let a = world.create_entity();
        let _b = world.create_entity();

        world.kill_entity(a);
        world.update(0.016);
        assert_eq!(world.entity_count(), 1);

        let again = world.create_entity();
        assert_eq!(again, a);
        assert!(world.entity_pool().is_empty());
        assert_eq!(world.entity(again).unwrap().component_count(), 0);
    }

    #[test]
    fn recycled_component_is_the_same_instance() {
        let mut world = setup_world();
        let entity = world.create_entity();

        let position = world.mint_component("Position").unwrap();
        let original: *const Component = &*position;
        world.add_component(entity, position).unwrap();

        world.remove_component(entity, "Position").unwrap();
        world.update(0.016);
        assert_eq!(world.pooled_component_count("Position"), 1);

        let reissued = world.mint_component("Position").unwrap();
        assert!(std::ptr::eq(original, &*reissued));
        assert_eq!(world.pooled_component_count("Position"), 0);
    }

    #[test]
    fn reissued_components_reset_to_the_current_blueprint() {
        let mut world = setup_world();
        let entity = world.create_entity();

        let mut position = world.mint_component("Position").unwrap();
        position.set("x", 500.0);
        position.set("debris", true);
        world.add_component(entity, position).unwrap();
        world.remove_component(entity, "Position").unwrap();
        world.update(0.016);

        // Re-register with new defaults before the pool reissues.
        world.register_component_type(Component::new("Position").with("x", 7.0).with("y", 7.0));

        let reissued = world.mint_component("Position").unwrap();
        assert_eq!(reissued.number("x"), Some(7.0));
        assert_eq!(reissued.number("y"), Some(7.0));
        assert!(reissued.get("debris").is_none());
    }

    #[test]
    fn double_kill_retires_the_handle_once() {
        let mut world = setup_world();
        let entity = world.create_entity();

        world.kill_entity(entity);
        world.kill_entity(entity);
        world.update(0.016);
        assert_eq!(world.entity_pool(), [entity]);

        // A later mark on the now-pooled handle must not retire it again.
        world.kill_entity(entity);
        world.update(0.016);
        assert_eq!(world.entity_pool(), [entity]);
    }

    // -- 2. Query cache -----------------------------------------------------

    #[test]
    fn registration_evaluates_each_live_entity_once() {
        let mut world = setup_world();
        for _ in 0..5 {
            world.create_entity();
        }

        let calls = Rc::new(Cell::new(0usize));
        let seen = calls.clone();
        let all = world.register_query(move |_| {
            seen.set(seen.get() + 1);
            true
        });
        assert_eq!(calls.get(), 5);

        // Reads are cache hits, never re-evaluations.
        assert_eq!(world.query(all).len(), 5);
        assert_eq!(world.query(all).len(), 5);
        assert_eq!(calls.get(), 5);
    }

    #[test]
    fn fresh_entities_join_matching_caches_at_creation() {
        let mut world = setup_world();
        let bare = world.register_query(|e| !e.has("Position"));
        assert!(world.query(bare).is_empty());

        let entity = world.create_entity();
        assert_eq!(world.query(bare), [entity]);

        let position = world.mint_component("Position").unwrap();
        world.add_component(entity, position).unwrap();
        assert!(world.query(bare).is_empty());
    }

    #[test]
    fn kills_stay_visible_until_cleanup() {
        let mut world = setup_world();
        let entity = world.create_entity();
        let everything = world.register_query(|_| true);

        world.kill_entity(entity);
        assert_eq!(world.entities(), [entity]);
        assert_eq!(world.query(everything), [entity]);

        world.update(0.016);
        assert!(world.entities().is_empty());
        assert!(world.query(everything).is_empty());
    }

    #[test]
    fn field_edits_do_not_disturb_caches() {
        let mut world = setup_world();
        let entity = world.create_entity();
        let position = world.mint_component("Position").unwrap();
        world.add_component(entity, position).unwrap();

        let with_position = world.register_query(|e| e.has("Position"));
        world.component_mut(entity, "Position").unwrap().set("x", 99.0);

        assert_eq!(world.query(with_position), [entity]);
        assert_eq!(world.component(entity, "Position").unwrap().number("x"), Some(99.0));
    }

    // -- 3. Systems -----------------------------------------------------------

    #[test]
    fn duplicate_system_attach_fails_without_reinit() {
        let mut world = setup_world();
        let (system, inits, _, _) = CountingSystem::handles();

        world.add_system(system.clone()).unwrap();
        let err = world.add_system(system.clone()).err().unwrap();

        assert!(matches!(err, EcsError::DuplicateSystem { .. }));
        assert_eq!(err.to_string(), "system 'counting' is already attached to this world");
        assert_eq!(inits.get(), 1);
        assert_eq!(world.system_count(), 1);
    }

    #[test]
    fn two_instances_of_one_type_may_both_attach() {
        let mut world = setup_world();
        let (first, ..) = CountingSystem::handles();
        let (second, ..) = CountingSystem::handles();

        world.add_system(first).unwrap();
        world.add_system(second).unwrap();
        assert_eq!(world.system_count(), 2);
    }

    #[test]
    fn remove_system_runs_destroy_once() {
        let mut world = setup_world();
        let (system, _, _, destroys) = CountingSystem::handles();
        let handle = world.add_system(system).unwrap();

        assert!(world.remove_system(&handle));
        assert!(!world.remove_system(&handle));
        assert_eq!(destroys.get(), 1);
        assert_eq!(world.system_count(), 0);
    }

    #[test]
    fn update_runs_hooks_then_cleanup() {
        let mut world = setup_world();
        let (system, _, updates, _) = CountingSystem::handles();
        world.add_system(system).unwrap();

        let entity = world.create_entity();
        world.kill_entity(entity);

        world.update(0.016);
        assert_eq!(updates.get(), 1);
        assert_eq!(world.entity_pool(), [entity]);

        world.update(0.016);
        assert_eq!(updates.get(), 2);
    }

    #[test]
    fn systems_attached_mid_cycle_first_run_next_cycle() {
        struct Recruiter {
            recruit: Option<SharedSystem>,
        }

        impl System for Recruiter {
            fn name(&self) -> &str {
                "recruiter"
            }

            fn update(&mut self, world: &mut World, _dt: f64) {
                if let Some(recruit) = self.recruit.take() {
                    world.add_system(recruit).unwrap();
                }
            }
        }

        let mut world = setup_world();
        let (recruit, inits, updates, _) = CountingSystem::handles();
        world
            .add_system(Rc::new(RefCell::new(Recruiter {
                recruit: Some(recruit),
            })))
            .unwrap();

        world.update(0.016);
        assert_eq!(inits.get(), 1);
        assert_eq!(updates.get(), 0);
        assert_eq!(world.system_count(), 2);

        world.update(0.016);
        assert_eq!(updates.get(), 1);
    }

    // -- 4. Systems driving the world ----------------------------------------

    struct MovementSystem {
        moving: Option<QueryId>,
    }

    impl System for MovementSystem {
        fn name(&self) -> &str {
            "movement"
        }

        fn init(&mut self, world: &mut World) {
            self.moving = Some(world.register_query(|e| e.has("Position") && e.has("Velocity")));
        }

        fn update(&mut self, world: &mut World, dt: f64) {
            let Some(moving) = self.moving else { return };
            for entity in world.query(moving).to_vec() {
                let (dx, dy) = match world.component(entity, "Velocity") {
                    Some(velocity) => (
                        velocity.number("dx").unwrap_or(0.0),
                        velocity.number("dy").unwrap_or(0.0),
                    ),
                    None => continue,
                };
                if let Some(position) = world.component_mut(entity, "Position") {
                    let x = position.number("x").unwrap_or(0.0);
                    let y = position.number("y").unwrap_or(0.0);
                    position.set("x", x + dx * dt);
                    position.set("y", y + dy * dt);
                }
            }
        }
    }

    #[test]
    fn movement_system_integrates_each_cycle() {
        let mut world = setup_world();
        let entity = world.create_entity();
        let position = world.mint_component("Position").unwrap();
        let mut velocity = world.mint_component("Velocity").unwrap();
        velocity.set("dx", 10.0);
        world.add_components(entity, [position, velocity]).unwrap();

        world
            .add_system(Rc::new(RefCell::new(MovementSystem { moving: None })))
            .unwrap();

        world.update(0.5);
        world.update(0.5);

        let position = world.component(entity, "Position").unwrap();
        assert_eq!(position.number("x"), Some(10.0));
        assert_eq!(position.number("y"), Some(0.0));
    }

    #[test]
    fn killing_over_a_snapshot_stays_consistent() {
        struct Reaper {
            doomed: Option<QueryId>,
        }

        impl System for Reaper {
            fn name(&self) -> &str {
                "reaper"
            }

            fn init(&mut self, world: &mut World) {
                self.doomed = Some(world.register_query(|e| e.has("Health")));
            }

            fn update(&mut self, world: &mut World, _dt: f64) {
                let Some(doomed) = self.doomed else { return };
                for entity in world.query(doomed).to_vec() {
                    world.kill_entity(entity);
                }
            }
        }

        let mut world = setup_world();
        for _ in 0..4 {
            let entity = world.create_entity();
            let health = world.mint_component("Health").unwrap();
            world.add_component(entity, health).unwrap();
        }
        world
            .add_system(Rc::new(RefCell::new(Reaper { doomed: None })))
            .unwrap();

        world.update(0.016);

        assert_eq!(world.entity_count(), 0);
        assert_eq!(world.entity_pool().len(), 4);
        assert_eq!(world.pooled_component_count("Health"), 4);
    }

    // -- 5. Scaffold ----------------------------------------------------------

    #[test]
    fn scaffolded_entities_are_query_visible() {
        let mut world = setup_world();
        let with_position = world.register_query(|e| e.has("Position"));

        let mut scaffold = Scaffold::new(&mut world);
        scaffold
            .create()
            .add_component_with("Position", json!({ "x": 3.0 }))
            .unwrap()
            .add_component("Velocity")
            .unwrap();
        let entity = scaffold.entity().unwrap();

        assert_eq!(world.query(with_position), [entity]);
        assert_eq!(world.component(entity, "Position").unwrap().number("x"), Some(3.0));
    }
}
