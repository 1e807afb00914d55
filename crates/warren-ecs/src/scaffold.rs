//! Chainable entity construction.
//!
//! [`Scaffold`] wraps a mutable world borrow and strings together the usual
//! create-then-attach sequence: create an entity, mint components from
//! their blueprints, optionally merge per-instance overrides, attach. The
//! scaffold remembers the entity it targets, so several components can be
//! attached without repeating the handle.

use std::fmt;

use serde_json::Value;

use crate::entity::EntityId;
use crate::world::World;
use crate::EcsError;

// ---------------------------------------------------------------------------
// Scaffold
// ---------------------------------------------------------------------------

/// Builder over a mutable [`World`] borrow.
///
/// ```
/// use serde_json::json;
/// use warren_ecs::prelude::*;
///
/// # fn demo() -> Result<(), EcsError> {
/// let mut world = World::new();
/// world.register_component_type(Component::new("Position").with("x", 0.0).with("y", 0.0));
///
/// let mut scaffold = Scaffold::new(&mut world);
/// scaffold
///     .create()
///     .add_component_with("Position", json!({ "x": 12.0 }))?;
/// let entity = scaffold.entity().unwrap();
///
/// let position = world.component(entity, "Position").unwrap();
/// assert_eq!(position.number("x"), Some(12.0));
/// assert_eq!(position.number("y"), Some(0.0));
/// # Ok(())
/// # }
/// # demo().unwrap();
/// ```
pub struct Scaffold<'w> {
    world: &'w mut World,
    entity: Option<EntityId>,
}

impl<'w> Scaffold<'w> {
    /// Build a scaffold over `world`. No entity is targeted yet.
    pub fn new(world: &'w mut World) -> Self {
        Self {
            world,
            entity: None,
        }
    }

    /// Create a fresh entity and target it.
    pub fn create(&mut self) -> &mut Self {
        self.entity = Some(self.world.create_entity());
        self
    }

    /// Retarget the scaffold at an existing entity.
    pub fn set_entity(&mut self, entity: EntityId) -> &mut Self {
        self.entity = Some(entity);
        self
    }

    /// The most recently targeted entity, if any.
    pub fn entity(&self) -> Option<EntityId> {
        self.entity
    }

    /// Mint `type_tag` from its blueprint and attach it to the targeted
    /// entity.
    ///
    /// Fails with [`EcsError::Precondition`] when no entity is targeted,
    /// and with the underlying error when minting or attaching fails.
    pub fn add_component(&mut self, type_tag: &str) -> Result<&mut Self, EcsError> {
        let entity = self.target()?;
        let component = self.world.mint_component(type_tag)?;
        self.world.add_component(entity, component)?;
        Ok(self)
    }

    /// Like [`add_component`](Self::add_component), with `overrides` (a
    /// JSON object) merged over the blueprint fields before attachment.
    pub fn add_component_with(
        &mut self,
        type_tag: &str,
        overrides: Value,
    ) -> Result<&mut Self, EcsError> {
        let entity = self.target()?;
        let Value::Object(overrides) = overrides else {
            return Err(EcsError::Precondition {
                message: format!("component overrides for '{type_tag}' must be a JSON object"),
            });
        };
        let mut component = self.world.mint_component(type_tag)?;
        component.merge(&overrides);
        self.world.add_component(entity, component)?;
        Ok(self)
    }

    fn target(&self) -> Result<EntityId, EcsError> {
        self.entity.ok_or_else(|| EcsError::Precondition {
            message: "create an entity before adding a component".to_owned(),
        })
    }
}

impl fmt::Debug for Scaffold<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scaffold")
            .field("entity", &self.entity)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
