//! System hooks and their registry.
//!
//! Systems are stateful objects the application keeps handles to; the world
//! holds the same instances through [`SharedSystem`] and drives their hooks.
//! Identity (for duplicate detection and removal) is the shared allocation,
//! never the name.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::world::World;

// ---------------------------------------------------------------------------
// System
// ---------------------------------------------------------------------------

/// Per-cycle logic attached to a world.
///
/// All hooks have empty default bodies; implement the ones you need. The
/// world is passed into every hook, so a system never stores a world
/// reference of its own.
pub trait System {
    /// Name used in logs and error messages.
    fn name(&self) -> &str {
        "system"
    }

    /// Invoked once, synchronously, when the system is attached.
    fn init(&mut self, world: &mut World) {
        let _ = world;
    }

    /// Invoked every update cycle, in attachment order, before cleanup runs.
    fn update(&mut self, world: &mut World, dt: f64) {
        let _ = (world, dt);
    }

    /// Invoked once when the system is detached from the world.
    fn destroy(&mut self, world: &mut World) {
        let _ = world;
    }
}

/// Shared handle to a system instance.
///
/// The application and the world hold the same allocation. A hook must not
/// re-enter its own instance (for example by calling
/// [`World::update`](crate::world::World::update) from inside `update`).
pub type SharedSystem = Rc<RefCell<dyn System>>;

// ---------------------------------------------------------------------------
// SystemRegistry
// ---------------------------------------------------------------------------

/// Ordered list of attached systems.
pub struct SystemRegistry {
    systems: Vec<SharedSystem>,
}

impl SystemRegistry {
    pub fn new() -> Self {
        Self {
            systems: Vec::new(),
        }
    }

    /// Whether this exact instance is already attached.
    pub fn contains(&self, system: &SharedSystem) -> bool {
        self.systems.iter().any(|s| Rc::ptr_eq(s, system))
    }

    /// Append `system` to the end of the run order.
    pub fn attach(&mut self, system: SharedSystem) {
        self.systems.push(system);
    }

    /// Detach `system` by instance identity, preserving the run order of
    /// the rest.
    pub fn detach(&mut self, system: &SharedSystem) -> Option<SharedSystem> {
        let at = self.systems.iter().position(|s| Rc::ptr_eq(s, system))?;
        Some(self.systems.remove(at))
    }

    /// Clone the current run order. The world iterates a snapshot, so a
    /// hook that attaches or detaches systems mutates the registry, never
    /// the pass already running.
    pub fn snapshot(&self) -> Vec<SharedSystem> {
        self.systems.clone()
    }

    /// Number of attached systems.
    pub fn len(&self) -> usize {
        self.systems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.systems.is_empty()
    }
}

impl Default for SystemRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SystemRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SystemRegistry")
            .field("system_count", &self.systems.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    struct Named(&'static str);

    impl System for Named {
        fn name(&self) -> &str {
            self.0
        }
    }

    fn named(name: &'static str) -> SharedSystem {
        Rc::new(RefCell::new(Named(name)))
    }

    // -- 1. Instance identity -------------------------------------------------

    #[test]
    fn contains_compares_instances_not_contents() {
        let mut registry = SystemRegistry::new();
        let a = named("gravity");
        let twin = named("gravity");

        registry.attach(a.clone());
        assert!(registry.contains(&a));
        assert!(!registry.contains(&twin));
    }

    #[test]
    fn detach_returns_the_instance_once() {
        let mut registry = SystemRegistry::new();
        let a = named("gravity");
        registry.attach(a.clone());

        let detached = registry.detach(&a).unwrap();
        assert!(Rc::ptr_eq(&detached, &a));
        assert!(registry.detach(&a).is_none());
        assert!(registry.is_empty());
    }

    // -- 2. Ordering ----------------------------------------------------------

    #[test]
    fn detach_preserves_the_order_of_the_rest() {
        let mut registry = SystemRegistry::new();
        let first = named("input");
        let second = named("physics");
        let third = named("render");
        registry.attach(first.clone());
        registry.attach(second.clone());
        registry.attach(third.clone());

        registry.detach(&second);

        let order: Vec<String> = registry
            .snapshot()
            .iter()
            .map(|s| s.borrow().name().to_owned())
            .collect();
        assert_eq!(order, ["input", "render"]);
    }

    #[test]
    fn snapshot_is_isolated_from_later_attaches() {
        let mut registry = SystemRegistry::new();
        registry.attach(named("input"));

        let snapshot = registry.snapshot();
        registry.attach(named("render"));

        assert_eq!(snapshot.len(), 1);
        assert_eq!(registry.len(), 2);
    }
}
