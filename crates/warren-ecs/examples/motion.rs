//! Position/Velocity demo: two systems driving a pooled world.
//!
//! A mover integrates its position each cycle while a short-lived entity
//! counts down and gets recycled by the cleanup pass.
//!
//! Run with: `cargo run --example motion`

use std::cell::RefCell;
use std::rc::Rc;

use serde_json::json;
use tracing::info;
use warren_ecs::prelude::*;

// ---------------------------------------------------------------------------
// Systems
// ---------------------------------------------------------------------------

/// Integrates Position by Velocity each cycle.
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
                let x = position.number("x").unwrap_or(0.0) + dx * dt;
                let y = position.number("y").unwrap_or(0.0) + dy * dt;
                position.set("x", x);
                position.set("y", y);
            }
        }
    }
}

/// Kills entities whose lifetime has run out; cleanup recycles them.
struct LifetimeSystem {
    mortal: Option<QueryId>,
}

impl System for LifetimeSystem {
    fn name(&self) -> &str {
        "lifetime"
    }

    fn init(&mut self, world: &mut World) {
        self.mortal = Some(world.register_query(|e| e.has("Lifetime")));
    }

    fn update(&mut self, world: &mut World, dt: f64) {
        let Some(mortal) = self.mortal else { return };
        for entity in world.query(mortal).to_vec() {
            let remaining = world
                .component(entity, "Lifetime")
                .and_then(|lifetime| lifetime.number("remaining"))
                .unwrap_or(0.0)
                - dt;
            if remaining <= 0.0 {
                info!(entity = %entity, "lifetime expired");
                world.kill_entity(entity);
            } else if let Some(lifetime) = world.component_mut(entity, "Lifetime") {
                lifetime.set("remaining", remaining);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Demo
// ---------------------------------------------------------------------------

fn main() -> Result<(), EcsError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,warren_ecs=debug")),
        )
        .init();

    let mut world = World::new();
    world.register_component_type(Component::new("Position").with("x", 0.0).with("y", 0.0));
    world.register_component_type(Component::new("Velocity").with("dx", 0.0).with("dy", 0.0));
    world.register_component_type(Component::new("Lifetime").with("remaining", 1.0));
    world.prewarm_components("Position", 8)?;

    let mut scaffold = Scaffold::new(&mut world);
    scaffold
        .create()
        .add_component("Position")?
        .add_component_with("Velocity", json!({ "dx": 3.0, "dy": 1.5 }))?;
    let mover = scaffold.entity().expect("entity was just created");

    scaffold
        .create()
        .add_component("Position")?
        .add_component_with("Lifetime", json!({ "remaining": 0.25 }))?;

    world.add_system(Rc::new(RefCell::new(MovementSystem { moving: None })))?;
    world.add_system(Rc::new(RefCell::new(LifetimeSystem { mortal: None })))?;

    for _ in 0..30 {
        world.update(1.0 / 60.0);
    }

    let position = world
        .component(mover, "Position")
        .expect("the mover has no lifetime and stays alive");
    info!(
        x = position.number("x").unwrap_or(0.0),
        y = position.number("y").unwrap_or(0.0),
        live = world.entity_count(),
        pooled = world.entity_pool().len(),
        "simulation finished"
    );

    Ok(())
}
