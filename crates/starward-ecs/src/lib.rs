//! Starward ECS -- sparse-set Entity Component System with a join iterator.
//!
//! This crate is the substrate of the Starward game core. Each component
//! type lives in its own sparse array indexed by entity; the [`Registry`]
//! owns every store plus the entity lifecycle, and the zipper
//! ([`Zipper`] / [`IndexedZipper`]) is the one supported way to query
//! "entities having components X and Y and ...".
//!
//! # Quick Start
//!
//! ```
//! use starward_ecs::prelude::*;
//!
//! #[derive(Debug, Clone, PartialEq)]
//! struct Position { x: f32, y: f32 }
//!
//! #[derive(Debug, Clone, PartialEq)]
//! struct Velocity { dx: f32, dy: f32 }
//!
//! let mut reg = Registry::new();
//! reg.register::<Position>();
//! reg.register::<Velocity>();
//!
//! let e = reg.spawn();
//! reg.add(e, Position { x: 0.0, y: 0.0 }).unwrap();
//! reg.add(e, Velocity { dx: 1.0, dy: 0.0 }).unwrap();
//!
//! let mut positions = reg.components_mut::<Position>().unwrap();
//! let velocities = reg.components::<Velocity>().unwrap();
//! for (pos, vel) in Zipper::new((positions.view_mut(), velocities.view())) {
//!     pos.x += vel.dx;
//! }
//! drop((positions, velocities));
//!
//! assert_eq!(reg.get_cloned::<Position>(e), Some(Position { x: 1.0, y: 0.0 }));
//! ```

#![deny(unsafe_code)]

pub mod entity;
pub mod registry;
pub mod sparse;
pub mod zip;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced by ECS operations.
///
/// These mark programmer errors; the simulation kernel logs them and skips
/// the offending system for the tick rather than unwinding.
#[derive(Debug, thiserror::Error)]
pub enum EcsError {
    /// The entity is dead or was never allocated.
    #[error("entity {entity} is not valid")]
    InvalidEntity { entity: entity::Entity },

    /// A component type was used before `Registry::register`.
    #[error("component type '{name}' not registered")]
    ComponentNotRegistered { name: &'static str },
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::entity::Entity;
    pub use crate::registry::Registry;
    pub use crate::sparse::{SlotView, SparseSlots};
    pub use crate::zip::{IndexedZipper, Zipper};
    pub use crate::EcsError;
}

// ---------------------------------------------------------------------------
// Integration tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use crate::prelude::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Position {
        x: f32,
        y: f32,
    }

    #[derive(Debug, Clone, PartialEq)]
    struct Velocity {
        dx: f32,
        dy: f32,
    }

    #[derive(Debug, Clone, PartialEq)]
    struct Tag;

    fn setup() -> Registry {
        let mut reg = Registry::new();
        reg.register::<Position>();
        reg.register::<Velocity>();
        reg.register::<Tag>();
        reg
    }

    #[test]
    fn zipper_sees_only_complete_entities() {
        let mut reg = setup();

        let both = reg.spawn();
        reg.add(both, Position { x: 1.0, y: 2.0 }).unwrap();
        reg.add(both, Velocity { dx: 3.0, dy: 4.0 }).unwrap();

        let only_pos = reg.spawn();
        reg.add(only_pos, Position { x: 9.0, y: 9.0 }).unwrap();

        let positions = reg.components::<Position>().unwrap();
        let velocities = reg.components::<Velocity>().unwrap();
        let hits: Vec<_> = IndexedZipper::new((positions.view(), velocities.view()))
            .map(|(i, _)| i)
            .collect();
        assert_eq!(hits, vec![both.index()]);
    }

    #[test]
    fn killed_entity_disappears_from_joins() {
        let mut reg = setup();
        let e = reg.spawn();
        reg.add(e, Position { x: 0.0, y: 0.0 }).unwrap();
        reg.add(e, Velocity { dx: 0.0, dy: 0.0 }).unwrap();

        reg.kill(e).unwrap();

        let positions = reg.components::<Position>().unwrap();
        let velocities = reg.components::<Velocity>().unwrap();
        assert_eq!(
            Zipper::new((positions.view(), velocities.view())).count(),
            0
        );
    }

    #[test]
    fn deferred_kill_pattern() {
        // Systems must not mutate membership mid-iteration; collect and
        // apply after the loop.
        let mut reg = setup();
        for i in 0..6 {
            let e = reg.spawn();
            reg.add(
                e,
                Position {
                    x: i as f32,
                    y: 0.0,
                },
            )
            .unwrap();
        }

        let mut doomed = Vec::new();
        {
            let positions = reg.components::<Position>().unwrap();
            for (index, (pos,)) in IndexedZipper::new((positions.view(),)) {
                if pos.x >= 3.0 {
                    doomed.push(Entity::from_index(index));
                }
            }
        }
        for e in doomed {
            reg.kill(e).unwrap();
        }

        assert_eq!(reg.entity_count(), 3);
    }

    #[test]
    fn mutation_through_zipper_persists() {
        let mut reg = setup();
        let e = reg.spawn();
        reg.add(e, Position { x: 0.0, y: 0.0 }).unwrap();
        reg.add(e, Velocity { dx: 2.0, dy: -1.0 }).unwrap();

        {
            let mut positions = reg.components_mut::<Position>().unwrap();
            let velocities = reg.components::<Velocity>().unwrap();
            for (pos, vel) in Zipper::new((positions.view_mut(), velocities.view())) {
                pos.x += vel.dx;
                pos.y += vel.dy;
            }
        }

        assert_eq!(
            reg.get_cloned::<Position>(e),
            Some(Position { x: 2.0, y: -1.0 })
        );
    }

    #[test]
    fn scale_many_entities() {
        let mut reg = setup();
        let mut spawned = Vec::new();
        for i in 0..10_000u32 {
            let e = reg.spawn();
            reg.add(
                e,
                Position {
                    x: i as f32,
                    y: 0.0,
                },
            )
            .unwrap();
            if i % 2 == 0 {
                reg.add(e, Velocity { dx: 1.0, dy: 0.0 }).unwrap();
            }
            spawned.push(e);
        }

        {
            let positions = reg.components::<Position>().unwrap();
            let velocities = reg.components::<Velocity>().unwrap();
            assert_eq!(
                Zipper::new((positions.view(), velocities.view())).count(),
                5_000
            );
        }

        for e in spawned.iter().take(5_000) {
            reg.kill(*e).unwrap();
        }
        assert_eq!(reg.entity_count(), 5_000);
    }
}
