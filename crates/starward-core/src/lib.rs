//! Starward game core -- the authoritative simulation.
//!
//! Everything that decides gameplay lives here: the component vocabulary,
//! the fixed-timestep [`Kernel`](kernel::Kernel) and its system pipeline
//! (input, AI, physics, weapons, collisions, the level director), and the
//! per-peer delta [`snapshot`] builder. The server drives a kernel per
//! match; the client reuses the movement/physics systems for prediction
//! and mirrors snapshots into its own registry.
//!
//! The renderer and window layer stay outside; the core only exposes the
//! drawable list and input translation in [`render`].

#![deny(unsafe_code)]

pub mod ai;
pub mod combat;
pub mod components;
pub mod config;
pub mod events;
pub mod force;
pub mod input;
pub mod kernel;
pub mod level;
pub mod math;
pub mod physics;
pub mod projectile;
pub mod render;
pub mod snapshot;
pub mod spawn;
pub mod tilemap;
pub mod weapon;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Failures inside simulation systems. The kernel's boundary logs these
/// and skips the system for the tick; they never unwind further.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error(transparent)]
    Ecs(#[from] starward_ecs::EcsError),

    #[error("game logic error: {0}")]
    GameLogic(String),
}

/// Convenience re-exports.
pub mod prelude {
    pub use crate::components::*;
    pub use crate::config::FIXED_DT;
    pub use crate::events::{Category, SideEvent};
    pub use crate::kernel::{Kernel, TickOutput};
    pub use crate::math::Vec2;
    pub use crate::render::{build_drawables, translate_input, Drawable, InputSample};
    pub use crate::snapshot::{PeerDeltaTracker, WorldView};
    pub use crate::CoreError;
}
