//! Arena and timing constants shared across systems.

use crate::math::Vec2;

/// Simulation timestep: 60 Hz fixed.
pub const FIXED_DT: f32 = 1.0 / 60.0;

pub const ARENA_WIDTH: f32 = 800.0;
pub const ARENA_HEIGHT: f32 = 600.0;

/// Where players materialize at match start.
pub const PLAYER_SPAWN: Vec2 = Vec2::new(200.0, 300.0);

/// Projectiles this far outside the arena are culled.
pub const OFFSCREEN_MARGIN: f32 = 100.0;

/// Seconds between a cleared wave and the next one.
pub const WAVE_GAP_SECONDS: f32 = 3.0;

/// Seconds between a finished level and the next one starting.
pub const LEVEL_GAP_SECONDS: f32 = 5.0;

/// World gravity. Ships fly; nothing falls.
pub const GRAVITY: Vec2 = Vec2::ZERO;

/// Lobby start countdown, in seconds.
pub const LOBBY_COUNTDOWN_SECONDS: u8 = 3;
