//! Component types stored in the registry.
//!
//! These are plain data; behavior lives in the systems. Fields mirror what
//! the snapshot encoder sends, so the server-side stores and the client
//! mirror share one vocabulary.

use starward_ecs::prelude::Entity;

use crate::math::Vec2;

// ---------------------------------------------------------------------------
// Spatial
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Transform {
    pub position: Vec2,
    pub scale: Vec2,
    pub rotation: f32,
}

impl Transform {
    pub fn at(position: Vec2) -> Self {
        Self {
            position,
            scale: Vec2::new(1.0, 1.0),
            rotation: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RigidBody {
    pub velocity: Vec2,
    pub acceleration: Vec2,
    pub mass: f32,
    /// Bounciness in `[0, 1]`.
    pub restitution: f32,
    /// Static bodies never move.
    pub is_static: bool,
}

impl Default for RigidBody {
    fn default() -> Self {
        Self {
            velocity: Vec2::ZERO,
            acceleration: Vec2::ZERO,
            mass: 1.0,
            restitution: 0.5,
            is_static: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Collision
// ---------------------------------------------------------------------------

/// Collision layer bits. Two colliders interact iff
/// `(a.layer & b.mask) != 0 && (b.layer & a.mask) != 0`.
pub mod layers {
    pub const PLAYER: u32 = 1 << 0;
    pub const ENEMY: u32 = 1 << 1;
    pub const PROJECTILE_PLAYER: u32 = 1 << 2;
    pub const PROJECTILE_ENEMY: u32 = 1 << 3;
    pub const WORLD: u32 = 1 << 4;
    pub const FORCE: u32 = 1 << 5;
}

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct BoxCollider {
    pub width: f32,
    pub height: f32,
    pub offset: Vec2,
    pub layer: u32,
    pub mask: u32,
    /// Triggers emit events but cause no physical response.
    pub is_trigger: bool,
}

/// Axis-aligned bounds in world space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub left: f32,
    pub right: f32,
    pub top: f32,
    pub bottom: f32,
}

impl BoxCollider {
    pub fn new(width: f32, height: f32, layer: u32, mask: u32) -> Self {
        Self {
            width,
            height,
            offset: Vec2::ZERO,
            layer,
            mask,
            is_trigger: false,
        }
    }

    pub fn bounds(&self, position: Vec2) -> Bounds {
        let center = position + self.offset;
        Bounds {
            left: center.x - self.width / 2.0,
            right: center.x + self.width / 2.0,
            top: center.y - self.height / 2.0,
            bottom: center.y + self.height / 2.0,
        }
    }
}

impl Bounds {
    /// Strict AABB overlap test.
    pub fn overlaps(&self, other: &Bounds) -> bool {
        self.left < other.right
            && self.right > other.left
            && self.top < other.bottom
            && self.bottom > other.top
    }
}

// ---------------------------------------------------------------------------
// Players
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Player {
    pub player_id: u16,
    pub speed: f32,
    pub hp: i32,
    pub hp_max: i32,
    pub is_alive: bool,
    /// Seconds of damage immunity remaining.
    pub invincibility_timer: f32,
    /// Entity carrying this player's [`Weapon`] component.
    pub weapon: Entity,
    pub score: u32,
    /// Charged-shot bookkeeping.
    pub is_charging: bool,
    pub charge_time: f32,
}

impl Player {
    pub fn new(player_id: u16, weapon: Entity) -> Self {
        Self {
            player_id,
            speed: 200.0,
            hp: 100,
            hp_max: 100,
            is_alive: true,
            invincibility_timer: 0.0,
            weapon,
            score: 0,
            is_charging: false,
            charge_time: 0.0,
        }
    }
}

/// Fire values carried by [`InputState::fire`].
pub mod fire {
    pub const NONE: u8 = 0;
    pub const NORMAL: u8 = 1;
    pub const CHARGE: u8 = 2;
}

/// Server-authoritative input for one player; clients send edges, the
/// latest state per tick wins.
#[derive(Debug, Clone, Copy, PartialEq, Default, serde::Serialize, serde::Deserialize)]
pub struct InputState {
    pub left: bool,
    pub right: bool,
    pub up: bool,
    pub down: bool,
    pub fire: u8,
}

// ---------------------------------------------------------------------------
// Enemies and bosses
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[repr(u8)]
pub enum EnemyKind {
    Basic = 0,
    Zigzag = 1,
    Chase = 2,
    MiniGreen = 3,
    Spinner = 4,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Enemy {
    pub kind: EnemyKind,
    pub speed: f32,
    pub direction: Vec2,
    pub amplitude: f32,
    pub timer: f32,
    pub last_shot_timer: f32,
    pub hp: i32,
    pub contact_damage: i32,
    pub score_reward: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[repr(u8)]
pub enum BossKind {
    BigShip = 0,
    Snake = 1,
    BydoEye = 2,
    Battleship = 3,
    FinalBoss = 4,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[repr(u8)]
pub enum BossPhase {
    Phase1 = 1,
    Phase2 = 2,
    Phase3 = 3,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Boss {
    pub kind: BossKind,
    pub phase: BossPhase,
    pub direction: Vec2,
    pub timer: f32,
    pub speed: f32,
    pub amplitude: f32,
    pub hp: i32,
    /// FinalBoss minion-spawn clock.
    pub spawn_timer: f32,
}

/// Snake segments and fixed turrets both hang off a boss by entity index.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct BossPart {
    pub owner: Entity,
    pub offset: Vec2,
    /// `>= 0` for trailing snake segments, `-1` for fixed turrets.
    pub segment_index: i32,
    /// Trailing delay applied to the boss clock for segments.
    pub time_offset: f32,
    /// Turret fire clock.
    pub timer: f32,
    pub hp: i32,
    pub alive: bool,
}

// ---------------------------------------------------------------------------
// Projectiles and weapons
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Projectile {
    pub damage: i32,
    pub speed: f32,
    pub direction: Vec2,
    pub current_life: f32,
    pub lifetime_cap: f32,
    pub owner: Entity,
    pub is_active: bool,
}

/// `-1` on the ammo/magazine/reload fields means "infinite / none".
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Weapon {
    /// Shots per second.
    pub fire_rate: f32,
    pub is_automatic: bool,
    pub max_ammo: i32,
    pub magazine_size: i32,
    pub reload_time: f32,
    pub is_burst: bool,
    pub burst_count: u32,
    pub burst_interval: f32,
    pub time_since_last_shot: f32,
    pub current_ammo: i32,
    /// Countdown of an in-progress reload; `-1` when idle.
    pub reload_remaining: f32,
    /// Burst in progress: shots left and delay until the next one.
    pub burst_remaining: u32,
    pub burst_timer: f32,
    pub projectile_speed: f32,
    pub projectile_damage: i32,
}

impl Default for Weapon {
    /// The player's stock cannon: automatic, infinite ammo.
    fn default() -> Self {
        Self {
            fire_rate: 4.0,
            is_automatic: true,
            max_ammo: -1,
            magazine_size: -1,
            reload_time: -1.0,
            is_burst: false,
            burst_count: 3,
            burst_interval: 0.1,
            time_since_last_shot: 1.0,
            current_ammo: -1,
            reload_remaining: -1.0,
            burst_remaining: 0,
            burst_timer: 0.0,
            projectile_speed: 500.0,
            projectile_damage: 10,
        }
    }
}

// ---------------------------------------------------------------------------
// Force satellite
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[repr(u8)]
pub enum ForceState {
    AttachedFront = 0,
    AttachedBack = 1,
    Detached = 2,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Force {
    pub owner_player: Entity,
    pub state: ForceState,
    pub direction: Vec2,
    pub offset_front: Vec2,
    pub offset_back: Vec2,
    pub speed: f32,
    pub max_distance: f32,
    pub current_distance: f32,
    pub contact_damage: i32,
    pub blocks_projectiles: bool,
    /// Contact-damage cooldown so an overlap does not melt a boss per tick.
    pub damage_timer: f32,
    /// Detach/recall edge detection on the charge button.
    pub toggle_latch: bool,
    /// Bobbing clock while attached.
    pub float_timer: f32,
    /// Detached autofire clock.
    pub shoot_timer: f32,
}

impl Force {
    pub fn new(owner_player: Entity) -> Self {
        Self {
            owner_player,
            state: ForceState::AttachedFront,
            direction: Vec2::new(1.0, 0.0),
            offset_front: Vec2::new(40.0, 0.0),
            offset_back: Vec2::new(-40.0, 0.0),
            speed: 200.0,
            max_distance: 300.0,
            current_distance: 0.0,
            contact_damage: 20,
            blocks_projectiles: true,
            damage_timer: 0.0,
            toggle_latch: false,
            float_timer: 0.0,
            shoot_timer: 0.0,
        }
    }
}

// ---------------------------------------------------------------------------
// Level plan
// ---------------------------------------------------------------------------

/// One wave: either a batch of enemies or a single boss.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Wave {
    pub enemy_kinds: Vec<EnemyKind>,
    pub per_kind_count: Vec<u32>,
    pub spawn_points: Vec<Vec2>,
    pub boss: Option<BossKind>,
    pub boss_hp: i32,
}

/// Per-match singleton driving the wave director.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct LevelPlan {
    pub waves: Vec<Wave>,
    /// `-1` before the first wave has spawned.
    pub current_wave: i32,
    pub wave_delay_timer: f32,
    pub finished_level: bool,
    pub level_index: usize,
}

impl LevelPlan {
    pub fn new(waves: Vec<Wave>, level_index: usize) -> Self {
        Self {
            waves,
            current_wave: -1,
            wave_delay_timer: 0.0,
            finished_level: false,
            level_index,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
