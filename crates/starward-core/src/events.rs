//! Events produced inside a tick.
//!
//! [`CollisionHit`] and [`Death`] stay inside the kernel (consumed by the
//! gameplay dispatch); [`SideEvent`]s leave it, to be fanned out to clients
//! by the session layer.

use starward_ecs::prelude::Entity;
use starward_net::message;

use crate::math::Vec2;

/// Gameplay category of an entity, derived from its components.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Player,
    Enemy,
    Boss,
    BossPart,
    Projectile,
    Force,
    Unknown,
}

/// A physics-layer overlap between two colliders, emitted once per pair
/// per tick.
#[derive(Debug, Clone, Copy)]
pub struct CollisionHit {
    pub a: Entity,
    pub b: Entity,
    pub point: Vec2,
    pub normal: Vec2,
}

/// An entity ran out of hit points.
#[derive(Debug, Clone, Copy)]
pub struct Death {
    pub dead: Entity,
    pub killer: Entity,
    pub category: Category,
    pub position: Vec2,
}

/// Outbound notifications the session layer turns into UDP messages.
#[derive(Debug, Clone, PartialEq)]
pub enum SideEvent {
    BossSpawn(message::BossSpawn),
    BossUpdate(message::BossUpdate),
    EnemyHit(message::EnemyHit),
    ForceState(message::ForceState),
    GameEnd(message::GameEnd),
}
