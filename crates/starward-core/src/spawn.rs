//! Entity factories.
//!
//! Everything that enters the world goes through these helpers so that
//! component bundles stay consistent between the level director, the AI
//! systems and the tests.

use starward_ecs::prelude::{Entity, Registry};

use crate::components::*;
use crate::math::Vec2;
use crate::CoreError;

const PLAYER_SIZE: f32 = 32.0;
const ENEMY_SIZE: f32 = 32.0;
const BOSS_SIZE: f32 = 128.0;
const PROJECTILE_SIZE: f32 = 10.0;
const FORCE_SIZE: f32 = 24.0;

/// Register every component type the simulation uses.
pub fn register_components(reg: &mut Registry) {
    reg.register::<Transform>();
    reg.register::<RigidBody>();
    reg.register::<BoxCollider>();
    reg.register::<Player>();
    reg.register::<InputState>();
    reg.register::<Enemy>();
    reg.register::<Boss>();
    reg.register::<BossPart>();
    reg.register::<Projectile>();
    reg.register::<Weapon>();
    reg.register::<Force>();
    reg.register::<LevelPlan>();
    reg.register::<crate::tilemap::TileMap>();
}

// ---------------------------------------------------------------------------
// Players
// ---------------------------------------------------------------------------

/// Spawn a player ship with its weapon and Force satellite. Returns
/// `(player_entity, force_entity)`.
pub fn spawn_player(
    reg: &mut Registry,
    player_id: u16,
    position: Vec2,
) -> Result<(Entity, Entity), CoreError> {
    let player = reg.spawn();
    reg.add(player, Transform::at(position))?;
    reg.add(player, RigidBody::default())?;
    reg.add(
        player,
        BoxCollider::new(
            PLAYER_SIZE,
            PLAYER_SIZE,
            layers::PLAYER,
            layers::ENEMY | layers::PROJECTILE_ENEMY | layers::WORLD,
        ),
    )?;
    reg.add(player, Player::new(player_id, player))?;
    reg.add(player, InputState::default())?;
    reg.add(player, Weapon::default())?;

    let force = spawn_force(reg, player)?;
    Ok((player, force))
}

/// Spawn the Force satellite for `owner`.
pub fn spawn_force(reg: &mut Registry, owner: Entity) -> Result<Entity, CoreError> {
    let force = reg.spawn();
    let owner_pos = reg
        .get_cloned::<Transform>(owner)
        .map(|t| t.position)
        .unwrap_or(Vec2::ZERO);
    reg.add(force, Transform::at(owner_pos + Vec2::new(40.0, 0.0)))?;
    reg.add(force, RigidBody::default())?;
    let mut collider = BoxCollider::new(
        FORCE_SIZE,
        FORCE_SIZE,
        layers::FORCE,
        layers::ENEMY | layers::PROJECTILE_ENEMY,
    );
    collider.is_trigger = true;
    reg.add(force, collider)?;
    reg.add(force, Force::new(owner))?;
    Ok(force)
}

// ---------------------------------------------------------------------------
// Enemies
// ---------------------------------------------------------------------------

fn enemy_stats(kind: EnemyKind) -> Enemy {
    let (speed, amplitude, hp, score_reward) = match kind {
        EnemyKind::Basic => (100.0, 80.0, 50, 100),
        EnemyKind::Zigzag => (150.0, 80.0, 50, 150),
        EnemyKind::Chase => (120.0, 80.0, 60, 200),
        EnemyKind::MiniGreen => (110.0, 60.0, 30, 120),
        EnemyKind::Spinner => (130.0, 70.0, 40, 180),
    };
    let contact_damage = 5;
    Enemy {
        kind,
        speed,
        direction: Vec2::new(-1.0, 0.0),
        amplitude,
        timer: 0.0,
        last_shot_timer: 0.0,
        hp,
        contact_damage,
        score_reward,
    }
}

pub fn spawn_enemy(
    reg: &mut Registry,
    kind: EnemyKind,
    position: Vec2,
) -> Result<Entity, CoreError> {
    let enemy = reg.spawn();
    reg.add(enemy, Transform::at(position))?;
    reg.add(enemy, RigidBody::default())?;
    reg.add(
        enemy,
        BoxCollider::new(
            ENEMY_SIZE,
            ENEMY_SIZE,
            layers::ENEMY,
            layers::PLAYER | layers::PROJECTILE_PLAYER | layers::WORLD | layers::FORCE,
        ),
    )?;
    reg.add(enemy, enemy_stats(kind))?;
    Ok(enemy)
}

// ---------------------------------------------------------------------------
// Bosses
// ---------------------------------------------------------------------------

const SNAKE_SEGMENTS: i32 = 6;

pub fn spawn_boss(
    reg: &mut Registry,
    kind: BossKind,
    position: Vec2,
    hp: i32,
) -> Result<Entity, CoreError> {
    let boss = reg.spawn();
    reg.add(boss, Transform::at(position))?;
    reg.add(boss, RigidBody::default())?;
    reg.add(
        boss,
        BoxCollider::new(
            BOSS_SIZE,
            BOSS_SIZE,
            layers::ENEMY,
            layers::PLAYER | layers::PROJECTILE_PLAYER | layers::FORCE,
        ),
    )?;
    let speed = match kind {
        BossKind::BigShip => 100.0,
        BossKind::Snake => 120.0,
        BossKind::BydoEye => 0.0,
        BossKind::Battleship => 80.0,
        BossKind::FinalBoss => 100.0,
    };
    reg.add(
        boss,
        Boss {
            kind,
            phase: BossPhase::Phase1,
            direction: Vec2::new(-1.0, 0.0),
            timer: 0.0,
            speed,
            amplitude: 40.0,
            hp,
            spawn_timer: 0.0,
        },
    )?;

    match kind {
        BossKind::Snake => {
            for segment in 0..SNAKE_SEGMENTS {
                spawn_boss_part(
                    reg,
                    boss,
                    position,
                    Vec2::ZERO,
                    segment,
                    0.15 * (segment + 1) as f32,
                    50,
                )?;
            }
        }
        BossKind::BydoEye | BossKind::Battleship => {
            // Fixed turret emplacements above and below the hull.
            spawn_boss_part(reg, boss, position, Vec2::new(-20.0, -60.0), -1, 0.0, 60)?;
            spawn_boss_part(reg, boss, position, Vec2::new(-20.0, 60.0), -1, 0.0, 60)?;
        }
        _ => {}
    }
    Ok(boss)
}

fn spawn_boss_part(
    reg: &mut Registry,
    owner: Entity,
    boss_position: Vec2,
    offset: Vec2,
    segment_index: i32,
    time_offset: f32,
    hp: i32,
) -> Result<Entity, CoreError> {
    let part = reg.spawn();
    reg.add(part, Transform::at(boss_position + offset))?;
    reg.add(part, RigidBody::default())?;
    reg.add(
        part,
        BoxCollider::new(
            40.0,
            40.0,
            layers::ENEMY,
            layers::PLAYER | layers::PROJECTILE_PLAYER | layers::FORCE,
        ),
    )?;
    reg.add(
        part,
        BossPart {
            owner,
            offset,
            segment_index,
            time_offset,
            timer: 0.0,
            hp,
            alive: true,
        },
    )?;
    Ok(part)
}

// ---------------------------------------------------------------------------
// Projectiles
// ---------------------------------------------------------------------------

pub fn spawn_projectile(
    reg: &mut Registry,
    position: Vec2,
    direction: Vec2,
    speed: f32,
    damage: i32,
    owner: Entity,
    from_player: bool,
) -> Result<Entity, CoreError> {
    let projectile = reg.spawn();
    let direction = direction.normalized();
    reg.add(projectile, Transform::at(position))?;
    let mut body = RigidBody {
        mass: 0.1,
        restitution: 0.0,
        ..Default::default()
    };
    body.velocity = direction * speed;
    reg.add(projectile, body)?;

    let (layer, mask) = if from_player {
        (layers::PROJECTILE_PLAYER, layers::ENEMY | layers::WORLD)
    } else {
        (
            layers::PROJECTILE_ENEMY,
            layers::PLAYER | layers::WORLD | layers::FORCE,
        )
    };
    let mut collider = BoxCollider::new(PROJECTILE_SIZE, PROJECTILE_SIZE, layer, mask);
    collider.is_trigger = true;
    reg.add(projectile, collider)?;

    reg.add(
        projectile,
        Projectile {
            damage,
            speed,
            direction,
            current_life: 0.0,
            lifetime_cap: 3.0,
            owner,
            is_active: true,
        },
    )?;
    Ok(projectile)
}

/// A shot queued by a system mid-iteration, spawned after the loop.
#[derive(Debug, Clone, Copy)]
pub struct ShotRequest {
    pub position: Vec2,
    pub direction: Vec2,
    pub speed: f32,
    pub damage: i32,
    pub owner: Entity,
    pub from_player: bool,
}

pub fn apply_shots(reg: &mut Registry, shots: &[ShotRequest]) -> Result<(), CoreError> {
    for shot in shots {
        spawn_projectile(
            reg,
            shot.position,
            shot.direction,
            shot.speed,
            shot.damage,
            shot.owner,
            shot.from_player,
        )?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn world() -> Registry {
        let mut reg = Registry::new();
        register_components(&mut reg);
        reg
    }

    #[test]
    fn player_bundle_is_complete() {
        let mut reg = world();
        let (player, force) = spawn_player(&mut reg, 1, Vec2::new(200.0, 300.0)).unwrap();

        assert!(reg.has::<Transform>(player));
        assert!(reg.has::<RigidBody>(player));
        assert!(reg.has::<BoxCollider>(player));
        assert!(reg.has::<InputState>(player));
        assert!(reg.has::<Weapon>(player));
        let p = reg.get_cloned::<Player>(player).unwrap();
        assert_eq!(p.player_id, 1);
        assert_eq!(p.weapon, player);

        let f = reg.get_cloned::<Force>(force).unwrap();
        assert_eq!(f.owner_player, player);
        assert_eq!(f.state, ForceState::AttachedFront);
    }

    #[test]
    fn snake_gets_trailing_segments() {
        let mut reg = world();
        let boss = spawn_boss(&mut reg, BossKind::Snake, Vec2::new(700.0, 300.0), 500).unwrap();

        let parts = reg.components::<BossPart>().unwrap();
        let segments: Vec<_> = parts
            .iter()
            .filter(|(_, part)| part.owner == boss && part.segment_index >= 0)
            .collect();
        assert_eq!(segments.len(), SNAKE_SEGMENTS as usize);
    }

    #[test]
    fn turret_bosses_get_turrets() {
        let mut reg = world();
        let boss =
            spawn_boss(&mut reg, BossKind::Battleship, Vec2::new(600.0, 300.0), 400).unwrap();
        let parts = reg.components::<BossPart>().unwrap();
        let turrets = parts
            .iter()
            .filter(|(_, part)| part.owner == boss && part.segment_index == -1)
            .count();
        assert_eq!(turrets, 2);
    }

    #[test]
    fn projectile_velocity_follows_direction() {
        let mut reg = world();
        let owner = reg.spawn();
        let shot = spawn_projectile(
            &mut reg,
            Vec2::new(100.0, 100.0),
            Vec2::new(2.0, 0.0),
            500.0,
            10,
            owner,
            true,
        )
        .unwrap();

        let body = reg.get_cloned::<RigidBody>(shot).unwrap();
        assert_eq!(body.velocity, Vec2::new(500.0, 0.0));
        let collider = reg.get_cloned::<BoxCollider>(shot).unwrap();
        assert_eq!(collider.layer, layers::PROJECTILE_PLAYER);
        assert!(collider.is_trigger);
    }
}
