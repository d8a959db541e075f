//! The local mirror of the server's component stores.
//!
//! Snapshot deltas merge into a client-side registry keyed by the wire
//! ids; the renderer drains it through the drawable list. Stale snapshots
//! (older than the newest applied sequence) are discarded wholesale.

use std::collections::BTreeMap;

use starward_ecs::prelude::{Entity, Registry};
use starward_net::message::{self, mask::*};

use crate::ClientError;
use starward_core::components::*;
use starward_core::math::Vec2;
use starward_core::spawn;

fn seq_newer(a: u16, b: u16) -> bool {
    // Wrap-aware "a is strictly newer than b".
    a != b && a.wrapping_sub(b) < 0x8000
}

/// Client-side world state rebuilt from snapshots.
pub struct ClientWorld {
    registry: Registry,
    players: BTreeMap<u16, Entity>,
    enemies: BTreeMap<u16, Entity>,
    projectiles: BTreeMap<u16, Entity>,
    last_snapshot_seq: Option<u16>,
    /// This client's own player id, for prediction.
    local_player_id: Option<u16>,
}

impl Default for ClientWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientWorld {
    pub fn new() -> Self {
        let mut registry = Registry::new();
        spawn::register_components(&mut registry);
        Self {
            registry,
            players: BTreeMap::new(),
            enemies: BTreeMap::new(),
            projectiles: BTreeMap::new(),
            last_snapshot_seq: None,
            local_player_id: None,
        }
    }

    pub fn set_local_player(&mut self, player_id: u16) {
        self.local_player_id = Some(player_id);
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    pub fn player_entity(&self, player_id: u16) -> Option<Entity> {
        self.players.get(&player_id).copied()
    }

    // -- snapshot application -----------------------------------------------

    /// Merge a snapshot delta. Returns `false` when the snapshot was stale
    /// and ignored.
    pub fn apply_snapshot(
        &mut self,
        state: &message::GameState,
        seq: u16,
    ) -> Result<bool, ClientError> {
        if let Some(last) = self.last_snapshot_seq {
            if !seq_newer(seq, last) {
                return Ok(false);
            }
        }
        self.last_snapshot_seq = Some(seq);

        for record in &state.players {
            self.apply_player(record)?;
        }
        for record in &state.enemies {
            self.apply_enemy(record)?;
        }
        for record in &state.projectiles {
            self.apply_projectile(record)?;
        }
        Ok(true)
    }

    fn apply_player(&mut self, record: &message::PlayerState) -> Result<(), ClientError> {
        if record.mask & M_DELETE != 0 {
            if let Some(entity) = self.players.remove(&record.player_id) {
                let _ = self.registry.kill(entity);
            }
            return Ok(());
        }

        let entity = match self.players.get(&record.player_id) {
            Some(&entity) => entity,
            None => {
                let (entity, _force) = spawn::spawn_player(
                    &mut self.registry,
                    record.player_id,
                    Vec2::new(record.pos_x, record.pos_y),
                )?;
                self.players.insert(record.player_id, entity);
                entity
            }
        };

        {
            let mut transforms = self.registry.components_mut::<Transform>()?;
            if let Some(transform) = transforms.get_mut(entity.index()) {
                if record.mask & M_POS_X != 0 {
                    transform.position.x = record.pos_x;
                }
                if record.mask & M_POS_Y != 0 {
                    transform.position.y = record.pos_y;
                }
            }
        }
        {
            let mut players = self.registry.components_mut::<Player>()?;
            if let Some(player) = players.get_mut(entity.index()) {
                if record.mask & M_HP != 0 {
                    player.hp = record.hp as i32;
                }
                if record.mask & M_STATE != 0 {
                    player.is_alive = record.state != 0;
                }
                if record.mask & M_SCORE != 0 {
                    player.score = record.score;
                }
            }
        }
        Ok(())
    }

    fn apply_enemy(&mut self, record: &message::EnemyState) -> Result<(), ClientError> {
        if record.mask & M_DELETE != 0 {
            if let Some(entity) = self.enemies.remove(&record.enemy_id) {
                let _ = self.registry.kill(entity);
            }
            return Ok(());
        }

        let entity = match self.enemies.get(&record.enemy_id) {
            Some(&entity) => entity,
            None => {
                // High bit marks a boss record riding the enemy list.
                let position = Vec2::new(record.pos_x, record.pos_y);
                let entity = if record.kind & 0x80 != 0 {
                    let kind = match record.kind & 0x7F {
                        0 => BossKind::BigShip,
                        1 => BossKind::Snake,
                        2 => BossKind::BydoEye,
                        3 => BossKind::Battleship,
                        _ => BossKind::FinalBoss,
                    };
                    spawn::spawn_boss(&mut self.registry, kind, position, record.hp as i32)?
                } else {
                    let kind = match record.kind {
                        0 => EnemyKind::Basic,
                        1 => EnemyKind::Zigzag,
                        2 => EnemyKind::Chase,
                        3 => EnemyKind::MiniGreen,
                        _ => EnemyKind::Spinner,
                    };
                    spawn::spawn_enemy(&mut self.registry, kind, position)?
                };
                self.enemies.insert(record.enemy_id, entity);
                entity
            }
        };

        {
            let mut transforms = self.registry.components_mut::<Transform>()?;
            if let Some(transform) = transforms.get_mut(entity.index()) {
                if record.mask & M_POS_X != 0 {
                    transform.position.x = record.pos_x;
                }
                if record.mask & M_POS_Y != 0 {
                    transform.position.y = record.pos_y;
                }
            }
        }
        if record.mask & M_HP != 0 {
            let mut enemies = self.registry.components_mut::<Enemy>()?;
            if let Some(enemy) = enemies.get_mut(entity.index()) {
                enemy.hp = record.hp as i32;
            } else {
                drop(enemies);
                let mut bosses = self.registry.components_mut::<Boss>()?;
                if let Some(boss) = bosses.get_mut(entity.index()) {
                    boss.hp = record.hp as i32;
                }
            }
        }
        if record.mask & M_DIR != 0 {
            let mut enemies = self.registry.components_mut::<Enemy>()?;
            if let Some(enemy) = enemies.get_mut(entity.index()) {
                enemy.direction.x = record.direction as f32;
            }
        }
        Ok(())
    }

    fn apply_projectile(&mut self, record: &message::ProjectileState) -> Result<(), ClientError> {
        if record.mask & M_DELETE != 0 {
            if let Some(entity) = self.projectiles.remove(&record.projectile_id) {
                let _ = self.registry.kill(entity);
            }
            return Ok(());
        }

        let entity = match self.projectiles.get(&record.projectile_id) {
            Some(&entity) => entity,
            None => {
                let owner = Entity::from_index(record.owner_id as usize);
                let from_player = self
                    .players
                    .values()
                    .any(|entity| entity.raw() as u16 == record.owner_id);
                let entity = spawn::spawn_projectile(
                    &mut self.registry,
                    Vec2::new(record.pos_x, record.pos_y),
                    Vec2::new(record.vel_x, record.vel_y),
                    Vec2::new(record.vel_x, record.vel_y).length(),
                    record.damage as i32,
                    owner,
                    from_player,
                )?;
                self.projectiles.insert(record.projectile_id, entity);
                entity
            }
        };

        let mut transforms = self.registry.components_mut::<Transform>()?;
        if let Some(transform) = transforms.get_mut(entity.index()) {
            if record.mask & M_POS_X != 0 {
                transform.position.x = record.pos_x;
            }
            if record.mask & M_POS_Y != 0 {
                transform.position.y = record.pos_y;
            }
        }
        drop(transforms);
        if record.mask & M_VELOCITY != 0 {
            let mut bodies = self.registry.components_mut::<RigidBody>()?;
            if let Some(body) = bodies.get_mut(entity.index()) {
                body.velocity = Vec2::new(record.vel_x, record.vel_y);
            }
        }
        Ok(())
    }

    // -- prediction ----------------------------------------------------------

    /// Run the predicted subset of the pipeline for the local player:
    /// input apply, player movement, physics integration.
    pub fn predict(&mut self, input: InputState, dt: f32) -> Result<(), ClientError> {
        let Some(player_id) = self.local_player_id else {
            return Ok(());
        };
        let Some(&entity) = self.players.get(&player_id) else {
            return Ok(());
        };
        self.registry.add(entity, input)?;
        starward_core::input::player_movement(&self.registry, dt)?;
        starward_core::physics::integrate(&self.registry, dt)?;
        starward_core::physics::bounds_clamp(&self.registry)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn full_player(id: u16, x: f32, y: f32, hp: u8) -> message::PlayerState {
        message::PlayerState {
            player_id: id,
            mask: M_POS_X | M_POS_Y | M_HP | M_STATE | M_SCORE,
            pos_x: x,
            pos_y: y,
            hp,
            state: 1,
            score: 0,
        }
    }

    #[test]
    fn first_sight_spawns_the_mirror_entity() {
        let mut world = ClientWorld::new();
        let state = message::GameState {
            players: vec![full_player(1, 100.0, 200.0, 100)],
            ..Default::default()
        };
        assert!(world.apply_snapshot(&state, 1).unwrap());

        let entity = world.player_entity(1).unwrap();
        let transform = world.registry().get_cloned::<Transform>(entity).unwrap();
        assert_eq!(transform.position, Vec2::new(100.0, 200.0));
    }

    #[test]
    fn masked_merge_keeps_unsent_fields() {
        // Spec scenario 4: posX-only delta leaves posY and hp untouched.
        let mut world = ClientWorld::new();
        world
            .apply_snapshot(
                &message::GameState {
                    players: vec![full_player(1, 100.0, 200.0, 100)],
                    ..Default::default()
                },
                1,
            )
            .unwrap();

        world
            .apply_snapshot(
                &message::GameState {
                    players: vec![message::PlayerState {
                        player_id: 1,
                        mask: M_POS_X,
                        pos_x: 102.0,
                        ..Default::default()
                    }],
                    ..Default::default()
                },
                2,
            )
            .unwrap();

        let entity = world.player_entity(1).unwrap();
        let transform = world.registry().get_cloned::<Transform>(entity).unwrap();
        let player = world.registry().get_cloned::<Player>(entity).unwrap();
        assert_eq!(transform.position, Vec2::new(102.0, 200.0));
        assert_eq!(player.hp, 100);
    }

    #[test]
    fn stale_snapshot_is_discarded() {
        let mut world = ClientWorld::new();
        world
            .apply_snapshot(
                &message::GameState {
                    players: vec![full_player(1, 100.0, 200.0, 100)],
                    ..Default::default()
                },
                10,
            )
            .unwrap();

        let applied = world
            .apply_snapshot(
                &message::GameState {
                    players: vec![message::PlayerState {
                        player_id: 1,
                        mask: M_POS_X,
                        pos_x: 50.0,
                        ..Default::default()
                    }],
                    ..Default::default()
                },
                9,
            )
            .unwrap();
        assert!(!applied);

        let entity = world.player_entity(1).unwrap();
        let transform = world.registry().get_cloned::<Transform>(entity).unwrap();
        assert_eq!(transform.position.x, 100.0, "old data ignored");
    }

    #[test]
    fn delete_record_despawns() {
        let mut world = ClientWorld::new();
        world
            .apply_snapshot(
                &message::GameState {
                    enemies: vec![message::EnemyState {
                        enemy_id: 5,
                        mask: M_POS_X | M_POS_Y | M_HP | M_STATE | M_TYPE | M_DIR,
                        pos_x: 700.0,
                        pos_y: 100.0,
                        hp: 50,
                        state: 1,
                        kind: 0,
                        direction: -1,
                    }],
                    ..Default::default()
                },
                1,
            )
            .unwrap();
        assert_eq!(world.registry().components::<Enemy>().unwrap().population(), 1);

        world
            .apply_snapshot(
                &message::GameState {
                    enemies: vec![message::EnemyState {
                        enemy_id: 5,
                        mask: M_DELETE,
                        ..Default::default()
                    }],
                    ..Default::default()
                },
                2,
            )
            .unwrap();
        assert_eq!(world.registry().components::<Enemy>().unwrap().population(), 0);
    }

    #[test]
    fn snapshot_seq_wraps() {
        let mut world = ClientWorld::new();
        let state = message::GameState {
            players: vec![full_player(1, 100.0, 200.0, 100)],
            ..Default::default()
        };
        world.apply_snapshot(&state, u16::MAX).unwrap();
        // 0 is newer than MAX in circular terms.
        assert!(world.apply_snapshot(&state, 0).unwrap());
    }

    #[test]
    fn prediction_moves_the_local_player() {
        let mut world = ClientWorld::new();
        world
            .apply_snapshot(
                &message::GameState {
                    players: vec![full_player(1, 200.0, 300.0, 100)],
                    ..Default::default()
                },
                1,
            )
            .unwrap();
        world.set_local_player(1);

        world
            .predict(
                InputState {
                    right: true,
                    ..Default::default()
                },
                1.0 / 60.0,
            )
            .unwrap();

        let entity = world.player_entity(1).unwrap();
        let transform = world.registry().get_cloned::<Transform>(entity).unwrap();
        assert!(transform.position.x > 200.0);
    }
}
