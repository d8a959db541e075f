//! Per-peer delta snapshot construction.
//!
//! Each tick the kernel captures a [`WorldView`]; for every peer a
//! [`PeerDeltaTracker`] diffs that view against the last view the peer
//! acknowledged and emits records carrying only the changed fields. A
//! record absent from the delta means "no change"; a record with
//! `M_DELETE` set tells the client to destroy the entity.

use std::collections::{BTreeMap, VecDeque};

use starward_ecs::prelude::{IndexedZipper, Registry};
use starward_net::message::{mask::*, EnemyState, GameState, PlayerState, ProjectileState};

use crate::components::{Boss, Enemy, Player, Projectile, RigidBody, Transform};
use crate::CoreError;

/// How many in-flight snapshots to remember per peer. Acks older than this
/// fall back to the previous baseline, which only costs delta size.
const IN_FLIGHT_CAP: usize = 64;

// ---------------------------------------------------------------------------
// WorldView
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayerVals {
    pub x: f32,
    pub y: f32,
    pub hp: u8,
    pub state: u8,
    pub score: u32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnemyVals {
    pub x: f32,
    pub y: f32,
    pub hp: u8,
    pub state: u8,
    pub kind: u8,
    pub direction: i8,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProjectileVals {
    pub x: f32,
    pub y: f32,
    pub vel_x: f32,
    pub vel_y: f32,
    pub kind: u8,
    pub owner: u16,
    pub damage: u8,
}

/// Everything the wire cares about, keyed by wire id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorldView {
    pub players: BTreeMap<u16, PlayerVals>,
    pub enemies: BTreeMap<u16, EnemyVals>,
    pub projectiles: BTreeMap<u16, ProjectileVals>,
}

/// Capture the wire-visible state of the registry.
pub fn capture(reg: &Registry) -> Result<WorldView, CoreError> {
    let mut view = WorldView::default();

    let transforms = reg.components::<Transform>()?;

    {
        let players = reg.components::<Player>()?;
        for (player, transform) in
            starward_ecs::prelude::Zipper::new((players.view(), transforms.view()))
        {
            view.players.insert(
                player.player_id,
                PlayerVals {
                    x: transform.position.x,
                    y: transform.position.y,
                    hp: player.hp.clamp(0, u8::MAX as i32) as u8,
                    state: u8::from(player.is_alive),
                    score: player.score,
                },
            );
        }
    }

    {
        let enemies = reg.components::<Enemy>()?;
        for (index, (enemy, transform)) in
            IndexedZipper::new((enemies.view(), transforms.view()))
        {
            view.enemies.insert(
                index as u16,
                EnemyVals {
                    x: transform.position.x,
                    y: transform.position.y,
                    hp: enemy.hp.clamp(0, u8::MAX as i32) as u8,
                    state: 1,
                    kind: enemy.kind as u8,
                    direction: if enemy.direction.x < 0.0 {
                        -1
                    } else if enemy.direction.x > 0.0 {
                        1
                    } else {
                        0
                    },
                },
            );
        }
        // Bosses ride the enemy list with their own records; the dedicated
        // BOSS_UPDATE stream carries the richer fields.
        let bosses = reg.components::<Boss>()?;
        for (index, (boss, transform)) in
            IndexedZipper::new((bosses.view(), transforms.view()))
        {
            view.enemies.insert(
                index as u16,
                EnemyVals {
                    x: transform.position.x,
                    y: transform.position.y,
                    hp: boss.hp.clamp(0, u8::MAX as i32) as u8,
                    state: 1,
                    kind: boss.kind as u8 | 0x80,
                    direction: 0,
                },
            );
        }
    }

    {
        let projectiles = reg.components::<Projectile>()?;
        let bodies = reg.components::<RigidBody>()?;
        for (index, (projectile, transform, body)) in IndexedZipper::new((
            projectiles.view(),
            transforms.view(),
            bodies.view(),
        )) {
            if !projectile.is_active {
                continue;
            }
            view.projectiles.insert(
                index as u16,
                ProjectileVals {
                    x: transform.position.x,
                    y: transform.position.y,
                    vel_x: body.velocity.x,
                    vel_y: body.velocity.y,
                    kind: 0,
                    owner: projectile.owner.raw() as u16,
                    damage: projectile.damage.clamp(0, u8::MAX as i32) as u8,
                },
            );
        }
    }

    Ok(view)
}

// ---------------------------------------------------------------------------
// PeerDeltaTracker
// ---------------------------------------------------------------------------

fn seq_distance(a: u16, b: u16) -> i32 {
    let diff = a.wrapping_sub(b);
    if diff < 0x8000 {
        diff as i32
    } else {
        diff as i32 - 0x10000
    }
}

fn is_acked(seq: u16, ack: u16, ack_bits: u32) -> bool {
    if seq == ack {
        return true;
    }
    let behind = seq_distance(ack, seq);
    (1..=32).contains(&behind) && ack_bits & (1 << (behind - 1)) != 0
}

/// One peer's delta baseline: the last world view it acknowledged, plus
/// the views still in flight.
#[derive(Debug, Default)]
pub struct PeerDeltaTracker {
    baseline: WorldView,
    in_flight: VecDeque<(u16, WorldView)>,
}

impl PeerDeltaTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Diff `current` against the acked baseline and remember it under
    /// `seq` so a future ack can promote it.
    pub fn build_delta(&mut self, current: &WorldView, seq: u16) -> GameState {
        let mut delta = GameState::default();

        for (&id, vals) in &current.players {
            let mut record = PlayerState {
                player_id: id,
                mask: M_NONE,
                pos_x: vals.x,
                pos_y: vals.y,
                hp: vals.hp,
                state: vals.state,
                score: vals.score,
            };
            match self.baseline.players.get(&id) {
                None => {
                    record.mask = M_POS_X | M_POS_Y | M_HP | M_STATE | M_SCORE;
                }
                Some(base) => {
                    if base.x != vals.x {
                        record.mask |= M_POS_X;
                    }
                    if base.y != vals.y {
                        record.mask |= M_POS_Y;
                    }
                    if base.hp != vals.hp {
                        record.mask |= M_HP;
                    }
                    if base.state != vals.state {
                        record.mask |= M_STATE;
                    }
                    if base.score != vals.score {
                        record.mask |= M_SCORE;
                    }
                }
            }
            if record.mask != M_NONE {
                delta.players.push(record);
            }
        }
        for &id in self.baseline.players.keys() {
            if !current.players.contains_key(&id) {
                delta.players.push(PlayerState {
                    player_id: id,
                    mask: M_DELETE,
                    ..Default::default()
                });
            }
        }

        for (&id, vals) in &current.enemies {
            let mut record = EnemyState {
                enemy_id: id,
                mask: M_NONE,
                pos_x: vals.x,
                pos_y: vals.y,
                hp: vals.hp,
                state: vals.state,
                kind: vals.kind,
                direction: vals.direction,
            };
            match self.baseline.enemies.get(&id) {
                None => {
                    record.mask = M_POS_X | M_POS_Y | M_HP | M_STATE | M_TYPE | M_DIR;
                }
                Some(base) => {
                    if base.x != vals.x {
                        record.mask |= M_POS_X;
                    }
                    if base.y != vals.y {
                        record.mask |= M_POS_Y;
                    }
                    if base.hp != vals.hp {
                        record.mask |= M_HP;
                    }
                    if base.state != vals.state {
                        record.mask |= M_STATE;
                    }
                    if base.kind != vals.kind {
                        record.mask |= M_TYPE;
                    }
                    if base.direction != vals.direction {
                        record.mask |= M_DIR;
                    }
                }
            }
            if record.mask != M_NONE {
                delta.enemies.push(record);
            }
        }
        for &id in self.baseline.enemies.keys() {
            if !current.enemies.contains_key(&id) {
                delta.enemies.push(EnemyState {
                    enemy_id: id,
                    mask: M_DELETE,
                    ..Default::default()
                });
            }
        }

        for (&id, vals) in &current.projectiles {
            let mut record = ProjectileState {
                projectile_id: id,
                mask: M_NONE,
                pos_x: vals.x,
                pos_y: vals.y,
                vel_x: vals.vel_x,
                vel_y: vals.vel_y,
                kind: vals.kind,
                owner_id: vals.owner,
                damage: vals.damage,
            };
            match self.baseline.projectiles.get(&id) {
                None => {
                    record.mask =
                        M_POS_X | M_POS_Y | M_VELOCITY | M_TYPE | M_OWNER | M_DAMAGE;
                }
                Some(base) => {
                    if base.x != vals.x {
                        record.mask |= M_POS_X;
                    }
                    if base.y != vals.y {
                        record.mask |= M_POS_Y;
                    }
                    if base.vel_x != vals.vel_x || base.vel_y != vals.vel_y {
                        record.mask |= M_VELOCITY;
                    }
                    if base.damage != vals.damage {
                        record.mask |= M_DAMAGE;
                    }
                }
            }
            if record.mask != M_NONE {
                delta.projectiles.push(record);
            }
        }
        for &id in self.baseline.projectiles.keys() {
            if !current.projectiles.contains_key(&id) {
                delta.projectiles.push(ProjectileState {
                    projectile_id: id,
                    mask: M_DELETE,
                    ..Default::default()
                });
            }
        }

        if self.in_flight.len() == IN_FLIGHT_CAP {
            self.in_flight.pop_front();
        }
        self.in_flight.push_back((seq, current.clone()));
        delta
    }

    /// Promote the newest acknowledged in-flight view to be the baseline.
    pub fn on_ack(&mut self, ack: u16, ack_bits: u32) {
        let newest_acked = self
            .in_flight
            .iter()
            .rev()
            .find(|(seq, _)| is_acked(*seq, ack, ack_bits))
            .map(|(seq, _)| *seq);
        let Some(promoted) = newest_acked else {
            return;
        };

        while let Some((seq, view)) = self.in_flight.pop_front() {
            if seq == promoted {
                self.baseline = view;
                break;
            }
        }
    }

    pub fn baseline(&self) -> &WorldView {
        &self.baseline
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
