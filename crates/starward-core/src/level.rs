//! The level/wave director.
//!
//! A match is a sequence of authored levels; each level is a sequence of
//! waves, the last of which is a boss. The director waits out the gap
//! between waves, spawns the next wave's contents with difficulty scaling,
//! and flags the level finished when the final wave is cleared.

use starward_ecs::prelude::{Entity, Registry};
use starward_net::message;

use crate::components::*;
use crate::config::WAVE_GAP_SECONDS;
use crate::events::SideEvent;
use crate::math::Vec2;
use crate::spawn;
use crate::CoreError;

/// Boss hit points when a wave does not name them.
fn default_boss_hp(level_index: usize) -> i32 {
    500 + level_index as i32 * 200
}

// ---------------------------------------------------------------------------
// Authored levels
// ---------------------------------------------------------------------------

fn enemy_wave(kinds: &[(EnemyKind, u32)], spawns: &[(f32, f32)]) -> Wave {
    Wave {
        enemy_kinds: kinds.iter().map(|(kind, _)| *kind).collect(),
        per_kind_count: kinds.iter().map(|(_, count)| *count).collect(),
        spawn_points: spawns.iter().map(|&(x, y)| Vec2::new(x, y)).collect(),
        boss: None,
        boss_hp: 0,
    }
}

fn boss_wave(kind: BossKind, hp: i32, spawn: (f32, f32)) -> Wave {
    Wave {
        enemy_kinds: Vec::new(),
        per_kind_count: Vec::new(),
        spawn_points: vec![Vec2::new(spawn.0, spawn.1)],
        boss: Some(kind),
        boss_hp: hp,
    }
}

/// The campaign: three levels, each two enemy waves then a boss.
pub fn authored_levels() -> Vec<Vec<Wave>> {
    vec![
        vec![
            enemy_wave(
                &[(EnemyKind::Basic, 3)],
                &[(700.0, 100.0), (700.0, 200.0), (700.0, 300.0)],
            ),
            enemy_wave(
                &[(EnemyKind::Basic, 2), (EnemyKind::Zigzag, 2)],
                &[(700.0, 120.0), (700.0, 220.0), (700.0, 320.0), (700.0, 420.0)],
            ),
            boss_wave(BossKind::BigShip, 300, (700.0, 300.0)),
        ],
        vec![
            enemy_wave(
                &[(EnemyKind::Zigzag, 3), (EnemyKind::MiniGreen, 2)],
                &[(700.0, 80.0), (700.0, 140.0), (700.0, 200.0), (700.0, 260.0)],
            ),
            enemy_wave(
                &[(EnemyKind::Zigzag, 3), (EnemyKind::Chase, 2)],
                &[
                    (700.0, 110.0),
                    (700.0, 170.0),
                    (700.0, 230.0),
                    (700.0, 290.0),
                    (700.0, 350.0),
                ],
            ),
            boss_wave(BossKind::Snake, 500, (700.0, 300.0)),
        ],
        vec![
            enemy_wave(
                &[(EnemyKind::Chase, 4), (EnemyKind::Spinner, 2)],
                &[
                    (700.0, 60.0),
                    (700.0, 120.0),
                    (700.0, 180.0),
                    (700.0, 240.0),
                    (700.0, 300.0),
                ],
            ),
            enemy_wave(
                &[
                    (EnemyKind::Zigzag, 3),
                    (EnemyKind::Chase, 3),
                    (EnemyKind::Spinner, 2),
                ],
                &[
                    (700.0, 90.0),
                    (700.0, 150.0),
                    (700.0, 210.0),
                    (700.0, 270.0),
                    (700.0, 330.0),
                    (700.0, 390.0),
                    (700.0, 450.0),
                    (700.0, 510.0),
                ],
            ),
            boss_wave(BossKind::FinalBoss, 1200, (700.0, 300.0)),
        ],
    ]
}

// ---------------------------------------------------------------------------
// Director
// ---------------------------------------------------------------------------

fn hostiles_alive(reg: &Registry) -> Result<bool, CoreError> {
    let enemies = reg.components::<Enemy>()?;
    if enemies.population() > 0 {
        return Ok(true);
    }
    let bosses = reg.components::<Boss>()?;
    if bosses.population() > 0 {
        return Ok(true);
    }
    Ok(false)
}

/// Advance the wave state machine one tick.
///
/// Between waves the delay timer accumulates; once it crosses the gap the
/// next wave spawns. Running past the last wave sets `finished_level`
/// (exactly once), which the match controller turns into a level
/// transition or victory.
pub fn director(
    reg: &mut Registry,
    level_entity: Entity,
    dt: f32,
    difficulty: u8,
    outbox: &mut Vec<SideEvent>,
) -> Result<(), CoreError> {
    if hostiles_alive(reg)? {
        return Ok(());
    }

    // All clear: tick the gap, maybe advance.
    let next_wave: Option<(Wave, usize)> = {
        let mut plans = reg.components_mut::<LevelPlan>()?;
        let Some(plan) = plans.get_mut(level_entity.index()) else {
            return Ok(());
        };
        if plan.finished_level {
            return Ok(());
        }
        plan.wave_delay_timer += dt;
        if plan.wave_delay_timer < WAVE_GAP_SECONDS {
            return Ok(());
        }
        plan.wave_delay_timer = 0.0;
        plan.current_wave += 1;

        if plan.current_wave as usize >= plan.waves.len() {
            plan.finished_level = true;
            tracing::info!(level = plan.level_index, "level cleared");
            None
        } else {
            Some((
                plan.waves[plan.current_wave as usize].clone(),
                plan.level_index,
            ))
        }
    };

    let Some((wave, level_index)) = next_wave else {
        return Ok(());
    };
    spawn_wave(reg, &wave, level_index, difficulty, outbox)
}

/// Spawn a wave's contents. Later levels scale enemy speed and hit
/// points; the configured difficulty pads each kind's head count.
fn spawn_wave(
    reg: &mut Registry,
    wave: &Wave,
    level_index: usize,
    difficulty: u8,
    outbox: &mut Vec<SideEvent>,
) -> Result<(), CoreError> {
    let speed_scale = 1.0 + 0.15 * level_index as f32;
    let hp_scale = 1.0 + 0.2 * level_index as f32;

    if let Some(kind) = wave.boss {
        let position = wave
            .spawn_points
            .first()
            .copied()
            .unwrap_or(Vec2::new(700.0, 300.0));
        let hp = if wave.boss_hp > 0 {
            wave.boss_hp
        } else {
            default_boss_hp(level_index)
        };
        let boss = spawn::spawn_boss(reg, kind, position, hp)?;
        {
            let mut bosses = reg.components_mut::<Boss>()?;
            if let Some(b) = bosses.get_mut(boss.index()) {
                b.speed *= speed_scale;
            }
        }
        outbox.push(SideEvent::BossSpawn(message::BossSpawn {
            boss_id: boss.raw() as u16,
            kind: kind as u8,
            max_hp: hp.max(0) as u16,
            phase: BossPhase::Phase1 as u8,
        }));
        tracing::info!(?kind, hp, "boss wave spawned");
        return Ok(());
    }

    let mut spawned = 0usize;
    for (slot, kind) in wave.enemy_kinds.iter().enumerate() {
        let count =
            wave.per_kind_count.get(slot).copied().unwrap_or(1) + difficulty.saturating_sub(1) as u32;
        for _ in 0..count {
            let position = if wave.spawn_points.is_empty() {
                Vec2::new(750.0, 50.0 + (spawned as f32 * 30.0) % 500.0)
            } else {
                wave.spawn_points[spawned % wave.spawn_points.len()]
            };
            let enemy = spawn::spawn_enemy(reg, *kind, position)?;
            {
                let mut enemies = reg.components_mut::<Enemy>()?;
                if let Some(e) = enemies.get_mut(enemy.index()) {
                    e.speed *= speed_scale;
                    e.hp = (e.hp as f32 * hp_scale) as i32;
                }
            }
            spawned += 1;
        }
    }
    tracing::debug!(spawned, "enemy wave spawned");
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn world_with_level(level_index: usize) -> (Registry, Entity) {
        let mut reg = Registry::new();
        spawn::register_components(&mut reg);
        let entity = reg.spawn();
        let waves = authored_levels()[level_index].clone();
        reg.add(entity, LevelPlan::new(waves, level_index)).unwrap();
        (reg, entity)
    }

    fn run_gap(reg: &mut Registry, entity: Entity, outbox: &mut Vec<SideEvent>) {
        // A hair over the three-second gap.
        for _ in 0..((WAVE_GAP_SECONDS * 60.0) as usize + 2) {
            director(reg, entity, 1.0 / 60.0, 1, outbox).unwrap();
        }
    }

    fn kill_all_hostiles(reg: &mut Registry) {
        let mut doomed = Vec::new();
        {
            let enemies = reg.components::<Enemy>().unwrap();
            doomed.extend(enemies.iter().map(|(i, _)| Entity::from_index(i)));
            let bosses = reg.components::<Boss>().unwrap();
            doomed.extend(bosses.iter().map(|(i, _)| Entity::from_index(i)));
            let parts = reg.components::<BossPart>().unwrap();
            doomed.extend(parts.iter().map(|(i, _)| Entity::from_index(i)));
        }
        for e in doomed {
            reg.kill(e).unwrap();
        }
    }

    #[test]
    fn first_wave_spawns_after_the_gap() {
        let (mut reg, entity) = world_with_level(0);
        let mut outbox = Vec::new();

        director(&mut reg, entity, 1.0 / 60.0, 1, &mut outbox).unwrap();
        assert_eq!(reg.components::<Enemy>().unwrap().population(), 0);

        run_gap(&mut reg, entity, &mut outbox);
        assert_eq!(reg.components::<Enemy>().unwrap().population(), 3);
        assert_eq!(
            reg.get_cloned::<LevelPlan>(entity).unwrap().current_wave,
            0
        );
    }

    #[test]
    fn waves_hold_while_enemies_live() {
        let (mut reg, entity) = world_with_level(0);
        let mut outbox = Vec::new();
        run_gap(&mut reg, entity, &mut outbox);

        // Enemies alive: a long time passes, nothing new spawns.
        for _ in 0..600 {
            director(&mut reg, entity, 1.0 / 60.0, 1, &mut outbox).unwrap();
        }
        assert_eq!(reg.components::<Enemy>().unwrap().population(), 3);
    }

    #[test]
    fn wave_to_boss_to_finished() {
        let (mut reg, entity) = world_with_level(0);
        let mut outbox = Vec::new();

        // Wave 0.
        run_gap(&mut reg, entity, &mut outbox);
        kill_all_hostiles(&mut reg);
        // Wave 1.
        run_gap(&mut reg, entity, &mut outbox);
        assert_eq!(reg.components::<Enemy>().unwrap().population(), 4);
        kill_all_hostiles(&mut reg);

        // Boss wave.
        run_gap(&mut reg, entity, &mut outbox);
        assert_eq!(reg.components::<Boss>().unwrap().population(), 1);
        assert!(outbox.iter().any(|event| matches!(
            event,
            SideEvent::BossSpawn(message::BossSpawn { max_hp: 300, .. })
        )));
        kill_all_hostiles(&mut reg);

        // Cleared: the level finishes exactly once.
        run_gap(&mut reg, entity, &mut outbox);
        let plan = reg.get_cloned::<LevelPlan>(entity).unwrap();
        assert!(plan.finished_level);
        assert_eq!(plan.current_wave as usize, plan.waves.len());

        // And stays finished.
        run_gap(&mut reg, entity, &mut outbox);
        let plan_after = reg.get_cloned::<LevelPlan>(entity).unwrap();
        assert_eq!(plan.current_wave, plan_after.current_wave);
    }

    #[test]
    fn current_wave_is_monotone() {
        let (mut reg, entity) = world_with_level(0);
        let mut outbox = Vec::new();
        let mut last = -1;
        for _ in 0..2000 {
            director(&mut reg, entity, 1.0 / 60.0, 1, &mut outbox).unwrap();
            let wave = reg.get_cloned::<LevelPlan>(entity).unwrap().current_wave;
            assert!(wave >= last);
            last = wave;
            kill_all_hostiles(&mut reg);
        }
    }

    #[test]
    fn difficulty_scales_later_levels() {
        let (mut reg, entity) = world_with_level(2);
        let mut outbox = Vec::new();
        run_gap(&mut reg, entity, &mut outbox);

        let enemies = reg.components::<Enemy>().unwrap();
        let (_, chaser) = enemies
            .iter()
            .find(|(_, e)| e.kind == EnemyKind::Chase)
            .expect("level 3 opens with chasers");
        // Base chase speed 120 * (1 + 0.15*2) = 156; hp 60 * 1.4 = 84.
        assert!((chaser.speed - 156.0).abs() < 1e-3);
        assert_eq!(chaser.hp, 84);
    }
}
