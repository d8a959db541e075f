//! Gameplay collision dispatch: damage, deaths, and score.
//!
//! The physics layer reports raw overlaps; this system interprets them by
//! entity category, applies the damage table, kills what reaches zero hit
//! points, and credits the killer's score.

use std::collections::BTreeSet;

use starward_ecs::prelude::{Entity, Registry};
use starward_net::message;

use crate::components::*;
use crate::events::{Category, CollisionHit, Death, SideEvent};
use crate::CoreError;

const BOSS_CONTACT_DAMAGE: i32 = 30;
const PLAYER_RAM_DAMAGE: i32 = 5;
const BOSS_PART_CONTACT_DAMAGE: i32 = 10;
const BOSS_SCORE: u32 = 500;
const BOSS_PART_SCORE: u32 = 50;
/// Damage immunity granted after a hit, in seconds.
const HIT_INVINCIBILITY: f32 = 1.0;
/// Minimum delay between two Force contact ticks on the same target class.
const FORCE_DAMAGE_COOLDOWN: f32 = 0.25;

/// Gameplay category of an entity, from its components.
pub fn category(reg: &Registry, entity: Entity) -> Category {
    if reg.has::<Player>(entity) {
        Category::Player
    } else if reg.has::<Enemy>(entity) {
        Category::Enemy
    } else if reg.has::<Boss>(entity) {
        Category::Boss
    } else if reg.has::<BossPart>(entity) {
        Category::BossPart
    } else if reg.has::<Projectile>(entity) {
        Category::Projectile
    } else if reg.has::<Force>(entity) {
        Category::Force
    } else {
        Category::Unknown
    }
}

/// Contact damage dealt by `tagger` to `target`, projectiles excluded.
fn contact_damage(reg: &Registry, tagger: Entity, from: Category, to: Category) -> i32 {
    match (from, to) {
        (Category::Player, Category::Enemy) => 10,
        (Category::Enemy, Category::Player) => reg
            .get_cloned::<Enemy>(tagger)
            .map(|enemy| enemy.contact_damage)
            .unwrap_or(5),
        (Category::Boss, Category::Player) => BOSS_CONTACT_DAMAGE,
        (Category::BossPart, Category::Player) => BOSS_PART_CONTACT_DAMAGE,
        (Category::Player, Category::Boss) => PLAYER_RAM_DAMAGE,
        _ => 0,
    }
}

/// Resolve the player entity to credit for a kill, following a projectile
/// or Force back to its owner.
fn killer_player(reg: &Registry, killer: Entity) -> Option<Entity> {
    if reg.has::<Player>(killer) {
        return Some(killer);
    }
    if let Some(projectile) = reg.get_cloned::<Projectile>(killer) {
        if reg.has::<Player>(projectile.owner) {
            return Some(projectile.owner);
        }
    }
    if let Some(force) = reg.get_cloned::<Force>(killer) {
        if reg.has::<Player>(force.owner_player) {
            return Some(force.owner_player);
        }
    }
    None
}

pub fn dispatch(
    reg: &mut Registry,
    hits: &[CollisionHit],
    deaths: &mut Vec<Death>,
    outbox: &mut Vec<SideEvent>,
) -> Result<(), CoreError> {
    let mut kills: BTreeSet<Entity> = BTreeSet::new();

    for hit in hits {
        for (tagger, target) in [(hit.a, hit.b), (hit.b, hit.a)] {
            if !reg.is_valid(tagger) || !reg.is_valid(target) {
                continue;
            }
            let from = category(reg, tagger);
            let to = category(reg, target);

            let damage = match from {
                Category::Projectile => {
                    let Some(projectile) = reg.get_cloned::<Projectile>(tagger) else {
                        continue;
                    };
                    if !projectile.is_active || projectile.owner == target {
                        continue;
                    }
                    // A projectile dies on whatever it touches.
                    kills.insert(tagger);
                    if let Ok(mut projectiles) = reg.components_mut::<Projectile>() {
                        if let Some(p) = projectiles.get_mut(tagger.index()) {
                            p.is_active = false;
                        }
                    }
                    projectile.damage
                }
                Category::Force => {
                    let Some(force) = reg.get_cloned::<Force>(tagger) else {
                        continue;
                    };
                    match to {
                        Category::Projectile => {
                            // The Force soaks enemy shots.
                            if force.blocks_projectiles {
                                let enemy_shot = reg
                                    .get_cloned::<Projectile>(target)
                                    .map(|p| !reg.has::<Player>(p.owner))
                                    .unwrap_or(false);
                                if enemy_shot {
                                    kills.insert(target);
                                }
                            }
                            continue;
                        }
                        Category::Enemy | Category::Boss | Category::BossPart => {
                            if force.damage_timer > 0.0 {
                                continue;
                            }
                            if let Ok(mut forces) = reg.components_mut::<Force>() {
                                if let Some(f) = forces.get_mut(tagger.index()) {
                                    f.damage_timer = FORCE_DAMAGE_COOLDOWN;
                                }
                            }
                            force.contact_damage
                        }
                        _ => continue,
                    }
                }
                _ => contact_damage(reg, tagger, from, to),
            };
            if damage <= 0 {
                continue;
            }

            apply_damage(reg, tagger, target, to, damage, hit, deaths, outbox, &mut kills)?;
        }
    }

    resolve_deaths(reg, deaths, &kills)?;
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn apply_damage(
    reg: &Registry,
    tagger: Entity,
    target: Entity,
    to: Category,
    damage: i32,
    hit: &CollisionHit,
    deaths: &mut Vec<Death>,
    outbox: &mut Vec<SideEvent>,
    kills: &mut BTreeSet<Entity>,
) -> Result<(), CoreError> {
    match to {
        Category::Player => {
            let mut players = reg.components_mut::<Player>()?;
            let Some(player) = players.get_mut(target.index()) else {
                return Ok(());
            };
            if !player.is_alive || player.invincibility_timer > 0.0 {
                return Ok(());
            }
            player.hp -= damage;
            player.invincibility_timer = HIT_INVINCIBILITY;
            if player.hp <= 0 {
                player.hp = 0;
                player.is_alive = false;
                deaths.push(Death {
                    dead: target,
                    killer: tagger,
                    category: Category::Player,
                    position: hit.point,
                });
            }
        }
        Category::Enemy => {
            let hp_remaining = {
                let mut enemies = reg.components_mut::<Enemy>()?;
                let Some(enemy) = enemies.get_mut(target.index()) else {
                    return Ok(());
                };
                enemy.hp -= damage;
                enemy.hp
            };
            outbox.push(SideEvent::EnemyHit(message::EnemyHit {
                enemy_id: target.raw() as u16,
                damage: damage.clamp(0, u8::MAX as i32) as u8,
                hp_remaining: hp_remaining.max(0) as u16,
            }));
            if hp_remaining <= 0 {
                deaths.push(Death {
                    dead: target,
                    killer: tagger,
                    category: Category::Enemy,
                    position: hit.point,
                });
                kills.insert(target);
            }
        }
        Category::Boss => {
            let hp_remaining = {
                let mut bosses = reg.components_mut::<Boss>()?;
                let Some(boss) = bosses.get_mut(target.index()) else {
                    return Ok(());
                };
                boss.hp -= damage;
                boss.hp
            };
            if hp_remaining <= 0 {
                deaths.push(Death {
                    dead: target,
                    killer: tagger,
                    category: Category::Boss,
                    position: hit.point,
                });
                kills.insert(target);
            }
        }
        Category::BossPart => {
            let dead = {
                let mut parts = reg.components_mut::<BossPart>()?;
                let Some(part) = parts.get_mut(target.index()) else {
                    return Ok(());
                };
                if !part.alive {
                    return Ok(());
                }
                part.hp -= damage;
                if part.hp <= 0 {
                    part.alive = false;
                }
                !part.alive
            };
            if dead {
                deaths.push(Death {
                    dead: target,
                    killer: tagger,
                    category: Category::BossPart,
                    position: hit.point,
                });
                kills.insert(target);
            }
        }
        _ => {}
    }
    Ok(())
}

/// Credit scores, cascade boss-part deaths, and remove killed entities.
fn resolve_deaths(
    reg: &mut Registry,
    deaths: &[Death],
    kills: &BTreeSet<Entity>,
) -> Result<(), CoreError> {
    let mut all_kills = kills.clone();

    for death in deaths {
        let reward = match death.category {
            Category::Enemy => reg
                .get_cloned::<Enemy>(death.dead)
                .map(|enemy| enemy.score_reward)
                .unwrap_or(0),
            Category::Boss => BOSS_SCORE,
            Category::BossPart => BOSS_PART_SCORE,
            _ => 0,
        };
        if reward > 0 {
            if let Some(scorer) = killer_player(reg, death.killer) {
                let mut players = reg.components_mut::<Player>()?;
                if let Some(player) = players.get_mut(scorer.index()) {
                    player.score += reward;
                }
            }
        }

        // A dead boss takes its parts with it.
        if death.category == Category::Boss {
            let parts = reg.components::<BossPart>()?;
            for (index, part) in parts.iter() {
                if part.owner == death.dead {
                    all_kills.insert(Entity::from_index(index));
                }
            }
        }
    }

    for entity in all_kills {
        if reg.is_valid(entity) {
            reg.kill(entity)?;
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
