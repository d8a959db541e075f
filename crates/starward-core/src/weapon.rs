//! Weapon cooldown, reload, firing, and the charged shot.

use starward_ecs::prelude::{Entity, IndexedZipper, Registry};

use crate::components::*;
use crate::math::Vec2;
use crate::spawn::{self, ShotRequest};
use crate::CoreError;

/// Muzzle offset in front of the firing ship.
const MUZZLE_OFFSET: Vec2 = Vec2::new(40.0, 0.0);
/// Full charge is reached after this many seconds.
const MAX_CHARGE_TIME: f32 = 1.5;
/// Seconds of charge per discrete charge level.
const CHARGE_LEVEL_TIME: f32 = 0.5;

pub fn needs_reload(weapon: &Weapon) -> bool {
    weapon.reload_remaining >= 0.0
}

pub fn can_fire(weapon: &Weapon) -> bool {
    weapon.time_since_last_shot >= 1.0 / weapon.fire_rate
        && (weapon.magazine_size == -1 || weapon.current_ammo > 0)
        && !needs_reload(weapon)
}

fn consume_ammo(weapon: &mut Weapon) {
    if weapon.magazine_size != -1 && weapon.current_ammo > 0 {
        weapon.current_ammo -= 1;
        // Reload starts the moment a shot empties the magazine.
        if weapon.current_ammo == 0 {
            weapon.reload_remaining = weapon.reload_time;
        }
    }
}

/// Discrete charge level for a held charge time.
pub fn charge_level(charge_time: f32) -> i32 {
    ((charge_time / CHARGE_LEVEL_TIME) as i32).min(3)
}

// ---------------------------------------------------------------------------
// Per-tick update
// ---------------------------------------------------------------------------

/// Advance cooldowns, reloads and burst clocks on every weapon.
pub fn tick_weapons(reg: &Registry, dt: f32) -> Result<(), CoreError> {
    let mut weapons = reg.components_mut::<Weapon>()?;
    for (_, (weapon,)) in IndexedZipper::new((weapons.view_mut(),)) {
        weapon.time_since_last_shot += dt;
        if needs_reload(weapon) {
            weapon.reload_remaining -= dt;
            if weapon.reload_remaining <= 0.0 {
                weapon.current_ammo = weapon.magazine_size;
                weapon.reload_remaining = -1.0;
            }
        }
        if weapon.burst_remaining > 0 {
            weapon.burst_timer -= dt;
        }
    }
    Ok(())
}

/// Player trigger handling: normal fire, burst continuation, and the
/// charged shot driven by `fire == 2`.
pub fn player_fire(reg: &mut Registry, dt: f32) -> Result<(), CoreError> {
    let mut shots: Vec<ShotRequest> = Vec::new();

    {
        let transforms = reg.components::<Transform>()?;
        let states = reg.components::<InputState>()?;
        let mut players = reg.components_mut::<Player>()?;
        let mut weapons = reg.components_mut::<Weapon>()?;

        for (index, (transform, state, player, weapon)) in IndexedZipper::new((
            transforms.view(),
            states.view(),
            players.view_mut(),
            weapons.view_mut(),
        )) {
            if !player.is_alive {
                player.is_charging = false;
                player.charge_time = 0.0;
                continue;
            }
            let entity = Entity::from_index(index);
            let muzzle = transform.position + MUZZLE_OFFSET;

            // Burst continuation runs regardless of the trigger.
            if weapon.burst_remaining > 0 && weapon.burst_timer <= 0.0 {
                shots.push(ShotRequest {
                    position: muzzle,
                    direction: Vec2::new(1.0, 0.0),
                    speed: weapon.projectile_speed,
                    damage: weapon.projectile_damage,
                    owner: entity,
                    from_player: true,
                });
                weapon.burst_remaining -= 1;
                weapon.burst_timer = weapon.burst_interval;
                consume_ammo(weapon);
            }

            match state.fire {
                fire::NORMAL => {
                    if can_fire(weapon) {
                        if weapon.is_burst {
                            weapon.burst_remaining = weapon.burst_count;
                            weapon.burst_timer = 0.0;
                        } else {
                            shots.push(ShotRequest {
                                position: muzzle,
                                direction: Vec2::new(1.0, 0.0),
                                speed: weapon.projectile_speed,
                                damage: weapon.projectile_damage,
                                owner: entity,
                                from_player: true,
                            });
                            consume_ammo(weapon);
                        }
                        weapon.time_since_last_shot = 0.0;
                    }
                }
                fire::CHARGE => {
                    if !player.is_charging {
                        player.is_charging = true;
                        player.charge_time = 0.0;
                    }
                    player.charge_time = (player.charge_time + dt).min(MAX_CHARGE_TIME);
                }
                _ => {
                    if player.is_charging {
                        // Release: one scaled projectile.
                        let level = charge_level(player.charge_time);
                        if level > 0 || player.charge_time >= 0.1 {
                            shots.push(ShotRequest {
                                position: muzzle,
                                direction: Vec2::new(1.0, 0.0),
                                speed: 400.0 + level as f32 * 100.0,
                                damage: 10 + level * 5,
                                owner: entity,
                                from_player: true,
                            });
                            weapon.time_since_last_shot = 0.0;
                        }
                        player.is_charging = false;
                        player.charge_time = 0.0;
                    }
                }
            }
        }
    }

    spawn::apply_shots(reg, &shots)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
