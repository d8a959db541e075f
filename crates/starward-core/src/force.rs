//! Force satellite control and movement.
//!
//! The Force rides its owner (front or back), detaches on the charge
//! button's press edge, flies straight until its tether distance runs out,
//! and autofires while detached. Contact damage and projectile blocking
//! are resolved by the gameplay dispatch in [`crate::combat`].

use starward_ecs::prelude::{Entity, IndexedZipper, Registry};
use starward_net::message;

use crate::components::*;
use crate::config::ARENA_WIDTH;
use crate::events::SideEvent;
use crate::math::Vec2;
use crate::spawn::{self, ShotRequest};
use crate::CoreError;

const DETACHED_FIRE_INTERVAL: f32 = 2.0;
const FORCE_SHOT_SPEED: f32 = 350.0;
const FORCE_SHOT_DAMAGE: i32 = 12;

#[derive(Clone, Copy)]
struct OwnerRef {
    position: Vec2,
    alive: bool,
    fire: u8,
}

fn owner_refs(reg: &Registry) -> Result<std::collections::BTreeMap<usize, OwnerRef>, CoreError> {
    let mut refs = std::collections::BTreeMap::new();
    let transforms = reg.components::<Transform>()?;
    let players = reg.components::<Player>()?;
    let states = reg.components::<InputState>()?;
    for (index, (transform, player, state)) in
        IndexedZipper::new((transforms.view(), players.view(), states.view()))
    {
        refs.insert(
            index,
            OwnerRef {
                position: transform.position,
                alive: player.is_alive,
                fire: state.fire,
            },
        );
    }
    Ok(refs)
}

/// Detach/recall on the charge button's press edge, announcing state
/// changes to the clients.
pub fn control(reg: &Registry, outbox: &mut Vec<SideEvent>) -> Result<(), CoreError> {
    let owners = owner_refs(reg)?;
    let transforms = reg.components::<Transform>()?;
    let mut forces = reg.components_mut::<Force>()?;

    for (index, (transform, force)) in
        IndexedZipper::new((transforms.view(), forces.view_mut()))
    {
        let Some(owner) = owners.get(&force.owner_player.index()) else {
            continue;
        };
        let pressed = owner.fire == fire::CHARGE;
        if pressed && !force.toggle_latch {
            force.state = match force.state {
                ForceState::AttachedFront | ForceState::AttachedBack => ForceState::Detached,
                ForceState::Detached => ForceState::AttachedFront,
            };
            force.current_distance = 0.0;
            force.shoot_timer = 0.0;
            outbox.push(SideEvent::ForceState(message::ForceState {
                force_id: index as u16,
                owner_id: force.owner_player.raw() as u16,
                pos_x: transform.position.x,
                pos_y: transform.position.y,
                state: force.state as u8,
            }));
        }
        force.toggle_latch = pressed;
    }
    Ok(())
}

/// Position the Force and advance its clocks.
pub fn movement(reg: &mut Registry, dt: f32) -> Result<(), CoreError> {
    let owners = owner_refs(reg)?;
    let mut shots: Vec<ShotRequest> = Vec::new();

    {
        let mut transforms = reg.components_mut::<Transform>()?;
        let mut bodies = reg.components_mut::<RigidBody>()?;
        let mut forces = reg.components_mut::<Force>()?;

        for (index, (transform, body, force)) in IndexedZipper::new((
            transforms.view_mut(),
            bodies.view_mut(),
            forces.view_mut(),
        )) {
            if force.damage_timer > 0.0 {
                force.damage_timer -= dt;
            }
            let Some(owner) = owners.get(&force.owner_player.index()) else {
                continue;
            };
            if !owner.alive {
                body.velocity = Vec2::ZERO;
                continue;
            }

            match force.state {
                ForceState::AttachedFront => {
                    force.float_timer += dt;
                    let bob = (force.float_timer * 3.0).sin() * 15.0;
                    transform.position = owner.position + force.offset_front + Vec2::new(0.0, bob);
                    body.velocity = Vec2::ZERO;
                }
                ForceState::AttachedBack => {
                    transform.position = owner.position + force.offset_back;
                    body.velocity = Vec2::ZERO;
                }
                ForceState::Detached => {
                    body.velocity = force.direction * force.speed;
                    force.current_distance += force.speed * dt;
                    if force.current_distance >= force.max_distance
                        || transform.position.x >= ARENA_WIDTH - 50.0
                        || transform.position.x <= 50.0
                    {
                        body.velocity = Vec2::ZERO;
                    }

                    force.shoot_timer += dt;
                    if force.shoot_timer >= DETACHED_FIRE_INTERVAL {
                        shots.push(ShotRequest {
                            position: transform.position + Vec2::new(20.0, 0.0),
                            direction: Vec2::new(1.0, 0.0),
                            speed: FORCE_SHOT_SPEED,
                            damage: FORCE_SHOT_DAMAGE,
                            owner: Entity::from_index(index),
                            from_player: true,
                        });
                        force.shoot_timer = 0.0;
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
