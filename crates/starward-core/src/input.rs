//! Input application and player steering.

use starward_ecs::prelude::{Registry, Zipper};
use starward_net::message;

use crate::components::{InputState, Player, RigidBody};
use crate::CoreError;

/// Copy the latest wire input onto the matching player entity. At most one
/// input per player is applied per tick; the caller keeps only the newest.
pub fn apply_queued_inputs(
    reg: &Registry,
    inputs: &std::collections::BTreeMap<u16, message::PlayerInput>,
) -> Result<(), CoreError> {
    let players = reg.components::<Player>()?;
    let mut states = reg.components_mut::<InputState>()?;
    for (player, state) in Zipper::new((players.view(), states.view_mut())) {
        if let Some(input) = inputs.get(&player.player_id) {
            *state = InputState {
                left: input.left,
                right: input.right,
                up: input.up,
                down: input.down,
                fire: input.fire,
            };
        }
    }
    Ok(())
}

/// Zero the velocity, then set each axis from the held directions. Dead
/// players drift to a stop.
pub fn player_movement(reg: &Registry, dt: f32) -> Result<(), CoreError> {
    let states = reg.components::<InputState>()?;
    let mut bodies = reg.components_mut::<RigidBody>()?;
    let mut players = reg.components_mut::<Player>()?;

    for (state, body, player) in
        Zipper::new((states.view(), bodies.view_mut(), players.view_mut()))
    {
        if player.invincibility_timer > 0.0 {
            player.invincibility_timer -= dt;
        }

        body.velocity = crate::math::Vec2::ZERO;
        if !player.is_alive {
            continue;
        }
        if state.left {
            body.velocity.x = -player.speed;
        }
        if state.right {
            body.velocity.x = player.speed;
        }
        if state.up {
            body.velocity.y = -player.speed;
        }
        if state.down {
            body.velocity.y = player.speed;
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Vec2;
    use crate::spawn;

    fn world_with_player() -> (Registry, starward_ecs::prelude::Entity) {
        let mut reg = Registry::new();
        spawn::register_components(&mut reg);
        let (player, _) = spawn::spawn_player(&mut reg, 1, Vec2::new(200.0, 300.0)).unwrap();
        (reg, player)
    }

    #[test]
    fn input_reaches_component() {
        let (reg, player) = world_with_player();
        let mut inputs = std::collections::BTreeMap::new();
        inputs.insert(
            1u16,
            message::PlayerInput {
                up: true,
                fire: 1,
                ..Default::default()
            },
        );

        apply_queued_inputs(&reg, &inputs).unwrap();
        let state = reg.get_cloned::<InputState>(player).unwrap();
        assert!(state.up);
        assert_eq!(state.fire, 1);
    }

    #[test]
    fn movement_sets_axes_from_speed() {
        let (reg, player) = world_with_player();
        reg.add(
            player,
            InputState {
                right: true,
                down: true,
                ..Default::default()
            },
        )
        .unwrap();

        player_movement(&reg, 1.0 / 60.0).unwrap();
        let body = reg.get_cloned::<RigidBody>(player).unwrap();
        assert_eq!(body.velocity, Vec2::new(200.0, 200.0));
    }

    #[test]
    fn opposite_keys_favor_the_second_axis_write() {
        let (reg, player) = world_with_player();
        reg.add(
            player,
            InputState {
                left: true,
                right: true,
                ..Default::default()
            },
        )
        .unwrap();

        player_movement(&reg, 1.0 / 60.0).unwrap();
        let body = reg.get_cloned::<RigidBody>(player).unwrap();
        assert_eq!(body.velocity.x, 200.0);
    }

    #[test]
    fn dead_player_does_not_move() {
        let (reg, player) = world_with_player();
        {
            let mut players = reg.components_mut::<Player>().unwrap();
            players.get_mut(player.index()).unwrap().is_alive = false;
        }
        reg.add(
            player,
            InputState {
                up: true,
                ..Default::default()
            },
        )
        .unwrap();

        player_movement(&reg, 1.0 / 60.0).unwrap();
        let body = reg.get_cloned::<RigidBody>(player).unwrap();
        assert_eq!(body.velocity, Vec2::ZERO);
    }
}
