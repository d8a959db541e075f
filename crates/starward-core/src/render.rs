//! Renderer-facing adapters.
//!
//! The core never calls into SDL; it only fills a per-tick drawable list
//! ordered by layer, and translates the frontend's raw button tuple into
//! the [`InputState`] component.

use starward_ecs::prelude::{Registry, Zipper};

use crate::components::*;
use crate::CoreError;

/// Integer pixel rectangle, renderer-agnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

/// One sprite to draw. The renderer resolves `texture_key` to its loaded
/// asset; `layer` orders back-to-front.
#[derive(Debug, Clone, PartialEq)]
pub struct Drawable {
    pub texture_key: &'static str,
    pub src: Rect,
    pub dest: Rect,
    pub rotation: f32,
    pub layer: i32,
}

fn sprite(texture_key: &'static str, position: crate::math::Vec2, size: i32, layer: i32) -> Drawable {
    Drawable {
        texture_key,
        src: Rect {
            x: 0,
            y: 0,
            w: size,
            h: size,
        },
        dest: Rect {
            x: (position.x - size as f32 / 2.0) as i32,
            y: (position.y - size as f32 / 2.0) as i32,
            w: size,
            h: size,
        },
        rotation: 0.0,
        layer,
    }
}

/// Build the drawable list for the current world, ordered by ascending
/// layer.
pub fn build_drawables(reg: &Registry) -> Result<Vec<Drawable>, CoreError> {
    let mut drawables = Vec::new();
    let transforms = reg.components::<Transform>()?;

    {
        let players = reg.components::<Player>()?;
        for (transform, player) in Zipper::new((transforms.view(), players.view())) {
            if player.is_alive {
                drawables.push(sprite("ship", transform.position, 32, 2));
            }
        }
    }
    {
        let enemies = reg.components::<Enemy>()?;
        for (transform, enemy) in Zipper::new((transforms.view(), enemies.view())) {
            let texture_key = match enemy.kind {
                EnemyKind::Basic => "enemy_basic",
                EnemyKind::Zigzag => "enemy_zigzag",
                EnemyKind::Chase => "enemy_chase",
                EnemyKind::MiniGreen => "enemy_mini",
                EnemyKind::Spinner => "enemy_spinner",
            };
            drawables.push(sprite(texture_key, transform.position, 32, 2));
        }
    }
    {
        let bosses = reg.components::<Boss>()?;
        for (transform, _) in Zipper::new((transforms.view(), bosses.view())) {
            drawables.push(sprite("boss", transform.position, 128, 3));
        }
        let parts = reg.components::<BossPart>()?;
        for (transform, part) in Zipper::new((transforms.view(), parts.view())) {
            if part.alive {
                drawables.push(sprite("boss_part", transform.position, 40, 3));
            }
        }
    }
    {
        let projectiles = reg.components::<Projectile>()?;
        for (transform, projectile) in Zipper::new((transforms.view(), projectiles.view())) {
            if projectile.is_active {
                drawables.push(sprite("projectile", transform.position, 10, 1));
            }
        }
        let forces = reg.components::<Force>()?;
        for (transform, _) in Zipper::new((transforms.view(), forces.view())) {
            drawables.push(sprite("force", transform.position, 24, 2));
        }
    }

    drawables.sort_by_key(|drawable| drawable.layer);
    Ok(drawables)
}

// ---------------------------------------------------------------------------
// Input pull interface
// ---------------------------------------------------------------------------

/// The frontend's per-frame button sample.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InputSample {
    pub left: bool,
    pub right: bool,
    pub up: bool,
    pub down: bool,
    /// Primary fire.
    pub action1: bool,
    /// Charge / Force toggle.
    pub action2: bool,
    /// Unbound, reserved.
    pub action3: bool,
}

/// Translate a raw button sample into the wire/component input state.
/// Charge wins over normal fire while both are held.
pub fn translate_input(sample: InputSample) -> InputState {
    InputState {
        left: sample.left,
        right: sample.right,
        up: sample.up,
        down: sample.down,
        fire: if sample.action2 {
            fire::CHARGE
        } else if sample.action1 {
            fire::NORMAL
        } else {
            fire::NONE
        },
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Vec2;
    use crate::spawn;

    #[test]
    fn drawables_are_layer_ordered() {
        let mut reg = Registry::new();
        spawn::register_components(&mut reg);
        let (player, _) = spawn::spawn_player(&mut reg, 1, Vec2::new(200.0, 300.0)).unwrap();
        spawn::spawn_enemy(&mut reg, EnemyKind::Basic, Vec2::new(700.0, 300.0)).unwrap();
        spawn::spawn_projectile(
            &mut reg,
            Vec2::new(240.0, 300.0),
            Vec2::new(1.0, 0.0),
            500.0,
            10,
            player,
            true,
        )
        .unwrap();
        spawn::spawn_boss(&mut reg, BossKind::BigShip, Vec2::new(700.0, 300.0), 300).unwrap();

        let drawables = build_drawables(&reg).unwrap();
        assert!(drawables.len() >= 4);
        for pair in drawables.windows(2) {
            assert!(pair[0].layer <= pair[1].layer);
        }
        assert_eq!(drawables[0].texture_key, "projectile");
    }

    #[test]
    fn dead_player_is_not_drawn() {
        let mut reg = Registry::new();
        spawn::register_components(&mut reg);
        let (player, _) = spawn::spawn_player(&mut reg, 1, Vec2::new(200.0, 300.0)).unwrap();
        reg.components_mut::<Player>()
            .unwrap()
            .get_mut(player.index())
            .unwrap()
            .is_alive = false;

        let drawables = build_drawables(&reg).unwrap();
        assert!(drawables.iter().all(|d| d.texture_key != "ship"));
    }

    #[test]
    fn charge_button_overrides_fire() {
        let state = translate_input(InputSample {
            action1: true,
            action2: true,
            ..Default::default()
        });
        assert_eq!(state.fire, fire::CHARGE);

        let state = translate_input(InputSample {
            action1: true,
            ..Default::default()
        });
        assert_eq!(state.fire, fire::NORMAL);

        let state = translate_input(InputSample::default());
        assert_eq!(state.fire, fire::NONE);
    }
}
