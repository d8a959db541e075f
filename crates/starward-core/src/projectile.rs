//! Projectile lifetime and offscreen culling.

use starward_ecs::prelude::{Entity, IndexedZipper, Registry};

use crate::components::{Projectile, Transform};
use crate::config::{ARENA_HEIGHT, ARENA_WIDTH, OFFSCREEN_MARGIN};
use crate::CoreError;

/// Age projectiles and kill the expired or out-of-arena ones.
pub fn lifetime(reg: &mut Registry, dt: f32) -> Result<(), CoreError> {
    let mut doomed: Vec<Entity> = Vec::new();
    {
        let transforms = reg.components::<Transform>()?;
        let mut projectiles = reg.components_mut::<Projectile>()?;

        for (index, (transform, projectile)) in
            IndexedZipper::new((transforms.view(), projectiles.view_mut()))
        {
            if !projectile.is_active {
                continue;
            }
            projectile.current_life += dt;

            let pos = transform.position;
            let expired = projectile.current_life >= projectile.lifetime_cap;
            let offscreen = pos.x < -OFFSCREEN_MARGIN
                || pos.x > ARENA_WIDTH + OFFSCREEN_MARGIN
                || pos.y < -OFFSCREEN_MARGIN
                || pos.y > ARENA_HEIGHT + OFFSCREEN_MARGIN;
            if expired || offscreen {
                projectile.is_active = false;
                doomed.push(Entity::from_index(index));
            }
        }
    }

    for entity in doomed {
        reg.kill(entity)?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
