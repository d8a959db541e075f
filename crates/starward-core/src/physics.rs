//! Physics integration, pairwise AABB collision, and arena bounds.

use starward_ecs::prelude::{Entity, IndexedZipper, Registry, Zipper};

use crate::components::*;
use crate::config::{ARENA_HEIGHT, ARENA_WIDTH, GRAVITY};
use crate::events::CollisionHit;
use crate::math::Vec2;
use crate::CoreError;

// ---------------------------------------------------------------------------
// Integration
// ---------------------------------------------------------------------------

/// `v += (a + g) * dt; p += v * dt; a := 0` for every non-static body.
///
/// Non-finite positions are clamped back to the arena center and logged
/// rather than allowed to propagate.
pub fn integrate(reg: &Registry, dt: f32) -> Result<(), CoreError> {
    let mut transforms = reg.components_mut::<Transform>()?;
    let mut bodies = reg.components_mut::<RigidBody>()?;

    for (index, (transform, body)) in
        IndexedZipper::new((transforms.view_mut(), bodies.view_mut()))
    {
        if body.is_static {
            continue;
        }
        body.velocity += (body.acceleration + GRAVITY) * dt;
        transform.position += body.velocity * dt;
        body.acceleration = Vec2::ZERO;

        if !transform.position.is_finite() || !body.velocity.is_finite() {
            tracing::error!(entity = index, "non-finite physics state, clamping");
            transform.position = Vec2::new(ARENA_WIDTH / 2.0, ARENA_HEIGHT / 2.0);
            body.velocity = Vec2::ZERO;
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Collision detection and response
// ---------------------------------------------------------------------------

/// Pairwise AABB sweep. Emits one [`CollisionHit`] per overlapping pair
/// (never the mirrored pair) and applies the physical response.
pub fn collide(reg: &Registry, hits: &mut Vec<CollisionHit>) -> Result<(), CoreError> {
    // Gather candidates once; entity count stays in the low hundreds.
    struct Candidate {
        entity: Entity,
        position: Vec2,
        collider: BoxCollider,
    }

    let candidates: Vec<Candidate> = {
        let transforms = reg.components::<Transform>()?;
        let colliders = reg.components::<BoxCollider>()?;
        IndexedZipper::new((transforms.view(), colliders.view()))
            .map(|(index, (transform, collider))| Candidate {
                entity: Entity::from_index(index),
                position: transform.position,
                collider: *collider,
            })
            .collect()
    };

    let mut responses: Vec<(Entity, Entity)> = Vec::new();
    for i in 0..candidates.len() {
        for j in (i + 1)..candidates.len() {
            let a = &candidates[i];
            let b = &candidates[j];

            if a.collider.layer & b.collider.mask == 0
                || b.collider.layer & a.collider.mask == 0
            {
                continue;
            }
            let bounds_a = a.collider.bounds(a.position);
            let bounds_b = b.collider.bounds(b.position);
            if !bounds_a.overlaps(&bounds_b) {
                continue;
            }

            hits.push(CollisionHit {
                a: a.entity,
                b: b.entity,
                point: (a.position + b.position) * 0.5,
                normal: (b.position - a.position).normalized(),
            });
            if !a.collider.is_trigger && !b.collider.is_trigger {
                responses.push((a.entity, b.entity));
            }
        }
    }

    // Physical response, outside the candidate borrow.
    let mut bodies = reg.components_mut::<RigidBody>()?;
    for (a, b) in responses {
        // Two lookups on one store; take the values, write them back.
        let Some(body_a) = bodies.get(a.index()).copied() else {
            continue;
        };
        let Some(body_b) = bodies.get(b.index()).copied() else {
            continue;
        };
        let restitution = body_a.restitution.min(body_b.restitution);

        if !body_a.is_static && !body_b.is_static {
            // Exchange velocities, scaled by the shared restitution.
            let (va, vb) = (body_a.velocity, body_b.velocity);
            if let Some(body) = bodies.get_mut(a.index()) {
                body.velocity = vb * restitution;
            }
            if let Some(body) = bodies.get_mut(b.index()) {
                body.velocity = va * restitution;
            }
        } else if body_a.is_static && !body_b.is_static {
            if let Some(body) = bodies.get_mut(b.index()) {
                body.velocity = -body.velocity * restitution;
            }
        } else if body_b.is_static && !body_a.is_static {
            if let Some(body) = bodies.get_mut(a.index()) {
                body.velocity = -body.velocity * restitution;
            }
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Arena bounds
// ---------------------------------------------------------------------------

/// Clamp players inside the arena, zeroing the offending velocity axis.
pub fn bounds_clamp(reg: &Registry) -> Result<(), CoreError> {
    let mut transforms = reg.components_mut::<Transform>()?;
    let mut bodies = reg.components_mut::<RigidBody>()?;
    let colliders = reg.components::<BoxCollider>()?;
    let players = reg.components::<Player>()?;

    for (transform, body, collider, _) in Zipper::new((
        transforms.view_mut(),
        bodies.view_mut(),
        colliders.view(),
        players.view(),
    )) {
        let half_w = collider.width / 2.0;
        let half_h = collider.height / 2.0;

        if transform.position.x - half_w < 0.0 {
            transform.position.x = half_w;
            body.velocity.x = 0.0;
        } else if transform.position.x + half_w > ARENA_WIDTH {
            transform.position.x = ARENA_WIDTH - half_w;
            body.velocity.x = 0.0;
        }
        if transform.position.y - half_h < 0.0 {
            transform.position.y = half_h;
            body.velocity.y = 0.0;
        } else if transform.position.y + half_h > ARENA_HEIGHT {
            transform.position.y = ARENA_HEIGHT - half_h;
            body.velocity.y = 0.0;
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
    use crate::spawn;

    fn world() -> Registry {
        let mut reg = Registry::new();
        spawn::register_components(&mut reg);
        reg
    }

    fn body_entity(
        reg: &mut Registry,
        pos: Vec2,
        vel: Vec2,
        is_static: bool,
        layer: u32,
        mask: u32,
    ) -> Entity {
        let e = reg.spawn();
        reg.add(e, Transform::at(pos)).unwrap();
        reg.add(
            e,
            RigidBody {
                velocity: vel,
                restitution: 0.5,
                is_static,
                ..Default::default()
            },
        )
        .unwrap();
        reg.add(e, BoxCollider::new(20.0, 20.0, layer, mask)).unwrap();
        e
    }

    #[test]
    fn integration_moves_and_clears_acceleration() {
        let mut reg = world();
        let e = body_entity(
            &mut reg,
            Vec2::ZERO,
            Vec2::new(60.0, 0.0),
            false,
            1,
            1,
        );
        {
            let mut bodies = reg.components_mut::<RigidBody>().unwrap();
            bodies.get_mut(e.index()).unwrap().acceleration = Vec2::new(0.0, 60.0);
        }

        integrate(&reg, 1.0).unwrap();

        let transform = reg.get_cloned::<Transform>(e).unwrap();
        let body = reg.get_cloned::<RigidBody>(e).unwrap();
        assert_eq!(transform.position, Vec2::new(60.0, 60.0));
        assert_eq!(body.velocity, Vec2::new(60.0, 60.0));
        assert_eq!(body.acceleration, Vec2::ZERO);
    }

    #[test]
    fn static_bodies_never_move() {
        let mut reg = world();
        let e = body_entity(&mut reg, Vec2::new(5.0, 5.0), Vec2::new(99.0, 0.0), true, 1, 1);
        integrate(&reg, 1.0).unwrap();
        assert_eq!(
            reg.get_cloned::<Transform>(e).unwrap().position,
            Vec2::new(5.0, 5.0)
        );
    }

    #[test]
    fn nan_position_is_clamped() {
        let mut reg = world();
        let e = body_entity(&mut reg, Vec2::ZERO, Vec2::new(f32::NAN, 0.0), false, 1, 1);
        integrate(&reg, 1.0 / 60.0).unwrap();
        let transform = reg.get_cloned::<Transform>(e).unwrap();
        assert!(transform.position.is_finite());
    }

    #[test]
    fn overlap_emits_single_event_per_pair() {
        let mut reg = world();
        let a = body_entity(&mut reg, Vec2::new(0.0, 0.0), Vec2::ZERO, false, 1, 0xFF);
        let b = body_entity(&mut reg, Vec2::new(10.0, 0.0), Vec2::ZERO, false, 1, 0xFF);

        let mut hits = Vec::new();
        collide(&reg, &mut hits).unwrap();

        assert_eq!(hits.len(), 1, "collision symmetry: one event per pair");
        assert_eq!((hits[0].a, hits[0].b), (a, b));
        assert_eq!(hits[0].point, Vec2::new(5.0, 0.0));
        assert_eq!(hits[0].normal, Vec2::new(1.0, 0.0));
    }

    #[test]
    fn layer_mask_gates_collision() {
        let mut reg = world();
        // Same spot, but mutually invisible layers.
        body_entity(&mut reg, Vec2::ZERO, Vec2::ZERO, false, 0b01, 0b10);
        body_entity(&mut reg, Vec2::ZERO, Vec2::ZERO, false, 0b01, 0b10);

        let mut hits = Vec::new();
        collide(&reg, &mut hits).unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn dynamic_pair_exchanges_velocity() {
        let mut reg = world();
        let a = body_entity(&mut reg, Vec2::ZERO, Vec2::new(10.0, 0.0), false, 1, 0xFF);
        let b = body_entity(
            &mut reg,
            Vec2::new(5.0, 0.0),
            Vec2::new(-10.0, 0.0),
            false,
            1,
            0xFF,
        );

        let mut hits = Vec::new();
        collide(&reg, &mut hits).unwrap();

        let va = reg.get_cloned::<RigidBody>(a).unwrap().velocity;
        let vb = reg.get_cloned::<RigidBody>(b).unwrap().velocity;
        assert_eq!(va, Vec2::new(-5.0, 0.0));
        assert_eq!(vb, Vec2::new(5.0, 0.0));
    }

    #[test]
    fn dynamic_bounces_off_static() {
        let mut reg = world();
        let wall = body_entity(&mut reg, Vec2::ZERO, Vec2::ZERO, true, 1, 0xFF);
        let ball = body_entity(
            &mut reg,
            Vec2::new(5.0, 0.0),
            Vec2::new(-8.0, 0.0),
            false,
            1,
            0xFF,
        );

        let mut hits = Vec::new();
        collide(&reg, &mut hits).unwrap();

        assert_eq!(
            reg.get_cloned::<RigidBody>(ball).unwrap().velocity,
            Vec2::new(4.0, 0.0)
        );
        assert_eq!(
            reg.get_cloned::<RigidBody>(wall).unwrap().velocity,
            Vec2::ZERO
        );
    }

    #[test]
    fn triggers_emit_events_without_response() {
        let mut reg = world();
        let a = body_entity(&mut reg, Vec2::ZERO, Vec2::new(3.0, 0.0), false, 1, 0xFF);
        let b = body_entity(&mut reg, Vec2::new(5.0, 0.0), Vec2::ZERO, false, 1, 0xFF);
        {
            let mut colliders = reg.components_mut::<BoxCollider>().unwrap();
            colliders.get_mut(b.index()).unwrap().is_trigger = true;
        }

        let mut hits = Vec::new();
        collide(&reg, &mut hits).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(
            reg.get_cloned::<RigidBody>(a).unwrap().velocity,
            Vec2::new(3.0, 0.0),
            "trigger contact leaves velocity untouched"
        );
    }

    #[test]
    fn players_clamp_to_arena_and_zero_velocity() {
        let mut reg = world();
        let (player, _) = spawn::spawn_player(&mut reg, 1, Vec2::new(-10.0, 700.0)).unwrap();
        {
            let mut bodies = reg.components_mut::<RigidBody>().unwrap();
            bodies.get_mut(player.index()).unwrap().velocity = Vec2::new(-50.0, 80.0);
        }

        bounds_clamp(&reg).unwrap();

        let transform = reg.get_cloned::<Transform>(player).unwrap();
        let body = reg.get_cloned::<RigidBody>(player).unwrap();
        assert_eq!(transform.position.x, 16.0);
        assert_eq!(transform.position.y, ARENA_HEIGHT - 16.0);
        assert_eq!(body.velocity, Vec2::ZERO);
    }
}
