//! Scrolling tilemap: storage, deterministic generation, and the
//! axis-separated push-out collision for players and enemies.

use rand::Rng;
use rand_pcg::Pcg32;
use starward_ecs::prelude::{Registry, Zipper};

use crate::components::{BoxCollider, Enemy, Player, RigidBody, Transform};
use crate::CoreError;

// ---------------------------------------------------------------------------
// Tiles
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[repr(u8)]
pub enum TileType {
    Empty = 0,
    Ground = 1,
    Wall = 2,
    Ceiling = 3,
    Platform = 4,
}

impl From<u8> for TileType {
    fn from(byte: u8) -> Self {
        match byte {
            1 => TileType::Ground,
            2 => TileType::Wall,
            3 => TileType::Ceiling,
            4 => TileType::Platform,
            _ => TileType::Empty,
        }
    }
}

/// The scrolling level geometry, stored row-major.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TileMap {
    pub width: u16,
    pub height: u16,
    pub tile_size: u16,
    pub scroll_speed: f32,
    pub scroll_offset: f32,
    pub tiles: Vec<u8>,
}

impl TileMap {
    pub fn new(width: u16, height: u16, tile_size: u16) -> Self {
        Self {
            width,
            height,
            tile_size,
            scroll_speed: 50.0,
            scroll_offset: 0.0,
            tiles: vec![TileType::Empty as u8; width as usize * height as usize],
        }
    }

    pub fn get(&self, x: i32, y: i32) -> TileType {
        if x < 0 || x >= self.width as i32 || y < 0 || y >= self.height as i32 {
            return TileType::Empty;
        }
        TileType::from(self.tiles[y as usize * self.width as usize + x as usize])
    }

    pub fn set(&mut self, x: i32, y: i32, tile: TileType) {
        if x >= 0 && x < self.width as i32 && y >= 0 && y < self.height as i32 {
            self.tiles[y as usize * self.width as usize + x as usize] = tile as u8;
        }
    }

    pub fn is_solid(&self, x: i32, y: i32) -> bool {
        !matches!(self.get(x, y), TileType::Empty)
    }

    /// Solidity test in world pixels, accounting for the scroll offset.
    pub fn is_solid_at_pixel(&self, pixel_x: f32, pixel_y: f32) -> bool {
        let tile_x = ((pixel_x + self.scroll_offset) / self.tile_size as f32) as i32;
        let tile_y = (pixel_y / self.tile_size as f32) as i32;
        self.is_solid(tile_x, tile_y)
    }

    /// Pixel row of the top edge of the tile containing `pixel_y`.
    fn tile_top(&self, pixel_y: f32) -> f32 {
        let tile_y = (pixel_y / self.tile_size as f32) as i32;
        (tile_y * self.tile_size as i32) as f32
    }

    fn tile_bottom(&self, pixel_y: f32) -> f32 {
        self.tile_top(pixel_y) + self.tile_size as f32
    }

    fn tile_left(&self, pixel_x: f32) -> f32 {
        let tile_x = ((pixel_x + self.scroll_offset) / self.tile_size as f32) as i32;
        (tile_x * self.tile_size as i32) as f32 - self.scroll_offset
    }

    fn tile_right(&self, pixel_x: f32) -> f32 {
        self.tile_left(pixel_x) + self.tile_size as f32
    }
}

// ---------------------------------------------------------------------------
// Generation
// ---------------------------------------------------------------------------

/// Deterministic level geometry from the match RNG. Both the server and a
/// client with the same seed produce identical maps.
pub fn generate_level(level_index: usize, rng: &mut Pcg32) -> TileMap {
    const TILE_SIZE: u16 = 32;
    const SCREENS: u16 = 8;
    let tiles_per_screen = (crate::config::ARENA_WIDTH as u16) / TILE_SIZE;
    let width = tiles_per_screen * SCREENS;
    let height = (crate::config::ARENA_HEIGHT as u16) / TILE_SIZE;

    let mut map = TileMap::new(width, height, TILE_SIZE);
    map.scroll_speed = 50.0 + level_index as f32 * 10.0;

    // Ground: the two bottom rows.
    let ground_y = height as i32 - 2;
    for x in 0..width as i32 {
        map.set(x, ground_y, TileType::Ground);
        map.set(x, ground_y + 1, TileType::Ground);
    }

    if level_index >= 1 {
        // Holes in the floor.
        let holes = 3 + level_index * 2;
        for _ in 0..holes {
            let hole_x = rng.gen_range(30..width as i32 - 30);
            let hole_width = rng.gen_range(2..5);
            for dx in 0..hole_width {
                map.set(hole_x + dx, ground_y, TileType::Empty);
                map.set(hole_x + dx, ground_y + 1, TileType::Empty);
            }
        }

        // Ceiling row.
        for x in 0..width as i32 {
            map.set(x, 0, TileType::Ceiling);
        }

        // Wall obstacles.
        let obstacles = 2 + level_index * 3;
        for _ in 0..obstacles {
            let obs_x = rng.gen_range(40..width as i32 - 40);
            let obs_y = rng.gen_range(4..height as i32 - 8);
            let obs_w = rng.gen_range(1..3);
            let obs_h = rng.gen_range(2..5);
            for dx in 0..obs_w {
                for dy in 0..obs_h {
                    map.set(obs_x + dx, obs_y + dy, TileType::Wall);
                }
            }
        }
    }

    map
}

// ---------------------------------------------------------------------------
// Systems
// ---------------------------------------------------------------------------

/// Advance the scroll offset.
pub fn scroll(reg: &Registry, dt: f32) -> Result<(), CoreError> {
    let mut maps = reg.components_mut::<TileMap>()?;
    for (map,) in Zipper::new((maps.view_mut(),)) {
        map.scroll_offset += map.scroll_speed * dt;
    }
    Ok(())
}

fn active_map(reg: &Registry) -> Result<Option<TileMap>, CoreError> {
    let maps = reg.components::<TileMap>()?;
    let result = maps.iter().next().map(|(_, map)| map.clone());
    Ok(result)
}

/// Push an AABB at `position` out of solid tiles, one axis at a time.
/// Returns the corrected position plus which axes collided.
fn push_out(
    map: &TileMap,
    mut x: f32,
    mut y: f32,
    half_w: f32,
    half_h: f32,
) -> (f32, f32, bool, bool) {
    let mut hit_x = false;
    let mut hit_y = false;

    // Floor.
    if map.is_solid_at_pixel(x, y + half_h) {
        y = map.tile_top(y + half_h) - half_h;
        hit_y = true;
    }
    // Ceiling.
    if map.is_solid_at_pixel(x, y - half_h) {
        y = map.tile_bottom(y - half_h) + half_h;
        hit_y = true;
    }
    // Left wall.
    if map.is_solid_at_pixel(x - half_w, y) {
        x = map.tile_right(x - half_w) + half_w;
        hit_x = true;
    }
    // Right wall.
    if map.is_solid_at_pixel(x + half_w, y) {
        x = map.tile_left(x + half_w) - half_w;
        hit_x = true;
    }

    (x, y, hit_x, hit_y)
}

/// Push players out of solid tiles.
pub fn collide_players(reg: &Registry) -> Result<(), CoreError> {
    let Some(map) = active_map(reg)? else {
        return Ok(());
    };
    let mut transforms = reg.components_mut::<Transform>()?;
    let mut bodies = reg.components_mut::<RigidBody>()?;
    let colliders = reg.components::<BoxCollider>()?;
    let players = reg.components::<Player>()?;

    for (transform, body, collider, player) in Zipper::new((
        transforms.view_mut(),
        bodies.view_mut(),
        colliders.view(),
        players.view(),
    )) {
        if !player.is_alive {
            continue;
        }
        let (x, y, hit_x, hit_y) = push_out(
            &map,
            transform.position.x,
            transform.position.y,
            collider.width / 2.0,
            collider.height / 2.0,
        );
        transform.position.x = x;
        transform.position.y = y;
        if hit_x {
            body.velocity.x = 0.0;
        }
        if hit_y {
            body.velocity.y = 0.0;
        }
    }
    Ok(())
}

/// Push enemies out of solid tiles and stop their motion on the hit axis.
pub fn collide_enemies(reg: &Registry) -> Result<(), CoreError> {
    let Some(map) = active_map(reg)? else {
        return Ok(());
    };
    let mut transforms = reg.components_mut::<Transform>()?;
    let mut enemies = reg.components_mut::<Enemy>()?;
    let colliders = reg.components::<BoxCollider>()?;

    for (transform, enemy, collider) in Zipper::new((
        transforms.view_mut(),
        enemies.view_mut(),
        colliders.view(),
    )) {
        let (x, y, hit_x, hit_y) = push_out(
            &map,
            transform.position.x,
            transform.position.y,
            collider.width / 2.0,
            collider.height / 2.0,
        );
        transform.position.x = x;
        transform.position.y = y;
        if hit_x {
            enemy.direction.x = 0.0;
        }
        if hit_y {
            enemy.direction.y = 0.0;
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
    use rand::SeedableRng;

    #[test]
    fn out_of_range_tiles_are_empty() {
        let map = TileMap::new(10, 10, 32);
        assert_eq!(map.get(-1, 0), TileType::Empty);
        assert_eq!(map.get(0, 100), TileType::Empty);
    }

    #[test]
    fn set_get_round_trip() {
        let mut map = TileMap::new(10, 10, 32);
        map.set(3, 4, TileType::Wall);
        assert_eq!(map.get(3, 4), TileType::Wall);
        assert!(map.is_solid(3, 4));
        assert!(!map.is_solid(3, 5));
    }

    #[test]
    fn scroll_offset_shifts_pixel_lookup() {
        let mut map = TileMap::new(10, 10, 32);
        map.set(5, 0, TileType::Wall);
        assert!(!map.is_solid_at_pixel(100.0, 10.0));
        map.scroll_offset = 64.0;
        // 100 + 64 = 164 -> tile 5.
        assert!(map.is_solid_at_pixel(100.0, 10.0));
    }

    #[test]
    fn generation_is_deterministic_per_seed() {
        let mut rng_a = Pcg32::seed_from_u64(99);
        let mut rng_b = Pcg32::seed_from_u64(99);
        assert_eq!(generate_level(2, &mut rng_a), generate_level(2, &mut rng_b));

        let mut rng_c = Pcg32::seed_from_u64(100);
        assert_ne!(generate_level(2, &mut rng_a), generate_level(2, &mut rng_c));
    }

    #[test]
    fn level_zero_has_solid_floor() {
        let mut rng = Pcg32::seed_from_u64(1);
        let map = generate_level(0, &mut rng);
        for x in 0..map.width as i32 {
            assert!(map.is_solid(x, map.height as i32 - 1));
            assert!(map.is_solid(x, map.height as i32 - 2));
        }
        assert_eq!(map.scroll_speed, 50.0);
    }

    #[test]
    fn player_is_pushed_above_the_floor() {
        let mut reg = Registry::new();
        spawn::register_components(&mut reg);
        let mut rng = Pcg32::seed_from_u64(1);
        let map = generate_level(0, &mut rng);
        let floor_top = (map.height as f32 - 2.0) * map.tile_size as f32;

        let map_entity = reg.spawn();
        reg.add(map_entity, map).unwrap();

        // Sunk into the ground.
        let (player, _) =
            spawn::spawn_player(&mut reg, 1, Vec2::new(100.0, floor_top + 5.0)).unwrap();
        {
            let mut bodies = reg.components_mut::<RigidBody>().unwrap();
            bodies.get_mut(player.index()).unwrap().velocity = Vec2::new(0.0, 120.0);
        }

        collide_players(&reg).unwrap();

        let pos = reg.get_cloned::<Transform>(player).unwrap().position;
        assert_eq!(pos.y, floor_top - 16.0, "pushed flush onto the floor");
        assert_eq!(
            reg.get_cloned::<RigidBody>(player).unwrap().velocity.y,
            0.0
        );
    }

    #[test]
    fn scroll_system_advances_offset() {
        let mut reg = Registry::new();
        spawn::register_components(&mut reg);
        let entity = reg.spawn();
        let mut map = TileMap::new(10, 10, 32);
        map.scroll_speed = 60.0;
        reg.add(entity, map).unwrap();

        scroll(&reg, 0.5).unwrap();
        let map = reg.get_cloned::<TileMap>(entity).unwrap();
        assert_eq!(map.scroll_offset, 30.0);
    }
}
