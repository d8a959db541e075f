//! The fixed-timestep simulation kernel.
//!
//! One [`Kernel`] owns one match: the registry, the seeded RNG, the level
//! progression, and the per-tick pipeline. Systems run in a fixed order;
//! each is wrapped in a log-and-skip boundary so a failing system costs a
//! tick of its own work, never the process.
//!
//! # Determinism
//!
//! Given the same seed and the same sequence of queued inputs, two kernels
//! produce identical worlds: all randomness flows through the per-match
//! `Pcg32`, iteration orders are index-ascending, and the only clock is
//! the fixed `dt`.

use std::collections::BTreeMap;

use rand::SeedableRng;
use rand_pcg::Pcg32;
use starward_ecs::prelude::{Entity, Registry};
use starward_net::message::{self, ScoreEntry};

use crate::components::*;
use crate::config::{FIXED_DT, LEVEL_GAP_SECONDS, PLAYER_SPAWN};
use crate::events::{CollisionHit, Death, SideEvent};
use crate::snapshot::{self, WorldView};
use crate::{ai, combat, force, input, level, physics, projectile, spawn, tilemap, weapon};
use crate::CoreError;

/// Output of one tick: the events to fan out to clients.
#[derive(Debug, Default)]
pub struct TickOutput {
    pub events: Vec<SideEvent>,
}

pub struct Kernel {
    registry: Registry,
    rng: Pcg32,
    tick: u64,
    difficulty: u8,
    levels: Vec<Vec<Wave>>,
    level_index: usize,
    level_entity: Entity,
    tilemap_entity: Entity,
    level_gap_timer: f32,
    game_over: bool,
    pending_inputs: BTreeMap<u16, message::PlayerInput>,
    players: BTreeMap<u16, Entity>,
    /// Final scores of players who disconnected mid-match; their slot in
    /// the end-of-match ranking survives until the match ends.
    departed: BTreeMap<u16, u32>,
}

impl Kernel {
    /// Build a fresh match from a seed and difficulty, with level 0 loaded.
    pub fn new(seed: u64, difficulty: u8) -> Self {
        let mut registry = Registry::new();
        spawn::register_components(&mut registry);
        let mut rng = Pcg32::seed_from_u64(seed);

        let levels = level::authored_levels();
        let level_entity = registry.spawn();
        registry
            .add(level_entity, LevelPlan::new(levels[0].clone(), 0))
            .expect("level plan registered");

        let tilemap_entity = registry.spawn();
        registry
            .add(tilemap_entity, tilemap::generate_level(0, &mut rng))
            .expect("tilemap registered");

        Self {
            registry,
            rng,
            tick: 0,
            difficulty,
            levels,
            level_index: 0,
            level_entity,
            tilemap_entity,
            level_gap_timer: 0.0,
            game_over: false,
            pending_inputs: BTreeMap::new(),
            players: BTreeMap::new(),
            departed: BTreeMap::new(),
        }
    }

    // -- player lifecycle ---------------------------------------------------

    /// Spawn a player (and their Force) into the match.
    pub fn add_player(&mut self, player_id: u16) -> Result<Entity, CoreError> {
        let (entity, _force) = spawn::spawn_player(&mut self.registry, player_id, PLAYER_SPAWN)?;
        self.players.insert(player_id, entity);
        tracing::info!(player_id, %entity, "player joined the match");
        Ok(entity)
    }

    /// Remove a disconnected player's entities, keeping their score in the
    /// final ranking.
    pub fn remove_player(&mut self, player_id: u16) -> Result<(), CoreError> {
        let Some(entity) = self.players.remove(&player_id) else {
            return Ok(());
        };
        if let Some(player) = self.registry.get_cloned::<Player>(entity) {
            self.departed.insert(player_id, player.score);
        }
        // The Force goes with its owner.
        let forces: Vec<Entity> = {
            let store = self.registry.components::<Force>()?;
            store
                .iter()
                .filter(|(_, force)| force.owner_player == entity)
                .map(|(index, _)| Entity::from_index(index))
                .collect()
        };
        for force_entity in forces {
            self.registry.kill(force_entity)?;
        }
        if self.registry.is_valid(entity) {
            self.registry.kill(entity)?;
        }
        self.pending_inputs.remove(&player_id);
        tracing::info!(player_id, "player removed from the match");
        Ok(())
    }

    /// Queue an input for the next tick; the latest one per player wins.
    pub fn queue_input(&mut self, player_id: u16, input: message::PlayerInput) {
        self.pending_inputs.insert(player_id, input);
    }

    // -- accessors ----------------------------------------------------------

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    pub fn is_game_over(&self) -> bool {
        self.game_over
    }

    pub fn level_index(&self) -> usize {
        self.level_index
    }

    pub fn scroll_speed(&self) -> f32 {
        self.registry
            .get_cloned::<tilemap::TileMap>(self.tilemap_entity)
            .map(|map| map.scroll_speed)
            .unwrap_or(50.0)
    }

    /// Capture the wire-visible world for snapshot building.
    pub fn capture_view(&self) -> Result<WorldView, CoreError> {
        snapshot::capture(&self.registry)
    }

    /// Final scores, ranked best first. Departed players keep their slot.
    pub fn scores(&self) -> Vec<ScoreEntry> {
        let mut entries: Vec<ScoreEntry> = self
            .players
            .iter()
            .filter_map(|(&player_id, &entity)| {
                self.registry
                    .get_cloned::<Player>(entity)
                    .map(|player| ScoreEntry {
                        player_id,
                        score: player.score,
                        rank: 0,
                    })
            })
            .chain(self.departed.iter().map(|(&player_id, &score)| ScoreEntry {
                player_id,
                score,
                rank: 0,
            }))
            .collect();
        entries.sort_by(|a, b| b.score.cmp(&a.score).then(a.player_id.cmp(&b.player_id)));
        for (position, entry) in entries.iter_mut().enumerate() {
            entry.rank = position as u8 + 1;
        }
        entries
    }

    // -- the tick -----------------------------------------------------------

    fn guard(name: &'static str, result: Result<(), CoreError>) {
        if let Err(err) = result {
            tracing::error!(system = name, %err, "system failed; skipped for this tick");
        }
    }

    /// Run one fixed-timestep tick and return the events it produced.
    pub fn tick(&mut self) -> TickOutput {
        let mut output = TickOutput::default();
        if self.game_over {
            return output;
        }
        let dt = FIXED_DT;
        let mut hits: Vec<CollisionHit> = Vec::new();
        let mut deaths: Vec<Death> = Vec::new();

        Self::guard(
            "apply_inputs",
            input::apply_queued_inputs(&self.registry, &self.pending_inputs),
        );
        self.pending_inputs.clear();

        Self::guard("player_movement", input::player_movement(&self.registry, dt));
        Self::guard(
            "enemy_ai",
            ai::enemy_ai(&mut self.registry, &mut self.rng, dt),
        );
        Self::guard("boss_ai", ai::boss_ai(&mut self.registry, &mut self.rng, dt));
        Self::guard("boss_parts", ai::boss_parts(&mut self.registry, dt));
        Self::guard("force_control", force::control(&self.registry, &mut output.events));
        Self::guard("physics_integrate", physics::integrate(&self.registry, dt));
        Self::guard("tilemap_scroll", tilemap::scroll(&self.registry, dt));
        Self::guard("weapon_cooldown", weapon::tick_weapons(&self.registry, dt));
        Self::guard("weapon_fire", weapon::player_fire(&mut self.registry, dt));
        Self::guard("force_movement", force::movement(&mut self.registry, dt));
        Self::guard(
            "projectile_lifetime",
            projectile::lifetime(&mut self.registry, dt),
        );
        Self::guard("collision_detect", physics::collide(&self.registry, &mut hits));
        Self::guard(
            "collision_dispatch",
            combat::dispatch(&mut self.registry, &hits, &mut deaths, &mut output.events),
        );
        Self::guard("tilemap_players", tilemap::collide_players(&self.registry));
        Self::guard("tilemap_enemies", tilemap::collide_enemies(&self.registry));
        Self::guard("bounds", physics::bounds_clamp(&self.registry));
        Self::guard(
            "level_director",
            level::director(
                &mut self.registry,
                self.level_entity,
                dt,
                self.difficulty,
                &mut output.events,
            ),
        );
        Self::guard("boss_updates", ai::boss_updates(&self.registry, &mut output.events));

        Self::guard("match_control", self.match_control(dt, &mut output.events));

        self.tick += 1;
        output
    }

    /// Level transitions and end-of-match detection.
    fn match_control(&mut self, dt: f32, events: &mut Vec<SideEvent>) -> Result<(), CoreError> {
        // Defeat: every joined player is dead.
        if !self.players.is_empty() {
            let all_dead = self.players.values().all(|&entity| {
                self.registry
                    .get_cloned::<Player>(entity)
                    .map(|player| !player.is_alive)
                    .unwrap_or(true)
            });
            if all_dead {
                events.push(SideEvent::GameEnd(message::GameEnd {
                    victory: false,
                    scores: self.scores(),
                }));
                self.game_over = true;
                tracing::info!("all players down, match lost");
                return Ok(());
            }
        }

        let finished = self
            .registry
            .get_cloned::<LevelPlan>(self.level_entity)
            .map(|plan| plan.finished_level)
            .unwrap_or(false);
        if !finished {
            return Ok(());
        }

        self.level_gap_timer += dt;
        if self.level_gap_timer < LEVEL_GAP_SECONDS {
            return Ok(());
        }
        self.level_gap_timer = 0.0;
        self.level_index += 1;

        if self.level_index >= self.levels.len() {
            events.push(SideEvent::GameEnd(message::GameEnd {
                victory: true,
                scores: self.scores(),
            }));
            self.game_over = true;
            tracing::info!("campaign complete, victory");
            return Ok(());
        }

        self.load_level(self.level_index)?;
        Ok(())
    }

    /// Clear leftover hostiles and projectiles, then install the next
    /// level's plan and map.
    fn load_level(&mut self, level_index: usize) -> Result<(), CoreError> {
        let mut leftovers: Vec<Entity> = Vec::new();
        {
            let enemies = self.registry.components::<Enemy>()?;
            leftovers.extend(enemies.iter().map(|(i, _)| Entity::from_index(i)));
            let bosses = self.registry.components::<Boss>()?;
            leftovers.extend(bosses.iter().map(|(i, _)| Entity::from_index(i)));
            let parts = self.registry.components::<BossPart>()?;
            leftovers.extend(parts.iter().map(|(i, _)| Entity::from_index(i)));
            let projectiles = self.registry.components::<Projectile>()?;
            leftovers.extend(projectiles.iter().map(|(i, _)| Entity::from_index(i)));
        }
        for entity in leftovers {
            if self.registry.is_valid(entity) {
                self.registry.kill(entity)?;
            }
        }

        self.registry.add(
            self.level_entity,
            LevelPlan::new(self.levels[level_index].clone(), level_index),
        )?;
        self.registry.add(
            self.tilemap_entity,
            tilemap::generate_level(level_index, &mut self.rng),
        )?;
        tracing::info!(level = level_index, "level loaded");
        Ok(())
    }

    /// Match difficulty as configured at creation.
    pub fn difficulty(&self) -> u8 {
        self.difficulty
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
