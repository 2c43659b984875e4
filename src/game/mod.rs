//! Game simulation modules

pub mod combat;
pub mod engine;
pub mod lobby;
pub mod map;
pub mod physics;
pub mod registry;
pub mod snapshot;
pub mod timers;
pub mod voting;
pub mod weapon;
pub mod world;

pub use engine::{Dispatch, Simulation};
pub use lobby::{GameLobby, LobbyCommand, LobbyError, LobbyHandle};
pub use registry::LobbyRegistry;
pub use world::{PlayerState, WorldState};

use crate::config::Config;
use map::MapCatalog;
use physics::Arena;
use weapon::WeaponCatalog;

/// Immutable game rules injected into every lobby
#[derive(Debug, Clone)]
pub struct GameConfig {
    pub arena: Arena,
    pub player_radius: f32,
    pub projectile_radius: f32,
    /// Distance between player centre and projectile spawn, past the radius
    pub muzzle_gap: f32,
    pub max_health: i32,
    /// Normal movement speed (units per second)
    pub move_speed: f32,
    pub slide_multiplier: f32,
    pub dash_distance: f32,
    pub dash_cooldown_ms: u64,
    pub respawn_delay_ms: u64,
    /// Respawn position jitter, applied as +/- half on each axis
    pub spawn_jitter: f32,
    pub match_duration_ms: u64,
    pub voting_duration_ms: u64,
    pub vote_options: usize,
    pub tick_rate: u32,
    pub weapons: WeaponCatalog,
    pub maps: MapCatalog,
}

impl GameConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            tick_rate: config.tick_rate,
            match_duration_ms: config.match_duration_secs * 1000,
            voting_duration_ms: config.voting_duration_secs * 1000,
            respawn_delay_ms: config.respawn_delay_ms,
            ..Self::default()
        }
    }

    /// Seconds per simulation tick
    pub fn tick_secs(&self) -> f32 {
        1.0 / self.tick_rate.max(1) as f32
    }

    /// Normal movement distance per server tick
    pub fn move_per_tick(&self) -> f32 {
        self.move_speed * self.tick_secs()
    }

    /// Distance from player centre to projectile spawn point
    pub fn muzzle_offset(&self) -> f32 {
        self.player_radius + self.muzzle_gap
    }
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            arena: Arena {
                width: 1600.0,
                height: 900.0,
            },
            player_radius: 20.0,
            projectile_radius: 5.0,
            muzzle_gap: 5.0,
            max_health: 100,
            move_speed: 250.0,
            slide_multiplier: 1.5,
            dash_distance: 20.0,
            dash_cooldown_ms: 3000,
            respawn_delay_ms: 3000,
            spawn_jitter: 50.0,
            match_duration_ms: 5 * 60 * 1000,
            voting_duration_ms: 20_000,
            vote_options: 3,
            tick_rate: 20,
            weapons: WeaponCatalog::default(),
            maps: MapCatalog::default(),
        }
    }
}
