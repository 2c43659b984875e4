//! Authoritative world model shared by the engine, snapshots and clients

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use super::map::Obstacle;
use super::voting::VotingState;
use super::weapon::{WeaponKind, WeaponStats};

/// Player state in a lobby (authoritative on the server, mirrored on clients)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerState {
    pub id: Uuid,
    pub x: f32,
    pub y: f32,
    pub angle: f32,
    /// Full health is 100; may go negative on the killing hit
    pub health: i32,
    pub username: String,
    pub kills: u32,
    pub deaths: u32,
    pub is_dead: bool,
    pub weapon: WeaponKind,
    pub ammo: u32,
    pub max_ammo: u32,
    pub is_reloading: bool,
    pub can_dash: bool,
    pub is_sliding: bool,
}

impl PlayerState {
    pub fn new(
        id: Uuid,
        username: String,
        x: f32,
        y: f32,
        health: i32,
        weapon: WeaponKind,
        stats: &WeaponStats,
    ) -> Self {
        Self {
            id,
            x,
            y,
            angle: 0.0,
            health,
            username,
            kills: 0,
            deaths: 0,
            is_dead: false,
            weapon,
            ammo: stats.max_ammo,
            max_ammo: stats.max_ammo,
            is_reloading: false,
            can_dash: true,
            is_sliding: false,
        }
    }
}

/// Active projectile in the world
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Projectile {
    pub id: Uuid,
    /// Shooter at creation time; may have left since
    pub owner_id: Uuid,
    pub weapon: WeaponKind,
    pub x: f32,
    pub y: f32,
    /// Velocity in units per tick
    pub vx: f32,
    pub vy: f32,
}

/// Everything a snapshot carries
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorldState {
    pub players: HashMap<Uuid, PlayerState>,
    #[serde(rename = "bullets")]
    pub projectiles: HashMap<Uuid, Projectile>,
    pub obstacles: Vec<Obstacle>,
    /// Unix ms at which the running match hands over to voting
    pub match_end_time: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voting: Option<VotingState>,
}

impl WorldState {
    pub fn new(obstacles: Vec<Obstacle>, match_end_time: u64) -> Self {
        Self {
            players: HashMap::new(),
            projectiles: HashMap::new(),
            obstacles,
            match_end_time,
            voting: None,
        }
    }

    pub fn alive_count(&self) -> usize {
        self.players.values().filter(|p| !p.is_dead).count()
    }
}
