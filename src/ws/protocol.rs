//! WebSocket protocol message definitions
//! These are the wire types for client-server communication

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::game::weapon::WeaponKind;
use crate::game::world::WorldState;

/// Latest desired action of a player. Inputs are a level, not an edit log:
/// the newest one replaces the previous.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputSnapshot {
    pub up: bool,
    pub down: bool,
    pub left: bool,
    pub right: bool,
    pub shoot: bool,
    pub dash: bool,
    pub slide: bool,
    pub reload: bool,
    /// Aim angle in radians
    pub angle: f32,
    /// Monotonically increasing per connection
    pub seq: u32,
}

/// Messages sent from client to server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ClientMsg {
    /// Create a new lobby and join it
    CreateLobby { username: String },

    /// Join an existing lobby by code
    JoinLobby {
        username: String,
        #[serde(rename = "lobbyId")]
        lobby_id: String,
    },

    /// Player input for the next tick
    Input(InputSnapshot),

    /// Respawn now instead of waiting for the timer
    Respawn,

    /// Class select: change equipped weapon
    SelectWeapon { weapon: WeaponKind },

    /// Vote for the next map
    VoteMap {
        #[serde(rename = "mapId")]
        map_id: String,
    },
}

/// Surface a projectile stopped on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HitSurface {
    Player,
    Wall,
}

/// Messages sent from server to client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ServerMsg {
    /// Confirmation of lobby join
    LobbyJoined {
        #[serde(rename = "playerId")]
        player_id: Uuid,
        #[serde(rename = "lobbyId")]
        lobby_id: String,
        #[serde(rename = "initialState")]
        initial_state: WorldState,
    },

    /// World state after a tick
    Snapshot {
        state: WorldState,
        #[serde(rename = "serverTick")]
        server_tick: u64,
        #[serde(
            rename = "lastProcessedInput",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        last_processed_input: Option<u32>,
    },

    /// Kill feed entry
    PlayerDeath {
        id: Uuid,
        #[serde(rename = "killerId")]
        killer_id: Uuid,
        #[serde(rename = "killerName")]
        killer_name: String,
        #[serde(rename = "killedName")]
        killed_name: String,
    },

    /// The receiving player has respawned
    Respawn,

    /// Hit confirmation for the shooter
    BulletHit {
        x: f32,
        y: f32,
        #[serde(rename = "type")]
        kind: HitSurface,
    },

    /// Live vote tally
    VoteUpdate { votes: BTreeMap<String, u32> },

    /// Error message
    Error { message: String },
}

impl ServerMsg {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }
}
