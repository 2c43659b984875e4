//! Snapshot serialization and fan-out

use serde::Serialize;
use std::collections::HashMap;
use tracing::debug;
use uuid::Uuid;

use crate::ws::session::SessionHandle;

use super::engine::Simulation;
use super::world::WorldState;

/// Borrowed view of a snapshot frame; serializes to the same shape as
/// `ServerMsg::Snapshot` without cloning the world
#[derive(Serialize)]
struct SnapshotFrame<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    payload: SnapshotPayload<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SnapshotPayload<'a> {
    state: &'a WorldState,
    server_tick: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_processed_input: Option<u32>,
}

/// Serialize one snapshot frame for a single recipient
pub fn encode_snapshot(
    world: &WorldState,
    server_tick: u64,
    last_processed_input: Option<u32>,
) -> serde_json::Result<String> {
    serde_json::to_string(&SnapshotFrame {
        kind: "snapshot",
        payload: SnapshotPayload {
            state: world,
            server_tick,
            last_processed_input,
        },
    })
}

/// Sends the post-tick world to every session of a lobby
#[derive(Debug, Default)]
pub struct SnapshotBroadcaster {
    stats: SnapshotStats,
}

impl SnapshotBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver the current world to each open session, stamped with that
    /// player's last consumed input. Returns the number of frames queued.
    pub fn broadcast(&mut self, sim: &Simulation, sessions: &HashMap<Uuid, SessionHandle>) -> usize {
        let world = sim.world();
        let mut delivered = 0;
        let mut bytes = 0;

        for (player_id, session) in sessions {
            if !session.is_open() {
                continue;
            }
            match encode_snapshot(world, sim.server_tick(), sim.last_processed(player_id)) {
                Ok(frame) => {
                    bytes += frame.len();
                    if session.send(frame) {
                        delivered += 1;
                    }
                }
                Err(e) => {
                    debug!(player_id = %player_id, error = %e, "Failed to encode snapshot");
                }
            }
        }

        self.stats.record(world.players.len(), bytes);
        delivered
    }

    pub fn stats(&self) -> &SnapshotStats {
        &self.stats
    }
}

/// Running totals for snapshot traffic
#[derive(Debug, Default)]
pub struct SnapshotStats {
    pub total_snapshots: u64,
    pub total_bytes: u64,
    pub avg_players_per_snapshot: f32,
}

impl SnapshotStats {
    pub fn record(&mut self, player_count: usize, bytes: usize) {
        self.total_snapshots += 1;
        self.total_bytes += bytes as u64;

        let n = self.total_snapshots as f32;
        self.avg_players_per_snapshot =
            self.avg_players_per_snapshot * ((n - 1.0) / n) + (player_count as f32 / n);
    }
}
