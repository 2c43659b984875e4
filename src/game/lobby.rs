//! Lobby actor: owns one simulation and its sessions, serializing ticks,
//! client requests and timers on a single task

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::util::time::{tick_period, unix_millis, Timer};
use crate::ws::protocol::{ClientMsg, ServerMsg};
use crate::ws::session::SessionHandle;

use super::engine::{Dispatch, Simulation};
use super::snapshot::SnapshotBroadcaster;
use super::GameConfig;

/// Requests routed into a lobby
#[derive(Debug)]
pub enum LobbyCommand {
    /// Attach a session and spawn its player
    Join {
        player_id: Uuid,
        username: String,
        session: SessionHandle,
    },
    /// Session closed
    Leave { player_id: Uuid },
    /// In-game request from a joined player
    Client { player_id: Uuid, msg: ClientMsg },
}

#[derive(Debug, thiserror::Error)]
pub enum LobbyError {
    #[error("Lobby not found: {0}")]
    NotFound(String),

    #[error("Lobby closed: {0}")]
    Closed(String),
}

/// Cloneable handle to a running lobby
#[derive(Debug, Clone)]
pub struct LobbyHandle {
    pub id: String,
    cmd_tx: mpsc::Sender<LobbyCommand>,
    player_count: Arc<AtomicUsize>,
    created_at: Instant,
}

impl LobbyHandle {
    pub fn player_count(&self) -> usize {
        self.player_count.load(Ordering::Relaxed)
    }

    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    pub fn is_closed(&self) -> bool {
        self.cmd_tx.is_closed()
    }

    pub async fn send(&self, cmd: LobbyCommand) -> Result<(), LobbyError> {
        self.cmd_tx
            .send(cmd)
            .await
            .map_err(|_| LobbyError::Closed(self.id.clone()))
    }

    pub async fn join(
        &self,
        player_id: Uuid,
        username: String,
        session: SessionHandle,
    ) -> Result<(), LobbyError> {
        self.send(LobbyCommand::Join {
            player_id,
            username,
            session,
        })
        .await
    }

    pub async fn leave(&self, player_id: Uuid) -> Result<(), LobbyError> {
        self.send(LobbyCommand::Leave { player_id }).await
    }
}

/// The authoritative lobby task
pub struct GameLobby {
    id: String,
    sim: Simulation,
    sessions: HashMap<Uuid, SessionHandle>,
    cmd_rx: mpsc::Receiver<LobbyCommand>,
    player_count: Arc<AtomicUsize>,
    broadcaster: SnapshotBroadcaster,
    tick_period: Duration,
}

impl GameLobby {
    pub fn new(id: String, config: Arc<GameConfig>, seed: u64) -> (Self, LobbyHandle) {
        let (cmd_tx, cmd_rx) = mpsc::channel(256);
        let player_count = Arc::new(AtomicUsize::new(0));

        let handle = LobbyHandle {
            id: id.clone(),
            cmd_tx,
            player_count: player_count.clone(),
            created_at: Instant::now(),
        };

        let lobby = Self {
            tick_period: tick_period(config.tick_rate),
            sim: Simulation::new(id.clone(), config, seed, unix_millis()),
            id,
            sessions: HashMap::new(),
            cmd_rx,
            player_count,
            broadcaster: SnapshotBroadcaster::new(),
        };

        (lobby, handle)
    }

    /// Run until every handle has been dropped
    pub async fn run(mut self) {
        info!(lobby_id = %self.id, "Lobby started");

        let mut ticker = interval(self.tick_period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let timer = Timer::new();
                    self.run_tick(unix_millis());
                    let elapsed = timer.elapsed();
                    if elapsed > self.tick_period {
                        warn!(
                            lobby_id = %self.id,
                            elapsed_ms = elapsed.as_millis() as u64,
                            "Tick overran its period"
                        );
                    }
                }
                cmd = self.cmd_rx.recv() => match cmd {
                    Some(cmd) => self.handle_command(cmd, unix_millis()),
                    None => break,
                },
            }
        }

        info!(
            lobby_id = %self.id,
            snapshots = self.broadcaster.stats().total_snapshots,
            bytes = self.broadcaster.stats().total_bytes,
            "Lobby stopped"
        );
    }

    fn run_tick(&mut self, now: u64) {
        let outcome = self.sim.tick(now);
        self.dispatch(outcome.dispatches);
        if outcome.snapshot_due {
            self.broadcaster.broadcast(&self.sim, &self.sessions);
        }
    }

    fn handle_command(&mut self, cmd: LobbyCommand, now: u64) {
        let out = match cmd {
            LobbyCommand::Join {
                player_id,
                username,
                session,
            } => {
                self.sessions.insert(player_id, session);
                self.sim.add_player(player_id, username, now)
            }
            LobbyCommand::Leave { player_id } => {
                self.sessions.remove(&player_id);
                self.sim.remove_player(player_id)
            }
            LobbyCommand::Client { player_id, msg } => self.handle_client(player_id, msg, now),
        };
        self.player_count
            .store(self.sim.player_count(), Ordering::Relaxed);
        self.dispatch(out);
    }

    fn handle_client(&mut self, player_id: Uuid, msg: ClientMsg, now: u64) -> Vec<Dispatch> {
        match msg {
            ClientMsg::Input(input) => {
                self.sim.handle_input(player_id, input);
                Vec::new()
            }
            ClientMsg::Respawn => self.sim.handle_respawn(player_id, now),
            ClientMsg::SelectWeapon { weapon } => {
                self.sim.select_weapon(player_id, weapon);
                self.sim.reset_loadout(player_id);
                Vec::new()
            }
            ClientMsg::VoteMap { map_id } => self.sim.handle_vote(player_id, &map_id),
            ClientMsg::CreateLobby { .. } | ClientMsg::JoinLobby { .. } => {
                debug!(lobby_id = %self.id, player_id = %player_id, "Already in a lobby");
                Vec::new()
            }
        }
    }

    /// Fan engine output out to sessions, skipping closed ones
    fn dispatch(&self, dispatches: Vec<Dispatch>) {
        for dispatch in dispatches {
            match dispatch {
                Dispatch::Broadcast(msg) => {
                    let Some(frame) = encode(&msg) else { continue };
                    for session in self.sessions.values().filter(|s| s.is_open()) {
                        session.send(frame.clone());
                    }
                }
                Dispatch::Direct { to, msg } => {
                    let Some(session) = self.sessions.get(&to).filter(|s| s.is_open()) else {
                        continue;
                    };
                    if let Some(frame) = encode(&msg) {
                        session.send(frame);
                    }
                }
            }
        }
    }
}

fn encode(msg: &ServerMsg) -> Option<String> {
    match serde_json::to_string(msg) {
        Ok(frame) => Some(frame),
        Err(e) => {
            debug!(error = %e, "Failed to encode server message");
            None
        }
    }
}
