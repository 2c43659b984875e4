//! Registry of running lobbies keyed by join code

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;
use tracing::info;

use super::lobby::{GameLobby, LobbyError, LobbyHandle};
use super::GameConfig;

const CODE_LEN: usize = 6;
const CODE_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// All lobbies hosted by this process
pub struct LobbyRegistry {
    lobbies: DashMap<String, LobbyHandle>,
    config: Arc<GameConfig>,
}

impl LobbyRegistry {
    pub fn new(config: Arc<GameConfig>) -> Self {
        Self {
            lobbies: DashMap::new(),
            config,
        }
    }

    /// Spawn a lobby task under a fresh join code
    pub fn create(&self) -> LobbyHandle {
        loop {
            let code = generate_code(&mut rand::thread_rng());
            if let Entry::Vacant(slot) = self.lobbies.entry(code.clone()) {
                let (lobby, handle) =
                    GameLobby::new(code.clone(), self.config.clone(), rand::random());
                tokio::spawn(lobby.run());
                slot.insert(handle.clone());
                info!(lobby_id = %code, "Lobby created");
                return handle;
            }
        }
    }

    /// Look up a lobby by code, case-insensitively
    pub fn get(&self, id: &str) -> Option<LobbyHandle> {
        self.lobbies
            .get(&id.trim().to_ascii_uppercase())
            .map(|entry| entry.value().clone())
    }

    pub fn lookup(&self, id: &str) -> Result<LobbyHandle, LobbyError> {
        self.get(id).ok_or_else(|| LobbyError::NotFound(id.to_string()))
    }

    pub fn player_count(&self, id: &str) -> Option<usize> {
        self.get(id).map(|handle| handle.player_count())
    }

    pub fn remove(&self, id: &str) -> Option<LobbyHandle> {
        self.lobbies.remove(id).map(|(_, handle)| handle)
    }

    pub fn active_lobbies(&self) -> usize {
        self.lobbies.len()
    }

    pub fn total_players(&self) -> usize {
        self.lobbies
            .iter()
            .map(|entry| entry.value().player_count())
            .sum()
    }

    /// Drop empty lobbies older than `grace`, plus any whose task has died.
    /// Returns how many were removed.
    pub fn reap_idle(&self, grace: Duration) -> usize {
        let before = self.lobbies.len();
        self.lobbies.retain(|id, handle| {
            let idle = handle.player_count() == 0 && handle.age() >= grace;
            let keep = !idle && !handle.is_closed();
            if !keep {
                info!(lobby_id = %id, "Removing idle lobby");
            }
            keep
        });
        before - self.lobbies.len()
    }

    /// Periodically reap idle lobbies for the lifetime of the process
    pub async fn run_reaper(self: Arc<Self>, every: Duration, grace: Duration) {
        let mut ticker = interval(every);
        loop {
            ticker.tick().await;
            self.reap_idle(grace);
        }
    }
}

fn generate_code<R: Rng>(rng: &mut R) -> String {
    (0..CODE_LEN)
        .map(|_| CODE_CHARSET[rng.gen_range(0..CODE_CHARSET.len())] as char)
        .collect()
}
