//! Application state shared across routes

use std::sync::Arc;

use crate::config::Config;
use crate::game::{GameConfig, LobbyRegistry};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub game_config: Arc<GameConfig>,
    pub lobbies: Arc<LobbyRegistry>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let game_config = Arc::new(GameConfig::from_config(&config));
        let lobbies = Arc::new(LobbyRegistry::new(game_config.clone()));

        Self {
            config: Arc::new(config),
            game_config,
            lobbies,
        }
    }
}
