//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Allowed client origins for CORS (comma-separated, empty = any)
    pub client_origin: String,

    /// Simulation ticks per second
    pub tick_rate: u32,
    /// Length of a match before map voting starts
    pub match_duration_secs: u64,
    /// Length of the map voting phase
    pub voting_duration_secs: u64,
    /// Delay before a dead player is respawned automatically
    pub respawn_delay_ms: u64,
    /// Empty lobbies older than this are reaped
    pub lobby_idle_secs: u64,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Hosting platforms provide PORT, fall back to SERVER_ADDR or default
        let server_addr = if let Ok(port) = env::var("PORT") {
            format!("0.0.0.0:{}", port)
        } else {
            env::var("SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string())
        };

        let tick_rate: u32 = parse_or("TICK_RATE", 20)?;
        if tick_rate == 0 {
            return Err(ConfigError::Invalid("TICK_RATE"));
        }

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,

            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            client_origin: env::var("CLIENT_ORIGIN").unwrap_or_default(),

            tick_rate,
            match_duration_secs: parse_or("MATCH_DURATION_SECS", 300)?,
            voting_duration_secs: parse_or("VOTING_DURATION_SECS", 20)?,
            respawn_delay_ms: parse_or("RESPAWN_DELAY_MS", 3000)?,
            lobby_idle_secs: parse_or("LOBBY_IDLE_SECS", 30)?,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            log_level: "info".to_string(),
            client_origin: String::new(),
            tick_rate: 20,
            match_duration_secs: 300,
            voting_duration_secs: 20,
            respawn_delay_ms: 3000,
            lobby_idle_secs: 30,
        }
    }
}

/// Read an optional variable, using `default` when unset
fn parse_or<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid(name)),
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),

    #[error("Invalid server address format")]
    InvalidAddress,
}
