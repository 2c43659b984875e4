//! Arena Shooter - authoritative multiplayer top-down shooter
//!
//! Server side: lobby actors running a fixed-tick simulation behind an
//! axum WebSocket endpoint. Client side: prediction, reconciliation and
//! snapshot interpolation over the same wire types.

pub mod app;
pub mod client;
pub mod config;
pub mod game;
pub mod http;
pub mod util;
pub mod ws;
