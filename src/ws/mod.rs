//! WebSocket transport: wire protocol, sessions and the upgrade handler

pub mod handler;
pub mod protocol;
pub mod session;
