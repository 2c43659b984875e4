//! Outbound half of a connected client

use tokio::sync::mpsc;
use tracing::warn;
use uuid::Uuid;

/// Frames a session may queue before it counts as lagging
pub const SESSION_BUFFER: usize = 64;

/// Handle the lobby uses to push text frames to one client
#[derive(Debug, Clone)]
pub struct SessionHandle {
    pub player_id: Uuid,
    tx: mpsc::Sender<String>,
}

impl SessionHandle {
    pub fn new(player_id: Uuid) -> (Self, mpsc::Receiver<String>) {
        Self::with_capacity(player_id, SESSION_BUFFER)
    }

    pub fn with_capacity(player_id: Uuid, capacity: usize) -> (Self, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { player_id, tx }, rx)
    }

    /// Queue one frame without waiting. A full or closed channel drops the
    /// frame; nothing is retried.
    pub fn send(&self, frame: String) -> bool {
        match self.tx.try_send(frame) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(player_id = %self.player_id, "Session lagging, dropping frame");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }

    /// Whether the writer half is still draining frames
    pub fn is_open(&self) -> bool {
        !self.tx.is_closed()
    }
}
