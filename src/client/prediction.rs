//! Local movement prediction and server reconciliation

use std::collections::VecDeque;

use crate::game::physics::{Arena, PhysicsSystem};
use crate::game::world::PlayerState;
use crate::game::GameConfig;
use crate::ws::protocol::InputSnapshot;

/// Input applied locally but not yet acknowledged by the server
#[derive(Debug, Clone, PartialEq)]
pub struct PendingInput {
    pub input: InputSnapshot,
    /// Frame time the input was predicted with (seconds)
    pub dt: f32,
}

/// Client-side dead reckoning for the local player
#[derive(Debug)]
pub struct Predictor {
    next_seq: u32,
    pending: VecDeque<PendingInput>,
    move_speed: f32,
    slide_multiplier: f32,
    player_radius: f32,
    arena: Arena,
}

impl Predictor {
    pub fn new(config: &GameConfig) -> Self {
        Self {
            next_seq: 0,
            pending: VecDeque::new(),
            move_speed: config.move_speed,
            slide_multiplier: config.slide_multiplier,
            player_radius: config.player_radius,
            arena: config.arena,
        }
    }

    /// Assign the next sequence number
    pub fn stamp(&mut self, mut input: InputSnapshot) -> InputSnapshot {
        self.next_seq += 1;
        input.seq = self.next_seq;
        input
    }

    /// Apply a stamped input to the local player and keep it for replay.
    /// Only movement is predicted; dash, reload and fire wait for the server.
    pub fn predict(&mut self, player: &mut PlayerState, input: InputSnapshot, dt: f32) {
        self.apply(player, &input, dt);
        player.angle = input.angle;
        self.pending.push_back(PendingInput { input, dt });
    }

    /// Overwrite the local player's authoritative fields, drop acknowledged
    /// inputs and replay the rest on top of the corrected position
    pub fn reconcile(
        &mut self,
        local: &mut PlayerState,
        authoritative: &PlayerState,
        last_processed: Option<u32>,
    ) {
        local.x = authoritative.x;
        local.y = authoritative.y;
        local.ammo = authoritative.ammo;
        local.max_ammo = authoritative.max_ammo;
        local.is_reloading = authoritative.is_reloading;
        local.can_dash = authoritative.can_dash;
        local.is_sliding = authoritative.is_sliding;

        let Some(last_processed) = last_processed else {
            return;
        };

        self.pending.retain(|p| p.input.seq > last_processed);
        for pending in &self.pending {
            self.apply(local, &pending.input, pending.dt);
        }
    }

    fn apply(&self, player: &mut PlayerState, input: &InputSnapshot, dt: f32) {
        let (x, y) = PhysicsSystem::predict_step(
            player.x,
            player.y,
            input,
            self.move_speed * dt,
            self.slide_multiplier,
            self.player_radius,
            &self.arena,
        );
        player.x = x;
        player.y = y;
    }

    pub fn pending(&self) -> impl Iterator<Item = &PendingInput> {
        self.pending.iter()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn last_seq(&self) -> u32 {
        self.next_seq
    }
}
