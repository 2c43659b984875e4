//! Time-buffered interpolation of remote players

use std::collections::VecDeque;
use uuid::Uuid;

use crate::game::world::{PlayerState, WorldState};

/// Snapshots retained for interpolation
pub const SNAPSHOT_BUFFER_LEN: usize = 10;

/// Rendering lag behind the newest snapshot (ms)
pub const INTERPOLATION_DELAY_MS: u64 = 100;

/// Linear interpolation
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Two snapshots surrounding a render time
#[derive(Debug)]
pub struct Bracket<'a> {
    pub from: &'a WorldState,
    pub to: &'a WorldState,
    /// Fraction of the way from `from` to `to`, within [0, 1]
    pub t: f32,
}

/// Bounded ring of received snapshots tagged with local receipt time
#[derive(Debug)]
pub struct SnapshotBuffer {
    entries: VecDeque<(u64, WorldState)>,
    capacity: usize,
}

impl SnapshotBuffer {
    pub fn new() -> Self {
        Self::with_capacity(SNAPSHOT_BUFFER_LEN)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(2);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, received_at: u64, state: WorldState) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back((received_at, state));
    }

    /// Newest snapshot received at or before `render_time` that has a
    /// successor, paired with that successor
    pub fn bracket(&self, render_time: u64) -> Option<Bracket<'_>> {
        let index = self
            .entries
            .iter()
            .rposition(|(received_at, _)| *received_at <= render_time)?;
        let (from_time, from) = self.entries.get(index)?;
        let (to_time, to) = self.entries.get(index + 1)?;

        let t = if to_time > from_time {
            ((render_time - from_time) as f32 / (to_time - from_time) as f32).clamp(0.0, 1.0)
        } else {
            0.0
        };

        Some(Bracket { from, to, t })
    }

    pub fn latest(&self) -> Option<&WorldState> {
        self.entries.back().map(|(_, state)| state)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl Default for SnapshotBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// Bring `view` to where remote players should be drawn. Discrete fields
/// come verbatim from the newer snapshot; the local player's position is
/// left to prediction.
pub fn apply_bracket(view: &mut WorldState, bracket: &Bracket<'_>, local_id: Option<Uuid>) {
    let to = bracket.to;

    view.players.retain(|id, _| to.players.contains_key(id));
    view.projectiles = to.projectiles.clone();

    for (id, target) in &to.players {
        let player = view
            .players
            .entry(*id)
            .or_insert_with(|| target.clone());
        copy_discrete(player, target);

        if Some(*id) == local_id {
            continue;
        }
        if let Some(source) = bracket.from.players.get(id) {
            player.x = lerp(source.x, target.x, bracket.t);
            player.y = lerp(source.y, target.y, bracket.t);
            player.angle = target.angle;
        }
    }
}

fn copy_discrete(player: &mut PlayerState, target: &PlayerState) {
    player.health = target.health;
    player.is_dead = target.is_dead;
    player.weapon = target.weapon;
    player.ammo = target.ammo;
    player.max_ammo = target.max_ammo;
    player.is_reloading = target.is_reloading;
    player.can_dash = target.can_dash;
    player.is_sliding = target.is_sliding;
    player.kills = target.kills;
    player.deaths = target.deaths;
}
