//! Map voting between matches

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use uuid::Uuid;

use super::map::MapCatalog;

/// Voting overlay carried in the world state while a vote is running
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VotingState {
    /// Candidate map ids, in catalog order
    pub options: Vec<String>,
    /// Tally per candidate
    pub votes: BTreeMap<String, u32>,
    /// Unix ms at which voting closes
    pub end_time: u64,
}

impl VotingState {
    pub fn open(options: Vec<String>, end_time: u64) -> Self {
        let votes = options.iter().map(|id| (id.clone(), 0)).collect();
        Self {
            options,
            votes,
            end_time,
        }
    }

    pub fn is_option(&self, map_id: &str) -> bool {
        self.options.iter().any(|id| id == map_id)
    }

    /// Candidate with the strictly highest tally; the earliest candidate wins ties
    pub fn winner(&self) -> Option<&str> {
        let mut winner: Option<(&str, u32)> = None;
        for id in &self.options {
            let count = self.votes.get(id).copied().unwrap_or(0);
            if winner.map_or(true, |(_, best)| count > best) {
                winner = Some((id.as_str(), count));
            }
        }
        winner.map(|(id, _)| id)
    }

    pub fn total_votes(&self) -> u32 {
        self.votes.values().sum()
    }
}

/// Draw `count` distinct map ids without replacement, returned in catalog order
pub fn draw_options<R: Rng + ?Sized>(maps: &MapCatalog, count: usize, rng: &mut R) -> Vec<String> {
    let amount = count.min(maps.len());
    let mut picked = rand::seq::index::sample(rng, maps.len(), amount).into_vec();
    picked.sort_unstable();
    picked
        .into_iter()
        .filter_map(|i| maps.by_index(i).map(|m| m.id.clone()))
        .collect()
}

/// Who voted for what in the current voting phase (server only)
#[derive(Debug, Default)]
pub struct Ballot {
    choices: HashMap<Uuid, String>,
}

impl Ballot {
    pub fn clear(&mut self) {
        self.choices.clear();
    }

    /// Record a vote, moving any previous vote by the same player.
    /// Returns false when the map is not on offer.
    pub fn cast(&mut self, voting: &mut VotingState, player_id: Uuid, map_id: &str) -> bool {
        if !voting.is_option(map_id) {
            return false;
        }

        if let Some(previous) = self.choices.get(&player_id) {
            if let Some(count) = voting.votes.get_mut(previous) {
                *count = count.saturating_sub(1);
            }
        }

        self.choices.insert(player_id, map_id.to_string());
        *voting.votes.entry(map_id.to_string()).or_insert(0) += 1;
        true
    }

    /// Drop a departing player's vote
    pub fn withdraw(&mut self, voting: &mut VotingState, player_id: Uuid) {
        if let Some(previous) = self.choices.remove(&player_id) {
            if let Some(count) = voting.votes.get_mut(&previous) {
                *count = count.saturating_sub(1);
            }
        }
    }

    pub fn voter_count(&self) -> usize {
        self.choices.len()
    }
}
