//! Client world view driven by server messages and the render loop

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::game::map::Obstacle;
use crate::game::world::{PlayerState, WorldState};
use crate::game::GameConfig;
use crate::ws::protocol::{ClientMsg, InputSnapshot, ServerMsg};

use super::interpolation::{apply_bracket, SnapshotBuffer, INTERPOLATION_DELAY_MS};
use super::prediction::Predictor;

/// Kill feed entries kept on screen
pub const KILL_FEED_LEN: usize = 5;

#[derive(Debug, Clone, PartialEq)]
pub struct KillFeedEntry {
    pub killer_name: String,
    pub killed_name: String,
    pub at: u64,
}

/// Everything one client knows about its lobby
#[derive(Debug)]
pub struct ClientGame {
    player_id: Option<Uuid>,
    lobby_id: Option<String>,
    server_tick: u64,
    view: WorldState,
    obstacles: Vec<Obstacle>,
    predictor: Predictor,
    snapshots: SnapshotBuffer,
    /// Newest first
    kill_feed: VecDeque<KillFeedEntry>,
    hit_markers: u32,
    last_error: Option<String>,
    my_vote: Option<String>,
}

impl ClientGame {
    pub fn new(config: &GameConfig) -> Self {
        Self {
            player_id: None,
            lobby_id: None,
            server_tick: 0,
            view: WorldState::default(),
            obstacles: Vec::new(),
            predictor: Predictor::new(config),
            snapshots: SnapshotBuffer::new(),
            kill_feed: VecDeque::with_capacity(KILL_FEED_LEN),
            hit_markers: 0,
            last_error: None,
            my_vote: None,
        }
    }

    pub fn player_id(&self) -> Option<Uuid> {
        self.player_id
    }

    pub fn lobby_id(&self) -> Option<&str> {
        self.lobby_id.as_deref()
    }

    pub fn server_tick(&self) -> u64 {
        self.server_tick
    }

    pub fn view(&self) -> &WorldState {
        &self.view
    }

    pub fn local_player(&self) -> Option<&PlayerState> {
        self.player_id.and_then(|id| self.view.players.get(&id))
    }

    pub fn obstacles(&self) -> &[Obstacle] {
        &self.obstacles
    }

    pub fn predictor(&self) -> &Predictor {
        &self.predictor
    }

    pub fn snapshots(&self) -> &SnapshotBuffer {
        &self.snapshots
    }

    pub fn kill_feed(&self) -> impl Iterator<Item = &KillFeedEntry> {
        self.kill_feed.iter()
    }

    pub fn hit_markers(&self) -> u32 {
        self.hit_markers
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn my_vote(&self) -> Option<&str> {
        self.my_vote.as_deref()
    }

    pub fn is_voting(&self) -> bool {
        self.view.voting.is_some()
    }

    /// Apply one server message received at local time `now`
    pub fn handle_message(&mut self, msg: ServerMsg, now: u64) {
        match msg {
            ServerMsg::LobbyJoined {
                player_id,
                lobby_id,
                initial_state,
            } => {
                self.player_id = Some(player_id);
                self.lobby_id = Some(lobby_id);
                self.obstacles = initial_state.obstacles.clone();
                self.view = initial_state;
                self.snapshots.clear();
                self.my_vote = None;
            }
            ServerMsg::Snapshot {
                state,
                server_tick,
                last_processed_input,
            } => self.apply_snapshot(state, server_tick, last_processed_input, now),
            ServerMsg::PlayerDeath {
                id,
                killer_name,
                killed_name,
                ..
            } => {
                self.kill_feed.push_front(KillFeedEntry {
                    killer_name,
                    killed_name,
                    at: now,
                });
                self.kill_feed.truncate(KILL_FEED_LEN);
                if let Some(player) = self.view.players.get_mut(&id) {
                    player.is_dead = true;
                }
            }
            ServerMsg::Respawn => {
                if let Some(player) = self.player_id.and_then(|id| self.view.players.get_mut(&id)) {
                    player.is_dead = false;
                }
            }
            ServerMsg::BulletHit { .. } => self.hit_markers += 1,
            ServerMsg::VoteUpdate { votes } => {
                if let Some(voting) = self.view.voting.as_mut() {
                    voting.votes = votes;
                }
            }
            ServerMsg::Error { message } => {
                debug!(message = %message, "Server error");
                self.last_error = Some(message);
            }
        }
    }

    fn apply_snapshot(
        &mut self,
        state: WorldState,
        server_tick: u64,
        last_processed_input: Option<u32>,
        now: u64,
    ) {
        self.server_tick = server_tick;
        self.view.match_end_time = state.match_end_time;

        match (&self.view.voting, &state.voting) {
            // New voting phase
            (None, Some(_)) => self.my_vote = None,
            // Voting ended; the next map's obstacles arrive with this snapshot
            (Some(_), None) => self.obstacles.clear(),
            _ => {}
        }
        self.view.voting = state.voting.clone();
        if self.obstacles.is_empty() {
            self.obstacles = state.obstacles.clone();
        }
        self.view.obstacles = state.obstacles.clone();

        if let Some(id) = self.player_id {
            if let Some(server_player) = state.players.get(&id) {
                match self.view.players.get_mut(&id) {
                    Some(local) => {
                        self.predictor
                            .reconcile(local, server_player, last_processed_input)
                    }
                    None => {
                        self.view.players.insert(id, server_player.clone());
                    }
                }
            }
        }

        self.snapshots.push(now, state);
    }

    /// One render frame: predict and emit the local input, then move remote
    /// players to their interpolated positions. Returns the input to send.
    pub fn frame(&mut self, input: InputSnapshot, now: u64, dt: f32) -> Option<ClientMsg> {
        let mut outgoing = None;

        if let Some(local) = self.player_id.and_then(|id| self.view.players.get_mut(&id)) {
            if !local.is_dead {
                let stamped = self.predictor.stamp(input);
                self.predictor.predict(local, stamped.clone(), dt);
                outgoing = Some(ClientMsg::Input(stamped));
            }
        }

        let render_time = now.saturating_sub(INTERPOLATION_DELAY_MS);
        if let Some(bracket) = self.snapshots.bracket(render_time) {
            apply_bracket(&mut self.view, &bracket, self.player_id);
        }

        outgoing
    }

    /// Record a vote for one of the offered maps
    pub fn cast_vote(&mut self, map_id: &str) -> Option<ClientMsg> {
        let voting = self.view.voting.as_ref()?;
        if !voting.is_option(map_id) {
            return None;
        }
        self.my_vote = Some(map_id.to_string());
        Some(ClientMsg::VoteMap {
            map_id: map_id.to_string(),
        })
    }
}

/// Client state shared between the network task and the render loop
#[derive(Clone)]
pub struct SharedClient {
    inner: Arc<Mutex<ClientGame>>,
}

impl SharedClient {
    pub fn new(game: ClientGame) -> Self {
        Self {
            inner: Arc::new(Mutex::new(game)),
        }
    }

    /// Parse and apply one text frame from the server
    pub fn handle_frame(&self, text: &str, now: u64) -> Result<(), serde_json::Error> {
        let msg: ServerMsg = serde_json::from_str(text)?;
        self.inner.lock().handle_message(msg, now);
        Ok(())
    }

    /// Run a render frame, returning the encoded input to send if any
    pub fn frame(&self, input: InputSnapshot, now: u64, dt: f32) -> serde_json::Result<Option<String>> {
        let msg = self.inner.lock().frame(input, now, dt);
        msg.map(|m| serde_json::to_string(&m)).transpose()
    }

    pub fn cast_vote(&self, map_id: &str) -> serde_json::Result<Option<String>> {
        let msg = self.inner.lock().cast_vote(map_id);
        msg.map(|m| serde_json::to_string(&m)).transpose()
    }

    /// Read the current state under the lock
    pub fn with<R>(&self, f: impl FnOnce(&ClientGame) -> R) -> R {
        f(&self.inner.lock())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::voting::VotingState;
    use crate::game::weapon::{WeaponCatalog, WeaponKind};
    use crate::ws::protocol::HitSurface;
    use assert_approx_eq::assert_approx_eq;

    fn player(id: Uuid, x: f32, y: f32) -> PlayerState {
        let catalog = WeaponCatalog::default();
        PlayerState::new(id, "p".to_string(), x, y, 100, WeaponKind::Pistol, catalog.get(WeaponKind::Pistol))
    }

    fn world(players: &[PlayerState]) -> WorldState {
        let mut world = WorldState::new(Vec::new(), 0);
        for p in players {
            world.players.insert(p.id, p.clone());
        }
        world
    }

    fn joined(me: Uuid, state: WorldState) -> ClientGame {
        let mut game = ClientGame::new(&GameConfig::default());
        game.handle_message(
            ServerMsg::LobbyJoined {
                player_id: me,
                lobby_id: "ABC123".to_string(),
                initial_state: state,
            },
            0,
        );
        game
    }

    fn snapshot(state: WorldState, last: Option<u32>) -> ServerMsg {
        ServerMsg::Snapshot {
            state,
            server_tick: 1,
            last_processed_input: last,
        }
    }

    fn right() -> InputSnapshot {
        InputSnapshot {
            right: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_frame_predicts_and_emits_input() {
        let me = Uuid::new_v4();
        let mut game = joined(me, world(&[player(me, 500.0, 500.0)]));
        assert_eq!(game.lobby_id(), Some("ABC123"));

        let msg = game.frame(right(), 1_000, 0.1).unwrap();
        match msg {
            ClientMsg::Input(input) => assert_eq!(input.seq, 1),
            other => panic!("unexpected message {:?}", other),
        }
        assert_approx_eq!(game.local_player().unwrap().x, 525.0, 0.001);
    }

    #[test]
    fn test_dead_player_sends_nothing() {
        let me = Uuid::new_v4();
        let mut game = joined(me, world(&[player(me, 500.0, 500.0)]));
        game.handle_message(
            ServerMsg::PlayerDeath {
                id: me,
                killer_id: Uuid::new_v4(),
                killer_name: "World".to_string(),
                killed_name: "p".to_string(),
            },
            10,
        );
        assert!(game.frame(right(), 20, 0.016).is_none());

        game.handle_message(ServerMsg::Respawn, 30);
        assert!(game.frame(right(), 40, 0.016).is_some());
    }

    #[test]
    fn test_snapshot_reconciles_local_player() {
        let me = Uuid::new_v4();
        let mut game = joined(me, world(&[player(me, 500.0, 500.0)]));
        for _ in 0..3 {
            game.frame(right(), 0, 0.1);
        }

        let mut server_me = player(me, 530.0, 500.0);
        server_me.ammo = 9;
        game.handle_message(snapshot(world(&[server_me]), Some(1)), 50);

        // Inputs 2 and 3 replayed on top of the server position
        assert_approx_eq!(game.local_player().unwrap().x, 580.0, 0.001);
        assert_eq!(game.local_player().unwrap().ammo, 9);
        assert_eq!(game.predictor().pending_len(), 2);
    }

    #[test]
    fn test_remote_players_interpolate() {
        let me = Uuid::new_v4();
        let other = Uuid::new_v4();
        let mut game = joined(me, world(&[player(me, 500.0, 500.0), player(other, 100.0, 100.0)]));

        game.handle_message(snapshot(world(&[player(me, 500.0, 500.0), player(other, 100.0, 100.0)]), None), 1_000);
        game.handle_message(snapshot(world(&[player(me, 500.0, 500.0), player(other, 200.0, 100.0)]), None), 1_050);

        game.frame(InputSnapshot::default(), 1_125, 0.016);
        assert_approx_eq!(game.view().players[&other].x, 150.0, 0.001);
    }

    #[test]
    fn test_kill_feed_hits_and_errors() {
        let me = Uuid::new_v4();
        let mut game = joined(me, world(&[player(me, 500.0, 500.0)]));

        for i in 0..7 {
            game.handle_message(
                ServerMsg::PlayerDeath {
                    id: Uuid::new_v4(),
                    killer_id: me,
                    killer_name: "me".to_string(),
                    killed_name: format!("victim{}", i),
                },
                i,
            );
        }
        let feed: Vec<_> = game.kill_feed().collect();
        assert_eq!(feed.len(), KILL_FEED_LEN);
        assert_eq!(feed[0].killed_name, "victim6");

        game.handle_message(
            ServerMsg::BulletHit {
                x: 0.0,
                y: 0.0,
                kind: HitSurface::Player,
            },
            10,
        );
        assert_eq!(game.hit_markers(), 1);

        game.handle_message(ServerMsg::error("Lobby not found"), 11);
        assert_eq!(game.last_error(), Some("Lobby not found"));
    }

    #[test]
    fn test_voting_flow() {
        let me = Uuid::new_v4();
        let mut game = joined(me, world(&[player(me, 500.0, 500.0)]));
        assert!(game.cast_vote("corridor").is_none());

        let mut voting_world = world(&[player(me, 500.0, 500.0)]);
        voting_world.voting = Some(VotingState::open(
            vec!["default_arena".to_string(), "corridor".to_string()],
            99,
        ));
        game.handle_message(snapshot(voting_world.clone(), None), 100);
        assert!(game.is_voting());

        assert!(game.cast_vote("neon_city").is_none());
        assert!(matches!(game.cast_vote("corridor"), Some(ClientMsg::VoteMap { .. })));
        assert_eq!(game.my_vote(), Some("corridor"));

        let mut votes = voting_world.voting.as_ref().unwrap().votes.clone();
        votes.insert("corridor".to_string(), 1);
        game.handle_message(ServerMsg::VoteUpdate { votes }, 110);
        assert_eq!(game.view().voting.as_ref().unwrap().votes["corridor"], 1);

        // Voting ends: obstacles refresh from the next snapshot
        let mut next_map = world(&[player(me, 500.0, 500.0)]);
        next_map.obstacles = crate::game::map::MapCatalog::default()
            .get("corridor")
            .unwrap()
            .obstacles
            .clone();
        game.handle_message(snapshot(next_map.clone(), None), 200);
        assert!(!game.is_voting());
        assert_eq!(game.obstacles(), &next_map.obstacles[..]);

        // A fresh voting phase forgets the previous choice
        game.handle_message(snapshot(voting_world, None), 300);
        assert_eq!(game.my_vote(), None);
    }

    #[test]
    fn test_shared_client_across_threads() {
        let me = Uuid::new_v4();
        let shared = SharedClient::new(joined(me, world(&[player(me, 500.0, 500.0)])));

        let network = shared.clone();
        let frame = serde_json::to_string(&snapshot(world(&[player(me, 500.0, 500.0)]), None)).unwrap();
        let frames = vec![frame; 20];
        let receiver = std::thread::spawn(move || {
            for (i, frame) in frames.iter().enumerate() {
                network.handle_frame(frame, i as u64 * 50).unwrap();
            }
        });

        for i in 0..20u64 {
            let sent = shared.frame(InputSnapshot::default(), i * 50, 0.016).unwrap();
            assert!(sent.is_some());
        }
        receiver.join().unwrap();

        assert_eq!(shared.with(|g| g.snapshots().len()), 10);
        assert!(shared.handle_frame("garbage", 0).is_err());
    }
}
