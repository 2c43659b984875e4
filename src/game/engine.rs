//! Authoritative per-lobby simulation
//!
//! The engine is a plain state machine driven by its owner: every mutating
//! entry point takes the current wall-clock time in Unix milliseconds and
//! returns the messages that should leave the lobby. It never blocks and
//! never fails; requests naming unknown players are no-ops.

use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::ws::protocol::{HitSurface, InputSnapshot, ServerMsg};

use super::combat::{CombatSystem, HitResult, ProjectileFate};
use super::map::{MapData, SpawnPoint};
use super::physics::PhysicsSystem;
use super::timers::{TimerEvent, TimerQueue, TokenTable};
use super::voting::{draw_options, Ballot, VotingState};
use super::weapon::WeaponKind;
use super::world::{PlayerState, WorldState};
use super::GameConfig;

/// Lobby phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchPhase {
    /// Match running, movement and combat simulated
    Active,
    /// Between matches, players pick the next map
    Voting,
}

/// Outbound message produced by the engine
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatch {
    /// Every session in the lobby
    Broadcast(ServerMsg),
    /// A single player's session
    Direct { to: Uuid, msg: ServerMsg },
}

/// Result of one simulation step
#[derive(Debug, Default)]
pub struct TickOutcome {
    pub dispatches: Vec<Dispatch>,
    pub snapshot_due: bool,
}

/// Authoritative simulation for one lobby
pub struct Simulation {
    lobby_id: String,
    config: Arc<GameConfig>,
    rng: ChaCha8Rng,
    world: WorldState,
    map_index: usize,
    phase: MatchPhase,
    match_id: Uuid,
    server_tick: u64,
    /// Latest desired input per player
    inputs: HashMap<Uuid, InputSnapshot>,
    /// Sequence of the input last consumed by a tick, per player
    last_processed: HashMap<Uuid, u32>,
    /// Unix ms until which each player may not fire
    fire_cooldowns: HashMap<Uuid, u64>,
    /// Dead players and their current respawn token
    dead: HashMap<Uuid, u64>,
    next_respawn_token: u64,
    /// Reload in flight per player
    reloads: TokenTable,
    timers: TimerQueue,
    ballot: Ballot,
}

impl Simulation {
    /// Create a lobby simulation on the catalog's first map with a match
    /// starting at `now`
    pub fn new(lobby_id: impl Into<String>, config: Arc<GameConfig>, seed: u64, now: u64) -> Self {
        let obstacles = config.maps.initial().obstacles.clone();
        let match_end_time = now + config.match_duration_ms;

        Self {
            lobby_id: lobby_id.into(),
            rng: ChaCha8Rng::seed_from_u64(seed),
            world: WorldState::new(obstacles, match_end_time),
            map_index: 0,
            phase: MatchPhase::Active,
            match_id: Uuid::new_v4(),
            server_tick: 0,
            inputs: HashMap::new(),
            last_processed: HashMap::new(),
            fire_cooldowns: HashMap::new(),
            dead: HashMap::new(),
            next_respawn_token: 0,
            reloads: TokenTable::default(),
            timers: TimerQueue::new(),
            ballot: Ballot::default(),
            config,
        }
    }

    pub fn lobby_id(&self) -> &str {
        &self.lobby_id
    }

    pub fn world(&self) -> &WorldState {
        &self.world
    }

    pub fn phase(&self) -> MatchPhase {
        self.phase
    }

    pub fn server_tick(&self) -> u64 {
        self.server_tick
    }

    pub fn match_id(&self) -> Uuid {
        self.match_id
    }

    pub fn current_map(&self) -> &MapData {
        self.config
            .maps
            .by_index(self.map_index)
            .unwrap_or_else(|| self.config.maps.initial())
    }

    pub fn player_count(&self) -> usize {
        self.world.players.len()
    }

    /// Sequence of the latest input consumed for this player, if any
    pub fn last_processed(&self, player_id: &Uuid) -> Option<u32> {
        self.last_processed.get(player_id).copied()
    }

    pub fn is_dead(&self, player_id: &Uuid) -> bool {
        self.dead.contains_key(player_id)
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    /// Spawn a new player with the default loadout. Yields the join
    /// confirmation for that player's session.
    pub fn add_player(&mut self, id: Uuid, username: String, _now: u64) -> Vec<Dispatch> {
        if self.world.players.contains_key(&id) {
            debug!(lobby_id = %self.lobby_id, player_id = %id, "Player already in lobby");
            return Vec::new();
        }

        let (x, y) = self.spawn_position(false);
        let weapon = WeaponKind::default();
        let player = PlayerState::new(
            id,
            username,
            x,
            y,
            self.config.max_health,
            weapon,
            self.config.weapons.get(weapon),
        );
        self.world.players.insert(id, player);

        info!(
            lobby_id = %self.lobby_id,
            player_id = %id,
            player_count = self.world.players.len(),
            "Player joined lobby"
        );

        vec![Dispatch::Direct {
            to: id,
            msg: ServerMsg::LobbyJoined {
                player_id: id,
                lobby_id: self.lobby_id.clone(),
                initial_state: self.world.clone(),
            },
        }]
    }

    /// Drop every trace of a player. Projectiles they fired keep flying.
    pub fn remove_player(&mut self, id: Uuid) -> Vec<Dispatch> {
        if self.world.players.remove(&id).is_none() {
            return Vec::new();
        }
        self.inputs.remove(&id);
        self.last_processed.remove(&id);
        self.fire_cooldowns.remove(&id);
        self.dead.remove(&id);
        self.reloads.cancel(id);

        info!(
            lobby_id = %self.lobby_id,
            player_id = %id,
            player_count = self.world.players.len(),
            "Player left lobby"
        );

        match self.world.voting.as_mut() {
            Some(voting) => {
                let before = voting.total_votes();
                self.ballot.withdraw(voting, id);
                if voting.total_votes() != before {
                    return vec![Dispatch::Broadcast(ServerMsg::VoteUpdate {
                        votes: voting.votes.clone(),
                    })];
                }
                Vec::new()
            }
            None => Vec::new(),
        }
    }

    /// Replace the player's input slot. Inputs whose sequence does not
    /// advance past the stored one are dropped. Returns whether it was stored.
    pub fn handle_input(&mut self, id: Uuid, input: InputSnapshot) -> bool {
        if !self.world.players.contains_key(&id) {
            return false;
        }
        match self.inputs.get(&id) {
            Some(current) if input.seq <= current.seq => false,
            _ => {
                self.inputs.insert(id, input);
                true
            }
        }
    }

    /// Respawn immediately if the player is waiting on a respawn
    pub fn handle_respawn(&mut self, id: Uuid, _now: u64) -> Vec<Dispatch> {
        let mut out = Vec::new();
        if self.dead.contains_key(&id) {
            self.respawn_player(id, &mut out);
        }
        out
    }

    /// Swap the equipped weapon. Ammo is left alone; see [`Self::reset_loadout`].
    pub fn select_weapon(&mut self, id: Uuid, weapon: WeaponKind) {
        if let Some(player) = self.world.players.get_mut(&id) {
            player.weapon = weapon;
        }
    }

    /// Refill the magazine to the equipped weapon's capacity, abandoning
    /// any reload in flight
    pub fn reset_loadout(&mut self, id: Uuid) {
        if let Some(player) = self.world.players.get_mut(&id) {
            let stats = self.config.weapons.get(player.weapon);
            player.ammo = stats.max_ammo;
            player.max_ammo = stats.max_ammo;
            player.is_reloading = false;
            self.reloads.cancel(id);
        }
    }

    /// Record a map vote. Ignored outside voting or for maps not on offer.
    pub fn handle_vote(&mut self, id: Uuid, map_id: &str) -> Vec<Dispatch> {
        if self.phase != MatchPhase::Voting || !self.world.players.contains_key(&id) {
            return Vec::new();
        }
        let Some(voting) = self.world.voting.as_mut() else {
            return Vec::new();
        };
        if !self.ballot.cast(voting, id, map_id) {
            debug!(lobby_id = %self.lobby_id, player_id = %id, map_id, "Vote for map not on offer");
            return Vec::new();
        }

        vec![Dispatch::Broadcast(ServerMsg::VoteUpdate {
            votes: voting.votes.clone(),
        })]
    }

    /// Advance the lobby by one fixed step
    pub fn tick(&mut self, now: u64) -> TickOutcome {
        self.server_tick += 1;
        let mut out = Vec::new();

        for event in self.timers.pop_due(now) {
            self.apply_timer(event, &mut out);
        }

        match self.phase {
            MatchPhase::Active if now > self.world.match_end_time => self.start_voting(now),
            MatchPhase::Voting => {
                let closed = self.world.voting.as_ref().map_or(true, |v| now > v.end_time);
                if closed {
                    self.start_match(now, &mut out);
                }
            }
            MatchPhase::Active => {}
        }

        if self.phase == MatchPhase::Active {
            self.update_players(now);
            self.update_projectiles(now, &mut out);
        }

        for (id, input) in &self.inputs {
            self.last_processed.insert(*id, input.seq);
        }

        TickOutcome {
            dispatches: out,
            snapshot_due: true,
        }
    }

    fn apply_timer(&mut self, event: TimerEvent, out: &mut Vec<Dispatch>) {
        match event {
            TimerEvent::ReloadComplete { player_id, token } => {
                if !self.reloads.redeem(player_id, token) {
                    return;
                }
                if let Some(player) = self.world.players.get_mut(&player_id) {
                    player.ammo = player.max_ammo;
                    player.is_reloading = false;
                }
            }
            TimerEvent::DashReady { player_id } => {
                if let Some(player) = self.world.players.get_mut(&player_id) {
                    player.can_dash = true;
                }
            }
            TimerEvent::Respawn { player_id, token } => {
                if self.dead.get(&player_id) == Some(&token) {
                    self.respawn_player(player_id, out);
                }
            }
        }
    }

    /// Movement, facing, reload and firing for every living player with input
    fn update_players(&mut self, now: u64) {
        let config = Arc::clone(&self.config);
        let move_step = config.move_per_tick();
        let tick_secs = config.tick_secs();

        for (id, input) in &self.inputs {
            if self.dead.contains_key(id) {
                continue;
            }
            let Some(player) = self.world.players.get_mut(id) else {
                continue;
            };
            if player.is_dead {
                continue;
            }

            match PhysicsSystem::movement_direction(input) {
                Some((dx, dy)) if input.dash && player.can_dash => {
                    let (x, y) = config.arena.clamp_circle(
                        player.x + dx * config.dash_distance,
                        player.y + dy * config.dash_distance,
                        config.player_radius,
                    );
                    player.x = x;
                    player.y = y;
                    player.can_dash = false;
                    player.is_sliding = false;
                    self.timers
                        .schedule(now + config.dash_cooldown_ms, TimerEvent::DashReady { player_id: *id });
                }
                Some(direction) => {
                    let distance =
                        PhysicsSystem::step_distance(move_step, input.slide, config.slide_multiplier);
                    let ((x, y), moved) = PhysicsSystem::try_move(
                        player.x,
                        player.y,
                        direction,
                        distance,
                        config.player_radius,
                        &config.arena,
                        &self.world.obstacles,
                    );
                    player.x = x;
                    player.y = y;
                    player.is_sliding = moved && input.slide;
                }
                None => player.is_sliding = false,
            }

            let (x, y) = config.arena.clamp_circle(player.x, player.y, config.player_radius);
            player.x = x;
            player.y = y;
            player.angle = input.angle;

            let stats = config.weapons.get(player.weapon);

            if input.reload {
                begin_reload(player, stats.reload_ms, now, &mut self.timers, &mut self.reloads);
            }

            let cooldown = self.fire_cooldowns.get(id).copied().unwrap_or(0);
            if input.shoot && CombatSystem::can_fire(now, cooldown) && !player.is_reloading {
                if player.ammo > 0 {
                    player.ammo -= 1;
                    let speed = stats.projectile_speed * tick_secs;
                    for projectile in
                        CombatSystem::fire(player, stats, config.muzzle_offset(), speed, &mut self.rng)
                    {
                        self.world.projectiles.insert(projectile.id, projectile);
                    }
                    self.fire_cooldowns
                        .insert(*id, CombatSystem::next_cooldown(now, stats));
                } else {
                    begin_reload(player, stats.reload_ms, now, &mut self.timers, &mut self.reloads);
                }
            }
        }
    }

    /// Advance projectiles and resolve the first player hit for each
    fn update_projectiles(&mut self, now: u64, out: &mut Vec<Dispatch>) {
        let ids: Vec<Uuid> = self.world.projectiles.keys().copied().collect();
        let radius = self.config.projectile_radius;
        let reach = self.config.player_radius + radius;

        for projectile_id in ids {
            let Some(projectile) = self.world.projectiles.get_mut(&projectile_id) else {
                continue;
            };

            match CombatSystem::step_projectile(
                projectile,
                radius,
                &self.config.arena,
                &self.world.obstacles,
            ) {
                ProjectileFate::Flying => {}
                ProjectileFate::OutOfBounds | ProjectileFate::Wall => {
                    self.world.projectiles.remove(&projectile_id);
                    continue;
                }
            }

            let (px, py, owner_id, weapon) =
                (projectile.x, projectile.y, projectile.owner_id, projectile.weapon);

            let dead = &self.dead;
            let target = self
                .world
                .players
                .values()
                .find(|p| {
                    p.id != owner_id
                        && !p.is_dead
                        && !dead.contains_key(&p.id)
                        && PhysicsSystem::circles_overlap(px, py, 0.0, p.x, p.y, reach)
                })
                .map(|p| p.id);

            let Some(target_id) = target else {
                continue;
            };

            self.world.projectiles.remove(&projectile_id);
            let damage = self.config.weapons.get(weapon).damage;
            let Some(hit) = self.apply_hit(projectile_id, owner_id, target_id, damage) else {
                continue;
            };
            debug!(
                lobby_id = %self.lobby_id,
                projectile_id = %hit.projectile_id,
                shooter_id = %hit.shooter_id,
                target_id = %hit.target_id,
                damage = hit.damage,
                killed = hit.target_killed,
                "Projectile hit"
            );

            out.push(Dispatch::Direct {
                to: hit.shooter_id,
                msg: ServerMsg::BulletHit {
                    x: hit.x,
                    y: hit.y,
                    kind: HitSurface::Player,
                },
            });

            if hit.target_killed {
                self.handle_death(hit.target_id, hit.shooter_id, now, out);
            }
        }
    }

    fn apply_hit(
        &mut self,
        projectile_id: Uuid,
        shooter_id: Uuid,
        target_id: Uuid,
        damage: i32,
    ) -> Option<HitResult> {
        let target = self.world.players.get_mut(&target_id)?;
        let (health, killed) = CombatSystem::apply_damage(target.health, damage);
        target.health = health;

        Some(HitResult {
            projectile_id,
            shooter_id,
            target_id,
            damage,
            x: target.x,
            y: target.y,
            target_killed: killed,
        })
    }

    /// Count a death once, schedule the respawn and announce it
    fn handle_death(&mut self, victim_id: Uuid, killer_id: Uuid, now: u64, out: &mut Vec<Dispatch>) {
        if self.dead.contains_key(&victim_id) {
            return;
        }
        let Some(victim) = self.world.players.get_mut(&victim_id) else {
            return;
        };
        victim.deaths += 1;
        victim.is_dead = true;
        victim.is_sliding = false;
        let killed_name = victim.username.clone();

        let killer_name = match self.world.players.get_mut(&killer_id) {
            Some(killer) if killer_id != victim_id => {
                killer.kills += 1;
                killer.username.clone()
            }
            Some(killer) => killer.username.clone(),
            None => "World".to_string(),
        };

        self.next_respawn_token += 1;
        let token = self.next_respawn_token;
        self.dead.insert(victim_id, token);
        self.timers.schedule(
            now + self.config.respawn_delay_ms,
            TimerEvent::Respawn {
                player_id: victim_id,
                token,
            },
        );

        info!(
            lobby_id = %self.lobby_id,
            victim = %killed_name,
            killer = %killer_name,
            "Player killed"
        );

        out.push(Dispatch::Broadcast(ServerMsg::PlayerDeath {
            id: victim_id,
            killer_id,
            killer_name,
            killed_name,
        }));
    }

    fn respawn_player(&mut self, id: Uuid, out: &mut Vec<Dispatch>) {
        if !self.world.players.contains_key(&id) {
            return;
        }
        let (x, y) = self.spawn_position(true);
        let max_health = self.config.max_health;
        if let Some(player) = self.world.players.get_mut(&id) {
            player.health = max_health;
            player.is_dead = false;
            player.x = x;
            player.y = y;
        }
        self.dead.remove(&id);

        out.push(Dispatch::Direct {
            to: id,
            msg: ServerMsg::Respawn,
        });
    }

    /// Random spawn point of the current map, optionally jittered
    fn spawn_position(&mut self, jitter: bool) -> (f32, f32) {
        let config = Arc::clone(&self.config);
        let map = config
            .maps
            .by_index(self.map_index)
            .unwrap_or_else(|| config.maps.initial());
        let spawn = map
            .spawn_points
            .choose(&mut self.rng)
            .copied()
            .unwrap_or(SpawnPoint {
                x: config.arena.width / 2.0,
                y: config.arena.height / 2.0,
            });

        if !jitter {
            return (spawn.x, spawn.y);
        }

        let x = spawn.x + (self.rng.gen::<f32>() - 0.5) * config.spawn_jitter;
        let y = spawn.y + (self.rng.gen::<f32>() - 0.5) * config.spawn_jitter;
        config.arena.clamp_circle(x, y, config.player_radius)
    }

    fn start_voting(&mut self, now: u64) {
        self.ballot.clear();
        let options = draw_options(&self.config.maps, self.config.vote_options, &mut self.rng);
        let end_time = now + self.config.voting_duration_ms;

        info!(
            lobby_id = %self.lobby_id,
            match_id = %self.match_id,
            options = ?options,
            "Match ended, voting started"
        );

        self.world.voting = Some(VotingState::open(options, end_time));
        self.phase = MatchPhase::Voting;
    }

    fn start_match(&mut self, now: u64, out: &mut Vec<Dispatch>) {
        if let Some(voting) = self.world.voting.take() {
            let winner = voting
                .winner()
                .and_then(|id| self.config.maps.index_of(id));
            if let Some(index) = winner {
                self.map_index = index;
            }
        }
        self.ballot.clear();

        self.world.obstacles = self.current_map().obstacles.clone();
        self.world.projectiles.clear();
        self.world.match_end_time = now + self.config.match_duration_ms;
        self.dead.clear();
        self.fire_cooldowns.clear();
        self.reloads.clear();
        self.match_id = Uuid::new_v4();
        self.phase = MatchPhase::Active;

        let ids: Vec<Uuid> = self.world.players.keys().copied().collect();
        for id in ids {
            self.reset_loadout(id);
            if let Some(player) = self.world.players.get_mut(&id) {
                player.kills = 0;
                player.deaths = 0;
            }
            self.respawn_player(id, out);
        }

        info!(
            lobby_id = %self.lobby_id,
            match_id = %self.match_id,
            map = %self.current_map().id,
            "New match started"
        );
    }
}

/// Start a reload unless the magazine is full or one is already running
fn begin_reload(
    player: &mut PlayerState,
    reload_ms: u64,
    now: u64,
    timers: &mut TimerQueue,
    reloads: &mut TokenTable,
) {
    if player.ammo < player.max_ammo && !player.is_reloading {
        player.is_reloading = true;
        timers.schedule(
            now + reload_ms,
            TimerEvent::ReloadComplete {
                player_id: player.id,
                token: reloads.issue(player.id),
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::map::{MapCatalog, Obstacle, ObstacleKind};
    use crate::game::physics::Arena;
    use assert_approx_eq::assert_approx_eq;

    const T0: u64 = 1_000_000;

    fn open_config() -> GameConfig {
        let mut config = GameConfig::default();
        let mut maps = Vec::new();
        for index in 0..3 {
            let map = config.maps.by_index(index).unwrap().clone();
            maps.push(MapData {
                obstacles: Vec::new(),
                ..map
            });
        }
        config.maps = MapCatalog::new(maps).unwrap();
        config
    }

    fn sim_with(config: GameConfig) -> Simulation {
        Simulation::new("TEST01", Arc::new(config), 7, T0)
    }

    fn join(sim: &mut Simulation, name: &str) -> Uuid {
        let id = Uuid::new_v4();
        sim.add_player(id, name.to_string(), T0);
        id
    }

    fn place(sim: &mut Simulation, id: Uuid, x: f32, y: f32) {
        let player = sim.world.players.get_mut(&id).unwrap();
        player.x = x;
        player.y = y;
    }

    fn player(sim: &Simulation, id: Uuid) -> &PlayerState {
        &sim.world().players[&id]
    }

    fn input(seq: u32) -> InputSnapshot {
        InputSnapshot {
            seq,
            ..Default::default()
        }
    }

    #[test]
    fn test_add_player_spawns_with_pistol() {
        let mut sim = sim_with(GameConfig::default());
        let id = Uuid::new_v4();
        let out = sim.add_player(id, "ace".to_string(), T0);

        let spawns = &sim.current_map().spawn_points;
        let p = player(&sim, id);
        assert!(spawns.iter().any(|s| s.x == p.x && s.y == p.y));
        assert_eq!(p.weapon, WeaponKind::Pistol);
        assert_eq!(p.ammo, 12);
        assert!(p.can_dash);

        match &out[..] {
            [Dispatch::Direct {
                to,
                msg: ServerMsg::LobbyJoined { player_id, lobby_id, initial_state },
            }] => {
                assert_eq!(*to, id);
                assert_eq!(*player_id, id);
                assert_eq!(lobby_id, "TEST01");
                assert!(initial_state.players.contains_key(&id));
            }
            other => panic!("unexpected dispatches {:?}", other),
        }

        assert!(sim.add_player(id, "again".to_string(), T0).is_empty());
        assert_eq!(sim.player_count(), 1);
    }

    #[test]
    fn test_move_into_obstacle_is_rejected() {
        let mut config = open_config();
        let first = config.maps.initial().clone();
        config.maps = MapCatalog::new(vec![MapData {
            obstacles: vec![Obstacle::new("o", 90.0, 90.0, 20.0, 20.0, ObstacleKind::Box)],
            ..first
        }])
        .unwrap();
        let mut sim = sim_with(config);
        let id = join(&mut sim, "ace");
        place(&mut sim, id, 100.0, 140.0);

        sim.handle_input(
            id,
            InputSnapshot {
                up: true,
                seq: 1,
                ..Default::default()
            },
        );
        sim.tick(T0 + 50);

        let p = player(&sim, id);
        assert_approx_eq!(p.x, 100.0, 0.0001);
        assert_approx_eq!(p.y, 140.0, 0.0001);
        assert!(!p.is_sliding);
    }

    #[test]
    fn test_normal_and_slide_movement() {
        let mut sim = sim_with(open_config());
        let id = join(&mut sim, "ace");
        place(&mut sim, id, 800.0, 450.0);

        sim.handle_input(
            id,
            InputSnapshot {
                right: true,
                seq: 1,
                ..Default::default()
            },
        );
        sim.tick(T0 + 50);
        assert_approx_eq!(player(&sim, id).x, 812.5, 0.001);

        sim.handle_input(
            id,
            InputSnapshot {
                right: true,
                slide: true,
                seq: 2,
                ..Default::default()
            },
        );
        sim.tick(T0 + 100);
        assert_approx_eq!(player(&sim, id).x, 831.25, 0.001);
        assert!(player(&sim, id).is_sliding);
    }

    #[test]
    fn test_positions_stay_in_bounds() {
        let mut sim = sim_with(GameConfig::default());
        let id = join(&mut sim, "ace");
        let arena = Arena {
            width: 1600.0,
            height: 900.0,
        };
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let obstacles = sim.world().obstacles.clone();

        for seq in 1..400u32 {
            let input = InputSnapshot {
                up: rng.gen(),
                down: rng.gen(),
                left: rng.gen(),
                right: rng.gen(),
                slide: rng.gen(),
                seq,
                ..Default::default()
            };
            sim.handle_input(id, input);
            sim.tick(T0 + seq as u64 * 50);

            let p = player(&sim, id);
            assert!(p.x >= 20.0 && p.x <= arena.width - 20.0);
            assert!(p.y >= 20.0 && p.y <= arena.height - 20.0);
            assert!(!PhysicsSystem::collides_with_any(p.x, p.y, 20.0, &obstacles));
        }
    }

    #[test]
    fn test_dash_consumes_and_resets() {
        let mut sim = sim_with(open_config());
        let id = join(&mut sim, "ace");
        place(&mut sim, id, 800.0, 450.0);

        // No direction: nothing happens and the dash is kept
        sim.handle_input(
            id,
            InputSnapshot {
                dash: true,
                seq: 1,
                ..Default::default()
            },
        );
        sim.tick(T0 + 50);
        assert!(player(&sim, id).can_dash);

        sim.handle_input(
            id,
            InputSnapshot {
                left: true,
                dash: true,
                seq: 2,
                ..Default::default()
            },
        );
        sim.tick(T0 + 100);
        assert_approx_eq!(player(&sim, id).x, 780.0, 0.001);
        assert!(!player(&sim, id).can_dash);

        // Held dash falls back to normal movement while cooling down
        sim.tick(T0 + 150);
        assert_approx_eq!(player(&sim, id).x, 767.5, 0.001);

        sim.handle_input(id, input(3));
        sim.tick(T0 + 100 + 3000);
        assert!(player(&sim, id).can_dash);
    }

    #[test]
    fn test_pistol_fire_respects_interval() {
        let mut sim = sim_with(open_config());
        let id = join(&mut sim, "ace");
        place(&mut sim, id, 800.0, 450.0);
        sim.world.players.get_mut(&id).unwrap().ammo = 1;

        sim.handle_input(
            id,
            InputSnapshot {
                shoot: true,
                seq: 1,
                ..Default::default()
            },
        );
        sim.tick(T0 + 50);
        assert_eq!(player(&sim, id).ammo, 0);
        assert_eq!(sim.world().projectiles.len(), 1);

        // Second request inside the 400 ms interval spawns nothing and does
        // not auto-reload yet
        sim.tick(T0 + 100);
        assert_eq!(sim.world().projectiles.len(), 1);
        assert!(!player(&sim, id).is_reloading);

        // Once the interval has passed the empty magazine triggers a reload
        sim.tick(T0 + 500);
        assert!(player(&sim, id).is_reloading);
        sim.handle_input(id, input(2));
        sim.tick(T0 + 500 + 1500);
        assert_eq!(player(&sim, id).ammo, 12);
        assert!(!player(&sim, id).is_reloading);
    }

    #[test]
    fn test_shotgun_spawns_pellets() {
        let mut sim = sim_with(open_config());
        let id = join(&mut sim, "ace");
        place(&mut sim, id, 800.0, 450.0);
        sim.select_weapon(id, WeaponKind::Shotgun);
        sim.reset_loadout(id);
        assert_eq!(player(&sim, id).ammo, 6);

        sim.handle_input(
            id,
            InputSnapshot {
                shoot: true,
                seq: 1,
                ..Default::default()
            },
        );
        sim.tick(T0 + 50);
        assert_eq!(sim.world().projectiles.len(), 5);
        assert_eq!(player(&sim, id).ammo, 5);
    }

    #[test]
    fn test_reload_request() {
        let mut sim = sim_with(open_config());
        let id = join(&mut sim, "ace");

        // Full magazine: no reload
        sim.handle_input(
            id,
            InputSnapshot {
                reload: true,
                seq: 1,
                ..Default::default()
            },
        );
        sim.tick(T0 + 50);
        assert!(!player(&sim, id).is_reloading);

        sim.world.players.get_mut(&id).unwrap().ammo = 3;
        sim.tick(T0 + 100);
        assert!(player(&sim, id).is_reloading);
        sim.tick(T0 + 100 + 1500);
        assert_eq!(player(&sim, id).ammo, 12);
    }

    #[test]
    fn test_reload_timer_after_leave_is_noop() {
        let mut sim = sim_with(open_config());
        let id = join(&mut sim, "ace");
        sim.world.players.get_mut(&id).unwrap().ammo = 0;
        sim.handle_input(
            id,
            InputSnapshot {
                reload: true,
                seq: 1,
                ..Default::default()
            },
        );
        sim.tick(T0 + 50);
        assert_eq!(sim.pending_timers(), 1);

        sim.remove_player(id);
        let outcome = sim.tick(T0 + 5000);
        assert!(outcome.dispatches.is_empty());
        assert!(sim.world().players.is_empty());
    }

    #[test]
    fn test_weapon_switch_abandons_pending_reload() {
        let mut sim = sim_with(open_config());
        let id = join(&mut sim, "ace");
        place(&mut sim, id, 800.0, 450.0);
        sim.world.players.get_mut(&id).unwrap().ammo = 3;

        // Pistol reload due at T0 + 50 + 1500
        sim.handle_input(id, InputSnapshot { reload: true, seq: 1, ..Default::default() });
        sim.tick(T0 + 50);
        assert!(player(&sim, id).is_reloading);

        sim.select_weapon(id, WeaponKind::Shotgun);
        sim.reset_loadout(id);
        sim.handle_input(id, InputSnapshot { shoot: true, seq: 2, ..Default::default() });
        sim.tick(T0 + 200);
        assert_eq!(player(&sim, id).ammo, 5);

        // Shotgun reload due at T0 + 250 + 2500
        sim.handle_input(id, InputSnapshot { reload: true, seq: 3, ..Default::default() });
        sim.tick(T0 + 250);
        assert!(player(&sim, id).is_reloading);

        sim.tick(T0 + 1600);
        assert!(player(&sim, id).is_reloading);
        assert_eq!(player(&sim, id).ammo, 5);

        sim.tick(T0 + 2750);
        assert!(!player(&sim, id).is_reloading);
        assert_eq!(player(&sim, id).ammo, 6);
    }

    #[test]
    fn test_new_match_cancels_reload() {
        let mut sim = sim_with(GameConfig {
            voting_duration_ms: 500,
            ..GameConfig::default()
        });
        let id = join(&mut sim, "ace");
        sim.world.players.get_mut(&id).unwrap().ammo = 2;

        let end = sim.world().match_end_time;
        sim.handle_input(id, InputSnapshot { reload: true, seq: 1, ..Default::default() });
        sim.tick(end - 10);
        assert!(player(&sim, id).is_reloading);

        sim.tick(end + 1);
        let voting_end = sim.world().voting.as_ref().unwrap().end_time;
        sim.tick(voting_end + 1);
        assert_eq!(sim.phase(), MatchPhase::Active);
        assert!(!player(&sim, id).is_reloading);
        assert_eq!(player(&sim, id).ammo, 12);

        // Empty the magazine again; the old reload event must not refill it
        sim.world.players.get_mut(&id).unwrap().ammo = 0;
        sim.handle_input(id, InputSnapshot { seq: 2, ..Default::default() });
        // Pistol reload from the previous match was due at end + 1490
        sim.tick(voting_end + 1500);
        assert_eq!(player(&sim, id).ammo, 0);
        assert_eq!(sim.pending_timers(), 0);
    }

    #[test]
    fn test_hit_result_carries_projectile_and_damage() {
        let mut sim = sim_with(open_config());
        let shooter = join(&mut sim, "shooter");
        let victim = join(&mut sim, "victim");
        let projectile_id = Uuid::new_v4();

        let hit = sim.apply_hit(projectile_id, shooter, victim, 20).unwrap();
        assert_eq!(hit.projectile_id, projectile_id);
        assert_eq!(hit.damage, 20);
        assert!(!hit.target_killed);
        assert_eq!(player(&sim, victim).health, 80);

        assert!(sim.apply_hit(projectile_id, shooter, Uuid::new_v4(), 20).is_none());
    }

    #[test]
    fn test_killing_hit_counts_once() {
        let mut sim = sim_with(open_config());
        let shooter = join(&mut sim, "shooter");
        let victim = join(&mut sim, "victim");
        place(&mut sim, shooter, 200.0, 450.0);
        place(&mut sim, victim, 300.0, 450.0);
        sim.world.players.get_mut(&victim).unwrap().health = 15;

        sim.handle_input(
            shooter,
            InputSnapshot {
                shoot: true,
                seq: 1,
                ..Default::default()
            },
        );

        let mut dispatches = Vec::new();
        for step in 1..=40u64 {
            dispatches.extend(sim.tick(T0 + step * 50).dispatches);
            if sim.is_dead(&victim) {
                break;
            }
        }

        let v = player(&sim, victim);
        assert_eq!(v.health, -5);
        assert!(v.is_dead);
        assert_eq!(v.deaths, 1);
        assert_eq!(player(&sim, shooter).kills, 1);

        let deaths: Vec<_> = dispatches
            .iter()
            .filter(|d| matches!(d, Dispatch::Broadcast(ServerMsg::PlayerDeath { .. })))
            .collect();
        assert_eq!(deaths.len(), 1);
        assert!(dispatches.iter().any(|d| matches!(
            d,
            Dispatch::Direct { to, msg: ServerMsg::BulletHit { kind: HitSurface::Player, .. } } if *to == shooter
        )));

        // Duplicate death handling does nothing
        let mut extra = Vec::new();
        sim.handle_death(victim, shooter, T0 + 3000, &mut extra);
        assert!(extra.is_empty());
        assert_eq!(player(&sim, victim).deaths, 1);
        assert_eq!(player(&sim, shooter).kills, 1);
    }

    #[test]
    fn test_dead_player_is_not_hit() {
        let mut sim = sim_with(open_config());
        let shooter = join(&mut sim, "shooter");
        let victim = join(&mut sim, "victim");
        place(&mut sim, shooter, 200.0, 450.0);
        place(&mut sim, victim, 300.0, 450.0);

        let mut out = Vec::new();
        sim.handle_death(victim, shooter, T0, &mut out);
        let health = player(&sim, victim).health;

        sim.handle_input(
            shooter,
            InputSnapshot {
                shoot: true,
                seq: 1,
                ..Default::default()
            },
        );
        for step in 1..=10u64 {
            sim.tick(T0 + step * 50);
        }
        assert_eq!(player(&sim, victim).health, health);
    }

    #[test]
    fn test_killer_who_left_is_named_world() {
        let mut sim = sim_with(open_config());
        let victim = join(&mut sim, "victim");
        let mut out = Vec::new();
        sim.handle_death(victim, Uuid::new_v4(), T0, &mut out);

        match &out[..] {
            [Dispatch::Broadcast(ServerMsg::PlayerDeath { killer_name, killed_name, .. })] => {
                assert_eq!(killer_name, "World");
                assert_eq!(killed_name, "victim");
            }
            other => panic!("unexpected dispatches {:?}", other),
        }
    }

    #[test]
    fn test_timed_respawn_only_to_respawned_player() {
        let mut sim = sim_with(open_config());
        let victim = join(&mut sim, "victim");
        let _other = join(&mut sim, "other");
        sim.world.players.get_mut(&victim).unwrap().health = -5;

        let mut out = Vec::new();
        sim.handle_death(victim, Uuid::new_v4(), T0, &mut out);

        assert!(sim.tick(T0 + 2999).dispatches.is_empty());
        let outcome = sim.tick(T0 + 3000);
        assert_eq!(
            outcome.dispatches,
            vec![Dispatch::Direct {
                to: victim,
                msg: ServerMsg::Respawn
            }]
        );
        let p = player(&sim, victim);
        assert!(!p.is_dead);
        assert_eq!(p.health, 100);
        assert!(!sim.is_dead(&victim));
    }

    #[test]
    fn test_explicit_respawn_cancels_timer() {
        let mut sim = sim_with(open_config());
        let victim = join(&mut sim, "victim");

        // Alive: ignored
        assert!(sim.handle_respawn(victim, T0).is_empty());

        let mut out = Vec::new();
        sim.handle_death(victim, Uuid::new_v4(), T0, &mut out);
        assert_eq!(sim.handle_respawn(victim, T0 + 500).len(), 1);

        // Killed again before the first timer fires; that stale timer must not
        // bring the player back early
        sim.handle_death(victim, Uuid::new_v4(), T0 + 1000, &mut out);
        assert!(sim.tick(T0 + 3000).dispatches.is_empty());
        assert!(sim.is_dead(&victim));
        assert_eq!(sim.tick(T0 + 4000).dispatches.len(), 1);
        assert!(!sim.is_dead(&victim));
    }

    #[test]
    fn test_stale_input_is_ignored() {
        let mut sim = sim_with(open_config());
        let id = join(&mut sim, "ace");
        assert!(sim.handle_input(id, input(5)));
        assert!(!sim.handle_input(id, input(5)));
        assert!(!sim.handle_input(id, input(3)));
        assert!(!sim.handle_input(Uuid::new_v4(), input(9)));

        assert_eq!(sim.last_processed(&id), None);
        sim.tick(T0 + 50);
        assert_eq!(sim.last_processed(&id), Some(5));
    }

    #[test]
    fn test_voting_round_switches_map_and_revives() {
        let mut sim = sim_with(GameConfig::default());
        let players: Vec<Uuid> = (0..5).map(|i| join(&mut sim, &format!("p{}", i))).collect();

        {
            let p = sim.world.players.get_mut(&players[0]).unwrap();
            p.kills = 4;
            p.health = 30;
        }
        let mut out = Vec::new();
        sim.handle_death(players[1], players[0], T0, &mut out);

        let end = sim.world().match_end_time;
        sim.tick(end + 1);
        assert_eq!(sim.phase(), MatchPhase::Voting);
        let voting = sim.world().voting.clone().unwrap();
        assert_eq!(voting.options.len(), 3);
        assert_eq!(voting.total_votes(), 0);

        for (player, map) in players.iter().zip(["default_arena", "default_arena", "neon_city", "neon_city", "neon_city"]) {
            let update = sim.handle_vote(*player, map);
            assert_eq!(update.len(), 1);
        }
        assert_eq!(sim.world().voting.as_ref().unwrap().votes["neon_city"], 3);

        // Movement is suspended while voting
        let before = (player(&sim, players[2]).x, player(&sim, players[2]).y);
        sim.handle_input(
            players[2],
            InputSnapshot {
                right: true,
                seq: 1,
                ..Default::default()
            },
        );
        sim.tick(end + 100);
        assert_eq!((player(&sim, players[2]).x, player(&sim, players[2]).y), before);

        let outcome = sim.tick(voting.end_time + 1);
        assert_eq!(sim.phase(), MatchPhase::Active);
        assert_eq!(sim.current_map().id, "neon_city");
        assert_eq!(sim.world().obstacles, sim.current_map().obstacles);
        assert!(sim.world().voting.is_none());
        assert!(sim.world().projectiles.is_empty());

        for id in &players {
            let p = player(&sim, *id);
            assert_eq!(p.health, 100);
            assert!(!p.is_dead);
            assert_eq!(p.kills, 0);
            assert_eq!(p.deaths, 0);
        }
        let respawns = outcome
            .dispatches
            .iter()
            .filter(|d| matches!(d, Dispatch::Direct { msg: ServerMsg::Respawn, .. }))
            .count();
        assert_eq!(respawns, players.len());
    }

    #[test]
    fn test_vote_ignored_outside_voting() {
        let mut sim = sim_with(GameConfig::default());
        let id = join(&mut sim, "ace");
        assert!(sim.handle_vote(id, "neon_city").is_empty());
    }

    #[test]
    fn test_leaving_voter_updates_tally() {
        let mut sim = sim_with(GameConfig::default());
        let a = join(&mut sim, "a");
        let b = join(&mut sim, "b");
        let end = sim.world().match_end_time;
        sim.tick(end + 1);

        let option = sim.world().voting.as_ref().unwrap().options[0].clone();
        sim.handle_vote(a, &option);
        sim.handle_vote(b, &option);
        let out = sim.remove_player(a);
        assert_eq!(out.len(), 1);
        assert_eq!(sim.world().voting.as_ref().unwrap().total_votes(), 1);
        assert!(sim.handle_vote(a, &option).is_empty());
    }

    #[test]
    fn test_snapshot_due_every_tick() {
        let mut sim = sim_with(GameConfig::default());
        assert!(sim.tick(T0 + 50).snapshot_due);
        let end = sim.world().match_end_time;
        assert!(sim.tick(end + 1).snapshot_due);
        assert_eq!(sim.server_tick(), 2);
    }
}
