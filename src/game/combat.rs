//! Combat system - firing, projectiles, damage

use rand::Rng;
use uuid::Uuid;

use super::physics::{Arena, PhysicsSystem};
use super::map::Obstacle;
use super::weapon::WeaponStats;
use super::world::{PlayerState, Projectile};

impl Projectile {
    /// Create a projectile travelling along `direction` at `speed` units per tick
    pub fn new(owner: &PlayerState, x: f32, y: f32, direction: f32, speed: f32) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_id: owner.id,
            weapon: owner.weapon,
            x,
            y,
            vx: direction.cos() * speed,
            vy: direction.sin() * speed,
        }
    }

    /// Advance by one tick of velocity
    pub fn advance(&mut self) {
        self.x += self.vx;
        self.y += self.vy;
    }
}

/// What stopped a projectile this tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectileFate {
    /// Still flying
    Flying,
    /// Left the arena
    OutOfBounds,
    /// Hit an obstacle
    Wall,
}

/// Hit result from combat resolution
#[derive(Debug, Clone)]
pub struct HitResult {
    pub projectile_id: Uuid,
    pub shooter_id: Uuid,
    pub target_id: Uuid,
    pub damage: i32,
    pub x: f32,
    pub y: f32,
    pub target_killed: bool,
}

/// Combat system for managing weapons and damage
pub struct CombatSystem;

impl CombatSystem {
    /// Check if a player can fire (cooldown elapsed)
    pub fn can_fire(now: u64, cooldown_until: u64) -> bool {
        now > cooldown_until
    }

    /// Cooldown deadline to set after firing
    pub fn next_cooldown(now: u64, stats: &WeaponStats) -> u64 {
        now + stats.fire_interval_ms
    }

    /// Spawn one shot's projectiles from the muzzle, each perturbed uniformly
    /// within the weapon's spread cone
    pub fn fire<R: Rng>(
        owner: &PlayerState,
        stats: &WeaponStats,
        muzzle_offset: f32,
        speed_per_tick: f32,
        rng: &mut R,
    ) -> Vec<Projectile> {
        let muzzle_x = owner.x + owner.angle.cos() * muzzle_offset;
        let muzzle_y = owner.y + owner.angle.sin() * muzzle_offset;

        (0..stats.pellets.max(1))
            .map(|_| {
                let direction = owner.angle + (rng.gen::<f32>() - 0.5) * stats.spread;
                Projectile::new(owner, muzzle_x, muzzle_y, direction, speed_per_tick)
            })
            .collect()
    }

    /// Move a projectile one tick and test it against the arena and obstacles
    pub fn step_projectile(
        projectile: &mut Projectile,
        radius: f32,
        arena: &Arena,
        obstacles: &[Obstacle],
    ) -> ProjectileFate {
        projectile.advance();

        if !arena.contains(projectile.x, projectile.y) {
            ProjectileFate::OutOfBounds
        } else if PhysicsSystem::collides_with_any(projectile.x, projectile.y, radius, obstacles) {
            ProjectileFate::Wall
        } else {
            ProjectileFate::Flying
        }
    }

    /// Apply damage to health, returns (new_health, is_dead)
    pub fn apply_damage(current_health: i32, damage: i32) -> (i32, bool) {
        let new_health = current_health - damage;
        (new_health, new_health <= 0)
    }
}
