//! Weapon catalog - static per-weapon stats

use serde::{Deserialize, Serialize};

/// Weapons a player can equip
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeaponKind {
    /// Accurate sidearm
    Pistol,
    /// Fast fire, light damage
    Rifle,
    /// Fires a spread of pellets
    Shotgun,
}

impl Default for WeaponKind {
    fn default() -> Self {
        Self::Pistol
    }
}

/// Weapon stats per weapon kind
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeaponStats {
    /// Minimum time between shots (ms)
    pub fire_interval_ms: u64,
    /// Damage per projectile
    pub damage: i32,
    /// Projectile speed (units per second)
    pub projectile_speed: f32,
    /// Magazine size
    pub max_ammo: u32,
    /// Time to refill the magazine (ms)
    pub reload_ms: u64,
    /// Width of the spread cone (radians)
    pub spread: f32,
    /// Projectiles spawned per shot
    pub pellets: u32,
}

/// Immutable lookup table of weapon stats
#[derive(Debug, Clone)]
pub struct WeaponCatalog {
    pistol: WeaponStats,
    rifle: WeaponStats,
    shotgun: WeaponStats,
}

impl WeaponCatalog {
    pub fn new(pistol: WeaponStats, rifle: WeaponStats, shotgun: WeaponStats) -> Self {
        Self {
            pistol,
            rifle,
            shotgun,
        }
    }

    pub fn get(&self, kind: WeaponKind) -> &WeaponStats {
        match kind {
            WeaponKind::Pistol => &self.pistol,
            WeaponKind::Rifle => &self.rifle,
            WeaponKind::Shotgun => &self.shotgun,
        }
    }
}

impl Default for WeaponCatalog {
    fn default() -> Self {
        Self {
            pistol: WeaponStats {
                fire_interval_ms: 400,
                damage: 20,
                projectile_speed: 700.0,
                max_ammo: 12,
                reload_ms: 1500,
                spread: 0.05,
                pellets: 1,
            },
            rifle: WeaponStats {
                fire_interval_ms: 150,
                damage: 12,
                projectile_speed: 900.0,
                max_ammo: 30,
                reload_ms: 2000,
                spread: 0.1,
                pellets: 1,
            },
            shotgun: WeaponStats {
                fire_interval_ms: 1000,
                damage: 10,
                projectile_speed: 600.0,
                max_ammo: 6,
                reload_ms: 2500,
                spread: 0.3,
                pellets: 5,
            },
        }
    }
}
