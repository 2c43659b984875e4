//! Arena maps - obstacle geometry and spawn points

use serde::{Deserialize, Serialize};

/// Visual kind of an obstacle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObstacleKind {
    Wall,
    Box,
}

/// Static axis-aligned rectangle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Obstacle {
    pub id: String,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    #[serde(rename = "type")]
    pub kind: ObstacleKind,
}

impl Obstacle {
    pub fn new(id: &str, x: f32, y: f32, width: f32, height: f32, kind: ObstacleKind) -> Self {
        Self {
            id: id.to_string(),
            x,
            y,
            width,
            height,
            kind,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpawnPoint {
    pub x: f32,
    pub y: f32,
}

/// One playable map
#[derive(Debug, Clone)]
pub struct MapData {
    pub id: String,
    pub name: String,
    pub obstacles: Vec<Obstacle>,
    pub spawn_points: Vec<SpawnPoint>,
}

/// Ordered set of maps. The first entry is the map a new lobby starts on.
#[derive(Debug, Clone)]
pub struct MapCatalog {
    maps: Vec<MapData>,
}

impl MapCatalog {
    /// Build a catalog; returns None for an empty list or a map without spawns
    pub fn new(maps: Vec<MapData>) -> Option<Self> {
        if maps.is_empty() || maps.iter().any(|m| m.spawn_points.is_empty()) {
            return None;
        }
        Some(Self { maps })
    }

    pub fn initial(&self) -> &MapData {
        &self.maps[0]
    }

    pub fn get(&self, id: &str) -> Option<&MapData> {
        self.maps.iter().find(|m| m.id == id)
    }

    /// Position of a map in catalog order
    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.maps.iter().position(|m| m.id == id)
    }

    pub fn by_index(&self, index: usize) -> Option<&MapData> {
        self.maps.get(index)
    }

    pub fn len(&self) -> usize {
        self.maps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.maps.is_empty()
    }
}

impl Default for MapCatalog {
    fn default() -> Self {
        use ObstacleKind::{Box, Wall};

        let spawn = |x, y| SpawnPoint { x, y };

        Self {
            maps: vec![
                MapData {
                    id: "default_arena".to_string(),
                    name: "Training Grounds".to_string(),
                    obstacles: vec![
                        Obstacle::new("w1", 400.0, 300.0, 50.0, 300.0, Wall),
                        Obstacle::new("w2", 1150.0, 300.0, 50.0, 300.0, Wall),
                        Obstacle::new("b1", 700.0, 400.0, 200.0, 100.0, Box),
                        Obstacle::new("b2", 200.0, 200.0, 100.0, 100.0, Box),
                        Obstacle::new("b3", 1300.0, 600.0, 100.0, 100.0, Box),
                    ],
                    spawn_points: vec![
                        spawn(100.0, 100.0),
                        spawn(1500.0, 800.0),
                        spawn(1500.0, 100.0),
                        spawn(100.0, 800.0),
                    ],
                },
                MapData {
                    id: "neon_city".to_string(),
                    name: "Neon City".to_string(),
                    obstacles: vec![
                        Obstacle::new("n1", 600.0, 100.0, 400.0, 50.0, Wall),
                        Obstacle::new("n2", 600.0, 750.0, 400.0, 50.0, Wall),
                        Obstacle::new("n3", 300.0, 300.0, 50.0, 300.0, Wall),
                        Obstacle::new("n4", 1250.0, 300.0, 50.0, 300.0, Wall),
                        Obstacle::new("c1", 750.0, 400.0, 100.0, 100.0, Box),
                    ],
                    spawn_points: vec![spawn(50.0, 450.0), spawn(1550.0, 450.0)],
                },
                MapData {
                    id: "corridor".to_string(),
                    name: "The Corridor".to_string(),
                    obstacles: vec![
                        Obstacle::new("l1", 0.0, 300.0, 1600.0, 50.0, Wall),
                        Obstacle::new("l2", 0.0, 550.0, 1600.0, 50.0, Wall),
                        Obstacle::new("c1", 400.0, 350.0, 50.0, 200.0, Box),
                        Obstacle::new("c2", 800.0, 350.0, 50.0, 200.0, Box),
                        Obstacle::new("c3", 1200.0, 350.0, 50.0, 200.0, Box),
                    ],
                    spawn_points: vec![spawn(50.0, 450.0), spawn(1550.0, 450.0)],
                },
            ],
        }
    }
}
