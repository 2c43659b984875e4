//! Movement rules and circle-vs-rectangle collision

use crate::ws::protocol::InputSnapshot;

use super::map::Obstacle;

/// Playable area, origin at the top-left corner
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Arena {
    pub width: f32,
    pub height: f32,
}

impl Arena {
    /// Clamp a circle centre so the whole circle stays inside the arena
    pub fn clamp_circle(&self, x: f32, y: f32, radius: f32) -> (f32, f32) {
        (
            x.max(radius).min(self.width - radius),
            y.max(radius).min(self.height - radius),
        )
    }

    /// Check if a point lies inside the arena (edges included)
    pub fn contains(&self, x: f32, y: f32) -> bool {
        x >= 0.0 && x <= self.width && y >= 0.0 && y <= self.height
    }
}

/// Physics system for player movement and obstacle tests
pub struct PhysicsSystem;

impl PhysicsSystem {
    /// Check if a circle overlaps a rectangle
    pub fn circle_intersects_rect(x: f32, y: f32, radius: f32, rect: &Obstacle) -> bool {
        // Closest point on the rectangle to the circle centre
        let closest_x = x.clamp(rect.x, rect.x + rect.width);
        let closest_y = y.clamp(rect.y, rect.y + rect.height);
        let dx = x - closest_x;
        let dy = y - closest_y;
        dx * dx + dy * dy < radius * radius
    }

    /// Check a circle against every obstacle
    pub fn collides_with_any(x: f32, y: f32, radius: f32, obstacles: &[Obstacle]) -> bool {
        obstacles
            .iter()
            .any(|rect| Self::circle_intersects_rect(x, y, radius, rect))
    }

    /// Check collision between two circles
    pub fn circles_overlap(x1: f32, y1: f32, radius1: f32, x2: f32, y2: f32, radius2: f32) -> bool {
        let dx = x2 - x1;
        let dy = y2 - y1;
        let combined_radius = radius1 + radius2;
        dx * dx + dy * dy < combined_radius * combined_radius
    }

    /// Normalized movement direction requested by an input, None when idle
    pub fn movement_direction(input: &InputSnapshot) -> Option<(f32, f32)> {
        let mut dx = 0.0f32;
        let mut dy = 0.0f32;
        if input.up {
            dy -= 1.0;
        }
        if input.down {
            dy += 1.0;
        }
        if input.left {
            dx -= 1.0;
        }
        if input.right {
            dx += 1.0;
        }

        let len = (dx * dx + dy * dy).sqrt();
        if len > 0.0 {
            Some((dx / len, dy / len))
        } else {
            None
        }
    }

    /// Distance covered by a normal (non-dash) step
    pub fn step_distance(base_distance: f32, sliding: bool, slide_multiplier: f32) -> f32 {
        if sliding {
            base_distance * slide_multiplier
        } else {
            base_distance
        }
    }

    /// Attempt a normal move. The destination is clamped to the arena and the
    /// move is rejected (position unchanged) if it would overlap an obstacle.
    /// Returns the resulting position and whether the move was applied.
    pub fn try_move(
        x: f32,
        y: f32,
        direction: (f32, f32),
        distance: f32,
        radius: f32,
        arena: &Arena,
        obstacles: &[Obstacle],
    ) -> ((f32, f32), bool) {
        let (next_x, next_y) =
            arena.clamp_circle(x + direction.0 * distance, y + direction.1 * distance, radius);

        if Self::collides_with_any(next_x, next_y, radius, obstacles) {
            ((x, y), false)
        } else {
            ((next_x, next_y), true)
        }
    }

    /// Client-side predicted step: same movement rule as the server without
    /// obstacles or dash
    pub fn predict_step(
        x: f32,
        y: f32,
        input: &InputSnapshot,
        distance: f32,
        slide_multiplier: f32,
        radius: f32,
        arena: &Arena,
    ) -> (f32, f32) {
        let (x, y) = match Self::movement_direction(input) {
            Some((dx, dy)) => {
                let step = Self::step_distance(distance, input.slide, slide_multiplier);
                (x + dx * step, y + dy * step)
            }
            None => (x, y),
        };
        arena.clamp_circle(x, y, radius)
    }
}
