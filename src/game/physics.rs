//! Player movement and collision helpers

use crate::input::{ActionSet, LogicalAction};

/// Player movement constants
#[derive(Debug, Clone, Copy)]
pub struct MoveStats {
    /// Top speed in pixels per second
    pub max_speed: f32,
    /// Acceleration in pixels per second squared
    pub acceleration: f32,
    /// Velocity multiplier applied per tick with no input on an axis
    pub drag: f32,
}

impl Default for MoveStats {
    fn default() -> Self {
        Self {
            max_speed: 320.0,
            acceleration: 2400.0,
            drag: 0.6,
        }
    }
}

/// Axis-aligned box, origin at the top-left corner
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl Aabb {
    pub fn center(&self) -> (f32, f32) {
        (self.x + self.w / 2.0, self.y + self.h / 2.0)
    }
}

pub struct PhysicsSystem;

impl PhysicsSystem {
    /// Direction of travel requested by the held actions, each axis in -1..=1
    pub fn input_axes(input: ActionSet) -> (f32, f32) {
        let axis = |neg: LogicalAction, pos: LogicalAction| -> f32 {
            match (input.contains(neg), input.contains(pos)) {
                (true, false) => -1.0,
                (false, true) => 1.0,
                _ => 0.0,
            }
        };
        (
            axis(LogicalAction::MoveLeft, LogicalAction::MoveRight),
            axis(LogicalAction::MoveUp, LogicalAction::MoveDown),
        )
    }

    /// Integrate velocity on one axis.
    /// Releasing the input bleeds speed off quickly instead of coasting.
    pub fn update_axis(vel: f32, axis: f32, stats: &MoveStats, dt: f32) -> f32 {
        let vel = if axis == 0.0 {
            let v = vel * stats.drag;
            if v.abs() < 1.0 {
                0.0
            } else {
                v
            }
        } else {
            vel + axis * stats.acceleration * dt
        };
        vel.clamp(-stats.max_speed, stats.max_speed)
    }

    /// Keep a box inside a `width` x `height` playfield.
    /// Returns which axes were clamped so the caller can zero velocity.
    pub fn clamp_to_bounds(b: &mut Aabb, width: f32, height: f32) -> (bool, bool) {
        let max_x = (width - b.w).max(0.0);
        let max_y = (height - b.h).max(0.0);
        let cx = b.x.clamp(0.0, max_x);
        let cy = b.y.clamp(0.0, max_y);
        let hit = (cx != b.x, cy != b.y);
        b.x = cx;
        b.y = cy;
        hit
    }

    /// Circle vs box overlap
    pub fn circle_hits_box(cx: f32, cy: f32, radius: f32, b: &Aabb) -> bool {
        let nx = cx.clamp(b.x, b.x + b.w);
        let ny = cy.clamp(b.y, b.y + b.h);
        let dx = cx - nx;
        let dy = cy - ny;
        dx * dx + dy * dy <= radius * radius
    }

    /// Circle vs circle overlap
    pub fn circles_overlap(x1: f32, y1: f32, r1: f32, x2: f32, y2: f32, r2: f32) -> bool {
        let dx = x2 - x1;
        let dy = y2 - y1;
        let combined = r1 + r2;
        dx * dx + dy * dy <= combined * combined
    }
}
