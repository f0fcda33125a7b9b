//! Core types shared across all modules.

use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign, Mul, Sub};

// ---------------------------------------------------------------------------
// Basic math
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn zero() -> Self {
        Self::new(0.0, 0.0)
    }

    pub fn length(self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    pub fn distance(self, other: Vec2) -> f32 {
        (other - self).length()
    }
}

impl Add for Vec2 {
    type Output = Vec2;

    fn add(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl AddAssign for Vec2 {
    fn add_assign(&mut self, rhs: Vec2) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

impl Sub for Vec2 {
    type Output = Vec2;

    fn sub(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f32> for Vec2 {
    type Output = Vec2;

    fn mul(self, rhs: f32) -> Vec2 {
        Vec2::new(self.x * rhs, self.y * rhs)
    }
}

impl std::fmt::Display for Vec2 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.2}, {:.2})", self.x, self.y)
    }
}

// ---------------------------------------------------------------------------
// Viewport
// ---------------------------------------------------------------------------

/// Logical canvas size plus the device pixel ratio used to scale it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
    pub device_pixel_ratio: f32,
}

impl Viewport {
    /// Backing-store size in physical pixels.
    pub fn scaled(&self) -> (f32, f32) {
        (
            self.width * self.device_pixel_ratio,
            self.height * self.device_pixel_ratio,
        )
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1024.0,
            height: 576.0,
            device_pixel_ratio: 1.0,
        }
    }
}

// ---------------------------------------------------------------------------
// Stats & config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SyncStats {
    pub players: usize,
    pub projectiles: usize,
    pub pending_inputs: usize,
    pub last_sequence_number: u64,
    pub last_ack: Option<u64>,
    pub frames_rendered: u64,
    pub messages_dropped: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SyncConfig {
    /// Displacement applied per held key per input tick, in world units.
    pub speed: f32,
    /// Input sampling period in milliseconds.
    pub input_interval_ms: u64,
    /// Target render period in milliseconds (headless clients only).
    pub frame_interval_ms: u64,
    /// Fraction of the remaining distance covered each frame.
    pub smoothing: f32,
    pub player_radius: f32,
    pub projectile_radius: f32,
    pub viewport: Viewport,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            speed: 5.0,
            input_interval_ms: 15,
            frame_interval_ms: 16,
            smoothing: 0.5,
            player_radius: 10.0,
            projectile_radius: 5.0,
            viewport: Viewport::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vec2_arithmetic() {
        let a = Vec2::new(1.0, 2.0);
        let b = Vec2::new(3.0, -4.0);
        assert_eq!(a + b, Vec2::new(4.0, -2.0));
        assert_eq!(b - a, Vec2::new(2.0, -6.0));
        assert_eq!(a * 2.0, Vec2::new(2.0, 4.0));

        let mut c = a;
        c += b;
        assert_eq!(c, Vec2::new(4.0, -2.0));
    }

    #[test]
    fn vec2_distance() {
        let a = Vec2::zero();
        let b = Vec2::new(3.0, 4.0);
        assert!((a.distance(b) - 5.0).abs() < f32::EPSILON);
    }

    #[test]
    fn viewport_scales_by_pixel_ratio() {
        let vp = Viewport {
            device_pixel_ratio: 2.0,
            ..Default::default()
        };
        assert_eq!(vp.scaled(), (2048.0, 1152.0));
    }

    #[test]
    fn partial_config_fills_defaults() {
        let cfg: SyncConfig = serde_json::from_str(r#"{"speed": 7.5}"#).unwrap();
        assert_eq!(cfg.speed, 7.5);
        assert_eq!(cfg.input_interval_ms, 15);
        assert_eq!(cfg.smoothing, 0.5);
    }
}
