//! Per-frame interpolation and draw delegation.
//!
//! Each display frame moves every player a fixed fraction of the way toward
//! its target (`position += (target - position) * smoothing`). The remaining
//! distance shrinks geometrically and never overshoots for a factor in
//! `(0, 1]`. Projectiles are drawn where dead reckoning left them.

use log::{debug, trace};

use crate::store::{EntityKind, EntityStore};
use crate::types::Vec2;

// ---------------------------------------------------------------------------
// Rendering collaborator
// ---------------------------------------------------------------------------

/// Everything a renderer needs to draw one entity.
#[derive(Debug, Clone, PartialEq)]
pub struct Drawable<'a> {
    pub kind: EntityKind,
    pub id: &'a str,
    pub position: Vec2,
    pub radius: f32,
    /// `None` for projectiles whose owner is not known yet.
    pub color: Option<&'a str>,
}

pub trait Renderer {
    /// Called once per frame before any entity is drawn.
    fn begin_frame(&mut self) {}

    fn draw(&mut self, drawable: &Drawable<'_>);
}

// ---------------------------------------------------------------------------
// Interpolator
// ---------------------------------------------------------------------------

/// Move `position` a `factor` fraction of the way to `target`.
pub fn approach(position: Vec2, target: Vec2, factor: f32) -> Vec2 {
    position + (target - position) * factor
}

#[derive(Debug, Clone, Copy)]
pub struct Interpolator {
    pub smoothing: f32,
}

impl Default for Interpolator {
    fn default() -> Self {
        Self { smoothing: 0.5 }
    }
}

impl Interpolator {
    pub fn new(smoothing: f32) -> Self {
        Self {
            smoothing: smoothing.clamp(f32::EPSILON, 1.0),
        }
    }

    /// Advance every targeted player one frame.
    pub fn step(&self, store: &mut EntityStore) {
        for player in store.players_mut() {
            if let Some(target) = player.target {
                player.position = approach(player.position, target, self.smoothing);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Render loop
// ---------------------------------------------------------------------------

/// Frame driver. Once cancelled it never draws again.
#[derive(Debug)]
pub struct RenderLoop {
    interpolator: Interpolator,
    frames: u64,
    cancelled: bool,
}

impl RenderLoop {
    pub fn new(interpolator: Interpolator) -> Self {
        Self {
            interpolator,
            frames: 0,
            cancelled: false,
        }
    }

    /// Run one display frame. Returns `false` once the loop is cancelled,
    /// telling the caller to stop requesting frames.
    pub fn frame(&mut self, store: &mut EntityStore, renderer: &mut dyn Renderer) -> bool {
        if self.cancelled {
            return false;
        }

        self.interpolator.step(store);

        renderer.begin_frame();
        for player in store.players() {
            renderer.draw(&Drawable {
                kind: EntityKind::Player,
                id: &player.id,
                position: player.position,
                radius: player.radius,
                color: Some(player.color.as_str()),
            });
        }
        for projectile in store.projectiles() {
            renderer.draw(&Drawable {
                kind: EntityKind::Projectile,
                id: &projectile.id,
                position: projectile.position,
                radius: projectile.radius,
                color: projectile.color.as_deref(),
            });
        }

        self.frames += 1;
        trace!(
            "Frame {}: {} players, {} projectiles",
            self.frames,
            store.player_count(),
            store.projectile_count()
        );
        true
    }

    pub fn cancel(&mut self) {
        if !self.cancelled {
            debug!("Render loop cancelled after {} frames", self.frames);
        }
        self.cancelled = true;
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Player, Projectile};

    #[derive(Default)]
    struct Recorder {
        frames: usize,
        drawn: Vec<(EntityKind, String, Vec2, Option<String>)>,
    }

    impl Renderer for Recorder {
        fn begin_frame(&mut self) {
            self.frames += 1;
            self.drawn.clear();
        }

        fn draw(&mut self, d: &Drawable<'_>) {
            self.drawn
                .push((d.kind, d.id.to_string(), d.position, d.color.map(str::to_string)));
        }
    }

    fn store_with_target(position: Vec2, target: Option<Vec2>) -> EntityStore {
        let mut s = EntityStore::new();
        s.upsert_player(Player {
            id: "a".into(),
            position,
            target,
            radius: 10.0,
            color: "red".into(),
            username: "ana".into(),
            score: 0,
        });
        s
    }

    #[test]
    fn approach_halves_the_gap() {
        let p = approach(Vec2::new(0.0, 0.0), Vec2::new(8.0, -4.0), 0.5);
        assert_eq!(p, Vec2::new(4.0, -2.0));
    }

    #[test]
    fn player_without_target_stays_put() {
        let mut s = store_with_target(Vec2::new(3.0, 3.0), None);
        Interpolator::default().step(&mut s);
        assert_eq!(s.player("a").unwrap().position, Vec2::new(3.0, 3.0));
    }

    #[test]
    fn frame_draws_players_and_projectiles() {
        let mut s = store_with_target(Vec2::zero(), Some(Vec2::new(2.0, 0.0)));
        s.upsert_projectile(Projectile {
            id: "p1".into(),
            position: Vec2::new(7.0, 7.0),
            velocity: Vec2::new(1.0, 0.0),
            radius: 5.0,
            color: None,
            owner: "ghost".into(),
        });
        let mut loop_ = RenderLoop::new(Interpolator::default());
        let mut r = Recorder::default();

        assert!(loop_.frame(&mut s, &mut r));

        assert_eq!(r.frames, 1);
        assert_eq!(r.drawn.len(), 2);
        assert_eq!(
            r.drawn[0],
            (EntityKind::Player, "a".into(), Vec2::new(1.0, 0.0), Some("red".into()))
        );
        // Projectiles are not smoothed.
        assert_eq!(
            r.drawn[1],
            (EntityKind::Projectile, "p1".into(), Vec2::new(7.0, 7.0), None)
        );
    }

    #[test]
    fn cancelled_loop_stops_drawing() {
        let mut s = store_with_target(Vec2::zero(), Some(Vec2::new(2.0, 0.0)));
        let mut loop_ = RenderLoop::new(Interpolator::default());
        let mut r = Recorder::default();

        loop_.frame(&mut s, &mut r);
        loop_.cancel();
        loop_.cancel();

        assert!(!loop_.frame(&mut s, &mut r));
        assert_eq!(r.frames, 1);
        assert_eq!(loop_.frames(), 1);
        assert!(loop_.is_cancelled());
        assert_eq!(s.player("a").unwrap().position, Vec2::new(1.0, 0.0));
    }

    #[test]
    fn smoothing_factor_is_clamped() {
        assert_eq!(Interpolator::new(3.0).smoothing, 1.0);
        assert!(Interpolator::new(-1.0).smoothing > 0.0);
    }
}
