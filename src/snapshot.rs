//! Snapshot diffing: reconciles the [`EntityStore`] against full snapshots.
//!
//! Both snapshot kinds are *complete*: ids that appear are created or
//! updated, ids that are missing are destroyed. Applying the same snapshot
//! twice creates and removes nothing the second time.

use log::{debug, warn};

use crate::protocol::{PlayersSnapshot, ProjectilesSnapshot};
use crate::reconcile::{PredictionEngine, Reconciled};
use crate::store::{EntityKind, EntityStore, Player, Projectile, Upsert};

// ---------------------------------------------------------------------------
// Diff results
// ---------------------------------------------------------------------------

/// What a single `updatePlayers` message changed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlayersDiff {
    pub created: Vec<String>,
    pub updated: Vec<String>,
    pub removed: Vec<String>,
    /// The local player was in the store and is not in this snapshot.
    pub local_player_removed: bool,
    /// Result of reconciling the local player, if it was updated.
    pub reconciled: Option<Reconciled>,
}

/// What a single `updateProjectiles` message changed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProjectilesDiff {
    pub created: Vec<String>,
    pub updated: Vec<String>,
    pub removed: Vec<String>,
}

// ---------------------------------------------------------------------------
// Applier
// ---------------------------------------------------------------------------

/// Creation-time attributes the server does not send.
#[derive(Debug, Clone, Copy)]
pub struct SnapshotApplier {
    pub player_radius: f32,
    pub projectile_radius: f32,
}

impl Default for SnapshotApplier {
    fn default() -> Self {
        Self {
            player_radius: 10.0,
            projectile_radius: 5.0,
        }
    }
}

impl SnapshotApplier {
    pub fn new(player_radius: f32, projectile_radius: f32) -> Self {
        Self {
            player_radius,
            projectile_radius,
        }
    }

    /// Apply a full player snapshot.
    ///
    /// Known players get their authoritative position as interpolation
    /// target. For `local_id` that target is reconciled against the pending
    /// inputs in `engine` instead.
    pub fn apply_players(
        &self,
        store: &mut EntityStore,
        snapshot: &PlayersSnapshot,
        local_id: Option<&str>,
        engine: &mut PredictionEngine,
    ) -> PlayersDiff {
        let mut diff = PlayersDiff::default();

        for (id, state) in snapshot {
            let upsert = store.upsert_player(Player {
                id: id.clone(),
                position: state.position(),
                target: None,
                radius: self.player_radius,
                color: state.color.clone(),
                username: state.username.clone(),
                score: state.score,
            });

            if upsert == Upsert::Created {
                diff.created.push(id.clone());
                continue;
            }

            let target = if local_id == Some(id.as_str()) {
                match engine.reconcile(state.position(), state.sequence_number) {
                    Ok(r) => {
                        diff.reconciled = Some(r);
                        Some(r.target)
                    }
                    Err(e) => {
                        warn!("Skipping reconciliation for {}: {}", id, e);
                        None
                    }
                }
            } else {
                Some(state.position())
            };

            if let Some(target) = target {
                store.set_target(EntityKind::Player, id, target);
            }
            diff.updated.push(id.clone());
        }

        for id in store.player_ids() {
            if snapshot.contains_key(&id) {
                continue;
            }
            store.remove(EntityKind::Player, &id);
            if local_id == Some(id.as_str()) {
                debug!("Local player {} left the snapshot", id);
                diff.local_player_removed = true;
            }
            diff.removed.push(id);
        }

        diff
    }

    /// Apply a full projectile snapshot.
    ///
    /// Known projectiles advance by the velocity in the snapshot rather than
    /// snapping to its position. Color comes from the owning player when
    /// that player is already known.
    pub fn apply_projectiles(
        &self,
        store: &mut EntityStore,
        snapshot: &ProjectilesSnapshot,
    ) -> ProjectilesDiff {
        let mut diff = ProjectilesDiff::default();

        for (id, state) in snapshot {
            let color = store.player(&state.player_id).map(|p| p.color.clone());
            let upsert = store.upsert_projectile(Projectile {
                id: id.clone(),
                position: state.position(),
                velocity: state.velocity,
                radius: self.projectile_radius,
                color,
                owner: state.player_id.clone(),
            });

            match upsert {
                Upsert::Created => diff.created.push(id.clone()),
                Upsert::Updated => diff.updated.push(id.clone()),
            }
        }

        for id in store.projectile_ids() {
            if !snapshot.contains_key(&id) {
                store.remove(EntityKind::Projectile, &id);
                diff.removed.push(id);
            }
        }

        diff
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{PlayerState, ProjectileState};
    use crate::reconcile::PendingInput;
    use crate::store::StoreEvent;
    use crate::types::Vec2;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn player_state(x: f32, y: f32, score: u32, seq: u64) -> PlayerState {
        PlayerState {
            x,
            y,
            color: "hsl(120, 100%, 50%)".into(),
            username: "ana".into(),
            score,
            sequence_number: seq,
        }
    }

    fn projectile_state(owner: &str, vx: f32, vy: f32) -> ProjectileState {
        ProjectileState {
            x: 0.0,
            y: 0.0,
            player_id: owner.into(),
            velocity: Vec2::new(vx, vy),
        }
    }

    #[test]
    fn new_player_is_created_without_target() {
        let mut store = EntityStore::new();
        let mut engine = PredictionEngine::new();
        let snap = PlayersSnapshot::from([("abc".to_string(), player_state(1.0, 2.0, 0, 0))]);

        let diff = SnapshotApplier::default().apply_players(&mut store, &snap, None, &mut engine);

        assert_eq!(diff.created, vec!["abc"]);
        let p = store.player("abc").unwrap();
        assert_eq!(p.position, Vec2::new(1.0, 2.0));
        assert_eq!(p.target, None);
        assert_eq!(p.radius, 10.0);
    }

    #[test]
    fn known_remote_player_gets_target_and_score() {
        let mut store = EntityStore::new();
        let mut engine = PredictionEngine::new();
        let applier = SnapshotApplier::default();
        let first = PlayersSnapshot::from([("abc".to_string(), player_state(1.0, 2.0, 0, 0))]);
        let second = PlayersSnapshot::from([("abc".to_string(), player_state(8.0, 9.0, 3, 0))]);

        applier.apply_players(&mut store, &first, None, &mut engine);
        let diff = applier.apply_players(&mut store, &second, None, &mut engine);

        assert_eq!(diff.updated, vec!["abc"]);
        let p = store.player("abc").unwrap();
        assert_eq!(p.position, Vec2::new(1.0, 2.0));
        assert_eq!(p.target, Some(Vec2::new(8.0, 9.0)));
        assert_eq!(p.score, 3);
    }

    #[test]
    fn local_player_target_is_reconciled() {
        let mut store = EntityStore::new();
        let mut engine = PredictionEngine::new();
        let applier = SnapshotApplier::default();
        let join = PlayersSnapshot::from([("me".to_string(), player_state(100.0, 100.0, 0, 0))]);
        applier.apply_players(&mut store, &join, Some("me"), &mut engine);

        engine.record(PendingInput::new(1, 0.0, -5.0)).unwrap();
        engine.record(PendingInput::new(2, 0.0, -5.0)).unwrap();
        engine.record(PendingInput::new(3, 5.0, 0.0)).unwrap();

        let update = PlayersSnapshot::from([("me".to_string(), player_state(100.0, 100.0, 0, 2))]);
        let diff = applier.apply_players(&mut store, &update, Some("me"), &mut engine);

        assert_eq!(diff.reconciled.unwrap().trimmed, 2);
        assert_eq!(store.player("me").unwrap().target, Some(Vec2::new(105.0, 100.0)));
    }

    #[test]
    fn stale_ack_keeps_previous_target() {
        let mut store = EntityStore::new();
        let mut engine = PredictionEngine::new();
        let applier = SnapshotApplier::default();
        let snap = |x: f32, seq: u64| {
            PlayersSnapshot::from([("me".to_string(), player_state(x, 0.0, 0, seq))])
        };
        applier.apply_players(&mut store, &snap(0.0, 0), Some("me"), &mut engine);
        applier.apply_players(&mut store, &snap(10.0, 4), Some("me"), &mut engine);
        let diff = applier.apply_players(&mut store, &snap(3.0, 2), Some("me"), &mut engine);

        assert!(diff.reconciled.is_none());
        assert_eq!(store.player("me").unwrap().target, Some(Vec2::new(10.0, 0.0)));
    }

    #[test]
    fn missing_players_are_removed_and_local_loss_flagged() {
        let mut store = EntityStore::new();
        let mut engine = PredictionEngine::new();
        let applier = SnapshotApplier::default();
        let both = PlayersSnapshot::from([
            ("me".to_string(), player_state(0.0, 0.0, 0, 0)),
            ("other".to_string(), player_state(0.0, 0.0, 0, 0)),
        ]);
        applier.apply_players(&mut store, &both, Some("me"), &mut engine);

        let diff =
            applier.apply_players(&mut store, &PlayersSnapshot::new(), Some("me"), &mut engine);

        let mut removed = diff.removed.clone();
        removed.sort();
        assert_eq!(removed, vec!["me", "other"]);
        assert!(diff.local_player_removed);
        assert_eq!(store.player_count(), 0);
    }

    #[test]
    fn reapplying_snapshot_creates_and_removes_nothing() {
        let mut store = EntityStore::new();
        let mut engine = PredictionEngine::new();
        let applier = SnapshotApplier::default();
        let snap = PlayersSnapshot::from([
            ("a".to_string(), player_state(0.0, 0.0, 0, 0)),
            ("b".to_string(), player_state(5.0, 5.0, 1, 0)),
        ]);

        applier.apply_players(&mut store, &snap, None, &mut engine);
        let diff = applier.apply_players(&mut store, &snap, None, &mut engine);

        assert!(diff.created.is_empty());
        assert!(diff.removed.is_empty());
        assert_eq!(diff.updated.len(), 2);
    }

    #[test]
    fn projectile_inherits_owner_color() {
        let mut store = EntityStore::new();
        let mut engine = PredictionEngine::new();
        let applier = SnapshotApplier::default();
        applier.apply_players(
            &mut store,
            &PlayersSnapshot::from([("abc".to_string(), player_state(0.0, 0.0, 0, 0))]),
            None,
            &mut engine,
        );

        let snap = ProjectilesSnapshot::from([("p1".to_string(), projectile_state("abc", 1.0, 0.0))]);
        applier.apply_projectiles(&mut store, &snap);

        let p = store.projectile("p1").unwrap();
        assert_eq!(p.color.as_deref(), Some("hsl(120, 100%, 50%)"));
        assert_eq!(p.radius, 5.0);
    }

    #[test]
    fn orphan_projectile_resolves_color_once_owner_arrives() {
        let mut store = EntityStore::new();
        let mut engine = PredictionEngine::new();
        let applier = SnapshotApplier::default();
        let snap = ProjectilesSnapshot::from([("p1".to_string(), projectile_state("abc", 1.0, 0.0))]);

        applier.apply_projectiles(&mut store, &snap);
        assert_eq!(store.projectile("p1").unwrap().color, None);

        applier.apply_players(
            &mut store,
            &PlayersSnapshot::from([("abc".to_string(), player_state(0.0, 0.0, 0, 0))]),
            None,
            &mut engine,
        );
        applier.apply_projectiles(&mut store, &snap);
        assert!(store.projectile("p1").unwrap().color.is_some());
    }

    #[test]
    fn known_projectiles_advance_by_velocity() {
        let mut store = EntityStore::new();
        let applier = SnapshotApplier::default();
        let mut snap =
            ProjectilesSnapshot::from([("p1".to_string(), projectile_state("abc", 2.0, 1.0))]);

        applier.apply_projectiles(&mut store, &snap);
        // Reported position is ignored after creation.
        snap.get_mut("p1").unwrap().x = 500.0;
        let diff = applier.apply_projectiles(&mut store, &snap);
        applier.apply_projectiles(&mut store, &snap);

        assert_eq!(diff.updated, vec!["p1"]);
        assert_eq!(store.projectile("p1").unwrap().position, Vec2::new(4.0, 2.0));
    }

    #[test]
    fn omitted_projectile_is_removed() {
        let mut store = EntityStore::new();
        let applier = SnapshotApplier::default();
        let snap = ProjectilesSnapshot::from([
            ("p1".to_string(), projectile_state("abc", 0.0, 0.0)),
            ("p2".to_string(), projectile_state("abc", 0.0, 0.0)),
        ]);
        applier.apply_projectiles(&mut store, &snap);

        let next = ProjectilesSnapshot::from([("p2".to_string(), projectile_state("abc", 0.0, 0.0))]);
        let diff = applier.apply_projectiles(&mut store, &next);

        assert_eq!(diff.removed, vec!["p1"]);
        assert!(store.projectile("p1").is_none());
        assert!(store.projectile("p2").is_some());
    }

    #[test]
    fn reapplying_projectile_snapshot_adds_nothing_new() {
        let added = Rc::new(RefCell::new(0));
        let sink = added.clone();
        let mut store = EntityStore::new();
        store.set_listener(move |e| {
            if matches!(e, StoreEvent::ProjectileAdded { .. }) {
                *sink.borrow_mut() += 1;
            }
        });
        let applier = SnapshotApplier::default();
        let snap = ProjectilesSnapshot::from([
            ("p1".to_string(), projectile_state("abc", 1.0, 0.0)),
            ("p2".to_string(), projectile_state("abc", 0.0, 1.0)),
        ]);

        applier.apply_projectiles(&mut store, &snap);
        let diff = applier.apply_projectiles(&mut store, &snap);

        assert!(diff.created.is_empty());
        assert!(diff.removed.is_empty());
        assert_eq!(diff.updated.len(), 2);
        assert_eq!(*added.borrow(), 2);
        assert_eq!(store.projectile_count(), 2);
    }
}
