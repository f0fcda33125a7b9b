//! `EntityStore`: local mirror of every known player and projectile.
//!
//! Owned by the session and only touched from its task, so no locking.
//! Every creation, update and removal is reported to an injected listener;
//! that listener is the only path from entity data to presentation.

use std::collections::HashMap;

use log::debug;

use crate::types::Vec2;

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Player,
    Projectile,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Player {
    pub id: String,
    pub position: Vec2,
    /// Latest authoritative (or reconciled) position still being approached.
    pub target: Option<Vec2>,
    pub radius: f32,
    pub color: String,
    pub username: String,
    pub score: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Projectile {
    pub id: String,
    pub position: Vec2,
    pub velocity: Vec2,
    pub radius: f32,
    /// Inherited from the owning player once that player is known.
    pub color: Option<String>,
    pub owner: String,
}

impl Projectile {
    /// Advance one snapshot step along the current velocity.
    pub fn dead_reckon(&mut self) {
        self.position += self.velocity;
    }
}

/// Borrowed view of either entity variant.
#[derive(Debug, Clone, Copy)]
pub enum EntityRef<'a> {
    Player(&'a Player),
    Projectile(&'a Projectile),
}

impl EntityRef<'_> {
    pub fn kind(&self) -> EntityKind {
        match self {
            EntityRef::Player(_) => EntityKind::Player,
            EntityRef::Projectile(_) => EntityKind::Projectile,
        }
    }

    pub fn position(&self) -> Vec2 {
        match self {
            EntityRef::Player(p) => p.position,
            EntityRef::Projectile(p) => p.position,
        }
    }

    pub fn target(&self) -> Option<Vec2> {
        match self {
            EntityRef::Player(p) => p.target,
            EntityRef::Projectile(_) => None,
        }
    }

    pub fn radius(&self) -> f32 {
        match self {
            EntityRef::Player(p) => p.radius,
            EntityRef::Projectile(p) => p.radius,
        }
    }

    pub fn color(&self) -> Option<&str> {
        match self {
            EntityRef::Player(p) => Some(p.color.as_str()),
            EntityRef::Projectile(p) => p.color.as_deref(),
        }
    }
}

/// Whether an upsert created a new entity or refreshed an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    Created,
    Updated,
}

// ---------------------------------------------------------------------------
// Notifications
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum StoreEvent {
    PlayerAdded {
        id: String,
        username: String,
        score: u32,
    },
    PlayerUpdated {
        id: String,
        username: String,
        score: u32,
    },
    PlayerRemoved {
        id: String,
    },
    ProjectileAdded {
        id: String,
    },
    ProjectileRemoved {
        id: String,
    },
}

pub type StoreListener = Box<dyn FnMut(&StoreEvent)>;

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct EntityStore {
    /// Known players, keyed by id.
    players: HashMap<String, Player>,
    /// Known projectiles, keyed by id.
    projectiles: HashMap<String, Projectile>,
    listener: Option<StoreListener>,
}

impl std::fmt::Debug for EntityStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityStore")
            .field("players", &self.players)
            .field("projectiles", &self.projectiles)
            .field("listener", &self.listener.is_some())
            .finish()
    }
}

impl EntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_listener(&mut self, listener: impl FnMut(&StoreEvent) + 'static) {
        self.listener = Some(Box::new(listener));
    }

    fn notify(&mut self, event: StoreEvent) {
        if let Some(listener) = self.listener.as_mut() {
            listener(&event);
        }
    }

    // ------------------------------------------------------------------
    // Generic access
    // ------------------------------------------------------------------

    pub fn get(&self, kind: EntityKind, id: &str) -> Option<EntityRef<'_>> {
        match kind {
            EntityKind::Player => self.players.get(id).map(EntityRef::Player),
            EntityKind::Projectile => self.projectiles.get(id).map(EntityRef::Projectile),
        }
    }

    pub fn contains(&self, kind: EntityKind, id: &str) -> bool {
        match kind {
            EntityKind::Player => self.players.contains_key(id),
            EntityKind::Projectile => self.projectiles.contains_key(id),
        }
    }

    /// Visit every entity of one variant. Iteration order is unspecified.
    pub fn for_each(&self, kind: EntityKind, mut f: impl FnMut(&str, EntityRef<'_>)) {
        match kind {
            EntityKind::Player => {
                for (id, p) in &self.players {
                    f(id, EntityRef::Player(p));
                }
            }
            EntityKind::Projectile => {
                for (id, p) in &self.projectiles {
                    f(id, EntityRef::Projectile(p));
                }
            }
        }
    }

    /// Point an entity at a new target. Only players carry targets; returns
    /// `false` for projectiles and unknown ids.
    pub fn set_target(&mut self, kind: EntityKind, id: &str, target: Vec2) -> bool {
        match kind {
            EntityKind::Player => match self.players.get_mut(id) {
                Some(p) => {
                    p.target = Some(target);
                    true
                }
                None => false,
            },
            EntityKind::Projectile => false,
        }
    }

    /// Remove an entity. Missing ids are a no-op and emit nothing.
    pub fn remove(&mut self, kind: EntityKind, id: &str) -> bool {
        let removed = match kind {
            EntityKind::Player => self.players.remove(id).is_some(),
            EntityKind::Projectile => self.projectiles.remove(id).is_some(),
        };
        if removed {
            debug!("Removed {:?} {}", kind, id);
            let event = match kind {
                EntityKind::Player => StoreEvent::PlayerRemoved { id: id.to_string() },
                EntityKind::Projectile => StoreEvent::ProjectileRemoved { id: id.to_string() },
            };
            self.notify(event);
        }
        removed
    }

    // ------------------------------------------------------------------
    // Players
    // ------------------------------------------------------------------

    /// Insert a new player or refresh the mutable fields of a known one.
    ///
    /// On update only `score` changes; position, color and username are
    /// fixed at creation and the target is managed through [`set_target`].
    ///
    /// [`set_target`]: EntityStore::set_target
    pub fn upsert_player(&mut self, player: Player) -> Upsert {
        if let Some(existing) = self.players.get_mut(&player.id) {
            existing.score = player.score;
            let event = StoreEvent::PlayerUpdated {
                id: existing.id.clone(),
                username: existing.username.clone(),
                score: existing.score,
            };
            self.notify(event);
            return Upsert::Updated;
        }

        debug!("Added player {} ({}) at {}", player.id, player.username, player.position);
        let event = StoreEvent::PlayerAdded {
            id: player.id.clone(),
            username: player.username.clone(),
            score: player.score,
        };
        self.players.insert(player.id.clone(), player);
        self.notify(event);
        Upsert::Created
    }

    pub fn player(&self, id: &str) -> Option<&Player> {
        self.players.get(id)
    }

    pub fn players(&self) -> impl Iterator<Item = &Player> {
        self.players.values()
    }

    pub fn players_mut(&mut self) -> impl Iterator<Item = &mut Player> {
        self.players.values_mut()
    }

    pub fn player_ids(&self) -> Vec<String> {
        self.players.keys().cloned().collect()
    }

    // ------------------------------------------------------------------
    // Projectiles
    // ------------------------------------------------------------------

    /// Insert a new projectile, or dead-reckon a known one with the
    /// velocity carried by `projectile`.
    ///
    /// A known projectile that is still colorless takes `projectile.color`
    /// when one is supplied.
    pub fn upsert_projectile(&mut self, projectile: Projectile) -> Upsert {
        if let Some(existing) = self.projectiles.get_mut(&projectile.id) {
            existing.velocity = projectile.velocity;
            existing.dead_reckon();
            if existing.color.is_none() {
                existing.color = projectile.color;
            }
            return Upsert::Updated;
        }

        let id = projectile.id.clone();
        self.projectiles.insert(id.clone(), projectile);
        self.notify(StoreEvent::ProjectileAdded { id });
        Upsert::Created
    }

    pub fn projectile(&self, id: &str) -> Option<&Projectile> {
        self.projectiles.get(id)
    }

    pub fn projectiles(&self) -> impl Iterator<Item = &Projectile> {
        self.projectiles.values()
    }

    pub fn projectile_ids(&self) -> Vec<String> {
        self.projectiles.keys().cloned().collect()
    }

    // ------------------------------------------------------------------
    // Counts
    // ------------------------------------------------------------------

    pub fn player_count(&self) -> usize {
        self.players.len()
    }
    pub fn projectile_count(&self) -> usize {
        self.projectiles.len()
    }

    /// Reset all state (called on disconnect). Emits one removal per entity.
    pub fn clear(&mut self) {
        for id in self.player_ids() {
            self.remove(EntityKind::Player, &id);
        }
        for id in self.projectile_ids() {
            self.remove(EntityKind::Projectile, &id);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
