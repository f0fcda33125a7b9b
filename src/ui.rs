//! UI collaborator contract and a headless scoreboard.
//!
//! Presentation only ever reacts to [`StoreEvent`]s; [`forward_to`] turns a
//! UI handle into the listener the [`EntityStore`] expects.
//!
//! [`EntityStore`]: crate::store::EntityStore

use std::cell::RefCell;
use std::rc::Rc;

use crate::store::{StoreEvent, StoreListener};

pub trait UiCollaborator {
    fn add_player_row(&mut self, id: &str, username: &str, score: u32);
    fn update_player_row(&mut self, id: &str, username: &str, score: u32);
    fn remove_player_row(&mut self, id: &str);
    fn show_join_prompt(&mut self);
    fn hide_join_prompt(&mut self);
}

/// Build a store listener that mirrors player lifecycle into `ui`.
pub fn forward_to<U: UiCollaborator + 'static>(ui: Rc<RefCell<U>>) -> StoreListener {
    Box::new(move |event: &StoreEvent| {
        let mut ui = ui.borrow_mut();
        match event {
            StoreEvent::PlayerAdded {
                id,
                username,
                score,
            } => ui.add_player_row(id, username, *score),
            StoreEvent::PlayerUpdated {
                id,
                username,
                score,
            } => ui.update_player_row(id, username, *score),
            StoreEvent::PlayerRemoved { id } => ui.remove_player_row(id),
            StoreEvent::ProjectileAdded { .. } | StoreEvent::ProjectileRemoved { .. } => {}
        }
    })
}

// ---------------------------------------------------------------------------
// Headless scoreboard
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreRow {
    pub id: String,
    pub username: String,
    pub score: u32,
}

impl std::fmt::Display for ScoreRow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.username, self.score)
    }
}

/// Scoreboard rows kept sorted by score, highest first, plus the join
/// prompt visibility.
#[derive(Debug, Clone)]
pub struct Scoreboard {
    rows: Vec<ScoreRow>,
    join_prompt_visible: bool,
}

impl Default for Scoreboard {
    fn default() -> Self {
        Self {
            rows: Vec::new(),
            join_prompt_visible: true,
        }
    }
}

impl Scoreboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rows(&self) -> &[ScoreRow] {
        &self.rows
    }

    pub fn join_prompt_visible(&self) -> bool {
        self.join_prompt_visible
    }

    fn sort(&mut self) {
        // Stable, so equal scores keep insertion order.
        self.rows.sort_by(|a, b| b.score.cmp(&a.score));
    }
}

impl UiCollaborator for Scoreboard {
    fn add_player_row(&mut self, id: &str, username: &str, score: u32) {
        self.rows.retain(|r| r.id != id);
        self.rows.push(ScoreRow {
            id: id.to_string(),
            username: username.to_string(),
            score,
        });
        self.sort();
    }

    fn update_player_row(&mut self, id: &str, username: &str, score: u32) {
        if let Some(row) = self.rows.iter_mut().find(|r| r.id == id) {
            row.username = username.to_string();
            row.score = score;
            self.sort();
        }
    }

    fn remove_player_row(&mut self, id: &str) {
        self.rows.retain(|r| r.id != id);
    }

    fn show_join_prompt(&mut self) {
        self.join_prompt_visible = true;
    }

    fn hide_join_prompt(&mut self) {
        self.join_prompt_visible = false;
    }
}
