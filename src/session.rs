//! `SyncSession`: single owner of all client-side synchronization state.
//!
//! Every event source (input timer, display refresh, inbound messages) calls
//! into one `SyncSession` from one task, so a reconciliation always runs to
//! completion before the next frame reads any target.
//!
//! ```text
//! SyncSession
//!   ├── EntityStore        (store.rs)     ← players + projectiles
//!   ├── InputSequencer     (input.rs)     ← held keys, sequence numbers
//!   ├── PredictionEngine   (reconcile.rs) ← pending inputs, trim + replay
//!   ├── SnapshotApplier    (snapshot.rs)  ← full-snapshot diffing
//!   ├── RenderLoop         (interp.rs)    ← smoothing + draw delegation
//!   └── UiCollaborator     (ui.rs)        ← scoreboard, join prompt
//! ```

use std::cell::RefCell;
use std::rc::Rc;

use log::{debug, info, warn};
use serde_json::Value;

use crate::error::Result;
use crate::input::InputSequencer;
use crate::interp::{Interpolator, RenderLoop, Renderer};
use crate::protocol::{Envelope, GameConfig, InitGame, Inbound, MoveKey, Outbound};
use crate::reconcile::PredictionEngine;
use crate::snapshot::{PlayersDiff, ProjectilesDiff, SnapshotApplier};
use crate::store::{EntityKind, EntityStore};
use crate::types::{SyncConfig, SyncStats};
use crate::ui::{self, UiCollaborator};

/// What one inbound message changed, for callers that want to log it.
#[derive(Debug, Clone, PartialEq)]
pub enum Applied {
    Players(PlayersDiff),
    Projectiles(ProjectilesDiff),
    LocalId(String),
    Speed(f32),
}

pub struct SyncSession<U: UiCollaborator + 'static> {
    config: SyncConfig,
    store: EntityStore,
    sequencer: InputSequencer,
    engine: PredictionEngine,
    applier: SnapshotApplier,
    render: RenderLoop,
    ui: Rc<RefCell<U>>,
    local_id: Option<String>,
    input_stopped: bool,
    messages_dropped: u64,
}

impl<U: UiCollaborator + 'static> SyncSession<U> {
    pub fn new(config: SyncConfig, ui: Rc<RefCell<U>>) -> Self {
        let mut store = EntityStore::new();
        store.set_listener(ui::forward_to(ui.clone()));

        Self {
            sequencer: InputSequencer::new(config.speed),
            engine: PredictionEngine::new(),
            applier: SnapshotApplier::new(config.player_radius, config.projectile_radius),
            render: RenderLoop::new(Interpolator::new(config.smoothing)),
            store,
            ui,
            local_id: None,
            input_stopped: false,
            messages_dropped: 0,
            config,
        }
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn store(&self) -> &EntityStore {
        &self.store
    }

    pub fn engine(&self) -> &PredictionEngine {
        &self.engine
    }

    pub fn sequencer(&self) -> &InputSequencer {
        &self.sequencer
    }

    pub fn ui(&self) -> Rc<RefCell<U>> {
        self.ui.clone()
    }

    pub fn local_id(&self) -> Option<&str> {
        self.local_id.as_deref()
    }

    pub fn has_local_player(&self) -> bool {
        self.local_id
            .as_deref()
            .is_some_and(|id| self.store.contains(EntityKind::Player, id))
    }

    pub fn stats(&self) -> SyncStats {
        SyncStats {
            players: self.store.player_count(),
            projectiles: self.store.projectile_count(),
            pending_inputs: self.engine.pending_len(),
            last_sequence_number: self.sequencer.sequence_number(),
            last_ack: self.engine.last_ack(),
            frames_rendered: self.render.frames(),
            messages_dropped: self.messages_dropped,
        }
    }

    // -----------------------------------------------------------------------
    // Joining
    // -----------------------------------------------------------------------

    /// Transport-assigned id; the server keys the local player by it.
    pub fn assign_local_id(&mut self, id: impl Into<String>) {
        let id = id.into();
        info!("Local client id is {}", id);
        self.local_id = Some(id);
    }

    /// Hide the join prompt and build the `initGame` registration.
    pub fn join(&mut self, username: impl Into<String>) -> Outbound {
        self.ui.borrow_mut().hide_join_prompt();
        let (width, height) = self.config.viewport.scaled();
        let username = username.into();
        info!("Joining as '{}' ({}x{})", username, width, height);
        Outbound::InitGame(InitGame {
            width,
            height,
            device_pixel_ratio: self.config.viewport.device_pixel_ratio,
            username,
        })
    }

    // -----------------------------------------------------------------------
    // Inbound
    // -----------------------------------------------------------------------

    /// Decode and apply one framed message.
    ///
    /// A malformed or unknown message is counted, dropped and returned as an
    /// error; session state is untouched.
    pub fn handle_envelope(&mut self, envelope: Envelope) -> Result<Applied> {
        self.handle_message(&envelope.event, envelope.data)
    }

    pub fn handle_message(&mut self, event: &str, data: Value) -> Result<Applied> {
        match Inbound::decode(event, data) {
            Ok(inbound) => Ok(self.handle_inbound(inbound)),
            Err(e) => {
                self.messages_dropped += 1;
                Err(e)
            }
        }
    }

    pub fn handle_inbound(&mut self, inbound: Inbound) -> Applied {
        match inbound {
            Inbound::Players(snapshot) => {
                let diff = self.applier.apply_players(
                    &mut self.store,
                    &snapshot,
                    self.local_id.as_deref(),
                    &mut self.engine,
                );
                if diff.local_player_removed {
                    self.local_player_lost();
                }
                Applied::Players(diff)
            }
            Inbound::Projectiles(snapshot) => {
                Applied::Projectiles(self.applier.apply_projectiles(&mut self.store, &snapshot))
            }
            Inbound::Connected(c) => {
                self.assign_local_id(c.id.clone());
                Applied::LocalId(c.id)
            }
            Inbound::GameConfig(GameConfig { speed }) => {
                if speed.is_finite() && speed > 0.0 {
                    debug!("Server movement speed is {}", speed);
                    self.sequencer.set_speed(speed);
                } else {
                    warn!("Ignoring invalid movement speed {}", speed);
                }
                Applied::Speed(self.sequencer.speed())
            }
        }
    }

    fn local_player_lost(&mut self) {
        info!("Local player removed by server; showing join prompt");
        self.engine.reset();
        self.sequencer.release_all();
        self.ui.borrow_mut().show_join_prompt();
    }

    // -----------------------------------------------------------------------
    // Keyboard
    // -----------------------------------------------------------------------

    /// Returns `false` when ignored because the local player is absent.
    pub fn key_down(&mut self, key: MoveKey) -> bool {
        if !self.has_local_player() {
            return false;
        }
        self.sequencer.press(key);
        true
    }

    pub fn key_up(&mut self, key: MoveKey) -> bool {
        if !self.has_local_player() {
            return false;
        }
        self.sequencer.release(key);
        true
    }

    // -----------------------------------------------------------------------
    // Timers
    // -----------------------------------------------------------------------

    /// One input tick. Returns the `keydown` messages to send.
    pub fn input_tick(&mut self) -> Result<Vec<Outbound>> {
        if self.input_stopped || !self.has_local_player() {
            return Ok(Vec::new());
        }
        let inputs = self.sequencer.sample(&mut self.engine)?;
        Ok(inputs.into_iter().map(Outbound::KeyDown).collect())
    }

    /// The transport could not deliver a `keydown`; drop its pending input
    /// so later reconciliations do not replay it.
    pub fn discard_unsent(&mut self, outbound: &Outbound) {
        if let Outbound::KeyDown(input) = outbound {
            self.engine.discard(input.sequence_number);
        }
    }

    /// One display frame. Returns `false` after teardown.
    pub fn render_frame(&mut self, renderer: &mut dyn Renderer) -> bool {
        self.render.frame(&mut self.store, renderer)
    }

    // -----------------------------------------------------------------------
    // Shutdown
    // -----------------------------------------------------------------------

    /// Transport lost: drop all entity and input state and re-arm the join
    /// prompt. Timers keep running so a reconnect can reuse the session.
    pub fn disconnect(&mut self) {
        info!("Connection lost; resetting session state");
        self.store.clear();
        self.engine.reset();
        self.sequencer.release_all();
        self.local_id = None;
        self.ui.borrow_mut().show_join_prompt();
    }

    /// Stop the render loop and input sampling and clear all state.
    pub fn teardown(&mut self) {
        self.render.cancel();
        self.input_stopped = true;
        self.store.clear();
        self.engine.reset();
        self.sequencer.release_all();
        self.local_id = None;
    }

    pub fn is_torn_down(&self) -> bool {
        self.input_stopped && self.render.is_cancelled()
    }
}
