//! Fixed-tick input sampling.
//!
//! Held keys are sampled every `input_interval_ms`, independent of the
//! render rate. Each held key produces its own sequence number, a pending
//! input recorded for prediction, and one `keydown` message. The
//! displacement never goes on the wire.

use log::trace;

use crate::error::Result;
use crate::protocol::{KeyInput, MoveKey};
use crate::reconcile::{PendingInput, PredictionEngine};

/// Press/release state of the four movement keys.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeyState {
    pub w: bool,
    pub a: bool,
    pub s: bool,
    pub d: bool,
}

impl KeyState {
    pub fn set(&mut self, key: MoveKey, pressed: bool) {
        match key {
            MoveKey::W => self.w = pressed,
            MoveKey::A => self.a = pressed,
            MoveKey::S => self.s = pressed,
            MoveKey::D => self.d = pressed,
        }
    }

    pub fn is_pressed(&self, key: MoveKey) -> bool {
        match key {
            MoveKey::W => self.w,
            MoveKey::A => self.a,
            MoveKey::S => self.s,
            MoveKey::D => self.d,
        }
    }

    /// Held keys in sampling order.
    pub fn held(&self) -> impl Iterator<Item = MoveKey> + '_ {
        MoveKey::ALL.into_iter().filter(move |k| self.is_pressed(*k))
    }

    pub fn any(&self) -> bool {
        self.held().next().is_some()
    }
}

#[derive(Debug)]
pub struct InputSequencer {
    keys: KeyState,
    /// Last sequence number handed out. Never reset.
    sequence_number: u64,
    speed: f32,
}

impl InputSequencer {
    pub fn new(speed: f32) -> Self {
        Self {
            keys: KeyState::default(),
            sequence_number: 0,
            speed,
        }
    }

    pub fn press(&mut self, key: MoveKey) {
        self.keys.set(key, true);
    }

    pub fn release(&mut self, key: MoveKey) {
        self.keys.set(key, false);
    }

    pub fn release_all(&mut self) {
        self.keys = KeyState::default();
    }

    pub fn keys(&self) -> KeyState {
        self.keys
    }

    pub fn sequence_number(&self) -> u64 {
        self.sequence_number
    }

    pub fn speed(&self) -> f32 {
        self.speed
    }

    pub fn set_speed(&mut self, speed: f32) {
        self.speed = speed;
    }

    /// Run one input tick: record a pending input per held key and return
    /// the messages to send, in W, A, S, D order.
    pub fn sample(&mut self, engine: &mut PredictionEngine) -> Result<Vec<KeyInput>> {
        let mut out = Vec::new();
        for key in self.keys.held() {
            self.sequence_number += 1;
            let step = key.direction() * self.speed;
            engine.record(PendingInput::new(self.sequence_number, step.x, step.y))?;
            out.push(KeyInput {
                keycode: key,
                sequence_number: self.sequence_number,
            });
        }
        if !out.is_empty() {
            trace!("Sampled {} inputs up to #{}", out.len(), self.sequence_number);
        }
        Ok(out)
    }
}
