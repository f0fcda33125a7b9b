//! Client-side prediction and server reconciliation.
//!
//! Every locally sampled input is recorded in a [`PendingInputLog`] before it
//! is sent. When an authoritative position for the local player arrives, the
//! server also echoes the last sequence number it applied. Everything up to
//! and including that number is already baked into the authoritative
//! position and is dropped; whatever remains is replayed on top of it.
//!
//! ```text
//! log:    [1: 0,-5] [2: 0,-5] [3: 5,0]
//! ack 2 → [3: 5,0]
//! target = authoritative + (5, 0)
//! ```

use std::collections::VecDeque;

use log::{debug, warn};

use crate::error::{Result, SyncError};
use crate::types::Vec2;

// ---------------------------------------------------------------------------
// Pending inputs
// ---------------------------------------------------------------------------

/// A locally applied displacement that the server may not have seen yet.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PendingInput {
    pub sequence_number: u64,
    pub dx: f32,
    pub dy: f32,
}

impl PendingInput {
    pub fn new(sequence_number: u64, dx: f32, dy: f32) -> Self {
        Self {
            sequence_number,
            dx,
            dy,
        }
    }

    pub fn displacement(&self) -> Vec2 {
        Vec2::new(self.dx, self.dy)
    }
}

/// Unacknowledged inputs, strictly ordered by sequence number.
#[derive(Debug, Clone, Default)]
pub struct PendingInputLog {
    inputs: VecDeque<PendingInput>,
}

impl PendingInputLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an input. Its sequence number must exceed the last one held.
    pub fn push(&mut self, input: PendingInput) -> Result<()> {
        if let Some(last) = self.inputs.back() {
            if input.sequence_number <= last.sequence_number {
                return Err(SyncError::SequenceOrder {
                    last: last.sequence_number,
                    got: input.sequence_number,
                });
            }
        }
        self.inputs.push_back(input);
        Ok(())
    }

    /// Drop every input up to and including `sequence_number`.
    ///
    /// Only trims when that exact number is present; returns how many
    /// inputs were removed.
    pub fn acknowledge(&mut self, sequence_number: u64) -> usize {
        match self
            .inputs
            .iter()
            .position(|i| i.sequence_number == sequence_number)
        {
            Some(index) => {
                self.inputs.drain(..=index);
                index + 1
            }
            None => 0,
        }
    }

    /// Remove one input by sequence number. Returns whether it was present.
    pub fn remove(&mut self, sequence_number: u64) -> bool {
        match self
            .inputs
            .iter()
            .position(|i| i.sequence_number == sequence_number)
        {
            Some(index) => self.inputs.remove(index).is_some(),
            None => false,
        }
    }

    /// Accumulate every remaining displacement onto `base`, in log order.
    pub fn replay_onto(&self, base: Vec2) -> Vec2 {
        self.inputs
            .iter()
            .fold(base, |acc, input| acc + input.displacement())
    }

    pub fn iter(&self) -> impl Iterator<Item = &PendingInput> {
        self.inputs.iter()
    }

    pub fn len(&self) -> usize {
        self.inputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty()
    }

    pub fn clear(&mut self) {
        self.inputs.clear();
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Outcome of one reconciliation pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reconciled {
    /// Authoritative position plus every replayed input.
    pub target: Vec2,
    /// Inputs discarded because the server has applied them.
    pub trimmed: usize,
    /// Inputs replayed on top of the authoritative position.
    pub replayed: usize,
}

#[derive(Debug, Default)]
pub struct PredictionEngine {
    pending: PendingInputLog,
    last_ack: Option<u64>,
}

impl PredictionEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a locally applied input before it is sent.
    pub fn record(&mut self, input: PendingInput) -> Result<()> {
        self.pending.push(input)
    }

    /// Reconcile against an authoritative position and echoed sequence number.
    ///
    /// An acknowledgment lower than the last one accepted leaves the log
    /// untouched and returns [`SyncError::AckRegression`]. An acknowledgment
    /// that is not in the log trims nothing and the whole log is replayed.
    pub fn reconcile(&mut self, authoritative: Vec2, ack: u64) -> Result<Reconciled> {
        if let Some(last) = self.last_ack {
            if ack < last {
                warn!("Ignoring stale acknowledgment {} (last {})", ack, last);
                return Err(SyncError::AckRegression { ack, last });
            }
        }
        self.last_ack = Some(ack);

        let trimmed = self.pending.acknowledge(ack);
        if trimmed == 0 && !self.pending.is_empty() {
            debug!(
                "Acknowledgment {} not pending; replaying all {} inputs",
                ack,
                self.pending.len()
            );
        }

        Ok(Reconciled {
            target: self.pending.replay_onto(authoritative),
            trimmed,
            replayed: self.pending.len(),
        })
    }

    /// Forget an input that never reached the server. The server cannot
    /// acknowledge it, so replaying it would offset every later target.
    pub fn discard(&mut self, sequence_number: u64) -> bool {
        let removed = self.pending.remove(sequence_number);
        if removed {
            warn!("Discarded unsent input #{}", sequence_number);
        }
        removed
    }

    pub fn pending(&self) -> &PendingInputLog {
        &self.pending
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn last_ack(&self) -> Option<u64> {
        self.last_ack
    }

    /// Forget all pending inputs and acknowledgments (local player lost).
    pub fn reset(&mut self) {
        self.pending.clear();
        self.last_ack = None;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
