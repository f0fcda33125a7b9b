//! Arena Sync
//!
//! Client-side state synchronization for a real-time multiplayer arena:
//! input sequencing, prediction and reconciliation of the local player,
//! snapshot diffing for every other entity, and per-frame interpolation.
//!
//! ## Architecture
//!
//! ```text
//! arena-client  (bin/client.rs)
//!   ├── net::Connection  (net.rs)     ← JSON-lines transport tasks
//!   └── SyncSession  (session.rs)     ← single consumer of all events
//!         ├── InputSequencer  (input.rs)
//!         ├── PredictionEngine  (reconcile.rs)
//!         ├── SnapshotApplier  (snapshot.rs)
//!         │     └── EntityStore  (store.rs)
//!         ├── RenderLoop  (interp.rs)
//!         └── UiCollaborator  (ui.rs)
//! ```
//!
//! Everything except `net` is plain synchronous code with no I/O, so the
//! core also builds for targets without Tokio (`default-features = false`).

pub mod error;
pub mod input;
pub mod interp;
pub mod protocol;
pub mod reconcile;
pub mod session;
pub mod snapshot;
pub mod store;
pub mod types;
pub mod ui;

// Transport requires the `net` feature.
#[cfg(feature = "net")]
pub mod net;

pub use error::{Result, SyncError};
pub use interp::{Drawable, Renderer};
pub use protocol::{Envelope, Inbound, MoveKey, Outbound};
pub use session::SyncSession;
pub use store::{EntityKind, EntityStore, StoreEvent};
pub use types::{SyncConfig, SyncStats, Vec2, Viewport};
pub use ui::{Scoreboard, UiCollaborator};
