//! Arena wire protocol.
//!
//! This module owns **every message that crosses the transport boundary**
//! between this client and the authoritative game server.
//!
//! ## Events
//!
//! | Event               | Direction        | Payload                      |
//! |---------------------|------------------|------------------------------|
//! | `updatePlayers`     | server → client  | [`PlayersSnapshot`]          |
//! | `updateProjectiles` | server → client  | [`ProjectilesSnapshot`]      |
//! | `connected`         | server → client  | [`Connected`]                |
//! | `gameConfig`        | server → client  | [`GameConfig`]               |
//! | `initGame`          | client → server  | [`InitGame`]                 |
//! | `keydown`           | client → server  | [`KeyInput`]                 |
//!
//! ## Design rules
//!
//! 1. Every payload is `Serialize + Deserialize` with camelCase JSON keys.
//! 2. Snapshots are *full*: an id missing from a snapshot means the entity
//!    no longer exists.
//! 3. Movement displacement is never sent; only the key and its sequence
//!    number. The server applies the same `speed` it announced in
//!    `gameConfig`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, SyncError};
use crate::types::Vec2;

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// One framed message on the wire: `{"event": "...", "data": {...}}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Envelope {
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

impl Envelope {
    pub fn new(event: impl Into<String>, data: Value) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }
}

// ---------------------------------------------------------------------------
// Snapshots  (server → client)
// ---------------------------------------------------------------------------

/// Authoritative state of one player.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlayerState {
    pub x: f32,
    pub y: f32,
    pub color: String,
    pub username: String,
    #[serde(default)]
    pub score: u32,
    /// Last input sequence number the server applied for this player.
    /// Only meaningful on the local player's own entry.
    #[serde(default)]
    pub sequence_number: u64,
}

impl PlayerState {
    pub fn position(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }
}

/// Authoritative state of one projectile.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProjectileState {
    pub x: f32,
    pub y: f32,
    /// Owning player, used for color inheritance.
    pub player_id: String,
    pub velocity: Vec2,
}

impl ProjectileState {
    pub fn position(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }
}

/// Full player snapshot keyed by player id.
pub type PlayersSnapshot = BTreeMap<String, PlayerState>;

/// Full projectile snapshot keyed by projectile id.
pub type ProjectilesSnapshot = BTreeMap<String, ProjectileState>;

// ---------------------------------------------------------------------------
// Session messages  (server → client)
// ---------------------------------------------------------------------------

/// Transport-assigned id of this client; the local player uses the same id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Connected {
    pub id: String,
}

/// Acknowledges `initGame` and fixes the movement constants for the session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GameConfig {
    pub speed: f32,
}

// ---------------------------------------------------------------------------
// Client messages  (client → server)
// ---------------------------------------------------------------------------

/// Sent once when the user joins.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InitGame {
    pub width: f32,
    pub height: f32,
    pub device_pixel_ratio: f32,
    pub username: String,
}

/// The four movement keys, serialised as DOM key codes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum MoveKey {
    #[serde(rename = "KeyW")]
    W,
    #[serde(rename = "KeyA")]
    A,
    #[serde(rename = "KeyS")]
    S,
    #[serde(rename = "KeyD")]
    D,
}

impl MoveKey {
    /// Sampling order within one input tick.
    pub const ALL: [MoveKey; 4] = [MoveKey::W, MoveKey::A, MoveKey::S, MoveKey::D];

    pub fn code(self) -> &'static str {
        match self {
            MoveKey::W => "KeyW",
            MoveKey::A => "KeyA",
            MoveKey::S => "KeyS",
            MoveKey::D => "KeyD",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.code() == code)
    }

    /// Unit direction in screen space (y grows downward).
    pub fn direction(self) -> Vec2 {
        match self {
            MoveKey::W => Vec2::new(0.0, -1.0),
            MoveKey::A => Vec2::new(-1.0, 0.0),
            MoveKey::S => Vec2::new(0.0, 1.0),
            MoveKey::D => Vec2::new(1.0, 0.0),
        }
    }
}

impl std::fmt::Display for MoveKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// One sampled key press.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct KeyInput {
    pub keycode: MoveKey,
    pub sequence_number: u64,
}

// ---------------------------------------------------------------------------
// Decoded messages
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Players(PlayersSnapshot),
    Projectiles(ProjectilesSnapshot),
    Connected(Connected),
    GameConfig(GameConfig),
}

impl Inbound {
    /// Decode a payload according to its event name.
    pub fn decode(event: &str, data: Value) -> Result<Self> {
        fn parse<T: serde::de::DeserializeOwned>(event: &str, data: Value) -> Result<T> {
            serde_json::from_value(data).map_err(|source| SyncError::Decode {
                event: event.to_string(),
                source,
            })
        }

        match event {
            events::UPDATE_PLAYERS => parse(event, data).map(Inbound::Players),
            events::UPDATE_PROJECTILES => parse(event, data).map(Inbound::Projectiles),
            events::CONNECTED => parse(event, data).map(Inbound::Connected),
            events::GAME_CONFIG => parse(event, data).map(Inbound::GameConfig),
            other => Err(SyncError::UnknownEvent(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    InitGame(InitGame),
    KeyDown(KeyInput),
}

impl Outbound {
    pub fn event(&self) -> &'static str {
        match self {
            Outbound::InitGame(_) => events::INIT_GAME,
            Outbound::KeyDown(_) => events::KEYDOWN,
        }
    }

    pub fn to_envelope(&self) -> Result<Envelope> {
        let data = match self {
            Outbound::InitGame(m) => serde_json::to_value(m),
            Outbound::KeyDown(m) => serde_json::to_value(m),
        }
        .map_err(|source| SyncError::Encode {
            event: self.event().to_string(),
            source,
        })?;
        Ok(Envelope::new(self.event(), data))
    }
}

// ---------------------------------------------------------------------------
// Event names
// ---------------------------------------------------------------------------

/// All event names used by the arena protocol, as constants.
pub mod events {
    pub const UPDATE_PLAYERS: &str = "updatePlayers";
    pub const UPDATE_PROJECTILES: &str = "updateProjectiles";
    pub const CONNECTED: &str = "connected";
    pub const GAME_CONFIG: &str = "gameConfig";

    pub const INIT_GAME: &str = "initGame";
    pub const KEYDOWN: &str = "keydown";
}
