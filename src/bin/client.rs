//! arena-client binary
//!
//! Headless arena client. Joins a game server, holds a fixed set of
//! movement keys, and runs the full prediction / reconciliation /
//! interpolation pipeline, logging the scoreboard as it changes.
//!
//! ## Configuration (CLI / env)
//!
//! | Key                     | Default          | Description                        |
//! |-------------------------|------------------|------------------------------------|
//! | `ARENA_ENDPOINT`        | `127.0.0.1:3000` | Game server address                |
//! | `ARENA_USERNAME`        | `bot`            | Name sent in `initGame`            |
//! | `ARENA_HOLD`            | *(empty)*        | Keys to hold once joined, e.g. `WD`|
//! | `ARENA_REJOIN`          | `false`          | Re-send `initGame` after removal   |
//! | `ARENA_CONFIG`          | *(none)*         | TOML file with `SyncConfig` fields |
//! | `ARENA_STATS_SECS`      | `5`              | Stats log period                   |
//!
//! `SyncConfig` fields may also be overridden with `ARENA_SYNC_<FIELD>`
//! (e.g. `ARENA_SYNC_INPUT_INTERVAL_MS=30`).

use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use arena_sync::{
    net::{self, TransportConfig},
    session::Applied,
    Drawable, EntityKind, MoveKey, Renderer, Scoreboard, SyncConfig, SyncSession,
};
use clap::Parser;
use tokio::time::MissedTickBehavior;

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(name = "arena-client", about = "Headless arena sync client", version)]
struct Args {
    /// Game server address (host:port)
    #[arg(long, env = "ARENA_ENDPOINT", default_value = "127.0.0.1:3000")]
    endpoint: String,

    /// Username to join with
    #[arg(long, env = "ARENA_USERNAME", default_value = "bot")]
    username: String,

    /// Movement keys to hold once joined (any of W, A, S, D)
    #[arg(long, env = "ARENA_HOLD", default_value = "")]
    hold: String,

    /// Re-join automatically when the server removes the local player
    #[arg(long, env = "ARENA_REJOIN")]
    rejoin: bool,

    /// Optional TOML file with sync settings
    #[arg(long, env = "ARENA_CONFIG")]
    config: Option<PathBuf>,

    /// Seconds between stats log lines
    #[arg(long, env = "ARENA_STATS_SECS", default_value_t = 5)]
    stats_secs: u64,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn load_sync_config(path: Option<&Path>) -> Result<SyncConfig> {
    let mut builder = config::Config::builder();
    if let Some(path) = path {
        builder = builder.add_source(config::File::from(path));
    }
    builder
        .add_source(
            config::Environment::with_prefix("ARENA_SYNC")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .context("Failed to load sync configuration")?
        .try_deserialize()
        .context("Invalid sync configuration")
}

fn parse_hold(spec: &str) -> Result<Vec<MoveKey>> {
    let mut keys = Vec::new();
    for c in spec.chars().filter(|c| !c.is_whitespace()) {
        let code = format!("Key{}", c.to_ascii_uppercase());
        match MoveKey::from_code(&code) {
            Some(key) if !keys.contains(&key) => keys.push(key),
            Some(_) => {}
            None => bail!("'{}' is not a movement key (expected W, A, S or D)", c),
        }
    }
    Ok(keys)
}

/// Renderer that only counts what it would draw.
#[derive(Default)]
struct HeadlessRenderer {
    players: usize,
    projectiles: usize,
}

impl Renderer for HeadlessRenderer {
    fn begin_frame(&mut self) {
        self.players = 0;
        self.projectiles = 0;
    }

    fn draw(&mut self, drawable: &Drawable<'_>) {
        match drawable.kind {
            EntityKind::Player => self.players += 1,
            EntityKind::Projectile => self.projectiles += 1,
        }
        log::trace!(
            "draw {:?} {} at {} r={}",
            drawable.kind,
            drawable.id,
            drawable.position,
            drawable.radius
        );
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    // Initialise logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("arena_sync=debug".parse()?),
        )
        .init();

    let args = Args::parse();
    let sync_config = load_sync_config(args.config.as_deref())?;
    let hold = parse_hold(&args.hold)?;

    tracing::info!(
        endpoint = %args.endpoint,
        username = %args.username,
        speed = sync_config.speed,
        input_ms = sync_config.input_interval_ms,
        "Starting arena-client"
    );

    let ui = Rc::new(RefCell::new(Scoreboard::new()));
    let mut session = SyncSession::new(sync_config.clone(), ui.clone());

    let transport = TransportConfig {
        endpoint: args.endpoint.clone(),
        ..Default::default()
    };
    let mut conn = net::connect(&transport).await?;
    if conn.send(session.join(args.username.as_str()).to_envelope()?).is_err() {
        bail!("Connection closed before initGame was sent");
    }

    let mut input_timer =
        tokio::time::interval(Duration::from_millis(sync_config.input_interval_ms.max(1)));
    let mut frame_timer =
        tokio::time::interval(Duration::from_millis(sync_config.frame_interval_ms.max(1)));
    frame_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut stats_timer = tokio::time::interval(Duration::from_secs(args.stats_secs.max(1)));
    stats_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut renderer = HeadlessRenderer::default();
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            msg = conn.inbound.recv() => {
                let Some(envelope) = msg else {
                    session.disconnect();
                    log::warn!("Connection closed by server");
                    break;
                };
                match session.handle_envelope(envelope) {
                    Ok(Applied::Players(diff)) => {
                        let local = session.local_id().map(str::to_string);
                        if local.as_ref().is_some_and(|id| diff.created.contains(id)) {
                            for key in &hold {
                                session.key_down(*key);
                            }
                        }
                        if diff.local_player_removed && args.rejoin {
                            // A failed send means the writer stopped; the
                            // reader reports the closed connection next.
                            let _ = conn.send(session.join(args.username.as_str()).to_envelope()?);
                        }
                        if !diff.created.is_empty() || !diff.removed.is_empty() {
                            for row in ui.borrow().rows() {
                                log::info!("  {}", row);
                            }
                        }
                    }
                    Ok(_) => {}
                    Err(e) => log::warn!("Dropped message: {}", e),
                }
            }
            _ = input_timer.tick() => {
                match session.input_tick() {
                    Ok(outbound) => {
                        for msg in outbound {
                            if conn.send(msg.to_envelope()?).is_err() {
                                session.discard_unsent(&msg);
                            }
                        }
                    }
                    Err(e) => log::warn!("Input tick failed: {}", e),
                }
            }
            _ = frame_timer.tick() => {
                if !session.render_frame(&mut renderer) {
                    break;
                }
            }
            _ = stats_timer.tick() => {
                let stats = session.stats();
                let net_stats = conn.stats();
                log::info!(
                    "players={} projectiles={} drawn={}/{} pending={} seq={} ack={:?} frames={} dropped={} in={} out={}",
                    stats.players,
                    stats.projectiles,
                    renderer.players,
                    renderer.projectiles,
                    stats.pending_inputs,
                    stats.last_sequence_number,
                    stats.last_ack,
                    stats.frames_rendered,
                    stats.messages_dropped,
                    net_stats.lines_in,
                    net_stats.lines_out,
                );
            }
            _ = &mut shutdown => {
                log::info!("arena-client shutting down (SIGINT)");
                break;
            }
        }
    }

    session.teardown();
    // Drop the connection to stop the I/O tasks.
    drop(conn);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hold_spec_parses_keys_once() {
        assert_eq!(parse_hold("wd").unwrap(), vec![MoveKey::W, MoveKey::D]);
        assert_eq!(parse_hold(" W w ").unwrap(), vec![MoveKey::W]);
        assert!(parse_hold("").unwrap().is_empty());
        assert!(parse_hold("q").is_err());
    }

    #[test]
    fn empty_config_uses_defaults() {
        let cfg = load_sync_config(None).unwrap();
        assert_eq!(cfg.input_interval_ms, SyncConfig::default().input_interval_ms);
    }
}
