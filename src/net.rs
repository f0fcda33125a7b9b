//! Transport plumbing: newline-delimited JSON envelopes over TCP.
//!
//! ## Threading model
//!
//! ```text
//! Session task (owns SyncSession) │  I/O tasks (Tokio)
//! ──────────────────────────────  │ ──────────────────────────────
//! select! {                       │ read_loop()
//!   inbound.recv()  ◄─────────────┼──  line → Envelope → tx.send
//!   input tick → outbound.send ───┼─►  write_loop()
//!   frame tick                    │      rx.recv → line → socket
//! }                               │
//! ```
//!
//! The I/O tasks never touch session state; they only hand `Envelope`s
//! across channels, so every mutation happens on the session task in
//! arrival order. The outbound queue is unbounded: every recorded input must
//! reach the server or its acknowledgment never arrives, and the input timer
//! already caps the rate.

use std::sync::Arc;

use anyhow::{Context, Result};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::SyncError;
use crate::protocol::Envelope;

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// `host:port` of the game server.
    pub endpoint: String,
    /// How many inbound envelopes to buffer before the reader waits.
    pub inbound_buffer: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            endpoint: "127.0.0.1:3000".into(),
            inbound_buffer: 256,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TransportStats {
    pub lines_in: u64,
    pub lines_out: u64,
    /// Lines that were not a valid envelope and were skipped.
    pub malformed: u64,
}

// ---------------------------------------------------------------------------
// Framing
// ---------------------------------------------------------------------------

/// Serialise an envelope as a single `\n`-terminated line.
pub fn encode_line(envelope: &Envelope) -> crate::error::Result<String> {
    let mut line = serde_json::to_string(envelope).map_err(|source| SyncError::Encode {
        event: envelope.event.clone(),
        source,
    })?;
    line.push('\n');
    Ok(line)
}

pub fn decode_line(line: &str) -> crate::error::Result<Envelope> {
    serde_json::from_str(line.trim_end()).map_err(|source| SyncError::Decode {
        event: "<envelope>".into(),
        source,
    })
}

// ---------------------------------------------------------------------------
// Connection handle
// ---------------------------------------------------------------------------

/// Owned by the session task. Dropping it stops both I/O tasks.
pub struct Connection {
    /// Envelopes from the server, in arrival order. `None` once closed.
    pub inbound: mpsc::Receiver<Envelope>,
    /// Envelopes to the server.
    pub outbound: mpsc::UnboundedSender<Envelope>,
    stats: Arc<Mutex<TransportStats>>,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl Connection {
    pub fn stats(&self) -> TransportStats {
        *self.stats.lock()
    }

    /// Queue an envelope without waiting. Only fails once the writer task
    /// has stopped; the envelope is then returned to the caller.
    pub fn send(&self, envelope: Envelope) -> std::result::Result<(), Envelope> {
        self.outbound.send(envelope).map_err(|e| {
            log::warn!("Writer stopped; could not send {}", e.0.event);
            e.0
        })
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.reader.abort();
        self.writer.abort();
    }
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Connect to the server and start the reader and writer tasks.
pub async fn connect(config: &TransportConfig) -> Result<Connection> {
    log::info!("Connecting to {}", config.endpoint);
    let stream = TcpStream::connect(&config.endpoint)
        .await
        .with_context(|| format!("Failed to connect to {}", config.endpoint))?;
    stream
        .set_nodelay(true)
        .context("Failed to disable Nagle on game connection")?;

    let (read_half, write_half) = stream.into_split();
    Ok(spawn(BufReader::new(read_half), write_half, config))
}

/// Start I/O tasks over an arbitrary reader/writer pair.
pub fn spawn<R, W>(reader: R, writer: W, config: &TransportConfig) -> Connection
where
    R: AsyncBufRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (in_tx, in_rx) = mpsc::channel(config.inbound_buffer);
    let (out_tx, out_rx) = mpsc::unbounded_channel();
    let stats = Arc::new(Mutex::new(TransportStats::default()));

    let reader = tokio::spawn(read_loop(reader, in_tx, stats.clone()));
    let writer = tokio::spawn(write_loop(writer, out_rx, stats.clone()));

    Connection {
        inbound: in_rx,
        outbound: out_tx,
        stats,
        reader,
        writer,
    }
}

// ---------------------------------------------------------------------------
// I/O loops
// ---------------------------------------------------------------------------

/// Forward every well-formed line as an envelope until EOF, a read error,
/// or the receiver going away.
pub async fn read_loop<R>(
    mut reader: R,
    tx: mpsc::Sender<Envelope>,
    stats: Arc<Mutex<TransportStats>>,
) where
    R: AsyncBufRead + Unpin,
{
    let mut line = String::new();
    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) => {
                log::info!("Server closed the connection");
                break;
            }
            Ok(_) if line.trim().is_empty() => continue,
            Ok(_) => match decode_line(&line) {
                Ok(envelope) => {
                    stats.lock().lines_in += 1;
                    if tx.send(envelope).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    stats.lock().malformed += 1;
                    log::warn!("Skipping malformed line: {}", e);
                }
            },
            Err(e) => {
                log::warn!("Read error: {}", e);
                break;
            }
        }
    }
}

/// Write queued envelopes until every sender is dropped or a write fails.
pub async fn write_loop<W>(
    mut writer: W,
    mut rx: mpsc::UnboundedReceiver<Envelope>,
    stats: Arc<Mutex<TransportStats>>,
) where
    W: AsyncWrite + Unpin,
{
    while let Some(envelope) = rx.recv().await {
        let line = match encode_line(&envelope) {
            Ok(line) => line,
            Err(e) => {
                log::warn!("{}", e);
                continue;
            }
        };
        if let Err(e) = writer.write_all(line.as_bytes()).await {
            log::warn!("Failed to send {}: {}", envelope.event, e);
            break;
        }
        if let Err(e) = writer.flush().await {
            log::warn!("Failed to flush after {}: {}", envelope.event, e);
            break;
        }
        stats.lock().lines_out += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio_test::io::Builder;

    #[test]
    fn line_framing_round_trip() {
        let env = Envelope::new("connected", json!({ "id": "abc" }));
        let line = encode_line(&env).unwrap();
        assert!(line.ends_with('\n'));
        assert_eq!(line.matches('\n').count(), 1);
        assert_eq!(decode_line(&line).unwrap(), env);
    }

    #[test]
    fn envelope_without_data_decodes_as_null() {
        let env = decode_line(r#"{"event":"ping"}"#).unwrap();
        assert_eq!(env.data, serde_json::Value::Null);
    }

    #[test]
    fn reader_forwards_envelopes_and_skips_garbage() {
        let mock = Builder::new()
            .read(b"{\"event\":\"connected\",\"data\":{\"id\":\"abc\"}}\n")
            .read(b"not json\n\n")
            .read(b"{\"event\":\"updateProjectiles\",\"data\":{}}\n")
            .build();
        let (tx, mut rx) = mpsc::channel(8);
        let stats = Arc::new(Mutex::new(TransportStats::default()));

        tokio_test::block_on(read_loop(BufReader::new(mock), tx, stats.clone()));

        assert_eq!(rx.try_recv().unwrap().event, "connected");
        assert_eq!(rx.try_recv().unwrap().event, "updateProjectiles");
        assert!(rx.try_recv().is_err());
        assert_eq!(
            *stats.lock(),
            TransportStats {
                lines_in: 2,
                lines_out: 0,
                malformed: 1
            }
        );
    }

    #[test]
    fn writer_emits_one_line_per_envelope() {
        let mock = Builder::new()
            .write(b"{\"event\":\"keydown\",\"data\":{\"keycode\":\"KeyW\",\"sequenceNumber\":1}}\n")
            .build();
        let (tx, rx) = mpsc::unbounded_channel();
        let stats = Arc::new(Mutex::new(TransportStats::default()));

        tx.send(Envelope::new(
            "keydown",
            json!({ "keycode": "KeyW", "sequenceNumber": 1 }),
        ))
        .unwrap();
        drop(tx);

        tokio_test::block_on(write_loop(mock, rx, stats.clone()));

        assert_eq!(stats.lock().lines_out, 1);
    }

    fn keydown(seq: u64) -> Envelope {
        Envelope::new("keydown", json!({ "keycode": "KeyD", "sequenceNumber": seq }))
    }

    #[tokio::test]
    async fn outbound_burst_is_written_without_loss() {
        const BURST: u64 = 200;
        let mut writes = Builder::new();
        for seq in 1..=BURST {
            writes.write(encode_line(&keydown(seq)).unwrap().as_bytes());
        }
        let conn = spawn(
            BufReader::new(Builder::new().build()),
            writes.build(),
            &TransportConfig::default(),
        );

        // Queue the whole burst before the writer gets a chance to run.
        for seq in 1..=BURST {
            assert!(conn.send(keydown(seq)).is_ok());
        }
        for _ in 0..10_000 {
            if conn.stats().lines_out == BURST {
                break;
            }
            tokio::task::yield_now().await;
        }

        assert_eq!(conn.stats().lines_out, BURST);
    }

    #[tokio::test]
    async fn send_after_writer_stops_hands_envelope_back() {
        let (tx, rx) = mpsc::unbounded_channel::<Envelope>();
        drop(rx);
        let conn = Connection {
            inbound: mpsc::channel(1).1,
            outbound: tx,
            stats: Arc::new(Mutex::new(TransportStats::default())),
            reader: tokio::spawn(async {}),
            writer: tokio::spawn(async {}),
        };

        let returned = conn.send(keydown(7)).unwrap_err();
        assert_eq!(returned.data["sequenceNumber"], 7);
    }
}
