//! Per-connection lifecycle: inbound liveness loop, outbound writer,
//! keepalive, and idempotent teardown.
//!
//! Each connection runs two tasks coordinated only through its bounded
//! mailbox. The inbound loop reads frames purely to detect liveness and
//! closure; clients never send application messages. The outbound loop
//! drains the mailbox and pings on a fixed interval. Whichever half dies
//! first funnels through [`Hub::unregister`], which is idempotent, and
//! the other half follows within one deadline window.

use std::time::Duration;

use axum::body::Bytes;
use axum::extract::ws::{Message, Utf8Bytes, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::time::{Instant, interval_at, timeout};

use super::hub::{ConnId, Hub};

/// Deadlines and cadence governing one connection's lifecycle loops.
///
/// Production connections use [`ConnectionTiming::default`]; tests
/// shrink the windows to observable lengths.
#[derive(Debug, Clone, Copy)]
pub struct ConnectionTiming {
    /// Time allowed to write one message to the peer.
    pub write_timeout: Duration,
    /// Idle window after which a silent peer is considered dead. Any
    /// frame, including pong control frames, resets it.
    pub read_timeout: Duration,
    /// Keepalive ping interval; must stay strictly inside
    /// `read_timeout` so a healthy peer is never timed out.
    pub ping_period: Duration,
}

impl Default for ConnectionTiming {
    fn default() -> Self {
        Self {
            write_timeout: Duration::from_secs(10),
            read_timeout: Duration::from_secs(60),
            ping_period: Duration::from_secs(45),
        }
    }
}

/// Drives one upgraded WebSocket with the default timing.
pub async fn run_connection(socket: WebSocket, hub: Hub) {
    run_connection_with(socket, hub, ConnectionTiming::default()).await;
}

/// Drives one upgraded WebSocket until either half fails.
///
/// Registers with the hub, spawns the writer task, and runs the inbound
/// loop in place. Returns once both halves have terminated and the
/// connection is out of the registry.
pub async fn run_connection_with(socket: WebSocket, hub: Hub, timing: ConnectionTiming) {
    let id = ConnId::new();
    let (mailbox_tx, mailbox_rx) = mpsc::channel::<Utf8Bytes>(hub.mailbox_capacity());
    let (ws_tx, ws_rx) = socket.split();

    hub.register(id, mailbox_tx).await;
    tracing::debug!(%id, "ws connection live");

    let writer = tokio::spawn(write_loop(ws_tx, mailbox_rx, hub.clone(), id, timing));
    read_loop(ws_rx, &hub, id, timing).await;

    // Unregistering dropped the mailbox sender, so the writer drains and
    // exits on its own; give it a moment to finish the close handshake.
    let _ = writer.await;
    tracing::debug!(%id, "ws connection closed");
}

/// Reads frames only to detect liveness and closure.
async fn read_loop(
    mut ws_rx: SplitStream<WebSocket>,
    hub: &Hub,
    id: ConnId,
    timing: ConnectionTiming,
) {
    loop {
        match timeout(timing.read_timeout, ws_rx.next()).await {
            // Any frame, pongs included, proves the peer is alive.
            Ok(Some(Ok(Message::Close(_)))) | Ok(None) => break,
            Ok(Some(Ok(_))) => {}
            Ok(Some(Err(e))) => {
                tracing::debug!(%id, error = %e, "ws read error");
                break;
            }
            Err(_) => {
                tracing::debug!(%id, "ws read deadline expired");
                break;
            }
        }
    }
    hub.unregister(id).await;
}

/// Drains the mailbox to the transport and emits keepalive pings.
async fn write_loop(
    mut ws_tx: SplitSink<WebSocket, Message>,
    mut mailbox: mpsc::Receiver<Utf8Bytes>,
    hub: Hub,
    id: ConnId,
    timing: ConnectionTiming,
) {
    let mut ticker = interval_at(Instant::now() + timing.ping_period, timing.ping_period);

    loop {
        tokio::select! {
            maybe_frame = mailbox.recv() => {
                match maybe_frame {
                    Some(frame) => {
                        match timeout(timing.write_timeout, ws_tx.send(Message::Text(frame))).await {
                            Ok(Ok(())) => {}
                            Ok(Err(e)) => {
                                tracing::debug!(%id, error = %e, "ws write error");
                                break;
                            }
                            Err(_) => {
                                tracing::debug!(%id, "ws write deadline expired");
                                break;
                            }
                        }
                    }
                    None => {
                        // The hub closed the mailbox (eviction or normal
                        // unregister): finish the close handshake.
                        let _ = timeout(timing.write_timeout, ws_tx.send(Message::Close(None))).await;
                        return;
                    }
                }
            }
            _ = ticker.tick() => {
                let ping = Message::Ping(Bytes::new());
                match timeout(timing.write_timeout, ws_tx.send(ping)).await {
                    Ok(Ok(())) => {}
                    _ => {
                        tracing::debug!(%id, "ws keepalive ping failed");
                        break;
                    }
                }
            }
        }
    }
    hub.unregister(id).await;
}
