//! Broadcast hub: connection registry and message fan-out.
//!
//! The hub is explicitly constructed ([`Hub::new`]) and handed to
//! whatever needs it; there is no process-wide singleton. All registry
//! mutations and all fan-out run on a single control loop fed by one
//! bounded command queue, so every publisher sees the same serialization
//! point and message order.
//!
//! Backpressure policy: a publisher never waits. If the command queue is
//! saturated the publish is dropped with a warning; if a connection's
//! mailbox is full during fan-out that connection is evicted rather than
//! delaying the rest of the pass.

use std::collections::HashMap;
use std::fmt;

use axum::extract::ws::Utf8Bytes;
use serde::Serialize;
use tokio::sync::mpsc;
use uuid::Uuid;

use super::messages::{self, Action};

/// Opaque handle identifying one registered connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnId(Uuid);

impl ConnId {
    /// Generates a fresh connection handle.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Sender half of a connection's bounded outbound mailbox.
pub type Mailbox = mpsc::Sender<Utf8Bytes>;

#[derive(Debug)]
enum Command {
    Register { id: ConnId, mailbox: Mailbox },
    Unregister { id: ConnId },
    Broadcast { frame: Utf8Bytes },
}

#[derive(Serialize)]
struct UserCount {
    count: usize,
}

/// Cheap-clone handle to the broadcast hub.
///
/// Producers call [`Hub::publish`]; connection lifecycles call
/// [`Hub::register`] / [`Hub::unregister`]. All three are serialized
/// through the same command queue, so their relative order is the
/// delivery order.
#[derive(Debug, Clone)]
pub struct Hub {
    cmd_tx: mpsc::Sender<Command>,
    mailbox_capacity: usize,
}

impl Hub {
    /// Creates a hub handle and its control loop.
    ///
    /// The caller must spawn [`HubRunner::run`]; until then, commands
    /// queue up to `queue_capacity` and publishes beyond that are
    /// dropped. `mailbox_capacity` sizes each connection's outbound
    /// mailbox (see [`Hub::mailbox_capacity`]).
    #[must_use]
    pub fn new(queue_capacity: usize, mailbox_capacity: usize) -> (Self, HubRunner) {
        let (cmd_tx, cmd_rx) = mpsc::channel(queue_capacity);
        (
            Self {
                cmd_tx,
                mailbox_capacity,
            },
            HubRunner {
                cmd_rx,
                registry: HashMap::new(),
            },
        )
    }

    /// Capacity to use when creating a connection mailbox.
    #[must_use]
    pub fn mailbox_capacity(&self) -> usize {
        self.mailbox_capacity
    }

    /// Adds a connection to the registry.
    ///
    /// Triggers a `user_count` broadcast carrying the new total, which
    /// the registering connection itself also receives.
    pub async fn register(&self, id: ConnId, mailbox: Mailbox) {
        if self
            .cmd_tx
            .send(Command::Register { id, mailbox })
            .await
            .is_err()
        {
            tracing::warn!(%id, "hub control loop gone, register dropped");
        }
    }

    /// Removes a connection from the registry; idempotent.
    ///
    /// Dropping the registered mailbox sender closes the mailbox, which
    /// ends the connection's writer loop. A `user_count` broadcast fires
    /// only when a connection was actually removed.
    pub async fn unregister(&self, id: ConnId) {
        if self.cmd_tx.send(Command::Unregister { id }).await.is_err() {
            tracing::warn!(%id, "hub control loop gone, unregister dropped");
        }
    }

    /// Enqueues an `{action, data}` broadcast for delivery to every live
    /// connection. Never blocks the caller.
    ///
    /// A payload that fails to serialize aborts only this publish. A
    /// saturated command queue drops the message with a warning rather
    /// than back-pressuring the producer. There is no delivery
    /// acknowledgement.
    pub fn publish<T: Serialize>(&self, action: Action, data: &T) {
        let frame = match messages::encode_frame(action, data) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::error!(
                    action = action.as_str(),
                    error = %e,
                    "broadcast payload failed to serialize, publish aborted"
                );
                return;
            }
        };

        match self.cmd_tx.try_send(Command::Broadcast { frame }) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(
                    action = action.as_str(),
                    "hub queue full, broadcast dropped"
                );
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::warn!(
                    action = action.as_str(),
                    "hub control loop gone, broadcast dropped"
                );
            }
        }
    }
}

/// Single-threaded control loop owning the connection registry.
#[derive(Debug)]
pub struct HubRunner {
    cmd_rx: mpsc::Receiver<Command>,
    registry: HashMap<ConnId, Mailbox>,
}

impl HubRunner {
    /// Runs the control loop until every [`Hub`] handle is dropped.
    pub async fn run(mut self) {
        tracing::info!("broadcast hub started");
        while let Some(cmd) = self.cmd_rx.recv().await {
            match cmd {
                Command::Register { id, mailbox } => {
                    self.registry.insert(id, mailbox);
                    tracing::info!(%id, active = self.registry.len(), "client connected");
                    self.announce_user_count();
                }
                Command::Unregister { id } => {
                    if self.registry.remove(&id).is_some() {
                        tracing::info!(%id, active = self.registry.len(), "client disconnected");
                        self.announce_user_count();
                    }
                }
                Command::Broadcast { frame } => self.fan_out(frame),
            }
        }
        tracing::info!("broadcast hub stopped");
    }

    fn announce_user_count(&mut self) {
        match Self::user_count_frame(self.registry.len()) {
            Ok(frame) => self.fan_out(frame),
            Err(e) => tracing::error!(error = %e, "user_count frame failed to serialize"),
        }
    }

    fn user_count_frame(count: usize) -> serde_json::Result<Utf8Bytes> {
        messages::encode_frame(Action::UserCount, &UserCount { count })
    }

    /// Delivers `frame` to every registered mailbox without waiting.
    ///
    /// Mailboxes that are full or closed get their connection evicted;
    /// each pass that evicted anyone is followed by one `user_count`
    /// pass announcing the shrunken registry.
    fn fan_out(&mut self, frame: Utf8Bytes) {
        let mut next = Some(frame);
        while let Some(frame) = next.take() {
            let mut evicted = Vec::new();
            for (id, mailbox) in &self.registry {
                match mailbox.try_send(frame.clone()) {
                    Ok(()) => {}
                    Err(mpsc::error::TrySendError::Full(_)) => {
                        tracing::warn!(%id, "client mailbox full, evicting");
                        evicted.push(*id);
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => {
                        tracing::debug!(%id, "client mailbox closed, evicting");
                        evicted.push(*id);
                    }
                }
            }
            if evicted.is_empty() {
                break;
            }
            for id in &evicted {
                self.registry.remove(id);
            }
            tracing::info!(
                evicted = evicted.len(),
                active = self.registry.len(),
                "slow or dead clients evicted"
            );
            next = Self::user_count_frame(self.registry.len()).ok();
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use tokio::sync::mpsc::Receiver;

    fn frame_json(frame: &Utf8Bytes) -> serde_json::Value {
        serde_json::from_str(frame.as_str()).unwrap()
    }

    async fn next_frame(rx: &mut Receiver<Utf8Bytes>) -> serde_json::Value {
        let frame = rx.recv().await.unwrap();
        frame_json(&frame)
    }

    /// Spawns a hub whose connections get mailboxes of `cap`.
    fn spawn_hub(cap: usize) -> Hub {
        let (hub, runner) = Hub::new(64, cap);
        tokio::spawn(runner.run());
        hub
    }

    async fn connect(hub: &Hub) -> (ConnId, Receiver<Utf8Bytes>) {
        let id = ConnId::new();
        let (tx, rx) = mpsc::channel(hub.mailbox_capacity());
        hub.register(id, tx).await;
        (id, rx)
    }

    #[tokio::test]
    async fn register_announces_user_count() {
        let hub = spawn_hub(8);
        let (_a, mut rx_a) = connect(&hub).await;

        let msg = next_frame(&mut rx_a).await;
        assert_eq!(msg["action"], "user_count");
        assert_eq!(msg["data"]["count"], 1);

        let (_b, mut rx_b) = connect(&hub).await;
        let msg = next_frame(&mut rx_a).await;
        assert_eq!(msg["data"]["count"], 2);
        let msg = next_frame(&mut rx_b).await;
        assert_eq!(msg["data"]["count"], 2);
    }

    #[tokio::test]
    async fn frames_arrive_in_publish_order() {
        let hub = spawn_hub(8);
        let (_id, mut rx) = connect(&hub).await;
        assert_eq!(next_frame(&mut rx).await["action"], "user_count");

        hub.publish(Action::NewEvent, &serde_json::json!({ "id": 1 }));
        hub.publish(Action::VerifyEvent, &serde_json::json!({ "id": 1, "verified_count": 1 }));
        hub.publish(Action::DeleteEvent, &serde_json::json!({ "id": 1 }));

        assert_eq!(next_frame(&mut rx).await["action"], "new_event");
        assert_eq!(next_frame(&mut rx).await["action"], "verify_event");
        assert_eq!(next_frame(&mut rx).await["action"], "delete_event");
    }

    #[tokio::test]
    async fn all_live_connections_see_identical_stream() {
        let hub = spawn_hub(16);
        let mut receivers = Vec::new();
        for _ in 0..3 {
            let (_, rx) = connect(&hub).await;
            receivers.push(rx);
        }

        hub.publish(Action::NewEvent, &serde_json::json!({ "id": 9, "title": "pickup soccer" }));
        hub.publish(Action::VerifyEvent, &serde_json::json!({ "id": 9, "verified_count": 1 }));
        hub.publish(Action::VerifyEvent, &serde_json::json!({ "id": 9, "verified_count": 2 }));

        for rx in &mut receivers {
            let mut actions = Vec::new();
            while actions.len() < 3 {
                let msg = next_frame(rx).await;
                if msg["action"] != "user_count" {
                    actions.push(msg);
                }
            }
            assert_eq!(actions[0]["action"], "new_event");
            assert_eq!(actions[0]["data"]["title"], "pickup soccer");
            assert_eq!(actions[1]["data"]["verified_count"], 1);
            assert_eq!(actions[2]["data"]["verified_count"], 2);
        }
    }

    #[tokio::test]
    async fn unregister_is_idempotent_and_announces_once() {
        let hub = spawn_hub(8);
        let (a, mut rx_a) = connect(&hub).await;
        let (b, _rx_b) = connect(&hub).await;
        assert_eq!(next_frame(&mut rx_a).await["data"]["count"], 1);
        assert_eq!(next_frame(&mut rx_a).await["data"]["count"], 2);

        hub.unregister(b).await;
        hub.unregister(b).await;
        hub.publish(Action::DeleteEvent, &serde_json::json!({ "id": 5 }));

        // Exactly one user_count for the removal, then the marker frame.
        assert_eq!(next_frame(&mut rx_a).await["data"]["count"], 1);
        assert_eq!(next_frame(&mut rx_a).await["action"], "delete_event");

        hub.unregister(a).await;
    }

    #[tokio::test]
    async fn full_mailbox_is_evicted_without_blocking_others() {
        let hub = spawn_hub(2);
        // Slow client never drains; two user_count frames fill it.
        let (_slow, slow_rx) = connect(&hub).await;
        let (_live, mut live_rx) = connect(&hub).await;
        assert_eq!(next_frame(&mut live_rx).await["data"]["count"], 2);

        hub.publish(Action::NewEvent, &serde_json::json!({ "id": 3 }));

        // The live client still gets the frame in the same pass, then
        // the eviction's user_count.
        assert_eq!(next_frame(&mut live_rx).await["action"], "new_event");
        assert_eq!(next_frame(&mut live_rx).await["data"]["count"], 1);

        // The evicted mailbox is closed once buffered frames drain.
        let mut slow_rx = slow_rx;
        assert!(slow_rx.recv().await.is_some());
        assert!(slow_rx.recv().await.is_some());
        assert!(slow_rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn dropped_receiver_is_evicted_on_next_fanout() {
        let hub = spawn_hub(8);
        let (_gone, gone_rx) = connect(&hub).await;
        let (_live, mut live_rx) = connect(&hub).await;
        assert_eq!(next_frame(&mut live_rx).await["data"]["count"], 2);
        drop(gone_rx);

        hub.publish(Action::DeleteEvent, &serde_json::json!({ "id": 1 }));

        assert_eq!(next_frame(&mut live_rx).await["action"], "delete_event");
        assert_eq!(next_frame(&mut live_rx).await["data"]["count"], 1);
    }

    #[tokio::test]
    async fn late_registrant_misses_earlier_frames() {
        let hub = spawn_hub(8);
        let (_a, mut rx_a) = connect(&hub).await;
        assert_eq!(next_frame(&mut rx_a).await["data"]["count"], 1);

        hub.publish(Action::NewEvent, &serde_json::json!({ "id": 1 }));
        assert_eq!(next_frame(&mut rx_a).await["action"], "new_event");

        let (_b, mut rx_b) = connect(&hub).await;
        // The first thing the late client sees is the registration's
        // user_count, never the earlier new_event.
        assert_eq!(next_frame(&mut rx_b).await["action"], "user_count");
        hub.publish(Action::DeleteEvent, &serde_json::json!({ "id": 1 }));
        assert_eq!(next_frame(&mut rx_b).await["action"], "delete_event");
    }
}
