//! Change-notification bridge: PostgreSQL `LISTEN`/`NOTIFY` → hub.
//!
//! Row-level triggers installed by the persistence layer emit a
//! notification for every delete and update. The bridge holds a
//! dedicated listener connection (separate from the request-serving
//! pool; notification delivery cannot share a multiplexed query
//! connection) and republishes each notification as exactly one hub
//! broadcast. Mutations performed through the API are therefore
//! announced twice, once by the handler and once through here; clients
//! treat broadcasts idempotently.

use sqlx::postgres::PgListener;

use crate::ws::hub::Hub;
use crate::ws::messages::Action;

/// Channel fired by the `AFTER DELETE` trigger; payload is the row id.
pub const DELETED_CHANNEL: &str = "event_deleted";

/// Channel fired by the `AFTER UPDATE` trigger; payload is
/// `row_to_json(NEW)` text.
pub const UPDATED_CHANNEL: &str = "event_updated";

/// Runs the bridge until its listener connection is lost.
///
/// A setup failure (store unreachable, `LISTEN` rejected) logs a warning
/// and returns: the process keeps serving with API-triggered broadcasts
/// only. After setup, one malformed notification is skipped, not fatal;
/// a hard receive error ends the bridge for the process lifetime.
pub async fn run_bridge(database_url: String, hub: Hub) {
    let mut listener = match PgListener::connect(&database_url).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::warn!(error = %e, "change listener unavailable, realtime store sync disabled");
            return;
        }
    };

    if let Err(e) = listener.listen_all([DELETED_CHANNEL, UPDATED_CHANNEL]).await {
        tracing::warn!(error = %e, "LISTEN failed, realtime store sync disabled");
        return;
    }

    tracing::info!(
        channels = ?[DELETED_CHANNEL, UPDATED_CHANNEL],
        "change listener active"
    );

    loop {
        match listener.recv().await {
            Ok(notification) => {
                if let Some((action, data)) =
                    translate(notification.channel(), notification.payload())
                {
                    hub.publish(action, &data);
                    tracing::debug!(action = action.as_str(), "store notification broadcast");
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "change listener connection lost, realtime store sync disabled");
                return;
            }
        }
    }
}

/// Translates one store notification into a broadcast action + payload.
///
/// Returns `None` (after logging) for unknown channels or malformed
/// payloads; the receive loop carries on either way.
fn translate(channel: &str, payload: &str) -> Option<(Action, serde_json::Value)> {
    match channel {
        DELETED_CHANNEL => match payload.parse::<i64>() {
            Ok(id) => Some((Action::DeleteEvent, serde_json::json!({ "id": id }))),
            Err(e) => {
                tracing::warn!(payload, error = %e, "bad delete notification, skipped");
                None
            }
        },
        UPDATED_CHANNEL => match serde_json::from_str::<serde_json::Value>(payload) {
            Ok(record) => Some((Action::UpdateEvent, record)),
            Err(e) => {
                tracing::warn!(error = %e, "bad update notification, skipped");
                None
            }
        },
        other => {
            tracing::debug!(channel = other, "notification on unknown channel ignored");
            None
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn delete_payload_becomes_delete_event() {
        let (action, data) = translate(DELETED_CHANNEL, "42").unwrap();
        assert_eq!(action, Action::DeleteEvent);
        assert_eq!(data, serde_json::json!({ "id": 42 }));
    }

    #[test]
    fn malformed_delete_payload_is_skipped() {
        assert!(translate(DELETED_CHANNEL, "not-a-number").is_none());
        assert!(translate(DELETED_CHANNEL, "").is_none());
    }

    #[test]
    fn update_payload_carries_full_record() {
        let row = r#"{"id": 7, "title": "study group", "verified_count": 3}"#;
        let (action, data) = translate(UPDATED_CHANNEL, row).unwrap();
        assert_eq!(action, Action::UpdateEvent);
        assert_eq!(data["id"], 7);
        assert_eq!(data["title"], "study group");
    }

    #[test]
    fn malformed_update_does_not_poison_later_notifications() {
        assert!(translate(UPDATED_CHANNEL, "{broken json").is_none());
        // The next well-formed notification still translates.
        let (action, data) = translate(DELETED_CHANNEL, "8").unwrap();
        assert_eq!(action, Action::DeleteEvent);
        assert_eq!(data["id"], 8);
    }

    #[test]
    fn unknown_channels_are_ignored() {
        assert!(translate("event_inserted", "1").is_none());
    }
}
