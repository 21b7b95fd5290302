//! Broadcast message envelope and action tags.
//!
//! Every frame pushed to clients is a single JSON text message of the
//! shape `{"action": <tag>, "data": <payload>}`. The hub treats `data`
//! as opaque; only producers and clients interpret it.
//!
//! Delivery is best-effort and at-least-once: a single mutation can be
//! announced both by the API handler that performed it and by the
//! database trigger behind the bridge, so clients must apply these
//! messages idempotently.

use axum::extract::ws::Utf8Bytes;
use serde::Serialize;

/// Action tag carried in every broadcast envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// A new event was created; `data` is the full record.
    NewEvent,
    /// An event row changed; `data` is the full post-mutation record.
    UpdateEvent,
    /// An event was removed; `data` is `{"id": <integer>}`.
    DeleteEvent,
    /// An event was verified; `data` is
    /// `{"id", "verified_count", "user_name"?}`.
    VerifyEvent,
    /// The live connection count changed; `data` is `{"count": <integer>}`.
    UserCount,
}

impl Action {
    /// Returns the wire tag as a static string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::NewEvent => "new_event",
            Self::UpdateEvent => "update_event",
            Self::DeleteEvent => "delete_event",
            Self::VerifyEvent => "verify_event",
            Self::UserCount => "user_count",
        }
    }
}

#[derive(Serialize)]
struct Envelope<'a, T: Serialize> {
    action: Action,
    data: &'a T,
}

/// Serializes one `{action, data}` envelope into a shared text frame.
///
/// # Errors
///
/// Returns the underlying `serde_json` error when `data` cannot be
/// encoded; callers abort that single publish and keep running.
pub fn encode_frame<T: Serialize>(action: Action, data: &T) -> serde_json::Result<Utf8Bytes> {
    serde_json::to_string(&Envelope { action, data }).map(Utf8Bytes::from)
}
