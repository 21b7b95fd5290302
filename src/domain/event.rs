//! The event record served to clients and carried in broadcasts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// One board event as stored in PostgreSQL and serialized to clients.
///
/// JSON field names are the wire contract shared by the REST responses
/// and the `new_event`/`update_event` broadcast payloads: coordinates go
/// out as `lat`/`lng`, everything else as snake_case.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Event {
    /// Row identifier.
    pub id: i64,
    /// Short event title.
    pub title: String,
    /// Free-form description.
    pub description: String,
    /// Category tag (e.g. `"Food"`, `"Study"`).
    pub category: String,
    /// WKT `POINT(lng lat)` text of the stored geography.
    pub location: String,
    /// Start of the active window.
    pub start_time: DateTime<Utc>,
    /// End of the active window; rows past this are swept.
    pub end_time: DateTime<Utc>,
    /// Number of verifications received.
    pub verified_count: i32,
    /// Admin approval flag.
    pub is_approved: bool,
    /// Display name of the creator.
    pub creator_name: String,
    /// Contact email of the creator (admin listings only in practice).
    pub creator_email: String,
    /// Display names of users who verified the event.
    pub verifiers: Vec<String>,
    /// Latitude parsed from the stored point.
    #[serde(rename = "lat")]
    pub latitude: f64,
    /// Longitude parsed from the stored point.
    #[serde(rename = "lng")]
    pub longitude: f64,
    /// Row creation timestamp; only populated by admin queries.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Fields required to insert a new event row.
#[derive(Debug, Clone)]
pub struct NewEvent {
    /// Short event title.
    pub title: String,
    /// Free-form description.
    pub description: String,
    /// Category tag.
    pub category: String,
    /// Latitude of the event location.
    pub latitude: f64,
    /// Longitude of the event location.
    pub longitude: f64,
    /// Start of the active window.
    pub start_time: DateTime<Utc>,
    /// End of the active window.
    pub end_time: DateTime<Utc>,
    /// Display name of the creator.
    pub creator_name: String,
    /// Contact email of the creator.
    pub creator_email: String,
}
