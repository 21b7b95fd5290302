//! Request and response DTOs for the REST surface.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Request body for `POST /api/events`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateEventRequest {
    /// Short event title.
    pub title: String,
    /// Free-form description.
    #[serde(default)]
    pub description: String,
    /// Category tag (e.g. `"Food"`, `"Study"`).
    pub category: String,
    /// Latitude of the event location.
    pub lat: f64,
    /// Longitude of the event location.
    pub lng: f64,
    /// How long the event stays live, in hours from now.
    pub duration_hours: f64,
    /// Display name of the creator.
    #[serde(default)]
    pub creator_name: String,
    /// Contact email of the creator.
    #[serde(default)]
    pub creator_email: String,
}

/// Query parameters for `GET /api/events`.
#[derive(Debug, Clone, Deserialize, IntoParams)]
pub struct EventsQuery {
    /// Latitude of the search center.
    pub lat: f64,
    /// Longitude of the search center.
    pub lng: f64,
    /// Search radius in metres.
    pub radius: f64,
}

/// Optional request body for `POST /api/events/{id}/verify`.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct VerifyRequest {
    /// Display name to record alongside the verification.
    #[serde(default)]
    pub user_name: Option<String>,
    /// Contact email to record alongside the verification.
    #[serde(default)]
    pub user_email: Option<String>,
}

/// Response body for a successful verification.
#[derive(Debug, Serialize, ToSchema)]
pub struct VerifyResponse {
    /// Human-readable confirmation.
    pub message: String,
    /// Verification count after the increment.
    pub verified_count: i32,
}

/// Response body for `GET /api/stats`.
#[derive(Debug, Serialize, ToSchema)]
pub struct StatsResponse {
    /// Distinct client addresses seen within the sliding window.
    pub active_users: usize,
}

/// Generic confirmation body for admin mutations.
#[derive(Debug, Serialize, ToSchema)]
pub struct MessageResponse {
    /// Human-readable confirmation.
    pub message: String,
}
