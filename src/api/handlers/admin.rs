//! Admin endpoints: full listing, approval toggle, deletion.

use axum::Json;
use axum::extract::{Path, State};

use crate::api::dto::MessageResponse;
use crate::app_state::AppState;
use crate::domain::Event;
use crate::error::{ErrorResponse, GatewayError};

/// `GET /api/admin/events` — Every event row, newest first.
///
/// # Errors
///
/// Returns a [`GatewayError`] on database failure.
#[utoipa::path(
    get,
    path = "/api/admin/events",
    tag = "Admin",
    summary = "List all events",
    responses(
        (status = 200, description = "All events including unapproved", body = Vec<Event>),
        (status = 500, description = "Store failure", body = ErrorResponse),
    )
)]
pub async fn list_all_events(
    State(state): State<AppState>,
) -> Result<Json<Vec<Event>>, GatewayError> {
    let events = state.event_service.all().await?;
    Ok(Json(events))
}

/// `PUT /api/admin/events/{id}/approval` — Flip an event's approval flag.
///
/// # Errors
///
/// Returns a [`GatewayError`] for an unknown event or database failure.
#[utoipa::path(
    put,
    path = "/api/admin/events/{id}/approval",
    tag = "Admin",
    summary = "Toggle event approval",
    params(("id" = i64, Path, description = "Event row id")),
    responses(
        (status = 200, description = "Updated event", body = Event),
        (status = 404, description = "Unknown event", body = ErrorResponse),
    )
)]
pub async fn toggle_approval(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Event>, GatewayError> {
    let event = state.event_service.toggle_approval(id).await?;
    Ok(Json(event))
}

/// `DELETE /api/admin/events/{id}` — Delete an event.
///
/// The broadcast reaches clients through the delete trigger and the
/// bridge.
///
/// # Errors
///
/// Returns a [`GatewayError`] for an unknown event or database failure.
#[utoipa::path(
    delete,
    path = "/api/admin/events/{id}",
    tag = "Admin",
    summary = "Delete an event",
    params(("id" = i64, Path, description = "Event row id")),
    responses(
        (status = 200, description = "Event removed", body = MessageResponse),
        (status = 404, description = "Unknown event", body = ErrorResponse),
    )
)]
pub async fn delete_event(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<MessageResponse>, GatewayError> {
    state.event_service.delete(id).await?;
    Ok(Json(MessageResponse {
        message: "Event deleted successfully".to_string(),
    }))
}
