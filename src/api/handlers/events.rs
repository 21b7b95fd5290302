//! Public event endpoints: list, create, verify.

use std::net::SocketAddr;

use axum::Json;
use axum::extract::{ConnectInfo, Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use chrono::{Duration, Utc};

use crate::api::dto::{CreateEventRequest, EventsQuery, VerifyRequest, VerifyResponse};
use crate::app_state::AppState;
use crate::domain::{Event, NewEvent};
use crate::error::{ErrorResponse, GatewayError};

/// `GET /api/events` — Active events near a location.
///
/// # Errors
///
/// Returns a [`GatewayError`] on database failure.
#[utoipa::path(
    get,
    path = "/api/events",
    tag = "Events",
    summary = "List active events near a location",
    params(EventsQuery),
    responses(
        (status = 200, description = "Events within the radius", body = Vec<Event>),
        (status = 500, description = "Store failure", body = ErrorResponse),
    )
)]
pub async fn list_events(
    State(state): State<AppState>,
    Query(query): Query<EventsQuery>,
) -> Result<Json<Vec<Event>>, GatewayError> {
    let events = state
        .event_service
        .nearby(query.lat, query.lng, query.radius)
        .await?;
    Ok(Json(events))
}

/// `POST /api/events` — Create a new event inside the geofence.
///
/// The active window starts one minute in the past (so the event shows
/// up immediately) and runs for `duration_hours`.
///
/// # Errors
///
/// Returns a [`GatewayError`] on invalid input, a location outside the
/// geofence, or database failure.
#[utoipa::path(
    post,
    path = "/api/events",
    tag = "Events",
    summary = "Create a new event",
    request_body = CreateEventRequest,
    responses(
        (status = 201, description = "Event created and broadcast", body = Event),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 403, description = "Location outside the geofence", body = ErrorResponse),
    )
)]
pub async fn create_event(
    State(state): State<AppState>,
    Json(req): Json<CreateEventRequest>,
) -> Result<impl IntoResponse, GatewayError> {
    if req.title.trim().is_empty() {
        return Err(GatewayError::InvalidRequest("title is required".into()));
    }
    if !req.duration_hours.is_finite() || req.duration_hours <= 0.0 {
        return Err(GatewayError::InvalidRequest(
            "duration_hours must be positive".into(),
        ));
    }

    let now = Utc::now();
    let duration_ms = (req.duration_hours * 3_600_000.0) as i64;
    let new = NewEvent {
        title: req.title,
        description: req.description,
        category: req.category,
        latitude: req.lat,
        longitude: req.lng,
        start_time: now - Duration::minutes(1),
        end_time: now + Duration::milliseconds(duration_ms),
        creator_name: req.creator_name,
        creator_email: req.creator_email,
    };

    let event = state.event_service.create(new).await?;
    Ok((StatusCode::CREATED, Json(event)))
}

/// `POST /api/events/{id}/verify` — Verify an event.
///
/// # Errors
///
/// Returns a [`GatewayError`] for an unknown event or database failure.
#[utoipa::path(
    post,
    path = "/api/events/{id}/verify",
    tag = "Events",
    summary = "Verify an event",
    params(("id" = i64, Path, description = "Event row id")),
    request_body = VerifyRequest,
    responses(
        (status = 200, description = "Verification counted and broadcast", body = VerifyResponse),
        (status = 404, description = "Unknown event", body = ErrorResponse),
    )
)]
pub async fn verify_event(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    body: Option<Json<VerifyRequest>>,
) -> Result<Json<VerifyResponse>, GatewayError> {
    let req = body.map(|Json(r)| r).unwrap_or_default();
    let ip = addr.ip().to_string();

    let verified_count = state
        .event_service
        .verify(id, &ip, req.user_name, req.user_email)
        .await?;

    Ok(Json(VerifyResponse {
        message: "Event verified successfully".to_string(),
        verified_count,
    }))
}
