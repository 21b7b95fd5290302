//! REST API layer: route handlers, DTOs, and router composition.
//!
//! Event and admin endpoints are mounted under `/api`; the health check
//! lives at the root.

pub mod dto;
pub mod handlers;

use axum::Router;
use utoipa::OpenApi;

use crate::app_state::AppState;

/// OpenAPI document covering the REST surface.
#[derive(Debug, OpenApi)]
#[openapi(
    paths(
        handlers::events::list_events,
        handlers::events::create_event,
        handlers::events::verify_event,
        handlers::admin::list_all_events,
        handlers::admin::toggle_approval,
        handlers::admin::delete_event,
        handlers::system::health_handler,
        handlers::system::stats_handler,
    ),
    tags(
        (name = "Events", description = "Public event board operations"),
        (name = "Admin", description = "Moderation operations"),
        (name = "System", description = "Health and presence"),
    )
)]
pub struct ApiDoc;

/// Builds the complete API router with all REST endpoints.
pub fn build_router() -> Router<AppState> {
    Router::new()
        .nest("/api", handlers::routes())
        .merge(handlers::system::routes())
}
