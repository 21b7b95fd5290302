//! REST endpoint handlers organized by resource.

pub mod admin;
pub mod events;
pub mod system;

use axum::Router;
use axum::routing::{delete, get, post, put};

use crate::app_state::AppState;

/// Composes all resource routes mounted under `/api`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/events", get(events::list_events).post(events::create_event))
        .route("/events/{id}/verify", post(events::verify_event))
        .route("/stats", get(system::stats_handler))
        .route("/admin/events", get(admin::list_all_events))
        .route("/admin/events/{id}/approval", put(admin::toggle_approval))
        .route("/admin/events/{id}", delete(admin::delete_event))
}
