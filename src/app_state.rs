//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::api::handlers::system::SessionTracker;
use crate::service::EventService;
use crate::ws::hub::Hub;

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Event service for all board operations.
    pub event_service: Arc<EventService>,
    /// Broadcast hub handle for the WebSocket layer.
    pub hub: Hub,
    /// REST-poll presence tracker behind `/api/stats`.
    pub sessions: SessionTracker,
}
