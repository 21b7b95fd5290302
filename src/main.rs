//! pulseboard server entry point.
//!
//! Starts the Axum HTTP server with REST and WebSocket endpoints, the
//! broadcast hub control loop, the change-notification bridge, and the
//! event expiry worker.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use pulseboard::api;
use pulseboard::app_state::AppState;
use pulseboard::bridge;
use pulseboard::config::GatewayConfig;
use pulseboard::persistence::EventStore;
use pulseboard::service::{EventService, expiry};
use pulseboard::ws::handler::ws_handler;
use pulseboard::ws::hub::Hub;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let config = GatewayConfig::from_env()?;
    tracing::info!(addr = %config.listen_addr, "starting pulseboard");

    // Connect the store and apply schema + notify triggers
    let store = EventStore::connect(&config).await?;
    store.migrate().await?;

    // Broadcast hub: one control loop owns the registry
    let (hub, hub_runner) = Hub::new(config.hub_queue_capacity, config.ws_mailbox_capacity);
    tokio::spawn(hub_runner.run());

    // Store-triggered realtime sync; degrades gracefully when the
    // listener connection cannot be established
    tokio::spawn(bridge::run_bridge(config.database_url.clone(), hub.clone()));

    // Periodic removal of ended events
    tokio::spawn(expiry::run_expiry_worker(
        store.clone(),
        config.expiry_interval_secs,
    ));

    // Build service layer and application state
    let event_service = Arc::new(EventService::new(store, hub.clone(), config.geofence));
    let app_state = AppState {
        event_service,
        hub,
        sessions: Default::default(),
    };

    // Build router
    let app = Router::new()
        .merge(api::build_router())
        .route("/ws", get(ws_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(app_state);

    #[cfg(feature = "swagger-ui")]
    let app = {
        use utoipa::OpenApi;
        app.merge(
            utoipa_swagger_ui::SwaggerUi::new("/docs")
                .url("/api-docs/openapi.json", api::ApiDoc::openapi()),
        )
    };

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
