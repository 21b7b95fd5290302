//! # pulseboard
//!
//! REST API and WebSocket gateway for a location-scoped live event board.
//!
//! Clients create and verify geographically fenced events over REST, and
//! every connected WebSocket client sees near-real-time updates: new
//! events, updates, deletions, verification counts, and the live user
//! count. The real-time core is a broadcast hub with a drop-on-full
//! backpressure policy plus a bridge that turns PostgreSQL
//! `LISTEN`/`NOTIFY` change notifications into the same broadcast stream.
//!
//! ## Architecture
//!
//! ```text
//! Clients (HTTP, WebSocket)
//!     │
//!     ├── REST Handlers (api/)
//!     ├── WS Upgrade + Connections (ws/)
//!     │
//!     ├── EventService (service/)
//!     ├── Hub (ws/hub.rs)
//!     │
//!     ├── Change-Notification Bridge (bridge.rs)
//!     │
//!     └── PostgreSQL (persistence/, triggers → NOTIFY)
//! ```

pub mod api;
pub mod app_state;
pub mod bridge;
pub mod config;
pub mod domain;
pub mod error;
pub mod persistence;
pub mod service;
pub mod ws;
