//! WebSocket layer: broadcast hub, connection lifecycle, upgrade handler.
//!
//! The `/ws` endpoint gives every client a long-lived push stream of
//! board changes. The [`hub::Hub`] fans each published message out to
//! all live connections without ever blocking a producer.

pub mod connection;
pub mod handler;
pub mod hub;
pub mod messages;
