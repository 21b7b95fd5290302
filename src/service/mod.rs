//! Service layer: board operations and the expiry worker.

pub mod event_service;
pub mod expiry;

pub use event_service::EventService;
