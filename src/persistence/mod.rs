//! Persistence layer: PostgreSQL event store.
//!
//! Owns the schema, the geospatial queries, and the NOTIFY triggers the
//! change-notification bridge listens on. The concrete implementation
//! uses `sqlx::PgPool` for async PostgreSQL access.

pub mod postgres;

pub use postgres::EventStore;
