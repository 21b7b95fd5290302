//! Domain types: event records and geofence math.

pub mod event;
pub mod geo;

pub use event::{Event, NewEvent};
pub use geo::Geofence;
