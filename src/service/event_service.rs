//! Event service: orchestrates board mutations and their broadcasts.
//!
//! This is the producer side of the hub contract: every successful
//! mutation publishes the matching broadcast synchronously after the
//! store commit. Updates and deletes are additionally announced by the
//! database triggers through the bridge, which clients absorb as
//! duplicate (idempotent) messages.

use serde::Serialize;

use crate::domain::{Event, Geofence, NewEvent, geo};
use crate::error::GatewayError;
use crate::persistence::EventStore;
use crate::ws::hub::Hub;
use crate::ws::messages::Action;

/// `verify_event` broadcast payload.
#[derive(Debug, Serialize)]
struct VerifyBroadcast {
    id: i64,
    verified_count: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_name: Option<String>,
}

/// Orchestration layer for all board operations.
///
/// Every mutation method follows the pattern: validate → store op →
/// publish broadcast → return result.
#[derive(Debug, Clone)]
pub struct EventService {
    store: EventStore,
    hub: Hub,
    geofence: Geofence,
}

impl EventService {
    /// Creates a new `EventService`.
    #[must_use]
    pub fn new(store: EventStore, hub: Hub, geofence: Geofence) -> Self {
        Self {
            store,
            hub,
            geofence,
        }
    }

    /// Creates an event inside the geofence and announces it.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::OutsideGeofence`] when the location falls
    /// outside the configured radius, or a persistence error on database
    /// failure.
    pub async fn create(&self, new: NewEvent) -> Result<Event, GatewayError> {
        let distance_km = self
            .geofence
            .distance_from_center_km(new.latitude, new.longitude);
        if distance_km > self.geofence.radius_km {
            return Err(GatewayError::OutsideGeofence { distance_km });
        }

        let id = self.store.insert_event(&new).await?;

        let event = Event {
            id,
            location: geo::wkt_point(new.longitude, new.latitude),
            title: new.title,
            description: new.description,
            category: new.category,
            start_time: new.start_time,
            end_time: new.end_time,
            verified_count: 0,
            is_approved: false,
            creator_name: new.creator_name,
            creator_email: new.creator_email,
            verifiers: Vec::new(),
            latitude: new.latitude,
            longitude: new.longitude,
            created_at: None,
        };

        self.hub.publish(Action::NewEvent, &event);
        tracing::info!(id, title = %event.title, "event created");
        Ok(event)
    }

    /// Active events within `radius_m` metres of `(lat, lng)`.
    ///
    /// # Errors
    ///
    /// Returns a persistence error on database failure.
    pub async fn nearby(
        &self,
        lat: f64,
        lng: f64,
        radius_m: f64,
    ) -> Result<Vec<Event>, GatewayError> {
        self.store.events_within(lat, lng, radius_m).await
    }

    /// Verifies an event, optionally recording who vouched for it, and
    /// announces the new count.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::EventNotFound`] for an unknown id, or a
    /// persistence error on database failure.
    pub async fn verify(
        &self,
        id: i64,
        ip_address: &str,
        user_name: Option<String>,
        user_email: Option<String>,
    ) -> Result<i32, GatewayError> {
        let verified_count = self.store.increment_verified(id).await?;

        if let Some(name) = user_name.as_deref()
            && !name.is_empty()
            && let Err(e) = self
                .store
                .record_verification(id, ip_address, name, user_email.as_deref().unwrap_or(""))
                .await
        {
            // The count already moved; a duplicate or failed verifier
            // row is not worth failing the request over.
            tracing::warn!(id, error = %e, "verification record not stored");
        }

        self.hub.publish(
            Action::VerifyEvent,
            &VerifyBroadcast {
                id,
                verified_count,
                user_name,
            },
        );
        tracing::info!(id, verified_count, "event verified");
        Ok(verified_count)
    }

    /// Every event row for the admin dashboard.
    ///
    /// # Errors
    ///
    /// Returns a persistence error on database failure.
    pub async fn all(&self) -> Result<Vec<Event>, GatewayError> {
        self.store.all_events().await
    }

    /// Flips an event's approval flag. The resulting broadcast arrives
    /// via the update trigger and the bridge, not from here.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::EventNotFound`] for an unknown id, or a
    /// persistence error on database failure.
    pub async fn toggle_approval(&self, id: i64) -> Result<Event, GatewayError> {
        let event = self.store.toggle_approval(id).await?;
        tracing::info!(id, is_approved = event.is_approved, "event approval toggled");
        Ok(event)
    }

    /// Deletes an event. The resulting `delete_event` broadcast arrives
    /// via the delete trigger and the bridge, not from here.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::EventNotFound`] for an unknown id, or a
    /// persistence error on database failure.
    pub async fn delete(&self, id: i64) -> Result<(), GatewayError> {
        self.store.delete_event(id).await?;
        tracing::info!(id, "event deleted");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn verify_broadcast_omits_missing_user_name() {
        let anonymous = VerifyBroadcast {
            id: 4,
            verified_count: 2,
            user_name: None,
        };
        let json = serde_json::to_string(&anonymous).unwrap();
        assert_eq!(json, r#"{"id":4,"verified_count":2}"#);

        let named = VerifyBroadcast {
            id: 4,
            verified_count: 3,
            user_name: Some("sam".to_string()),
        };
        let json = serde_json::to_string(&named).unwrap();
        assert_eq!(json, r#"{"id":4,"verified_count":3,"user_name":"sam"}"#);
    }
}
