//! PostgreSQL implementation of the event store.

use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use crate::config::GatewayConfig;
use crate::domain::{Event, NewEvent, geo};
use crate::error::GatewayError;

/// Schema and trigger setup executed at startup, in order.
///
/// The two trigger functions feed the change-notification bridge: every
/// deleted row publishes its id on `event_deleted`, every updated row
/// publishes its full `row_to_json` on `event_updated`.
const MIGRATIONS: &[&str] = &[
    "CREATE EXTENSION IF NOT EXISTS postgis",
    "CREATE TABLE IF NOT EXISTS events (
        id BIGSERIAL PRIMARY KEY,
        title TEXT NOT NULL,
        description TEXT NOT NULL DEFAULT '',
        category TEXT NOT NULL,
        location GEOGRAPHY(POINT) NOT NULL,
        start_time TIMESTAMPTZ NOT NULL,
        end_time TIMESTAMPTZ NOT NULL,
        verified_count INT NOT NULL DEFAULT 0,
        is_approved BOOLEAN NOT NULL DEFAULT FALSE,
        creator_name TEXT NOT NULL DEFAULT '',
        creator_email TEXT NOT NULL DEFAULT '',
        created_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )",
    "CREATE TABLE IF NOT EXISTS verifications (
        id BIGSERIAL PRIMARY KEY,
        event_id BIGINT NOT NULL REFERENCES events(id) ON DELETE CASCADE,
        ip_address TEXT NOT NULL,
        user_name TEXT NOT NULL DEFAULT '',
        user_email TEXT NOT NULL DEFAULT '',
        created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        UNIQUE (event_id, ip_address)
    )",
    "CREATE OR REPLACE FUNCTION notify_event_delete() RETURNS trigger AS $$
    BEGIN
        PERFORM pg_notify('event_deleted', OLD.id::text);
        RETURN OLD;
    END;
    $$ LANGUAGE plpgsql",
    "DROP TRIGGER IF EXISTS trg_event_delete ON events",
    "CREATE TRIGGER trg_event_delete
        AFTER DELETE ON events
        FOR EACH ROW EXECUTE FUNCTION notify_event_delete()",
    "CREATE OR REPLACE FUNCTION notify_event_update() RETURNS trigger AS $$
    BEGIN
        PERFORM pg_notify('event_updated', row_to_json(NEW)::text);
        RETURN NEW;
    END;
    $$ LANGUAGE plpgsql",
    "DROP TRIGGER IF EXISTS trg_event_update ON events",
    "CREATE TRIGGER trg_event_update
        AFTER UPDATE ON events
        FOR EACH ROW EXECUTE FUNCTION notify_event_update()",
];

/// Row tuple shared by the listing queries: everything an [`Event`]
/// needs, with the geography rendered as WKT text and verifier names
/// aggregated into an array.
type EventTuple = (
    i64,
    String,
    String,
    String,
    String,
    DateTime<Utc>,
    DateTime<Utc>,
    i32,
    bool,
    String,
    String,
    DateTime<Utc>,
    Vec<String>,
);

/// PostgreSQL-backed event store using `sqlx::PgPool`.
#[derive(Debug, Clone)]
pub struct EventStore {
    pool: PgPool,
}

impl EventStore {
    /// Creates a store around an existing connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects a pool using the configured limits.
    ///
    /// # Errors
    ///
    /// Returns a [`GatewayError::PersistenceError`] when the database is
    /// unreachable.
    pub async fn connect(config: &GatewayConfig) -> Result<Self, GatewayError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .min_connections(config.database_min_connections)
            .acquire_timeout(Duration::from_secs(config.database_connect_timeout_secs))
            .connect(&config.database_url)
            .await
            .map_err(|e| GatewayError::PersistenceError(e.to_string()))?;
        Ok(Self::new(pool))
    }

    /// Applies the schema and installs the NOTIFY triggers. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns a [`GatewayError::PersistenceError`] on database failure.
    pub async fn migrate(&self) -> Result<(), GatewayError> {
        for statement in MIGRATIONS {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| GatewayError::PersistenceError(e.to_string()))?;
        }
        tracing::info!("schema and notify triggers up to date");
        Ok(())
    }

    /// Active events within `radius_m` metres of `(lat, lng)`.
    ///
    /// This feeds the public listing, so the creator's email address is
    /// withheld from the mapped rows.
    ///
    /// # Errors
    ///
    /// Returns a [`GatewayError::PersistenceError`] on database failure.
    pub async fn events_within(
        &self,
        lat: f64,
        lng: f64,
        radius_m: f64,
    ) -> Result<Vec<Event>, GatewayError> {
        let rows = sqlx::query_as::<_, EventTuple>(
            "SELECT e.id, e.title, e.description, e.category,
                    ST_AsText(e.location) AS location_text,
                    e.start_time, e.end_time, e.verified_count, e.is_approved,
                    e.creator_name, e.creator_email, e.created_at,
                    COALESCE(array_agg(v.user_name) FILTER (WHERE v.user_name <> ''), '{}') AS verifier_names
             FROM events e
             LEFT JOIN verifications v ON e.id = v.event_id
             WHERE ST_DWithin(e.location, ST_SetSRID(ST_MakePoint($1, $2), 4326)::geography, $3)
               AND e.start_time <= now()
               AND e.end_time >= now()
             GROUP BY e.id",
        )
        .bind(lng)
        .bind(lat)
        .bind(radius_m)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| GatewayError::PersistenceError(e.to_string()))?;

        Ok(rows.into_iter().map(|row| event_from_tuple(row, false)).collect())
    }

    /// Every event row, newest first, for the admin dashboard.
    ///
    /// # Errors
    ///
    /// Returns a [`GatewayError::PersistenceError`] on database failure.
    pub async fn all_events(&self) -> Result<Vec<Event>, GatewayError> {
        let rows = sqlx::query_as::<_, EventTuple>(
            "SELECT e.id, e.title, e.description, e.category,
                    ST_AsText(e.location) AS location_text,
                    e.start_time, e.end_time, e.verified_count, e.is_approved,
                    e.creator_name, e.creator_email, e.created_at,
                    COALESCE(array_agg(v.user_name) FILTER (WHERE v.user_name <> ''), '{}') AS verifier_names
             FROM events e
             LEFT JOIN verifications v ON e.id = v.event_id
             GROUP BY e.id
             ORDER BY e.id DESC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| GatewayError::PersistenceError(e.to_string()))?;

        Ok(rows.into_iter().map(|row| event_from_tuple(row, true)).collect())
    }

    /// Inserts a new event row, returning its id.
    ///
    /// # Errors
    ///
    /// Returns a [`GatewayError::PersistenceError`] on database failure.
    pub async fn insert_event(&self, new: &NewEvent) -> Result<i64, GatewayError> {
        let wkt = geo::wkt_point(new.longitude, new.latitude);
        let id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO events
                 (title, description, category, location, start_time, end_time,
                  creator_name, creator_email)
             VALUES ($1, $2, $3, ST_GeogFromText($4), $5, $6, $7, $8)
             RETURNING id",
        )
        .bind(&new.title)
        .bind(&new.description)
        .bind(&new.category)
        .bind(&wkt)
        .bind(new.start_time)
        .bind(new.end_time)
        .bind(&new.creator_name)
        .bind(&new.creator_email)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| GatewayError::PersistenceError(e.to_string()))?;

        Ok(id)
    }

    /// Increments an event's verification count, returning the new value.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::EventNotFound`] when no such row exists,
    /// or a [`GatewayError::PersistenceError`] on database failure.
    pub async fn increment_verified(&self, id: i64) -> Result<i32, GatewayError> {
        let count = sqlx::query_scalar::<_, i32>(
            "UPDATE events SET verified_count = verified_count + 1
             WHERE id = $1
             RETURNING verified_count",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| GatewayError::PersistenceError(e.to_string()))?;

        count.ok_or(GatewayError::EventNotFound(id))
    }

    /// Records who verified an event; one row per `(event, ip)` pair,
    /// conflicts ignored.
    ///
    /// # Errors
    ///
    /// Returns a [`GatewayError::PersistenceError`] on database failure.
    pub async fn record_verification(
        &self,
        event_id: i64,
        ip_address: &str,
        user_name: &str,
        user_email: &str,
    ) -> Result<(), GatewayError> {
        sqlx::query(
            "INSERT INTO verifications (event_id, ip_address, user_name, user_email)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (event_id, ip_address) DO NOTHING",
        )
        .bind(event_id)
        .bind(ip_address)
        .bind(user_name)
        .bind(user_email)
        .execute(&self.pool)
        .await
        .map_err(|e| GatewayError::PersistenceError(e.to_string()))?;

        Ok(())
    }

    /// Flips an event's approval flag, returning the updated row.
    ///
    /// The UPDATE fires the `event_updated` trigger, so the change
    /// reaches clients through the bridge without a direct publish.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::EventNotFound`] when no such row exists,
    /// or a [`GatewayError::PersistenceError`] on database failure.
    pub async fn toggle_approval(&self, id: i64) -> Result<Event, GatewayError> {
        let row = sqlx::query_as::<_, EventTuple>(
            "UPDATE events SET is_approved = NOT is_approved
             WHERE id = $1
             RETURNING id, title, description, category,
                       ST_AsText(location) AS location_text,
                       start_time, end_time, verified_count, is_approved,
                       creator_name, creator_email, created_at,
                       '{}'::text[] AS verifier_names",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| GatewayError::PersistenceError(e.to_string()))?;

        row.map(|r| event_from_tuple(r, true))
            .ok_or(GatewayError::EventNotFound(id))
    }

    /// Deletes an event row; the delete trigger announces it to clients.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::EventNotFound`] when no such row exists,
    /// or a [`GatewayError::PersistenceError`] on database failure.
    pub async fn delete_event(&self, id: i64) -> Result<(), GatewayError> {
        let result = sqlx::query("DELETE FROM events WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| GatewayError::PersistenceError(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(GatewayError::EventNotFound(id));
        }
        Ok(())
    }

    /// Deletes every event whose window ended before `now`, returning
    /// how many rows went. Each deletion fires the delete trigger.
    ///
    /// # Errors
    ///
    /// Returns a [`GatewayError::PersistenceError`] on database failure.
    pub async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, GatewayError> {
        let result = sqlx::query("DELETE FROM events WHERE end_time < $1")
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(|e| GatewayError::PersistenceError(e.to_string()))?;

        Ok(result.rows_affected())
    }
}

/// Builds an [`Event`] from one listing tuple.
///
/// Admin views carry the full row. The public view withholds the
/// creator's email address and the row timestamp.
fn event_from_tuple(row: EventTuple, admin: bool) -> Event {
    let (
        id,
        title,
        description,
        category,
        location,
        start_time,
        end_time,
        verified_count,
        is_approved,
        creator_name,
        creator_email,
        created_at,
        verifiers,
    ) = row;

    let (longitude, latitude) = geo::parse_wkt_point(&location).unwrap_or((0.0, 0.0));

    Event {
        id,
        title,
        description,
        category,
        location,
        start_time,
        end_time,
        verified_count,
        is_approved,
        creator_name,
        creator_email: if admin { creator_email } else { String::new() },
        verifiers,
        latitude,
        longitude,
        created_at: admin.then_some(created_at),
    }
}
