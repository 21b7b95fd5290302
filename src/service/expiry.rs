//! Periodic sweep deleting events past their end time.

use std::time::Duration;

use chrono::Utc;

use crate::persistence::EventStore;

/// Runs the expiry sweep on a fixed interval, forever.
///
/// Each removed row fires the delete trigger, so clients learn about
/// expiries through the bridge like any other deletion.
pub async fn run_expiry_worker(store: EventStore, interval_secs: u64) {
    let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
    // The first tick completes immediately; skip it so sweeps start one
    // full interval after boot.
    ticker.tick().await;

    tracing::info!(interval_secs, "event expiry worker started");
    loop {
        ticker.tick().await;
        match store.delete_expired(Utc::now()).await {
            Ok(0) => {}
            Ok(expired) => tracing::info!(expired, "expired events removed"),
            Err(e) => tracing::warn!(error = %e, "expiry sweep failed"),
        }
    }
}
