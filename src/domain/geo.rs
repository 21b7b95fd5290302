//! Geofence math: haversine distance and WKT point handling.

/// Mean Earth radius in kilometres.
const EARTH_RADIUS_KM: f64 = 6371.0;

/// Circular geographic fence that event locations must fall inside.
#[derive(Debug, Clone, Copy)]
pub struct Geofence {
    /// Latitude of the fence center.
    pub center_lat: f64,
    /// Longitude of the fence center.
    pub center_lng: f64,
    /// Allowed radius around the center in kilometres.
    pub radius_km: f64,
}

impl Geofence {
    /// Great-circle distance from the fence center to `(lat, lng)` in km.
    #[must_use]
    pub fn distance_from_center_km(&self, lat: f64, lng: f64) -> f64 {
        haversine_km(self.center_lat, self.center_lng, lat, lng)
    }

    /// Whether `(lat, lng)` lies within the fence radius.
    #[must_use]
    pub fn contains(&self, lat: f64, lng: f64) -> bool {
        self.distance_from_center_km(lat, lng) <= self.radius_km
    }
}

/// Great-circle distance between two coordinates in kilometres.
#[must_use]
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_KM * c
}

/// Formats a coordinate pair as WKT `POINT(lng lat)` for PostGIS.
#[must_use]
pub fn wkt_point(lng: f64, lat: f64) -> String {
    format!("POINT({lng} {lat})")
}

/// Parses WKT `POINT(lng lat)` text, returning `(lng, lat)`.
#[must_use]
pub fn parse_wkt_point(text: &str) -> Option<(f64, f64)> {
    let inner = text.strip_prefix("POINT(")?.strip_suffix(')')?;
    let mut parts = inner.split_whitespace();
    let lng: f64 = parts.next()?.parse().ok()?;
    let lat: f64 = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some((lng, lat))
}
