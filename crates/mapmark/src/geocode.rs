//! Reverse-geocoding collaborator interface.
//!
//! Turning a tapped coordinate into a human-readable marker name is the one
//! asynchronous operation in this core. The lookup service itself lives
//! outside the library; this module defines the trait it implements and the
//! policy for turning its answer into a marker name.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::warn;

use crate::marker::Coordinate;

/// Errors from a reverse-geocode lookup.
#[derive(Debug, Error)]
pub enum GeocodeError {
    /// The lookup service failed.
    #[error("reverse geocoding failed: {0}")]
    Lookup(String),

    /// The service is unreachable.
    #[error("reverse geocoding unavailable: {0}")]
    Unavailable(String),
}

/// Result type for geocoding operations.
pub type Result<T> = std::result::Result<T, GeocodeError>;

/// A service that resolves a coordinate to a place name.
#[async_trait]
pub trait ReverseGeocoder: Send + Sync {
    /// Look up the place name for a coordinate.
    ///
    /// `Ok(None)` means the lookup succeeded but the place has no usable
    /// name.
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup fails or the service is unreachable.
    async fn place_name(&self, coordinate: Coordinate) -> Result<Option<String>>;
}

/// Resolve the name for a marker being placed at `coordinate`.
///
/// Maps the lookup outcome onto the marker-name policy: a found name is used
/// as-is; a nameless place gets `fallback`; an error or a lookup that
/// exceeds `timeout` yields an empty string, which keeps the marker out of
/// persistence until the user names it.
///
/// Lookups are not cancelable. If the user dismisses the add-marker flow
/// while one is in flight, a late result may still overwrite the pending
/// name; the timeout bounds how late that can happen.
pub async fn resolve_marker_name(
    geocoder: &dyn ReverseGeocoder,
    coordinate: Coordinate,
    timeout: Duration,
    fallback: &str,
) -> String {
    match tokio::time::timeout(timeout, geocoder.place_name(coordinate)).await {
        Ok(Ok(Some(name))) => name,
        Ok(Ok(None)) => fallback.to_string(),
        Ok(Err(e)) => {
            warn!(%coordinate, error = %e, "reverse geocoding failed");
            String::new()
        }
        Err(_) => {
            warn!(%coordinate, ?timeout, "reverse geocoding timed out");
            String::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A geocoder double with a scripted answer.
    #[derive(Debug)]
    enum ScriptedGeocoder {
        Name(String),
        Nameless,
        Failing,
        Hanging,
    }

    #[async_trait]
    impl ReverseGeocoder for ScriptedGeocoder {
        async fn place_name(&self, _coordinate: Coordinate) -> Result<Option<String>> {
            match self {
                Self::Name(name) => Ok(Some(name.clone())),
                Self::Nameless => Ok(None),
                Self::Failing => Err(GeocodeError::Lookup("no network".to_string())),
                Self::Hanging => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok(None)
                }
            }
        }
    }

    const TIMEOUT: Duration = Duration::from_millis(200);

    fn helsinki() -> Coordinate {
        Coordinate::new(60.1699, 24.9384)
    }

    #[tokio::test]
    async fn test_resolved_name_is_used() {
        let geocoder = ScriptedGeocoder::Name("Kauppatori".to_string());
        let name = resolve_marker_name(&geocoder, helsinki(), TIMEOUT, "Unknown Location").await;
        assert_eq!(name, "Kauppatori");
    }

    #[tokio::test]
    async fn test_nameless_place_gets_fallback() {
        let geocoder = ScriptedGeocoder::Nameless;
        let name = resolve_marker_name(&geocoder, helsinki(), TIMEOUT, "Unknown Location").await;
        assert_eq!(name, "Unknown Location");
    }

    #[tokio::test]
    async fn test_lookup_error_yields_empty_name() {
        let geocoder = ScriptedGeocoder::Failing;
        let name = resolve_marker_name(&geocoder, helsinki(), TIMEOUT, "Unknown Location").await;
        assert_eq!(name, "");
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_yields_empty_name() {
        let geocoder = ScriptedGeocoder::Hanging;
        let name = resolve_marker_name(&geocoder, helsinki(), TIMEOUT, "Unknown Location").await;
        assert_eq!(name, "");
    }

    #[test]
    fn test_geocode_error_display() {
        let err = GeocodeError::Lookup("boom".to_string());
        assert!(err.to_string().contains("boom"));

        let err = GeocodeError::Unavailable("offline".to_string());
        assert!(err.to_string().contains("offline"));
    }
}
