//! Core marker types for mapmark.
//!
//! This module defines the fundamental data structures for user-placed map
//! markers: a WGS-84 coordinate, an RGB color, and the marker itself.

use serde::{Deserialize, Serialize};

use crate::codec;

/// A WGS-84 coordinate in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    /// Latitude in degrees, valid range [-90, 90].
    pub latitude: f64,
    /// Longitude in degrees, valid range [-180, 180].
    pub longitude: f64,
}

impl Coordinate {
    /// Create a new coordinate.
    ///
    /// Range validation happens at decode time, not here: the platform is
    /// trusted to deliver well-formed fixes, and persisted values are checked
    /// when they are read back.
    #[must_use]
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Check whether both components are finite and within WGS-84 range.
    #[must_use]
    pub fn is_in_range(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

impl std::fmt::Display for Coordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "({}, {})",
            codec::format_coordinate(self.latitude),
            codec::format_coordinate(self.longitude)
        )
    }
}

/// An RGB color triple, one byte per channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgb {
    /// Red channel.
    pub r: u8,
    /// Green channel.
    pub g: u8,
    /// Blue channel.
    pub b: u8,
}

impl Rgb {
    /// Create a color from byte channels.
    #[must_use]
    pub fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Create a color from unit-interval channels, as delivered by a color
    /// picker. Each channel is scaled by 255 and truncated; out-of-range
    /// input is clamped to [0, 1] first.
    #[must_use]
    pub fn from_unit(r: f64, g: f64, b: f64) -> Self {
        let scale = |channel: f64| {
            let clamped = channel.clamp(0.0, 1.0);
            // Truncation, not rounding: 0.5 maps to 127.
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let byte = (clamped * 255.0) as u8;
            byte
        };
        Self {
            r: scale(r),
            g: scale(g),
            b: scale(b),
        }
    }
}

impl std::fmt::Display for Rgb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", codec::encode_color(*self))
    }
}

/// A user-placed named point with a coordinate and a color.
///
/// Markers are owned by the [`MarkerStore`](crate::store::MarkerStore); the
/// UI holds only transient copies for rendering. A marker is never mutated in
/// place; removal happens only through a full-list reset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Marker {
    /// Display label. May be empty transiently (a failed reverse-geocode
    /// leaves it empty) and may collide with other markers.
    pub name: String,

    /// Where the marker sits on the map.
    pub coordinate: Coordinate,

    /// Tint color chosen by the user.
    pub color: Rgb,
}

impl Marker {
    /// Create a new marker.
    #[must_use]
    pub fn new(name: impl Into<String>, coordinate: Coordinate, color: Rgb) -> Self {
        Self {
            name: name.into(),
            coordinate,
            color,
        }
    }

    /// Whether this marker qualifies for persistence. Markers without a name
    /// are kept in memory but never written to the store.
    #[must_use]
    pub fn has_name(&self) -> bool {
        !self.name.is_empty()
    }
}
