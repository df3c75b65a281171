//! Field codecs for persisted marker records.
//!
//! Every value that reaches the key-value store goes through two layers: a
//! domain formatting step (colors become `#RRGGBB`, coordinates become
//! fixed six-decimal strings) and a generic string codec (JSON) that turns
//! the string into bytes. Keeping the layers separate means a corrupt record
//! fails in a well-defined place and the store can skip it.

use thiserror::Error;

use crate::marker::Rgb;

/// Number of decimal places used when formatting coordinates.
///
/// A precision/readability tradeoff: six decimal places is roughly 0.1 m at
/// the equator, well below what a tap on a phone screen can express.
const COORDINATE_DECIMALS: usize = 6;

/// Errors produced while encoding or decoding a single record field.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The color string is not exactly six hex digits (after an optional `#`).
    #[error("invalid color string: {value:?}")]
    ColorFormat {
        /// The offending input.
        value: String,
    },

    /// The coordinate string did not parse, or parsed outside its valid range.
    #[error("invalid {axis} string: {value:?}")]
    Coordinate {
        /// Which component failed ("latitude" or "longitude").
        axis: &'static str,
        /// The offending input.
        value: String,
    },

    /// The stored bytes are not a valid JSON document of the expected shape.
    #[error("malformed stored value: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for codec operations.
pub type Result<T> = std::result::Result<T, CodecError>;

/// Encode a color as an uppercase `#RRGGBB` string.
#[must_use]
pub fn encode_color(color: Rgb) -> String {
    format!("#{:02X}{:02X}{:02X}", color.r, color.g, color.b)
}

/// Decode a `#RRGGBB` string into a color.
///
/// Case-insensitive; the leading `#` is optional. Anything that is not
/// exactly six hex digits after stripping is rejected.
///
/// # Errors
///
/// Returns [`CodecError::ColorFormat`] for malformed input.
pub fn decode_color(value: &str) -> Result<Rgb> {
    let digits = value.strip_prefix('#').unwrap_or(value);

    if digits.len() != 6 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(CodecError::ColorFormat {
            value: value.to_string(),
        });
    }

    let channel = |range: std::ops::Range<usize>| {
        u8::from_str_radix(&digits[range], 16).map_err(|_| CodecError::ColorFormat {
            value: value.to_string(),
        })
    };

    Ok(Rgb {
        r: channel(0..2)?,
        g: channel(2..4)?,
        b: channel(4..6)?,
    })
}

/// Format a coordinate component as a fixed six-decimal-place string.
#[must_use]
pub fn format_coordinate(component: f64) -> String {
    format!("{component:.prec$}", prec = COORDINATE_DECIMALS)
}

/// Parse a latitude string, requiring a finite value in [-90, 90].
///
/// # Errors
///
/// Returns [`CodecError::Coordinate`] for unparseable or out-of-range input.
pub fn parse_latitude(value: &str) -> Result<f64> {
    parse_component(value, "latitude", 90.0)
}

/// Parse a longitude string, requiring a finite value in [-180, 180].
///
/// # Errors
///
/// Returns [`CodecError::Coordinate`] for unparseable or out-of-range input.
pub fn parse_longitude(value: &str) -> Result<f64> {
    parse_component(value, "longitude", 180.0)
}

fn parse_component(value: &str, axis: &'static str, bound: f64) -> Result<f64> {
    let parsed: f64 = value.trim().parse().map_err(|_| CodecError::Coordinate {
        axis,
        value: value.to_string(),
    })?;

    if parsed.is_finite() && parsed.abs() <= bound {
        Ok(parsed)
    } else {
        Err(CodecError::Coordinate {
            axis,
            value: value.to_string(),
        })
    }
}

/// Serialize a field string through the generic string codec.
#[must_use]
pub fn encode_string(value: &str) -> Vec<u8> {
    // Serializing a &str to JSON cannot fail.
    serde_json::to_vec(value).unwrap_or_default()
}

/// Deserialize bytes written by [`encode_string`].
///
/// # Errors
///
/// Returns [`CodecError::Json`] if the bytes are not a JSON string.
pub fn decode_string(bytes: &[u8]) -> Result<String> {
    Ok(serde_json::from_slice(bytes)?)
}

/// Serialize the marker count for the `length` record.
#[must_use]
pub fn encode_count(count: usize) -> Vec<u8> {
    serde_json::to_vec(&count).unwrap_or_default()
}

/// Deserialize the marker count from the `length` record.
///
/// # Errors
///
/// Returns [`CodecError::Json`] if the bytes are not a JSON non-negative
/// integer.
pub fn decode_count(bytes: &[u8]) -> Result<usize> {
    Ok(serde_json::from_slice(bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_color_uppercase() {
        assert_eq!(encode_color(Rgb::new(255, 0, 128)), "#FF0080");
        assert_eq!(encode_color(Rgb::new(0, 0, 0)), "#000000");
        assert_eq!(encode_color(Rgb::new(255, 255, 255)), "#FFFFFF");
    }

    #[test]
    fn test_decode_color_basic() {
        assert_eq!(decode_color("#FF0080").unwrap(), Rgb::new(255, 0, 128));
    }

    #[test]
    fn test_decode_color_case_insensitive() {
        assert_eq!(decode_color("#ff0080").unwrap(), Rgb::new(255, 0, 128));
        assert_eq!(decode_color("#Ff0a8C").unwrap(), Rgb::new(255, 10, 140));
    }

    #[test]
    fn test_decode_color_without_hash() {
        assert_eq!(decode_color("00FF00").unwrap(), Rgb::new(0, 255, 0));
    }

    #[test]
    fn test_decode_color_rejects_wrong_length() {
        assert!(decode_color("#FFF").is_err());
        assert!(decode_color("#FF00801").is_err());
        assert!(decode_color("").is_err());
        assert!(decode_color("#").is_err());
    }

    #[test]
    fn test_decode_color_rejects_non_hex() {
        assert!(decode_color("#GG0080").is_err());
        assert!(decode_color("zzzzzz").is_err());
        // Unicode input must not slip through the length check.
        assert!(decode_color("##FF008").is_err());
    }

    #[test]
    fn test_color_round_trip_boundaries() {
        for color in [
            Rgb::new(0, 0, 0),
            Rgb::new(128, 128, 128),
            Rgb::new(255, 255, 255),
        ] {
            assert_eq!(decode_color(&encode_color(color)).unwrap(), color);
        }
    }

    #[test]
    fn test_format_coordinate() {
        assert_eq!(format_coordinate(60.1699), "60.169900");
        assert_eq!(format_coordinate(-0.1275), "-0.127500");
        assert_eq!(format_coordinate(0.0), "0.000000");
    }

    #[test]
    fn test_format_coordinate_rounds() {
        assert_eq!(format_coordinate(1.234_567_89), "1.234568");
    }

    #[test]
    fn test_parse_latitude() {
        assert!((parse_latitude("60.169900").unwrap() - 60.1699).abs() < 1e-9);
        assert!((parse_latitude("-90.000000").unwrap() + 90.0).abs() < 1e-9);
    }

    #[test]
    fn test_parse_latitude_rejects_out_of_range() {
        assert!(parse_latitude("90.000001").is_err());
        assert!(parse_latitude("-91").is_err());
        assert!(parse_latitude("NaN").is_err());
        assert!(parse_latitude("inf").is_err());
    }

    #[test]
    fn test_parse_longitude() {
        assert!((parse_longitude("24.938400").unwrap() - 24.9384).abs() < 1e-9);
        assert!((parse_longitude("180.000000").unwrap() - 180.0).abs() < 1e-9);
    }

    #[test]
    fn test_parse_longitude_rejects_garbage() {
        assert!(parse_longitude("").is_err());
        assert!(parse_longitude("east").is_err());
        assert!(parse_longitude("180.1").is_err());
    }

    #[test]
    fn test_string_codec_round_trip() {
        let bytes = encode_string("Cafe Regatta");
        assert_eq!(decode_string(&bytes).unwrap(), "Cafe Regatta");
    }

    #[test]
    fn test_string_codec_preserves_unicode() {
        let bytes = encode_string("Kahvila Säiliö ☕");
        assert_eq!(decode_string(&bytes).unwrap(), "Kahvila Säiliö ☕");
    }

    #[test]
    fn test_decode_string_rejects_garbage() {
        assert!(decode_string(b"not json").is_err());
        assert!(decode_string(&[0xFF, 0xFE]).is_err());
        // A JSON number is not a JSON string.
        assert!(decode_string(b"42").is_err());
    }

    #[test]
    fn test_count_codec_round_trip() {
        let bytes = encode_count(3);
        assert_eq!(decode_count(&bytes).unwrap(), 3);
        assert_eq!(decode_count(&encode_count(0)).unwrap(), 0);
    }

    #[test]
    fn test_decode_count_rejects_garbage() {
        assert!(decode_count(b"three").is_err());
        assert!(decode_count(b"-1").is_err());
        assert!(decode_count(b"\"3\"").is_err());
    }

    #[test]
    fn test_codec_error_display() {
        let err = decode_color("bad").unwrap_err();
        assert!(err.to_string().contains("invalid color"));

        let err = parse_latitude("north").unwrap_err();
        assert!(err.to_string().contains("latitude"));
    }
}
