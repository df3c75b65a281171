//! Key naming for the flat marker encoding.
//!
//! Each marker occupies four keys addressed by its list index, plus a single
//! shared `length` key holding the marker count. The layout is flat by
//! design: it matches what existing installs already have on disk.

/// Key holding the serialized marker count.
pub const LENGTH_KEY: &str = "length";

/// Key for the name of the marker at `index`.
#[must_use]
pub fn name_key(index: usize) -> String {
    format!("name{index}")
}

/// Key for the latitude of the marker at `index`.
#[must_use]
pub fn lat_key(index: usize) -> String {
    format!("lat{index}")
}

/// Key for the longitude of the marker at `index`.
#[must_use]
pub fn long_key(index: usize) -> String {
    format!("long{index}")
}

/// Key for the color of the marker at `index`.
#[must_use]
pub fn color_key(index: usize) -> String {
    format!("color{index}")
}

/// All four record keys for the marker at `index`.
#[must_use]
pub fn record_keys(index: usize) -> [String; 4] {
    [
        name_key(index),
        lat_key(index),
        long_key(index),
        color_key(index),
    ]
}
