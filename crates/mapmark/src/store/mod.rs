//! Marker persistence.
//!
//! [`MarkerStore`] owns the in-memory marker list and persists it through a
//! [`KvStore`] backend using a flat, index-addressed encoding: four keys per
//! marker (`name{i}`, `lat{i}`, `long{i}`, `color{i}`) plus a `length` key
//! holding the count. Coordinates are stored as fixed six-decimal strings
//! and colors as `#RRGGBB`, each pushed through the generic string codec
//! before hitting the backend.
//!
//! The failure policy is asymmetric by contract: `save` and `clear` never
//! fail outward, and `load` degrades per record: an index whose four keys
//! don't all decode is dropped and the scan continues. Only an undecodable
//! `length` aborts the whole load. Every skip is counted in the reports so
//! a harness (or the UI's diagnostics screen) can see what was dropped.

pub mod keys;
pub mod kv;
pub mod sqlite;

pub use kv::{KvError, KvStore, MemoryStore};
pub use sqlite::SqliteStore;

use thiserror::Error;
use tracing::{debug, warn};

use crate::codec::{self, CodecError};
use crate::marker::{Coordinate, Marker};

/// What happened during the last `load`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Marker count announced by the `length` record.
    pub expected: usize,
    /// Markers actually reconstructed.
    pub loaded: usize,
    /// Indices dropped because a required field was absent or undecodable.
    pub skipped: usize,
    /// Whether the `length` record itself failed to decode, discarding the
    /// whole list.
    pub length_corrupt: bool,
}

/// What happened during the last `save`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SaveReport {
    /// Markers written in full.
    pub written: usize,
    /// Indices whose records were removed because the marker has no name.
    pub cleared: usize,
    /// Records that failed to write and were skipped.
    pub failed: usize,
}

/// Why a single marker record could not be reconstructed.
#[derive(Debug, Error)]
enum RecordError {
    #[error("missing record {key:?}")]
    Missing { key: String },

    #[error(transparent)]
    Backend(#[from] KvError),

    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// Owner of the marker list and its persistence.
///
/// The list is mutated only on the thread that owns the store; persistence
/// calls are synchronous against a fast local backend and are never
/// re-entered from callbacks.
#[derive(Debug)]
pub struct MarkerStore<S> {
    backend: S,
    markers: Vec<Marker>,
    last_load: LoadReport,
    last_save: SaveReport,
}

impl<S: KvStore> MarkerStore<S> {
    /// Create a store with an empty in-memory list.
    ///
    /// No I/O happens until `load` or `save`.
    #[must_use]
    pub fn new(backend: S) -> Self {
        Self {
            backend,
            markers: Vec::new(),
            last_load: LoadReport::default(),
            last_save: SaveReport::default(),
        }
    }

    /// Create a store and immediately load persisted markers (the normal
    /// app-startup path).
    #[must_use]
    pub fn open(backend: S) -> Self {
        let mut store = Self::new(backend);
        store.load();
        store
    }

    /// The current marker list, in display order.
    #[must_use]
    pub fn markers(&self) -> &[Marker] {
        &self.markers
    }

    /// Number of markers in memory.
    #[must_use]
    pub fn len(&self) -> usize {
        self.markers.len()
    }

    /// Whether the list is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    /// Borrow the backend.
    #[must_use]
    pub fn backend(&self) -> &S {
        &self.backend
    }

    /// Consume the store, returning the backend.
    #[must_use]
    pub fn into_backend(self) -> S {
        self.backend
    }

    /// Report from the most recent `load`.
    #[must_use]
    pub fn load_report(&self) -> &LoadReport {
        &self.last_load
    }

    /// Report from the most recent `save`.
    #[must_use]
    pub fn save_report(&self) -> &SaveReport {
        &self.last_save
    }

    /// Append a marker and persist the list immediately.
    pub fn add(&mut self, marker: Marker) {
        self.markers.push(marker);
        self.save();
    }

    /// Persist the in-memory list.
    ///
    /// Every marker with a non-empty name gets its four records written at
    /// its list index. A marker without a name is not persisted, and any
    /// stale records at its index are removed so an older generation cannot
    /// resurface on the next load. The `length` record is rewritten last.
    ///
    /// Never fails outward: a record that cannot be written is logged,
    /// counted in the [`SaveReport`], and left absent or stale.
    pub fn save(&mut self) {
        let mut report = SaveReport::default();
        let backend = &mut self.backend;

        for (index, marker) in self.markers.iter().enumerate() {
            if marker.has_name() {
                match write_record(backend, index, marker) {
                    Ok(()) => report.written += 1,
                    Err(e) => {
                        warn!(index, error = %e, "failed to persist marker record");
                        report.failed += 1;
                    }
                }
            } else {
                debug!(index, "marker has no name; clearing its records");
                for key in keys::record_keys(index) {
                    if let Err(e) = backend.remove(&key) {
                        warn!(%key, error = %e, "failed to clear stale record");
                        report.failed += 1;
                    }
                }
                report.cleared += 1;
            }
        }

        let count = codec::encode_count(self.markers.len());
        if let Err(e) = backend.set(keys::LENGTH_KEY, &count) {
            warn!(error = %e, "failed to persist marker count");
            report.failed += 1;
        }

        self.last_save = report;
    }

    /// Replace the in-memory list with what the backend holds.
    ///
    /// An absent `length` record means "no prior state" and yields an empty
    /// list. An unreadable or undecodable `length` also yields an empty
    /// list, never a partial one, with
    /// [`LoadReport::length_corrupt`] set. Otherwise each index in
    /// `0..length` is reconstructed independently; an index whose four
    /// records are not all present and decodable is skipped and counted.
    pub fn load(&mut self) -> &[Marker] {
        let mut report = LoadReport::default();

        let markers = match self.backend.get(keys::LENGTH_KEY) {
            Ok(None) => Vec::new(),
            Ok(Some(bytes)) => match codec::decode_count(&bytes) {
                Ok(expected) => {
                    report.expected = expected;
                    let mut markers = Vec::new();
                    for index in 0..expected {
                        match read_record(&self.backend, index) {
                            Ok(marker) => markers.push(marker),
                            Err(e) => {
                                warn!(index, error = %e, "skipping undecodable marker record");
                                report.skipped += 1;
                            }
                        }
                    }
                    markers
                }
                Err(e) => {
                    warn!(error = %e, "marker count undecodable; discarding persisted markers");
                    report.length_corrupt = true;
                    Vec::new()
                }
            },
            Err(e) => {
                warn!(error = %e, "marker count unreadable; discarding persisted markers");
                report.length_corrupt = true;
                Vec::new()
            }
        };

        report.loaded = markers.len();
        self.markers = markers;
        self.last_load = report;
        &self.markers
    }

    /// Remove every persisted marker record and empty the in-memory list.
    ///
    /// Safe to call when nothing is persisted. Like `save`, never fails
    /// outward.
    pub fn clear(&mut self) {
        let persisted = match self.backend.get(keys::LENGTH_KEY) {
            Ok(Some(bytes)) => codec::decode_count(&bytes).ok(),
            _ => None,
        };
        // Fall back to the in-memory count when the length record is
        // absent or corrupt, so a half-written store still gets cleaned.
        let count = persisted.unwrap_or(self.markers.len());

        for index in 0..count {
            for key in keys::record_keys(index) {
                if let Err(e) = self.backend.remove(&key) {
                    warn!(%key, error = %e, "failed to remove record");
                }
            }
        }
        if let Err(e) = self.backend.remove(keys::LENGTH_KEY) {
            warn!(error = %e, "failed to remove marker count");
        }

        self.markers.clear();
        debug!("cleared {count} marker slots");
    }
}

/// Write the four records for one marker.
fn write_record<S: KvStore>(
    backend: &mut S,
    index: usize,
    marker: &Marker,
) -> Result<(), KvError> {
    backend.set(&keys::name_key(index), &codec::encode_string(&marker.name))?;
    backend.set(
        &keys::lat_key(index),
        &codec::encode_string(&codec::format_coordinate(marker.coordinate.latitude)),
    )?;
    backend.set(
        &keys::long_key(index),
        &codec::encode_string(&codec::format_coordinate(marker.coordinate.longitude)),
    )?;
    backend.set(
        &keys::color_key(index),
        &codec::encode_string(&codec::encode_color(marker.color)),
    )?;
    Ok(())
}

/// Reconstruct one marker; any absent or malformed field fails the whole
/// record.
fn read_record<S: KvStore>(backend: &S, index: usize) -> Result<Marker, RecordError> {
    let name = read_field(backend, &keys::name_key(index))?;
    let latitude = codec::parse_latitude(&read_field(backend, &keys::lat_key(index))?)?;
    let longitude = codec::parse_longitude(&read_field(backend, &keys::long_key(index))?)?;
    let color = codec::decode_color(&read_field(backend, &keys::color_key(index))?)?;

    Ok(Marker {
        name,
        coordinate: Coordinate::new(latitude, longitude),
        color,
    })
}

fn read_field<S: KvStore>(backend: &S, key: &str) -> Result<String, RecordError> {
    let bytes = backend
        .get(key)?
        .ok_or_else(|| RecordError::Missing {
            key: key.to_string(),
        })?;
    Ok(codec::decode_string(&bytes)?)
}
