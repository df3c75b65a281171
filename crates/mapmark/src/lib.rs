//! `mapmark` - Map-annotation core: location authorization and marker persistence
//!
//! This library provides the engine behind a tap-to-annotate map app: it
//! tracks the platform's location-permission verdict and best known
//! coordinate, and it persists the user's named, colored markers across
//! launches through a flat key-value encoding with defensive decoding.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod cli;
pub mod codec;
pub mod config;
pub mod error;
pub mod geocode;
pub mod location;
pub mod logging;
pub mod marker;
pub mod store;

pub use config::Config;
pub use error::{Error, Result};
pub use location::tracker::PermissionTracker;
pub use location::{AuthorizationState, Fix, LocationEventSender, LocationPlatform};
pub use logging::init_logging;
pub use marker::{Coordinate, Marker, Rgb};
pub use store::{MarkerStore, MemoryStore, SqliteStore};
