pub use cluster::{Cluster, HeatZone};
pub use database::{LocationDatabase, LocationDatabaseUpdate};
pub use error::{HeatZoneError, HeatZoneResult};
pub use feed::{Snapshot, SnapshotFeed, Subscription};
pub use geo::{great_circle_distance, Coord, Geo};
pub use identity::UserIdStore;
pub use kml::{KmlFile, KmlWriter};
pub use location::{FixedLocation, LocationProvider};
pub use profile::{Interest, Profile};
pub use proximity::{partition, ProximityConfig, ProximityReport};
pub use sample::UserSample;

pub mod geo;
pub mod identity;
pub mod proximity;

/**************************************************************************************************
 * Private Implementation
 *************************************************************************************************/
mod cluster;
mod database;
mod error;
mod feed;
mod kml;
mod location;
mod profile;
mod sample;
