/*!
 * Types and functions for working with clusters.
 *
 * A cluster is a chain-connected group of UserSample objects that are too far from the caller to
 * show individually. The clusters with more than one member are what get displayed as heat zones.
 */

pub use cluster::Cluster;
pub use heat_zone::HeatZone;

mod cluster;
mod heat_zone;
