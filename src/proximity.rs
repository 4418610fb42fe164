/*!
 * Split other users into those near enough to show individually and those that get summarized
 * as heat zones.
 *
 * Everything in here is a pure function of its inputs. There is no I/O and no shared state, so
 * it is fine to call from any thread, as often as a new location or snapshot arrives.
 */
use crate::{
    cluster::{Cluster, HeatZone},
    error::{HeatZoneError, HeatZoneResult},
    geo::Coord,
    kml::KmlWriter,
    sample::UserSample,
};
use chrono::{DateTime, Utc};
use log::{debug, warn};
use std::fmt::Write;

/// The default radius in meters inside which users are shown individually.
pub const DEFAULT_NEAR_RADIUS: f64 = 100.0;

/// The default distance in meters that links two far away users into the same cluster.
pub const DEFAULT_LINK_DISTANCE: f64 = 300.0;

/// Distances used to analyze a snapshot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProximityConfig {
    near_radius: f64,
    link_distance: f64,
}

impl ProximityConfig {
    /// Create a validated configuration. Both distances are in meters.
    pub fn new(near_radius: f64, link_distance: f64) -> HeatZoneResult<Self> {
        if !near_radius.is_finite() || near_radius < 0.0 {
            return Err(HeatZoneError {
                msg: "near radius must be a finite, non-negative number of meters",
            }
            .into());
        }

        if !link_distance.is_finite() || link_distance < 0.0 {
            return Err(HeatZoneError {
                msg: "link distance must be a finite, non-negative number of meters",
            }
            .into());
        }

        Ok(ProximityConfig {
            near_radius,
            link_distance,
        })
    }

    pub fn near_radius(&self) -> f64 {
        self.near_radius
    }

    pub fn link_distance(&self) -> f64 {
        self.link_distance
    }
}

impl Default for ProximityConfig {
    fn default() -> Self {
        ProximityConfig {
            near_radius: DEFAULT_NEAR_RADIUS,
            link_distance: DEFAULT_LINK_DISTANCE,
        }
    }
}

/**
 * Stable partition of `samples` by distance from `caller`.
 *
 * #Returns
 * A tuple of (near, far), where near holds every sample within `near_radius` meters (inclusive)
 * and far holds the rest. Both keep the relative order of the input.
 */
pub fn partition(
    caller: Coord,
    samples: Vec<UserSample>,
    near_radius: f64,
) -> (Vec<UserSample>, Vec<UserSample>) {
    samples
        .into_iter()
        .partition(|sample| caller.distance_to(&sample.coord) <= near_radius)
}

/// What the map should show for one snapshot of other users.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProximityReport {
    /// Users near enough to the caller to show individually, in input order.
    pub near: Vec<UserSample>,
    /// Crowds of far away users, in cluster creation order.
    pub heat_zones: Vec<HeatZone>,
    /// Samples ignored because of invalid coordinates.
    pub skipped: usize,
}

impl ProximityReport {
    /**
     * Analyze a snapshot of other users from the point of view of `caller`.
     *
     * Samples with a non-finite latitude or longitude are skipped and counted. If the caller's own
     * location isn't finite there is nothing meaningful to measure against, so every sample is
     * counted as skipped and the report is otherwise empty.
     */
    pub fn analyze(caller: Coord, samples: Vec<UserSample>, config: &ProximityConfig) -> Self {
        if !caller.is_finite() {
            warn!("caller location {} is not valid, skipping analysis", caller);
            return ProximityReport {
                skipped: samples.len(),
                ..Default::default()
            };
        }

        let total = samples.len();
        let samples: Vec<UserSample> = samples
            .into_iter()
            .filter(|sample| {
                let valid = sample.coord.is_finite();
                if !valid {
                    warn!("skipping {} with invalid location {}", sample.id, sample.coord);
                }
                valid
            })
            .collect();
        let skipped = total - samples.len();

        let (near, far) = partition(caller, samples, config.near_radius);
        let num_far = far.len();

        let clusters = Cluster::link_samples(far, config.link_distance);
        let heat_zones = HeatZone::from_clusters(&clusters);

        debug!(
            "analyzed {} samples: {} near, {} far in {} clusters, {} heat zones, {} skipped",
            total,
            near.len(),
            num_far,
            clusters.len(),
            heat_zones.len(),
            skipped
        );

        ProximityReport {
            near,
            heat_zones,
            skipped,
        }
    }

    /// Nothing to show.
    pub fn is_empty(&self) -> bool {
        self.near.is_empty() && self.heat_zones.is_empty()
    }

    /// Total number of users represented in the heat zones.
    pub fn users_in_heat_zones(&self) -> usize {
        self.heat_zones.iter().map(|zone| zone.count).sum()
    }

    /**
     * Write the caller, the near users, and the heat zones as KML.
     *
     * Heat zones are drawn as circles that are never smaller than `min_zone_radius` meters, a
     * zone of two users standing next to each other would otherwise be invisible.
     */
    pub fn kml_write<K: KmlWriter>(
        &self,
        kml: &mut K,
        caller: Coord,
        taken: DateTime<Utc>,
        min_zone_radius: f64,
    ) -> HeatZoneResult<()> {
        kml.start_style(Some("caller"))?;
        kml.create_icon_style(
            Some("http://maps.google.com/mapfiles/kml/paddle/blu-circle.png"),
            1.0,
        )?;
        kml.finish_style()?;

        kml.start_style(Some("near"))?;
        kml.create_icon_style(
            Some("http://maps.google.com/mapfiles/kml/shapes/man.png"),
            0.8,
        )?;
        kml.finish_style()?;

        kml.start_style(Some("heatzone"))?;
        kml.create_poly_style(Some("7f0000ff"), true, true)?;
        kml.finish_style()?;

        kml.start_placemark(Some("You"), None, Some("#caller"))?;
        kml.timestamp(taken)?;
        kml.create_point(caller.lat, caller.lon, 0.0)?;
        kml.finish_placemark()?;

        let mut description = String::new();

        kml.start_folder(Some("Nearby"), None, true)?;
        for sample in &self.near {
            description.clear();
            write!(
                &mut description,
                "{:.0} m away",
                caller.distance_to(&sample.coord)
            )?;

            kml.start_placemark(Some(sample.display_name()), Some(&description), Some("#near"))?;
            kml.create_point(sample.coord.lat, sample.coord.lon, 0.0)?;
            kml.finish_placemark()?;
        }
        kml.finish_folder()?;

        kml.start_folder(Some("Heat Zones"), None, true)?;
        for zone in &self.heat_zones {
            description.clear();
            write!(
                &mut description,
                "{} people<br/>Spread: {:.0} m<br/>Distance: {:.0} m",
                zone.count,
                zone.radius,
                caller.distance_to(&zone.centroid)
            )?;

            let name = format!("{} people", zone.count);
            kml.start_placemark(Some(&name), Some(&description), Some("#heatzone"))?;
            kml.create_circle(zone.centroid, zone.radius.max(min_zone_radius), 36)?;
            kml.finish_placemark()?;
        }
        kml.finish_folder()?;

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_config_validation() {
        assert!(ProximityConfig::new(100.0, 300.0).is_ok());
        assert!(ProximityConfig::new(0.0, 0.0).is_ok());
        assert!(ProximityConfig::new(-1.0, 300.0).is_err());
        assert!(ProximityConfig::new(100.0, f64::NAN).is_err());
        assert!(ProximityConfig::new(f64::INFINITY, 300.0).is_err());

        let config = ProximityConfig::default();
        assert_eq!(config.near_radius(), DEFAULT_NEAR_RADIUS);
        assert_eq!(config.link_distance(), DEFAULT_LINK_DISTANCE);
    }

    #[test]
    fn test_partition_is_stable() {
        let caller = Coord::new(0.0, 0.0);
        let samples = vec![
            UserSample::new("far1", Coord::new(0.0, 0.01)),
            UserSample::new("near1", Coord::new(0.0, 0.0001)),
            UserSample::new("far2", Coord::new(0.01, 0.0)),
            UserSample::new("near2", Coord::new(0.0001, 0.0)),
        ];

        let (near, far) = partition(caller, samples, 100.0);

        let near: Vec<&str> = near.iter().map(|s| s.id.as_str()).collect();
        let far: Vec<&str> = far.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(near, ["near1", "near2"]);
        assert_eq!(far, ["far1", "far2"]);
    }

    #[test]
    fn test_partition_boundary_is_near() {
        let caller = Coord::new(0.0, 0.0);
        let other = Coord::new(0.0, 0.001);
        let d = caller.distance_to(&other);

        let (near, far) = partition(caller, vec![UserSample::new("edge", other)], d);
        assert_eq!(near.len(), 1);
        assert!(far.is_empty());
    }

    #[test]
    fn test_invalid_samples_skipped() {
        let caller = Coord::new(0.0, 0.0);
        let samples = vec![
            UserSample::new("ok", Coord::new(0.0, 0.0001)),
            UserSample::new("nan", Coord::new(f64::NAN, 0.0)),
            UserSample::new("inf", Coord::new(0.0, f64::INFINITY)),
        ];

        let report = ProximityReport::analyze(caller, samples, &ProximityConfig::default());
        assert_eq!(report.near.len(), 1);
        assert_eq!(report.skipped, 2);
    }

    #[test]
    fn test_kml_output() {
        let caller = Coord::new(0.0, 0.0);
        let samples = vec![
            UserSample::new("a", Coord::new(0.0, 0.0001)).with_name("Alice & Co"),
            UserSample::new("b", Coord::new(0.0, 0.01)),
            UserSample::new("c", Coord::new(0.0, 0.0101)),
        ];

        let report = ProximityReport::analyze(caller, samples, &ProximityConfig::default());
        assert_eq!(report.near.len(), 1);
        assert_eq!(report.heat_zones.len(), 1);

        let mut buf: Vec<u8> = vec![];
        report.kml_write(&mut buf, caller, Utc::now(), 50.0).unwrap();
        let text = String::from_utf8(buf).unwrap();

        assert!(text.contains("<name>Alice &amp; Co</name>"));
        assert!(text.contains("<name>2 people</name>"));
        assert_eq!(text.matches("<Placemark>").count(), 3);
        assert_eq!(text.matches("<Polygon>").count(), 1);
    }

    #[test]
    fn test_invalid_caller_gives_empty_report() {
        let samples = vec![
            UserSample::new("a", Coord::new(0.0, 0.0001)),
            UserSample::new("b", Coord::new(0.0, 0.0002)),
        ];

        let report = ProximityReport::analyze(
            Coord::new(f64::NAN, 0.0),
            samples,
            &ProximityConfig::default(),
        );
        assert!(report.is_empty());
        assert_eq!(report.skipped, 2);
    }
}
