use crate::{
    cluster::Cluster,
    geo::{Coord, Geo},
};
use std::fmt::{self, Display};

/// The visible summary of a crowd of far away users.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeatZone {
    /// Mean location of the users in the zone.
    pub centroid: Coord,
    /// The number of users in the zone, always 2 or more.
    pub count: usize,
    /// Distance in meters from the centroid to the farthest user in the zone.
    pub radius: f64,
}

impl HeatZone {
    /// Summarize a cluster, or `None` if it is a singleton.
    pub fn from_cluster(cluster: &Cluster) -> Option<Self> {
        if cluster.count() < 2 {
            return None;
        }

        Some(HeatZone {
            centroid: cluster.centroid(),
            count: cluster.count(),
            radius: cluster.radius(),
        })
    }

    /// Summarize every cluster with 2 or more members, keeping the cluster order.
    pub fn from_clusters(clusters: &[Cluster]) -> Vec<Self> {
        clusters.iter().filter_map(HeatZone::from_cluster).collect()
    }
}

impl Geo for HeatZone {
    fn centroid(&self) -> Coord {
        self.centroid
    }
}

impl Display for HeatZone {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        write!(
            f,
            "{:>4} users around {} (radius {:.0} m)",
            self.count, self.centroid, self.radius
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::sample::UserSample;

    #[test]
    fn test_singletons_dropped() {
        let clusters = Cluster::link_samples(
            vec![
                UserSample::new("lonely", Coord::new(10.0, 10.0)),
                UserSample::new("a", Coord::new(0.0, 0.0)),
                UserSample::new("b", Coord::new(0.0, 0.0005)),
                UserSample::new("also lonely", Coord::new(-10.0, -10.0)),
            ],
            300.0,
        );
        assert_eq!(clusters.len(), 3);

        let zones = HeatZone::from_clusters(&clusters);
        assert_eq!(zones.len(), 1);
        assert_eq!(zones[0].count, 2);
        assert!(zones[0].centroid.is_close(Coord::new(0.0, 0.00025), 1.0e-12));
    }

    #[test]
    fn test_zone_order_follows_cluster_order() {
        let clusters = Cluster::link_samples(
            vec![
                UserSample::new("n1", Coord::new(1.0, 0.0)),
                UserSample::new("s1", Coord::new(-1.0, 0.0)),
                UserSample::new("s2", Coord::new(-1.0, 0.001)),
                UserSample::new("n2", Coord::new(1.0, 0.001)),
                UserSample::new("s3", Coord::new(-1.0, 0.002)),
            ],
            300.0,
        );

        let zones = HeatZone::from_clusters(&clusters);
        assert_eq!(zones.len(), 2);
        assert!(zones[0].centroid.lat > 0.0);
        assert_eq!(zones[0].count, 2);
        assert!(zones[1].centroid.lat < 0.0);
        assert_eq!(zones[1].count, 3);
    }
}
