use crate::{
    geo::{Coord, Geo},
    sample::UserSample,
};

/**
 * A connected group of UserSample objects.
 *
 * Every member is within the linking distance of at least one member that was already in the
 * cluster when it joined. Clusters only exist for the duration of a single analysis, there is no
 * identity that carries over from one snapshot to the next.
 */
#[derive(Debug, Clone, PartialEq)]
pub struct Cluster {
    members: Vec<UserSample>,
}

impl Cluster {
    fn new(first: UserSample) -> Self {
        Cluster {
            members: vec![first],
        }
    }

    /**
     * Group UserSample objects into clusters with greedy single-link chaining.
     *
     * Samples are visited in the order given. Each one joins the first cluster (in creation order)
     * that has any member within `link_distance` meters of it, or starts a new cluster if there is
     * none. A cluster can therefore stretch well beyond `link_distance` end to end, and the result
     * depends on the order of the input.
     *
     * #Arguments
     * samples - the far users to group.
     * link_distance - the maximum distance in meters between two connected members.
     *
     * #Returns
     * The clusters in creation order. Every cluster has at least one member.
     */
    pub fn link_samples(samples: Vec<UserSample>, link_distance: f64) -> Vec<Self> {
        let mut clusters: Vec<Self> = vec![];

        for sample in samples {
            let joins = clusters
                .iter()
                .position(|clust| clust.links_to(&sample.coord, link_distance));

            match joins {
                Some(idx) => clusters[idx].members.push(sample),
                None => clusters.push(Cluster::new(sample)),
            }
        }

        clusters
    }

    /// Is any member of this cluster within `link_distance` meters of `coord`?
    pub fn links_to(&self, coord: &Coord, link_distance: f64) -> bool {
        self.members
            .iter()
            .any(|member| member.coord.distance_to(coord) <= link_distance)
    }

    /// The number of samples in this cluster.
    pub fn count(&self) -> usize {
        self.members.len()
    }

    /// The samples in this cluster in the order they joined.
    pub fn members(&self) -> &[UserSample] {
        &self.members
    }

    /// Give up the members.
    pub fn into_members(self) -> Vec<UserSample> {
        self.members
    }

    /// The distance in meters from the centroid to the farthest member.
    pub fn radius(&self) -> f64 {
        let centroid = self.centroid();

        self.members
            .iter()
            .map(|member| member.coord.distance_to(&centroid))
            .fold(0.0, f64::max)
    }
}

impl Geo for Cluster {
    /// Unweighted mean of the member latitudes and longitudes.
    ///
    /// This isn't geodesically correct, but clusters span hundreds of meters, not hundreds of
    /// kilometers, and they never straddle the anti-meridian in practice.
    fn centroid(&self) -> Coord {
        let (lat_sum, lon_sum) = self
            .members
            .iter()
            .fold((0.0, 0.0), |(lat, lon), member| {
                (lat + member.coord.lat, lon + member.coord.lon)
            });

        let n = self.members.len() as f64;

        Coord {
            lat: lat_sum / n,
            lon: lon_sum / n,
        }
    }
}
