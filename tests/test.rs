use chrono::Utc;
use heatzone::{
    partition, Cluster, Coord, Geo, HeatZone, LocationDatabase, ProximityConfig,
    ProximityReport, SnapshotFeed, UserIdStore, UserSample,
};
use rand::{rngs::StdRng, seq::SliceRandom, Rng, SeedableRng};
use std::collections::HashSet;

/*-------------------------------------------------------------------------------------------------
 *
 *                                      Helpers
 *
 *-----------------------------------------------------------------------------------------------*/
fn config(near_radius: f64, link_distance: f64) -> ProximityConfig {
    ProximityConfig::new(near_radius, link_distance).unwrap()
}

fn sample(id: &str, lat: f64, lon: f64) -> UserSample {
    UserSample::new(id, Coord::new(lat, lon))
}

/// A crowd of users scattered within a few kilometers of a point, some of them bunched up.
fn scattered_samples(seed: u64, n: usize, around: Coord) -> Vec<UserSample> {
    let mut rng = StdRng::seed_from_u64(seed);

    let hot_spots: Vec<Coord> = (0..4)
        .map(|_| around.destination(rng.gen_range(0.0..360.0), rng.gen_range(200.0..3000.0)))
        .collect();

    (0..n)
        .map(|i| {
            let base = if rng.gen_bool(0.6) {
                hot_spots[rng.gen_range(0..hot_spots.len())]
            } else {
                around
            };

            let coord = base.destination(rng.gen_range(0.0..360.0), rng.gen_range(0.0..1500.0));
            UserSample::new(format!("user{}", i), coord)
        })
        .collect()
}

/*-------------------------------------------------------------------------------------------------
 *
 *                                  Example scenarios
 *
 *-----------------------------------------------------------------------------------------------*/
#[test]
fn test_single_nearby_user() {
    let caller = Coord::new(0.0, 0.0);
    let samples = vec![sample("a", 0.0, 0.001)];

    let report = ProximityReport::analyze(caller, samples, &config(500.0, 300.0));

    assert_eq!(report.near.len(), 1);
    assert_eq!(report.near[0].id, "a");
    assert!(report.heat_zones.is_empty());
}

#[test]
fn test_two_far_users_make_a_zone() {
    let caller = Coord::new(0.0, 0.0);
    let samples = vec![sample("a", 0.0, 0.009), sample("b", 0.0, 0.00945)];

    let a = samples[0].coord;
    let b = samples[1].coord;
    assert!(caller.distance_to(&a) > 990.0 && caller.distance_to(&a) < 1010.0);
    assert!((a.distance_to(&b) - 50.0).abs() < 1.0);

    let report = ProximityReport::analyze(caller, samples, &config(500.0, 300.0));

    assert!(report.near.is_empty());
    assert_eq!(report.heat_zones.len(), 1);

    let zone = report.heat_zones[0];
    assert_eq!(zone.count, 2);
    assert!(zone
        .centroid
        .is_close(Coord::new(0.0, (0.009 + 0.00945) / 2.0), 1.0e-12));
}

#[test]
fn test_single_far_user_is_not_a_zone() {
    let caller = Coord::new(0.0, 0.0);
    let samples = vec![sample("a", 0.0, 0.009)];

    let report = ProximityReport::analyze(caller, samples, &config(500.0, 300.0));

    assert!(report.near.is_empty());
    assert!(report.heat_zones.is_empty());
    assert!(report.is_empty());
}

#[test]
fn test_chain_forms_one_zone() {
    let caller = Coord::new(0.0, 0.0);
    let a = Coord::new(0.0, 0.010);
    let b = Coord::new(0.0, 0.0127);
    let c = Coord::new(0.0, 0.0154);

    let link = a.distance_to(&b).max(b.distance_to(&c));
    assert!(a.distance_to(&c) > link);

    let samples = vec![
        UserSample::new("a", a),
        UserSample::new("b", b),
        UserSample::new("c", c),
    ];

    let report = ProximityReport::analyze(caller, samples, &config(500.0, link));

    assert!(report.near.is_empty());
    assert_eq!(report.heat_zones.len(), 1);
    assert_eq!(report.heat_zones[0].count, 3);
    assert!(report.heat_zones[0].radius > link * 0.9);
}

#[test]
fn test_nobody_else() {
    let report =
        ProximityReport::analyze(Coord::new(45.0, -110.0), vec![], &ProximityConfig::default());

    assert!(report.near.is_empty());
    assert!(report.heat_zones.is_empty());
    assert_eq!(report.skipped, 0);
}

/*-------------------------------------------------------------------------------------------------
 *
 *                                  Properties
 *
 *-----------------------------------------------------------------------------------------------*/
#[test]
fn test_partition_exhaustive_and_disjoint() {
    let caller = Coord::new(46.87, -113.99);
    let samples = scattered_samples(1, 300, caller);

    let all_ids: HashSet<String> = samples.iter().map(|s| s.id.clone()).collect();

    let (near, far) = partition(caller, samples, 500.0);
    let clusters = Cluster::link_samples(far, 300.0);

    let mut seen: HashSet<String> = HashSet::new();
    for s in &near {
        assert!(caller.distance_to(&s.coord) <= 500.0);
        assert!(seen.insert(s.id.clone()));
    }

    for cluster in &clusters {
        assert!(cluster.count() >= 1);
        for s in cluster.members() {
            assert!(caller.distance_to(&s.coord) > 500.0);
            assert!(seen.insert(s.id.clone()));
        }
    }

    assert_eq!(seen, all_ids);

    let zones = HeatZone::from_clusters(&clusters);
    let multi = clusters.iter().filter(|c| c.count() >= 2).count();
    assert_eq!(zones.len(), multi);
    assert!(zones.iter().all(|z| z.count >= 2));
}

#[test]
fn test_centroid_within_member_bounds() {
    let caller = Coord::new(-33.87, 151.21);
    let samples = scattered_samples(2, 200, caller);

    let (_near, far) = partition(caller, samples, 100.0);

    for cluster in Cluster::link_samples(far, 300.0) {
        let centroid = cluster.centroid();

        let min_lat = cluster.members().iter().map(|s| s.coord.lat).fold(f64::INFINITY, f64::min);
        let max_lat = cluster.members().iter().map(|s| s.coord.lat).fold(-f64::INFINITY, f64::max);
        let min_lon = cluster.members().iter().map(|s| s.coord.lon).fold(f64::INFINITY, f64::min);
        let max_lon = cluster.members().iter().map(|s| s.coord.lon).fold(-f64::INFINITY, f64::max);

        const EPS: f64 = 1.0e-9;
        assert!(centroid.lat >= min_lat - EPS && centroid.lat <= max_lat + EPS);
        assert!(centroid.lon >= min_lon - EPS && centroid.lon <= max_lon + EPS);
    }
}

#[test]
fn test_analysis_is_idempotent() {
    let caller = Coord::new(51.5, -0.12);
    let samples = scattered_samples(3, 250, caller);
    let config = config(250.0, 300.0);

    let first = ProximityReport::analyze(caller, samples.clone(), &config);
    let second = ProximityReport::analyze(caller, samples, &config);

    assert_eq!(first, second);
}

#[test]
fn test_total_count_conserved_under_reordering() {
    let caller = Coord::new(40.0, -105.0);
    let mut samples = scattered_samples(4, 300, caller);
    let total = samples.len();

    let mut rng = StdRng::seed_from_u64(99);
    for _ in 0..10 {
        samples.shuffle(&mut rng);

        let (near, far) = partition(caller, samples.clone(), 200.0);
        let num_near = near.len();
        let clusters = Cluster::link_samples(far, 300.0);
        let clustered: usize = clusters.iter().map(|c| c.count()).sum();

        assert_eq!(num_near + clustered, total);

        let report = ProximityReport::analyze(caller, samples.clone(), &config(200.0, 300.0));
        assert_eq!(report.near.len(), num_near);
        assert!(report.users_in_heat_zones() <= clustered);
    }
}

#[test]
fn test_input_order_changes_membership() {
    // "mid" can join either end, whichever cluster was created first wins.
    let west = sample("west", 0.0, 0.0);
    let mid = sample("mid", 0.0, 0.002);
    let east = sample("east", 0.0, 0.004);

    let link = 230.0;
    assert!(west.coord.distance_to(&mid.coord) <= link);
    assert!(east.coord.distance_to(&mid.coord) <= link);

    let west_first =
        Cluster::link_samples(vec![west.clone(), east.clone(), mid.clone()], link);
    let east_first = Cluster::link_samples(vec![east, west, mid], link);

    assert_eq!(west_first[0].members()[0].id, "west");
    assert_eq!(west_first[0].count(), 2);
    assert_eq!(west_first[0].members()[1].id, "mid");

    assert_eq!(east_first[0].members()[0].id, "east");
    assert_eq!(east_first[0].count(), 2);
    assert_eq!(east_first[0].members()[1].id, "mid");
}

/*-------------------------------------------------------------------------------------------------
 *
 *                          Identity, store, and feed working together
 *
 *-----------------------------------------------------------------------------------------------*/
#[test]
fn test_identity_persists_between_runs() {
    let path = std::env::temp_dir().join(format!(
        "heatzone-identity-test-{}.sqlite",
        std::process::id()
    ));
    let _ = std::fs::remove_file(&path);

    let first = {
        let store = UserIdStore::open(&path).unwrap();
        store.user_id().unwrap().to_owned()
    };

    let second = {
        let store = UserIdStore::open(&path).unwrap();
        store.user_id().unwrap().to_owned()
    };

    assert_eq!(first, second);
    assert_eq!(first.len(), 8);

    let _ = std::fs::remove_file(&path);
}

#[test]
fn test_store_snapshot_through_feed() {
    let db = LocationDatabase::connect(":memory:").unwrap();
    let caller = Coord::new(0.0, 0.0);
    let now = Utc::now();

    {
        let mut update = db.prepare_to_update_locations().unwrap();
        update.update("me", caller, now).unwrap();
        update.update("near", Coord::new(0.0, 0.0005), now).unwrap();
        update.update("far1", Coord::new(0.0, 0.02), now).unwrap();
        update.update("far2", Coord::new(0.0, 0.0202), now).unwrap();
        update.update("far3", Coord::new(0.02, 0.0), now).unwrap();
    }

    let feed = SnapshotFeed::default();
    let subscription = feed.subscribe();

    let delivered = feed.publish(db.live_snapshot("me", None).unwrap());
    assert_eq!(delivered, 1);

    let snapshot = subscription.try_recv().unwrap();
    assert_eq!(snapshot.samples.len(), 4);
    assert!(snapshot.samples.iter().all(|s| s.id != "me"));

    let report = ProximityReport::analyze(
        caller,
        snapshot.samples.clone(),
        &ProximityConfig::default(),
    );

    assert_eq!(report.near.len(), 1);
    assert_eq!(report.near[0].id, "near");
    assert_eq!(report.heat_zones.len(), 1);
    assert_eq!(report.heat_zones[0].count, 2);

    drop(subscription);
    assert_eq!(feed.subscriber_count(), 0);
}
