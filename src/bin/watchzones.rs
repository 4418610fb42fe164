use chrono::{Duration, Utc};
use clap::Parser;
use crossbeam_channel::{bounded, select, tick, Receiver};
use heatzone::{
    Coord, FixedLocation, HeatZoneResult, LocationDatabase, LocationProvider, ProximityConfig,
    ProximityReport, SnapshotFeed, UserIdStore,
};
use log::{debug, error, info, LevelFilter};
use simple_logger::SimpleLogger;
use std::{
    path::PathBuf,
    thread::{self, JoinHandle},
};

/*-------------------------------------------------------------------------------------------------
 *                               Parse Command Line Arguments
 *-----------------------------------------------------------------------------------------------*/
///
/// Keep broadcasting your location and watch the heat zones change.
///
/// One thread re-sends your location to the store on a fixed interval, another reads everyone's
/// locations and publishes each snapshot, and the analysis of each snapshot is logged as it
/// arrives.
///
#[derive(Debug, Parser)]
#[clap(bin_name = "watchzones")]
#[clap(author, version, about)]
struct WatchZonesOptions {
    /// The path to the location store database file.
    #[clap(short, long)]
    #[clap(env = "HEATZONE_STORE")]
    store: PathBuf,

    /// The path to the local storage that holds your user id.
    #[clap(short, long)]
    #[clap(env = "HEATZONE_IDENTITY")]
    identity: Option<PathBuf>,

    /// Your location as lat,lon in degrees.
    #[clap(short, long, allow_hyphen_values = true)]
    location: Coord,

    /// Users within this many meters of you are listed individually.
    #[clap(short, long, env = "HEATZONE_NEAR_RADIUS", default_value_t = 100.0)]
    near_radius: f64,

    /// Users farther away within this many meters of each other are grouped together.
    #[clap(long, env = "HEATZONE_LINK_DISTANCE", default_value_t = 300.0)]
    link_distance: f64,

    /// Only consider users that updated their location within this many minutes, zero for no
    /// limit.
    #[clap(short, long, default_value_t = 5)]
    online_minutes: i64,

    /// Seconds between location broadcasts.
    #[clap(short, long, default_value_t = 90)]
    broadcast_secs: u64,

    /// Seconds between reads of the store.
    #[clap(short, long, default_value_t = 10)]
    poll_secs: u64,

    /// Stop after this many updates, otherwise run until killed.
    #[clap(short, long)]
    updates: Option<usize>,

    /// Verbose output
    #[clap(short, long)]
    verbose: bool,
}

/*-------------------------------------------------------------------------------------------------
 *                                             MAIN
 *-----------------------------------------------------------------------------------------------*/
fn main() -> HeatZoneResult<()> {
    let opts = WatchZonesOptions::parse();

    let level = if opts.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    SimpleLogger::new().with_level(level).init()?;

    let config = ProximityConfig::new(opts.near_radius, opts.link_distance)?;
    let identity = opts
        .identity
        .clone()
        .unwrap_or_else(|| opts.store.with_file_name("identity.sqlite"));

    // Make sure the tables exist before the threads start opening connections.
    LocationDatabase::initialize(&opts.store)?;

    let ids = UserIdStore::open(&identity)?;
    let my_id = ids.user_id()?.to_owned();
    info!("Watching as {} from {}", my_id, opts.location);

    let provider = FixedLocation(opts.location);
    let online_window = if opts.online_minutes > 0 {
        Some(Duration::minutes(opts.online_minutes))
    } else {
        None
    };

    // Subscribe before anything can be published.
    let feed = SnapshotFeed::default();
    let subscription = feed.subscribe();

    // Nothing is ever sent on this channel, dropping the sender tells the threads to stop.
    let (stop_threads, stop_signal) = bounded::<()>(0);

    let broadcast_thread = start_broadcast_thread(
        opts.store.clone(),
        my_id.clone(),
        provider,
        std::time::Duration::from_secs(opts.broadcast_secs.max(1)),
        stop_signal.clone(),
    )?;

    let poll_thread = start_poll_thread(
        opts.store.clone(),
        my_id,
        online_window,
        std::time::Duration::from_secs(opts.poll_secs.max(1)),
        feed,
        stop_signal,
    )?;

    let mut num_updates = 0;
    let mut location_source = provider;
    for snapshot in subscription.iter() {
        let location = match location_source.current_location() {
            Ok(location) => location,
            Err(err) => {
                error!("Error getting current location: {}", err);
                continue;
            }
        };

        let report = ProximityReport::analyze(location, snapshot.samples.clone(), &config);

        info!(
            "{} | {} nearby | {} heat zones with {} people",
            snapshot.taken.format("%H:%M:%S"),
            report.near.len(),
            report.heat_zones.len(),
            report.users_in_heat_zones()
        );
        for sample in &report.near {
            debug!("    nearby: {}", sample);
        }
        for zone in &report.heat_zones {
            debug!("    zone: {}", zone);
        }

        num_updates += 1;
        if opts.updates.map(|max| num_updates >= max).unwrap_or(false) {
            break;
        }
    }

    drop(stop_threads);
    drop(subscription);

    broadcast_thread.join().map_err(|_| "broadcast thread panicked")?;
    poll_thread.join().map_err(|_| "poll thread panicked")?;

    Ok(())
}

fn start_broadcast_thread<L>(
    store: PathBuf,
    my_id: String,
    mut provider: L,
    interval: std::time::Duration,
    stop_signal: Receiver<()>,
) -> HeatZoneResult<JoinHandle<()>>
where
    L: LocationProvider + Send + 'static,
{
    let jh = thread::Builder::new()
        .name("watchzones-broadcast".to_owned())
        .spawn(move || {
            let db = match LocationDatabase::connect(&store) {
                Ok(db) => db,
                Err(err) => {
                    error!("Error connecting to {}: {}", store.display(), err);
                    return;
                }
            };

            let mut update = match db.prepare_to_update_locations() {
                Ok(update) => update,
                Err(err) => {
                    error!("Error preparing location updates: {}", err);
                    return;
                }
            };

            let mut broadcast = || -> HeatZoneResult<()> {
                let location = provider.current_location()?;
                update.update(&my_id, location, Utc::now())?;
                debug!("Location updated to {}", location);
                Ok(())
            };

            let ticker = tick(interval);
            loop {
                if let Err(err) = broadcast() {
                    error!("Error updating location: {}", err);
                }

                select! {
                    recv(ticker) -> _ => {}
                    recv(stop_signal) -> _ => break,
                }
            }
        })?;

    Ok(jh)
}

fn start_poll_thread(
    store: PathBuf,
    my_id: String,
    online_window: Option<Duration>,
    interval: std::time::Duration,
    feed: SnapshotFeed,
    stop_signal: Receiver<()>,
) -> HeatZoneResult<JoinHandle<()>> {
    let jh = thread::Builder::new()
        .name("watchzones-poll".to_owned())
        .spawn(move || {
            let db = match LocationDatabase::connect(&store) {
                Ok(db) => db,
                Err(err) => {
                    error!("Error connecting to {}: {}", store.display(), err);
                    return;
                }
            };

            let ticker = tick(interval);
            loop {
                let fresh_since = online_window.map(|window| Utc::now() - window);
                match db.live_snapshot(&my_id, fresh_since) {
                    Ok(snapshot) => {
                        let delivered = feed.publish(snapshot);
                        debug!("Snapshot delivered to {} subscribers", delivered);
                        if feed.subscriber_count() == 0 {
                            break;
                        }
                    }
                    Err(err) => error!("Error reading live locations: {}", err),
                }

                select! {
                    recv(ticker) -> _ => {}
                    recv(stop_signal) -> _ => break,
                }
            }

            feed.close();
        })?;

    Ok(jh)
}
