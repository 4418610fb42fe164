use chrono::{Duration, Utc};
use clap::Parser;
use heatzone::{
    Coord, HeatZoneResult, KmlFile, LocationDatabase, ProximityConfig, ProximityReport,
    UserIdStore,
};
use log::{info, warn, LevelFilter};
use simple_logger::SimpleLogger;
use std::{
    fmt::{self, Display},
    path::PathBuf,
};

/*-------------------------------------------------------------------------------------------------
 *                               Parse Command Line Arguments
 *-----------------------------------------------------------------------------------------------*/
///
/// Show who is nearby and where the crowds are.
///
/// This program reads everyone's latest location from the store, lists the users near you, and
/// summarizes crowds of users farther away as heat zones.
///
#[derive(Debug, Parser)]
#[clap(bin_name = "heatzones")]
#[clap(author, version, about)]
struct HeatZonesOptionsInit {
    /// The path to the location store database file.
    ///
    /// If this is not specified, then the program will check for it in the "HEATZONE_STORE"
    /// environment variable.
    #[clap(short, long)]
    #[clap(env = "HEATZONE_STORE")]
    store: PathBuf,

    /// The path to the local storage that holds your user id.
    ///
    /// If this is not specified, then the program will check the "HEATZONE_IDENTITY" environment
    /// variable, and failing that use "identity.sqlite" next to the store.
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

    /// Only consider users that updated their location within this many minutes.
    ///
    /// Zero means no limit.
    #[clap(short, long, default_value_t = 5)]
    online_minutes: i64,

    /// The path to a KML file to produce from this run.
    #[clap(short, long)]
    kml_file: Option<PathBuf>,

    /// Also update your own location in the store before reading everyone else's.
    #[clap(short, long)]
    broadcast: bool,

    /// Verbose output
    #[clap(short, long)]
    verbose: bool,
}

#[derive(Debug)]
struct HeatZonesOptionsChecked {
    /// The path to the location store.
    store: PathBuf,

    /// The path to local storage for the user id.
    identity: PathBuf,

    /// Where the caller is.
    location: Coord,

    /// Distances used for the analysis.
    config: ProximityConfig,

    /// How recent a location must be to count, if limited.
    online_window: Option<Duration>,

    /// The path to a KML file to produce from this run.
    kml_file: Option<PathBuf>,

    /// Update our own location first.
    broadcast: bool,

    /// Verbose output
    verbose: bool,
}

impl Display for HeatZonesOptionsChecked {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        writeln!(f, "\n")?; // yes, two blank lines.
        writeln!(f, "         Store: {}", self.store.display())?;
        writeln!(f, "      Identity: {}", self.identity.display())?;
        writeln!(f, "      Location: {}", self.location)?;
        writeln!(f, "   Near Radius: {:.0} m", self.config.near_radius())?;
        writeln!(f, " Link Distance: {:.0} m", self.config.link_distance())?;
        match self.online_window {
            Some(window) => writeln!(f, " Online Within: {} minutes", window.num_minutes())?,
            None => writeln!(f, " Online Within: unlimited")?,
        }
        if let Some(ref kml_file) = self.kml_file {
            writeln!(f, "    Output KML: {}", kml_file.display())?;
        }
        writeln!(f, "     Broadcast: {}", self.broadcast)?;
        writeln!(f, "\n")?; // yes, two blank lines.

        Ok(())
    }
}

/// Get the command line arguments and check them.
///
/// If there is missing data, try to fill it in with environment variables.
fn parse_args() -> HeatZoneResult<HeatZonesOptionsChecked> {
    let HeatZonesOptionsInit {
        store,
        identity,
        location,
        near_radius,
        link_distance,
        online_minutes,
        kml_file,
        broadcast,
        verbose,
    } = HeatZonesOptionsInit::parse();

    let identity = match identity {
        Some(v) => v,
        None => store.with_file_name("identity.sqlite"),
    };

    let config = ProximityConfig::new(near_radius, link_distance)?;

    let online_window = if online_minutes > 0 {
        Some(Duration::minutes(online_minutes))
    } else {
        None
    };

    Ok(HeatZonesOptionsChecked {
        store,
        identity,
        location,
        config,
        online_window,
        kml_file,
        broadcast,
        verbose,
    })
}

/*-------------------------------------------------------------------------------------------------
 *                                             MAIN
 *-----------------------------------------------------------------------------------------------*/
fn main() -> HeatZoneResult<()> {
    let opts = parse_args()?;

    let level = if opts.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    SimpleLogger::new().with_level(level).init()?;

    if opts.verbose {
        info!("{}", opts);
    }

    let ids = UserIdStore::open(&opts.identity)?;
    let my_id = ids.user_id()?;

    let db = LocationDatabase::connect(&opts.store)?;

    let now = Utc::now();
    if opts.broadcast {
        let mut update = db.prepare_to_update_locations()?;
        update.update(my_id, opts.location, now)?;
        info!("Location updated for {}", my_id);
    }

    let snapshot = db.live_snapshot(my_id, opts.online_window.map(|window| now - window))?;
    let report = ProximityReport::analyze(opts.location, snapshot.samples, &opts.config);

    log_report(&report, opts.location);

    if let Some(ref kml_file) = opts.kml_file {
        let mut kfile = KmlFile::new(kml_file)?;
        report.kml_write(
            &mut kfile,
            opts.location,
            snapshot.taken,
            opts.config.link_distance() / 2.0,
        )?;
        info!("Wrote {}", kml_file.display());
    }

    Ok(())
}

fn log_report(report: &ProximityReport, location: Coord) {
    if report.is_empty() {
        warn!("");
        warn!("Nobody around right now.");
        warn!("");
        return;
    }

    info!("");
    info!("Nearby ({}):", report.near.len());
    for sample in &report.near {
        info!(
            "    {:<24} {:>6.0} m",
            sample.display_name(),
            location.distance_to(&sample.coord)
        );
    }

    info!("");
    info!(
        "Heat Zones ({} zones, {} people):",
        report.heat_zones.len(),
        report.users_in_heat_zones()
    );
    for zone in &report.heat_zones {
        info!(
            "    {}, {:.0} m away",
            zone,
            location.distance_to(&zone.centroid)
        );
    }

    if report.skipped > 0 {
        warn!("Skipped {} users with invalid locations.", report.skipped);
    }
    info!("");
}
