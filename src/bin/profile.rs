use clap::{Parser, Subcommand};
use heatzone::{HeatZoneResult, Interest, LocationDatabase, Profile, UserIdStore};
use log::{info, warn, LevelFilter};
use simple_logger::SimpleLogger;
use std::path::PathBuf;
use strum::IntoEnumIterator;

/*-------------------------------------------------------------------------------------------------
 *                               Parse Command Line Arguments
 *-----------------------------------------------------------------------------------------------*/
///
/// Look at and edit profiles.
///
#[derive(Debug, Parser)]
#[clap(bin_name = "profile")]
#[clap(author, version, about)]
struct ProfileOptions {
    /// The path to the location store database file.
    #[clap(short, long)]
    #[clap(env = "HEATZONE_STORE")]
    store: PathBuf,

    /// The path to the local storage that holds your user id.
    #[clap(short, long)]
    #[clap(env = "HEATZONE_IDENTITY")]
    identity: Option<PathBuf>,

    /// Verbose output
    #[clap(short, long)]
    verbose: bool,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Show your own profile.
    Show,
    /// Set your name and interests. Interests that aren't given are removed.
    Set {
        /// Your display name.
        #[clap(short, long)]
        name: Option<String>,

        /// An interest to put on your profile, may be repeated.
        #[clap(short = 't', long = "interest")]
        interests: Vec<Interest>,
    },
    /// Turn a single interest on or off.
    Toggle {
        /// The interest to toggle.
        interest: Interest,
    },
    /// Open someone else's profile. This counts as a view.
    View {
        /// The id of the user.
        id: String,

        /// Also save them as a connection.
        #[clap(short, long)]
        connect: bool,
    },
    /// List your connections that are currently on the map.
    Connections,
    /// List the interests that can go on a profile.
    Interests,
}

/*-------------------------------------------------------------------------------------------------
 *                                             MAIN
 *-----------------------------------------------------------------------------------------------*/
fn main() -> HeatZoneResult<()> {
    let opts = ProfileOptions::parse();

    let level = if opts.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    SimpleLogger::new().with_level(level).init()?;

    let identity = opts
        .identity
        .clone()
        .unwrap_or_else(|| opts.store.with_file_name("identity.sqlite"));

    let ids = UserIdStore::open(&identity)?;
    let my_id = ids.user_id()?;

    let db = LocationDatabase::connect(&opts.store)?;

    match opts.command {
        Command::Show => show(&my_profile(&db, my_id)?),
        Command::Set { name, interests } => {
            db.save_profile(my_id, name.as_deref(), &interests)?;
            show(&my_profile(&db, my_id)?);
        }
        Command::Toggle { interest } => {
            let mut profile = my_profile(&db, my_id)?;
            profile.toggle_interest(interest);
            db.save_profile(my_id, profile.name.as_deref(), &profile.interests)?;
            show(&profile);
        }
        Command::View { id, connect } => match db.view_profile(&id)? {
            Some(profile) => {
                show(&profile);
                if connect {
                    db.add_connection(my_id, &id)?;
                    info!("Saved {} as a connection.", id);
                }
            }
            None => warn!("User not found: {}", id),
        },
        Command::Connections => {
            let connections = db.connections(my_id)?;
            if connections.is_empty() {
                warn!("None of your connections are on the map.");
            }
            for connection in connections {
                info!("{}", connection);
            }
        }
        Command::Interests => {
            for interest in Interest::iter() {
                info!("{}", interest);
            }
        }
    }

    Ok(())
}

/// Our own profile, or an empty one if we haven't saved anything yet.
fn my_profile(db: &LocationDatabase, my_id: &str) -> HeatZoneResult<Profile> {
    let profile = db.profile(my_id)?.unwrap_or_else(|| Profile {
        id: my_id.to_owned(),
        name: None,
        interests: vec![],
        profile_views: 0,
    });

    Ok(profile)
}

fn show(profile: &Profile) {
    for line in profile.to_string().lines() {
        info!("{}", line);
    }
}
