use crate::{
    error::HeatZoneResult,
    feed::Snapshot,
    geo::Coord,
    profile::{Interest, Profile},
    sample::UserSample,
};
use chrono::{DateTime, Utc};
use log::debug;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension, Row};
use std::path::Path;

/// Represents a connection to the database where everyone's locations and profiles are stored.
pub struct LocationDatabase {
    conn: Connection,
}

impl LocationDatabase {
    /// Initialize a database.
    ///
    /// Initialize a database to make sure it exists and is set up properly. This should be run in
    /// the main thread before any other threads open a connection to the database to ensure
    /// consistency.
    pub fn initialize<P: AsRef<Path>>(path: P) -> HeatZoneResult<()> {
        let path = path.as_ref();

        let _conn = Self::open_database_to_write(path)?;
        Ok(())
    }

    /// Open a connection to the database.
    pub fn connect<P: AsRef<Path>>(path: P) -> HeatZoneResult<Self> {
        let path = path.as_ref();

        let conn = Self::open_database_to_write(path)?;
        Ok(LocationDatabase { conn })
    }

    fn open_database_to_write(path: &Path) -> HeatZoneResult<Connection> {
        let conn = rusqlite::Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;

        // Several threads each hold their own connection, writes are tiny so this is plenty.
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        const QUERY: &str = include_str!("database/create_location_db.sql");
        conn.execute_batch(QUERY)?;

        Ok(conn)
    }

    /// Prepare to write live locations to the database.
    pub fn prepare_to_update_locations(&self) -> HeatZoneResult<LocationDatabaseUpdate<'_>> {
        const QUERY: &str = include_str!("database/update_location.sql");
        let stmt = self.conn.prepare(QUERY)?;

        Ok(LocationDatabaseUpdate { stmt })
    }

    /**
     * Read everyone's most recent location.
     *
     * #Arguments
     * exclude_id - the caller's own id, they never see themselves.
     * fresh_since - if given, only users that have updated their location at or after this time
     *               are included.
     *
     * Rows without a numeric latitude and longitude are left out.
     */
    pub fn live_snapshot(
        &self,
        exclude_id: &str,
        fresh_since: Option<DateTime<Utc>>,
    ) -> HeatZoneResult<Snapshot> {
        const QUERY: &str = include_str!("database/query_live_locations.sql");

        let since = fresh_since.map(|t| t.timestamp()).unwrap_or(i64::MIN);

        let mut stmt = self.conn.prepare_cached(QUERY)?;
        let samples: Vec<UserSample> = stmt
            .query_map(params![exclude_id, since], sample_from_row)?
            .collect::<Result<_, _>>()?;

        debug!("read {} live locations", samples.len());

        Ok(Snapshot::new(Utc::now(), samples))
    }

    /// Take a user off the map. Returns `false` if they weren't on it.
    pub fn remove_location(&self, id: &str) -> HeatZoneResult<bool> {
        let removed = self
            .conn
            .execute("DELETE FROM live_locations WHERE id = ?1", [id])?;
        Ok(removed > 0)
    }

    /// Look up a profile without counting it as a view.
    pub fn profile(&self, id: &str) -> HeatZoneResult<Option<Profile>> {
        let profile = self
            .conn
            .query_row(
                "SELECT id, name, interests, profile_views FROM profiles WHERE id = ?1",
                [id],
                profile_from_row,
            )
            .optional()?;

        Ok(profile)
    }

    /// Set the name and interests on a profile, creating it if needed. The view count is kept.
    pub fn save_profile(
        &self,
        id: &str,
        name: Option<&str>,
        interests: &[Interest],
    ) -> HeatZoneResult<()> {
        const QUERY: &str = include_str!("database/save_profile.sql");

        self.conn
            .execute(QUERY, params![id, name, Interest::join(interests)])?;
        Ok(())
    }

    /// Open another user's profile, which counts as a view.
    ///
    /// Returns the profile including this view, or `None` if there is no such profile.
    pub fn view_profile(&self, id: &str) -> HeatZoneResult<Option<Profile>> {
        let tx = self.conn.unchecked_transaction()?;

        let updated = tx.execute(
            "UPDATE profiles SET profile_views = profile_views + 1 WHERE id = ?1",
            [id],
        )?;

        if updated == 0 {
            return Ok(None);
        }

        let profile = tx.query_row(
            "SELECT id, name, interests, profile_views FROM profiles WHERE id = ?1",
            [id],
            profile_from_row,
        )?;

        tx.commit()?;

        Ok(Some(profile))
    }

    /// Remember `other` as one of `owner`'s connections.
    pub fn add_connection(&self, owner: &str, other: &str) -> HeatZoneResult<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO connections (owner, other) VALUES (?1, ?2)",
            [owner, other],
        )?;
        Ok(())
    }

    /// The connections of `owner` that currently have a known location.
    pub fn connections(&self, owner: &str) -> HeatZoneResult<Vec<UserSample>> {
        const QUERY: &str = include_str!("database/query_connections.sql");

        let mut stmt = self.conn.prepare_cached(QUERY)?;
        let samples: Vec<UserSample> = stmt
            .query_map([owner], sample_from_row)?
            .collect::<Result<_, _>>()?;

        Ok(samples)
    }
}

fn sample_from_row(row: &Row) -> rusqlite::Result<UserSample> {
    let id: String = row.get(0)?;
    let name: Option<String> = row.get(1)?;
    let lat: f64 = row.get(2)?;
    let lon: f64 = row.get(3)?;

    Ok(UserSample {
        id,
        name,
        coord: Coord { lat, lon },
    })
}

fn profile_from_row(row: &Row) -> rusqlite::Result<Profile> {
    let id: String = row.get(0)?;
    let name: Option<String> = row.get(1)?;
    let interests: String = row.get(2)?;
    let profile_views: i64 = row.get(3)?;

    Ok(Profile {
        id,
        name,
        interests: Interest::split(&interests),
        profile_views: profile_views.max(0) as u64,
    })
}

/// A prepared statement for broadcasting locations.
pub struct LocationDatabaseUpdate<'a> {
    stmt: rusqlite::Statement<'a>,
}

impl<'a> LocationDatabaseUpdate<'a> {
    /// Store `coord` as the latest location of user `id` as of `time`.
    pub fn update(&mut self, id: &str, coord: Coord, time: DateTime<Utc>) -> HeatZoneResult<()> {
        self.stmt
            .execute(params![id, coord.lat, coord.lon, time.timestamp()])?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_snapshot_excludes_caller_and_bad_rows() {
        let db = LocationDatabase::connect(":memory:").unwrap();
        let now = Utc::now();

        {
            let mut add = db.prepare_to_update_locations().unwrap();
            add.update("me", Coord::new(0.0, 0.0), now).unwrap();
            add.update("b", Coord::new(0.0, 0.001), now).unwrap();
            add.update("a", Coord::new(0.0, 0.002), now).unwrap();
        }

        db.conn
            .execute(
                "INSERT INTO live_locations (id, lat, lon, updated_at) VALUES ('x', NULL, 1.0, ?1)",
                [now.timestamp()],
            )
            .unwrap();
        db.conn
            .execute(
                "INSERT INTO live_locations (id, lat, lon, updated_at) VALUES ('y', 'abc', 1.0, ?1)",
                [now.timestamp()],
            )
            .unwrap();

        let snap = db.live_snapshot("me", None).unwrap();
        let ids: Vec<&str> = snap.samples.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, ["a", "b"]);
    }

    #[test]
    fn test_update_replaces_location() {
        let db = LocationDatabase::connect(":memory:").unwrap();
        let now = Utc::now();

        let mut add = db.prepare_to_update_locations().unwrap();
        add.update("a", Coord::new(1.0, 1.0), now - Duration::minutes(10))
            .unwrap();
        add.update("a", Coord::new(2.0, 2.0), now).unwrap();
        drop(add);

        let snap = db.live_snapshot("me", None).unwrap();
        assert_eq!(snap.samples.len(), 1);
        assert_eq!(snap.samples[0].coord, Coord::new(2.0, 2.0));
    }

    #[test]
    fn test_stale_locations_filtered() {
        let db = LocationDatabase::connect(":memory:").unwrap();
        let now = Utc::now();

        let mut add = db.prepare_to_update_locations().unwrap();
        add.update("old", Coord::new(1.0, 1.0), now - Duration::minutes(30))
            .unwrap();
        add.update("new", Coord::new(1.0, 1.0), now).unwrap();
        drop(add);

        let snap = db
            .live_snapshot("me", Some(now - Duration::minutes(5)))
            .unwrap();
        assert_eq!(snap.samples.len(), 1);
        assert_eq!(snap.samples[0].id, "new");

        assert!(db.remove_location("new").unwrap());
        assert!(!db.remove_location("new").unwrap());
        assert!(db
            .live_snapshot("me", Some(now - Duration::minutes(5)))
            .unwrap()
            .samples
            .is_empty());
    }

    #[test]
    fn test_profile_views() {
        let db = LocationDatabase::connect(":memory:").unwrap();

        assert!(db.view_profile("nobody").unwrap().is_none());

        db.save_profile("a", Some("alice"), &[Interest::Art, Interest::Food])
            .unwrap();

        let viewed = db.view_profile("a").unwrap().unwrap();
        assert_eq!(viewed.profile_views, 1);
        let viewed = db.view_profile("a").unwrap().unwrap();
        assert_eq!(viewed.profile_views, 2);

        // Saving again keeps the views.
        db.save_profile("a", Some("alice_b"), &[Interest::Tech])
            .unwrap();
        let profile = db.profile("a").unwrap().unwrap();
        assert_eq!(profile.name.as_deref(), Some("alice_b"));
        assert_eq!(profile.interests, vec![Interest::Tech]);
        assert_eq!(profile.profile_views, 2);
    }

    #[test]
    fn test_names_and_connections() {
        let db = LocationDatabase::connect(":memory:").unwrap();
        let now = Utc::now();

        db.save_profile("a", Some("alice"), &[]).unwrap();

        let mut add = db.prepare_to_update_locations().unwrap();
        add.update("a", Coord::new(1.0, 1.0), now).unwrap();
        add.update("b", Coord::new(2.0, 2.0), now).unwrap();
        drop(add);

        let snap = db.live_snapshot("me", None).unwrap();
        assert_eq!(snap.samples[0].display_name(), "alice");
        assert_eq!(snap.samples[1].display_name(), "b");

        db.add_connection("me", "a").unwrap();
        db.add_connection("me", "a").unwrap();
        db.add_connection("me", "ghost").unwrap();

        let connections = db.connections("me").unwrap();
        assert_eq!(connections.len(), 1);
        assert_eq!(connections[0].name.as_deref(), Some("alice"));
        assert!(db.connections("b").unwrap().is_empty());
    }
}
