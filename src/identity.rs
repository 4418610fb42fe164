/*!
 * The identity of the user running the program.
 *
 * There are no accounts. A user is identified by a short random string created the first time it
 * is needed and kept in local storage so it is the same every time the program runs.
 */
use crate::error::HeatZoneResult;
use log::info;
use once_cell::sync::OnceCell;
use rand::Rng;
use rusqlite::{Connection, OpenFlags, OptionalExtension};
use std::path::Path;

const ID_KEY: &str = "user_id";
const ID_LENGTH: usize = 8;
const ID_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/**
 * Local storage for the user's identity.
 *
 * The id is loaded (or created and saved) on the first call to `user_id` and then cached for as
 * long as this object lives. Pass a reference to it to anything that needs to know who "we" are.
 */
pub struct UserIdStore {
    conn: Connection,
    id: OnceCell<String>,
}

impl UserIdStore {
    /// Open (or create) the local storage at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> HeatZoneResult<Self> {
        let conn = Connection::open_with_flags(
            path.as_ref(),
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS local_storage (key TEXT PRIMARY KEY, value TEXT NOT NULL);",
        )?;

        Ok(UserIdStore {
            conn,
            id: OnceCell::new(),
        })
    }

    /// Get the user id, creating and saving a new one if there isn't one stored yet.
    pub fn user_id(&self) -> HeatZoneResult<&str> {
        let id = self.id.get_or_try_init(|| self.load_or_create())?;
        Ok(id.as_str())
    }

    fn load_or_create(&self) -> HeatZoneResult<String> {
        let stored: Option<String> = self
            .conn
            .query_row(
                "SELECT value FROM local_storage WHERE key = ?1",
                [ID_KEY],
                |row| row.get(0),
            )
            .optional()?;

        match stored {
            Some(id) if !id.is_empty() => {
                info!("Using stored user ID: {}", id);
                Ok(id)
            }
            _ => {
                let id = generate_id();
                self.conn.execute(
                    "INSERT OR REPLACE INTO local_storage (key, value) VALUES (?1, ?2)",
                    [ID_KEY, id.as_str()],
                )?;
                info!("New user ID created: {}", id);
                Ok(id)
            }
        }
    }
}

/// A new random lower case base-36 id.
pub fn generate_id() -> String {
    let mut rng = rand::thread_rng();

    (0..ID_LENGTH)
        .map(|_| ID_ALPHABET[rng.gen_range(0..ID_ALPHABET.len())] as char)
        .collect()
}
