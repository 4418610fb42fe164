/*!
 * The most recent known position of a single user.
 */
use crate::geo::{Coord, Geo};
use std::fmt::{self, Display};

/**
 * A user's most recent position as read from the location store.
 *
 * Every snapshot of the store creates a fresh set of these; they are never updated in place.
 */
#[derive(Debug, Clone, PartialEq)]
pub struct UserSample {
    /// Identifier of the user in the location store.
    pub id: String,
    /// Display name, if the user has set one.
    pub name: Option<String>,
    /// Where the user was last seen.
    pub coord: Coord,
}

impl UserSample {
    pub fn new<S: Into<String>>(id: S, coord: Coord) -> Self {
        UserSample {
            id: id.into(),
            name: None,
            coord,
        }
    }

    pub fn with_name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = Some(name.into());
        self
    }

    /// The name to show for this user, falling back to the id.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }
}

impl Geo for UserSample {
    fn centroid(&self) -> Coord {
        self.coord
    }
}

impl Display for UserSample {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        write!(f, "{} at {}", self.display_name(), self.coord)
    }
}
