/*! The lightweight social profile shown when a user is selected on the map. */

use std::fmt::{self, Display};
use strum::{EnumIter, EnumString, IntoStaticStr};

/** The interest tags a user can put on their profile. */
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, EnumString, IntoStaticStr, strum::Display,
)]
#[strum(ascii_case_insensitive)]
pub enum Interest {
    Sports,
    Tech,
    Art,
    Food,
    Gaming,
    Travel,
    Movies,
    Fitness,
}

impl Interest {
    /// Get a string representing the name of the interest.
    pub fn name(&self) -> &'static str {
        (*self).into()
    }

    /// Join interests into the comma separated form used for storage.
    pub fn join(interests: &[Interest]) -> String {
        interests
            .iter()
            .map(|interest| interest.name())
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Parse the comma separated storage form, skipping any names that aren't recognized.
    pub fn split(stored: &str) -> Vec<Interest> {
        stored
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .filter_map(|name| match name.parse() {
                Ok(interest) => Some(interest),
                Err(_) => {
                    log::warn!("Unknown interest in profile: {}", name);
                    None
                }
            })
            .collect()
    }
}

/// A user's profile.
#[derive(Debug, Clone, PartialEq)]
pub struct Profile {
    /// The user this profile belongs to.
    pub id: String,
    /// Display name (the original app used an Instagram handle).
    pub name: Option<String>,
    /// Interest tags in the order the user picked them.
    pub interests: Vec<Interest>,
    /// The number of times other users have opened this profile.
    pub profile_views: u64,
}

impl Profile {
    /// Toggle an interest on or off.
    pub fn toggle_interest(&mut self, interest: Interest) {
        match self.interests.iter().position(|i| *i == interest) {
            Some(idx) => {
                self.interests.remove(idx);
            }
            None => self.interests.push(interest),
        }
    }
}

impl Display for Profile {
    #[rustfmt::skip]
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        writeln!(f, "           ID: {}", self.id)?;
        writeln!(f, "         Name: {}", self.name.as_deref().unwrap_or("(not set)"))?;
        writeln!(f, "    Interests: {}", Interest::join(&self.interests).replace(',', ", "))?;
        writeln!(f, "Profile Views: {}", self.profile_views)
    }
}
