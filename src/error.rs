use std::{
    error::Error,
    fmt::{Display, Formatter},
};

/// Result type used throughout the crate.
pub type HeatZoneResult<T> = Result<T, Box<dyn Error + Send + Sync>>;

#[derive(Debug, Clone, Copy)]
pub struct HeatZoneError {
    pub msg: &'static str,
}

impl Display for HeatZoneError {
    fn fmt(&self, f: &mut Formatter) -> Result<(), std::fmt::Error> {
        write!(f, "{}", self.msg)
    }
}

impl Error for HeatZoneError {}
