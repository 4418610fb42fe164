/*!
 * Where the device running the program is.
 */
use crate::{error::HeatZoneResult, geo::Coord};

/// A source of the caller's current location, such as a GPS receiver.
pub trait LocationProvider {
    fn current_location(&mut self) -> HeatZoneResult<Coord>;
}

/// A device that never moves.
#[derive(Debug, Clone, Copy)]
pub struct FixedLocation(pub Coord);

impl LocationProvider for FixedLocation {
    fn current_location(&mut self) -> HeatZoneResult<Coord> {
        Ok(self.0)
    }
}

impl<F> LocationProvider for F
where
    F: FnMut() -> HeatZoneResult<Coord>,
{
    fn current_location(&mut self) -> HeatZoneResult<Coord> {
        self()
    }
}
