/*!
 * Geographic calculations.
 *
 * Everything here works on a spherical Earth. At the distances this crate cares about (a few
 * hundred meters to a few kilometers) the error from ignoring the ellipsoid is far smaller than
 * the error in a phone's reported position.
 */
use crate::error::HeatZoneResult;
use std::{
    fmt::{self, Display},
    str::FromStr,
};

/// Mean radius of the Earth in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// A geographic coordinate in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Coord {
    pub lat: f64,
    pub lon: f64,
}

impl Coord {
    pub fn new(lat: f64, lon: f64) -> Self {
        Coord { lat, lon }
    }

    /// Both components are finite numbers.
    pub fn is_finite(&self) -> bool {
        self.lat.is_finite() && self.lon.is_finite()
    }

    /// Great circle distance to `other` in meters.
    pub fn distance_to(&self, other: &Coord) -> f64 {
        great_circle_distance(self.lat, self.lon, other.lat, other.lon)
    }

    /// Check if these coordinates are within `eps` degrees of each other in both latitude and
    /// longitude.
    pub fn is_close(&self, other: Coord, eps: f64) -> bool {
        (self.lat - other.lat).abs() <= eps && (self.lon - other.lon).abs() <= eps
    }

    /// Find the coordinate `distance` meters away along the initial `bearing` (degrees clockwise
    /// from north).
    pub fn destination(&self, bearing: f64, distance: f64) -> Coord {
        let lat1 = self.lat.to_radians();
        let lon1 = self.lon.to_radians();
        let brng = bearing.to_radians();
        let arc = distance / EARTH_RADIUS_M;

        let lat2 = f64::asin(lat1.sin() * arc.cos() + lat1.cos() * arc.sin() * brng.cos());
        let lon2 = lon1
            + f64::atan2(
                brng.sin() * arc.sin() * lat1.cos(),
                arc.cos() - lat1.sin() * lat2.sin(),
            );

        Coord {
            lat: lat2.to_degrees(),
            lon: lon2.to_degrees(),
        }
    }
}

impl Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        write!(f, "({:.6}, {:.6})", self.lat, self.lon)
    }
}

impl FromStr for Coord {
    type Err = Box<dyn std::error::Error + Send + Sync>;

    /// Parse a "lat,lon" pair in degrees.
    fn from_str(s: &str) -> HeatZoneResult<Self> {
        let parts: Vec<_> = s.split(',').map(str::trim).collect();

        if parts.len() != 2 {
            return Err(format!("expected lat,lon but found: {}", s).into());
        }

        let lat: f64 = parts[0].parse()?;
        let lon: f64 = parts[1].parse()?;

        if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
            return Err(format!(
                concat!(
                    "Lat/Lon are out of range (-90.0 to 90.0 and -180.0 to 180.0):",
                    " lat={} lon={}"
                ),
                lat, lon
            )
            .into());
        }

        Ok(Coord { lat, lon })
    }
}

/// Anything that has a location on the Earth.
pub trait Geo {
    /// The representative location of this object.
    fn centroid(&self) -> Coord;
}

impl Geo for Coord {
    fn centroid(&self) -> Coord {
        *self
    }
}

/**
 * The haversine great circle distance calculation.
 *
 * #Arguments
 * * lat1 - the latitude of the first point in degrees.
 * * lon1 - the longitude of the first point in degrees.
 * * lat2 - the latitude of the second point in degrees.
 * * lon2 - the longitude of the second point in degrees.
 *
 * #Returns
 * The distance between the points in meters.
 */
pub fn great_circle_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    const DEG2RAD: f64 = 2.0 * std::f64::consts::PI / 360.0;

    let lat1_r = lat1 * DEG2RAD;
    let lat2_r = lat2 * DEG2RAD;

    let dlat2 = (lat2 - lat1) * DEG2RAD / 2.0;
    let dlon2 = (lon2 - lon1) * DEG2RAD / 2.0;

    let sin2_dlat = f64::powi(f64::sin(dlat2), 2);
    let sin2_dlon = f64::powi(f64::sin(dlon2), 2);

    // Rounding can push this a hair outside [0, 1] for (near) identical or antipodal points.
    let hav = (sin2_dlat + sin2_dlon * f64::cos(lat1_r) * f64::cos(lat2_r)).clamp(0.0, 1.0);

    let arc = 2.0 * f64::atan2(f64::sqrt(hav), f64::sqrt(1.0 - hav));

    arc * EARTH_RADIUS_M
}
