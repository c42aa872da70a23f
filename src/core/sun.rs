//! Low-precision solar ephemeris (Astronomical Almanac), good to about 0.01
//! degrees between 1950 and 2050.

use crate::types::{datetime_to_mjd, GeoPos};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Astronomical unit (meters)
pub const ASTRONOMICAL_UNIT: f64 = 149_597_870_700.0;

/// MJD of the J2000.0 epoch
const MJD_J2000: f64 = 51_544.5;

/// Apparent sun position at one instant
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SunPosition {
    /// Right ascension (degrees, [0, 360))
    pub right_ascension: f64,
    /// Declination (degrees)
    pub declination: f64,
    /// Earth-sun distance (AU)
    pub distance: f64,
    /// Greenwich mean sidereal time (degrees, [0, 360))
    pub gmst: f64,
}

/// Sun direction seen from a point on the ground
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SunAngles {
    /// Elevation above the horizon (degrees)
    pub elevation: f64,
    /// Azimuth clockwise from north (degrees, [0, 360))
    pub azimuth: f64,
}

impl SunPosition {
    /// Sun position at a Modified Julian Date (UTC)
    pub fn at_mjd(mjd: f64) -> Self {
        let n = mjd - MJD_J2000;

        let mean_longitude = (280.460 + 0.985_647_4 * n).rem_euclid(360.0);
        let mean_anomaly = (357.528 + 0.985_600_3 * n).rem_euclid(360.0).to_radians();
        let ecliptic_longitude = (mean_longitude
            + 1.915 * mean_anomaly.sin()
            + 0.020 * (2.0 * mean_anomaly).sin())
        .to_radians();
        let obliquity = (23.439 - 0.000_000_4 * n).to_radians();

        let distance =
            1.000_14 - 0.016_71 * mean_anomaly.cos() - 0.000_14 * (2.0 * mean_anomaly).cos();

        let right_ascension = (obliquity.cos() * ecliptic_longitude.sin())
            .atan2(ecliptic_longitude.cos())
            .to_degrees()
            .rem_euclid(360.0);
        let declination = (obliquity.sin() * ecliptic_longitude.sin()).asin().to_degrees();

        let gmst = (280.460_618_37 + 360.985_647_366_29 * n).rem_euclid(360.0);

        Self {
            right_ascension,
            declination,
            distance,
            gmst,
        }
    }

    pub fn at_datetime(time: DateTime<Utc>) -> Self {
        Self::at_mjd(datetime_to_mjd(time))
    }

    /// Geographic position where the sun is at the zenith
    pub fn subsolar_point(&self) -> GeoPos {
        let mut lon = (self.right_ascension - self.gmst).rem_euclid(360.0);
        if lon > 180.0 {
            lon -= 360.0;
        }
        GeoPos::new(self.declination, lon)
    }

    /// Earth-fixed sun position (meters)
    pub fn ecef(&self) -> [f64; 3] {
        let lon = (self.right_ascension - self.gmst).to_radians();
        let dec = self.declination.to_radians();
        let r = self.distance * ASTRONOMICAL_UNIT;
        [r * dec.cos() * lon.cos(), r * dec.cos() * lon.sin(), r * dec.sin()]
    }

    /// Local elevation and azimuth for an observer
    pub fn angles_at(&self, observer: GeoPos) -> SunAngles {
        let lat = observer.lat.to_radians();
        let dec = self.declination.to_radians();
        let hour_angle = (self.gmst + observer.lon - self.right_ascension).to_radians();

        let elevation = (lat.sin() * dec.sin() + lat.cos() * dec.cos() * hour_angle.cos())
            .clamp(-1.0, 1.0)
            .asin();
        let azimuth = (-dec.cos() * hour_angle.sin())
            .atan2(dec.sin() * lat.cos() - dec.cos() * lat.sin() * hour_angle.cos());

        SunAngles {
            elevation: elevation.to_degrees(),
            azimuth: azimuth.to_degrees().rem_euclid(360.0),
        }
    }
}
