use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Modified Julian Date of the Unix epoch (1970-01-01T00:00:00Z)
pub const MJD_UNIX_EPOCH: f64 = 40_587.0;

/// Seconds per day
pub const SECONDS_PER_DAY: f64 = 86_400.0;

/// Speed of light in vacuum (m/s)
pub const SPEED_OF_LIGHT: f64 = 299_792_458.0;

/// Convert a UTC timestamp to Modified Julian Date
pub fn datetime_to_mjd(time: DateTime<Utc>) -> f64 {
    MJD_UNIX_EPOCH + time.timestamp_millis() as f64 / (SECONDS_PER_DAY * 1000.0)
}

/// Convert a Modified Julian Date back to a UTC timestamp (millisecond resolution)
pub fn mjd_to_datetime(mjd: f64) -> Option<DateTime<Utc>> {
    let millis = ((mjd - MJD_UNIX_EPOCH) * SECONDS_PER_DAY * 1000.0).round();
    if !millis.is_finite() {
        return None;
    }
    Utc.timestamp_millis_opt(millis as i64).single()
}

/// Orbit state vector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateVector {
    pub time: f64,           // MJD (UTC)
    pub position: [f64; 3],  // [x, y, z] in meters
    pub velocity: [f64; 3],  // [vx, vy, vz] in m/s
}

impl StateVector {
    pub fn new(time: f64, position: [f64; 3], velocity: [f64; 3]) -> Self {
        Self { time, position, velocity }
    }

    /// Build a state vector from a UTC timestamp
    pub fn from_datetime(time: DateTime<Utc>, position: [f64; 3], velocity: [f64; 3]) -> Self {
        Self::new(datetime_to_mjd(time), position, velocity)
    }
}

/// Geodetic position in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPos {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPos {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

/// Doppler centroid model: fdc(t) = sum_i c_i * (t - t0)^i, t being two-way slant range time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DopplerCentroid {
    /// Reference slant range time t0 (seconds)
    pub reference_time: f64,
    /// Polynomial coefficients in Hz, Hz/s, Hz/s^2, ...
    pub coefficients: Vec<f64>,
}

impl DopplerCentroid {
    /// Constant Doppler centroid
    pub fn constant(frequency: f64) -> Self {
        Self {
            reference_time: 0.0,
            coefficients: vec![frequency],
        }
    }

    /// Evaluate the Doppler centroid (Hz) at a two-way slant range time
    pub fn evaluate(&self, slant_range_time: f64) -> f64 {
        let dt = slant_range_time - self.reference_time;
        self.coefficients
            .iter()
            .rev()
            .fold(0.0, |acc, c| acc * dt + c)
    }
}

impl Default for DopplerCentroid {
    fn default() -> Self {
        Self::constant(0.0)
    }
}

/// Metadata of one SAR acquisition, as delivered by the product readers.
///
/// Read-only input of the stack optimisation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Acquisition {
    /// Stable identifier (product name or metadata key)
    pub id: String,
    pub mission: String,
    pub absolute_orbit: u32,
    pub relative_orbit: u32,

    /// Acquisition time (MJD, UTC)
    pub acquisition_time: f64,
    /// Azimuth time of the first line (MJD, UTC)
    pub first_line_time: f64,
    /// Azimuth time between lines (seconds)
    pub line_time_interval: f64,
    /// Two-way slant range time to the first sample (seconds)
    pub near_range_time: f64,
    /// Range sampling rate (Hz)
    pub range_sampling_rate: f64,
    pub num_lines: usize,
    pub num_samples: usize,

    /// Radar wavelength (meters)
    pub wavelength: f64,
    /// Incidence angle at scene centre (degrees)
    pub incidence_angle: f64,
    /// Approximate scene centre, used to seed geolocation
    pub scene_center: GeoPos,
    pub doppler_centroid: DopplerCentroid,

    /// Orbit state vectors, strictly increasing in time
    pub state_vectors: Vec<StateVector>,
}

impl Acquisition {
    /// Azimuth time of the scene centre line (MJD)
    pub fn center_time(&self) -> f64 {
        self.line_to_azimuth_time(0.5 * self.num_lines as f64)
    }

    /// Two-way slant range time of the scene centre sample (seconds)
    pub fn center_range_time(&self) -> f64 {
        self.pixel_to_range_time(0.5 * self.num_samples as f64)
    }

    /// Azimuth time (MJD) of a fractional line
    pub fn line_to_azimuth_time(&self, line: f64) -> f64 {
        self.first_line_time + line * self.line_time_interval / SECONDS_PER_DAY
    }

    /// Fractional line at an azimuth time (MJD)
    pub fn azimuth_time_to_line(&self, azimuth_time: f64) -> f64 {
        (azimuth_time - self.first_line_time) * SECONDS_PER_DAY / self.line_time_interval
    }

    /// Two-way slant range time (seconds) of a fractional pixel
    pub fn pixel_to_range_time(&self, pixel: f64) -> f64 {
        self.near_range_time + pixel / self.range_sampling_rate
    }

    /// Fractional pixel at a two-way slant range time (seconds)
    pub fn range_time_to_pixel(&self, range_time: f64) -> f64 {
        (range_time - self.near_range_time) * self.range_sampling_rate
    }

    /// Doppler centroid (Hz) at a two-way slant range time
    pub fn doppler_centroid_at(&self, slant_range_time: f64) -> f64 {
        self.doppler_centroid.evaluate(slant_range_time)
    }

    /// Acquisition time as a UTC timestamp
    pub fn acquisition_datetime(&self) -> Option<DateTime<Utc>> {
        mjd_to_datetime(self.acquisition_time)
    }

    /// Reject non-physical metadata before any geometry is derived from it
    pub fn validate(&self) -> StackResult<()> {
        let positive = [
            ("line_time_interval", self.line_time_interval),
            ("near_range_time", self.near_range_time),
            ("range_sampling_rate", self.range_sampling_rate),
            ("wavelength", self.wavelength),
        ];
        for (name, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(StackError::InvalidMetadata(format!(
                    "{}: {} must be positive, got {}",
                    self.id, name, value
                )));
            }
        }

        if self.num_lines == 0 || self.num_samples == 0 {
            return Err(StackError::InvalidMetadata(format!(
                "{}: empty scene ({} lines x {} samples)",
                self.id, self.num_lines, self.num_samples
            )));
        }

        if !self.acquisition_time.is_finite() || !self.first_line_time.is_finite() {
            return Err(StackError::InvalidMetadata(format!(
                "{}: acquisition time is not finite",
                self.id
            )));
        }

        if !(self.incidence_angle > 0.0 && self.incidence_angle < 90.0) {
            return Err(StackError::InvalidMetadata(format!(
                "{}: incidence angle {} outside (0, 90) degrees",
                self.id, self.incidence_angle
            )));
        }

        Ok(())
    }
}

/// Error types for stack processing
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StackError {
    #[error("Insufficient orbit data: {num_state_vectors} state vectors cannot fit a degree {degree} polynomial")]
    InsufficientData { num_state_vectors: usize, degree: usize },

    #[error("Insufficient acquisitions: at least 2 required, got {0}")]
    InsufficientAcquisitions(usize),

    #[error("Empty input")]
    EmptyInput,

    #[error("Index {index} out of range for length {len}")]
    IndexRange { index: usize, len: usize },

    #[error("Invalid orbit data: {0}")]
    InvalidOrbit(String),

    #[error("Invalid acquisition metadata: {0}")]
    InvalidMetadata(String),

    #[error("Duplicate acquisition identifier: {0}")]
    DuplicateAcquisition(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Numerical error: {0}")]
    Numerical(String),
}

/// Result type for stack operations
pub type StackResult<T> = Result<T, StackError>;

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_mjd_conversion() {
        let time = DateTime::parse_from_rfc3339("2020-01-03T18:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let mjd = datetime_to_mjd(time);

        // 2020-01-01 is MJD 58849
        assert_abs_diff_eq!(mjd, 58851.75, epsilon = 1e-9);
        assert_eq!(mjd_to_datetime(mjd).unwrap(), time);
    }

    #[test]
    fn test_doppler_centroid_polynomial() {
        let dc = DopplerCentroid {
            reference_time: 5.0e-3,
            coefficients: vec![10.0, 2000.0, 1.0e5],
        };
        assert_abs_diff_eq!(dc.evaluate(5.0e-3), 10.0, epsilon = 1e-12);
        // 10 + 2000 * 1e-3 + 1e5 * 1e-6
        assert_abs_diff_eq!(dc.evaluate(6.0e-3), 12.1, epsilon = 1e-9);
    }

    fn test_acquisition() -> Acquisition {
        Acquisition {
            id: "S1A_TEST".to_string(),
            mission: "SENTINEL-1A".to_string(),
            absolute_orbit: 30639,
            relative_orbit: 117,
            acquisition_time: 58851.0,
            first_line_time: 58851.0,
            line_time_interval: 2.0e-3,
            near_range_time: 5.4e-3,
            range_sampling_rate: 64.0e6,
            num_lines: 1000,
            num_samples: 2000,
            wavelength: 0.0555,
            incidence_angle: 35.0,
            scene_center: GeoPos::new(0.0, 0.0),
            doppler_centroid: DopplerCentroid::default(),
            state_vectors: Vec::new(),
        }
    }

    #[test]
    fn test_invalid_metadata_rejected() {
        let mut acquisition = test_acquisition();
        assert!(acquisition.validate().is_ok());

        acquisition.range_sampling_rate = 0.0;
        assert!(matches!(
            acquisition.validate(),
            Err(StackError::InvalidMetadata(_))
        ));
    }

    #[test]
    fn test_incidence_angle_open_interval() {
        let mut acquisition = test_acquisition();
        for angle in [0.0, 90.0, -5.0, f64::NAN] {
            acquisition.incidence_angle = angle;
            assert!(
                matches!(acquisition.validate(), Err(StackError::InvalidMetadata(_))),
                "incidence angle {} accepted",
                angle
            );
        }

        acquisition.incidence_angle = 1.0e-3;
        assert!(acquisition.validate().is_ok());
    }

    #[test]
    fn test_line_and_pixel_timing() {
        let acquisition = test_acquisition();

        assert_abs_diff_eq!(acquisition.center_time(), acquisition.line_to_azimuth_time(500.0), epsilon = 1e-12);
        assert_abs_diff_eq!(
            (acquisition.line_to_azimuth_time(250.0) - acquisition.first_line_time) * SECONDS_PER_DAY,
            0.5,
            epsilon = 1e-5
        );
        assert_abs_diff_eq!(
            acquisition.azimuth_time_to_line(acquisition.line_to_azimuth_time(123.25)),
            123.25,
            epsilon = 1e-3
        );
        assert_abs_diff_eq!(acquisition.pixel_to_range_time(640.0), 5.4e-3 + 1.0e-5, epsilon = 1e-15);
        assert_abs_diff_eq!(acquisition.range_time_to_pixel(5.4e-3 + 1.0e-5), 640.0, epsilon = 1e-6);
    }
}
