use crate::core::geodesy::{compute_accurate_xyz_at_height, geo2xyz, geolocation_residuals_at_height, Ellipsoid};
use crate::types::{Acquisition, StackError, StackResult, StateVector, SECONDS_PER_DAY, SPEED_OF_LIGHT};
use nalgebra::{DMatrix, DVector, Vector3};
use serde::{Deserialize, Serialize};

/// Default degree of the orbit polynomials
pub const DEFAULT_POLYNOMIAL_DEGREE: usize = 3;

const MAX_ZERO_DOPPLER_ITERATIONS: usize = 10;

/// Zero-Doppler time convergence criterion (seconds)
const ZERO_DOPPLER_TOLERANCE: f64 = 1.0e-10;

/// Singular value cutoff for the least-squares fit
const SVD_EPSILON: f64 = 1.0e-12;

/// Satellite position and velocity at one instant
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OrbitVector {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub vx: f64,
    pub vy: f64,
    pub vz: f64,
}

impl OrbitVector {
    pub fn position(&self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }

    pub fn velocity(&self) -> [f64; 3] {
        [self.vx, self.vy, self.vz]
    }
}

/// Polynomial orbit model fitted to time-tagged state vectors.
///
/// Time is measured in seconds from the first state vector and scaled by the
/// covered span so the normal equations stay well conditioned. Evaluation
/// outside the fitted span extrapolates the polynomials.
#[derive(Debug, Clone)]
pub struct Orbit {
    degree: usize,
    /// MJD of the first state vector
    epoch: f64,
    /// Seconds mapped to one unit of normalised time
    time_scale: f64,
    /// First and last state vector time (MJD)
    span: (f64, f64),
    position_coeffs: [Vec<f64>; 3],
    velocity_coeffs: [Vec<f64>; 3],
}

impl Orbit {
    /// Fit one least-squares polynomial of the given degree per position and
    /// velocity component
    pub fn new(state_vectors: &[StateVector], degree: usize) -> StackResult<Self> {
        if state_vectors.len() <= degree {
            return Err(StackError::InsufficientData {
                num_state_vectors: state_vectors.len(),
                degree,
            });
        }
        Self::validate_state_vectors(state_vectors)?;

        let epoch = state_vectors[0].time;
        let last = state_vectors[state_vectors.len() - 1].time;
        let span_seconds = (last - epoch) * SECONDS_PER_DAY;
        let time_scale = if span_seconds > 0.0 { span_seconds } else { 1.0 };

        let n = state_vectors.len();
        let design = DMatrix::from_fn(n, degree + 1, |row, col| {
            let u = (state_vectors[row].time - epoch) * SECONDS_PER_DAY / time_scale;
            u.powi(col as i32)
        });
        let svd = design.clone().svd(true, true);

        let fit = |component: &dyn Fn(&StateVector) -> f64| -> StackResult<Vec<f64>> {
            let rhs = DVector::from_iterator(n, state_vectors.iter().map(component));
            let coeffs = svd
                .solve(&rhs, SVD_EPSILON)
                .map_err(|e| StackError::Numerical(format!("Orbit polynomial fit failed: {}", e)))?;
            Ok(coeffs.iter().copied().collect())
        };

        let position_coeffs = [
            fit(&|sv| sv.position[0])?,
            fit(&|sv| sv.position[1])?,
            fit(&|sv| sv.position[2])?,
        ];
        let velocity_coeffs = [
            fit(&|sv| sv.velocity[0])?,
            fit(&|sv| sv.velocity[1])?,
            fit(&|sv| sv.velocity[2])?,
        ];

        let orbit = Self {
            degree,
            epoch,
            time_scale,
            span: (epoch, last),
            position_coeffs,
            velocity_coeffs,
        };

        let max_error = state_vectors
            .iter()
            .map(|sv| {
                let fitted = orbit.get_orbit_data(sv.time).position();
                (0..3)
                    .map(|k| (fitted[k] - sv.position[k]).abs())
                    .fold(0.0, f64::max)
            })
            .fold(0.0, f64::max);

        log::info!(
            "Fitted degree {} orbit polynomials to {} state vectors ({:.1} s span)",
            degree,
            n,
            span_seconds
        );
        log::debug!("Max position fit residual: {:.3} m", max_error);

        Ok(orbit)
    }

    fn validate_state_vectors(state_vectors: &[StateVector]) -> StackResult<()> {
        for (i, sv) in state_vectors.iter().enumerate() {
            let finite = sv.time.is_finite()
                && sv.position.iter().all(|v| v.is_finite())
                && sv.velocity.iter().all(|v| v.is_finite());
            if !finite {
                return Err(StackError::InvalidOrbit(format!(
                    "State vector {} contains non-finite values",
                    i
                )));
            }
        }

        for (i, pair) in state_vectors.windows(2).enumerate() {
            if pair[1].time <= pair[0].time {
                return Err(StackError::InvalidOrbit(format!(
                    "State vector times must be strictly increasing (index {})",
                    i + 1
                )));
            }
        }

        Ok(())
    }

    pub fn degree(&self) -> usize {
        self.degree
    }

    /// First and last fitted state vector time (MJD)
    pub fn fitted_span(&self) -> (f64, f64) {
        self.span
    }

    pub fn is_within_fitted_span(&self, time: f64) -> bool {
        time >= self.span.0 && time <= self.span.1
    }

    /// Seconds since the orbit epoch
    fn offset_seconds(&self, time: f64) -> f64 {
        (time - self.epoch) * SECONDS_PER_DAY
    }

    fn polyval(coeffs: &[f64], u: f64) -> f64 {
        coeffs.iter().rev().fold(0.0, |acc, c| acc * u + c)
    }

    /// Time derivative (per second) of a polynomial in normalised time
    fn polyval_derivative(&self, coeffs: &[f64], u: f64) -> f64 {
        let derivative = coeffs
            .iter()
            .enumerate()
            .skip(1)
            .rev()
            .fold(0.0, |acc, (k, c)| acc * u + k as f64 * c);
        derivative / self.time_scale
    }

    fn state_at_offset(&self, seconds: f64) -> OrbitVector {
        let u = seconds / self.time_scale;
        OrbitVector {
            x: Self::polyval(&self.position_coeffs[0], u),
            y: Self::polyval(&self.position_coeffs[1], u),
            z: Self::polyval(&self.position_coeffs[2], u),
            vx: Self::polyval(&self.velocity_coeffs[0], u),
            vy: Self::polyval(&self.velocity_coeffs[1], u),
            vz: Self::polyval(&self.velocity_coeffs[2], u),
        }
    }

    fn acceleration_at_offset(&self, seconds: f64) -> [f64; 3] {
        let u = seconds / self.time_scale;
        [
            self.polyval_derivative(&self.velocity_coeffs[0], u),
            self.polyval_derivative(&self.velocity_coeffs[1], u),
            self.polyval_derivative(&self.velocity_coeffs[2], u),
        ]
    }

    /// Interpolated position and velocity at a time (MJD)
    pub fn get_orbit_data(&self, time: f64) -> OrbitVector {
        self.state_at_offset(self.offset_seconds(time))
    }

    /// Acceleration (m/s^2) at a time (MJD), from the velocity polynomials
    pub fn acceleration(&self, time: f64) -> [f64; 3] {
        self.acceleration_at_offset(self.offset_seconds(time))
    }

    /// Time (MJD) and state at which the target sees zero Doppler.
    ///
    /// Newton iteration on `v(t)·(P - S(t)) = 0` seeded with `initial_time`.
    /// Returns the last iterate if the iteration cap is reached.
    pub fn zero_doppler_state(&self, target: [f64; 3], initial_time: f64) -> (f64, OrbitVector) {
        let target = Vector3::from(target);
        let mut seconds = self.offset_seconds(initial_time);
        let mut converged = false;

        for _ in 0..MAX_ZERO_DOPPLER_ITERATIONS {
            let state = self.state_at_offset(seconds);
            let velocity = Vector3::from(state.velocity());
            let acceleration = Vector3::from(self.acceleration_at_offset(seconds));
            let delta = target - Vector3::from(state.position());

            let doppler = velocity.dot(&delta);
            let derivative = acceleration.dot(&delta) - velocity.norm_squared();
            if derivative == 0.0 {
                break;
            }

            let step = -doppler / derivative;
            seconds += step;

            if step.abs() < ZERO_DOPPLER_TOLERANCE {
                converged = true;
                break;
            }
        }

        if !converged {
            log::warn!(
                "Zero-Doppler time did not converge in {} iterations",
                MAX_ZERO_DOPPLER_ITERATIONS
            );
        }

        let time = self.epoch + seconds / SECONDS_PER_DAY;
        if !self.is_within_fitted_span(time) {
            log::warn!(
                "Zero-Doppler time {:.8} outside fitted orbit span [{:.8}, {:.8}]",
                time,
                self.span.0,
                self.span.1
            );
        }

        (time, self.state_at_offset(seconds))
    }

    /// Zero-Doppler time (MJD) of a target
    pub fn zero_doppler_time(&self, target: [f64; 3], initial_time: f64) -> f64 {
        self.zero_doppler_state(target, initial_time).0
    }

    /// Geolocate a fractional line and pixel of `acquisition` at `height`
    /// meters above the ellipsoid (ECEF meters).
    ///
    /// The satellite is taken at the azimuth time of the line and the
    /// iteration starts from the annotated scene centre.
    pub fn lph2xyz(
        &self,
        acquisition: &Acquisition,
        line: f64,
        pixel: f64,
        height: f64,
        ellipsoid: Ellipsoid,
    ) -> [f64; 3] {
        let state = self.get_orbit_data(acquisition.line_to_azimuth_time(line));
        let range_time = acquisition.pixel_to_range_time(pixel);
        let initial = geo2xyz(
            acquisition.scene_center.lat,
            acquisition.scene_center.lon,
            height,
            ellipsoid,
        );
        let xyz = compute_accurate_xyz_at_height(&state, initial, range_time, height, ellipsoid);

        let residual = geolocation_residuals_at_height(&state, xyz, range_time, height, ellipsoid);
        if !residual.is_converged() {
            log::warn!(
                "{}: geolocation of line {:.2} pixel {:.2} left residuals {:?}",
                acquisition.id,
                line,
                pixel,
                residual
            );
        }
        xyz
    }

    /// Fractional (line, pixel) at which `acquisition` images an ECEF target
    pub fn xyz2lp(&self, acquisition: &Acquisition, xyz: [f64; 3]) -> (f64, f64) {
        let (azimuth_time, state) = self.zero_doppler_state(xyz, acquisition.center_time());
        let range = (Vector3::from(xyz) - Vector3::from(state.position())).norm();
        let range_time = 2.0 * range / SPEED_OF_LIGHT;

        (
            acquisition.azimuth_time_to_line(azimuth_time),
            acquisition.range_time_to_pixel(range_time),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::test_fixtures::synthetic_acquisition;
    use approx::assert_abs_diff_eq;

    const EPOCH: f64 = 59000.25;
    const RADIUS: f64 = 7_071_000.0;

    fn angular_rate() -> f64 {
        (3.986_004_418e14 / RADIUS.powi(3)).sqrt()
    }

    /// Polar circular orbit crossing the equator at longitude 0 at EPOCH
    fn circular_state(seconds: f64) -> StateVector {
        let omega = angular_rate();
        let theta = omega * seconds;
        StateVector::new(
            EPOCH + seconds / SECONDS_PER_DAY,
            [RADIUS * theta.cos(), 0.0, RADIUS * theta.sin()],
            [-RADIUS * omega * theta.sin(), 0.0, RADIUS * omega * theta.cos()],
        )
    }

    fn circular_orbit_vectors() -> Vec<StateVector> {
        (-3..=3).map(|k| circular_state(10.0 * k as f64)).collect()
    }

    #[test]
    fn test_insufficient_state_vectors() {
        let svs: Vec<StateVector> = (0..3).map(|k| circular_state(10.0 * k as f64)).collect();
        let result = Orbit::new(&svs, 3);
        assert_eq!(
            result.unwrap_err(),
            StackError::InsufficientData { num_state_vectors: 3, degree: 3 }
        );
    }

    #[test]
    fn test_non_increasing_times_rejected() {
        let mut svs = circular_orbit_vectors();
        svs.swap(2, 3);
        assert!(matches!(Orbit::new(&svs, 3), Err(StackError::InvalidOrbit(_))));
    }

    #[test]
    fn test_cubic_trajectory_reproduced() {
        // positions exactly cubic in time must be reproduced by a degree 3 fit
        let position = |t: f64| [1.0e6 + 7000.0 * t, -2.0e5 + 3.0 * t * t, 5.0e5 - 0.01 * t.powi(3)];
        let velocity = |t: f64| [7000.0, 6.0 * t, -0.03 * t * t];

        let svs: Vec<StateVector> = (0..8)
            .map(|k| {
                let t = 10.0 * k as f64;
                StateVector::new(EPOCH + t / SECONDS_PER_DAY, position(t), velocity(t))
            })
            .collect();
        let orbit = Orbit::new(&svs, 3).unwrap();

        let t = 33.3;
        let state = orbit.get_orbit_data(EPOCH + t / SECONDS_PER_DAY);
        let expected = position(t);
        let expected_velocity = velocity(t);
        for k in 0..3 {
            assert_abs_diff_eq!(state.position()[k], expected[k], epsilon = 1e-4);
            assert_abs_diff_eq!(state.velocity()[k], expected_velocity[k], epsilon = 1e-6);
        }

        let acceleration = orbit.acceleration(EPOCH + t / SECONDS_PER_DAY);
        assert_abs_diff_eq!(acceleration[1], 6.0, epsilon = 1e-6);
        assert_abs_diff_eq!(acceleration[2], -0.06 * t, epsilon = 1e-6);
    }

    #[test]
    fn test_circular_orbit_interpolation() {
        let orbit = Orbit::new(&circular_orbit_vectors(), DEFAULT_POLYNOMIAL_DEGREE).unwrap();

        let truth = circular_state(5.0);
        let state = orbit.get_orbit_data(truth.time);
        for k in 0..3 {
            assert_abs_diff_eq!(state.position()[k], truth.position[k], epsilon = 1.0);
            assert_abs_diff_eq!(state.velocity()[k], truth.velocity[k], epsilon = 1e-2);
        }
        assert!(orbit.is_within_fitted_span(truth.time));
    }

    #[test]
    fn test_extrapolation_is_allowed() {
        let orbit = Orbit::new(&circular_orbit_vectors(), DEFAULT_POLYNOMIAL_DEGREE).unwrap();
        let time = EPOCH + 120.0 / SECONDS_PER_DAY;
        assert!(!orbit.is_within_fitted_span(time));

        let state = orbit.get_orbit_data(time);
        assert!(state.position().iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_zero_doppler_time() {
        let orbit = Orbit::new(&circular_orbit_vectors(), DEFAULT_POLYNOMIAL_DEGREE).unwrap();

        // target 3 degrees east on the equator is broadside at EPOCH
        let target = geo2xyz(0.0, 3.0, 0.0, Ellipsoid::WGS84);
        let initial = EPOCH + 0.8 / SECONDS_PER_DAY;
        let (time, state) = orbit.zero_doppler_state(target, initial);

        assert_abs_diff_eq!((time - EPOCH) * SECONDS_PER_DAY, 0.0, epsilon = 1e-4);
        assert_abs_diff_eq!(state.z, 0.0, epsilon = 1.0);
    }

    #[test]
    fn test_zero_doppler_without_root_returns_last_iterate() {
        // a satellite parked at a fixed position but annotated with a constant
        // velocity: the Doppler of any off-track target never changes
        let svs: Vec<StateVector> = (0..6)
            .map(|k| {
                let t = 10.0 * k as f64;
                StateVector::new(EPOCH + t / SECONDS_PER_DAY, [RADIUS, 0.0, 0.0], [0.0, 0.0, 7500.0])
            })
            .collect();
        let orbit = Orbit::new(&svs, DEFAULT_POLYNOMIAL_DEGREE).unwrap();

        let target = [RADIUS - 700_000.0, 0.0, 1000.0];
        let initial = EPOCH + 20.0 / SECONDS_PER_DAY;
        let (time, state) = orbit.zero_doppler_state(target, initial);

        assert!(time.is_finite());
        assert!(state.position().iter().all(|v| v.is_finite()));
        // every Newton step is 1000 m / 7500 m/s
        let expected = MAX_ZERO_DOPPLER_ITERATIONS as f64 * 1000.0 / 7500.0;
        assert_abs_diff_eq!((time - initial) * SECONDS_PER_DAY, expected, epsilon = 1e-4);

        let delta = Vector3::from(target) - Vector3::from(state.position());
        assert!(Vector3::from(state.velocity()).dot(&delta).abs() > 1.0e6);
    }

    #[test]
    fn test_line_pixel_geocoding_round_trip() {
        let acquisition = synthetic_acquisition("A", 0.0, 0.0, 0.0);
        let orbit = Orbit::new(&acquisition.state_vectors, DEFAULT_POLYNOMIAL_DEGREE).unwrap();

        for (line, pixel, height) in [(500.0, 1000.0, 0.0), (120.5, 1730.25, 850.0), (910.0, 40.0, -30.0)] {
            let xyz = orbit.lph2xyz(&acquisition, line, pixel, height, Ellipsoid::WGS84);

            let state = orbit.get_orbit_data(acquisition.line_to_azimuth_time(line));
            let range_time = acquisition.pixel_to_range_time(pixel);
            assert!(geolocation_residuals_at_height(&state, xyz, range_time, height, Ellipsoid::WGS84).is_converged());

            let (line_back, pixel_back) = orbit.xyz2lp(&acquisition, xyz);
            assert_abs_diff_eq!(line_back, line, epsilon = 1e-2);
            assert_abs_diff_eq!(pixel_back, pixel, epsilon = 1e-2);
        }
    }
}
