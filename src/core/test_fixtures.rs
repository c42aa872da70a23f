//! Synthetic acquisitions on circular polar orbits.
//!
//! Every orbit crosses the equator at its scene centre time; the scene centre
//! lies on the equator 3 degrees east of the reference orbit plane. A cross-track
//! offset rotates the orbit plane eastwards (towards the scene) by
//! `offset / ORBIT_RADIUS` radians.

use crate::core::geodesy::{geo2xyz, Ellipsoid};
use crate::types::{Acquisition, DopplerCentroid, GeoPos, StateVector, SECONDS_PER_DAY, SPEED_OF_LIGHT};

pub(crate) const ORBIT_RADIUS: f64 = 7_071_000.0;
pub(crate) const BASE_MJD: f64 = 59_000.25;
pub(crate) const SCENE_LON: f64 = 3.0;

const GM: f64 = 3.986_004_418e14;
const NUM_LINES: usize = 1000;
const NUM_SAMPLES: usize = 2000;
const LINE_TIME_INTERVAL: f64 = 2.0e-3;
const RANGE_SAMPLING_RATE: f64 = 64.0e6;

pub(crate) fn circular_state_vectors(center_mjd: f64, node_lon_rad: f64) -> Vec<StateVector> {
    let omega = (GM / ORBIT_RADIUS.powi(3)).sqrt();
    (-3..=3)
        .map(|k| {
            let seconds = 10.0 * k as f64;
            let theta = omega * seconds;
            let (sin_node, cos_node) = node_lon_rad.sin_cos();
            StateVector::new(
                center_mjd + seconds / SECONDS_PER_DAY,
                [
                    ORBIT_RADIUS * theta.cos() * cos_node,
                    ORBIT_RADIUS * theta.cos() * sin_node,
                    ORBIT_RADIUS * theta.sin(),
                ],
                [
                    -ORBIT_RADIUS * omega * theta.sin() * cos_node,
                    -ORBIT_RADIUS * omega * theta.sin() * sin_node,
                    ORBIT_RADIUS * omega * theta.cos(),
                ],
            )
        })
        .collect()
}

/// Scene centre range and incidence angle (degrees) seen from the reference plane
fn scene_geometry() -> (f64, f64) {
    let target = geo2xyz(0.0, SCENE_LON, 0.0, Ellipsoid::WGS84);
    let look = [ORBIT_RADIUS - target[0], -target[1], -target[2]];
    let range = (look[0].powi(2) + look[1].powi(2) + look[2].powi(2)).sqrt();
    let target_norm = (target[0].powi(2) + target[1].powi(2) + target[2].powi(2)).sqrt();
    let cos_incidence = (target[0] * look[0] + target[1] * look[1] + target[2] * look[2]) / (target_norm * range);
    (range, cos_incidence.acos().to_degrees())
}

pub(crate) fn synthetic_acquisition(id: &str, day: f64, cross_track_offset: f64, doppler: f64) -> Acquisition {
    let center_mjd = BASE_MJD + day;
    let (range, incidence_angle) = scene_geometry();
    let center_range_time = 2.0 * range / SPEED_OF_LIGHT;
    let first_line_time = center_mjd - 0.5 * NUM_LINES as f64 * LINE_TIME_INTERVAL / SECONDS_PER_DAY;

    Acquisition {
        id: id.to_string(),
        mission: "SENTINEL-1A".to_string(),
        absolute_orbit: 30_000 + (day as u32) * 15,
        relative_orbit: 117,
        acquisition_time: first_line_time,
        first_line_time,
        line_time_interval: LINE_TIME_INTERVAL,
        near_range_time: center_range_time - 0.5 * NUM_SAMPLES as f64 / RANGE_SAMPLING_RATE,
        range_sampling_rate: RANGE_SAMPLING_RATE,
        num_lines: NUM_LINES,
        num_samples: NUM_SAMPLES,
        wavelength: 0.055_465_763,
        incidence_angle,
        scene_center: GeoPos::new(0.0, SCENE_LON),
        doppler_centroid: DopplerCentroid::constant(doppler),
        state_vectors: circular_state_vectors(center_mjd, cross_track_offset / ORBIT_RADIUS),
    }
}
