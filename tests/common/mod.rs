//! Synthetic Sentinel-1 like acquisitions on circular polar orbits

#![allow(dead_code)]

use sarstack::core::geodesy::{geo2xyz, Ellipsoid};
use sarstack::{Acquisition, DopplerCentroid, GeoPos, StateVector};

pub const ORBIT_RADIUS: f64 = 7_071_000.0;
pub const BASE_MJD: f64 = 59_000.25;
pub const SCENE_LON: f64 = 3.0;

const GM: f64 = 3.986_004_418e14;
const C: f64 = 299_792_458.0;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Orbit crossing the equator at `center_mjd`, plane rotated east by `node_lon_rad`
pub fn circular_state_vectors(center_mjd: f64, node_lon_rad: f64) -> Vec<StateVector> {
    let omega = (GM / ORBIT_RADIUS.powi(3)).sqrt();
    (-3..=3)
        .map(|k| {
            let seconds = 10.0 * k as f64;
            let (sin_theta, cos_theta) = (omega * seconds).sin_cos();
            let (sin_node, cos_node) = node_lon_rad.sin_cos();
            StateVector::new(
                center_mjd + seconds / 86_400.0,
                [
                    ORBIT_RADIUS * cos_theta * cos_node,
                    ORBIT_RADIUS * cos_theta * sin_node,
                    ORBIT_RADIUS * sin_theta,
                ],
                [
                    -ORBIT_RADIUS * omega * sin_theta * cos_node,
                    -ORBIT_RADIUS * omega * sin_theta * sin_node,
                    ORBIT_RADIUS * omega * cos_theta,
                ],
            )
        })
        .collect()
}

/// Acquisition imaging the equator at `SCENE_LON`, `day` days after `BASE_MJD`,
/// with its orbit shifted `cross_track_offset` meters towards the scene
pub fn acquisition(id: &str, day: f64, cross_track_offset: f64) -> Acquisition {
    let center_mjd = BASE_MJD + day;
    let target = geo2xyz(0.0, SCENE_LON, 0.0, Ellipsoid::WGS84);
    let look = [ORBIT_RADIUS - target[0], -target[1], -target[2]];
    let range = (look[0].powi(2) + look[1].powi(2) + look[2].powi(2)).sqrt();
    let target_norm = (target[0].powi(2) + target[1].powi(2)).sqrt();
    let incidence = ((target[0] * look[0] + target[1] * look[1]) / (target_norm * range)).acos();

    let num_lines = 1500;
    let num_samples = 2500;
    let line_time_interval = 2.0e-3;
    let range_sampling_rate = 64.345_238e6;
    let first_line_time = center_mjd - 0.5 * num_lines as f64 * line_time_interval / 86_400.0;

    Acquisition {
        id: id.to_string(),
        mission: "SENTINEL-1A".to_string(),
        absolute_orbit: 30_639 + (day.max(0.0) as u32) * 15,
        relative_orbit: 117,
        acquisition_time: first_line_time,
        first_line_time,
        line_time_interval,
        near_range_time: 2.0 * range / C - 0.5 * num_samples as f64 / range_sampling_rate,
        range_sampling_rate,
        num_lines,
        num_samples,
        wavelength: 0.055_465_763,
        incidence_angle: incidence.to_degrees(),
        scene_center: GeoPos::new(0.0, SCENE_LON),
        doppler_centroid: DopplerCentroid::constant(0.0),
        state_vectors: circular_state_vectors(center_mjd, cross_track_offset / ORBIT_RADIUS),
    }
}
