//! Ellipsoid conversions, Newton geolocation refinement and Vincenty geodesics

use crate::core::orbit::OrbitVector;
use crate::types::{GeoPos, SPEED_OF_LIGHT};
use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};

/// Maximum Newton iterations for geolocation refinement
const MAX_GEOLOCATION_ITERATIONS: usize = 10;

/// Absolute residual tolerance for geolocation refinement
const GEOLOCATION_TOLERANCE: f64 = 1.0e-3;

/// Convergence criterion on longitude difference for the inverse geodesic (radians)
const VINCENTY_LAMBDA_TOLERANCE: f64 = 0.01;

/// Convergence criterion on arc length for the direct geodesic (radians)
const VINCENTY_SIGMA_TOLERANCE: f64 = 1.0e-12;

/// Points closer than this (degrees) are treated as coincident
const COINCIDENT_TOLERANCE_DEG: f64 = 1.0e-5;

const VINCENTY_MAX_ITERATIONS: usize = 100;

/// Reference ellipsoids
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Ellipsoid {
    #[default]
    WGS84,
    GRS80,
}

impl Ellipsoid {
    /// Semi-major axis (meters)
    pub fn semi_major_axis(&self) -> f64 {
        6_378_137.0
    }

    /// Inverse flattening
    pub fn inverse_flattening(&self) -> f64 {
        match self {
            Ellipsoid::WGS84 => 298.257_223_563,
            Ellipsoid::GRS80 => 298.257_222_101,
        }
    }

    pub fn flattening(&self) -> f64 {
        1.0 / self.inverse_flattening()
    }

    /// Semi-minor axis (meters)
    pub fn semi_minor_axis(&self) -> f64 {
        self.semi_major_axis() * (1.0 - self.flattening())
    }

    /// First eccentricity squared
    pub fn e2(&self) -> f64 {
        let f = self.flattening();
        f * (2.0 - f)
    }

    /// Second eccentricity squared
    pub fn ep2(&self) -> f64 {
        let a = self.semi_major_axis();
        let b = self.semi_minor_axis();
        (a * a - b * b) / (b * b)
    }
}

/// Convert geodetic latitude/longitude (degrees) and height (meters) to
/// Earth-centred Cartesian coordinates (meters)
pub fn geo2xyz(lat: f64, lon: f64, height: f64, ellipsoid: Ellipsoid) -> [f64; 3] {
    let a = ellipsoid.semi_major_axis();
    let e2 = ellipsoid.e2();

    let lat_rad = lat.to_radians();
    let lon_rad = lon.to_radians();
    let sin_lat = lat_rad.sin();
    let cos_lat = lat_rad.cos();

    let n = a / (1.0 - e2 * sin_lat * sin_lat).sqrt();

    let x = (n + height) * cos_lat * lon_rad.cos();
    let y = (n + height) * cos_lat * lon_rad.sin();
    let z = ((1.0 - e2) * n + height) * sin_lat;

    [x, y, z]
}

/// Convert Earth-centred Cartesian coordinates (meters) to geodetic
/// latitude/longitude (degrees) using Bowring's closed form.
///
/// Height is not recovered.
pub fn xyz2geo(xyz: [f64; 3], ellipsoid: Ellipsoid) -> GeoPos {
    let [x, y, z] = xyz;
    let a = ellipsoid.semi_major_axis();
    let b = ellipsoid.semi_minor_axis();
    let e2 = ellipsoid.e2();
    let ep2 = ellipsoid.ep2();

    let s = (x * x + y * y).sqrt();
    let theta = (z * a / (s * b)).atan();
    let sin_theta = theta.sin();
    let cos_theta = theta.cos();

    let lat = (z + ep2 * b * sin_theta.powi(3)).atan2(s - e2 * a * cos_theta.powi(3));

    let mut lon = if s == 0.0 { 0.0 } else { (y / x).atan() };
    // atan(y/x) only covers two quadrants
    if lon < 0.0 && y >= 0.0 {
        lon += std::f64::consts::PI;
    } else if lon > 0.0 && y < 0.0 {
        lon -= std::f64::consts::PI;
    }

    GeoPos::new(lat.to_degrees(), lon.to_degrees())
}

/// Residuals of the three geolocation equations at a candidate target position.
///
/// `doppler` is in m^2/s, `range` and `ellipsoid` in meters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeolocationResidual {
    pub doppler: f64,
    pub range: f64,
    pub ellipsoid: f64,
}

impl GeolocationResidual {
    pub fn is_converged(&self) -> bool {
        self.doppler.abs() < GEOLOCATION_TOLERANCE
            && self.range.abs() < GEOLOCATION_TOLERANCE
            && self.ellipsoid.abs() < GEOLOCATION_TOLERANCE
    }
}

/// Evaluate the zero-Doppler, range and ellipsoid equations for a target
pub fn geolocation_residuals(
    state: &OrbitVector,
    xyz: [f64; 3],
    slant_range_time: f64,
    ellipsoid: Ellipsoid,
) -> GeolocationResidual {
    geolocation_residuals_at_height(state, xyz, slant_range_time, 0.0, ellipsoid)
}

/// Residuals against the ellipsoid inflated by `height` meters
pub fn geolocation_residuals_at_height(
    state: &OrbitVector,
    xyz: [f64; 3],
    slant_range_time: f64,
    height: f64,
    ellipsoid: Ellipsoid,
) -> GeolocationResidual {
    let a = ellipsoid.semi_major_axis() + height;
    let b = ellipsoid.semi_minor_axis() + height;
    let target = Vector3::from(xyz);
    let delta = target - Vector3::from(state.position());

    let surface = (xyz[0] * xyz[0] + xyz[1] * xyz[1]) / (a * a) + xyz[2] * xyz[2] / (b * b) - 1.0;

    GeolocationResidual {
        doppler: Vector3::from(state.velocity()).dot(&delta),
        range: delta.norm() - 0.5 * SPEED_OF_LIGHT * slant_range_time,
        // first-order height error of the surface equation
        ellipsoid: 0.5 * a * surface,
    }
}

/// Refine a target position with Newton's method on the zero-Doppler,
/// range and ellipsoid equations.
///
/// Stops once all residuals are below tolerance or after
/// `MAX_GEOLOCATION_ITERATIONS`; the last iterate is returned either way.
/// Use [`geolocation_residuals`] to check convergence.
pub fn compute_accurate_xyz(
    state: &OrbitVector,
    initial_xyz: [f64; 3],
    slant_range_time: f64,
    ellipsoid: Ellipsoid,
) -> [f64; 3] {
    compute_accurate_xyz_at_height(state, initial_xyz, slant_range_time, 0.0, ellipsoid)
}

/// Newton geolocation of a target `height` meters above the ellipsoid
pub fn compute_accurate_xyz_at_height(
    state: &OrbitVector,
    initial_xyz: [f64; 3],
    slant_range_time: f64,
    height: f64,
    ellipsoid: Ellipsoid,
) -> [f64; 3] {
    let a = ellipsoid.semi_major_axis() + height;
    let b = ellipsoid.semi_minor_axis() + height;
    let satellite = Vector3::from(state.position());
    let velocity = Vector3::from(state.velocity());

    let mut xyz = initial_xyz;

    for iteration in 0..MAX_GEOLOCATION_ITERATIONS {
        let residual = geolocation_residuals_at_height(state, xyz, slant_range_time, height, ellipsoid);
        if residual.is_converged() {
            log::debug!("Geolocation converged after {} iterations", iteration);
            return xyz;
        }

        let delta = Vector3::from(xyz) - satellite;
        let range = delta.norm();
        if range == 0.0 {
            log::warn!("Geolocation target coincides with satellite position");
            return xyz;
        }
        let unit = delta / range;

        let jacobian = Matrix3::new(
            velocity.x, velocity.y, velocity.z,
            unit.x, unit.y, unit.z,
            xyz[0] / a, xyz[1] / a, a * xyz[2] / (b * b),
        );
        let rhs = -Vector3::new(residual.doppler, residual.range, residual.ellipsoid);

        match jacobian.lu().solve(&rhs) {
            Some(step) => {
                xyz[0] += step.x;
                xyz[1] += step.y;
                xyz[2] += step.z;
            }
            None => {
                log::warn!("Singular geolocation Jacobian at iteration {}", iteration);
                return xyz;
            }
        }
    }

    let residual = geolocation_residuals_at_height(state, xyz, slant_range_time, height, ellipsoid);
    if !residual.is_converged() {
        log::warn!(
            "Geolocation did not converge in {} iterations: residuals {:?}",
            MAX_GEOLOCATION_ITERATIONS,
            residual
        );
    }
    xyz
}

/// Earth model used by the Vincenty routines
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum GeodesicModel {
    /// Sphere with the WGS84 equatorial radius (zero flattening)
    #[default]
    Sphere,
    Ellipsoid(Ellipsoid),
}

impl GeodesicModel {
    fn axes(&self) -> (f64, f64) {
        match self {
            GeodesicModel::Sphere => (Ellipsoid::WGS84.semi_major_axis(), 0.0),
            GeodesicModel::Ellipsoid(e) => (e.semi_major_axis(), e.flattening()),
        }
    }
}

/// Result of the direct geodesic problem
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatLonHeading {
    pub lat: f64,
    pub lon: f64,
    /// Heading at the destination pointing back to the start (degrees)
    pub heading: f64,
}

/// Result of the inverse geodesic problem
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DistanceHeading {
    /// Distance in meters
    pub distance: f64,
    /// Heading at the first point towards the second (degrees), -1 if undefined
    pub heading1: f64,
    /// Heading at the second point back towards the first (degrees), -1 if undefined
    pub heading2: f64,
}

fn normalize_heading(degrees: f64) -> f64 {
    degrees.rem_euclid(360.0)
}

fn normalize_longitude(degrees: f64) -> f64 {
    let lon = (degrees + 180.0).rem_euclid(360.0) - 180.0;
    if lon == -180.0 && degrees > 0.0 {
        180.0
    } else {
        lon
    }
}

/// Destination reached from `pos` after `distance` meters along `heading` (degrees)
pub fn vincenty_direct(pos: GeoPos, distance: f64, heading: f64, model: GeodesicModel) -> LatLonHeading {
    let (a, f) = model.axes();
    let b = a * (1.0 - f);

    let alpha1 = heading.to_radians();
    let sin_alpha1 = alpha1.sin();
    let cos_alpha1 = alpha1.cos();

    let tan_u1 = (1.0 - f) * pos.lat.to_radians().tan();
    let cos_u1 = 1.0 / (1.0 + tan_u1 * tan_u1).sqrt();
    let sin_u1 = tan_u1 * cos_u1;

    let sigma1 = tan_u1.atan2(cos_alpha1);
    let sin_alpha = cos_u1 * sin_alpha1;
    let cos2_alpha = 1.0 - sin_alpha * sin_alpha;
    let u2 = cos2_alpha * (a * a - b * b) / (b * b);
    let big_a = 1.0 + u2 / 16384.0 * (4096.0 + u2 * (-768.0 + u2 * (320.0 - 175.0 * u2)));
    let big_b = u2 / 1024.0 * (256.0 + u2 * (-128.0 + u2 * (74.0 - 47.0 * u2)));

    let mut sigma = distance / (b * big_a);
    let mut cos_2sigma_m;
    let mut sin_sigma;
    let mut cos_sigma;
    let mut iterations = 0;
    loop {
        cos_2sigma_m = (2.0 * sigma1 + sigma).cos();
        sin_sigma = sigma.sin();
        cos_sigma = sigma.cos();
        let delta_sigma = big_b
            * sin_sigma
            * (cos_2sigma_m
                + big_b / 4.0
                    * (cos_sigma * (-1.0 + 2.0 * cos_2sigma_m * cos_2sigma_m)
                        - big_b / 6.0
                            * cos_2sigma_m
                            * (-3.0 + 4.0 * sin_sigma * sin_sigma)
                            * (-3.0 + 4.0 * cos_2sigma_m * cos_2sigma_m)));
        let previous = sigma;
        sigma = distance / (b * big_a) + delta_sigma;
        iterations += 1;
        if (sigma - previous).abs() < VINCENTY_SIGMA_TOLERANCE || iterations >= VINCENTY_MAX_ITERATIONS {
            break;
        }
    }
    cos_2sigma_m = (2.0 * sigma1 + sigma).cos();
    sin_sigma = sigma.sin();
    cos_sigma = sigma.cos();

    let tmp = sin_u1 * sin_sigma - cos_u1 * cos_sigma * cos_alpha1;
    let lat2 = (sin_u1 * cos_sigma + cos_u1 * sin_sigma * cos_alpha1)
        .atan2((1.0 - f) * (sin_alpha * sin_alpha + tmp * tmp).sqrt());
    let lambda = (sin_sigma * sin_alpha1).atan2(cos_u1 * cos_sigma - sin_u1 * sin_sigma * cos_alpha1);
    let c = f / 16.0 * cos2_alpha * (4.0 + f * (4.0 - 3.0 * cos2_alpha));
    let l = lambda
        - (1.0 - c)
            * f
            * sin_alpha
            * (sigma + c * sin_sigma * (cos_2sigma_m + c * cos_sigma * (-1.0 + 2.0 * cos_2sigma_m * cos_2sigma_m)));

    let alpha2 = sin_alpha.atan2(-tmp);

    LatLonHeading {
        lat: lat2.to_degrees(),
        lon: normalize_longitude(pos.lon + l.to_degrees()),
        heading: normalize_heading(alpha2.to_degrees() + 180.0),
    }
}

/// Distance (meters) and headings between two positions.
///
/// Coincident points give distance 0 and headings of -1 (undefined).
pub fn vincenty_inverse(pos1: GeoPos, pos2: GeoPos, model: GeodesicModel) -> DistanceHeading {
    if (pos1.lat - pos2.lat).abs() < COINCIDENT_TOLERANCE_DEG
        && (pos1.lon - pos2.lon).abs() < COINCIDENT_TOLERANCE_DEG
    {
        return DistanceHeading {
            distance: 0.0,
            heading1: -1.0,
            heading2: -1.0,
        };
    }

    let (a, f) = model.axes();
    let b = a * (1.0 - f);

    let l = (pos2.lon - pos1.lon).to_radians();
    let u1 = ((1.0 - f) * pos1.lat.to_radians().tan()).atan();
    let u2 = ((1.0 - f) * pos2.lat.to_radians().tan()).atan();
    let (sin_u1, cos_u1) = u1.sin_cos();
    let (sin_u2, cos_u2) = u2.sin_cos();

    let mut lambda = l;
    let mut sin_sigma;
    let mut cos_sigma;
    let mut sigma;
    let mut cos2_alpha;
    let mut cos_2sigma_m;
    let mut iterations = 0;
    loop {
        let (sin_lambda, cos_lambda) = lambda.sin_cos();
        let t1 = cos_u2 * sin_lambda;
        let t2 = cos_u1 * sin_u2 - sin_u1 * cos_u2 * cos_lambda;
        sin_sigma = (t1 * t1 + t2 * t2).sqrt();
        cos_sigma = sin_u1 * sin_u2 + cos_u1 * cos_u2 * cos_lambda;
        sigma = sin_sigma.atan2(cos_sigma);

        let sin_alpha = if sin_sigma == 0.0 {
            0.0
        } else {
            cos_u1 * cos_u2 * sin_lambda / sin_sigma
        };
        cos2_alpha = 1.0 - sin_alpha * sin_alpha;
        cos_2sigma_m = if cos2_alpha != 0.0 {
            cos_sigma - 2.0 * sin_u1 * sin_u2 / cos2_alpha
        } else {
            0.0 // equatorial line
        };

        let c = f / 16.0 * cos2_alpha * (4.0 + f * (4.0 - 3.0 * cos2_alpha));
        let previous = lambda;
        lambda = l
            + (1.0 - c)
                * f
                * sin_alpha
                * (sigma + c * sin_sigma * (cos_2sigma_m + c * cos_sigma * (-1.0 + 2.0 * cos_2sigma_m * cos_2sigma_m)));

        iterations += 1;
        if (lambda - previous).abs() < VINCENTY_LAMBDA_TOLERANCE || iterations >= VINCENTY_MAX_ITERATIONS {
            break;
        }
    }

    let u_sq = cos2_alpha * (a * a - b * b) / (b * b);
    let big_a = 1.0 + u_sq / 16384.0 * (4096.0 + u_sq * (-768.0 + u_sq * (320.0 - 175.0 * u_sq)));
    let big_b = u_sq / 1024.0 * (256.0 + u_sq * (-128.0 + u_sq * (74.0 - 47.0 * u_sq)));
    let delta_sigma = big_b
        * sin_sigma
        * (cos_2sigma_m
            + big_b / 4.0
                * (cos_sigma * (-1.0 + 2.0 * cos_2sigma_m * cos_2sigma_m)
                    - big_b / 6.0
                        * cos_2sigma_m
                        * (-3.0 + 4.0 * sin_sigma * sin_sigma)
                        * (-3.0 + 4.0 * cos_2sigma_m * cos_2sigma_m)));
    let distance = b * big_a * (sigma - delta_sigma);

    let (sin_lambda, cos_lambda) = lambda.sin_cos();
    let alpha1 = (cos_u2 * sin_lambda).atan2(cos_u1 * sin_u2 - sin_u1 * cos_u2 * cos_lambda);
    let alpha2 = (cos_u1 * sin_lambda).atan2(-sin_u1 * cos_u2 + cos_u1 * sin_u2 * cos_lambda);

    DistanceHeading {
        distance,
        heading1: normalize_heading(alpha1.to_degrees()),
        heading2: normalize_heading(alpha2.to_degrees() + 180.0),
    }
}
