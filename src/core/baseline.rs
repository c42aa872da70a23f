use crate::core::coherence::CoherenceModel;
use crate::core::geodesy::Ellipsoid;
use crate::core::orbit::{Orbit, OrbitVector, DEFAULT_POLYNOMIAL_DEGREE};
use crate::types::{Acquisition, StackError, StackResult, SECONDS_PER_DAY, SPEED_OF_LIGHT};
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

/// Parameters for per-acquisition imaging geometry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeometryParams {
    /// Degree of the orbit polynomials
    pub orbit_degree: usize,
    /// Ellipsoid of the scene centre target
    pub ellipsoid: Ellipsoid,
    /// Perpendicular baselines below this are treated as zero (meters)
    pub zero_baseline_tolerance: f64,
}

impl Default for GeometryParams {
    fn default() -> Self {
        Self {
            orbit_degree: DEFAULT_POLYNOMIAL_DEGREE,
            ellipsoid: Ellipsoid::WGS84,
            zero_baseline_tolerance: 1.0e-6,
        }
    }
}

/// Imaging geometry of one acquisition at its scene centre
#[derive(Debug, Clone)]
pub struct AcquisitionGeometry<'a> {
    pub acquisition: &'a Acquisition,
    pub orbit: Orbit,
    /// Geolocated scene centre (ECEF meters)
    pub target: [f64; 3],
    /// Zero-Doppler time of the scene centre (MJD)
    pub zero_doppler_time: f64,
    /// Satellite state at the zero-Doppler time
    pub satellite: OrbitVector,
    /// Satellite to scene centre distance (meters)
    pub slant_range: f64,
}

impl<'a> AcquisitionGeometry<'a> {
    /// Fit the orbit and geolocate the scene centre
    pub fn new(acquisition: &'a Acquisition, params: &GeometryParams) -> StackResult<Self> {
        acquisition.validate()?;
        let orbit = Orbit::new(&acquisition.state_vectors, params.orbit_degree)?;

        let center_time = acquisition.center_time();
        if !orbit.is_within_fitted_span(center_time) {
            log::warn!(
                "{}: scene centre time outside the fitted orbit span, extrapolating",
                acquisition.id
            );
        }

        let target = orbit.lph2xyz(
            acquisition,
            0.5 * acquisition.num_lines as f64,
            0.5 * acquisition.num_samples as f64,
            0.0,
            params.ellipsoid,
        );

        let (zero_doppler_time, satellite) = orbit.zero_doppler_state(target, center_time);
        let slant_range = distance(satellite.position(), target);
        if !slant_range.is_finite() || slant_range <= 0.0 {
            return Err(StackError::Numerical(format!(
                "{}: degenerate slant range {}",
                acquisition.id, slant_range
            )));
        }

        log::debug!(
            "{}: scene centre at {:.1} m slant range, zero-Doppler offset {:.6} s",
            acquisition.id,
            slant_range,
            (zero_doppler_time - center_time) * SECONDS_PER_DAY
        );

        Ok(Self {
            acquisition,
            orbit,
            target,
            zero_doppler_time,
            satellite,
            slant_range,
        })
    }

    /// Satellite state when this acquisition sees `target` at zero Doppler
    pub fn observe(&self, target: [f64; 3]) -> OrbitVector {
        self.orbit
            .zero_doppler_state(target, self.acquisition.center_time())
            .1
    }
}

/// Geometric, temporal and Doppler baselines between a reference and a secondary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaselinePair {
    pub reference_id: String,
    pub secondary_id: String,
    /// Signed perpendicular baseline (m), positive when the secondary sees the
    /// scene centre under a steeper line of sight
    pub perpendicular_baseline: f64,
    /// Range difference to the scene centre (m)
    pub parallel_baseline: f64,
    /// Distance between the two satellites (m)
    pub total_baseline: f64,
    /// Secondary minus reference acquisition time (days)
    pub temporal_baseline: f64,
    /// Doppler centroid difference at the scene centre (Hz)
    pub doppler_difference: f64,
    pub coherence: f64,
    /// Height of ambiguity (m), infinite for a zero baseline
    pub height_of_ambiguity: f64,
    /// Reference slant range to the scene centre (m)
    pub slant_range: f64,
    /// Reference look angle at the satellite (degrees)
    pub look_angle: f64,
    /// Reference incidence angle at the scene centre, from the geometry (degrees)
    pub local_incidence_angle: f64,
    /// Baseline orientation from the horizontal (degrees), NaN for a zero baseline
    pub alpha: f64,
    /// `B·cos(alpha)` (m)
    pub horizontal_baseline: f64,
    /// `B·sin(alpha)` (m)
    pub vertical_baseline: f64,
    /// Angle between the two satellite velocities (degrees)
    pub orbit_convergence: f64,
}

/// Pairwise baseline and coherence computation
#[derive(Debug, Clone, Default)]
pub struct BaselineCalculator {
    params: GeometryParams,
    coherence: CoherenceModel,
}

impl BaselineCalculator {
    pub fn new(params: GeometryParams, coherence: CoherenceModel) -> StackResult<Self> {
        coherence.validate()?;
        if !(params.zero_baseline_tolerance >= 0.0) {
            return Err(StackError::InvalidParameter(format!(
                "Zero baseline tolerance must be non-negative, got {}",
                params.zero_baseline_tolerance
            )));
        }
        Ok(Self { params, coherence })
    }

    pub fn params(&self) -> &GeometryParams {
        &self.params
    }

    pub fn coherence_model(&self) -> &CoherenceModel {
        &self.coherence
    }

    pub fn geometry<'a>(&self, acquisition: &'a Acquisition) -> StackResult<AcquisitionGeometry<'a>> {
        AcquisitionGeometry::new(acquisition, &self.params)
    }

    /// Baselines of `secondary` relative to `reference`
    pub fn compute_baseline(&self, reference: &Acquisition, secondary: &Acquisition) -> StackResult<BaselinePair> {
        let reference = self.geometry(reference)?;
        let secondary = self.geometry(secondary)?;
        Ok(self.compare(&reference, &secondary))
    }

    /// Baselines between two precomputed geometries.
    ///
    /// Both satellites are taken at their zero-Doppler times for the
    /// reference scene centre P. With M the reference and S the secondary
    /// position, `Bpar = |M - P| - |S - P|` and `Bperp = sqrt(B^2 - Bpar^2)`.
    /// The orientation `alpha = theta - atan2(Bpar, Bperp)` uses the reference
    /// look angle `theta` and splits B into horizontal and vertical parts.
    pub fn compare(&self, reference: &AcquisitionGeometry, secondary: &AcquisitionGeometry) -> BaselinePair {
        let ref_acq = reference.acquisition;
        let sec_acq = secondary.acquisition;

        let target = Vector3::from(reference.target);
        let master = Vector3::from(reference.satellite.position());
        let slave_state = secondary.observe(reference.target);
        let slave = Vector3::from(slave_state.position());

        let total_baseline = (slave - master).norm();
        let slave_range = (slave - target).norm();
        let parallel_baseline = reference.slant_range - slave_range;

        let bperp_squared = total_baseline * total_baseline - parallel_baseline * parallel_baseline;
        let bperp_magnitude = if bperp_squared > 0.0 { bperp_squared.sqrt() } else { 0.0 };

        // compare look angles measured from the reference radial direction
        let reference_look = master.angle(&(master - target));
        let secondary_look = master.angle(&(slave - target));
        let perpendicular_baseline = if bperp_magnitude == 0.0 || reference_look > secondary_look {
            bperp_magnitude
        } else {
            -bperp_magnitude
        };

        // alpha is undefined without a baseline; both components are zero then
        let alpha = if parallel_baseline == 0.0 && perpendicular_baseline == 0.0 {
            f64::NAN
        } else {
            reference_look - parallel_baseline.atan2(perpendicular_baseline)
        };
        let (horizontal_baseline, vertical_baseline) = if total_baseline == 0.0 {
            (0.0, 0.0)
        } else {
            (total_baseline * alpha.cos(), total_baseline * alpha.sin())
        };
        let local_incidence = target.angle(&(master - target));
        let orbit_convergence = Vector3::from(reference.satellite.velocity())
            .angle(&Vector3::from(slave_state.velocity()));

        let temporal_baseline = sec_acq.acquisition_time - ref_acq.acquisition_time;

        let ref_doppler = ref_acq.doppler_centroid_at(2.0 * reference.slant_range / SPEED_OF_LIGHT);
        let sec_doppler = sec_acq.doppler_centroid_at(2.0 * slave_range / SPEED_OF_LIGHT);
        let doppler_difference = (ref_doppler - sec_doppler).abs();

        let height_of_ambiguity = if perpendicular_baseline.abs() < self.params.zero_baseline_tolerance {
            f64::INFINITY
        } else {
            ref_acq.wavelength * reference.slant_range * ref_acq.incidence_angle.to_radians().sin()
                / (2.0 * perpendicular_baseline)
        };

        let coherence = self
            .coherence
            .coherence(perpendicular_baseline, temporal_baseline, doppler_difference);

        log::debug!(
            "{} -> {}: Bperp {:.2} m, Btemp {:.2} d, dfDC {:.2} Hz, coherence {:.4}",
            ref_acq.id,
            sec_acq.id,
            perpendicular_baseline,
            temporal_baseline,
            doppler_difference,
            coherence
        );

        BaselinePair {
            reference_id: ref_acq.id.clone(),
            secondary_id: sec_acq.id.clone(),
            perpendicular_baseline,
            parallel_baseline,
            total_baseline,
            temporal_baseline,
            doppler_difference,
            coherence,
            height_of_ambiguity,
            slant_range: reference.slant_range,
            look_angle: reference_look.to_degrees(),
            local_incidence_angle: local_incidence.to_degrees(),
            alpha: alpha.to_degrees(),
            horizontal_baseline,
            vertical_baseline,
            orbit_convergence: orbit_convergence.to_degrees(),
        }
    }
}

fn distance(a: [f64; 3], b: [f64; 3]) -> f64 {
    (Vector3::from(a) - Vector3::from(b)).norm()
}
