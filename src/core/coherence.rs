use crate::types::{StackError, StackResult, SPEED_OF_LIGHT};
use serde::{Deserialize, Serialize};

/// Linear decorrelation model.
///
/// Coherence is the product of three independent terms, one per baseline:
/// `max(0, 1 - |x| / x_crit)` for the perpendicular baseline (m), temporal
/// baseline (days) and Doppler centroid difference (Hz).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CoherenceModel {
    /// Perpendicular baseline at which geometric coherence vanishes (m)
    pub critical_perpendicular_baseline: f64,
    /// Temporal baseline at which temporal coherence vanishes (days)
    pub critical_temporal_baseline: f64,
    /// Doppler difference at which Doppler coherence vanishes (Hz)
    pub critical_doppler_difference: f64,
}

impl Default for CoherenceModel {
    fn default() -> Self {
        Self {
            critical_perpendicular_baseline: 1121.0,  // m
            critical_temporal_baseline: 5.0 * 365.0,  // days
            critical_doppler_difference: 1380.0,      // Hz
        }
    }
}

impl CoherenceModel {
    /// Create a model with validated critical baselines
    pub fn new(
        critical_perpendicular_baseline: f64,
        critical_temporal_baseline: f64,
        critical_doppler_difference: f64,
    ) -> StackResult<Self> {
        let model = Self {
            critical_perpendicular_baseline,
            critical_temporal_baseline,
            critical_doppler_difference,
        };
        model.validate()?;
        Ok(model)
    }

    pub fn validate(&self) -> StackResult<()> {
        let critical = [
            ("perpendicular baseline", self.critical_perpendicular_baseline),
            ("temporal baseline", self.critical_temporal_baseline),
            ("Doppler difference", self.critical_doppler_difference),
        ];
        for (name, value) in critical {
            if !value.is_finite() || value <= 0.0 {
                return Err(StackError::InvalidParameter(format!(
                    "Critical {} must be positive, got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }

    fn linear_term(value: f64, critical: f64) -> f64 {
        if !value.is_finite() {
            return 0.0;
        }
        (1.0 - value.abs() / critical).max(0.0)
    }

    /// Modelled coherence in [0, 1], non-increasing in the magnitude of each input
    pub fn coherence(&self, perpendicular_baseline: f64, temporal_baseline: f64, doppler_difference: f64) -> f64 {
        Self::linear_term(perpendicular_baseline, self.critical_perpendicular_baseline)
            * Self::linear_term(temporal_baseline, self.critical_temporal_baseline)
            * Self::linear_term(doppler_difference, self.critical_doppler_difference)
    }
}

/// Critical perpendicular baseline (m) for a flat scene: `λ·R·tan(θ)·B_r / c`
///
/// `slant_range` in meters, `incidence_angle` in degrees, `range_bandwidth` in Hz.
pub fn critical_baseline(wavelength: f64, slant_range: f64, incidence_angle: f64, range_bandwidth: f64) -> f64 {
    wavelength * slant_range * incidence_angle.to_radians().tan() * range_bandwidth / SPEED_OF_LIGHT
}
