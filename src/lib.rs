//! sarstack: InSAR stack overview for Sentinel-1 style acquisitions
//!
//! Fits orbit polynomials, geolocates the scene centre, computes
//! perpendicular, temporal and Doppler baselines for every acquisition pair,
//! models their coherence and selects the reference that maximises the
//! coherence of its interferogram stack.

pub mod types;
pub mod core;

// Re-export main types and functions for easier access
pub use types::{
    datetime_to_mjd, mjd_to_datetime, Acquisition, DopplerCentroid, GeoPos, StackError, StackResult,
    StateVector,
};

pub use crate::core::{BaselineCalculator, BaselinePair, IfgStack, Orbit, StackOptimizer, StackOverview, StackParams};

/// Select the optimal reference of a stack with default parameters
pub fn find_optimal_reference(acquisitions: &[Acquisition]) -> StackResult<StackOverview> {
    StackOptimizer::new().find_optimal_reference(acquisitions)
}
