//! Core stack optimisation modules

pub mod geodesy;
pub mod orbit;
pub mod order_stats;
pub mod robust_filter;
pub mod sun;
pub mod coherence;
pub mod baseline;
pub mod stack;

#[cfg(test)]
pub(crate) mod test_fixtures;

// Re-export main types
pub use geodesy::{
    compute_accurate_xyz, compute_accurate_xyz_at_height, geo2xyz, geolocation_residuals,
    geolocation_residuals_at_height, vincenty_direct, vincenty_inverse, xyz2geo,
    DistanceHeading, Ellipsoid, GeodesicModel, GeolocationResidual, LatLonHeading,
};
pub use orbit::{Orbit, OrbitVector, DEFAULT_POLYNOMIAL_DEGREE};
pub use order_stats::{median, nth_element, percentile};
pub use robust_filter::{RobustFilter, RobustFilterParams};
pub use sun::{SunAngles, SunPosition};
pub use coherence::{critical_baseline, CoherenceModel};
pub use baseline::{AcquisitionGeometry, BaselineCalculator, BaselinePair, GeometryParams};
pub use stack::{
    AcquisitionSummary, AggregateStatistic, IfgStack, Role, StackOptimizer, StackOverview, StackParams,
    StackTableRow,
};
