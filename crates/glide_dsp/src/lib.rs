//! Glide DSP - Filter Design Module
//!
//! This crate provides the pure, single-threaded half of the Glide pipeline:
//! - Band parameter values with approximate change detection
//! - Coefficient design for parametric bands and Butterworth cut cascades
//! - Linear parameter smoothing
//! - A biquad cascade that hot-swaps shared coefficients
//!
//! # Architecture
//!
//! Nothing here spawns threads or synchronizes. Design runs wherever the
//! caller puts it (a worker thread in `glide_core`); the cascade only swaps
//! in coefficients that were designed elsewhere, and hands the ones it
//! replaces back to the caller instead of dropping them.

mod cascade;
mod design;
mod error;
mod parameters;
mod smoother;

pub use cascade::CascadeFilter;
pub use design::{
    butterworth_q, coefficients_approx_eq, identity_coefficients, BiquadDesigner,
    CoefficientDesigner, CoefficientSet, SharedCoefficients, MAX_STAGES,
};
pub use error::DspError;
pub use parameters::{
    approx_eq, CutDirection, CutSlope, FilterKind, FilterParameters, ParametricShape,
    DEFAULT_QUALITY, PARAMETER_TOLERANCE,
};
pub use smoother::LinearSmoother;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crate_exports() {
        // Verify all public types are accessible
        let _params = FilterParameters::default();
        let _cascade = CascadeFilter::new();
        let _smoother = LinearSmoother::new(0.0);
    }
}
