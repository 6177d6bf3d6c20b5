//! Coefficient Design
//!
//! Turns [`FilterParameters`] into biquad coefficients. Design is the
//! expensive part of a parameter change (trigonometry per stage), so it runs
//! on a worker thread; the result is a [`CoefficientSet`] of shared,
//! reference-counted stages that the audio thread only swaps in.
//!
//! Based on the RBJ (Robert Bristow-Johnson) Audio EQ Cookbook for the
//! parametric shapes, and Butterworth pole placement for the cut cascades.

use std::f32::consts::PI;
use std::sync::Arc;

use biquad::{Coefficients, ToHertz, Type};

use crate::error::DspError;
use crate::parameters::{CutDirection, FilterKind, FilterParameters, ParametricShape};

/// Maximum number of cascaded stages (48 dB/oct cut)
pub const MAX_STAGES: usize = 4;

/// Coefficients shared between the live filter state and the release pool
pub type SharedCoefficients = Arc<Coefficients<f32>>;

/// Coefficients that leave the signal untouched
pub fn identity_coefficients() -> Coefficients<f32> {
    Coefficients {
        a1: 0.0,
        a2: 0.0,
        b0: 1.0,
        b1: 0.0,
        b2: 0.0,
    }
}

/// Compare two coefficient sets within `tolerance`
pub fn coefficients_approx_eq(a: &Coefficients<f32>, b: &Coefficients<f32>, tolerance: f32) -> bool {
    (a.a1 - b.a1).abs() <= tolerance
        && (a.a2 - b.a2).abs() <= tolerance
        && (a.b0 - b.b0).abs() <= tolerance
        && (a.b1 - b.b1).abs() <= tolerance
        && (a.b2 - b.b2).abs() <= tolerance
}

/// Ordered collection of 1-4 designed stages
///
/// Stages are stored contiguously from index 0. Moving, defaulting and
/// taking stages out never allocates, so a set can travel through a queue
/// slot and be emptied on the audio thread.
#[derive(Debug, Clone, Default)]
pub struct CoefficientSet {
    stages: [Option<SharedCoefficients>; MAX_STAGES],
}

impl CoefficientSet {
    /// Wrap a single designed stage
    pub fn single(coefficients: Coefficients<f32>) -> Self {
        let mut set = Self::default();
        set.stages[0] = Some(Arc::new(coefficients));
        set
    }

    /// Build from 1-4 designed stages
    pub fn from_stages<I>(stages: I) -> Result<Self, DspError>
    where
        I: IntoIterator<Item = Coefficients<f32>>,
    {
        let mut set = Self::default();
        let mut count = 0;
        for coefficients in stages {
            if count == MAX_STAGES {
                return Err(DspError::InvalidStageCount(count + 1));
            }
            set.stages[count] = Some(Arc::new(coefficients));
            count += 1;
        }
        if count == 0 {
            return Err(DspError::InvalidStageCount(0));
        }
        Ok(set)
    }

    /// Number of stages present
    pub fn len(&self) -> usize {
        self.stages.iter().take_while(|s| s.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.stages[0].is_none()
    }

    pub fn stage(&self, index: usize) -> Option<&SharedCoefficients> {
        self.stages.get(index).and_then(Option::as_ref)
    }

    /// Move a stage out, leaving its slot empty
    pub fn take_stage(&mut self, index: usize) -> Option<SharedCoefficients> {
        self.stages.get_mut(index).and_then(Option::take)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SharedCoefficients> {
        self.stages.iter().map_while(Option::as_ref)
    }
}

/// A pure coefficient design function
///
/// Implementations must be deterministic and free of shared mutable state:
/// the worker calls `make` from its own thread.
pub trait CoefficientDesigner: Send + Sync {
    fn make(&self, parameters: &FilterParameters) -> Result<CoefficientSet, DspError>;
}

impl<F> CoefficientDesigner for F
where
    F: Fn(&FilterParameters) -> Result<CoefficientSet, DspError> + Send + Sync,
{
    fn make(&self, parameters: &FilterParameters) -> Result<CoefficientSet, DspError> {
        self(parameters)
    }
}

/// Default designer backed by the `biquad` crate
#[derive(Debug, Clone, Copy, Default)]
pub struct BiquadDesigner;

impl BiquadDesigner {
    fn design_stage(
        filter: Type<f32>,
        parameters: &FilterParameters,
        quality: f32,
    ) -> Result<Coefficients<f32>, DspError> {
        Coefficients::<f32>::from_params(
            filter,
            parameters.sample_rate.hz(),
            parameters.frequency.hz(),
            quality,
        )
        .map_err(|_| DspError::InvalidCoefficients {
            frequency: parameters.frequency,
            sample_rate: parameters.sample_rate,
        })
    }
}

impl CoefficientDesigner for BiquadDesigner {
    fn make(&self, parameters: &FilterParameters) -> Result<CoefficientSet, DspError> {
        if !(parameters.sample_rate > 0.0) {
            return Err(DspError::InvalidSampleRate(parameters.sample_rate));
        }
        if !(parameters.frequency > 0.0) || parameters.frequency >= parameters.nyquist() {
            return Err(DspError::InvalidCoefficients {
                frequency: parameters.frequency,
                sample_rate: parameters.sample_rate,
            });
        }

        match parameters.kind {
            FilterKind::Parametric(shape) => {
                let gain = parameters.gain_db;
                let filter = match shape {
                    ParametricShape::Peak => Type::PeakingEQ(gain),
                    ParametricShape::LowShelf => Type::LowShelf(gain),
                    ParametricShape::HighShelf => Type::HighShelf(gain),
                    ParametricShape::Notch => Type::Notch,
                    ParametricShape::BandPass => Type::BandPass,
                };
                let q = parameters.quality.max(0.01);
                Self::design_stage(filter, parameters, q).map(CoefficientSet::single)
            }
            FilterKind::Cut { direction, slope } => {
                let filter = match direction {
                    CutDirection::LowCut => Type::HighPass,
                    CutDirection::HighCut => Type::LowPass,
                };
                let order = slope.order();
                let stages = (0..slope.stages())
                    .map(|k| Self::design_stage(filter, parameters, butterworth_q(order, k)))
                    .collect::<Result<Vec<_>, _>>()?;
                CoefficientSet::from_stages(stages)
            }
        }
    }
}

/// Q of biquad section `stage` in an even-order Butterworth cascade
pub fn butterworth_q(order: usize, stage: usize) -> f32 {
    let n = order as f32;
    let theta = (2.0 * stage as f32 + 1.0) * PI / (2.0 * n);
    1.0 / (2.0 * theta.cos())
}
