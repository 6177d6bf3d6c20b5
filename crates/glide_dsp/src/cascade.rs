//! Biquad Cascade
//!
//! The filter state a band's coefficients are installed into. Holds up to
//! [`MAX_STAGES`] DirectForm2Transposed sections plus the shared coefficient
//! handles that are currently live, so replaced handles can be handed to a
//! deferred release instead of being dropped in the audio callback.

use biquad::{Biquad, DirectForm2Transposed};

use crate::design::{identity_coefficients, CoefficientSet, SharedCoefficients, MAX_STAGES};

/// Mono cascade of up to four biquad stages
///
/// # Real-time Safety
/// `install`, `process_sample` and `process` perform no allocation and never
/// drop a coefficient handle; replaced handles go to the `retire` callback.
pub struct CascadeFilter {
    // DirectForm2Transposed: better numerical stability than DF1
    stages: [DirectForm2Transposed<f32>; MAX_STAGES],
    live: [Option<SharedCoefficients>; MAX_STAGES],
    active: usize,
}

impl CascadeFilter {
    /// Create a cascade with no active stages (passthrough)
    pub fn new() -> Self {
        Self {
            stages: core::array::from_fn(|_| DirectForm2Transposed::<f32>::new(identity_coefficients())),
            live: Default::default(),
            active: 0,
        }
    }

    /// Install exactly `incoming.len()` stages and disable the rest
    ///
    /// Every stage is moved out of `incoming`, leaving it empty. Each replaced
    /// live handle is passed to `retire`. Stages beyond the new count are
    /// marked inactive rather than left holding stale coefficients.
    pub fn install<F>(&mut self, incoming: &mut CoefficientSet, mut retire: F)
    where
        F: FnMut(SharedCoefficients),
    {
        let count = incoming.len();
        for i in 0..MAX_STAGES {
            let next = incoming.take_stage(i);
            if let Some(coefficients) = &next {
                self.stages[i].update_coefficients(**coefficients);
                if i >= self.active {
                    // Newly enabled stage: drop whatever it rang with last time
                    self.stages[i].reset_state();
                }
            }
            if let Some(old) = std::mem::replace(&mut self.live[i], next) {
                retire(old);
            }
        }
        self.active = count;
    }

    /// Number of stages currently processing
    pub fn active_stages(&self) -> usize {
        self.active
    }

    /// Shared handles of the live stages (inactive slots are `None`)
    pub fn live(&self) -> &[Option<SharedCoefficients>; MAX_STAGES] {
        &self.live
    }

    /// Process a single sample through the active stages
    #[inline]
    pub fn process_sample(&mut self, sample: f32) -> f32 {
        let mut x = sample;
        for stage in &mut self.stages[..self.active] {
            x = stage.run(x);
        }
        x
    }

    /// Process a mono buffer in place
    #[inline]
    pub fn process(&mut self, buffer: &mut [f32]) {
        for sample in buffer.iter_mut() {
            *sample = self.process_sample(*sample);
        }
    }

    /// Clear delay lines without touching coefficients
    pub fn reset(&mut self) {
        for stage in &mut self.stages {
            stage.reset_state();
        }
    }
}

impl Default for CascadeFilter {
    fn default() -> Self {
        Self::new()
    }
}
