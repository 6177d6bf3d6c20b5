//! Linear Parameter Smoothing
//!
//! Moves a control value toward its target over a fixed number of samples so
//! that knob drags turn into glides instead of steps. The filter link samples
//! the *current* smoothed value when it requests new coefficients, which means
//! the designed filter follows the glide path rather than jumping to the
//! destination.

/// Per-sample linear interpolator
///
/// Requires `&mut self` to advance; owned by the audio thread.
#[derive(Debug, Clone)]
pub struct LinearSmoother {
    current: f32,
    target: f32,
    step: f32,
    remaining: u32,
    ramp_samples: u32,
}

impl LinearSmoother {
    /// Create a smoother resting at `value` with no ramp
    pub fn new(value: f32) -> Self {
        Self {
            current: value,
            target: value,
            step: 0.0,
            remaining: 0,
            ramp_samples: 0,
        }
    }

    /// Set the ramp length from a duration in seconds
    ///
    /// Takes effect on the next [`set_target`](Self::set_target); a ramp in
    /// progress keeps its original length.
    pub fn set_ramp(&mut self, sample_rate: f32, seconds: f32) {
        let samples = (sample_rate.max(0.0) * seconds.max(0.0)).round();
        self.ramp_samples = samples as u32;
    }

    pub fn ramp_samples(&self) -> u32 {
        self.ramp_samples
    }

    /// Jump to `value` immediately
    pub fn reset(&mut self, value: f32) {
        self.current = value;
        self.target = value;
        self.step = 0.0;
        self.remaining = 0;
    }

    /// Start gliding from the current value toward `target`
    pub fn set_target(&mut self, target: f32) {
        if target == self.target {
            return;
        }
        self.target = target;

        if self.ramp_samples == 0 {
            self.reset(target);
            return;
        }
        self.remaining = self.ramp_samples;
        self.step = (target - self.current) / self.ramp_samples as f32;
    }

    /// Advance one sample and return the new value
    #[inline]
    pub fn next(&mut self) -> f32 {
        self.skip(1)
    }

    /// Advance `samples` at once and return the new value
    #[inline]
    pub fn skip(&mut self, samples: usize) -> f32 {
        if self.remaining == 0 {
            return self.current;
        }
        if samples as u64 >= self.remaining as u64 {
            self.current = self.target;
            self.remaining = 0;
        } else {
            // samples < remaining <= u32::MAX here
            self.current += self.step * samples as f32;
            self.remaining -= samples as u32;
        }
        self.current
    }

    pub fn current(&self) -> f32 {
        self.current
    }

    pub fn target(&self) -> f32 {
        self.target
    }

    /// Whether a glide is still in progress
    pub fn is_smoothing(&self) -> bool {
        self.remaining > 0
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }
}

impl Default for LinearSmoother {
    fn default() -> Self {
        Self::new(0.0)
    }
}
