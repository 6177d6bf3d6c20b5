//! Filter Link
//!
//! One band of the pipeline, owned by the audio thread. Each block it:
//!
//! 1. compares incoming parameters against the previous ones and retargets
//!    the smoothers that changed,
//! 2. forwards the current smoothed values to its [`CoefficientWorker`],
//! 3. swaps in the newest designed coefficients (older ones are retired),
//! 4. runs the biquad cascade.
//!
//! Every coefficient handle the link lets go of goes to the [`ReleasePool`],
//! so nothing is freed on the audio thread.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use glide_dsp::{
    CascadeFilter, CoefficientDesigner, CoefficientSet, FilterParameters, LinearSmoother,
    SharedCoefficients, MAX_STAGES,
};

use crate::config::PipelineConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::release_pool::ReleasePool;
use crate::worker::CoefficientWorker;

/// Smoothed, hot-swapping biquad band
pub struct FilterLink {
    parameters: FilterParameters,
    worker: CoefficientWorker,
    pool: Arc<ReleasePool>,

    frequency: LinearSmoother,
    quality: LinearSmoother,
    gain: LinearSmoother,
    smoothing_seconds: f32,

    recompute: AtomicBool,
    filter: CascadeFilter,
    /// Receives sets from the outbound queue; always empty between blocks
    scratch: CoefficientSet,
}

impl FilterLink {
    /// Build a link and install coefficients for `initial`
    ///
    /// Designs the first set synchronously and spawns the worker thread, so
    /// call it during setup, not from the audio callback.
    pub fn new(
        initial: FilterParameters,
        designer: Arc<dyn CoefficientDesigner>,
        pool: Arc<ReleasePool>,
        config: &PipelineConfig,
    ) -> PipelineResult<Self> {
        config.link.validate().map_err(PipelineError::ConfigError)?;

        let mut first = designer.make(&initial)?;
        let worker = CoefficientWorker::spawn(designer, &config.worker)?;

        let mut filter = CascadeFilter::new();
        filter.install(&mut first, |c| pool.add(c));

        let smoothing_seconds = config.link.smoothing_seconds;
        let smoother = |value: f32| {
            let mut s = LinearSmoother::new(value);
            s.set_ramp(initial.sample_rate, smoothing_seconds);
            s
        };

        Ok(Self {
            parameters: initial,
            worker,
            frequency: smoother(initial.frequency),
            quality: smoother(initial.quality),
            gain: smoother(initial.gain_db),
            smoothing_seconds,
            pool,
            recompute: AtomicBool::new(false),
            filter,
            scratch: CoefficientSet::default(),
        })
    }

    /// Take a new parameter set for this band
    ///
    /// Does nothing if `parameters` approximately equals the current set.
    pub fn update_parameters(&mut self, parameters: &FilterParameters) {
        if parameters.approx_eq(&self.parameters) {
            return;
        }
        let previous = self.parameters;
        self.parameters = *parameters;

        if !glide_dsp::approx_eq(previous.sample_rate, parameters.sample_rate) {
            for smoother in [&mut self.frequency, &mut self.quality, &mut self.gain] {
                smoother.set_ramp(parameters.sample_rate, self.smoothing_seconds);
            }
        }
        if parameters.frequency_changed(&previous) {
            self.frequency.set_target(parameters.frequency);
        }
        if parameters.quality_changed(&previous) {
            self.quality.set_target(parameters.quality);
        }
        if parameters.gain_changed(&previous) {
            self.gain.set_target(parameters.gain_db);
        }

        self.recompute.store(true, Ordering::Release);
    }

    /// Per-block bookkeeping before processing `num_samples`
    ///
    /// Wait-free and allocation-free. Skipped entirely while bypassed.
    ///
    /// # Panics
    /// Panics if the coefficient queue reports elements it cannot deliver,
    /// or if the parameter queue overflows.
    pub fn update_block(&mut self, num_samples: usize) {
        if self.parameters.bypass {
            return;
        }

        if self
            .recompute
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Relaxed)
            .is_ok()
        {
            self.worker.change_parameters(self.smoothed_parameters());
        }

        let outbound = self.worker.outbound();
        let mut available = outbound.available_for_read();

        // Only the newest design matters; retire everything older unseen
        while available > 1 {
            let swapped = outbound.exchange(&mut self.scratch);
            assert!(swapped, "Coefficient queue lost an element");
            for i in 0..MAX_STAGES {
                if let Some(stale) = self.scratch.take_stage(i) {
                    self.pool.add_realtime(stale);
                }
            }
            available -= 1;
        }

        if available == 1 {
            let swapped = outbound.exchange(&mut self.scratch);
            assert!(swapped, "Coefficient queue lost an element");
            let pool = &self.pool;
            self.filter.install(&mut self.scratch, |replaced| pool.add_realtime(replaced));
        }

        let moved = self.is_smoothing();
        for smoother in [&mut self.frequency, &mut self.quality, &mut self.gain] {
            smoother.skip(num_samples);
        }
        // A glide that moved this block (including its final step) needs one more design
        if moved {
            self.recompute.store(true, Ordering::Release);
        }
    }

    /// Filter a buffer in place; untouched while bypassed
    #[inline]
    pub fn process(&mut self, buffer: &mut [f32]) {
        if !self.parameters.bypass {
            self.filter.process(buffer);
        }
    }

    /// Filter one sample; passthrough while bypassed
    #[inline]
    pub fn process_sample(&mut self, sample: f32) -> f32 {
        if self.parameters.bypass {
            sample
        } else {
            self.filter.process_sample(sample)
        }
    }

    /// Update, refresh and process one block
    pub fn run_block(&mut self, parameters: &FilterParameters, buffer: &mut [f32]) {
        self.update_parameters(parameters);
        self.update_block(buffer.len());
        self.process(buffer);
    }

    /// Most recent parameters given to the link
    pub fn parameters(&self) -> &FilterParameters {
        &self.parameters
    }

    /// Current parameters with the smoothed frequency, quality and gain
    pub fn smoothed_parameters(&self) -> FilterParameters {
        FilterParameters {
            frequency: self.frequency.current(),
            quality: self.quality.current(),
            gain_db: self.gain.current(),
            ..self.parameters
        }
    }

    pub fn active_stages(&self) -> usize {
        self.filter.active_stages()
    }

    /// Coefficient handles of the live stages
    pub fn live_coefficients(&self) -> &[Option<SharedCoefficients>; MAX_STAGES] {
        self.filter.live()
    }

    pub fn is_smoothing(&self) -> bool {
        self.frequency.is_smoothing() || self.quality.is_smoothing() || self.gain.is_smoothing()
    }

    /// Whether a design request will be sent on the next block
    pub fn recompute_pending(&self) -> bool {
        self.recompute.load(Ordering::Acquire)
    }

    pub fn worker(&self) -> &CoefficientWorker {
        &self.worker
    }
}

impl std::fmt::Debug for FilterLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilterLink")
            .field("parameters", &self.parameters)
            .field("active_stages", &self.active_stages())
            .field("smoothing", &self.is_smoothing())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReleasePoolConfig;
    use glide_dsp::{coefficients_approx_eq, BiquadDesigner, CutDirection, CutSlope, DspError};
    use std::sync::atomic::{AtomicBool, AtomicUsize};
    use std::thread;
    use std::time::{Duration, Instant};

    fn config(smoothing_seconds: f32) -> PipelineConfig {
        let mut config = PipelineConfig::low_latency();
        config.link.smoothing_seconds = smoothing_seconds;
        config
    }

    fn pool() -> Arc<ReleasePool> {
        ReleasePool::shared(&ReleasePoolConfig::default())
    }

    fn live_matches(link: &FilterLink, expected: &CoefficientSet) -> bool {
        link.active_stages() == expected.len()
            && expected.iter().enumerate().all(|(i, want)| {
                link.live_coefficients()[i]
                    .as_ref()
                    .map_or(false, |have| coefficients_approx_eq(have, want, 1e-6))
            })
    }

    /// Run blocks until `done` holds or a deadline passes
    fn run_until(
        link: &mut FilterLink,
        parameters: &FilterParameters,
        mut done: impl FnMut(&FilterLink) -> bool,
    ) -> bool {
        let mut buffer = [0.0f32; 64];
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            link.run_block(parameters, &mut buffer);
            if done(link) {
                return true;
            }
            thread::sleep(Duration::from_millis(1));
        }
        false
    }

    #[test]
    fn test_initial_coefficients_installed() {
        let initial = FilterParameters::peak(1000.0, 1.0, 6.0, 48000.0);
        let link = FilterLink::new(initial, Arc::new(BiquadDesigner), pool(), &config(0.0)).unwrap();

        let expected = BiquadDesigner.make(&initial).unwrap();
        assert!(live_matches(&link, &expected));
        assert!(!link.recompute_pending());
    }

    #[test]
    fn test_invalid_initial_parameters_rejected() {
        let initial = FilterParameters::peak(40000.0, 1.0, 0.0, 48000.0);
        let result = FilterLink::new(initial, Arc::new(BiquadDesigner), pool(), &config(0.0));
        assert!(matches!(result, Err(PipelineError::DspError(_))));
    }

    #[test]
    fn test_converges_without_smoothing() {
        let initial = FilterParameters::peak(1000.0, 1.0, 0.0, 48000.0);
        let mut link = FilterLink::new(initial, Arc::new(BiquadDesigner), pool(), &config(0.0)).unwrap();

        let target = FilterParameters::peak(4000.0, 2.0, -6.0, 48000.0);
        let expected = BiquadDesigner.make(&target).unwrap();
        assert!(run_until(&mut link, &target, |l| live_matches(l, &expected)));
        assert!(!link.is_smoothing());
    }

    #[test]
    fn test_converges_after_glide() {
        let initial = FilterParameters::peak(500.0, 1.0, 0.0, 48000.0);
        let mut link =
            FilterLink::new(initial, Arc::new(BiquadDesigner), pool(), &config(0.01)).unwrap();

        let target = FilterParameters::peak(2000.0, 1.0, 3.0, 48000.0);
        link.update_parameters(&target);
        assert!(link.is_smoothing());
        assert!(link.smoothed_parameters().frequency < 2000.0);

        let expected = BiquadDesigner.make(&target).unwrap();
        assert!(run_until(&mut link, &target, |l| !l.is_smoothing() && live_matches(l, &expected)));
        assert_eq!(link.smoothed_parameters().frequency, 2000.0);
    }

    #[test]
    fn test_cut_slope_change_changes_stage_count() {
        let initial = FilterParameters::cut(CutDirection::LowCut, CutSlope::Db48, 80.0, 48000.0);
        let mut link = FilterLink::new(initial, Arc::new(BiquadDesigner), pool(), &config(0.0)).unwrap();
        assert_eq!(link.active_stages(), 4);

        let target = FilterParameters::cut(CutDirection::LowCut, CutSlope::Db12, 80.0, 48000.0);
        assert!(run_until(&mut link, &target, |l| l.active_stages() == 1));
        let live = link.live_coefficients();
        assert!(live[0].is_some());
        assert!(live[1..].iter().all(Option::is_none), "Disabled stages hold nothing");
    }

    #[test]
    fn test_unchanged_parameters_submit_nothing() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let designer = move |p: &FilterParameters| -> Result<CoefficientSet, DspError> {
            counter.fetch_add(1, Ordering::SeqCst);
            BiquadDesigner.make(p)
        };

        let initial = FilterParameters::peak(1000.0, 1.0, 0.0, 48000.0);
        let mut link = FilterLink::new(initial, Arc::new(designer), pool(), &config(0.0)).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // Float noise below tolerance
        let nudged = FilterParameters {
            frequency: 1000.0001,
            ..initial
        };
        let mut buffer = [0.0f32; 32];
        for _ in 0..10 {
            link.run_block(&nudged, &mut buffer);
        }
        thread::sleep(Duration::from_millis(20));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(link.parameters().frequency, 1000.0);
    }

    #[test]
    fn test_bypass_submits_and_retires_nothing() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let designer = move |p: &FilterParameters| -> Result<CoefficientSet, DspError> {
            counter.fetch_add(1, Ordering::SeqCst);
            BiquadDesigner.make(p)
        };

        let pool = pool();
        let initial = FilterParameters::peak(1000.0, 1.0, 0.0, 48000.0).with_bypass(true);
        let mut link =
            FilterLink::new(initial, Arc::new(designer), Arc::clone(&pool), &config(0.0)).unwrap();
        let before = link.live_coefficients()[0].clone();

        let changed = FilterParameters::peak(5000.0, 3.0, 9.0, 48000.0).with_bypass(true);
        let mut buffer = [0.25f32; 32];
        for _ in 0..10 {
            link.run_block(&changed, &mut buffer);
        }
        thread::sleep(Duration::from_millis(20));

        assert_eq!(calls.load(Ordering::SeqCst), 1, "Only the initial design");
        assert_eq!(pool.pending_len(), 0);
        assert_eq!(pool.queued_len(), 0);
        assert!(buffer.iter().all(|&s| s == 0.25), "Bypassed audio is untouched");
        assert!(Arc::ptr_eq(
            link.live_coefficients()[0].as_ref().unwrap(),
            before.as_ref().unwrap()
        ));
    }

    #[test]
    fn test_replaced_coefficients_go_to_pool() {
        let pool = pool();
        let initial = FilterParameters::peak(1000.0, 1.0, 0.0, 48000.0);
        let mut link =
            FilterLink::new(initial, Arc::new(BiquadDesigner), Arc::clone(&pool), &config(0.0))
                .unwrap();
        let first = link.live_coefficients()[0].clone().unwrap();
        let weak = Arc::downgrade(&first);
        drop(first);

        let target = FilterParameters::peak(3000.0, 1.0, 0.0, 48000.0);
        assert!(run_until(&mut link, &target, |l| {
            !Arc::ptr_eq(l.live_coefficients()[0].as_ref().unwrap(), &weak.upgrade().unwrap())
        }));

        // Audio-path retirements always take the queue, even from the safe thread
        assert!(weak.upgrade().is_some());
        assert_eq!(pool.pending_len(), 0);
        assert_eq!(pool.queued_len(), 1);
        let stats = pool.sweep();
        assert_eq!(stats.drained, 1);
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn test_backlog_installs_newest_and_retires_the_rest() {
        let open = Arc::new(AtomicBool::new(true));
        let gate = Arc::clone(&open);
        let designer = move |p: &FilterParameters| -> Result<CoefficientSet, DspError> {
            while !gate.load(Ordering::SeqCst) {
                thread::sleep(Duration::from_millis(1));
            }
            BiquadDesigner.make(p)
        };

        let pool = pool();
        let cut = |frequency: f32| {
            FilterParameters::cut(CutDirection::LowCut, CutSlope::Db24, frequency, 48000.0)
        };
        let mut link =
            FilterLink::new(cut(100.0), Arc::new(designer), Arc::clone(&pool), &config(0.0))
                .unwrap();
        assert_eq!(link.active_stages(), 2);
        open.store(false, Ordering::SeqCst);

        let steps = [200.0, 300.0, 400.0, 500.0, 600.0];
        for &frequency in &steps {
            link.update_parameters(&cut(frequency));
            link.update_block(64);
        }
        assert_eq!(link.worker().pending_results(), 0);

        open.store(true, Ordering::SeqCst);
        let deadline = Instant::now() + Duration::from_secs(5);
        while link.worker().pending_results() < steps.len() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(link.worker().pending_results(), steps.len());

        link.update_block(64);

        let newest = BiquadDesigner.make(&cut(600.0)).unwrap();
        assert!(live_matches(&link, &newest));
        assert_eq!(link.worker().pending_results(), 0);
        assert!(!link.recompute_pending());
        // Four older sets of two stages, plus the two stages they replaced
        assert_eq!(pool.queued_len(), 4 * 2 + 2);

        let stats = pool.sweep();
        assert_eq!(stats.drained, 10);
        assert_eq!(stats.released, 10, "Nothing else holds the retired stages");
        assert_eq!(link.active_stages(), 2);
    }

    #[test]
    fn test_audio_thread_glide_fits_release_queue() {
        let pool = pool();
        let initial = FilterParameters::cut(CutDirection::LowCut, CutSlope::Db48, 100.0, 48000.0);
        let mut link = FilterLink::new(
            initial,
            Arc::new(BiquadDesigner),
            Arc::clone(&pool),
            &PipelineConfig::default(),
        )
        .unwrap();

        let audio = {
            let pool = Arc::clone(&pool);
            thread::spawn(move || {
                assert!(!pool.is_safe_context());
                let mut buffer = [0.0f32; 64];
                let started = Instant::now();
                let mut block = 0usize;
                while started.elapsed() < Duration::from_millis(500) {
                    let frequency = 100.0 + 20.0 * (block % 200) as f32;
                    let parameters = FilterParameters { frequency, ..initial };
                    link.run_block(&parameters, &mut buffer);
                    block += 1;
                    thread::sleep(Duration::from_micros(1333));
                }
                link
            })
        };
        let link = audio.join().unwrap();

        assert_eq!(pool.overflow_count(), 0, "No handle was dropped on the audio thread");
        assert_eq!(pool.pending_len(), 0, "The audio thread never touches the list");
        let queued = pool.queued_len();
        assert!(queued > 0);

        let stats = pool.sweep();
        assert_eq!(stats.drained, queued);
        assert_eq!(stats.released, queued);
        assert_eq!(stats.pending, 0);
        assert_eq!(link.active_stages(), 4);
    }

    #[test]
    fn test_bypass_processes_passthrough() {
        let initial = FilterParameters::peak(1000.0, 1.0, 12.0, 48000.0).with_bypass(true);
        let mut link = FilterLink::new(initial, Arc::new(BiquadDesigner), pool(), &config(0.0)).unwrap();
        assert_eq!(link.process_sample(0.5), 0.5);
    }
}
