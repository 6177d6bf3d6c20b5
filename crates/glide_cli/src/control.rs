//! Control and Meter Side
//!
//! The non-real-time half of the demo: a frequency sweep written into the
//! shared band parameters, and a meter that turns the averager's mean-square
//! level into a held, decaying dB reading.

use std::sync::Arc;
use std::time::Duration;

use glide_core::{Averager, DecayingValueHolder, MeterConfig, SharedParameters};
use tracing::info;

use crate::settings::SweepSettings;

/// Triangle sweep between `min_hz` and `max_hz`, linear in log-frequency
pub fn sweep_frequency(sweep: &SweepSettings, elapsed: Duration) -> f32 {
    let phase = (elapsed.as_secs_f32() / sweep.period_seconds).fract();
    let triangle = 1.0 - (2.0 * phase - 1.0).abs();
    sweep.min_hz * (sweep.max_hz / sweep.min_hz).powf(triangle)
}

/// Write the swept frequency for `elapsed` into the target band
pub fn apply_sweep(bands: &[SharedParameters], sweep: &SweepSettings, elapsed: Duration) -> f32 {
    let frequency = sweep_frequency(sweep, elapsed);
    if let Some(band) = bands.get(sweep.band) {
        band.set_frequency(frequency);
    }
    frequency
}

/// Mean-square power to dB, floored
pub fn power_to_db(mean_square: f32, floor_db: f32) -> f32 {
    if mean_square > 0.0 {
        (10.0 * mean_square.log10()).max(floor_db)
    } else {
        floor_db
    }
}

/// Peak-held output level
pub struct LevelMeter {
    averager: Arc<Averager>,
    holder: DecayingValueHolder,
    floor_db: f32,
    ticks: u64,
    report_every: u64,
}

impl LevelMeter {
    pub fn new(averager: Arc<Averager>, config: &MeterConfig) -> Self {
        Self {
            averager,
            holder: DecayingValueHolder::new(config),
            floor_db: config.floor_db,
            ticks: 0,
            // Roughly once a second
            report_every: config.tick_rate_hz.round().max(1.0) as u64,
        }
    }

    /// One meter refresh; returns (current level, held level) in dB
    pub fn tick(&mut self) -> (f32, f32) {
        let level = power_to_db(self.averager.average(), self.floor_db);
        self.holder.update_held_value(level);
        self.holder.tick();

        self.ticks += 1;
        if self.ticks % self.report_every == 0 {
            info!(
                "Output level {:6.1} dB (peak {:6.1} dB)",
                level,
                self.holder.held_value()
            );
        }
        (level, self.holder.held_value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glide_core::FilterParameters;

    #[test]
    fn test_sweep_endpoints() {
        let sweep = SweepSettings::default();
        let start = sweep_frequency(&sweep, Duration::ZERO);
        let middle = sweep_frequency(&sweep, Duration::from_secs_f32(sweep.period_seconds / 2.0));

        assert!((start - sweep.min_hz).abs() < 1e-2);
        assert!((middle - sweep.max_hz).abs() < 1.0);
    }

    #[test]
    fn test_sweep_stays_in_range() {
        let sweep = SweepSettings::default();
        for ms in (0..20_000).step_by(37) {
            let f = sweep_frequency(&sweep, Duration::from_millis(ms));
            assert!(f >= sweep.min_hz * 0.999 && f <= sweep.max_hz * 1.001);
        }
    }

    #[test]
    fn test_apply_sweep_writes_band() {
        let bands: Vec<SharedParameters> =
            (0..3).map(|_| SharedParameters::new(FilterParameters::default())).collect();
        let sweep = SweepSettings::default();
        let f = apply_sweep(&bands, &sweep, Duration::from_secs(1));
        assert_eq!(bands[sweep.band].frequency(), f);
        assert_eq!(bands[0].frequency(), 1000.0);
    }

    #[test]
    fn test_power_to_db() {
        assert_eq!(power_to_db(0.0, -48.0), -48.0);
        assert!((power_to_db(1.0, -48.0)).abs() < 1e-6);
        assert!((power_to_db(0.01, -48.0) + 20.0).abs() < 1e-4);
        assert_eq!(power_to_db(1e-12, -48.0), -48.0);
    }

    #[test]
    fn test_meter_holds_peak() {
        let averager = Arc::new(Averager::with_initial(1, 0.1));
        let mut meter = LevelMeter::new(Arc::clone(&averager), &MeterConfig::default());
        let (level, held) = meter.tick();
        assert!((level + 10.0).abs() < 1e-3);
        assert_eq!(held, level);

        averager.add(0.0);
        let (level, held) = meter.tick();
        assert_eq!(level, -48.0);
        assert!((held + 10.0).abs() < 1e-3, "Still within the hold time");
    }
}
