//! Pipeline Configuration
//!
//! Every knob here trades something: queue capacity buys headroom against a
//! consumer that runs less often than its producer, the worker poll interval
//! trades coefficient latency for idle CPU, and the meter settings decide how
//! the needles feel.

use std::time::Duration;

use glide_dsp::MAX_STAGES;
use serde::{Deserialize, Serialize};

/// Coefficient worker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Sleep between checks of the dirty flag (bounded latency, 1-10ms)
    pub poll_interval_ms: u64,

    /// How long `stop()` waits for the worker thread before giving up
    pub join_timeout_ms: u64,

    /// Slots in the audio -> worker parameter queue
    pub parameter_queue_capacity: usize,

    /// Slots in the worker -> audio coefficient queue
    pub coefficient_queue_capacity: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 5,
            join_timeout_ms: 1000,
            parameter_queue_capacity: 2048,
            coefficient_queue_capacity: 2048,
        }
    }
}

impl WorkerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn join_timeout(&self) -> Duration {
        Duration::from_millis(self.join_timeout_ms)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.poll_interval_ms == 0 || self.poll_interval_ms > 10 {
            return Err(format!("Invalid worker poll interval: {}ms", self.poll_interval_ms));
        }
        if self.join_timeout_ms == 0 {
            return Err("Worker join timeout must be positive".into());
        }
        if self.parameter_queue_capacity < 2 {
            return Err(format!(
                "Invalid parameter queue capacity: {}",
                self.parameter_queue_capacity
            ));
        }
        if self.coefficient_queue_capacity < 2 {
            return Err(format!(
                "Invalid coefficient queue capacity: {}",
                self.coefficient_queue_capacity
            ));
        }
        Ok(())
    }
}

/// Per-band filter link configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkConfig {
    /// Glide time for frequency, quality and gain (0 = jump)
    pub smoothing_seconds: f32,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            smoothing_seconds: 0.05,
        }
    }
}

impl LinkConfig {
    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..=5.0).contains(&self.smoothing_seconds) {
            return Err(format!("Invalid smoothing time: {}s", self.smoothing_seconds));
        }
        Ok(())
    }
}

/// Release pool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleasePoolConfig {
    /// Slots in the audio -> pool handoff queue
    pub queue_capacity: usize,

    /// Period of the background sweep
    pub sweep_interval_ms: u64,

    /// Highest audio block rate the queue must absorb (sample rate / block size)
    #[serde(default = "default_max_blocks_per_second")]
    pub max_blocks_per_second: f32,

    /// Filter links sharing the pool (bands x channels)
    #[serde(default = "default_max_links")]
    pub max_links: usize,
}

fn default_max_blocks_per_second() -> f32 {
    // 32-frame blocks at 48kHz
    1500.0
}

fn default_max_links() -> usize {
    16
}

impl Default for ReleasePoolConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 16384,
            sweep_interval_ms: 100,
            max_blocks_per_second: default_max_blocks_per_second(),
            max_links: default_max_links(),
        }
    }
}

impl ReleasePoolConfig {
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }

    /// Queue slots needed to hold one sweep interval of worst-case retirements
    ///
    /// Every link may retire all of its stages on every block while gliding.
    pub fn required_capacity(&self) -> usize {
        let blocks = (self.max_blocks_per_second as f64 * self.sweep_interval_ms as f64 / 1000.0)
            .ceil() as usize;
        blocks
            .saturating_mul(MAX_STAGES)
            .saturating_mul(self.max_links)
            .saturating_add(1)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.queue_capacity < 2 {
            return Err(format!("Invalid release queue capacity: {}", self.queue_capacity));
        }
        if self.sweep_interval_ms == 0 {
            return Err("Release sweep interval must be positive".into());
        }
        if !(self.max_blocks_per_second > 0.0 && self.max_blocks_per_second.is_finite()) {
            return Err(format!("Invalid block rate: {}", self.max_blocks_per_second));
        }
        if self.max_links == 0 {
            return Err("Release pool must serve at least one link".into());
        }
        let required = self.required_capacity();
        if self.queue_capacity < required {
            return Err(format!(
                "Release queue capacity {} cannot hold {}ms of retirements from {} links at {} blocks/s (needs {})",
                self.queue_capacity,
                self.sweep_interval_ms,
                self.max_links,
                self.max_blocks_per_second,
                required
            ));
        }
        Ok(())
    }
}

/// Metering configuration (averager window, peak hold and decay)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeterConfig {
    /// Samples in the running average window
    pub averager_window: usize,

    /// How long a new peak is held before decaying
    pub hold_time_ms: u64,

    /// Base decay speed
    pub decay_db_per_second: f32,

    /// Rate at which the meter tick is driven
    pub tick_rate_hz: f32,

    /// Per-tick growth of the decay multiplier once decay begins
    pub decay_acceleration: f32,

    /// Lowest displayable level ("negative infinity")
    pub floor_db: f32,

    /// Highest displayable level
    pub ceiling_db: f32,
}

impl Default for MeterConfig {
    fn default() -> Self {
        Self {
            averager_window: 64,
            hold_time_ms: 2000,
            decay_db_per_second: 3.0,
            tick_rate_hz: 60.0,
            decay_acceleration: 1.01,
            floor_db: -48.0,
            ceiling_db: 12.0,
        }
    }
}

impl MeterConfig {
    /// Decay applied per tick at multiplier 1
    pub fn decay_per_tick(&self) -> f32 {
        self.decay_db_per_second / self.tick_rate_hz
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs_f32(1.0 / self.tick_rate_hz)
    }

    pub fn hold_time(&self) -> Duration {
        Duration::from_millis(self.hold_time_ms)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.averager_window == 0 {
            return Err("Averager window must be at least 1".into());
        }
        if !(self.tick_rate_hz > 0.0 && self.tick_rate_hz <= 1000.0) {
            return Err(format!("Invalid meter tick rate: {}Hz", self.tick_rate_hz));
        }
        if !(self.decay_db_per_second >= 0.0) {
            return Err(format!("Invalid decay rate: {}", self.decay_db_per_second));
        }
        if !(self.decay_acceleration >= 1.0) {
            return Err(format!("Invalid decay acceleration: {}", self.decay_acceleration));
        }
        if !(self.floor_db < self.ceiling_db) {
            return Err(format!(
                "Meter floor {} must be below ceiling {}",
                self.floor_db, self.ceiling_db
            ));
        }
        Ok(())
    }
}

/// Overall pipeline configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub worker: WorkerConfig,
    pub link: LinkConfig,
    pub release_pool: ReleasePoolConfig,
    pub meter: MeterConfig,
}

impl PipelineConfig {
    /// Fastest coefficient turnaround, at the cost of a busier worker
    pub fn low_latency() -> Self {
        Self {
            worker: WorkerConfig {
                poll_interval_ms: 1,
                ..WorkerConfig::default()
            },
            link: LinkConfig {
                smoothing_seconds: 0.02,
            },
            ..Self::default()
        }
    }

    /// Relaxed polling and deeper queues
    pub fn stable() -> Self {
        Self {
            worker: WorkerConfig {
                poll_interval_ms: 10,
                parameter_queue_capacity: 4096,
                coefficient_queue_capacity: 4096,
                ..WorkerConfig::default()
            },
            release_pool: ReleasePoolConfig {
                queue_capacity: 32768,
                ..ReleasePoolConfig::default()
            },
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        self.worker.validate()?;
        self.link.validate()?;
        self.release_pool.validate()?;
        self.meter.validate()
    }
}
