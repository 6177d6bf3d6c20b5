//! Peak Hold and Decay
//!
//! Meter needle state. A new peak is adopted immediately and held for the hold
//! time; after that every tick pulls the value down by `decay_per_tick`
//! scaled by a multiplier that grows geometrically, so the needle falls
//! slowly at first and then faster. Owned by whoever drives the meter tick.

use std::time::{Duration, Instant};

use crate::config::MeterConfig;

#[derive(Debug, Clone)]
pub struct DecayingValueHolder {
    current: f32,
    peak_time: Instant,
    hold_time: Duration,
    decay_per_tick: f32,
    multiplier: f32,
    acceleration: f32,
    floor: f32,
    ceiling: f32,
}

impl DecayingValueHolder {
    /// Holder resting at the floor
    pub fn new(config: &MeterConfig) -> Self {
        Self {
            current: config.floor_db,
            peak_time: Instant::now(),
            hold_time: config.hold_time(),
            decay_per_tick: config.decay_per_tick(),
            multiplier: 1.0,
            acceleration: config.decay_acceleration,
            floor: config.floor_db,
            ceiling: config.ceiling_db,
        }
    }

    pub fn update_held_value(&mut self, value: f32) {
        self.update_held_value_at(value, Instant::now());
    }

    /// Adopt `value` as the new peak if it exceeds the held value
    pub fn update_held_value_at(&mut self, value: f32, now: Instant) {
        if value > self.current {
            self.current = value.min(self.ceiling);
            self.peak_time = now;
            self.multiplier = 1.0;
        }
    }

    pub fn tick(&mut self) {
        self.tick_at(Instant::now());
    }

    /// Advance the decay by one tick
    pub fn tick_at(&mut self, now: Instant) {
        if now.saturating_duration_since(self.peak_time) <= self.hold_time {
            return;
        }
        if self.current <= self.floor {
            self.current = self.floor;
            self.multiplier = 1.0;
            return;
        }

        self.current = (self.current - self.decay_per_tick * self.multiplier)
            .clamp(self.floor, self.ceiling);
        self.multiplier *= self.acceleration;

        if self.current <= self.floor {
            self.multiplier = 1.0;
        }
    }

    pub fn held_value(&self) -> f32 {
        self.current
    }

    pub fn multiplier(&self) -> f32 {
        self.multiplier
    }

    pub fn is_holding(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.peak_time) <= self.hold_time
    }

    pub fn is_at_floor(&self) -> bool {
        self.current <= self.floor
    }

    pub fn set_hold_time(&mut self, hold_time: Duration) {
        self.hold_time = hold_time;
    }

    pub fn set_decay_rate(&mut self, db_per_second: f32, tick_rate_hz: f32) {
        self.decay_per_tick = db_per_second / tick_rate_hz;
    }
}

impl Default for DecayingValueHolder {
    fn default() -> Self {
        Self::new(&MeterConfig::default())
    }
}
