//! Parameter Sources
//!
//! How the audio thread reads each band's desired parameters. A control
//! thread (UI, automation) writes a [`SharedParameters`] field by field; the
//! audio callback takes a [`ParameterSource::snapshot`] once per block and
//! hands it to the link, which does its own change detection.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU8, Ordering};

use glide_dsp::{FilterKind, FilterParameters};

/// Anything the audio thread can read band parameters from
pub trait ParameterSource: Send + Sync {
    /// Current parameters. Wait-free.
    fn snapshot(&self) -> FilterParameters;
}

impl ParameterSource for FilterParameters {
    fn snapshot(&self) -> FilterParameters {
        *self
    }
}

/// Band parameters stored as per-field atomics
///
/// Fields are independent: a reader may observe a frequency write without a
/// gain write made just before it. The link treats each snapshot as a new
/// target, so a torn read only costs one extra glide step.
#[derive(Debug)]
pub struct SharedParameters {
    frequency_bits: AtomicU32,
    quality_bits: AtomicU32,
    gain_bits: AtomicU32,
    sample_rate_bits: AtomicU32,
    bypass: AtomicBool,
    kind: AtomicU8,
}

impl SharedParameters {
    pub fn new(initial: FilterParameters) -> Self {
        Self {
            frequency_bits: AtomicU32::new(initial.frequency.to_bits()),
            quality_bits: AtomicU32::new(initial.quality.to_bits()),
            gain_bits: AtomicU32::new(initial.gain_db.to_bits()),
            sample_rate_bits: AtomicU32::new(initial.sample_rate.to_bits()),
            bypass: AtomicBool::new(initial.bypass),
            kind: AtomicU8::new(initial.kind.encode()),
        }
    }

    pub fn set_frequency(&self, hz: f32) {
        self.frequency_bits.store(hz.to_bits(), Ordering::Relaxed);
    }

    pub fn set_quality(&self, q: f32) {
        self.quality_bits.store(q.to_bits(), Ordering::Relaxed);
    }

    pub fn set_gain_db(&self, db: f32) {
        self.gain_bits.store(db.to_bits(), Ordering::Relaxed);
    }

    pub fn set_sample_rate(&self, hz: f32) {
        self.sample_rate_bits.store(hz.to_bits(), Ordering::Relaxed);
    }

    pub fn set_bypass(&self, bypass: bool) {
        self.bypass.store(bypass, Ordering::Relaxed);
    }

    pub fn set_kind(&self, kind: FilterKind) {
        self.kind.store(kind.encode(), Ordering::Relaxed);
    }

    /// Overwrite every field
    pub fn store(&self, parameters: &FilterParameters) {
        self.set_frequency(parameters.frequency);
        self.set_quality(parameters.quality);
        self.set_gain_db(parameters.gain_db);
        self.set_sample_rate(parameters.sample_rate);
        self.set_bypass(parameters.bypass);
        self.set_kind(parameters.kind);
    }

    pub fn frequency(&self) -> f32 {
        f32::from_bits(self.frequency_bits.load(Ordering::Relaxed))
    }

    pub fn gain_db(&self) -> f32 {
        f32::from_bits(self.gain_bits.load(Ordering::Relaxed))
    }

    fn kind(&self) -> FilterKind {
        // Only ever written through `set_kind`, so always decodable
        FilterKind::decode(self.kind.load(Ordering::Relaxed))
            .unwrap_or(FilterParameters::default().kind)
    }
}

impl Default for SharedParameters {
    fn default() -> Self {
        Self::new(FilterParameters::default())
    }
}

impl ParameterSource for SharedParameters {
    fn snapshot(&self) -> FilterParameters {
        FilterParameters {
            frequency: self.frequency(),
            quality: f32::from_bits(self.quality_bits.load(Ordering::Relaxed)),
            gain_db: self.gain_db(),
            bypass: self.bypass.load(Ordering::Relaxed),
            sample_rate: f32::from_bits(self.sample_rate_bits.load(Ordering::Relaxed)),
            kind: self.kind(),
        }
    }
}
