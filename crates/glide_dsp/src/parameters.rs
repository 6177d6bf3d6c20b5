//! Filter Parameters
//!
//! Value types describing what one EQ band should sound like. A new
//! `FilterParameters` replaces the old one wholesale; whether a change is
//! "real" is decided by [`FilterParameters::approx_eq`], which tolerates
//! floating-point noise from knob drags and host automation.

use serde::{Deserialize, Serialize};

use crate::error::DspError;

/// Relative tolerance used for approximate parameter comparison
pub const PARAMETER_TOLERANCE: f32 = 1e-5;

/// Default Q for new bands (~0.707, Butterworth)
pub const DEFAULT_QUALITY: f32 = biquad::Q_BUTTERWORTH_F32;

/// Approximate float comparison, relative to the larger magnitude (min 1.0)
#[inline]
pub fn approx_eq(a: f32, b: f32) -> bool {
    let scale = a.abs().max(b.abs()).max(1.0);
    (a - b).abs() <= PARAMETER_TOLERANCE * scale
}

/// Response shape of a single-stage parametric band
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParametricShape {
    Peak,
    LowShelf,
    HighShelf,
    Notch,
    BandPass,
}

/// Which side of the spectrum a cut filter removes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CutDirection {
    /// Removes content below the cutoff (highpass response)
    LowCut,
    /// Removes content above the cutoff (lowpass response)
    HighCut,
}

/// Cut filter steepness; every 12 dB/oct adds one biquad stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CutSlope {
    Db12,
    Db24,
    Db36,
    Db48,
}

impl CutSlope {
    /// Butterworth order realized by this slope
    pub fn order(self) -> usize {
        self.stages() * 2
    }

    /// Number of cascaded biquad stages
    pub fn stages(self) -> usize {
        match self {
            CutSlope::Db12 => 1,
            CutSlope::Db24 => 2,
            CutSlope::Db36 => 3,
            CutSlope::Db48 => 4,
        }
    }

    fn index(self) -> u8 {
        self.stages() as u8 - 1
    }

    fn from_index(index: u8) -> Option<Self> {
        match index {
            0 => Some(CutSlope::Db12),
            1 => Some(CutSlope::Db24),
            2 => Some(CutSlope::Db36),
            3 => Some(CutSlope::Db48),
            _ => None,
        }
    }
}

/// The closed set of filter families a band can take
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterKind {
    /// Single biquad: peak, shelf, notch or bandpass
    Parametric(ParametricShape),
    /// Cascaded Butterworth lowcut/highcut, 1-4 stages
    Cut {
        direction: CutDirection,
        slope: CutSlope,
    },
}

const CUT_TAG: u8 = 0x10;

impl FilterKind {
    /// Number of biquad stages this kind designs
    pub fn stage_count(self) -> usize {
        match self {
            FilterKind::Parametric(_) => 1,
            FilterKind::Cut { slope, .. } => slope.stages(),
        }
    }

    /// Whether the gain field affects this kind's response
    pub fn uses_gain(self) -> bool {
        matches!(
            self,
            FilterKind::Parametric(
                ParametricShape::Peak | ParametricShape::LowShelf | ParametricShape::HighShelf
            )
        )
    }

    /// Pack into a single byte for atomic storage
    pub fn encode(self) -> u8 {
        match self {
            FilterKind::Parametric(shape) => match shape {
                ParametricShape::Peak => 0,
                ParametricShape::LowShelf => 1,
                ParametricShape::HighShelf => 2,
                ParametricShape::Notch => 3,
                ParametricShape::BandPass => 4,
            },
            FilterKind::Cut { direction, slope } => {
                let dir = match direction {
                    CutDirection::LowCut => 0,
                    CutDirection::HighCut => 1,
                };
                CUT_TAG | (dir << 2) | slope.index()
            }
        }
    }

    /// Inverse of [`encode`](Self::encode)
    pub fn decode(byte: u8) -> Result<Self, DspError> {
        let kind = match byte {
            0 => FilterKind::Parametric(ParametricShape::Peak),
            1 => FilterKind::Parametric(ParametricShape::LowShelf),
            2 => FilterKind::Parametric(ParametricShape::HighShelf),
            3 => FilterKind::Parametric(ParametricShape::Notch),
            4 => FilterKind::Parametric(ParametricShape::BandPass),
            b if b & !0x07 == CUT_TAG => {
                let direction = if b & 0x04 == 0 {
                    CutDirection::LowCut
                } else {
                    CutDirection::HighCut
                };
                let slope =
                    CutSlope::from_index(b & 0x03).ok_or(DspError::InvalidFilterKind(byte))?;
                FilterKind::Cut { direction, slope }
            }
            _ => return Err(DspError::InvalidFilterKind(byte)),
        };
        Ok(kind)
    }
}

/// Desired behavior of one band
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FilterParameters {
    /// Center or cutoff frequency in Hz
    pub frequency: f32,
    /// Resonance / Q
    pub quality: f32,
    /// Gain in dB (shelves and peaks only)
    pub gain_db: f32,
    pub bypass: bool,
    pub sample_rate: f32,
    pub kind: FilterKind,
}

impl Default for FilterParameters {
    fn default() -> Self {
        Self {
            frequency: 1000.0,
            quality: DEFAULT_QUALITY,
            gain_db: 0.0,
            bypass: false,
            sample_rate: 48000.0,
            kind: FilterKind::Parametric(ParametricShape::Peak),
        }
    }
}

impl FilterParameters {
    pub fn peak(frequency: f32, quality: f32, gain_db: f32, sample_rate: f32) -> Self {
        Self {
            frequency,
            quality,
            gain_db,
            sample_rate,
            ..Self::default()
        }
    }

    pub fn cut(direction: CutDirection, slope: CutSlope, frequency: f32, sample_rate: f32) -> Self {
        Self {
            frequency,
            sample_rate,
            kind: FilterKind::Cut { direction, slope },
            ..Self::default()
        }
    }

    pub fn with_bypass(mut self, bypass: bool) -> Self {
        self.bypass = bypass;
        self
    }

    /// Whether two parameter sets describe the same filter, ignoring float noise
    pub fn approx_eq(&self, other: &Self) -> bool {
        self.bypass == other.bypass
            && self.kind == other.kind
            && approx_eq(self.sample_rate, other.sample_rate)
            && !self.frequency_changed(other)
            && !self.quality_changed(other)
            && !self.gain_changed(other)
    }

    pub fn frequency_changed(&self, other: &Self) -> bool {
        !approx_eq(self.frequency, other.frequency)
    }

    pub fn quality_changed(&self, other: &Self) -> bool {
        !approx_eq(self.quality, other.quality)
    }

    pub fn gain_changed(&self, other: &Self) -> bool {
        !approx_eq(self.gain_db, other.gain_db)
    }

    /// Nyquist frequency for this parameter set's sample rate
    pub fn nyquist(&self) -> f32 {
        self.sample_rate * 0.5
    }
}
