//! DSP Error Types

use thiserror::Error;

/// Errors that can occur while designing or installing filter coefficients
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DspError {
    #[error("Invalid filter coefficients for frequency {frequency}Hz at sample rate {sample_rate}Hz")]
    InvalidCoefficients { frequency: f32, sample_rate: f32 },

    #[error("Sample rate must be positive, got {0}")]
    InvalidSampleRate(f32),

    #[error("Invalid stage count: {0} (must be 1-4)")]
    InvalidStageCount(usize),

    #[error("Unknown filter kind encoding: {0}")]
    InvalidFilterKind(u8),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DspError::InvalidStageCount(7);
        assert!(err.to_string().contains('7'));

        let err = DspError::InvalidCoefficients {
            frequency: 30000.0,
            sample_rate: 48000.0,
        };
        assert!(err.to_string().contains("30000"));
        assert!(err.to_string().contains("48000"));
    }

    #[test]
    fn test_invalid_kind_display() {
        let err = DspError::InvalidFilterKind(200);
        assert!(err.to_string().contains("200"));
    }
}
