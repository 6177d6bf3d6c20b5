//! Pipeline Error Types

use thiserror::Error;

/// Errors raised on the control side of the pipeline
///
/// Nothing on the audio thread returns one of these; audio-thread operations
/// report failure through booleans or by handing a rejected value back.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Failed to spawn thread: {0}")]
    ThreadSpawn(String),

    #[error("Thread '{thread}' did not stop within {timeout_ms}ms")]
    JoinTimeout { thread: String, timeout_ms: u64 },

    #[error("Thread '{0}' panicked")]
    WorkerPanicked(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("DSP error: {0}")]
    DspError(#[from] glide_dsp::DspError),
}

/// Result type alias for pipeline operations
pub type PipelineResult<T> = Result<T, PipelineError>;
