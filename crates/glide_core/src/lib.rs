//! Glide Core - Coefficient Pipeline
//!
//! This crate moves filter coefficients between threads without ever
//! blocking, allocating or freeing on the audio thread:
//! - Bounded lock-free SPSC queues
//! - A background worker per band that designs coefficients
//! - Filter links that smooth parameters and hot-swap coefficients
//! - A release pool that frees retired coefficients off the audio thread
//! - Lock-free meter state (running average, peak hold with decay)
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Control / UI Thread                      │
//! │   SharedParameters ◀──set──  knobs      meters ──poll──▶    │
//! └─────────────────────────────────────────────────────────────┘
//!          │ snapshot per block                      ▲
//!          ▼                                         │ Averager
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Audio Thread                           │
//! │   FilterLink ──params──▶ Queue ──▶ CoefficientWorker        │
//! │       ▲                              │ designer.make()      │
//! │       └────────coefficients── Queue ◀┘                      │
//! │       │ retired                                             │
//! │       └──────▶ ReleasePool queue                            │
//! │              (Zero allocation in this path)                 │
//! └─────────────────────────────────────────────────────────────┘
//!          │
//!          ▼ Ticker
//!     ReleasePool::sweep() drops solely-owned coefficients
//! ```

mod averager;
mod chain;
mod config;
mod decay;
mod error;
mod link;
mod parameter_store;
mod queue;
mod release_pool;
mod ticker;
mod worker;

pub use averager::Averager;
pub use chain::ChannelChain;
pub use config::{LinkConfig, MeterConfig, PipelineConfig, ReleasePoolConfig, WorkerConfig};
pub use decay::DecayingValueHolder;
pub use error::{PipelineError, PipelineResult};
pub use link::FilterLink;
pub use parameter_store::{ParameterSource, SharedParameters};
pub use queue::Queue;
pub use release_pool::{ReleasePool, SweepStats};
pub use ticker::Ticker;
pub use worker::{CoefficientWorker, WorkerState, WORKER_THREAD_NAME};

// Re-export DSP types for convenience
pub use glide_dsp::{
    BiquadDesigner, CoefficientDesigner, CoefficientSet, CutDirection, CutSlope, FilterKind,
    FilterParameters, ParametricShape, SharedCoefficients,
};
