//! Coefficient Worker
//!
//! Background thread that turns parameter sets into coefficients. The audio
//! thread pushes [`FilterParameters`] into an inbound queue and raises a dirty
//! flag; the worker wakes every poll interval, drains the inbound queue through
//! the designer and pushes each result onto an outbound queue the audio thread
//! swaps from.
//!
//! ```text
//! audio thread ──params──► [inbound]  ──► worker: designer.make()
//! audio thread ◄──coeffs── [outbound] ◄──
//! ```

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use glide_dsp::{CoefficientDesigner, CoefficientSet, FilterParameters};
use tracing::{debug, error, info, warn};

use crate::config::WorkerConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::queue::Queue;

pub const WORKER_THREAD_NAME: &str = "glide-coefficients";

/// What the worker thread is doing right now
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WorkerState {
    Idle = 0,
    Computing = 1,
}

impl WorkerState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => WorkerState::Computing,
            _ => WorkerState::Idle,
        }
    }
}

/// State shared between the worker handle and its thread
struct WorkerShared {
    inbound: Queue<FilterParameters>,
    outbound: Queue<CoefficientSet>,
    dirty: AtomicBool,
    running: AtomicBool,
    state: AtomicU8,
    computed: AtomicU64,
}

/// Owns the coefficient design thread and both of its queues
pub struct CoefficientWorker {
    shared: Arc<WorkerShared>,
    shutdown_tx: Option<Sender<()>>,
    done_rx: Receiver<()>,
    handle: Option<JoinHandle<()>>,
    join_timeout: Duration,
}

impl CoefficientWorker {
    /// Spawn the worker thread
    ///
    /// Allocates both queues; never call from the audio thread.
    pub fn spawn(
        designer: Arc<dyn CoefficientDesigner>,
        config: &WorkerConfig,
    ) -> PipelineResult<Self> {
        config.validate().map_err(PipelineError::ConfigError)?;

        let shared = Arc::new(WorkerShared {
            inbound: Queue::new(config.parameter_queue_capacity),
            outbound: Queue::new(config.coefficient_queue_capacity),
            dirty: AtomicBool::new(false),
            running: AtomicBool::new(true),
            state: AtomicU8::new(WorkerState::Idle as u8),
            computed: AtomicU64::new(0),
        });

        // Never sent on; dropping the sender is the shutdown signal
        let (shutdown_tx, shutdown_rx) = bounded::<()>(1);
        // Dropped by the thread when it exits, normally or by unwinding
        let (done_tx, done_rx) = bounded::<()>(1);

        let shared_clone = Arc::clone(&shared);
        let poll_interval = config.poll_interval();

        let handle = thread::Builder::new()
            .name(WORKER_THREAD_NAME.into())
            .spawn(move || {
                Self::worker_main(shared_clone, designer, shutdown_rx, poll_interval);
                drop(done_tx);
            })
            .map_err(|e| PipelineError::ThreadSpawn(e.to_string()))?;

        Ok(Self {
            shared,
            shutdown_tx: Some(shutdown_tx),
            done_rx,
            handle: Some(handle),
            join_timeout: config.join_timeout(),
        })
    }

    fn worker_main(
        shared: Arc<WorkerShared>,
        designer: Arc<dyn CoefficientDesigner>,
        shutdown_rx: Receiver<()>,
        poll_interval: Duration,
    ) {
        info!("Coefficient worker started (poll {:?})", poll_interval);

        let mut parameters = FilterParameters::default();

        loop {
            match shutdown_rx.recv_timeout(poll_interval) {
                Err(RecvTimeoutError::Timeout) => {}
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
            if !shared.running.load(Ordering::Acquire) {
                break;
            }
            if !shared.dirty.swap(false, Ordering::AcqRel) {
                continue;
            }

            shared.state.store(WorkerState::Computing as u8, Ordering::Release);
            while shared.inbound.pull(&mut parameters) {
                match designer.make(&parameters) {
                    Ok(set) => {
                        if shared.outbound.push(set).is_err() {
                            warn!(
                                "Coefficient queue full - dropping design for {:.1}Hz",
                                parameters.frequency
                            );
                        }
                    }
                    Err(e) => {
                        warn!("Coefficient design failed: {}", e);
                    }
                }
                shared.computed.fetch_add(1, Ordering::Relaxed);
            }
            shared.state.store(WorkerState::Idle as u8, Ordering::Release);
        }

        shared.state.store(WorkerState::Idle as u8, Ordering::Release);
        info!("Coefficient worker stopped");
    }

    /// Queue a parameter set for design
    ///
    /// Wait-free; safe on the audio thread.
    ///
    /// # Panics
    /// Panics if the inbound queue is full. Size it for the worst burst of
    /// changes between two worker polls.
    pub fn change_parameters(&self, parameters: FilterParameters) {
        let pushed = self.shared.inbound.push(parameters).is_ok();
        assert!(pushed, "Coefficient worker parameter queue overflowed");
        self.shared.dirty.store(true, Ordering::Release);
    }

    /// Queue of designed coefficient sets, consumed by the audio thread
    pub fn outbound(&self) -> &Queue<CoefficientSet> {
        &self.shared.outbound
    }

    pub fn state(&self) -> WorkerState {
        WorkerState::from_u8(self.shared.state.load(Ordering::Acquire))
    }

    /// Parameter sets processed so far (including failed designs)
    pub fn computed_count(&self) -> u64 {
        self.shared.computed.load(Ordering::Relaxed)
    }

    /// Designed sets waiting for the audio thread
    pub fn pending_results(&self) -> usize {
        self.shared.outbound.available_for_read()
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    /// Stop and join the worker thread
    ///
    /// Waits up to the configured join timeout. On timeout the thread is
    /// detached and [`PipelineError::JoinTimeout`] returned. Calling again
    /// after a stop is a no-op.
    pub fn stop(&mut self) -> PipelineResult<()> {
        let Some(handle) = self.handle.take() else {
            return Ok(());
        };

        debug!("Stopping coefficient worker");
        self.shared.running.store(false, Ordering::Release);
        self.shutdown_tx.take();

        match self.done_rx.recv_timeout(self.join_timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => handle
                .join()
                .map_err(|_| PipelineError::WorkerPanicked(WORKER_THREAD_NAME.into())),
            Err(RecvTimeoutError::Timeout) => {
                error!(
                    "Coefficient worker did not stop within {:?}, detaching",
                    self.join_timeout
                );
                Err(PipelineError::JoinTimeout {
                    thread: WORKER_THREAD_NAME.into(),
                    timeout_ms: self.join_timeout.as_millis() as u64,
                })
            }
        }
    }
}

impl Drop for CoefficientWorker {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            if !thread::panicking() {
                panic!("Coefficient worker shutdown failed: {}", e);
            }
        }
    }
}

impl std::fmt::Debug for CoefficientWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoefficientWorker")
            .field("state", &self.state())
            .field("computed", &self.computed_count())
            .field("pending_results", &self.pending_results())
            .finish()
    }
}
