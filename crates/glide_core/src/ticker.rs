//! Periodic Ticker
//!
//! Named background thread that calls a closure on a fixed schedule. Drives
//! the low-rate entry points: [`ReleasePool::sweep`](crate::ReleasePool::sweep)
//! and meter ticks.

use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, select, tick, Sender};
use tracing::{debug, warn};

use crate::error::{PipelineError, PipelineResult};

pub struct Ticker {
    name: String,
    shutdown_tx: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl Ticker {
    /// Start calling `callback` every `interval` until stopped
    pub fn spawn<F>(name: &str, interval: Duration, mut callback: F) -> PipelineResult<Self>
    where
        F: FnMut() + Send + 'static,
    {
        let (shutdown_tx, shutdown_rx) = bounded::<()>(1);
        let thread_name = name.to_string();

        let handle = thread::Builder::new()
            .name(thread_name.clone())
            .spawn(move || {
                let ticks = tick(interval);
                debug!("Ticker '{}' started ({:?})", thread_name, interval);
                loop {
                    select! {
                        recv(ticks) -> _ => callback(),
                        recv(shutdown_rx) -> _ => break,
                    }
                }
                debug!("Ticker '{}' stopped", thread_name);
            })
            .map_err(|e| PipelineError::ThreadSpawn(e.to_string()))?;

        Ok(Self {
            name: name.to_string(),
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stop the schedule and join the thread
    ///
    /// Waits for a callback in progress to return.
    pub fn stop(&mut self) -> PipelineResult<()> {
        // Disconnecting wakes the select
        self.shutdown_tx.take();
        if let Some(handle) = self.handle.take() {
            handle
                .join()
                .map_err(|_| PipelineError::WorkerPanicked(self.name.clone()))?;
        }
        Ok(())
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            warn!("{}", e);
        }
    }
}

impl std::fmt::Debug for Ticker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ticker")
            .field("name", &self.name)
            .field("running", &self.handle.is_some())
            .finish()
    }
}
