//! Offline Callback Driver
//!
//! Stands in for an audio device: a named thread calls the renderer with
//! fixed-size blocks at roughly real-time pace, so the whole pipeline runs on
//! machines without audio hardware.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context};
use tracing::info;

use crate::render::StereoRenderer;

const CHANNELS: usize = 2;

pub struct OfflineDriver {
    running: Arc<AtomicBool>,
    blocks: Arc<AtomicU64>,
    handle: Option<JoinHandle<()>>,
}

impl OfflineDriver {
    pub fn spawn(
        mut renderer: StereoRenderer,
        sample_rate: u32,
        block_size: usize,
    ) -> anyhow::Result<Self> {
        let running = Arc::new(AtomicBool::new(true));
        let blocks = Arc::new(AtomicU64::new(0));
        let running_clone = Arc::clone(&running);
        let blocks_clone = Arc::clone(&blocks);

        let block_duration = Duration::from_secs_f64(block_size as f64 / sample_rate as f64);

        let handle = thread::Builder::new()
            .name("glide-offline-audio".into())
            .spawn(move || {
                info!(
                    "Offline driver: {} frames per block at {}Hz ({:?})",
                    block_size, sample_rate, block_duration
                );
                let mut data = vec![0.0f32; block_size * CHANNELS];
                let mut next_deadline = Instant::now();

                while running_clone.load(Ordering::Acquire) {
                    renderer.render_interleaved(&mut data, CHANNELS);
                    blocks_clone.fetch_add(1, Ordering::Relaxed);

                    // Pace like a device clock, without drifting
                    next_deadline += block_duration;
                    let now = Instant::now();
                    if next_deadline > now {
                        thread::sleep(next_deadline - now);
                    } else {
                        next_deadline = now;
                    }
                }
                info!("Offline driver stopped");
            })
            .context("Failed to spawn offline audio thread")?;

        Ok(Self {
            running,
            blocks,
            handle: Some(handle),
        })
    }

    /// Blocks rendered so far
    pub fn blocks_rendered(&self) -> u64 {
        self.blocks.load(Ordering::Relaxed)
    }

    pub fn stop(&mut self) -> anyhow::Result<()> {
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            handle
                .join()
                .map_err(|_| anyhow!("Offline audio thread panicked"))?;
        }
        Ok(())
    }
}

impl Drop for OfflineDriver {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}
