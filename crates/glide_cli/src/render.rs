//! Stereo Renderer
//!
//! Everything the audio callback does: generate noise, run both channel
//! chains against the current band parameters, interleave, and push the
//! block's mean-square level into the meter averager. All buffers are
//! allocated up front.

use std::sync::Arc;

use glide_core::{
    Averager, BiquadDesigner, ChannelChain, FilterParameters, ParameterSource, PipelineConfig,
    PipelineResult, ReleasePool, SharedParameters,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Frames processed per inner chunk; callbacks larger than this are split
pub const MAX_CHUNK_FRAMES: usize = 1024;

pub struct StereoRenderer {
    left: ChannelChain,
    right: ChannelChain,
    bands: Arc<Vec<SharedParameters>>,
    snapshot: Vec<FilterParameters>,
    averager: Arc<Averager>,
    rng: StdRng,
    noise_level: f32,
    left_buffer: Vec<f32>,
    right_buffer: Vec<f32>,
}

impl StereoRenderer {
    /// Build both chains from the current band values
    pub fn new(
        bands: Arc<Vec<SharedParameters>>,
        averager: Arc<Averager>,
        pool: Arc<ReleasePool>,
        config: &PipelineConfig,
        noise_level: f32,
    ) -> PipelineResult<Self> {
        let snapshot: Vec<FilterParameters> = bands.iter().map(|b| b.snapshot()).collect();
        let designer = Arc::new(BiquadDesigner);

        let left = ChannelChain::new(&snapshot, designer.clone(), Arc::clone(&pool), config)?;
        let right = ChannelChain::new(&snapshot, designer, pool, config)?;

        Ok(Self {
            left,
            right,
            bands,
            snapshot,
            averager,
            rng: StdRng::seed_from_u64(0x5EED),
            noise_level,
            left_buffer: vec![0.0; MAX_CHUNK_FRAMES],
            right_buffer: vec![0.0; MAX_CHUNK_FRAMES],
        })
    }

    /// Fill an interleaved output buffer
    ///
    /// Channel 0 gets the left chain, channel 1 the right, any further
    /// channels silence. Real-time safe.
    pub fn render_interleaved(&mut self, data: &mut [f32], channels: usize) {
        if channels == 0 {
            return;
        }
        for chunk in data.chunks_mut(MAX_CHUNK_FRAMES * channels) {
            let frames = chunk.len() / channels;
            self.render_chunk(frames);

            let mut energy = 0.0f32;
            for (i, frame) in chunk.chunks_mut(channels).enumerate().take(frames) {
                frame.fill(0.0);
                frame[0] = self.left_buffer[i];
                if channels > 1 {
                    frame[1] = self.right_buffer[i];
                }
                energy += self.left_buffer[i] * self.left_buffer[i]
                    + self.right_buffer[i] * self.right_buffer[i];
            }
            // Partial trailing frame
            chunk[frames * channels..].fill(0.0);
            if frames > 0 {
                self.averager.add(energy / (2 * frames) as f32);
            }
        }
    }

    fn render_chunk(&mut self, frames: usize) {
        for (slot, source) in self.snapshot.iter_mut().zip(self.bands.iter()) {
            *slot = source.snapshot();
        }

        let level = self.noise_level;
        for i in 0..frames {
            self.left_buffer[i] = (self.rng.gen::<f32>() * 2.0 - 1.0) * level;
            self.right_buffer[i] = (self.rng.gen::<f32>() * 2.0 - 1.0) * level;
        }

        self.left.process(&self.snapshot, &mut self.left_buffer[..frames]);
        self.right.process(&self.snapshot, &mut self.right_buffer[..frames]);
    }

    pub fn band_count(&self) -> usize {
        self.left.len()
    }
}
