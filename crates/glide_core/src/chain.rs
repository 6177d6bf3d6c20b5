//! Channel Chain
//!
//! Ordered series of filter links for one audio channel. A stereo EQ is two
//! chains fed the same band parameters.

use std::sync::Arc;

use glide_dsp::{CoefficientDesigner, FilterParameters};

use crate::config::PipelineConfig;
use crate::error::PipelineResult;
use crate::link::FilterLink;
use crate::release_pool::ReleasePool;

/// Filter links applied in order to one channel
pub struct ChannelChain {
    links: Vec<FilterLink>,
}

impl ChannelChain {
    /// Build one link per band. Spawns a worker thread per band.
    pub fn new(
        bands: &[FilterParameters],
        designer: Arc<dyn CoefficientDesigner>,
        pool: Arc<ReleasePool>,
        config: &PipelineConfig,
    ) -> PipelineResult<Self> {
        let links = bands
            .iter()
            .map(|band| FilterLink::new(*band, Arc::clone(&designer), Arc::clone(&pool), config))
            .collect::<PipelineResult<Vec<_>>>()?;
        Ok(Self { links })
    }

    /// Feed each link its band parameters and refresh coefficients
    ///
    /// Extra entries in `bands` are ignored; links without an entry keep
    /// their previous parameters.
    pub fn begin_block(&mut self, bands: &[FilterParameters], num_samples: usize) {
        for (link, band) in self.links.iter_mut().zip(bands) {
            link.update_parameters(band);
        }
        for link in &mut self.links {
            link.update_block(num_samples);
        }
    }

    /// Run one sample through every link
    #[inline]
    pub fn process_sample(&mut self, sample: f32) -> f32 {
        self.links
            .iter_mut()
            .fold(sample, |x, link| link.process_sample(x))
    }

    /// Update and process a whole mono block
    pub fn process(&mut self, bands: &[FilterParameters], buffer: &mut [f32]) {
        self.begin_block(bands, buffer.len());
        for link in &mut self.links {
            link.process(buffer);
        }
    }

    pub fn links(&self) -> &[FilterLink] {
        &self.links
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }
}
