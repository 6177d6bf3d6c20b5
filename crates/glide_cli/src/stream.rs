//! Device Output Stream
//!
//! Opens the default output device through CPAL and runs the renderer inside
//! its real-time callback.

use anyhow::{anyhow, Context};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, Stream, StreamConfig as CpalStreamConfig};
use tracing::{error, info};

use crate::render::StereoRenderer;

/// Default output device and the format it will be driven with
pub struct OutputDevice {
    device: Device,
    config: CpalStreamConfig,
}

impl OutputDevice {
    pub fn open_default() -> anyhow::Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| anyhow!("No output device available"))?;
        let supported = device
            .default_output_config()
            .context("Failed to query output format")?;

        let config = CpalStreamConfig {
            channels: supported.channels(),
            sample_rate: supported.sample_rate(),
            buffer_size: cpal::BufferSize::Default,
        };

        info!(
            "Output device '{}': {} channels at {}Hz",
            device.name().unwrap_or_else(|_| "unknown".into()),
            config.channels,
            config.sample_rate.0
        );

        Ok(Self { device, config })
    }

    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate.0
    }

    /// Build and start the output stream
    ///
    /// The returned stream must be kept alive for audio to keep flowing.
    pub fn start(&self, mut renderer: StereoRenderer) -> anyhow::Result<Stream> {
        let channels = self.config.channels as usize;

        let stream = self
            .device
            .build_output_stream(
                &self.config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    // Real-time audio callback - NO allocations allowed here
                    renderer.render_interleaved(data, channels);
                },
                move |err| {
                    error!("Output stream error: {}", err);
                },
                None,
            )
            .context("Failed to build output stream")?;

        stream.play().context("Failed to start output stream")?;
        Ok(stream)
    }
}
