//! Glide demo
//!
//! Runs a five-band stereo EQ on white noise while a control thread sweeps
//! one band's frequency. Coefficients are designed on per-band worker
//! threads, swapped in by the audio callback, and freed by a periodic
//! release-pool sweep. A meter thread logs the output level.
//!
//! ```text
//! glide [--offline] [--seconds N] [--save-settings]
//! ```

mod control;
mod offline;
mod render;
mod settings;
mod stream;

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{anyhow, bail, Context};
use glide_core::{Averager, ReleasePool, SharedParameters, Ticker};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::control::{apply_sweep, LevelMeter};
use crate::offline::OfflineDriver;
use crate::render::StereoRenderer;
use crate::settings::DemoSettings;
use crate::stream::OutputDevice;

/// Command-line options
#[derive(Debug, Clone, PartialEq)]
struct Args {
    offline: bool,
    seconds: f32,
    save_settings: bool,
}

impl Default for Args {
    fn default() -> Self {
        Self {
            offline: false,
            seconds: 10.0,
            save_settings: false,
        }
    }
}

impl Args {
    fn parse<I>(args: I) -> anyhow::Result<Self>
    where
        I: IntoIterator<Item = String>,
    {
        let mut parsed = Self::default();
        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--offline" => parsed.offline = true,
                "--save-settings" => parsed.save_settings = true,
                "--seconds" => {
                    let value = args.next().ok_or_else(|| anyhow!("--seconds needs a value"))?;
                    parsed.seconds = value
                        .parse()
                        .with_context(|| format!("Invalid --seconds value '{}'", value))?;
                    if !(parsed.seconds > 0.0) {
                        bail!("--seconds must be positive");
                    }
                }
                other => bail!("Unknown argument '{}'", other),
            }
        }
        Ok(parsed)
    }
}

/// Whichever thing is calling the renderer
enum AudioBackend {
    Device(cpal::Stream),
    Offline(OfflineDriver),
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("glide_cli=info,glide_core=info")),
        )
        .init();

    let args = Args::parse(std::env::args().skip(1))?;
    info!("Starting Glide demo ({:?})", args);

    let settings = DemoSettings::load();
    settings.validate().map_err(|e| anyhow!(e))?;

    let device = if args.offline {
        None
    } else {
        match OutputDevice::open_default() {
            Ok(device) => Some(device),
            Err(e) => {
                warn!("{:#} - falling back to offline rendering", e);
                None
            }
        }
    };
    let sample_rate = device
        .as_ref()
        .map_or(settings.sample_rate, OutputDevice::sample_rate);

    // The main thread is the release pool's safe context
    let pool = Arc::new(ReleasePool::new(&settings.pipeline.release_pool));
    let bands = Arc::new(
        settings
            .bands_at(sample_rate as f32)
            .into_iter()
            .map(SharedParameters::new)
            .collect::<Vec<_>>(),
    );
    let averager = Arc::new(Averager::new(settings.pipeline.meter.averager_window));

    let renderer = StereoRenderer::new(
        Arc::clone(&bands),
        Arc::clone(&averager),
        Arc::clone(&pool),
        &settings.pipeline,
        settings.noise_level,
    )?;
    info!(
        "{} bands per channel at {}Hz",
        renderer.band_count(),
        sample_rate
    );

    let mut release_ticker = {
        let pool = Arc::clone(&pool);
        Ticker::spawn(
            "glide-release",
            settings.pipeline.release_pool.sweep_interval(),
            move || {
                pool.sweep();
            },
        )?
    };

    let mut meter_ticker = {
        let mut meter = LevelMeter::new(Arc::clone(&averager), &settings.pipeline.meter);
        Ticker::spawn(
            "glide-meter",
            settings.pipeline.meter.tick_interval(),
            move || {
                meter.tick();
            },
        )?
    };

    let backend = match &device {
        Some(device) => AudioBackend::Device(device.start(renderer)?),
        None => AudioBackend::Offline(OfflineDriver::spawn(
            renderer,
            sample_rate,
            settings.block_size,
        )?),
    };

    let mut control_ticker = {
        let bands = Arc::clone(&bands);
        let sweep = settings.sweep.clone();
        let started = Instant::now();
        Ticker::spawn(
            "glide-control",
            Duration::from_millis(sweep.update_interval_ms),
            move || {
                apply_sweep(&bands, &sweep, started.elapsed());
            },
        )?
    };

    thread::sleep(Duration::from_secs_f32(args.seconds));

    info!("Shutting down");
    control_ticker.stop()?;
    match backend {
        AudioBackend::Device(stream) => drop(stream),
        AudioBackend::Offline(mut driver) => {
            driver.stop()?;
            info!("Rendered {} offline blocks", driver.blocks_rendered());
        }
    }
    meter_ticker.stop()?;
    release_ticker.stop()?;

    let stats = pool.sweep();
    info!(
        "Final release sweep: released {}, still pending {}",
        stats.released, stats.pending
    );

    if args.save_settings {
        settings.save().map_err(|e| anyhow!(e))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> anyhow::Result<Args> {
        Args::parse(args.iter().map(|s| s.to_string()))
    }

    #[test]
    fn test_default_args() {
        assert_eq!(parse(&[]).unwrap(), Args::default());
    }

    #[test]
    fn test_parse_all_flags() {
        let args = parse(&["--offline", "--seconds", "2.5", "--save-settings"]).unwrap();
        assert!(args.offline);
        assert!(args.save_settings);
        assert_eq!(args.seconds, 2.5);
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse(&["--seconds"]).is_err());
        assert!(parse(&["--seconds", "abc"]).is_err());
        assert!(parse(&["--seconds", "-1"]).is_err());
        assert!(parse(&["--loud"]).is_err());
    }
}
