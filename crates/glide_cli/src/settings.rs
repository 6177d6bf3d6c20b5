//! Persistent Demo Settings
//!
//! Band layout, sweep range, pipeline tuning and audio format for the demo.
//!
//! # Storage Locations
//! - Linux: `~/.config/glide/settings.json`
//! - Windows: `%APPDATA%\glide\settings.json`
//! - macOS: `~/Library/Application Support/com.glide.glide/settings.json`

use std::fs;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use glide_core::{CutDirection, CutSlope, FilterKind, FilterParameters, ParametricShape, PipelineConfig};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

/// Frequency sweep applied to one band by the control thread
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepSettings {
    /// Index into `DemoSettings::bands`
    pub band: usize,
    pub min_hz: f32,
    pub max_hz: f32,
    /// Time for one full up-and-down sweep
    pub period_seconds: f32,
    /// How often the control thread writes a new frequency
    pub update_interval_ms: u64,
}

impl Default for SweepSettings {
    fn default() -> Self {
        Self {
            band: 2,
            min_hz: 200.0,
            max_hz: 4000.0,
            period_seconds: 8.0,
            update_interval_ms: 10,
        }
    }
}

/// Root settings structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DemoSettings {
    /// Used offline, and as a fallback when the device reports no rate
    pub sample_rate: u32,
    /// Frames rendered per simulated callback
    pub block_size: usize,
    /// Peak amplitude of the white noise source
    pub noise_level: f32,
    pub bands: Vec<FilterParameters>,
    #[serde(default)]
    pub sweep: SweepSettings,
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

impl Default for DemoSettings {
    fn default() -> Self {
        let sample_rate = 48000;
        let sr = sample_rate as f32;
        Self {
            sample_rate,
            block_size: 256,
            noise_level: 0.1,
            bands: vec![
                FilterParameters::cut(CutDirection::LowCut, CutSlope::Db24, 40.0, sr),
                FilterParameters {
                    kind: FilterKind::Parametric(ParametricShape::LowShelf),
                    ..FilterParameters::peak(120.0, 0.707, 3.0, sr)
                },
                FilterParameters::peak(1000.0, 2.0, 9.0, sr),
                FilterParameters {
                    kind: FilterKind::Parametric(ParametricShape::HighShelf),
                    ..FilterParameters::peak(8000.0, 0.707, -2.0, sr)
                },
                FilterParameters::cut(CutDirection::HighCut, CutSlope::Db12, 18000.0, sr),
            ],
            sweep: SweepSettings::default(),
            pipeline: PipelineConfig::default(),
        }
    }
}

impl DemoSettings {
    /// Load settings from disk, or return default if missing/corrupt
    pub fn load() -> Self {
        if let Some(path) = Self::get_config_path() {
            if path.exists() {
                if let Some(settings) = Self::load_from(&path) {
                    return settings;
                }
            }
        }

        info!("Using default settings");
        Self::default()
    }

    /// Load from an explicit path; `None` if unreadable or invalid
    pub fn load_from(path: &Path) -> Option<Self> {
        let file = match fs::File::open(path) {
            Ok(file) => file,
            Err(e) => {
                error!("Failed to open settings file: {}", e);
                return None;
            }
        };
        match serde_json::from_reader::<_, Self>(file) {
            Ok(settings) => match settings.validate() {
                Ok(()) => {
                    info!("Settings loaded from {:?}", path);
                    Some(settings)
                }
                Err(e) => {
                    error!("Ignoring invalid settings file: {}", e);
                    None
                }
            },
            Err(e) => {
                error!("Failed to parse settings file: {}", e);
                None
            }
        }
    }

    /// Save settings to disk
    pub fn save(&self) -> Result<(), String> {
        let path = Self::get_config_path().ok_or("Could not determine config path")?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), String> {
        // Ensure directory exists
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| e.to_string())?;
        }

        let file = fs::File::create(path).map_err(|e| e.to_string())?;
        serde_json::to_writer_pretty(file, self).map_err(|e| e.to_string())?;

        info!("Settings saved to {:?}", path);
        Ok(())
    }

    /// Copy of the bands retuned to `sample_rate`
    pub fn bands_at(&self, sample_rate: f32) -> Vec<FilterParameters> {
        self.bands
            .iter()
            .map(|band| FilterParameters {
                sample_rate,
                ..*band
            })
            .collect()
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.sample_rate == 0 {
            return Err("Sample rate must be positive".into());
        }
        if self.block_size == 0 || self.block_size > 8192 {
            return Err(format!("Invalid block size: {}", self.block_size));
        }
        if self.bands.is_empty() {
            return Err("At least one band is required".into());
        }
        if self.sweep.band >= self.bands.len() {
            return Err(format!(
                "Sweep band {} out of range ({} bands)",
                self.sweep.band,
                self.bands.len()
            ));
        }
        if !(self.sweep.min_hz > 0.0 && self.sweep.min_hz < self.sweep.max_hz) {
            return Err(format!(
                "Invalid sweep range: {}-{}Hz",
                self.sweep.min_hz, self.sweep.max_hz
            ));
        }
        if !(self.sweep.period_seconds > 0.0) || self.sweep.update_interval_ms == 0 {
            return Err("Sweep period and update interval must be positive".into());
        }
        // One link per band on each stereo channel, all sharing the release pool
        let release = &self.pipeline.release_pool;
        let links = self.bands.len() * 2;
        if links > release.max_links {
            return Err(format!(
                "{} bands need {} filter links but the release pool is sized for {}",
                self.bands.len(),
                links,
                release.max_links
            ));
        }
        let block_rate = self.sample_rate as f32 / self.block_size as f32;
        if block_rate > release.max_blocks_per_second {
            return Err(format!(
                "Block size {} at {}Hz exceeds the release pool's {} blocks/s",
                self.block_size, self.sample_rate, release.max_blocks_per_second
            ));
        }
        self.pipeline.validate()
    }

    /// Get the platform-specific configuration file path
    fn get_config_path() -> Option<PathBuf> {
        ProjectDirs::from("com", "glide", "glide")
            .map(|proj| proj.config_dir().join("settings.json"))
    }
}
