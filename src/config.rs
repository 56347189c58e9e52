use std::path::Path;

use anyhow::{ensure, Context, Result};
use serde::Deserialize;

use crate::optimizer::control::{ControlLimits, StimulusParams};

/// Full runtime configuration, loaded from YAML. Every section and field
/// has a default so a partial (or absent) file still yields a complete,
/// runnable configuration.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub bluetooth: Bluetooth,
    pub audio: Audio,
    pub optimizer: Optimizer,
    pub initial: Initial,
    pub control: Control,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Bluetooth {
    /// Stream-resolution timeout, seconds.
    pub timeout: f32,
}

impl Default for Bluetooth {
    fn default() -> Self {
        Self { timeout: 5.0 }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Audio {
    /// Output sample rate, Hz.
    pub rate: u32,
    /// Device submission chunk, frames.
    pub chunk: usize,
}

impl Default for Audio {
    fn default() -> Self {
        Self {
            rate: 44_100,
            chunk: 1024,
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Optimizer {
    /// Acquisition sample rate, Hz.
    pub fs: f32,
    /// Decision window, seconds of wall-clock time.
    pub window_size: f32,
    /// Target frequency band, [lo_hz, hi_hz].
    pub target_band: [f32; 2],
    /// Per-decision stimulus length, seconds. Defaults to the window size;
    /// the two durations are deliberately independent.
    pub stimulus_duration: Option<f32>,
}

impl Default for Optimizer {
    fn default() -> Self {
        Self {
            fs: 256.0,
            window_size: 2.0,
            target_band: [8.0, 12.0],
            stimulus_duration: None,
        }
    }
}

impl Optimizer {
    pub fn stimulus_duration(&self) -> f32 {
        self.stimulus_duration.unwrap_or(self.window_size)
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Initial {
    pub carrier: f32,
    pub split: f32,
}

impl Default for Initial {
    fn default() -> Self {
        Self {
            carrier: 220.0,
            split: 10.0,
        }
    }
}

impl Initial {
    pub fn params(&self) -> StimulusParams {
        StimulusParams {
            carrier_hz: self.carrier,
            split_hz: self.split,
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Control {
    pub carrier_bounds: [f32; 2],
    pub split_bounds: [f32; 2],
    pub max_step_hz: f32,
    /// EWMA coefficient for the estimate history, 0..=1.
    pub smoothing: f32,
}

impl Default for Control {
    fn default() -> Self {
        let limits = ControlLimits::default();
        Self {
            carrier_bounds: [limits.carrier_hz.0, limits.carrier_hz.1],
            split_bounds: [limits.split_hz.0, limits.split_hz.1],
            max_step_hz: limits.max_step_hz,
            smoothing: 0.5,
        }
    }
}

impl Control {
    pub fn limits(&self) -> ControlLimits {
        ControlLimits {
            carrier_hz: (self.carrier_bounds[0], self.carrier_bounds[1]),
            split_hz: (self.split_bounds[0], self.split_bounds[1]),
            max_step_hz: self.max_step_hz,
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config: Config = serde_yaml::from_str(&raw)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads the file if it exists, otherwise falls back to the built-in
    /// defaults (logged, so a typo'd path is noticeable).
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            log::warn!(
                "config file {} not found, using built-in defaults",
                path.display()
            );
            Ok(Self::default())
        }
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(self.bluetooth.timeout > 0.0, "bluetooth.timeout must be positive");
        ensure!(self.audio.rate > 0, "audio.rate must be positive");
        ensure!(self.optimizer.fs > 0.0, "optimizer.fs must be positive");
        ensure!(
            self.optimizer.window_size > 0.0,
            "optimizer.window_size must be positive"
        );
        let [lo, hi] = self.optimizer.target_band;
        ensure!(
            lo >= 0.0 && hi > lo,
            "optimizer.target_band must satisfy 0 <= lo < hi"
        );
        ensure!(
            self.optimizer.stimulus_duration() > 0.0,
            "optimizer.stimulus_duration must be positive"
        );
        ensure!(
            self.control.carrier_bounds[0] > 0.0
                && self.control.carrier_bounds[1] > self.control.carrier_bounds[0],
            "control.carrier_bounds must satisfy 0 < min < max"
        );
        ensure!(
            self.control.split_bounds[0] >= 0.0
                && self.control.split_bounds[1] >= self.control.split_bounds[0],
            "control.split_bounds must satisfy 0 <= min <= max"
        );
        ensure!(self.control.max_step_hz > 0.0, "control.max_step_hz must be positive");
        ensure!(
            (0.0..=1.0).contains(&self.control.smoothing),
            "control.smoothing must be within 0..=1"
        );
        Ok(())
    }
}
