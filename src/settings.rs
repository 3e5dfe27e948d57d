use anyhow::{Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::sensing::SamplingConfig;
use crate::timer::{PhaseDurations, MAX_MINUTES};

/// Environment variable consulted when no `--settings` path is given.
pub const SETTINGS_ENV: &str = "PRESENCE_TIMER_SETTINGS";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct AudioSettings {
    pub enabled: bool,
    pub loop_volume: f32,
    pub bell_volume: f32,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            loop_volume: 0.4,
            bell_volume: 0.9,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct TimerSettings {
    pub work_minutes: u32,
    pub break_minutes: u32,
    pub tick_interval_ms: u64,
    pub presence_sample_interval_ms: u64,
    pub observation_timeout_ms: u64,
    pub audio: AudioSettings,
}

impl Default for TimerSettings {
    fn default() -> Self {
        let durations = PhaseDurations::default();
        let sampling = SamplingConfig::default();
        Self {
            work_minutes: durations.work_minutes,
            break_minutes: durations.break_minutes,
            tick_interval_ms: 1_000,
            presence_sample_interval_ms: sampling.interval.as_millis() as u64,
            observation_timeout_ms: sampling.timeout.as_millis() as u64,
            audio: AudioSettings::default(),
        }
    }
}

impl TimerSettings {
    /// Reads settings from `path`. A missing or malformed file yields defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings from {}", path.display()))?;
        match serde_json::from_str(&contents) {
            Ok(settings) => Ok(settings),
            Err(err) => {
                warn!(
                    "Ignoring malformed settings in {}: {err}",
                    path.display()
                );
                Ok(Self::default())
            }
        }
    }

    /// Explicit path first, then the environment.
    pub fn resolve_path(explicit: Option<PathBuf>) -> Option<PathBuf> {
        explicit.or_else(|| env::var_os(SETTINGS_ENV).map(PathBuf::from))
    }

    pub fn durations(&self) -> PhaseDurations {
        PhaseDurations {
            work_minutes: self.work_minutes.min(MAX_MINUTES),
            break_minutes: self.break_minutes.min(MAX_MINUTES),
        }
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }

    pub fn sampling(&self) -> SamplingConfig {
        SamplingConfig {
            interval: Duration::from_millis(self.presence_sample_interval_ms.max(1)),
            timeout: Duration::from_millis(self.observation_timeout_ms.max(1)),
        }
    }
}
