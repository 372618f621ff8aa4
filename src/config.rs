// Engine tuning knobs, read from <project>/.padloop/config.json when it exists.
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::shared::MAX_HUMANIZE_SECONDS;

const CONFIG_FILE: &str = "config.json";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// How far ahead of the audio clock steps are scheduled, in seconds.
    pub lookahead_secs: f64,
    /// How often the scheduler thread polls the audio clock, in milliseconds.
    pub poll_interval_ms: u64,
    /// Gap between `start()` returning and step 0 sounding, in seconds.
    pub start_delay_secs: f64,
    /// Humanize jitter at amount 1.0, in seconds.
    pub max_jitter_secs: f64,
    /// Where sample identifiers are resolved, relative to the project dir.
    pub sample_dir: PathBuf,
    /// Used for decoding when no output device reports a rate.
    pub fallback_sample_rate: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            lookahead_secs: 0.1,
            poll_interval_ms: 5,
            start_delay_secs: 0.02,
            max_jitter_secs: MAX_HUMANIZE_SECONDS,
            sample_dir: PathBuf::from("samples"),
            fallback_sample_rate: 44100,
        }
    }
}

impl EngineConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    // Negative or NaN values from a hand-edited file fall back to defaults
    pub fn sanitized(mut self) -> Self {
        let defaults = Self::default();
        if !(self.lookahead_secs > 0.0) {
            self.lookahead_secs = defaults.lookahead_secs;
        }
        if !(self.start_delay_secs >= 0.0) {
            self.start_delay_secs = defaults.start_delay_secs;
        }
        if !(self.max_jitter_secs >= 0.0) {
            self.max_jitter_secs = defaults.max_jitter_secs;
        }
        if self.fallback_sample_rate == 0 {
            self.fallback_sample_rate = defaults.fallback_sample_rate;
        }
        self
    }

    pub fn load(state_dir: &Path) -> anyhow::Result<Self> {
        let path = state_dir.join(CONFIG_FILE);
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(&path)?;
        let config: Self = serde_json::from_str(&data)?;
        Ok(config.sanitized())
    }
}
