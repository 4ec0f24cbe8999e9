use crate::playback::duration::{DurationPolicy, PointCountDuration, ProviderDuration};
use crate::playback::ResumeMode;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// Where the cycle duration of a route comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DurationSource {
    /// `max(min_duration_secs, points * secs_per_point)`
    #[default]
    PointCount,
    /// Sum of the provider's step durations
    Provider,
}

/// Playback tuning, persisted as JSON
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Seconds of playback per path point
    pub secs_per_point: f64,
    /// Shortest playback cycle, in seconds
    pub min_duration_secs: f64,
    /// Multiplier applied to the displayed speed
    pub speed_display_factor: f64,
    /// Speed multiplier a new player starts with
    pub default_speed: f64,
    /// Frame period of the player loop, in milliseconds
    pub frame_interval_ms: u64,
    pub resume_mode: ResumeMode,
    pub duration_source: DurationSource,
    /// Capacity of the bounded telemetry channel used by the CLI
    pub telemetry_buffer: usize,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            secs_per_point: 0.5,
            min_duration_secs: 10.0,
            speed_display_factor: 3.0,
            default_speed: 1.0,
            frame_interval_ms: 16,
            resume_mode: ResumeMode::Restart,
            duration_source: DurationSource::PointCount,
            telemetry_buffer: 256,
        }
    }
}

impl PlaybackConfig {
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("route-playback").join("config.json"))
    }

    /// Load the user's config, falling back to defaults
    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            return Self::default();
        };
        if !path.exists() {
            debug!("No config at {}, using defaults", path.display());
            return Self::default();
        }
        match Self::load_from(&path) {
            Ok(config) => config,
            Err(e) => {
                warn!("Ignoring config {}: {:#}", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: Self = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save to the user's config directory, returning the path written
    pub fn save(&self) -> Result<PathBuf> {
        let path = Self::config_path().context("No config directory on this system")?;
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("secs_per_point", self.secs_per_point),
            ("min_duration_secs", self.min_duration_secs),
            ("speed_display_factor", self.speed_display_factor),
            ("default_speed", self.default_speed),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                anyhow::bail!("{} must be a positive number, got {}", name, value);
            }
        }
        if self.frame_interval_ms == 0 {
            anyhow::bail!("frame_interval_ms must be at least 1");
        }
        if self.telemetry_buffer == 0 {
            anyhow::bail!("telemetry_buffer must be at least 1");
        }
        Ok(())
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms.max(1))
    }

    pub fn point_count_duration(&self) -> PointCountDuration {
        PointCountDuration {
            secs_per_point: self.secs_per_point,
            min_secs: self.min_duration_secs,
        }
    }

    pub fn duration_policy(&self) -> Box<dyn DurationPolicy> {
        match self.duration_source {
            DurationSource::PointCount => Box::new(self.point_count_duration()),
            DurationSource::Provider => Box::new(ProviderDuration {
                fallback: self.point_count_duration(),
            }),
        }
    }
}
