//! Configuration management for moa
//!
//! This module provides:
//! - Configuration structs for the area, audio output, agent behaviour and
//!   the simulated clock
//! - TOML serialization with per-section defaults
//! - Async load/save through `tokio::fs`
//! - Validation of inconsistent values

use crate::domain::audio::StreamConfig;
use crate::domain::daylight::TimeOfDay;
use crate::domain::spatial::VolumeBounds;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tracing::{debug, info, instrument, warn};

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Default configuration file name
pub const DEFAULT_CONFIG_FILE: &str = "moa.toml";

/// Errors that can occur during configuration operations
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Bounds of the simulated area
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AreaConfig {
    /// Radius in metres around the listener
    pub max_radius: f64,
}

impl Default for AreaConfig {
    fn default() -> Self {
        Self { max_radius: 100.0 }
    }
}

/// Output device and mixing settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub sample_rate: u32,
    pub channels: u16,
    /// Frames per mixing callback
    pub block_size: u32,
    /// Directory holding the call assets
    pub assets_dir: PathBuf,
    /// Output device name (None = system default)
    pub output_device: Option<String>,
    /// Maximum cached assets (None = unbounded)
    pub cache_capacity: Option<usize>,
    pub volume: VolumeBounds,
}

impl Default for AudioConfig {
    fn default() -> Self {
        let stream = StreamConfig::default();
        Self {
            sample_rate: stream.sample_rate,
            channels: stream.channels,
            block_size: stream.block_size,
            assets_dir: PathBuf::from("calls"),
            output_device: None,
            cache_capacity: None,
            volume: VolumeBounds::default(),
        }
    }
}

impl AudioConfig {
    pub fn stream_config(&self) -> StreamConfig {
        StreamConfig {
            sample_rate: self.sample_rate,
            channels: self.channels,
            block_size: self.block_size,
        }
    }
}

/// Range an agent's curiosity factor is drawn from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CuriosityConfig {
    pub min: f64,
    pub max: f64,
}

impl Default for CuriosityConfig {
    fn default() -> Self {
        Self { min: 0.5, max: 1.5 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MovementConfig {
    /// Base probability of considering a move at a due check
    pub chance_to_move: f64,
    /// Probability that a considered move happens
    pub frequency: f64,
    /// Walk length range in metres
    pub distance_min: f64,
    pub distance_max: f64,
    pub curiosity: CuriosityConfig,
}

impl Default for MovementConfig {
    fn default() -> Self {
        Self {
            chance_to_move: 0.3,
            frequency: 0.5,
            distance_min: 2.0,
            distance_max: 15.0,
            curiosity: CuriosityConfig::default(),
        }
    }
}

/// Replies to nearby calling agents
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProximityResponseConfig {
    /// Metres within which another agent's call can trigger a reply
    pub trigger_distance: f64,
    pub reply_likelihood: f64,
    /// Relative jitter applied to `reply_likelihood`
    pub randomization: f64,
}

impl Default for ProximityResponseConfig {
    fn default() -> Self {
        Self {
            trigger_distance: 30.0,
            reply_likelihood: 0.6,
            randomization: 0.2,
        }
    }
}

/// Calling frequency multipliers over the simulated day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeOfDayConfig {
    pub enabled: bool,
    /// Centre of the dawn window, "HH:MM"
    pub dawn_time: String,
    pub dawn_duration_hours: f64,
    pub dawn_multiplier: f64,
    pub daylight_start: String,
    pub daylight_end: String,
    pub daylight_multiplier: f64,
    pub nighttime_multiplier: f64,
}

impl Default for TimeOfDayConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dawn_time: "06:00".to_string(),
            dawn_duration_hours: 1.0,
            dawn_multiplier: 5.0,
            daylight_start: "07:00".to_string(),
            daylight_end: "18:00".to_string(),
            daylight_multiplier: 1.5,
            nighttime_multiplier: 0.3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CallingConfig {
    /// Base probability of calling at a due check
    pub frequency: f64,
    pub proximity_response: ProximityResponseConfig,
    pub time_of_day: TimeOfDayConfig,
}

impl Default for CallingConfig {
    fn default() -> Self {
        Self {
            frequency: 0.1,
            proximity_response: ProximityResponseConfig::default(),
            time_of_day: TimeOfDayConfig::default(),
        }
    }
}

/// How strongly agents stick to one call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StickinessConfig {
    /// Fraction of agents that keep a preferred call
    pub percentage_sticky: f64,
    /// Chance a sticky agent prefers a non-default call
    pub alternate_call_chance: f64,
    /// Chance a sticky agent uses the default call anyway
    pub revert_to_default_chance: f64,
}

impl Default for StickinessConfig {
    fn default() -> Self {
        Self {
            percentage_sticky: 0.3,
            alternate_call_chance: 0.5,
            revert_to_default_chance: 0.1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CallsConfig {
    /// Asset name used when no other call is chosen
    pub default_call: String,
    /// Chance a non-sticky agent picks a random call
    pub variation_probability: f64,
    pub stickiness: StickinessConfig,
}

impl Default for CallsConfig {
    fn default() -> Self {
        Self {
            default_call: "rooster_call_1.wav".to_string(),
            variation_probability: 0.3,
            stickiness: StickinessConfig::default(),
        }
    }
}

/// Mapping from real elapsed time to the simulated time of day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationTimeConfig {
    /// "HH:MM"
    pub start_time: String,
    /// Simulated seconds per real second
    pub time_scale: f64,
}

impl Default for SimulationTimeConfig {
    fn default() -> Self {
        Self {
            start_time: "06:00".to_string(),
            time_scale: 60.0,
        }
    }
}

/// Complete moa configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MoaConfig {
    pub num_agents: usize,
    /// Seconds between decision checks
    pub time_unit: f64,
    /// Relative jitter applied to `time_unit`
    pub time_randomization: f64,
    pub area: AreaConfig,
    pub audio: AudioConfig,
    pub movement: MovementConfig,
    pub calling: CallingConfig,
    pub calls: CallsConfig,
    pub simulation_time: SimulationTimeConfig,
}

impl Default for MoaConfig {
    fn default() -> Self {
        Self {
            num_agents: 5,
            time_unit: 1.0,
            time_randomization: 0.2,
            area: AreaConfig::default(),
            audio: AudioConfig::default(),
            movement: MovementConfig::default(),
            calling: CallingConfig::default(),
            calls: CallsConfig::default(),
            simulation_time: SimulationTimeConfig::default(),
        }
    }
}

impl MoaConfig {
    /// Load configuration from TOML file
    #[instrument(skip(path))]
    pub async fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading configuration");

        let contents = fs::read_to_string(path).await?;
        let config: Self = toml::from_str(&contents)?;
        config.validate()?;

        debug!("Configuration loaded successfully");
        Ok(config)
    }

    /// Load the file if it exists, otherwise fall back to defaults
    ///
    /// A file that exists but cannot be parsed is still an error.
    #[instrument(skip(path))]
    pub async fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !fs::try_exists(path).await? {
            warn!(
                path = %path.display(),
                "Config file not found, using defaults"
            );
            return Ok(Self::default());
        }
        Self::load_from_file(path).await
    }

    /// Save configuration to TOML file
    #[instrument(skip(self, path))]
    pub async fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        info!(path = %path.display(), "Saving configuration");

        // Create parent directory if it doesn't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let toml_str = toml::to_string_pretty(self)?;
        fs::write(path, toml_str).await?;

        debug!("Configuration saved successfully");
        Ok(())
    }

    /// Reject values the engine or the agent model cannot work with
    pub fn validate(&self) -> Result<()> {
        let audio = &self.audio;
        if audio.sample_rate == 0 {
            return invalid("audio.sample_rate must be positive");
        }
        if audio.channels == 0 {
            return invalid("audio.channels must be positive");
        }
        if audio.block_size == 0 {
            return invalid("audio.block_size must be positive");
        }
        if audio.cache_capacity == Some(0) {
            return invalid("audio.cache_capacity must be positive when set");
        }

        let volume = &audio.volume;
        if volume.min_distance >= volume.max_distance {
            return invalid(format!(
                "audio.volume.min_distance ({}) must be below max_distance ({})",
                volume.min_distance, volume.max_distance
            ));
        }
        if volume.min_volume < 0.0 || volume.min_volume > volume.max_volume {
            return invalid("audio.volume requires 0 <= min_volume <= max_volume");
        }

        if self.area.max_radius <= 0.0 {
            return invalid("area.max_radius must be positive");
        }
        if self.time_unit <= 0.0 {
            return invalid("time_unit must be positive");
        }
        if !(0.0..1.0).contains(&self.time_randomization) {
            return invalid("time_randomization must be in [0, 1)");
        }

        let movement = &self.movement;
        if movement.distance_min < 0.0 || movement.distance_min > movement.distance_max {
            return invalid("movement requires 0 <= distance_min <= distance_max");
        }
        if movement.curiosity.min < 0.0 || movement.curiosity.min > movement.curiosity.max {
            return invalid("movement.curiosity requires 0 <= min <= max");
        }

        let calling = &self.calling;
        if calling.proximity_response.trigger_distance < 0.0 {
            return invalid("calling.proximity_response.trigger_distance must not be negative");
        }
        if calling.proximity_response.randomization < 0.0 {
            return invalid("calling.proximity_response.randomization must not be negative");
        }

        let stickiness = &self.calls.stickiness;
        for (name, value) in [
            ("movement.chance_to_move", movement.chance_to_move),
            ("movement.frequency", movement.frequency),
            ("calling.frequency", calling.frequency),
            (
                "calling.proximity_response.reply_likelihood",
                calling.proximity_response.reply_likelihood,
            ),
            ("calls.variation_probability", self.calls.variation_probability),
            ("calls.stickiness.percentage_sticky", stickiness.percentage_sticky),
            ("calls.stickiness.alternate_call_chance", stickiness.alternate_call_chance),
            (
                "calls.stickiness.revert_to_default_chance",
                stickiness.revert_to_default_chance,
            ),
        ] {
            check_probability(name, value)?;
        }

        if self.calls.default_call.trim().is_empty() {
            return invalid("calls.default_call must not be empty");
        }

        let tod = &calling.time_of_day;
        for (name, value) in [
            ("calling.time_of_day.dawn_time", &tod.dawn_time),
            ("calling.time_of_day.daylight_start", &tod.daylight_start),
            ("calling.time_of_day.daylight_end", &tod.daylight_end),
            ("simulation_time.start_time", &self.simulation_time.start_time),
        ] {
            TimeOfDay::parse(value)
                .map_err(|e| ConfigError::Invalid(format!("{name}: {e}")))?;
        }
        if tod.dawn_duration_hours < 0.0 || tod.dawn_duration_hours > 24.0 {
            return invalid("calling.time_of_day.dawn_duration_hours must be in [0, 24]");
        }
        if self.simulation_time.time_scale < 0.0 {
            return invalid("simulation_time.time_scale must not be negative");
        }

        Ok(())
    }
}

fn invalid(message: impl Into<String>) -> Result<()> {
    Err(ConfigError::Invalid(message.into()))
}

fn check_probability(name: &str, value: f64) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        invalid(format!("{name} must be in [0, 1], got {value}"))
    }
}
