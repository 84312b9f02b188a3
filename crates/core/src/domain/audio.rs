//! Audio domain models and output abstractions
//!
//! This module defines the platform-agnostic pieces of the engine: the error
//! taxonomy, the 5.1 speaker layout and per-voice gain vectors, stream
//! configuration, and the traits an output backend must implement.
//! Implementations for real devices live in the `infra` crate.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur in the audio subsystem
#[derive(Debug, Error)]
pub enum AudioError {
    /// Asset path does not exist under the assets directory
    #[error("Asset not found: {0}")]
    AssetNotFound(String),

    /// Neither the generic decoder nor the transcoder could read the asset
    #[error("Failed to decode {name}: {reason}")]
    DecodeError { name: String, reason: String },

    /// The output device refused the requested configuration
    #[error("Unable to open {channels}-channel output stream: {reason}")]
    DeviceOpenError { channels: u16, reason: String },

    /// Requested audio device was not found
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    /// Invalid configuration for the engine
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Error reported by the host audio API
    #[error("OS error: {0}")]
    OsError(String),
}

impl AudioError {
    pub fn decode(name: impl Into<String>, reason: impl ToString) -> Self {
        AudioError::DecodeError {
            name: name.into(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, AudioError>;

/// Number of speakers in the 5.1 layout
pub const SURROUND_CHANNELS: usize = 6;

/// Center and rear bleed used when folding 5.1 gains into stereo
pub const DOWNMIX_BLEED: f32 = 0.7;

/// Speakers of a 5.1 layout, in output channel order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Speaker {
    FrontLeft,
    FrontRight,
    Center,
    Lfe,
    RearLeft,
    RearRight,
}

impl Speaker {
    pub const ALL: [Speaker; SURROUND_CHANNELS] = [
        Speaker::FrontLeft,
        Speaker::FrontRight,
        Speaker::Center,
        Speaker::Lfe,
        Speaker::RearLeft,
        Speaker::RearRight,
    ];

    /// Output channel index of this speaker
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn label(self) -> &'static str {
        match self {
            Speaker::FrontLeft => "FL",
            Speaker::FrontRight => "FR",
            Speaker::Center => "C",
            Speaker::Lfe => "LFE",
            Speaker::RearLeft => "RL",
            Speaker::RearRight => "RR",
        }
    }
}

/// Per-speaker linear gains for one voice
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ChannelGains([f32; SURROUND_CHANNELS]);

impl ChannelGains {
    pub const fn new(gains: [f32; SURROUND_CHANNELS]) -> Self {
        Self(gains)
    }

    pub const fn silent() -> Self {
        Self([0.0; SURROUND_CHANNELS])
    }

    /// Full gain on a single speaker
    pub fn solo(speaker: Speaker, gain: f32) -> Self {
        Self::silent().with(speaker, gain)
    }

    pub fn with(mut self, speaker: Speaker, gain: f32) -> Self {
        self.0[speaker.index()] = gain;
        self
    }

    pub fn get(&self, speaker: Speaker) -> f32 {
        self.0[speaker.index()]
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn to_array(self) -> [f32; SURROUND_CHANNELS] {
        self.0
    }

    /// Fold the 5.1 gains into a (left, right) pair
    ///
    /// LFE has no stereo destination and is dropped.
    pub fn stereo_downmix(&self) -> (f32, f32) {
        let center = DOWNMIX_BLEED * self.get(Speaker::Center);
        let left = self.get(Speaker::FrontLeft) + center + DOWNMIX_BLEED * self.get(Speaker::RearLeft);
        let right =
            self.get(Speaker::FrontRight) + center + DOWNMIX_BLEED * self.get(Speaker::RearRight);
        (left, right)
    }
}

impl From<[f32; SURROUND_CHANNELS]> for ChannelGains {
    fn from(gains: [f32; SURROUND_CHANNELS]) -> Self {
        Self(gains)
    }
}

/// Number of audio channels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelCount {
    Mono,
    Stereo,
    Surround(u16),
}

impl ChannelCount {
    pub fn count(&self) -> u16 {
        match self {
            ChannelCount::Mono => 1,
            ChannelCount::Stereo => 2,
            ChannelCount::Surround(n) => *n,
        }
    }

    pub fn from_count(n: u16) -> Self {
        match n {
            1 => ChannelCount::Mono,
            2 => ChannelCount::Stereo,
            n => ChannelCount::Surround(n),
        }
    }
}

/// Parameters used to open an output stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamConfig {
    pub sample_rate: u32,
    pub channels: u16,
    /// Frames per callback
    pub block_size: u32,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            channels: 6,
            block_size: 1024,
        }
    }
}

impl StreamConfig {
    pub fn with_channels(mut self, channels: u16) -> Self {
        self.channels = channels;
        self
    }
}

/// Outcome of channel negotiation, fixed between start and stop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamState {
    pub requested_channels: u16,
    pub active_channels: u16,
    pub downmix_active: bool,
    pub sample_rate: u32,
    pub block_size: u32,
    /// Whether a device stream is currently open
    pub opened: bool,
}

impl StreamState {
    /// State before any stream was started
    pub fn idle(config: &StreamConfig) -> Self {
        Self {
            requested_channels: config.channels,
            active_channels: config.channels,
            downmix_active: false,
            sample_rate: config.sample_rate,
            block_size: config.block_size,
            opened: false,
        }
    }

    pub fn mode_label(&self) -> &'static str {
        if self.downmix_active {
            "Stereo (spatial audio adapted)"
        } else if self.active_channels as usize == SURROUND_CHANNELS {
            "5.1 Surround Sound"
        } else {
            "Direct"
        }
    }
}

/// Information about an output device
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub name: String,
    pub channel_counts: Vec<ChannelCount>,
    pub sample_rates: Vec<u32>,
    pub default_sample_rate: Option<u32>,
    pub is_default: bool,
}

/// Render callback handed to a backend
///
/// Receives an interleaved block of `frames * channels` samples and must fill
/// it completely. It runs on the real-time audio thread.
pub type RenderCallback = Box<dyn FnMut(&mut [f32]) + Send + 'static>;

/// An open output stream
///
/// Dropping the stream releases the device.
pub trait OutputStream {
    /// Halt playback
    fn pause(&mut self) -> Result<()>;

    /// Errors reported asynchronously by the host since the last call
    fn drain_errors(&mut self) -> Vec<String> {
        Vec::new()
    }
}

/// Something that can open output streams
pub trait OutputBackend {
    /// Backend name for diagnostics
    fn name(&self) -> &str;

    /// Open and start a stream with the given configuration
    ///
    /// Fails with [`AudioError::DeviceOpenError`] when the device refuses
    /// the configuration.
    fn open(&self, config: &StreamConfig, render: RenderCallback) -> Result<Box<dyn OutputStream>>;
}

/// Trait for enumerating output devices
pub trait AudioEnumerator {
    /// List all output devices
    fn output_devices(&self) -> Result<Vec<DeviceInfo>>;

    /// Get the default output device
    fn default_output_device(&self) -> Result<DeviceInfo>;
}
