//! CPAL-based output backend and device enumeration
//!
//! Provides a cross-platform interface to output devices using the CPAL library.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam::channel::{bounded, Receiver};
use moa_core::domain::audio::{
    AudioEnumerator, AudioError, ChannelCount, DeviceInfo, OutputBackend, OutputStream,
    RenderCallback, Result, StreamConfig,
};
use std::fmt;
use tracing::{debug, info, warn};

/// Host errors kept until the non-real-time side drains them
const ERROR_QUEUE_DEPTH: usize = 32;

#[allow(deprecated)]
fn device_name(device: &cpal::Device) -> String {
    device
        .name()
        .unwrap_or_else(|_| "Unknown Device".to_string())
}

/// Describe an output device from its supported configurations
fn describe(device: &cpal::Device, is_default: bool) -> DeviceInfo {
    let name = device_name(device);
    let mut sample_rates = Vec::new();
    let mut channel_counts = Vec::new();

    if let Ok(configs) = device.supported_output_configs() {
        for config in configs {
            for rate in [config.min_sample_rate(), config.max_sample_rate()] {
                if !sample_rates.contains(&rate) {
                    sample_rates.push(rate);
                }
            }
            let channels = ChannelCount::from_count(config.channels());
            if !channel_counts.contains(&channels) {
                channel_counts.push(channels);
            }
        }
    }

    sample_rates.sort_unstable();
    channel_counts.sort_by_key(|cc| cc.count());

    let default_sample_rate = device
        .default_output_config()
        .ok()
        .map(|config| config.sample_rate());

    debug!(device = %name, channels = ?channel_counts, "Described output device");

    DeviceInfo {
        name,
        channel_counts,
        sample_rates,
        default_sample_rate,
        is_default,
    }
}

/// CPAL-based output device enumerator
pub struct CpalEnumerator {
    host: cpal::Host,
}

impl Default for CpalEnumerator {
    fn default() -> Self {
        info!("Initializing CPAL enumerator");
        Self::new()
    }
}

impl CpalEnumerator {
    pub fn new() -> Self {
        let host = cpal::default_host();
        debug!("Using audio host: {:?}", host.id());
        Self { host }
    }
}

impl AudioEnumerator for CpalEnumerator {
    fn output_devices(&self) -> Result<Vec<DeviceInfo>> {
        info!("Enumerating output devices");
        let default_name = self.host.default_output_device().map(|d| device_name(&d));

        let devices: Vec<DeviceInfo> = self
            .host
            .output_devices()
            .map_err(|e| AudioError::OsError(e.to_string()))?
            .map(|device| {
                let is_default = default_name.as_deref() == Some(device_name(&device).as_str());
                describe(&device, is_default)
            })
            .collect();

        info!("Found {} output devices", devices.len());
        Ok(devices)
    }

    fn default_output_device(&self) -> Result<DeviceInfo> {
        let device = self
            .host
            .default_output_device()
            .ok_or_else(|| AudioError::DeviceNotFound("No default output device".to_string()))?;
        Ok(describe(&device, true))
    }
}

impl fmt::Debug for CpalEnumerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CpalEnumerator")
            .field("host", &self.host.id())
            .finish()
    }
}

/// Opens f32 output streams on the default or a named device
pub struct CpalBackend {
    host: cpal::Host,
    device_name: Option<String>,
}

impl CpalBackend {
    pub fn new(device_name: Option<String>) -> Self {
        Self {
            host: cpal::default_host(),
            device_name,
        }
    }

    fn device(&self) -> Result<cpal::Device> {
        match &self.device_name {
            Some(name) => self
                .host
                .output_devices()
                .map_err(|e| AudioError::OsError(e.to_string()))?
                .find(|d| device_name(d) == *name)
                .ok_or_else(|| AudioError::DeviceNotFound(name.clone())),
            None => self
                .host
                .default_output_device()
                .ok_or_else(|| AudioError::DeviceNotFound("No default output device".to_string())),
        }
    }
}

impl Default for CpalBackend {
    fn default() -> Self {
        Self::new(None)
    }
}

impl OutputBackend for CpalBackend {
    fn name(&self) -> &str {
        "cpal"
    }

    fn open(&self, config: &StreamConfig, mut render: RenderCallback) -> Result<Box<dyn OutputStream>> {
        let device = self.device()?;
        let refused = |reason: String| AudioError::DeviceOpenError {
            channels: config.channels,
            reason,
        };

        info!(
            device = %device_name(&device),
            channels = config.channels,
            sample_rate = config.sample_rate,
            block_size = config.block_size,
            "Creating output stream"
        );

        let cpal_config = cpal::StreamConfig {
            channels: config.channels,
            sample_rate: config.sample_rate,
            buffer_size: cpal::BufferSize::Fixed(config.block_size),
        };

        let (error_tx, error_rx) = bounded(ERROR_QUEUE_DEPTH);
        let stream = device
            .build_output_stream(
                &cpal_config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| render(data),
                move |err| {
                    // Dropped when the queue is full; the oldest reports are kept
                    let _ = error_tx.try_send(err.to_string());
                },
                None,
            )
            .map_err(|e| refused(format!("Failed to build stream: {e}")))?;

        stream
            .play()
            .map_err(|e| refused(format!("Failed to start stream: {e}")))?;

        Ok(Box::new(CpalOutputStream {
            stream,
            errors: error_rx,
        }))
    }
}

impl fmt::Debug for CpalBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CpalBackend")
            .field("host", &self.host.id())
            .field("device_name", &self.device_name)
            .finish()
    }
}

/// A playing CPAL stream; dropping it closes the device
pub struct CpalOutputStream {
    stream: cpal::Stream,
    errors: Receiver<String>,
}

impl OutputStream for CpalOutputStream {
    fn pause(&mut self) -> Result<()> {
        self.stream.pause().map_err(|e| {
            warn!(error = %e, "Failed to pause stream");
            AudioError::OsError(e.to_string())
        })
    }

    fn drain_errors(&mut self) -> Vec<String> {
        self.errors.try_iter().collect()
    }
}
