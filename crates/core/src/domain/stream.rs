//! Output stream lifecycle and channel negotiation
//!
//! The controller opens the device through an [`OutputBackend`], wiring a
//! [`Mixer`] over the shared voice registry as the render callback. When the
//! requested surround layout is refused it retries once in stereo and keeps
//! downmixing for the rest of the process. Device failures never surface as
//! errors from [`StreamController::start`]; they only degrade to silence.

use crate::domain::audio::{OutputBackend, OutputStream, Result, StreamConfig, StreamState};
use crate::domain::mixer::{MixMode, Mixer};
use crate::domain::voice::VoiceRegistry;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Channel count used by the stereo fallback
pub const STEREO_CHANNELS: u16 = 2;

/// Owns the output stream and its negotiated [`StreamState`]
pub struct StreamController {
    backend: Box<dyn OutputBackend>,
    registry: Arc<VoiceRegistry>,
    config: StreamConfig,
    state: StreamState,
    stream: Option<Box<dyn OutputStream>>,
    /// Set after the first refused surround attempt and never cleared
    stereo_fallback: bool,
}

impl StreamController {
    pub fn new(
        backend: Box<dyn OutputBackend>,
        registry: Arc<VoiceRegistry>,
        config: StreamConfig,
    ) -> Self {
        Self {
            backend,
            registry,
            state: StreamState::idle(&config),
            config,
            stream: None,
            stereo_fallback: false,
        }
    }

    /// Open the output stream, falling back to stereo if needed
    ///
    /// A no-op while a stream is already open.
    pub fn start(&mut self) -> &StreamState {
        if self.stream.is_some() {
            debug!("Output stream already running");
            return &self.state;
        }

        let requested = self.config.channels;

        if !self.stereo_fallback {
            match self.open(requested, false) {
                Ok(stream) => {
                    self.install(stream, requested, false);
                    return &self.state;
                }
                Err(e) if requested > STEREO_CHANNELS => {
                    warn!(
                        backend = self.backend.name(),
                        channels = requested,
                        error = %e,
                        "Surround output unavailable, retrying in stereo"
                    );
                    self.stereo_fallback = true;
                }
                Err(e) => {
                    warn!(
                        backend = self.backend.name(),
                        channels = requested,
                        error = %e,
                        "Could not open output stream, continuing without audio"
                    );
                    self.state = StreamState {
                        active_channels: 0,
                        opened: false,
                        ..StreamState::idle(&self.config)
                    };
                    return &self.state;
                }
            }
        }

        match self.open(STEREO_CHANNELS, true) {
            Ok(stream) => self.install(stream, STEREO_CHANNELS, true),
            Err(e) => {
                warn!(
                    backend = self.backend.name(),
                    error = %e,
                    "Stereo output unavailable as well, continuing without audio"
                );
                self.state = StreamState {
                    active_channels: 0,
                    downmix_active: true,
                    opened: false,
                    ..StreamState::idle(&self.config)
                };
            }
        }
        &self.state
    }

    /// Halt and release the device
    pub fn stop(&mut self) {
        let Some(mut stream) = self.stream.take() else {
            return;
        };
        if let Err(e) = stream.pause() {
            warn!(error = %e, "Failed to pause output stream");
        }
        for error in stream.drain_errors() {
            warn!(error = %error, "Output stream reported an error");
        }
        drop(stream);
        self.state.opened = false;
        info!(backend = self.backend.name(), "Output stream stopped");
    }

    pub fn state(&self) -> &StreamState {
        &self.state
    }

    pub fn is_running(&self) -> bool {
        self.stream.is_some()
    }

    /// Log errors the host reported since the last poll
    ///
    /// Returns how many were drained.
    pub fn poll_diagnostics(&mut self) -> usize {
        let Some(stream) = self.stream.as_mut() else {
            return 0;
        };
        let errors = stream.drain_errors();
        for error in &errors {
            warn!(backend = self.backend.name(), error = %error, "Output stream reported an error");
        }
        errors.len()
    }

    fn open(&self, channels: u16, downmix: bool) -> Result<Box<dyn OutputStream>> {
        let config = self.config.with_channels(channels);
        let mode = if downmix {
            MixMode::StereoDownmix
        } else {
            MixMode::Direct {
                channels: channels as usize,
            }
        };
        debug!(
            backend = self.backend.name(),
            channels,
            sample_rate = config.sample_rate,
            block_size = config.block_size,
            "Opening output stream"
        );
        let mixer = Mixer::new(Arc::clone(&self.registry), mode);
        self.backend.open(&config, mixer.into_callback())
    }

    fn install(&mut self, stream: Box<dyn OutputStream>, channels: u16, downmix: bool) {
        self.stream = Some(stream);
        self.state = StreamState {
            requested_channels: self.config.channels,
            active_channels: channels,
            downmix_active: downmix,
            sample_rate: self.config.sample_rate,
            block_size: self.config.block_size,
            opened: true,
        };
        info!(
            backend = self.backend.name(),
            channels,
            sample_rate = self.state.sample_rate,
            mode = self.state.mode_label(),
            "Output stream started"
        );
    }
}

impl Drop for StreamController {
    fn drop(&mut self) {
        self.stop();
    }
}

impl fmt::Debug for StreamController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamController")
            .field("backend", &self.backend.name())
            .field("state", &self.state)
            .field("stereo_fallback", &self.stereo_fallback)
            .finish()
    }
}
