//! Output backend driven by explicit ticks instead of a device clock
//!
//! Used for headless runs and tests. Clones share state, so a test can hand
//! one clone to the engine and keep another to drive the callback.

use moa_core::domain::audio::{
    AudioError, OutputBackend, OutputStream, RenderCallback, Result, StreamConfig,
};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

struct Shared {
    refuse_all: bool,
    refused: Vec<u16>,
    attempts: Vec<u16>,
    open: Option<OpenStream>,
    ticks: u64,
}

struct OpenStream {
    config: StreamConfig,
    render: RenderCallback,
    paused: bool,
}

#[derive(Clone)]
pub struct ManualBackend {
    shared: Arc<Mutex<Shared>>,
}

impl ManualBackend {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Mutex::new(Shared {
                refuse_all: false,
                refused: Vec::new(),
                attempts: Vec::new(),
                open: None,
                ticks: 0,
            })),
        }
    }

    /// Backend that rejects every open
    pub fn unavailable() -> Self {
        let backend = Self::new();
        backend.lock().refuse_all = true;
        backend
    }

    /// Reject any stream opened with one of `channels`
    pub fn refuse(self, channels: impl IntoIterator<Item = u16>) -> Self {
        self.lock().refused.extend(channels);
        self
    }

    pub fn is_open(&self) -> bool {
        self.lock().open.is_some()
    }

    /// Configuration of the open stream
    pub fn open_config(&self) -> Option<StreamConfig> {
        self.lock().open.as_ref().map(|s| s.config)
    }

    /// Channel counts of every open attempt, in order
    pub fn open_attempts(&self) -> Vec<u16> {
        self.lock().attempts.clone()
    }

    /// Callback invocations so far
    pub fn ticks(&self) -> u64 {
        self.lock().ticks
    }

    /// Run the callback for one block of `frames`
    ///
    /// Returns the interleaved block, or None when no stream is playing.
    pub fn tick(&self, frames: usize) -> Option<Vec<f32>> {
        let mut shared = self.lock();
        let stream = shared.open.as_mut().filter(|s| !s.paused)?;
        let mut block = vec![0.0; frames * stream.config.channels as usize];
        (stream.render)(&mut block);
        shared.ticks += 1;
        Some(block)
    }

    /// Tick with the configured block size
    pub fn tick_block(&self) -> Option<Vec<f32>> {
        let frames = self.open_config()?.block_size as usize;
        self.tick(frames)
    }

    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for ManualBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ManualBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let shared = self.lock();
        f.debug_struct("ManualBackend")
            .field("refuse_all", &shared.refuse_all)
            .field("refused", &shared.refused)
            .field("attempts", &shared.attempts)
            .field("open", &shared.open.as_ref().map(|s| s.config))
            .finish()
    }
}

impl OutputBackend for ManualBackend {
    fn name(&self) -> &str {
        "manual"
    }

    fn open(&self, config: &StreamConfig, render: RenderCallback) -> Result<Box<dyn OutputStream>> {
        let mut shared = self.lock();
        shared.attempts.push(config.channels);
        if shared.refuse_all || shared.refused.contains(&config.channels) {
            debug!(channels = config.channels, "Manual backend refusing stream");
            return Err(AudioError::DeviceOpenError {
                channels: config.channels,
                reason: "refused by manual backend".to_string(),
            });
        }
        shared.open = Some(OpenStream {
            config: *config,
            render,
            paused: false,
        });
        Ok(Box::new(ManualStream {
            shared: Arc::clone(&self.shared),
        }))
    }
}

struct ManualStream {
    shared: Arc<Mutex<Shared>>,
}

impl ManualStream {
    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl OutputStream for ManualStream {
    fn pause(&mut self) -> Result<()> {
        if let Some(stream) = self.lock().open.as_mut() {
            stream.paused = true;
        }
        Ok(())
    }
}

impl Drop for ManualStream {
    fn drop(&mut self) {
        let closed = self.lock().open.take();
        drop(closed);
    }
}
