//! Sound engine façade
//!
//! Bundles the asset cache, the voice registry and the stream controller
//! behind one owner. Producers get cheap [`SoundPlayer`] clones; the engine
//! itself stays with whoever controls the stream lifecycle.

use crate::audio::{CpalBackend, ManualBackend};
use crate::decode::FallbackDecoder;
use moa_core::domain::asset::{AssetCache, AssetDecoder, CachePolicy};
use moa_core::domain::audio::{ChannelGains, OutputBackend, StreamState};
use moa_core::domain::config::AudioConfig;
use moa_core::domain::player::SoundPlayer;
use moa_core::domain::stream::StreamController;
use moa_core::domain::voice::{VoiceId, VoiceRegistry};
use std::sync::Arc;
use tracing::info;

pub struct SoundEngine {
    player: SoundPlayer,
    controller: StreamController,
}

impl SoundEngine {
    pub fn new(
        config: &AudioConfig,
        backend: Box<dyn OutputBackend>,
        decoder: Arc<dyn AssetDecoder>,
    ) -> Self {
        let backend_name = backend.name().to_string();
        let cache = AssetCache::new(&config.assets_dir, config.sample_rate, decoder)
            .with_policy(CachePolicy::from_capacity(config.cache_capacity));
        let registry = Arc::new(VoiceRegistry::new());
        let controller = StreamController::new(backend, Arc::clone(&registry), config.stream_config());

        info!(
            assets_dir = %config.assets_dir.display(),
            sample_rate = config.sample_rate,
            channels = config.channels,
            block_size = config.block_size,
            backend = %backend_name,
            "Sound engine created"
        );

        Self {
            player: SoundPlayer::new(Arc::new(cache), registry),
            controller,
        }
    }

    /// Engine decoding through symphonia with the ffmpeg fallback
    pub fn with_default_decoder(config: &AudioConfig, backend: Box<dyn OutputBackend>) -> Self {
        let decoder = Arc::new(FallbackDecoder::new(config.sample_rate));
        Self::new(config, backend, decoder)
    }

    /// Engine on the configured cpal output device
    pub fn cpal(config: &AudioConfig) -> Self {
        let backend = Box::new(CpalBackend::new(config.output_device.clone()));
        Self::with_default_decoder(config, backend)
    }

    /// Engine that never opens a device
    ///
    /// Starting it reports an unopened stream; voices are accepted but
    /// nothing renders them.
    pub fn silent(config: &AudioConfig) -> Self {
        Self::with_default_decoder(config, Box::new(ManualBackend::unavailable()))
    }

    /// Open the output stream
    ///
    /// Never fails: an unavailable device leaves the engine silent, which
    /// the returned state reports.
    pub fn start(&mut self) -> StreamState {
        *self.controller.start()
    }

    /// Close the output stream and drop every voice
    pub fn stop(&mut self) {
        self.controller.stop();
        let cancelled = self.player.cancel_all();
        if cancelled > 0 {
            info!(cancelled, "Cancelled active voices");
        }
    }

    /// Handle for starting sounds from other threads
    pub fn player(&self) -> SoundPlayer {
        self.player.clone()
    }

    pub fn play_sound(&self, name: &str, gains: ChannelGains) -> Option<VoiceId> {
        self.player.play_sound(name, gains)
    }

    pub fn cancel(&self, id: VoiceId) -> bool {
        self.player.cancel(id)
    }

    pub fn active_voice_count(&self) -> usize {
        self.player.active_voice_count()
    }

    pub fn stream_state(&self) -> &StreamState {
        self.controller.state()
    }

    pub fn is_running(&self) -> bool {
        self.controller.is_running()
    }

    pub fn cache(&self) -> &Arc<AssetCache> {
        self.player.cache()
    }

    /// Log host errors reported since the last poll
    pub fn poll_diagnostics(&mut self) -> usize {
        self.controller.poll_diagnostics()
    }
}

impl Drop for SoundEngine {
    fn drop(&mut self) {
        info!("Shutting down sound engine");
        self.stop();
    }
}

impl std::fmt::Debug for SoundEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SoundEngine")
            .field("controller", &self.controller)
            .field("cache", self.player.cache())
            .field("active_voices", &self.active_voice_count())
            .finish()
    }
}
