//! Producer-side handle for starting sounds
//!
//! [`SoundPlayer`] only holds the asset cache and the voice registry, so it
//! can be cloned into any thread without touching the device stream.

use crate::domain::asset::{AssetCache, AudioAsset};
use crate::domain::audio::ChannelGains;
use crate::domain::voice::{VoiceId, VoiceRegistry};
use std::sync::Arc;
use tracing::{trace, warn};

#[derive(Debug, Clone)]
pub struct SoundPlayer {
    cache: Arc<AssetCache>,
    registry: Arc<VoiceRegistry>,
}

impl SoundPlayer {
    pub fn new(cache: Arc<AssetCache>, registry: Arc<VoiceRegistry>) -> Self {
        Self { cache, registry }
    }

    /// Start the named asset with the given gains
    ///
    /// Load failures are logged and produce no voice.
    pub fn play_sound(&self, name: &str, gains: ChannelGains) -> Option<VoiceId> {
        match self.cache.load(name) {
            Ok(asset) => {
                let id = self.registry.play(asset, gains);
                trace!(%id, asset = name, "Voice started");
                Some(id)
            }
            Err(e) => {
                warn!(asset = name, error = %e, "Cannot play sound");
                None
            }
        }
    }

    /// Start an already decoded asset
    pub fn play_asset(&self, asset: Arc<AudioAsset>, gains: ChannelGains) -> VoiceId {
        self.registry.play(asset, gains)
    }

    pub fn cancel(&self, id: VoiceId) -> bool {
        self.registry.cancel(id)
    }

    pub fn cancel_all(&self) -> usize {
        self.registry.cancel_all()
    }

    pub fn active_voice_count(&self) -> usize {
        self.registry.active_count()
    }

    pub fn cache(&self) -> &Arc<AssetCache> {
        &self.cache
    }

    pub fn registry(&self) -> &Arc<VoiceRegistry> {
        &self.registry
    }
}
