//! In-flight playback instances and their shared registry
//!
//! The registry is the only state shared between producer threads and the
//! mixing callback. Every access goes through one mutex and the work done
//! while holding it is bounded and allocation-free on the mixing side.

use crate::domain::asset::AudioAsset;
use crate::domain::audio::ChannelGains;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

/// Voice slots reserved up front so registrations rarely rehash
pub const DEFAULT_VOICE_CAPACITY: usize = 64;

/// Opaque identifier of a voice, unique for the process lifetime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VoiceId(u64);

impl VoiceId {
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for VoiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "voice#{}", self.0)
    }
}

/// One playback of an asset
#[derive(Debug, Clone)]
pub struct Voice {
    id: VoiceId,
    asset: Arc<AudioAsset>,
    cursor: usize,
    gains: ChannelGains,
}

impl Voice {
    fn new(id: VoiceId, asset: Arc<AudioAsset>, gains: ChannelGains) -> Self {
        Self {
            id,
            asset,
            cursor: 0,
            gains,
        }
    }

    pub fn id(&self) -> VoiceId {
        self.id
    }

    pub fn asset(&self) -> &Arc<AudioAsset> {
        &self.asset
    }

    /// Frames already mixed
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn gains(&self) -> &ChannelGains {
        &self.gains
    }

    pub fn remaining(&self) -> usize {
        self.asset.len() - self.cursor
    }

    pub fn is_finished(&self) -> bool {
        self.cursor >= self.asset.len()
    }

    /// Next `frames` samples at most, without advancing
    pub fn segment(&self, frames: usize) -> &[f32] {
        let end = self.cursor + frames.min(self.remaining());
        &self.asset.samples()[self.cursor..end]
    }

    /// Move the cursor forward, never past the end of the asset
    pub fn advance(&mut self, frames: usize) {
        self.cursor += frames.min(self.remaining());
    }
}

/// Concurrency-safe set of active voices
pub struct VoiceRegistry {
    voices: Mutex<HashMap<VoiceId, Voice>>,
    next_id: AtomicU64,
}

impl VoiceRegistry {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_VOICE_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            voices: Mutex::new(HashMap::with_capacity(capacity)),
            next_id: AtomicU64::new(0),
        }
    }

    /// Register a new voice at cursor 0 and return its id
    ///
    /// An empty asset is already complete, so it gets an id but is never
    /// registered.
    pub fn play(&self, asset: Arc<AudioAsset>, gains: ChannelGains) -> VoiceId {
        let id = VoiceId(self.next_id.fetch_add(1, Ordering::Relaxed));
        if asset.is_empty() {
            debug!(%id, asset = asset.name(), "Skipping empty asset");
            return id;
        }
        self.lock().insert(id, Voice::new(id, asset, gains));
        id
    }

    /// Remove a voice before it finishes
    pub fn cancel(&self, id: VoiceId) -> bool {
        self.lock().remove(&id).is_some()
    }

    /// Remove every voice, returning how many were playing
    pub fn cancel_all(&self) -> usize {
        let mut voices = self.lock();
        let count = voices.len();
        voices.clear();
        count
    }

    pub fn active_count(&self) -> usize {
        self.lock().len()
    }

    pub fn contains(&self, id: VoiceId) -> bool {
        self.lock().contains_key(&id)
    }

    /// Copy of a voice's current state
    pub fn snapshot(&self, id: VoiceId) -> Option<Voice> {
        self.lock().get(&id).cloned()
    }

    /// Run `f` with exclusive access to the voice map
    pub(crate) fn with_voices<R>(&self, f: impl FnOnce(&mut HashMap<VoiceId, Voice>) -> R) -> R {
        f(&mut self.lock())
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<VoiceId, Voice>> {
        self.voices.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for VoiceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for VoiceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VoiceRegistry")
            .field("active", &self.active_count())
            .field("next_id", &self.next_id.load(Ordering::Relaxed))
            .finish()
    }
}
