//! Decoded audio assets and the name-keyed asset cache
//!
//! Assets are decoded once, folded to mono and shared as `Arc<AudioAsset>`.
//! Decoding itself is delegated to an [`AssetDecoder`] so the cache stays
//! free of codec and process concerns.

use crate::domain::audio::{AudioError, Result};
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;
use tracing::{debug, info, warn};

/// File extensions treated as audio when scanning the assets directory
pub const AUDIO_EXTENSIONS: [&str; 4] = ["wav", "mp3", "ogg", "flac"];

/// Immutable mono PCM loaded from disk or synthesized
#[derive(Debug, Clone, PartialEq)]
pub struct AudioAsset {
    name: String,
    samples: Vec<f32>,
    sample_rate: u32,
}

impl AudioAsset {
    pub fn new(name: impl Into<String>, samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            name: name.into(),
            samples,
            sample_rate,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Sample rate the asset was decoded at
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Length in frames
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.samples.len() as f64 / self.sample_rate as f64)
    }
}

/// Interleaved PCM as produced by a decoder
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAudio {
    pub samples: Vec<f32>,
    pub channels: u16,
    pub sample_rate: u32,
}

impl DecodedAudio {
    /// Average all channels of each frame into a single sample
    pub fn into_mono(self) -> Vec<f32> {
        let channels = self.channels as usize;
        if channels <= 1 {
            return self.samples;
        }
        let scale = 1.0 / channels as f32;
        self.samples
            .chunks_exact(channels)
            .map(|frame| frame.iter().sum::<f32>() * scale)
            .collect()
    }
}

/// Turns an audio file into PCM
pub trait AssetDecoder: Send + Sync {
    /// Decode the file at `path`
    ///
    /// Fails with [`AudioError::DecodeError`] when the file cannot be read.
    fn decode(&self, path: &Path) -> Result<DecodedAudio>;
}

/// Eviction behaviour of the [`AssetCache`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CachePolicy {
    /// Keep every asset for the process lifetime
    #[default]
    Unbounded,
    /// Keep at most `capacity` assets, evicting the least recently used
    Lru { capacity: usize },
}

impl CachePolicy {
    /// `None` or `Some(0)` means unbounded
    pub fn from_capacity(capacity: Option<usize>) -> Self {
        match capacity {
            Some(capacity) if capacity > 0 => CachePolicy::Lru { capacity },
            _ => CachePolicy::Unbounded,
        }
    }
}

struct CacheEntry {
    asset: Arc<AudioAsset>,
    last_used: AtomicU64,
}

/// Name-keyed cache of decoded assets
///
/// Lookups only take a read lock. Population of new entries is serialized so
/// concurrent first access to a name decodes it exactly once.
pub struct AssetCache {
    assets_dir: PathBuf,
    mixer_rate: u32,
    decoder: Arc<dyn AssetDecoder>,
    policy: CachePolicy,
    entries: RwLock<HashMap<String, CacheEntry>>,
    load_lock: Mutex<()>,
    clock: AtomicU64,
}

impl AssetCache {
    pub fn new(
        assets_dir: impl Into<PathBuf>,
        mixer_rate: u32,
        decoder: Arc<dyn AssetDecoder>,
    ) -> Self {
        Self {
            assets_dir: assets_dir.into(),
            mixer_rate,
            decoder,
            policy: CachePolicy::Unbounded,
            entries: RwLock::new(HashMap::new()),
            load_lock: Mutex::new(()),
            clock: AtomicU64::new(0),
        }
    }

    pub fn with_policy(mut self, policy: CachePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn assets_dir(&self) -> &Path {
        &self.assets_dir
    }

    pub fn policy(&self) -> CachePolicy {
        self.policy
    }

    /// Resolve `name` to a decoded asset, decoding it on first use
    pub fn load(&self, name: &str) -> Result<Arc<AudioAsset>> {
        if let Some(asset) = self.lookup(name) {
            return Ok(asset);
        }

        let _guard = self.load_lock.lock().unwrap_or_else(PoisonError::into_inner);

        // Another caller may have finished the same load while we waited.
        if let Some(asset) = self.lookup(name) {
            return Ok(asset);
        }

        let path = self.resolve(name)?;
        if !path.is_file() {
            return Err(AudioError::AssetNotFound(path.display().to_string()));
        }

        debug!(name, path = %path.display(), "Decoding asset");
        let decoded = self.decoder.decode(&path)?;
        let native_rate = decoded.sample_rate;
        let source_channels = decoded.channels;

        if native_rate != self.mixer_rate {
            warn!(
                name,
                native_rate,
                mixer_rate = self.mixer_rate,
                "Asset sample rate differs from mixer rate, playing without resampling"
            );
        }

        let asset = Arc::new(AudioAsset::new(name, decoded.into_mono(), native_rate));
        info!(
            name,
            frames = asset.len(),
            channels = source_channels,
            sample_rate = native_rate,
            "Loaded asset"
        );

        self.store(name.to_string(), Arc::clone(&asset));
        Ok(asset)
    }

    /// Register already-decoded PCM under `name`, replacing any previous entry
    pub fn insert(&self, asset: AudioAsset) -> Arc<AudioAsset> {
        let asset = Arc::new(asset);
        let _guard = self.load_lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.store(asset.name().to_string(), Arc::clone(&asset));
        asset
    }

    /// Load every name, returning the failures
    pub fn preload<'a, I>(&self, names: I) -> Vec<(String, AudioError)>
    where
        I: IntoIterator<Item = &'a str>,
    {
        names
            .into_iter()
            .filter_map(|name| self.load(name).err().map(|e| (name.to_string(), e)))
            .collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.read_entries().contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.read_entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lookup(&self, name: &str) -> Option<Arc<AudioAsset>> {
        let entries = self.read_entries();
        let entry = entries.get(name)?;
        entry.last_used.store(self.tick(), Ordering::Relaxed);
        Some(Arc::clone(&entry.asset))
    }

    fn store(&self, name: String, asset: Arc<AudioAsset>) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);

        if let CachePolicy::Lru { capacity } = self.policy {
            while entries.len() >= capacity.max(1) && !entries.contains_key(&name) {
                let oldest = entries
                    .iter()
                    .min_by_key(|(_, entry)| entry.last_used.load(Ordering::Relaxed))
                    .map(|(key, _)| key.clone());
                match oldest {
                    Some(key) => {
                        entries.remove(&key);
                        debug!(name = %key, "Evicted asset");
                    }
                    None => break,
                }
            }
        }

        entries.insert(
            name,
            CacheEntry {
                asset,
                last_used: AtomicU64::new(self.tick()),
            },
        );
    }

    fn read_entries(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, CacheEntry>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed)
    }

    /// Join `name` onto the assets directory, refusing names that escape it
    fn resolve(&self, name: &str) -> Result<PathBuf> {
        let relative = Path::new(name);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if name.is_empty() || escapes {
            return Err(AudioError::AssetNotFound(name.to_string()));
        }
        Ok(self.assets_dir.join(relative))
    }
}

impl std::fmt::Debug for AssetCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssetCache")
            .field("assets_dir", &self.assets_dir)
            .field("mixer_rate", &self.mixer_rate)
            .field("policy", &self.policy)
            .field("len", &self.len())
            .finish()
    }
}

/// Whether `path` has one of the [`AUDIO_EXTENSIONS`]
pub fn is_audio_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|ext| AUDIO_EXTENSIONS.iter().any(|known| ext.eq_ignore_ascii_case(known)))
        .unwrap_or(false)
}

/// List the audio files in `dir`, sorted by name
///
/// A missing directory is created and reported as empty.
pub fn discover_assets(dir: &Path) -> std::io::Result<Vec<String>> {
    if !dir.exists() {
        warn!(path = %dir.display(), "Assets directory not found, creating it");
        std::fs::create_dir_all(dir)?;
        return Ok(Vec::new());
    }

    let mut names = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && is_audio_file(&path) {
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                names.push(name.to_string());
            }
        }
    }
    names.sort();

    if names.is_empty() {
        warn!(
            path = %dir.display(),
            "No audio files found, simulation will run without audio"
        );
    }
    Ok(names)
}
