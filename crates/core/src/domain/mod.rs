//! Domain entities and business rules

pub mod agent;
pub mod asset;
pub mod audio;
pub mod config;
pub mod daylight;
pub mod mixer;
pub mod player;
pub mod simulation;
pub mod spatial;
pub mod stream;
pub mod tones;
pub mod voice;

// Re-export specific items to avoid ambiguous glob imports
pub use agent::Agent;
pub use asset::{discover_assets, AssetCache, AssetDecoder, AudioAsset, CachePolicy, DecodedAudio};
pub use audio::{
    AudioEnumerator, AudioError, ChannelCount, ChannelGains, DeviceInfo, OutputBackend,
    OutputStream, RenderCallback, Speaker, StreamConfig, StreamState,
};
pub use config::{ConfigError, MoaConfig};
pub use daylight::{DaylightSchedule, SimClock, TimeOfDay};
pub use mixer::{MixMode, Mixer};
pub use player::SoundPlayer;
pub use simulation::{CallEvent, SilentSink, SimulationStats, Simulator, SoundSink};
pub use spatial::{Position, Quadrant, VolumeBounds};
pub use stream::StreamController;
pub use voice::{Voice, VoiceId, VoiceRegistry};
