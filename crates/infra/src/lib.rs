//! Platform side of the mixing engine: output devices, decoders and asset files

pub mod assets;
pub mod audio;
pub mod decode;

pub use audio::{CpalBackend, CpalEnumerator, ManualBackend, SoundEngine};
pub use decode::FallbackDecoder;
