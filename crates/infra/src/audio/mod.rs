//! Output backends and the engine that drives them
//!
//! The cpal backend reaches the platform audio API (WASAPI, ALSA/PulseAudio,
//! CoreAudio). The manual backend renders only when ticked.

pub mod cpal_backend;
pub mod engine;
pub mod manual;

pub use cpal_backend::*;
pub use engine::SoundEngine;
pub use manual::ManualBackend;
