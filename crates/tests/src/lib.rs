//! Cross-crate integration tests
//!
//! Everything here drives the engine through the manual backend, so the
//! suite runs without an audio device.

#[cfg(test)]
mod common;
#[cfg(test)]
mod playback_integration;
#[cfg(test)]
mod simulation_integration;
