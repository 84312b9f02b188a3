//! Asset decoding, voice playback and stream negotiation end to end

use crate::common::{audio_config, started_engine, write_wav, BLOCK, SAMPLE_RATE};
use moa_core::domain::asset::AudioAsset;
use moa_core::domain::audio::{ChannelGains, Speaker, DOWNMIX_BLEED};
use moa_core::domain::spatial::{Position, Quadrant, VolumeBounds};
use moa_infra::assets::generate_test_calls;
use moa_infra::{ManualBackend, SoundEngine};
use std::collections::HashSet;
use std::sync::Arc;
use tempfile::TempDir;

fn approx(a: f32, b: f32) -> bool {
    (a - b).abs() < 1e-3
}

// ============================================================================
// PLAYBACK
// ============================================================================

#[test]
fn test_one_second_call_retires_after_44_blocks() {
    let dir = TempDir::new().unwrap();
    write_wav(&dir.path().join("call.wav"), &vec![0.5; SAMPLE_RATE as usize]);
    let backend = ManualBackend::new();
    let engine = started_engine(dir.path(), backend.clone());

    let id = engine.play_sound("call.wav", ChannelGains::solo(Speaker::FrontLeft, 1.0));
    assert!(id.is_some());

    let first = backend.tick(BLOCK).unwrap();
    assert_eq!(first.len(), BLOCK * 6);
    assert!(approx(first[0], 0.5));
    assert!(first[1..6].iter().all(|&s| s == 0.0));

    for _ in 1..43 {
        backend.tick(BLOCK).unwrap();
    }
    assert_eq!(engine.active_voice_count(), 1);

    // 44100 - 43 * 1024 = 68 frames remain, then silence
    let last = backend.tick(BLOCK).unwrap();
    assert!(approx(last[67 * 6], 0.5));
    assert_eq!(last[68 * 6], 0.0);
    assert_eq!(engine.active_voice_count(), 0);
}

#[test]
fn test_decoded_asset_is_shared_between_voices() {
    let dir = TempDir::new().unwrap();
    write_wav(&dir.path().join("call.wav"), &[0.25; 2048]);
    let backend = ManualBackend::new();
    let engine = started_engine(dir.path(), backend.clone());

    engine.play_sound("call.wav", ChannelGains::solo(Speaker::Center, 1.0));
    engine.play_sound("call.wav", ChannelGains::solo(Speaker::Center, 1.0));
    assert_eq!(engine.cache().len(), 1);
    assert_eq!(engine.active_voice_count(), 2);

    let first = engine.cache().load("call.wav").unwrap();
    let second = engine.cache().load("call.wav").unwrap();
    assert!(Arc::ptr_eq(&first, &second));

    let block = backend.tick(BLOCK).unwrap();
    assert!(approx(block[Speaker::Center.index()], 0.5));
}

#[test]
fn test_gains_follow_the_quadrant() {
    let dir = TempDir::new().unwrap();
    let backend = ManualBackend::new();
    let engine = started_engine(dir.path(), backend.clone());
    engine.cache().insert(AudioAsset::new("ones", vec![1.0; 16], SAMPLE_RATE));

    let bounds = VolumeBounds::default();
    let position = Position::new(Quadrant::RearLeft.center_angle(), 1.0);
    engine.play_sound("ones", bounds.speaker_gains(&position));

    let block = backend.tick(4).unwrap();
    let frame = &block[..6];
    assert!(approx(frame[Speaker::RearLeft.index()], 0.8));
    assert!(approx(frame[Speaker::FrontLeft.index()], 0.2));
    assert!(approx(frame[Speaker::Lfe.index()], 0.15));
    assert_eq!(frame[Speaker::FrontRight.index()], 0.0);
    assert_eq!(frame[Speaker::Center.index()], 0.0);
    assert_eq!(frame[Speaker::RearRight.index()], 0.0);
}

#[test]
fn test_generated_calls_load_at_mixer_rate() {
    let dir = TempDir::new().unwrap();
    let paths = generate_test_calls(dir.path(), SAMPLE_RATE).unwrap();
    let backend = ManualBackend::new();
    let engine = started_engine(dir.path(), backend);

    let names: Vec<String> = paths
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    let failures = engine.cache().preload(names.iter().map(String::as_str));
    assert!(failures.is_empty(), "{failures:?}");

    for name in &names {
        let asset = engine.cache().load(name).unwrap();
        assert_eq!(asset.sample_rate(), SAMPLE_RATE);
        assert_eq!(asset.len(), 2 * SAMPLE_RATE as usize);
    }
}

#[test]
fn test_unreadable_asset_yields_no_voice() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("broken.wav"), b"not audio").unwrap();
    let engine = started_engine(dir.path(), ManualBackend::new());

    assert_eq!(engine.play_sound("broken.wav", ChannelGains::silent()), None);
    assert_eq!(engine.play_sound("missing.wav", ChannelGains::silent()), None);
    assert_eq!(engine.active_voice_count(), 0);
    assert!(engine.cache().is_empty());
}

// ============================================================================
// STREAM NEGOTIATION
// ============================================================================

#[test]
fn test_refused_surround_plays_in_stereo() {
    let dir = TempDir::new().unwrap();
    let backend = ManualBackend::new().refuse([6]);
    let engine = started_engine(dir.path(), backend.clone());

    let state = engine.stream_state();
    assert!(state.opened);
    assert!(state.downmix_active);
    assert_eq!(state.active_channels, 2);
    assert_eq!(backend.open_config().unwrap().channels, 2);

    engine.cache().insert(AudioAsset::new("ones", vec![1.0; 8], SAMPLE_RATE));
    engine.play_sound(
        "ones",
        ChannelGains::solo(Speaker::Center, 1.0).with(Speaker::RearRight, 1.0),
    );
    let block = backend.tick(8).unwrap();
    assert_eq!(block.len(), 16);
    assert!(approx(block[0], DOWNMIX_BLEED));
    assert!(approx(block[1], 2.0 * DOWNMIX_BLEED));
}

#[test]
fn test_no_device_keeps_voices_pending() {
    let dir = TempDir::new().unwrap();
    let backend = ManualBackend::unavailable();
    let engine = started_engine(dir.path(), backend.clone());

    let state = engine.stream_state();
    assert!(!state.opened);
    assert_eq!(state.active_channels, 0);
    assert_eq!(backend.open_attempts(), vec![6, 2]);

    engine.cache().insert(AudioAsset::new("short", vec![0.1; 4], SAMPLE_RATE));
    for _ in 0..3 {
        assert!(engine.play_sound("short", ChannelGains::silent()).is_some());
    }
    assert_eq!(engine.active_voice_count(), 3);
    assert!(backend.tick(BLOCK).is_none());
    assert_eq!(engine.active_voice_count(), 3);
}

#[test]
fn test_silent_engine_never_claims_a_stream() {
    let dir = TempDir::new().unwrap();
    let mut engine = SoundEngine::silent(&audio_config(dir.path()));

    let state = engine.start();
    assert!(!state.opened);
    assert_eq!(state.active_channels, 0);
    assert!(!engine.is_running());

    engine.cache().insert(AudioAsset::new("short", vec![0.1; 4], SAMPLE_RATE));
    assert!(engine.play_sound("short", ChannelGains::silent()).is_some());
    engine.stop();
}

#[test]
fn test_restart_stays_in_stereo() {
    let dir = TempDir::new().unwrap();
    let backend = ManualBackend::new().refuse([6]);
    let mut engine = started_engine(dir.path(), backend.clone());

    engine.stop();
    assert!(!backend.is_open());
    let state = engine.start();
    assert!(state.downmix_active);
    assert_eq!(backend.open_attempts(), vec![6, 2, 2]);
}

// ============================================================================
// CONCURRENCY
// ============================================================================

#[test]
fn test_producers_race_the_callback() {
    let dir = TempDir::new().unwrap();
    let backend = ManualBackend::new();
    let engine = started_engine(dir.path(), backend.clone());
    let asset = engine
        .cache()
        .insert(AudioAsset::new("blip", vec![0.01; 100], SAMPLE_RATE));

    let producers: Vec<_> = (0..4)
        .map(|_| {
            let player = engine.player();
            let asset = Arc::clone(&asset);
            std::thread::spawn(move || {
                (0..250)
                    .map(|_| player.play_asset(Arc::clone(&asset), ChannelGains::solo(Speaker::Center, 0.5)))
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let mut ticks = 0;
    while producers.iter().any(|p| !p.is_finished()) && ticks < 10_000 {
        backend.tick(BLOCK).unwrap();
        ticks += 1;
    }
    let ids: HashSet<_> = producers
        .into_iter()
        .flat_map(|p| p.join().unwrap())
        .collect();
    assert_eq!(ids.len(), 1000);

    // Every voice is shorter than a block, so one more tick retires the rest
    backend.tick(BLOCK).unwrap();
    assert_eq!(engine.active_voice_count(), 0);
}
