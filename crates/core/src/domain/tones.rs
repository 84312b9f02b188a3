//! Synthesized signals for audio checks and placeholder calls

use crate::domain::asset::AudioAsset;
use crate::domain::spatial::Quadrant;
use std::f64::consts::TAU;

/// Peak amplitude of every synthesized signal
pub const TONE_AMPLITUDE: f64 = 0.3;

/// Frequencies and file names of the generated placeholder calls
pub const TEST_CALLS: [(&str, f64); 5] = [
    ("rooster_call_1.wav", 600.0),
    ("rooster_call_2.wav", 550.0),
    ("rooster_call_3.wav", 650.0),
    ("rooster_call_4.wav", 580.0),
    ("rooster_call_5.wav", 620.0),
];

pub const TEST_CALL_SECS: f64 = 2.0;
pub const TEST_TONE_SECS: f64 = 0.5;

/// Distances each quadrant's check tone is played at, near to far
pub const TEST_TONE_DISTANCES: [f64; 3] = [10.0, 30.0, 70.0];
pub const TEST_TONE_GAP_SECS: f64 = 1.5;
/// Extra wait after the last tone of a quadrant
pub const TEST_TONE_QUADRANT_PAUSE_SECS: f64 = 0.5;

/// One tone of the speaker check
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToneStep {
    pub quadrant: Quadrant,
    pub distance: f64,
    /// Seconds to wait after starting this tone
    pub wait_secs: f64,
}

/// Speaker check order: quadrants in turn, each at every test distance
pub fn test_tone_schedule() -> Vec<ToneStep> {
    let last = TEST_TONE_DISTANCES.len() - 1;
    Quadrant::ALL
        .iter()
        .flat_map(|&quadrant| {
            TEST_TONE_DISTANCES
                .iter()
                .enumerate()
                .map(move |(i, &distance)| ToneStep {
                    quadrant,
                    distance,
                    wait_secs: if i == last {
                        TEST_TONE_GAP_SECS + TEST_TONE_QUADRANT_PAUSE_SECS
                    } else {
                        TEST_TONE_GAP_SECS
                    },
                })
        })
        .collect()
}

fn frame_count(sample_rate: u32, seconds: f64) -> usize {
    (f64::from(sample_rate) * seconds) as usize
}

/// Linear ramp from 0 to 1 over `len` samples, endpoints included
fn ramp(index: usize, len: usize) -> f64 {
    if len <= 1 {
        0.0
    } else {
        index as f64 / (len - 1) as f64
    }
}

/// Multiply the first `fade_in` samples by a rising ramp and the last
/// `fade_out` samples by a falling one
fn apply_fades(samples: &mut [f64], fade_in: usize, fade_out: usize) {
    let len = samples.len();
    let fade_in = fade_in.min(len);
    let fade_out = fade_out.min(len);
    for (i, sample) in samples[..fade_in].iter_mut().enumerate() {
        *sample *= ramp(i, fade_in);
    }
    for (i, sample) in samples[len - fade_out..].iter_mut().enumerate() {
        *sample *= 1.0 - ramp(i, fade_out);
    }
}

/// Sine tone with 50 ms fades at both ends
pub fn sine_tone(frequency: f64, seconds: f64, sample_rate: u32) -> Vec<f32> {
    let frames = frame_count(sample_rate, seconds);
    let rate = f64::from(sample_rate);
    let mut samples: Vec<f64> = (0..frames)
        .map(|i| (TAU * frequency * i as f64 / rate).sin() * TONE_AMPLITUDE)
        .collect();
    let fade = frame_count(sample_rate, 0.05);
    apply_fades(&mut samples, fade, fade);
    samples.into_iter().map(|s| s as f32).collect()
}

/// Frequency of the per-quadrant check tone
pub fn quadrant_tone_frequency(quadrant: Quadrant) -> f64 {
    440.0 + 100.0 * quadrant.index() as f64
}

/// Short identifying tone for a quadrant, ready to insert into a cache
pub fn quadrant_tone(quadrant: Quadrant, sample_rate: u32) -> AudioAsset {
    AudioAsset::new(
        format!("test-tone-{}", quadrant.label()),
        sine_tone(quadrant_tone_frequency(quadrant), TEST_TONE_SECS, sample_rate),
        sample_rate,
    )
}

/// Frequency-modulated placeholder call
///
/// A 2 Hz wobble of ±100 Hz around `frequency`, with a 50 ms attack and a
/// 300 ms release.
pub fn test_call(frequency: f64, seconds: f64, sample_rate: u32) -> Vec<f32> {
    let frames = frame_count(sample_rate, seconds);
    let rate = f64::from(sample_rate);
    let mut samples: Vec<f64> = (0..frames)
        .map(|i| {
            let t = i as f64 / rate;
            let modulation = (TAU * 2.0 * t).sin() * 100.0;
            (TAU * (frequency + modulation) * t).sin() * TONE_AMPLITUDE
        })
        .collect();
    apply_fades(
        &mut samples,
        frame_count(sample_rate, 0.05),
        frame_count(sample_rate, 0.3),
    );
    samples.into_iter().map(|s| s as f32).collect()
}
