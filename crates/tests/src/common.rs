//! Shared fixtures

use moa_core::domain::config::AudioConfig;
use moa_infra::{ManualBackend, SoundEngine};
use std::path::Path;

pub const SAMPLE_RATE: u32 = 44100;
pub const BLOCK: usize = 1024;

/// Write a mono 16-bit WAV holding `samples`
pub fn write_wav(path: &Path, samples: &[f32]) {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).unwrap();
    for &sample in samples {
        writer
            .write_sample((sample * i16::MAX as f32) as i16)
            .unwrap();
    }
    writer.finalize().unwrap();
}

pub fn audio_config(assets_dir: &Path) -> AudioConfig {
    AudioConfig {
        assets_dir: assets_dir.to_path_buf(),
        ..AudioConfig::default()
    }
}

/// Started engine on a manual backend; the returned backend drives its ticks
pub fn started_engine(assets_dir: &Path, backend: ManualBackend) -> SoundEngine {
    let mut engine = SoundEngine::with_default_decoder(&audio_config(assets_dir), Box::new(backend));
    engine.start();
    engine
}
