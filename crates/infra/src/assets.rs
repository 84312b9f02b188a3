//! Writing generated calls to disk

use moa_core::domain::tones::{test_call, TEST_CALLS, TEST_CALL_SECS};
use std::path::{Path, PathBuf};
use tracing::info;

/// Write mono 32-bit float PCM as a WAV file
pub fn write_wav(path: &Path, samples: &[f32], sample_rate: u32) -> hound::Result<()> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut writer = hound::WavWriter::create(path, spec)?;
    for &sample in samples {
        writer.write_sample(sample)?;
    }
    writer.finalize()
}

/// Synthesize the placeholder calls into `dir`, creating it if needed
///
/// Existing files with the same names are overwritten.
pub fn generate_test_calls(dir: &Path, sample_rate: u32) -> hound::Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)?;
    let mut written = Vec::with_capacity(TEST_CALLS.len());
    for (name, frequency) in TEST_CALLS {
        let path = dir.join(name);
        write_wav(&path, &test_call(frequency, TEST_CALL_SECS, sample_rate), sample_rate)?;
        info!(path = %path.display(), frequency, "Generated test call");
        written.push(path);
    }
    Ok(written)
}
