//! Asset decoders
//!
//! [`FallbackDecoder`] is the decoder the engine installs: symphonia first,
//! then ffmpeg for compressed formats symphonia rejects.

pub mod symphonia_decoder;
pub mod transcode;

pub use symphonia_decoder::SymphoniaDecoder;
pub use transcode::FfmpegTranscoder;

use moa_core::domain::asset::{AssetDecoder, DecodedAudio};
use moa_core::domain::audio::{AudioError, Result};
use std::path::Path;
use tracing::{debug, warn};

/// Extensions that are retried through the transcoder
pub const TRANSCODE_EXTENSIONS: [&str; 1] = ["mp3"];

fn wants_transcode(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|ext| TRANSCODE_EXTENSIONS.iter().any(|t| ext.eq_ignore_ascii_case(t)))
        .unwrap_or(false)
}

#[derive(Debug, Clone)]
pub struct FallbackDecoder {
    primary: SymphoniaDecoder,
    transcoder: Option<FfmpegTranscoder>,
}

impl FallbackDecoder {
    /// Symphonia with an ffmpeg fallback producing `sample_rate` audio
    pub fn new(sample_rate: u32) -> Self {
        Self {
            primary: SymphoniaDecoder::new(),
            transcoder: Some(FfmpegTranscoder::new(sample_rate)),
        }
    }

    pub fn with_transcoder(mut self, transcoder: FfmpegTranscoder) -> Self {
        self.transcoder = Some(transcoder);
        self
    }

    /// Never shell out
    pub fn without_transcoder(mut self) -> Self {
        self.transcoder = None;
        self
    }
}

impl AssetDecoder for FallbackDecoder {
    fn decode(&self, path: &Path) -> Result<DecodedAudio> {
        let primary_error = match self.primary.decode(path) {
            Ok(audio) => return Ok(audio),
            Err(e) => e,
        };

        let Some(transcoder) = self.transcoder.as_ref().filter(|_| wants_transcode(path)) else {
            return Err(primary_error);
        };

        debug!(path = %path.display(), error = %primary_error, "Retrying through ffmpeg");
        transcoder
            .transcode_with(path, |wav| self.primary.decode(wav))
            .map_err(|fallback| {
                warn!(path = %path.display(), error = %fallback, "Transcoding failed");
                AudioError::decode(
                    path.display().to_string(),
                    format!("{primary_error}; ffmpeg fallback: {fallback}"),
                )
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_wav(path: &Path, sample_rate: u32, samples: &[i16]) {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for &s in samples {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_wants_transcode() {
        assert!(wants_transcode(Path::new("a.mp3")));
        assert!(wants_transcode(Path::new("a.MP3")));
        assert!(!wants_transcode(Path::new("a.wav")));
        assert!(!wants_transcode(Path::new("mp3")));
    }

    #[test]
    fn test_wav_decodes_without_transcoder() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("call.wav");
        write_wav(&path, 44100, &[0, 8192, -8192, 0]);

        let decoded = FallbackDecoder::new(44100).without_transcoder().decode(&path).unwrap();
        assert_eq!(decoded.samples.len(), 4);
        assert!((decoded.samples[1] - 0.25).abs() < 1e-3);
    }

    #[test]
    fn test_broken_wav_is_not_transcoded() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.wav");
        std::fs::write(&path, b"garbage").unwrap();

        let decoder = FallbackDecoder::new(44100)
            .with_transcoder(FfmpegTranscoder::new(44100).with_program("moa-no-such-transcoder"));
        let err = decoder.decode(&path).unwrap_err();
        match err {
            AudioError::DecodeError { reason, .. } => assert!(!reason.contains("ffmpeg fallback")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_mp3_failure_reports_both_attempts() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.mp3");
        std::fs::write(&path, b"garbage").unwrap();

        let decoder = FallbackDecoder::new(44100)
            .with_transcoder(FfmpegTranscoder::new(44100).with_program("moa-no-such-transcoder"));
        match decoder.decode(&path).unwrap_err() {
            AudioError::DecodeError { reason, .. } => assert!(reason.contains("ffmpeg fallback")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_mp3_decodes_through_transcoder() {
        use std::os::unix::fs::PermissionsExt;

        let rate = 22050;
        let dir = TempDir::new().unwrap();
        let converted = dir.path().join("converted.wav");
        write_wav(&converted, rate, &[0, 4096, 8192, 4096, 0, -4096]);
        let record = dir.path().join("output-path");
        let program = dir.path().join("fake-ffmpeg");
        let script = format!(
            "#!/bin/sh\nfor last; do :; done\necho \"$last\" > \"{}\"\ncp \"{}\" \"$last\"\n",
            record.display(),
            converted.display()
        );
        std::fs::write(&program, script).unwrap();
        std::fs::set_permissions(&program, std::fs::Permissions::from_mode(0o755)).unwrap();

        let mp3 = dir.path().join("call.mp3");
        std::fs::write(&mp3, b"garbage").unwrap();

        let decoder =
            FallbackDecoder::new(rate).with_transcoder(FfmpegTranscoder::new(rate).with_program(&program));
        let decoded = decoder.decode(&mp3).unwrap();
        assert_eq!(decoded.channels, 1);
        assert_eq!(decoded.sample_rate, rate);
        assert_eq!(decoded.samples.len(), 6);
        assert!((decoded.samples[2] - 0.25).abs() < 1e-3);

        let output = std::fs::read_to_string(&record).unwrap();
        assert!(!std::path::Path::new(output.trim()).exists());
    }
}
