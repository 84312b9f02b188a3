//! Generic decoding of self-describing containers with symphonia

use moa_core::domain::asset::{AssetDecoder, DecodedAudio};
use moa_core::domain::audio::{AudioError, Result};
use std::fs::File;
use std::io::ErrorKind;
use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::default::{get_codecs, get_probe};
use tracing::{debug, trace};

/// Decodes whatever symphonia's default codec set supports into interleaved f32
#[derive(Debug, Clone, Copy, Default)]
pub struct SymphoniaDecoder;

impl SymphoniaDecoder {
    pub fn new() -> Self {
        Self
    }
}

impl AssetDecoder for SymphoniaDecoder {
    fn decode(&self, path: &Path) -> Result<DecodedAudio> {
        let name = path.display().to_string();
        let fail = |reason: String| AudioError::decode(name.clone(), reason);

        let file = File::open(path).map_err(|e| fail(e.to_string()))?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let probed = get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| fail(format!("unrecognised container: {e}")))?;
        let mut format = probed.format;

        let track = format
            .default_track()
            .ok_or_else(|| fail("no default track".to_string()))?;
        let track_id = track.id;
        let mut sample_rate = track.codec_params.sample_rate;
        let mut channels = track.codec_params.channels.map(|c| c.count() as u16);

        let mut decoder = get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| fail(format!("unsupported codec: {e}")))?;

        let mut samples: Vec<f32> = Vec::new();
        let mut sample_buf: Option<SampleBuffer<f32>> = None;

        loop {
            let packet = match format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(e)) if e.kind() == ErrorKind::UnexpectedEof => break,
                Err(SymphoniaError::ResetRequired) => break,
                Err(e) => return Err(fail(e.to_string())),
            };
            if packet.track_id() != track_id {
                continue;
            }

            match decoder.decode(&packet) {
                Ok(audio_buf) => {
                    let spec = *audio_buf.spec();
                    sample_rate.get_or_insert(spec.rate);
                    channels.get_or_insert(spec.channels.count() as u16);

                    // Capacity is the codec's maximum packet length, so one buffer serves every packet
                    let buf = sample_buf.get_or_insert_with(|| {
                        SampleBuffer::<f32>::new(audio_buf.capacity() as u64, spec)
                    });
                    buf.copy_interleaved_ref(audio_buf);
                    samples.extend_from_slice(buf.samples());
                }
                Err(SymphoniaError::DecodeError(e)) => {
                    trace!(asset = %name, error = e, "Skipping corrupt packet");
                    continue;
                }
                Err(e) => return Err(fail(e.to_string())),
            }
        }

        let sample_rate = sample_rate.ok_or_else(|| fail("sample rate unknown".to_string()))?;
        let channels = channels.unwrap_or(1).max(1);

        debug!(
            asset = %name,
            channels,
            sample_rate,
            frames = samples.len() / channels as usize,
            "Decoded asset"
        );

        Ok(DecodedAudio {
            samples,
            channels,
            sample_rate,
        })
    }
}
