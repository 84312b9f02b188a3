//! Real-time mixing of active voices into an output block
//!
//! [`Mixer::render`] is the body of the device callback. It sums every
//! active voice into the interleaved block, advances cursors and retires
//! finished voices, all under the registry lock.
//!
//! Requirements of the hot path:
//! - No allocations
//! - No logging or file I/O
//! - Time bounded by active voices × frames
//!
//! The summed output is not clamped; many loud voices can clip.

use crate::domain::audio::{ChannelGains, RenderCallback, StreamState, SURROUND_CHANNELS};
use crate::domain::voice::VoiceRegistry;
use std::sync::Arc;

/// How voice gains map onto the device channels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MixMode {
    /// Gains go straight to the first `channels` outputs (at most six)
    Direct { channels: usize },
    /// 5.1 gains folded into a stereo pair
    StereoDownmix,
}

impl MixMode {
    pub fn from_state(state: &StreamState) -> Self {
        if state.downmix_active {
            MixMode::StereoDownmix
        } else {
            MixMode::Direct {
                channels: state.active_channels as usize,
            }
        }
    }

    /// Interleaved channels per frame of the output block
    pub fn output_channels(&self) -> usize {
        match self {
            MixMode::Direct { channels } => *channels,
            MixMode::StereoDownmix => 2,
        }
    }
}

/// Device callback state: the shared registry plus the negotiated layout
#[derive(Debug, Clone)]
pub struct Mixer {
    registry: Arc<VoiceRegistry>,
    mode: MixMode,
}

impl Mixer {
    pub fn new(registry: Arc<VoiceRegistry>, mode: MixMode) -> Self {
        Self { registry, mode }
    }

    pub fn mode(&self) -> MixMode {
        self.mode
    }

    /// Fill one interleaved output block
    ///
    /// The block length must be a multiple of the mode's channel count;
    /// a trailing partial frame is left silent.
    pub fn render(&self, output: &mut [f32]) {
        output.fill(0.0);

        let channels = self.mode.output_channels();
        if channels == 0 {
            return;
        }
        let frames = output.len() / channels;
        let mode = self.mode;

        self.registry.with_voices(|voices| {
            voices.retain(|_, voice| {
                let segment = voice.segment(frames);
                match mode {
                    MixMode::Direct { channels } => {
                        mix_direct(output, channels, segment, voice.gains())
                    }
                    MixMode::StereoDownmix => mix_downmix(output, segment, voice.gains()),
                }
                let mixed = segment.len();
                voice.advance(mixed);
                !voice.is_finished()
            });
        });
    }

    /// Box the mixer as a backend render callback
    pub fn into_callback(self) -> RenderCallback {
        Box::new(move |output: &mut [f32]| self.render(output))
    }
}

/// Add `segment * gains[i]` into channel `i` of each frame
pub fn mix_direct(output: &mut [f32], channels: usize, segment: &[f32], gains: &ChannelGains) {
    let routed = channels.min(SURROUND_CHANNELS);
    let gains = &gains.as_slice()[..routed];
    for (frame, &sample) in output.chunks_exact_mut(channels).zip(segment) {
        for (out, &gain) in frame[..routed].iter_mut().zip(gains) {
            *out += sample * gain;
        }
    }
}

/// Add the stereo fold of `gains` into a two-channel block
pub fn mix_downmix(output: &mut [f32], segment: &[f32], gains: &ChannelGains) {
    let (left, right) = gains.stereo_downmix();
    for (frame, &sample) in output.chunks_exact_mut(2).zip(segment) {
        frame[0] += sample * left;
        frame[1] += sample * right;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::asset::AudioAsset;
    use crate::domain::audio::Speaker;
    use proptest::prelude::*;

    fn asset(samples: Vec<f32>) -> Arc<AudioAsset> {
        Arc::new(AudioAsset::new("test", samples, 44100))
    }

    fn surround(registry: &Arc<VoiceRegistry>) -> Mixer {
        Mixer::new(Arc::clone(registry), MixMode::Direct { channels: 6 })
    }

    #[test]
    fn test_single_voice_routes_to_its_speaker() {
        let registry = Arc::new(VoiceRegistry::new());
        registry.play(asset(vec![0.5, -0.5]), ChannelGains::solo(Speaker::RearRight, 0.5));

        let mut block = vec![1.0; 2 * 6];
        surround(&registry).render(&mut block);

        assert_eq!(&block[..6], &[0.0, 0.0, 0.0, 0.0, 0.0, 0.25]);
        assert_eq!(&block[6..], &[0.0, 0.0, 0.0, 0.0, 0.0, -0.25]);
    }

    #[test]
    fn test_voices_accumulate() {
        let registry = Arc::new(VoiceRegistry::new());
        registry.play(asset(vec![0.5; 4]), ChannelGains::solo(Speaker::FrontLeft, 1.0));
        registry.play(asset(vec![0.3; 4]), ChannelGains::solo(Speaker::FrontLeft, 1.0));

        let mut block = vec![0.0; 4 * 6];
        surround(&registry).render(&mut block);

        for frame in block.chunks_exact(6) {
            assert!((frame[0] - 0.8).abs() < 1e-6);
        }
    }

    #[test]
    fn test_no_clamping() {
        let registry = Arc::new(VoiceRegistry::new());
        for _ in 0..3 {
            registry.play(asset(vec![0.9; 2]), ChannelGains::solo(Speaker::Center, 1.0));
        }
        let mut block = vec![0.0; 2 * 6];
        surround(&registry).render(&mut block);
        assert!((block[2] - 2.7).abs() < 1e-5);
    }

    #[test]
    fn test_short_voice_leaves_tail_silent_and_retires() {
        let registry = Arc::new(VoiceRegistry::new());
        let id = registry.play(asset(vec![1.0; 3]), ChannelGains::solo(Speaker::FrontRight, 1.0));

        let mut block = vec![0.0; 8 * 6];
        surround(&registry).render(&mut block);

        let right: Vec<f32> = block.chunks_exact(6).map(|f| f[1]).collect();
        assert_eq!(right, vec![1.0, 1.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
        assert!(!registry.contains(id));
    }

    #[test]
    fn test_cursor_progress_and_single_removal() {
        let registry = Arc::new(VoiceRegistry::new());
        let id = registry.play(asset(vec![0.1; 10]), ChannelGains::silent());
        let mixer = surround(&registry);
        let mut block = vec![0.0; 4 * 6];

        let mut cursors = Vec::new();
        while let Some(voice) = registry.snapshot(id) {
            cursors.push(voice.cursor());
            mixer.render(&mut block);
        }

        assert_eq!(cursors, vec![0, 4, 8]);
        assert_eq!(registry.active_count(), 0);
        mixer.render(&mut block);
        assert_eq!(registry.active_count(), 0);
    }

    #[test]
    fn test_downmix_front_left() {
        let registry = Arc::new(VoiceRegistry::new());
        registry.play(asset(vec![0.5, 0.25]), ChannelGains::solo(Speaker::FrontLeft, 1.0));

        let mut block = vec![0.0; 2 * 2];
        Mixer::new(Arc::clone(&registry), MixMode::StereoDownmix).render(&mut block);
        assert_eq!(block, vec![0.5, 0.0, 0.25, 0.0]);
    }

    #[test]
    fn test_downmix_center() {
        let registry = Arc::new(VoiceRegistry::new());
        registry.play(asset(vec![1.0]), ChannelGains::solo(Speaker::Center, 1.0));

        let mut block = vec![0.0; 2];
        Mixer::new(Arc::clone(&registry), MixMode::StereoDownmix).render(&mut block);
        assert!((block[0] - 0.7).abs() < 1e-6);
        assert!((block[1] - 0.7).abs() < 1e-6);
    }

    #[test]
    fn test_direct_mode_with_fewer_channels() {
        let registry = Arc::new(VoiceRegistry::new());
        registry.play(
            asset(vec![1.0]),
            ChannelGains::new([0.1, 0.2, 0.3, 0.4, 0.5, 0.6]),
        );
        let mut block = vec![0.0; 4];
        Mixer::new(Arc::clone(&registry), MixMode::Direct { channels: 4 }).render(&mut block);
        assert_eq!(block, vec![0.1, 0.2, 0.3, 0.4]);
    }

    #[test]
    fn test_empty_registry_renders_silence() {
        let registry = Arc::new(VoiceRegistry::new());
        let mut block = vec![0.3; 12];
        let mut callback = surround(&registry).into_callback();
        callback(&mut block);
        assert!(block.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_mode_from_state() {
        let mut state = StreamState::idle(&Default::default());
        assert_eq!(MixMode::from_state(&state), MixMode::Direct { channels: 6 });
        state.downmix_active = true;
        state.active_channels = 2;
        assert_eq!(MixMode::from_state(&state), MixMode::StereoDownmix);
        assert_eq!(MixMode::StereoDownmix.output_channels(), 2);
    }

    fn render_one(samples: &[f32], gains: ChannelGains, frames: usize) -> Vec<f32> {
        let registry = Arc::new(VoiceRegistry::new());
        registry.play(asset(samples.to_vec()), gains);
        let mut block = vec![0.0; frames * 6];
        surround(&registry).render(&mut block);
        block
    }

    proptest! {
        #[test]
        fn prop_superposition_with_disjoint_gains(
            samples in prop::collection::vec(-1.0f32..1.0, 1..64),
            g in prop::array::uniform6(0.0f32..1.0),
            split in 0usize..6,
        ) {
            let mut first = [0.0; 6];
            let mut second = [0.0; 6];
            for (i, gain) in g.iter().enumerate() {
                if i <= split { first[i] = *gain } else { second[i] = *gain }
            }
            let frames = 32;

            let registry = Arc::new(VoiceRegistry::new());
            registry.play(asset(samples.clone()), ChannelGains::new(first));
            registry.play(asset(samples.clone()), ChannelGains::new(second));
            let mut together = vec![0.0; frames * 6];
            surround(&registry).render(&mut together);

            let a = render_one(&samples, ChannelGains::new(first), frames);
            let b = render_one(&samples, ChannelGains::new(second), frames);
            for ((t, a), b) in together.iter().zip(&a).zip(&b) {
                prop_assert!((t - (a + b)).abs() < 1e-5);
            }
        }

        #[test]
        fn prop_retires_after_ceil_ticks(len in 1usize..5000, block in 1usize..1500) {
            let registry = Arc::new(VoiceRegistry::new());
            registry.play(asset(vec![0.0; len]), ChannelGains::silent());
            let mixer = Mixer::new(Arc::clone(&registry), MixMode::StereoDownmix);
            let mut buffer = vec![0.0; block * 2];

            let mut ticks = 0;
            while registry.active_count() > 0 {
                mixer.render(&mut buffer);
                ticks += 1;
            }
            prop_assert_eq!(ticks, (len + block - 1) / block);
        }
    }
}
