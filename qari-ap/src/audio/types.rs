//! Core audio data types
//!
//! Everything after the decoder is interleaved stereo f32; mono sources are
//! duplicated to both channels and multichannel sources are folded down.

/// AudioFrame represents a single stereo sample (one frame of audio).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AudioFrame {
    pub left: f32,
    pub right: f32,
}

impl AudioFrame {
    /// Create a silent frame (0.0, 0.0)
    pub fn zero() -> Self {
        AudioFrame { left: 0.0, right: 0.0 }
    }

    /// Create a frame from mono sample (duplicate to both channels)
    pub fn from_mono(sample: f32) -> Self {
        AudioFrame { left: sample, right: sample }
    }

    pub fn from_stereo(left: f32, right: f32) -> Self {
        AudioFrame { left, right }
    }

    /// Clamp samples to valid range [-1.0, 1.0] to prevent clipping
    pub fn clamped(self) -> Self {
        AudioFrame {
            left: self.left.clamp(-1.0, 1.0),
            right: self.right.clamp(-1.0, 1.0),
        }
    }
}

/// Fold interleaved samples with `channels` channels into stereo frames
///
/// Channels beyond the first two are averaged into both sides.
pub fn interleaved_to_frames(samples: &[f32], channels: usize, out: &mut Vec<AudioFrame>) {
    match channels {
        0 => {}
        1 => out.extend(samples.iter().copied().map(AudioFrame::from_mono)),
        2 => out.extend(
            samples
                .chunks_exact(2)
                .map(|s| AudioFrame::from_stereo(s[0], s[1])),
        ),
        n => out.extend(samples.chunks_exact(n).map(|s| {
            let rest = s[2..].iter().sum::<f32>() / (n - 2) as f32;
            AudioFrame::from_stereo((s[0] + rest) * 0.5, (s[1] + rest) * 0.5)
        })),
    }
}

/// Frame count to milliseconds at `sample_rate`
pub fn frames_to_ms(frames: u64, sample_rate: u32) -> u64 {
    if sample_rate == 0 {
        return 0;
    }
    frames * 1000 / sample_rate as u64
}

/// Decoded stream parameters known after probing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamInfo {
    pub sample_rate: u32,
    pub channels: usize,
    /// From the container frame count; `None` for headerless streams
    pub duration_ms: Option<u64>,
}
