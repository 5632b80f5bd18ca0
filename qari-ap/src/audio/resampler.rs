//! Streaming sample rate conversion using rubato
//!
//! Converts decoded audio to the output device rate. Input arrives in
//! packet-sized pieces of arbitrary length; rubato's fixed-input resampler
//! wants exact chunks, so input is staged until a full chunk is available.

use crate::audio::types::AudioFrame;
use crate::error::{Error, Result};
use rubato::{FastFixedIn, PolynomialDegree, Resampler as RubatoResampler};
use tracing::debug;

/// Input frames per rubato call
const CHUNK_FRAMES: usize = 1024;

/// Stereo resampler; a pass-through when both rates match
pub struct StreamResampler {
    inner: Option<FastFixedIn<f32>>,
    input_rate: u32,
    output_rate: u32,
    /// Planar input waiting for a full chunk
    staged: [Vec<f32>; 2],
}

impl StreamResampler {
    pub fn new(input_rate: u32, output_rate: u32) -> Result<Self> {
        let inner = if input_rate == output_rate {
            debug!("Sample rate already at {}Hz, skipping resample", output_rate);
            None
        } else {
            debug!("Resampling from {}Hz to {}Hz", input_rate, output_rate);
            Some(
                FastFixedIn::<f32>::new(
                    output_rate as f64 / input_rate as f64,
                    1.0,
                    PolynomialDegree::Septic,
                    CHUNK_FRAMES,
                    2,
                )
                .map_err(|e| Error::Decode(format!("Failed to create resampler: {}", e)))?,
            )
        };

        Ok(Self {
            inner,
            input_rate,
            output_rate,
            staged: [Vec::with_capacity(CHUNK_FRAMES), Vec::with_capacity(CHUNK_FRAMES)],
        })
    }

    pub fn is_passthrough(&self) -> bool {
        self.inner.is_none()
    }

    pub fn input_rate(&self) -> u32 {
        self.input_rate
    }

    pub fn output_rate(&self) -> u32 {
        self.output_rate
    }

    /// Feed frames; returns whatever output is ready
    pub fn process(&mut self, input: &[AudioFrame], out: &mut Vec<AudioFrame>) -> Result<()> {
        let Some(resampler) = self.inner.as_mut() else {
            out.extend_from_slice(input);
            return Ok(());
        };

        for frame in input {
            self.staged[0].push(frame.left);
            self.staged[1].push(frame.right);

            if self.staged[0].len() == resampler.input_frames_next() {
                let planar = resampler
                    .process(&self.staged[..], None)
                    .map_err(|e| Error::Decode(format!("Resampling failed: {}", e)))?;
                interleave(&planar, out);
                self.staged[0].clear();
                self.staged[1].clear();
            }
        }
        Ok(())
    }

    /// Resample any staged remainder at end of stream
    pub fn flush(&mut self, out: &mut Vec<AudioFrame>) -> Result<()> {
        let Some(resampler) = self.inner.as_mut() else {
            return Ok(());
        };
        if self.staged[0].is_empty() {
            return Ok(());
        }

        let planar = resampler
            .process_partial(Some(&self.staged[..]), None)
            .map_err(|e| Error::Decode(format!("Resampling failed: {}", e)))?;
        interleave(&planar, out);
        self.staged[0].clear();
        self.staged[1].clear();
        Ok(())
    }

    /// Drop staged input and filter state, e.g. after a seek
    pub fn reset(&mut self) {
        if let Some(resampler) = self.inner.as_mut() {
            resampler.reset();
        }
        self.staged[0].clear();
        self.staged[1].clear();
    }
}

fn interleave(planar: &[Vec<f32>], out: &mut Vec<AudioFrame>) {
    if planar.len() < 2 {
        return;
    }
    out.extend(
        planar[0]
            .iter()
            .zip(&planar[1])
            .map(|(&l, &r)| AudioFrame::from_stereo(l, r)),
    );
}
