//! Streaming audio decoder using symphonia
//!
//! Decodes one packet at a time from any [`MediaSource`], so playback can
//! begin while the rest of the file is still downloading.

use crate::audio::types::{frames_to_ms, interleaved_to_frames, AudioFrame, StreamInfo};
use crate::error::{Error, Result};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{Decoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::{Error as SymphoniaError, SeekErrorKind};
use symphonia::core::formats::{FormatOptions, FormatReader, SeekMode, SeekTo};
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::units::{Time, TimeBase};
use tracing::{debug, warn};

/// Output of one decoded packet
#[derive(Debug, Default)]
pub struct DecodedChunk {
    pub frames: Vec<AudioFrame>,
    /// Compressed size of the packet
    pub packet_bytes: usize,
}

pub struct StreamDecoder {
    format: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    time_base: Option<TimeBase>,
    info: StreamInfo,
    sample_buf: Option<SampleBuffer<f32>>,
}

impl StreamDecoder {
    /// Probe `source` and prepare a decoder for its first audio track
    pub fn open(source: Box<dyn MediaSource>, extension: Option<&str>) -> Result<Self> {
        let mss = MediaSourceStream::new(source, Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = extension {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions {
                    enable_gapless: true,
                    ..Default::default()
                },
                &MetadataOptions::default(),
            )
            .map_err(|e| Error::Decode(format!("Failed to probe format: {}", e)))?;

        let format = probed.format;
        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| Error::Decode("No audio track found".to_string()))?;

        let params = &track.codec_params;
        let sample_rate = params
            .sample_rate
            .ok_or_else(|| Error::Decode("Sample rate not found".to_string()))?;
        let channels = params.channels.map(|c| c.count()).unwrap_or(2);
        let duration_ms = params.n_frames.map(|n| frames_to_ms(n, sample_rate));

        let decoder = symphonia::default::get_codecs()
            .make(params, &DecoderOptions::default())
            .map_err(|e| Error::Decode(format!("Failed to create decoder: {}", e)))?;

        debug!(sample_rate, channels, ?duration_ms, "Audio stream probed");

        Ok(Self {
            track_id: track.id,
            time_base: params.time_base,
            format,
            decoder,
            info: StreamInfo {
                sample_rate,
                channels,
                duration_ms,
            },
            sample_buf: None,
        })
    }

    pub fn info(&self) -> StreamInfo {
        self.info
    }

    /// Decode the next packet; `None` at end of stream
    ///
    /// Corrupt packets are skipped with a warning.
    pub fn next_chunk(&mut self) -> Result<Option<DecodedChunk>> {
        loop {
            let packet = match self.format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(ref e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    debug!("Reached end of stream");
                    return Ok(None);
                }
                Err(SymphoniaError::ResetRequired) => {
                    self.decoder.reset();
                    continue;
                }
                Err(e) => return Err(Error::Decode(format!("Failed to read packet: {}", e))),
            };

            if packet.track_id() != self.track_id {
                continue;
            }

            let decoded = match self.decoder.decode(&packet) {
                Ok(decoded) => decoded,
                Err(SymphoniaError::DecodeError(e)) => {
                    warn!("Skipping corrupt packet: {}", e);
                    continue;
                }
                Err(e) => return Err(Error::Decode(format!("Decode failed: {}", e))),
            };

            let spec = *decoded.spec();
            let capacity = decoded.capacity() as u64;
            let needed = capacity * spec.channels.count() as u64;
            if self
                .sample_buf
                .as_ref()
                .map_or(true, |b| (b.capacity() as u64) < needed)
            {
                self.sample_buf = Some(SampleBuffer::new(capacity, spec));
            }
            let buf = self
                .sample_buf
                .get_or_insert_with(|| SampleBuffer::new(capacity, spec));
            buf.copy_interleaved_ref(decoded);

            let mut chunk = DecodedChunk {
                frames: Vec::with_capacity(buf.len() / spec.channels.count().max(1)),
                packet_bytes: packet.buf().len(),
            };
            interleaved_to_frames(buf.samples(), spec.channels.count(), &mut chunk.frames);
            return Ok(Some(chunk));
        }
    }

    /// Coarse seek; returns the position actually reached in milliseconds
    ///
    /// `None` when the target lies beyond the end of the stream.
    pub fn seek(&mut self, position_ms: u64) -> Result<Option<u64>> {
        let time = Time::new(position_ms / 1000, (position_ms % 1000) as f64 / 1000.0);
        let seeked = match self.format.seek(
            SeekMode::Coarse,
            SeekTo::Time {
                time,
                track_id: Some(self.track_id),
            },
        ) {
            Ok(seeked) => seeked,
            Err(SymphoniaError::SeekError(SeekErrorKind::OutOfRange)) => {
                debug!(requested = position_ms, "Seek past end of stream");
                return Ok(None);
            }
            Err(e) => return Err(Error::Decode(format!("Seek failed: {}", e))),
        };
        self.decoder.reset();

        let actual_ms = match self.time_base {
            Some(tb) => {
                let t = tb.calc_time(seeked.actual_ts);
                t.seconds * 1000 + (t.frac * 1000.0) as u64
            }
            None => frames_to_ms(seeked.actual_ts, self.info.sample_rate),
        };
        debug!(requested = position_ms, actual = actual_ms, "Decoder seeked");
        Ok(Some(actual_ms))
    }
}

/// Estimate total duration from the byte rate of one packet
///
/// Used for streams without a frame count (e.g. CBR MP3 without a Xing
/// header).
pub fn estimate_duration_ms(
    content_length: u64,
    packet_bytes: usize,
    packet_frames: usize,
    sample_rate: u32,
) -> Option<u64> {
    if packet_bytes == 0 || packet_frames == 0 || sample_rate == 0 {
        return None;
    }
    let ms = content_length as u128 * packet_frames as u128 * 1000
        / (packet_bytes as u128 * sample_rate as u128);
    u64::try_from(ms).ok()
}
