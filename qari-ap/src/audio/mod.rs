//! Audio pipeline: HTTP source, decode, resample, device output

pub mod decoder;
pub mod http_source;
pub mod output;
pub mod resampler;
pub mod ring_buffer;
pub mod types;

pub use decoder::StreamDecoder;
pub use http_source::{Download, FetchError, HttpMediaSource};
pub use output::{AudioOutput, AudioSink, NullOutput, OutputBackend};
pub use resampler::StreamResampler;
pub use ring_buffer::{playout_ring, FrameConsumer, FrameProducer};
pub use types::{AudioFrame, StreamInfo};
