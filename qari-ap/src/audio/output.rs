//! Audio output
//!
//! [`AudioOutput`] opens the configured cpal device (falling back to the
//! system default) and drives it from a [`FrameConsumer`]. The stream is
//! not `Send` on every platform, so an output must stay on the thread that
//! created it. [`NullOutput`] drains the ring at real-time pace without
//! touching any hardware.

use crate::audio::ring_buffer::FrameConsumer;
use crate::error::{Error, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, FromSample, SampleFormat, SizedSample, Stream, StreamConfig};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Where the playout ring drains to
pub trait AudioSink {
    fn sample_rate(&self) -> u32;

    /// Begin pulling frames from `consumer`
    fn start(&mut self, consumer: FrameConsumer) -> Result<()>;

    /// Whether the sink failed after starting
    fn has_error(&self) -> bool;
}

/// Output selection for stream workers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputBackend {
    /// cpal device by name (None = system default)
    Device(Option<String>),
    /// Discard frames at the given rate
    Null { sample_rate: u32 },
}

impl Default for OutputBackend {
    fn default() -> Self {
        OutputBackend::Device(None)
    }
}

impl OutputBackend {
    pub fn open(&self) -> Result<Box<dyn AudioSink>> {
        match self {
            OutputBackend::Device(name) => Ok(Box::new(AudioOutput::open(name.as_deref())?)),
            OutputBackend::Null { sample_rate } => Ok(Box::new(NullOutput::new(*sample_rate)?)),
        }
    }
}

pub struct AudioOutput {
    device: Device,
    config: StreamConfig,
    sample_format: SampleFormat,
    stream: Option<Stream>,
    /// Set by the stream error callback
    error_flag: Arc<AtomicBool>,
}

impl AudioOutput {
    /// Open an output device (None = default device)
    ///
    /// A named device that cannot be found falls back to the default one.
    pub fn open(device_name: Option<&str>) -> Result<Self> {
        let host = cpal::default_host();

        let device = match device_name {
            Some(name) => {
                let found = host
                    .output_devices()
                    .map_err(|e| Error::AudioOutput(format!("Failed to enumerate devices: {}", e)))?
                    .find(|d| d.name().ok().as_deref() == Some(name));
                match found {
                    Some(device) => device,
                    None => {
                        warn!("Requested device '{}' not found, falling back to default device", name);
                        host.default_output_device().ok_or_else(|| {
                            Error::AudioOutput(format!(
                                "Device '{}' not found and no default device available",
                                name
                            ))
                        })?
                    }
                }
            }
            None => host
                .default_output_device()
                .ok_or_else(|| Error::AudioOutput("No default output device found".to_string()))?,
        };

        let supported = device
            .default_output_config()
            .map_err(|e| Error::AudioOutput(format!("Failed to get default config: {}", e)))?;
        let sample_format = supported.sample_format();
        let config = supported.config();

        info!(
            device = %device.name().unwrap_or_else(|_| "Unknown".to_string()),
            sample_rate = config.sample_rate.0,
            channels = config.channels,
            format = ?sample_format,
            "Audio output opened"
        );

        Ok(Self {
            device,
            config,
            sample_format,
            stream: None,
            error_flag: Arc::new(AtomicBool::new(false)),
        })
    }

    fn start_stream(&mut self, consumer: FrameConsumer) -> Result<()> {
        let stream = match self.sample_format {
            SampleFormat::F32 => self.build_stream::<f32>(consumer)?,
            SampleFormat::I16 => self.build_stream::<i16>(consumer)?,
            SampleFormat::U16 => self.build_stream::<u16>(consumer)?,
            sample_format => {
                return Err(Error::AudioOutput(format!(
                    "Unsupported sample format: {:?}",
                    sample_format
                )));
            }
        };

        stream
            .play()
            .map_err(|e| Error::AudioOutput(format!("Failed to start stream: {}", e)))?;
        self.stream = Some(stream);
        Ok(())
    }

    fn build_stream<T>(&self, mut consumer: FrameConsumer) -> Result<Stream>
    where
        T: SizedSample + FromSample<f32>,
    {
        let channels = self.config.channels as usize;
        let error_flag = Arc::clone(&self.error_flag);

        self.device
            .build_output_stream(
                &self.config,
                move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                    for frame in data.chunks_mut(channels) {
                        let audio = consumer.next_frame().clamped();
                        frame[0] = T::from_sample(audio.left);
                        if channels > 1 {
                            frame[1] = T::from_sample(audio.right);
                        }
                        for extra in frame.iter_mut().skip(2) {
                            *extra = T::EQUILIBRIUM;
                        }
                    }
                },
                move |err| {
                    error!("Audio stream error: {}", err);
                    error_flag.store(true, Ordering::SeqCst);
                },
                None,
            )
            .map_err(|e| Error::AudioOutput(format!("Failed to build stream: {}", e)))
    }

    /// Stop audio playback and drop the stream.
    pub fn stop(&mut self) -> Result<()> {
        if let Some(stream) = self.stream.take() {
            stream
                .pause()
                .map_err(|e| Error::AudioOutput(format!("Failed to pause stream: {}", e)))?;
        }
        Ok(())
    }
}

impl AudioSink for AudioOutput {
    fn sample_rate(&self) -> u32 {
        self.config.sample_rate.0
    }

    fn start(&mut self, consumer: FrameConsumer) -> Result<()> {
        self.start_stream(consumer)
    }

    /// Whether the device reported a stream error
    fn has_error(&self) -> bool {
        self.error_flag.load(Ordering::SeqCst)
    }
}

impl Drop for AudioOutput {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

/// Block of frames consumed per pacing tick
const NULL_TICK: Duration = Duration::from_millis(10);

/// Hardware-free sink: a thread pulls one tick's worth of frames every
/// [`NULL_TICK`] and throws them away
pub struct NullOutput {
    sample_rate: u32,
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl NullOutput {
    pub fn new(sample_rate: u32) -> Result<Self> {
        if sample_rate == 0 {
            return Err(Error::AudioOutput("Null output needs a sample rate".to_string()));
        }
        Ok(Self {
            sample_rate,
            running: Arc::new(AtomicBool::new(false)),
            thread: None,
        })
    }
}

impl AudioSink for NullOutput {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn start(&mut self, mut consumer: FrameConsumer) -> Result<()> {
        if self.thread.is_some() {
            return Err(Error::AudioOutput("Null output already started".to_string()));
        }
        let per_tick = (self.sample_rate as u64 * NULL_TICK.as_millis() as u64 / 1000).max(1);
        let running = Arc::clone(&self.running);
        running.store(true, Ordering::Release);

        let thread = thread::Builder::new()
            .name("qari-null-output".to_string())
            .spawn(move || {
                while running.load(Ordering::Acquire) {
                    for _ in 0..per_tick {
                        consumer.next_frame();
                    }
                    thread::sleep(NULL_TICK);
                }
            })
            .map_err(|e| Error::AudioOutput(format!("Failed to spawn null output: {}", e)))?;

        debug!(sample_rate = self.sample_rate, "Null output started");
        self.thread = Some(thread);
        Ok(())
    }

    fn has_error(&self) -> bool {
        false
    }
}

impl Drop for NullOutput {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}
