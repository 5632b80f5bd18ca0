//! Production playback engine
//!
//! Each handle gets one worker thread that owns the whole pipeline for its
//! stream: progressive download, decoder, resampler, ring buffer and
//! output device. Engine methods only post a command to the worker and
//! return; the worker reports back through the engine event channel.

use crate::audio::decoder::estimate_duration_ms;
use crate::audio::ring_buffer::DEFAULT_RING_FRAMES;
use crate::audio::types::frames_to_ms;
use crate::audio::{
    playout_ring, AudioFrame, AudioSink, Download, FetchError, FrameProducer, HttpMediaSource,
    OutputBackend, StreamDecoder, StreamResampler,
};
use crate::playback::engine::{EngineError, EngineHandle, PlaybackEngine};
use crate::playback::events::{EngineEvent, EngineEventKind, EngineEventSender, StatusUpdate};
use reqwest::Url;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tokio::runtime::Handle;
use tracing::{debug, info, trace, warn};

/// Idle sleep while the ring is full
const FILL_POLL: Duration = Duration::from_millis(10);

#[derive(Debug, Clone)]
pub struct StreamEngineConfig {
    pub status_interval: Duration,
    pub output: OutputBackend,
    pub connect_timeout: Duration,
}

impl Default for StreamEngineConfig {
    fn default() -> Self {
        Self {
            status_interval: Duration::from_millis(500),
            output: OutputBackend::default(),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl From<FetchError> for EngineError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::NotFound(url) => EngineError::NotFound(url),
            FetchError::Network(msg) => EngineError::Network(msg),
            other => EngineError::Failure(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WorkerCommand {
    Play,
    Pause,
    Stop,
    Seek(u64),
}

struct Worker {
    commands: mpsc::Sender<WorkerCommand>,
    /// Cleared on release; the worker emits nothing afterwards
    live: Arc<AtomicBool>,
    download: Download,
}

/// Streaming engine backed by symphonia, rubato and cpal
pub struct StreamEngine {
    config: StreamEngineConfig,
    events: EngineEventSender,
    runtime: Handle,
    client: reqwest::Client,
    next_handle: u64,
    workers: HashMap<EngineHandle, Worker>,
}

impl StreamEngine {
    /// Must be called from within a tokio runtime
    pub fn new(config: StreamEngineConfig, events: EngineEventSender) -> crate::Result<Self> {
        let runtime = Handle::try_current()
            .map_err(|e| crate::Error::Internal(format!("No tokio runtime: {}", e)))?;
        let client = reqwest::Client::builder()
            .user_agent(concat!("qari-ap/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| crate::Error::Http(e.to_string()))?;

        Ok(Self {
            config,
            events,
            runtime,
            client,
            next_handle: 0,
            workers: HashMap::new(),
        })
    }

    /// Handles with a running worker
    pub fn live_handles(&self) -> usize {
        self.workers.len()
    }

    fn send(&self, handle: EngineHandle, command: WorkerCommand) -> Result<(), EngineError> {
        let worker = self
            .workers
            .get(&handle)
            .ok_or_else(|| EngineError::Failure(format!("unknown handle {}", handle)))?;
        worker
            .commands
            .send(command)
            .map_err(|_| EngineError::Failure(format!("stream worker {} exited", handle)))
    }
}

impl PlaybackEngine for StreamEngine {
    fn create(&mut self, url: &Url) -> Result<EngineHandle, EngineError> {
        self.next_handle += 1;
        let handle = EngineHandle(self.next_handle);

        let (tx, rx) = mpsc::channel();
        let live = Arc::new(AtomicBool::new(true));
        let download = Download::new();

        let ctx = WorkerContext {
            handle,
            url: url.clone(),
            commands: rx,
            emitter: Emitter {
                handle,
                live: Arc::clone(&live),
                events: self.events.clone(),
            },
            download: download.clone(),
            runtime: self.runtime.clone(),
            client: self.client.clone(),
            status_interval: self.config.status_interval,
            output: self.config.output.clone(),
        };

        thread::Builder::new()
            .name(format!("qari-stream-{}", handle.0))
            .spawn(move || ctx.run())
            .map_err(|e| EngineError::Failure(format!("Failed to spawn stream worker: {}", e)))?;

        debug!(%handle, %url, "Stream worker started");
        self.workers.insert(
            handle,
            Worker {
                commands: tx,
                live,
                download,
            },
        );
        Ok(handle)
    }

    fn play(&mut self, handle: EngineHandle) -> Result<(), EngineError> {
        self.send(handle, WorkerCommand::Play)
    }

    fn pause(&mut self, handle: EngineHandle) -> Result<(), EngineError> {
        self.send(handle, WorkerCommand::Pause)
    }

    fn stop(&mut self, handle: EngineHandle) -> Result<(), EngineError> {
        self.send(handle, WorkerCommand::Stop)
    }

    fn seek(&mut self, handle: EngineHandle, position_ms: u64) -> Result<(), EngineError> {
        self.send(handle, WorkerCommand::Seek(position_ms))
    }

    fn release(&mut self, handle: EngineHandle) -> Result<(), EngineError> {
        let worker = self
            .workers
            .remove(&handle)
            .ok_or_else(|| EngineError::Failure(format!("unknown handle {}", handle)))?;
        worker.live.store(false, Ordering::Release);
        worker.download.cancel();
        // Dropping the sender disconnects the worker's command channel
        drop(worker.commands);
        debug!(%handle, "Stream released");
        Ok(())
    }
}

impl Drop for StreamEngine {
    fn drop(&mut self) {
        for (_, worker) in self.workers.drain() {
            worker.live.store(false, Ordering::Release);
            worker.download.cancel();
        }
    }
}

/// Sends events for one handle until it is released
struct Emitter {
    handle: EngineHandle,
    live: Arc<AtomicBool>,
    events: EngineEventSender,
}

impl Emitter {
    fn emit(&self, kind: EngineEventKind) {
        if !self.live.load(Ordering::Acquire) {
            trace!(handle = %self.handle, "Event after release suppressed");
            return;
        }
        if self.events.send(EngineEvent::new(self.handle, kind)).is_err() {
            trace!(handle = %self.handle, "Engine event receiver gone");
        }
    }

    fn is_live(&self) -> bool {
        self.live.load(Ordering::Acquire)
    }
}

struct WorkerContext {
    handle: EngineHandle,
    url: Url,
    commands: mpsc::Receiver<WorkerCommand>,
    emitter: Emitter,
    download: Download,
    runtime: Handle,
    client: reqwest::Client,
    status_interval: Duration,
    output: OutputBackend,
}

/// Everything set up by a successful load
struct Pipeline {
    decoder: StreamDecoder,
    resampler: StreamResampler,
    producer: FrameProducer,
    output: Box<dyn AudioSink>,
    /// Output frames decoded but not yet accepted by the ring
    pending: Vec<AudioFrame>,
    /// 0 when neither the container nor the content length gives one
    duration_ms: u64,
}

impl WorkerContext {
    fn run(self) {
        let handle = self.handle;
        match self.load() {
            Ok(pipeline) => {
                self.emitter.emit(EngineEventKind::Loaded {
                    duration_ms: pipeline.duration_ms,
                });
                info!(%handle, duration_ms = pipeline.duration_ms, "Stream loaded");
                self.play_loop(pipeline);
            }
            Err(err) => {
                warn!(%handle, error = %err, "Stream load failed");
                self.emitter.emit(EngineEventKind::LoadFailed(err));
                self.wait_for_release();
            }
        }
        debug!(%handle, "Stream worker exiting");
    }

    fn load(&self) -> Result<Pipeline, EngineError> {
        let source = HttpMediaSource::open(&self.runtime, &self.client, &self.url, self.download.clone())?;
        let content_length = source.content_length();
        let extension = self
            .url
            .path_segments()
            .and_then(|mut s| s.next_back())
            .and_then(|name| name.rsplit_once('.'))
            .map(|(_, ext)| ext.to_string());

        let mut decoder = StreamDecoder::open(Box::new(source), extension.as_deref())
            .map_err(|e| self.classify(e))?;
        let info = decoder.info();

        let mut output = self
            .output
            .open()
            .map_err(|e| EngineError::Failure(e.to_string()))?;
        let mut resampler = StreamResampler::new(info.sample_rate, output.sample_rate())
            .map_err(|e| EngineError::Failure(e.to_string()))?;

        // First packet: primes the ring and yields a byte rate when the
        // container has no frame count
        let mut pending = Vec::new();
        let mut duration_ms = info.duration_ms;
        if let Some(chunk) = decoder.next_chunk().map_err(|e| self.classify(e))? {
            if duration_ms.is_none() {
                duration_ms = content_length.and_then(|len| {
                    estimate_duration_ms(len, chunk.packet_bytes, chunk.frames.len(), info.sample_rate)
                });
            }
            resampler
                .process(&chunk.frames, &mut pending)
                .map_err(|e| EngineError::Failure(e.to_string()))?;
        }

        let (producer, consumer) = playout_ring(DEFAULT_RING_FRAMES);
        output
            .start(consumer)
            .map_err(|e| EngineError::Failure(e.to_string()))?;

        Ok(Pipeline {
            decoder,
            resampler,
            producer,
            output,
            pending,
            duration_ms: duration_ms.unwrap_or(0),
        })
    }

    /// A decode error caused by the transfer is a network failure
    fn classify(&self, err: crate::Error) -> EngineError {
        match self.download.failure() {
            Some(fetch) => fetch.into(),
            None => EngineError::Failure(err.to_string()),
        }
    }

    fn wait_for_release(&self) {
        while self.commands.recv().is_ok() {}
    }

    fn play_loop(&self, mut p: Pipeline) {
        let output_rate = p.output.sample_rate();
        let control = Arc::clone(p.producer.control());
        let mut base_ms = 0u64;
        let mut eof = false;
        let mut last_status = Instant::now();

        let duration_ms = p.duration_ms;
        let position = |base_ms: u64| -> u64 {
            let ms = base_ms + frames_to_ms(control.frames_played(), output_rate);
            if duration_ms > 0 {
                ms.min(duration_ms)
            } else {
                ms
            }
        };
        let status = |position_ms: u64, is_playing: bool, did_finish: bool| {
            EngineEventKind::Status(StatusUpdate {
                position_ms,
                duration_ms,
                is_playing,
                did_finish,
            })
        };

        loop {
            // Block on commands while idle; poll while playing
            let command = if control.is_playing() {
                match self.commands.try_recv() {
                    Ok(cmd) => Some(cmd),
                    Err(mpsc::TryRecvError::Empty) => None,
                    Err(mpsc::TryRecvError::Disconnected) => break,
                }
            } else {
                match self.commands.recv_timeout(self.status_interval) {
                    Ok(cmd) => Some(cmd),
                    Err(RecvTimeoutError::Timeout) => None,
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            };

            if let Some(command) = command {
                trace!(handle = %self.handle, ?command, "Worker command");
                match command {
                    WorkerCommand::Play => control.set_playing(true),
                    WorkerCommand::Pause => {
                        control.set_playing(false);
                        self.emitter.emit(status(position(base_ms), false, false));
                    }
                    WorkerCommand::Stop | WorkerCommand::Seek(_) => {
                        let target = match command {
                            WorkerCommand::Seek(ms) => ms,
                            _ => 0,
                        };
                        if command == WorkerCommand::Stop {
                            control.set_playing(false);
                        }
                        let reached = match p.decoder.seek(target) {
                            Ok(reached) => reached,
                            Err(err) => {
                                if !self.emitter.is_live() {
                                    break;
                                }
                                self.fail(self.classify(err));
                                return;
                            }
                        };
                        p.producer.flush();
                        p.resampler.reset();
                        p.pending.clear();
                        match reached {
                            Some(reached) => {
                                base_ms = reached;
                                eof = false;
                                self.emitter
                                    .emit(status(base_ms, control.is_playing(), false));
                            }
                            None => {
                                // Past the end of a stream of unknown length
                                base_ms = target;
                                eof = true;
                                control.set_playing(false);
                                debug!(handle = %self.handle, target, "Seek past end of stream");
                                self.emitter.emit(status(base_ms, false, true));
                            }
                        }
                    }
                }
            }

            if p.output.has_error() {
                self.fail(EngineError::Failure("audio device error".to_string()));
                return;
            }

            if !control.is_playing() {
                continue;
            }

            // Fill the ring
            if !p.pending.is_empty() {
                let taken = p.producer.push(&p.pending);
                p.pending.drain(..taken);
            }
            if p.pending.is_empty() && !eof {
                match p.decoder.next_chunk() {
                    Ok(Some(chunk)) => {
                        if let Err(err) = p.resampler.process(&chunk.frames, &mut p.pending) {
                            self.fail(EngineError::Failure(err.to_string()));
                            return;
                        }
                    }
                    Ok(None) => {
                        eof = true;
                        if let Err(err) = p.resampler.flush(&mut p.pending) {
                            warn!(handle = %self.handle, error = %err, "Resampler flush failed");
                        }
                    }
                    Err(err) => {
                        if !self.emitter.is_live() {
                            break;
                        }
                        self.fail(self.classify(err));
                        return;
                    }
                }
            } else {
                thread::sleep(FILL_POLL);
            }

            if eof && p.pending.is_empty() && p.producer.queued() == 0 {
                control.set_playing(false);
                let end = position(base_ms);
                debug!(
                    handle = %self.handle,
                    position_ms = end,
                    underruns = control.underruns(),
                    "Stream finished"
                );
                self.emitter.emit(status(end, false, true));
                continue;
            }

            if last_status.elapsed() >= self.status_interval {
                last_status = Instant::now();
                self.emitter.emit(status(position(base_ms), true, false));
            }
        }
    }

    /// Report a fault and idle until released
    fn fail(&self, err: EngineError) {
        warn!(handle = %self.handle, error = %err, "Stream failed");
        self.emitter.emit(EngineEventKind::Error(err));
        self.wait_for_release();
    }
}
