//! Lock-free ring buffer between the stream worker and the audio callback
//!
//! Single producer (worker thread), single consumer (cpal callback). The
//! callback never blocks: it outputs silence while paused or when the ring
//! runs dry.
//!
//! Only the consumer can discard queued frames, so a flush is a handshake:
//! the producer raises the request and accepts no frames until the consumer
//! has emptied the ring and cleared it.

use crate::audio::types::AudioFrame;
use ringbuf::{traits::*, HeapCons, HeapProd, HeapRb};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Default capacity in frames (~370ms at 44.1kHz)
pub const DEFAULT_RING_FRAMES: usize = 16_384;

/// Flags and counters shared by both ends
#[derive(Debug, Default)]
pub struct PlayoutControl {
    playing: AtomicBool,
    flush_requested: AtomicBool,
    /// Frames actually sent to the device since the last reset
    frames_played: AtomicU64,
    underruns: AtomicU64,
}

impl PlayoutControl {
    pub fn set_playing(&self, playing: bool) {
        self.playing.store(playing, Ordering::Release);
    }

    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::Acquire)
    }

    /// Frames played since the last completed flush; 0 while one is pending
    pub fn frames_played(&self) -> u64 {
        if self.flush_pending() {
            return 0;
        }
        self.frames_played.load(Ordering::Acquire)
    }

    pub fn flush_pending(&self) -> bool {
        self.flush_requested.load(Ordering::Acquire)
    }

    pub fn underruns(&self) -> u64 {
        self.underruns.load(Ordering::Relaxed)
    }
}

/// Worker side of the ring
pub struct FrameProducer {
    prod: HeapProd<AudioFrame>,
    control: Arc<PlayoutControl>,
}

impl FrameProducer {
    /// Push as many frames as fit; returns how many were taken
    ///
    /// Takes nothing while a flush is pending, so frames decoded after a
    /// seek are never discarded with the stale ones.
    pub fn push(&mut self, frames: &[AudioFrame]) -> usize {
        if self.control.flush_pending() {
            return 0;
        }
        self.prod.push_slice(frames)
    }

    pub fn queued(&self) -> usize {
        self.prod.occupied_len()
    }

    /// Discard queued frames and restart the played-frame count
    ///
    /// The consumer performs the discard on its next callback.
    pub fn flush(&mut self) {
        self.control.flush_requested.store(true, Ordering::Release);
    }

    pub fn control(&self) -> &Arc<PlayoutControl> {
        &self.control
    }
}

/// Audio callback side of the ring
pub struct FrameConsumer {
    cons: HeapCons<AudioFrame>,
    control: Arc<PlayoutControl>,
}

impl FrameConsumer {
    /// Next frame for the device; silence when paused or starved
    pub fn next_frame(&mut self) -> AudioFrame {
        if self.control.flush_pending() {
            while self.cons.try_pop().is_some() {}
            self.control.frames_played.store(0, Ordering::Release);
            self.control.flush_requested.store(false, Ordering::Release);
        }

        if !self.control.is_playing() {
            return AudioFrame::zero();
        }

        match self.cons.try_pop() {
            Some(frame) => {
                self.control.frames_played.fetch_add(1, Ordering::AcqRel);
                frame
            }
            None => {
                self.control.underruns.fetch_add(1, Ordering::Relaxed);
                AudioFrame::zero()
            }
        }
    }
}

/// Create a ring of `capacity` frames
pub fn playout_ring(capacity: usize) -> (FrameProducer, FrameConsumer) {
    let (prod, cons) = HeapRb::<AudioFrame>::new(capacity).split();
    let control = Arc::new(PlayoutControl::default());
    (
        FrameProducer {
            prod,
            control: Arc::clone(&control),
        },
        FrameConsumer { cons, control },
    )
}
