//! Contains `SampleQueue`,
//! a FIFO of normalized audio samples appended by a capture callback
//! and drained by a single consumer thread,
//! and `SampleWriter`, the capture-side handle which converts raw device samples
//! before handing them to the queue.
//!
//! See `SampleQueue` docs for details.

mod dep {
    #[cfg(loom)]
    use loom as lib;
    #[cfg(not(loom))]
    use std as lib;

    pub use lib::sync::{Arc, Mutex, MutexGuard};
}
use dep::*;

use std::collections::VecDeque;
use std::sync::PoisonError;

/// A FIFO of audio samples in [-1.0, 1.0], shared between a capture thread and a consumer.
///
/// The capture thread only ever calls `push` (usually through a `SampleWriter`).
/// The consumer calls `consume_oldest`, `discard_oldest`, `available_count` and `clear`.
///
/// # Locking
///
/// Every operation takes the same mutex, and holds it only while mutating or measuring
/// the deque. Sample conversion happens before the lock is taken,
/// so the capture callback never waits on arithmetic done by the consumer (or vice versa).
///
/// A poisoned lock is recovered rather than propagated.
/// Each critical section is a single deque operation,
/// so a panic elsewhere cannot leave the deque half-written.
pub struct SampleQueue {
    samples: Mutex<VecDeque<f32>>,
}

impl Default for SampleQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl SampleQueue {
    pub fn new() -> SampleQueue {
        SampleQueue {
            samples: Mutex::new(VecDeque::new()),
        }
    }

    /// Preallocate room for `capacity` samples, so the capture callback does not grow
    /// the deque until the backlog exceeds it.
    pub fn with_capacity(capacity: usize) -> SampleQueue {
        SampleQueue {
            samples: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<f32>> {
        self.samples.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append already-normalized samples to the tail, in order.
    pub fn push(&self, samples: &[f32]) {
        self.lock().extend(samples.iter().copied());
    }

    /// Replace the contents of `target` with up to `desired` samples from the head,
    /// in arrival order, and remove them from the queue.
    ///
    /// Return: how many samples were taken. May be less than `desired`, including 0.
    ///
    /// `target` keeps its allocation, so a consumer reusing one buffer
    /// stops allocating once the buffer has grown to its largest request.
    pub fn consume_oldest(&self, target: &mut Vec<f32>, desired: usize) -> usize {
        target.clear();

        let mut samples = self.lock();
        let taken = desired.min(samples.len());
        target.extend(samples.drain(..taken));
        taken
    }

    /// Remove up to `count` samples from the head without returning them.
    /// Passing `usize::MAX` (or anything at least the queue length) empties the queue.
    ///
    /// Return: how many samples were removed.
    pub fn discard_oldest(&self, count: usize) -> usize {
        let mut samples = self.lock();
        let removed = count.min(samples.len());
        samples.drain(..removed);
        removed
    }

    /// The number of queued samples.
    ///
    /// Advisory only: the capture thread may push more before the caller acts on it.
    /// It never shrinks behind the consumer's back, since only the consumer removes samples.
    pub fn available_count(&self) -> usize {
        self.lock().len()
    }

    /// Drop every queued sample. Called when capture stops.
    pub fn clear(&self) {
        self.lock().clear();
    }
}

/// A sample format a capture device can deliver.
pub trait RawSample: Copy {
    /// Rescale into [-1.0, 1.0].
    fn to_normalized(self) -> f32;
}

impl RawSample for i16 {
    fn to_normalized(self) -> f32 {
        (self as f32) / 32768.0
    }
}

impl RawSample for u16 {
    fn to_normalized(self) -> f32 {
        (self as f32 - 32768.0) / 32768.0
    }
}

impl RawSample for f32 {
    fn to_normalized(self) -> f32 {
        self
    }
}

/// Capture-side handle to a `SampleQueue`.
/// Moved into the device callback, and used from that thread only.
///
/// Downmixes interleaved frames to mono and rescales them into an owned scratch buffer,
/// then pushes the whole batch under a single lock acquisition.
pub struct SampleWriter {
    queue: Arc<SampleQueue>,
    channels: u16,
    scratch: Vec<f32>,
}

impl SampleWriter {
    /// channels must be 1 or more.
    pub fn new(queue: Arc<SampleQueue>, channels: u16) -> SampleWriter {
        assert!(channels >= 1);
        SampleWriter {
            queue,
            channels,
            scratch: vec![],
        }
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn queue(&self) -> &Arc<SampleQueue> {
        &self.queue
    }

    /// input.len() should be a multiple of channels.
    /// Samples are assumed to be interleaved; a trailing partial frame is dropped.
    pub fn write<S: RawSample>(&mut self, input: &[S]) {
        let channels = self.channels as usize;

        self.scratch.clear();
        if channels == 1 {
            self.scratch
                .extend(input.iter().map(|&sample| sample.to_normalized()));
        } else {
            for frame in input.chunks_exact(channels) {
                let sum: f32 = frame.iter().map(|&sample| sample.to_normalized()).sum();
                self.scratch.push(sum / (channels as f32));
            }
        }

        if !self.scratch.is_empty() {
            self.queue.push(&self.scratch);
        }
    }
}
