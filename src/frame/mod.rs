//! Timestamped audio frames and their per-channel sample buffers.
//!
//! An [`AudioFrame`] is the unit a producer hands to
//! [`BroadcastHub::write`](crate::BroadcastHub::write). It carries planar `f32`
//! samples for every captured channel (`read`) and, on the producer side, the
//! destination planes the host expects to be filled in place (`write`).

pub mod merge;

use std::time::Duration;

/// How [`ChannelBuffer::assign`] satisfied a copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferPolicy {
    /// The existing allocation was large enough and was reused.
    Reuse,
    /// The old allocation was freed and a larger one allocated.
    Grow,
}

/// A resizable sample buffer exclusively owned by one channel.
///
/// Copies reuse the existing allocation when it is large enough and
/// reallocate otherwise, so a slot that keeps receiving frames of the same
/// size stops allocating after the first lap of the ring.
#[derive(Debug, Default, PartialEq)]
pub struct ChannelBuffer {
    samples: Vec<f32>,
}

impl ChannelBuffer {
    /// Creates a buffer holding a copy of `samples`.
    pub fn from_slice(samples: &[f32]) -> Self {
        Self {
            samples: samples.to_vec(),
        }
    }

    /// Creates a buffer of `len` zeroed samples.
    pub fn silent(len: usize) -> Self {
        Self {
            samples: vec![0.0; len],
        }
    }

    /// Copies `src` into this buffer, growing the allocation only when needed.
    pub fn assign(&mut self, src: &[f32]) -> BufferPolicy {
        if src.len() > self.samples.capacity() {
            self.samples = src.to_vec();
            BufferPolicy::Grow
        } else {
            self.samples.clear();
            self.samples.extend_from_slice(src);
            BufferPolicy::Reuse
        }
    }

    /// Frees the allocation.
    pub fn release(&mut self) {
        self.samples = Vec::new();
    }

    /// Returns the samples.
    pub fn as_slice(&self) -> &[f32] {
        &self.samples
    }

    /// Returns the samples mutably.
    pub fn as_mut_slice(&mut self) -> &mut [f32] {
        &mut self.samples
    }

    /// Number of samples currently held.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Returns `true` if the buffer holds no samples.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Number of samples the buffer can hold without reallocating.
    pub fn capacity(&self) -> usize {
        self.samples.capacity()
    }
}

impl Clone for ChannelBuffer {
    fn clone(&self) -> Self {
        Self {
            samples: self.samples.clone(),
        }
    }

    /// Copies into the existing allocation when it is large enough.
    fn clone_from(&mut self, source: &Self) {
        self.samples.clone_from(&source.samples);
    }
}

/// One callback's worth of planar audio with its capture timestamp.
///
/// `inputs` and `outputs` describe how many planes the host reported for the
/// stage; `read` holds the captured planes and `write` the planes the host
/// reads back after the callback returns (pass-through).
///
/// # Example
///
/// ```
/// use audio_broadcast::{AudioFrame, ChannelBuffer};
/// use std::time::Duration;
///
/// let frame = AudioFrame::new(
///     vec![ChannelBuffer::silent(480), ChannelBuffer::silent(480)],
///     48000,
///     Duration::ZERO,
/// );
/// assert_eq!(frame.duration(), Duration::from_millis(10));
/// ```
#[derive(Debug, Default, PartialEq)]
pub struct AudioFrame {
    /// Captured planes, one per input channel.
    pub read: Vec<ChannelBuffer>,

    /// Destination planes the host expects to be filled in place.
    ///
    /// Frames stored in the ring leave this empty.
    pub write: Vec<ChannelBuffer>,

    /// Number of input planes reported by the host.
    pub inputs: usize,

    /// Number of output planes reported by the host.
    pub outputs: usize,

    /// Samples in each plane.
    pub samples_per_channel: usize,

    /// Sample rate in Hz.
    pub sample_rate: u32,

    /// Capture time relative to an arbitrary, monotonic origin.
    pub timestamp: Duration,
}

impl Clone for AudioFrame {
    fn clone(&self) -> Self {
        Self {
            read: self.read.clone(),
            write: self.write.clone(),
            inputs: self.inputs,
            outputs: self.outputs,
            samples_per_channel: self.samples_per_channel,
            sample_rate: self.sample_rate,
            timestamp: self.timestamp,
        }
    }

    /// Reuses every plane `self` already owns.
    fn clone_from(&mut self, source: &Self) {
        self.read.clone_from(&source.read);
        self.write.clone_from(&source.write);
        self.inputs = source.inputs;
        self.outputs = source.outputs;
        self.samples_per_channel = source.samples_per_channel;
        self.sample_rate = source.sample_rate;
        self.timestamp = source.timestamp;
    }
}

impl AudioFrame {
    /// Creates a frame from captured planes with no pass-through destinations.
    ///
    /// `samples_per_channel` is taken from the first plane.
    pub fn new(read: Vec<ChannelBuffer>, sample_rate: u32, timestamp: Duration) -> Self {
        let samples_per_channel = read.first().map_or(0, ChannelBuffer::len);
        Self {
            inputs: read.len(),
            outputs: 0,
            read,
            write: Vec::new(),
            samples_per_channel,
            sample_rate,
            timestamp,
        }
    }

    /// Adds `outputs` zeroed destination planes sized like the captured ones.
    #[must_use]
    pub fn with_outputs(mut self, outputs: usize) -> Self {
        self.outputs = outputs;
        self.write = (0..outputs)
            .map(|_| ChannelBuffer::silent(self.samples_per_channel))
            .collect();
        self
    }

    /// Returns the captured plane at `index`, if present.
    pub fn channel(&self, index: usize) -> Option<&[f32]> {
        self.read.get(index).map(ChannelBuffer::as_slice)
    }

    /// Returns the duration of this frame.
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.samples_per_channel as f64 / f64::from(self.sample_rate))
    }

    /// Returns `true` if this frame carries no samples.
    pub fn is_empty(&self) -> bool {
        self.samples_per_channel == 0 || self.read.is_empty()
    }
}
