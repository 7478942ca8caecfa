//! Mock frame source for testing without a host.

use std::time::Duration;

use crate::{AudioFrame, ChannelBuffer};

/// Waveform produced by a [`MockSource`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Waveform {
    /// All samples zero.
    Silence,
    /// A sine wave at the given frequency in Hz, amplitude 1.0.
    Sine(f64),
    /// Every sample set to the same value.
    Constant(f32),
}

/// A mock source that produces synthetic [`AudioFrame`]s for testing.
///
/// This stands in for a host's audio callback, making it possible to drive a
/// hub in CI without any audio stack. Frames carry monotonic timestamps that
/// advance by exactly one frame duration per call, and sine phase is
/// continuous across frames.
///
/// # Example
///
/// ```
/// use audio_broadcast::source::{MockSource, Waveform};
/// use std::time::Duration;
///
/// let mut mock = MockSource::new(48000, 2, 480).waveform(Waveform::Sine(440.0));
///
/// let first = mock.next_frame();
/// let second = mock.next_frame();
///
/// assert_eq!(first.read.len(), 2);
/// assert_eq!(second.timestamp - first.timestamp, Duration::from_millis(10));
/// ```
#[derive(Debug, Clone)]
pub struct MockSource {
    sample_rate: u32,
    channels: usize,
    samples_per_channel: usize,
    outputs: usize,
    waveform: Waveform,
    /// Frames generated so far; drives both timestamps and sine phase.
    position: u64,
}

impl MockSource {
    /// Creates a silent source with the given format.
    pub fn new(sample_rate: u32, channels: usize, samples_per_channel: usize) -> Self {
        Self {
            sample_rate,
            channels,
            samples_per_channel,
            outputs: 0,
            waveform: Waveform::Silence,
            position: 0,
        }
    }

    /// Creates a source shaped like a stereo insert at 48kHz with 10ms frames.
    pub fn stereo_insert() -> Self {
        Self::new(48000, 2, 480).outputs(2)
    }

    /// Set the waveform.
    #[must_use]
    pub fn waveform(mut self, waveform: Waveform) -> Self {
        self.waveform = waveform;
        self
    }

    /// Set the number of pass-through destination planes per frame.
    #[must_use]
    pub fn outputs(mut self, outputs: usize) -> Self {
        self.outputs = outputs;
        self
    }

    /// Returns the sample rate.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Returns the number of captured planes per frame.
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Returns the number of frames generated so far.
    pub fn frames_generated(&self) -> u64 {
        self.position
    }

    /// Produces the next frame.
    pub fn next_frame(&mut self) -> AudioFrame {
        let start = self.position * self.samples_per_channel as u64;
        let timestamp = self.timestamp_of(start);

        let plane = self.render(start);
        let read = (0..self.channels)
            .map(|_| ChannelBuffer::from_slice(&plane))
            .collect();

        self.position += 1;
        AudioFrame::new(read, self.sample_rate, timestamp).with_outputs(self.outputs)
    }

    /// Produces a frame whose every sample equals `value`, advancing the clock
    /// like [`next_frame`](Self::next_frame).
    ///
    /// Handy for tagging frames so tests can tell them apart.
    pub fn tagged_frame(&mut self, value: f32) -> AudioFrame {
        let waveform = std::mem::replace(&mut self.waveform, Waveform::Constant(value));
        let frame = self.next_frame();
        self.waveform = waveform;
        frame
    }

    fn render(&self, start: u64) -> Vec<f32> {
        match self.waveform {
            Waveform::Silence => vec![0.0; self.samples_per_channel],
            Waveform::Constant(value) => vec![value; self.samples_per_channel],
            Waveform::Sine(frequency) => {
                let sample_rate = f64::from(self.sample_rate.max(1));
                (0..self.samples_per_channel as u64)
                    .map(|i| {
                        let t = (start + i) as f64 / sample_rate;
                        (2.0 * std::f64::consts::PI * frequency * t).sin() as f32
                    })
                    .collect()
            }
        }
    }

    fn timestamp_of(&self, sample: u64) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        let rate = u64::from(self.sample_rate);
        let secs = sample / rate;
        let nanos = (sample % rate) * 1_000_000_000 / rate;
        Duration::new(secs, nanos as u32)
    }
}
