//! Merge and release callbacks for [`AudioFrame`] hubs.
//!
//! [`BroadcastHub::write`](crate::BroadcastHub::write) hands every incoming
//! frame to a merge callback together with the slot it lands in. The helpers
//! here implement the two things a capture callback needs:
//!
//! - copying the captured planes into the slot, reusing the slot's buffers
//!   whenever they are large enough ([`copy_frame`])
//! - handing audio back to the host by filling the incoming frame's `write`
//!   planes from its own `read` planes ([`PassThrough`])

use super::{AudioFrame, BufferPolicy, ChannelBuffer};

/// Copies the captured planes and all metadata of `incoming` into `slot`.
///
/// When `used` is `false` the slot has never held a frame, so every plane is
/// freshly allocated. Otherwise each plane is copied with
/// [`ChannelBuffer::assign`], which only reallocates when the incoming plane is
/// larger than what the slot already owns. Extra planes left over from a
/// previous, wider frame are dropped so no stale audio survives in the slot.
///
/// Returns the number of planes that had to grow.
pub fn copy_frame(incoming: &AudioFrame, slot: &mut AudioFrame, used: bool) -> usize {
    let mut grown = 0;
    if used {
        slot.read.truncate(incoming.read.len());
        for (i, src) in incoming.read.iter().enumerate() {
            match slot.read.get_mut(i) {
                Some(dst) => {
                    if dst.assign(src.as_slice()) == BufferPolicy::Grow {
                        grown += 1;
                    }
                }
                None => {
                    slot.read.push(ChannelBuffer::from_slice(src.as_slice()));
                    grown += 1;
                }
            }
        }
    } else {
        slot.read = incoming
            .read
            .iter()
            .map(|src| ChannelBuffer::from_slice(src.as_slice()))
            .collect();
        grown = slot.read.len();
    }

    slot.write.clear();
    slot.inputs = incoming.inputs;
    slot.outputs = incoming.outputs;
    slot.samples_per_channel = incoming.samples_per_channel;
    slot.sample_rate = incoming.sample_rate;
    slot.timestamp = incoming.timestamp;
    grown
}

/// Which captured planes are copied back into the host's destination planes.
///
/// `write[i]` receives `read[source_offset + i]` for `i < channels`. Planes
/// missing on either side are skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PassThrough {
    /// Index of the first captured plane to copy.
    pub source_offset: usize,
    /// Number of planes to copy.
    pub channels: usize,
}

impl PassThrough {
    /// Insert stages: captured plane `i` goes straight back to destination `i`.
    pub fn insert(channels: usize) -> Self {
        Self {
            source_offset: 0,
            channels,
        }
    }

    /// Main stage: the captured planes list every strip channel first, then
    /// every bus channel; only the bus channels are handed back.
    pub fn main(strip_channels: usize, bus_channels: usize) -> Self {
        Self {
            source_offset: strip_channels,
            channels: bus_channels,
        }
    }

    /// Fills `frame.write` from `frame.read` in place.
    ///
    /// Returns the number of planes copied.
    pub fn apply(&self, frame: &mut AudioFrame) -> usize {
        let AudioFrame { read, write, .. } = frame;
        let mut copied = 0;
        for (dst, src) in write
            .iter_mut()
            .zip(read.iter().skip(self.source_offset))
            .take(self.channels)
        {
            let len = dst.len().min(src.len());
            dst.as_mut_slice()[..len].copy_from_slice(&src.as_slice()[..len]);
            copied += 1;
        }
        copied
    }
}

/// Builds a merge callback that stores the frame and then performs `pass`.
///
/// # Example
///
/// ```
/// use audio_broadcast::merge::{with_pass_through, PassThrough};
/// use audio_broadcast::{AudioFrame, BroadcastHub, ChannelBuffer};
/// use std::time::Duration;
///
/// let hub = BroadcastHub::<AudioFrame>::new(8);
/// let mut frame = AudioFrame::new(
///     vec![ChannelBuffer::from_slice(&[0.25; 4])],
///     48000,
///     Duration::ZERO,
/// )
/// .with_outputs(1);
///
/// hub.write(&mut frame, with_pass_through(PassThrough::insert(1)));
/// assert_eq!(frame.write[0].as_slice(), &[0.25; 4]);
/// ```
pub fn with_pass_through(pass: PassThrough) -> impl FnOnce(&mut AudioFrame, &mut AudioFrame, bool) {
    move |incoming: &mut AudioFrame, slot: &mut AudioFrame, used: bool| {
        copy_frame(incoming, slot, used);
        pass.apply(incoming);
    }
}

/// Merge callback that stores the frame without touching the host's planes.
pub fn store(incoming: &mut AudioFrame, slot: &mut AudioFrame, used: bool) {
    copy_frame(incoming, slot, used);
}

/// Release callback for [`BroadcastHub::clear`](crate::BroadcastHub::clear).
///
/// Frees every plane the slot owns.
pub fn release_frame(frame: &mut AudioFrame) {
    for plane in frame.read.iter_mut().chain(frame.write.iter_mut()) {
        plane.release();
    }
    frame.read.clear();
    frame.write.clear();
}
