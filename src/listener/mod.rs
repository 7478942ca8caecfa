//! Listener trait and implementations for frame consumers.
//!
//! A [`Listener`] is anything that wants every frame written to a hub after it
//! registered. The crate provides two built-in listeners:
//!
//! - [`ChannelListener`]: Forwards cloned frames to a tokio mpsc channel
//! - [`FnListener`]: Wraps a closure
//!
//! Implement [`Listener`] yourself for anything else (a host audio source, a
//! meter, a recorder).

mod channel;
mod func;

pub use channel::ChannelListener;
pub use func::{listener_fn, FnListener};

use crate::ListenerError;
use async_trait::async_trait;

/// A consumer of frames broadcast by a [`BroadcastHub`](crate::BroadcastHub).
///
/// Each registered listener gets its own task and read cursor. The task calls
/// [`consume`](Listener::consume) once per frame, strictly in write order.
///
/// # Implementation Notes
///
/// - Methods take `&self` - use interior mutability (`Mutex`, atomics) if needed
/// - `consume` gets the task's private copy of the frame, taken under the
///   slot lock and released before the call. Blocking here delays this
///   listener only; the producer keeps writing and the listener may be lapped
/// - `on_start` runs on the listener task before the first wait; an error
///   terminates the task
/// - `on_stop` runs on every exit path of the task
///
/// # Example
///
/// ```
/// use audio_broadcast::{AudioFrame, Listener, ListenerError};
/// use std::sync::atomic::{AtomicU64, Ordering};
///
/// struct FrameCounter {
///     frames: AtomicU64,
/// }
///
/// impl Listener<AudioFrame> for FrameCounter {
///     fn name(&self) -> &str {
///         "counter"
///     }
///
///     fn consume(&self, _frame: &AudioFrame) -> Result<(), ListenerError> {
///         self.frames.fetch_add(1, Ordering::Relaxed);
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Listener<T>: Send + Sync {
    /// Human-readable name for logging, events and error messages.
    fn name(&self) -> &str;

    /// Called once on the listener task before any frame is delivered.
    ///
    /// Default implementation does nothing.
    async fn on_start(&self) -> Result<(), ListenerError> {
        Ok(())
    }

    /// Handle one frame.
    ///
    /// Errors are recoverable - the task emits a
    /// [`HubEvent::ListenerError`](crate::HubEvent::ListenerError) and moves on.
    fn consume(&self, item: &T) -> Result<(), ListenerError>;

    /// Called when the listener task ends, whatever the reason.
    ///
    /// Default implementation does nothing.
    async fn on_stop(&self) -> Result<(), ListenerError> {
        Ok(())
    }
}
