//! Runtime events for monitoring hub and listener health.
//!
//! Events are non-fatal notifications. The hub keeps accepting writes after any
//! of them is emitted - they're for logging/metrics, not error handling.

use std::sync::Arc;

use crate::error::ListenerError;
use crate::subscription::StopReason;

/// Runtime events emitted by a hub and its listener tasks.
///
/// # Example
///
/// ```
/// use audio_broadcast::HubEvent;
///
/// fn handle_event(event: HubEvent) {
///     match event {
///         HubEvent::ListenerStarted { hub, listener } => {
///             eprintln!("{hub}: '{listener}' started");
///         }
///         HubEvent::ListenerStopped { hub, listener, reason } => {
///             eprintln!("{hub}: '{listener}' stopped ({reason})");
///         }
///         HubEvent::ListenerOverrun { listener, skipped, .. } => {
///             eprintln!("'{listener}' fell behind, {skipped} frames lost");
///         }
///         HubEvent::ListenerError { listener, error, .. } => {
///             eprintln!("'{listener}' error: {error}");
///         }
///         HubEvent::Disconnected { hub } => eprintln!("{hub} disconnected"),
///         HubEvent::Cleared { hub, released } => {
///             eprintln!("{hub}: released {released} slots");
///         }
///     }
/// }
/// ```
#[derive(Debug, Clone)]
pub enum HubEvent {
    /// A listener task started waiting for frames.
    ListenerStarted {
        /// Name of the hub.
        hub: String,
        /// Name of the listener.
        listener: String,
    },

    /// A listener task terminated.
    ///
    /// Any frames written but not yet consumed at that moment are not delivered.
    ListenerStopped {
        /// Name of the hub.
        hub: String,
        /// Name of the listener.
        listener: String,
        /// Why the task ended.
        reason: StopReason,
    },

    /// A listener fell more than a full ring behind the producer.
    ///
    /// The listener is moved forward to the oldest retained frame. Consider a
    /// larger capacity or a faster `consume`.
    ListenerOverrun {
        /// Name of the hub.
        hub: String,
        /// Name of the listener.
        listener: String,
        /// Number of frames that were overwritten before being read.
        skipped: u64,
    },

    /// A listener failed to consume a frame.
    ListenerError {
        /// Name of the hub.
        hub: String,
        /// Name of the listener.
        listener: String,
        /// The error returned by the listener.
        error: ListenerError,
    },

    /// The hub-wide stop signal was raised.
    Disconnected {
        /// Name of the hub.
        hub: String,
    },

    /// Slot resources were released by [`BroadcastHub::clear`](crate::BroadcastHub::clear).
    Cleared {
        /// Name of the hub.
        hub: String,
        /// Number of used slots handed to the release callback.
        released: usize,
    },
}

/// Callback type for receiving runtime events.
///
/// Register an event callback via [`BroadcastHubBuilder::on_event()`].
///
/// [`BroadcastHubBuilder::on_event()`]: crate::BroadcastHubBuilder::on_event
pub type EventCallback = Arc<dyn Fn(HubEvent) + Send + Sync>;

/// Creates an [`EventCallback`] from a closure.
///
/// # Example
///
/// ```
/// use audio_broadcast::{event_callback, HubEvent};
///
/// let callback = event_callback(|event: HubEvent| {
///     println!("Got event: {:?}", event);
/// });
/// ```
pub fn event_callback<F>(f: F) -> EventCallback
where
    F: Fn(HubEvent) + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Sends an event to the callback if one is configured.
pub(crate) fn emit(callback: Option<&EventCallback>, event: HubEvent) {
    if let Some(callback) = callback {
        callback(event);
    }
}
