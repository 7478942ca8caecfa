//! Tokio mpsc channel listener implementation.

use crate::listener::Listener;
use crate::ListenerError;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// A listener that forwards a clone of every frame to a tokio mpsc channel.
///
/// This hands frames to async code that runs at its own pace, off the
/// listener task. Sends never wait: if the channel is full the frame is
/// dropped for this listener and a [`ListenerError::ChannelFull`] is reported.
///
/// # Example
///
/// ```
/// use audio_broadcast::{AudioFrame, ChannelListener};
/// use tokio::sync::mpsc;
///
/// let (tx, mut rx) = mpsc::channel::<AudioFrame>(64);
/// let listener = ChannelListener::new(tx);
///
/// // Register with hub.add_listener(Arc::new(listener))...
/// // Then receive frames:
/// // while let Some(frame) = rx.recv().await { ... }
/// ```
pub struct ChannelListener<T> {
    name: String,
    sender: mpsc::Sender<T>,
}

impl<T> ChannelListener<T> {
    /// Creates a new channel listener with the given sender.
    ///
    /// Size the channel for the longest stall you expect from the receiver.
    pub fn new(sender: mpsc::Sender<T>) -> Self {
        Self {
            name: "channel".to_string(),
            sender,
        }
    }

    /// Creates a new channel listener with a custom name.
    pub fn with_name(name: impl Into<String>, sender: mpsc::Sender<T>) -> Self {
        Self {
            name: name.into(),
            sender,
        }
    }
}

impl<T> Listener<T> for ChannelListener<T>
where
    T: Clone + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn consume(&self, item: &T) -> Result<(), ListenerError> {
        self.sender.try_send(item.clone()).map_err(|e| match e {
            TrySendError::Full(_) => ListenerError::ChannelFull,
            TrySendError::Closed(_) => ListenerError::ChannelClosed,
        })
    }
}
