//! Error types for audio-broadcast.
//!
//! Errors are split into two categories:
//! - **Fatal errors** ([`BroadcastError`]): a listener could not be registered or
//!   its task ended abnormally
//! - **Recoverable errors** ([`ListenerError`]): a single item could not be
//!   consumed; surfaced via [`EventCallback`](crate::EventCallback) and the
//!   listener keeps draining

/// Fatal errors returned from listener registration and task joins.
#[derive(Debug, thiserror::Error)]
pub enum BroadcastError {
    /// `add_listener` was called outside a tokio runtime and the hub was not
    /// built with an explicit runtime handle.
    #[error("no tokio runtime available to spawn listener '{listener}'")]
    NoRuntime {
        /// Name of the listener that could not be started.
        listener: String,
    },

    /// The listener task panicked while consuming.
    #[error("listener '{listener}' panicked")]
    TaskPanicked {
        /// Name of the listener whose task panicked.
        listener: String,
    },

    /// The listener task was aborted by the runtime (e.g. runtime shutdown).
    #[error("listener '{listener}' was aborted")]
    TaskAborted {
        /// Name of the listener whose task was aborted.
        listener: String,
    },
}

/// Errors that can occur within a [`Listener`](crate::Listener) implementation.
///
/// Listener errors are recoverable - the task emits a
/// [`HubEvent::ListenerError`] and moves on to the next item. There is no retry:
/// by the time a retry could run, the producer may already have moved on.
///
/// [`HubEvent::ListenerError`]: crate::HubEvent::ListenerError
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ListenerError {
    /// The downstream channel had no free capacity.
    #[error("channel full")]
    ChannelFull,

    /// The receiving channel was closed.
    #[error("channel closed")]
    ChannelClosed,

    /// The listener could not process the item.
    #[error("consume failed: {reason}")]
    ConsumeFailed {
        /// Description of what went wrong.
        reason: String,
    },

    /// Custom error for user-implemented listeners.
    #[error("{0}")]
    Custom(String),
}

impl ListenerError {
    /// Creates a custom listener error with the given message.
    pub fn custom(msg: impl Into<String>) -> Self {
        Self::Custom(msg.into())
    }

    /// Creates a consume failed error with the given reason.
    pub fn consume_failed(reason: impl Into<String>) -> Self {
        Self::ConsumeFailed {
            reason: reason.into(),
        }
    }
}
