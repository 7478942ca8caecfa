//! Handle to a running listener task.

use std::fmt;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::pipeline::{ConsumerState, TaskState};
use crate::{BroadcastError, ListenerError};

/// Why a listener task terminated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// The hub-wide stop signal was raised by
    /// [`BroadcastHub::disconnect`](crate::BroadcastHub::disconnect) (or the hub
    /// was dropped). Every listener of the hub ends with this reason.
    HubDisconnected,

    /// The listener's own stop signal was raised.
    Stopped,

    /// The wait failed: the hub's write notifier closed or the hub is gone.
    HubClosed,

    /// [`Listener::on_start`](crate::Listener::on_start) returned an error.
    StartFailed(ListenerError),
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HubDisconnected => write!(f, "hub disconnected"),
            Self::Stopped => write!(f, "stopped"),
            Self::HubClosed => write!(f, "hub closed"),
            Self::StartFailed(e) => write!(f, "start failed: {e}"),
        }
    }
}

/// Per-listener counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListenerStats {
    /// Frames handed to `consume`.
    pub consumed: u64,
    /// Frames overwritten before this listener could read them.
    pub overruns: u64,
    /// `consume` calls that returned an error.
    pub errors: u64,
}

/// Handle to a listener registered with a hub.
///
/// Returned by [`BroadcastHub::add_listener()`]. The listener's task runs in the
/// background until one of:
///
/// 1. [`stop()`](Subscription::stop) is called (or the private stop token is
///    cancelled)
/// 2. the hub is disconnected or dropped
/// 3. the `Subscription` is dropped (raises the private stop signal)
///
/// Frames written but not yet consumed when the task stops are not delivered.
///
/// # Example
///
/// ```ignore
/// let sub = hub.add_listener(Arc::new(listener))?;
///
/// // Frames flow in the background...
///
/// let reason = sub.stop().await?;
/// assert_eq!(reason, StopReason::Stopped);
/// ```
///
/// [`BroadcastHub::add_listener()`]: crate::BroadcastHub::add_listener
#[must_use = "dropping a Subscription stops its listener"]
pub struct Subscription {
    name: String,
    stop: CancellationToken,
    state: Arc<TaskState>,
    handle: Option<JoinHandle<StopReason>>,
}

impl Subscription {
    pub(crate) fn new(
        name: String,
        stop: CancellationToken,
        state: Arc<TaskState>,
        handle: JoinHandle<StopReason>,
    ) -> Self {
        Self {
            name,
            stop,
            state,
            handle: Some(handle),
        }
    }

    /// Name of the listener.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current state of the listener task.
    pub fn state(&self) -> ConsumerState {
        self.state.get()
    }

    /// Returns `true` until the task has terminated.
    pub fn is_running(&self) -> bool {
        self.state() != ConsumerState::Terminated
    }

    /// Returns current listener statistics.
    pub fn stats(&self) -> ListenerStats {
        self.state.stats()
    }

    /// The listener's private stop signal.
    ///
    /// Cancelling it ends this listener only; other listeners of the hub keep
    /// running.
    pub fn stop_token(&self) -> CancellationToken {
        self.stop.clone()
    }

    /// Stops the listener and waits for its task to finish.
    ///
    /// The task notices the signal at its next wait; a drain already in
    /// progress completes first. If the task had already ended (for example
    /// after [`BroadcastHub::disconnect`](crate::BroadcastHub::disconnect)) its
    /// original reason is returned.
    ///
    /// # Errors
    ///
    /// Returns an error if the task panicked or was aborted.
    pub async fn stop(mut self) -> Result<StopReason, BroadcastError> {
        self.stop.cancel();
        self.join_internal().await
    }

    /// Waits for the listener task to end on its own, without signalling it.
    ///
    /// # Errors
    ///
    /// Returns an error if the task panicked or was aborted.
    pub async fn join(mut self) -> Result<StopReason, BroadcastError> {
        self.join_internal().await
    }

    async fn join_internal(&mut self) -> Result<StopReason, BroadcastError> {
        let Some(handle) = self.handle.take() else {
            return Ok(StopReason::Stopped);
        };

        handle.await.map_err(|e| {
            if e.is_panic() {
                tracing::error!(listener = %self.name, "listener task panicked");
                BroadcastError::TaskPanicked {
                    listener: self.name.clone(),
                }
            } else {
                BroadcastError::TaskAborted {
                    listener: self.name.clone(),
                }
            }
        })
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("name", &self.name)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if self.handle.is_some() {
            // Dropped without stop()/join() - let the task wind down on its own
            self.stop.cancel();
        }
    }
}
