//! Producer-facing broadcast hub.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::builder::BroadcastHubBuilder;
use crate::event::{emit, EventCallback};
use crate::listener::Listener;
use crate::pipeline::consumer::{ConsumerTask, TaskContext, TaskState};
use crate::pipeline::ring_buffer::RingBuffer;
use crate::subscription::Subscription;
use crate::{BroadcastError, HubConfig, HubEvent};

/// Hub-wide counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HubStats {
    /// Completed writes since construction.
    pub writes: u64,
    /// Frames lost to overruns, summed over all listeners.
    pub overruns: u64,
    /// Listener tasks that have not terminated yet.
    pub active_listeners: usize,
}

/// State shared between the hub and its listener tasks.
///
/// Tasks hold it weakly; once the hub is dropped they observe the failed
/// upgrade (or the closed notifier) and stop.
pub(crate) struct Shared<T> {
    pub name: String,
    pub ring: RingBuffer<T>,
    /// Generation counter: the write sequence after the latest write.
    written: watch::Sender<u64>,
    stop: Mutex<CancellationToken>,
    producer: Mutex<()>,
    active: AtomicBool,
    listeners: Arc<AtomicUsize>,
    overruns: AtomicU64,
    event_callback: Option<EventCallback>,
    runtime: Option<Handle>,
}

impl<T> Shared<T> {
    pub fn record_overrun(&self, skipped: u64) {
        self.overruns.fetch_add(skipped, Ordering::Relaxed);
    }
}

/// Single-producer, multi-listener broadcast of frames through a fixed ring.
///
/// The producer calls [`write`](Self::write) with its frame and a merge
/// callback; every listener registered with
/// [`add_listener`](Self::add_listener) gets its own task that delivers each
/// frame written after registration, in order, at the listener's own pace.
///
/// A listener that falls more than `capacity` frames behind loses the oldest
/// ones and continues from the oldest retained frame. The producer never
/// waits for listeners.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use audio_broadcast::{BroadcastHub, ChannelListener};
/// use tokio::sync::mpsc;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), audio_broadcast::BroadcastError> {
/// let hub = BroadcastHub::<u32>::new(4);
/// let (tx, mut rx) = mpsc::channel::<u32>(16);
/// let sub = hub.add_listener(Arc::new(ChannelListener::new(tx)))?;
///
/// hub.write(&mut 7, |incoming, slot, _used| *slot = *incoming);
/// assert_eq!(rx.recv().await, Some(7));
///
/// sub.stop().await?;
/// # Ok(())
/// # }
/// ```
pub struct BroadcastHub<T> {
    shared: Arc<Shared<T>>,
}

impl<T: Default> BroadcastHub<T> {
    /// Creates an unnamed hub with `capacity` slots (0 means
    /// [`DEFAULT_CAPACITY`](crate::DEFAULT_CAPACITY)).
    pub fn new(capacity: usize) -> Self {
        Self::with_config(HubConfig {
            capacity,
            ..HubConfig::default()
        })
    }

    /// Creates a hub from a configuration.
    pub fn with_config(config: HubConfig) -> Self {
        Self::from_parts(config, None, None)
    }

    pub(crate) fn from_parts(
        config: HubConfig,
        event_callback: Option<EventCallback>,
        runtime: Option<Handle>,
    ) -> Self {
        let capacity = config.effective_capacity();
        if config.capacity == 0 {
            tracing::debug!(hub = %config.name, capacity, "zero capacity requested, using default");
        }

        let (written, _) = watch::channel(0);

        Self {
            shared: Arc::new(Shared {
                name: config.name,
                ring: RingBuffer::new(capacity),
                written,
                stop: Mutex::new(CancellationToken::new()),
                producer: Mutex::new(()),
                active: AtomicBool::new(false),
                listeners: Arc::new(AtomicUsize::new(0)),
                overruns: AtomicU64::new(0),
                event_callback,
                runtime,
            }),
        }
    }
}

impl<T: Default> BroadcastHub<T> {
    /// Returns a builder for a hub with a name, event callback or runtime.
    pub fn builder() -> BroadcastHubBuilder<T> {
        BroadcastHubBuilder::new()
    }
}

impl<T> BroadcastHub<T> {
    /// Name used in logs and events.
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Number of slots in the ring.
    pub fn capacity(&self) -> usize {
        self.shared.ring.capacity()
    }

    /// Returns `true` between the first registration and the next
    /// [`disconnect`](Self::disconnect).
    pub fn is_active(&self) -> bool {
        let _stop = self.shared.stop.lock();
        self.shared.active.load(Ordering::SeqCst)
    }

    /// Number of completed writes.
    pub fn write_sequence(&self) -> u64 {
        self.shared.ring.write_sequence()
    }

    /// Slot index the next write lands in.
    pub fn writable_index(&self) -> usize {
        self.shared.ring.writable_index()
    }

    /// Slot index after the next write.
    pub fn readable_index(&self) -> usize {
        self.shared.ring.readable_index()
    }

    /// Returns current hub statistics.
    pub fn stats(&self) -> HubStats {
        HubStats {
            writes: self.shared.ring.write_sequence(),
            overruns: self.shared.overruns.load(Ordering::Relaxed),
            active_listeners: self.shared.listeners.load(Ordering::SeqCst),
        }
    }

    /// Publishes one frame to every listener.
    ///
    /// `merge(data, slot, was_used)` runs exactly once, with the next slot
    /// locked. It must fully populate `slot` when `was_used` is `false` and
    /// may write back into `data` (pass-through). Listeners are woken only
    /// after the merge has completed.
    ///
    /// Concurrent callers are serialized. Never waits for a listener's
    /// `consume`: at most it waits for one listener to finish copying the
    /// slot being overwritten out of the ring.
    ///
    /// Returns the sequence assigned to this frame.
    pub fn write<F>(&self, data: &mut T, merge: F) -> u64
    where
        F: FnOnce(&mut T, &mut T, bool),
    {
        let _producer = self.shared.producer.lock();
        let seq = self.shared.ring.write(data, merge);
        self.shared.written.send_replace(seq + 1);
        seq
    }

    /// Raises the hub-wide stop signal.
    ///
    /// Every listener task of this hub terminates at its next wait, without
    /// draining frames it has not read yet. The hub stays usable: writes
    /// still land in the ring, and a later [`add_listener`](Self::add_listener)
    /// re-arms the signal. Calling this again is a no-op.
    pub fn disconnect(&self) {
        let stop = self.shared.stop.lock();
        self.shared.active.store(false, Ordering::SeqCst);
        if stop.is_cancelled() {
            return;
        }
        stop.cancel();
        drop(stop);

        tracing::info!(
            hub = %self.shared.name,
            listeners = self.shared.listeners.load(Ordering::SeqCst),
            "hub disconnected"
        );
        emit(
            self.shared.event_callback.as_ref(),
            HubEvent::Disconnected {
                hub: self.shared.name.clone(),
            },
        );
    }

    /// Hands every written slot to `release` and marks all slots unused.
    ///
    /// Only call this once every listener task has exited (after
    /// [`disconnect`](Self::disconnect) and joining the subscriptions); a
    /// task still draining would read released slots. Returns the number of
    /// slots released.
    pub fn clear<F>(&self, release: F) -> usize
    where
        F: FnMut(&mut T),
    {
        let live = self.shared.listeners.load(Ordering::SeqCst);
        if live > 0 {
            tracing::warn!(
                hub = %self.shared.name,
                listeners = live,
                "clearing ring while listener tasks are still running"
            );
        }

        let released = {
            let _producer = self.shared.producer.lock();
            self.shared.ring.clear(release)
        };

        tracing::debug!(hub = %self.shared.name, released, "ring cleared");
        emit(
            self.shared.event_callback.as_ref(),
            HubEvent::Cleared {
                hub: self.shared.name.clone(),
                released,
            },
        );
        released
    }
}

impl<T: Clone + Default + Send + Sync + 'static> BroadcastHub<T> {
    /// Registers a listener and starts its task.
    ///
    /// The task copies each frame out of its slot before calling
    /// [`Listener::consume`], so a slow listener never holds a slot the
    /// producer needs. The listener sees only frames written after this call
    /// returns. Its
    /// task is spawned on the hub's runtime handle, or on the current tokio
    /// runtime if the hub was built without one.
    ///
    /// # Errors
    ///
    /// Returns [`BroadcastError::NoRuntime`] when no runtime is available.
    pub fn add_listener(
        &self,
        listener: Arc<dyn Listener<T>>,
    ) -> Result<Subscription, BroadcastError> {
        self.add_listener_with_stop(listener, CancellationToken::new())
    }

    /// Registers a listener with a caller-supplied private stop token.
    ///
    /// Cancelling `stop` ends this listener only. Useful when the stop must
    /// come from code that does not own the [`Subscription`].
    ///
    /// # Errors
    ///
    /// Returns [`BroadcastError::NoRuntime`] when no runtime is available.
    pub fn add_listener_with_stop(
        &self,
        listener: Arc<dyn Listener<T>>,
        stop: CancellationToken,
    ) -> Result<Subscription, BroadcastError> {
        let name = listener.name().to_string();

        let runtime = match &self.shared.runtime {
            Some(handle) => handle.clone(),
            None => Handle::try_current().map_err(|_| BroadcastError::NoRuntime {
                listener: name.clone(),
            })?,
        };

        let hub_stop = {
            let mut current = self.shared.stop.lock();
            if current.is_cancelled() {
                tracing::debug!(hub = %self.shared.name, "re-arming stop signal");
                *current = CancellationToken::new();
            }
            // Flag and token only change together, under the lock
            self.shared.active.store(true, Ordering::SeqCst);
            current.clone()
        };

        // Subscribe before reading the cursor so a write in between wakes the task
        let written = self.shared.written.subscribe();
        let start = self.shared.ring.write_sequence();

        let state = Arc::new(TaskState::new());
        self.shared.listeners.fetch_add(1, Ordering::SeqCst);

        let task = ConsumerTask::new(TaskContext {
            hub: Arc::downgrade(&self.shared),
            hub_name: self.shared.name.clone(),
            listener,
            start,
            written,
            hub_stop,
            local_stop: stop.clone(),
            state: state.clone(),
            active: self.shared.listeners.clone(),
            event_callback: self.shared.event_callback.clone(),
        });

        tracing::debug!(hub = %self.shared.name, listener = %name, start, "spawning listener task");
        let handle = runtime.spawn(task.run());

        Ok(Subscription::new(name, stop, state, handle))
    }
}

impl<T> fmt::Debug for BroadcastHub<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BroadcastHub")
            .field("name", &self.shared.name)
            .field("ring", &self.shared.ring)
            .field("active", &self.is_active())
            .finish_non_exhaustive()
    }
}

impl<T> Drop for BroadcastHub<T> {
    fn drop(&mut self) {
        self.disconnect();
    }
}
