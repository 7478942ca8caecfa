//! Builder pattern for `BroadcastHub`.

use std::marker::PhantomData;

use tokio::runtime::Handle;

use crate::{event_callback, BroadcastHub, EventCallback, HubConfig, HubEvent};

/// Builder for configuring a [`BroadcastHub`].
///
/// Use [`BroadcastHub::builder()`] to create a new builder.
///
/// # Example
///
/// ```
/// use audio_broadcast::{AudioFrame, BroadcastHub};
///
/// let hub = BroadcastHub::<AudioFrame>::builder()
///     .name("voicemeeter-main")
///     .capacity(16)
///     .on_event(|e| tracing::warn!(?e, "hub event"))
///     .build();
///
/// assert_eq!(hub.name(), "voicemeeter-main");
/// assert_eq!(hub.capacity(), 16);
/// ```
#[must_use]
pub struct BroadcastHubBuilder<T> {
    /// Hub configuration.
    config: HubConfig,
    /// Event callback.
    event_callback: Option<EventCallback>,
    /// Runtime listener tasks are spawned on.
    runtime: Option<Handle>,
    _frame: PhantomData<fn() -> T>,
}

impl<T> Default for BroadcastHubBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> BroadcastHubBuilder<T> {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: HubConfig::default(),
            event_callback: None,
            runtime: None,
            _frame: PhantomData,
        }
    }

    /// Set the hub name used in logs and events.
    ///
    /// Default: `"hub"`
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = name.into();
        self
    }

    /// Set the number of ring slots.
    ///
    /// Default: [`DEFAULT_CAPACITY`](crate::DEFAULT_CAPACITY). 0 means the default.
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.config.capacity = capacity;
        self
    }

    /// Set the whole hub configuration at once.
    pub fn with_config(mut self, config: HubConfig) -> Self {
        self.config = config;
        self
    }

    /// Set a callback to receive runtime events.
    ///
    /// Events include listener start/stop, overruns, listener errors and
    /// disconnects. The callback runs on whichever thread or task raised the
    /// event; keep it short.
    pub fn on_event<F>(mut self, callback: F) -> Self
    where
        F: Fn(HubEvent) + Send + Sync + 'static,
    {
        self.event_callback = Some(event_callback(callback));
        self
    }

    /// Spawn listener tasks on this runtime.
    ///
    /// Without it, [`BroadcastHub::add_listener`] uses the runtime it is called
    /// from. Set this when listeners are registered from a plain thread, such
    /// as a host audio callback.
    pub fn runtime(mut self, handle: Handle) -> Self {
        self.runtime = Some(handle);
        self
    }
}

impl<T: Default> BroadcastHubBuilder<T> {
    /// Creates the hub.
    pub fn build(self) -> BroadcastHub<T> {
        tracing::debug!(
            hub = %self.config.name,
            capacity = self.config.effective_capacity(),
            "building broadcast hub"
        );
        BroadcastHub::from_parts(self.config, self.event_callback, self.runtime)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ChannelListener;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::sync::mpsc;

    #[test]
    fn test_builder_defaults() {
        let hub = BroadcastHubBuilder::<u32>::new().build();
        assert_eq!(hub.name(), "hub");
        assert_eq!(hub.capacity(), crate::DEFAULT_CAPACITY);
        assert!(!hub.is_active());
    }

    #[test]
    fn test_builder_zero_capacity() {
        let hub = BroadcastHub::<u32>::builder().capacity(0).build();
        assert_eq!(hub.capacity(), crate::DEFAULT_CAPACITY);
    }

    #[test]
    fn test_builder_with_config() {
        let hub = BroadcastHub::<u32>::builder()
            .with_config(HubConfig::new("insert", 6))
            .build();
        assert_eq!(hub.name(), "insert");
        assert_eq!(hub.capacity(), 6);
    }

    #[test]
    fn test_builder_runtime_allows_registration_off_runtime() {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .unwrap();

        let hub = BroadcastHub::<u32>::builder()
            .runtime(runtime.handle().clone())
            .build();
        let (tx, mut rx) = mpsc::channel::<u32>(4);

        // Not inside a runtime context here
        let sub = hub.add_listener(Arc::new(ChannelListener::new(tx))).unwrap();
        hub.write(&mut 5, |incoming, slot, _| *slot = *incoming);

        let received = runtime.block_on(rx.recv());
        assert_eq!(received, Some(5));

        runtime.block_on(sub.stop()).unwrap();
    }

    #[test]
    fn test_builder_event_callback_receives_cleared() {
        let cleared = Arc::new(AtomicUsize::new(0));
        let counter = cleared.clone();
        let hub = BroadcastHub::<u32>::builder()
            .on_event(move |e| {
                if let HubEvent::Cleared { released, .. } = e {
                    counter.store(released, Ordering::SeqCst);
                }
            })
            .build();

        hub.write(&mut 1, |incoming, slot, _| *slot = *incoming);
        hub.write(&mut 2, |incoming, slot, _| *slot = *incoming);
        hub.clear(|_| {});

        assert_eq!(cleared.load(Ordering::SeqCst), 2);
    }
}
