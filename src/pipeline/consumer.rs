//! Listener task - waits for writes and drains the ring into one listener.
//!
//! Each registered listener runs one `ConsumerTask`:
//! - Waiting on three signals at once: the hub's write notifier, the hub-wide
//!   stop token and the listener's private stop token
//! - Draining every slot between its cursor and the live write cursor on each
//!   write wakeup, in sequence order
//! - Terminating without draining further as soon as either stop fires or the
//!   wait fails
//!
//! ```text
//!            written            caught up
//! Running ───────────▶ Draining ─────────▶ Running
//!    │
//!    └─ hub stop / own stop / wait failure ──▶ Terminated
//! ```

use std::sync::atomic::{AtomicU64, AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::event::{emit, EventCallback};
use crate::listener::Listener;
use crate::pipeline::hub::Shared;
use crate::pipeline::ring_buffer::{apply_overrun_policy, RingBuffer};
use crate::subscription::{ListenerStats, StopReason};
use crate::HubEvent;

/// Lifecycle state of a listener task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumerState {
    /// Waiting for the next write or stop signal.
    Running,
    /// Delivering newly written frames to the listener.
    Draining,
    /// The task has exited; no further frames are delivered.
    Terminated,
}

impl ConsumerState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::Running,
            1 => Self::Draining,
            _ => Self::Terminated,
        }
    }
}

/// State shared between a task and its [`Subscription`](crate::Subscription).
pub(crate) struct TaskState {
    state: AtomicU8,
    consumed: AtomicU64,
    overruns: AtomicU64,
    errors: AtomicU64,
}

impl TaskState {
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(ConsumerState::Running as u8),
            consumed: AtomicU64::new(0),
            overruns: AtomicU64::new(0),
            errors: AtomicU64::new(0),
        }
    }

    pub fn get(&self) -> ConsumerState {
        ConsumerState::from_u8(self.state.load(Ordering::SeqCst))
    }

    fn set(&self, state: ConsumerState) {
        self.state.store(state as u8, Ordering::SeqCst);
    }

    pub fn stats(&self) -> ListenerStats {
        ListenerStats {
            consumed: self.consumed.load(Ordering::SeqCst),
            overruns: self.overruns.load(Ordering::SeqCst),
            errors: self.errors.load(Ordering::SeqCst),
        }
    }
}

/// Outcome of one drain pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct DrainReport {
    pub consumed: u64,
    pub skipped: u64,
}

/// A reader's position in the ring, as a write sequence.
#[derive(Debug)]
pub(crate) struct ReadCursor {
    next: u64,
}

impl ReadCursor {
    /// Starts reading at `next`; nothing written before it is delivered.
    pub fn new(next: u64) -> Self {
        Self { next }
    }

    pub fn position(&self) -> u64 {
        self.next
    }

    /// Hands every slot from the cursor up to the live write cursor to
    /// `consume`, in order.
    ///
    /// Each slot is copied into `scratch` under its read lock and the lock is
    /// released before `consume` runs, so the producer waits at most for one
    /// copy. `clone_from` lets `scratch` keep its allocations across frames.
    ///
    /// The write cursor is re-read after every slot, so frames written while
    /// draining are picked up in the same pass. A reader that has been lapped
    /// is moved to the oldest retained frame and the loss is counted in
    /// `skipped`.
    pub fn drain<T, F>(
        &mut self,
        ring: &RingBuffer<T>,
        scratch: &mut T,
        mut consume: F,
    ) -> DrainReport
    where
        T: Clone,
        F: FnMut(&T),
    {
        let capacity = ring.capacity() as u64;
        let mut report = DrainReport::default();

        loop {
            let head = ring.write_sequence();
            report.skipped += apply_overrun_policy(head, &mut self.next, capacity);
            if self.next >= head {
                return report;
            }

            let slot = ring.read(self.next);
            match slot.sequence() {
                Some(seq) if seq == self.next => {
                    scratch.clone_from(&*slot);
                    drop(slot);
                    consume(&*scratch);
                    self.next += 1;
                    report.consumed += 1;
                }
                Some(seq) if seq > self.next => {
                    // Lapped between loading the head and locking the slot
                    drop(slot);
                    report.skipped += apply_overrun_policy(seq + 1, &mut self.next, capacity);
                }
                _ => {
                    // Slot was cleared under us
                    self.next += 1;
                    report.skipped += 1;
                }
            }
        }
    }
}

/// Marks the task terminated and releases its listener count on every exit
/// path, including a panicking listener.
struct ExitGuard {
    state: Arc<TaskState>,
    active: Arc<AtomicUsize>,
}

impl Drop for ExitGuard {
    fn drop(&mut self) {
        self.state.set(ConsumerState::Terminated);
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Everything a task needs, captured at registration time.
pub(crate) struct TaskContext<T> {
    pub hub: Weak<Shared<T>>,
    pub hub_name: String,
    pub listener: Arc<dyn Listener<T>>,
    pub start: u64,
    pub written: watch::Receiver<u64>,
    pub hub_stop: CancellationToken,
    pub local_stop: CancellationToken,
    pub state: Arc<TaskState>,
    pub active: Arc<AtomicUsize>,
    pub event_callback: Option<EventCallback>,
}

enum Wake {
    HubStop,
    LocalStop,
    Written(bool),
}

/// One listener's wait/drain loop.
pub(crate) struct ConsumerTask<T> {
    hub: Weak<Shared<T>>,
    hub_name: String,
    name: String,
    listener: Arc<dyn Listener<T>>,
    cursor: ReadCursor,
    /// Private copy of the slot being delivered.
    scratch: T,
    written: watch::Receiver<u64>,
    hub_stop: CancellationToken,
    local_stop: CancellationToken,
    state: Arc<TaskState>,
    event_callback: Option<EventCallback>,
    drains: u64,
    _exit: ExitGuard,
}

impl<T: Clone + Default + Send + Sync + 'static> ConsumerTask<T> {
    pub fn new(ctx: TaskContext<T>) -> Self {
        let name = ctx.listener.name().to_string();
        Self {
            hub: ctx.hub,
            hub_name: ctx.hub_name,
            name,
            listener: ctx.listener,
            cursor: ReadCursor::new(ctx.start),
            scratch: T::default(),
            written: ctx.written,
            hub_stop: ctx.hub_stop,
            local_stop: ctx.local_stop,
            state: ctx.state.clone(),
            event_callback: ctx.event_callback,
            drains: 0,
            _exit: ExitGuard {
                state: ctx.state,
                active: ctx.active,
            },
        }
    }

    /// Runs the listener until a stop signal or wait failure.
    pub async fn run(mut self) -> StopReason {
        if let Err(error) = self.listener.on_start().await {
            tracing::error!(
                hub = %self.hub_name,
                listener = %self.name,
                %error,
                "listener failed to start"
            );
            let reason = StopReason::StartFailed(error);
            self.finish(&reason).await;
            return reason;
        }

        tracing::info!(
            hub = %self.hub_name,
            listener = %self.name,
            cursor = self.cursor.position(),
            "listener started"
        );
        self.emit_event(HubEvent::ListenerStarted {
            hub: self.hub_name.clone(),
            listener: self.name.clone(),
        });

        let reason = self.wait_loop().await;
        self.finish(&reason).await;
        reason
    }

    async fn wait_loop(&mut self) -> StopReason {
        loop {
            self.state.set(ConsumerState::Running);

            // Stops win over a pending write: backlog is dropped, not flushed
            let wake = tokio::select! {
                biased;
                () = self.hub_stop.cancelled() => Wake::HubStop,
                () = self.local_stop.cancelled() => Wake::LocalStop,
                changed = self.written.changed() => Wake::Written(changed.is_ok()),
            };

            match wake {
                Wake::HubStop => return StopReason::HubDisconnected,
                Wake::LocalStop => return StopReason::Stopped,
                Wake::Written(false) => {
                    tracing::error!(
                        hub = %self.hub_name,
                        listener = %self.name,
                        "write notifier closed, stopping listener"
                    );
                    return StopReason::HubClosed;
                }
                Wake::Written(true) => {
                    if !self.drain_available() {
                        tracing::error!(
                            hub = %self.hub_name,
                            listener = %self.name,
                            "hub dropped while listener was waiting"
                        );
                        return StopReason::HubClosed;
                    }
                }
            }
        }
    }

    /// Drains everything written since the last pass.
    ///
    /// Returns `false` if the hub no longer exists.
    fn drain_available(&mut self) -> bool {
        let Some(shared) = self.hub.upgrade() else {
            return false;
        };

        self.state.set(ConsumerState::Draining);

        let Self {
            listener,
            cursor,
            scratch,
            state,
            event_callback,
            hub_name,
            name,
            ..
        } = self;

        let report = cursor.drain(&shared.ring, scratch, |item| {
            if let Err(error) = listener.consume(item) {
                state.errors.fetch_add(1, Ordering::SeqCst);
                tracing::warn!(hub = %hub_name, listener = %name, %error, "listener failed to consume frame");
                emit(
                    event_callback.as_ref(),
                    HubEvent::ListenerError {
                        hub: hub_name.clone(),
                        listener: name.clone(),
                        error,
                    },
                );
            }
        });

        let consumed = self.state.consumed.fetch_add(report.consumed, Ordering::SeqCst) + report.consumed;

        if report.skipped > 0 {
            self.state.overruns.fetch_add(report.skipped, Ordering::SeqCst);
            shared.record_overrun(report.skipped);
            tracing::warn!(
                hub = %self.hub_name,
                listener = %self.name,
                skipped = report.skipped,
                "listener fell behind, frames overwritten before read"
            );
            self.emit_event(HubEvent::ListenerOverrun {
                hub: self.hub_name.clone(),
                listener: self.name.clone(),
                skipped: report.skipped,
            });
        }

        self.drains += 1;
        if self.drains % 50 == 0 {
            tracing::debug!(
                "listener {}: drain #{}, {} frames this pass, {} total, cursor={}",
                self.name,
                self.drains,
                report.consumed,
                consumed,
                self.cursor.position()
            );
        }

        true
    }

    async fn finish(&self, reason: &StopReason) {
        if let Err(error) = self.listener.on_stop().await {
            tracing::warn!(
                hub = %self.hub_name,
                listener = %self.name,
                %error,
                "listener on_stop failed"
            );
        }

        tracing::info!(
            hub = %self.hub_name,
            listener = %self.name,
            %reason,
            "listener stopped"
        );
        self.emit_event(HubEvent::ListenerStopped {
            hub: self.hub_name.clone(),
            listener: self.name.clone(),
            reason: reason.clone(),
        });
    }

    fn emit_event(&self, event: HubEvent) {
        emit(self.event_callback.as_ref(), event);
    }
}
