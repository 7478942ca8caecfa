//! Broadcast pipeline components.
//!
//! One producer publishes frames into a fixed ring; every listener drains it
//! on its own task:
//!
//! ```text
//! Producer ─write─▶ Ring Buffer ─notify─▶ Listener Task ─consume─▶ Listener
//!                                   ├───▶ Listener Task ─consume─▶ Listener
//!                                   └───▶ ...
//! ```
//!
//! - **Ring Buffer**: Fixed slots, per-slot locks, monotonic write cursor
//! - **Hub**: Serializes the producer, owns the write notifier and stop signal
//! - **Listener Task**: Private cursor, waits on write/hub stop/own stop
//!
//! The producer never waits for a listener; a listener a full ring behind
//! loses its oldest unread frames instead.

mod consumer;
mod hub;
mod ring_buffer;

pub use consumer::ConsumerState;
pub(crate) use consumer::TaskState;
pub use hub::{BroadcastHub, HubStats};
pub use ring_buffer::{RingBuffer, SlotRef};
