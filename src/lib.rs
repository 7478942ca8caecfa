//! # audio-broadcast
//!
//! **Note:** This crate is under active development. The API may change before 1.0.
//!
//! Single-producer, multi-listener broadcast of timestamped audio frames.
//!
//! `audio-broadcast` sits between a host audio callback and any number of
//! consumers. The callback publishes each frame into a fixed ring and returns
//! immediately; every listener drains the ring on its own task, at its own
//! pace, and only ever sees frames written after it registered.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use audio_broadcast::{merge, AudioFrame, BroadcastHub, ChannelListener};
//! use tokio::sync::mpsc;
//!
//! let hub = Arc::new(
//!     BroadcastHub::<AudioFrame>::builder()
//!         .name("insert-1")
//!         .capacity(32)
//!         .on_event(|e| tracing::warn!(?e, "hub event"))
//!         .build(),
//! );
//!
//! // Consumer side: one task per listener
//! let (tx, mut rx) = mpsc::channel::<AudioFrame>(64);
//! let sub = hub.add_listener(Arc::new(ChannelListener::new(tx)))?;
//!
//! // Producer side, inside the host callback
//! hub.write(&mut frame, merge::with_pass_through(merge::PassThrough::insert(2)));
//!
//! while let Some(frame) = rx.recv().await {
//!     // Encode, meter, record...
//! }
//!
//! sub.stop().await?;
//! hub.disconnect();
//! hub.clear(merge::release_frame);
//! ```
//!
//! ## Architecture
//!
//! - **Producer**: the host callback; calls [`BroadcastHub::write`], never waits
//! - **Ring Buffer**: fixed slots, overwritten in place by a merge callback
//! - **Listener Tasks**: one per [`Listener`], woken by a write generation
//!   counter, stopped by the hub-wide or their own [`CancellationToken`]
//!
//! A listener that falls a full ring behind loses its oldest unread frames
//! rather than slowing the producer.
//!
//! [`CancellationToken`]: tokio_util::sync::CancellationToken

#![warn(missing_docs)]
// Sample counts, rates and sequence numbers cross between integer widths and f64
#![allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_lossless
)]
// unwrap/expect allowed in tests only
#![cfg_attr(test, allow(clippy::unwrap_used))]
// These doc lints are too strict for internal implementation details
#![allow(clippy::missing_panics_doc, clippy::missing_errors_doc)]

mod builder;
mod config;
mod error;
mod event;
mod frame;
mod listener;
mod pipeline;
pub mod source;
mod subscription;

pub use builder::BroadcastHubBuilder;
pub use config::{HubConfig, DEFAULT_CAPACITY};
pub use error::{BroadcastError, ListenerError};
pub use event::{event_callback, EventCallback, HubEvent};
pub use frame::{merge, AudioFrame, BufferPolicy, ChannelBuffer};
pub use listener::{listener_fn, ChannelListener, FnListener, Listener};
pub use pipeline::{BroadcastHub, ConsumerState, HubStats, RingBuffer, SlotRef};
pub use source::MockSource;
pub use subscription::{ListenerStats, StopReason, Subscription};
