//! Multi-listener example.
//!
//! Simulates a host audio callback on a plain thread publishing 10ms stereo
//! frames, with three listeners draining the same hub at different speeds:
//! a peak meter, a custom listener that computes running statistics, and a
//! channel that feeds an async "encoder" task.
//!
//! Run with: cargo run --example multi_listener
//! More logging: RUST_LOG=audio_broadcast=debug cargo run --example multi_listener

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use audio_broadcast::merge::{self, PassThrough};
use audio_broadcast::source::{MockSource, Waveform};
use audio_broadcast::{
    listener_fn, AudioFrame, BroadcastHub, ChannelListener, HubEvent, Listener, ListenerError,
};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

/// A custom listener that computes audio statistics in real-time.
struct StatsListener {
    frames: AtomicU64,
    samples: AtomicU64,
    /// Largest absolute sample seen, as `f32` bits.
    peak_bits: AtomicU32,
}

impl StatsListener {
    fn new() -> Self {
        Self {
            frames: AtomicU64::new(0),
            samples: AtomicU64::new(0),
            peak_bits: AtomicU32::new(0),
        }
    }

    fn peak(&self) -> f32 {
        f32::from_bits(self.peak_bits.load(Ordering::Relaxed))
    }
}

#[async_trait]
impl Listener<AudioFrame> for StatsListener {
    fn name(&self) -> &str {
        "stats"
    }

    async fn on_start(&self) -> Result<(), ListenerError> {
        println!("[stats] Starting...");
        Ok(())
    }

    fn consume(&self, frame: &AudioFrame) -> Result<(), ListenerError> {
        self.frames.fetch_add(1, Ordering::Relaxed);
        self.samples.fetch_add(
            (frame.samples_per_channel * frame.read.len()) as u64,
            Ordering::Relaxed,
        );

        let peak = frame
            .read
            .iter()
            .flat_map(|plane| plane.as_slice())
            .fold(0.0f32, |m, s| m.max(s.abs()));

        // Only this task writes the peak, so load/store is enough
        if peak > self.peak() {
            self.peak_bits.store(peak.to_bits(), Ordering::Relaxed);
        }
        Ok(())
    }

    async fn on_stop(&self) -> Result<(), ListenerError> {
        println!("[stats] Stopping. Final stats:");
        println!("  Frames: {}", self.frames.load(Ordering::Relaxed));
        println!("  Samples: {}", self.samples.load(Ordering::Relaxed));
        println!("  Peak: {:.3}", self.peak());
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let hub = Arc::new(
        BroadcastHub::<AudioFrame>::builder()
            .name("insert-1")
            .capacity(32)
            .on_event(|e| match e {
                HubEvent::ListenerOverrun {
                    listener, skipped, ..
                } => println!("[event] {listener} fell behind, lost {skipped} frames"),
                HubEvent::ListenerError {
                    listener, error, ..
                } => println!("[event] {listener}: {error}"),
                other => tracing::debug!(?other, "hub event"),
            })
            .build(),
    );

    // Peak meter: closure listener
    let meter = listener_fn("meter", |frame: &AudioFrame| {
        if frame.timestamp.subsec_millis() == 0 {
            let peak = frame
                .channel(0)
                .map_or(0.0, |s| s.iter().fold(0.0f32, |m, v| m.max(v.abs())));
            println!("[meter] t={:>2}s peak={peak:.3}", frame.timestamp.as_secs());
        }
        Ok(())
    });

    let stats = Arc::new(StatsListener::new());

    // Encoder: frames leave the ring through a channel and are processed async
    let (tx, mut rx) = mpsc::channel::<AudioFrame>(64);
    let encoder = tokio::spawn(async move {
        let mut encoded = 0u64;
        while let Some(frame) = rx.recv().await {
            // Pretend encoding takes a while
            tokio::time::sleep(Duration::from_millis(2)).await;
            encoded += frame.samples_per_channel as u64;
        }
        encoded
    });

    let subs = vec![
        hub.add_listener(Arc::new(meter))?,
        hub.add_listener(stats.clone())?,
        hub.add_listener(Arc::new(ChannelListener::with_name("encoder", tx)))?,
    ];

    // Host callback: 10ms frames for 3 seconds, audio passed back untouched
    let producer = {
        let hub = hub.clone();
        std::thread::spawn(move || {
            let mut source = MockSource::stereo_insert().waveform(Waveform::Sine(440.0));
            let pass = PassThrough::insert(2);
            while source.frames_generated() < 300 {
                let mut frame = source.next_frame();
                hub.write(&mut frame, merge::with_pass_through(pass));
                std::thread::sleep(Duration::from_millis(10));
            }
        })
    };

    println!("Broadcasting for 3 seconds...");
    tokio::task::spawn_blocking(move || producer.join())
        .await?
        .map_err(|_| "producer thread panicked")?;

    // Let listeners catch up before tearing down
    tokio::time::sleep(Duration::from_millis(100)).await;
    println!("Hub stats: {:?}", hub.stats());

    hub.disconnect();
    for sub in subs {
        let name = sub.name().to_string();
        let stats = sub.stats();
        let reason = sub.join().await?;
        println!("[{name}] {reason}: {} consumed, {} overruns", stats.consumed, stats.overruns);
    }

    let released = hub.clear(merge::release_frame);
    println!("Released {released} slots");

    let encoded = encoder.await?;
    println!("Encoder processed {encoded} samples per channel");

    println!("\nDone!");

    Ok(())
}
