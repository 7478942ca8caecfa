//! Integration tests for audio-broadcast.
//!
//! Most tests run on the default current-thread runtime: the producer's
//! writes happen without yielding, so a listener task only runs when the
//! test awaits. That makes "frames queued but not yet drained" reproducible.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use audio_broadcast::merge::{self, PassThrough};
use audio_broadcast::source::{MockSource, Waveform};
use audio_broadcast::{
    listener_fn, AudioFrame, BroadcastError, BroadcastHub, ChannelListener, ConsumerState,
    HubEvent, Listener, ListenerError, StopReason,
};
use parking_lot::Mutex;
use tokio::sync::mpsc;

fn store(incoming: &mut u32, slot: &mut u32, _used: bool) {
    *slot = *incoming;
}

fn channel_listener(name: &str) -> (Arc<ChannelListener<u32>>, mpsc::Receiver<u32>) {
    let (tx, rx) = mpsc::channel(64);
    (Arc::new(ChannelListener::with_name(name, tx)), rx)
}

async fn recv_n(rx: &mut mpsc::Receiver<u32>, n: usize) -> Vec<u32> {
    let mut out = Vec::with_capacity(n);
    for _ in 0..n {
        let v = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("timed out waiting for frame")
            .expect("channel closed");
        out.push(v);
    }
    out
}

/// Lets every ready task on the current-thread runtime run.
async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}

fn collect_events() -> (Arc<Mutex<Vec<HubEvent>>>, impl Fn(HubEvent) + Send + Sync + 'static) {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    (events, move |e| sink.lock().push(e))
}

/// A listener that records values and lifecycle calls.
#[derive(Default)]
struct RecordingListener {
    seen: Mutex<Vec<u32>>,
    started: AtomicBool,
    stopped: AtomicBool,
    fail_start: bool,
}

#[async_trait]
impl Listener<u32> for RecordingListener {
    fn name(&self) -> &str {
        "recording"
    }

    async fn on_start(&self) -> Result<(), ListenerError> {
        self.started.store(true, Ordering::SeqCst);
        if self.fail_start {
            return Err(ListenerError::custom("device busy"));
        }
        Ok(())
    }

    fn consume(&self, item: &u32) -> Result<(), ListenerError> {
        self.seen.lock().push(*item);
        Ok(())
    }

    async fn on_stop(&self) -> Result<(), ListenerError> {
        self.stopped.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[tokio::test]
async fn test_each_write_drained_in_order() {
    let hub = BroadcastHub::<u32>::new(4);
    let (listener, mut rx) = channel_listener("ordered");
    let sub = hub.add_listener(listener).unwrap();

    let mut seen = Vec::new();
    for mut v in 1..=5u32 {
        hub.write(&mut v, store);
        seen.extend(recv_n(&mut rx, 1).await);
    }

    assert_eq!(seen, vec![1, 2, 3, 4, 5]);
    assert_eq!(sub.stats().consumed, 5);
    assert_eq!(sub.stats().overruns, 0);
    sub.stop().await.unwrap();
}

#[tokio::test]
async fn test_late_listener_sees_only_later_writes() {
    let hub = BroadcastHub::<u32>::new(4);
    let (a, mut rx_a) = channel_listener("a");
    let sub_a = hub.add_listener(a).unwrap();

    for mut v in 1..=2u32 {
        hub.write(&mut v, store);
    }
    assert_eq!(recv_n(&mut rx_a, 2).await, vec![1, 2]);

    let (b, mut rx_b) = channel_listener("b");
    let sub_b = hub.add_listener(b).unwrap();

    for mut v in 3..=5u32 {
        hub.write(&mut v, store);
    }

    assert_eq!(recv_n(&mut rx_a, 3).await, vec![3, 4, 5]);
    assert_eq!(recv_n(&mut rx_b, 3).await, vec![3, 4, 5]);
    settle().await;
    assert!(rx_b.try_recv().is_err());

    sub_a.stop().await.unwrap();
    sub_b.stop().await.unwrap();
}

#[tokio::test]
async fn test_full_ring_backlog_delivered_without_loss() {
    let hub = BroadcastHub::<u32>::new(4);
    let (listener, mut rx) = channel_listener("backlog");
    let sub = hub.add_listener(listener).unwrap();

    // No await between writes: the task has not run yet
    for mut v in 1..=4u32 {
        hub.write(&mut v, store);
    }

    assert_eq!(recv_n(&mut rx, 4).await, vec![1, 2, 3, 4]);
    assert_eq!(sub.stats().overruns, 0);
    sub.stop().await.unwrap();
}

#[tokio::test]
async fn test_lapped_listener_keeps_most_recent() {
    let (events, on_event) = collect_events();
    let hub = BroadcastHub::<u32>::builder()
        .name("lapped")
        .capacity(4)
        .on_event(on_event)
        .build();
    let (listener, mut rx) = channel_listener("slow");
    let sub = hub.add_listener(listener).unwrap();

    for mut v in 1..=7u32 {
        hub.write(&mut v, store);
    }

    assert_eq!(recv_n(&mut rx, 4).await, vec![4, 5, 6, 7]);
    settle().await;
    assert!(rx.try_recv().is_err());

    assert_eq!(sub.stats().overruns, 3);
    assert_eq!(hub.stats().overruns, 3);
    let skipped: Vec<u64> = events
        .lock()
        .iter()
        .filter_map(|e| match e {
            HubEvent::ListenerOverrun { skipped, .. } => Some(*skipped),
            _ => None,
        })
        .collect();
    assert_eq!(skipped, vec![3]);

    sub.stop().await.unwrap();
}

#[tokio::test]
async fn test_stop_drops_queued_frames() {
    let hub = BroadcastHub::<u32>::new(8);
    let (listener, mut rx) = channel_listener("stopped");
    let stop = tokio_util::sync::CancellationToken::new();
    let sub = hub.add_listener_with_stop(listener, stop.clone()).unwrap();

    for mut v in 1..=3u32 {
        hub.write(&mut v, store);
    }
    stop.cancel();
    settle().await;

    assert_eq!(sub.state(), ConsumerState::Terminated);
    assert!(!sub.is_running());
    assert!(sub.stats().consumed < 3);

    for mut v in 4..=6u32 {
        hub.write(&mut v, store);
    }
    settle().await;

    let mut received = 0;
    while rx.try_recv().is_ok() {
        received += 1;
    }
    assert!(received < 3);
    assert_eq!(sub.join().await.unwrap(), StopReason::Stopped);
}

#[tokio::test]
async fn test_stop_after_drain_drops_backlog() {
    let hub = BroadcastHub::<u32>::new(8);
    let (listener, mut rx) = channel_listener("stopped-late");
    let stop = tokio_util::sync::CancellationToken::new();
    let sub = hub.add_listener_with_stop(listener, stop.clone()).unwrap();

    hub.write(&mut 1, store);
    settle().await;
    assert_eq!(sub.stats().consumed, 1);
    assert_eq!(rx.try_recv().ok(), Some(1));

    for mut v in 2..=4u32 {
        hub.write(&mut v, store);
    }
    stop.cancel();
    settle().await;

    assert_eq!(sub.state(), ConsumerState::Terminated);
    assert_eq!(sub.stats().consumed, 1);
    assert!(rx.try_recv().is_err());

    hub.write(&mut 5, store);
    settle().await;
    assert!(rx.try_recv().is_err());
    assert_eq!(sub.join().await.unwrap(), StopReason::Stopped);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_slow_listener_does_not_block_producer() {
    let hub = Arc::new(BroadcastHub::<u32>::new(2));
    let slow = listener_fn("slow", |v: &u32| {
        if *v == 1 {
            std::thread::sleep(Duration::from_millis(300));
        }
        Ok(())
    });
    let sub = hub.add_listener(Arc::new(slow)).unwrap();

    hub.write(&mut 1, store);
    // Listener is now inside consume(1)
    tokio::time::sleep(Duration::from_millis(50)).await;
    hub.write(&mut 2, store);

    // Lands on the slot that held 1
    let started = std::time::Instant::now();
    hub.write(&mut 3, store);
    assert!(
        started.elapsed() < Duration::from_millis(150),
        "write waited {:?} for a listener",
        started.elapsed()
    );

    hub.disconnect();
    assert_eq!(sub.join().await.unwrap(), StopReason::HubDisconnected);
}

#[tokio::test]
async fn test_disconnect_stops_every_listener_once() {
    let (events, on_event) = collect_events();
    let hub = BroadcastHub::<u32>::builder().on_event(on_event).build();

    let (a, _rx_a) = channel_listener("a");
    let (b, _rx_b) = channel_listener("b");
    let subs = vec![hub.add_listener(a).unwrap(), hub.add_listener(b).unwrap()];
    assert!(hub.is_active());

    hub.disconnect();
    hub.disconnect();
    assert!(!hub.is_active());

    let reasons = futures::future::join_all(subs.into_iter().map(|s| s.join())).await;
    for reason in reasons {
        assert_eq!(reason.unwrap(), StopReason::HubDisconnected);
    }

    let disconnects = events
        .lock()
        .iter()
        .filter(|e| matches!(e, HubEvent::Disconnected { .. }))
        .count();
    assert_eq!(disconnects, 1);
    assert_eq!(hub.stats().active_listeners, 0);
}

#[tokio::test]
async fn test_listener_lifecycle_hooks() {
    let hub = BroadcastHub::<u32>::new(4);
    let listener = Arc::new(RecordingListener::default());
    let sub = hub.add_listener(listener.clone()).unwrap();

    hub.write(&mut 10, store);
    settle().await;

    assert!(listener.started.load(Ordering::SeqCst));
    assert_eq!(*listener.seen.lock(), vec![10]);

    assert_eq!(sub.stop().await.unwrap(), StopReason::Stopped);
    assert!(listener.stopped.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_failed_start_terminates_task() {
    let hub = BroadcastHub::<u32>::new(4);
    let listener = Arc::new(RecordingListener {
        fail_start: true,
        ..Default::default()
    });
    let sub = hub.add_listener(listener.clone()).unwrap();

    let reason = sub.join().await.unwrap();

    assert_eq!(
        reason,
        StopReason::StartFailed(ListenerError::custom("device busy"))
    );
    assert!(listener.stopped.load(Ordering::SeqCst));
    assert_eq!(hub.stats().active_listeners, 0);
}

#[tokio::test]
async fn test_consume_errors_reported_and_draining_continues() {
    let (events, on_event) = collect_events();
    let hub = BroadcastHub::<u32>::builder().on_event(on_event).build();

    let accepted = Arc::new(AtomicUsize::new(0));
    let counter = accepted.clone();
    let listener = listener_fn("odd-only", move |v: &u32| {
        if v % 2 == 0 {
            return Err(ListenerError::consume_failed(format!("even value {v}")));
        }
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });
    let sub = hub.add_listener(Arc::new(listener)).unwrap();

    for mut v in 1..=6u32 {
        hub.write(&mut v, store);
    }
    settle().await;

    assert_eq!(accepted.load(Ordering::SeqCst), 3);
    let stats = sub.stats();
    assert_eq!(stats.consumed, 6);
    assert_eq!(stats.errors, 3);
    let errors = events
        .lock()
        .iter()
        .filter(|e| matches!(e, HubEvent::ListenerError { .. }))
        .count();
    assert_eq!(errors, 3);

    sub.stop().await.unwrap();
}

#[tokio::test]
async fn test_panicking_listener_reported_on_join() {
    let hub = BroadcastHub::<u32>::new(4);
    let listener = listener_fn("explodes", |_: &u32| -> Result<(), ListenerError> {
        panic!("listener bug")
    });
    let sub = hub.add_listener(Arc::new(listener)).unwrap();

    hub.write(&mut 1, store);

    let result = sub.join().await;
    assert!(matches!(
        result,
        Err(BroadcastError::TaskPanicked { listener }) if listener == "explodes"
    ));
    assert_eq!(hub.stats().active_listeners, 0);
}

#[tokio::test]
async fn test_audio_frames_with_pass_through() {
    let hub = BroadcastHub::<AudioFrame>::builder()
        .name("main")
        .capacity(4)
        .build();
    let (tx, mut rx) = mpsc::channel::<AudioFrame>(8);
    let sub = hub.add_listener(Arc::new(ChannelListener::new(tx))).unwrap();

    // Two strip channels followed by two bus channels
    let mut source = MockSource::new(48000, 4, 480)
        .outputs(2)
        .waveform(Waveform::Sine(440.0));
    let mut frame = source.next_frame();
    for (i, plane) in frame.read.iter_mut().enumerate() {
        plane.as_mut_slice().fill(i as f32);
    }

    hub.write(&mut frame, merge::with_pass_through(PassThrough::main(2, 2)));

    // Host planes carry the bus channels back
    assert!(frame.write[0].as_slice().iter().all(|&s| s == 2.0));
    assert!(frame.write[1].as_slice().iter().all(|&s| s == 3.0));

    let stored = tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.read, frame.read);
    assert!(stored.write.is_empty());
    assert_eq!(stored.inputs, 4);
    assert_eq!(stored.outputs, 2);
    assert_eq!(stored.timestamp, frame.timestamp);

    sub.stop().await.unwrap();
}

#[tokio::test]
async fn test_clear_after_teardown_releases_frames() {
    let hub = BroadcastHub::<AudioFrame>::new(4);
    let (tx, _rx) = mpsc::channel::<AudioFrame>(8);
    let sub = hub.add_listener(Arc::new(ChannelListener::new(tx))).unwrap();

    let mut source = MockSource::stereo_insert();
    for _ in 0..6 {
        let mut frame = source.next_frame();
        hub.write(&mut frame, merge::store);
    }

    hub.disconnect();
    assert_eq!(sub.join().await.unwrap(), StopReason::HubDisconnected);

    assert_eq!(hub.clear(merge::release_frame), 4);
    assert_eq!(hub.clear(merge::release_frame), 0);

    // The ring is still usable and starts from unused slots
    let mut used_flags = Vec::new();
    let mut frame = source.next_frame();
    hub.write(&mut frame, |incoming, slot, used| {
        used_flags.push(used);
        merge::store(incoming, slot, used);
    });
    assert_eq!(used_flags, vec![false]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_producer_thread_with_concurrent_listeners() {
    const FRAMES: u32 = 2000;

    let hub = Arc::new(BroadcastHub::<u32>::new(64));

    let mut recorders = Vec::new();
    let mut subs = Vec::new();
    for name in ["fast", "slow"] {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let slow = name == "slow";
        let listener = listener_fn(name, move |v: &u32| {
            if slow && v % 100 == 0 {
                std::thread::sleep(Duration::from_millis(1));
            }
            sink.lock().push(*v);
            Ok(())
        });
        subs.push(hub.add_listener(Arc::new(listener)).unwrap());
        recorders.push(seen);
    }

    let producer_hub = hub.clone();
    let producer = std::thread::spawn(move || {
        for mut v in 1..=FRAMES {
            producer_hub.write(&mut v, store);
        }
    });
    producer.join().unwrap();

    for seen in &recorders {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while seen.lock().last() != Some(&FRAMES) {
            assert!(tokio::time::Instant::now() < deadline, "listener never caught up");
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    hub.disconnect();
    for sub in subs {
        assert_eq!(sub.join().await.unwrap(), StopReason::HubDisconnected);
    }

    for seen in &recorders {
        let seen = seen.lock();
        assert!(seen.windows(2).all(|w| w[0] < w[1]), "out-of-order delivery");
    }
}
