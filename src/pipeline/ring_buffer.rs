//! Fixed-capacity slot ring shared by one producer and many readers.
//!
//! The ring never allocates after construction: every slot is created up
//! front with `T::default()` and only ever overwritten in place by a merge
//! callback. Positions are tracked as a monotonic 64-bit sequence; the slot a
//! sequence lives in is `sequence % capacity`.
//!
//! Each slot sits behind its own `RwLock`. The producer holds the write lock
//! only while merging into the slot it is about to publish, so it contends
//! with a reader only when that reader is a full lap behind and still holds
//! the very slot being overwritten.

use std::fmt;
use std::ops::Deref;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{RwLock, RwLockReadGuard};

use crate::config::normalize_capacity;

/// Contents of one ring position.
#[derive(Debug, Default)]
struct SlotState<T> {
    value: T,
    used: bool,
    /// Sequence of the write that last filled this slot.
    sequence: u64,
}

/// Read-only view of a slot, held for as long as the reader needs it.
pub struct SlotRef<'a, T> {
    guard: RwLockReadGuard<'a, SlotState<T>>,
}

impl<T> SlotRef<'_, T> {
    /// Sequence of the write that filled this slot, or `None` if the slot has
    /// not been written since construction or the last `clear`.
    pub fn sequence(&self) -> Option<u64> {
        self.guard.used.then_some(self.guard.sequence)
    }

    /// Returns `true` if the slot holds a written value.
    pub fn is_used(&self) -> bool {
        self.guard.used
    }
}

impl<T> Deref for SlotRef<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.guard.value
    }
}

/// Fixed-capacity circular array of slots with a single write cursor.
///
/// `RingBuffer` owns cursor arithmetic and slot storage only; waking readers
/// is the job of [`BroadcastHub`](crate::BroadcastHub).
pub struct RingBuffer<T> {
    slots: Box<[RwLock<SlotState<T>>]>,
    write_seq: AtomicU64,
}

impl<T: Default> RingBuffer<T> {
    /// Creates a ring with `capacity` default-initialized slots.
    ///
    /// A capacity of 0 is replaced by [`DEFAULT_CAPACITY`](crate::DEFAULT_CAPACITY).
    pub fn new(capacity: usize) -> Self {
        let capacity = normalize_capacity(capacity);
        let slots = (0..capacity)
            .map(|_| RwLock::new(SlotState::default()))
            .collect();

        Self {
            slots,
            write_seq: AtomicU64::new(0),
        }
    }
}

impl<T> RingBuffer<T> {
    /// Number of slots.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of completed writes since construction.
    ///
    /// Acquire ordering: every slot with a lower sequence is fully merged
    /// once this value is observed.
    pub fn write_sequence(&self) -> u64 {
        self.write_seq.load(Ordering::Acquire)
    }

    /// Slot index the next write lands in.
    pub fn writable_index(&self) -> usize {
        self.index_of(self.write_sequence())
    }

    /// Slot index following the next write, i.e. the oldest slot once the
    /// ring has wrapped.
    pub fn readable_index(&self) -> usize {
        (self.writable_index() + 1) % self.capacity()
    }

    /// Maps a sequence (or any cursor value) to its slot index.
    pub fn index_of(&self, sequence: u64) -> usize {
        (sequence % self.capacity() as u64) as usize
    }

    /// Merges `data` into the next slot and advances the write cursor.
    ///
    /// `merge` is called exactly once with `(data, slot_value, was_used)`. It
    /// must fully populate `slot_value` when `was_used` is `false`, and may
    /// modify `data` in place (pass-through back to the producer's buffer).
    /// The cursor only advances after `merge` returns and the slot is marked
    /// used.
    ///
    /// Returns the sequence assigned to this write.
    ///
    /// # Single-Producer Guarantee
    /// This method assumes one caller at a time. [`BroadcastHub::write`]
    /// serializes callers; use that unless the ring is private to one thread.
    ///
    /// [`BroadcastHub::write`]: crate::BroadcastHub::write
    pub fn write<F>(&self, data: &mut T, merge: F) -> u64
    where
        F: FnOnce(&mut T, &mut T, bool),
    {
        // Relaxed: only the producer stores this counter
        let seq = self.write_seq.load(Ordering::Relaxed);
        let idx = self.index_of(seq);

        {
            let mut slot = self.slots[idx].write();
            let was_used = slot.used;
            merge(data, &mut slot.value, was_used);
            slot.used = true;
            slot.sequence = seq;
        }

        self.write_seq.store(seq + 1, Ordering::Release);
        seq
    }

    /// Returns a read-only view of the slot at `cursor % capacity`.
    ///
    /// The view blocks the producer from overwriting that one slot while it
    /// is held; drop it before doing anything slow.
    pub fn read(&self, cursor: u64) -> SlotRef<'_, T> {
        SlotRef {
            guard: self.slots[self.index_of(cursor)].read(),
        }
    }

    /// Hands every used slot to `release` and marks all slots unused.
    ///
    /// Returns the number of slots released.
    pub fn clear<F>(&self, mut release: F) -> usize
    where
        F: FnMut(&mut T),
    {
        let mut released = 0;
        for slot in &*self.slots {
            let mut slot = slot.write();
            if slot.used {
                release(&mut slot.value);
                released += 1;
            }
            slot.used = false;
        }
        released
    }

    /// Number of slots currently holding a written value.
    pub fn used_slots(&self) -> usize {
        self.slots.iter().filter(|slot| slot.read().used).count()
    }
}

impl<T> fmt::Debug for RingBuffer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RingBuffer")
            .field("capacity", &self.capacity())
            .field("write_sequence", &self.write_sequence())
            .finish_non_exhaustive()
    }
}

/// Moves a reader that has been lapped to the oldest retained write.
///
/// `head` is the sequence one past the newest completed write. If the reader
/// is more than `capacity` writes behind, the frames in between have been
/// overwritten; the cursor jumps to `head - capacity` and the number of lost
/// writes is returned.
///
/// ```text
/// capacity = 4, head = 10, read_seq = 3
///
/// behind  = 10 - 3 = 7 > 4  -> overrun
/// skipped = 7 - 4  = 3      (sequences 3, 4, 5)
/// read_seq = 10 - 4 = 6
/// ```
pub(crate) fn apply_overrun_policy(head: u64, read_seq: &mut u64, capacity: u64) -> u64 {
    let behind = head.saturating_sub(*read_seq);
    if behind > capacity {
        *read_seq = head - capacity;
        behind - capacity
    } else {
        0
    }
}
