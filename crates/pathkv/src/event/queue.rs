//! Lock-free single-producer/single-consumer event ring for out-of-process
//! consumers (spec §4.7).
//!
//! `head`/`tail` only ever increase; the slot index is `cursor & mask`. The
//! producer publishes a written slot by releasing `tail`; the consumer
//! acquires `tail` before reading a slot and releases `head` after freeing
//! it — the acquire/release pairing spec §5 requires of the shared ring.
//! Drop-oldest overflow forces the producer to advance `head` itself via
//! CAS, racing a concurrent consumer pop; losing that race just means the
//! consumer already claimed the slot we were about to drop, so the producer
//! retries against the now-current `head`.

use std::{
    cell::UnsafeCell,
    mem::MaybeUninit,
    sync::atomic::{AtomicU64, Ordering},
};

use crossbeam_utils::CachePadded;

/// Which kind of change a [`QueuedEvent`] records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueuedEventKind {
    /// A `set`/`update` produced a new value.
    Changed,
    /// A `delete` removed a value.
    Deleted,
}

/// A flat, self-contained event record (spec §4.7): no borrowed data, so it
/// crosses the producer/consumer boundary without locking.
#[derive(Debug, Clone, PartialEq)]
pub struct QueuedEvent {
    /// Which kind of change this is.
    pub kind: QueuedEventKind,
    /// The normalized path that changed.
    pub path: String,
    /// The binary-codec bytes of the relevant value (new value for
    /// `Changed`, prior value for `Deleted`), or `None` for a compound value
    /// the codec cannot represent as a single leaf, or if no value was
    /// retained.
    pub value: Option<Vec<u8>>,
    /// Strictly monotonic, assigned in commit order.
    pub sequence: u64,
    /// Wall-clock milliseconds since the Unix epoch at enqueue time.
    pub timestamp_millis: u64,
}

/// What happens when the producer would overwrite an unread slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverflowPolicy {
    /// Drop the oldest unread event and record a drop count (spec default:
    /// blocking commits on a slow consumer is unacceptable).
    #[default]
    DropOldest,
    /// Block the producer until the consumer frees a slot.
    Block,
}

/// Construction-time configuration for an [`EventQueue`].
#[derive(Debug, Clone, Copy)]
pub struct EventQueueConfig {
    /// Ring capacity; rounded up to the next power of two.
    pub capacity: usize,
    /// Behavior when the ring is full at push time.
    pub overflow_policy: OverflowPolicy,
}

impl Default for EventQueueConfig {
    fn default() -> Self {
        Self { capacity: 1024, overflow_policy: OverflowPolicy::DropOldest }
    }
}

struct Slot {
    event: UnsafeCell<MaybeUninit<QueuedEvent>>,
}

// Slot's UnsafeCell access is synchronized by EventQueue's head/tail
// protocol, not by any lock on Slot itself.
unsafe impl Sync for Slot {}

/// A fixed-capacity, power-of-two SPSC ring buffer of [`QueuedEvent`]s.
pub struct EventQueue {
    slots: Box<[Slot]>,
    mask: usize,
    head: CachePadded<AtomicU64>,
    tail: CachePadded<AtomicU64>,
    overflow_policy: OverflowPolicy,
    dropped: CachePadded<AtomicU64>,
    sequence: CachePadded<AtomicU64>,
}

impl EventQueue {
    /// Build a ring with `config.capacity` rounded up to a power of two.
    #[must_use]
    pub fn new(config: EventQueueConfig) -> Self {
        let capacity = config.capacity.next_power_of_two().max(1);
        let slots = (0..capacity).map(|_| Slot { event: UnsafeCell::new(MaybeUninit::uninit()) }).collect();
        Self {
            slots,
            mask: capacity - 1,
            head: CachePadded::new(AtomicU64::new(0)),
            tail: CachePadded::new(AtomicU64::new(0)),
            overflow_policy: config.overflow_policy,
            dropped: CachePadded::new(AtomicU64::new(0)),
            sequence: CachePadded::new(AtomicU64::new(0)),
        }
    }

    /// Assign the next strictly monotonic sequence number. Safe to call from
    /// only one producer thread at a time (the engine serializes writes).
    pub fn next_sequence(&self) -> u64 {
        self.sequence.fetch_add(1, Ordering::Relaxed)
    }

    /// Publish one event, applying the configured overflow policy if the
    /// ring is already full.
    pub fn push(&self, event: QueuedEvent) {
        loop {
            let tail = self.tail.load(Ordering::Relaxed);
            let head = self.head.load(Ordering::Acquire);
            let full = tail.wrapping_sub(head) as usize >= self.slots.len();
            if full {
                match self.overflow_policy {
                    OverflowPolicy::DropOldest => {
                        if self
                            .head
                            .compare_exchange(head, head.wrapping_add(1), Ordering::AcqRel, Ordering::Relaxed)
                            .is_ok()
                        {
                            let idx = (head as usize) & self.mask;
                            unsafe {
                                (*self.slots[idx].event.get()).assume_init_drop();
                            }
                            self.dropped.fetch_add(1, Ordering::Relaxed);
                        }
                        continue;
                    }
                    OverflowPolicy::Block => {
                        std::hint::spin_loop();
                        continue;
                    }
                }
            }
            let idx = (tail as usize) & self.mask;
            unsafe {
                (*self.slots[idx].event.get()).write(event);
            }
            self.tail.store(tail.wrapping_add(1), Ordering::Release);
            return;
        }
    }

    fn pop_one(&self) -> Option<QueuedEvent> {
        loop {
            let head = self.head.load(Ordering::Relaxed);
            let tail = self.tail.load(Ordering::Acquire);
            if head == tail {
                return None;
            }
            if self
                .head
                .compare_exchange(head, head.wrapping_add(1), Ordering::AcqRel, Ordering::Relaxed)
                .is_ok()
            {
                let idx = (head as usize) & self.mask;
                let event = unsafe { (*self.slots[idx].event.get()).assume_init_read() };
                return Some(event);
            }
            // A concurrent drop-oldest push already claimed this slot;
            // retry against the now-current head.
        }
    }

    /// Pop up to `max_count` events in commit order (the C-ABI's
    /// `event_queue_pop_batch`).
    #[must_use]
    pub fn pop_batch(&self, max_count: usize) -> Vec<QueuedEvent> {
        let mut out = Vec::with_capacity(max_count.min(self.slots.len()));
        while out.len() < max_count {
            match self.pop_one() {
                Some(event) => out.push(event),
                None => break,
            }
        }
        out
    }

    /// Number of events currently queued and unread.
    #[must_use]
    pub fn pending(&self) -> usize {
        let tail = self.tail.load(Ordering::Acquire);
        let head = self.head.load(Ordering::Relaxed);
        tail.wrapping_sub(head) as usize
    }

    /// Events the drop-oldest policy has discarded since the last call.
    pub fn take_dropped(&self) -> u64 {
        self.dropped.swap(0, Ordering::Relaxed)
    }
}

impl Drop for EventQueue {
    fn drop(&mut self) {
        let head = *self.head.get_mut();
        let tail = *self.tail.get_mut();
        let mut cursor = head;
        while cursor != tail {
            let idx = (cursor as usize) & self.mask;
            unsafe {
                (*self.slots[idx].event.get()).assume_init_drop();
            }
            cursor = cursor.wrapping_add(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(sequence: u64, path: &str) -> QueuedEvent {
        QueuedEvent {
            kind: QueuedEventKind::Changed,
            path: path.to_string(),
            value: None,
            sequence,
            timestamp_millis: 0,
        }
    }

    #[test]
    fn capacity_rounds_up_to_power_of_two() {
        let q = EventQueue::new(EventQueueConfig { capacity: 5, overflow_policy: OverflowPolicy::DropOldest });
        assert_eq!(q.slots.len(), 8);
    }

    #[test]
    fn push_then_pop_preserves_order() {
        let q = EventQueue::new(EventQueueConfig { capacity: 4, overflow_policy: OverflowPolicy::DropOldest });
        q.push(event(0, "/a"));
        q.push(event(1, "/b"));
        let batch = q.pop_batch(10);
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0].path, "/a");
        assert_eq!(batch[1].path, "/b");
    }

    #[test]
    fn pending_reflects_unread_count() {
        let q = EventQueue::new(EventQueueConfig { capacity: 4, overflow_policy: OverflowPolicy::DropOldest });
        q.push(event(0, "/a"));
        q.push(event(1, "/b"));
        assert_eq!(q.pending(), 2);
        q.pop_batch(1);
        assert_eq!(q.pending(), 1);
    }

    #[test]
    fn drop_oldest_overflow_records_drop_count() {
        let q = EventQueue::new(EventQueueConfig { capacity: 2, overflow_policy: OverflowPolicy::DropOldest });
        q.push(event(0, "/a"));
        q.push(event(1, "/b"));
        q.push(event(2, "/c"));
        assert_eq!(q.take_dropped(), 1);
        let batch = q.pop_batch(10);
        assert_eq!(batch.iter().map(|e| e.sequence).collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn pop_batch_respects_max_count() {
        let q = EventQueue::new(EventQueueConfig { capacity: 8, overflow_policy: OverflowPolicy::DropOldest });
        for i in 0..5 {
            q.push(event(i, "/a"));
        }
        assert_eq!(q.pop_batch(3).len(), 3);
        assert_eq!(q.pending(), 2);
    }
}
