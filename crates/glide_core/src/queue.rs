//! Bounded SPSC Queue
//!
//! Fixed-capacity ring buffer moving one typed value at a time between exactly
//! one producer thread and one consumer thread, without locks. All operations
//! are wait-free and allocation-free once the queue is built.
//!
//! # Discipline
//!
//! Only one thread may call [`Queue::push`] and only one thread may call the
//! consuming operations ([`pull`](Queue::pull), [`exchange`](Queue::exchange),
//! [`pop`](Queue::pop)) for the lifetime of the queue. Breaking that contract
//! is a protocol violation the queue does not detect. Resizing and resetting
//! take `&mut self`, so they can only happen while nobody else holds the queue.
//!
//! One slot always stays empty to tell "full" from "empty", so a queue built
//! with `capacity` slots holds at most `capacity - 1` elements.

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Single-producer/single-consumer ring buffer
pub struct Queue<T> {
    slots: Box<[UnsafeCell<T>]>,
    /// Next slot the consumer reads, owned by the consumer
    read: AtomicUsize,
    /// Next slot the producer writes, owned by the producer
    write: AtomicUsize,
}

// Safety: a slot is only ever touched by one side at a time. The producer
// writes slot `write` only while it is outside the readable range, and
// publishes it with a Release store of `write`; the consumer only touches
// slot `read` after an Acquire load shows it inside the readable range, and
// hands it back with a Release store of `read`.
unsafe impl<T: Send> Send for Queue<T> {}
unsafe impl<T: Send> Sync for Queue<T> {}

impl<T: Default> Queue<T> {
    /// Create a queue with `capacity` slots (holds `capacity - 1` elements)
    ///
    /// Allocates; call during setup, never from the audio thread.
    ///
    /// # Panics
    /// Panics if `capacity < 2`.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity >= 2, "Queue needs at least 2 slots, got {}", capacity);
        Self {
            slots: (0..capacity).map(|_| UnsafeCell::new(T::default())).collect(),
            read: AtomicUsize::new(0),
            write: AtomicUsize::new(0),
        }
    }

    /// Rebuild with a new capacity, discarding queued elements
    pub fn resize(&mut self, capacity: usize) {
        *self = Self::new(capacity);
    }

    /// Take the next element, leaving a default value in its slot
    pub fn pop(&self) -> Option<T> {
        let read = self.read.load(Ordering::Relaxed);
        if read == self.write.load(Ordering::Acquire) {
            return None;
        }
        // Safety: `read != write`, so the producer will not touch this slot
        // until we advance `read`.
        let value = unsafe { std::mem::take(&mut *self.slots[read].get()) };
        self.read.store(self.next(read), Ordering::Release);
        Some(value)
    }
}

impl<T> Queue<T> {
    /// Number of slots (one more than the number of storable elements)
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    fn next(&self, index: usize) -> usize {
        let next = index + 1;
        if next == self.slots.len() {
            0
        } else {
            next
        }
    }

    /// Elements currently readable by the consumer
    pub fn available_for_read(&self) -> usize {
        let write = self.write.load(Ordering::Acquire);
        let read = self.read.load(Ordering::Acquire);
        if write >= read {
            write - read
        } else {
            self.slots.len() - read + write
        }
    }

    /// Free places the producer can still push into
    pub fn available_space(&self) -> usize {
        self.slots.len() - 1 - self.available_for_read()
    }

    pub fn is_empty(&self) -> bool {
        self.available_for_read() == 0
    }

    /// Append a value; hands it back if the queue is full
    ///
    /// The value previously stored in the slot is dropped here, on the
    /// producer's thread.
    pub fn push(&self, value: T) -> Result<(), T> {
        let write = self.write.load(Ordering::Relaxed);
        let next = self.next(write);
        if next == self.read.load(Ordering::Acquire) {
            return Err(value);
        }
        // Safety: `write` is outside the readable range, so the consumer is
        // not touching this slot.
        unsafe {
            *self.slots[write].get() = value;
        }
        self.write.store(next, Ordering::Release);
        Ok(())
    }

    /// Swap the oldest element with `out`
    ///
    /// The previous contents of `out` stay behind in the slot until the
    /// producer overwrites it. Nothing is copied or dropped on the consumer
    /// side. Returns false if the queue is empty.
    pub fn exchange(&self, out: &mut T) -> bool {
        let read = self.read.load(Ordering::Relaxed);
        if read == self.write.load(Ordering::Acquire) {
            return false;
        }
        // Safety: see `pop`.
        unsafe {
            std::mem::swap(&mut *self.slots[read].get(), out);
        }
        self.read.store(self.next(read), Ordering::Release);
        true
    }

    /// Discard queued elements without touching slot contents
    pub fn reset(&mut self) {
        *self.read.get_mut() = 0;
        *self.write.get_mut() = 0;
    }
}

impl<T: Clone> Queue<T> {
    /// Copy the oldest element into `out` and consume it
    ///
    /// Returns false if the queue is empty.
    pub fn pull(&self, out: &mut T) -> bool {
        let read = self.read.load(Ordering::Relaxed);
        if read == self.write.load(Ordering::Acquire) {
            return false;
        }
        // Safety: see `pop`.
        unsafe {
            out.clone_from(&*self.slots[read].get());
        }
        self.read.store(self.next(read), Ordering::Release);
        true
    }
}

impl<T> std::fmt::Debug for Queue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Queue")
            .field("capacity", &self.capacity())
            .field("available_for_read", &self.available_for_read())
            .finish()
    }
}
