//! Running Averager
//!
//! Fixed-window moving average written by the audio thread and read by a
//! meter. The running sum and the average are published together in one
//! `AtomicU64`, so a reader never sees a sum from one update paired with an
//! average from another.

use std::sync::atomic::{AtomicU32, AtomicU64, AtomicUsize, Ordering};

#[inline]
fn pack(sum: f32, average: f32) -> u64 {
    ((sum.to_bits() as u64) << 32) | average.to_bits() as u64
}

#[inline]
fn unpack(state: u64) -> (f32, f32) {
    (f32::from_bits((state >> 32) as u32), f32::from_bits(state as u32))
}

/// Lock-free moving average over the last `window` values
///
/// Single writer: only one thread may call [`add`](Self::add). Any number of
/// threads may read.
#[derive(Debug)]
pub struct Averager {
    /// f32 bits of each sample in the window
    slots: Box<[AtomicU32]>,
    write_index: AtomicUsize,
    /// (sum, average) packed as two f32 bit patterns
    state: AtomicU64,
}

impl Averager {
    /// # Panics
    /// Panics if `window` is zero.
    pub fn new(window: usize) -> Self {
        Self::with_initial(window, 0.0)
    }

    /// Window pre-filled with `value`
    pub fn with_initial(window: usize, value: f32) -> Self {
        assert!(window > 0, "Averager window must be at least 1");
        let sum = value * window as f32;
        Self {
            slots: (0..window).map(|_| AtomicU32::new(value.to_bits())).collect(),
            write_index: AtomicUsize::new(0),
            state: AtomicU64::new(pack(sum, value)),
        }
    }

    /// Replace the oldest value in the window. Wait-free.
    pub fn add(&self, value: f32) {
        let index = self.write_index.load(Ordering::Relaxed);
        let old = f32::from_bits(self.slots[index].swap(value.to_bits(), Ordering::Relaxed));

        let (sum, _) = unpack(self.state.load(Ordering::Relaxed));
        let sum = sum - old + value;
        let average = sum / self.slots.len() as f32;
        self.state.store(pack(sum, average), Ordering::Release);

        let next = if index + 1 == self.slots.len() { 0 } else { index + 1 };
        self.write_index.store(next, Ordering::Release);
    }

    pub fn average(&self) -> f32 {
        unpack(self.state.load(Ordering::Acquire)).1
    }

    pub fn sum(&self) -> f32 {
        unpack(self.state.load(Ordering::Acquire)).0
    }

    /// Consistent (sum, average) pair
    pub fn snapshot(&self) -> (f32, f32) {
        unpack(self.state.load(Ordering::Acquire))
    }

    pub fn window(&self) -> usize {
        self.slots.len()
    }
}
