//! Deferred Release Pool
//!
//! Coefficient handles replaced on the audio thread must not be freed there.
//! The filter link hands every retired handle to a [`ReleasePool`]; the pool
//! keeps it alive until a low-rate sweep finds that it is the last owner, and
//! only then drops it, off the real-time path.
//!
//! # Contexts
//!
//! The thread that builds the pool (or the one named via
//! [`ReleasePool::with_safe_thread`]) is the "safe" context: its `add` calls go
//! straight into the pending list. Every other thread's `add` goes through a
//! lock-free SPSC queue, so the audio thread never takes the list lock.
//!
//! The audio thread itself calls [`ReleasePool::add_realtime`], which always
//! takes the queue path without asking which thread it is on. An audio
//! callback thread not spawned by std would otherwise allocate its `Thread`
//! handle on first use.
//!
//! The queue has a single producer: every link sharing a pool must run on
//! one thread at a time, and control-side `add` calls from non-safe threads
//! must not overlap with it.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, ThreadId};

use glide_dsp::SharedCoefficients;
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::config::ReleasePoolConfig;
use crate::queue::Queue;

/// Outcome of one [`ReleasePool::sweep`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepStats {
    /// Handles moved from the cross-thread queue into the pending list
    pub drained: usize,
    /// Handles dropped because the pool was their only owner
    pub released: usize,
    /// Handles still waiting for other owners to let go
    pub pending: usize,
}

/// Deferred destruction for shared coefficients
pub struct ReleasePool {
    pending: Mutex<Vec<SharedCoefficients>>,
    incoming: Queue<Option<SharedCoefficients>>,
    safe_thread: ThreadId,
    overflowed: AtomicUsize,
    overflow_reported: AtomicUsize,
}

impl ReleasePool {
    /// Create a pool whose safe context is the calling thread
    pub fn new(config: &ReleasePoolConfig) -> Self {
        Self::with_safe_thread(config, thread::current().id())
    }

    /// Create a pool with an explicit safe context
    pub fn with_safe_thread(config: &ReleasePoolConfig, safe_thread: ThreadId) -> Self {
        Self {
            pending: Mutex::new(Vec::with_capacity(config.queue_capacity)),
            incoming: Queue::new(config.queue_capacity),
            safe_thread,
            overflowed: AtomicUsize::new(0),
            overflow_reported: AtomicUsize::new(0),
        }
    }

    /// Convenience for sharing a new pool between threads
    pub fn shared(config: &ReleasePoolConfig) -> Arc<Self> {
        Arc::new(Self::new(config))
    }

    /// Hand a coefficient handle over for deferred release
    ///
    /// From the safe context this inserts into the pending list (skipping
    /// duplicates). From any other context it only pushes onto the lock-free
    /// queue. If that queue is full the handle is dropped in place and the
    /// overflow is reported by the next sweep; size the queue so this never
    /// happens.
    pub fn add(&self, coefficients: SharedCoefficients) {
        if self.is_safe_context() {
            let mut pending = self.pending.lock();
            Self::insert_unique(&mut pending, coefficients);
        } else {
            self.add_realtime(coefficients);
        }
    }

    /// Hand a handle over from the audio thread
    ///
    /// Wait-free and allocation-free: a single push onto the lock-free queue.
    /// On overflow the handle is dropped in place and counted.
    #[inline]
    pub fn add_realtime(&self, coefficients: SharedCoefficients) {
        if self.incoming.push(Some(coefficients)).is_err() {
            self.overflowed.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Whether the calling thread is the pool's safe context
    pub fn is_safe_context(&self) -> bool {
        thread::current().id() == self.safe_thread
    }

    fn insert_unique(pending: &mut Vec<SharedCoefficients>, coefficients: SharedCoefficients) {
        if !pending.iter().any(|c| Arc::ptr_eq(c, &coefficients)) {
            pending.push(coefficients);
        }
    }

    /// Drain the cross-thread queue and release every solely-owned handle
    ///
    /// Call periodically from a non-real-time thread. The pending-list lock
    /// also serializes queue consumption, so concurrent sweeps stay
    /// single-consumer.
    pub fn sweep(&self) -> SweepStats {
        let mut pending = self.pending.lock();

        let mut drained = 0;
        while let Some(item) = self.incoming.pop() {
            if let Some(coefficients) = item {
                Self::insert_unique(&mut pending, coefficients);
                drained += 1;
            }
        }

        let before = pending.len();
        pending.retain(|c| Arc::strong_count(c) > 1);
        let stats = SweepStats {
            drained,
            released: before - pending.len(),
            pending: pending.len(),
        };
        // Under the lock so concurrent sweeps report each overflow once
        let total = self.overflowed.load(Ordering::Relaxed);
        let overflowed = total - self.overflow_reported.swap(total, Ordering::Relaxed);
        drop(pending);

        if overflowed > 0 {
            warn!(
                "Release queue overflowed {} times - handles were dropped on the caller's thread",
                overflowed
            );
        }
        if stats.released > 0 || stats.drained > 0 {
            debug!(
                "Release sweep: drained {}, released {}, pending {}",
                stats.drained, stats.released, stats.pending
            );
        }
        stats
    }

    /// Handles waiting in the pending list (excludes the queue)
    pub fn pending_len(&self) -> usize {
        self.pending.lock().len()
    }

    /// Handles waiting in the cross-thread queue
    pub fn queued_len(&self) -> usize {
        self.incoming.available_for_read()
    }

    /// Handles dropped because the queue was full, since the pool was built
    pub fn overflow_count(&self) -> usize {
        self.overflowed.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for ReleasePool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReleasePool")
            .field("queued", &self.queued_len())
            .field("overflowed", &self.overflow_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glide_dsp::identity_coefficients;

    fn handle() -> SharedCoefficients {
        Arc::new(identity_coefficients())
    }

    fn small_config() -> ReleasePoolConfig {
        ReleasePoolConfig {
            queue_capacity: 4,
            ..ReleasePoolConfig::default()
        }
    }

    #[test]
    fn test_safe_context_inserts_directly() {
        let pool = ReleasePool::new(&ReleasePoolConfig::default());
        assert!(pool.is_safe_context());

        pool.add(handle());
        assert_eq!(pool.pending_len(), 1);
        assert_eq!(pool.queued_len(), 0);
    }

    #[test]
    fn test_safe_context_deduplicates() {
        let pool = ReleasePool::new(&ReleasePoolConfig::default());
        let c = handle();
        pool.add(Arc::clone(&c));
        pool.add(Arc::clone(&c));
        assert_eq!(pool.pending_len(), 1);
    }

    #[test]
    fn test_sole_owner_released_on_sweep() {
        let pool = ReleasePool::new(&ReleasePoolConfig::default());
        pool.add(handle());

        let stats = pool.sweep();
        assert_eq!(stats.released, 1);
        assert_eq!(stats.pending, 0);
        assert_eq!(pool.pending_len(), 0);
    }

    #[test]
    fn test_shared_item_survives_until_other_owner_lets_go() {
        let pool = ReleasePool::new(&ReleasePoolConfig::default());
        let live = handle();
        pool.add(Arc::clone(&live));

        for _ in 0..3 {
            let stats = pool.sweep();
            assert_eq!(stats.released, 0, "Still referenced by the active filter state");
            assert_eq!(Arc::strong_count(&live), 2);
        }

        let weak = Arc::downgrade(&live);
        drop(live);
        let stats = pool.sweep();
        assert_eq!(stats.released, 1);
        assert!(weak.upgrade().is_none(), "Destroyed once the pool was the only owner");
    }

    #[test]
    fn test_other_thread_goes_through_queue() {
        let pool = Arc::new(ReleasePool::new(&ReleasePoolConfig::default()));
        let kept = handle();

        let worker = {
            let pool = Arc::clone(&pool);
            let kept = Arc::clone(&kept);
            thread::spawn(move || {
                assert!(!pool.is_safe_context());
                pool.add(kept);
                pool.add(handle());
            })
        };
        worker.join().unwrap();

        assert_eq!(pool.pending_len(), 0, "Non-safe adds never touch the list");
        assert_eq!(pool.queued_len(), 2);

        let stats = pool.sweep();
        assert_eq!(stats.drained, 2);
        assert_eq!(stats.released, 1);
        assert_eq!(stats.pending, 1);
        assert_eq!(Arc::strong_count(&kept), 2);
    }

    #[test]
    fn test_drain_deduplicates_against_pending() {
        let pool = Arc::new(ReleasePool::new(&ReleasePoolConfig::default()));
        let c = handle();
        pool.add(Arc::clone(&c));

        {
            let pool = Arc::clone(&pool);
            let c = Arc::clone(&c);
            thread::spawn(move || pool.add(c)).join().unwrap();
        }

        let stats = pool.sweep();
        assert_eq!(stats.drained, 1);
        assert_eq!(stats.pending, 1, "Same handle is tracked once");
    }

    #[test]
    fn test_queue_overflow_is_counted() {
        let pool = Arc::new(ReleasePool::new(&small_config()));
        {
            let pool = Arc::clone(&pool);
            thread::spawn(move || {
                for _ in 0..5 {
                    pool.add(handle());
                }
            })
            .join()
            .unwrap();
        }

        // 4 slots hold 3 handles
        assert_eq!(pool.queued_len(), 3);
        assert_eq!(pool.overflow_count(), 2);

        pool.sweep();
        assert_eq!(pool.overflow_count(), 2, "Count is cumulative");
    }

    #[test]
    fn test_realtime_add_always_queues() {
        let pool = ReleasePool::new(&ReleasePoolConfig::default());
        assert!(pool.is_safe_context());

        pool.add_realtime(handle());
        pool.add_realtime(handle());
        assert_eq!(pool.pending_len(), 0, "Realtime adds never take the list lock");
        assert_eq!(pool.queued_len(), 2);

        let stats = pool.sweep();
        assert_eq!(stats.drained, 2);
        assert_eq!(stats.released, 2);
    }

    #[test]
    fn test_realtime_overflow_is_counted() {
        let pool = ReleasePool::new(&small_config());
        for _ in 0..4 {
            pool.add_realtime(handle());
        }
        assert_eq!(pool.overflow_count(), 1);

        pool.sweep();
        pool.add_realtime(handle());
        pool.add_realtime(handle());
        pool.add_realtime(handle());
        pool.add_realtime(handle());
        assert_eq!(pool.overflow_count(), 2);
    }

    #[test]
    fn test_concurrent_sweep_never_frees_live_handle() {
        let pool = Arc::new(ReleasePool::new(&ReleasePoolConfig::default()));
        let live = handle();
        let weak = Arc::downgrade(&live);

        let sweeper = {
            let pool = Arc::clone(&pool);
            thread::spawn(move || {
                for _ in 0..1000 {
                    pool.sweep();
                }
            })
        };

        {
            let pool = Arc::clone(&pool);
            let live = Arc::clone(&live);
            thread::spawn(move || pool.add(live)).join().unwrap();
        }

        sweeper.join().unwrap();
        pool.sweep();
        assert!(weak.upgrade().is_some());
        assert_eq!(pool.pending_len(), 1);

        drop(live);
        pool.sweep();
        assert!(weak.upgrade().is_none());
    }
}
