//! The buffer pool: typed free lists with a grant/return ledger.

use indexmap::IndexMap;

use phosphor_core::ty::Payload;

use crate::buffer::LaneBuffer;

/// Free-list key: payload plus a power-of-two capacity class.
type ClassKey = (Payload, usize);

/// Smallest capacity class handed out.
const MIN_CLASS: usize = 64;

/// Round a lane count up to its capacity class.
fn size_class(n: usize) -> usize {
    n.max(MIN_CLASS).next_power_of_two()
}

/// Balance report produced by [`BufferPool::reconcile`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PoolReport {
    /// Buffers granted since the last reconciliation.
    pub granted: u64,
    /// Buffers returned since the last reconciliation.
    pub returned: u64,
    /// Whether the ledger balanced. When false the pool was reset.
    pub balanced: bool,
}

/// A pool of typed lane buffers.
///
/// Buffers are borrowed for one frame (`acquire`) and returned at frame
/// end (`release`). Acquisition does not zero: materializers write every
/// active lane. The pool is single-owner; all calls happen on the
/// executor's thread.
#[derive(Debug, Default)]
pub struct BufferPool {
    free: IndexMap<ClassKey, Vec<LaneBuffer>>,
    granted: u64,
    returned: u64,
    /// Cumulative leaks observed over the pool's lifetime.
    leaks: u64,
}

impl BufferPool {
    /// A fresh, empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Borrow a buffer with capacity for at least `lanes` lanes, sized
    /// to exactly `lanes` active lanes.
    pub fn acquire(&mut self, payload: Payload, lanes: usize) -> LaneBuffer {
        self.granted += 1;
        let class = size_class(lanes);
        let mut buf = self
            .free
            .get_mut(&(payload, class))
            .and_then(Vec::pop)
            .unwrap_or_else(|| LaneBuffer::with_capacity(payload, class));
        buf.reset(lanes);
        buf
    }

    /// Return one borrowed buffer.
    pub fn release(&mut self, buf: LaneBuffer) {
        self.returned += 1;
        let class = size_class(buf.capacity().max(1));
        self.free.entry((buf.payload(), class)).or_default().push(buf);
    }

    /// Reconcile the ledger at a frame boundary.
    ///
    /// Balanced: counters reset, capacity retained. Imbalanced: the leak
    /// counter is bumped and the pool starts over with a fresh empty
    /// state, so a buggy frame cannot poison subsequent ones.
    pub fn reconcile(&mut self) -> PoolReport {
        let report = PoolReport {
            granted: self.granted,
            returned: self.returned,
            balanced: self.granted == self.returned,
        };
        if !report.balanced {
            self.leaks += 1;
            self.free.clear();
        }
        self.granted = 0;
        self.returned = 0;
        report
    }

    /// Cumulative leak count over the pool's lifetime.
    pub fn leaks(&self) -> u64 {
        self.leaks
    }

    /// Free buffers currently parked in the pool.
    pub fn free_count(&self) -> usize {
        self.free.values().map(Vec::len).sum()
    }

    /// Memory held by parked buffers, in bytes.
    pub fn memory_bytes(&self) -> usize {
        self.free
            .values()
            .flat_map(|v| v.iter())
            .map(LaneBuffer::memory_bytes)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn acquire_release_balances() {
        let mut pool = BufferPool::new();
        let a = pool.acquire(Payload::Float, 100);
        let b = pool.acquire(Payload::Vec2, 10);
        pool.release(a);
        pool.release(b);
        let report = pool.reconcile();
        assert!(report.balanced);
        assert_eq!(report.granted, 2);
        assert_eq!(report.returned, 2);
        assert_eq!(pool.leaks(), 0);
    }

    #[test]
    fn buffers_are_reused_within_class() {
        let mut pool = BufferPool::new();
        let a = pool.acquire(Payload::Float, 100);
        let capacity = a.capacity();
        pool.release(a);
        pool.reconcile();
        // Same class: 100 and 120 both round to 128.
        let b = pool.acquire(Payload::Float, 120);
        assert_eq!(b.capacity(), capacity);
        assert_eq!(pool.free_count(), 0);
        pool.release(b);
    }

    #[test]
    fn leak_resets_pool() {
        let mut pool = BufferPool::new();
        let _leaked = pool.acquire(Payload::Float, 10);
        let report = pool.reconcile();
        assert!(!report.balanced);
        assert_eq!(pool.leaks(), 1);
        // The pool recovers: a fresh cycle balances again.
        let a = pool.acquire(Payload::Float, 10);
        pool.release(a);
        assert!(pool.reconcile().balanced);
    }

    #[test]
    fn acquired_buffer_has_requested_lanes() {
        let mut pool = BufferPool::new();
        let buf = pool.acquire(Payload::Color, 7);
        assert_eq!(buf.lanes(), 7);
        assert_eq!(buf.width(), 4);
        assert!(buf.capacity() >= 7);
        pool.release(buf);
    }

    proptest! {
        #[test]
        fn ledger_balances_for_any_sequence(sizes in prop::collection::vec(1usize..5000, 0..64)) {
            let mut pool = BufferPool::new();
            let mut held = Vec::new();
            for &n in &sizes {
                held.push(pool.acquire(Payload::Float, n));
            }
            for buf in held {
                pool.release(buf);
            }
            let report = pool.reconcile();
            prop_assert!(report.balanced);
            prop_assert_eq!(report.granted, sizes.len() as u64);
        }

        #[test]
        fn size_class_covers_request(n in 1usize..100_000) {
            prop_assert!(size_class(n) >= n);
            prop_assert!(size_class(n).is_power_of_two());
        }
    }
}
