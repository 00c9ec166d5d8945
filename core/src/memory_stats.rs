//! Cross-thread reference-counted node statistics.
//!
//! The value model (in `rune-runtime`) bumps and drops atomic reference
//! counts on every node from every worker thread. Diagnostics — including the
//! signal-dispatched state dump — need to see live totals without taking a
//! lock on any hot path. We solve this the way arena stats were solved in the
//! stack-VM ancestor of this crate: a fixed-size slot table, one slot per
//! thread, claimed with a single CAS on first use and updated with plain
//! atomic stores afterward.
//!
//! # Design
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │               NodeStatsRegistry (global)                │
//! ├─────────────────────────────────────────────────────────┤
//! │ slots: [NodeSlot; MAX_THREADS]                           │
//! │  ┌──────────────────┐  ┌──────────────────┐              │
//! │  │ Slot 0 (Thread A)│  │ Slot 1 (Thread B)│  ...         │
//! │  │ thread_id: u64   │  │ thread_id: u64   │              │
//! │  │ created: u64     │  │ created: u64     │              │
//! │  │ dropped: u64     │  │ dropped: u64     │              │
//! │  └──────────────────┘  └──────────────────┘              │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! Registration never fails into a panic: once the slot table overflows,
//! further threads are simply not tracked and `overflow_count` increments so
//! diagnostics can report the gap instead of silently under-counting.

use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};

/// Matches the compile-time maximum thread count documented in the
/// concurrency model (ordering guarantees, §5): a fixed, generous ceiling
/// rather than an unbounded table.
pub const MAX_THREADS: usize = 256;

#[derive(Debug)]
struct NodeSlot {
    thread_id: AtomicU64,
    created: AtomicU64,
    dropped: AtomicU64,
}

impl NodeSlot {
    const fn new() -> Self {
        Self {
            thread_id: AtomicU64::new(0),
            created: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }
}

/// Global registry for cross-thread node statistics.
pub struct NodeStatsRegistry {
    slots: Box<[NodeSlot]>,
    pub overflow_count: AtomicU64,
}

impl NodeStatsRegistry {
    fn new(capacity: usize) -> Self {
        let slots: Vec<NodeSlot> = (0..capacity).map(|_| NodeSlot::new()).collect();
        Self {
            slots: slots.into_boxed_slice(),
            overflow_count: AtomicU64::new(0),
        }
    }

    /// Claim a slot for the current thread. Returns `None` once the table is full.
    fn register(&self, thread_id: u64) -> Option<usize> {
        for (idx, slot) in self.slots.iter().enumerate() {
            if slot
                .thread_id
                .compare_exchange(0, thread_id, Ordering::AcqRel, Ordering::Relaxed)
                .is_ok()
            {
                return Some(idx);
            }
        }
        self.overflow_count.fetch_add(1, Ordering::Relaxed);
        None
    }

    #[inline]
    fn record_created(&self, slot_idx: usize) {
        if let Some(slot) = self.slots.get(slot_idx) {
            slot.created.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[inline]
    fn record_dropped(&self, slot_idx: usize) {
        if let Some(slot) = self.slots.get(slot_idx) {
            slot.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Aggregate live-node counts across every registered thread.
    pub fn aggregate(&self) -> AggregateNodeStats {
        let mut active_threads = 0usize;
        let mut total_created = 0u64;
        let mut total_dropped = 0u64;
        for slot in self.slots.iter() {
            if slot.thread_id.load(Ordering::Acquire) != 0 {
                active_threads += 1;
                total_created += slot.created.load(Ordering::Relaxed);
                total_dropped += slot.dropped.load(Ordering::Relaxed);
            }
        }
        AggregateNodeStats {
            active_threads,
            total_created,
            total_dropped,
            overflow_count: self.overflow_count.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct AggregateNodeStats {
    pub active_threads: usize,
    pub total_created: u64,
    pub total_dropped: u64,
    pub overflow_count: u64,
}

impl AggregateNodeStats {
    /// Nodes created but not yet dropped, across all tracked threads.
    pub fn live(&self) -> u64 {
        self.total_created.saturating_sub(self.total_dropped)
    }
}

static NEXT_THREAD_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static THIS_THREAD_ID: u64 = NEXT_THREAD_ID.fetch_add(1, Ordering::Relaxed);
    static SLOT_INDEX: std::cell::Cell<Option<usize>> = const { std::cell::Cell::new(None) };
}

static NODE_REGISTRY: OnceLock<NodeStatsRegistry> = OnceLock::new();

/// The global node-stats registry, lazily created on first touch.
pub fn node_registry() -> &'static NodeStatsRegistry {
    NODE_REGISTRY.get_or_init(|| NodeStatsRegistry::new(MAX_THREADS))
}

fn slot_index() -> Option<usize> {
    SLOT_INDEX.with(|cell| {
        if let Some(idx) = cell.get() {
            return Some(idx);
        }
        let thread_id = THIS_THREAD_ID.with(|&id| id);
        let idx = node_registry().register(thread_id);
        cell.set(idx);
        idx
    })
}

/// Record that a reference-counted node was created on the current thread.
pub fn note_node_created() {
    if let Some(idx) = slot_index() {
        node_registry().record_created(idx);
    }
}

/// Record that a reference-counted node's payload was released on the
/// current thread (refcount reached zero).
pub fn note_node_dropped() {
    if let Some(idx) = slot_index() {
        node_registry().record_dropped(idx);
    }
}
