//! Deadlock detection for the lock substrate.
//!
//! Every blocking acquire in [`crate::locks`] goes through
//! [`check_before_blocking`] first. It maintains a process-wide
//! wait-for graph — "thread T is waiting for lock L, currently owned by
//! thread O" — behind a single global mutex, and walks that graph looking
//! for a cycle back to the calling thread *before* the calling thread
//! actually blocks. If a cycle exists, the acquire fails immediately with
//! `LOCK-ERROR` instead of deadlocking forever; this only works because the
//! check happens synchronously, under the graph lock, strictly before the
//! real blocking syscall/condvar wait begins.
//!
//! This mirrors the registry-with-a-single-guarding-mutex shape used
//! throughout the runtime (the node-stats slot table, the encoding
//! registry, the teacher runtime's channel registry): one lock protecting a
//! small shared table, held only for the duration of a lookup or insert.

use std::collections::HashMap;
use std::sync::{Mutex, OnceLock};

struct WaitGraph {
    /// lock id -> owning thread id, for locks currently held exclusively.
    owner: HashMap<u64, u64>,
    /// thread id -> lock id it is currently blocked waiting to acquire.
    waiting_for: HashMap<u64, u64>,
}

impl WaitGraph {
    fn new() -> Self {
        Self {
            owner: HashMap::new(),
            waiting_for: HashMap::new(),
        }
    }
}

static GRAPH: OnceLock<Mutex<WaitGraph>> = OnceLock::new();

fn graph() -> &'static Mutex<WaitGraph> {
    GRAPH.get_or_init(|| Mutex::new(WaitGraph::new()))
}

/// Record that `thread` now owns `lock_id` (called once the acquire
/// succeeds, whether it blocked or not).
pub fn record_acquired(thread: u64, lock_id: u64) {
    let mut g = graph().lock().expect("deadlock graph poisoned");
    g.owner.insert(lock_id, thread);
    g.waiting_for.remove(&thread);
}

/// Record that `thread` has released `lock_id`.
pub fn record_released(thread: u64, lock_id: u64) {
    let mut g = graph().lock().expect("deadlock graph poisoned");
    if g.owner.get(&lock_id) == Some(&thread) {
        g.owner.remove(&lock_id);
    }
}

/// Checked immediately before a thread would block waiting for `lock_id`,
/// currently held by some other thread. Returns `Ok(())` if it is safe to
/// block, or `Err(())` if doing so would complete a wait-for cycle (a
/// deadlock) — the caller must raise `LOCK-ERROR` and not block.
///
/// The check registers `thread -> lock_id` in the wait table, then follows
/// the chain `lock_id`'s owner is itself waiting on, repeatedly, looking
/// for `thread` to reappear. If it does, there is a cycle; the tentative
/// wait-edge is rolled back so a rejected acquire does not poison future
/// checks.
pub fn check_before_blocking(thread: u64, lock_id: u64) -> Result<(), ()> {
    let mut g = graph().lock().expect("deadlock graph poisoned");
    g.waiting_for.insert(thread, lock_id);

    let mut current_lock = lock_id;
    let mut seen = std::collections::HashSet::new();
    loop {
        let Some(&owner) = g.owner.get(&current_lock) else {
            break; // Unowned (about to be granted, or a stale entry); no cycle.
        };
        if owner == thread {
            g.waiting_for.remove(&thread);
            return Err(());
        }
        if !seen.insert(owner) {
            break; // Already visited this owner on this walk; stop rather than loop forever.
        }
        match g.waiting_for.get(&owner) {
            Some(&next_lock) => current_lock = next_lock,
            None => break, // Owner is not itself blocked; chain ends here.
        }
    }
    Ok(())
}

/// Clear all graph entries owned or waited-on by `thread`. Called when a
/// thread exits so a crashed or cancelled thread's stale edges cannot cause
/// a false-positive cycle detection for threads that outlive it.
pub fn clear_thread(thread: u64) {
    let mut g = graph().lock().expect("deadlock graph poisoned");
    g.owner.retain(|_, &mut owner| owner != thread);
    g.waiting_for.remove(&thread);
}
