//! The concurrency/locking substrate exposed to interpreted code.
//!
//! Every lock object here gets a process-wide unique id at construction
//! time (an `AtomicU64` counter, the same id-allocation shape the teacher
//! runtime's channel registry uses) and registers its acquire/release
//! transitions with [`crate::deadlock`] so the detector can see across every
//! lock kind uniformly. Blocking acquires check
//! [`crate::deadlock::check_before_blocking`] synchronously before actually
//! blocking; a detected cycle raises `LOCK-ERROR` and returns without ever
//! calling into the underlying `std::sync` primitive's blocking path.
//!
//! These are *user-visible* lock objects (the kind `Mutex::constructor()`
//! hands back to interpreted code as a first-class value), not the
//! `std::sync::Mutex`es the runtime's own internals use for registries —
//! those are implementation detail and never touch the deadlock graph.

use rune_core::sink::ErrorRecord;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::{Condvar, Mutex as StdMutex, MutexGuard};

static NEXT_LOCK_ID: AtomicU64 = AtomicU64::new(1);

fn allocate_lock_id() -> u64 {
    NEXT_LOCK_ID.fetch_add(1, Ordering::Relaxed)
}

fn lock_error(message: impl Into<String>) -> ErrorRecord {
    ErrorRecord::new("LOCK-ERROR", message.into())
}

/// A simple mutual-exclusion lock. Non-reentrant: the owning thread may not
/// acquire it a second time (attempting to does not deadlock-detect as a
/// cycle against *itself* by construction, since `owner == thread` is
/// checked directly).
pub struct Mutex {
    id: u64,
    inner: StdMutex<()>,
    owner: AtomicI64,
}

impl Mutex {
    pub fn new() -> Self {
        Self {
            id: allocate_lock_id(),
            inner: StdMutex::new(()),
            owner: AtomicI64::new(-1),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Block until acquired, or return `LOCK-ERROR` immediately if this
    /// acquire would complete a deadlock cycle.
    pub fn lock(&self, thread: u64) -> Result<MutexGuard<'_, ()>, ErrorRecord> {
        if self.owner.load(Ordering::Acquire) == thread as i64 {
            return Err(lock_error("thread already owns this Mutex (non-reentrant)"));
        }
        crate::deadlock::check_before_blocking(thread, self.id)
            .map_err(|_| lock_error("acquiring this Mutex would deadlock"))?;
        let guard = self.inner.lock().expect("user mutex poisoned");
        self.owner.store(thread as i64, Ordering::Release);
        crate::deadlock::record_acquired(thread, self.id);
        Ok(guard)
    }

    pub fn unlock(&self, thread: u64, guard: MutexGuard<'_, ()>) {
        drop(guard);
        self.owner.store(-1, Ordering::Release);
        crate::deadlock::record_released(thread, self.id);
    }

    pub fn try_lock(&self, thread: u64) -> Option<MutexGuard<'_, ()>> {
        let guard = self.inner.try_lock().ok()?;
        self.owner.store(thread as i64, Ordering::Release);
        crate::deadlock::record_acquired(thread, self.id);
        Some(guard)
    }
}

impl Default for Mutex {
    fn default() -> Self {
        Self::new()
    }
}

/// A reentrant mutex: the owning thread may acquire it repeatedly without
/// blocking on itself; it is released once its recursion count returns to
/// zero.
pub struct ReentrantMutex {
    id: u64,
    inner: StdMutex<ReentrantState>,
}

struct ReentrantState {
    owner: Option<u64>,
    depth: u32,
}

impl ReentrantMutex {
    pub fn new() -> Self {
        Self {
            id: allocate_lock_id(),
            inner: StdMutex::new(ReentrantState { owner: None, depth: 0 }),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn lock(&self, thread: u64) -> Result<(), ErrorRecord> {
        {
            let state = self.inner.lock().expect("reentrant mutex poisoned");
            if state.owner == Some(thread) {
                drop(state);
                self.inner.lock().expect("reentrant mutex poisoned").depth += 1;
                return Ok(());
            }
        }
        crate::deadlock::check_before_blocking(thread, self.id)
            .map_err(|_| lock_error("acquiring this ReentrantMutex would deadlock"))?;
        loop {
            let mut state = self.inner.lock().expect("reentrant mutex poisoned");
            if state.owner.is_none() {
                state.owner = Some(thread);
                state.depth = 1;
                crate::deadlock::record_acquired(thread, self.id);
                return Ok(());
            }
            drop(state);
            std::thread::yield_now();
        }
    }

    pub fn unlock(&self, thread: u64) -> Result<(), ErrorRecord> {
        let mut state = self.inner.lock().expect("reentrant mutex poisoned");
        if state.owner != Some(thread) {
            return Err(lock_error("thread does not own this ReentrantMutex"));
        }
        state.depth -= 1;
        if state.depth == 0 {
            state.owner = None;
            crate::deadlock::record_released(thread, self.id);
        }
        Ok(())
    }
}

impl Default for ReentrantMutex {
    fn default() -> Self {
        Self::new()
    }
}

/// A readers-writer lock: any number of concurrent readers, or one
/// exclusive writer.
pub struct RwLock {
    id: u64,
    inner: std::sync::RwLock<()>,
}

impl RwLock {
    pub fn new() -> Self {
        Self {
            id: allocate_lock_id(),
            inner: std::sync::RwLock::new(()),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn read_lock(&self, thread: u64) -> Result<std::sync::RwLockReadGuard<'_, ()>, ErrorRecord> {
        crate::deadlock::check_before_blocking(thread, self.id)
            .map_err(|_| lock_error("acquiring this RWLock for read would deadlock"))?;
        let guard = self.inner.read().expect("rwlock poisoned");
        crate::deadlock::record_acquired(thread, self.id);
        Ok(guard)
    }

    pub fn write_lock(&self, thread: u64) -> Result<std::sync::RwLockWriteGuard<'_, ()>, ErrorRecord> {
        crate::deadlock::check_before_blocking(thread, self.id)
            .map_err(|_| lock_error("acquiring this RWLock for write would deadlock"))?;
        let guard = self.inner.write().expect("rwlock poisoned");
        crate::deadlock::record_acquired(thread, self.id);
        Ok(guard)
    }

    pub fn unlock(&self, thread: u64) {
        crate::deadlock::record_released(thread, self.id);
    }
}

impl Default for RwLock {
    fn default() -> Self {
        Self::new()
    }
}

/// A condition variable, always used paired with a [`Mutex`] the way
/// `std::sync::Condvar` pairs with a `std::sync::Mutex`.
pub struct Cond {
    inner: Condvar,
}

impl Cond {
    pub fn new() -> Self {
        Self { inner: Condvar::new() }
    }

    pub fn wait<'a>(&self, guard: MutexGuard<'a, ()>) -> MutexGuard<'a, ()> {
        self.inner.wait(guard).expect("condvar wait poisoned")
    }

    pub fn signal(&self) {
        self.inner.notify_one();
    }

    pub fn broadcast(&self) {
        self.inner.notify_all();
    }
}

impl Default for Cond {
    fn default() -> Self {
        Self::new()
    }
}

/// Single-owner, re-entrant: the owning thread alone may unlock. Unlike
/// [`ReentrantMutex`] (which tracks owner/depth under its own internal
/// mutex and loops rather than condvar-parking), `Gate` blocks non-owning
/// threads on a condvar and wakes exactly one waiter per `exit`, matching
/// `VRMutex::enter`/`exit`/`grabImpl`/`releaseImpl`: the first `enter` by a
/// new thread blocks until the previous owner's count drops to zero, every
/// `enter` by the current owner just bumps the count, and `exit` by any
/// thread other than the owner is a `LOCK-ERROR` rather than a panic.
pub struct Gate {
    id: u64,
    inner: StdMutex<GateState>,
    cond: Condvar,
}

struct GateState {
    owner: Option<u64>,
    count: u32,
}

impl Gate {
    pub fn new() -> Self {
        Self {
            id: allocate_lock_id(),
            inner: StdMutex::new(GateState { owner: None, count: 0 }),
            cond: Condvar::new(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Blocks until `thread` owns the gate (recursively, if it already
    /// does), or returns `LOCK-ERROR` if acquiring it would complete a
    /// deadlock cycle.
    pub fn enter(&self, thread: u64) -> Result<(), ErrorRecord> {
        {
            let mut state = self.inner.lock().expect("gate poisoned");
            if state.owner == Some(thread) {
                state.count += 1;
                return Ok(());
            }
        }
        crate::deadlock::check_before_blocking(thread, self.id)
            .map_err(|_| lock_error("acquiring this Gate would deadlock"))?;
        let mut state = self.inner.lock().expect("gate poisoned");
        while state.owner.is_some() {
            state = self.cond.wait(state).expect("gate poisoned");
        }
        state.owner = Some(thread);
        state.count = 1;
        crate::deadlock::record_acquired(thread, self.id);
        Ok(())
    }

    /// Releases one level of recursion; only actually unlocks and wakes a
    /// waiter once the count returns to zero. Returns `LOCK-ERROR` if
    /// `thread` does not currently hold the gate.
    pub fn exit(&self, thread: u64) -> Result<(), ErrorRecord> {
        let mut state = self.inner.lock().expect("gate poisoned");
        match state.owner {
            None => Err(lock_error(format!("TID {} called Gate::exit() without acquiring the lock", thread))),
            Some(owner) if owner != thread => {
                Err(lock_error(format!("TID {} called Gate::exit() while the lock is held by TID {}", thread, owner)))
            }
            Some(_) => {
                state.count -= 1;
                if state.count == 0 {
                    state.owner = None;
                    drop(state);
                    crate::deadlock::record_released(thread, self.id);
                    self.cond.notify_one();
                }
                Ok(())
            }
        }
    }

    pub fn is_locked(&self) -> bool {
        self.inner.lock().expect("gate poisoned").owner.is_some()
    }
}

impl Default for Gate {
    fn default() -> Self {
        Self::new()
    }
}

/// A thread-safe blocking FIFO queue, bounded by an optional capacity
/// (`None` for unbounded).
pub struct Queue<T> {
    mutex: StdMutex<std::collections::VecDeque<T>>,
    not_empty: Condvar,
    not_full: Condvar,
    capacity: Option<usize>,
}

impl<T> Queue<T> {
    pub fn new(capacity: Option<usize>) -> Self {
        Self {
            mutex: StdMutex::new(std::collections::VecDeque::new()),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            capacity,
        }
    }

    pub fn push(&self, value: T) {
        let mut q = self.mutex.lock().expect("queue poisoned");
        if let Some(cap) = self.capacity {
            while q.len() >= cap {
                q = self.not_full.wait(q).expect("queue poisoned");
            }
        }
        q.push_back(value);
        self.not_empty.notify_one();
    }

    pub fn pop(&self) -> T {
        let mut q = self.mutex.lock().expect("queue poisoned");
        while q.is_empty() {
            q = self.not_empty.wait(q).expect("queue poisoned");
        }
        let v = q.pop_front().expect("checked non-empty above");
        self.not_full.notify_one();
        v
    }

    pub fn len(&self) -> usize {
        self.mutex.lock().expect("queue poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A synchronization counter that blocks `wait_for_zero` until the internal
/// count reaches zero.
pub struct Counter {
    mutex: StdMutex<i64>,
    cond: Condvar,
}

impl Counter {
    pub fn new(initial: i64) -> Self {
        Self {
            mutex: StdMutex::new(initial),
            cond: Condvar::new(),
        }
    }

    pub fn inc(&self, by: i64) -> i64 {
        let mut n = self.mutex.lock().expect("counter poisoned");
        *n += by;
        if *n == 0 {
            self.cond.notify_all();
        }
        *n
    }

    pub fn dec(&self, by: i64) -> i64 {
        self.inc(-by)
    }

    pub fn wait_for_zero(&self) {
        let mut n = self.mutex.lock().expect("counter poisoned");
        while *n != 0 {
            n = self.cond.wait(n).expect("counter poisoned");
        }
    }

    pub fn value(&self) -> i64 {
        *self.mutex.lock().expect("counter poisoned")
    }
}

/// A monotonic, thread-safe sequence generator.
pub struct Sequence {
    next: AtomicI64,
}

impl Sequence {
    pub fn new(start: i64) -> Self {
        Self {
            next: AtomicI64::new(start),
        }
    }

    pub fn next_value(&self) -> i64 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }

    pub fn current(&self) -> i64 {
        self.next.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mutex_is_not_reentrant() {
        let m = Mutex::new();
        let guard = m.lock(1).unwrap();
        let result = m.lock(1);
        assert!(result.is_err());
        m.unlock(1, guard);
    }

    #[test]
    fn reentrant_mutex_allows_recursive_acquire() {
        let m = ReentrantMutex::new();
        m.lock(1).unwrap();
        m.lock(1).unwrap();
        m.unlock(1).unwrap();
        m.unlock(1).unwrap();
        assert!(m.unlock(1).is_err());
    }

    #[test]
    fn rwlock_allows_concurrent_reads() {
        let lock = RwLock::new();
        let r1 = lock.read_lock(1).unwrap();
        let r2 = lock.read_lock(2).unwrap();
        drop(r1);
        drop(r2);
        lock.unlock(1);
        lock.unlock(2);
    }

    #[test]
    fn gate_is_reentrant_for_its_owning_thread() {
        let gate = Gate::new();
        gate.enter(1).unwrap();
        gate.enter(1).unwrap();
        gate.exit(1).unwrap();
        assert!(gate.is_locked());
        gate.exit(1).unwrap();
        assert!(!gate.is_locked());
    }

    #[test]
    fn gate_exit_by_non_owner_is_a_lock_error() {
        let gate = Gate::new();
        gate.enter(1).unwrap();
        assert!(gate.exit(2).is_err());
        gate.exit(1).unwrap();
    }

    #[test]
    fn gate_exit_without_entering_is_a_lock_error() {
        let gate = Gate::new();
        assert!(gate.exit(1).is_err());
    }

    #[test]
    fn gate_blocks_other_threads_until_released() {
        let gate = std::sync::Arc::new(Gate::new());
        gate.enter(1).unwrap();
        let g2 = gate.clone();
        let handle = std::thread::spawn(move || {
            g2.enter(2).unwrap();
            g2.exit(2).unwrap();
        });
        std::thread::sleep(std::time::Duration::from_millis(20));
        gate.exit(1).unwrap();
        handle.join().unwrap();
    }

    #[test]
    fn queue_fifo_order() {
        let q: Queue<i32> = Queue::new(None);
        q.push(1);
        q.push(2);
        assert_eq!(q.pop(), 1);
        assert_eq!(q.pop(), 2);
    }

    #[test]
    fn counter_wait_for_zero_returns_immediately_at_zero() {
        let c = Counter::new(0);
        c.wait_for_zero();
        c.inc(3);
        assert_eq!(c.value(), 3);
    }

    #[test]
    fn sequence_is_monotonic() {
        let s = Sequence::new(5);
        assert_eq!(s.next_value(), 5);
        assert_eq!(s.next_value(), 6);
        assert_eq!(s.current(), 7);
    }
}
