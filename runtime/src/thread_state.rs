//! Per-thread runtime state and the thread registry.
//!
//! Every OS thread that runs interpreted code gets a small bundle of
//! thread-local state: its [`rune_core::sink::ErrorSink`], its
//! [`rune_core::call_stack::CallStack`], a local-variable activation frame
//! stack, the implicit `argv`/`self` bindings, and its virtual lock stack
//! (the ordered list of locks it currently holds, consulted by
//! [`crate::deadlock`]). A lightweight [`ThreadRegistry`] tracks which
//! thread IDs are live, the same atomic-slot-table shape
//! `rune_core::memory_stats` uses for node counters and the teacher runtime
//! uses for its channel registry: a `Mutex`-guarded table plus an
//! `AtomicU64` id generator, rather than per-thread TLS alone, because the
//! deadlock detector and diagnostics dump both need to walk *every* live
//! thread's lock stack from a different thread.

use crate::value::Value;
use rune_core::call_stack::CallStack;
use rune_core::sink::ErrorSink;
use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, OnceLock};

static NEXT_THREAD_ID: AtomicU64 = AtomicU64::new(1);

/// One activation record: the local variables visible in a function call.
#[derive(Default)]
pub struct LocalFrame {
    pub locals: HashMap<String, Value>,
}

/// A single entry on a thread's virtual lock stack: which lock, acquired in
/// what order relative to the others this thread holds. The deadlock
/// detector only needs the lock identifiers, in acquisition order.
pub type VirtualLockStack = Vec<u64>;

pub struct ThreadState {
    pub thread_id: u64,
    pub sink: ErrorSink,
    pub call_stack: CallStack,
    pub locals: Vec<LocalFrame>,
    pub argv: Vec<Value>,
    pub implicit_self: Option<Value>,
    pub vls: VirtualLockStack,
}

impl ThreadState {
    fn new(thread_id: u64) -> Self {
        Self {
            thread_id,
            sink: ErrorSink::new(),
            call_stack: CallStack::new(),
            locals: vec![LocalFrame::default()],
            argv: Vec::new(),
            implicit_self: None,
            vls: Vec::new(),
        }
    }

    pub fn push_frame(&mut self) {
        self.locals.push(LocalFrame::default());
    }

    pub fn pop_frame(&mut self) {
        if self.locals.len() > 1 {
            self.locals.pop();
        }
    }

    pub fn get_local(&self, name: &str) -> Option<Value> {
        self.locals.last().and_then(|f| f.locals.get(name)).cloned()
    }

    pub fn set_local(&mut self, name: &str, value: Value) {
        if let Some(frame) = self.locals.last_mut() {
            frame.locals.insert(name.to_string(), value);
        }
    }
}

thread_local! {
    static CURRENT: RefCell<ThreadState> = RefCell::new(ThreadState::new(allocate_thread_id()));
}

fn allocate_thread_id() -> u64 {
    NEXT_THREAD_ID.fetch_add(1, Ordering::Relaxed)
}

/// Run `f` with mutable access to the current thread's state.
pub fn with_current<R>(f: impl FnOnce(&mut ThreadState) -> R) -> R {
    CURRENT.with(|cell| f(&mut cell.borrow_mut()))
}

pub fn current_thread_id() -> u64 {
    CURRENT.with(|cell| cell.borrow().thread_id)
}

/// Registers the calling thread's summary for diagnostics/deadlock scans.
/// Call once when a thread starts doing interpreted work; the entry is
/// removed by [`unregister_current`] when the thread is done (typically via
/// a guard in the embedding's thread-spawn helper).
pub fn register_current() {
    let (id, vls_summary) = CURRENT.with(|cell| {
        let state = cell.borrow();
        (state.thread_id, state.vls.len())
    });
    registry().lock().expect("thread registry poisoned").insert(
        id,
        ThreadSummary {
            thread_id: id,
            held_locks: vls_summary,
        },
    );
}

pub fn unregister_current() {
    let id = current_thread_id();
    registry().lock().expect("thread registry poisoned").remove(&id);
}

#[derive(Clone, Copy, Debug)]
pub struct ThreadSummary {
    pub thread_id: u64,
    pub held_locks: usize,
}

type Registry = Mutex<HashMap<u64, ThreadSummary>>;
static REGISTRY: OnceLock<Registry> = OnceLock::new();

fn registry() -> &'static Registry {
    REGISTRY.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Snapshot of every registered thread, for the diagnostics dump. Returns
/// `None` rather than blocking if the registry lock is currently held, the
/// same try-lock discipline the teacher runtime's channel registry uses so
/// a diagnostics signal handler never contends with normal operation.
pub fn snapshot() -> Option<Vec<ThreadSummary>> {
    match registry().try_lock() {
        Ok(guard) => Some(guard.values().copied().collect()),
        Err(_) => None,
    }
}

pub fn live_thread_count() -> usize {
    registry().lock().expect("thread registry poisoned").len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locals_are_scoped_per_frame() {
        with_current(|state| {
            state.set_local("x", Value::Int(1));
            state.push_frame();
            assert!(state.get_local("x").is_none(), "new frame starts empty");
            state.set_local("x", Value::Int(2));
            assert_eq!(state.get_local("x").unwrap().to_int(), 2);
            state.pop_frame();
            assert_eq!(state.get_local("x").unwrap().to_int(), 1);
        });
    }

    #[test]
    fn pop_frame_never_empties_the_stack() {
        with_current(|state| {
            while state.locals.len() > 1 {
                state.pop_frame();
            }
            state.pop_frame();
            assert_eq!(state.locals.len(), 1);
        });
    }

    #[test]
    fn register_and_unregister_round_trip() {
        register_current();
        let id = current_thread_id();
        let snap = snapshot().expect("registry lock available");
        assert!(snap.iter().any(|s| s.thread_id == id));
        unregister_current();
        let snap = snapshot().expect("registry lock available");
        assert!(!snap.iter().any(|s| s.thread_id == id));
    }
}
