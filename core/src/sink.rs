//! Per-thread error sink.
//!
//! Every fallible primitive in the runtime takes a `&mut ErrorSink` and
//! records into it instead of returning a `Result`. This mirrors the way the
//! stack-VM ancestor of this crate reported FFI errors through thread-local
//! state rather than panicking across an `extern "C"` boundary (see the
//! history in `error.rs` of the runtime crate this was generalized from) —
//! generalized here into a full chained record instead of a single string,
//! per the error-sink contract: short code, description, optional argument,
//! captured call stack, and a `next` pointer for nested errors raised while
//! already unwinding (e.g. a destructor failing during unwind).

use crate::call_stack::CallStack;
use std::fmt;

/// One raised error. `code` is the short upper-case dashed identifier from
/// the error table (`DIVISION-BY-ZERO`, `LOCK-ERROR`, ...); `description` is
/// the formatted human-readable message.
#[derive(Debug, Clone)]
pub struct ErrorRecord {
    pub code: String,
    pub description: String,
    pub arg: Option<String>,
    pub file: String,
    pub line: u32,
    pub end_line: u32,
    pub call_stack: CallStack,
    /// A nested error raised while this one was already propagating (e.g. a
    /// destructor that itself failed during unwind).
    pub next: Option<Box<ErrorRecord>>,
}

impl ErrorRecord {
    pub fn new(code: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            description: description.into(),
            arg: None,
            file: String::new(),
            line: 0,
            end_line: 0,
            call_stack: CallStack::new(),
            next: None,
        }
    }

    pub fn with_arg(mut self, arg: impl Into<String>) -> Self {
        self.arg = Some(arg.into());
        self
    }

    pub fn with_location(mut self, file: impl Into<String>, line: u32, end_line: u32) -> Self {
        self.file = file.into();
        self.line = line;
        self.end_line = end_line;
        self
    }

    pub fn with_call_stack(mut self, call_stack: CallStack) -> Self {
        self.call_stack = call_stack;
        self
    }

    /// Present this record (and its `next` chain) as a read-only hash, the
    /// shape user code sees from `catch`: keys `err`, `desc`, `arg`, `file`,
    /// `line`, `endline`, `type`, `callstack`, and optional `next`.
    pub fn to_hash(&self) -> ErrorHash {
        ErrorHash {
            err: self.code.clone(),
            desc: self.description.clone(),
            arg: self.arg.clone(),
            file: self.file.clone(),
            line: self.line,
            endline: self.end_line,
            r#type: "error".to_string(),
            callstack: self.call_stack.render(),
            next: self.next.as_ref().map(|n| Box::new(n.to_hash())),
        }
    }
}

impl fmt::Display for ErrorRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.description)?;
        if let Some(arg) = &self.arg {
            write!(f, " ({})", arg)?;
        }
        Ok(())
    }
}

/// The read-only hash projection of an [`ErrorRecord`] presented to user code.
#[derive(Debug, Clone)]
pub struct ErrorHash {
    pub err: String,
    pub desc: String,
    pub arg: Option<String>,
    pub file: String,
    pub line: u32,
    pub endline: u32,
    pub r#type: String,
    pub callstack: String,
    pub next: Option<Box<ErrorHash>>,
}

/// A per-thread accumulator of raised errors, plus the thread-exit sentinel.
///
/// The sentinel is a second boolean, independent of `errors`: setting it
/// terminates the current thread of execution without being a raised error
/// in its own right (§4.6, §5 cancellation). The evaluator checks it at
/// every call return and unwinds without consulting `errors` at all.
///
/// On drop, a non-empty sink flushes every record to the default handler —
/// a leaked error is never silently dropped.
pub struct ErrorSink {
    errors: Vec<ErrorRecord>,
    thread_exit_requested: bool,
    /// Suppresses the drop-time flush; set by code that has already handed
    /// the records to a caller (e.g. `take_errors`) or that is deliberately
    /// discarding them (tests).
    flushed: bool,
}

impl ErrorSink {
    pub fn new() -> Self {
        Self {
            errors: Vec::new(),
            thread_exit_requested: false,
            flushed: false,
        }
    }

    /// Record a new error. If the sink is already non-empty, the new record
    /// becomes `next` of the *last* raised record, so the chain reads in
    /// raise order with the newest nested error reachable by walking `next`.
    pub fn raise(&mut self, mut record: ErrorRecord) {
        if let Some(last) = self.errors.last_mut() {
            let mut tail = last;
            while tail.next.is_some() {
                tail = tail.next.as_mut().unwrap();
            }
            tail.next = Some(Box::new(record));
        } else {
            record.next = None;
            self.errors.push(record);
        }
    }

    pub fn has_error(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn errors(&self) -> &[ErrorRecord] {
        &self.errors
    }

    /// Take every record out of the sink, leaving it empty. Used by `catch`
    /// to consume the sink and present the first record as a hash to user
    /// code.
    pub fn take_errors(&mut self) -> Vec<ErrorRecord> {
        self.flushed = true;
        std::mem::take(&mut self.errors)
    }

    pub fn clear(&mut self) {
        self.errors.clear();
        self.flushed = true;
    }

    /// Request termination of the current thread of execution. This is the
    /// only general cancellation mechanism (§5): checked at each call return
    /// in the evaluator, it unwinds the activation chain by returning
    /// failure up the call stack without ever being presented to `catch`.
    pub fn request_thread_exit(&mut self) {
        self.thread_exit_requested = true;
    }

    pub fn thread_exit_requested(&self) -> bool {
        self.thread_exit_requested
    }

    /// Flush every pending record to the default handler (process stderr),
    /// one frame per line with source file, line range, and code type, then
    /// clear the sink. Called automatically on drop if non-empty, and
    /// callable directly by the top-level program driver on an unhandled
    /// error.
    pub fn flush_to_default_handler(&mut self) {
        for record in &self.errors {
            default_handler(record);
        }
        self.errors.clear();
        self.flushed = true;
    }
}

impl Default for ErrorSink {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ErrorSink {
    fn drop(&mut self) {
        if !self.flushed && !self.errors.is_empty() {
            self.flush_to_default_handler();
        }
    }
}

/// The default handler: prints the error code, description, and call stack
/// to the process's stderr, one frame per line with source file, line range,
/// and code type.
fn default_handler(record: &ErrorRecord) {
    tracing::error!(code = %record.code, "{}", record.description);
    eprintln!("{}", record);
    if !record.call_stack.is_empty() {
        eprint!("{}", record.call_stack.render());
    }
    if let Some(next) = &record.next {
        eprintln!("  (chained error during unwind)");
        default_handler(next);
    }
}
