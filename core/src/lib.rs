//! Foundation layer for the rune embeddable runtime.
//!
//! This crate provides the language-agnostic primitives that sit beneath the
//! value model and evaluator in `rune-runtime`:
//!
//! - `sink`: per-thread chained error accumulator ([`ErrorSink`]), the single
//!   channel every fallible primitive in the runtime reports through.
//! - `call_stack`: the frame stack captured into an error record at the point
//!   a raise happens, and walked by the default handler on an unhandled error.
//! - `encoding`: the process-wide character-encoding registry. Unknown names
//!   are created on demand as opaque single-byte encodings so round-tripping
//!   a user-supplied name never fails.
//! - `memory_stats`: cross-thread counters for live reference-counted nodes,
//!   exposed for diagnostics (not required for correctness).
//! - `diagnostics`: best-effort state dump used by the watchdog and the
//!   SIGQUIT-style diagnostic hook.

pub mod call_stack;
pub mod diagnostics;
pub mod encoding;
pub mod memory_stats;
pub mod sink;

pub use call_stack::{CallFrame, CallStack, CodeType};
pub use encoding::{EncodingDesc, EncodingRegistry};
pub use sink::{ErrorRecord, ErrorSink};
