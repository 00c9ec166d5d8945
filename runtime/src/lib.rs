//! An embeddable, multi-threaded dynamic-language runtime core: the value
//! model, the tree-walking evaluator, the concurrency/locking substrate,
//! and the dedicated signal-dispatcher thread. Lexing, parsing, and any CLI
//! front-end are deliberately outside this crate's scope — it starts at the
//! already-parsed syntax tree and ends at the embedder's `ProgramContext`.
//!
//! Module map:
//! - [`value`], [`strings`], [`list`], [`hash`], [`object`], [`callable`],
//!   [`date`], [`regexval`]: the value model.
//! - [`arithmetic`], [`operators`], [`eval`], [`lvalue`]: the evaluator.
//! - [`locks`], [`deadlock`], [`thread_state`]: the concurrency substrate.
//! - [`signal`]: the dedicated signal-dispatcher thread.
//! - [`program`], [`module`], [`featurever`], [`datasource`],
//!   [`eventqueue`]: the embedding-facing external interfaces.
//! - [`codecs`], [`digest`], [`mathfns`], [`diagnostics`]: supporting utilities.

pub mod arithmetic;
pub mod callable;
pub mod codecs;
pub mod datasource;
pub mod date;
pub mod deadlock;
pub mod diagnostics;
pub mod digest;
pub mod eval;
pub mod eventqueue;
pub mod featurever;
pub mod hash;
pub mod list;
pub mod locks;
pub mod lvalue;
pub mod mathfns;
pub mod module;
pub mod object;
pub mod operators;
pub mod program;
pub mod regexval;
pub mod signal;
pub mod strings;
pub mod thread_state;
pub mod value;

pub use callable::{CallRefInner, CallTarget, ClosureInner};
pub use eval::{call_function, call_value, eval, Expr, FunctionBody, FunctionDef};
pub use hash::OrderedHash;
pub use lvalue::Lvalue;
pub use object::{ClassDesc, ObjectInner};
pub use program::ProgramContext;
pub use strings::RuneString;
pub use value::Value;
