//! The embedding-facing program context: parse-option domain mask,
//! built-in function registry, and the top-level `call_function` entry
//! point an embedder uses to invoke a named function in a loaded program.
//!
//! This is the lighter-touch external interface the spec calls out (§6): a
//! `ProgramContext` bundles everything a single loaded program needs
//! without this runtime taking on a parser, a lexer, or a full module
//! system of its own — those stay the embedder's responsibility.

use crate::eval::{call_function, FunctionDef};
use crate::value::Value;
use rune_core::sink::ErrorSink;
use std::collections::HashMap;
use std::sync::Arc;

/// A bitmask of parse-option domains a program may be restricted to or
/// excluded from. Modeled as a plain `u32` bitmask rather than a
/// `bitflags!`-generated type so the mask interoperates with plain integer
/// arithmetic without pulling in another dependency for four constants.
pub mod domain {
    pub const NONE: u32 = 0;
    pub const NO_FILESYSTEM: u32 = 1 << 0;
    pub const NO_NETWORK: u32 = 1 << 1;
    pub const NO_PROCESS_CONTROL: u32 = 1 << 2;
    pub const NO_THREAD_CONTROL: u32 = 1 << 3;
    pub const NO_EXTERNAL_ACCESS: u32 = NO_FILESYSTEM | NO_NETWORK | NO_PROCESS_CONTROL;
}

pub struct ProgramContext {
    functions: HashMap<String, Arc<FunctionDef>>,
    domain_mask: u32,
}

impl ProgramContext {
    pub fn new(domain_mask: u32) -> Self {
        Self {
            functions: HashMap::new(),
            domain_mask,
        }
    }

    pub fn domain_mask(&self) -> u32 {
        self.domain_mask
    }

    /// True if every domain bit in `required` is *absent* from the current
    /// mask, i.e. this program is allowed to use a feature tagged with
    /// `required`.
    pub fn allows(&self, required: u32) -> bool {
        self.domain_mask & required == 0
    }

    pub fn register_function(&mut self, def: FunctionDef) {
        self.functions.insert(def.name.clone(), Arc::new(def));
    }

    pub fn lookup_function(&self, name: &str) -> Option<Arc<FunctionDef>> {
        self.functions.get(name).cloned()
    }

    /// Call a registered function by name. Raises `ACCESS-ERROR` rather
    /// than panicking if the name is unregistered — an embedder asking for
    /// a function that parsing never actually defined is a runtime
    /// condition, not a programming error in this crate.
    pub fn call_function(&self, name: &str, args: &[Value], sink: &mut ErrorSink) -> Value {
        match self.lookup_function(name) {
            Some(def) => call_function(&def, args, None, sink),
            None => {
                sink.raise(rune_core::sink::ErrorRecord::new(
                    "ACCESS-ERROR",
                    format!("no function named '{}' is registered in this program", name),
                ));
                Value::Nothing
            }
        }
    }

    pub fn function_names(&self) -> Vec<&str> {
        self.functions.keys().map(|s| s.as_str()).collect()
    }
}
