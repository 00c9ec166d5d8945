//! Callable values: closures and call references.
//!
//! A `Closure` pairs a function definition with the set of outer local
//! variables it captures. Captures are upgraded to shared, heap-allocated
//! cells (`Arc<Mutex<Value>>`) at the moment the closure is created — not
//! lazily on first write — so mutations inside the closure body are visible
//! to the enclosing scope and vice versa for as long as both are alive. That
//! upgrade-at-creation rule is the one explicit departure the value model
//! makes from "everything is COW by default": a captured variable's
//! enclosing scope stops being allowed to assume sole ownership of it the
//! moment a closure captures it, because the closure might outlive the
//! frame that created it.
//!
//! A `CallRef` is a bound reference to something callable without the
//! capture machinery: a plain function, a method bound to a receiver
//! object, or a static method bound to a class.

use crate::eval::FunctionDef;
use crate::value::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// A shared cell for a captured local variable.
pub type CapturedCell = Arc<Mutex<Value>>;

pub struct ClosureInner {
    pub def: Arc<FunctionDef>,
    pub captures: HashMap<String, CapturedCell>,
}

impl ClosureInner {
    pub fn new(def: Arc<FunctionDef>, captures: HashMap<String, CapturedCell>) -> Arc<Self> {
        Arc::new(Self { def, captures })
    }

    pub fn read_capture(&self, name: &str) -> Option<Value> {
        self.captures.get(name).map(|cell| cell.lock().expect("closure capture lock poisoned").clone())
    }

    pub fn write_capture(&self, name: &str, value: Value) -> bool {
        match self.captures.get(name) {
            Some(cell) => {
                *cell.lock().expect("closure capture lock poisoned") = value;
                true
            }
            None => false,
        }
    }
}

/// What a `CallRef` actually invokes.
pub enum CallTarget {
    /// A free function, looked up by name at bind time.
    Function(Arc<FunctionDef>),
    /// An instance method bound to a specific receiver.
    Method { def: Arc<FunctionDef>, receiver: Value },
    /// A static method bound to a class, with no receiver.
    StaticMethod(Arc<FunctionDef>),
}

pub struct CallRefInner {
    pub target: CallTarget,
}

impl CallRefInner {
    pub fn function(def: Arc<FunctionDef>) -> Arc<Self> {
        Arc::new(Self {
            target: CallTarget::Function(def),
        })
    }

    pub fn method(def: Arc<FunctionDef>, receiver: Value) -> Arc<Self> {
        Arc::new(Self {
            target: CallTarget::Method { def, receiver },
        })
    }

    pub fn static_method(def: Arc<FunctionDef>) -> Arc<Self> {
        Arc::new(Self {
            target: CallTarget::StaticMethod(def),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::FunctionDef;

    fn empty_def(name: &str) -> Arc<FunctionDef> {
        Arc::new(FunctionDef::native(name, |_args, _sink| Value::Nothing))
    }

    #[test]
    fn capture_mutation_is_visible_through_the_shared_cell() {
        let cell: CapturedCell = Arc::new(Mutex::new(Value::Int(1)));
        let mut captures = HashMap::new();
        captures.insert("x".to_string(), cell.clone());
        let closure = ClosureInner::new(empty_def("f"), captures);

        closure.write_capture("x", Value::Int(42));
        assert_eq!(cell.lock().unwrap().to_int(), 42);
    }

    #[test]
    fn read_capture_returns_none_for_unknown_name() {
        let closure = ClosureInner::new(empty_def("f"), HashMap::new());
        assert!(closure.read_capture("missing").is_none());
    }
}
