//! Class-bound objects.
//!
//! Unlike `List`/`Hash`, an `Object` has identity: two handles to the same
//! object are never copy-on-write, they are the *same* object, and mutating
//! one's members is visible through the other (Invariant: "Object is shared,
//! never COW"). Two object values are hard-equal only if they are literally
//! the same allocation (`Arc::ptr_eq`), never by comparing members.
//!
//! Deletion has its own lifecycle separate from ordinary Rust `Drop`: a
//! destructor is a user-visible, fallible operation that must run exactly
//! once, at the point the last reference goes away, and any failure it
//! raises must land in the releasing thread's error sink rather than
//! panicking out of a `Drop` impl (which cannot take a `&mut ErrorSink`
//! parameter at all). `valid` tracks whether the destructor has already run;
//! once false, any further member access raises `OBJECT-ALREADY-DELETED`
//! rather than touching freed user state.

use crate::eval::FunctionDef;
use crate::value::Value;
use rune_core::sink::{ErrorRecord, ErrorSink};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

pub struct ClassDesc {
    pub name: String,
    /// Invoked with `self` as sole implicit argument when the last reference
    /// to an instance is released. `None` for classes with no destructor.
    pub destructor: Option<Value>,
    /// Invoked with the member name as sole argument when member access
    /// finds no such member declared on the object. `None` means a missing
    /// member just reads as `nothing`, same as a missing hash key.
    pub member_gate: Option<Value>,
    /// The class this one directly inherits from, if any. `instanceof`
    /// walks this chain rather than comparing names directly, so a `Circle`
    /// instance answers `true` for `instanceof Shape` when `Circle`'s
    /// `parent` is `Shape`.
    pub parent: Option<Arc<ClassDesc>>,
    /// Methods declared directly on this class, keyed by name. `find_method`
    /// walks `parent` the same way `is_or_inherits` does, so a subclass
    /// inherits whatever it doesn't override.
    pub methods: HashMap<String, Arc<FunctionDef>>,
}

impl ClassDesc {
    /// Walks `self` and its ancestry looking for a class named `name`,
    /// matching spec §4.2's `instanceof` contract.
    pub fn is_or_inherits(&self, name: &str) -> bool {
        if self.name == name {
            return true;
        }
        match &self.parent {
            Some(parent) => parent.is_or_inherits(name),
            None => false,
        }
    }

    /// Looks up `name` on this class, then its ancestry, mirroring
    /// `is_or_inherits`'s walk. Returns the most-derived definition: a
    /// subclass method of the same name shadows its parent's.
    pub fn find_method(&self, name: &str) -> Option<Arc<FunctionDef>> {
        if let Some(def) = self.methods.get(name) {
            return Some(def.clone());
        }
        self.parent.as_ref().and_then(|parent| parent.find_method(name))
    }
}

pub struct ObjectInner {
    pub class: Arc<ClassDesc>,
    members: Mutex<HashMap<String, Value>>,
    valid: AtomicBool,
}

impl ObjectInner {
    pub fn new(class: Arc<ClassDesc>) -> Arc<Self> {
        Arc::new(Self {
            class,
            members: Mutex::new(HashMap::new()),
            valid: AtomicBool::new(true),
        })
    }

    pub fn is_valid(&self) -> bool {
        self.valid.load(Ordering::Acquire)
    }

    pub fn get_member(&self, name: &str, sink: &mut ErrorSink) -> Value {
        if !self.is_valid() {
            sink.raise(already_deleted(&self.class.name));
            return Value::Nothing;
        }
        let existing = self
            .members
            .lock()
            .expect("object member lock poisoned")
            .get(name)
            .cloned();
        match existing {
            Some(v) => v,
            // A declared-but-absent member routes through the class's
            // member-gate method instead of silently reading as `nothing`,
            // the same way a missing hash key never does.
            None => match &self.class.member_gate {
                Some(gate) => crate::eval::call_value(gate, &[Value::Str(crate::strings::RuneString::from_str(name))], sink),
                None => Value::Nothing,
            },
        }
    }

    pub fn set_member(&self, name: &str, value: Value, sink: &mut ErrorSink) {
        if !self.is_valid() {
            sink.raise(already_deleted(&self.class.name));
            return;
        }
        let replaced = self
            .members
            .lock()
            .expect("object member lock poisoned")
            .insert(name.to_string(), value);
        if let Some(old) = replaced {
            old.deref(sink);
        }
    }

    /// Explicit user-triggered delete (the `delete` operator / `delete()`
    /// builtin). Runs the destructor immediately regardless of how many
    /// other handles still reference this object, then marks it invalid.
    /// Takes an `Arc` handle (rather than `&self`) because the destructor
    /// call needs a `Value::Object` receiver, which requires the shared
    /// handle, not just a borrow of the payload.
    pub fn delete(self: &Arc<Self>, sink: &mut ErrorSink) {
        if self.valid.swap(false, Ordering::AcqRel) {
            self.invoke_destructor(sink);
        }
    }

    /// Called by [`crate::value::Value::deref`] when a release leaves this
    /// the last reference. Runs the destructor only if nothing has already
    /// deleted the object explicitly.
    pub fn run_destructor_if_needed(self: &Arc<Self>, sink: &mut ErrorSink) {
        if self.valid.swap(false, Ordering::AcqRel) {
            self.invoke_destructor(sink);
        }
    }

    fn invoke_destructor(self: &Arc<Self>, sink: &mut ErrorSink) {
        if let Some(destructor) = self.class.destructor.clone() {
            crate::eval::call_destructor(&destructor, Value::Object(self.clone()), sink);
        }
    }
}

fn already_deleted(class_name: &str) -> ErrorRecord {
    ErrorRecord::new(
        "OBJECT-ALREADY-DELETED",
        format!("cannot access member of already-deleted object of class '{}'", class_name),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain_class(name: &str) -> Arc<ClassDesc> {
        Arc::new(ClassDesc {
            name: name.to_string(),
            destructor: None,
            member_gate: None,
            parent: None,
            methods: HashMap::new(),
        })
    }

    #[test]
    fn set_and_get_member_round_trips() {
        let mut sink = ErrorSink::new();
        let obj = ObjectInner::new(plain_class("Point"));
        obj.set_member("x", Value::Int(3), &mut sink);
        assert_eq!(obj.get_member("x", &mut sink).to_int(), 3);
        assert!(sink.is_empty());
    }

    #[test]
    fn access_after_delete_raises_already_deleted() {
        let mut sink = ErrorSink::new();
        let obj = ObjectInner::new(plain_class("Point"));
        obj.delete(&mut sink);
        assert!(sink.is_empty());
        let _ = obj.get_member("x", &mut sink);
        assert!(sink.has_error());
    }

    #[test]
    fn double_delete_only_runs_destructor_once() {
        let mut sink = ErrorSink::new();
        let obj = ObjectInner::new(plain_class("Point"));
        obj.delete(&mut sink);
        obj.delete(&mut sink);
        assert!(!obj.is_valid());
    }

    #[test]
    fn two_handles_to_same_object_share_mutations() {
        let mut sink = ErrorSink::new();
        let obj = ObjectInner::new(plain_class("Counter"));
        let handle_a = obj.clone();
        obj.set_member("n", Value::Int(1), &mut sink);
        assert_eq!(handle_a.get_member("n", &mut sink).to_int(), 1);
    }

    #[test]
    fn explicit_delete_actually_invokes_the_destructor() {
        use crate::callable::CallRefInner;
        use crate::eval::FunctionDef;
        use std::sync::atomic::{AtomicBool, Ordering};

        let ran = Arc::new(AtomicBool::new(false));
        let ran_in_destructor = ran.clone();
        let destructor_def = Arc::new(FunctionDef::native("destructor", move |args, _sink| {
            assert!(matches!(args[0], Value::Object(_)), "destructor receives self as its sole argument");
            ran_in_destructor.store(true, Ordering::SeqCst);
            Value::Nothing
        }));
        let class = Arc::new(ClassDesc {
            name: "Resource".to_string(),
            destructor: Some(Value::CallRef(CallRefInner::function(destructor_def))),
            member_gate: None,
            parent: None,
            methods: HashMap::new(),
        });
        let mut sink = ErrorSink::new();
        let obj = ObjectInner::new(class);
        obj.delete(&mut sink);
        assert!(sink.is_empty());
        assert!(ran.load(Ordering::SeqCst));
    }

    #[test]
    fn last_reference_release_runs_the_destructor_exactly_once() {
        use crate::callable::CallRefInner;
        use crate::eval::FunctionDef;
        use std::sync::atomic::{AtomicUsize, Ordering};

        let calls = Arc::new(AtomicUsize::new(0));
        let calls_in_destructor = calls.clone();
        let destructor_def = Arc::new(FunctionDef::native("destructor", move |_args, _sink| {
            calls_in_destructor.fetch_add(1, Ordering::SeqCst);
            Value::Nothing
        }));
        let class = Arc::new(ClassDesc {
            name: "Resource".to_string(),
            destructor: Some(Value::CallRef(CallRefInner::function(destructor_def))),
            member_gate: None,
            parent: None,
            methods: HashMap::new(),
        });
        let mut sink = ErrorSink::new();
        let obj = ObjectInner::new(class);
        let extra_handle = Value::Object(obj.clone());
        extra_handle.deref(&mut sink);
        assert_eq!(calls.load(Ordering::SeqCst), 0, "destructor must not run while another handle is still live");
        Value::Object(obj).deref(&mut sink);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn member_gate_is_called_for_an_absent_member() {
        use crate::callable::CallRefInner;
        use crate::eval::FunctionDef;
        use crate::strings::RuneString;

        let gate_def = Arc::new(FunctionDef::native("member_gate", |args, _sink| {
            let requested = match &args[0] {
                Value::Str(s) => s.to_lossy_str().into_owned(),
                _ => String::new(),
            };
            Value::Str(RuneString::from_str(&format!("gated:{}", requested)))
        }));
        let class = Arc::new(ClassDesc {
            name: "Dynamic".to_string(),
            destructor: None,
            member_gate: Some(Value::CallRef(CallRefInner::function(gate_def))),
            parent: None,
            methods: HashMap::new(),
        });
        let mut sink = ErrorSink::new();
        let obj = ObjectInner::new(class);
        obj.set_member("x", Value::Int(1), &mut sink);
        assert_eq!(obj.get_member("x", &mut sink).to_int(), 1);
        let gated = obj.get_member("y", &mut sink);
        match gated {
            Value::Str(s) => assert_eq!(s.to_lossy_str(), "gated:y"),
            _ => panic!("expected Str"),
        }
    }
}
