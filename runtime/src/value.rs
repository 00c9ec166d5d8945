//! The value model: what the language talks about.
//!
//! Every first-class value is a [`Value`]. Primitives (`Int`, `Float`,
//! `Bool`, `Nothing`, `Null`, `Date`) are plain data, cheap to copy.
//! Containers and anything else that can be shared between variables
//! (`Str`, `Binary`, `List`, `Hash`, `Object`, `Closure`, `CallRef`, `Regex`)
//! wrap an `Arc`, so cloning a `Value` is always an atomic refcount bump —
//! never a deep copy. That single property is what makes `refSelf` free and
//! `realCopy` cheap for anything nested: copying the outer container clones
//! the spine, and every element inside is just another refcount bump.
//!
//! # Copy-on-write
//!
//! A mutating operation on a shared `Arc<T>` must not observably affect the
//! other owners. `ensure_unique` is `Arc::make_mut` by another name: if the
//! strong count is 1, it hands back a `&mut T` into the existing allocation;
//! if not, it clones first. That is exactly the COW contract in the data
//! model: mutate in place at refcount 1, copy-then-mutate above it.
//!
//! # Why not rely on `Drop`
//!
//! Plain `Arc::drop` would free an `Object`'s payload without ever running
//! its user-visible destructor, and a container whose last child happens to
//! be a broken `Object` has no way to route that failure anywhere. `deref`
//! is the explicit, sink-reporting release path every owner is expected to
//! call instead of just letting a `Value` fall out of scope; `Drop` impls
//! beneath it are a backstop for the ordinary case (plain data with no
//! fallible teardown), not the primary contract.

use crate::callable::{CallRefInner, ClosureInner};
use crate::date::DateValue;
use crate::hash::OrderedHash;
use crate::object::ObjectInner;
use crate::regexval::{RegexLiteral, RegexSubst};
use crate::strings::RuneString;
use rune_core::sink::{ErrorRecord, ErrorSink};
use std::sync::Arc;

/// A first-class runtime value.
#[derive(Clone, Debug)]
pub enum Value {
    /// The "no value assigned" singleton. Distinct from [`Value::Null`].
    Nothing,
    /// The explicit SQL-style null singleton. Distinct from [`Value::Nothing`].
    Null,
    Int(i64),
    Float(f64),
    Bool(bool),
    Date(DateValue),
    Binary(Arc<Vec<u8>>),
    Str(RuneString),
    List(Arc<Vec<Value>>),
    Hash(Arc<OrderedHash>),
    /// Shared, never copy-on-write: objects have identity, not value semantics.
    Object(Arc<ObjectInner>),
    Closure(Arc<ClosureInner>),
    CallRef(Arc<CallRefInner>),
    Regex(Arc<RegexLiteral>),
    /// A compiled `s/pattern/replacement/opts` literal, first-class and
    /// bindable to a variable just like a match regex.
    RegexSubst(Arc<RegexSubst>),
}

impl Value {
    /// Atomically increment this value's reference count and return a new
    /// owned handle to the same payload. For `Arc`-backed variants this is
    /// literally `Clone::clone`; for inline primitives it is a plain copy.
    pub fn ref_self(&self) -> Value {
        self.clone()
    }

    /// Release this reference. If it is the object's last reference and the
    /// object is still valid, runs the user-visible destructor first,
    /// reporting any failure to `sink`, before the payload is actually
    /// freed by the ordinary `Drop` glue beneath this function.
    ///
    /// Containers release their children the same way when they themselves
    /// reach refcount zero — that happens inside their own `Drop` impls,
    /// which must not (and structurally cannot, since nothing in a `List`
    /// or `Hash` teardown is fallible) raise into `sink`.
    pub fn deref(self, sink: &mut ErrorSink) {
        if let Value::Object(ref obj) = self {
            if Arc::strong_count(obj) == 1 {
                obj.run_destructor_if_needed(sink);
            }
        }
        // Falling off the end drops `self` via the ordinary Arc/Drop chain.
    }

    /// Return an unshared copy with a fresh reference count of 1. Deep for
    /// the outer container; inner containers and immutable primitives keep
    /// their sharing (Invariant 1) because cloning a `Vec<Value>` only
    /// clones the spine — each element is just another `Arc` bump.
    pub fn real_copy(&self) -> Value {
        match self {
            Value::List(l) => Value::List(Arc::new((**l).clone())),
            Value::Hash(h) => Value::Hash(Arc::new((**h).clone())),
            Value::Str(s) => Value::Str(s.real_copy()),
            Value::Binary(b) => Value::Binary(Arc::new((**b).clone())),
            // Objects are shared identity, not value types: realCopy of an
            // object handle returns the same handle.
            Value::Object(_) => self.clone(),
            other => other.clone(),
        }
    }

    /// Ensure this value's payload is uniquely owned, copying if its
    /// refcount is greater than one. Every mutating lvalue path for lists
    /// and hashes goes through this before taking a writable pointer.
    pub fn ensure_unique_list(slot: &mut Value) -> &mut Vec<Value> {
        if let Value::List(arc) = slot {
            Arc::make_mut(arc)
        } else {
            panic!("ensure_unique_list called on a non-list value")
        }
    }

    pub fn ensure_unique_hash(slot: &mut Value) -> &mut OrderedHash {
        if let Value::Hash(arc) = slot {
            Arc::make_mut(arc)
        } else {
            panic!("ensure_unique_hash called on a non-hash value")
        }
    }

    /// Strict equality: identical type, identical payload. Floats compare
    /// bit-for-bit; containers compare deeply.
    pub fn is_equal_hard(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Nothing, Value::Nothing) => true,
            (Value::Null, Value::Null) => true,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Date(a), Value::Date(b)) => a == b,
            (Value::Binary(a), Value::Binary(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a.is_equal_hard(b),
            (Value::List(a), Value::List(b)) => {
                a.len() == b.len()
                    && a.iter().zip(b.iter()).all(|(x, y)| x.is_equal_hard(y))
            }
            (Value::Hash(a), Value::Hash(b)) => a.is_equal_hard(b),
            (Value::Object(a), Value::Object(b)) => Arc::ptr_eq(a, b),
            (Value::Closure(a), Value::Closure(b)) => Arc::ptr_eq(a, b),
            (Value::CallRef(a), Value::CallRef(b)) => Arc::ptr_eq(a, b),
            (Value::Regex(a), Value::Regex(b)) => a.pattern == b.pattern,
            (Value::RegexSubst(a), Value::RegexSubst(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Type-coercing equality. Cross-type comparisons coerce through the
    /// documented numeric/string rules; strings with different encodings
    /// are transcoded to a common encoding first (see [`crate::strings`]).
    pub fn is_equal_soft(&self, other: &Value, sink: &mut ErrorSink) -> bool {
        use Value::*;
        match (self, other) {
            (Nothing, Nothing) | (Null, Null) => true,
            // nothing and null are documented as never equal to each other
            // or, via soft coercion, to anything but themselves.
            (Nothing, _) | (_, Nothing) | (Null, _) | (_, Null) => false,
            (Int(_), Int(_)) | (Float(_), Float(_)) | (Bool(_), Bool(_)) => {
                self.is_equal_hard(other)
            }
            (Int(a), Float(b)) | (Float(b), Int(a)) => (*a as f64) == *b,
            (Str(s), Int(n)) | (Int(n), Str(s)) => s.to_int() == *n,
            (Str(s), Float(f)) | (Float(f), Str(s)) => s.to_float() == *f,
            (Str(a), Str(b)) => a.soft_eq(b, sink),
            (Bool(b), other) | (other, Bool(b)) => other.to_bool() == *b,
            (List(a), List(b)) => {
                a.len() == b.len()
                    && a.iter().zip(b.iter()).all(|(x, y)| x.is_equal_soft(y, sink))
            }
            (Hash(a), Hash(b)) => a.is_equal_soft(b, sink),
            _ => self.is_equal_hard(other),
        }
    }

    /// True for parse-tree nodes that still need evaluation. Every concrete
    /// [`Value`] here is already-evaluated data, so this is always `false`;
    /// the companion `Expr` variant of [`crate::eval::EvalNode`] is the type
    /// for which this returns `true`. Kept as a method here (rather than
    /// folded into one giant enum) because that split keeps "data" and
    /// "syntax tree" from being the same Rust type — see `DESIGN.md`.
    pub fn needs_eval(&self) -> bool {
        false
    }

    pub fn to_bool(&self) -> bool {
        match self {
            Value::Nothing | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(n) => *n != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::Binary(b) => !b.is_empty(),
            Value::List(l) => !l.is_empty(),
            Value::Hash(h) => !h.is_empty(),
            Value::Date(d) => !d.is_zero(),
            Value::Object(_) | Value::Closure(_) | Value::CallRef(_) | Value::Regex(_) | Value::RegexSubst(_) => true,
        }
    }

    /// All coercions of `nothing` to a primitive yield that primitive's zero
    /// value (Invariant 3).
    pub fn to_int(&self) -> i64 {
        match self {
            Value::Nothing | Value::Null => 0,
            Value::Int(n) => *n,
            Value::Float(f) => *f as i64,
            Value::Bool(b) => *b as i64,
            Value::Str(s) => s.to_int(),
            Value::Date(d) => d.to_epoch_seconds(),
            _ => 0,
        }
    }

    pub fn to_float(&self) -> f64 {
        match self {
            Value::Nothing | Value::Null => 0.0,
            Value::Int(n) => *n as f64,
            Value::Float(f) => *f,
            Value::Bool(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            Value::Str(s) => s.to_float(),
            Value::Date(d) => d.to_epoch_seconds() as f64,
            _ => 0.0,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nothing => "nothing",
            Value::Null => "null",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Bool(_) => "bool",
            Value::Date(_) => "date",
            Value::Binary(_) => "binary",
            Value::Str(_) => "string",
            Value::List(_) => "list",
            Value::Hash(_) => "hash",
            Value::Object(_) => "object",
            Value::Closure(_) => "closure",
            Value::CallRef(_) => "callref",
            Value::Regex(_) => "regex",
            Value::RegexSubst(_) => "regex_subst",
        }
    }

    pub fn type_error(&self, op: &str) -> ErrorRecord {
        ErrorRecord::new(
            "RUNTIME-TYPE-ERROR",
            format!("{} does not support operand of type '{}'", op, self.type_name()),
        )
    }
}
