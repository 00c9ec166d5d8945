//! Lvalue resolution: reading, assigning, and compound-assigning through an
//! addressable path into a local variable, list element, hash key, or
//! object member.
//!
//! An [`Lvalue`] is a path, not a value — `list[i]` captures "the i'th slot
//! of *this* list variable", not a copy of what's currently there. Walking
//! that path to mutate it is where copy-on-write actually happens: a write
//! through a list-index lvalue calls [`Value::ensure_unique_list`] on every
//! container along the path before touching the target slot, so a shared
//! list is copied once, at the point of mutation, rather than eagerly
//! whenever it's merely read or passed around.

use crate::hash::OrderedHash;
use crate::object::ObjectInner;
use crate::regexval::RegexSubst;
use crate::strings::RuneString;
use crate::thread_state::with_current;
use crate::value::Value;
use rune_core::sink::{ErrorRecord, ErrorSink};
use std::sync::Arc;

pub enum Lvalue {
    Local(String),
    ListIndex(Box<Lvalue>, i64),
    HashKey(Box<Lvalue>, String),
    Member(Arc<ObjectInner>, String),
    /// A member-access lvalue whose base didn't evaluate to an `Object`
    /// (`obj.field = …` where `obj` isn't an object). The type-mismatch
    /// error is raised once, at the point this is constructed in
    /// `crate::eval::resolve_lvalue`; every operation against it is then a
    /// pure no-op so the error doesn't get raised twice and nothing is
    /// corrupted, matching the "type mismatches raise but do not corrupt
    /// the lvalue" rule the list/string lvalue operators already follow.
    Invalid,
}

impl Lvalue {
    /// Read the current value without requiring uniqueness — a plain read
    /// never needs to copy anything.
    pub fn get(&self, sink: &mut ErrorSink) -> Value {
        match self {
            Lvalue::Local(name) => with_current(|state| state.get_local(name)).unwrap_or(Value::Nothing),
            Lvalue::ListIndex(base, i) => match base.get(sink) {
                Value::List(list) => crate::list::index(&list, *i),
                _ => Value::Nothing,
            },
            Lvalue::HashKey(base, key) => match base.get(sink) {
                Value::Hash(hash) => hash.get(key).cloned().unwrap_or(Value::Nothing),
                _ => Value::Nothing,
            },
            Lvalue::Member(obj, name) => obj.get_member(name, sink),
            Lvalue::Invalid => Value::Nothing,
        }
    }

    /// Assign `value` through this path, copy-on-writing any shared
    /// container along the way. Whatever value previously occupied the slot
    /// is released through [`Value::deref`] rather than an ordinary Rust
    /// drop, so an `Object` whose last reference is overwritten here still
    /// gets its user-visible destructor run (spec §3's "final reference
    /// drops while the object is still valid" lifecycle rule applies just
    /// as much to overwrite as to falling out of scope).
    pub fn assign(&self, value: Value, sink: &mut ErrorSink) {
        match self {
            Lvalue::Local(name) => {
                let old = with_current(|state| state.get_local(name));
                with_current(|state| state.set_local(name, value));
                if let Some(old) = old {
                    old.deref(sink);
                }
            }
            Lvalue::ListIndex(base, i) => {
                let mut container = base.get(sink);
                if let Value::List(_) = &container {
                    let vec = Value::ensure_unique_list(&mut container);
                    let idx = *i;
                    let mut replaced = None;
                    if idx >= 0 {
                        let idx = idx as usize;
                        if idx >= vec.len() {
                            vec.resize(idx + 1, Value::Nothing);
                        } else {
                            replaced = Some(vec[idx].clone());
                        }
                        vec[idx] = value;
                    }
                    // Negative index assignment is out of range by the same
                    // rule as negative-index reads (see `crate::list`).
                    base.assign(container, sink);
                    if let Some(old) = replaced {
                        old.deref(sink);
                    }
                } else {
                    sink.raise(ErrorRecord::new("RUNTIME-TYPE-ERROR", "cannot index-assign a non-list value"));
                }
            }
            Lvalue::HashKey(base, key) => {
                let mut container = base.get(sink);
                if let Value::Hash(_) = &container {
                    let hash = Value::ensure_unique_hash(&mut container);
                    let replaced = hash.insert(key.clone(), value);
                    base.assign(container, sink);
                    if let Some(old) = replaced {
                        old.deref(sink);
                    }
                } else {
                    sink.raise(ErrorRecord::new("RUNTIME-TYPE-ERROR", "cannot key-assign a non-hash value"));
                }
            }
            Lvalue::Member(obj, name) => obj.set_member(name, value, sink),
            Lvalue::Invalid => value.deref(sink),
        }
    }

    /// Compound assignment: read, combine with `operand` via `op`, write
    /// back. This is the one place `ensure_unique` and the operator table
    /// meet — the read half never copies, the write half always might.
    pub fn compound_assign(&self, op: &str, operand: &Value, sink: &mut ErrorSink) -> Value {
        let current = self.get(sink);
        let updated = crate::operators::apply_binary(op, &current, operand, sink);
        self.assign(updated.clone(), sink);
        updated
    }

    /// Swap the current value out for `Nothing`, returning what was there.
    /// Used by operations that logically "move" a value out of a slot
    /// (e.g. list `extract`) without leaving a dangling reference behind.
    pub fn take_value(&self, sink: &mut ErrorSink) -> Value {
        let current = self.get(sink);
        self.assign(Value::Nothing, sink);
        current
    }

    /// Prefix/postfix `++`/`--`. Returns `(old, new)` so the caller can
    /// pick whichever the expression form needs; `nothing` coerces to zero
    /// first via the same rule ordinary arithmetic uses, so `++$unset`
    /// yields `1` rather than requiring a special case here.
    pub fn incdec(&self, increment: bool, sink: &mut ErrorSink) -> (Value, Value) {
        let old = self.get(sink);
        let new = if increment {
            crate::arithmetic::add(&old, &Value::Int(1))
        } else {
            crate::arithmetic::subtract(&old, &Value::Int(1))
        };
        self.assign(new.clone(), sink);
        (old, new)
    }

    /// `push`: append to a list lvalue. An unset lvalue starts a fresh
    /// single-element list, the same "nothing is the operation's identity
    /// element" pattern `+=` on an unset numeric local uses.
    pub fn list_push(&self, value: Value, sink: &mut ErrorSink) {
        let mut container = self.get(sink);
        match &container {
            Value::List(_) => {
                crate::list::push(Value::ensure_unique_list(&mut container), value);
                self.assign(container, sink);
            }
            Value::Nothing => self.assign(Value::List(Arc::new(vec![value])), sink),
            _ => sink.raise(ErrorRecord::new("RUNTIME-TYPE-ERROR", "push requires a list lvalue")),
        }
    }

    pub fn list_pop(&self, sink: &mut ErrorSink) -> Value {
        let mut container = self.get(sink);
        match &container {
            Value::List(_) => {
                let popped = crate::list::pop(Value::ensure_unique_list(&mut container));
                self.assign(container, sink);
                popped
            }
            Value::Nothing => Value::Nothing,
            _ => {
                sink.raise(ErrorRecord::new("RUNTIME-TYPE-ERROR", "pop requires a list lvalue"));
                Value::Nothing
            }
        }
    }

    pub fn list_shift(&self, sink: &mut ErrorSink) -> Value {
        let mut container = self.get(sink);
        match &container {
            Value::List(_) => {
                let shifted = crate::list::shift(Value::ensure_unique_list(&mut container));
                self.assign(container, sink);
                shifted
            }
            Value::Nothing => Value::Nothing,
            _ => {
                sink.raise(ErrorRecord::new("RUNTIME-TYPE-ERROR", "shift requires a list lvalue"));
                Value::Nothing
            }
        }
    }

    pub fn list_unshift(&self, value: Value, sink: &mut ErrorSink) {
        let mut container = self.get(sink);
        match &container {
            Value::List(_) => {
                crate::list::unshift(Value::ensure_unique_list(&mut container), value);
                self.assign(container, sink);
            }
            Value::Nothing => self.assign(Value::List(Arc::new(vec![value])), sink),
            _ => sink.raise(ErrorRecord::new("RUNTIME-TYPE-ERROR", "unshift requires a list lvalue")),
        }
    }

    /// `splice`: remove `count` elements starting at `start` (both
    /// supporting the from-the-end negative offsets documented in
    /// `crate::list`) and insert `replacement` in their place, returning the
    /// removed elements.
    pub fn list_splice(&self, start: i64, count: Option<i64>, replacement: Vec<Value>, sink: &mut ErrorSink) -> Vec<Value> {
        let mut container = self.get(sink);
        match &container {
            Value::List(_) => {
                let removed = crate::list::splice_in_place(Value::ensure_unique_list(&mut container), start, count, replacement);
                self.assign(container, sink);
                removed
            }
            _ => {
                sink.raise(ErrorRecord::new("RUNTIME-TYPE-ERROR", "splice requires a list lvalue"));
                Vec::new()
            }
        }
    }

    /// `chomp`: strip one trailing `\n` or `\r\n` from a string lvalue.
    pub fn string_chomp(&self, sink: &mut ErrorSink) {
        self.mutate_string(sink, |s| s.trim_end_matches("\r\n").trim_end_matches(['\n', '\r']).to_string());
    }

    /// `trim`: strip leading and trailing ASCII whitespace from a string
    /// lvalue.
    pub fn string_trim(&self, sink: &mut ErrorSink) {
        self.mutate_string(sink, |s| s.trim().to_string());
    }

    fn mutate_string(&self, sink: &mut ErrorSink, f: impl FnOnce(&str) -> String) {
        let container = self.get(sink);
        match &container {
            Value::Str(s) => {
                let mutated = f(&s.to_lossy_str());
                self.assign(Value::Str(RuneString::from_str(&mutated)), sink);
            }
            Value::Nothing => {}
            _ => sink.raise(ErrorRecord::new("RUNTIME-TYPE-ERROR", "chomp/trim require a string lvalue")),
        }
    }

    /// The regex-substitute lvalue operator (`=~ s/pattern/replacement/`):
    /// applies `subst` to the current string value and writes the result
    /// back, returning it.
    pub fn regex_subst_assign(&self, subst: &RegexSubst, sink: &mut ErrorSink) -> Value {
        let container = self.get(sink);
        match &container {
            Value::Str(s) => {
                let replaced = subst.apply(&s.to_lossy_str());
                let new_value = Value::Str(RuneString::from_str(&replaced));
                self.assign(new_value.clone(), sink);
                new_value
            }
            _ => {
                sink.raise(ErrorRecord::new("RUNTIME-TYPE-ERROR", "regex substitution requires a string lvalue"));
                container
            }
        }
    }
}

/// Resolve a dotted/indexed hash path against an already-evaluated base
/// hash, the same key-existence probe `exists` performs: it walks the
/// reference tree without ever constructing intermediate containers (unlike
/// `assign`, which extends lists/creates keys as it walks).
pub fn exists_in_hash(hash: &OrderedHash, path: &[&str]) -> bool {
    let Some((first, rest)) = path.split_first() else {
        return true;
    };
    match hash.get(first) {
        Some(Value::Hash(inner)) if !rest.is_empty() => exists_in_hash(inner, rest),
        Some(_) => rest.is_empty(),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::ClassDesc;
    use std::collections::HashMap;

    #[test]
    fn local_assign_and_get_round_trip() {
        let lv = Lvalue::Local("x".to_string());
        let mut sink = ErrorSink::new();
        lv.assign(Value::Int(7), &mut sink);
        assert_eq!(lv.get(&mut sink).to_int(), 7);
    }

    #[test]
    fn list_index_assign_extends_and_copies_on_write() {
        let mut sink = ErrorSink::new();
        let base = Lvalue::Local("list".to_string());
        base.assign(Value::List(Arc::new(vec![Value::Int(1)])), &mut sink);

        let original = base.get(&mut sink);
        let shared = original.clone();

        let idx_lv = Lvalue::ListIndex(Box::new(Lvalue::Local("list".to_string())), 2);
        idx_lv.assign(Value::Int(99), &mut sink);

        if let Value::List(orig_list) = shared {
            assert_eq!(orig_list.len(), 1, "original shared handle must be unaffected");
        } else {
            panic!("expected List");
        }
        let result = base.get(&mut sink);
        if let Value::List(list) = result {
            assert_eq!(list.len(), 3);
            assert_eq!(list[2].to_int(), 99);
            assert!(matches!(list[1], Value::Nothing));
        } else {
            panic!("expected List");
        }
    }

    #[test]
    fn hash_key_assign_creates_new_key() {
        let mut sink = ErrorSink::new();
        let base = Lvalue::Local("h".to_string());
        base.assign(Value::Hash(Arc::new(OrderedHash::new())), &mut sink);
        let key_lv = Lvalue::HashKey(Box::new(Lvalue::Local("h".to_string())), "name".to_string());
        key_lv.assign(Value::Int(5), &mut sink);
        assert_eq!(key_lv.get(&mut sink).to_int(), 5);
    }

    #[test]
    fn compound_assign_applies_operator_and_writes_back() {
        let mut sink = ErrorSink::new();
        let lv = Lvalue::Local("n".to_string());
        lv.assign(Value::Int(10), &mut sink);
        let result = lv.compound_assign("+", &Value::Int(5), &mut sink);
        assert_eq!(result.to_int(), 15);
        assert_eq!(lv.get(&mut sink).to_int(), 15);
    }

    #[test]
    fn take_value_leaves_nothing_behind() {
        let mut sink = ErrorSink::new();
        let lv = Lvalue::Local("t".to_string());
        lv.assign(Value::Int(3), &mut sink);
        let taken = lv.take_value(&mut sink);
        assert_eq!(taken.to_int(), 3);
        assert!(matches!(lv.get(&mut sink), Value::Nothing));
    }

    #[test]
    fn member_assign_requires_valid_object() {
        let mut sink = ErrorSink::new();
        let class = Arc::new(ClassDesc {
            name: "Thing".to_string(),
            destructor: None,
            member_gate: None,
            parent: None,
            methods: HashMap::new(),
        });
        let obj = ObjectInner::new(class);
        let lv = Lvalue::Member(obj, "field".to_string());
        lv.assign(Value::Int(1), &mut sink);
        assert_eq!(lv.get(&mut sink).to_int(), 1);
    }

    #[test]
    fn exists_in_hash_checks_nested_path_without_mutation() {
        let mut outer = OrderedHash::new();
        let mut inner = OrderedHash::new();
        inner.insert("city".to_string(), Value::Int(1));
        outer.insert("address".to_string(), Value::Hash(Arc::new(inner)));
        assert!(exists_in_hash(&outer, &["address", "city"]));
        assert!(!exists_in_hash(&outer, &["address", "zip"]));
        assert!(!exists_in_hash(&outer, &["missing"]));
    }

    #[test]
    fn prefix_increment_of_unset_local_yields_one() {
        let mut sink = ErrorSink::new();
        let lv = Lvalue::Local("counter".to_string());
        let (old, new) = lv.incdec(true, &mut sink);
        assert!(matches!(old, Value::Nothing));
        assert_eq!(new.to_int(), 1);
        assert_eq!(lv.get(&mut sink).to_int(), 1);
    }

    #[test]
    fn postfix_decrement_returns_the_old_value() {
        let mut sink = ErrorSink::new();
        let lv = Lvalue::Local("n".to_string());
        lv.assign(Value::Int(5), &mut sink);
        let (old, new) = lv.incdec(false, &mut sink);
        assert_eq!(old.to_int(), 5);
        assert_eq!(new.to_int(), 4);
    }

    #[test]
    fn push_pop_shift_unshift_mutate_through_the_lvalue_with_cow() {
        let mut sink = ErrorSink::new();
        let lv = Lvalue::Local("xs".to_string());
        lv.assign(Value::List(Arc::new(vec![Value::Int(1)])), &mut sink);
        let shared = lv.get(&mut sink);

        lv.list_push(Value::Int(2), &mut sink);
        lv.list_unshift(Value::Int(0), &mut sink);
        assert_eq!(lv.list_shift(&mut sink).to_int(), 0);
        assert_eq!(lv.list_pop(&mut sink).to_int(), 2);

        if let Value::List(original) = shared {
            assert_eq!(original.len(), 1, "the handle captured before mutation must be unaffected");
        } else {
            panic!("expected List");
        }
        if let Value::List(current) = lv.get(&mut sink) {
            assert_eq!(current.iter().map(|v| v.to_int()).collect::<Vec<_>>(), vec![1]);
        } else {
            panic!("expected List");
        }
    }

    #[test]
    fn push_on_an_unset_lvalue_starts_a_fresh_list() {
        let mut sink = ErrorSink::new();
        let lv = Lvalue::Local("fresh".to_string());
        lv.list_push(Value::Int(42), &mut sink);
        if let Value::List(l) = lv.get(&mut sink) {
            assert_eq!(l.len(), 1);
            assert_eq!(l[0].to_int(), 42);
        } else {
            panic!("expected List");
        }
    }

    #[test]
    fn splice_removes_and_replaces_a_range() {
        let mut sink = ErrorSink::new();
        let lv = Lvalue::Local("xs".to_string());
        lv.assign(Value::List(Arc::new(vec![Value::Int(1), Value::Int(2), Value::Int(3)])), &mut sink);
        let removed = lv.list_splice(1, Some(1), vec![Value::Int(9)], &mut sink);
        assert_eq!(removed.iter().map(|v| v.to_int()).collect::<Vec<_>>(), vec![2]);
        if let Value::List(current) = lv.get(&mut sink) {
            assert_eq!(current.iter().map(|v| v.to_int()).collect::<Vec<_>>(), vec![1, 9, 3]);
        } else {
            panic!("expected List");
        }
    }

    #[test]
    fn chomp_strips_a_single_trailing_newline() {
        let mut sink = ErrorSink::new();
        let lv = Lvalue::Local("line".to_string());
        lv.assign(Value::Str(RuneString::from_str("hello\r\n")), &mut sink);
        lv.string_chomp(&mut sink);
        match lv.get(&mut sink) {
            Value::Str(s) => assert_eq!(s.to_lossy_str(), "hello"),
            _ => panic!("expected Str"),
        }
    }

    #[test]
    fn trim_strips_both_ends() {
        let mut sink = ErrorSink::new();
        let lv = Lvalue::Local("padded".to_string());
        lv.assign(Value::Str(RuneString::from_str("  hi  ")), &mut sink);
        lv.string_trim(&mut sink);
        match lv.get(&mut sink) {
            Value::Str(s) => assert_eq!(s.to_lossy_str(), "hi"),
            _ => panic!("expected Str"),
        }
    }

    #[test]
    fn regex_subst_assign_rewrites_the_lvalue_and_returns_the_result() {
        use crate::regexval::RegexLiteral;

        let mut sink = ErrorSink::new();
        let lv = Lvalue::Local("s".to_string());
        lv.assign(Value::Str(RuneString::from_str("foo boo")), &mut sink);
        let subst = RegexSubst {
            matcher: RegexLiteral::compile("o", false, false, false).unwrap(),
            replacement: "0".to_string(),
            global: true,
        };
        let result = lv.regex_subst_assign(&subst, &mut sink);
        match result {
            Value::Str(s) => assert_eq!(s.to_lossy_str(), "f00 b00"),
            _ => panic!("expected Str"),
        }
        match lv.get(&mut sink) {
            Value::Str(s) => assert_eq!(s.to_lossy_str(), "f00 b00"),
            _ => panic!("expected Str"),
        }
    }

    #[test]
    fn overwriting_a_local_holding_the_last_object_reference_runs_its_destructor() {
        use crate::callable::CallRefInner;
        use crate::eval::FunctionDef;
        use std::sync::atomic::{AtomicBool, Ordering};

        let ran = Arc::new(AtomicBool::new(false));
        let ran_in_destructor = ran.clone();
        let destructor_def = Arc::new(FunctionDef::native("destructor", move |_args, _sink| {
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
        let lv = Lvalue::Local("r".to_string());
        lv.assign(Value::Object(obj), &mut sink);
        assert!(!ran.load(Ordering::SeqCst));
        lv.assign(Value::Int(0), &mut sink);
        assert!(ran.load(Ordering::SeqCst), "overwriting the sole reference must run the destructor");
    }

    #[test]
    fn overwriting_a_list_slot_holding_the_last_object_reference_runs_its_destructor() {
        use crate::callable::CallRefInner;
        use crate::eval::FunctionDef;
        use std::sync::atomic::{AtomicBool, Ordering};

        let ran = Arc::new(AtomicBool::new(false));
        let ran_in_destructor = ran.clone();
        let destructor_def = Arc::new(FunctionDef::native("destructor", move |_args, _sink| {
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
        let base = Lvalue::Local("xs".to_string());
        base.assign(Value::List(Arc::new(vec![Value::Object(obj)])), &mut sink);
        let idx_lv = Lvalue::ListIndex(Box::new(Lvalue::Local("xs".to_string())), 0);
        idx_lv.assign(Value::Int(0), &mut sink);
        assert!(ran.load(Ordering::SeqCst), "overwriting the list slot must run the destructor");
    }

    #[test]
    fn push_on_a_non_list_raises_type_error_without_corrupting_the_lvalue() {
        let mut sink = ErrorSink::new();
        let lv = Lvalue::Local("n".to_string());
        lv.assign(Value::Int(5), &mut sink);
        lv.list_push(Value::Int(1), &mut sink);
        assert!(sink.has_error());
        assert_eq!(lv.get(&mut sink).to_int(), 5, "the lvalue must still hold its original value");
    }
}
