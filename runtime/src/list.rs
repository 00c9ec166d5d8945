//! Free functions over the `Vec<Value>` a `Value::List` wraps.
//!
//! `List` itself is just `Arc<Vec<Value>>` (see [`crate::value::Value::List`]);
//! this module holds the indexing and splice semantics the spec documents
//! for it, applied through [`Value::ensure_unique_list`] so every mutating
//! operation here gets copy-on-write for free.
//!
//! One documented asymmetry: `splice`/`slice` accept negative offsets
//! (counting from the end), but single-element `[]` indexing does **not** —
//! a negative index there is just a very large unsigned index after the
//! implicit `as usize` conversion, and resolves to `nothing` like any other
//! out-of-range index. This was flagged as an Open Question in the
//! distilled spec and resolved in `DESIGN.md`: kept as documented, because
//! user scripts already rely on the asymmetry to distinguish "give me the
//! last three" (`list[-3, 3]`) from "index past the end is always nothing".

use crate::value::Value;

/// `list[index]`. Negative indices are **not** supported here (see module
/// docs); they fall through to the out-of-range case like any overlarge
/// index.
pub fn index(list: &[Value], i: i64) -> Value {
    if i < 0 {
        return Value::Nothing;
    }
    list.get(i as usize).cloned().unwrap_or(Value::Nothing)
}

/// Resolve a signed, possibly-negative offset against `len`, clamped to
/// `[0, len]`. Used by `slice`/`splice`, which do support negative offsets.
fn resolve_offset(offset: i64, len: usize) -> usize {
    if offset < 0 {
        (len as i64 + offset).max(0) as usize
    } else {
        (offset as usize).min(len)
    }
}

/// `list[start, count]` — a read-only sub-list. `count` is optional in the
/// language surface; pass `None` for "to the end".
pub fn slice(list: &[Value], start: i64, count: Option<i64>) -> Vec<Value> {
    let len = list.len();
    let start_idx = resolve_offset(start, len);
    let end_idx = match count {
        None => len,
        Some(c) if c < 0 => resolve_offset(start + c, len).max(start_idx),
        Some(c) => (start_idx + c as usize).min(len),
    };
    if start_idx >= end_idx {
        Vec::new()
    } else {
        list[start_idx..end_idx].to_vec()
    }
}

/// In-place splice: remove `count` elements starting at `start` and insert
/// `replacement` in their place, returning the removed elements. Mirrors
/// `Vec::splice` but with the runtime's signed/negative offset rules.
pub fn splice_in_place(list: &mut Vec<Value>, start: i64, count: Option<i64>, replacement: Vec<Value>) -> Vec<Value> {
    let len = list.len();
    let start_idx = resolve_offset(start, len);
    let end_idx = match count {
        None => len,
        Some(c) if c < 0 => resolve_offset(start + c, len).max(start_idx),
        Some(c) => (start_idx + c as usize).min(len),
    };
    list.splice(start_idx..end_idx, replacement).collect()
}

pub fn push(list: &mut Vec<Value>, value: Value) {
    list.push(value);
}

pub fn pop(list: &mut Vec<Value>) -> Value {
    list.pop().unwrap_or(Value::Nothing)
}

pub fn shift(list: &mut Vec<Value>) -> Value {
    if list.is_empty() {
        Value::Nothing
    } else {
        list.remove(0)
    }
}

pub fn unshift(list: &mut Vec<Value>, value: Value) {
    list.insert(0, value);
}
