//! Insertion-order-preserving string-keyed hash container.
//!
//! A `Hash` value remembers the order keys were first inserted in (iteration
//! and `keys()` both respect it), unlike a plain `HashMap`. That requires
//! tracking order alongside the map rather than relying on iteration order
//! of any standard collection, so `OrderedHash` keeps both a `HashMap` for
//! O(1) lookup and a `Vec<String>` for insertion order, the same two-
//! structure trick `CallStack`'s frame list plus any lookup index would use
//! if frame lookup by name were ever needed.
//!
//! Like `List`, a `Hash` is copy-on-write: cloning it is an `Arc` bump, and
//! `Value::ensure_unique_hash` is the mutation entry point that clones the
//! whole structure only when it is shared.

use crate::value::Value;
use std::collections::HashMap;

#[derive(Clone, Debug, Default)]
pub struct OrderedHash {
    index: HashMap<String, usize>,
    order: Vec<String>,
    values: Vec<Value>,
}

impl OrderedHash {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.index.get(key).map(|&i| &self.values[i])
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    /// Insert or overwrite. New keys are appended at the end of iteration
    /// order; overwriting an existing key keeps its original position.
    pub fn insert(&mut self, key: String, value: Value) -> Option<Value> {
        if let Some(&i) = self.index.get(&key) {
            Some(std::mem::replace(&mut self.values[i], value))
        } else {
            let i = self.order.len();
            self.index.insert(key.clone(), i);
            self.order.push(key);
            self.values.push(value);
            None
        }
    }

    /// Remove a key. Shifts every later entry's position down by one to
    /// keep `index` and `order` consistent, so this is O(n) like the
    /// underlying containers it mirrors elsewhere in the runtime.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        let i = self.index.remove(key)?;
        self.order.remove(i);
        let removed = self.values.remove(i);
        for idx in self.index.values_mut() {
            if *idx > i {
                *idx -= 1;
            }
        }
        Some(removed)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(|s| s.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.order.iter().map(move |k| (k.as_str(), self.get(k).unwrap()))
    }

    pub fn first_key(&self) -> Option<&str> {
        self.order.first().map(|s| s.as_str())
    }

    pub fn is_equal_hard(&self, other: &OrderedHash) -> bool {
        self.len() == other.len()
            && self.order == other.order
            && self
                .order
                .iter()
                .all(|k| self.get(k).unwrap().is_equal_hard(other.get(k).unwrap()))
    }

    pub fn is_equal_soft(&self, other: &OrderedHash, sink: &mut rune_core::sink::ErrorSink) -> bool {
        if self.len() != other.len() {
            return false;
        }
        self.order.iter().all(|k| match other.get(k) {
            Some(v) => self.get(k).unwrap().is_equal_soft(v, sink),
            None => false,
        })
    }
}
