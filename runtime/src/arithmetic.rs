//! Numeric, string, and date arithmetic semantics.
//!
//! These are the per-operator kernels [`crate::operators`] dispatches into
//! once it has picked a `(left-type, right-type)` pair. Division and modulo
//! are the only operators that can themselves raise: by zero on either
//! side, regardless of type, raises `DIVISION-BY-ZERO` rather than
//! producing an infinity/NaN the way raw IEEE float division would.

use crate::date::RelativeDate;
use crate::hash::OrderedHash;
use crate::strings::RuneString;
use crate::value::Value;
use rune_core::sink::ErrorRecord;
use std::sync::Arc;

fn division_by_zero(op: &str) -> ErrorRecord {
    ErrorRecord::new("DIVISION-BY-ZERO", format!("{} by zero", op))
}

/// `nothing`/`null` coerce to a numeric zero of the other operand's own
/// type before arithmetic runs, per the "all coercions of `nothing` to a
/// primitive yield that primitive's zero value" rule — this is what makes
/// `++$v` on an unset `$v` yield `1` rather than requiring a special case in
/// the increment operator itself.
fn zero_like(other: &Value) -> Value {
    match other {
        Value::Float(_) => Value::Float(0.0),
        _ => Value::Int(0),
    }
}

pub fn add(a: &Value, b: &Value) -> Value {
    match (a, b) {
        (Value::Nothing | Value::Null, other) => add(&zero_like(other), other),
        (value, Value::Nothing | Value::Null) => add(value, &zero_like(value)),
        (Value::Int(x), Value::Int(y)) => Value::Int(x.wrapping_add(*y)),
        (Value::Float(x), Value::Float(y)) => Value::Float(x + y),
        (Value::Int(x), Value::Float(y)) | (Value::Float(y), Value::Int(x)) => Value::Float(*x as f64 + y),
        (Value::Str(x), Value::Str(y)) => Value::Str(x.concat(y)),
        (Value::Str(x), other) => Value::Str(x.concat(&RuneString::from_str(&other.to_lossy_display()))),
        (Value::List(x), Value::List(y)) => {
            let mut out = (**x).clone();
            out.extend((**y).iter().cloned());
            Value::List(std::sync::Arc::new(out))
        }
        // list + scalar appends the scalar; scalar + list prepends it, per
        // spec §4.1 ("list + value appends") and op_plus_list's two
        // non-list-operand branches.
        (Value::List(x), other) => {
            let mut out = (**x).clone();
            out.push(other.clone());
            Value::List(std::sync::Arc::new(out))
        }
        (other, Value::List(y)) => {
            let mut out = Vec::with_capacity(y.len() + 1);
            out.push(other.clone());
            out.extend((**y).iter().cloned());
            Value::List(std::sync::Arc::new(out))
        }
        (Value::Date(x), Value::Date(y)) if y.is_relative() => {
            if let crate::date::DateValue::Relative(r) = y {
                Value::Date(x.add_relative(r))
            } else {
                unreachable!()
            }
        }
        (Value::Hash(x), Value::Hash(y)) => {
            let mut out = (**x).clone();
            for key in y.keys() {
                out.insert(key.clone(), y.get(key).cloned().unwrap_or(Value::Nothing));
            }
            Value::Hash(Arc::new(out))
        }
        _ => Value::Nothing,
    }
}

pub fn subtract(a: &Value, b: &Value) -> Value {
    match (a, b) {
        (Value::Nothing | Value::Null, other) if matches!(other, Value::Int(_) | Value::Float(_)) => subtract(&zero_like(other), other),
        (value, Value::Nothing | Value::Null) if matches!(value, Value::Int(_) | Value::Float(_)) => subtract(value, &zero_like(value)),
        (Value::Int(x), Value::Int(y)) => Value::Int(x.wrapping_sub(*y)),
        (Value::Float(x), Value::Float(y)) => Value::Float(x - y),
        (Value::Int(x), Value::Float(y)) => Value::Float(*x as f64 - y),
        (Value::Float(x), Value::Int(y)) => Value::Float(x - *y as f64),
        (Value::Date(x), Value::Date(y)) if y.is_relative() => {
            if let crate::date::DateValue::Relative(r) = y {
                Value::Date(x.add_relative(&RelativeDate {
                    years: -r.years,
                    months: -r.months,
                    days: -r.days,
                    seconds: -r.seconds,
                    micros: -r.micros,
                }))
            } else {
                unreachable!()
            }
        }
        (Value::Date(x), Value::Date(y)) => {
            Value::Date(crate::date::DateValue::Relative(RelativeDate::from_seconds(x.to_epoch_seconds() - y.to_epoch_seconds())))
        }
        (Value::Hash(a), b) => hash_remove(a, b),
        _ => Value::Nothing,
    }
}

/// `hash - string` removes that key; `hash - list` removes every key named
/// in the list. Not a general binary op on two hashes (that's merge, which
/// is `+`) — removal is always keyed off the right operand's own shape.
fn hash_remove(a: &OrderedHash, b: &Value) -> Value {
    let mut out = a.clone();
    match b {
        Value::Str(s) => {
            out.remove(&s.to_lossy_str());
        }
        Value::List(items) => {
            for item in items.iter() {
                if let Value::Str(s) = item {
                    out.remove(&s.to_lossy_str());
                }
            }
        }
        _ => {}
    }
    Value::Hash(Arc::new(out))
}

pub fn multiply(a: &Value, b: &Value) -> Value {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => Value::Int(x.wrapping_mul(*y)),
        (Value::Float(x), Value::Float(y)) => Value::Float(x * y),
        (Value::Int(x), Value::Float(y)) | (Value::Float(y), Value::Int(x)) => Value::Float(*x as f64 * y),
        _ => Value::Nothing,
    }
}

pub fn divide(a: &Value, b: &Value) -> Result<Value, ErrorRecord> {
    match (a, b) {
        (Value::Int(_), Value::Int(0)) => Err(division_by_zero("integer division")),
        (Value::Int(x), Value::Int(y)) => Ok(Value::Int(x / y)),
        (Value::Float(_), Value::Float(y)) if *y == 0.0 => Err(division_by_zero("float division")),
        (Value::Float(x), Value::Float(y)) => Ok(Value::Float(x / y)),
        (Value::Int(x), Value::Float(y)) => {
            if *y == 0.0 {
                Err(division_by_zero("float division"))
            } else {
                Ok(Value::Float(*x as f64 / y))
            }
        }
        (Value::Float(x), Value::Int(y)) => {
            if *y == 0 {
                Err(division_by_zero("float division"))
            } else {
                Ok(Value::Float(x / *y as f64))
            }
        }
        _ => Ok(Value::Nothing),
    }
}

pub fn modulo(a: &Value, b: &Value) -> Result<Value, ErrorRecord> {
    match (a, b) {
        (Value::Int(_), Value::Int(0)) => Err(division_by_zero("modulo")),
        (Value::Int(x), Value::Int(y)) => Ok(Value::Int(x % y)),
        (Value::Float(_), Value::Float(y)) if *y == 0.0 => Err(division_by_zero("modulo")),
        (Value::Float(x), Value::Float(y)) => Ok(Value::Float(x % y)),
        _ => Ok(Value::Nothing),
    }
}

/// Bitwise operators only make sense against integers; anything else
/// coerces through `to_int` the same way the interpreted-language operators
/// this runtime implements coerce mismatched operands rather than raising
/// for them (unlike division/modulo, which do raise on a zero divisor).
pub fn bitand(a: &Value, b: &Value) -> Value {
    Value::Int(a.to_int() & b.to_int())
}

pub fn bitor(a: &Value, b: &Value) -> Value {
    Value::Int(a.to_int() | b.to_int())
}

pub fn bitxor(a: &Value, b: &Value) -> Value {
    Value::Int(a.to_int() ^ b.to_int())
}

/// Shift counts outside `0..64` would panic the native `<<`/`>>` operators,
/// so they're masked to the low 6 bits first, matching how a 64-bit shift
/// instruction treats an out-of-range count in practice rather than raising
/// an error for it.
pub fn shl(a: &Value, b: &Value) -> Value {
    Value::Int(a.to_int().wrapping_shl(b.to_int() as u32 & 63))
}

pub fn shr(a: &Value, b: &Value) -> Value {
    Value::Int(a.to_int().wrapping_shr(b.to_int() as u32 & 63))
}

pub fn negate(a: &Value) -> Value {
    match a {
        Value::Int(x) => Value::Int(x.wrapping_neg()),
        Value::Float(x) => Value::Float(-x),
        _ => Value::Int(0),
    }
}

pub fn compare(a: &Value, b: &Value) -> std::cmp::Ordering {
    use std::cmp::Ordering;
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => x.cmp(y),
        (Value::Float(x), Value::Float(y)) => x.partial_cmp(y).unwrap_or(Ordering::Equal),
        (Value::Int(x), Value::Float(y)) => (*x as f64).partial_cmp(y).unwrap_or(Ordering::Equal),
        (Value::Float(x), Value::Int(y)) => x.partial_cmp(&(*y as f64)).unwrap_or(Ordering::Equal),
        (Value::Str(x), Value::Str(y)) => x.to_lossy_str().cmp(&y.to_lossy_str()),
        (Value::Date(x), Value::Date(y)) => x.to_epoch_seconds().cmp(&y.to_epoch_seconds()),
        _ => Ordering::Equal,
    }
}

impl Value {
    fn to_lossy_display(&self) -> String {
        match self {
            Value::Nothing => String::new(),
            Value::Null => String::new(),
            Value::Int(n) => n.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Str(s) => s.to_lossy_str().into_owned(),
            Value::Date(d) => d.to_string(),
            _ => format!("<{}>", self.type_name()),
        }
    }
}
