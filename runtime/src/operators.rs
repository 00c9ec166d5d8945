//! The operator table: per-operator metadata plus type-pair dispatch.
//!
//! Every operator is described once, declaratively, by an [`OperatorDesc`]:
//! its arity, whether its operands need to be evaluated before the operator
//! runs (`&&`/`||`/`?:` do not evaluate their right-hand operands
//! unconditionally — they short-circuit), whether applying it can have a
//! side effect (assignment operators do; `+` does not), and whether its
//! left operand must be an lvalue (compound assignment does; plain `+`
//! does not). [`crate::eval`] consults this table before it consults the
//! arithmetic kernels, so adding an operator is "describe it here, implement
//! its kernel in `crate::arithmetic`" rather than threading a new special
//! case through the evaluator's dispatch loop.

use crate::value::Value;
use rune_core::sink::ErrorSink;
use std::collections::HashMap;
use std::sync::OnceLock;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Arity {
    Unary,
    Binary,
    Ternary,
}

/// Declarative metadata for one operator. `evaluates_args` is false for the
/// short-circuiting operators, which the evaluator must consult before
/// evaluating either operand; every other flag informs static checks
/// (requires-lvalue) or evaluation-order guarantees (has-side-effects)
/// rather than changing argument-evaluation behavior itself.
#[derive(Clone, Copy, Debug)]
pub struct OperatorDesc {
    pub symbol: &'static str,
    pub arity: Arity,
    pub evaluates_args: bool,
    pub has_side_effects: bool,
    pub requires_lvalue: bool,
}

const BINARY_ARITHMETIC: &[&str] = &["+", "-", "*", "/", "%", "&", "|", "^", "<<", ">>"];
const BINARY_COMPARISON: &[&str] = &["<", "<=", ">", ">=", "==", "!=", "<=>"];
const BINARY_LOGICAL_SHORT_CIRCUIT: &[&str] = &["&&", "||"];
const COMPOUND_ASSIGN: &[&str] = &["=", "+=", "-=", "*=", "/=", "%=", "||=", "&&=", "&=", "|=", "^=", "<<=", ">>="];

fn build_table() -> HashMap<&'static str, OperatorDesc> {
    let mut table = HashMap::new();
    for &sym in BINARY_ARITHMETIC {
        table.insert(
            sym,
            OperatorDesc {
                symbol: sym,
                arity: Arity::Binary,
                evaluates_args: true,
                has_side_effects: false,
                requires_lvalue: false,
            },
        );
    }
    for &sym in BINARY_COMPARISON {
        table.insert(
            sym,
            OperatorDesc {
                symbol: sym,
                arity: Arity::Binary,
                evaluates_args: true,
                has_side_effects: false,
                requires_lvalue: false,
            },
        );
    }
    for &sym in BINARY_LOGICAL_SHORT_CIRCUIT {
        table.insert(
            sym,
            OperatorDesc {
                symbol: sym,
                arity: Arity::Binary,
                evaluates_args: false,
                has_side_effects: false,
                requires_lvalue: false,
            },
        );
    }
    for &sym in COMPOUND_ASSIGN {
        table.insert(
            sym,
            OperatorDesc {
                symbol: sym,
                arity: Arity::Binary,
                evaluates_args: true,
                has_side_effects: true,
                requires_lvalue: true,
            },
        );
    }
    table.insert(
        "?:",
        OperatorDesc {
            symbol: "?:",
            arity: Arity::Ternary,
            evaluates_args: false,
            has_side_effects: false,
            requires_lvalue: false,
        },
    );
    table.insert(
        "!",
        OperatorDesc {
            symbol: "!",
            arity: Arity::Unary,
            evaluates_args: true,
            has_side_effects: false,
            requires_lvalue: false,
        },
    );
    table.insert(
        "-",
        OperatorDesc {
            symbol: "-",
            arity: Arity::Unary,
            evaluates_args: true,
            has_side_effects: false,
            requires_lvalue: false,
        },
    );
    table
}

static TABLE: OnceLock<HashMap<&'static str, OperatorDesc>> = OnceLock::new();

pub fn describe(symbol: &str) -> Option<OperatorDesc> {
    TABLE.get_or_init(build_table).get(symbol).copied()
}

/// Apply a non-short-circuiting binary arithmetic/comparison operator to
/// already-evaluated operands. Short-circuiting operators (`&&`, `||`,
/// `?:`) and assignment are handled directly in `crate::eval`, since they
/// need control over *whether* the second operand is evaluated at all,
/// which this function's signature (both operands already `Value`s)
/// structurally cannot express.
pub fn apply_binary(symbol: &str, left: &Value, right: &Value, sink: &mut ErrorSink) -> Value {
    match symbol {
        "+" => crate::arithmetic::add(left, right),
        "-" => crate::arithmetic::subtract(left, right),
        "*" => crate::arithmetic::multiply(left, right),
        "/" => match crate::arithmetic::divide(left, right) {
            Ok(v) => v,
            Err(e) => {
                sink.raise(e);
                Value::Nothing
            }
        },
        "%" => match crate::arithmetic::modulo(left, right) {
            Ok(v) => v,
            Err(e) => {
                sink.raise(e);
                Value::Nothing
            }
        },
        "&" => crate::arithmetic::bitand(left, right),
        "|" => crate::arithmetic::bitor(left, right),
        "^" => crate::arithmetic::bitxor(left, right),
        "<<" => crate::arithmetic::shl(left, right),
        ">>" => crate::arithmetic::shr(left, right),
        "==" => Value::Bool(left.is_equal_soft(right, sink)),
        "!=" => Value::Bool(!left.is_equal_soft(right, sink)),
        "<" => Value::Bool(crate::arithmetic::compare(left, right).is_lt()),
        "<=" => Value::Bool(crate::arithmetic::compare(left, right).is_le()),
        ">" => Value::Bool(crate::arithmetic::compare(left, right).is_gt()),
        ">=" => Value::Bool(crate::arithmetic::compare(left, right).is_ge()),
        "<=>" => Value::Int(match crate::arithmetic::compare(left, right) {
            std::cmp::Ordering::Less => -1,
            std::cmp::Ordering::Equal => 0,
            std::cmp::Ordering::Greater => 1,
        }),
        _ => Value::Nothing,
    }
}

pub fn apply_unary(symbol: &str, operand: &Value) -> Value {
    match symbol {
        "!" => Value::Bool(!operand.to_bool()),
        "-" => crate::arithmetic::negate(operand),
        _ => Value::Nothing,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_circuit_operators_are_flagged_as_not_evaluating_args() {
        let desc = describe("&&").unwrap();
        assert!(!desc.evaluates_args);
        let desc = describe("||").unwrap();
        assert!(!desc.evaluates_args);
    }

    #[test]
    fn compound_assignment_requires_lvalue_and_has_side_effects() {
        let desc = describe("+=").unwrap();
        assert!(desc.requires_lvalue);
        assert!(desc.has_side_effects);
    }

    #[test]
    fn plain_arithmetic_is_pure_and_evaluates_both_operands() {
        let desc = describe("+").unwrap();
        assert!(desc.evaluates_args);
        assert!(!desc.has_side_effects);
        assert!(!desc.requires_lvalue);
    }

    #[test]
    fn unknown_symbol_returns_none() {
        assert!(describe("~~~").is_none());
    }

    #[test]
    fn apply_binary_dispatches_arithmetic() {
        let mut sink = ErrorSink::new();
        let result = apply_binary("+", &Value::Int(2), &Value::Int(3), &mut sink);
        assert_eq!(result.to_int(), 5);
        assert!(sink.is_empty());
    }

    #[test]
    fn bitwise_compound_assign_symbols_are_in_the_table() {
        for sym in ["&=", "|=", "^=", "<<=", ">>="] {
            let desc = describe(sym).unwrap_or_else(|| panic!("missing {}", sym));
            assert!(desc.requires_lvalue);
        }
    }

    #[test]
    fn apply_binary_dispatches_bitwise_operators() {
        let mut sink = ErrorSink::new();
        assert_eq!(apply_binary("&", &Value::Int(0b110), &Value::Int(0b011), &mut sink).to_int(), 0b010);
        assert_eq!(apply_binary("<<", &Value::Int(1), &Value::Int(3), &mut sink).to_int(), 8);
    }

    #[test]
    fn apply_binary_division_by_zero_raises_into_sink() {
        let mut sink = ErrorSink::new();
        let result = apply_binary("/", &Value::Int(1), &Value::Int(0), &mut sink);
        assert!(matches!(result, Value::Nothing));
        assert!(sink.has_error());
    }
}
