//! The tree-walking expression evaluator.
//!
//! [`Expr`] is the parsed syntax tree; [`Value`] (see [`crate::value`]) is
//! already-evaluated data. They are deliberately two distinct Rust types
//! rather than one shared "node" enum — see `DESIGN.md` for why — and
//! [`EvalNode`] is the thin wrapper that actually carries the documented
//! `needs_eval()` contract: an `EvalNode::Done(Value)` is already data,
//! an `EvalNode::Pending(Expr)` still needs [`eval`] to run.
//!
//! [`eval`] is the general entry point; [`bool_eval`], [`integer_eval`], and
//! [`float_eval`] are fast paths used where the caller only needs a
//! primitive result (a branch condition, a loop bound) and evaluating
//! straight to that primitive avoids allocating an intermediate `Value` for
//! operand chains that are already numeric/boolean end to end.

use crate::callable::{CallTarget, CallRefInner, ClosureInner};
use crate::list;
use crate::lvalue::Lvalue;
use crate::thread_state::with_current;
use crate::value::Value;
use rune_core::sink::{ErrorRecord, ErrorSink};
use std::sync::Arc;

#[derive(Clone)]
pub enum Expr {
    Literal(Value),
    LocalRef(String),
    Unary { op: &'static str, operand: Box<Expr> },
    Binary { op: &'static str, lhs: Box<Expr>, rhs: Box<Expr> },
    LogicalAnd(Box<Expr>, Box<Expr>),
    LogicalOr(Box<Expr>, Box<Expr>),
    Ternary { cond: Box<Expr>, then_branch: Box<Expr>, else_branch: Box<Expr> },
    Assign { target: LvalueExpr, value: Box<Expr> },
    CompoundAssign { op: &'static str, target: LvalueExpr, value: Box<Expr> },
    Index { base: Box<Expr>, index: Box<Expr> },
    HashGet { base: Box<Expr>, key: String },
    /// `object.key`: a plain member read. Routes through the class's
    /// member-gate method when the member isn't declared, same as
    /// [`crate::object::ObjectInner::get_member`] already does; a non-object
    /// base just reads as `nothing`, matching `HashGet`'s non-hash base.
    MemberGet { base: Box<Expr>, name: String },
    /// `object.method(args)`: looks up `method` on the object's class
    /// (walking ancestry) and invokes it with the object bound as the
    /// implicit receiver.
    MethodCall { base: Box<Expr>, method: String, args: Vec<Expr> },
    /// `object.callable_member(args)`: `member` names a data member (not a
    /// declared method) that holds a callable reference or closure; invoke
    /// that value directly rather than looking it up on the class.
    CallableMemberCall { base: Box<Expr>, member: String, args: Vec<Expr> },
    ListLiteral(Vec<Expr>),
    Block(Vec<Expr>),
    If { cond: Box<Expr>, then_branch: Box<Expr>, else_branch: Option<Box<Expr>> },
    Call { callee: Box<Expr>, args: Vec<Expr> },
    Map { list: Box<Expr>, func: Box<Expr> },
    FoldL { list: Box<Expr>, func: Box<Expr>, init: Box<Expr> },
    FoldR { list: Box<Expr>, func: Box<Expr>, init: Box<Expr> },
    Select { list: Box<Expr>, predicate: Box<Expr> },
    InstanceOf { value: Box<Expr>, class_name: String },
    Exists { base: Box<Expr> },
    /// `++`/`--`, prefix or postfix, against an lvalue.
    IncDec { target: LvalueExpr, prefix: bool, increment: bool },
    /// The list-mutation lvalue operators: `push`/`pop`/`shift`/`unshift`
    /// mutate `target` in place; `splice` additionally removes/replaces a
    /// range and returns what it removed.
    ListOp { target: LvalueExpr, kind: ListOpKind, args: Vec<Expr> },
    /// `chomp`/`trim` against a string lvalue, mutating it in place.
    StringOp { target: LvalueExpr, kind: StringOpKind },
    /// `=~ s/pattern/replacement/`: applies a compiled substitution to the
    /// string lvalue and writes the result back.
    RegexSubstAssign { target: LvalueExpr, subst: Arc<crate::regexval::RegexSubst> },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ListOpKind {
    Push,
    Pop,
    Shift,
    Unshift,
    Splice,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StringOpKind {
    Chomp,
    Trim,
}

/// An lvalue as it appears in the syntax tree, resolved to a
/// [`crate::lvalue::Lvalue`] path right before use (not eagerly, since the
/// base expression for an indexed/keyed lvalue must itself be evaluated
/// once, not once per read-modify-write step).
#[derive(Clone)]
pub enum LvalueExpr {
    Local(String),
    Index { base: Box<LvalueExpr>, index: Box<Expr> },
    HashKey { base: Box<LvalueExpr>, key: String },
    /// `object.key` as an assignment target. `base` resolves to the
    /// object's own lvalue path so `obj.a.b = …` works the same way
    /// `HashKey`'s nested base does; the object itself is never
    /// copy-on-write (see `crate::object`), so once `base` yields a
    /// `Value::Object` the member write goes straight through
    /// `ObjectInner::set_member` rather than any COW helper.
    Member { base: Box<LvalueExpr>, name: String },
}

fn resolve_lvalue(expr: &LvalueExpr, sink: &mut ErrorSink) -> Lvalue {
    match expr {
        LvalueExpr::Local(name) => Lvalue::Local(name.clone()),
        LvalueExpr::Index { base, index } => {
            let i = integer_eval(index, sink);
            Lvalue::ListIndex(Box::new(resolve_lvalue(base, sink)), i)
        }
        LvalueExpr::HashKey { base, key } => Lvalue::HashKey(Box::new(resolve_lvalue(base, sink)), key.clone()),
        LvalueExpr::Member { base, name } => {
            let base_lvalue = resolve_lvalue(base, sink);
            match base_lvalue.get(sink) {
                Value::Object(obj) => Lvalue::Member(obj, name.clone()),
                _ => {
                    sink.raise(ErrorRecord::new("RUNTIME-TYPE-ERROR", "cannot member-assign a non-object value"));
                    Lvalue::Invalid
                }
            }
        }
    }
}

/// Either already-evaluated data or a pending expression. This is the type
/// `needs_eval()` is meaningfully asked of; a bare [`Value`] always answers
/// `false` (see [`Value::needs_eval`]).
pub enum EvalNode {
    Done(Value),
    Pending(Expr),
}

impl EvalNode {
    pub fn needs_eval(&self) -> bool {
        matches!(self, EvalNode::Pending(_))
    }

    pub fn resolve(self, sink: &mut ErrorSink) -> Value {
        match self {
            EvalNode::Done(v) => v,
            EvalNode::Pending(e) => eval(&e, sink),
        }
    }
}

pub fn eval(expr: &Expr, sink: &mut ErrorSink) -> Value {
    match expr {
        Expr::Literal(v) => v.clone(),
        Expr::LocalRef(name) => with_current(|state| state.get_local(name)).unwrap_or(Value::Nothing),
        Expr::Unary { op, operand } => {
            let v = eval(operand, sink);
            crate::operators::apply_unary(op, &v)
        }
        Expr::Binary { op, lhs, rhs } => {
            let l = eval(lhs, sink);
            let r = eval(rhs, sink);
            crate::operators::apply_binary(op, &l, &r, sink)
        }
        Expr::LogicalAnd(lhs, rhs) => {
            let l = eval(lhs, sink);
            if !l.to_bool() {
                Value::Bool(false)
            } else {
                Value::Bool(eval(rhs, sink).to_bool())
            }
        }
        Expr::LogicalOr(lhs, rhs) => {
            let l = eval(lhs, sink);
            if l.to_bool() {
                Value::Bool(true)
            } else {
                Value::Bool(eval(rhs, sink).to_bool())
            }
        }
        Expr::Ternary { cond, then_branch, else_branch } => {
            if bool_eval(cond, sink) {
                eval(then_branch, sink)
            } else {
                eval(else_branch, sink)
            }
        }
        Expr::Assign { target, value } => {
            let v = eval(value, sink);
            let lv = resolve_lvalue(target, sink);
            lv.assign(v.clone(), sink);
            v
        }
        Expr::CompoundAssign { op, target, value } => {
            let v = eval(value, sink);
            let lv = resolve_lvalue(target, sink);
            lv.compound_assign(op, &v, sink)
        }
        Expr::Index { base, index } => {
            let b = eval(base, sink);
            let i = integer_eval(index, sink);
            match b {
                Value::List(l) => list::index(&l, i),
                _ => Value::Nothing,
            }
        }
        Expr::HashGet { base, key } => {
            let b = eval(base, sink);
            match b {
                Value::Hash(h) => h.get(key).cloned().unwrap_or(Value::Nothing),
                _ => Value::Nothing,
            }
        }
        Expr::MemberGet { base, name } => {
            let b = eval(base, sink);
            match b {
                Value::Object(obj) => obj.get_member(name, sink),
                _ => Value::Nothing,
            }
        }
        Expr::MethodCall { base, method, args } => {
            let b = eval(base, sink);
            match b {
                Value::Object(obj) => {
                    let arg_values: Vec<Value> = args.iter().map(|a| eval(a, sink)).collect();
                    match obj.class.find_method(method) {
                        // The receiver is bound two ways at once: as
                        // `implicit_self` (the `receiver` parameter, which
                        // an interpreted body's params array never sees
                        // directly) and as `args[0]` (so a method defined
                        // `fn name(self, ...)` — native or interpreted —
                        // can bind it the same way a plain positional
                        // parameter would), matching the convention
                        // `call_destructor` already uses for passing a
                        // receiver to a plain callable value.
                        Some(def) => {
                            let mut full_args = Vec::with_capacity(arg_values.len() + 1);
                            full_args.push(Value::Object(obj.clone()));
                            full_args.extend(arg_values);
                            call_function(&def, &full_args, Some(Value::Object(obj)), sink)
                        }
                        // No declared method by that name: fall back to a
                        // data member of the same name (routing through the
                        // member-gate if it's undeclared, same as
                        // `MemberGet`) and invoke it if it turns out to hold
                        // something callable.
                        None => {
                            let member = obj.get_member(method, sink);
                            call_value(&member, &arg_values, sink)
                        }
                    }
                }
                _ => Value::Nothing,
            }
        }
        Expr::CallableMemberCall { base, member, args } => {
            let b = eval(base, sink);
            match b {
                Value::Object(obj) => {
                    let callable = obj.get_member(member, sink);
                    let arg_values: Vec<Value> = args.iter().map(|a| eval(a, sink)).collect();
                    call_value(&callable, &arg_values, sink)
                }
                _ => Value::Nothing,
            }
        }
        Expr::ListLiteral(items) => {
            let values: Vec<Value> = items.iter().map(|e| eval(e, sink)).collect();
            Value::List(Arc::new(values))
        }
        Expr::Block(items) => {
            let mut last = Value::Nothing;
            for item in items {
                last = eval(item, sink);
                if sink.has_error() || sink.thread_exit_requested() {
                    break;
                }
            }
            last
        }
        Expr::If { cond, then_branch, else_branch } => {
            if bool_eval(cond, sink) {
                eval(then_branch, sink)
            } else if let Some(e) = else_branch {
                eval(e, sink)
            } else {
                Value::Nothing
            }
        }
        Expr::Call { callee, args } => {
            let target = eval(callee, sink);
            let arg_values: Vec<Value> = args.iter().map(|a| eval(a, sink)).collect();
            call_value(&target, &arg_values, sink)
        }
        Expr::Map { list, func } => {
            let l = eval(list, sink);
            let f = eval(func, sink);
            match l {
                Value::List(items) => {
                    let mapped: Vec<Value> = items.iter().map(|item| call_value(&f, &[item.clone()], sink)).collect();
                    Value::List(Arc::new(mapped))
                }
                _ => Value::Nothing,
            }
        }
        Expr::FoldL { list, func, init } => {
            let l = eval(list, sink);
            let f = eval(func, sink);
            let mut acc = eval(init, sink);
            if let Value::List(items) = l {
                for item in items.iter() {
                    acc = call_value(&f, &[acc, item.clone()], sink);
                }
            }
            acc
        }
        Expr::FoldR { list, func, init } => {
            let l = eval(list, sink);
            let f = eval(func, sink);
            let mut acc = eval(init, sink);
            if let Value::List(items) = l {
                for item in items.iter().rev() {
                    acc = call_value(&f, &[item.clone(), acc], sink);
                }
            }
            acc
        }
        Expr::Select { list, predicate } => {
            let l = eval(list, sink);
            let p = eval(predicate, sink);
            match l {
                Value::List(items) => {
                    let filtered: Vec<Value> = items
                        .iter()
                        .filter(|item| call_value(&p, &[(*item).clone()], sink).to_bool())
                        .cloned()
                        .collect();
                    Value::List(Arc::new(filtered))
                }
                _ => Value::Nothing,
            }
        }
        Expr::InstanceOf { value, class_name } => {
            let v = eval(value, sink);
            Value::Bool(match v {
                Value::Object(obj) => obj.class.is_or_inherits(class_name),
                _ => false,
            })
        }
        Expr::Exists { base } => Value::Bool(probe_exists(base, sink)),
        Expr::IncDec { target, prefix, increment } => {
            let lv = resolve_lvalue(target, sink);
            let (old, new) = lv.incdec(*increment, sink);
            if *prefix {
                new
            } else {
                old
            }
        }
        Expr::ListOp { target, kind, args } => {
            let lv = resolve_lvalue(target, sink);
            match kind {
                ListOpKind::Push => {
                    let v = eval(&args[0], sink);
                    lv.list_push(v, sink);
                    lv.get(sink)
                }
                ListOpKind::Pop => lv.list_pop(sink),
                ListOpKind::Shift => lv.list_shift(sink),
                ListOpKind::Unshift => {
                    let v = eval(&args[0], sink);
                    lv.list_unshift(v, sink);
                    lv.get(sink)
                }
                ListOpKind::Splice => {
                    let start = integer_eval(&args[0], sink);
                    let count = args.get(1).map(|e| integer_eval(e, sink));
                    let replacement: Vec<Value> = args.iter().skip(2).map(|e| eval(e, sink)).collect();
                    let removed = lv.list_splice(start, count, replacement, sink);
                    Value::List(Arc::new(removed))
                }
            }
        }
        Expr::StringOp { target, kind } => {
            let lv = resolve_lvalue(target, sink);
            match kind {
                StringOpKind::Chomp => lv.string_chomp(sink),
                StringOpKind::Trim => lv.string_trim(sink),
            }
            lv.get(sink)
        }
        Expr::RegexSubstAssign { target, subst } => {
            let lv = resolve_lvalue(target, sink);
            lv.regex_subst_assign(subst, sink)
        }
    }
}

/// `exists`: probes whether a reference-tree path resolves to something
/// other than `nothing`, without raising for a missing intermediate step
/// (an ordinary eval of `a.b.c` where `a.b` is `nothing` would itself just
/// produce `nothing`, so `exists` is really just "does this evaluate to
/// something other than nothing", not a distinct non-throwing code path —
/// the distinction documented in the spec is that indexing/member-access
/// expressions never raise for a missing key/index in the first place).
fn probe_exists(expr: &Expr, sink: &mut ErrorSink) -> bool {
    !matches!(eval(expr, sink), Value::Nothing)
}

pub fn bool_eval(expr: &Expr, sink: &mut ErrorSink) -> bool {
    match expr {
        Expr::LogicalAnd(lhs, rhs) => bool_eval(lhs, sink) && bool_eval(rhs, sink),
        Expr::LogicalOr(lhs, rhs) => bool_eval(lhs, sink) || bool_eval(rhs, sink),
        Expr::Unary { op, operand } if *op == "!" => !bool_eval(operand, sink),
        _ => eval(expr, sink).to_bool(),
    }
}

pub fn integer_eval(expr: &Expr, sink: &mut ErrorSink) -> i64 {
    match expr {
        Expr::Binary { op, lhs, rhs } if matches!(*op, "+" | "-" | "*") => {
            let l = integer_eval(lhs, sink);
            let r = integer_eval(rhs, sink);
            match *op {
                "+" => l.wrapping_add(r),
                "-" => l.wrapping_sub(r),
                "*" => l.wrapping_mul(r),
                _ => unreachable!(),
            }
        }
        _ => eval(expr, sink).to_int(),
    }
}

pub fn float_eval(expr: &Expr, sink: &mut ErrorSink) -> f64 {
    eval(expr, sink).to_float()
}

/// A user-defined or native function's identity and body.
pub enum FunctionBody {
    Native(Arc<dyn Fn(&[Value], &mut ErrorSink) -> Value + Send + Sync>),
    Interpreted { params: Vec<String>, body: Arc<Expr> },
}

pub struct FunctionDef {
    pub name: String,
    pub body: FunctionBody,
}

impl FunctionDef {
    pub fn native(name: impl Into<String>, f: impl Fn(&[Value], &mut ErrorSink) -> Value + Send + Sync + 'static) -> Self {
        Self {
            name: name.into(),
            body: FunctionBody::Native(Arc::new(f)),
        }
    }

    pub fn interpreted(name: impl Into<String>, params: Vec<String>, body: Expr) -> Self {
        Self {
            name: name.into(),
            body: FunctionBody::Interpreted { params, body: Arc::new(body) },
        }
    }
}

/// Invoke a [`FunctionDef`] with positional arguments, pushing a fresh
/// local-variable frame for interpreted bodies and binding `self` for
/// method dispatch. Native bodies run directly against `args` with no frame
/// of their own, matching the fast native-builtin path the teacher's
/// operator dispatch uses (no interpreted-frame overhead for primitives
/// like arithmetic or string builtins).
pub fn call_function(def: &FunctionDef, args: &[Value], receiver: Option<Value>, sink: &mut ErrorSink) -> Value {
    match &def.body {
        FunctionBody::Native(f) => f(args, sink),
        FunctionBody::Interpreted { params, body } => {
            with_current(|state| {
                state.push_frame();
                state.implicit_self = receiver.clone();
                for (i, param) in params.iter().enumerate() {
                    state.set_local(param, args.get(i).cloned().unwrap_or(Value::Nothing));
                }
            });
            let result = eval(body, sink);
            with_current(|state| state.pop_frame());
            result
        }
    }
}

/// Invoke anything callable: a `Closure`, a `CallRef`, or (rarely) a plain
/// value that turns out not to be callable, which is a no-op returning
/// `nothing` rather than a raised error, matching the documented stance
/// that calling a non-callable is a caller-side static error the parser
/// would already have rejected, not a runtime condition.
pub fn call_value(target: &Value, args: &[Value], sink: &mut ErrorSink) -> Value {
    match target {
        Value::Closure(closure) => call_closure(closure, args, sink),
        Value::CallRef(callref) => call_callref(callref, args, sink),
        _ => Value::Nothing,
    }
}

fn call_closure(closure: &Arc<ClosureInner>, args: &[Value], sink: &mut ErrorSink) -> Value {
    with_current(|state| {
        state.push_frame();
        for (name, cell) in &closure.captures {
            state.set_local(name, cell.lock().expect("closure capture lock poisoned").clone());
        }
    });
    let result = call_function(&closure.def, args, None, sink);
    // Write any locals the body assigned back to their captured cells so
    // mutation through the closure is visible to the capturing scope.
    with_current(|state| {
        for (name, cell) in &closure.captures {
            if let Some(v) = state.get_local(name) {
                *cell.lock().expect("closure capture lock poisoned") = v;
            }
        }
        state.pop_frame();
    });
    result
}

fn call_callref(callref: &Arc<CallRefInner>, args: &[Value], sink: &mut ErrorSink) -> Value {
    match &callref.target {
        CallTarget::Function(def) => call_function(def, args, None, sink),
        CallTarget::Method { def, receiver } => call_function(def, args, Some(receiver.clone()), sink),
        CallTarget::StaticMethod(def) => call_function(def, args, None, sink),
    }
}

/// Run a class's destructor against `receiver` (an `Object` whose last
/// reference just went away, or one the `delete` operator targeted
/// directly). This is the call-machinery half of
/// [`crate::object::ObjectInner::run_destructor_if_needed`], kept here
/// because invoking a `Value::Closure`/`Value::CallRef` is eval's job.
pub fn call_destructor(destructor: &Value, receiver: Value, sink: &mut ErrorSink) {
    call_value(destructor, &[receiver], sink);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::OrderedHash;
    use std::collections::HashMap;

    fn lit(v: Value) -> Expr {
        Expr::Literal(v)
    }

    #[test]
    fn logical_and_short_circuits_without_evaluating_rhs() {
        let mut sink = ErrorSink::new();
        let rhs = Expr::Assign {
            target: LvalueExpr::Local("touched".to_string()),
            value: Box::new(lit(Value::Bool(true))),
        };
        let expr = Expr::LogicalAnd(Box::new(lit(Value::Bool(false))), Box::new(rhs));
        let result = eval(&expr, &mut sink);
        assert!(!result.to_bool());
        assert!(with_current(|s| s.get_local("touched")).is_none());
    }

    #[test]
    fn logical_or_short_circuits_without_evaluating_rhs() {
        let mut sink = ErrorSink::new();
        let rhs = Expr::Assign {
            target: LvalueExpr::Local("touched2".to_string()),
            value: Box::new(lit(Value::Bool(true))),
        };
        let expr = Expr::LogicalOr(Box::new(lit(Value::Bool(true))), Box::new(rhs));
        eval(&expr, &mut sink);
        assert!(with_current(|s| s.get_local("touched2")).is_none());
    }

    #[test]
    fn ternary_evaluates_only_the_taken_branch() {
        let mut sink = ErrorSink::new();
        let expr = Expr::Ternary {
            cond: Box::new(lit(Value::Bool(true))),
            then_branch: Box::new(lit(Value::Int(1))),
            else_branch: Box::new(lit(Value::Int(2))),
        };
        assert_eq!(eval(&expr, &mut sink).to_int(), 1);
    }

    #[test]
    fn map_applies_closure_free_native_function_to_each_element() {
        let mut sink = ErrorSink::new();
        let def = Arc::new(FunctionDef::native("double", |args, _sink| Value::Int(args[0].to_int() * 2)));
        let callref = Value::CallRef(CallRefInner::function(def));
        let list_expr = Expr::ListLiteral(vec![lit(Value::Int(1)), lit(Value::Int(2)), lit(Value::Int(3))]);
        let expr = Expr::Map {
            list: Box::new(list_expr),
            func: Box::new(lit(callref)),
        };
        let result = eval(&expr, &mut sink);
        if let Value::List(items) = result {
            assert_eq!(items.iter().map(|v| v.to_int()).collect::<Vec<_>>(), vec![2, 4, 6]);
        } else {
            panic!("expected List");
        }
    }

    #[test]
    fn foldl_accumulates_left_to_right() {
        let mut sink = ErrorSink::new();
        let def = Arc::new(FunctionDef::native("sub", |args, _sink| Value::Int(args[0].to_int() - args[1].to_int())));
        let callref = Value::CallRef(CallRefInner::function(def));
        let list_expr = Expr::ListLiteral(vec![lit(Value::Int(1)), lit(Value::Int(2)), lit(Value::Int(3))]);
        let expr = Expr::FoldL {
            list: Box::new(list_expr),
            func: Box::new(lit(callref)),
            init: Box::new(lit(Value::Int(10))),
        };
        // ((10 - 1) - 2) - 3 = 4
        assert_eq!(eval(&expr, &mut sink).to_int(), 4);
    }

    #[test]
    fn select_filters_by_predicate() {
        let mut sink = ErrorSink::new();
        let def = Arc::new(FunctionDef::native("even", |args, _sink| Value::Bool(args[0].to_int() % 2 == 0)));
        let callref = Value::CallRef(CallRefInner::function(def));
        let list_expr = Expr::ListLiteral(vec![lit(Value::Int(1)), lit(Value::Int(2)), lit(Value::Int(3)), lit(Value::Int(4))]);
        let expr = Expr::Select {
            list: Box::new(list_expr),
            predicate: Box::new(lit(callref)),
        };
        let result = eval(&expr, &mut sink);
        if let Value::List(items) = result {
            assert_eq!(items.iter().map(|v| v.to_int()).collect::<Vec<_>>(), vec![2, 4]);
        } else {
            panic!("expected List");
        }
    }

    #[test]
    fn exists_is_true_for_anything_but_nothing() {
        let mut sink = ErrorSink::new();
        assert!(probe_exists(&lit(Value::Int(0)), &mut sink));
        assert!(!probe_exists(&lit(Value::Nothing), &mut sink));
    }

    #[test]
    fn hash_get_of_missing_key_is_nothing_not_an_error() {
        let mut sink = ErrorSink::new();
        let h = Value::Hash(Arc::new(OrderedHash::new()));
        let expr = Expr::HashGet {
            base: Box::new(lit(h)),
            key: "missing".to_string(),
        };
        assert!(matches!(eval(&expr, &mut sink), Value::Nothing));
        assert!(sink.is_empty());
    }

    #[test]
    fn prefix_increment_returns_the_new_value() {
        let mut sink = ErrorSink::new();
        with_current(|s| s.set_local("n", Value::Int(9)));
        let expr = Expr::IncDec {
            target: LvalueExpr::Local("n".to_string()),
            prefix: true,
            increment: true,
        };
        assert_eq!(eval(&expr, &mut sink).to_int(), 10);
        assert_eq!(with_current(|s| s.get_local("n")).unwrap().to_int(), 10);
    }

    #[test]
    fn postfix_decrement_returns_the_old_value_but_still_mutates() {
        let mut sink = ErrorSink::new();
        with_current(|s| s.set_local("n", Value::Int(9)));
        let expr = Expr::IncDec {
            target: LvalueExpr::Local("n".to_string()),
            prefix: false,
            increment: false,
        };
        assert_eq!(eval(&expr, &mut sink).to_int(), 9);
        assert_eq!(with_current(|s| s.get_local("n")).unwrap().to_int(), 8);
    }

    #[test]
    fn push_then_pop_round_trips_through_list_op_exprs() {
        let mut sink = ErrorSink::new();
        with_current(|s| s.set_local("xs", Value::List(Arc::new(vec![Value::Int(1)]))));
        let push_expr = Expr::ListOp {
            target: LvalueExpr::Local("xs".to_string()),
            kind: ListOpKind::Push,
            args: vec![lit(Value::Int(2))],
        };
        eval(&push_expr, &mut sink);
        let pop_expr = Expr::ListOp {
            target: LvalueExpr::Local("xs".to_string()),
            kind: ListOpKind::Pop,
            args: vec![],
        };
        assert_eq!(eval(&pop_expr, &mut sink).to_int(), 2);
        if let Value::List(remaining) = with_current(|s| s.get_local("xs")).unwrap() {
            assert_eq!(remaining.len(), 1);
        } else {
            panic!("expected List");
        }
    }

    #[test]
    fn chomp_expr_strips_trailing_newline_through_the_lvalue() {
        use crate::strings::RuneString;

        let mut sink = ErrorSink::new();
        with_current(|s| s.set_local("line", Value::Str(RuneString::from_str("hi\n"))));
        let expr = Expr::StringOp {
            target: LvalueExpr::Local("line".to_string()),
            kind: StringOpKind::Chomp,
        };
        let result = eval(&expr, &mut sink);
        match result {
            Value::Str(s) => assert_eq!(s.to_lossy_str(), "hi"),
            _ => panic!("expected Str"),
        }
    }

    #[test]
    fn regex_subst_assign_expr_rewrites_the_lvalue() {
        use crate::regexval::{RegexLiteral, RegexSubst};
        use crate::strings::RuneString;

        let mut sink = ErrorSink::new();
        with_current(|s| s.set_local("s", Value::Str(RuneString::from_str("foo"))));
        let subst = Arc::new(RegexSubst {
            matcher: RegexLiteral::compile("o", false, false, false).unwrap(),
            replacement: "0".to_string(),
            global: true,
        });
        let expr = Expr::RegexSubstAssign {
            target: LvalueExpr::Local("s".to_string()),
            subst,
        };
        let result = eval(&expr, &mut sink);
        match result {
            Value::Str(s) => assert_eq!(s.to_lossy_str(), "f00"),
            _ => panic!("expected Str"),
        }
    }

    #[test]
    fn instanceof_walks_the_class_ancestry_not_just_the_exact_class() {
        use crate::object::{ClassDesc, ObjectInner};

        let shape = Arc::new(ClassDesc {
            name: "Shape".to_string(),
            destructor: None,
            member_gate: None,
            parent: None,
            methods: HashMap::new(),
        });
        let circle = Arc::new(ClassDesc {
            name: "Circle".to_string(),
            destructor: None,
            member_gate: None,
            parent: Some(shape),
            methods: HashMap::new(),
        });
        let mut sink = ErrorSink::new();
        let obj = Value::Object(ObjectInner::new(circle));
        let expr = Expr::InstanceOf {
            value: Box::new(lit(obj.clone())),
            class_name: "Shape".to_string(),
        };
        assert!(eval(&expr, &mut sink).to_bool());
        let exact = Expr::InstanceOf {
            value: Box::new(lit(obj.clone())),
            class_name: "Circle".to_string(),
        };
        assert!(eval(&exact, &mut sink).to_bool());
        let unrelated = Expr::InstanceOf {
            value: Box::new(lit(obj)),
            class_name: "Square".to_string(),
        };
        assert!(!eval(&unrelated, &mut sink).to_bool());
    }

    #[test]
    fn member_get_and_member_assign_round_trip_through_the_real_object() {
        use crate::object::{ClassDesc, ObjectInner};

        let class = Arc::new(ClassDesc {
            name: "Point".to_string(),
            destructor: None,
            member_gate: None,
            parent: None,
            methods: HashMap::new(),
        });
        let obj = Value::Object(ObjectInner::new(class));
        with_current(|s| s.set_local("p", obj));

        let assign = Expr::Assign {
            target: LvalueExpr::Member {
                base: Box::new(LvalueExpr::Local("p".to_string())),
                name: "x".to_string(),
            },
            value: Box::new(lit(Value::Int(3))),
        };
        let mut sink = ErrorSink::new();
        eval(&assign, &mut sink);
        assert!(sink.is_empty());

        let read = Expr::MemberGet {
            base: Box::new(Expr::LocalRef("p".to_string())),
            name: "x".to_string(),
        };
        assert_eq!(eval(&read, &mut sink).to_int(), 3);
    }

    #[test]
    fn member_get_on_a_non_object_base_reads_as_nothing_without_raising() {
        with_current(|s| s.set_local("n", Value::Int(5)));
        let read = Expr::MemberGet {
            base: Box::new(Expr::LocalRef("n".to_string())),
            name: "x".to_string(),
        };
        let mut sink = ErrorSink::new();
        assert!(matches!(eval(&read, &mut sink), Value::Nothing));
        assert!(sink.is_empty());
    }

    #[test]
    fn member_assign_on_a_non_object_base_raises_type_error_without_corrupting_the_base() {
        with_current(|s| s.set_local("n", Value::Int(5)));
        let assign = Expr::Assign {
            target: LvalueExpr::Member {
                base: Box::new(LvalueExpr::Local("n".to_string())),
                name: "x".to_string(),
            },
            value: Box::new(lit(Value::Int(1))),
        };
        let mut sink = ErrorSink::new();
        eval(&assign, &mut sink);
        assert!(sink.has_error());
        assert_eq!(sink.errors()[0].code, "RUNTIME-TYPE-ERROR");
        assert_eq!(with_current(|s| s.get_local("n")).unwrap().to_int(), 5);
    }

    #[test]
    fn method_call_looks_up_the_method_on_the_class_and_binds_the_receiver() {
        use crate::object::{ClassDesc, ObjectInner};

        let double_member = Arc::new(FunctionDef::native("double_member", |args, sink| {
            // args[0] is the bound receiver; args[1] is the caller-supplied argument.
            match &args[0] {
                Value::Object(obj) => crate::arithmetic::add(&obj.get_member("n", sink), &args[1]),
                _ => Value::Nothing,
            }
        }));
        let mut methods = HashMap::new();
        methods.insert("add_to_n".to_string(), double_member);
        let class = Arc::new(ClassDesc {
            name: "Counter".to_string(),
            destructor: None,
            member_gate: None,
            parent: None,
            methods,
        });
        let obj = ObjectInner::new(class);
        let mut sink = ErrorSink::new();
        obj.set_member("n", Value::Int(10), &mut sink);

        let call = Expr::MethodCall {
            base: Box::new(lit(Value::Object(obj))),
            method: "add_to_n".to_string(),
            args: vec![lit(Value::Int(5))],
        };
        assert_eq!(eval(&call, &mut sink).to_int(), 15);
        assert!(sink.is_empty());
    }

    #[test]
    fn method_call_with_no_matching_method_falls_back_to_an_invocable_member() {
        use crate::object::{ClassDesc, ObjectInner};

        let class = Arc::new(ClassDesc {
            name: "Dispatcher".to_string(),
            destructor: None,
            member_gate: None,
            parent: None,
            methods: HashMap::new(),
        });
        let obj = ObjectInner::new(class);
        let mut sink = ErrorSink::new();
        let callback = Arc::new(FunctionDef::native("callback", |args, _sink| Value::Int(args[0].to_int() * 2)));
        obj.set_member("on_tick", Value::CallRef(CallRefInner::function(callback)), &mut sink);

        let call = Expr::CallableMemberCall {
            base: Box::new(lit(Value::Object(obj))),
            member: "on_tick".to_string(),
            args: vec![lit(Value::Int(21))],
        };
        assert_eq!(eval(&call, &mut sink).to_int(), 42);
        assert!(sink.is_empty());
    }

    #[test]
    fn compound_assign_through_index_copies_on_write() {
        let mut sink = ErrorSink::new();
        with_current(|s| s.set_local("xs", Value::List(Arc::new(vec![Value::Int(1), Value::Int(2)]))));
        let target = LvalueExpr::Index {
            base: Box::new(LvalueExpr::Local("xs".to_string())),
            index: Box::new(lit(Value::Int(0))),
        };
        let expr = Expr::CompoundAssign {
            op: "+",
            target,
            value: Box::new(lit(Value::Int(100))),
        };
        let result = eval(&expr, &mut sink);
        assert_eq!(result.to_int(), 101);
    }
}
