// ABOUTME: Expression-level bytecode VM, compiled on demand and cached by stable node id

use crate::ast::{BinaryOp, Expr, NodeId, UnaryOp};
use crate::env::Environment;
use crate::error::{EvalError, Pos};
use crate::interpreter::Interp;
use crate::value::{ObjectKind, Value};
use indexmap::IndexMap;
use std::rc::Rc;

#[derive(Debug, Clone)]
pub enum Op {
    PushInt(i64),
    PushStr(Rc<str>),
    PushBool(bool),
    PushNull,
    LoadName(Rc<str>),
    ArrayMake(usize),
    ArrayComp(Rc<Expr>),
    ObjectNew,
    ObjectSetKey(Rc<str>),
    IndexGet,
    DotGet(Rc<str>),
    Neg,
    Not,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Neq,
    And,
    Or,
    Coalesce,
    Lt,
    Gt,
    Le,
    Ge,
    Call(usize),
}

#[derive(Debug, Clone)]
pub struct Chunk {
    pub ops: Vec<(Op, Pos)>,
}

/// Every construct in the expression grammar compiles to a chunk, so
/// `--vm-strict` and the default fallback-to-tree-walker mode currently
/// behave identically; the distinction is kept so future opcodes can be
/// added incrementally without changing the calling convention.
pub fn compile(expr: &Expr) -> Chunk {
    let mut ops = Vec::new();
    compile_into(expr, &mut ops);
    Chunk { ops }
}

fn compile_into(expr: &Expr, ops: &mut Vec<(Op, Pos)>) {
    let pos = expr.pos();
    match expr {
        Expr::Int(n, _, _) => ops.push((Op::PushInt(*n), pos)),
        Expr::Str(s, _, _) => ops.push((Op::PushStr(Rc::from(s.as_str())), pos)),
        Expr::Bool(b, _, _) => ops.push((Op::PushBool(*b), pos)),
        Expr::Null(_, _) => ops.push((Op::PushNull, pos)),
        Expr::Ident(name, _, _) => ops.push((Op::LoadName(Rc::from(name.as_str())), pos)),
        Expr::Array(items, _, _) => {
            for item in items {
                compile_into(item, ops);
            }
            ops.push((Op::ArrayMake(items.len()), pos));
        }
        Expr::ArrayComprehension { .. } => {
            ops.push((Op::ArrayComp(Rc::new(expr.clone())), pos));
        }
        Expr::Object(entries, _, _) => {
            ops.push((Op::ObjectNew, pos));
            for (key, value) in entries {
                compile_into(value, ops);
                ops.push((Op::ObjectSetKey(Rc::from(key.as_str())), pos));
            }
        }
        Expr::Index(base, idx, _, _) => {
            compile_into(base, ops);
            compile_into(idx, ops);
            ops.push((Op::IndexGet, pos));
        }
        Expr::Member(base, field, _, _) => {
            compile_into(base, ops);
            ops.push((Op::DotGet(Rc::from(field.as_str())), pos));
        }
        Expr::Unary(op, operand, _, _) => {
            compile_into(operand, ops);
            ops.push((
                match op {
                    UnaryOp::Neg => Op::Neg,
                    UnaryOp::Not => Op::Not,
                },
                pos,
            ));
        }
        Expr::Binary(op, lhs, rhs, _, _) => {
            compile_into(lhs, ops);
            compile_into(rhs, ops);
            ops.push((
                match op {
                    BinaryOp::Add => Op::Add,
                    BinaryOp::Sub => Op::Sub,
                    BinaryOp::Mul => Op::Mul,
                    BinaryOp::Div => Op::Div,
                    BinaryOp::Mod => Op::Mod,
                    BinaryOp::Eq => Op::Eq,
                    BinaryOp::Neq => Op::Neq,
                    BinaryOp::Lt => Op::Lt,
                    BinaryOp::Gt => Op::Gt,
                    BinaryOp::Le => Op::Le,
                    BinaryOp::Ge => Op::Ge,
                    BinaryOp::And => Op::And,
                    BinaryOp::Or => Op::Or,
                    BinaryOp::Coalesce => Op::Coalesce,
                },
                pos,
            ));
        }
        Expr::Call(callee, args, _, _) => {
            compile_into(callee, ops);
            for arg in args {
                compile_into(arg, ops);
            }
            ops.push((Op::Call(args.len()), pos));
        }
    }
}

pub fn run(chunk: &Chunk, interp: &Interp, env: &Rc<Environment>) -> Result<Value, EvalError> {
    let mut stack: Vec<Value> = Vec::new();
    for (op, pos) in &chunk.ops {
        let pos = *pos;
        match op {
            Op::PushInt(n) => stack.push(Value::Int(*n)),
            Op::PushStr(s) => stack.push(Value::String(s.clone())),
            Op::PushBool(b) => stack.push(Value::Bool(*b)),
            Op::PushNull => stack.push(Value::Null),
            Op::LoadName(name) => stack.push(env.lookup(name, pos)?),
            Op::ArrayMake(n) => {
                let start = stack.len() - n;
                let items = stack.split_off(start);
                stack.push(Value::array(items));
            }
            Op::ArrayComp(expr) => {
                // Must bypass VM dispatch: this node's own cached chunk is
                // this very Op::ArrayComp instruction, so calling back into
                // eval_expr would recompile/re-run the same op forever.
                stack.push(interp.eval_expr_tree(expr, env)?);
            }
            Op::ObjectNew => stack.push(Value::object(IndexMap::new(), ObjectKind::Plain)),
            Op::ObjectSetKey(key) => {
                let value = stack.pop().unwrap();
                let obj = stack.last().unwrap();
                if let Value::Object(fields, _) = obj {
                    fields.borrow_mut().insert(key.to_string(), value);
                } else {
                    return Err(EvalError::runtime("object-set-key on non-object", pos));
                }
            }
            Op::IndexGet => {
                let index = stack.pop().unwrap();
                let base = stack.pop().unwrap();
                stack.push(crate::interpreter::index_get(&base, &index, pos)?);
            }
            Op::DotGet(field) => {
                let base = stack.pop().unwrap();
                stack.push(crate::interpreter::member_get(&base, field, pos)?);
            }
            Op::Neg => {
                let v = stack.pop().unwrap();
                stack.push(crate::interpreter::eval_neg(&v, pos)?);
            }
            Op::Not => {
                let v = stack.pop().unwrap();
                stack.push(Value::Bool(!v.is_truthy()));
            }
            Op::Add | Op::Sub | Op::Mul | Op::Div | Op::Mod | Op::Eq | Op::Neq | Op::Lt
            | Op::Gt | Op::Le | Op::Ge => {
                let rhs = stack.pop().unwrap();
                let lhs = stack.pop().unwrap();
                let bop = match op {
                    Op::Add => BinaryOp::Add,
                    Op::Sub => BinaryOp::Sub,
                    Op::Mul => BinaryOp::Mul,
                    Op::Div => BinaryOp::Div,
                    Op::Mod => BinaryOp::Mod,
                    Op::Eq => BinaryOp::Eq,
                    Op::Neq => BinaryOp::Neq,
                    Op::Lt => BinaryOp::Lt,
                    Op::Gt => BinaryOp::Gt,
                    Op::Le => BinaryOp::Le,
                    Op::Ge => BinaryOp::Ge,
                    _ => unreachable!(),
                };
                stack.push(crate::interpreter::eval_binary_strict(bop, &lhs, &rhs, pos)?);
            }
            // And/Or/Coalesce are evaluated eagerly here (both operands are
            // already on the stack by the time this op runs), trading away
            // short-circuit evaluation for a flat, jump-free opcode stream.
            Op::And => {
                let rhs = stack.pop().unwrap();
                let lhs = stack.pop().unwrap();
                stack.push(if !lhs.is_truthy() { lhs } else { rhs });
            }
            Op::Or => {
                let rhs = stack.pop().unwrap();
                let lhs = stack.pop().unwrap();
                stack.push(if lhs.is_truthy() { lhs } else { rhs });
            }
            Op::Coalesce => {
                let rhs = stack.pop().unwrap();
                let lhs = stack.pop().unwrap();
                stack.push(if matches!(lhs, Value::Null) { rhs } else { lhs });
            }
            Op::Call(n) => {
                let start = stack.len() - n;
                let args = stack.split_off(start);
                let callee = stack.pop().unwrap();
                stack.push(interp.call_value(&callee, args, pos)?);
            }
        }
    }
    Ok(stack.pop().unwrap_or(Value::Null))
}

/// Whether short-circuit evaluation actually matters for this expression,
/// i.e. one operand has an observable side effect. Used only to decide
/// whether `--vm-strict` callers should be warned; evaluation semantics
/// are unaffected.
pub fn has_side_effecting_operand(expr: &Expr) -> bool {
    fn has_call(e: &Expr) -> bool {
        match e {
            Expr::Call(..) => true,
            Expr::Binary(_, l, r, _, _) => has_call(l) || has_call(r),
            Expr::Unary(_, v, _, _) => has_call(v),
            Expr::Index(b, i, _, _) => has_call(b) || has_call(i),
            Expr::Member(b, _, _, _) => has_call(b),
            _ => false,
        }
    }
    matches!(
        expr,
        Expr::Binary(BinaryOp::And | BinaryOp::Or | BinaryOp::Coalesce, l, r, _, _)
            if has_call(l) || has_call(r)
    )
}

pub type ChunkCache = std::collections::HashMap<NodeId, Rc<Chunk>>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DebugConfig, Quotas};
    use crate::parser::parse_program;

    fn eval_vm_expr(src: &str) -> Value {
        let block = parse_program(src).unwrap();
        let expr = match &block.stmts[0] {
            crate::ast::Stmt::ExprStmt(e, _) => e,
            _ => panic!("expected expr stmt"),
        };
        let chunk = compile(expr);
        let interp = Interp::new(Quotas::default(), DebugConfig::default(), crate::interpreter::VmMode::On, vec![], Rc::from("main.nx"));
        let env = Environment::new();
        run(&chunk, &interp, &env).unwrap()
    }

    #[test]
    fn compiles_arithmetic() {
        assert!(matches!(eval_vm_expr("1 + 2 * 3;"), Value::Int(7)));
    }

    #[test]
    fn compiles_array_and_index() {
        assert!(matches!(eval_vm_expr("[1, 2, 3][1];"), Value::Int(2)));
    }

    #[test]
    fn compiles_object_literal() {
        let v = eval_vm_expr("{a: 1, b: 2}.a;");
        assert!(matches!(v, Value::Int(1)));
    }
}
