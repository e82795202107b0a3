//! Numeric built-ins: abs, min, max, clamp, sum.
//!
//! All operate on `int`s only; Nyx has no floating-point type.

use crate::env::Environment;
use crate::error::{EvalError, Pos};
use crate::interpreter::Interp;
use crate::value::{Builtin, Value};
use std::rc::Rc;

fn as_int(v: &Value, context: &str, pos: Pos) -> Result<i64, EvalError> {
    match v {
        Value::Int(n) => Ok(*n),
        other => Err(EvalError::type_error(context, "int", other, pos)),
    }
}

fn abs_fn(_: &Interp, args: &[Value], pos: Pos) -> Result<Value, EvalError> {
    Ok(Value::Int(as_int(&args[0], "abs", pos)?.abs()))
}

fn min_fn(_: &Interp, args: &[Value], pos: Pos) -> Result<Value, EvalError> {
    let a = as_int(&args[0], "min", pos)?;
    let b = as_int(&args[1], "min", pos)?;
    Ok(Value::Int(a.min(b)))
}

fn max_fn(_: &Interp, args: &[Value], pos: Pos) -> Result<Value, EvalError> {
    let a = as_int(&args[0], "max", pos)?;
    let b = as_int(&args[1], "max", pos)?;
    Ok(Value::Int(a.max(b)))
}

fn clamp_fn(_: &Interp, args: &[Value], pos: Pos) -> Result<Value, EvalError> {
    let x = as_int(&args[0], "clamp", pos)?;
    let lo = as_int(&args[1], "clamp", pos)?;
    let hi = as_int(&args[2], "clamp", pos)?;
    Ok(Value::Int(x.clamp(lo, hi)))
}

fn sum_fn(_: &Interp, args: &[Value], pos: Pos) -> Result<Value, EvalError> {
    match &args[0] {
        Value::Array(items) => {
            let mut total = 0i64;
            for item in items.borrow().iter() {
                total += as_int(item, "sum", pos)?;
            }
            Ok(Value::Int(total))
        }
        other => Err(EvalError::type_error("sum", "array", other, pos)),
    }
}

static ABS: Builtin = Builtin { name: "abs", arity: Some(1), func: abs_fn };
static MIN: Builtin = Builtin { name: "min", arity: Some(2), func: min_fn };
static MAX: Builtin = Builtin { name: "max", arity: Some(2), func: max_fn };
static CLAMP: Builtin = Builtin { name: "clamp", arity: Some(3), func: clamp_fn };
static SUM: Builtin = Builtin { name: "sum", arity: Some(1), func: sum_fn };

pub fn register(env: &Rc<Environment>) {
    env.define("abs", Value::Builtin(&ABS));
    env.define("min", Value::Builtin(&MIN));
    env.define("max", Value::Builtin(&MAX));
    env.define("clamp", Value::Builtin(&CLAMP));
    env.define("sum", Value::Builtin(&SUM));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DebugConfig, Quotas};
    use crate::interpreter::VmMode;

    fn interp() -> Interp {
        Interp::new(Quotas::default(), DebugConfig::default(), VmMode::Off, vec![], Rc::from("main.nx"))
    }

    #[test]
    fn clamp_bounds_value() {
        let i = interp();
        let v = clamp_fn(&i, &[Value::Int(10), Value::Int(0), Value::Int(5)], Pos::default()).unwrap();
        assert!(matches!(v, Value::Int(5)));
    }

    #[test]
    fn sum_adds_array_of_ints() {
        let i = interp();
        let arr = Value::array(vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
        let v = sum_fn(&i, &[arr], Pos::default()).unwrap();
        assert!(matches!(v, Value::Int(6)));
    }
}
