//! Type reflection and conversion: type, type_of, is_*, str, int.

use crate::env::Environment;
use crate::error::{EvalError, Pos};
use crate::interpreter::Interp;
use crate::value::{Builtin, Value};
use std::rc::Rc;

/// Collapses module/class/instance into "object"; the only categories
/// ever returned are null/int/bool/string/array/object/function/builtin.
fn categorize(v: &Value) -> &'static str {
    match v {
        Value::Object(..) => "object",
        other => other.type_name(),
    }
}

fn type_fn(_: &Interp, args: &[Value], _pos: Pos) -> Result<Value, EvalError> {
    Ok(Value::string(categorize(&args[0])))
}

/// A literal alias of `type`: `type(v) == type_of(v)` always holds.
fn type_of_fn(_: &Interp, args: &[Value], _pos: Pos) -> Result<Value, EvalError> {
    Ok(Value::string(categorize(&args[0])))
}

fn is_int_fn(_: &Interp, args: &[Value], _pos: Pos) -> Result<Value, EvalError> {
    Ok(Value::Bool(matches!(args[0], Value::Int(_))))
}
fn is_bool_fn(_: &Interp, args: &[Value], _pos: Pos) -> Result<Value, EvalError> {
    Ok(Value::Bool(matches!(args[0], Value::Bool(_))))
}
fn is_string_fn(_: &Interp, args: &[Value], _pos: Pos) -> Result<Value, EvalError> {
    Ok(Value::Bool(matches!(args[0], Value::String(_))))
}
fn is_array_fn(_: &Interp, args: &[Value], _pos: Pos) -> Result<Value, EvalError> {
    Ok(Value::Bool(matches!(args[0], Value::Array(_))))
}
fn is_function_fn(_: &Interp, args: &[Value], _pos: Pos) -> Result<Value, EvalError> {
    Ok(Value::Bool(args[0].is_callable()))
}
fn is_null_fn(_: &Interp, args: &[Value], _pos: Pos) -> Result<Value, EvalError> {
    Ok(Value::Bool(matches!(args[0], Value::Null)))
}

fn str_fn(_: &Interp, args: &[Value], _pos: Pos) -> Result<Value, EvalError> {
    Ok(Value::string(args[0].to_display_string()))
}

fn int_fn(_: &Interp, args: &[Value], pos: Pos) -> Result<Value, EvalError> {
    match &args[0] {
        Value::Int(n) => Ok(Value::Int(*n)),
        Value::Bool(b) => Ok(Value::Int(if *b { 1 } else { 0 })),
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|_| EvalError::runtime(format!("int: cannot parse '{s}' as an integer"), pos)),
        other => Err(EvalError::type_error("int", "int, bool or string", other, pos)),
    }
}

static TYPE: Builtin = Builtin { name: "type", arity: Some(1), func: type_fn };
static TYPE_OF: Builtin = Builtin { name: "type_of", arity: Some(1), func: type_of_fn };
static IS_INT: Builtin = Builtin { name: "is_int", arity: Some(1), func: is_int_fn };
static IS_BOOL: Builtin = Builtin { name: "is_bool", arity: Some(1), func: is_bool_fn };
static IS_STRING: Builtin = Builtin { name: "is_string", arity: Some(1), func: is_string_fn };
static IS_ARRAY: Builtin = Builtin { name: "is_array", arity: Some(1), func: is_array_fn };
static IS_FUNCTION: Builtin = Builtin { name: "is_function", arity: Some(1), func: is_function_fn };
static IS_NULL: Builtin = Builtin { name: "is_null", arity: Some(1), func: is_null_fn };
static STR: Builtin = Builtin { name: "str", arity: Some(1), func: str_fn };
static INT: Builtin = Builtin { name: "int", arity: Some(1), func: int_fn };

pub fn register(env: &Rc<Environment>) {
    env.define("type", Value::Builtin(&TYPE));
    env.define("type_of", Value::Builtin(&TYPE_OF));
    env.define("is_int", Value::Builtin(&IS_INT));
    env.define("is_bool", Value::Builtin(&IS_BOOL));
    env.define("is_string", Value::Builtin(&IS_STRING));
    env.define("is_array", Value::Builtin(&IS_ARRAY));
    env.define("is_function", Value::Builtin(&IS_FUNCTION));
    env.define("is_null", Value::Builtin(&IS_NULL));
    env.define("str", Value::Builtin(&STR));
    env.define("int", Value::Builtin(&INT));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DebugConfig, Quotas};
    use crate::interpreter::VmMode;
    use crate::value::ObjectKind;

    fn interp() -> Interp {
        Interp::new(Quotas::default(), DebugConfig::default(), VmMode::Off, vec![], Rc::from("main.nx"))
    }

    #[test]
    fn int_of_str_round_trips() {
        let i = interp();
        let v = int_fn(&i, &[Value::string("42")], Pos::default()).unwrap();
        assert!(matches!(v, Value::Int(42)));
    }

    #[test]
    fn type_and_type_of_agree_on_collapsed_object_kinds() {
        let i = interp();
        let inst = Value::object(indexmap::IndexMap::new(), ObjectKind::Instance);
        let v = type_fn(&i, &[inst.clone()], Pos::default()).unwrap();
        assert!(matches!(v, Value::String(ref s) if &**s == "object"));
        let v2 = type_of_fn(&i, &[inst], Pos::default()).unwrap();
        assert!(matches!(v2, Value::String(ref s) if &**s == "object"));
    }
}
