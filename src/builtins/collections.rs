//! Array/object collection built-ins: len, all, any, range, push, pop,
//! and the `object_*` reflection family.

use crate::env::Environment;
use crate::error::{EvalError, Pos};
use crate::interpreter::Interp;
use crate::value::{Builtin, ObjectKind, Value};
use indexmap::IndexMap;
use std::rc::Rc;

fn len_fn(_: &Interp, args: &[Value], pos: Pos) -> Result<Value, EvalError> {
    let n = match &args[0] {
        Value::Array(items) => items.borrow().len(),
        Value::String(s) => s.len(),
        Value::Object(fields, _) => fields.borrow().len(),
        other => return Err(EvalError::type_error("len", "array, string or object", other, pos)),
    };
    Ok(Value::Int(n as i64))
}

fn all_fn(_: &Interp, args: &[Value], pos: Pos) -> Result<Value, EvalError> {
    match &args[0] {
        Value::Array(items) => Ok(Value::Bool(items.borrow().iter().all(Value::is_truthy))),
        other => Err(EvalError::type_error("all", "array", other, pos)),
    }
}

fn any_fn(_: &Interp, args: &[Value], pos: Pos) -> Result<Value, EvalError> {
    match &args[0] {
        Value::Array(items) => Ok(Value::Bool(items.borrow().iter().any(Value::is_truthy))),
        other => Err(EvalError::type_error("any", "array", other, pos)),
    }
}

fn int_of(v: &Value, pos: Pos) -> Result<i64, EvalError> {
    match v {
        Value::Int(n) => Ok(*n),
        other => Err(EvalError::type_error("range", "int", other, pos)),
    }
}

/// `range(stop)`, `range(start, stop)`, or `range(start, stop, step)`.
fn range_fn(interp: &Interp, args: &[Value], pos: Pos) -> Result<Value, EvalError> {
    let (start, stop, step) = match args.len() {
        1 => (0, int_of(&args[0], pos)?, 1),
        2 => (int_of(&args[0], pos)?, int_of(&args[1], pos)?, 1),
        3 => (
            int_of(&args[0], pos)?,
            int_of(&args[1], pos)?,
            int_of(&args[2], pos)?,
        ),
        n => return Err(EvalError::arity("range", 1, n, pos)),
    };
    if step == 0 {
        return Err(EvalError::runtime("range: step must not be zero", pos));
    }
    let mut out = Vec::new();
    let mut i = start;
    if step > 0 {
        while i < stop {
            out.push(Value::Int(i));
            i += step;
        }
    } else {
        while i > stop {
            out.push(Value::Int(i));
            i += step;
        }
    }
    interp.track_alloc(1, pos)?;
    Ok(Value::array(out))
}

fn push_fn(_: &Interp, args: &[Value], pos: Pos) -> Result<Value, EvalError> {
    match &args[0] {
        Value::Array(items) => {
            items.borrow_mut().push(args[1].clone());
            Ok(args[0].clone())
        }
        other => Err(EvalError::type_error("push", "array", other, pos)),
    }
}

fn pop_fn(_: &Interp, args: &[Value], pos: Pos) -> Result<Value, EvalError> {
    match &args[0] {
        Value::Array(items) => items
            .borrow_mut()
            .pop()
            .ok_or_else(|| EvalError::runtime("pop: array is empty", pos)),
        other => Err(EvalError::type_error("pop", "array", other, pos)),
    }
}

fn object_new_fn(interp: &Interp, _args: &[Value], pos: Pos) -> Result<Value, EvalError> {
    interp.track_alloc(1, pos)?;
    Ok(Value::object(IndexMap::new(), ObjectKind::Plain))
}

fn object_set_fn(_: &Interp, args: &[Value], pos: Pos) -> Result<Value, EvalError> {
    match (&args[0], &args[1]) {
        (Value::Object(fields, _), Value::String(key)) => {
            fields.borrow_mut().insert(key.to_string(), args[2].clone());
            Ok(args[0].clone())
        }
        (other, _) => Err(EvalError::type_error("object_set", "object", other, pos)),
    }
}

fn object_get_fn(_: &Interp, args: &[Value], pos: Pos) -> Result<Value, EvalError> {
    match (&args[0], &args[1]) {
        (Value::Object(fields, _), Value::String(key)) => fields
            .borrow()
            .get(key.as_ref())
            .cloned()
            .ok_or_else(|| EvalError::NoSuchKey { key: key.to_string(), pos }),
        (other, _) => Err(EvalError::type_error("object_get", "object", other, pos)),
    }
}

fn object_has_fn(_: &Interp, args: &[Value], pos: Pos) -> Result<Value, EvalError> {
    match (&args[0], &args[1]) {
        (Value::Object(fields, _), Value::String(key)) => {
            Ok(Value::Bool(fields.borrow().contains_key(key.as_ref())))
        }
        (other, _) => Err(EvalError::type_error("has", "object", other, pos)),
    }
}

fn object_keys_fn(interp: &Interp, args: &[Value], pos: Pos) -> Result<Value, EvalError> {
    match &args[0] {
        Value::Object(fields, _) => {
            interp.track_alloc(1, pos)?;
            Ok(Value::array(
                fields.borrow().keys().map(|k| Value::string(k.clone())).collect(),
            ))
        }
        other => Err(EvalError::type_error("keys", "object", other, pos)),
    }
}

fn object_values_fn(interp: &Interp, args: &[Value], pos: Pos) -> Result<Value, EvalError> {
    match &args[0] {
        Value::Object(fields, _) => {
            interp.track_alloc(1, pos)?;
            Ok(Value::array(fields.borrow().values().cloned().collect()))
        }
        other => Err(EvalError::type_error("values", "object", other, pos)),
    }
}

fn object_items_fn(interp: &Interp, args: &[Value], pos: Pos) -> Result<Value, EvalError> {
    match &args[0] {
        Value::Object(fields, _) => {
            let fields = fields.borrow();
            interp.track_alloc(fields.len() as i64 + 1, pos)?;
            Ok(Value::array(
                fields
                    .iter()
                    .map(|(k, v)| Value::array(vec![Value::string(k.clone()), v.clone()]))
                    .collect(),
            ))
        }
        other => Err(EvalError::type_error("items", "object", other, pos)),
    }
}

static LEN: Builtin = Builtin { name: "len", arity: Some(1), func: len_fn };
static ALL: Builtin = Builtin { name: "all", arity: Some(1), func: all_fn };
static ANY: Builtin = Builtin { name: "any", arity: Some(1), func: any_fn };
static RANGE: Builtin = Builtin { name: "range", arity: None, func: range_fn };
static PUSH: Builtin = Builtin { name: "push", arity: Some(2), func: push_fn };
static POP: Builtin = Builtin { name: "pop", arity: Some(1), func: pop_fn };
static OBJECT_NEW: Builtin = Builtin { name: "object_new", arity: Some(0), func: object_new_fn };
static OBJECT_SET: Builtin = Builtin { name: "object_set", arity: Some(3), func: object_set_fn };
static OBJECT_GET: Builtin = Builtin { name: "object_get", arity: Some(2), func: object_get_fn };
static HAS: Builtin = Builtin { name: "has", arity: Some(2), func: object_has_fn };
static KEYS: Builtin = Builtin { name: "keys", arity: Some(1), func: object_keys_fn };
static VALUES: Builtin = Builtin { name: "values", arity: Some(1), func: object_values_fn };
static ITEMS: Builtin = Builtin { name: "items", arity: Some(1), func: object_items_fn };

pub fn register(env: &Rc<Environment>) {
    env.define("len", Value::Builtin(&LEN));
    env.define("all", Value::Builtin(&ALL));
    env.define("any", Value::Builtin(&ANY));
    env.define("range", Value::Builtin(&RANGE));
    env.define("push", Value::Builtin(&PUSH));
    env.define("pop", Value::Builtin(&POP));
    env.define("object_new", Value::Builtin(&OBJECT_NEW));
    env.define("object_set", Value::Builtin(&OBJECT_SET));
    env.define("object_get", Value::Builtin(&OBJECT_GET));
    env.define("has", Value::Builtin(&HAS));
    env.define("keys", Value::Builtin(&KEYS));
    env.define("values", Value::Builtin(&VALUES));
    env.define("items", Value::Builtin(&ITEMS));
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
    fn range_with_start_stop_step() {
        let i = interp();
        let v = range_fn(&i, &[Value::Int(10), Value::Int(0), Value::Int(-2)], Pos::default()).unwrap();
        match v {
            Value::Array(a) => assert_eq!(a.borrow().len(), 5),
            _ => panic!(),
        }
    }

    #[test]
    fn push_then_pop_round_trips() {
        let i = interp();
        let arr = Value::array(vec![]);
        push_fn(&i, &[arr.clone(), Value::Int(1)], Pos::default()).unwrap();
        let popped = pop_fn(&i, &[arr], Pos::default()).unwrap();
        assert!(matches!(popped, Value::Int(1)));
    }

    #[test]
    fn object_roundtrip() {
        let i = interp();
        let obj = object_new_fn(&i, &[], Pos::default()).unwrap();
        object_set_fn(&i, &[obj.clone(), Value::string("a"), Value::Int(1)], Pos::default()).unwrap();
        assert!(matches!(
            object_get_fn(&i, &[obj, Value::string("a")], Pos::default()).unwrap(),
            Value::Int(1)
        ));
    }
}
