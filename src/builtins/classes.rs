//! Class construction and instantiation: `new` plus the `class_*`
//! reflection family that builds and drives classes as data, without the
//! `class { ... }` declaration syntax. Fixed-arity `class_instantiateN`
//! and `class_callN` variants exist because the generated-C backend can
//! only dispatch through concrete-arity function pointers; the tree
//! interpreter honors the same contract for both back-ends to agree.

use crate::env::Environment;
use crate::error::{EvalError, Pos};
use crate::interpreter::{member_get, Interp};
use crate::value::{Builtin, ObjectKind, Value};
use indexmap::IndexMap;
use std::rc::Rc;

fn as_class(v: &Value, pos: Pos) -> Result<(indexmap::IndexMap<String, Value>, Value), EvalError> {
    match v {
        Value::Object(fields, ObjectKind::Class) => Ok((fields.borrow().clone(), v.clone())),
        _ => Err(EvalError::NotAClass { pos }),
    }
}

fn instantiate(interp: &Interp, cls: &Value, extra: &[Value], pos: Pos) -> Result<Value, EvalError> {
    let (class_fields, cls_val) = as_class(cls, pos)?;
    let mut fields = IndexMap::new();
    fields.insert("__class__".to_string(), cls_val);
    interp.track_alloc(1, pos)?;
    let instance = Value::object(fields, ObjectKind::Instance);
    if let Some(init) = class_fields.get("init") {
        let mut call_args = Vec::with_capacity(extra.len() + 1);
        call_args.push(instance.clone());
        call_args.extend_from_slice(extra);
        interp.call_value(init, call_args, pos)?;
    }
    Ok(instance)
}

fn new_fn(interp: &Interp, args: &[Value], pos: Pos) -> Result<Value, EvalError> {
    if args.is_empty() {
        return Err(EvalError::arity("new", 1, 0, pos));
    }
    instantiate(interp, &args[0], &args[1..], pos)
}

fn class_new_fn(interp: &Interp, args: &[Value], pos: Pos) -> Result<Value, EvalError> {
    let name = match &args[0] {
        Value::String(s) => s.to_string(),
        other => return Err(EvalError::type_error("class_new", "string", other, pos)),
    };
    let mut fields = IndexMap::new();
    fields.insert("__name__".to_string(), Value::string(name));
    interp.track_alloc(1, pos)?;
    Ok(Value::object(fields, ObjectKind::Class))
}

fn class_with_ctor_fn(interp: &Interp, args: &[Value], pos: Pos) -> Result<Value, EvalError> {
    let name = match &args[0] {
        Value::String(s) => s.to_string(),
        other => return Err(EvalError::type_error("class_with_ctor", "string", other, pos)),
    };
    if !args[1].is_callable() {
        return Err(EvalError::type_error("class_with_ctor", "function", &args[1], pos));
    }
    let mut fields = IndexMap::new();
    fields.insert("__name__".to_string(), Value::string(name));
    fields.insert("init".to_string(), args[1].clone());
    interp.track_alloc(1, pos)?;
    Ok(Value::object(fields, ObjectKind::Class))
}

fn class_set_method_fn(_: &Interp, args: &[Value], pos: Pos) -> Result<Value, EvalError> {
    match (&args[0], &args[1]) {
        (Value::Object(fields, ObjectKind::Class), Value::String(name)) => {
            if !args[2].is_callable() {
                return Err(EvalError::type_error("class_set_method", "function", &args[2], pos));
            }
            fields.borrow_mut().insert(name.to_string(), args[2].clone());
            Ok(args[0].clone())
        }
        _ => Err(EvalError::NotAClass { pos }),
    }
}

fn class_name_fn(_: &Interp, args: &[Value], pos: Pos) -> Result<Value, EvalError> {
    let (fields, _) = as_class(&args[0], pos)?;
    fields
        .get("__name__")
        .cloned()
        .ok_or_else(|| EvalError::runtime("class has no __name__", pos))
}

fn class_instantiate0_fn(interp: &Interp, args: &[Value], pos: Pos) -> Result<Value, EvalError> {
    instantiate(interp, &args[0], &[], pos)
}
fn class_instantiate1_fn(interp: &Interp, args: &[Value], pos: Pos) -> Result<Value, EvalError> {
    instantiate(interp, &args[0], &args[1..2], pos)
}
fn class_instantiate2_fn(interp: &Interp, args: &[Value], pos: Pos) -> Result<Value, EvalError> {
    instantiate(interp, &args[0], &args[1..3], pos)
}

fn method_name(v: &Value, pos: Pos) -> Result<String, EvalError> {
    match v {
        Value::String(s) => Ok(s.to_string()),
        other => Err(EvalError::type_error("class_call", "string", other, pos)),
    }
}

fn class_call0_fn(interp: &Interp, args: &[Value], pos: Pos) -> Result<Value, EvalError> {
    let method = member_get(&args[0], &method_name(&args[1], pos)?, pos)?;
    interp.call_value(&method, vec![], pos)
}
fn class_call1_fn(interp: &Interp, args: &[Value], pos: Pos) -> Result<Value, EvalError> {
    let method = member_get(&args[0], &method_name(&args[1], pos)?, pos)?;
    interp.call_value(&method, vec![args[2].clone()], pos)
}
fn class_call2_fn(interp: &Interp, args: &[Value], pos: Pos) -> Result<Value, EvalError> {
    let method = member_get(&args[0], &method_name(&args[1], pos)?, pos)?;
    interp.call_value(&method, vec![args[2].clone(), args[3].clone()], pos)
}

static NEW: Builtin = Builtin { name: "new", arity: None, func: new_fn };
static CLASS_NEW: Builtin = Builtin { name: "class_new", arity: Some(1), func: class_new_fn };
static CLASS_WITH_CTOR: Builtin = Builtin { name: "class_with_ctor", arity: Some(2), func: class_with_ctor_fn };
static CLASS_SET_METHOD: Builtin = Builtin { name: "class_set_method", arity: Some(3), func: class_set_method_fn };
static CLASS_NAME: Builtin = Builtin { name: "class_name", arity: Some(1), func: class_name_fn };
static CLASS_INSTANTIATE0: Builtin = Builtin { name: "class_instantiate0", arity: Some(1), func: class_instantiate0_fn };
static CLASS_INSTANTIATE1: Builtin = Builtin { name: "class_instantiate1", arity: Some(2), func: class_instantiate1_fn };
static CLASS_INSTANTIATE2: Builtin = Builtin { name: "class_instantiate2", arity: Some(3), func: class_instantiate2_fn };
static CLASS_CALL0: Builtin = Builtin { name: "class_call0", arity: Some(2), func: class_call0_fn };
static CLASS_CALL1: Builtin = Builtin { name: "class_call1", arity: Some(3), func: class_call1_fn };
static CLASS_CALL2: Builtin = Builtin { name: "class_call2", arity: Some(4), func: class_call2_fn };

pub fn register(env: &Rc<Environment>) {
    env.define("new", Value::Builtin(&NEW));
    env.define("class_new", Value::Builtin(&CLASS_NEW));
    env.define("class_with_ctor", Value::Builtin(&CLASS_WITH_CTOR));
    env.define("class_set_method", Value::Builtin(&CLASS_SET_METHOD));
    env.define("class_name", Value::Builtin(&CLASS_NAME));
    env.define("class_instantiate0", Value::Builtin(&CLASS_INSTANTIATE0));
    env.define("class_instantiate1", Value::Builtin(&CLASS_INSTANTIATE1));
    env.define("class_instantiate2", Value::Builtin(&CLASS_INSTANTIATE2));
    env.define("class_call0", Value::Builtin(&CLASS_CALL0));
    env.define("class_call1", Value::Builtin(&CLASS_CALL1));
    env.define("class_call2", Value::Builtin(&CLASS_CALL2));
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
    fn new_requires_a_class_value() {
        let i = interp();
        let err = new_fn(&i, &[Value::Int(1)], Pos::default()).unwrap_err();
        assert!(matches!(err, EvalError::NotAClass { .. }));
    }

    #[test]
    fn class_new_and_instantiate_round_trip() {
        let i = interp();
        let cls = class_new_fn(&i, &[Value::string("Thing")], Pos::default()).unwrap();
        let name = class_name_fn(&i, &[cls.clone()], Pos::default()).unwrap();
        assert!(matches!(name, Value::String(ref s) if &**s == "Thing"));
        let inst = class_instantiate0_fn(&i, &[cls], Pos::default()).unwrap();
        assert!(matches!(inst, Value::Object(_, ObjectKind::Instance)));
    }
}
