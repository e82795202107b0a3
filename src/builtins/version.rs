//! Language version introspection: `lang_version`, `require_version`.

use crate::config::LANG_VERSION;
use crate::env::Environment;
use crate::error::{EvalError, Pos};
use crate::interpreter::Interp;
use crate::value::{Builtin, Value};
use std::rc::Rc;

fn lang_version_fn(_: &Interp, _args: &[Value], _pos: Pos) -> Result<Value, EvalError> {
    Ok(Value::string(LANG_VERSION))
}

fn require_version_fn(_: &Interp, args: &[Value], pos: Pos) -> Result<Value, EvalError> {
    match &args[0] {
        Value::String(s) if s.as_ref() == LANG_VERSION => Ok(Value::Null),
        Value::String(s) => Err(EvalError::runtime(
            format!("require_version: expected {LANG_VERSION}, running {s}"),
            pos,
        )),
        other => Err(EvalError::type_error("require_version", "string", other, pos)),
    }
}

static LANG_VERSION_FN: Builtin = Builtin { name: "lang_version", arity: Some(0), func: lang_version_fn };
static REQUIRE_VERSION: Builtin = Builtin { name: "require_version", arity: Some(1), func: require_version_fn };

pub fn register(env: &Rc<Environment>) {
    env.define("lang_version", Value::Builtin(&LANG_VERSION_FN));
    env.define("require_version", Value::Builtin(&REQUIRE_VERSION));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DebugConfig, Quotas};
    use crate::interpreter::VmMode;

    #[test]
    fn require_version_rejects_mismatch() {
        let i = Interp::new(Quotas::default(), DebugConfig::default(), VmMode::Off, vec![], Rc::from("main.nx"));
        assert!(require_version_fn(&i, &[Value::string("0.0.1")], Pos::default()).is_err());
        assert!(require_version_fn(&i, &[Value::string(LANG_VERSION)], Pos::default()).is_ok());
    }
}
