//! Console and file I/O: print, read, write, argc, argv.
//!
//! `read`/`write` resolve relative paths against the directory of the
//! script being interpreted, never the process's current directory.

use crate::env::Environment;
use crate::error::{EvalError, Pos};
use crate::interpreter::Interp;
use crate::value::{Builtin, Value};
use std::path::{Path, PathBuf};
use std::rc::Rc;

fn resolve_path(interp: &Interp, path: &str) -> PathBuf {
    let p = Path::new(path);
    if p.is_absolute() {
        return p.to_path_buf();
    }
    Path::new(interp.entry_file.as_ref())
        .parent()
        .map(|dir| dir.join(p))
        .unwrap_or_else(|| p.to_path_buf())
}

fn print_fn(_: &Interp, args: &[Value], _pos: Pos) -> Result<Value, EvalError> {
    let rendered = args
        .iter()
        .map(Value::to_print_string)
        .collect::<Vec<_>>()
        .join(" ");
    println!("{rendered}");
    Ok(Value::Null)
}

fn read_fn(interp: &Interp, args: &[Value], pos: Pos) -> Result<Value, EvalError> {
    match &args[0] {
        Value::String(path) => {
            let full = resolve_path(interp, path);
            std::fs::read_to_string(&full)
                .map(Value::string)
                .map_err(|e| EvalError::runtime(format!("read: {e}"), pos))
        }
        other => Err(EvalError::type_error("read", "string", other, pos)),
    }
}

fn write_fn(interp: &Interp, args: &[Value], pos: Pos) -> Result<Value, EvalError> {
    match &args[0] {
        Value::String(path) => {
            let full = resolve_path(interp, path);
            let contents = args[1].to_display_string();
            std::fs::write(&full, contents)
                .map(|_| Value::Null)
                .map_err(|e| EvalError::runtime(format!("write: {e}"), pos))
        }
        other => Err(EvalError::type_error("write", "string", other, pos)),
    }
}

fn argc_fn(interp: &Interp, _args: &[Value], _pos: Pos) -> Result<Value, EvalError> {
    Ok(Value::Int(interp.argv.len() as i64))
}

fn argv_fn(interp: &Interp, args: &[Value], pos: Pos) -> Result<Value, EvalError> {
    match &args[0] {
        Value::Int(i) if *i >= 0 && (*i as usize) < interp.argv.len() => {
            Ok(Value::string(interp.argv[*i as usize].clone()))
        }
        Value::Int(i) => Err(EvalError::runtime(format!("argv: index {i} out of range"), pos)),
        other => Err(EvalError::type_error("argv", "int", other, pos)),
    }
}

static PRINT: Builtin = Builtin { name: "print", arity: None, func: print_fn };
static READ: Builtin = Builtin { name: "read", arity: Some(1), func: read_fn };
static WRITE: Builtin = Builtin { name: "write", arity: Some(2), func: write_fn };
static ARGC: Builtin = Builtin { name: "argc", arity: Some(0), func: argc_fn };
static ARGV: Builtin = Builtin { name: "argv", arity: Some(1), func: argv_fn };

pub fn register(env: &Rc<Environment>) {
    env.define("print", Value::Builtin(&PRINT));
    env.define("read", Value::Builtin(&READ));
    env.define("write", Value::Builtin(&WRITE));
    env.define("argc", Value::Builtin(&ARGC));
    env.define("argv", Value::Builtin(&ARGV));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DebugConfig, Quotas};
    use crate::interpreter::VmMode;

    #[test]
    fn read_resolves_relative_to_entry_file() {
        let dir = tempfile::tempdir().unwrap();
        let entry = dir.path().join("main.nx");
        let sibling = dir.path().join("data.txt");
        std::fs::write(&sibling, "hello").unwrap();
        let interp = Interp::new(
            Quotas::default(),
            DebugConfig::default(),
            VmMode::Off,
            vec![],
            Rc::from(entry.to_str().unwrap()),
        );
        let v = read_fn(&interp, &[Value::string("data.txt")], Pos::default()).unwrap();
        assert!(matches!(v, Value::String(ref s) if &**s == "hello"));
    }

    #[test]
    fn argv_out_of_range_errors() {
        let interp = Interp::new(Quotas::default(), DebugConfig::default(), VmMode::Off, vec![], Rc::from("main.nx"));
        assert!(argv_fn(&interp, &[Value::Int(5)], Pos::default()).is_err());
    }
}
