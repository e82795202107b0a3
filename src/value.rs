// ABOUTME: Value types representing Nyx runtime data and callables

use crate::ast::{Block, Param};
use crate::env::Environment;
use indexmap::IndexMap;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Distinguishes the four flavors of `Value::Object` without a separate
/// runtime type: plain data, an imported module's namespace, a class
/// (carries methods + an optional constructor), and a class instance
/// (carries a `__class__` back-pointer in its fields).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Plain,
    Module,
    Class,
    Instance,
}

pub type ObjectRef = Rc<RefCell<IndexMap<String, Value>>>;
pub type ArrayRef = Rc<RefCell<Vec<Value>>>;

#[derive(Clone)]
pub struct NyxFunction {
    pub name: Option<String>,
    pub params: Vec<Param>,
    pub body: Rc<Block>,
    pub env: Rc<Environment>,
    pub defining_file: Rc<str>,
}

pub type BuiltinFn = fn(&crate::interpreter::Interp, &[Value], crate::error::Pos) -> Result<Value, crate::error::EvalError>;

#[derive(Clone, Copy)]
pub struct Builtin {
    pub name: &'static str,
    pub arity: Option<usize>,
    pub func: BuiltinFn,
}

#[derive(Clone)]
pub enum Value {
    Null,
    Int(i64),
    Bool(bool),
    String(Rc<str>),
    Array(ArrayRef),
    Object(ObjectRef, ObjectKind),
    Function(Rc<NyxFunction>),
    Builtin(&'static Builtin),
    BoundMethod(Box<Value>, Box<Value>),
}

impl Value {
    pub fn string(s: impl Into<String>) -> Value {
        Value::String(Rc::from(s.into().as_str()))
    }

    pub fn array(items: Vec<Value>) -> Value {
        Value::Array(Rc::new(RefCell::new(items)))
    }

    pub fn object(fields: IndexMap<String, Value>, kind: ObjectKind) -> Value {
        Value::Object(Rc::new(RefCell::new(fields)), kind)
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Int(_) => "int",
            Value::Bool(_) => "bool",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_, ObjectKind::Plain) => "object",
            Value::Object(_, ObjectKind::Module) => "module",
            Value::Object(_, ObjectKind::Class) => "class",
            Value::Object(_, ObjectKind::Instance) => "instance",
            Value::Function(_) => "function",
            Value::Builtin(_) => "builtin",
            Value::BoundMethod(..) => "function",
        }
    }

    /// null, false, 0, "", and [] are falsy; every other value is truthy.
    /// Objects are always truthy, matching the reference interpreter.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(n) => *n != 0,
            Value::String(s) => !s.is_empty(),
            Value::Array(a) => !a.borrow().is_empty(),
            _ => true,
        }
    }

    pub fn is_callable(&self) -> bool {
        matches!(
            self,
            Value::Function(_) | Value::Builtin(_) | Value::BoundMethod(..)
        )
    }

    /// Identity equality for compound/callable values, structural equality
    /// for scalars. Mirrors the reference interpreter's `values_equal`.
    pub fn nyx_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => Rc::ptr_eq(a, b),
            (Value::Object(a, _), Value::Object(b, _)) => Rc::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::Builtin(a), Value::Builtin(b)) => std::ptr::eq(*a, *b),
            (Value::BoundMethod(ra, ca), Value::BoundMethod(rb, cb)) => {
                ra.nyx_eq(rb) && ca.nyx_eq(cb)
            }
            _ => false,
        }
    }

    /// Non-recursive rendering used by `str()`: containers become the
    /// literal strings `"[array]"` / `"[object]"`.
    pub fn to_display_string(&self) -> String {
        match self {
            Value::Null => "null".to_string(),
            Value::Int(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            Value::String(s) => s.to_string(),
            Value::Array(_) => "[array]".to_string(),
            Value::Object(_, ObjectKind::Module) => "[module]".to_string(),
            Value::Object(_, ObjectKind::Class) => "[class]".to_string(),
            Value::Object(_, ObjectKind::Instance) => "[instance]".to_string(),
            Value::Object(_, ObjectKind::Plain) => "[object]".to_string(),
            Value::Function(_) | Value::Builtin(_) | Value::BoundMethod(..) => {
                "[function]".to_string()
            }
        }
    }

    /// Recursive rendering used by `print`: arrays/objects render their
    /// elements inline, separated by `", "`.
    pub fn to_print_string(&self) -> String {
        match self {
            Value::Array(items) => {
                let inner = items
                    .borrow()
                    .iter()
                    .map(|v| v.to_print_string())
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("[{inner}]")
            }
            Value::Object(fields, ObjectKind::Plain) => {
                let inner = fields
                    .borrow()
                    .iter()
                    .map(|(k, v)| format!("{k}: {}", v.to_print_string()))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("{{{inner}}}")
            }
            other => other.to_display_string(),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_print_string())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_print_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalars_compare_structurally() {
        assert!(Value::Int(3).nyx_eq(&Value::Int(3)));
        assert!(Value::string("a").nyx_eq(&Value::string("a")));
    }

    #[test]
    fn arrays_compare_by_identity() {
        let a = Value::array(vec![Value::Int(1)]);
        let b = Value::array(vec![Value::Int(1)]);
        assert!(!a.nyx_eq(&b));
        assert!(a.nyx_eq(&a.clone()));
    }

    #[test]
    fn falsy_values() {
        assert!(!Value::Null.is_truthy());
        assert!(!Value::Int(0).is_truthy());
        assert!(!Value::string("").is_truthy());
        assert!(!Value::array(vec![]).is_truthy());
        assert!(Value::Int(-1).is_truthy());
    }

    #[test]
    fn print_vs_str_rendering() {
        let arr = Value::array(vec![Value::Int(1), Value::Int(9)]);
        assert_eq!(arr.to_print_string(), "[1, 9]");
        assert_eq!(arr.to_display_string(), "[array]");
    }
}
