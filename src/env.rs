// ABOUTME: Parent-linked lexical environment for variable bindings

use crate::error::{EvalError, Pos};
use crate::value::Value;
use indexmap::IndexMap;
use std::cell::RefCell;
use std::rc::Rc;

#[derive(Debug)]
pub struct Environment {
    bindings: RefCell<IndexMap<String, Value>>,
    parent: Option<Rc<Environment>>,
}

impl Environment {
    pub fn new() -> Rc<Self> {
        Rc::new(Environment {
            bindings: RefCell::new(IndexMap::new()),
            parent: None,
        })
    }

    pub fn with_parent(parent: &Rc<Environment>) -> Rc<Self> {
        Rc::new(Environment {
            bindings: RefCell::new(IndexMap::new()),
            parent: Some(Rc::clone(parent)),
        })
    }

    /// Binds `name` in this scope, overwriting a previous binding in the
    /// same scope but shadowing rather than mutating an outer one.
    pub fn define(&self, name: impl Into<String>, value: Value) {
        self.bindings.borrow_mut().insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.bindings.borrow().get(name) {
            return Some(value.clone());
        }
        self.parent.as_ref().and_then(|p| p.get(name))
    }

    pub fn lookup(&self, name: &str, pos: Pos) -> Result<Value, EvalError> {
        self.get(name).ok_or_else(|| EvalError::UndefinedIdentifier {
            name: name.to_string(),
            pos,
        })
    }

    /// Walks the parent chain looking for an existing binding to update;
    /// errors if `name` was never `define`d anywhere in the chain.
    pub fn assign(&self, name: &str, value: Value, pos: Pos) -> Result<(), EvalError> {
        if self.bindings.borrow().contains_key(name) {
            self.bindings.borrow_mut().insert(name.to_string(), value);
            return Ok(());
        }
        match &self.parent {
            Some(parent) => parent.assign(name, value, pos),
            None => Err(EvalError::UndefinedIdentifier {
                name: name.to_string(),
                pos,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn define_and_get() {
        let env = Environment::new();
        env.define("x", Value::Int(42));
        assert!(matches!(env.get("x"), Some(Value::Int(42))));
    }

    #[test]
    fn undefined_lookup_is_none() {
        let env = Environment::new();
        assert!(env.get("missing").is_none());
    }

    #[test]
    fn child_shadows_parent() {
        let parent = Environment::new();
        parent.define("x", Value::Int(1));
        let child = Environment::with_parent(&parent);
        child.define("x", Value::Int(2));
        assert!(matches!(child.get("x"), Some(Value::Int(2))));
        assert!(matches!(parent.get("x"), Some(Value::Int(1))));
    }

    #[test]
    fn assign_walks_up_to_defining_scope() {
        let parent = Environment::new();
        parent.define("x", Value::Int(1));
        let child = Environment::with_parent(&parent);
        child.assign("x", Value::Int(9), Pos::default()).unwrap();
        assert!(matches!(parent.get("x"), Some(Value::Int(9))));
    }

    #[test]
    fn assign_to_undefined_name_errors() {
        let env = Environment::new();
        assert!(env.assign("ghost", Value::Null, Pos::default()).is_err());
    }
}
