// ABOUTME: Tree-walking evaluator: environments, control flow, try/catch, quotas

use crate::ast::{
    AssignTarget, BinaryOp, Block, ComprehensionVars, Expr, ForHead, FunctionDecl, Stmt, UnaryOp,
};
use crate::config::{DebugConfig, Quotas};
use crate::env::Environment;
use crate::error::{EvalError, Pos};
use crate::value::{NyxFunction, ObjectKind, Value};
use crate::vm;
use indexmap::IndexMap;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VmMode {
    Off,
    On,
    Strict,
}

/// What a statement handed back to its enclosing block: fall through,
/// or one of the three structured control signals. `throw` is modeled as
/// a plain `Err(EvalError::Thrown(..))` instead, since it unwinds through
/// expression contexts too (a function call inside an expression can
/// throw), which `Flow` alone cannot express.
pub enum Flow {
    Next,
    Return(Value),
    Break,
    Continue,
}

pub struct Interp {
    pub quotas: Quotas,
    pub debug: RefCell<DebugConfig>,
    pub vm_mode: VmMode,
    pub argv: Vec<String>,
    pub entry_file: Rc<str>,
    alloc_used: Cell<i64>,
    steps_used: Cell<i64>,
    call_depth: Cell<i64>,
    vm_cache: RefCell<HashMap<u32, Rc<vm::Chunk>>>,
}

impl Interp {
    pub fn new(
        quotas: Quotas,
        debug: DebugConfig,
        vm_mode: VmMode,
        argv: Vec<String>,
        entry_file: Rc<str>,
    ) -> Self {
        Interp {
            quotas,
            debug: RefCell::new(debug),
            vm_mode,
            argv,
            entry_file,
            alloc_used: Cell::new(0),
            steps_used: Cell::new(0),
            call_depth: Cell::new(0),
            vm_cache: RefCell::new(HashMap::new()),
        }
    }

    pub fn run(&self, block: &Block, env: &Rc<Environment>) -> Result<(), EvalError> {
        match self.eval_block(block, env)? {
            Flow::Next | Flow::Return(_) => Ok(()),
            Flow::Break => Err(EvalError::BreakOutsideLoop { pos: Pos::default() }),
            Flow::Continue => Err(EvalError::ContinueOutsideLoop { pos: Pos::default() }),
        }
    }

    fn tick_step(&self, pos: Pos) -> Result<(), EvalError> {
        if self.quotas.steps_enabled() {
            let used = self.steps_used.get() + 1;
            self.steps_used.set(used);
            if used > self.quotas.max_steps {
                return Err(EvalError::StepQuotaExceeded {
                    limit: self.quotas.max_steps as u64,
                    pos,
                });
            }
        }
        Ok(())
    }

    pub fn track_alloc(&self, count: i64, pos: Pos) -> Result<(), EvalError> {
        if self.quotas.alloc_enabled() {
            let used = self.alloc_used.get() + count;
            self.alloc_used.set(used);
            if used > self.quotas.max_alloc {
                return Err(EvalError::AllocQuotaExceeded {
                    limit: self.quotas.max_alloc as u64,
                    pos,
                });
            }
        }
        Ok(())
    }

    fn trace_stmt(&self, stmt: &Stmt) {
        log::trace!("{}: {}", stmt.pos(), stmt_kind_name(stmt));
        let dbg = self.debug.borrow();
        if !dbg.enabled {
            return;
        }
        let pos = stmt.pos();
        let should_pause = dbg.step || dbg.is_breakpoint(pos.line);
        if should_pause && !dbg.no_prompt {
            drop(dbg);
            self.debug_prompt(pos, stmt);
        }
    }

    fn debug_prompt(&self, pos: Pos, _stmt: &Stmt) {
        use std::io::Write;
        loop {
            print!("nyx-debug [{pos}]> ");
            let _ = std::io::stdout().flush();
            let mut line = String::new();
            if std::io::stdin().read_line(&mut line).unwrap_or(0) == 0 {
                self.debug.borrow_mut().enabled = false;
                return;
            }
            match line.trim() {
                "c" | "continue" => {
                    self.debug.borrow_mut().step = false;
                    return;
                }
                "s" | "step" => {
                    self.debug.borrow_mut().step = true;
                    return;
                }
                "q" | "quit" => std::process::exit(130),
                other if other.is_empty() => return,
                other => println!("(unknown variable or command: {other})"),
            }
        }
    }

    pub fn eval_block(&self, block: &Block, env: &Rc<Environment>) -> Result<Flow, EvalError> {
        for stmt in &block.stmts {
            self.tick_step(stmt.pos())?;
            self.trace_stmt(stmt);
            match self.eval_stmt(stmt, env)? {
                Flow::Next => {}
                other => return Ok(other),
            }
        }
        Ok(Flow::Next)
    }

    fn eval_stmt(&self, stmt: &Stmt, env: &Rc<Environment>) -> Result<Flow, EvalError> {
        match stmt {
            Stmt::Let(name, expr, _) => {
                let value = self.eval_expr(expr, env)?;
                env.define(name.clone(), value);
                Ok(Flow::Next)
            }
            Stmt::Assign(target, expr, pos) => {
                let value = self.eval_expr(expr, env)?;
                self.assign(target, value, env, *pos)?;
                Ok(Flow::Next)
            }
            Stmt::ExprStmt(expr, _) => {
                self.eval_expr(expr, env)?;
                Ok(Flow::Next)
            }
            Stmt::If {
                cond,
                then_block,
                else_block,
                ..
            } => {
                if self.eval_expr(cond, env)?.is_truthy() {
                    self.eval_block(then_block, &Environment::with_parent(env))
                } else if let Some(block) = else_block {
                    self.eval_block(block, &Environment::with_parent(env))
                } else {
                    Ok(Flow::Next)
                }
            }
            Stmt::Switch {
                subject,
                cases,
                default,
                ..
            } => {
                let subject = self.eval_expr(subject, env)?;
                for case in cases {
                    let case_val = self.eval_expr(&case.value, env)?;
                    if subject.nyx_eq(&case_val) {
                        return self.eval_block(&case.body, &Environment::with_parent(env));
                    }
                }
                if let Some(default) = default {
                    self.eval_block(default, &Environment::with_parent(env))
                } else {
                    Ok(Flow::Next)
                }
            }
            Stmt::While { cond, body, .. } => {
                while self.eval_expr(cond, env)?.is_truthy() {
                    self.tick_step(stmt.pos())?;
                    match self.eval_block(body, &Environment::with_parent(env))? {
                        Flow::Break => break,
                        Flow::Continue | Flow::Next => {}
                        r @ Flow::Return(_) => return Ok(r),
                    }
                }
                Ok(Flow::Next)
            }
            Stmt::For {
                head,
                iterable,
                body,
                pos,
            } => {
                let iterable = self.eval_expr(iterable, env)?;
                for (k, v) in iter_pairs(&iterable, *pos)? {
                    let child = Environment::with_parent(env);
                    bind_for_head(head, k, v, &child);
                    self.tick_step(*pos)?;
                    match self.eval_block(body, &child)? {
                        Flow::Break => break,
                        Flow::Continue | Flow::Next => {}
                        r @ Flow::Return(_) => return Ok(r),
                    }
                }
                Ok(Flow::Next)
            }
            Stmt::Break(_) => Ok(Flow::Break),
            Stmt::Continue(_) => Ok(Flow::Continue),
            Stmt::Class { name, methods, .. } => {
                let mut fields = IndexMap::new();
                fields.insert("__name__".to_string(), Value::string(name.clone()));
                for m in methods {
                    fields.insert(m.name.clone(), self.make_function(m, env));
                }
                env.define(name.clone(), Value::object(fields, ObjectKind::Class));
                Ok(Flow::Next)
            }
            Stmt::Module { name, body, .. } => {
                let module_env = Environment::with_parent(env);
                self.eval_block(body, &module_env)?;
                // Module fields are whatever got `let`/`fn` bound directly
                // in its own scope; we can't enumerate a RefCell<IndexMap>
                // from outside so re-evaluate the module body's top-level
                // bindings by walking its statements.
                let mut fields = IndexMap::new();
                for s in &body.stmts {
                    match s {
                        Stmt::Let(n, _, _) => {
                            if let Some(v) = module_env.get(n) {
                                fields.insert(n.clone(), v);
                            }
                        }
                        Stmt::FunctionDecl(f) => {
                            if let Some(v) = module_env.get(&f.name) {
                                fields.insert(f.name.clone(), v);
                            }
                        }
                        _ => {}
                    }
                }
                env.define(name.clone(), Value::object(fields, ObjectKind::Module));
                Ok(Flow::Next)
            }
            Stmt::TypeAlias { .. } => Ok(Flow::Next),
            Stmt::Try {
                body,
                catch_var,
                catch_body,
                ..
            } => match self.eval_block(body, &Environment::with_parent(env)) {
                Err(EvalError::Thrown(val, _)) => {
                    let catch_env = Environment::with_parent(env);
                    catch_env.define(catch_var.clone(), val);
                    self.eval_block(catch_body, &catch_env)
                }
                other => other,
            },
            Stmt::FunctionDecl(f) => {
                env.define(f.name.clone(), self.make_function(f, env));
                Ok(Flow::Next)
            }
            Stmt::Return(expr, _) => {
                let value = match expr {
                    Some(e) => self.eval_expr(e, env)?,
                    None => Value::Null,
                };
                Ok(Flow::Return(value))
            }
            Stmt::Throw(expr, pos) => {
                let value = self.eval_expr(expr, env)?;
                Err(EvalError::Thrown(value, *pos))
            }
            Stmt::Import(..) => Ok(Flow::Next),
        }
    }

    fn make_function(&self, f: &FunctionDecl, env: &Rc<Environment>) -> Value {
        Value::Function(Rc::new(NyxFunction {
            name: Some(f.name.clone()),
            params: f.params.clone(),
            body: Rc::new(f.body.clone()),
            env: Rc::clone(env),
            defining_file: Rc::clone(&self.entry_file),
        }))
    }

    fn assign(
        &self,
        target: &AssignTarget,
        value: Value,
        env: &Rc<Environment>,
        pos: Pos,
    ) -> Result<(), EvalError> {
        match target {
            AssignTarget::Ident(name, pos) => env.assign(name, value, *pos),
            AssignTarget::Member(base, field, _) => {
                let base_val = self.eval_expr(base, env)?;
                match base_val {
                    Value::Object(fields, _) => {
                        fields.borrow_mut().insert(field.clone(), value);
                        Ok(())
                    }
                    other => Err(EvalError::type_error("member assignment", "object", &other, pos)),
                }
            }
            AssignTarget::Index(base, index, _) => {
                let base_val = self.eval_expr(base, env)?;
                let index_val = self.eval_expr(index, env)?;
                match (&base_val, &index_val) {
                    (Value::Array(items), Value::Int(i)) => {
                        let mut items = items.borrow_mut();
                        let len = items.len();
                        let idx = normalize_index(*i, len);
                        match idx {
                            Some(idx) if idx < len => {
                                items[idx] = value;
                                Ok(())
                            }
                            _ => Err(EvalError::IndexOutOfRange {
                                index: *i,
                                len,
                                pos,
                            }),
                        }
                    }
                    (Value::Object(fields, _), Value::String(key)) => {
                        fields.borrow_mut().insert(key.to_string(), value);
                        Ok(())
                    }
                    _ => Err(EvalError::type_error(
                        "index assignment",
                        "array[int] or object[string]",
                        &base_val,
                        pos,
                    )),
                }
            }
        }
    }

    pub fn eval_expr(&self, expr: &Expr, env: &Rc<Environment>) -> Result<Value, EvalError> {
        if self.vm_mode == VmMode::Off {
            return self.eval_expr_tree(expr, env);
        }
        let id = expr.node_id();
        let chunk = if let Some(chunk) = self.vm_cache.borrow().get(&id) {
            Rc::clone(chunk)
        } else {
            let chunk = Rc::new(vm::compile(expr));
            self.vm_cache.borrow_mut().insert(id, Rc::clone(&chunk));
            chunk
        };
        vm::run(&chunk, self, env)
    }

    /// Full recursive tree-walk, used directly when the VM is off and as
    /// the ground truth for comprehensions (see module docs in `vm.rs`).
    pub fn eval_expr_tree(&self, expr: &Expr, env: &Rc<Environment>) -> Result<Value, EvalError> {
        match expr {
            Expr::Int(n, _, _) => Ok(Value::Int(*n)),
            Expr::Str(s, _, _) => Ok(Value::string(s.clone())),
            Expr::Bool(b, _, _) => Ok(Value::Bool(*b)),
            Expr::Null(_, _) => Ok(Value::Null),
            Expr::Ident(name, pos, _) => env.lookup(name, *pos),
            Expr::Array(items, pos, _) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(self.eval_expr_tree(item, env)?);
                }
                self.track_alloc(1, *pos)?;
                Ok(Value::array(values))
            }
            Expr::ArrayComprehension {
                element,
                vars,
                iterable,
                filter,
                pos,
                ..
            } => self.eval_comprehension(element, vars, iterable, filter.as_deref(), env, *pos),
            Expr::Object(entries, pos, _) => {
                let mut fields = IndexMap::new();
                for (key, value) in entries {
                    fields.insert(key.clone(), self.eval_expr_tree(value, env)?);
                }
                self.track_alloc(1, *pos)?;
                Ok(Value::object(fields, ObjectKind::Plain))
            }
            Expr::Index(base, index, pos, _) => {
                let base = self.eval_expr_tree(base, env)?;
                let index = self.eval_expr_tree(index, env)?;
                index_get(&base, &index, *pos)
            }
            Expr::Member(base, field, pos, _) => {
                let base = self.eval_expr_tree(base, env)?;
                member_get(&base, field, *pos)
            }
            Expr::Unary(UnaryOp::Not, operand, _, _) => {
                Ok(Value::Bool(!self.eval_expr_tree(operand, env)?.is_truthy()))
            }
            Expr::Unary(UnaryOp::Neg, operand, pos, _) => {
                eval_neg(&self.eval_expr_tree(operand, env)?, *pos)
            }
            Expr::Binary(BinaryOp::And, lhs, rhs, _, _) => {
                let l = self.eval_expr_tree(lhs, env)?;
                if !l.is_truthy() {
                    Ok(l)
                } else {
                    self.eval_expr_tree(rhs, env)
                }
            }
            Expr::Binary(BinaryOp::Or, lhs, rhs, _, _) => {
                let l = self.eval_expr_tree(lhs, env)?;
                if l.is_truthy() {
                    Ok(l)
                } else {
                    self.eval_expr_tree(rhs, env)
                }
            }
            Expr::Binary(BinaryOp::Coalesce, lhs, rhs, _, _) => {
                let l = self.eval_expr_tree(lhs, env)?;
                if matches!(l, Value::Null) {
                    self.eval_expr_tree(rhs, env)
                } else {
                    Ok(l)
                }
            }
            Expr::Binary(op, lhs, rhs, pos, _) => {
                let l = self.eval_expr_tree(lhs, env)?;
                let r = self.eval_expr_tree(rhs, env)?;
                eval_binary_strict(*op, &l, &r, *pos)
            }
            Expr::Call(callee, args, pos, _) => {
                let callee_val = self.eval_expr_tree(callee, env)?;
                let mut arg_values = Vec::with_capacity(args.len());
                for a in args {
                    arg_values.push(self.eval_expr_tree(a, env)?);
                }
                self.call_value(&callee_val, arg_values, *pos)
            }
        }
    }

    fn eval_comprehension(
        &self,
        element: &Expr,
        vars: &ComprehensionVars,
        iterable: &Expr,
        filter: Option<&Expr>,
        env: &Rc<Environment>,
        pos: Pos,
    ) -> Result<Value, EvalError> {
        let iterable = self.eval_expr_tree(iterable, env)?;
        let mut out = Vec::new();
        for (k, v) in iter_pairs(&iterable, pos)? {
            let child = Environment::with_parent(env);
            match &vars.key {
                Some(key_name) => {
                    child.define(key_name.clone(), k.unwrap_or(Value::Null));
                    child.define(vars.value.clone(), v);
                }
                None => child.define(vars.value.clone(), v),
            }
            if let Some(filter) = filter {
                if !self.eval_expr(filter, &child)?.is_truthy() {
                    continue;
                }
            }
            out.push(self.eval_expr(element, &child)?);
        }
        self.track_alloc(1, pos)?;
        Ok(Value::array(out))
    }

    pub fn call_value(&self, callee: &Value, args: Vec<Value>, pos: Pos) -> Result<Value, EvalError> {
        match callee {
            Value::Builtin(b) => {
                if let Some(arity) = b.arity {
                    if args.len() != arity {
                        return Err(EvalError::arity(b.name, arity, args.len(), pos));
                    }
                }
                (b.func)(self, &args, pos)
            }
            Value::BoundMethod(receiver, inner) => {
                let mut full_args = Vec::with_capacity(args.len() + 1);
                full_args.push((**receiver).clone());
                full_args.extend(args);
                self.call_value(inner, full_args, pos)
            }
            Value::Function(f) => self.call_function(f, args, pos),
            other => Err(EvalError::type_error("call", "function", other, pos)),
        }
    }

    fn call_function(&self, f: &Rc<NyxFunction>, args: Vec<Value>, pos: Pos) -> Result<Value, EvalError> {
        if args.len() != f.params.len() {
            return Err(EvalError::arity(
                f.name.as_deref().unwrap_or("<function>"),
                f.params.len(),
                args.len(),
                pos,
            ));
        }
        if self.quotas.call_depth_enabled() {
            let depth = self.call_depth.get() + 1;
            if depth > self.quotas.max_call_depth {
                return Err(EvalError::CallDepthExceeded {
                    limit: self.quotas.max_call_depth as u64,
                    pos,
                });
            }
            self.call_depth.set(depth);
        }
        let call_env = Environment::with_parent(&f.env);
        for (param, arg) in f.params.iter().zip(args) {
            call_env.define(param.name.clone(), arg);
        }
        let result = self.eval_block(&f.body, &call_env);
        if self.quotas.call_depth_enabled() {
            self.call_depth.set(self.call_depth.get() - 1);
        }
        match result? {
            Flow::Return(v) => Ok(v),
            Flow::Next => Ok(Value::Null),
            Flow::Break => Err(EvalError::BreakOutsideLoop { pos }),
            Flow::Continue => Err(EvalError::ContinueOutsideLoop { pos }),
        }
    }
}

fn stmt_kind_name(stmt: &Stmt) -> &'static str {
    match stmt {
        Stmt::Let(..) => "let",
        Stmt::Assign(..) => "assign",
        Stmt::ExprStmt(..) => "expr",
        Stmt::If { .. } => "if",
        Stmt::Switch { .. } => "switch",
        Stmt::While { .. } => "while",
        Stmt::For { .. } => "for",
        Stmt::Break(_) => "break",
        Stmt::Continue(_) => "continue",
        Stmt::Class { .. } => "class",
        Stmt::Module { .. } => "module",
        Stmt::TypeAlias { .. } => "typealias",
        Stmt::Try { .. } => "try",
        Stmt::FunctionDecl(_) => "fn",
        Stmt::Return(..) => "return",
        Stmt::Throw(..) => "throw",
        Stmt::Import(..) => "import",
    }
}

fn normalize_index(i: i64, len: usize) -> Option<usize> {
    if i >= 0 {
        Some(i as usize)
    } else {
        len.checked_sub((-i) as usize)
    }
}

pub fn index_get(base: &Value, index: &Value, pos: Pos) -> Result<Value, EvalError> {
    match (base, index) {
        (Value::Array(items), Value::Int(i)) => {
            let items = items.borrow();
            match normalize_index(*i, items.len()) {
                Some(idx) if idx < items.len() => Ok(items[idx].clone()),
                _ => Err(EvalError::IndexOutOfRange {
                    index: *i,
                    len: items.len(),
                    pos,
                }),
            }
        }
        (Value::String(s), Value::Int(i)) => {
            let bytes = s.as_bytes();
            match normalize_index(*i, bytes.len()) {
                Some(idx) if idx < bytes.len() => Ok(Value::string((bytes[idx] as char).to_string())),
                _ => Err(EvalError::IndexOutOfRange {
                    index: *i,
                    len: bytes.len(),
                    pos,
                }),
            }
        }
        (Value::Object(fields, _), Value::String(key)) => fields
            .borrow()
            .get(key.as_ref())
            .cloned()
            .ok_or_else(|| EvalError::NoSuchKey {
                key: key.to_string(),
                pos,
            }),
        _ => Err(EvalError::type_error(
            "index",
            "array[int], string[int] or object[string]",
            base,
            pos,
        )),
    }
}

/// Wraps `v` as a bound method on `base` when it's callable, so `obj.method()`
/// binds `self` whether `method` lives on a plain object or an instance's
/// own fields, not just through the class-method fallback.
fn bind_if_callable(base: &Value, v: &Value) -> Value {
    if v.is_callable() {
        Value::BoundMethod(Box::new(base.clone()), Box::new(v.clone()))
    } else {
        v.clone()
    }
}

pub fn member_get(base: &Value, field: &str, pos: Pos) -> Result<Value, EvalError> {
    match base {
        Value::Object(fields, ObjectKind::Instance) => {
            if let Some(v) = fields.borrow().get(field) {
                return Ok(bind_if_callable(base, v));
            }
            let class = fields.borrow().get("__class__").cloned();
            if let Some(Value::Object(class_fields, ObjectKind::Class)) = class {
                if let Some(method) = class_fields.borrow().get(field) {
                    return Ok(Value::BoundMethod(Box::new(base.clone()), Box::new(method.clone())));
                }
            }
            Err(EvalError::NoSuchKey {
                key: field.to_string(),
                pos,
            })
        }
        Value::Object(fields, _) => fields
            .borrow()
            .get(field)
            .map(|v| bind_if_callable(base, v))
            .ok_or_else(|| EvalError::NoSuchKey {
                key: field.to_string(),
                pos,
            }),
        other => Err(EvalError::type_error("member access", "object", other, pos)),
    }
}

pub fn eval_neg(v: &Value, pos: Pos) -> Result<Value, EvalError> {
    match v {
        Value::Int(n) => Ok(Value::Int(-n)),
        other => Err(EvalError::type_error("unary '-'", "int", other, pos)),
    }
}

/// Non-short-circuit binary operators: arithmetic, equality, and ordering.
/// `&&`, `||`, and `??` are handled by their callers so they keep
/// short-circuit semantics in the tree walker.
pub fn eval_binary_strict(op: BinaryOp, l: &Value, r: &Value, pos: Pos) -> Result<Value, EvalError> {
    use BinaryOp::*;
    match op {
        Eq => return Ok(Value::Bool(l.nyx_eq(r))),
        Neq => return Ok(Value::Bool(!l.nyx_eq(r))),
        _ => {}
    }
    match (op, l, r) {
        (Add, Value::Int(a), Value::Int(b)) => Ok(Value::Int(a + b)),
        (Add, Value::String(a), Value::String(b)) => Ok(Value::string(format!("{a}{b}"))),
        (Sub, Value::Int(a), Value::Int(b)) => Ok(Value::Int(a - b)),
        (Mul, Value::Int(a), Value::Int(b)) => Ok(Value::Int(a * b)),
        (Div, Value::Int(_), Value::Int(0)) => Err(EvalError::DivisionByZero { pos }),
        (Div, Value::Int(a), Value::Int(b)) => Ok(Value::Int(a / b)),
        (Mod, Value::Int(_), Value::Int(0)) => Err(EvalError::DivisionByZero { pos }),
        (Mod, Value::Int(a), Value::Int(b)) => Ok(Value::Int(a % b)),
        (Lt, Value::Int(a), Value::Int(b)) => Ok(Value::Bool(a < b)),
        (Gt, Value::Int(a), Value::Int(b)) => Ok(Value::Bool(a > b)),
        (Le, Value::Int(a), Value::Int(b)) => Ok(Value::Bool(a <= b)),
        (Ge, Value::Int(a), Value::Int(b)) => Ok(Value::Bool(a >= b)),
        (Add | Sub | Mul | Div | Mod, other, _) | (Lt | Gt | Le | Ge, other, _) => {
            Err(EvalError::type_error("binary operator", "int", other, pos))
        }
        _ => unreachable!("And/Or/Coalesce handled by caller"),
    }
}

type Pair = (Option<Value>, Value);

fn iter_pairs(value: &Value, pos: Pos) -> Result<Vec<Pair>, EvalError> {
    match value {
        Value::Array(items) => Ok(items
            .borrow()
            .iter()
            .enumerate()
            .map(|(i, v)| (Some(Value::Int(i as i64)), v.clone()))
            .collect()),
        Value::Object(fields, _) => Ok(fields
            .borrow()
            .iter()
            .map(|(k, v)| (Some(Value::string(k.clone())), v.clone()))
            .collect()),
        other => Err(EvalError::NotIterable {
            actual: other.type_name().to_string(),
            pos,
        }),
    }
}

fn bind_for_head(head: &ForHead, key: Option<Value>, value: Value, env: &Rc<Environment>) {
    match head {
        ForHead::Single(name) => env.define(name.clone(), value),
        ForHead::Pair(k, v) => {
            env.define(k.clone(), key.unwrap_or(Value::Null));
            env.define(v.clone(), value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_program;

    fn run_src(src: &str) -> Rc<Environment> {
        let block = parse_program(src).unwrap();
        let interp = Interp::new(
            Quotas::default(),
            DebugConfig::default(),
            VmMode::Off,
            vec![],
            Rc::from("main.nx"),
        );
        let env = Environment::new();
        crate::builtins::register_all(&env);
        interp.run(&block, &env).unwrap();
        env
    }

    #[test]
    fn closure_captures_outer_variable() {
        let env = run_src(
            r#"
            fn make_adder(n) {
                fn add(x) { return x + n; }
                return add;
            }
            let add5 = make_adder(5);
            let result = add5(10);
            "#,
        );
        assert!(matches!(env.get("result"), Some(Value::Int(15))));
    }

    #[test]
    fn for_loop_with_index() {
        let env = run_src(
            r#"
            let total = 0;
            for (i, x in [10, 20, 30]) {
                total = total + i + x;
            }
            "#,
        );
        assert!(matches!(env.get("total"), Some(Value::Int(63))));
    }

    #[test]
    fn try_catch_recovers_from_throw() {
        let env = run_src(
            r#"
            let caught = null;
            try {
                throw "boom";
            } catch (e) {
                caught = e;
            }
            "#,
        );
        match env.get("caught") {
            Some(Value::String(s)) => assert_eq!(&*s, "boom"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn class_new_invokes_init() {
        let env = run_src(
            r#"
            class Point {
                fn init(self, x, y) {
                    self.x = x;
                    self.y = y;
                }
                fn sum(self) {
                    return self.x + self.y;
                }
            }
            let p = new(Point, 3, 4);
            let s = p.sum();
            "#,
        );
        assert!(matches!(env.get("s"), Some(Value::Int(7))));
    }
}
