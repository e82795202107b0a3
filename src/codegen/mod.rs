// ABOUTME: C transpiler: lowers a resolved program to a single translation unit

use crate::ast::{AssignTarget, BinaryOp, Block, Expr, ForHead, FunctionDecl, Stmt, UnaryOp};
use crate::error::{CodegenError, Pos};
use indexmap::{IndexMap, IndexSet};

const RUNTIME_C: &str = include_str!("runtime.c");

/// Compile-time scope chain used only to assign unique C-local names and
/// to tell "already a local" apart from "must fall through to the
/// builtin/user-function table" (§4.H translation rules). Unlike the
/// runtime `Environment`, this never holds values, only mangled names.
struct Scope {
    frames: Vec<IndexMap<String, String>>,
    next_local: u32,
}

impl Scope {
    fn new() -> Self {
        Scope { frames: vec![IndexMap::new()], next_local: 0 }
    }

    fn push(&mut self) {
        self.frames.push(IndexMap::new());
    }

    fn pop(&mut self) {
        self.frames.pop();
    }

    /// Mints a fresh `__cy_<base>_<N>` local for `name` in the current
    /// block, or reuses the existing one if this exact block already
    /// declared it (a top-level pre-declaration pass runs before function
    /// bodies are translated so closures can see later top-level names;
    /// redeclaring `let x` twice in one block also just shadows in place,
    /// matching the runtime env's last-write-wins lookup).
    fn declare(&mut self, name: &str) -> String {
        if let Some(existing) = self.frames.last().unwrap().get(name) {
            return existing.clone();
        }
        let mangled = format!("__cy_{}_{}", sanitize(name), self.next_local);
        self.next_local += 1;
        self.frames.last_mut().unwrap().insert(name.to_string(), mangled.clone());
        mangled
    }

    fn resolve(&self, name: &str) -> Option<&str> {
        for frame in self.frames.iter().rev() {
            if let Some(m) = frame.get(name) {
                return Some(m);
            }
        }
        None
    }
}

fn sanitize(name: &str) -> String {
    name.chars().map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' }).collect()
}

fn c_string_literal(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for ch in s.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

static BUILTIN_NAMES: &[&str] = &[
    "print", "read", "write", "argc", "argv", "len", "all", "any", "range", "push", "pop",
    "object_new", "object_set", "object_get", "has", "keys", "values",
    "items", "type", "type_of", "is_int", "is_bool", "is_string", "is_array",
    "is_function", "is_null", "str", "int", "abs", "min", "max", "clamp", "sum", "new",
    "class_new", "class_with_ctor", "class_set_method", "class_name", "class_instantiate0",
    "class_instantiate1", "class_instantiate2", "class_call0", "class_call1", "class_call2",
    "lang_version", "require_version",
];

struct CompSite {
    id: u32,
    body_c: String,
}

pub struct Codegen {
    scope: Scope,
    functions: IndexMap<String, Pos>,
    function_bodies: Vec<String>,
    prototypes: Vec<String>,
    dispatch_entries: Vec<(String, String)>,
    comp_sites: Vec<CompSite>,
}

impl Codegen {
    fn new() -> Self {
        Codegen {
            scope: Scope::new(),
            functions: IndexMap::new(),
            function_bodies: Vec::new(),
            prototypes: Vec::new(),
            dispatch_entries: Vec::new(),
            comp_sites: Vec::new(),
        }
    }

    fn register_function(&mut self, name: &str, pos: Pos) -> Result<String, CodegenError> {
        if self.functions.contains_key(name) {
            return Err(CodegenError::DuplicateFunction { name: name.to_string(), pos });
        }
        self.functions.insert(name.to_string(), pos);
        let mangled = format!("nyx_fn_{}", sanitize(name));
        self.dispatch_entries.push((name.to_string(), mangled.clone()));
        Ok(mangled)
    }

    /// Forward discovery pass (§4.H.2): every `fn` anywhere in the program
    /// is globally scoped, including inside class bodies, module bodies,
    /// and nested control flow, so duplicate names are caught before any
    /// translation happens.
    fn discover(&mut self, block: &Block) -> Result<(), CodegenError> {
        for stmt in &block.stmts {
            self.discover_stmt(stmt)?;
        }
        Ok(())
    }

    fn discover_stmt(&mut self, stmt: &Stmt) -> Result<(), CodegenError> {
        match stmt {
            Stmt::FunctionDecl(f) => {
                self.register_function(&f.name, f.pos)?;
                // Closures are ordinary nested `fn` declarations, so a
                // function's own body can hide further user functions.
                self.discover(&f.body)?;
            }
            Stmt::Class { methods, .. } => {
                for m in methods {
                    self.register_function(&m.name, m.pos)?;
                    self.discover(&m.body)?;
                }
            }
            Stmt::Module { body, .. } => self.discover(body)?,
            Stmt::If { then_block, else_block, .. } => {
                self.discover(then_block)?;
                if let Some(b) = else_block {
                    self.discover(b)?;
                }
            }
            Stmt::Switch { cases, default, .. } => {
                for c in cases {
                    self.discover(&c.body)?;
                }
                if let Some(d) = default {
                    self.discover(d)?;
                }
            }
            Stmt::While { body, .. } | Stmt::For { body, .. } => self.discover(body)?,
            Stmt::Try { body, catch_body, .. } => {
                self.discover(body)?;
                self.discover(catch_body)?;
            }
            _ => {}
        }
        Ok(())
    }

    fn resolve_ident(&self, name: &str) -> Result<String, CodegenError> {
        if let Some(mangled) = self.scope.resolve(name) {
            return Ok(format!("nyx_env_lookup(env, \"{mangled}\")"));
        }
        if BUILTIN_NAMES.contains(&name) {
            return Ok(format!(
                "nyx_make_builtin({}, nyx_b_{})",
                c_string_literal(name),
                sanitize(name)
            ));
        }
        if let Some(mangled) = self.functions.get(name).map(|_| format!("nyx_fn_{}", sanitize(name))) {
            return Ok(format!("nyx_make_function({mangled}, env, {})", c_string_literal(name)));
        }
        Err(CodegenError::Unsupported(format!("undefined identifier '{name}'"), Pos::default()))
    }

    fn translate_expr(&mut self, expr: &Expr) -> Result<String, CodegenError> {
        Ok(match expr {
            Expr::Int(n, _, _) => format!("nyx_int({n}LL)"),
            Expr::Str(s, _, _) => format!("nyx_string({})", c_string_literal(s)),
            Expr::Bool(b, _, _) => format!("nyx_bool({})", if *b { 1 } else { 0 }),
            Expr::Null(_, _) => "nyx_null()".to_string(),
            Expr::Ident(name, _, _) => self.resolve_ident(name)?,
            Expr::Array(items, _, _) => {
                let parts = items
                    .iter()
                    .map(|it| self.translate_expr(it))
                    .collect::<Result<Vec<_>, _>>()?;
                format!(
                    "nyx_array_of({}, (NyxValue[]){{{}}})",
                    parts.len(),
                    parts.join(", ")
                )
            }
            Expr::Object(entries, _, _) => {
                let mut keys = Vec::new();
                let mut vals = Vec::new();
                for (k, v) in entries {
                    keys.push(c_string_literal(k));
                    vals.push(self.translate_expr(v)?);
                }
                format!(
                    "nyx_object_of('p', {}, (const char*[]){{{}}}, (NyxValue[]){{{}}})",
                    keys.len(),
                    keys.join(", "),
                    vals.join(", ")
                )
            }
            Expr::ArrayComprehension { element, vars, iterable, filter, id, .. } => {
                self.translate_comprehension(*id, element, vars, iterable, filter.as_deref())?
            }
            Expr::Index(base, index, _, _) => {
                format!("nyx_index_get({}, {})", self.translate_expr(base)?, self.translate_expr(index)?)
            }
            Expr::Member(base, field, _, _) => {
                format!("nyx_member_get({}, {})", self.translate_expr(base)?, c_string_literal(field))
            }
            Expr::Unary(UnaryOp::Neg, operand, _, _) => format!("nyx_neg({})", self.translate_expr(operand)?),
            Expr::Unary(UnaryOp::Not, operand, _, _) => {
                format!("nyx_bool(!nyx_is_truthy({}))", self.translate_expr(operand)?)
            }
            Expr::Binary(op, lhs, rhs, _, _) => {
                let l = self.translate_expr(lhs)?;
                let r = self.translate_expr(rhs)?;
                let helper = match op {
                    BinaryOp::Add => "nyx_add",
                    BinaryOp::Sub => "nyx_sub",
                    BinaryOp::Mul => "nyx_mul",
                    BinaryOp::Div => "nyx_div",
                    BinaryOp::Mod => "nyx_mod",
                    BinaryOp::Eq => "nyx_eqv",
                    BinaryOp::Neq => "nyx_neqv",
                    BinaryOp::Lt => "nyx_lt",
                    BinaryOp::Gt => "nyx_gt",
                    BinaryOp::Le => "nyx_le",
                    BinaryOp::Ge => "nyx_ge",
                    BinaryOp::And => "nyx_and",
                    BinaryOp::Or => "nyx_or",
                    BinaryOp::Coalesce => "nyx_coalesce",
                };
                format!("{helper}({l}, {r})")
            }
            Expr::Call(callee, args, _, _) => {
                let callee_c = self.translate_expr(callee)?;
                let arg_parts = args.iter().map(|a| self.translate_expr(a)).collect::<Result<Vec<_>, _>>()?;
                format!(
                    "nyx_call({callee_c}, (NyxValue[]){{{}}}, {})",
                    if arg_parts.is_empty() { "nyx_null()".to_string() } else { arg_parts.join(", ") },
                    arg_parts.len()
                )
            }
        })
    }

    /// Free identifiers referenced by `element`/`filter` that are bound in
    /// the *enclosing* compile-time scope (so the comprehension call site
    /// must capture them) rather than by the comprehension's own `vars` or
    /// by a builtin/global function (which the dispatcher can resolve on
    /// its own, §4.H.6).
    fn comprehension_captures(&self, element: &Expr, filter: Option<&Expr>, vars: &crate::ast::ComprehensionVars) -> IndexSet<String> {
        let mut bound = IndexSet::new();
        bound.insert(vars.value.clone());
        if let Some(k) = &vars.key {
            bound.insert(k.clone());
        }
        let mut found = IndexSet::new();
        collect_idents(element, &mut found);
        if let Some(f) = filter {
            collect_idents(f, &mut found);
        }
        found
            .into_iter()
            .filter(|name| !bound.contains(name) && self.scope.resolve(name).is_some())
            .collect()
    }

    fn translate_comprehension(
        &mut self,
        id: u32,
        element: &Expr,
        vars: &crate::ast::ComprehensionVars,
        iterable: &Expr,
        filter: Option<&Expr>,
    ) -> Result<String, CodegenError> {
        let iterable_c = self.translate_expr(iterable)?;
        let captures = self.comprehension_captures(element, filter, vars);
        let mut keys = Vec::new();
        let mut vals = Vec::new();
        for name in &captures {
            keys.push(c_string_literal(name));
            vals.push(self.resolve_ident(name)?);
        }
        let captured_obj = format!(
            "nyx_object_of('p', {}, (const char*[]){{{}}}, (NyxValue[]){{{}}})",
            keys.len(),
            keys.join(", "),
            vals.join(", ")
        );

        // The dispatch case runs in its own isolated scope: captured free
        // vars and the loop-bound names all key themselves by their raw
        // source name, since this scope has no shadowing depth to track.
        self.scope.push();
        for name in &captures {
            self.scope.frames.last_mut().unwrap().insert(name.clone(), name.clone());
        }
        if let Some(k) = &vars.key {
            self.scope.frames.last_mut().unwrap().insert(k.clone(), k.clone());
        }
        self.scope.frames.last_mut().unwrap().insert(vars.value.clone(), vars.value.clone());
        let element_c = self.translate_expr(element)?;
        let filter_c = filter.map(|f| self.translate_expr(f)).transpose()?;
        self.scope.pop();

        let mut body = String::new();
        body.push_str("    NyxArray *out = nyx_array_new_raw();\n");
        body.push_str("    for (size_t __i = 0; __i < iterable.as.arr->len; __i++) {\n");
        body.push_str("        NyxValue __elem = iterable.as.arr->items[__i];\n");
        if let Some(k) = &vars.key {
            body.push_str(&format!("        nyx_env_define(env, \"{k}\", nyx_int((int64_t) __i));\n"));
        }
        body.push_str(&format!("        nyx_env_define(env, \"{}\", __elem);\n", vars.value));
        if let Some(f) = &filter_c {
            body.push_str(&format!("        if (!nyx_is_truthy({f})) continue;\n"));
        }
        body.push_str(&format!("        nyx_array_push_raw(out, {element_c});\n"));
        body.push_str("    }\n");
        body.push_str("    { NyxValue __r; __r.tag = NYX_ARRAY; __r.as.arr = out; return __r; }\n");

        self.comp_sites.push(CompSite { id, body_c: body });

        Ok(format!("nyx_comp_dispatch({id}, {iterable_c}, {captured_obj})"))
    }

    fn translate_block(&mut self, block: &Block) -> Result<String, CodegenError> {
        self.scope.push();
        let mut out = String::new();
        for stmt in &block.stmts {
            out.push_str(&self.translate_stmt(stmt)?);
        }
        self.scope.pop();
        Ok(out)
    }

    fn translate_stmt(&mut self, stmt: &Stmt) -> Result<String, CodegenError> {
        Ok(match stmt {
            Stmt::Let(name, expr, _) => {
                let value = self.translate_expr(expr)?;
                let mangled = self.scope.declare(name);
                format!("    nyx_env_define(env, \"{mangled}\", {value});\n")
            }
            Stmt::Assign(target, expr, pos) => {
                let value = self.translate_expr(expr)?;
                self.translate_assign(target, &value, *pos)?
            }
            Stmt::ExprStmt(expr, _) => {
                let value = self.translate_expr(expr)?;
                format!("    nyx_check_step(); {{ NyxValue __v = {value}; if (__v.tag != NYX_NULL) {{ nyx_print_one(__v); printf(\"\\n\"); }} }}\n")
            }
            Stmt::If { cond, then_block, else_block, .. } => {
                let c = self.translate_expr(cond)?;
                let then_c = self.translate_block(then_block)?;
                let else_c = match else_block {
                    Some(b) => format!(" else {{\n{}    }}", self.translate_block(b)?),
                    None => String::new(),
                };
                format!("    if (nyx_is_truthy({c})) {{\n{then_c}    }}{else_c}\n")
            }
            Stmt::Switch { subject, cases, default, .. } => {
                let subj = self.translate_expr(subject)?;
                let mut out = format!("    {{ NyxValue __subj = {subj}; int __matched = 0;\n");
                for case in cases {
                    let case_val = self.translate_expr(&case.value)?;
                    let body = self.translate_block(&case.body)?;
                    out.push_str(&format!("    if (!__matched && nyx_eq(__subj, {case_val})) {{ __matched = 1;\n{body}    }}\n"));
                }
                if let Some(default) = default {
                    let body = self.translate_block(default)?;
                    out.push_str(&format!("    if (!__matched) {{\n{body}    }}\n"));
                }
                out.push_str("    }\n");
                out
            }
            Stmt::While { cond, body, .. } => {
                let c = self.translate_expr(cond)?;
                let body_c = self.translate_block(body)?;
                format!("    while (nyx_is_truthy({c})) {{\n        nyx_check_step();\n{body_c}    }}\n")
            }
            Stmt::For { head, iterable, body, .. } => {
                let it = self.translate_expr(iterable)?;
                self.scope.push();
                let (key_decl, val_decl) = match head {
                    ForHead::Single(v) => (None, self.scope.declare(v)),
                    ForHead::Pair(k, v) => (Some(self.scope.declare(k)), self.scope.declare(v)),
                };
                let mut body_c = String::new();
                for s in &body.stmts {
                    body_c.push_str(&self.translate_stmt(s)?);
                }
                self.scope.pop();
                // Arrays iterate by index (key = int index), objects by
                // insertion order (key = string key), matching the tree
                // interpreter's iter_pairs; branch on the runtime tag since
                // Nyx has no static type to pick a loop shape at codegen time.
                let mut out = format!("    {{ NyxValue __iter = {it};\n");
                out.push_str("    if (__iter.tag == NYX_ARRAY) {\n");
                out.push_str("        for (size_t __i = 0; __i < __iter.as.arr->len; __i++) {\n            nyx_check_step();\n");
                if let Some(k) = &key_decl {
                    out.push_str(&format!("            nyx_env_define(env, \"{k}\", nyx_int((int64_t) __i));\n"));
                }
                out.push_str(&format!("            nyx_env_define(env, \"{val_decl}\", __iter.as.arr->items[__i]);\n"));
                out.push_str(&body_c);
                out.push_str("        }\n");
                out.push_str("    } else if (__iter.tag == NYX_OBJECT) {\n");
                out.push_str("        for (size_t __i = 0; __i < __iter.as.obj->len; __i++) {\n            nyx_check_step();\n");
                if let Some(k) = &key_decl {
                    out.push_str(&format!("            nyx_env_define(env, \"{k}\", nyx_string(__iter.as.obj->keys[__i]));\n"));
                }
                out.push_str(&format!("            nyx_env_define(env, \"{val_decl}\", __iter.as.obj->vals[__i]);\n"));
                out.push_str(&body_c);
                out.push_str("        }\n");
                out.push_str("    } else {\n        nyx_type_error(\"for-loop iterable\");\n    }\n");
                out.push_str("    }\n");
                out
            }
            Stmt::Break(_) => "    break;\n".to_string(),
            Stmt::Continue(_) => "    continue;\n".to_string(),
            Stmt::Class { name, methods, pos } => {
                let mut keys = Vec::new();
                let mut vals = Vec::new();
                keys.push(c_string_literal("__name__"));
                vals.push(format!("nyx_string({})", c_string_literal(name)));
                for m in methods {
                    let mangled = self.functions.get(&m.name).cloned().map(|_| format!("nyx_fn_{}", sanitize(&m.name)));
                    let mangled = mangled.ok_or_else(|| CodegenError::Unsupported(format!("method '{}' not registered", m.name), *pos))?;
                    keys.push(c_string_literal(&m.name));
                    vals.push(format!("nyx_make_function({mangled}, env, {})", c_string_literal(&m.name)));
                }
                let mangled = self.scope.declare(name);
                format!(
                    "    nyx_env_define(env, \"{mangled}\", nyx_object_of('c', {}, (const char*[]){{{}}}, (NyxValue[]){{{}}}));\n",
                    keys.len(),
                    keys.join(", "),
                    vals.join(", ")
                )
            }
            Stmt::Module { name, body, .. } => {
                let mut keys = Vec::new();
                let mut vals = Vec::new();
                for s in &body.stmts {
                    match s {
                        Stmt::Let(n, e, _) => {
                            keys.push(c_string_literal(n));
                            vals.push(self.translate_expr(e)?);
                        }
                        Stmt::FunctionDecl(f) => {
                            let mangled = format!("nyx_fn_{}", sanitize(&f.name));
                            keys.push(c_string_literal(&f.name));
                            vals.push(format!("nyx_make_function({mangled}, env, {})", c_string_literal(&f.name)));
                        }
                        _ => {}
                    }
                }
                let mangled = self.scope.declare(name);
                format!(
                    "    nyx_env_define(env, \"{mangled}\", nyx_object_of('m', {}, (const char*[]){{{}}}, (NyxValue[]){{{}}}));\n",
                    keys.len(),
                    keys.join(", "),
                    vals.join(", ")
                )
            }
            Stmt::TypeAlias { .. } => String::new(),
            Stmt::Try { body, catch_var, catch_body, .. } => {
                let body_c = self.translate_block(body)?;
                self.scope.push();
                let mangled = self.scope.declare(catch_var);
                let catch_c = {
                    let mut out = String::new();
                    for s in &catch_body.stmts {
                        out.push_str(&self.translate_stmt(s)?);
                    }
                    out
                };
                self.scope.pop();
                format!(
                    "    {{ NyxExcFrame __frame;\n      if (NYX_TRY(__frame)) {{\n{body_c}      }} else {{\n        nyx_env_define(env, \"{mangled}\", __frame.thrown);\n{catch_c}      }}\n    }}\n"
                )
            }
            Stmt::FunctionDecl(f) => {
                let mangled = format!("nyx_fn_{}", sanitize(&f.name));
                let key = self.scope.declare(&f.name);
                format!("    nyx_env_define(env, \"{key}\", nyx_make_function({mangled}, env, {}));\n", c_string_literal(&f.name))
            }
            Stmt::Return(expr, _) => match expr {
                Some(e) => format!("    return {};\n", self.translate_expr(e)?),
                None => "    return nyx_null();\n".to_string(),
            },
            Stmt::Throw(expr, _) => format!("    nyx_throw({});\n", self.translate_expr(expr)?),
            Stmt::Import(..) => String::new(),
        })
    }

    fn translate_assign(&mut self, target: &AssignTarget, value: &str, pos: Pos) -> Result<String, CodegenError> {
        Ok(match target {
            AssignTarget::Ident(name, _) => {
                let mangled = self
                    .scope
                    .resolve(name)
                    .ok_or_else(|| CodegenError::Unsupported(format!("assignment to undefined '{name}'"), pos))?
                    .to_string();
                format!("    nyx_env_assign(env, \"{mangled}\", {value});\n")
            }
            AssignTarget::Member(base, field, _) => {
                let base_c = self.translate_expr(base)?;
                format!("    nyx_member_set({base_c}, {}, {value});\n", c_string_literal(field))
            }
            AssignTarget::Index(base, index, _) => {
                let base_c = self.translate_expr(base)?;
                let index_c = self.translate_expr(index)?;
                format!("    nyx_index_set({base_c}, {index_c}, {value});\n")
            }
        })
    }

    fn translate_function(&mut self, f: &FunctionDecl) -> Result<(), CodegenError> {
        let mangled = format!("nyx_fn_{}", sanitize(&f.name));
        self.scope.push();
        let mut header = format!("static NyxValue {mangled}(NyxEnv *closure, NyxValue *argv, int argc) {{\n");
        header.push_str("    (void) argc;\n    NyxEnv *env = nyx_env_new(closure);\n");
        for (i, p) in f.params.iter().enumerate() {
            let key = self.scope.declare(&p.name);
            header.push_str(&format!("    nyx_env_define(env, \"{key}\", argv[{i}]);\n"));
        }
        // Translate any `fn` nested directly in this body while our own
        // scope frame (params) is still on the stack, so the nested
        // function's free-variable references resolve against it.
        self.collect_functions(&f.body)?;
        let mut body = String::new();
        for s in &f.body.stmts {
            body.push_str(&self.translate_stmt(s)?);
        }
        self.scope.pop();
        header.push_str(&body);
        header.push_str("    return nyx_null();\n}\n\n");
        self.function_bodies.push(header);
        self.prototypes.push(format!("static NyxValue {mangled}(NyxEnv *closure, NyxValue *argv, int argc);"));
        Ok(())
    }

    /// Translates every user function reachable from `block`, recursing
    /// into a function's own body *from inside `translate_function`* (not
    /// after it returns) so a nested `fn` can still resolve its enclosing
    /// function's parameters and locals through the live compile-time
    /// scope stack — this is how closures like `make_adder`/`add` keep
    /// working once every function becomes an independent global symbol.
    fn collect_functions(&mut self, block: &Block) -> Result<(), CodegenError> {
        for stmt in &block.stmts {
            match stmt {
                Stmt::FunctionDecl(f) => {
                    self.translate_function(f)?;
                }
                Stmt::Class { methods, .. } => {
                    for m in methods {
                        self.translate_function(m)?;
                    }
                }
                Stmt::Module { body, .. } => self.collect_functions(body)?,
                Stmt::If { then_block, else_block, .. } => {
                    self.collect_functions(then_block)?;
                    if let Some(b) = else_block {
                        self.collect_functions(b)?;
                    }
                }
                Stmt::Switch { cases, default, .. } => {
                    for c in cases {
                        self.collect_functions(&c.body)?;
                    }
                    if let Some(d) = default {
                        self.collect_functions(d)?;
                    }
                }
                Stmt::While { body, .. } | Stmt::For { body, .. } => self.collect_functions(body)?,
                Stmt::Try { body, catch_body, .. } => {
                    self.collect_functions(body)?;
                    self.collect_functions(catch_body)?;
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn render_comp_dispatch(&self) -> String {
        let mut out = String::from("NyxValue nyx_comp_dispatch(int site_id, NyxValue iterable, NyxValue captured) {\n");
        out.push_str("    NyxEnv *env = nyx_env_new(NULL);\n    nyx_env_import_object(env, captured);\n");
        out.push_str("    switch (site_id) {\n");
        for site in &self.comp_sites {
            out.push_str(&format!("    case {}: {{\n{}    }}\n", site.id, site.body_c));
        }
        out.push_str("    default: fprintf(stderr, \"unknown comprehension site\\n\"); exit(1);\n    }\n}\n\n");
        out
    }

    fn render_dispatch_table(&self) -> String {
        let mut out = String::from("NyxDispatchEntry nyx_dispatch_table[] = {\n");
        for (name, mangled) in &self.dispatch_entries {
            out.push_str(&format!("    {{ {}, {} }},\n", c_string_literal(name), mangled));
        }
        out.push_str("};\nconst int nyx_dispatch_table_len = ");
        out.push_str(&self.dispatch_entries.len().to_string());
        out.push_str(";\n\n");
        out
    }
}

fn collect_idents(expr: &Expr, out: &mut IndexSet<String>) {
    match expr {
        Expr::Ident(name, _, _) => {
            out.insert(name.clone());
        }
        Expr::Array(items, _, _) => items.iter().for_each(|e| collect_idents(e, out)),
        Expr::ArrayComprehension { element, iterable, filter, .. } => {
            collect_idents(element, out);
            collect_idents(iterable, out);
            if let Some(f) = filter {
                collect_idents(f, out);
            }
        }
        Expr::Object(entries, _, _) => entries.iter().for_each(|(_, e)| collect_idents(e, out)),
        Expr::Index(b, i, _, _) => {
            collect_idents(b, out);
            collect_idents(i, out);
        }
        Expr::Member(b, _, _, _) => collect_idents(b, out),
        Expr::Unary(_, v, _, _) => collect_idents(v, out),
        Expr::Binary(_, l, r, _, _) => {
            collect_idents(l, out);
            collect_idents(r, out);
        }
        Expr::Call(callee, args, _, _) => {
            collect_idents(callee, out);
            args.iter().for_each(|a| collect_idents(a, out));
        }
        Expr::Int(..) | Expr::Str(..) | Expr::Bool(..) | Expr::Null(..) => {}
    }
}

/// Translate a fully-resolved program into a single C translation unit
/// (§4.H). Top-level statements become `main`'s body; every `fn`
/// anywhere in the program (including class methods) becomes a global
/// C function reachable through the dispatch table.
pub fn generate(program: &Block) -> Result<String, CodegenError> {
    let mut cg = Codegen::new();
    cg.discover(program)?;
    // Pre-declare every top-level name so global function bodies (translated
    // next, before main's statements run) can resolve references to
    // top-level state through the same closure env chain the tree
    // interpreter uses.
    for stmt in &program.stmts {
        match stmt {
            Stmt::Let(name, _, _) => {
                cg.scope.declare(name);
            }
            Stmt::FunctionDecl(f) => {
                cg.scope.declare(&f.name);
            }
            Stmt::Class { name, .. } | Stmt::Module { name, .. } => {
                cg.scope.declare(name);
            }
            _ => {}
        }
    }
    cg.collect_functions(program)?;

    let mut main_body = String::new();
    for stmt in &program.stmts {
        main_body.push_str(&cg.translate_stmt(stmt)?);
    }

    let mut out = String::new();
    out.push_str(RUNTIME_C);
    out.push_str("\n/* ---- generated from the resolved program ---- */\n\n");
    for p in &cg.prototypes {
        out.push_str(p);
        out.push('\n');
    }
    out.push('\n');
    for body in &cg.function_bodies {
        out.push_str(body);
    }
    out.push_str(&cg.render_dispatch_table());
    out.push_str(&cg.render_comp_dispatch());
    out.push_str("int main(int argc, char **argv) {\n");
    out.push_str("    (void) argc; (void) argv;\n");
    out.push_str("    NyxEnv *env = nyx_env_new(NULL);\n");
    out.push_str(&main_body);
    out.push_str("    return 0;\n}\n");
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_program;

    #[test]
    fn generates_a_translation_unit_for_hello_world() {
        let block = parse_program(r#"print("hi");"#).unwrap();
        let c = generate(&block).unwrap();
        assert!(c.contains("int main("));
        assert!(c.contains("nyx_b_print") || c.contains("nyx_make_builtin"));
    }

    #[test]
    fn duplicate_function_names_are_a_codegen_error() {
        let block = parse_program("fn f() { return 1; } fn f() { return 2; }").unwrap();
        let err = generate(&block).unwrap_err();
        assert!(matches!(err, CodegenError::DuplicateFunction { .. }));
    }

    #[test]
    fn undefined_identifier_is_a_codegen_error() {
        let block = parse_program("print(nope);").unwrap();
        let err = generate(&block).unwrap_err();
        assert!(matches!(err, CodegenError::Unsupported(..)));
    }

    #[test]
    fn array_comprehension_captures_free_variables() {
        let block = parse_program("let n = 2; let xs = [x * n for x in [1, 2, 3]];").unwrap();
        let c = generate(&block).unwrap();
        assert!(c.contains("nyx_comp_dispatch"));
        assert!(c.contains("nyx_env_import_object"));
    }

    #[test]
    fn class_methods_become_global_functions_with_unique_names() {
        let block = parse_program(
            r#"
            class Point {
                fn init(self, x) { self.x = x; }
            }
            "#,
        )
        .unwrap();
        let c = generate(&block).unwrap();
        assert!(c.contains("nyx_fn_init"));
    }
}
