// ABOUTME: Import flattening and tree-walker/VM agreement, driven through resolve_program

use nyx::ast::Stmt;
use nyx::config::{DebugConfig, Quotas};
use nyx::env::Environment;
use nyx::import::resolve_program;
use nyx::interpreter::{Interp, VmMode};
use nyx::parser::parse_program;
use nyx::value::Value;
use std::io::Write;
use std::rc::Rc;

fn write_script(dir: &std::path::Path, name: &str, body: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    let mut f = std::fs::File::create(&path).unwrap();
    f.write_all(body.as_bytes()).unwrap();
    path
}

#[test]
fn importing_the_same_local_file_twice_flattens_once() {
    let dir = tempfile::tempdir().unwrap();
    write_script(dir.path(), "util.nx", "fn twice(x) { return x * 2; }");
    let entry = write_script(
        dir.path(),
        "main.nx",
        r#"import "util.nx"; import "util.nx"; let n = twice(21);"#,
    );

    let program = resolve_program(&entry).unwrap();
    let fn_decls = program
        .stmts
        .iter()
        .filter(|s| matches!(s, Stmt::FunctionDecl(f) if f.name == "twice"))
        .count();
    assert_eq!(fn_decls, 1);

    let interp = Interp::new(Quotas::default(), DebugConfig::default(), VmMode::Off, vec![], Rc::from(entry.to_string_lossy().as_ref()));
    let env = Environment::new();
    nyx::builtins::register_all(&env);
    interp.run(&program, &env).unwrap();
    assert!(matches!(env.get("n"), Some(Value::Int(42))));
}

#[test]
fn a_dependency_cycle_resolves_without_looping_forever() {
    let dir = tempfile::tempdir().unwrap();
    write_script(dir.path(), "a.nx", r#"import "b.nx"; fn from_a() { return 1; }"#);
    write_script(dir.path(), "b.nx", r#"import "a.nx"; fn from_b() { return 2; }"#);
    let entry = write_script(dir.path(), "main.nx", r#"import "a.nx"; let total = from_a() + from_b();"#);

    let program = resolve_program(&entry).unwrap();
    let interp = Interp::new(Quotas::default(), DebugConfig::default(), VmMode::Off, vec![], Rc::from(entry.to_string_lossy().as_ref()));
    let env = Environment::new();
    nyx::builtins::register_all(&env);
    interp.run(&program, &env).unwrap();
    assert!(matches!(env.get("total"), Some(Value::Int(3))));
}

#[test]
fn canned_math_module_is_reachable_through_the_cy_prefix() {
    let dir = tempfile::tempdir().unwrap();
    let entry = write_script(dir.path(), "main.nx", r#"import "cy:math"; let c = math.clamp(99, 0, 10);"#);

    let program = resolve_program(&entry).unwrap();
    let interp = Interp::new(Quotas::default(), DebugConfig::default(), VmMode::Off, vec![], Rc::from(entry.to_string_lossy().as_ref()));
    let env = Environment::new();
    nyx::builtins::register_all(&env);
    interp.run(&program, &env).unwrap();
    assert!(matches!(env.get("c"), Some(Value::Int(10))));
}

/// Runs the same source once with the tree walker and once with the VM
/// (falling back per-expression) and asserts they print identical output,
/// covering every non-short-circuiting expression form the VM compiles.
fn run_and_capture(src: &str, vm_mode: VmMode) -> Vec<Value> {
    let block = parse_program(src).unwrap();
    let interp = Interp::new(Quotas::default(), DebugConfig::default(), vm_mode, vec![], Rc::from("main.nx"));
    let env = Environment::new();
    nyx::builtins::register_all(&env);
    let mut results = Vec::new();
    for stmt in &block.stmts {
        if let Stmt::ExprStmt(expr, _) = stmt {
            results.push(interp.eval_expr(expr, &env).unwrap());
        } else {
            interp.run(&nyx::ast::Block { stmts: vec![stmt.clone()] }, &env).unwrap();
        }
    }
    results
}

#[test]
fn tree_walker_and_vm_agree_on_arithmetic_and_containers() {
    let src = r#"
        1 + 2 * 3;
        [1, 2, 3][1];
        {a: 1, b: 2}.b;
        (4 > 2) == true;
        [x * x for x in [1, 2, 3]];
    "#;
    let tree = run_and_capture(src, VmMode::Off);
    let vm = run_and_capture(src, VmMode::On);
    assert_eq!(tree.len(), vm.len());
    for (a, b) in tree.iter().zip(vm.iter()) {
        assert!(a.nyx_eq(b) || format!("{a:?}") == format!("{b:?}"));
    }
}
