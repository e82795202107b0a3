// ABOUTME: Black-box scripts exercised through the full parse -> interpret pipeline

use nyx::config::{DebugConfig, Quotas};
use nyx::env::Environment;
use nyx::interpreter::{Interp, VmMode};
use nyx::parser::parse_program;
use nyx::value::Value;
use std::rc::Rc;

fn run(src: &str) -> Rc<Environment> {
    let block = parse_program(src).unwrap();
    let interp = Interp::new(Quotas::default(), DebugConfig::default(), VmMode::Off, vec![], Rc::from("main.nx"));
    let env = Environment::new();
    nyx::builtins::register_all(&env);
    interp.run(&block, &env).unwrap();
    env
}

#[test]
fn hello_world_prints_without_panicking() {
    run(r#"print("hello, nyx");"#);
}

#[test]
fn closure_captures_an_outer_parameter() {
    let env = run(
        r#"
        fn make_adder(n) {
            fn add(x) { return x + n; }
            return add;
        }
        let add5 = make_adder(5);
        let add10 = make_adder(10);
        let a = add5(1);
        let b = add10(1);
        "#,
    );
    assert!(matches!(env.get("a"), Some(Value::Int(6))));
    assert!(matches!(env.get("b"), Some(Value::Int(11))));
}

#[test]
fn for_loop_exposes_index_and_value() {
    let env = run(
        r#"
        let pairs = [];
        for (i, x in ["a", "b", "c"]) {
            push(pairs, [i, x]);
        }
        let first = pairs[0];
        let last = pairs[2];
        "#,
    );
    match env.get("first") {
        Some(Value::Array(items)) => {
            let items = items.borrow();
            assert!(matches!(items[0], Value::Int(0)));
            assert!(matches!(&items[1], Value::String(s) if &**s == "a"));
        }
        other => panic!("unexpected: {other:?}"),
    }
    match env.get("last") {
        Some(Value::Array(items)) => assert!(matches!(items.borrow()[0], Value::Int(2))),
        other => panic!("unexpected: {other:?}"),
    }
}

#[test]
fn array_comprehension_with_filter() {
    let env = run("let evens = [x * x for x in range(10) if x % 2 == 0];");
    match env.get("evens") {
        Some(Value::Array(items)) => {
            let items = items.borrow();
            let ints: Vec<i64> = items
                .iter()
                .map(|v| match v {
                    Value::Int(n) => *n,
                    _ => panic!("expected int"),
                })
                .collect();
            assert_eq!(ints, vec![0, 4, 16, 36, 64]);
        }
        other => panic!("unexpected: {other:?}"),
    }
}

#[test]
fn throw_is_caught_by_the_nearest_try() {
    let env = run(
        r#"
        let caught = null;
        fn risky(x) {
            if (x < 0) { throw "negative"; }
            return x;
        }
        try {
            risky(-1);
        } catch (e) {
            caught = e;
        }
        "#,
    );
    match env.get("caught") {
        Some(Value::String(s)) => assert_eq!(&*s, "negative"),
        other => panic!("unexpected: {other:?}"),
    }
}

#[test]
fn class_instance_dispatches_through_init_and_methods() {
    let env = run(
        r#"
        class Point {
            fn init(self, x, y) {
                self.x = x;
                self.y = y;
            }
            fn length_sq(self) {
                return self.x * self.x + self.y * self.y;
            }
        }
        let p = new(Point, 3, 4);
        let n = p.length_sq();
        let kind = type_of(p);
        "#,
    );
    assert!(matches!(env.get("n"), Some(Value::Int(25))));
    match env.get("kind") {
        Some(Value::String(s)) => assert_eq!(&*s, "object"),
        other => panic!("unexpected: {other:?}"),
    }
}

#[test]
fn module_statement_groups_functions_under_a_namespace() {
    let env = run(
        r#"
        module shapes {
            fn square(x) { return x * x; }
        }
        let n = shapes.square(6);
        "#,
    );
    assert!(matches!(env.get("n"), Some(Value::Int(36))));
}

#[test]
fn switch_falls_back_to_default_case() {
    let env = run(
        r#"
        fn classify(x) {
            switch (x) {
                case 1: return "one";
                case 2: return "two";
                default: return "other";
            }
        }
        let a = classify(1);
        let b = classify(99);
        "#,
    );
    match (env.get("a"), env.get("b")) {
        (Some(Value::String(a)), Some(Value::String(b))) => {
            assert_eq!(&*a, "one");
            assert_eq!(&*b, "other");
        }
        other => panic!("unexpected: {other:?}"),
    }
}
