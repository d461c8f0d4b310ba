//! Coverage for the fixed builtin set (spec §4.7): conversion, introspection,
//! iteration helpers, math, and the `raise`/`throw` pairing, run against the
//! public `Interpreter::run_source` API.

use sona::config::InterpreterConfig;
use sona::interpreter::Interpreter;
use sona::value::Value;

fn eval(source: &str) -> Value {
    let mut interp = Interpreter::new(InterpreterConfig::default());
    interp.run_source(source).unwrap_or_else(|e| {
        panic!("expected {:?} to succeed, got {}: {}", source, e.kind, e.message)
    })
}

fn eval_err(source: &str) -> String {
    let mut interp = Interpreter::new(InterpreterConfig::default());
    interp
        .run_source(source)
        .expect_err("expected an error")
        .kind
}

#[test]
fn int_converts_float_string_and_bool() {
    assert!(matches!(eval("int(3.9);"), Value::Int(3)));
    assert!(matches!(eval("int(\"42\");"), Value::Int(42)));
    assert!(matches!(eval("int(true);"), Value::Int(1)));
}

#[test]
fn int_on_unparseable_string_is_value_error() {
    assert_eq!(eval_err("int(\"abc\");"), "ValueError");
}

#[test]
fn float_and_str_and_bool_conversions() {
    assert!(matches!(eval("float(\"3.5\");"), Value::Float(f) if f == 3.5));
    match eval("str(42);") {
        Value::String(s) => assert_eq!(&*s, "42"),
        other => panic!("expected string, got {:?}", other.type_name()),
    }
    assert!(matches!(eval("bool(0);"), Value::Bool(false)));
    assert!(matches!(eval("bool(\"x\");"), Value::Bool(true)));
}

#[test]
fn round_trips_int_through_str() {
    // spec §8: str(int("42")) == "42"; int(str(n)) == n for all 64-bit ints.
    match eval("str(int(\"42\"));") {
        Value::String(s) => assert_eq!(&*s, "42"),
        other => panic!("expected string, got {:?}", other.type_name()),
    }
    assert!(matches!(eval("int(str(123456789));"), Value::Int(123456789)));
}

#[test]
fn type_returns_a_string_tag_per_value_kind() {
    for (expr, expected) in [
        ("type(1);", "int"),
        ("type(1.5);", "float"),
        ("type(\"x\");", "string"),
        ("type(true);", "bool"),
        ("type(null);", "null"),
        ("type([1, 2]);", "list"),
        ("type({\"a\": 1});", "dict"),
    ] {
        match eval(expr) {
            Value::String(s) => assert_eq!(&*s, expected, "for {}", expr),
            other => panic!("expected string, got {:?}", other.type_name()),
        }
    }
}

#[test]
fn len_works_on_strings_lists_and_dicts() {
    assert!(matches!(eval("len(\"hello\");"), Value::Int(5)));
    assert!(matches!(eval("len([1, 2, 3]);"), Value::Int(3)));
    assert!(matches!(eval("len({\"a\": 1, \"b\": 2});"), Value::Int(2)));
}

#[test]
fn len_on_non_container_is_type_error() {
    assert_eq!(eval_err("len(5);"), "TypeError");
}

#[test]
fn range_with_one_two_and_three_arguments() {
    assert!(matches!(eval("len(range(0));"), Value::Int(0)));
    match eval("range(3);") {
        Value::List(items) => {
            let items = items.borrow();
            assert_eq!(items.len(), 3);
            assert!(matches!(items[0], Value::Int(0)));
            assert!(matches!(items[2], Value::Int(2)));
        }
        other => panic!("expected list, got {:?}", other.type_name()),
    }
    // range(a, b) where a >= b is empty.
    assert!(matches!(eval("len(range(5, 5));"), Value::Int(0)));
    assert!(matches!(eval("len(range(5, 2));"), Value::Int(0)));
    // range(a, b, -1) counts down.
    match eval("range(5, 2, -1);") {
        Value::List(items) => {
            let items = items.borrow();
            let rendered: Vec<i64> = items
                .iter()
                .map(|v| match v {
                    Value::Int(n) => *n,
                    _ => panic!("expected int"),
                })
                .collect();
            assert_eq!(rendered, [5, 4, 3]);
        }
        other => panic!("expected list, got {:?}", other.type_name()),
    }
}

#[test]
fn range_with_zero_step_is_value_error() {
    assert_eq!(eval_err("range(0, 10, 0);"), "ValueError");
}

#[test]
fn enumerate_pairs_index_with_value() {
    match eval("enumerate([\"a\", \"b\"]);") {
        Value::List(items) => {
            let items = items.borrow();
            assert_eq!(items.len(), 2);
            match &items[0] {
                Value::List(pair) => {
                    let pair = pair.borrow();
                    assert!(matches!(pair[0], Value::Int(0)));
                    match &pair[1] {
                        Value::String(s) => assert_eq!(&**s, "a"),
                        other => panic!("expected string, got {:?}", other.type_name()),
                    }
                }
                other => panic!("expected pair list, got {:?}", other.type_name()),
            }
        }
        other => panic!("expected list, got {:?}", other.type_name()),
    }
}

#[test]
fn math_abs_min_max_round_pow() {
    assert!(matches!(eval("abs(-5);"), Value::Int(5)));
    assert!(matches!(eval("min(3, 1, 2);"), Value::Int(1)));
    assert!(matches!(eval("max(3, 1, 2);"), Value::Int(3)));
    assert!(matches!(eval("round(2.6);"), Value::Int(3)));
    match eval("round(3.14159, 2);") {
        Value::Float(f) => assert!((f - 3.14).abs() < 1e-9),
        other => panic!("expected float, got {:?}", other.type_name()),
    }
    assert!(matches!(eval("pow(2, 10);"), Value::Int(1024)));
    assert!(matches!(eval("2 ** 10;"), Value::Int(1024)));
}

#[test]
fn raise_builds_a_dict_that_throw_turns_into_a_user_error() {
    let err = eval_err(r#"throw raise("ValueError", "must be positive");"#);
    assert_eq!(err, "ValueError");
}

#[test]
fn raise_alone_does_not_throw() {
    match eval(r#"raise("ValueError", "msg");"#) {
        Value::Dict(entries) => {
            let entries = entries.borrow();
            match entries.get("kind") {
                Some(Value::String(s)) => assert_eq!(&**s, "ValueError"),
                other => panic!("expected string kind, got {:?}", other),
            }
        }
        other => panic!("expected dict, got {:?}", other.type_name()),
    }
}

#[test]
fn doc_returns_function_docstring_or_null() {
    let source = r#"
        func greet(name) {
            "Greets someone by name.";
            return "hi " + name;
        }
        doc(greet);
    "#;
    match eval(source) {
        Value::String(s) => assert_eq!(&*s, "Greets someone by name."),
        other => panic!("expected string, got {:?}", other.type_name()),
    }
}

#[test]
fn in_tests_membership_in_strings_lists_and_dict_keys() {
    // spec §4.3 line 122: "in" tests membership in strings, lists, dicts (keys).
    assert!(matches!(eval(r#""ell" in "hello";"#), Value::Bool(true)));
    assert!(matches!(eval(r#""x" in "hello";"#), Value::Bool(false)));
    assert!(matches!(eval("3 in [1, 2, 3];"), Value::Bool(true)));
    assert!(matches!(eval("4 in [1, 2, 3];"), Value::Bool(false)));
    assert!(matches!(eval(r#""a" in {"a": 1};"#), Value::Bool(true)));
    assert!(matches!(eval(r#""z" in {"a": 1};"#), Value::Bool(false)));
}

#[test]
fn in_chains_like_other_relational_operators() {
    assert!(matches!(eval("1 < 2 in [2, 3];"), Value::Bool(true)));
}

#[test]
fn in_against_an_unsupported_right_operand_is_type_error() {
    assert_eq!(eval_err("1 in 2;"), "TypeError");
}
