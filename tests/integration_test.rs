//! End-to-end scenarios and quantified invariants against the public
//! `Interpreter` API. `print` is overridden via `register_native` (the host
//! embedding hook) so output order is observable without touching stdout.

use sona::config::InterpreterConfig;
use sona::interpreter::Interpreter;
use sona::value::Value;
use std::cell::RefCell;
use std::rc::Rc;

/// Builds an interpreter whose `print` builtin appends its rendered
/// arguments to a shared buffer instead of writing to stdout.
fn capturing_interpreter() -> (Interpreter, Rc<RefCell<Vec<String>>>) {
    let mut interp = Interpreter::new(InterpreterConfig::default());
    let buffer = Rc::new(RefCell::new(Vec::new()));
    let captured = buffer.clone();
    interp.register_native(
        "print",
        None,
        Rc::new(move |_interp, args, _span| {
            let rendered: Vec<String> = args.iter().map(|v| v.to_string()).collect();
            captured.borrow_mut().push(rendered.join(" "));
            Ok(Value::Null)
        }),
    );
    (interp, buffer)
}

#[test]
fn hello_world() {
    // Spec §8 scenario 1, verbatim — no semicolon.
    let (mut interp, output) = capturing_interpreter();
    interp
        .run_source("print(\"Hello, World!\")")
        .expect("hello world should not error");
    assert_eq!(output.borrow().as_slice(), ["Hello, World!"]);
}

#[test]
fn recursion_and_closures() {
    // Spec §8 scenario 2, verbatim — newline-terminated statements, no semicolons.
    let (mut interp, output) = capturing_interpreter();
    let source = "
        func make_adder(n) { func add(x) { return x + n } return add }
        let add5 = make_adder(5)
        print(add5(3))
    ";
    interp.run_source(source).expect("closure call should not error");
    assert_eq!(output.borrow().as_slice(), ["8"]);
}

#[test]
fn closure_captures_frame_by_reference() {
    // Spec §8: a function captured after `let x = 1` returns 1; after
    // subsequent assignment `x = 2` and re-invocation, returns 2.
    let (mut interp, _) = capturing_interpreter();
    let source = r#"
        let x = 1;
        func read_x() { return x; }
        let first = read_x();
        x = 2;
        let second = read_x();
        [first, second];
    "#;
    let result = interp.run_source(source).expect("should not error");
    match result {
        Value::List(items) => {
            let items = items.borrow();
            assert!(matches!(items[0], Value::Int(1)));
            assert!(matches!(items[1], Value::Int(2)));
        }
        other => panic!("expected a list, got {:?}", other.type_name()),
    }
}

#[test]
fn a_computed_tail_call_callee_is_evaluated_exactly_once() {
    // Spec §8's evaluate-once determinism guarantee: `return f()(x)` where
    // `f()` is not the function currently executing must still call `f`
    // exactly once, even though the tail-call fast path only applies to a
    // bare-identifier callee and otherwise falls back to a full re-evaluation.
    let (mut interp, _) = capturing_interpreter();
    let source = r#"
        let calls = 0;
        func bump() {
            calls = calls + 1;
            return double;
        }
        func double(x) { return x * 2; }
        func outer() {
            return bump()(21);
        }
        let result = outer();
        [result, calls];
    "#;
    let value = interp.run_source(source).expect("should not error");
    match value {
        Value::List(items) => {
            let items = items.borrow();
            assert!(matches!(items[0], Value::Int(42)));
            assert!(matches!(items[1], Value::Int(1)), "bump() should run exactly once, got {:?}", items[1]);
        }
        other => panic!("expected a list, got {:?}", other.type_name()),
    }
}

#[test]
fn control_flow_break_stops_only_its_own_loop() {
    // Spec §8 scenario 3, verbatim — no semicolons, no parens around the
    // `if`/`for` conditions.
    let (mut interp, output) = capturing_interpreter();
    let source = "for i in [1,2,3,4] { if i == 3 { break } print(i) }";
    interp.run_source(source).expect("should not error");
    assert_eq!(output.borrow().as_slice(), ["1", "2"]);
}

#[test]
fn try_finally_runs_before_the_return_value_is_observed() {
    // Spec §8 scenario 4, verbatim.
    let (mut interp, output) = capturing_interpreter();
    let source = "
        func f() { try { return 1 } finally { print(\"f\") } }
        print(f())
    ";
    interp.run_source(source).expect("should not error");
    assert_eq!(output.borrow().as_slice(), ["f", "1"]);
}

#[test]
fn chained_comparison_evaluates_middle_operand_exactly_once() {
    // Spec §8 scenario 6, verbatim.
    let (mut interp, output) = capturing_interpreter();
    let source = "
        func side() { print(\"s\"); return 5 }
        print(1 < side() < 10)
    ";
    let result = interp.run_source(source).expect("should not error");
    assert_eq!(output.borrow().as_slice(), ["s", "true"]);
    assert!(matches!(result, Value::Null));
}

#[test]
fn empty_program_yields_null() {
    let (mut interp, output) = capturing_interpreter();
    let result = interp.run_source("").expect("empty program should not error");
    assert!(matches!(result, Value::Null));
    assert!(output.borrow().is_empty());
}

#[test]
fn let_binding_is_scoped_to_its_block_and_does_not_leak() {
    let (mut interp, _) = capturing_interpreter();
    let source = r#"
        func outer() {
            if (true) { let x = 10; }
            return x;
        }
        outer();
    "#;
    let err = interp
        .run_source(source)
        .expect_err("x should not be visible outside its block");
    assert_eq!(err.kind, "NameError");
}

#[test]
fn continue_skips_to_loop_header_without_affecting_outer_loop() {
    let (mut interp, output) = capturing_interpreter();
    let source = r#"
        for i in [1, 2, 3] {
            for j in [1, 2, 3] {
                if (j == 2) { continue; }
                print(i * 10 + j);
            }
        }
    "#;
    interp.run_source(source).expect("should not error");
    assert_eq!(
        output.borrow().as_slice(),
        ["11", "13", "21", "23", "31", "33"]
    );
}

#[test]
fn repl_state_persists_across_calls() {
    let (mut interp, output) = capturing_interpreter();
    interp.eval_repl("let counter = 0;").expect("should not error");
    interp
        .eval_repl("counter = counter + 1;")
        .expect("should not error");
    interp.eval_repl("print(counter);").expect("should not error");
    assert_eq!(output.borrow().as_slice(), ["1"]);
}

#[test]
fn division_by_zero_is_zero_division_error_for_slash_and_percent() {
    let (mut interp, _) = capturing_interpreter();
    let slash_err = interp.run_source("1 / 0;").expect_err("should raise");
    assert_eq!(slash_err.kind, "ZeroDivisionError");
    let percent_err = interp.run_source("1 % 0;").expect_err("should raise");
    assert_eq!(percent_err.kind, "ZeroDivisionError");
}

#[test]
fn floor_div_rounds_toward_negative_infinity() {
    let (mut interp, _) = capturing_interpreter();
    assert!(matches!(
        interp.run_source("7 // 2;").expect("should not error"),
        Value::Int(3)
    ));
    assert!(matches!(
        interp.run_source("7 // -3;").expect("should not error"),
        Value::Int(-3)
    ));
    assert!(matches!(
        interp.run_source("-7 // 3;").expect("should not error"),
        Value::Int(-3)
    ));
}

#[test]
fn mod_takes_the_sign_of_the_divisor() {
    let (mut interp, _) = capturing_interpreter();
    assert!(matches!(
        interp.run_source("7 % -3;").expect("should not error"),
        Value::Int(-2)
    ));
    assert!(matches!(
        interp.run_source("-7 % 3;").expect("should not error"),
        Value::Int(2)
    ));
    assert!(matches!(
        interp.run_source("7 % 3;").expect("should not error"),
        Value::Int(1)
    ));
}

#[test]
fn list_negative_index_and_out_of_range() {
    let (mut interp, _) = capturing_interpreter();
    let result = interp.run_source("[1, 2, 3][-1];").expect("should not error");
    assert!(matches!(result, Value::Int(3)));
    let err = interp.run_source("[1, 2, 3][5];").expect_err("should raise");
    assert_eq!(err.kind, "IndexError");
}

#[test]
fn dict_missing_key_raises_key_error_and_get_provides_default() {
    let (mut interp, _) = capturing_interpreter();
    let err = interp
        .run_source(r#"let d = {"a": 1}; d.missing;"#)
        .expect_err("should raise");
    assert_eq!(err.kind, "KeyError");

    let (mut interp2, _) = capturing_interpreter();
    let result = interp2
        .run_source(r#"let d = {"a": 1}; d.get("missing", "fallback");"#)
        .expect("should not error");
    match result {
        Value::String(s) => assert_eq!(&*s, "fallback"),
        other => panic!("expected string, got {:?}", other.type_name()),
    }
}

#[test]
fn error_envelope_carries_user_call_stack_not_builtin_frames() {
    let (mut interp, _) = capturing_interpreter();
    let source = r#"
        func inner() { return 1 / 0; }
        func outer() { return inner(); }
        outer();
    "#;
    let err = interp.run_source(source).expect_err("should raise");
    assert_eq!(err.kind, "ZeroDivisionError");
    let frame_names: Vec<&str> = err.stack.iter().map(|f| f.function.as_str()).collect();
    assert_eq!(frame_names, ["outer", "inner"]);
}
