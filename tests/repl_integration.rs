//! REPL-specific behavior (spec §6): `eval_repl` evaluates each line against
//! the same persistent global environment, and a failing line does not
//! corrupt bindings made by earlier lines.

use sona::config::InterpreterConfig;
use sona::interpreter::Interpreter;
use sona::value::Value;

#[test]
fn functions_defined_in_one_line_are_callable_in_the_next() {
    let mut interp = Interpreter::new(InterpreterConfig::default());
    interp
        .eval_repl("func square(x) { return x * x; }")
        .expect("should not error");
    let result = interp.eval_repl("square(6);").expect("should not error");
    assert!(matches!(result, Value::Int(36)));
}

#[test]
fn a_failing_line_does_not_clear_previously_defined_bindings() {
    let mut interp = Interpreter::new(InterpreterConfig::default());
    interp.eval_repl("let x = 1;").expect("should not error");
    let err = interp.eval_repl("x + undefined_name;").expect_err("should raise");
    assert_eq!(err.kind, "NameError");
    let result = interp.eval_repl("x;").expect("x should still be bound");
    assert!(matches!(result, Value::Int(1)));
}

#[test]
fn reassigning_an_existing_binding_is_visible_on_the_next_line() {
    let mut interp = Interpreter::new(InterpreterConfig::default());
    interp.eval_repl("let counter = 0;").expect("should not error");
    interp.eval_repl("counter = counter + 1;").expect("should not error");
    interp.eval_repl("counter = counter + 1;").expect("should not error");
    let result = interp.eval_repl("counter;").expect("should not error");
    assert!(matches!(result, Value::Int(2)));
}

#[test]
fn each_line_is_independently_parsed_so_a_syntax_error_is_a_parse_error() {
    let mut interp = Interpreter::new(InterpreterConfig::default());
    let err = interp.eval_repl("let;").expect_err("should raise");
    assert_eq!(err.kind, "ParseError");
}
