//! String-specific semantics (spec §4.3/§4.1): concatenation, indexing and
//! slicing, lexicographic comparison, and f-string interpolation with the
//! frozen format-spec subset, run against the public `Interpreter` API.

use sona::config::InterpreterConfig;
use sona::interpreter::Interpreter;
use sona::value::Value;

fn eval(source: &str) -> Value {
    let mut interp = Interpreter::new(InterpreterConfig::default());
    interp
        .run_source(source)
        .unwrap_or_else(|e| panic!("expected {:?} to succeed, got {}: {}", source, e.kind, e.message))
}

fn eval_err(source: &str) -> String {
    let mut interp = Interpreter::new(InterpreterConfig::default());
    interp
        .run_source(source)
        .expect_err("expected an error")
        .kind
}

fn as_str(v: Value) -> String {
    match v {
        Value::String(s) => s.to_string(),
        other => panic!("expected string, got {:?}", other.type_name()),
    }
}

#[test]
fn plus_concatenates_strings() {
    assert_eq!(as_str(eval(r#""foo" + "bar";"#)), "foobar");
}

#[test]
fn plus_between_string_and_int_is_type_error() {
    assert_eq!(eval_err(r#""foo" + 1;"#), "TypeError");
}

#[test]
fn indexing_reads_a_single_character_and_supports_negative_indices() {
    assert_eq!(as_str(eval(r#""hello"[0];"#)), "h");
    assert_eq!(as_str(eval(r#""hello"[-1];"#)), "o");
}

#[test]
fn indexing_out_of_range_is_index_error() {
    assert_eq!(eval_err(r#""hi"[5];"#), "IndexError");
}

#[test]
fn slicing_is_half_open_and_clamps_out_of_range_bounds() {
    assert_eq!(as_str(eval(r#""hello"[1:4];"#)), "ell");
    assert_eq!(as_str(eval(r#""hello"[:2];"#)), "he");
    assert_eq!(as_str(eval(r#""hello"[3:];"#)), "lo");
    assert_eq!(as_str(eval(r#""hello"[-3:];"#)), "llo");
    assert_eq!(as_str(eval(r#""hello"[2:100];"#)), "llo");
}

#[test]
fn slicing_with_start_past_end_yields_empty_string() {
    assert_eq!(as_str(eval(r#""hello"[4:1];"#)), "");
}

#[test]
fn len_counts_characters_not_bytes() {
    // Multi-byte UTF-8 scalar values still count as one character each.
    assert!(matches!(eval(r#"len("héllo");"#), Value::Int(5)));
}

#[test]
fn string_ordering_is_lexicographic() {
    assert!(matches!(eval(r#""abc" < "abd";"#), Value::Bool(true)));
    assert!(matches!(eval(r#""abc" == "abc";"#), Value::Bool(true)));
    assert!(matches!(eval(r#""b" > "a";"#), Value::Bool(true)));
}

#[test]
fn comparing_a_string_to_a_number_is_type_error() {
    assert_eq!(eval_err(r#""1" < 2;"#), "TypeError");
}

#[test]
fn fstring_interpolates_bare_expressions() {
    assert_eq!(
        as_str(eval(r#"let name = "world"; f"hello {name}!";"#)),
        "hello world!"
    );
}

#[test]
fn fstring_fixed_precision_spec() {
    assert_eq!(as_str(eval(r#"f"{3.14159:.2f}";"#)), "3.14");
}

#[test]
fn fstring_alignment_specs() {
    assert_eq!(as_str(eval(r#"f"[{5:>4}]";"#)), "[   5]");
    assert_eq!(as_str(eval(r#"f"[{5:<4}]";"#)), "[5   ]");
    assert_eq!(as_str(eval(r#"f"[{5:^5}]";"#)), "[  5  ]");
}

#[test]
fn fstring_thousands_separator() {
    assert_eq!(as_str(eval(r#"f"{1234567:,}";"#)), "1,234,567");
    assert_eq!(as_str(eval(r#"f"{-1234:,}";"#)), "-1,234");
}

#[test]
fn fstring_mixes_literal_text_and_multiple_interpolations() {
    let source = r#"let a = 1; let b = 2; f"{a} + {b} = {a + b}";"#;
    assert_eq!(as_str(eval(source)), "1 + 2 = 3");
}
