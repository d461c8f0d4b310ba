//! Conversion builtins (spec §4.7): `int`, `float`, `str`, `bool`.

use crate::error::SonaError;
use crate::interpreter::Interpreter;
use crate::span::Span;
use crate::value::Value;
use sona_macros::builtin;

/// Converts a value to an `int`: strings are parsed, floats truncate toward
/// zero, bools become `0`/`1`. Raises `ValueError` for an unparseable string.
///
/// # Examples
///
/// ```sona
/// int("42");
/// int(3.9);
/// ```
#[builtin(name = "int", category = "convert", arity = 1)]
fn int(_interp: &mut Interpreter, args: &[Value], span: Span) -> Result<Value, SonaError> {
    match &args[0] {
        Value::Int(n) => Ok(Value::Int(*n)),
        Value::Float(f) => Ok(Value::Int(*f as i64)),
        Value::Bool(b) => Ok(Value::Int(if *b { 1 } else { 0 })),
        Value::String(s) => s.trim().parse::<i64>().map(Value::Int).map_err(|_| {
            SonaError::ValueError {
                message: format!("cannot convert {:?} to int", s),
                span,
            }
        }),
        other => Err(SonaError::type_error(
            format!("cannot convert {} to int", other.type_name()),
            span,
        )),
    }
}

/// Converts a value to a `float`.
///
/// # Examples
///
/// ```sona
/// float("3.14");
/// float(2);
/// ```
#[builtin(name = "float", category = "convert", arity = 1)]
fn float(_interp: &mut Interpreter, args: &[Value], span: Span) -> Result<Value, SonaError> {
    match &args[0] {
        Value::Int(n) => Ok(Value::Float(*n as f64)),
        Value::Float(f) => Ok(Value::Float(*f)),
        Value::String(s) => s.trim().parse::<f64>().map(Value::Float).map_err(|_| {
            SonaError::ValueError {
                message: format!("cannot convert {:?} to float", s),
                span,
            }
        }),
        other => Err(SonaError::type_error(
            format!("cannot convert {} to float", other.type_name()),
            span,
        )),
    }
}

/// Converts a value to its display string.
///
/// # Examples
///
/// ```sona
/// str(42);
/// str([1, 2]);
/// ```
#[builtin(name = "str", category = "convert", arity = 1)]
fn str_(_interp: &mut Interpreter, args: &[Value], _span: Span) -> Result<Value, SonaError> {
    Ok(Value::string(args[0].to_string()))
}

/// Converts a value to a `bool` using Sona truthiness rules.
///
/// # Examples
///
/// ```sona
/// bool(0);
/// bool("");
/// bool([1]);
/// ```
#[builtin(name = "bool", category = "convert", arity = 1)]
fn bool_(_interp: &mut Interpreter, args: &[Value], _span: Span) -> Result<Value, SonaError> {
    Ok(Value::Bool(args[0].is_truthy()))
}

pub fn register_all(env: &std::rc::Rc<crate::env::Environment>) {
    register_int(env);
    register_float(env);
    register_str_(env);
    register_bool_(env);
}
