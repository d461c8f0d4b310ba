//! Math builtins (spec §4.7): `abs`, `min`, `max`, `round`, plus `pow` — the
//! latter not named by the spec's fixed builtin list but required as the
//! desugar target for the `**` operator (see `parser.rs`'s `parse_power`).

use crate::error::SonaError;
use crate::interpreter::Interpreter;
use crate::span::Span;
use crate::value::Value;
use sona_macros::builtin;

fn as_f64(v: &Value, func: &str, span: Span) -> Result<f64, SonaError> {
    match v {
        Value::Int(n) => Ok(*n as f64),
        Value::Float(f) => Ok(*f),
        other => Err(SonaError::type_error(
            format!(
                "{} expected a number argument, got {}",
                func,
                other.type_name()
            ),
            span,
        )),
    }
}

/// Returns the absolute value of an int or float.
///
/// # Examples
///
/// ```sona
/// abs(-5);
/// abs(-2.5);
/// ```
#[builtin(name = "abs", category = "math", arity = 1)]
fn abs(_interp: &mut Interpreter, args: &[Value], span: Span) -> Result<Value, SonaError> {
    match &args[0] {
        Value::Int(n) => Ok(Value::Int(n.wrapping_abs())),
        Value::Float(f) => Ok(Value::Float(f.abs())),
        other => Err(SonaError::type_error(
            format!("abs expected a number argument, got {}", other.type_name()),
            span,
        )),
    }
}

/// Returns the smallest of one or more numbers.
///
/// # Examples
///
/// ```sona
/// min(3, 1, 2);
/// ```
#[builtin(name = "min", category = "math")]
fn min(_interp: &mut Interpreter, args: &[Value], span: Span) -> Result<Value, SonaError> {
    extremum(args, span, "min", |a, b| a < b)
}

/// Returns the largest of one or more numbers.
///
/// # Examples
///
/// ```sona
/// max(3, 1, 2);
/// ```
#[builtin(name = "max", category = "math")]
fn max(_interp: &mut Interpreter, args: &[Value], span: Span) -> Result<Value, SonaError> {
    extremum(args, span, "max", |a, b| a > b)
}

fn extremum(
    args: &[Value],
    span: Span,
    func: &str,
    better: fn(f64, f64) -> bool,
) -> Result<Value, SonaError> {
    if args.is_empty() {
        return Err(SonaError::arity_error(func, "1..", 0, span));
    }
    let mut best = args[0].clone();
    let mut best_f = as_f64(&best, func, span)?;
    for candidate in &args[1..] {
        let candidate_f = as_f64(candidate, func, span)?;
        if better(candidate_f, best_f) {
            best = candidate.clone();
            best_f = candidate_f;
        }
    }
    Ok(best)
}

/// Rounds a number to the nearest integer (`round(x)`), or to `digits`
/// decimal places (`round(x, digits)`).
///
/// # Examples
///
/// ```sona
/// round(2.5);
/// round(3.14159, 2);
/// ```
#[builtin(name = "round", category = "math")]
fn round(_interp: &mut Interpreter, args: &[Value], span: Span) -> Result<Value, SonaError> {
    if args.is_empty() || args.len() > 2 {
        return Err(SonaError::arity_error("round", "1..2", args.len(), span));
    }
    let x = as_f64(&args[0], "round", span)?;
    if args.len() == 1 {
        return Ok(Value::Int(x.round() as i64));
    }
    let Value::Int(digits) = &args[1] else {
        return Err(SonaError::type_error(
            "round's digits argument must be an int",
            span,
        ));
    };
    let factor = 10f64.powi(*digits as i32);
    Ok(Value::Float((x * factor).round() / factor))
}

/// Raises `base` to the power of `exponent`. Backs the `**` operator.
///
/// # Examples
///
/// ```sona
/// pow(2, 10);
/// 2 ** 10;
/// ```
#[builtin(name = "pow", category = "math", arity = 2)]
fn pow(_interp: &mut Interpreter, args: &[Value], span: Span) -> Result<Value, SonaError> {
    if let (Value::Int(base), Value::Int(exp)) = (&args[0], &args[1]) {
        if *exp >= 0 {
            return Ok(Value::Int(base.wrapping_pow(*exp as u32)));
        }
    }
    let base = as_f64(&args[0], "pow", span)?;
    let exp = as_f64(&args[1], "pow", span)?;
    Ok(Value::Float(base.powf(exp)))
}

pub fn register_all(env: &std::rc::Rc<crate::env::Environment>) {
    register_abs(env);
    register_min(env);
    register_max(env);
    register_round(env);
    register_pow(env);
}
