//! Iteration-helper builtins (spec §4.7): `range`, `enumerate`. The spec
//! describes `range` as returning "a lazy sequence", but Sona's `Value` has
//! no lazy-iterator variant, so both builtins materialize a `list` eagerly —
//! recorded as an Open Question resolution in DESIGN.md.

use crate::error::SonaError;
use crate::interpreter::Interpreter;
use crate::span::Span;
use crate::value::Value;
use sona_macros::builtin;

fn expect_int(v: &Value, func: &str, span: Span) -> Result<i64, SonaError> {
    match v {
        Value::Int(n) => Ok(*n),
        other => Err(SonaError::type_error(
            format!(
                "{} expected an int argument, got {}",
                func,
                other.type_name()
            ),
            span,
        )),
    }
}

/// Builds a list counting from `start` (default `0`) up to but excluding
/// `stop`, advancing by `step` (default `1`, may be negative to count down).
///
/// # Examples
///
/// ```sona
/// range(5);
/// range(2, 8);
/// range(10, 0, -2);
/// ```
#[builtin(name = "range", category = "iter")]
fn range(_interp: &mut Interpreter, args: &[Value], span: Span) -> Result<Value, SonaError> {
    let (start, stop, step) = match args.len() {
        1 => (0, expect_int(&args[0], "range", span)?, 1),
        2 => (
            expect_int(&args[0], "range", span)?,
            expect_int(&args[1], "range", span)?,
            1,
        ),
        3 => (
            expect_int(&args[0], "range", span)?,
            expect_int(&args[1], "range", span)?,
            expect_int(&args[2], "range", span)?,
        ),
        n => return Err(SonaError::arity_error("range", "1..3", n, span)),
    };
    if step == 0 {
        return Err(SonaError::ValueError {
            message: "range step must not be zero".to_string(),
            span,
        });
    }
    let mut out = Vec::new();
    let mut current = start;
    if step > 0 {
        while current < stop {
            out.push(Value::Int(current));
            current += step;
        }
    } else {
        while current > stop {
            out.push(Value::Int(current));
            current += step;
        }
    }
    Ok(Value::list(out))
}

/// Pairs each element of a list or string with its index, as `[index,
/// value]` two-element lists.
///
/// # Examples
///
/// ```sona
/// enumerate(["a", "b"]);
/// ```
#[builtin(name = "enumerate", category = "iter", arity = 1)]
fn enumerate(_interp: &mut Interpreter, args: &[Value], span: Span) -> Result<Value, SonaError> {
    let items: Vec<Value> = match &args[0] {
        Value::List(items) => items.borrow().clone(),
        Value::String(s) => s.chars().map(|c| Value::string(c.to_string())).collect(),
        other => {
            return Err(SonaError::type_error(
                format!("{} is not iterable", other.type_name()),
                span,
            ))
        }
    };
    let out = items
        .into_iter()
        .enumerate()
        .map(|(i, v)| Value::list(vec![Value::Int(i as i64), v]))
        .collect();
    Ok(Value::list(out))
}

pub fn register_all(env: &std::rc::Rc<crate::env::Environment>) {
    register_range(env);
    register_enumerate(env);
}
