//! Error-construction builtin (spec §4.7): `raise(kind, message)` builds a
//! throwable dict value; `throw raise(...)` is how user code signals a
//! custom error (see `eval.rs`'s `value_to_throw`, which reads the same
//! `kind`/`message` keys this builtin writes).

use crate::error::SonaError;
use crate::interpreter::Interpreter;
use crate::span::Span;
use crate::value::Value;
use indexmap::IndexMap;
use sona_macros::builtin;

/// Builds a throwable error value with the given `kind` tag and `message`.
/// Does not itself throw — pair with `throw` to raise it.
///
/// # Examples
///
/// ```sona
/// throw raise("ValueError", "must be positive");
/// ```
#[builtin(name = "raise", category = "errors", arity = 2)]
fn raise(_interp: &mut Interpreter, args: &[Value], span: Span) -> Result<Value, SonaError> {
    let kind = match &args[0] {
        Value::String(s) => s.to_string(),
        other => {
            return Err(SonaError::type_error(
                format!("raise expected a string kind, got {}", other.type_name()),
                span,
            ))
        }
    };
    let message = match &args[1] {
        Value::String(s) => s.to_string(),
        other => {
            return Err(SonaError::type_error(
                format!(
                    "raise expected a string message, got {}",
                    other.type_name()
                ),
                span,
            ))
        }
    };
    let mut entries = IndexMap::new();
    entries.insert("kind".to_string(), Value::string(kind));
    entries.insert("message".to_string(), Value::string(message));
    Ok(Value::dict(entries))
}

pub fn register_all(env: &std::rc::Rc<crate::env::Environment>) {
    register_raise(env);
}
