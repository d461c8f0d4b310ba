//! Introspection builtins (spec §4.7): `type(x)`, `len(x)`, plus the
//! supplemented `help`/`doc` pair backed by the teacher's help-registry
//! design (see `help.rs`), now populated by `sona-macros::builtin` instead
//! of a hand-written Lisp function table.

use crate::error::SonaError;
use crate::interpreter::Interpreter;
use crate::span::Span;
use crate::value::Value;
use sona_macros::builtin;

/// Returns the runtime type tag of a value as a string.
///
/// # Examples
///
/// ```sona
/// type(1);
/// type("a");
/// type([1, 2]);
/// ```
#[builtin(name = "type", category = "introspect", arity = 1)]
fn type_(_interp: &mut Interpreter, args: &[Value], _span: Span) -> Result<Value, SonaError> {
    Ok(Value::string(args[0].type_name()))
}

/// Returns the length of a string, list, or dict.
///
/// # Examples
///
/// ```sona
/// len("abc");
/// len([1, 2, 3]);
/// ```
#[builtin(name = "len", category = "introspect", arity = 1)]
fn len(_interp: &mut Interpreter, args: &[Value], span: Span) -> Result<Value, SonaError> {
    let n = match &args[0] {
        Value::String(s) => s.chars().count(),
        Value::List(items) => items.borrow().len(),
        Value::Dict(entries) => entries.borrow().len(),
        other => {
            return Err(SonaError::type_error(
                format!("{} has no length", other.type_name()),
                span,
            ))
        }
    };
    Ok(Value::Int(n as i64))
}

/// With no arguments, prints a quick-reference listing of every registered
/// builtin. With a builtin name, prints that entry's full help text.
///
/// # Examples
///
/// ```sona
/// help();
/// help("len");
/// ```
///
/// # See Also
/// doc
#[builtin(name = "help", category = "introspect")]
fn help(_interp: &mut Interpreter, args: &[Value], span: Span) -> Result<Value, SonaError> {
    if args.is_empty() {
        println!("{}", crate::help::format_quick_reference());
        return Ok(Value::Null);
    }
    if args.len() > 1 {
        return Err(SonaError::arity_error("help", "0..1", args.len(), span));
    }
    let name = match &args[0] {
        Value::String(s) => s.to_string(),
        other => {
            return Err(SonaError::type_error(
                format!("help expected a string name, got {}", other.type_name()),
                span,
            ))
        }
    };
    match crate::help::get_help(&name) {
        Some(entry) => println!("{}", crate::help::format_help_entry(&entry)),
        None => println!("No help available for '{}'.", name),
    }
    Ok(Value::Null)
}

/// Returns a function's docstring, or `null` if it has none. Works for both
/// user-defined functions (the docstring literal following the parameter
/// list) and builtins (the `#[builtin]`-extracted description).
///
/// # Examples
///
/// ```sona
/// function add(a, b) { "adds two numbers"; return a + b; }
/// doc(add);
/// ```
#[builtin(name = "doc", category = "introspect", arity = 1)]
fn doc(_interp: &mut Interpreter, args: &[Value], span: Span) -> Result<Value, SonaError> {
    match &args[0] {
        Value::Function(f) => Ok(f
            .docstring
            .clone()
            .map(Value::string)
            .unwrap_or(Value::Null)),
        Value::Native(n) => Ok(crate::help::get_help(&n.name)
            .map(|e| Value::string(e.description))
            .unwrap_or(Value::Null)),
        other => Err(SonaError::type_error(
            format!("doc expected a function, got {}", other.type_name()),
            span,
        )),
    }
}

pub fn register_all(env: &std::rc::Rc<crate::env::Environment>) {
    register_type_(env);
    register_len(env);
    register_help(env);
    register_doc(env);
}
