//! I/O builtins (spec §4.7): `print`, `input`, `read_file`, `read_lines`,
//! `write_file`, `append_file`. File I/O is blocking and synchronous — each
//! builtin opens, operates, and closes within a single call, matching the
//! teacher's `filesystem.rs` style but without the teacher's `Sandbox`
//! capability layer (dropped, see DESIGN.md).

use crate::error::SonaError;
use crate::interpreter::Interpreter;
use crate::span::Span;
use crate::value::Value;
use sona_macros::builtin;
use std::io::Write;

/// Writes each argument's display form to stdout, space-separated, followed
/// by a newline.
///
/// # Examples
///
/// ```sona
/// print("hello", 1, true);
/// ```
#[builtin(name = "print", category = "io")]
fn print(_interp: &mut Interpreter, args: &[Value], _span: Span) -> Result<Value, SonaError> {
    let rendered: Vec<String> = args.iter().map(|v| v.to_string()).collect();
    println!("{}", rendered.join(" "));
    Ok(Value::Null)
}

/// Reads one line from stdin, optionally printing `prompt` first without a
/// trailing newline. Returns the line with its trailing newline stripped,
/// or `null` at end of input.
///
/// # Examples
///
/// ```sona
/// let name = input("Name: ");
/// ```
#[builtin(name = "input", category = "io")]
fn input(_interp: &mut Interpreter, args: &[Value], span: Span) -> Result<Value, SonaError> {
    if args.len() > 1 {
        return Err(SonaError::arity_error("input", "0..1", args.len(), span));
    }
    if let Some(Value::String(prompt)) = args.first() {
        print!("{}", prompt);
        std::io::stdout().flush().ok();
    }
    let mut line = String::new();
    let bytes_read = std::io::stdin()
        .read_line(&mut line)
        .map_err(|e| SonaError::IoError {
            message: format!("failed to read stdin: {}", e),
            span,
        })?;
    if bytes_read == 0 {
        return Ok(Value::Null);
    }
    if line.ends_with('\n') {
        line.pop();
        if line.ends_with('\r') {
            line.pop();
        }
    }
    Ok(Value::string(line))
}

/// Reads a file's contents as a string.
///
/// # Examples
///
/// ```sona
/// let text = read_file("notes.txt");
/// ```
///
/// # See Also
/// write_file, read_lines
#[builtin(name = "read_file", category = "io", arity = 1)]
fn read_file(_interp: &mut Interpreter, args: &[Value], span: Span) -> Result<Value, SonaError> {
    let path = expect_string(&args[0], "read_file", span)?;
    let text = std::fs::read_to_string(path).map_err(|e| SonaError::IoError {
        message: format!("failed to read '{}': {}", path, e),
        span,
    })?;
    Ok(Value::string(text))
}

/// Reads a file and returns its lines as a list of strings, without line
/// terminators.
///
/// # Examples
///
/// ```sona
/// for line in read_lines("data.csv") { print(line); }
/// ```
#[builtin(name = "read_lines", category = "io", arity = 1)]
fn read_lines(_interp: &mut Interpreter, args: &[Value], span: Span) -> Result<Value, SonaError> {
    let path = expect_string(&args[0], "read_lines", span)?;
    let text = std::fs::read_to_string(path).map_err(|e| SonaError::IoError {
        message: format!("failed to read '{}': {}", path, e),
        span,
    })?;
    let lines = text.lines().map(Value::string).collect();
    Ok(Value::list(lines))
}

/// Overwrites (or creates) a file with `text`.
///
/// # Examples
///
/// ```sona
/// write_file("out.txt", "hello");
/// ```
#[builtin(name = "write_file", category = "io", arity = 2)]
fn write_file(_interp: &mut Interpreter, args: &[Value], span: Span) -> Result<Value, SonaError> {
    let path = expect_string(&args[0], "write_file", span)?;
    let text = expect_string(&args[1], "write_file", span)?;
    std::fs::write(path, text).map_err(|e| SonaError::IoError {
        message: format!("failed to write '{}': {}", path, e),
        span,
    })?;
    Ok(Value::Null)
}

/// Appends `text` to a file, creating it if it doesn't exist.
///
/// # Examples
///
/// ```sona
/// append_file("log.txt", "line\n");
/// ```
#[builtin(name = "append_file", category = "io", arity = 2)]
fn append_file(_interp: &mut Interpreter, args: &[Value], span: Span) -> Result<Value, SonaError> {
    let path = expect_string(&args[0], "append_file", span)?;
    let text = expect_string(&args[1], "append_file", span)?;
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| SonaError::IoError {
            message: format!("failed to open '{}': {}", path, e),
            span,
        })?;
    file.write_all(text.as_bytes())
        .map_err(|e| SonaError::IoError {
            message: format!("failed to append to '{}': {}", path, e),
            span,
        })?;
    Ok(Value::Null)
}

fn expect_string<'a>(value: &'a Value, func: &str, span: Span) -> Result<&'a str, SonaError> {
    match value {
        Value::String(s) => Ok(s),
        other => Err(SonaError::type_error(
            format!(
                "{} expected a string argument, got {}",
                func,
                other.type_name()
            ),
            span,
        )),
    }
}

pub fn register_all(env: &std::rc::Rc<crate::env::Environment>) {
    register_print(env);
    register_input(env);
    register_read_file(env);
    register_read_lines(env);
    register_write_file(env);
    register_append_file(env);
}
