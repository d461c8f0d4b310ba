//! Builtin function registration (spec §4.7), generalizing the teacher's
//! `builtins/{arithmetic,comparison,console,filesystem,...}` split into
//! Sona's fixed builtin set, grouped the same way SPEC_FULL names them:
//! io, convert, introspect, iter, math, errors. Each function is defined
//! with `sona_macros::builtin`, the way the teacher's natives were defined
//! with its own `#[builtin]` macro.

pub mod convert;
pub mod errors;
pub mod introspect;
pub mod io;
pub mod iter;
pub mod math;

use crate::env::Environment;
use std::rc::Rc;

/// Registers every builtin into the global environment. Called once from
/// `Interpreter::new`.
pub fn register_all(env: &Rc<Environment>) {
    io::register_all(env);
    convert::register_all(env);
    introspect::register_all(env);
    iter::register_all(env);
    math::register_all(env);
    errors::register_all(env);
}
