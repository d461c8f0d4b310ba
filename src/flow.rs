//! Control-flow-as-signal type threaded through the evaluator (spec's Design
//! Notes cross-cutting pattern). The teacher's Lisp has nothing resembling
//! `break`/`continue`/`return` — every form is an expression — so this has no
//! direct teacher analogue; it generalizes the teacher's plain
//! `Result<Value, EvalError>` evaluator return type into one that can also
//! carry a pending non-local exit, while keeping error propagation on `?`.

use crate::value::{Function, Value};
use std::rc::Rc;

/// The outcome of evaluating a statement or block: either a plain value, a
/// pending non-local control transfer that must unwind to the nearest
/// handler (loop or function call), or a `TailCall` — the self-recursive
/// tail-call trampoline signal that lets `call_function` loop instead of
/// growing the Rust stack (spec's Design Notes cross-cutting pattern,
/// generalizing the teacher's tail-call loop to also carry `break`/
/// `continue`/`return`, which plain expression evaluation never had to).
/// Thrown errors are not modeled here — they propagate as `Result::Err`
/// the same way the teacher's `EvalError` does, caught at `try`/`catch`.
pub enum Flow {
    Value(Value),
    Return(Value),
    Break,
    Continue,
    TailCall(Rc<Function>, Vec<Value>),
}

impl Flow {
    pub fn into_value(self) -> Value {
        match self {
            Flow::Value(v) | Flow::Return(v) => v,
            Flow::Break | Flow::Continue | Flow::TailCall(..) => Value::Null,
        }
    }

    pub fn is_signal(&self) -> bool {
        !matches!(self, Flow::Value(_))
    }
}
