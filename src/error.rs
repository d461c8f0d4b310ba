//! The runtime error taxonomy and the host-visible error envelope.
//!
//! Grounded in the teacher's `error.rs` (`thiserror::Error` derive with rich,
//! contextual variants and constructor helpers), generalized into a single
//! consistent enum — the teacher's own `EvalError` had drifted out of sync
//! with several of its call sites (`EvalError::Custom`/`ArityMismatch`/
//! `TypeError` used throughout `builtins/` but never defined here), so this
//! is designed fresh against spec's error taxonomy rather than copied.

use crate::span::Span;
use thiserror::Error;

/// A structured runtime error, always attributable to a source span.
#[derive(Debug, Clone, Error)]
pub enum SonaError {
    #[error("parse error at {span}: {message}")]
    ParseError { message: String, span: Span },

    #[error("name error at {span}: {name} is not defined")]
    NameError { name: String, span: Span },

    #[error("type error at {span}: {message}")]
    TypeError { message: String, span: Span },

    #[error("type error at {span}: {function} expected {expected} argument(s), got {actual}")]
    ArityError {
        function: String,
        expected: String,
        actual: usize,
        span: Span,
    },

    #[error("value error at {span}: {message}")]
    ValueError { message: String, span: Span },

    #[error("index error at {span}: index {index} out of range for length {length}")]
    IndexError {
        index: i64,
        length: usize,
        span: Span,
    },

    #[error("key error at {span}: key {key:?} not found")]
    KeyError { key: String, span: Span },

    #[error("division by zero at {span}")]
    ZeroDivisionError { span: Span },

    #[error("import error at {span}: {message}")]
    ImportError { message: String, span: Span },

    #[error("io error at {span}: {message}")]
    IoError { message: String, span: Span },

    #[error("not callable at {span}: value of type {type_name} cannot be called")]
    NotCallable { type_name: String, span: Span },

    #[error("execution interrupted at {span}")]
    Interrupted { span: Span },

    #[error("{kind} at {span}: {message}")]
    UserError {
        kind: String,
        message: String,
        span: Span,
    },
}

impl SonaError {
    pub fn span(&self) -> Span {
        match self {
            SonaError::ParseError { span, .. }
            | SonaError::NameError { span, .. }
            | SonaError::TypeError { span, .. }
            | SonaError::ArityError { span, .. }
            | SonaError::ValueError { span, .. }
            | SonaError::IndexError { span, .. }
            | SonaError::KeyError { span, .. }
            | SonaError::ZeroDivisionError { span }
            | SonaError::ImportError { span, .. }
            | SonaError::IoError { span, .. }
            | SonaError::NotCallable { span, .. }
            | SonaError::Interrupted { span }
            | SonaError::UserError { span, .. } => *span,
        }
    }

    /// The taxonomy name used in the host-visible error envelope (spec §6/§7).
    pub fn kind(&self) -> &str {
        match self {
            SonaError::ParseError { .. } => "ParseError",
            SonaError::NameError { .. } => "NameError",
            SonaError::TypeError { .. } => "TypeError",
            SonaError::ArityError { .. } => "TypeError",
            SonaError::ValueError { .. } => "ValueError",
            SonaError::IndexError { .. } => "IndexError",
            SonaError::KeyError { .. } => "KeyError",
            SonaError::ZeroDivisionError { .. } => "ZeroDivisionError",
            SonaError::ImportError { .. } => "ImportError",
            SonaError::IoError { .. } => "IOError",
            SonaError::NotCallable { .. } => "TypeError",
            SonaError::Interrupted { .. } => "Interrupted",
            SonaError::UserError { kind, .. } => kind.as_str(),
        }
    }

    pub fn type_error(message: impl Into<String>, span: Span) -> Self {
        SonaError::TypeError {
            message: message.into(),
            span,
        }
    }

    pub fn name_error(name: impl Into<String>, span: Span) -> Self {
        SonaError::NameError {
            name: name.into(),
            span,
        }
    }

    pub fn arity_error(
        function: impl Into<String>,
        expected: impl Into<String>,
        actual: usize,
        span: Span,
    ) -> Self {
        SonaError::ArityError {
            function: function.into(),
            expected: expected.into(),
            actual,
            span,
        }
    }
}

/// One entry of the call stack captured at the point an error escaped to
/// the host boundary (spec §6's error envelope `stack` field).
#[derive(Debug, Clone, serde::Serialize)]
pub struct StackFrame {
    pub function: String,
    pub file: String,
    pub line: u32,
}

/// The serializable error shape returned across the host embedding boundary
/// (spec §6's "error envelope"): kind, message, source position, originating
/// file, and the call stack active when the error was raised.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ErrorEnvelope {
    pub kind: String,
    pub message: String,
    pub file: String,
    pub line: u32,
    pub column: u32,
    pub stack: Vec<StackFrame>,
}

impl From<&SonaError> for ErrorEnvelope {
    /// Builds an envelope with no file name and an empty call stack — used
    /// for errors raised before (or outside) `Interpreter::run_source_in`'s
    /// stack-tracking, such as a top-level parse error.
    fn from(err: &SonaError) -> Self {
        ErrorEnvelope::with_stack(err, String::new(), Vec::new())
    }
}

impl ErrorEnvelope {
    pub fn with_stack(err: &SonaError, file: String, stack: Vec<StackFrame>) -> Self {
        let span = err.span();
        ErrorEnvelope {
            kind: err.kind().to_string(),
            message: err.to_string(),
            file,
            line: span.line,
            column: span.column,
            stack,
        }
    }
}
