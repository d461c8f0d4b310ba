//! Runtime value types (spec's Data Model), generalizing the teacher's
//! `Value` enum from a Lisp S-expression tagged union to Sona's dynamically
//! typed object model.

use crate::env::Environment;
use crate::error::SonaError;
use crate::interpreter::Interpreter;
use crate::span::Span;
use indexmap::IndexMap;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// A user-defined function: parameter names, body statements, and the
/// closed-over defining environment. Mirrors the teacher's `Value::Lambda`
/// variant, generalized to a block body and an optional name for recursive
/// self-reference and stack traces.
/// A parameter name paired with its default value, already evaluated at
/// function-definition time in the defining scope (spec §4.1).
#[derive(Debug, Clone)]
pub struct BoundParam {
    pub name: String,
    pub default: Option<Value>,
}

#[derive(Debug)]
pub struct Function {
    pub name: Option<String>,
    pub params: Vec<BoundParam>,
    pub body: Rc<Vec<crate::ast::Stmt>>,
    pub env: Rc<Environment>,
    pub docstring: Option<String>,
    /// The class this was defined as a method of, if any — consulted by
    /// `super.m(...)` dispatch to start the lookup at the parent class
    /// (spec §4.3's `Class` statement semantics).
    pub defining_class: RefCell<Option<Rc<Class>>>,
}

/// A native function exposed by the host or a builtin module. Takes the
/// interpreter (for module/IO access), the evaluated arguments, and the call
/// site's span for error attribution.
pub type NativeFn = Rc<dyn Fn(&mut Interpreter, &[Value], Span) -> Result<Value, SonaError>>;

pub struct Native {
    pub name: String,
    pub arity: Option<usize>,
    pub func: NativeFn,
}

impl fmt::Debug for Native {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Native").field("name", &self.name).finish()
    }
}

/// A loaded module: either a user script's top-level bindings or a native
/// module's exported name table (spec §4.5).
#[derive(Debug)]
pub struct Module {
    pub name: String,
    pub env: Rc<Environment>,
    pub exports: Option<Vec<String>>,
    /// Set while this module's top-level body is still being evaluated, so
    /// a reentrant import mid-cycle can hand back this same proxy (spec
    /// §4.5): reading a name that hasn't landed yet is an `ImportError`
    /// rather than the ordinary missing-name error.
    pub in_progress: std::cell::Cell<bool>,
}

#[derive(Debug)]
pub struct Class {
    pub name: String,
    pub methods: IndexMap<String, Rc<Function>>,
    pub parent: Option<Rc<Class>>,
}

impl Class {
    pub fn find_method(&self, name: &str) -> Option<Rc<Function>> {
        if let Some(m) = self.methods.get(name) {
            return Some(m.clone());
        }
        self.parent.as_ref().and_then(|p| p.find_method(name))
    }
}

#[derive(Debug)]
pub struct Instance {
    pub class: Rc<Class>,
    pub fields: RefCell<IndexMap<String, Value>>,
}

#[derive(Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(Rc<str>),
    List(Rc<RefCell<Vec<Value>>>),
    Dict(Rc<RefCell<IndexMap<String, Value>>>),
    Function(Rc<Function>),
    Native(Rc<Native>),
    Module(Rc<Module>),
    Class(Rc<Class>),
    Instance(Rc<Instance>),
}

impl Value {
    pub fn string(s: impl Into<Rc<str>>) -> Self {
        Value::String(s.into())
    }

    pub fn list(items: Vec<Value>) -> Self {
        Value::List(Rc::new(RefCell::new(items)))
    }

    pub fn dict(entries: IndexMap<String, Value>) -> Self {
        Value::Dict(Rc::new(RefCell::new(entries)))
    }

    /// Sona truthiness: `null`, `false`, `0`, `0.0`, `""`, empty list/dict are
    /// falsy; everything else is truthy (spec §4.3 control-flow semantics).
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(n) => *n != 0,
            Value::Float(n) => *n != 0.0,
            Value::String(s) => !s.is_empty(),
            Value::List(items) => !items.borrow().is_empty(),
            Value::Dict(entries) => !entries.borrow().is_empty(),
            Value::Function(_)
            | Value::Native(_)
            | Value::Module(_)
            | Value::Class(_)
            | Value::Instance(_) => true,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::List(_) => "list",
            Value::Dict(_) => "dict",
            Value::Function(_) => "function",
            Value::Native(_) => "native_function",
            Value::Module(_) => "module",
            Value::Class(_) => "class",
            Value::Instance(_) => "instance",
        }
    }

    pub fn is_callable(&self) -> bool {
        matches!(
            self,
            Value::Function(_) | Value::Native(_) | Value::Class(_)
        )
    }

    /// Structural equality (spec's `==`): numbers compare across Int/Float,
    /// containers compare element-wise, everything else by identity-of-kind.
    pub fn equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => {
                *a as f64 == *b
            }
            (Value::String(a), Value::String(b)) => a == b,
            (Value::List(a), Value::List(b)) => {
                let (a, b) = (a.borrow(), b.borrow());
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.equals(y))
            }
            (Value::Dict(a), Value::Dict(b)) => {
                let (a, b) = (a.borrow(), b.borrow());
                a.len() == b.len()
                    && a.iter()
                        .all(|(k, v)| b.get(k).is_some_and(|bv| v.equals(bv)))
            }
            (Value::Instance(a), Value::Instance(b)) => Rc::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::Class(a), Value::Class(b)) => Rc::ptr_eq(a, b),
            (Value::Module(a), Value::Module(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(n) => write!(f, "{}", n),
            Value::Float(n) => {
                if n.fract() == 0.0 && n.is_finite() {
                    write!(f, "{:.1}", n)
                } else {
                    write!(f, "{}", n)
                }
            }
            Value::String(s) => write!(f, "{}", s),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.borrow().iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item.repr())?;
                }
                write!(f, "]")
            }
            Value::Dict(entries) => {
                write!(f, "{{")?;
                for (i, (k, v)) in entries.borrow().iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{:?}: {}", k, v.repr())?;
                }
                write!(f, "}}")
            }
            Value::Function(func) => write!(
                f,
                "<function {}>",
                func.name.as_deref().unwrap_or("anonymous")
            ),
            Value::Native(n) => write!(f, "<native {}>", n.name),
            Value::Module(m) => write!(f, "<module {}>", m.name),
            Value::Class(c) => write!(f, "<class {}>", c.name),
            Value::Instance(i) => write!(f, "<instance of {}>", i.class.name),
        }
    }
}

impl Value {
    /// The `repr`-style rendering used for nested container elements, where
    /// strings show their quotes (e.g. inside `print([1, "a"])`).
    fn repr(&self) -> String {
        match self {
            Value::String(s) => format!("{:?}", s),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_float_equal_across_kinds() {
        assert!(Value::Int(2).equals(&Value::Float(2.0)));
    }

    #[test]
    fn falsy_values() {
        assert!(!Value::Null.is_truthy());
        assert!(!Value::Int(0).is_truthy());
        assert!(!Value::string("").is_truthy());
        assert!(!Value::list(vec![]).is_truthy());
        assert!(Value::string("0").is_truthy());
    }

    #[test]
    fn list_display_uses_repr_for_strings() {
        let v = Value::list(vec![Value::Int(1), Value::string("a")]);
        assert_eq!(format!("{}", v), "[1, \"a\"]");
    }
}
