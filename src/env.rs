//! Scope chain (spec §4.4), closely following the teacher's `Environment`:
//! a `Rc`-linked chain of frames, each a `RefCell<HashMap<...>>`, so closures
//! can share and outlive the frame that created them.

use crate::error::SonaError;
use crate::span::Span;
use crate::value::Value;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

#[derive(Debug)]
pub struct Environment {
    bindings: RefCell<HashMap<String, Value>>,
    parent: Option<Rc<Environment>>,
}

impl Environment {
    /// Creates a new global environment with no parent.
    pub fn new() -> Rc<Self> {
        Rc::new(Environment {
            bindings: RefCell::new(HashMap::new()),
            parent: None,
        })
    }

    /// Creates a new child scope with a parent.
    pub fn with_parent(parent: Rc<Environment>) -> Rc<Self> {
        Rc::new(Environment {
            bindings: RefCell::new(HashMap::new()),
            parent: Some(parent),
        })
    }

    /// Alias kept for readability at call sites that create function/block
    /// scopes, e.g. `Environment::new_child(&closure_env)`.
    pub fn new_child(parent: &Rc<Environment>) -> Rc<Self> {
        Environment::with_parent(parent.clone())
    }

    /// Binds a name in THIS frame (`let`/params/function def), always
    /// shadowing an outer binding of the same name rather than updating it.
    pub fn define(&self, name: String, value: Value) {
        self.bindings.borrow_mut().insert(name, value);
    }

    /// Looks up a name, walking outward through parent frames.
    pub fn get(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.bindings.borrow().get(name) {
            return Some(value.clone());
        }
        self.parent.as_ref().and_then(|p| p.get(name))
    }

    pub fn has_own(&self, name: &str) -> bool {
        self.bindings.borrow().contains_key(name)
    }

    /// Updates the nearest enclosing binding of `name` (plain `x = expr`
    /// assignment, spec §4.4), distinct from `define`'s current-frame
    /// shadowing. Fails with `NameError` if no such binding exists anywhere
    /// in the chain — this interpreter never implicitly creates globals from
    /// an assignment inside a function body (see DESIGN.md's Open Question
    /// decision).
    pub fn assign(&self, name: &str, value: Value, span: Span) -> Result<(), SonaError> {
        if self.bindings.borrow().contains_key(name) {
            self.bindings.borrow_mut().insert(name.to_string(), value);
            return Ok(());
        }
        if let Some(ref parent) = self.parent {
            return parent.assign(name, value, span);
        }
        Err(SonaError::name_error(name, span))
    }

    pub fn is_global(&self) -> bool {
        self.parent.is_none()
    }

    /// Removes the nearest enclosing binding of `name` (`delete x`, spec
    /// §4.3). Fails with `NameError` if no such binding exists anywhere in
    /// the chain, mirroring `assign`'s nearest-enclosing-frame search.
    pub fn delete(&self, name: &str, span: Span) -> Result<(), SonaError> {
        if self.bindings.borrow_mut().remove(name).is_some() {
            return Ok(());
        }
        if let Some(ref parent) = self.parent {
            return parent.delete(name, span);
        }
        Err(SonaError::name_error(name, span))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::span::Span;

    #[test]
    fn define_and_get() {
        let env = Environment::new();
        env.define("x".to_string(), Value::Int(42));
        match env.get("x") {
            Some(Value::Int(n)) => assert_eq!(n, 42),
            _ => panic!("expected Int(42)"),
        }
    }

    #[test]
    fn undefined_name() {
        let env = Environment::new();
        assert!(env.get("undefined").is_none());
    }

    #[test]
    fn shadowing_does_not_mutate_parent() {
        let parent = Environment::new();
        parent.define("x".to_string(), Value::Int(42));

        let child = Environment::with_parent(parent.clone());
        child.define("x".to_string(), Value::Int(100));

        assert!(matches!(child.get("x"), Some(Value::Int(100))));
        assert!(matches!(parent.get("x"), Some(Value::Int(42))));
    }

    #[test]
    fn parent_lookup() {
        let parent = Environment::new();
        parent.define("x".to_string(), Value::Int(42));
        let child = Environment::with_parent(parent);
        assert!(matches!(child.get("x"), Some(Value::Int(42))));
    }

    #[test]
    fn assign_updates_nearest_enclosing_binding() {
        let parent = Environment::new();
        parent.define("x".to_string(), Value::Int(1));
        let child = Environment::with_parent(parent.clone());

        child.assign("x", Value::Int(2), Span::default()).unwrap();
        assert!(matches!(parent.get("x"), Some(Value::Int(2))));
        assert!(!child.has_own("x"));
    }

    #[test]
    fn assign_to_undefined_name_errors() {
        let env = Environment::new();
        assert!(env.assign("nope", Value::Null, Span::default()).is_err());
    }

    #[test]
    fn multiple_levels() {
        let grandparent = Environment::new();
        grandparent.define("a".to_string(), Value::Int(1));
        let parent = Environment::with_parent(grandparent);
        parent.define("b".to_string(), Value::Int(2));
        let child = Environment::with_parent(parent);
        child.define("c".to_string(), Value::Int(3));

        assert!(matches!(child.get("a"), Some(Value::Int(1))));
        assert!(matches!(child.get("b"), Some(Value::Int(2))));
        assert!(matches!(child.get("c"), Some(Value::Int(3))));
    }
}
