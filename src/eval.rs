//! The tree-walking evaluator (spec §4.3/§4.4): `eval_program`, `eval_block`,
//! `eval_stmt`, `eval_expr`. Generalizes the teacher's single recursive
//! `eval(Expr, &Environment) -> Result<Value, EvalError>` trampoline loop
//! (used there for tail-call self-recursion) into a statement-and-expression
//! walker that also threads `Flow` for `break`/`continue`/`return`, while
//! keeping the teacher's loop-instead-of-recurse trick for tail calls.
//!
//! Every block (`if`/`while`/`for`/`repeat`/`try`/`catch`/`finally`) runs in
//! a fresh child environment of its enclosing scope, so a `let` inside one
//! is shadowed outside it (spec §8's block-scoping invariant; see DESIGN.md's
//! Open Question decision on block scoping). A function/method call is the
//! only other place a new frame is introduced — that's a separate axis,
//! governing whether a plain assignment to an undefined name creates an
//! implicit global (see the function-scope-assignment Open Question below).

use crate::ast::{
    AssignTarget, BinOp, ClassMethod, CompareOp, Expr, ExprKind, FStringPart, FormatSpec,
    ImportKind, LogicalOp, MatchPattern, Param, Stmt, StmtKind, UnaryOp,
};
use crate::env::Environment;
use crate::error::SonaError;
use crate::flow::Flow;
use crate::interpreter::Interpreter;
use crate::span::Span;
use crate::value::{BoundParam, Class, Function, Instance, Value};
use indexmap::IndexMap;
use std::cell::RefCell;
use std::rc::Rc;

impl Interpreter {
    /// Runs a full program as a sequence of top-level statements, returning
    /// the value of the last expression statement (or `null`).
    pub(crate) fn eval_program(
        &mut self,
        stmts: &[Stmt],
        env: Rc<Environment>,
    ) -> Result<Value, SonaError> {
        let flow = self.eval_block(stmts, env)?;
        match flow {
            Flow::Return(v) | Flow::Value(v) => Ok(v),
            Flow::Break | Flow::Continue => Ok(Value::Null),
            Flow::TailCall(func, args) => self.call_function(func, args, Span::default()),
        }
    }

    /// Evaluates a sequence of statements in `env`, short-circuiting on the
    /// first non-`Value` signal (break/continue/return/tail-call).
    pub(crate) fn eval_block(
        &mut self,
        stmts: &[Stmt],
        env: Rc<Environment>,
    ) -> Result<Flow, SonaError> {
        let mut last = Flow::Value(Value::Null);
        for stmt in stmts {
            last = self.eval_stmt(stmt, env.clone())?;
            if last.is_signal() {
                return Ok(last);
            }
        }
        Ok(last)
    }

    fn eval_stmt(&mut self, stmt: &Stmt, env: Rc<Environment>) -> Result<Flow, SonaError> {
        let span = stmt.span;
        match &stmt.kind {
            StmtKind::Expr(expr) => {
                let value = self.eval_expr(expr, &env)?;
                Ok(Flow::Value(value))
            }
            StmtKind::Let(name, expr) => {
                let value = self.eval_expr(expr, &env)?;
                env.define(name.clone(), value);
                Ok(Flow::Value(Value::Null))
            }
            StmtKind::Assign(target, expr) => {
                let value = self.eval_expr(expr, &env)?;
                self.assign_target(target, value, &env, span)?;
                Ok(Flow::Value(Value::Null))
            }
            StmtKind::If {
                branches,
                else_branch,
            } => {
                for (cond, body) in branches {
                    if self.eval_expr(cond, &env)?.is_truthy() {
                        return self.eval_block(body, Environment::new_child(&env));
                    }
                }
                if let Some(body) = else_branch {
                    return self.eval_block(body, Environment::new_child(&env));
                }
                Ok(Flow::Value(Value::Null))
            }
            StmtKind::While { cond, body } => {
                while self.eval_expr(cond, &env)?.is_truthy() {
                    self.check_cancelled(span)?;
                    match self.eval_block(body, Environment::new_child(&env))? {
                        Flow::Break => break,
                        Flow::Continue | Flow::Value(_) => {}
                        other @ (Flow::Return(_) | Flow::TailCall(..)) => return Ok(other),
                    }
                }
                Ok(Flow::Value(Value::Null))
            }
            StmtKind::For { var, iter, body } => {
                let iterable = self.eval_expr(iter, &env)?;
                let items = self.iterate_values(&iterable, span)?;
                for item in items {
                    self.check_cancelled(span)?;
                    let scope = Environment::new_child(&env);
                    scope.define(var.clone(), item);
                    match self.eval_block(body, scope)? {
                        Flow::Break => break,
                        Flow::Continue | Flow::Value(_) => {}
                        other @ (Flow::Return(_) | Flow::TailCall(..)) => return Ok(other),
                    }
                }
                Ok(Flow::Value(Value::Null))
            }
            StmtKind::Repeat { count, body } => {
                let count_val = self.eval_expr(count, &env)?;
                let n = match count_val {
                    Value::Int(n) => n,
                    other => {
                        return Err(SonaError::type_error(
                            format!("repeat count must be an int, got {}", other.type_name()),
                            span,
                        ))
                    }
                };
                if n < 0 {
                    return Err(SonaError::type_error(
                        "repeat count must not be negative",
                        span,
                    ));
                }
                for _ in 0..n {
                    self.check_cancelled(span)?;
                    match self.eval_block(body, Environment::new_child(&env))? {
                        Flow::Break => break,
                        Flow::Continue | Flow::Value(_) => {}
                        other @ (Flow::Return(_) | Flow::TailCall(..)) => return Ok(other),
                    }
                }
                Ok(Flow::Value(Value::Null))
            }
            StmtKind::Break => Ok(Flow::Break),
            StmtKind::Continue => Ok(Flow::Continue),
            StmtKind::Return(expr) => {
                if let Some(expr) = expr {
                    if let Some(flow) = self.try_tail_call(expr, &env)? {
                        return Ok(flow);
                    }
                    let value = self.eval_expr(expr, &env)?;
                    Ok(Flow::Return(value))
                } else {
                    Ok(Flow::Return(Value::Null))
                }
            }
            StmtKind::FunctionDef {
                name,
                params,
                body,
                docstring,
            } => {
                let bound_params = self.bind_params(params, &env)?;
                let func = Rc::new(Function {
                    name: Some(name.clone()),
                    params: bound_params,
                    body: body.clone(),
                    env: env.clone(),
                    docstring: docstring.clone(),
                    defining_class: RefCell::new(None),
                });
                env.define(name.clone(), Value::Function(func));
                Ok(Flow::Value(Value::Null))
            }
            StmtKind::ClassDef {
                name,
                parent,
                methods,
            } => {
                let parent_class = match parent {
                    Some(parent_name) => match env.get(parent_name) {
                        Some(Value::Class(c)) => Some(c),
                        Some(other) => {
                            return Err(SonaError::type_error(
                                format!("{} is not a class", other.type_name()),
                                span,
                            ))
                        }
                        None => return Err(SonaError::name_error(parent_name.clone(), span)),
                    },
                    None => None,
                };
                let mut method_map = IndexMap::new();
                for method in methods {
                    let func = self.build_method(method, &env)?;
                    method_map.insert(method.name.clone(), func);
                }
                let class = Rc::new(Class {
                    name: name.clone(),
                    methods: method_map,
                    parent: parent_class,
                });
                for method in class.methods.values() {
                    *method.defining_class.borrow_mut() = Some(class.clone());
                }
                env.define(name.clone(), Value::Class(class));
                Ok(Flow::Value(Value::Null))
            }
            StmtKind::Import(kind) => {
                self.eval_import(kind, &env, span)?;
                Ok(Flow::Value(Value::Null))
            }
            StmtKind::TryCatchFinally {
                try_block,
                catch,
                finally,
            } => self.eval_try(try_block, catch, finally, &env),
            StmtKind::Throw(expr) => {
                let value = self.eval_expr(expr, &env)?;
                Err(self.value_to_throw(value, span))
            }
            StmtKind::Delete(target) => {
                self.delete_target(target, &env, span)?;
                Ok(Flow::Value(Value::Null))
            }
        }
    }

    fn delete_target(
        &mut self,
        target: &AssignTarget,
        env: &Rc<Environment>,
        span: Span,
    ) -> Result<(), SonaError> {
        match target {
            AssignTarget::Ident(name) => env.delete(name, span),
            AssignTarget::Index(target_expr, index_expr) => {
                let target_val = self.eval_expr(target_expr, env)?;
                let index_val = self.eval_expr(index_expr, env)?;
                match &target_val {
                    Value::List(items) => {
                        let i = Self::normalize_index(&index_val, items.borrow().len(), span)?;
                        items.borrow_mut().remove(i);
                        Ok(())
                    }
                    Value::Dict(entries) => {
                        let key = Self::as_dict_key(&index_val, span)?;
                        entries
                            .borrow_mut()
                            .shift_remove(&key)
                            .map(|_| ())
                            .ok_or(SonaError::KeyError { key, span })
                    }
                    other => Err(SonaError::type_error(
                        format!("cannot delete from {}", other.type_name()),
                        span,
                    )),
                }
            }
            AssignTarget::Attr(target_expr, name) => {
                let target_val = self.eval_expr(target_expr, env)?;
                match target_val {
                    Value::Instance(inst) => inst
                        .fields
                        .borrow_mut()
                        .shift_remove(name)
                        .map(|_| ())
                        .ok_or_else(|| SonaError::KeyError {
                            key: name.clone(),
                            span,
                        }),
                    other => Err(SonaError::type_error(
                        format!("cannot delete attribute on {}", other.type_name()),
                        span,
                    )),
                }
            }
        }
    }

    /// Evaluates each parameter's default-value expression (if any) in the
    /// defining scope, producing the bound parameter list stored on the
    /// `Function` (spec §4.1: defaults are evaluated once, at definition
    /// time, not per call).
    fn bind_params(
        &mut self,
        params: &[Param],
        env: &Rc<Environment>,
    ) -> Result<Vec<BoundParam>, SonaError> {
        let mut bound = Vec::with_capacity(params.len());
        for p in params {
            let default = match &p.default {
                Some(expr) => Some(self.eval_expr(expr, env)?),
                None => None,
            };
            bound.push(BoundParam {
                name: p.name.clone(),
                default,
            });
        }
        Ok(bound)
    }

    /// Builds a method's `Function`, prepending an implicit `self` parameter
    /// so that `call_function` (and its tail-call trampoline) can be reused
    /// unchanged for both plain functions and bound methods.
    fn build_method(
        &mut self,
        method: &ClassMethod,
        class_env: &Rc<Environment>,
    ) -> Result<Rc<Function>, SonaError> {
        let mut params = Vec::with_capacity(method.params.len() + 1);
        params.push(BoundParam {
            name: "self".to_string(),
            default: None,
        });
        params.extend(self.bind_params(&method.params, class_env)?);
        Ok(Rc::new(Function {
            name: Some(method.name.clone()),
            params,
            body: method.body.clone(),
            env: class_env.clone(),
            docstring: method.docstring.clone(),
            defining_class: RefCell::new(None),
        }))
    }

    fn assign_target(
        &mut self,
        target: &AssignTarget,
        value: Value,
        env: &Rc<Environment>,
        span: Span,
    ) -> Result<(), SonaError> {
        match target {
            AssignTarget::Ident(name) => match env.assign(name, value.clone(), span) {
                Ok(()) => Ok(()),
                Err(e) => {
                    if self.in_function_depth == 0 {
                        // Top-level script scope: an assignment to a name
                        // not found anywhere in the chain creates it in the
                        // real global frame, not whatever transient block
                        // scope (if/while/for) the assignment happens to be
                        // nested in.
                        self.globals.define(name.clone(), value);
                        Ok(())
                    } else {
                        Err(e)
                    }
                }
            },
            AssignTarget::Index(target_expr, index_expr) => {
                let target_val = self.eval_expr(target_expr, env)?;
                let index_val = self.eval_expr(index_expr, env)?;
                self.assign_index(&target_val, &index_val, value, span)
            }
            AssignTarget::Attr(target_expr, name) => {
                let target_val = self.eval_expr(target_expr, env)?;
                match target_val {
                    Value::Instance(inst) => {
                        inst.fields.borrow_mut().insert(name.clone(), value);
                        Ok(())
                    }
                    other => Err(SonaError::type_error(
                        format!("cannot set attribute on {}", other.type_name()),
                        span,
                    )),
                }
            }
        }
    }

    fn assign_index(
        &self,
        target: &Value,
        index: &Value,
        value: Value,
        span: Span,
    ) -> Result<(), SonaError> {
        match target {
            Value::List(items) => {
                let i = Self::normalize_index(index, items.borrow().len(), span)?;
                items.borrow_mut()[i] = value;
                Ok(())
            }
            Value::Dict(entries) => {
                let key = Self::as_dict_key(index, span)?;
                entries.borrow_mut().insert(key, value);
                Ok(())
            }
            other => Err(SonaError::type_error(
                format!("cannot index into {}", other.type_name()),
                span,
            )),
        }
    }

    fn as_dict_key(index: &Value, span: Span) -> Result<String, SonaError> {
        match index {
            Value::String(s) => Ok(s.to_string()),
            other => Err(SonaError::type_error(
                format!("dict keys must be strings, got {}", other.type_name()),
                span,
            )),
        }
    }

    fn normalize_index(index: &Value, len: usize, span: Span) -> Result<usize, SonaError> {
        let i = match index {
            Value::Int(n) => *n,
            other => {
                return Err(SonaError::type_error(
                    format!("list index must be an int, got {}", other.type_name()),
                    span,
                ))
            }
        };
        let adjusted = if i < 0 { i + len as i64 } else { i };
        if adjusted < 0 || adjusted as usize >= len {
            return Err(SonaError::IndexError {
                index: i,
                length: len,
                span,
            });
        }
        Ok(adjusted as usize)
    }

    fn iterate_values(&self, value: &Value, span: Span) -> Result<Vec<Value>, SonaError> {
        match value {
            Value::List(items) => Ok(items.borrow().clone()),
            Value::Dict(entries) => Ok(entries
                .borrow()
                .keys()
                .map(|k| Value::string(k.clone()))
                .collect()),
            Value::String(s) => Ok(s.chars().map(|c| Value::string(c.to_string())).collect()),
            other => Err(SonaError::type_error(
                format!("{} is not iterable", other.type_name()),
                span,
            )),
        }
    }

    fn eval_try(
        &mut self,
        try_block: &[Stmt],
        catch: &Option<(Option<String>, Vec<Stmt>)>,
        finally: &Option<Vec<Stmt>>,
        env: &Rc<Environment>,
    ) -> Result<Flow, SonaError> {
        let mut result = match self.eval_block(try_block, Environment::new_child(env)) {
            Ok(flow) => Ok(flow),
            Err(e) => {
                if let Some((binding, catch_body)) = catch {
                    let catch_scope = Environment::new_child(env);
                    if let Some(name) = binding {
                        catch_scope.define(name.clone(), self.error_to_value(&e));
                    }
                    self.eval_block(catch_body, catch_scope)
                } else {
                    Err(e)
                }
            }
        };
        if let Some(finally_body) = finally {
            let finally_flow = self.eval_block(finally_body, Environment::new_child(env))?;
            if finally_flow.is_signal() {
                result = Ok(finally_flow);
            }
        }
        result
    }

    fn error_to_value(&self, err: &SonaError) -> Value {
        let span = err.span();
        let mut entries = IndexMap::new();
        entries.insert("kind".to_string(), Value::string(err.kind()));
        entries.insert("message".to_string(), Value::string(err.to_string()));
        entries.insert("line".to_string(), Value::Int(span.line as i64));
        entries.insert("column".to_string(), Value::Int(span.column as i64));
        Value::dict(entries)
    }

    fn value_to_throw(&self, value: Value, span: Span) -> SonaError {
        if let Value::Dict(entries) = &value {
            let entries = entries.borrow();
            let kind = entries
                .get("kind")
                .map(|v| v.to_string())
                .unwrap_or_else(|| "Error".to_string());
            let message = entries
                .get("message")
                .map(|v| v.to_string())
                .unwrap_or_else(|| value.to_string());
            return SonaError::UserError {
                kind,
                message,
                span,
            };
        }
        SonaError::UserError {
            kind: "Error".to_string(),
            message: value.to_string(),
            span,
        }
    }

    fn eval_import(
        &mut self,
        kind: &ImportKind,
        env: &Rc<Environment>,
        span: Span,
    ) -> Result<(), SonaError> {
        match kind {
            ImportKind::Module(name) => {
                let module = self.load_module(name, span)?;
                // `import a.b` binds the last dotted segment (`b`) locally;
                // `a.b` itself isn't an identifier the lexer would ever
                // produce, so the full dotted name can't be referenced bare.
                let bind_name = name.rsplit('.').next().unwrap_or(name);
                env.define(bind_name.to_string(), Value::Module(module));
            }
            ImportKind::ModuleAs(name, alias) => {
                let module = self.load_module(name, span)?;
                env.define(alias.clone(), Value::Module(module));
            }
            ImportKind::Names(name, names) => {
                let module = self.load_module(name, span)?;
                for n in names {
                    match module.env.get(n) {
                        Some(v) => env.define(n.clone(), v),
                        None if module.in_progress.get() => {
                            return Err(SonaError::ImportError {
                                message: format!(
                                    "cycle: '{}' is not yet defined in module '{}' (still loading)",
                                    n, name
                                ),
                                span,
                            })
                        }
                        None => {
                            return Err(SonaError::ImportError {
                                message: format!("module {} has no export {}", name, n),
                                span,
                            })
                        }
                    }
                }
            }
            ImportKind::Wildcard(name) => {
                return Err(SonaError::ImportError {
                    message: format!(
                        "wildcard import from {} is not allowed for native modules",
                        name
                    ),
                    span,
                });
            }
        }
        Ok(())
    }

    /// Detects `return f(args)` where the bare name `f` resolves to the
    /// function currently executing, and produces a `Flow::TailCall` instead
    /// of recursing — the generalized form of the teacher's tail-call loop.
    ///
    /// Only a bare-identifier callee is considered: looking one up has no
    /// side effects, so if it turns out not to be a self-tail-call, `eval_stmt`
    /// falling back to re-evaluating the whole `Call` expression re-reads the
    /// same name harmlessly. Any other callee shape (a computed expression,
    /// an attribute access, a nested call, ...) is left entirely to that
    /// fallback so a callee with side effects is evaluated exactly once.
    fn try_tail_call(
        &mut self,
        expr: &Expr,
        env: &Rc<Environment>,
    ) -> Result<Option<Flow>, SonaError> {
        let ExprKind::Call { callee, args } = &expr.kind else {
            return Ok(None);
        };
        let ExprKind::Ident(_) = &callee.kind else {
            return Ok(None);
        };
        let Some(current) = self.tail_call_target.clone() else {
            return Ok(None);
        };
        let callee_val = self.eval_expr(callee, env)?;
        let Value::Function(f) = callee_val else {
            return Ok(None);
        };
        if !Rc::ptr_eq(&f, &current) {
            return Ok(None);
        }
        let mut arg_values = Vec::with_capacity(args.len());
        for a in args {
            arg_values.push(self.eval_expr(a, env)?);
        }
        Ok(Some(Flow::TailCall(f, arg_values)))
    }

    pub(crate) fn eval_expr(
        &mut self,
        expr: &Expr,
        env: &Rc<Environment>,
    ) -> Result<Value, SonaError> {
        let span = expr.span;
        match &expr.kind {
            ExprKind::Null => Ok(Value::Null),
            ExprKind::Bool(b) => Ok(Value::Bool(*b)),
            ExprKind::Int(n) => Ok(Value::Int(*n)),
            ExprKind::Float(n) => Ok(Value::Float(*n)),
            ExprKind::Str(s) => Ok(Value::String(s.clone())),
            ExprKind::FString(parts) => self.eval_fstring(parts, env, span),
            ExprKind::Ident(name) => env
                .get(name)
                .ok_or_else(|| SonaError::name_error(name.clone(), span)),
            ExprKind::ListLit(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    if let ExprKind::Spread(inner) = &item.kind {
                        let spread_val = self.eval_expr(inner, env)?;
                        values.extend(self.iterate_values(&spread_val, item.span)?);
                    } else {
                        values.push(self.eval_expr(item, env)?);
                    }
                }
                Ok(Value::list(values))
            }
            ExprKind::DictLit(pairs) => {
                let mut entries = IndexMap::new();
                for (k, v) in pairs {
                    let key_val = self.eval_expr(k, env)?;
                    let key = Self::as_dict_key(&key_val, span)?;
                    let value = self.eval_expr(v, env)?;
                    entries.insert(key, value);
                }
                Ok(Value::dict(entries))
            }
            ExprKind::Unary(op, inner) => {
                let value = self.eval_expr(inner, env)?;
                self.eval_unary(*op, value, span)
            }
            ExprKind::Binary(op, left, right) => {
                let l = self.eval_expr(left, env)?;
                let r = self.eval_expr(right, env)?;
                self.eval_binary(*op, l, r, span)
            }
            ExprKind::Logical(op, left, right) => {
                let l = self.eval_expr(left, env)?;
                match op {
                    LogicalOp::And => {
                        if !l.is_truthy() {
                            Ok(l)
                        } else {
                            self.eval_expr(right, env)
                        }
                    }
                    LogicalOp::Or => {
                        if l.is_truthy() {
                            Ok(l)
                        } else {
                            self.eval_expr(right, env)
                        }
                    }
                }
            }
            ExprKind::Compare { operands, ops } => self.eval_compare(operands, ops, env, span),
            ExprKind::Ternary(cond, then_branch, else_branch) => {
                if self.eval_expr(cond, env)?.is_truthy() {
                    self.eval_expr(then_branch, env)
                } else {
                    self.eval_expr(else_branch, env)
                }
            }
            ExprKind::Call { callee, args } => self.eval_call(callee, args, env, span),
            ExprKind::Index(target, index) => {
                let target_val = self.eval_expr(target, env)?;
                let index_val = self.eval_expr(index, env)?;
                self.eval_index(&target_val, &index_val, span)
            }
            ExprKind::Slice { target, start, end } => {
                let target_val = self.eval_expr(target, env)?;
                let start_val = match start {
                    Some(e) => Some(self.eval_expr(e, env)?),
                    None => None,
                };
                let end_val = match end {
                    Some(e) => Some(self.eval_expr(e, env)?),
                    None => None,
                };
                self.eval_slice(&target_val, start_val, end_val, span)
            }
            ExprKind::Get(target, name) => {
                let target_val = self.eval_expr(target, env)?;
                self.eval_get(&target_val, name, span)
            }
            ExprKind::Lambda { params, body } => {
                let bound_params = self.bind_params(params, env)?;
                Ok(Value::Function(Rc::new(Function {
                    name: None,
                    params: bound_params,
                    body: body.clone(),
                    env: env.clone(),
                    docstring: None,
                    defining_class: RefCell::new(None),
                })))
            }
            ExprKind::Comprehension {
                expr,
                var,
                iter,
                cond,
            } => {
                let iterable = self.eval_expr(iter, env)?;
                let items = self.iterate_values(&iterable, span)?;
                let scope = Environment::new_child(env);
                let mut out = Vec::new();
                for item in items {
                    self.check_cancelled(span)?;
                    scope.define(var.clone(), item);
                    if let Some(cond) = cond {
                        if !self.eval_expr(cond, &scope)?.is_truthy() {
                            continue;
                        }
                    }
                    out.push(self.eval_expr(expr, &scope)?);
                }
                Ok(Value::list(out))
            }
            ExprKind::Match { subject, arms } => {
                let value = self.eval_expr(subject, env)?;
                for (patterns, arm) in arms {
                    for pattern in patterns {
                        let matched = match pattern {
                            MatchPattern::Wildcard => true,
                            MatchPattern::Literal(lit_expr) => {
                                let lit = self.eval_expr(lit_expr, env)?;
                                value.equals(&lit)
                            }
                        };
                        if matched {
                            return self.eval_expr(arm, env);
                        }
                    }
                }
                Err(SonaError::ValueError {
                    message: format!("no match arm matched value {}", value),
                    span,
                })
            }
            ExprKind::Spread(inner) => self.eval_expr(inner, env),
        }
    }

    fn eval_unary(&self, op: UnaryOp, value: Value, span: Span) -> Result<Value, SonaError> {
        match op {
            UnaryOp::Not => Ok(Value::Bool(!value.is_truthy())),
            UnaryOp::Neg => match value {
                Value::Int(n) => Ok(Value::Int(-n)),
                Value::Float(n) => Ok(Value::Float(-n)),
                other => Err(SonaError::type_error(
                    format!("cannot negate {}", other.type_name()),
                    span,
                )),
            },
        }
    }

    fn eval_binary(&self, op: BinOp, l: Value, r: Value, span: Span) -> Result<Value, SonaError> {
        if let BinOp::Add = op {
            if let (Value::String(a), Value::String(b)) = (&l, &r) {
                return Ok(Value::string(format!("{}{}", a, b)));
            }
            if let (Value::List(a), Value::List(b)) = (&l, &r) {
                let mut combined = a.borrow().clone();
                combined.extend(b.borrow().iter().cloned());
                return Ok(Value::list(combined));
            }
        }
        let (a, b) = match (&l, &r) {
            (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => (l, r),
            _ => {
                return Err(SonaError::type_error(
                    format!(
                        "unsupported operand types for {:?}: {} and {}",
                        op,
                        l.type_name(),
                        r.type_name()
                    ),
                    span,
                ))
            }
        };
        let both_int = matches!((&a, &b), (Value::Int(_), Value::Int(_)));
        match op {
            BinOp::Add | BinOp::Sub | BinOp::Mul => {
                if both_int {
                    let (x, y) = (Self::as_i64(&a), Self::as_i64(&b));
                    Ok(Value::Int(match op {
                        BinOp::Add => x.wrapping_add(y),
                        BinOp::Sub => x.wrapping_sub(y),
                        BinOp::Mul => x.wrapping_mul(y),
                        _ => unreachable!(),
                    }))
                } else {
                    let (x, y) = (Self::as_f64(&a), Self::as_f64(&b));
                    Ok(Value::Float(match op {
                        BinOp::Add => x + y,
                        BinOp::Sub => x - y,
                        BinOp::Mul => x * y,
                        _ => unreachable!(),
                    }))
                }
            }
            BinOp::Div => {
                let (x, y) = (Self::as_f64(&a), Self::as_f64(&b));
                if y == 0.0 {
                    return Err(SonaError::ZeroDivisionError { span });
                }
                Ok(Value::Float(x / y))
            }
            BinOp::FloorDiv => {
                if both_int {
                    let (x, y) = (Self::as_i64(&a), Self::as_i64(&b));
                    if y == 0 {
                        return Err(SonaError::ZeroDivisionError { span });
                    }
                    // Truncating `/` rounds toward zero; correct it to round
                    // toward negative infinity whenever there's a nonzero
                    // remainder of opposite sign from the divisor (e.g.
                    // `7 // -3` is `-3`, not the truncated `-2`).
                    let q = x / y;
                    let r = x % y;
                    let floor_q = if r != 0 && (r < 0) != (y < 0) { q - 1 } else { q };
                    Ok(Value::Int(floor_q))
                } else {
                    let (x, y) = (Self::as_f64(&a), Self::as_f64(&b));
                    if y == 0.0 {
                        return Err(SonaError::ZeroDivisionError { span });
                    }
                    Ok(Value::Float((x / y).floor()))
                }
            }
            BinOp::Mod => {
                if both_int {
                    let (x, y) = (Self::as_i64(&a), Self::as_i64(&b));
                    if y == 0 {
                        return Err(SonaError::ZeroDivisionError { span });
                    }
                    // `%` takes the sign of the divisor, not the dividend:
                    // `7 % -3` is `-2`, not Rust's truncating-remainder `1`.
                    let r = x % y;
                    let floored_r = if r != 0 && (r < 0) != (y < 0) { r + y } else { r };
                    Ok(Value::Int(floored_r))
                } else {
                    let (x, y) = (Self::as_f64(&a), Self::as_f64(&b));
                    if y == 0.0 {
                        return Err(SonaError::ZeroDivisionError { span });
                    }
                    let m = x - (x / y).floor() * y;
                    Ok(Value::Float(m))
                }
            }
        }
    }

    fn as_i64(v: &Value) -> i64 {
        match v {
            Value::Int(n) => *n,
            Value::Float(n) => *n as i64,
            _ => 0,
        }
    }

    fn as_f64(v: &Value) -> f64 {
        match v {
            Value::Int(n) => *n as f64,
            Value::Float(n) => *n,
            _ => 0.0,
        }
    }

    fn eval_compare(
        &mut self,
        operands: &[Expr],
        ops: &[CompareOp],
        env: &Rc<Environment>,
        span: Span,
    ) -> Result<Value, SonaError> {
        let mut values = Vec::with_capacity(operands.len());
        for operand in operands {
            values.push(self.eval_expr(operand, env)?);
        }
        for (i, op) in ops.iter().enumerate() {
            if !Self::compare_pair(&values[i], *op, &values[i + 1], span)? {
                return Ok(Value::Bool(false));
            }
        }
        Ok(Value::Bool(true))
    }

    fn compare_pair(a: &Value, op: CompareOp, b: &Value, span: Span) -> Result<bool, SonaError> {
        if let CompareOp::Eq = op {
            return Ok(a.equals(b));
        }
        if let CompareOp::NotEq = op {
            return Ok(!a.equals(b));
        }
        if let CompareOp::In = op {
            return Self::eval_membership(a, b, span);
        }
        let ordering = match (a, b) {
            (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
                Self::as_f64(a).partial_cmp(&Self::as_f64(b))
            }
            (Value::String(x), Value::String(y)) => Some(x.as_ref().cmp(y.as_ref())),
            _ => {
                return Err(SonaError::type_error(
                    format!("cannot compare {} and {}", a.type_name(), b.type_name()),
                    span,
                ))
            }
        };
        let Some(ordering) = ordering else {
            return Ok(false);
        };
        Ok(match op {
            CompareOp::Lt => ordering.is_lt(),
            CompareOp::LtEq => ordering.is_le(),
            CompareOp::Gt => ordering.is_gt(),
            CompareOp::GtEq => ordering.is_ge(),
            CompareOp::Eq | CompareOp::NotEq | CompareOp::In => unreachable!(),
        })
    }

    /// `a in b`: substring search for strings, element search for lists,
    /// key lookup for dicts (spec §4.3).
    fn eval_membership(a: &Value, b: &Value, span: Span) -> Result<bool, SonaError> {
        match b {
            Value::String(haystack) => match a {
                Value::String(needle) => Ok(haystack.contains(needle.as_ref())),
                other => Err(SonaError::type_error(
                    format!("cannot test membership of {} in string", other.type_name()),
                    span,
                )),
            },
            Value::List(items) => Ok(items.borrow().iter().any(|item| item.equals(a))),
            Value::Dict(entries) => {
                let key = Self::as_dict_key(a, span)?;
                Ok(entries.borrow().contains_key(&key))
            }
            other => Err(SonaError::type_error(
                format!("cannot test membership in {}", other.type_name()),
                span,
            )),
        }
    }

    fn eval_index(&self, target: &Value, index: &Value, span: Span) -> Result<Value, SonaError> {
        match target {
            Value::List(items) => {
                let i = Self::normalize_index(index, items.borrow().len(), span)?;
                Ok(items.borrow()[i].clone())
            }
            Value::String(s) => {
                let chars: Vec<char> = s.chars().collect();
                let i = Self::normalize_index(index, chars.len(), span)?;
                Ok(Value::string(chars[i].to_string()))
            }
            Value::Dict(entries) => {
                let key = Self::as_dict_key(index, span)?;
                entries
                    .borrow()
                    .get(&key)
                    .cloned()
                    .ok_or(SonaError::KeyError { key, span })
            }
            other => Err(SonaError::type_error(
                format!("cannot index into {}", other.type_name()),
                span,
            )),
        }
    }

    fn eval_slice(
        &self,
        target: &Value,
        start: Option<Value>,
        end: Option<Value>,
        span: Span,
    ) -> Result<Value, SonaError> {
        let as_bound = |v: Option<Value>, len: usize, default: usize| -> Result<usize, SonaError> {
            match v {
                None => Ok(default),
                Some(Value::Int(n)) => {
                    let adjusted = if n < 0 { n + len as i64 } else { n };
                    Ok(adjusted.clamp(0, len as i64) as usize)
                }
                Some(other) => Err(SonaError::type_error(
                    format!("slice bound must be an int, got {}", other.type_name()),
                    span,
                )),
            }
        };
        match target {
            Value::List(items) => {
                let items = items.borrow();
                let s = as_bound(start, items.len(), 0)?;
                let e = as_bound(end, items.len(), items.len())?;
                Ok(Value::list(if s < e {
                    items[s..e].to_vec()
                } else {
                    vec![]
                }))
            }
            Value::String(text) => {
                let chars: Vec<char> = text.chars().collect();
                let s = as_bound(start, chars.len(), 0)?;
                let e = as_bound(end, chars.len(), chars.len())?;
                let slice: String = if s < e {
                    chars[s..e].iter().collect()
                } else {
                    String::new()
                };
                Ok(Value::string(slice))
            }
            other => Err(SonaError::type_error(
                format!("cannot slice {}", other.type_name()),
                span,
            )),
        }
    }

    fn eval_get(&self, target: &Value, name: &str, span: Span) -> Result<Value, SonaError> {
        match target {
            Value::Instance(inst) => {
                if let Some(field) = inst.fields.borrow().get(name) {
                    return Ok(field.clone());
                }
                if let Some(method) = inst.class.find_method(name) {
                    return Ok(Value::Function(method));
                }
                Err(SonaError::KeyError {
                    key: name.to_string(),
                    span,
                })
            }
            Value::Module(module) => module.env.get(name).ok_or_else(|| {
                if module.in_progress.get() {
                    SonaError::ImportError {
                        message: format!(
                            "cycle: '{}' is not yet defined in module '{}' (still loading)",
                            name, module.name
                        ),
                        span,
                    }
                } else {
                    SonaError::KeyError {
                        key: name.to_string(),
                        span,
                    }
                }
            }),
            Value::Dict(entries) => {
                entries.borrow().get(name).cloned().ok_or(SonaError::KeyError {
                    key: name.to_string(),
                    span,
                })
            }
            other => Err(SonaError::type_error(
                format!("{} has no attribute {}", other.type_name(), name),
                span,
            )),
        }
    }

    fn eval_call(
        &mut self,
        callee: &Expr,
        args: &[Expr],
        env: &Rc<Environment>,
        span: Span,
    ) -> Result<Value, SonaError> {
        self.check_cancelled(span)?;
        if let ExprKind::Get(target, name) = &callee.kind {
            if matches!(&target.kind, ExprKind::Ident(id) if id == "super") {
                return self.eval_super_call(name, args, env, span);
            }
            let target_val = self.eval_expr(target, env)?;
            if let Value::Instance(inst) = &target_val {
                if !inst.fields.borrow().contains_key(name.as_str()) {
                    if let Some(method) = inst.class.find_method(name) {
                        let mut arg_values = Vec::with_capacity(args.len() + 1);
                        arg_values.push(target_val.clone());
                        for a in args {
                            arg_values.push(self.eval_expr(a, env)?);
                        }
                        return self.call_function(method, arg_values, span);
                    }
                }
            }
            if let Value::Dict(entries) = &target_val {
                if name == "get" && (args.len() == 1 || args.len() == 2) {
                    let mut arg_values = Vec::with_capacity(args.len());
                    for a in args {
                        arg_values.push(self.eval_expr(a, env)?);
                    }
                    let key = match &arg_values[0] {
                        Value::String(s) => s.to_string(),
                        other => {
                            return Err(SonaError::type_error(
                                format!("dict.get expected a string key, got {}", other.type_name()),
                                span,
                            ))
                        }
                    };
                    return Ok(entries
                        .borrow()
                        .get(&key)
                        .cloned()
                        .unwrap_or_else(|| arg_values.get(1).cloned().unwrap_or(Value::Null)));
                }
            }
            let callee_val = self.eval_get(&target_val, name, span)?;
            let mut arg_values = Vec::with_capacity(args.len());
            for a in args {
                arg_values.push(self.eval_expr(a, env)?);
            }
            return self.call_value(callee_val, arg_values, span);
        }
        let callee_val = self.eval_expr(callee, env)?;
        let mut arg_values = Vec::with_capacity(args.len());
        for a in args {
            arg_values.push(self.eval_expr(a, env)?);
        }
        self.call_value(callee_val, arg_values, span)
    }

    /// Dispatches `super.m(args)`: looks up `m` starting at the parent of
    /// the class the currently-executing method was defined on, then calls
    /// it bound to the same `self` instance (spec §4.3's `Class` semantics).
    fn eval_super_call(
        &mut self,
        name: &str,
        args: &[Expr],
        env: &Rc<Environment>,
        span: Span,
    ) -> Result<Value, SonaError> {
        let current_class = self
            .current_class
            .clone()
            .ok_or_else(|| SonaError::name_error("super", span))?;
        let parent = current_class
            .parent
            .clone()
            .ok_or_else(|| SonaError::type_error(format!("{} has no parent class", current_class.name), span))?;
        let method = parent.find_method(name).ok_or_else(|| SonaError::KeyError {
            key: name.to_string(),
            span,
        })?;
        let self_val = env
            .get("self")
            .ok_or_else(|| SonaError::name_error("self", span))?;
        let mut arg_values = Vec::with_capacity(args.len() + 1);
        arg_values.push(self_val);
        for a in args {
            arg_values.push(self.eval_expr(a, env)?);
        }
        self.call_function(method, arg_values, span)
    }

    /// General call dispatch for a callee value that isn't a bound-method
    /// attribute access (which `eval_call` handles directly).
    pub(crate) fn call_value(
        &mut self,
        callee: Value,
        args: Vec<Value>,
        span: Span,
    ) -> Result<Value, SonaError> {
        match callee {
            Value::Function(f) => self.call_function(f, args, span),
            Value::Native(n) => {
                if let Some(expected) = n.arity {
                    if expected != args.len() {
                        return Err(SonaError::arity_error(
                            n.name.clone(),
                            expected.to_string(),
                            args.len(),
                            span,
                        ));
                    }
                }
                (n.func)(self, &args, span)
            }
            Value::Class(class) => self.instantiate(class, args, span),
            other => Err(SonaError::NotCallable {
                type_name: other.type_name().to_string(),
                span,
            }),
        }
    }

    fn instantiate(
        &mut self,
        class: Rc<Class>,
        args: Vec<Value>,
        span: Span,
    ) -> Result<Value, SonaError> {
        let instance = Rc::new(Instance {
            class: class.clone(),
            fields: RefCell::new(IndexMap::new()),
        });
        if let Some(init) = class.find_method("init") {
            let mut call_args = Vec::with_capacity(args.len() + 1);
            call_args.push(Value::Instance(instance.clone()));
            call_args.extend(args);
            self.call_function(init, call_args, span)?;
        }
        Ok(Value::Instance(instance))
    }

    /// Calls a user-defined function (or bound method, whose `self` is
    /// already the first entry in `args`). Loops instead of recursing on
    /// `Flow::TailCall`, generalizing the teacher's tail-call trampoline.
    pub(crate) fn call_function(
        &mut self,
        func: Rc<Function>,
        args: Vec<Value>,
        span: Span,
    ) -> Result<Value, SonaError> {
        let mut func = func;
        let mut args = args;
        loop {
            self.check_cancelled(span)?;
            let required = func.params.iter().filter(|p| p.default.is_none()).count();
            if args.len() < required || args.len() > func.params.len() {
                let expected = if required == func.params.len() {
                    required.to_string()
                } else {
                    format!("{}..{}", required, func.params.len())
                };
                return Err(SonaError::arity_error(
                    func.name
                        .clone()
                        .unwrap_or_else(|| "<anonymous>".to_string()),
                    expected,
                    args.len(),
                    span,
                ));
            }
            let call_env = Environment::new_child(&func.env);
            let mut args_iter = args.into_iter();
            for param in func.params.iter() {
                let value = match args_iter.next() {
                    Some(v) => v,
                    None => param
                        .default
                        .clone()
                        .expect("missing arg already validated against defaults"),
                };
                call_env.define(param.name.clone(), value);
            }

            let previous_target = self.tail_call_target.replace(func.clone());
            let previous_class = self
                .current_class
                .clone();
            self.current_class = func.defining_class.borrow().clone();
            self.in_function_depth += 1;
            let frame = crate::error::StackFrame {
                function: func
                    .name
                    .clone()
                    .unwrap_or_else(|| "<anonymous>".to_string()),
                file: self.current_file.clone().unwrap_or_default(),
                line: span.line,
            };
            self.call_stack.borrow_mut().push(frame);
            let flow = self.eval_block(&func.body, call_env);
            self.in_function_depth -= 1;
            self.current_class = previous_class;
            self.tail_call_target = previous_target;

            // Pop only on success: an in-flight error leaves its frame (and
            // every caller's frame above it) on the stack so the envelope
            // built at the top level sees the full chain.
            let flow = flow?;
            self.call_stack.borrow_mut().pop();

            match flow {
                Flow::Return(v) | Flow::Value(v) => return Ok(v),
                Flow::Break | Flow::Continue => return Ok(Value::Null),
                Flow::TailCall(next_func, next_args) => {
                    func = next_func;
                    args = next_args;
                    continue;
                }
            }
        }
    }

    fn eval_fstring(
        &mut self,
        parts: &[FStringPart],
        env: &Rc<Environment>,
        span: Span,
    ) -> Result<Value, SonaError> {
        let mut out = String::new();
        for part in parts {
            match part {
                FStringPart::Literal(text) => out.push_str(text),
                FStringPart::Interp { expr, spec } => {
                    let value = self.eval_expr(expr, env)?;
                    out.push_str(&Self::format_value(&value, *spec, span)?);
                }
            }
        }
        Ok(Value::string(out))
    }

    fn format_value(
        value: &Value,
        spec: Option<FormatSpec>,
        span: Span,
    ) -> Result<String, SonaError> {
        match spec {
            None => Ok(value.to_string()),
            Some(FormatSpec::Precision(n)) => match value {
                Value::Float(f) => Ok(format!("{:.*}", n as usize, f)),
                Value::Int(i) => Ok(format!("{:.*}", n as usize, *i as f64)),
                other => Err(SonaError::type_error(
                    format!(
                        "format spec .{}f requires a number, got {}",
                        n,
                        other.type_name()
                    ),
                    span,
                )),
            },
            Some(FormatSpec::Thousands) => match value {
                Value::Int(i) => Ok(Self::group_thousands(&i.unsigned_abs().to_string(), *i < 0)),
                Value::Float(f) => {
                    let formatted = format!("{:.2}", f.abs());
                    let (int_part, frac_part) =
                        formatted.split_once('.').unwrap_or((&formatted, ""));
                    let grouped = Self::group_thousands(int_part, *f < 0.0);
                    Ok(format!("{}.{}", grouped, frac_part))
                }
                other => Err(SonaError::type_error(
                    format!("format spec , requires a number, got {}", other.type_name()),
                    span,
                )),
            },
            Some(FormatSpec::AlignLeft(width)) => Ok(format!(
                "{:<width$}",
                value.to_string(),
                width = width as usize
            )),
            Some(FormatSpec::AlignRight(width)) => Ok(format!(
                "{:>width$}",
                value.to_string(),
                width = width as usize
            )),
            Some(FormatSpec::AlignCenter(width)) => Ok(format!(
                "{:^width$}",
                value.to_string(),
                width = width as usize
            )),
        }
    }

    fn group_thousands(digits: &str, negative: bool) -> String {
        let mut grouped = String::new();
        for (i, ch) in digits.chars().rev().enumerate() {
            if i > 0 && i % 3 == 0 {
                grouped.push(',');
            }
            grouped.push(ch);
        }
        let grouped: String = grouped.chars().rev().collect();
        if negative {
            format!("-{}", grouped)
        } else {
            grouped
        }
    }
}
