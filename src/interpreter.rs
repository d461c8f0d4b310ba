//! The host embedding API (spec §6): `Interpreter::new`, `run_source`,
//! `eval_repl`, `register_native`, `set_cancel_flag`. Generalizes the
//! teacher's `main()` wiring (sandbox/env/macro-registry/builtins assembled
//! by hand in the binary) into a reusable library entry point, per
//! SPEC_FULL's redesign flag confining module-cache/cancellation state to a
//! single struct instead of globals.

use crate::builtins;
use crate::config::InterpreterConfig;
use crate::env::Environment;
use crate::error::{ErrorEnvelope, SonaError, StackFrame};
use crate::modules::ModuleLoader;
use crate::parser::parse_program;
use crate::span::Span;
use crate::typecheck::TypeChecker;
use crate::value::{Class, Function, Module, Native, NativeFn, Value};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

/// A single Sona interpreter instance. Owns the global scope, the module
/// cache, the type checker, and the cooperative-cancellation flag, so that
/// independent tests (and independent host embeddings) never share mutable
/// global state — see SPEC_FULL's Module-loader section.
pub struct Interpreter {
    pub globals: Rc<Environment>,
    pub config: InterpreterConfig,
    pub modules: ModuleLoader,
    pub type_checker: TypeChecker,
    pub cancel_flag: Rc<Cell<bool>>,
    pub(crate) natives: HashMap<String, Value>,
    /// The function currently executing, if any — consulted by the
    /// tail-call trampoline in `eval.rs` to recognize self-recursive
    /// `return f(...)` calls.
    pub(crate) tail_call_target: Option<Rc<Function>>,
    /// Depth of nested function/method calls; zero means the interpreter is
    /// executing top-level script statements, which governs whether a plain
    /// assignment to an undefined name implicitly creates a global (spec's
    /// function-scope-assignment Open Question).
    pub(crate) in_function_depth: usize,
    /// The class a currently-executing method was defined on, if any —
    /// lets `super.m(...)` start method lookup at the parent of this class
    /// rather than the instance's actual runtime class.
    pub(crate) current_class: Option<Rc<Class>>,
    /// Host-registered native modules, consulted before on-disk resolution
    /// (spec §4.5 resolution order: cache, then native implementations,
    /// then `.smod`/source files on the search path).
    native_modules: HashMap<String, Rc<Module>>,
    /// The name of the file currently being executed, if any, surfaced in
    /// the error envelope's `file` field. `None` for REPL input.
    pub(crate) current_file: Option<String>,
    /// Call frames pushed on function entry and popped only when the call
    /// returns successfully, so an in-flight error leaves the full chain
    /// in place for `run_source_in` to read off into the error envelope.
    pub(crate) call_stack: RefCell<Vec<StackFrame>>,
}

impl Interpreter {
    pub fn new(config: InterpreterConfig) -> Self {
        let globals = Environment::new();
        builtins::register_all(&globals);
        let type_checker =
            TypeChecker::new(config.type_check_mode, config.type_check_exclude.clone());
        Interpreter {
            globals,
            modules: ModuleLoader::new(
                config.module_search_paths.clone(),
                config.policy_deny_patterns.clone(),
            ),
            type_checker,
            cancel_flag: Rc::new(Cell::new(false)),
            natives: HashMap::new(),
            tail_call_target: None,
            in_function_depth: 0,
            current_class: None,
            native_modules: HashMap::new(),
            current_file: None,
            call_stack: RefCell::new(Vec::new()),
            config,
        }
    }

    /// Registers a host-provided module under `name`, taking precedence
    /// over any on-disk `.smod`/source file of the same name (spec §4.5's
    /// "native implementation registered in the host" resolution step).
    pub fn register_native_module(&mut self, name: &str, env: Rc<Environment>) {
        self.native_modules.insert(
            name.to_string(),
            Rc::new(Module {
                name: name.to_string(),
                env,
                exports: None,
                in_progress: Cell::new(false),
            }),
        );
    }

    /// Registers a host-provided native function under `name`, callable from
    /// Sona source the same way a builtin is (spec §6 host embedding API).
    pub fn register_native(&mut self, name: &str, arity: Option<usize>, callback: NativeFn) {
        let native = Value::Native(Rc::new(Native {
            name: name.to_string(),
            arity,
            func: callback,
        }));
        self.globals.define(name.to_string(), native.clone());
        self.natives.insert(name.to_string(), native);
    }

    /// Installs the flag the host toggles to request cooperative
    /// cancellation; the evaluator checks it at loop iterations and call
    /// boundaries and raises a distinguished `Interrupted` throw.
    pub fn set_cancel_flag(&mut self, flag: Rc<Cell<bool>>) {
        self.cancel_flag = flag;
    }

    /// Parses and evaluates a full program as a fresh top-level script,
    /// returning the last statement's value or the host-visible error
    /// envelope on failure (spec §6).
    pub fn run_source(&mut self, source: &str) -> Result<Value, ErrorEnvelope> {
        let env = self.globals.clone();
        self.run_source_in(source, env)
    }

    /// Like `run_source`, but records `file` as the originating file name
    /// so it's reported in the error envelope.
    pub fn run_file(&mut self, file: &str, source: &str) -> Result<Value, ErrorEnvelope> {
        self.current_file = Some(file.to_string());
        let env = self.globals.clone();
        self.run_source_in(source, env)
    }

    /// Evaluates one REPL line against the interpreter's persistent global
    /// scope, so `let`/`function`/`class` bindings accumulate across calls.
    pub fn eval_repl(&mut self, source: &str) -> Result<Value, ErrorEnvelope> {
        let globals = self.globals.clone();
        self.run_source_in(source, globals)
    }

    fn run_source_in(&mut self, source: &str, env: Rc<Environment>) -> Result<Value, ErrorEnvelope> {
        let file = self.current_file.clone().unwrap_or_default();
        let stmts = match parse_program(source) {
            Ok(stmts) => stmts,
            Err(e) => return Err(ErrorEnvelope::with_stack(&e, file, Vec::new())),
        };
        let diagnostics = self.type_checker.check_program(&stmts, &file);
        if self.type_checker.mode == crate::typecheck::Mode::Enforce {
            if let Some(diag) = diagnostics.first() {
                let err = SonaError::TypeError {
                    message: diag.message.clone(),
                    span: diag.span,
                };
                return Err(ErrorEnvelope::with_stack(&err, file, Vec::new()));
            }
        }
        self.call_stack.borrow_mut().clear();
        self.eval_program(&stmts, env).map_err(|e| {
            let stack = self.call_stack.borrow().clone();
            self.call_stack.borrow_mut().clear();
            ErrorEnvelope::with_stack(&e, file, stack)
        })
    }

    pub(crate) fn check_cancelled(&self, span: Span) -> Result<(), SonaError> {
        if self.cancel_flag.get() {
            Err(SonaError::Interrupted { span })
        } else {
            Ok(())
        }
    }

    /// Resolves, parses, and evaluates an imported module's top-level body
    /// in a fresh child scope of `globals`, caching the finished result.
    ///
    /// A reentrant import of a module that is still loading (an import
    /// cycle) does not fail outright: spec §4.5 requires it to return the
    /// partially populated module proxy instead, so that a cycle like
    /// `a.sona: import b; let v = 1` / `b.sona: import a; let w = 2`
    /// succeeds as long as neither module reads the other's top-level name
    /// during its own load. Reading a name that hasn't landed yet on such a
    /// proxy is an `ImportError` raised from `eval_get`, not here.
    pub(crate) fn load_module(&mut self, name: &str, span: Span) -> Result<Rc<Module>, SonaError> {
        if let Some(cached) = self.modules.get_cached(name) {
            return Ok(cached);
        }
        if let Some(native) = self.native_modules.get(name) {
            return Ok(native.clone());
        }
        if let Some(partial) = self.modules.get_in_progress(name) {
            return Ok(partial);
        }
        self.load_module_inner(name, span)
    }

    fn load_module_inner(&mut self, name: &str, span: Span) -> Result<Rc<Module>, SonaError> {
        let path = self.modules.resolve(name, span)?;
        let source = std::fs::read_to_string(&path).map_err(|e| SonaError::IoError {
            message: format!("failed to read module '{}': {}", name, e),
            span,
        })?;
        let stmts = parse_program(&source)?;
        let module_env = Environment::new_child(&self.globals);
        let module = Rc::new(Module {
            name: name.to_string(),
            env: module_env.clone(),
            exports: None,
            in_progress: Cell::new(true),
        });
        self.modules.begin_loading(name, module.clone());
        let result = self.eval_program(&stmts, module_env);
        self.modules.finish_loading(name);
        module.in_progress.set(false);
        result?;
        self.modules.insert_cache(name, module.clone());
        Ok(module)
    }
}
