//! Module loader bookkeeping (spec §4.5): search-path resolution, a policy
//! deny-list, the load cache, and cycle detection. Orchestration that needs
//! a live `Interpreter` (parsing and evaluating a loaded file's body) lives
//! in `Interpreter::load_module`; this struct only owns the pure state, so
//! it can be constructed once per `Interpreter` instance instead of living
//! in a global, per SPEC_FULL's module-cache redesign flag.

use crate::error::SonaError;
use crate::span::Span;
use crate::value::Module;
use regex::Regex;
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::PathBuf;
use std::rc::Rc;

pub struct ModuleLoader {
    search_paths: Vec<PathBuf>,
    deny_patterns: Vec<Regex>,
    cache: RefCell<HashMap<String, Rc<Module>>>,
    /// Modules whose top-level body is currently being evaluated, keyed by
    /// name, holding the same partially-populated `Module` proxy that a
    /// reentrant (cyclic) import is handed back (spec §4.5).
    in_progress: RefCell<HashMap<String, Rc<Module>>>,
}

impl ModuleLoader {
    pub fn new(search_paths: Vec<PathBuf>, deny_patterns: Vec<String>) -> Self {
        let deny_patterns = deny_patterns
            .iter()
            .filter_map(|p| Regex::new(p).ok())
            .collect();
        ModuleLoader {
            search_paths,
            deny_patterns,
            cache: RefCell::new(HashMap::new()),
            in_progress: RefCell::new(HashMap::new()),
        }
    }

    pub fn get_cached(&self, name: &str) -> Option<Rc<Module>> {
        self.cache.borrow().get(name).cloned()
    }

    pub fn insert_cache(&self, name: &str, module: Rc<Module>) {
        self.cache.borrow_mut().insert(name.to_string(), module);
    }

    pub fn get_in_progress(&self, name: &str) -> Option<Rc<Module>> {
        self.in_progress.borrow().get(name).cloned()
    }

    /// Records `name` as currently loading, stashing `module` so a
    /// reentrant import while it's still loading gets the same proxy back.
    pub fn begin_loading(&self, name: &str, module: Rc<Module>) {
        self.in_progress.borrow_mut().insert(name.to_string(), module);
    }

    pub fn finish_loading(&self, name: &str) {
        self.in_progress.borrow_mut().remove(name);
    }

    /// Resolves `name` to a source file under the configured search paths,
    /// rejecting anything matched by a policy deny pattern first.
    ///
    /// Per directory, a `<name>.smod` interface file takes precedence over
    /// a plain `<name>.sona` source file (spec §4.5 resolution order,
    /// native-module and in-memory-cache precedence is handled a level up
    /// in `Interpreter::load_module`). When a `.smod` interface has a
    /// same-directory backing `<name>.sona` implementation, the backing
    /// file is what actually gets parsed and evaluated — the `.smod` file
    /// only gates whether the module is considered present there.
    pub fn resolve(&self, name: &str, span: Span) -> Result<PathBuf, SonaError> {
        // A dotted path (`import a.b`) addresses a nested source file: `a`
        // is a directory, `b` the module file within it.
        let relative = name.replace('.', std::path::MAIN_SEPARATOR_STR);
        let smod_name = format!("{}.smod", relative);
        let source_name = format!("{}.sona", relative);
        if self
            .deny_patterns
            .iter()
            .any(|re| re.is_match(name) || re.is_match(&source_name) || re.is_match(&smod_name))
        {
            return Err(SonaError::ImportError {
                message: format!("import of '{}' is denied by policy", name),
                span,
            });
        }
        for dir in &self.search_paths {
            let smod_candidate = dir.join(&smod_name);
            if smod_candidate.is_file() {
                let backing = dir.join(&source_name);
                if backing.is_file() {
                    return Ok(backing);
                }
                return Ok(smod_candidate);
            }
            let candidate = dir.join(&source_name);
            if candidate.is_file() {
                return Ok(candidate);
            }
        }
        Err(SonaError::ImportError {
            message: format!("module '{}' not found in search paths", name),
            span,
        })
    }
}
