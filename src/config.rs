//! Interpreter configuration (spec §6/ambient stack): module search paths,
//! type-check mode, policy deny patterns. Loadable from a TOML file or
//! overridden by environment variables, replacing the teacher's
//! hand-assembled `FsConfig`/`NetConfig`/`IoConfig` pair with a single
//! `serde`-deserializable struct per SPEC_FULL's Configuration section.

use crate::typecheck::Mode;
use serde::Deserialize;
use std::path::PathBuf;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const WELCOME_MESSAGE: &str = "Sona REPL";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct InterpreterConfig {
    /// Directories searched, in order, for `import`ed modules.
    pub module_search_paths: Vec<PathBuf>,
    /// `off` leaves the type checker unused, `warn` surfaces diagnostics
    /// without failing the run, `enforce` turns the first diagnostic into a
    /// hard error before evaluation starts (spec's type-checker Non-goal:
    /// optional, never required for execution).
    pub type_check_mode: Mode,
    /// Glob-style path fragments excluded from type checking even in
    /// `enforce` mode.
    pub type_check_exclude: Vec<String>,
    /// Regex deny-patterns matched against a module's resolved path; a match
    /// rejects the import with an `ImportError` (spec's sandboxing Non-goal:
    /// a simple deny-list, not a full capability sandbox).
    pub policy_deny_patterns: Vec<String>,
    pub debug: bool,
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        InterpreterConfig {
            module_search_paths: vec![PathBuf::from("stdlib"), PathBuf::from(".sona_modules")],
            type_check_mode: Mode::Off,
            type_check_exclude: Vec::new(),
            policy_deny_patterns: Vec::new(),
            debug: false,
        }
    }
}

impl InterpreterConfig {
    /// Parses a config from TOML text (spec's ambient configuration layer).
    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Loads `sona.toml` from the given directory if present, falling back
    /// to defaults, then applies `SONA_*` environment variable overrides.
    pub fn load(dir: &std::path::Path) -> Self {
        let path = dir.join("sona.toml");
        let mut config = std::fs::read_to_string(&path)
            .ok()
            .and_then(|text| Self::from_toml(&text).ok())
            .unwrap_or_default();
        config.apply_env_overrides();
        config
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(mode) = std::env::var("SONA_TYPE_CHECK_MODE") {
            if let Some(parsed) = Mode::from_str(&mode) {
                self.type_check_mode = parsed;
            }
        }
        if let Ok(debug) = std::env::var("SONA_DEBUG") {
            self.debug = debug == "1" || debug.eq_ignore_ascii_case("true");
        }
    }
}
