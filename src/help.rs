//! Help and documentation registry: each builtin registers a `HelpEntry`
//! (signature, description, examples, related, category) via the
//! `sona-macros::builtin` attribute at startup, backing the `help(name)` and
//! `doc(name)` introspection builtins. Kept from the teacher's
//! `HelpRegistry`/`HelpEntry` design, with the Lisp-specific
//! `populate_builtin_help` hand-written table dropped in favor of the
//! macro-driven registration.

use std::cell::RefCell;
use std::collections::HashMap;

/// A help entry for a function.
#[derive(Debug, Clone)]
pub struct HelpEntry {
    pub name: String,
    pub signature: String,
    pub description: String,
    pub examples: Vec<String>,
    pub related: Vec<String>,
    pub category: String,
}

/// Registry for all function documentation.
pub struct HelpRegistry {
    entries: HashMap<String, HelpEntry>,
}

impl HelpRegistry {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    pub fn register(&mut self, entry: HelpEntry) {
        self.entries.insert(entry.name.clone(), entry);
    }

    pub fn get(&self, name: &str) -> Option<HelpEntry> {
        self.entries.get(name).cloned()
    }

    pub fn by_category(&self) -> HashMap<String, Vec<HelpEntry>> {
        let mut by_cat: HashMap<String, Vec<HelpEntry>> = HashMap::new();
        for entry in self.entries.values() {
            by_cat
                .entry(entry.category.clone())
                .or_default()
                .push(entry.clone());
        }
        for entries in by_cat.values_mut() {
            entries.sort_by(|a, b| a.name.cmp(&b.name));
        }
        by_cat
    }

    pub fn all_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.entries.keys().cloned().collect();
        names.sort();
        names
    }
}

impl Default for HelpRegistry {
    fn default() -> Self {
        Self::new()
    }
}

thread_local! {
    static HELP_REGISTRY: RefCell<HelpRegistry> = RefCell::new(HelpRegistry::new());
}

/// Register a help entry in the global registry.
pub fn register_help(entry: HelpEntry) {
    HELP_REGISTRY.with(|reg| {
        reg.borrow_mut().register(entry);
    });
}

pub fn get_help(name: &str) -> Option<HelpEntry> {
    HELP_REGISTRY.with(|reg| reg.borrow().get(name))
}

pub fn all_by_category() -> HashMap<String, Vec<HelpEntry>> {
    HELP_REGISTRY.with(|reg| reg.borrow().by_category())
}

pub fn all_names() -> Vec<String> {
    HELP_REGISTRY.with(|reg| reg.borrow().all_names())
}

/// Formats a single help entry for display in the REPL.
pub fn format_help_entry(entry: &HelpEntry) -> String {
    let mut output = String::new();
    output.push_str(&format!("{} - {}\n", entry.name, entry.category));
    output.push_str("------------------------------------------------\n");
    output.push_str("Signature:\n");
    for line in entry.signature.lines() {
        output.push_str(&format!("  {}\n", line));
    }
    output.push('\n');
    output.push_str("Description:\n");
    for line in entry.description.lines() {
        output.push_str(&format!("  {}\n", line));
    }
    if !entry.examples.is_empty() {
        output.push('\n');
        output.push_str("Examples:\n");
        for example in &entry.examples {
            output.push_str("  ");
            output.push_str(example);
            output.push('\n');
        }
    }
    if !entry.related.is_empty() {
        output.push('\n');
        output.push_str("Related:\n");
        output.push_str(&format!("  {}\n", entry.related.join(", ")));
    }
    output.push_str("------------------------------------------------");
    output
}

/// Formats a quick-reference listing of every registered builtin, grouped by
/// category.
pub fn format_quick_reference() -> String {
    let mut output = String::new();
    let by_cat = all_by_category();
    let total: usize = by_cat.values().map(|v| v.len()).sum();
    output.push_str(&format!("Available builtins ({} total)\n", total));
    output.push_str("------------------------------------------------\n\n");

    let mut categories: Vec<&String> = by_cat.keys().collect();
    categories.sort();
    for category in categories {
        let entries = &by_cat[category];
        let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
        output.push_str(&format!("{} ({})\n", category, names.len()));
        output.push_str(&format!("  {}\n\n", names.join(", ")));
    }
    output.push_str("Type help(\"name\") for detailed help on a builtin.\n");
    output.push_str("------------------------------------------------");
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_and_get() {
        let mut registry = HelpRegistry::new();
        registry.register(HelpEntry {
            name: "test_fn".to_string(),
            signature: "test_fn(x)".to_string(),
            description: "Test function".to_string(),
            examples: vec![],
            related: vec![],
            category: "Test".to_string(),
        });
        assert_eq!(registry.get("test_fn").unwrap().name, "test_fn");
    }

    #[test]
    fn by_category_groups_and_sorts() {
        let mut registry = HelpRegistry::new();
        registry.register(HelpEntry {
            name: "b".to_string(),
            signature: "".to_string(),
            description: "".to_string(),
            examples: vec![],
            related: vec![],
            category: "Math".to_string(),
        });
        registry.register(HelpEntry {
            name: "a".to_string(),
            signature: "".to_string(),
            description: "".to_string(),
            examples: vec![],
            related: vec![],
            category: "Math".to_string(),
        });
        let by_cat = registry.by_category();
        let names: Vec<_> = by_cat["Math"].iter().map(|e| e.name.clone()).collect();
        assert_eq!(names, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn format_help_entry_includes_sections() {
        let entry = HelpEntry {
            name: "test".to_string(),
            signature: "test(x)".to_string(),
            description: "A test function".to_string(),
            examples: vec!["test(1)".to_string()],
            related: vec!["other".to_string()],
            category: "Test".to_string(),
        };
        let formatted = format_help_entry(&entry);
        assert!(formatted.contains("test - Test"));
        assert!(formatted.contains("A test function"));
        assert!(formatted.contains("test(1)"));
    }
}
