//! The optional static type checker (spec §4.6): a best-effort pass over
//! the AST that catches obvious literal-vs-literal type mismatches and
//! arity mismatches against locally declared functions. It never blocks
//! evaluation except in `Enforce` mode, and never attempts full inference —
//! that's explicitly out of scope (spec's Non-goals).

use crate::ast::{BinOp, Expr, ExprKind, Stmt, StmtKind};
use crate::span::Span;
use serde::Deserialize;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Off,
    Warn,
    Enforce,
}

impl Mode {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "off" => Some(Mode::Off),
            "warn" => Some(Mode::Warn),
            "enforce" => Some(Mode::Enforce),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub message: String,
    pub span: Span,
}

pub struct TypeChecker {
    pub mode: Mode,
    pub exclude: Vec<String>,
}

impl TypeChecker {
    pub fn new(mode: Mode, exclude: Vec<String>) -> Self {
        TypeChecker { mode, exclude }
    }

    /// True if `path` matches one of the configured exclude fragments — a
    /// trailing `*` is treated as a prefix wildcard, otherwise it's a plain
    /// substring match (no full glob crate, per SPEC_FULL's ambient-stack
    /// note to keep this hand-rolled and small).
    pub fn is_excluded(&self, path: &str) -> bool {
        self.exclude.iter().any(|pattern| {
            if let Some(prefix) = pattern.strip_suffix('*') {
                path.starts_with(prefix)
            } else {
                path.contains(pattern.as_str())
            }
        })
    }

    /// Walks `stmts` for diagnostics unless `mode` is `Off` or `file` matches
    /// one of the configured exclude patterns (spec §6's "exclude globs" —
    /// excluded files are skipped even in `Enforce` mode). `file` is the
    /// empty string for REPL input, which no exclude pattern matches.
    pub fn check_program(&self, stmts: &[Stmt], file: &str) -> Vec<Diagnostic> {
        if self.mode == Mode::Off || self.is_excluded(file) {
            return Vec::new();
        }
        let mut arities: HashMap<String, (usize, usize)> = HashMap::new();
        collect_arities(stmts, &mut arities);
        let mut diags = Vec::new();
        for stmt in stmts {
            check_stmt(stmt, &arities, &mut diags);
        }
        diags
    }
}

/// Maps a function name to its (required, total) parameter count, so a call
/// is only flagged when it falls outside the range a default-bearing
/// signature actually accepts.
fn collect_arities(stmts: &[Stmt], out: &mut HashMap<String, (usize, usize)>) {
    for stmt in stmts {
        if let StmtKind::FunctionDef { name, params, .. } = &stmt.kind {
            let required = params.iter().filter(|p| p.default.is_none()).count();
            out.insert(name.clone(), (required, params.len()));
        }
    }
}

fn check_stmt(stmt: &Stmt, arities: &HashMap<String, (usize, usize)>, diags: &mut Vec<Diagnostic>) {
    match &stmt.kind {
        StmtKind::Expr(e) | StmtKind::Throw(e) => check_expr(e, arities, diags),
        StmtKind::Let(_, e) | StmtKind::Assign(_, e) => check_expr(e, arities, diags),
        StmtKind::If {
            branches,
            else_branch,
        } => {
            for (cond, body) in branches {
                check_expr(cond, arities, diags);
                check_block(body, arities, diags);
            }
            if let Some(body) = else_branch {
                check_block(body, arities, diags);
            }
        }
        StmtKind::While { cond, body } => {
            check_expr(cond, arities, diags);
            check_block(body, arities, diags);
        }
        StmtKind::For { iter, body, .. } => {
            check_expr(iter, arities, diags);
            check_block(body, arities, diags);
        }
        StmtKind::Repeat { count, body } => {
            check_expr(count, arities, diags);
            check_block(body, arities, diags);
        }
        StmtKind::Return(Some(e)) => check_expr(e, arities, diags),
        StmtKind::FunctionDef { body, .. } => check_block(body, arities, diags),
        StmtKind::ClassDef { methods, .. } => {
            for method in methods {
                check_block(&method.body, arities, diags);
            }
        }
        StmtKind::TryCatchFinally {
            try_block,
            catch,
            finally,
        } => {
            check_block(try_block, arities, diags);
            if let Some((_, body)) = catch {
                check_block(body, arities, diags);
            }
            if let Some(body) = finally {
                check_block(body, arities, diags);
            }
        }
        StmtKind::Delete(_) => {}
        StmtKind::Break | StmtKind::Continue | StmtKind::Return(None) | StmtKind::Import(_) => {}
    }
}

fn check_block(stmts: &[Stmt], arities: &HashMap<String, (usize, usize)>, diags: &mut Vec<Diagnostic>) {
    for stmt in stmts {
        check_stmt(stmt, arities, diags);
    }
}

fn literal_type_name(expr: &Expr) -> Option<&'static str> {
    match &expr.kind {
        ExprKind::Int(_) => Some("int"),
        ExprKind::Float(_) => Some("float"),
        ExprKind::Str(_) => Some("string"),
        ExprKind::Bool(_) => Some("bool"),
        ExprKind::Null => Some("null"),
        _ => None,
    }
}

fn check_expr(expr: &Expr, arities: &HashMap<String, (usize, usize)>, diags: &mut Vec<Diagnostic>) {
    match &expr.kind {
        ExprKind::Binary(op, left, right) => {
            check_expr(left, arities, diags);
            check_expr(right, arities, diags);
            if matches!(
                op,
                BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::FloorDiv | BinOp::Mod
            ) {
                if let (Some(l), Some(r)) = (literal_type_name(left), literal_type_name(right)) {
                    let numeric = |t: &str| t == "int" || t == "float";
                    let compatible = (l == r && l == "string" && *op == BinOp::Add)
                        || (numeric(l) && numeric(r));
                    if !compatible {
                        diags.push(Diagnostic {
                            message: format!(
                                "incompatible operand types for {:?}: {} and {}",
                                op, l, r
                            ),
                            span: expr.span,
                        });
                    }
                }
            }
        }
        ExprKind::Call { callee, args } => {
            if let ExprKind::Ident(name) = &callee.kind {
                if let Some(&(required, total)) = arities.get(name) {
                    if args.len() < required || args.len() > total {
                        diags.push(Diagnostic {
                            message: format!(
                                "{} expects {} argument(s), called with {}",
                                name,
                                if required == total {
                                    required.to_string()
                                } else {
                                    format!("{}..{}", required, total)
                                },
                                args.len()
                            ),
                            span: expr.span,
                        });
                    }
                }
            }
            check_expr(callee, arities, diags);
            for a in args {
                check_expr(a, arities, diags);
            }
        }
        ExprKind::Unary(_, inner) => check_expr(inner, arities, diags),
        ExprKind::Logical(_, l, r) | ExprKind::Index(l, r) => {
            check_expr(l, arities, diags);
            check_expr(r, arities, diags);
        }
        ExprKind::Compare { operands, .. } => {
            for o in operands {
                check_expr(o, arities, diags);
            }
        }
        ExprKind::Ternary(c, t, e) => {
            check_expr(c, arities, diags);
            check_expr(t, arities, diags);
            check_expr(e, arities, diags);
        }
        ExprKind::ListLit(items) => {
            for item in items {
                check_expr(item, arities, diags);
            }
        }
        ExprKind::DictLit(pairs) => {
            for (k, v) in pairs {
                check_expr(k, arities, diags);
                check_expr(v, arities, diags);
            }
        }
        ExprKind::Slice { target, start, end } => {
            check_expr(target, arities, diags);
            if let Some(s) = start {
                check_expr(s, arities, diags);
            }
            if let Some(e) = end {
                check_expr(e, arities, diags);
            }
        }
        ExprKind::Get(target, _) => check_expr(target, arities, diags),
        ExprKind::FString(parts) => {
            for part in parts {
                if let crate::ast::FStringPart::Interp { expr, .. } = part {
                    check_expr(expr, arities, diags);
                }
            }
        }
        ExprKind::Lambda { body, .. } => check_block(body, arities, diags),
        ExprKind::Comprehension {
            expr, iter, cond, ..
        } => {
            check_expr(expr, arities, diags);
            check_expr(iter, arities, diags);
            if let Some(cond) = cond {
                check_expr(cond, arities, diags);
            }
        }
        ExprKind::Match { subject, arms } => {
            check_expr(subject, arities, diags);
            for (patterns, arm) in arms {
                for pattern in patterns {
                    if let crate::ast::MatchPattern::Literal(lit) = pattern {
                        check_expr(lit, arities, diags);
                    }
                }
                check_expr(arm, arities, diags);
            }
        }
        ExprKind::Spread(inner) => check_expr(inner, arities, diags),
        ExprKind::Null
        | ExprKind::Bool(_)
        | ExprKind::Int(_)
        | ExprKind::Float(_)
        | ExprKind::Str(_)
        | ExprKind::Ident(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_program;

    #[test]
    fn off_mode_produces_no_diagnostics() {
        let stmts = parse_program("\"a\" + 1;").unwrap();
        let checker = TypeChecker::new(Mode::Off, vec![]);
        assert!(checker.check_program(&stmts, "").is_empty());
    }

    #[test]
    fn flags_string_plus_int_literal_mismatch() {
        let stmts = parse_program("\"a\" + 1;").unwrap();
        let checker = TypeChecker::new(Mode::Warn, vec![]);
        assert_eq!(checker.check_program(&stmts, "").len(), 1);
    }

    #[test]
    fn flags_arity_mismatch_against_local_function() {
        let stmts = parse_program("function add(a, b) { return a + b; } add(1);").unwrap();
        let checker = TypeChecker::new(Mode::Warn, vec![]);
        assert_eq!(checker.check_program(&stmts, "").len(), 1);
    }

    #[test]
    fn exclude_prefix_matches() {
        let checker = TypeChecker::new(Mode::Warn, vec!["vendor/*".to_string()]);
        assert!(checker.is_excluded("vendor/lib.sona"));
        assert!(!checker.is_excluded("src/lib.sona"));
    }

    #[test]
    fn excluded_file_produces_no_diagnostics_even_in_warn_mode() {
        let stmts = parse_program("\"a\" + 1;").unwrap();
        let checker = TypeChecker::new(Mode::Warn, vec!["vendor/*".to_string()]);
        assert!(checker.check_program(&stmts, "vendor/lib.sona").is_empty());
    }

    #[test]
    fn excluded_file_is_skipped_even_in_enforce_mode() {
        let stmts = parse_program("\"a\" + 1;").unwrap();
        let checker = TypeChecker::new(Mode::Enforce, vec!["vendor/*".to_string()]);
        assert!(checker.check_program(&stmts, "vendor/lib.sona").is_empty());
    }
}
