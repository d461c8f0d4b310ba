//! REPL syntax highlighting (ambient stack): implements rustyline's
//! `Highlighter`/`Hinter`/`Validator`/`Completer` traits for Sona source,
//! the way the teacher's `LispHelper` did for Lisp syntax, generalized to
//! Sona's keyword/operator/literal surface instead of s-expression syntax.

use rustyline::Helper;
use rustyline::completion::Completer;
use rustyline::highlight::{CmdKind, Highlighter};
use rustyline::hint::Hinter;
use rustyline::validate::{ValidationContext, ValidationResult, Validator};
use std::borrow::Cow;
use std::collections::HashSet;

const COLOR_RESET: &str = "\x1b[0m";
const COLOR_KEYWORD: &str = "\x1b[1;35m"; // Bold magenta
const COLOR_BUILTIN: &str = "\x1b[36m"; // Cyan
const COLOR_NUMBER: &str = "\x1b[33m"; // Yellow
const COLOR_STRING: &str = "\x1b[32m"; // Green
const COLOR_BOOLEAN: &str = "\x1b[33m"; // Yellow
const COLOR_COMMENT: &str = "\x1b[90m"; // Bright black (gray)
const COLOR_BRACKET: &str = "\x1b[1;34m"; // Bold blue

/// rustyline helper providing Sona-aware color highlighting and bracket
/// balance validation for the REPL.
pub struct SonaHelper;

impl SonaHelper {
    pub fn new() -> Self {
        SonaHelper
    }
}

impl Default for SonaHelper {
    fn default() -> Self {
        Self::new()
    }
}

impl Helper for SonaHelper {}

impl Completer for SonaHelper {
    type Candidate = String;
}

impl Hinter for SonaHelper {
    type Hint = String;
}

impl Validator for SonaHelper {
    fn validate(&self, ctx: &mut ValidationContext) -> rustyline::Result<ValidationResult> {
        let input = ctx.input();
        let mut depth: i32 = 0;
        let mut in_string = false;
        let mut escaped = false;
        for c in input.chars() {
            if in_string {
                if escaped {
                    escaped = false;
                } else if c == '\\' {
                    escaped = true;
                } else if c == '"' {
                    in_string = false;
                }
                continue;
            }
            match c {
                '"' => in_string = true,
                '(' | '[' | '{' => depth += 1,
                ')' | ']' | '}' => depth -= 1,
                _ => {}
            }
        }
        if in_string || depth > 0 {
            Ok(ValidationResult::Incomplete)
        } else {
            Ok(ValidationResult::Valid(None))
        }
    }
}

impl Highlighter for SonaHelper {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        let keywords = keyword_set();
        let builtins = builtin_set();
        let highlighted = highlight_line(line, &keywords, &builtins);
        if highlighted == line {
            Cow::Borrowed(line)
        } else {
            Cow::Owned(highlighted)
        }
    }

    fn highlight_char(&self, _line: &str, _pos: usize, _kind: CmdKind) -> bool {
        true
    }
}

fn highlight_line(
    line: &str,
    keywords: &HashSet<&'static str>,
    builtins: &HashSet<&'static str>,
) -> String {
    let mut result = String::new();
    let chars: Vec<char> = line.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            '#' => {
                result.push_str(COLOR_COMMENT);
                while i < chars.len() && chars[i] != '\n' {
                    result.push(chars[i]);
                    i += 1;
                }
                result.push_str(COLOR_RESET);
            }

            '"' => {
                result.push_str(COLOR_STRING);
                result.push('"');
                i += 1;
                while i < chars.len() {
                    if chars[i] == '\\' && i + 1 < chars.len() {
                        result.push(chars[i]);
                        result.push(chars[i + 1]);
                        i += 2;
                    } else if chars[i] == '"' {
                        result.push('"');
                        i += 1;
                        break;
                    } else {
                        result.push(chars[i]);
                        i += 1;
                    }
                }
                result.push_str(COLOR_RESET);
            }

            '0'..='9' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let num_str: String = chars[start..i].iter().collect();
                result.push_str(COLOR_NUMBER);
                result.push_str(&num_str);
                result.push_str(COLOR_RESET);
            }

            '(' | ')' | '[' | ']' | '{' | '}' => {
                result.push_str(COLOR_BRACKET);
                result.push(chars[i]);
                i += 1;
                result.push_str(COLOR_RESET);
            }

            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                if word == "true" || word == "false" || word == "null" || word == "nil" {
                    result.push_str(COLOR_BOOLEAN);
                    result.push_str(&word);
                    result.push_str(COLOR_RESET);
                } else if keywords.contains(word.as_str()) {
                    result.push_str(COLOR_KEYWORD);
                    result.push_str(&word);
                    result.push_str(COLOR_RESET);
                } else if builtins.contains(word.as_str()) {
                    result.push_str(COLOR_BUILTIN);
                    result.push_str(&word);
                    result.push_str(COLOR_RESET);
                } else {
                    result.push_str(&word);
                }
            }

            _ => {
                result.push(chars[i]);
                i += 1;
            }
        }
    }

    result
}

fn keyword_set() -> HashSet<&'static str> {
    [
        "let", "if", "elif", "else", "while", "for", "in", "repeat", "break", "continue",
        "return", "func", "function", "fn", "class", "extends", "import", "from", "as", "try", "catch",
        "finally", "throw", "raise", "delete", "match", "lambda", "super", "and", "or", "not",
    ]
    .iter()
    .copied()
    .collect()
}

fn builtin_set() -> HashSet<&'static str> {
    [
        "print", "input", "read_file", "read_lines", "write_file", "append_file", "int", "float",
        "str", "bool", "type", "len", "help", "doc", "range", "enumerate", "abs", "min", "max",
        "round", "pow", "raise",
    ]
    .iter()
    .copied()
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn highlights_numbers() {
        let highlighted = highlight_line("42", &keyword_set(), &builtin_set());
        assert!(highlighted.contains(COLOR_NUMBER));
    }

    #[test]
    fn highlights_strings() {
        let highlighted = highlight_line("\"hello\"", &keyword_set(), &builtin_set());
        assert!(highlighted.contains(COLOR_STRING));
    }

    #[test]
    fn highlights_comments() {
        let highlighted = highlight_line("# a comment", &keyword_set(), &builtin_set());
        assert!(highlighted.contains(COLOR_COMMENT));
    }

    #[test]
    fn highlights_keywords() {
        let highlighted = highlight_line("let x = 5", &keyword_set(), &builtin_set());
        assert!(highlighted.contains(COLOR_KEYWORD));
    }

    #[test]
    fn highlights_builtins() {
        let highlighted = highlight_line("print(x)", &keyword_set(), &builtin_set());
        assert!(highlighted.contains(COLOR_BUILTIN));
        assert!(highlighted.contains(COLOR_BRACKET));
    }

    #[test]
    fn highlights_booleans() {
        let highlighted = highlight_line("true false null", &keyword_set(), &builtin_set());
        assert!(highlighted.contains(COLOR_BOOLEAN));
    }
}
