//! Lightweight static checks on recipe source code.
//!
//! Python gets a structural pass (brackets, string literals, comments) that
//! reports the first problem the way the interpreter would phrase it. SQL
//! and R get bracket and quote counts. Nothing here executes code.

use regex::RegexBuilder;
use serde::Serialize;
use serde_json::{json, Value};

/// One finding of a check.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Issue {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl Issue {
    fn new(kind: &'static str, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            line: None,
            column: None,
            text: None,
        }
    }

    fn at(mut self, code: &str, line: usize, column: usize) -> Self {
        self.line = Some(line);
        self.column = Some(column);
        self.text = Some(
            code.lines()
                .nth(line.saturating_sub(1))
                .unwrap_or_default()
                .trim()
                .to_string(),
        );
        self
    }
}

/// Result of checking one piece of code.
#[derive(Debug, Clone, Default)]
pub struct Report {
    pub errors: Vec<Issue>,
    pub warnings: Vec<Issue>,
    /// Per-language verdicts such as `python_ast_valid`.
    pub checks: Vec<(&'static str, bool)>,
}

impl Report {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Write the per-language verdicts into `target`.
    pub fn record_checks(&self, target: &mut Value) {
        for (name, ok) in &self.checks {
            target[*name] = json!(ok);
        }
    }
}

pub fn is_python(recipe_type: &str) -> bool {
    matches!(recipe_type, "python" | "pyspark")
}

/// Run the checks that apply to `recipe_type`.
pub fn check(recipe_type: &str, code: &str) -> Report {
    let mut report = Report::default();
    match recipe_type {
        t if is_python(t) => {
            let parsed = check_python(code);
            report.checks.push(("python_ast_valid", parsed.is_ok()));
            if let Err(issue) = parsed {
                report.errors.push(issue);
            }
            report.warnings = python_warnings(code);
        }
        "sql" => {
            report.errors = check_sql(code);
            report.checks.push(("sql_basic_valid", report.errors.is_empty()));
        }
        "r" => {
            report.errors = check_r(code);
            report.checks.push(("r_basic_valid", report.errors.is_empty()));
        }
        _ => {
            // Visual recipes carry JSON; anything else is not an error.
            let valid = serde_json::from_str::<Value>(code).is_ok();
            report.checks.push(("json_valid", valid));
        }
    }
    report
}

pub fn reads_input(code: &str) -> bool {
    code.contains("get_dataframe") || code.contains("iter_rows")
}

pub fn writes_output(code: &str) -> bool {
    code.contains("write_with_schema") || code.contains("write_dataframe")
}

fn python_warnings(code: &str) -> Vec<Issue> {
    let mut warnings = Vec::new();
    if !code.to_lowercase().contains("dataiku") {
        warnings.push(Issue::new(
            "missing_dataiku_import",
            "Code doesn't seem to import dataiku package",
        ));
    }
    if !reads_input(code) {
        warnings.push(Issue::new(
            "no_input_handling",
            "Code doesn't seem to handle input datasets",
        ));
    }
    if !writes_output(code) {
        warnings.push(Issue::new(
            "no_output_handling",
            "Code doesn't seem to write to output datasets",
        ));
    }
    warnings
}

/// Whether the code has `import <module>` or `from <module> import ...`.
pub fn imports_module(code: &str, module: &str) -> bool {
    code.lines().map(str::trim).any(|line| {
        if let Some(rest) = line.strip_prefix("import ") {
            rest.split(',')
                .filter_map(|part| part.split_whitespace().next())
                .any(|name| name == module)
        } else if let Some(rest) = line.strip_prefix("from ") {
            rest.split_whitespace().next() == Some(module)
        } else {
            false
        }
    })
}

fn closer_for(open: char) -> char {
    match open {
        '(' => ')',
        '[' => ']',
        _ => '}',
    }
}

/// Structural Python check: brackets, string literals and comments.
///
/// Returns the first problem found, positioned at 1-based line/column.
pub fn check_python(code: &str) -> Result<(), Issue> {
    let chars: Vec<char> = code.chars().collect();
    let mut stack: Vec<(char, usize, usize)> = Vec::new();
    let (mut line, mut col) = (1usize, 1usize);
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '#' => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                    col += 1;
                }
                continue;
            }
            '\'' | '"' => {
                let triple = chars.get(i + 1) == Some(&c) && chars.get(i + 2) == Some(&c);
                let (start_line, start_col) = (line, col);
                let width = if triple { 3 } else { 1 };
                i += width;
                col += width;
                let mut closed = false;
                while i < chars.len() {
                    let s = chars[i];
                    if s == '\\' {
                        if chars.get(i + 1) == Some(&'\n') {
                            line += 1;
                            col = 1;
                        } else {
                            col += 2;
                        }
                        i += 2;
                        continue;
                    }
                    if s == '\n' {
                        if !triple {
                            return Err(Issue::new(
                                "syntax_error",
                                format!("unterminated string literal (detected at line {start_line})"),
                            )
                            .at(code, start_line, start_col));
                        }
                        line += 1;
                        col = 1;
                        i += 1;
                        continue;
                    }
                    if s == c
                        && (!triple
                            || (chars.get(i + 1) == Some(&c) && chars.get(i + 2) == Some(&c)))
                    {
                        i += width;
                        col += width;
                        closed = true;
                        break;
                    }
                    i += 1;
                    col += 1;
                }
                if !closed {
                    let message = if triple {
                        format!("unterminated triple-quoted string literal (detected at line {line})")
                    } else {
                        format!("unterminated string literal (detected at line {start_line})")
                    };
                    return Err(Issue::new("syntax_error", message).at(code, start_line, start_col));
                }
                continue;
            }
            '(' | '[' | '{' => stack.push((c, line, col)),
            ')' | ']' | '}' => match stack.pop() {
                None => {
                    return Err(Issue::new("syntax_error", format!("unmatched '{c}'"))
                        .at(code, line, col))
                }
                Some((open, _, _)) if closer_for(open) != c => {
                    return Err(Issue::new(
                        "syntax_error",
                        format!("closing parenthesis '{c}' does not match opening parenthesis '{open}'"),
                    )
                    .at(code, line, col))
                }
                Some(_) => {}
            },
            '\n' => {
                line += 1;
                col = 0;
            }
            _ => {}
        }
        i += 1;
        col += 1;
    }

    match stack.first() {
        Some(&(open, l, c)) => {
            Err(Issue::new("syntax_error", format!("'{open}' was never closed")).at(code, l, c))
        }
        None => Ok(()),
    }
}

fn unbalanced(code: &str, open: char, close: char) -> bool {
    code.matches(open).count() != code.matches(close).count()
}

pub fn check_sql(code: &str) -> Vec<Issue> {
    let mut errors = Vec::new();
    let has_select = RegexBuilder::new(r"\bSELECT\b")
        .case_insensitive(true)
        .build()
        .map(|re| re.is_match(code))
        .unwrap_or(true);
    if !has_select {
        errors.push(Issue::new(
            "missing_select",
            "SQL code should contain a SELECT statement",
        ));
    }
    if unbalanced(code, '(', ')') {
        errors.push(Issue::new(
            "unbalanced_parentheses",
            "Unbalanced parentheses in SQL code",
        ));
    }
    let single = code.matches('\'').count() - code.matches("\\'").count();
    if single % 2 != 0 {
        errors.push(Issue::new(
            "unterminated_string",
            "Unterminated single-quoted string",
        ));
    }
    let double = code.matches('"').count() - code.matches("\\\"").count();
    if double % 2 != 0 {
        errors.push(Issue::new(
            "unterminated_string",
            "Unterminated double-quoted string",
        ));
    }
    errors
}

pub fn check_r(code: &str) -> Vec<Issue> {
    let mut errors = Vec::new();
    if unbalanced(code, '(', ')') {
        errors.push(Issue::new(
            "unbalanced_parentheses",
            "Unbalanced parentheses in R code",
        ));
    }
    if unbalanced(code, '[', ']') {
        errors.push(Issue::new("unbalanced_brackets", "Unbalanced brackets in R code"));
    }
    if unbalanced(code, '{', '}') {
        errors.push(Issue::new("unbalanced_braces", "Unbalanced braces in R code"));
    }
    errors
}

#[cfg(test)]
mod tests {
    use super::*;

    const RECIPE: &str = "import dataiku\n\
        df = dataiku.Dataset(\"in\").get_dataframe()\n\
        # a comment with an unbalanced ( paren\n\
        out = dataiku.Dataset('out')\n\
        out.write_with_schema(df[[\"a\", \"b\"]])\n";

    #[test]
    fn well_formed_python_passes() {
        assert!(check_python(RECIPE).is_ok());
        let report = check("python", RECIPE);
        assert!(report.is_valid());
        assert!(report.warnings.is_empty());
        assert_eq!(report.checks, vec![("python_ast_valid", true)]);
    }

    #[test]
    fn brackets_inside_strings_are_ignored() {
        assert!(check_python("s = '(['\nt = \"\"\"\n)]}\n\"\"\"\n").is_ok());
        assert!(check_python("path = 'C:\\\\tmp\\\\'\n").is_ok());
    }

    #[test]
    fn unclosed_bracket_points_at_opener() {
        let issue = check_python("x = 1\ny = foo(1,\n    2\n").unwrap_err();
        assert_eq!(issue.message, "'(' was never closed");
        assert_eq!(issue.line, Some(2));
        assert_eq!(issue.column, Some(8));
        assert_eq!(issue.text.as_deref(), Some("y = foo(1,"));
    }

    #[test]
    fn mismatched_and_unmatched_closers() {
        let issue = check_python("a = [1, 2)\n").unwrap_err();
        assert_eq!(
            issue.message,
            "closing parenthesis ')' does not match opening parenthesis '['"
        );
        let issue = check_python("a = 1)\n").unwrap_err();
        assert_eq!(issue.message, "unmatched ')'");
        assert_eq!(issue.column, Some(6));
    }

    #[test]
    fn unterminated_strings_are_reported() {
        let issue = check_python("a = 'abc\nb = 2\n").unwrap_err();
        assert_eq!(issue.message, "unterminated string literal (detected at line 1)");
        let issue = check_python("doc = \"\"\"never\nclosed\n").unwrap_err();
        assert!(issue.message.starts_with("unterminated triple-quoted string literal"));
        assert_eq!(issue.line, Some(1));
    }

    #[test]
    fn python_warnings_cover_missing_io() {
        let report = check("pyspark", "x = 1\n");
        let kinds: Vec<&str> = report.warnings.iter().map(|w| w.kind).collect();
        assert_eq!(
            kinds,
            vec!["missing_dataiku_import", "no_input_handling", "no_output_handling"]
        );
        assert!(report.is_valid());
    }

    #[test]
    fn sql_checks() {
        assert!(check_sql("select a from t where b = 'x'").is_empty());
        let kinds: Vec<&str> = check_sql("UPDATE t SET a = ('x")
            .iter()
            .map(|e| e.kind)
            .collect();
        assert_eq!(
            kinds,
            vec!["missing_select", "unbalanced_parentheses", "unterminated_string"]
        );
        assert!(check_sql("SELECT 'it\\'s'").is_empty());
    }

    #[test]
    fn r_checks_and_json_fallback() {
        let report = check("r", "f <- function(x) { x[1] ");
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].kind, "unbalanced_braces");
        assert_eq!(report.checks, vec![("r_basic_valid", false)]);

        let report = check("join", "{\"joins\": []}");
        assert!(report.is_valid());
        assert_eq!(report.checks, vec![("json_valid", true)]);
    }

    #[test]
    fn import_detection() {
        assert!(imports_module("import os, dataiku as dk\n", "dataiku"));
        assert!(imports_module("from dataiku import pandasutils\n", "dataiku"));
        assert!(!imports_module("from dataiku.core import x\nimport dataikuapi\n", "dataiku"));
    }
}
