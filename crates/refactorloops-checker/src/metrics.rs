//! Lightweight complexity metrics used to compare code before and after a refactor.
//!
//! Counting is lexical: comments are stripped and string contents masked, functions
//! are recognised by their definition headers, and decision points by keywords and
//! short-circuit operators.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

use crate::Language;

const COMPLEXITY_WEIGHT: f64 = 1.0;
const LOC_WEIGHT: f64 = 0.05;

const CONTROL_KEYWORDS: &[&str] = &[
    "if", "for", "while", "switch", "catch", "return", "else", "new", "sizeof", "do",
];

/// Complexity metrics for one piece of source code
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CodeMetrics {
    /// Average cyclomatic complexity per function (0 when no functions)
    pub complexity: f64,
    /// Lines of code excluding blanks and comments
    pub loc: usize,
    pub function_count: usize,
}

impl CodeMetrics {
    /// Weighted score: lower is better
    pub fn heuristic(&self) -> f64 {
        COMPLEXITY_WEIGHT * self.complexity + LOC_WEIGHT * self.loc as f64
    }
}

/// Metrics of the original and the refactored code
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricsComparison {
    pub before: CodeMetrics,
    pub after: CodeMetrics,
}

impl MetricsComparison {
    pub fn compare(original: &str, refactored: &str, language: Language) -> Self {
        Self {
            before: analyze(original, language),
            after: analyze(refactored, language),
        }
    }

    /// Heuristic improvement (positive = refactored code scores lower)
    pub fn improvement(&self) -> f64 {
        self.before.heuristic() - self.after.heuristic()
    }
}

/// Compute metrics for `code` written in `language`
pub fn analyze(code: &str, language: Language) -> CodeMetrics {
    let stripped = strip_comments(code, language);
    let loc = stripped.lines().filter(|l| !l.trim().is_empty()).count();
    let function_count = count_functions(&stripped, language);

    let complexity = if function_count == 0 {
        0.0
    } else {
        1.0 + count_decisions(&stripped, language) as f64 / function_count as f64
    };

    CodeMetrics {
        complexity,
        loc,
        function_count,
    }
}

/// Drop comments and mask string contents, keeping line structure intact.
///
/// Masked characters become `_` (whitespace is kept) so a line's blankness does not
/// change and keywords inside literals no longer match.
fn strip_comments(code: &str, language: Language) -> String {
    let python = language == Language::Python;
    let chars: Vec<char> = code.chars().collect();
    let mut out = String::with_capacity(code.len());
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();

        if (python && c == '#') || (!python && c == '/' && next == Some('/')) {
            while i < chars.len() && chars[i] != '\n' {
                i += 1;
            }
        } else if !python && c == '/' && next == Some('*') {
            i += 2;
            while i < chars.len() && !(chars[i] == '*' && chars.get(i + 1) == Some(&'/')) {
                if chars[i] == '\n' {
                    out.push('\n');
                }
                i += 1;
            }
            i = (i + 2).min(chars.len());
        } else if c == '"' || c == '\'' {
            let triple = python && next == Some(c) && chars.get(i + 2) == Some(&c);
            i = mask_string(&chars, i, if triple { 3 } else { 1 }, &mut out);
        } else {
            out.push(c);
            i += 1;
        }
    }

    out
}

/// Copy the literal opening at `start` with its contents masked; returns the index after it
fn mask_string(chars: &[char], start: usize, quote_len: usize, out: &mut String) -> usize {
    let quote = chars[start];
    let closes_at = |i: usize| (0..quote_len).all(|k| chars.get(i + k) == Some(&quote));

    out.extend(std::iter::repeat(quote).take(quote_len));
    let mut i = start + quote_len;

    while i < chars.len() {
        if closes_at(i) {
            out.extend(std::iter::repeat(quote).take(quote_len));
            return i + quote_len;
        }
        match chars[i] {
            '\\' => {
                out.push('_');
                if let Some(&escaped) = chars.get(i + 1) {
                    out.push(if escaped == '\n' { '\n' } else { '_' });
                }
                i += 2;
            }
            // unterminated single-line literal
            '\n' if quote_len == 1 => return i,
            ch if ch.is_whitespace() => {
                out.push(ch);
                i += 1;
            }
            _ => {
                out.push('_');
                i += 1;
            }
        }
    }

    chars.len()
}

fn count_functions(code: &str, language: Language) -> usize {
    match language {
        Language::Python => python_def_pattern().find_iter(code).count(),
        _ => c_family_def_pattern()
            .captures_iter(code)
            .filter_map(|caps| caps.get(1))
            .filter(|name| !CONTROL_KEYWORDS.contains(&name.as_str()))
            .count(),
    }
}

fn count_decisions(code: &str, language: Language) -> usize {
    let pattern = match language {
        Language::Python => python_decision_pattern(),
        _ => c_family_decision_pattern(),
    };
    pattern.find_iter(code).count()
}

macro_rules! cached_regex {
    ($name:ident, $pattern:expr) => {
        fn $name() -> &'static Regex {
            static PATTERN: OnceLock<Regex> = OnceLock::new();
            PATTERN.get_or_init(|| Regex::new($pattern).expect("metrics pattern is valid"))
        }
    };
}

cached_regex!(python_def_pattern, r"(?m)^[ \t]*(?:async[ \t]+)?def[ \t]+\w+[ \t]*\(");
cached_regex!(
    python_decision_pattern,
    r"\b(?:if|elif|for|while|except|and|or|case)\b"
);
cached_regex!(
    c_family_def_pattern,
    r"(?m)^[ \t]*(?:[\w:<>,\[\]*&~]+[ \t]+)+[*&]?[ \t]*([A-Za-z_~][\w:~]*)[ \t]*\([^;{}]*\)[ \t]*(?:const[ \t]*)?(?:noexcept[ \t]*)?(?:throws[ \t]+[\w., \t]+)?\s*\{"
);
cached_regex!(
    c_family_decision_pattern,
    r"\b(?:if|for|while|case|catch)\b|&&|\|\|"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_python_metrics() {
        let code = r#"
# count pairs
def pairs(values):
    total = 0
    for a in values:
        for b in values:
            if a < b and b > 0:
                total += 1
    return total
"#;
        let metrics = analyze(code, Language::Python);
        assert_eq!(metrics.function_count, 1);
        assert_eq!(metrics.loc, 7);
        // for, for, if, and
        assert!((metrics.complexity - 5.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_java_bubble_sort_metrics() {
        let code = r#"
public class MessyProcessor {
    public void sort(int[] arr) {
        int n = arr.length;
        // Bad Bubble Sort - O(n^2)
        for (int i = 0; i < n-1; i++)
            for (int j = 0; j < n-i-1; j++)
                if (arr[j] > arr[j+1]) {
                    int temp = arr[j];
                    arr[j] = arr[j+1];
                    arr[j+1] = temp;
                }
    }
}
"#;
        let metrics = analyze(code, Language::Java);
        assert_eq!(metrics.function_count, 1);
        assert!((metrics.complexity - 4.0).abs() < f64::EPSILON);
        assert_eq!(metrics.loc, 12);
    }

    #[test]
    fn test_no_functions_means_zero_complexity() {
        let metrics = analyze("int x = 1;\n", Language::C);
        assert_eq!(metrics.function_count, 0);
        assert_eq!(metrics.complexity, 0.0);
        assert!((metrics.heuristic() - 0.05).abs() < 1e-9);
    }

    #[test]
    fn test_block_comments_are_not_code() {
        let code = "/* header\n * details\n */\nint main(void) {\n    return 0;\n}\n";
        let metrics = analyze(code, Language::C);
        assert_eq!(metrics.loc, 3);
        assert_eq!(metrics.function_count, 1);
    }

    #[test]
    fn test_python_strings_are_not_comments_or_keywords() {
        let code = r##"
def paint(shape):
    color = "#fff"  # hex
    label = 'if red or blue'
    note = """while
for"""
    return shape, color, label, note
"##;
        let metrics = analyze(code, Language::Python);
        assert_eq!(metrics.function_count, 1);
        assert_eq!(metrics.loc, 6);
        assert!((metrics.complexity - 1.0).abs() < f64::EPSILON);

        let stripped = strip_comments(code, Language::Python);
        assert!(stripped.contains(r#"color = "____"  "#));
        assert!(!stripped.contains("hex"));
    }

    #[test]
    fn test_c_string_with_slashes_is_code() {
        let code = "int main(void) {\n    const char *url = \"http://a.b/*x*/\"; // note\n    return url[0] == 'h' && url[1] == '\\'';\n}\n";
        let metrics = analyze(code, Language::C);
        assert_eq!(metrics.loc, 4);
        assert_eq!(metrics.function_count, 1);
        // only the && outside the literals
        assert!((metrics.complexity - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_comparison_improvement() {
        let before = "def f(xs):\n    for a in xs:\n        for b in xs:\n            if a == b:\n                return True\n    return False\n";
        let after = "def f(xs):\n    return len(set(xs)) != len(xs)\n";
        let comparison = MetricsComparison::compare(before, after, Language::Python);
        assert!(comparison.improvement() > 0.0);
    }
}
