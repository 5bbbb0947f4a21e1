use tracing::debug;
use tree_sitter::{Node, Parser};

use crate::ValidationResult;

const SNIPPET_LEN: usize = 40;

/// Parse Python source in-process and report the first syntax defect
pub(crate) fn check_python(code: &str) -> ValidationResult {
    let mut parser = Parser::new();
    if let Err(e) = parser.set_language(&tree_sitter_python::LANGUAGE.into()) {
        return ValidationResult::tool_unavailable(format!(
            "Python grammar could not be loaded: {}",
            e
        ));
    }

    let Some(tree) = parser.parse(code, None) else {
        return ValidationResult::invalid("Syntax Error: source could not be parsed", None);
    };

    let root = tree.root_node();
    if !root.has_error() {
        return ValidationResult::valid();
    }

    match first_defect(root) {
        Some(node) => {
            let line = node.start_position().row + 1;
            let message = describe(node, code, line);
            debug!(line, kind = node.kind(), "Python syntax defect");
            ValidationResult::invalid(message, Some(line))
        }
        None => ValidationResult::invalid("Syntax Error: invalid syntax at line 1", Some(1)),
    }
}

/// Depth-first search for the earliest ERROR or MISSING node
fn first_defect(node: Node<'_>) -> Option<Node<'_>> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.has_error() || child.is_missing() {
            if let Some(found) = first_defect(child) {
                return Some(found);
            }
        }
    }
    None
}

fn describe(node: Node<'_>, code: &str, line: usize) -> String {
    if node.is_missing() {
        return format!("Syntax Error: missing `{}` at line {}", node.kind(), line);
    }

    let snippet = node
        .utf8_text(code.as_bytes())
        .unwrap_or_default()
        .lines()
        .next()
        .unwrap_or_default()
        .trim();

    if snippet.is_empty() {
        format!("Syntax Error: invalid syntax at line {}", line)
    } else {
        let snippet: String = snippet.chars().take(SNIPPET_LEN).collect();
        format!(
            "Syntax Error: invalid syntax near `{}` at line {}",
            snippet, line
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Verdict;

    #[test]
    fn test_simple_assignment_is_valid() {
        let result = check_python("x = 1\n");
        assert!(result.is_valid());
        assert_eq!(result.message, "Valid");
    }

    #[test]
    fn test_broken_def_reports_line() {
        let result = check_python("def f(:\n");
        assert_eq!(result.verdict, Verdict::Invalid);
        assert!(!result.message.is_empty());
        assert_eq!(result.line, Some(1));
        assert!(result.message.contains("line 1"));
    }

    #[test]
    fn test_defect_on_later_line() {
        let code = "def total(values):\n    return sum(values)\n\nresult = total([1, 2\n";
        let result = check_python(code);
        assert_eq!(result.verdict, Verdict::Invalid);
        assert!(result.line.unwrap() >= 4);
    }

    #[test]
    fn test_full_program_is_valid() {
        let code = r#"
def find_duplicates(items: list[int]) -> set[int]:
    """Return the values that occur more than once."""
    seen: set[int] = set()
    duplicates: set[int] = set()
    for item in items:
        if item in seen:
            duplicates.add(item)
        seen.add(item)
    return duplicates
"#;
        assert!(check_python(code).is_valid());
    }
}
