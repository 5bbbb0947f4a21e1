//! # refactorloops-knowledge
//!
//! Advisory coding standards injected into refactor prompts.
//!
//! A [`RuleBook`] is loaded from a plain text file where each rule starts with the
//! token `RULE`. Rules are ranked against the code being refactored by lexical
//! overlap; [`NoContext`] is used when no rules file is configured or it is missing.

use regex::Regex;
use std::collections::HashSet;
use std::path::Path;
use std::sync::OnceLock;
use tracing::{debug, warn};

/// Text used when no rule applies
pub const NO_RULES: &str = "No specific rules found.";

/// Source of advisory rules relevant to a piece of code
pub trait ContextProvider: Send + Sync {
    /// At most `limit` rules, most relevant first
    fn rules_for(&self, code: &str, limit: usize) -> Vec<String>;
}

/// Provider that never returns rules
#[derive(Debug, Clone, Copy, Default)]
pub struct NoContext;

impl ContextProvider for NoContext {
    fn rules_for(&self, _code: &str, _limit: usize) -> Vec<String> {
        Vec::new()
    }
}

/// Rules loaded from a standards document
#[derive(Debug, Clone, Default)]
pub struct RuleBook {
    rules: Vec<Rule>,
}

#[derive(Debug, Clone)]
struct Rule {
    text: String,
    tokens: HashSet<String>,
}

impl RuleBook {
    /// Split `content` on the `RULE` token; each non-blank chunk becomes `"RULE <chunk>"`
    pub fn parse(content: &str) -> Self {
        let rules = content
            .split("RULE")
            .map(str::trim)
            .filter(|chunk| !chunk.is_empty())
            .map(|chunk| {
                let text = format!("RULE {}", chunk);
                let tokens = tokenize(chunk);
                Rule { text, tokens }
            })
            .collect();

        Self { rules }
    }

    pub fn load(path: &Path) -> std::io::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let book = Self::parse(&content);
        debug!(path = %path.display(), rules = book.len(), "Loaded rule book");
        Ok(book)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl ContextProvider for RuleBook {
    fn rules_for(&self, code: &str, limit: usize) -> Vec<String> {
        let code_tokens = tokenize(code);

        let mut scored: Vec<(usize, usize)> = self
            .rules
            .iter()
            .enumerate()
            .map(|(idx, rule)| (idx, rule.tokens.intersection(&code_tokens).count()))
            .filter(|(_, score)| *score > 0)
            .collect();

        // Stable sort keeps document order among equal scores
        scored.sort_by(|a, b| b.1.cmp(&a.1));

        scored
            .into_iter()
            .take(limit)
            .map(|(idx, _)| self.rules[idx].text.clone())
            .collect()
    }
}

/// Build a provider from an optional rules file, degrading to [`NoContext`]
pub fn load_provider(rules_file: Option<&Path>) -> Box<dyn ContextProvider> {
    let Some(path) = rules_file else {
        return Box::new(NoContext);
    };

    match RuleBook::load(path) {
        Ok(book) => Box::new(book),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Rules file unavailable, continuing without advisory context");
            Box::new(NoContext)
        }
    }
}

/// Relevant rules joined by newlines, or [`NO_RULES`] when nothing matches
pub fn advisory_context(provider: &dyn ContextProvider, code: &str, limit: usize) -> String {
    let rules = provider.rules_for(code, limit);
    if rules.is_empty() {
        NO_RULES.to_string()
    } else {
        rules.join("\n")
    }
}

const IGNORED_WORDS: &[&str] = &[
    "the", "an", "of", "to", "be", "use", "should", "always", "never", "instead", "rule",
    "when", "with", "than", "that", "this", "are", "its", "it",
];

fn tokenize(text: &str) -> HashSet<String> {
    static WORD: OnceLock<Regex> = OnceLock::new();
    let word = WORD.get_or_init(|| Regex::new(r"[A-Za-z_][A-Za-z0-9_]*").expect("word pattern is valid"));

    word.find_iter(text)
        .map(|m| m.as_str().to_lowercase())
        .filter(|token| token.len() > 1 && !IGNORED_WORDS.contains(&token.as_str()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const STANDARDS: &str = "\
RULE 1: Avoid nested for loops over the same list; use a set or dict for membership.
RULE 2: Java classes should prefer StringBuilder over string concatenation in loops.
RULE 3: Use early return to reduce nesting.

";

    #[test]
    fn test_parse_splits_on_rule_token() {
        let book = RuleBook::parse(STANDARDS);
        assert_eq!(book.len(), 3);
        assert_eq!(
            book.rules[0].text,
            "RULE 1: Avoid nested for loops over the same list; use a set or dict for membership."
        );
    }

    #[test]
    fn test_ranking_by_overlap() {
        let book = RuleBook::parse(STANDARDS);
        let code = "def dupes(items):\n    for a in items:\n        for b in items:\n            if a == b and a in set(items): return True\n";

        let rules = book.rules_for(code, 2);
        assert_eq!(rules.len(), 2);
        assert!(rules[0].starts_with("RULE 1"));
    }

    #[test]
    fn test_zero_overlap_is_excluded() {
        let book = RuleBook::parse(STANDARDS);
        assert!(book.rules_for("x = 1", 5).is_empty());
    }

    #[test]
    fn test_ties_keep_document_order() {
        let book = RuleBook::parse("RULE A: prefer alpha\nRULE B: prefer alpha\n");
        let rules = book.rules_for("alpha()", 2);
        assert_eq!(rules, vec!["RULE A: prefer alpha", "RULE B: prefer alpha"]);
    }

    #[test]
    fn test_advisory_context_default() {
        assert_eq!(advisory_context(&NoContext, "anything", 2), NO_RULES);

        let book = RuleBook::parse(STANDARDS);
        let context = advisory_context(&book, "String s = a + b; StringBuilder sb;", 1);
        assert!(context.starts_with("RULE 2"));
        assert!(!context.contains('\n'));
    }

    #[test]
    fn test_missing_file_degrades_to_no_context() {
        let dir = tempfile::tempdir().unwrap();
        let provider = load_provider(Some(&dir.path().join("missing.txt")));
        assert!(provider.rules_for("for x in set(y)", 3).is_empty());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("coding_standards.txt");
        std::fs::write(&path, STANDARDS).unwrap();

        let provider = load_provider(Some(&path));
        let rules = provider.rules_for("if done: return early", 3);
        assert_eq!(rules.len(), 1);
        assert!(rules[0].starts_with("RULE 3"));
    }
}
