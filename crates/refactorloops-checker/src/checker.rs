use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

use crate::compiler::check_with_toolchain;
use crate::python::check_python;
use crate::{Language, ValidationResult};

/// Toolchain settings for the syntax checker
#[derive(Debug, Clone)]
pub struct CheckerConfig {
    /// C compiler binary
    pub gcc: PathBuf,
    /// C++ compiler binary
    pub gxx: PathBuf,
    /// Java compiler binary
    pub javac: PathBuf,
    /// Python interpreter used for the authoritative `ast.parse`
    pub python: PathBuf,
    /// Wall-clock limit for one toolchain run
    pub timeout: Duration,
    /// Parent directory for scratch files (None = system temp dir)
    pub scratch_dir: Option<PathBuf>,
}

impl Default for CheckerConfig {
    fn default() -> Self {
        Self {
            gcc: PathBuf::from("gcc"),
            gxx: PathBuf::from("g++"),
            javac: PathBuf::from("javac"),
            python: PathBuf::from("python3"),
            timeout: Duration::from_secs(30),
            scratch_dir: None,
        }
    }
}

impl CheckerConfig {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_scratch_dir(mut self, dir: PathBuf) -> Self {
        self.scratch_dir = Some(dir);
        self
    }

    /// Override the compiler (or, for Python, the interpreter) used for a language
    pub fn with_compiler(mut self, language: Language, binary: PathBuf) -> Self {
        match language {
            Language::C => self.gcc = binary,
            Language::Cpp => self.gxx = binary,
            Language::Java => self.javac = binary,
            Language::Python => self.python = binary,
        }
        self
    }
}

/// Anything that can judge whether a candidate is structurally valid
#[async_trait]
pub trait Validator: Send + Sync {
    async fn check(&self, code: &str, language: Language) -> ValidationResult;
}

/// Validates code with each language's own tooling
#[derive(Debug, Clone, Default)]
pub struct SyntaxChecker {
    config: CheckerConfig,
}

impl SyntaxChecker {
    pub fn new(config: CheckerConfig) -> Self {
        Self { config }
    }

    /// Check against a language given by name; unknown names are `Unsupported`
    pub async fn check_named(&self, code: &str, language: &str) -> ValidationResult {
        match language.parse::<Language>() {
            Ok(language) => self.check(code, language).await,
            Err(_) => ValidationResult::unsupported(language),
        }
    }

    /// Check an untyped value, e.g. a code field lifted straight out of model JSON
    pub async fn check_value(&self, code: &serde_json::Value, language: &str) -> ValidationResult {
        match code.as_str() {
            Some(code) => self.check_named(code, language).await,
            None => ValidationResult::format_error("optimized_code must be a string."),
        }
    }
}

#[async_trait]
impl Validator for SyntaxChecker {
    async fn check(&self, code: &str, language: Language) -> ValidationResult {
        debug!(%language, code_len = code.len(), "Checking syntax");

        if language == Language::Python {
            // tree-sitter locates gross defects without spawning anything; the
            // interpreter has the final word on what the grammar accepts
            let parsed = check_python(code);
            if !parsed.is_valid() {
                return parsed;
            }
        }

        check_with_toolchain(code, language, &self.config).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Verdict;
    use serde_json::json;
    use tempfile::TempDir;

    fn scratch_entries(dir: &TempDir) -> usize {
        std::fs::read_dir(dir.path()).unwrap().count()
    }

    async fn compiler_installed(binary: &str) -> bool {
        tokio::process::Command::new(binary)
            .arg("--version")
            .output()
            .await
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    fn missing_python() -> SyntaxChecker {
        SyntaxChecker::new(CheckerConfig::default().with_compiler(
            Language::Python,
            PathBuf::from("definitely-not-a-python-xyz"),
        ))
    }

    #[tokio::test]
    async fn test_python_parse_errors_need_no_interpreter() {
        let broken = missing_python().check("def f(:\n", Language::Python).await;
        assert_eq!(broken.verdict, Verdict::Invalid);
        assert!(broken.line.is_some());
    }

    #[tokio::test]
    async fn test_python_without_interpreter_is_tool_unavailable() {
        let result = missing_python().check("x = 1\n", Language::Python).await;
        assert_eq!(result.verdict, Verdict::ToolUnavailable);
        assert!(result.message.contains("Interpreter 'definitely-not-a-python-xyz' not found"));
        assert!(!result.is_retryable());
    }

    #[tokio::test]
    async fn test_python_accepts_only_what_cpython_parses() {
        if !compiler_installed("python3").await {
            return;
        }

        let scratch = TempDir::new().unwrap();
        let checker = SyntaxChecker::new(
            CheckerConfig::default().with_scratch_dir(scratch.path().to_path_buf()),
        );

        let ok = checker.check("x = 1\n", Language::Python).await;
        assert!(ok.is_valid(), "unexpected: {}", ok.message);
        assert_eq!(ok.message, "Valid");

        // tree-sitter-python accepts all of these
        let rejected = [
            ("print \"hello\"\n", "Missing parentheses", 1),
            ("exec \"x = 1\"\n", "Syntax Error", 1),
            // wording varies across CPython releases
            ("def f(a=1, b):\n    return b\n", "default", 1),
            ("x = 1\ndel f()\n", "cannot delete function call", 2),
        ];
        for (code, reason, line) in rejected {
            let result = checker.check(code, Language::Python).await;
            assert_eq!(result.verdict, Verdict::Invalid, "accepted {:?}", code);
            assert!(result.message.starts_with("Syntax Error: "), "{}", result.message);
            assert!(result.message.contains(reason), "{}", result.message);
            assert_eq!(result.line, Some(line), "{}", result.message);
            assert!(result.is_retryable());
        }

        assert_eq!(scratch_entries(&scratch), 0);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_slow_compiler_times_out_and_cleans_up() {
        use std::os::unix::fs::PermissionsExt;
        use std::time::Instant;

        let bin = TempDir::new().unwrap();
        let script = bin.path().join("slow-cc");
        std::fs::write(&script, "#!/bin/sh\nexec sleep 10\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let scratch = TempDir::new().unwrap();
        let config = CheckerConfig::default()
            .with_compiler(Language::C, script)
            .with_timeout(Duration::from_millis(300))
            .with_scratch_dir(scratch.path().to_path_buf());
        let checker = SyntaxChecker::new(config);

        let started = Instant::now();
        let result = checker.check("int main(void) { return 0; }\n", Language::C).await;

        assert_eq!(result.verdict, Verdict::TimedOut, "{}", result.message);
        assert!(!result.is_retryable());
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(scratch_entries(&scratch), 0);
    }

    #[tokio::test]
    async fn test_unknown_language_is_unsupported() {
        let checker = SyntaxChecker::default();
        let result = checker.check_named("fn main() {}", "rust").await;
        assert_eq!(result.verdict, Verdict::Unsupported);
        assert!(!result.is_retryable());
    }

    #[tokio::test]
    async fn test_non_string_value_is_format_error() {
        let checker = SyntaxChecker::default();
        let result = checker
            .check_value(&json!(["x = 1", "y = 2"]), "python")
            .await;
        assert_eq!(result.verdict, Verdict::Format);
        assert_eq!(result.message, "optimized_code must be a string.");
        assert!(result.is_retryable());
    }

    #[tokio::test]
    async fn test_missing_compiler_is_tool_unavailable_and_cleans_up() {
        let scratch = TempDir::new().unwrap();
        let config = CheckerConfig::default()
            .with_compiler(Language::C, PathBuf::from("definitely-not-a-compiler-xyz"))
            .with_scratch_dir(scratch.path().to_path_buf());
        let checker = SyntaxChecker::new(config);

        let result = checker.check("int main(void) { return 0; }\n", Language::C).await;
        assert_eq!(result.verdict, Verdict::ToolUnavailable);
        assert!(result.message.contains("definitely-not-a-compiler-xyz"));
        assert_eq!(scratch_entries(&scratch), 0);
    }

    #[tokio::test]
    async fn test_gcc_verdicts_leave_no_scratch_files() {
        if !compiler_installed("gcc").await {
            return;
        }

        let scratch = TempDir::new().unwrap();
        let checker = SyntaxChecker::new(
            CheckerConfig::default().with_scratch_dir(scratch.path().to_path_buf()),
        );

        let ok = checker
            .check("int add(int a, int b) { return a + b; }\n", Language::C)
            .await;
        assert!(ok.is_valid(), "unexpected: {}", ok.message);
        assert_eq!(scratch_entries(&scratch), 0);

        let broken = checker
            .check("int add(int a, int b) { return a + b }\n", Language::C)
            .await;
        assert_eq!(broken.verdict, Verdict::Invalid);
        assert!(broken.message.contains("candidate.c"));
        assert_eq!(broken.line, Some(1));
        assert_eq!(scratch_entries(&scratch), 0);
    }

    #[tokio::test]
    async fn test_javac_accepts_arbitrary_public_class_name() {
        if !compiler_installed("javac").await {
            return;
        }

        let scratch = TempDir::new().unwrap();
        let checker = SyntaxChecker::new(
            CheckerConfig::default().with_scratch_dir(scratch.path().to_path_buf()),
        );

        let code = "public class MessyProcessor {\n    public MessyProcessor() {}\n    int twice(int x) { return x * 2; }\n}\n";
        let result = checker.check(code, Language::Java).await;
        assert!(result.is_valid(), "unexpected: {}", result.message);
        // Main.class is an artifact of the scratch directory too
        assert_eq!(scratch_entries(&scratch), 0);
    }
}
