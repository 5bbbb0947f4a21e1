use regex::Regex;
use std::borrow::Cow;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::OnceLock;
use std::time::Instant;
use tempfile::TempDir;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::{CheckerConfig, Language, ValidationResult};

/// Class name every Java candidate is compiled under
pub const JAVA_PLACEHOLDER_CLASS: &str = "Main";

const C_FLAGS: [&str; 3] = ["-fsyntax-only", "-x", "c"];
const CPP_FLAGS: [&str; 3] = ["-fsyntax-only", "-x", "c++"];
// Class files land in the scratch directory and are removed with it
const JAVA_FLAGS: [&str; 4] = ["-proc:none", "-Xlint:none", "-d", "."];
const PYTHON_FLAGS: [&str; 3] = ["-I", "-c", PYTHON_AST_SCRIPT];

/// Parses the file named by argv[1] with the interpreter's own grammar
const PYTHON_AST_SCRIPT: &str = r#"import ast, sys
path = sys.argv[1]
with open(path, encoding="utf-8") as handle:
    source = handle.read()
try:
    ast.parse(source, filename=path)
except (SyntaxError, ValueError) as error:
    line = getattr(error, "lineno", None) or 1
    reason = getattr(error, "msg", None) or str(error)
    sys.stderr.write("Syntax Error: %s at line %d\n" % (reason, line))
    sys.exit(1)
"#;

/// How to invoke a language's toolchain in syntax-only mode
struct CompilerInvocation<'a> {
    /// "Compiler" or "Interpreter", for diagnostics
    kind: &'static str,
    binary: &'a Path,
    file_name: String,
    args: Vec<String>,
}

impl<'a> CompilerInvocation<'a> {
    fn for_language(language: Language, config: &'a CheckerConfig) -> Self {
        let (kind, binary, flags): (_, &Path, &[&str]) = match language {
            Language::C => ("Compiler", config.gcc.as_path(), C_FLAGS.as_slice()),
            Language::Cpp => ("Compiler", config.gxx.as_path(), CPP_FLAGS.as_slice()),
            Language::Java => ("Compiler", config.javac.as_path(), JAVA_FLAGS.as_slice()),
            Language::Python => ("Interpreter", config.python.as_path(), PYTHON_FLAGS.as_slice()),
        };

        let file_name = match language {
            Language::Java => format!("{}.java", JAVA_PLACEHOLDER_CLASS),
            other => format!("candidate.{}", other.extension()),
        };

        let mut args: Vec<String> = flags.iter().map(|a| a.to_string()).collect();
        args.push(file_name.clone());

        Self {
            kind,
            binary,
            file_name,
            args,
        }
    }

    fn tool_name(&self) -> String {
        self.binary.display().to_string()
    }
}

/// Write the candidate to a private scratch directory and run the toolchain on it.
///
/// The scratch directory (source plus any compiler artifacts) is removed when the
/// guard drops, on every return path.
pub(crate) async fn check_with_toolchain(
    code: &str,
    language: Language,
    config: &CheckerConfig,
) -> ValidationResult {
    let invocation = CompilerInvocation::for_language(language, config);

    let scratch = match scratch_dir(config.scratch_dir.as_deref()) {
        Ok(dir) => dir,
        Err(e) => {
            warn!(error = %e, "Failed to create scratch directory");
            return ValidationResult::tool_unavailable(format!(
                "Could not prepare a scratch file for {}: {}",
                invocation.tool_name(),
                e
            ));
        }
    };

    let source = match language {
        Language::Java => rename_public_type(code),
        _ => Cow::Borrowed(code),
    };

    let source_path = scratch.path().join(&invocation.file_name);
    if let Err(e) = tokio::fs::write(&source_path, source.as_bytes()).await {
        return ValidationResult::tool_unavailable(format!(
            "Could not write {}: {}",
            source_path.display(),
            e
        ));
    }

    let result = run_compiler(&invocation, scratch.path(), config).await;
    drop(scratch);
    result
}

async fn run_compiler(
    invocation: &CompilerInvocation<'_>,
    working_dir: &Path,
    config: &CheckerConfig,
) -> ValidationResult {
    let start = Instant::now();

    debug!(
        binary = %invocation.binary.display(),
        args = ?invocation.args,
        working_dir = %working_dir.display(),
        "Spawning toolchain"
    );

    let mut cmd = Command::new(invocation.binary);
    cmd.args(&invocation.args)
        .current_dir(working_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return ValidationResult::tool_unavailable(format!(
                "{} '{}' not found. Make sure it's installed and in PATH.",
                invocation.kind,
                invocation.tool_name()
            ));
        }
        Err(e) => {
            return ValidationResult::tool_unavailable(format!(
                "Failed to start {} '{}': {}",
                invocation.kind.to_lowercase(),
                invocation.tool_name(),
                e
            ));
        }
    };

    let output = match tokio::time::timeout(config.timeout, child.wait_with_output()).await {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => {
            return ValidationResult::tool_unavailable(format!(
                "{} '{}' failed: {}",
                invocation.kind,
                invocation.tool_name(),
                e
            ));
        }
        Err(_) => {
            warn!(timeout = ?config.timeout, "Toolchain timed out");
            return ValidationResult::timed_out(format!(
                "{} '{}' did not finish within {:?}",
                invocation.kind,
                invocation.tool_name(),
                config.timeout
            ));
        }
    };

    debug!(
        exit_code = output.status.code().unwrap_or(-1),
        duration_ms = start.elapsed().as_millis(),
        "Toolchain completed"
    );

    if output.status.success() {
        return ValidationResult::valid();
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    let message = tidy_diagnostics(&stderr, working_dir, &invocation.file_name);
    if message.is_empty() {
        ValidationResult::invalid(
            format!(
                "{} exited with status {}",
                invocation.tool_name(),
                output.status.code().unwrap_or(-1)
            ),
            None,
        )
    } else {
        let line = first_diagnostic_line(&message, &invocation.file_name)
            .or_else(|| reported_line(&message));
        ValidationResult::invalid(message, line)
    }
}

fn scratch_dir(root: Option<&Path>) -> std::io::Result<TempDir> {
    let mut builder = tempfile::Builder::new();
    builder.prefix("refactorloops-");
    match root {
        Some(root) => builder.tempdir_in(root),
        None => builder.tempdir(),
    }
}

/// Strip scratch paths so diagnostics read `Main.java:3: error: ...`
fn tidy_diagnostics(stderr: &str, working_dir: &Path, file_name: &str) -> String {
    let full_path: PathBuf = working_dir.join(file_name);
    stderr
        .replace(&full_path.display().to_string(), file_name)
        .replace(&format!("./{}", file_name), file_name)
        .trim()
        .to_string()
}

/// Pull the line number out of the first `file:line:` diagnostic
fn first_diagnostic_line(message: &str, file_name: &str) -> Option<usize> {
    let prefix = format!("{}:", file_name);
    message.lines().find_map(|line| {
        let rest = line.trim_start().strip_prefix(&prefix)?;
        rest.split(':').next()?.trim().parse().ok()
    })
}

/// Line number from a `... at line N` message
fn reported_line(message: &str) -> Option<usize> {
    message
        .lines()
        .find_map(|line| line.rsplit_once(" at line ")?.1.trim().parse().ok())
}

fn public_type_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"(?m)^\s*public\s+(?:(?:final|abstract|sealed|non-sealed|strictfp)\s+)*(?:class|interface|enum|record)\s+([A-Za-z_$][A-Za-z0-9_$]*)",
        )
        .expect("public type pattern is valid")
    })
}

/// Rename the first public top-level type (and every reference to it) to the
/// placeholder so it compiles as `Main.java`.
pub fn rename_public_type(code: &str) -> Cow<'_, str> {
    let Some(name) = public_type_pattern()
        .captures(code)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
    else {
        return Cow::Borrowed(code);
    };

    if name == JAVA_PLACEHOLDER_CLASS {
        return Cow::Borrowed(code);
    }

    match Regex::new(&format!(r"\b{}\b", regex::escape(&name))) {
        Ok(reference) => Cow::Owned(
            reference
                .replace_all(code, JAVA_PLACEHOLDER_CLASS)
                .into_owned(),
        ),
        Err(_) => Cow::Borrowed(code),
    }
}
