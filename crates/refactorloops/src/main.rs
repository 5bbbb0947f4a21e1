mod config;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;

use refactorloops_checker::{analyze, Language, SyntaxChecker, Validator};
use refactorloops_core::{LoopRunner, RefactorOutcome};
use refactorloops_knowledge::{advisory_context, load_provider};
use refactorloops_logging::{init_tracing, LogFormat, Logger};
use refactorloops_model::{create_model, ProviderKind};
use refactorloops_refactor::{create_policy, PolicyKind};

use crate::config::{ProjectConfig, Settings};

#[derive(Parser, Debug)]
#[command(
    name = "refactorloops",
    about = "LLM-driven code refactoring with syntax-checked reflection",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Log output format
    #[arg(long, value_enum, default_value = "pretty", global = true)]
    log_format: LogFormatChoice,

    /// Tracing filter level (overridden by RUST_LOG)
    #[arg(long, default_value = "warn", global = true)]
    log_level: String,

    /// Also append events as JSON lines to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Refactor a source file and validate the result
    Refactor(RefactorArgs),
    /// Check a source file's syntax
    Check(FileArgs),
    /// Print complexity metrics for a source file
    Analyze(AnalyzeArgs),
}

#[derive(clap::Args, Debug)]
struct FileArgs {
    /// Source file
    file: PathBuf,

    /// Language (inferred from the file extension when omitted)
    #[arg(short, long)]
    language: Option<Language>,
}

#[derive(clap::Args, Debug)]
struct AnalyzeArgs {
    #[command(flatten)]
    input: FileArgs,

    /// Output metrics as JSON
    #[arg(long)]
    json_output: bool,
}

#[derive(clap::Args, Debug)]
struct RefactorArgs {
    #[command(flatten)]
    input: FileArgs,

    /// Maximum number of correction attempts
    #[arg(short = 'n', long)]
    max_retries: Option<usize>,

    /// Prompt policy: strict or conservative
    #[arg(long)]
    policy: Option<PolicyKind>,

    /// Model backend: ollama or openai
    #[arg(long)]
    provider: Option<ProviderKind>,

    /// Model to use
    #[arg(short, long)]
    model: Option<String>,

    /// Model server base URL
    #[arg(long)]
    base_url: Option<String>,

    /// Coding standards file with RULE-separated entries
    #[arg(long)]
    rules: Option<PathBuf>,

    /// Write the final code to this file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output final result as JSON
    #[arg(long)]
    json_output: bool,

    /// Dry run: show what would happen without calling the model
    #[arg(long)]
    dry_run: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormatChoice {
    Pretty,
    Json,
    Compact,
}

impl From<LogFormatChoice> for LogFormat {
    fn from(choice: LogFormatChoice) -> Self {
        match choice {
            LogFormatChoice::Pretty => LogFormat::Pretty,
            LogFormatChoice::Json => LogFormat::Json,
            LogFormatChoice::Compact => LogFormat::Compact,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_format: LogFormat = cli.log_format.into();
    init_tracing(&cli.log_level, log_format);

    let logger = match cli.log_file {
        Some(ref path) => Logger::with_file(log_format, path)
            .with_context(|| format!("Failed to open log file {}", path.display()))?,
        None => Logger::new(log_format),
    };

    let exit_code = match cli.command {
        Command::Refactor(args) => handle_refactor(args, logger).await?,
        Command::Check(args) => handle_check(args).await?,
        Command::Analyze(args) => handle_analyze(args)?,
    };

    std::process::exit(exit_code);
}

async fn handle_refactor(args: RefactorArgs, logger: Logger) -> Result<i32> {
    let (source, language) = read_source(&args.input)?;

    let working_dir = std::env::current_dir().context("Failed to get current directory")?;
    let config = ProjectConfig::load_layered(&working_dir)?;
    let settings = apply_overrides(config.resolve()?, &args);

    let rules = load_provider(settings.rules_file.as_deref());

    if args.dry_run {
        println!("=== Dry Run ===");
        println!("File: {} ({})", args.input.file.display(), language.display_name());
        println!("Provider: {}", settings.provider);
        println!("Model: {}", settings.model.model);
        println!("Policy: {}", settings.policy);
        println!("Max retries: {}", settings.max_retries);
        println!(
            "Rules:\n{}",
            advisory_context(rules.as_ref(), &source, settings.max_rules)
        );
        return Ok(0);
    }

    let model = create_model(settings.provider, settings.model.clone())
        .context("Failed to create model client")?;

    if !model.is_available().await {
        anyhow::bail!(
            "Model backend '{}' is not reachable. Make sure it's running and '{}' is available.",
            model.name(),
            model.model()
        );
    }

    let policy = create_policy(settings.policy);
    let checker = SyntaxChecker::new(settings.checker.clone());
    let runner = LoopRunner::new(model.as_ref(), policy.as_ref(), &checker, Arc::new(logger))
        .with_context_provider(rules.as_ref(), settings.max_rules);

    let request = runner.prepare(&source, language);
    let outcome = runner.run(&request, settings.max_retries).await;

    if args.json_output {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        print_outcome(&outcome);
        if let Some(code) = outcome.code() {
            write_code(code, args.output.as_deref())?;
        }
    }

    Ok(outcome.exit_code())
}

async fn handle_check(args: FileArgs) -> Result<i32> {
    let (source, language) = read_source(&args)?;

    let working_dir = std::env::current_dir().context("Failed to get current directory")?;
    let settings = ProjectConfig::load_layered(&working_dir)?.resolve()?;

    let result = SyntaxChecker::new(settings.checker).check(&source, language).await;

    if result.is_valid() {
        println!(
            "{} {} ({}): valid",
            "✓".bright_green(),
            args.file.display(),
            language.display_name()
        );
        Ok(0)
    } else {
        println!("{} {} ({})", "✗".bright_red(), args.file.display(), result.verdict);
        println!("{}", result.message);
        Ok(if result.is_retryable() { 1 } else { 3 })
    }
}

fn handle_analyze(args: AnalyzeArgs) -> Result<i32> {
    let (source, language) = read_source(&args.input)?;
    let metrics = analyze(&source, language);

    if args.json_output {
        println!("{}", serde_json::to_string_pretty(&metrics)?);
    } else {
        println!("File:        {}", args.input.file.display());
        println!("Language:    {}", language.display_name());
        println!("Functions:   {}", metrics.function_count);
        println!("LOC:         {}", metrics.loc);
        println!("Complexity:  {:.2}", metrics.complexity);
        println!("Heuristic:   {:.2}", metrics.heuristic());
    }

    Ok(0)
}

/// CLI flags take priority over file configuration
fn apply_overrides(mut settings: Settings, args: &RefactorArgs) -> Settings {
    if let Some(max_retries) = args.max_retries {
        settings.max_retries = max_retries;
    }
    if let Some(policy) = args.policy {
        settings.policy = policy;
    }
    if let Some(provider) = args.provider {
        settings.provider = provider;
    }
    if let Some(ref model) = args.model {
        settings.model.model = model.clone();
    }
    if let Some(ref base_url) = args.base_url {
        settings.model.base_url = Some(base_url.clone());
    }
    if let Some(ref rules) = args.rules {
        settings.rules_file = Some(rules.clone());
    }
    settings
}

fn read_source(args: &FileArgs) -> Result<(String, Language)> {
    let language = match args.language {
        Some(language) => language,
        None => Language::from_path(&args.file).with_context(|| {
            format!(
                "Cannot infer language from {}; pass --language",
                args.file.display()
            )
        })?,
    };

    let source = std::fs::read_to_string(&args.file)
        .with_context(|| format!("Failed to read {}", args.file.display()))?;

    Ok((source, language))
}

fn write_code(code: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => std::fs::write(path, code)
            .with_context(|| format!("Failed to write {}", path.display())),
        None => {
            println!("{}", code);
            Ok(())
        }
    }
}

fn print_outcome(outcome: &RefactorOutcome) {
    match outcome {
        RefactorOutcome::Success {
            corrections,
            record,
            metrics,
            total_duration_secs,
            ..
        } => {
            eprintln!();
            eprintln!("=== SUCCESS ===");
            eprintln!("Corrections: {}", corrections);
            eprintln!(
                "Complexity: {} -> {}",
                record.complexity_before, record.complexity_after
            );
            eprintln!(
                "Heuristic: {:.2} -> {:.2}",
                metrics.before.heuristic(),
                metrics.after.heuristic()
            );
            eprintln!("Duration: {:.1}s", total_duration_secs);
        }
        RefactorOutcome::RetriesExhausted {
            corrections,
            last_error,
            total_duration_secs,
            ..
        } => {
            eprintln!();
            eprintln!("=== INCOMPLETE ===");
            eprintln!("Still invalid after {} correction(s)", corrections);
            eprintln!("Last error: {}", last_error);
            eprintln!("Duration: {:.1}s", total_duration_secs);
        }
        RefactorOutcome::GenerationFailed {
            error,
            total_duration_secs,
            ..
        } => {
            eprintln!();
            eprintln!("=== FAILED ===");
            eprintln!("Error: {}", error);
            eprintln!("Duration: {:.1}s", total_duration_secs);
        }
        RefactorOutcome::ToolFailure {
            message,
            total_duration_secs,
            ..
        } => {
            eprintln!();
            eprintln!("=== TOOL FAILURE ===");
            eprintln!("{}", message);
            eprintln!("Duration: {:.1}s", total_duration_secs);
        }
    }

    eprintln!();
    for line in outcome.log().lines() {
        eprintln!("  {}", line.dimmed());
    }
}
