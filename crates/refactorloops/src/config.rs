//! Configuration file support for refactorloops.
//!
//! Loads `refactorloops.toml` from the working directory, layered over the global
//! `<config_dir>/refactorloops/config.toml`.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use refactorloops_checker::{CheckerConfig, Language};
use refactorloops_core::DEFAULT_MAX_RETRIES;
use refactorloops_model::{ModelConfig, ProviderKind};
use refactorloops_refactor::PolicyKind;

/// The project config file name
pub const CONFIG_FILE_NAME: &str = "refactorloops.toml";
/// Directory under the platform config dir holding the global config
pub const GLOBAL_CONFIG_DIR: &str = "refactorloops";
pub const GLOBAL_CONFIG_FILE: &str = "config.toml";

const DEFAULT_MAX_RULES: usize = 2;
const DEFAULT_OPENAI_KEY_ENV: &str = "OPENAI_API_KEY";

/// Contents of a config file; every key is optional
#[derive(Debug, Deserialize, Default, Clone)]
#[serde(deny_unknown_fields)]
pub struct ProjectConfig {
    #[serde(default)]
    pub model: ModelSection,
    #[serde(default, rename = "loop")]
    pub refactor_loop: LoopSection,
    #[serde(default)]
    pub checker: CheckerSection,
    #[serde(default)]
    pub knowledge: KnowledgeSection,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(deny_unknown_fields)]
pub struct ModelSection {
    /// "ollama" or "openai"
    pub provider: Option<String>,
    pub name: Option<String>,
    pub base_url: Option<String>,
    /// Environment variable holding the API key
    pub api_key_env: Option<String>,
    #[serde(default, with = "humantime_serde")]
    pub timeout: Option<Duration>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(deny_unknown_fields)]
pub struct LoopSection {
    pub max_retries: Option<usize>,
    pub prompt_policy: Option<String>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(deny_unknown_fields)]
pub struct CheckerSection {
    #[serde(default, with = "humantime_serde")]
    pub timeout: Option<Duration>,
    pub gcc: Option<PathBuf>,
    pub gxx: Option<PathBuf>,
    pub javac: Option<PathBuf>,
    pub python: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(deny_unknown_fields)]
pub struct KnowledgeSection {
    pub rules_file: Option<PathBuf>,
    pub max_rules: Option<usize>,
}

impl ProjectConfig {
    /// Load a config file.
    ///
    /// Returns:
    /// - `Ok(Some(config))` if file exists and parses successfully
    /// - `Ok(None)` if file does not exist
    /// - `Err(...)` if file exists but fails to parse (hard error)
    pub fn load_file(config_path: &Path) -> Result<Option<Self>> {
        if !config_path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read {}", config_path.display()))?;

        let config: ProjectConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", config_path.display()))?;

        Ok(Some(config))
    }

    /// Load the project config from `working_dir`
    pub fn load(working_dir: &Path) -> Result<Option<Self>> {
        Self::load_file(&working_dir.join(CONFIG_FILE_NAME))
    }

    /// Load the global config, if a config directory exists on this platform
    pub fn load_global() -> Result<Option<Self>> {
        match global_config_path() {
            Some(path) => Self::load_file(&path),
            None => Ok(None),
        }
    }

    /// Project config layered over global config
    pub fn load_layered(working_dir: &Path) -> Result<Self> {
        let global = Self::load_global()?.unwrap_or_default();
        let project = Self::load(working_dir)?.unwrap_or_default();
        Ok(global.overlay(project))
    }

    /// Keys set in `other` win over keys set in `self`
    pub fn overlay(self, other: ProjectConfig) -> ProjectConfig {
        ProjectConfig {
            model: ModelSection {
                provider: other.model.provider.or(self.model.provider),
                name: other.model.name.or(self.model.name),
                base_url: other.model.base_url.or(self.model.base_url),
                api_key_env: other.model.api_key_env.or(self.model.api_key_env),
                timeout: other.model.timeout.or(self.model.timeout),
            },
            refactor_loop: LoopSection {
                max_retries: other.refactor_loop.max_retries.or(self.refactor_loop.max_retries),
                prompt_policy: other
                    .refactor_loop
                    .prompt_policy
                    .or(self.refactor_loop.prompt_policy),
            },
            checker: CheckerSection {
                timeout: other.checker.timeout.or(self.checker.timeout),
                gcc: other.checker.gcc.or(self.checker.gcc),
                gxx: other.checker.gxx.or(self.checker.gxx),
                javac: other.checker.javac.or(self.checker.javac),
                python: other.checker.python.or(self.checker.python),
            },
            knowledge: KnowledgeSection {
                rules_file: other.knowledge.rules_file.or(self.knowledge.rules_file),
                max_rules: other.knowledge.max_rules.or(self.knowledge.max_rules),
            },
        }
    }

    /// Fill in built-in defaults and validate enumerated values
    pub fn resolve(&self) -> Result<Settings> {
        let provider = match self.model.provider.as_deref() {
            Some(name) => name.parse::<ProviderKind>().map_err(anyhow::Error::msg)?,
            None => ProviderKind::Ollama,
        };

        let mut model = ModelConfig::default();
        if let Some(ref name) = self.model.name {
            model.model = name.clone();
        }
        if let Some(ref base_url) = self.model.base_url {
            model = model.with_base_url(base_url.clone());
        }
        if let Some(timeout) = self.model.timeout {
            model = model.with_timeout(timeout);
        }

        let key_env = match (&self.model.api_key_env, provider) {
            (Some(env), _) => Some(env.as_str()),
            (None, ProviderKind::OpenAi) => Some(DEFAULT_OPENAI_KEY_ENV),
            (None, ProviderKind::Ollama) => None,
        };
        if let Some(key) = key_env.and_then(|env| std::env::var(env).ok()) {
            model = model.with_api_key(key);
        }

        let policy = match self.refactor_loop.prompt_policy.as_deref() {
            Some(name) => name.parse::<PolicyKind>().map_err(anyhow::Error::msg)?,
            None => PolicyKind::default(),
        };

        let mut checker = CheckerConfig::default();
        if let Some(timeout) = self.checker.timeout {
            checker = checker.with_timeout(timeout);
        }
        for (language, binary) in [
            (Language::C, &self.checker.gcc),
            (Language::Cpp, &self.checker.gxx),
            (Language::Java, &self.checker.javac),
            (Language::Python, &self.checker.python),
        ] {
            if let Some(binary) = binary {
                checker = checker.with_compiler(language, binary.clone());
            }
        }

        Ok(Settings {
            provider,
            model,
            max_retries: self.refactor_loop.max_retries.unwrap_or(DEFAULT_MAX_RETRIES),
            policy,
            checker,
            rules_file: self.knowledge.rules_file.clone(),
            max_rules: self.knowledge.max_rules.unwrap_or(DEFAULT_MAX_RULES),
        })
    }
}

/// Effective settings after layering and defaults
#[derive(Debug, Clone)]
pub struct Settings {
    pub provider: ProviderKind,
    pub model: ModelConfig,
    pub max_retries: usize,
    pub policy: PolicyKind,
    pub checker: CheckerConfig,
    pub rules_file: Option<PathBuf>,
    pub max_rules: usize,
}

pub fn global_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(GLOBAL_CONFIG_DIR).join(GLOBAL_CONFIG_FILE))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_is_none() {
        let dir = TempDir::new().unwrap();
        assert!(ProjectConfig::load(dir.path()).unwrap().is_none());
    }

    #[test]
    fn test_parse_full_config() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            r#"
[model]
provider = "openai"
name = "gpt-4o-mini"
base_url = "http://localhost:8080/v1"
api_key_env = "REFACTORLOOPS_TEST_UNSET_KEY"
timeout = "45s"

[loop]
max_retries = 5
prompt_policy = "conservative"

[checker]
timeout = "10s"
javac = "/opt/jdk/bin/javac"
python = "/usr/bin/python3.12"

[knowledge]
rules_file = "data/coding_standards.txt"
max_rules = 3
"#,
        )
        .unwrap();

        let config = ProjectConfig::load(dir.path()).unwrap().unwrap();
        let settings = config.resolve().unwrap();

        assert_eq!(settings.provider, ProviderKind::OpenAi);
        assert_eq!(settings.model.model, "gpt-4o-mini");
        assert_eq!(settings.model.timeout, Duration::from_secs(45));
        assert!(settings.model.api_key.is_none());
        assert_eq!(settings.max_retries, 5);
        assert_eq!(settings.policy, PolicyKind::Conservative);
        assert_eq!(settings.checker.timeout, Duration::from_secs(10));
        assert_eq!(settings.checker.javac, PathBuf::from("/opt/jdk/bin/javac"));
        assert_eq!(settings.checker.python, PathBuf::from("/usr/bin/python3.12"));
        assert_eq!(settings.max_rules, 3);
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            "[loop]\nmax_iterations = 3\n",
        )
        .unwrap();

        assert!(ProjectConfig::load(dir.path()).is_err());
    }

    #[test]
    fn test_defaults() {
        let settings = ProjectConfig::default().resolve().unwrap();
        assert_eq!(settings.provider, ProviderKind::Ollama);
        assert_eq!(settings.model.model, "deepseek-coder:latest");
        assert_eq!(settings.max_retries, 3);
        assert_eq!(settings.policy, PolicyKind::Strict);
        assert_eq!(settings.max_rules, 2);
        assert!(settings.rules_file.is_none());
        assert_eq!(settings.checker.python, PathBuf::from("python3"));
    }

    #[test]
    fn test_project_overlays_global() {
        let global: ProjectConfig = toml::from_str(
            "[model]\nname = \"codellama\"\ntimeout = \"2m\"\n[loop]\nmax_retries = 1\n",
        )
        .unwrap();
        let project: ProjectConfig = toml::from_str("[loop]\nmax_retries = 4\n").unwrap();

        let settings = global.overlay(project).resolve().unwrap();
        assert_eq!(settings.model.model, "codellama");
        assert_eq!(settings.model.timeout, Duration::from_secs(120));
        assert_eq!(settings.max_retries, 4);
    }

    #[test]
    fn test_invalid_policy_is_an_error() {
        let config: ProjectConfig = toml::from_str("[loop]\nprompt_policy = \"creative\"\n").unwrap();
        assert!(config.resolve().is_err());
    }
}
