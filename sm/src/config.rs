//! Scrummaster configuration types and loading

use eyre::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::retry::RetryPolicy;

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// LLM provider configuration
    pub llm: LlmConfig,

    /// Jira connection and pacing
    pub jira: JiraConfig,

    /// What a `process` run does and where output goes
    pub processing: ProcessingConfig,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[serde(rename = "log-level", skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
}

/// Processing mode for the `process` command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ProcessingMode {
    /// Analyze, save, then create tickets
    #[default]
    Full,
    /// Analyze and save only
    AnalyzeOnly,
}

impl std::fmt::Display for ProcessingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Full => write!(f, "full"),
            Self::AnalyzeOnly => write!(f, "analyze-only"),
        }
    }
}

impl Config {
    /// Load configuration with fallback chain
    ///
    /// Explicit path, then `./.scrummaster.yml`, then
    /// `~/.config/scrummaster/scrummaster.yml`, then defaults.
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        let local_config = PathBuf::from(".scrummaster.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        if let Some(user_config) = Self::user_config_path()
            && user_config.exists()
        {
            match Self::load_from_file(&user_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                }
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Read only the log level, before logging is set up
    ///
    /// Errors are swallowed; the full load reports them later.
    pub fn load_log_level(config_path: Option<&PathBuf>) -> Option<String> {
        let candidates = match config_path {
            Some(path) => vec![path.clone()],
            None => [Some(PathBuf::from(".scrummaster.yml")), Self::user_config_path()]
                .into_iter()
                .flatten()
                .collect(),
        };

        candidates
            .iter()
            .find(|p| p.exists())
            .and_then(|p| fs::read_to_string(p).ok())
            .and_then(|content| serde_yaml::from_str::<Config>(&content).ok())
            .and_then(|config| config.log_level)
    }

    /// `~/.config/scrummaster/scrummaster.yml`
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("scrummaster").join("scrummaster.yml"))
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    /// Validate what a run needs before doing any work
    ///
    /// Analysis needs the LLM key; ticket creation (anything except dry runs
    /// and analyze-only) needs a complete Jira section.
    pub fn validate_for(&self, mode: ProcessingMode, analyze: bool, dry_run: bool) -> Result<()> {
        debug!(%mode, analyze, dry_run, "validate_for: called");
        if analyze {
            self.llm.get_api_key()?;
            if self.llm.chunk_size_chars == 0 {
                bail!("llm.chunk-size-chars must be greater than zero");
            }
        }

        if mode == ProcessingMode::Full && !dry_run {
            self.jira.validate()?;
        }
        Ok(())
    }

    /// Sample configuration written by `sm init`
    pub fn sample() -> Self {
        Self {
            llm: LlmConfig::default(),
            jira: JiraConfig {
                base_url: "https://your-domain.atlassian.net".to_string(),
                username: "your-email@example.com".to_string(),
                project_key: "PROJ".to_string(),
                ..JiraConfig::default()
            },
            processing: ProcessingConfig::default(),
            log_level: Some("info".to_string()),
        }
    }

    /// Save config to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_yaml::to_string(self).context("Failed to serialize config")?;
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }
        fs::write(path, content).context(format!("Failed to write config to {}", path.display()))?;
        Ok(())
    }
}

/// Read a secret from the environment variable named by `var`
fn secret_from_env(var: &str, what: &str) -> Result<String> {
    match std::env::var(var) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(eyre::eyre!("{} not found. Set the {} environment variable.", what, var)),
    }
}

/// LLM provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Provider name ("anthropic" or "openai")
    pub provider: String,

    /// Model identifier
    pub model: String,

    /// Environment variable containing the API key
    #[serde(rename = "api-key-env")]
    pub api_key_env: String,

    /// API base URL; unset means the provider's public endpoint
    #[serde(rename = "base-url", default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Maximum tokens per response
    #[serde(rename = "max-tokens")]
    pub max_tokens: u32,

    /// Request timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,

    /// Soft size limit for one chunk of input, in characters
    #[serde(rename = "chunk-size-chars")]
    pub chunk_size_chars: usize,

    /// Attempts per chunk, including the first
    #[serde(rename = "retry-count")]
    pub retry_count: u32,

    /// Pause between failed attempts
    #[serde(rename = "retry-delay-ms")]
    pub retry_delay_ms: u64,

    /// Pause between consecutive chunk requests
    #[serde(rename = "chunk-delay-ms")]
    pub chunk_delay_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "anthropic".to_string(),
            model: "claude-sonnet-4-20250514".to_string(),
            api_key_env: "ANTHROPIC_API_KEY".to_string(),
            base_url: None,
            max_tokens: 4000,
            timeout_ms: 120_000,
            chunk_size_chars: 15_000,
            retry_count: 3,
            retry_delay_ms: 5_000,
            chunk_delay_ms: 1_000,
        }
    }
}

impl LlmConfig {
    /// Configured base URL, or the public endpoint of the selected provider
    pub fn base_url(&self) -> &str {
        match &self.base_url {
            Some(url) => url,
            None if self.provider.eq_ignore_ascii_case("openai") => "https://api.openai.com",
            None => "https://api.anthropic.com",
        }
    }

    /// Read the API key from the configured environment variable
    pub fn get_api_key(&self) -> Result<String> {
        secret_from_env(&self.api_key_env, "LLM API key")
    }

    /// Retry policy for model calls
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.retry_count, self.retry_delay())
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn chunk_delay(&self) -> Duration {
        Duration::from_millis(self.chunk_delay_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Jira connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JiraConfig {
    /// Site URL, e.g. https://your-domain.atlassian.net
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Account email used for basic auth
    pub username: String,

    /// Environment variable containing the API token
    #[serde(rename = "api-token-env")]
    pub api_token_env: String,

    /// Project the tickets are created in
    #[serde(rename = "project-key")]
    pub project_key: String,

    /// Request timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,

    /// Pause after each created story
    #[serde(rename = "story-pause-ms")]
    pub story_pause_ms: u64,

    /// Pause between epics
    #[serde(rename = "epic-pause-ms")]
    pub epic_pause_ms: u64,
}

impl Default for JiraConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            username: String::new(),
            api_token_env: "JIRA_API_TOKEN".to_string(),
            project_key: String::new(),
            timeout_ms: 30_000,
            story_pause_ms: 100,
            epic_pause_ms: 500,
        }
    }
}

impl JiraConfig {
    /// Read the API token from the configured environment variable
    pub fn get_api_token(&self) -> Result<String> {
        secret_from_env(&self.api_token_env, "Jira API token")
    }

    pub fn validate(&self) -> Result<()> {
        if self.base_url.trim().is_empty() {
            bail!("jira.base-url is required for ticket creation");
        }
        if self.username.trim().is_empty() {
            bail!("jira.username is required for ticket creation");
        }
        if self.project_key.trim().is_empty() {
            bail!("jira.project-key is required for ticket creation");
        }
        self.get_api_token()?;
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn story_pause(&self) -> Duration {
        Duration::from_millis(self.story_pause_ms)
    }

    pub fn epic_pause(&self) -> Duration {
        Duration::from_millis(self.epic_pause_ms)
    }
}

/// Processing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Default mode for `process`
    pub mode: ProcessingMode,

    /// Directory for analysis and summary files
    #[serde(rename = "output-dir")]
    pub output_dir: PathBuf,

    /// Save each chunk's raw result, and the analysis in full mode
    #[serde(rename = "save-intermediate")]
    pub save_intermediate: bool,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            mode: ProcessingMode::Full,
            output_dir: PathBuf::from("./output"),
            save_intermediate: true,
        }
    }
}
