//! Configuration file handling.
//!
//! This module handles loading `.uxreport.toml`, merging it with CLI
//! arguments and reading the secrets the run needs from the environment.

use crate::analysis::FailurePolicy;
use crate::error::{ConfigError, PSI_KEY_LINK};
use crate::models::Target;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default configuration file name.
pub const CONFIG_FILE: &str = ".uxreport.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Audit provider settings.
    #[serde(default)]
    pub audit: AuditConfig,

    /// Scoring service settings.
    #[serde(default)]
    pub scoring: ScoringConfig,

    /// Issue tracker settings.
    #[serde(default)]
    pub github: GithubConfig,

    /// Report rendering settings.
    #[serde(default)]
    pub report: ReportConfig,
}

/// General run settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Delimited list of URLs to audit.
    #[serde(default = "default_urls")]
    pub urls: String,

    /// Delimiter used to split `urls`.
    #[serde(default = "default_splitter")]
    pub splitter: String,

    /// What to do when one target's pipeline fails.
    #[serde(default)]
    pub failure_policy: FailurePolicy,

    /// Maximum number of pipelines in flight.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Also write the rendered body to this file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<PathBuf>,

    /// Exit with code 2 when some targets were excluded.
    #[serde(default)]
    pub fail_on_excluded: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            urls: default_urls(),
            splitter: default_splitter(),
            failure_policy: FailurePolicy::default(),
            concurrency: default_concurrency(),
            output: None,
            fail_on_excluded: false,
        }
    }
}

fn default_urls() -> String {
    "https://evaly.com.bd,https://www.pickaboo.com,https://www.daraz.com.bd/".to_string()
}

fn default_splitter() -> String {
    ",".to_string()
}

fn default_concurrency() -> usize {
    8
}

/// PageSpeed Insights settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    /// runPagespeed endpoint.
    #[serde(default = "default_audit_endpoint")]
    pub endpoint: String,

    /// Optional `strategy` query parameter (mobile or desktop).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<String>,

    /// Request timeout in seconds.
    #[serde(default = "default_audit_timeout")]
    pub timeout_seconds: u64,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            endpoint: default_audit_endpoint(),
            strategy: None,
            timeout_seconds: default_audit_timeout(),
        }
    }
}

fn default_audit_endpoint() -> String {
    "https://pagespeedonline.googleapis.com/pagespeedonline/v5/runPagespeed".to_string()
}

fn default_audit_timeout() -> u64 {
    120 // a full Lighthouse run regularly takes over a minute
}

/// Scoring service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    #[serde(default = "default_scoring_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_scoring_timeout")]
    pub timeout_seconds: u64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            endpoint: default_scoring_endpoint(),
            timeout_seconds: default_scoring_timeout(),
        }
    }
}

fn default_scoring_endpoint() -> String {
    "https://uxability-api.herokuapp.com/api/reports/findByIssue".to_string()
}

fn default_scoring_timeout() -> u64 {
    60
}

/// GitHub issue settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GithubConfig {
    /// REST API base URL.
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Repository slug (`owner/name`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository: Option<String>,

    /// Fixed label at the start of the issue title.
    #[serde(default = "default_title_label")]
    pub title_label: String,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            repository: None,
            title_label: default_title_label(),
        }
    }
}

fn default_api_url() -> String {
    "https://api.github.com".to_string()
}

fn default_title_label() -> String {
    "User Experience Report 📝".to_string()
}

/// Report rendering settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Scores below this get the congratulatory callout.
    #[serde(default = "default_score_threshold")]
    pub score_threshold: f64,

    /// Image shown in the congratulatory callout.
    #[serde(default = "default_celebration_image")]
    pub celebration_image: String,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            score_threshold: default_score_threshold(),
            celebration_image: default_celebration_image(),
        }
    }
}

fn default_score_threshold() -> f64 {
    4300.0
}

fn default_celebration_image() -> String {
    "https://p7.hiclipart.com/preview/534/433/205/doraemon-animation-clip-art-doraemon.jpg"
        .to_string()
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load `.uxreport.toml` from a directory.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_from_dir(dir: &Path) -> Result<Option<Self>> {
        let config_path = dir.join(CONFIG_FILE);

        if config_path.exists() {
            Ok(Some(Self::load(&config_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments (and their env fallbacks) take precedence, but only
    /// when they were actually provided.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref urls) = args.urls {
            if !urls.trim().is_empty() {
                self.general.urls = urls.clone();
            }
        }
        if let Some(ref splitter) = args.splitter {
            if !splitter.is_empty() {
                self.general.splitter = splitter.clone();
            }
        }
        if let Some(policy) = args.failure_policy {
            self.general.failure_policy = policy;
        }
        if let Some(concurrency) = args.concurrency {
            self.general.concurrency = concurrency;
        }
        if let Some(ref output) = args.output {
            self.general.output = Some(output.clone());
        }
        if args.fail_on_excluded {
            self.general.fail_on_excluded = true;
        }

        // One timeout flag covers both external calls
        if let Some(timeout) = args.timeout {
            self.audit.timeout_seconds = timeout;
            self.scoring.timeout_seconds = timeout;
        }

        if let Some(ref repository) = args.repository {
            self.github.repository = Some(repository.clone());
        }
    }

    /// The ordered targets for this run.
    pub fn targets(&self) -> Result<Vec<Target>, ConfigError> {
        let targets = Target::parse_list(&self.general.urls, &self.general.splitter);
        if targets.is_empty() {
            return Err(ConfigError::NoTargets);
        }
        Ok(targets)
    }

    /// The repository to file the issue in, as `(owner, name)`.
    pub fn repository(&self) -> Result<(String, String), ConfigError> {
        let slug = self
            .github
            .repository
            .as_deref()
            .ok_or(ConfigError::MissingRepository)?;
        parse_repository(slug)
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

/// Split an `owner/name` slug.
pub fn parse_repository(slug: &str) -> Result<(String, String), ConfigError> {
    match slug.trim().split_once('/') {
        Some((owner, name))
            if !owner.is_empty() && !name.is_empty() && !name.contains('/') =>
        {
            Ok((owner.to_string(), name.to_string()))
        }
        _ => Err(ConfigError::InvalidRepository(slug.to_string())),
    }
}

/// API tokens read from the process environment.
#[derive(Clone)]
pub struct Secrets {
    /// PageSpeed Insights API key (`GC_TOKEN`).
    pub audit_key: String,
    /// GitHub token (`GH_TOKEN`); absent in dry runs.
    pub github_token: Option<String>,
}

impl std::fmt::Debug for Secrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Secrets")
            .field("audit_key", &"***")
            .field("github_token", &self.github_token.as_ref().map(|_| "***"))
            .finish()
    }
}

impl Secrets {
    pub const AUDIT_KEY_VAR: &'static str = "GC_TOKEN";
    pub const GITHUB_TOKEN_VAR: &'static str = "GH_TOKEN";

    /// Read secrets from the environment.
    ///
    /// The GitHub token is only required when an issue will be created.
    pub fn from_env(require_github: bool) -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok(), require_github)
    }

    fn from_lookup<F>(lookup: F, require_github: bool) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let audit_key = read(Self::AUDIT_KEY_VAR).ok_or_else(|| ConfigError::MissingSecret {
            name: Self::AUDIT_KEY_VAR,
            hint: format!(
                "Please set a Google Cloud token as a secret. To get a key, visit: {}",
                PSI_KEY_LINK
            ),
        })?;

        let github_token = read(Self::GITHUB_TOKEN_VAR);
        if require_github && github_token.is_none() {
            return Err(ConfigError::MissingSecret {
                name: Self::GITHUB_TOKEN_VAR,
                hint: "A token with permission to create issues is required.".to_string(),
            });
        }

        Ok(Self {
            audit_key,
            github_token,
        })
    }
}
