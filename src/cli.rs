//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap. Most inputs
//! also accept the environment variables a CI runner sets, so the binary
//! can run as a workflow step without flags.

use crate::analysis::FailurePolicy;
use crate::config::parse_repository;
use clap::Parser;
use std::path::PathBuf;

/// UXReport - user experience reports for your pages, filed as GitHub issues
///
/// Audits each URL with PageSpeed Insights, scores the result, and files
/// one consolidated issue with a table per URL.
///
/// Secrets are read from GC_TOKEN (PageSpeed API key) and GH_TOKEN
/// (GitHub token with issue write access).
///
/// Examples:
///   uxreport --urls https://a.test,https://b.test --repository owner/site
///   uxreport --urls "https://a.test|https://b.test" --splitter "|"
///   uxreport --dry-run --output report.html
///   uxreport --init-config
#[derive(Parser, Debug, Clone, Default)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// URLs to audit, separated by the splitter
    ///
    /// Defaults to the config file value, or three sample URLs.
    #[arg(short, long, value_name = "URLS", env = "INPUT_URLS")]
    pub urls: Option<String>,

    /// Delimiter between URLs (default ",")
    ///
    /// An empty value counts as unset, since CI runners export undeclared
    /// inputs as empty strings.
    #[arg(short, long, value_name = "DELIM", env = "INPUT_SPLITTER")]
    pub splitter: Option<String>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .uxreport.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Repository to file the issue in (owner/name)
    #[arg(long, value_name = "OWNER/NAME", env = "GITHUB_REPOSITORY")]
    pub repository: Option<String>,

    /// What to do when a URL cannot be audited or scored
    ///
    /// exclude: leave it out of the report. abort: fail the run, file nothing.
    #[arg(long, value_name = "POLICY")]
    pub failure_policy: Option<FailurePolicy>,

    /// Maximum number of URLs processed at once
    #[arg(long, value_name = "NUM")]
    pub concurrency: Option<usize>,

    /// Timeout in seconds for each audit and scoring request
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Also write the rendered report body to this file
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Exit with code 2 when some URLs were excluded from the filed report
    ///
    /// Without this flag a partial report still exits 0, with a warning.
    #[arg(long)]
    pub fail_on_excluded: bool,

    /// Render the report and print it instead of creating an issue
    #[arg(long)]
    pub dry_run: bool,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Generate a default .uxreport.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        if self.init_config {
            return Ok(());
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if self.concurrency == Some(0) {
            return Err("Concurrency must be at least 1".to_string());
        }

        if self.timeout == Some(0) {
            return Err("Timeout must be at least 1 second".to_string());
        }

        if let Some(ref repository) = self.repository {
            parse_repository(repository).map_err(|e| e.to_string())?;
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn test_parse_flags() {
        let args = Args::try_parse_from([
            "uxreport",
            "--urls",
            "https://a.test;https://b.test",
            "--splitter",
            ";",
            "--failure-policy",
            "abort",
            "--concurrency",
            "2",
            "--dry-run",
        ])
        .unwrap();

        assert_eq!(args.urls.as_deref(), Some("https://a.test;https://b.test"));
        assert_eq!(args.splitter.as_deref(), Some(";"));
        assert_eq!(args.failure_policy, Some(FailurePolicy::Abort));
        assert_eq!(args.concurrency, Some(2));
        assert!(args.dry_run);
    }

    #[test]
    fn test_rejects_unknown_policy() {
        assert!(Args::try_parse_from(["uxreport", "--failure-policy", "retry"]).is_err());
    }

    #[test]
    fn test_validation_conflicting_options() {
        let args = Args {
            verbose: true,
            quiet: true,
            ..Args::default()
        };
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_limits() {
        let zero_concurrency = Args {
            concurrency: Some(0),
            ..Args::default()
        };
        assert!(zero_concurrency.validate().is_err());

        let zero_timeout = Args {
            timeout: Some(0),
            ..Args::default()
        };
        assert!(zero_timeout.validate().is_err());
    }

    #[test]
    fn test_empty_action_inputs_fall_back_to_defaults() {
        std::env::set_var("INPUT_SPLITTER", "");
        std::env::set_var("INPUT_URLS", "");
        let parsed = Args::try_parse_from(["uxreport"]);
        std::env::remove_var("INPUT_SPLITTER");
        std::env::remove_var("INPUT_URLS");

        let args = parsed.unwrap();
        assert_eq!(args.splitter.as_deref(), Some(""));
        assert!(args.validate().is_ok());

        let mut config = Config::default();
        config.merge_with_args(&args);
        assert_eq!(config.general.splitter, ",");
        assert_eq!(config.targets().unwrap().len(), 3);
    }

    #[test]
    fn test_validation_repository() {
        let bad = Args {
            repository: Some("not-a-slug".to_string()),
            ..Args::default()
        };
        assert!(bad.validate().is_err());

        let good = Args {
            repository: Some("octo/site".to_string()),
            ..Args::default()
        };
        assert!(good.validate().is_ok());
    }

    #[test]
    fn test_log_level() {
        let mut args = Args::default();
        assert_eq!(args.log_level(), tracing::Level::INFO);

        args.verbose = true;
        assert_eq!(args.log_level(), tracing::Level::DEBUG);

        args.verbose = false;
        args.quiet = true;
        assert_eq!(args.log_level(), tracing::Level::ERROR);
    }
}
