//! UXReport - user experience reports filed as GitHub issues
//!
//! A CI step that audits a list of URLs with PageSpeed Insights, sends the
//! metrics to a scoring service and files one consolidated issue.
//!
//! Exit codes:
//!   0 - Success (issue created, or body rendered in --dry-run)
//!   1 - Run failure (configuration, aborted run, no reports, publish failure)
//!   2 - Issue created, but some URLs were excluded after failing
//!       (only with --fail-on-excluded; otherwise 0 with a warning)

mod analysis;
mod cli;
mod clients;
mod config;
mod error;
mod models;
mod report;

use analysis::{AggregateOptions, RunOutcome, Services};
use anyhow::{Context, Result};
use chrono::Utc;
use cli::Args;
use clients::{GithubIssuePublisher, PageSpeedClient, ReportPublisher, ScoringClient};
use config::{Config, Secrets, CONFIG_FILE};
use error::RunError;
use indicatif::{ProgressBar, ProgressStyle};
use report::RenderOptions;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Where the body goes when publishing fails and no --output was given.
const UNPUBLISHED_BODY_FILE: &str = "uxreport_unpublished.html";

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    init_logging(&args);

    info!("UXReport v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    match run_report(args).await {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Run failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .uxreport.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(CONFIG_FILE);

    if path.exists() {
        eprintln!("⚠️  {} already exists. Remove it first or edit it manually.", CONFIG_FILE);
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content).with_context(|| format!("Failed to write {}", CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE);
    println!("   Edit it to set URLs, endpoints, the failure policy and more.");
    Ok(())
}

/// Initialize logging. `RUST_LOG` overrides the verbosity flags.
fn init_logging(args: &Args) {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(args.log_level()).into())
        .from_env_lossy();

    // Logs go to stderr so a dry-run body on stdout stays clean.
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

/// Run the complete report workflow. Returns exit code (0 or 2).
async fn run_report(args: Args) -> Result<i32> {
    let start_time = Instant::now();

    let mut config = load_config(&args, Path::new("."))?;
    config.merge_with_args(&args);

    let targets = config.targets()?;
    let secrets = Secrets::from_env(!args.dry_run)?;

    let publisher: Option<Arc<dyn ReportPublisher>> = if args.dry_run {
        None
    } else {
        let (owner, repo) = config.repository()?;
        let token = secrets.github_token.clone().unwrap_or_default();
        info!("Issues will be filed in {}/{}", owner, repo);
        Some(Arc::new(
            GithubIssuePublisher::new(&config.github, &owner, &repo, token)
                .context("Failed to create GitHub client")?,
        ))
    };

    let services = Services {
        audit: Arc::new(
            PageSpeedClient::new(&config.audit, secrets.audit_key.clone())
                .context("Failed to create PageSpeed client")?,
        ),
        scoring: Arc::new(
            ScoringClient::new(&config.scoring).context("Failed to create scoring client")?,
        ),
        publisher,
    };

    println!("🔎 Auditing {} URL(s):", targets.len());
    for target in &targets {
        println!("   {}. {}", target.index + 1, target.url);
    }

    let options = AggregateOptions {
        policy: config.general.failure_policy,
        concurrency: config.general.concurrency,
        score_threshold: config.report.score_threshold,
        progress: progress_bar(args.quiet),
    };
    let render = RenderOptions::from(&config.report);
    let title = clients::github::issue_title(&config.github.title_label, Utc::now());

    let outcome = match analysis::run(&targets, &services, &title, &options, &render).await {
        Ok(outcome) => outcome,
        Err(RunError::Publish { source, body }) => {
            let path = config
                .general
                .output
                .clone()
                .unwrap_or_else(|| PathBuf::from(UNPUBLISHED_BODY_FILE));
            match write_body(&path, &body) {
                Ok(()) => warn!("Rendered report kept at {}", path.display()),
                Err(e) => warn!("Could not keep rendered report: {:#}", e),
            }
            return Err(source).context("Failed to create the report issue");
        }
        Err(e) => return Err(e.into()),
    };

    if let Some(ref path) = config.general.output {
        write_body(path, &outcome.body)?;
        info!("Report body written to {}", path.display());
    }

    if args.dry_run {
        println!("{}", outcome.body);
    }

    print_summary(&outcome, targets.len(), start_time.elapsed().as_secs_f64());

    if !outcome.failures.is_empty() {
        eprintln!(
            "\n⚠️  {} URL(s) were excluded from the report.",
            outcome.failures.len()
        );
    }

    Ok(exit_code(outcome.failures.len(), config.general.fail_on_excluded))
}

/// Exit code for a run that got as far as rendering (and publishing).
fn exit_code(excluded: usize, fail_on_excluded: bool) -> i32 {
    if excluded > 0 && fail_on_excluded {
        2
    } else {
        0
    }
}

fn print_summary(outcome: &RunOutcome, total: usize, duration: f64) {
    println!("\n📊 Summary:");
    println!("   Reported: {}/{}", outcome.reports, total);
    for failure in &outcome.failures {
        println!("   - ⛔ {}: {}", failure.url, failure.error);
    }
    println!("   Duration: {:.1}s", duration);

    match outcome.issue {
        Some(ref issue) => println!("\n✅ Issue #{} created: {}", issue.number, issue.html_url),
        None => println!("\n✅ Dry run complete. No issue was created."),
    }
}

fn progress_bar(quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }

    let pb = ProgressBar::new(0);
    match ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} URLs")
    {
        Ok(style) => pb.set_style(style.progress_chars("#>-")),
        Err(e) => debug!("Falling back to default progress style: {}", e),
    }
    pb
}

fn write_body(path: &Path, body: &str) -> Result<()> {
    std::fs::write(path, body)
        .with_context(|| format!("Failed to write report to {}", path.display()))
}

/// Load configuration from file or use defaults.
///
/// Defaults apply only when no config file exists. A file that is present
/// but unreadable stops the run before any URL is audited.
fn load_config(args: &Args, dir: &Path) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_from_dir(dir).context("Invalid default config")? {
        Some(config) => {
            info!("Loaded default config from {}", CONFIG_FILE);
            Ok(config)
        }
        None => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code_partial_run() {
        assert_eq!(exit_code(0, false), 0);
        assert_eq!(exit_code(0, true), 0);
        assert_eq!(exit_code(2, false), 0);
        assert_eq!(exit_code(2, true), 2);
    }

    #[test]
    fn test_load_config_defaults_without_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(&Args::default(), dir.path()).unwrap();
        assert_eq!(config.targets().unwrap().len(), 3);
    }

    #[test]
    fn test_load_config_broken_file_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            "[general\nurls = \"https://mine.test\"",
        )
        .unwrap();

        let err = load_config(&Args::default(), dir.path()).unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to parse config file"));
    }

    #[test]
    fn test_load_config_explicit_path_missing() {
        let dir = tempfile::tempdir().unwrap();
        let args = Args {
            config: Some(dir.path().join("missing.toml")),
            ..Args::default()
        };
        assert!(load_config(&args, dir.path()).is_err());
    }
}
