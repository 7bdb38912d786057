//! Error types for the report run.
//!
//! Errors are split by where they happen: configuration (fatal before any
//! pipeline starts), per-target pipeline failures, aggregation outcomes and
//! the final publish call.

use reqwest::StatusCode;
use thiserror::Error;

/// Link shown when the PageSpeed Insights key is missing.
pub const PSI_KEY_LINK: &str = "https://developers.google.com/speed/docs/insights/v5/get-started#key";

/// Configuration errors. None of these are retried.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required secret is not set in the environment.
    #[error("environment variable {name} is not set. {hint}")]
    MissingSecret { name: &'static str, hint: String },

    /// The URL list produced no targets.
    #[error("at least one URL is required to render a report")]
    NoTargets,

    /// The repository slug is not `owner/name`.
    #[error("repository must look like 'owner/name', got '{0}'")]
    InvalidRepository(String),

    /// No repository configured for publishing.
    #[error("no repository configured; pass --repository or set GITHUB_REPOSITORY")]
    MissingRepository,
}

/// Failure of one target's audit -> scoring pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("audit request failed: {0}")]
    Audit(#[source] reqwest::Error),

    #[error("audit provider returned {status}: {body}")]
    AuditStatus { status: StatusCode, body: String },

    #[error("audit response has no numeric value for '{0}'")]
    MissingMetric(&'static str),

    #[error("scoring request failed: {0}")]
    Scoring(#[source] reqwest::Error),

    #[error("scoring service returned {status}: {body}")]
    ScoringStatus { status: StatusCode, body: String },

    #[error("failed to decode response: {0}")]
    Decode(String),

    #[error("pipeline task panicked")]
    Panicked,
}

/// Why aggregation did not produce a report set.
#[derive(Debug, Error)]
pub enum AggregateError {
    /// Abort policy: the first failing target stops the run.
    #[error("target #{index} ({url}) failed, aborting run: {source}")]
    Aborted {
        index: usize,
        url: String,
        #[source]
        source: PipelineError,
    },

    /// Exclude policy: every target failed.
    #[error("no target produced a report ({failed} failed)")]
    NoReports { failed: usize },

    /// The completion signal was dropped before it fired.
    #[error("aggregation ended without a completion signal")]
    Interrupted,
}

/// Failure of the issue-creation call.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("issue request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("issue tracker returned {status}: {body}")]
    Status { status: StatusCode, body: String },
}

/// Run-level failure after configuration succeeded.
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Aggregate(#[from] AggregateError),

    /// The body was rendered but could not be filed; it is kept for diagnostics.
    #[error("failed to publish report: {source}")]
    Publish {
        #[source]
        source: PublishError,
        body: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_secret_message_names_variable() {
        let err = ConfigError::MissingSecret {
            name: "GC_TOKEN",
            hint: format!("To get a key, visit: {}", PSI_KEY_LINK),
        };
        let msg = err.to_string();
        assert!(msg.contains("GC_TOKEN"));
        assert!(msg.contains(PSI_KEY_LINK));
    }

    #[test]
    fn test_aborted_message_carries_target() {
        let err = AggregateError::Aborted {
            index: 1,
            url: "https://b.test".to_string(),
            source: PipelineError::MissingMetric("interactive"),
        };
        let msg = err.to_string();
        assert!(msg.contains("#1"));
        assert!(msg.contains("https://b.test"));
        assert!(msg.contains("interactive"));
    }
}
