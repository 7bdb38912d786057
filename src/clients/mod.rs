//! Clients for the external services a run talks to.
//!
//! The aggregator and the publish step only see the traits below, so tests
//! can swap in in-memory fakes.

pub mod audit;
pub mod github;
pub mod scoring;

pub use audit::PageSpeedClient;
pub use github::{GithubIssuePublisher, PublishedIssue};
pub use scoring::ScoringClient;

use crate::error::{PipelineError, PublishError};
use crate::models::{AuditMetrics, ScoringResult};
use async_trait::async_trait;

/// Produces performance metrics for a URL.
#[async_trait]
pub trait AuditProvider: Send + Sync {
    async fn audit(&self, url: &str) -> Result<AuditMetrics, PipelineError>;
}

/// Turns audit metrics into a score and impact breakdown.
#[async_trait]
pub trait ScoringService: Send + Sync {
    async fn score(&self, metrics: &AuditMetrics) -> Result<ScoringResult, PipelineError>;
}

/// Files the rendered report.
#[async_trait]
pub trait ReportPublisher: Send + Sync {
    async fn publish(&self, title: &str, body: &str) -> Result<PublishedIssue, PublishError>;
}

/// Build a reqwest client with a per-request timeout.
pub(crate) fn http_client(timeout_seconds: u64) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_seconds))
        .user_agent(concat!("uxreport/", env!("CARGO_PKG_VERSION")))
        .build()
}

/// Read a non-success response body for error messages.
pub(crate) async fn error_body(response: reqwest::Response) -> String {
    let body = response.text().await.unwrap_or_default();
    if body.len() > 500 {
        let mut end = 500;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &body[..end])
    } else {
        body
    }
}
