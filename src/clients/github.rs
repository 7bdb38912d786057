//! GitHub issue publisher.

use super::{error_body, http_client, ReportPublisher};
use crate::config::GithubConfig;
use crate::error::PublishError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Issues are created in one call; give it a generous fixed timeout.
const PUBLISH_TIMEOUT_SECONDS: u64 = 60;

#[derive(Debug, Serialize)]
struct CreateIssueRequest<'a> {
    title: &'a str,
    body: &'a str,
}

/// The issue that was created.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PublishedIssue {
    pub number: u64,
    pub html_url: String,
}

/// Creates issues through the GitHub REST API.
pub struct GithubIssuePublisher {
    http: reqwest::Client,
    issues_url: String,
    token: String,
}

impl GithubIssuePublisher {
    pub fn new(
        config: &GithubConfig,
        owner: &str,
        repo: &str,
        token: String,
    ) -> reqwest::Result<Self> {
        Ok(Self {
            http: http_client(PUBLISH_TIMEOUT_SECONDS)?,
            issues_url: issues_url(&config.api_url, owner, repo),
            token,
        })
    }
}

fn issues_url(api_url: &str, owner: &str, repo: &str) -> String {
    format!(
        "{}/repos/{}/{}/issues",
        api_url.trim_end_matches('/'),
        owner,
        repo
    )
}

/// Issue title: the fixed label followed by the run timestamp.
pub fn issue_title(label: &str, at: DateTime<Utc>) -> String {
    format!("{}: {}", label, at.to_rfc2822())
}

#[async_trait]
impl ReportPublisher for GithubIssuePublisher {
    async fn publish(&self, title: &str, body: &str) -> Result<PublishedIssue, PublishError> {
        debug!("Creating issue at {} ({} bytes)", self.issues_url, body.len());

        let response = self
            .http
            .post(&self.issues_url)
            .bearer_auth(&self.token)
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28")
            .json(&CreateIssueRequest { title, body })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = error_body(response).await;
            return Err(PublishError::Status { status, body });
        }

        Ok(response.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_issues_url() {
        assert_eq!(
            issues_url("https://api.github.com/", "octo", "site"),
            "https://api.github.com/repos/octo/site/issues"
        );
    }

    #[test]
    fn test_issue_title() {
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 12, 30, 0).unwrap();
        let title = issue_title("User Experience Report 📝", at);
        assert!(title.starts_with("User Experience Report 📝: Sun, "));
        assert!(title.contains("Mar 2026 12:30:00"));
    }

    #[test]
    fn test_published_issue_decodes() {
        let issue: PublishedIssue = serde_json::from_str(
            r#"{"id": 1, "number": 42, "html_url": "https://github.com/octo/site/issues/42"}"#,
        )
        .unwrap();
        assert_eq!(issue.number, 42);
    }
}
