//! Scoring service client.

use super::{error_body, http_client, ScoringService};
use crate::config::ScoringConfig;
use crate::error::PipelineError;
use crate::models::{AuditMetrics, ScoringResult};
use async_trait::async_trait;
use serde::Deserialize;

/// Response envelope: `{ "report": { "userExperienceScore", "impact" } }`.
#[derive(Debug, Deserialize)]
struct ScoringResponse {
    report: ScoringResult,
}

/// Posts audit metrics to the scoring endpoint.
pub struct ScoringClient {
    http: reqwest::Client,
    endpoint: String,
}

impl ScoringClient {
    pub fn new(config: &ScoringConfig) -> reqwest::Result<Self> {
        Ok(Self {
            http: http_client(config.timeout_seconds)?,
            endpoint: config.endpoint.clone(),
        })
    }
}

#[async_trait]
impl ScoringService for ScoringClient {
    async fn score(&self, metrics: &AuditMetrics) -> Result<ScoringResult, PipelineError> {
        let response = self
            .http
            .post(&self.endpoint)
            .json(metrics)
            .send()
            .await
            .map_err(PipelineError::Scoring)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = error_body(response).await;
            return Err(PipelineError::ScoringStatus { status, body });
        }

        let bytes = response.bytes().await.map_err(PipelineError::Scoring)?;
        parse_response(&bytes)
    }
}

fn parse_response(bytes: &[u8]) -> Result<ScoringResult, PipelineError> {
    serde_json::from_slice::<ScoringResponse>(bytes)
        .map(|r| r.report)
        .map_err(|e| PipelineError::Decode(format!("scoring response: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_response() {
        let body = br#"{
            "report": {
                "userExperienceScore": 4212.7,
                "impact": {
                    "bounceRate": { "firstContentfulPaint": 12.5, "timeToInteractive": 3 },
                    "conversionRate": { "firstContentfulPaint": -1.2 }
                }
            }
        }"#;

        let result = parse_response(body).unwrap();
        assert_eq!(result.user_experience_score, 4212.7);
        assert_eq!(result.impact.categories().len(), 2);
        assert_eq!(result.impact.categories()[1].name, "conversionRate");
    }

    #[test]
    fn test_parse_response_missing_report() {
        let err = parse_response(br#"{"message":"not found"}"#).unwrap_err();
        assert!(matches!(err, PipelineError::Decode(_)));
    }
}
