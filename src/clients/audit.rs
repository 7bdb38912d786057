//! PageSpeed Insights audit provider.

use super::{error_body, http_client, AuditProvider};
use crate::config::AuditConfig;
use crate::error::PipelineError;
use crate::models::AuditMetrics;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::debug;

/// runPagespeed response, reduced to the parts we read.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageSpeedResponse {
    lighthouse_result: LighthouseResult,
}

#[derive(Debug, Deserialize)]
struct LighthouseResult {
    #[serde(default)]
    audits: HashMap<String, LighthouseAudit>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LighthouseAudit {
    #[serde(default)]
    numeric_value: Option<f64>,
}

/// Client for the PageSpeed Insights v5 API.
pub struct PageSpeedClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    strategy: Option<String>,
}

impl PageSpeedClient {
    pub fn new(config: &AuditConfig, api_key: String) -> reqwest::Result<Self> {
        Ok(Self {
            http: http_client(config.timeout_seconds)?,
            endpoint: config.endpoint.clone(),
            api_key,
            strategy: config.strategy.clone(),
        })
    }
}

#[async_trait]
impl AuditProvider for PageSpeedClient {
    async fn audit(&self, url: &str) -> Result<AuditMetrics, PipelineError> {
        let mut query: Vec<(&str, &str)> = vec![("key", self.api_key.as_str()), ("url", url)];
        if let Some(ref strategy) = self.strategy {
            query.push(("strategy", strategy.as_str()));
        }

        debug!("Requesting PageSpeed audit for {}", url);

        let response = self
            .http
            .get(&self.endpoint)
            .query(&query)
            .send()
            .await
            .map_err(PipelineError::Audit)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = error_body(response).await;
            return Err(PipelineError::AuditStatus { status, body });
        }

        let parsed: PageSpeedResponse = response
            .json()
            .await
            .map_err(|e| PipelineError::Decode(format!("PageSpeed response: {}", e)))?;

        extract_metrics(&parsed)
    }
}

/// Pull the nine scored metrics out of the Lighthouse audits by key.
fn extract_metrics(response: &PageSpeedResponse) -> Result<AuditMetrics, PipelineError> {
    let audits = &response.lighthouse_result.audits;
    let value = |key: &'static str| {
        audits
            .get(key)
            .and_then(|audit| audit.numeric_value)
            .ok_or(PipelineError::MissingMetric(key))
    };

    Ok(AuditMetrics {
        first_contentful_paint: value("first-contentful-paint")?,
        time_to_interactive: value("interactive")?,
        server_response_time: value("server-response-time")?,
        boot_up_time: value("bootup-time")?,
        first_meaningful_paint: value("first-meaningful-paint")?,
        total_blocking_time: value("total-blocking-time")?,
        total_byte_weight: value("total-byte-weight")?,
        first_cpu_idle: value("first-cpu-idle")?,
        largest_contentful_paint: value("largest-contentful-paint")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fixture() -> serde_json::Value {
        json!({
            "id": "https://a.test/",
            "lighthouseResult": {
                "audits": {
                    "first-contentful-paint": { "numericValue": 1200.5, "score": 0.9 },
                    "interactive": { "numericValue": 3400.0 },
                    "server-response-time": { "numericValue": 210 },
                    "bootup-time": { "numericValue": 800.25 },
                    "first-meaningful-paint": { "numericValue": 1300 },
                    "total-blocking-time": { "numericValue": 150 },
                    "total-byte-weight": { "numericValue": 1048576 },
                    "first-cpu-idle": { "numericValue": 3000 },
                    "largest-contentful-paint": { "numericValue": 2500 },
                    "uses-http2": { "score": 1 }
                }
            }
        })
    }

    #[test]
    fn test_extract_metrics() {
        let response: PageSpeedResponse = serde_json::from_value(fixture()).unwrap();
        let metrics = extract_metrics(&response).unwrap();

        assert_eq!(metrics.first_contentful_paint, 1200.5);
        assert_eq!(metrics.time_to_interactive, 3400.0);
        assert_eq!(metrics.boot_up_time, 800.25);
        assert_eq!(metrics.total_byte_weight, 1048576.0);
        assert_eq!(metrics.largest_contentful_paint, 2500.0);
    }

    #[test]
    fn test_extract_metrics_missing_value() {
        let mut raw = fixture();
        raw["lighthouseResult"]["audits"]["bootup-time"] = json!({ "score": null });
        let response: PageSpeedResponse = serde_json::from_value(raw).unwrap();

        match extract_metrics(&response) {
            Err(PipelineError::MissingMetric(key)) => assert_eq!(key, "bootup-time"),
            other => panic!("expected missing metric, got {:?}", other),
        }
    }

    #[test]
    fn test_response_without_lighthouse_result_fails_to_decode() {
        let parsed: Result<PageSpeedResponse, _> =
            serde_json::from_value(json!({ "error": { "code": 400 } }));
        assert!(parsed.is_err());
    }
}
