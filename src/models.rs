//! Data models for the user experience report.
//!
//! This module contains the per-target data that flows through a run:
//! targets, the audit metrics extracted for them, the scoring result and
//! the finished report that ends up in the rendered issue body.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// One URL to be audited, identified by its position in the input list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    /// Position in the configured URL list.
    pub index: usize,
    /// The URL itself.
    pub url: String,
}

impl Target {
    pub fn new(index: usize, url: impl Into<String>) -> Self {
        Self {
            index,
            url: url.into(),
        }
    }

    /// Split a delimited URL list into indexed targets.
    ///
    /// Entries are trimmed and empty pieces are dropped; indices are
    /// assigned after filtering so they stay contiguous.
    pub fn parse_list(urls: &str, splitter: &str) -> Vec<Target> {
        if splitter.is_empty() {
            let url = urls.trim();
            if url.is_empty() {
                return Vec::new();
            }
            return vec![Target::new(0, url)];
        }

        urls.split(splitter)
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .enumerate()
            .map(|(index, url)| Target::new(index, url))
            .collect()
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} {}", self.index, self.url)
    }
}

/// The nine performance metrics sent to the scoring service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditMetrics {
    pub first_contentful_paint: f64,
    pub time_to_interactive: f64,
    pub server_response_time: f64,
    pub boot_up_time: f64,
    pub first_meaningful_paint: f64,
    pub total_blocking_time: f64,
    pub total_byte_weight: f64,
    pub first_cpu_idle: f64,
    pub largest_contentful_paint: f64,
}

/// Metrics under one impact category, in provider order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ImpactCategory {
    pub name: String,
    pub metrics: Vec<(String, Value)>,
}

impl ImpactCategory {
    /// Look up a metric value by name.
    pub fn get(&self, metric: &str) -> Option<&Value> {
        self.metrics
            .iter()
            .find(|(name, _)| name == metric)
            .map(|(_, value)| value)
    }
}

impl fmt::Display for ImpactCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:", self.name)?;
        for (i, (metric, value)) in self.metrics.iter().enumerate() {
            let sep = if i == 0 { " " } else { ", " };
            write!(f, "{}{}={}", sep, metric, value)?;
        }
        Ok(())
    }
}

/// Two-level impact mapping: category -> metric -> value.
///
/// Categories and metric names are defined by the scoring service and only
/// discovered when the response arrives, so insertion order is kept.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(try_from = "Option<Map<String, Value>>")]
pub struct Impact {
    categories: Vec<ImpactCategory>,
}

impl Impact {
    pub fn categories(&self) -> &[ImpactCategory] {
        &self.categories
    }
}

impl TryFrom<Option<Map<String, Value>>> for Impact {
    type Error = String;

    fn try_from(map: Option<Map<String, Value>>) -> Result<Self, Self::Error> {
        // A null impact renders as an empty table.
        let Some(map) = map else {
            return Ok(Self::default());
        };

        let mut categories = Vec::with_capacity(map.len());

        for (name, metrics) in map {
            let metrics = match metrics {
                Value::Object(metrics) => metrics.into_iter().collect(),
                // A category without a breakdown still gets a row.
                Value::Null => Vec::new(),
                other => {
                    return Err(format!(
                        "impact category '{}' must be an object, got {}",
                        name, other
                    ))
                }
            };
            categories.push(ImpactCategory { name, metrics });
        }

        Ok(Self { categories })
    }
}

/// Score and impact breakdown returned by the scoring service.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoringResult {
    pub user_experience_score: f64,
    #[serde(default)]
    pub impact: Impact,
}

/// The finished result for one target.
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub index: usize,
    pub url: String,
    pub impact: Impact,
    pub score: f64,
}

impl Report {
    pub fn new(target: &Target, result: ScoringResult) -> Self {
        Self {
            index: target.index,
            url: target.url.clone(),
            impact: result.impact,
            score: result.user_experience_score,
        }
    }
}

/// All reports of one run, ordered by target index.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReportSet {
    reports: Vec<Report>,
}

impl ReportSet {
    /// Build from an index-addressed arena, skipping empty slots.
    pub fn from_slots(slots: Vec<Option<Report>>) -> Self {
        Self {
            reports: slots.into_iter().flatten().collect(),
        }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Report> {
        self.reports.iter()
    }

    pub fn len(&self) -> usize {
        self.reports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }

    /// Target indices in output order.
    pub fn indices(&self) -> Vec<usize> {
        self.reports.iter().map(|r| r.index).collect()
    }
}

impl<'a> IntoIterator for &'a ReportSet {
    type Item = &'a Report;
    type IntoIter = std::slice::Iter<'a, Report>;

    fn into_iter(self) -> Self::IntoIter {
        self.reports.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_list_default_splitter() {
        let targets = Target::parse_list("https://a.test,https://b.test", ",");
        assert_eq!(
            targets,
            vec![
                Target::new(0, "https://a.test"),
                Target::new(1, "https://b.test")
            ]
        );
    }

    #[test]
    fn test_parse_list_trims_and_skips_empty() {
        let targets = Target::parse_list(" https://a.test | |https://b.test |", "|");
        assert_eq!(targets.len(), 2);
        assert_eq!(targets[1], Target::new(1, "https://b.test"));
    }

    #[test]
    fn test_parse_list_empty() {
        assert!(Target::parse_list("", ",").is_empty());
        assert!(Target::parse_list("  ", "").is_empty());
    }

    #[test]
    fn test_audit_metrics_field_names() {
        let metrics = AuditMetrics {
            first_contentful_paint: 1.0,
            time_to_interactive: 2.0,
            server_response_time: 3.0,
            boot_up_time: 4.0,
            first_meaningful_paint: 5.0,
            total_blocking_time: 6.0,
            total_byte_weight: 7.0,
            first_cpu_idle: 8.0,
            largest_contentful_paint: 9.0,
        };
        let value = serde_json::to_value(&metrics).unwrap();
        let obj = value.as_object().unwrap();

        assert_eq!(obj.len(), 9);
        for key in [
            "firstContentfulPaint",
            "timeToInteractive",
            "serverResponseTime",
            "bootUpTime",
            "firstMeaningfulPaint",
            "totalBlockingTime",
            "totalByteWeight",
            "firstCpuIdle",
            "largestContentfulPaint",
        ] {
            assert!(obj.contains_key(key), "missing {}", key);
        }
    }

    #[test]
    fn test_impact_keeps_provider_order() {
        let result: ScoringResult = serde_json::from_value(json!({
            "userExperienceScore": 4100,
            "impact": {
                "zeta": { "b": 1, "a": 2 },
                "alpha": { "c": null }
            }
        }))
        .unwrap();

        let names: Vec<_> = result
            .impact
            .categories()
            .iter()
            .map(|c| c.name.as_str())
            .collect();
        assert_eq!(names, vec!["zeta", "alpha"]);
        assert_eq!(result.impact.categories()[0].metrics[0].0, "b");
        assert_eq!(result.impact.categories()[0].get("a"), Some(&json!(2)));
        assert_eq!(result.user_experience_score, 4100.0);
    }

    #[test]
    fn test_impact_rejects_scalar_category() {
        let parsed: Result<ScoringResult, _> = serde_json::from_value(json!({
            "userExperienceScore": 1,
            "impact": { "broken": 5 }
        }));
        assert!(parsed.is_err());
    }

    #[test]
    fn test_impact_category_display() {
        let category = ImpactCategory {
            name: "speed".to_string(),
            metrics: vec![
                ("firstPaint".to_string(), json!(1200)),
                ("label".to_string(), json!("slow")),
            ],
        };
        assert_eq!(category.to_string(), r#"speed: firstPaint=1200, label="slow""#);
        assert_eq!(ImpactCategory::default().to_string(), ":");
    }

    #[test]
    fn test_null_impact_is_empty() {
        let result: ScoringResult = serde_json::from_value(json!({
            "userExperienceScore": 1,
            "impact": null
        }))
        .unwrap();
        assert!(result.impact.categories().is_empty());

        let missing: ScoringResult =
            serde_json::from_value(json!({ "userExperienceScore": 2 })).unwrap();
        assert!(missing.impact.categories().is_empty());
    }

    #[test]
    fn test_report_set_from_slots_keeps_index_order() {
        let report = |index: usize| Report {
            index,
            url: format!("https://{}.test", index),
            impact: Impact::default(),
            score: 0.0,
        };
        let set = ReportSet::from_slots(vec![Some(report(0)), None, Some(report(2))]);
        assert_eq!(set.indices(), vec![0, 2]);
        assert_eq!(set.len(), 2);
    }
}
