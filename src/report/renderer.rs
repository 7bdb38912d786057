//! HTML report body generation.
//!
//! Each report becomes a heading linking the URL, an optional congratulatory
//! callout and a table of impact categories (rows) by metric (columns). The
//! column set is derived per report from the metrics that actually appear.

use crate::config::ReportConfig;
use crate::models::{Impact, Report, ReportSet};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde_json::{Number, Value};
use std::borrow::Cow;

static LOWER_UPPER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([a-z])([A-Z])").expect("lower/upper regex should compile"));
static ACRONYM_WORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([A-Z])([A-Z][a-z])").expect("acronym regex should compile"));
static LETTER_DIGIT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)([a-z])([0-9])").expect("letter/digit regex should compile"));
static DIGIT_LETTER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)([0-9])([a-z])").expect("digit/letter regex should compile"));

/// Rendering settings.
#[derive(Debug, Clone)]
pub struct RenderOptions {
    /// Scores strictly below this get the congratulatory callout.
    pub score_threshold: f64,
    /// Image used in the callout.
    pub celebration_image: String,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self::from(&ReportConfig::default())
    }
}

impl From<&ReportConfig> for RenderOptions {
    fn from(config: &ReportConfig) -> Self {
        Self {
            score_threshold: config.score_threshold,
            celebration_image: config.celebration_image.clone(),
        }
    }
}

/// Render the whole issue body, one section per report in set order.
pub fn render_body(reports: &ReportSet, options: &RenderOptions) -> String {
    reports
        .iter()
        .map(|report| render_report(report, options))
        .collect()
}

/// Render a single report section.
pub fn render_report(report: &Report, options: &RenderOptions) -> String {
    let url = escape_html(&report.url);
    let mut section = String::new();

    section.push_str(&format!(
        "<h3><b>URL:</b> <a href='{}'>{}</a></h3>",
        url, url
    ));

    if report.score < options.score_threshold {
        section.push_str(&format!(
            "<h4>Cheers 🎉🎉 {} is already serving the best user experience.</h4>",
            url
        ));
        section.push_str(&format!(
            "<p><img src=\"{}\" height=\"200\" alt=\"gif\" /></p>",
            escape_html(&options.celebration_image)
        ));
    }

    section.push_str(&render_table(&report.impact));
    section
}

fn render_table(impact: &Impact) -> String {
    let columns = derive_columns(impact);
    let mut table = String::new();

    table.push_str("<table><thead><tr><th></th>");
    for column in &columns {
        table.push_str(&format!("<th>{}</th>", escape_html(&camel_case_to_title(column))));
    }
    table.push_str("</tr></thead><tbody>");

    for category in impact.categories() {
        table.push_str(&format!(
            "<tr><th>{}</th>",
            escape_html(&camel_case_to_title(&category.name))
        ));
        for column in &columns {
            let cell = category.get(column).map(cell_text).unwrap_or_default();
            table.push_str(&format!("<td>{}</td>", escape_html(&cell)));
        }
        table.push_str("</tr>");
    }

    table.push_str("</tbody></table><br>");
    table
}

/// Metric names across all categories, in order of first appearance.
pub fn derive_columns(impact: &Impact) -> Vec<&str> {
    let mut columns: Vec<&str> = Vec::new();
    for category in impact.categories() {
        for (metric, _) in &category.metrics {
            if !columns.contains(&metric.as_str()) {
                columns.push(metric);
            }
        }
    }
    columns
}

/// Turn a camelCase identifier into a spaced title.
///
/// `firstContentfulPaint` -> `First Contentful Paint`,
/// `totalCPUTime` -> `Total CPU Time`, `value2units` -> `Value 2 Units`.
pub fn camel_case_to_title(camel_case: &str) -> String {
    let mut chars = camel_case.chars();
    let pascal_case = match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
        None => return String::new(),
    };

    let spaced = LOWER_UPPER.replace_all(&pascal_case, "${1} ${2}");
    let spaced = ACRONYM_WORD.replace_all(&spaced, "${1} ${2}");
    let spaced = LETTER_DIGIT.replace_all(&spaced, "${1} ${2}");
    let spaced = DIGIT_LETTER.replace_all(&spaced, |caps: &Captures| {
        format!("{} {}", &caps[1], caps[2].to_uppercase())
    });

    spaced.into_owned()
}

/// Text for one table cell; null and empty values render blank.
fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Number(n) => format_number(n),
        Value::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}

/// Integral values print without a trailing `.0`.
fn format_number(n: &Number) -> String {
    if n.is_i64() || n.is_u64() {
        return n.to_string();
    }
    match n.as_f64() {
        Some(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", f as i64),
        Some(f) => format!("{}", f),
        None => n.to_string(),
    }
}

fn escape_html(text: &str) -> Cow<'_, str> {
    if !text.contains(['&', '<', '>', '"', '\'']) {
        return Cow::Borrowed(text);
    }

    let mut escaped = String::with_capacity(text.len() + 8);
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            c => escaped.push(c),
        }
    }
    Cow::Owned(escaped)
}
