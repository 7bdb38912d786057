//! Fan-in aggregation of per-target pipelines.
//!
//! Every target runs its own audit -> scoring pipeline on a spawned task.
//! Finished pipelines report into a [`Collector`], which owns one write-once
//! slot per target and a single completion counter. Insertion, counting, the
//! completion check and the completion signal all happen under one lock, so
//! the set completes exactly once no matter how completions interleave.
//! The finished set is always read back in target-index order.

use crate::clients::{AuditProvider, PublishedIssue, ReportPublisher, ScoringService};
use crate::error::{AggregateError, PipelineError, RunError};
use crate::models::{Report, ReportSet, ScoringResult, Target};
use crate::report::{render_body, RenderOptions};
use futures::FutureExt;
use indicatif::ProgressBar;
use serde::{Deserialize, Serialize};
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};
use tokio::sync::{oneshot, Semaphore};
use tracing::{debug, error, info, warn};

/// What to do when one target's pipeline fails.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Stop at the first failure and publish nothing.
    Abort,
    /// Leave the failed target out of the report.
    #[default]
    Exclude,
}

/// A target whose pipeline did not produce a report.
#[derive(Debug)]
pub struct TargetFailure {
    pub index: usize,
    pub url: String,
    pub error: PipelineError,
}

/// Result of a completed aggregation.
#[derive(Debug)]
pub struct AggregateOutcome {
    /// Reports in target-index order.
    pub reports: ReportSet,
    /// Excluded targets, in target-index order.
    pub failures: Vec<TargetFailure>,
}

type Completion = Result<AggregateOutcome, AggregateError>;

#[derive(Debug)]
enum Slot {
    Pending,
    Filled(Report),
    Failed,
}

struct CollectorState {
    slots: Vec<Slot>,
    settled: usize,
    failures: Vec<TargetFailure>,
    done: Option<oneshot::Sender<Completion>>,
}

/// Shared sink for finished pipelines.
pub struct Collector {
    policy: FailurePolicy,
    state: Mutex<CollectorState>,
}

impl Collector {
    /// Create a collector expecting `total` targets.
    ///
    /// The receiver resolves once, when the set completes or aborts.
    pub fn new(total: usize, policy: FailurePolicy) -> (Self, oneshot::Receiver<Completion>) {
        let (tx, rx) = oneshot::channel();
        let state = CollectorState {
            slots: (0..total).map(|_| Slot::Pending).collect(),
            settled: 0,
            failures: Vec::new(),
            done: Some(tx),
        };
        let collector = Self {
            policy,
            state: Mutex::new(state),
        };
        (collector, rx)
    }

    /// Record one target's outcome. Returns `true` for the call that completed the run.
    pub fn record(&self, target: &Target, outcome: Result<ScoringResult, PipelineError>) -> bool {
        let mut state = match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if state.done.is_none() {
            debug!("Run already completed, ignoring result for {}", target);
            return false;
        }

        match state.slots.get(target.index) {
            Some(Slot::Pending) => {}
            Some(_) => {
                warn!("Duplicate result for {}, ignoring", target);
                return false;
            }
            None => {
                warn!("Result for unknown target {}, ignoring", target);
                return false;
            }
        }

        match outcome {
            Ok(result) => {
                state.slots[target.index] = Slot::Filled(Report::new(target, result));
            }
            Err(error) => match self.policy {
                FailurePolicy::Abort => {
                    state.slots[target.index] = Slot::Failed;
                    let completion = Err(AggregateError::Aborted {
                        index: target.index,
                        url: target.url.clone(),
                        source: error,
                    });
                    if let Some(tx) = state.done.take() {
                        let _ = tx.send(completion);
                    }
                    return true;
                }
                FailurePolicy::Exclude => {
                    state.slots[target.index] = Slot::Failed;
                    state.failures.push(TargetFailure {
                        index: target.index,
                        url: target.url.clone(),
                        error,
                    });
                }
            },
        }

        state.settled += 1;
        if state.settled < state.slots.len() {
            return false;
        }

        let slots = std::mem::take(&mut state.slots);
        let mut failures = std::mem::take(&mut state.failures);
        failures.sort_by_key(|f| f.index);

        let reports = ReportSet::from_slots(
            slots
                .into_iter()
                .map(|slot| match slot {
                    Slot::Filled(report) => Some(report),
                    Slot::Pending | Slot::Failed => None,
                })
                .collect(),
        );

        let completion = if reports.is_empty() {
            Err(AggregateError::NoReports {
                failed: failures.len(),
            })
        } else {
            Ok(AggregateOutcome { reports, failures })
        };

        if let Some(tx) = state.done.take() {
            let _ = tx.send(completion);
        }
        true
    }
}

/// Settings for one aggregation.
#[derive(Clone)]
pub struct AggregateOptions {
    pub policy: FailurePolicy,
    /// Maximum pipelines in flight.
    pub concurrency: usize,
    /// Used only for the per-target congratulation log line.
    pub score_threshold: f64,
    pub progress: ProgressBar,
}

impl Default for AggregateOptions {
    fn default() -> Self {
        Self {
            policy: FailurePolicy::default(),
            concurrency: 8,
            score_threshold: 4300.0,
            progress: ProgressBar::hidden(),
        }
    }
}

/// Audit then score one target.
async fn run_pipeline(
    target: &Target,
    audit: &dyn AuditProvider,
    scoring: &dyn ScoringService,
) -> Result<ScoringResult, PipelineError> {
    let metrics = audit.audit(&target.url).await?;
    debug!("Audit metrics for {}: {:?}", target, metrics);
    scoring.score(&metrics).await
}

fn log_outcome(
    target: &Target,
    outcome: &Result<ScoringResult, PipelineError>,
    options: &AggregateOptions,
) {
    match outcome {
        Ok(result) => {
            info!(
                "URL: {} scored {} across {} impact categories",
                target.url,
                result.user_experience_score,
                result.impact.categories().len()
            );
            for category in result.impact.categories() {
                debug!("Impact for {}: {}", target, category);
            }
            if result.user_experience_score < options.score_threshold {
                info!(
                    "Congratulations 🎉 {} is already serving the best user experience.",
                    target.url
                );
            }
        }
        Err(e) => match options.policy {
            FailurePolicy::Abort => error!("Target {} failed: {}", target, e),
            FailurePolicy::Exclude => warn!("Target {} failed and will be excluded: {}", target, e),
        },
    }
}

/// Run every target's pipeline concurrently and wait for the complete set.
pub async fn aggregate(
    targets: &[Target],
    audit: Arc<dyn AuditProvider>,
    scoring: Arc<dyn ScoringService>,
    options: &AggregateOptions,
) -> Result<AggregateOutcome, AggregateError> {
    if targets.is_empty() {
        return Err(AggregateError::NoReports { failed: 0 });
    }

    let (collector, done) = Collector::new(targets.len(), options.policy);
    let collector = Arc::new(collector);
    let permits = Arc::new(Semaphore::new(options.concurrency.max(1)));

    options.progress.set_length(targets.len() as u64);
    info!(
        "Dispatching {} targets (concurrency {}, on failure: {:?})",
        targets.len(),
        options.concurrency.max(1),
        options.policy
    );

    for target in targets.iter().cloned() {
        let collector = Arc::clone(&collector);
        let permits = Arc::clone(&permits);
        let audit = Arc::clone(&audit);
        let scoring = Arc::clone(&scoring);
        let options = options.clone();

        tokio::spawn(async move {
            // The semaphore is never closed, so acquiring only waits.
            let _permit = permits.acquire_owned().await.ok();
            debug!("Starting pipeline for {}", target);

            let outcome = AssertUnwindSafe(run_pipeline(&target, audit.as_ref(), scoring.as_ref()))
                .catch_unwind()
                .await
                .unwrap_or(Err(PipelineError::Panicked));

            log_outcome(&target, &outcome, &options);
            options.progress.inc(1);

            if collector.record(&target, outcome) {
                debug!("{} completed the report set", target);
            }
        });
    }

    let completion = done.await.unwrap_or(Err(AggregateError::Interrupted));
    options.progress.finish_and_clear();
    completion
}

/// External services used by a run.
#[derive(Clone)]
pub struct Services {
    pub audit: Arc<dyn AuditProvider>,
    pub scoring: Arc<dyn ScoringService>,
    /// `None` renders without filing an issue.
    pub publisher: Option<Arc<dyn ReportPublisher>>,
}

/// What a finished run produced.
#[derive(Debug)]
pub struct RunOutcome {
    pub body: String,
    pub reports: usize,
    pub failures: Vec<TargetFailure>,
    pub issue: Option<PublishedIssue>,
}

/// Aggregate, render and publish once.
///
/// Resolves only after the publish call has returned, so the caller's exit
/// status reflects the whole run.
pub async fn run(
    targets: &[Target],
    services: &Services,
    title: &str,
    options: &AggregateOptions,
    render: &RenderOptions,
) -> Result<RunOutcome, RunError> {
    let outcome = aggregate(
        targets,
        Arc::clone(&services.audit),
        Arc::clone(&services.scoring),
        options,
    )
    .await?;

    for failure in &outcome.failures {
        warn!(
            "Excluded target #{} {}: {}",
            failure.index, failure.url, failure.error
        );
    }

    debug!("Report order: {:?}", outcome.reports.indices());
    let body = render_body(&outcome.reports, render);
    info!(
        "Rendered report for {} of {} targets ({} bytes)",
        outcome.reports.len(),
        targets.len(),
        body.len()
    );

    let issue = match services.publisher {
        Some(ref publisher) => match publisher.publish(title, &body).await {
            Ok(issue) => {
                info!("Created issue #{}: {}", issue.number, issue.html_url);
                Some(issue)
            }
            Err(source) => {
                error!(
                    "Publishing failed after {} reports were collected",
                    outcome.reports.len()
                );
                return Err(RunError::Publish { source, body });
            }
        },
        None => None,
    };

    Ok(RunOutcome {
        body,
        reports: outcome.reports.len(),
        failures: outcome.failures,
        issue,
    })
}
