//! Batch Grading Coordinator.
//!
//! Grades many submissions with bounded concurrency. Each submission is
//! isolated: a contract violation or a panic while grading it becomes a
//! `Failed` entry and the rest of the batch carries on. Results land in a
//! pre-sized slot array keyed by input index, so output order always matches
//! input order regardless of completion order.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use tokio::sync::{watch, Semaphore};

use crate::grading::GradingEngine;
use crate::model::{Submission, SubmissionResult};

/// What happened to one submission of a batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BatchOutcome {
    Graded { result: SubmissionResult },
    Failed { reason: String },
    /// The batch was cancelled before this submission finished.
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchEntry {
    pub submission_id: String,
    #[serde(flatten)]
    pub outcome: BatchOutcome,
}

/// Aggregate figures over the graded entries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total: usize,
    pub graded: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub average_percentage: Option<f64>,
    pub highest_percentage: Option<f64>,
    pub lowest_percentage: Option<f64>,
}

impl BatchSummary {
    fn from_entries(entries: &[BatchEntry]) -> Self {
        let mut summary = BatchSummary {
            total: entries.len(),
            ..Default::default()
        };
        let mut percentages = Vec::new();
        for entry in entries {
            match &entry.outcome {
                BatchOutcome::Graded { result } => {
                    summary.graded += 1;
                    percentages.push(result.percentage);
                }
                BatchOutcome::Failed { .. } => summary.failed += 1,
                BatchOutcome::Cancelled => summary.cancelled += 1,
            }
        }
        if !percentages.is_empty() {
            summary.average_percentage =
                Some(percentages.iter().sum::<f64>() / percentages.len() as f64);
            summary.highest_percentage = percentages.iter().copied().reduce(f64::max);
            summary.lowest_percentage = percentages.iter().copied().reduce(f64::min);
        }
        summary
    }
}

/// Ordered batch result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    /// One entry per input submission, in input order.
    pub entries: Vec<BatchEntry>,
    /// False when the batch was cancelled before every entry finished.
    pub complete: bool,
    pub summary: BatchSummary,
    pub duration_ms: u64,
}

/// Progress callbacks for long-running batches.
pub trait BatchProgress: Send + Sync {
    fn on_submission_start(&self, submission_id: &str);
    fn on_submission_complete(&self, entry: &BatchEntry);
    fn on_batch_complete(&self, summary: &BatchSummary, elapsed: Duration);
}

/// No-op progress reporter.
pub struct NoopProgress;

impl BatchProgress for NoopProgress {
    fn on_submission_start(&self, _: &str) {}
    fn on_submission_complete(&self, _: &BatchEntry) {}
    fn on_batch_complete(&self, _: &BatchSummary, _: Duration) {}
}

/// Runs the grading engine over many submissions.
pub struct BatchCoordinator {
    engine: Arc<GradingEngine>,
}

impl BatchCoordinator {
    pub fn new(engine: Arc<GradingEngine>) -> Self {
        Self { engine }
    }

    /// Grade every submission. Setting the `cancel` channel to `true` stops
    /// outstanding work; finished entries are kept and the rest are reported
    /// as cancelled.
    pub async fn grade_batch(
        &self,
        submissions: &[Submission],
        cancel: Option<watch::Receiver<bool>>,
        progress: &dyn BatchProgress,
    ) -> BatchReport {
        let start = Instant::now();
        let parallelism = self.engine.settings().parallelism.get();
        let semaphore = Arc::new(Semaphore::new(parallelism));
        tracing::info!(
            submissions = submissions.len(),
            parallelism,
            "starting batch"
        );

        let mut slots: Vec<Option<BatchOutcome>> = vec![None; submissions.len()];
        let mut futures = FuturesUnordered::new();

        for (index, submission) in submissions.iter().enumerate() {
            let semaphore = Arc::clone(&semaphore);
            let mut cancel = cancel.clone();
            let engine = Arc::clone(&self.engine);

            futures.push(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return (index, BatchOutcome::Cancelled);
                };
                if is_cancelled(&cancel) {
                    return (index, BatchOutcome::Cancelled);
                }
                progress.on_submission_start(&submission.id);

                let grading = AssertUnwindSafe(engine.grade_submission(submission)).catch_unwind();
                let outcome = tokio::select! {
                    graded = grading => match graded {
                        Ok(Ok(result)) => BatchOutcome::Graded { result },
                        Ok(Err(e)) => BatchOutcome::Failed { reason: e.to_string() },
                        Err(panic) => BatchOutcome::Failed {
                            reason: format!("grading panicked: {}", panic_message(panic.as_ref())),
                        },
                    },
                    _ = wait_for_cancel(&mut cancel) => BatchOutcome::Cancelled,
                };
                (index, outcome)
            });
        }

        while let Some((index, outcome)) = futures.next().await {
            if let BatchOutcome::Failed { reason } = &outcome {
                tracing::error!(
                    submission_id = %submissions[index].id,
                    %reason,
                    "submission failed"
                );
            }
            let entry = BatchEntry {
                submission_id: submissions[index].id.clone(),
                outcome,
            };
            progress.on_submission_complete(&entry);
            slots[index] = Some(entry.outcome);
        }

        let entries: Vec<BatchEntry> = submissions
            .iter()
            .zip(slots)
            .map(|(submission, slot)| BatchEntry {
                submission_id: submission.id.clone(),
                outcome: slot.unwrap_or(BatchOutcome::Cancelled),
            })
            .collect();

        let complete = !entries
            .iter()
            .any(|e| matches!(e.outcome, BatchOutcome::Cancelled));
        let summary = BatchSummary::from_entries(&entries);
        let elapsed = start.elapsed();
        progress.on_batch_complete(&summary, elapsed);
        tracing::info!(
            graded = summary.graded,
            failed = summary.failed,
            cancelled = summary.cancelled,
            complete,
            elapsed_ms = elapsed.as_millis() as u64,
            "batch finished"
        );

        BatchReport {
            entries,
            complete,
            summary,
            duration_ms: elapsed.as_millis() as u64,
        }
    }
}

pub(crate) fn is_cancelled(cancel: &Option<watch::Receiver<bool>>) -> bool {
    cancel.as_ref().is_some_and(|rx| *rx.borrow())
}

/// Resolves once cancellation is signalled; never resolves otherwise.
pub(crate) async fn wait_for_cancel(cancel: &mut Option<watch::Receiver<bool>>) {
    if let Some(rx) = cancel {
        if rx.wait_for(|cancelled| *cancelled).await.is_ok() {
            return;
        }
    }
    std::future::pending::<()>().await
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::Gateway;
    use crate::model::{ClosedQuestion, ClosedQuestionType};
    use crate::settings::{EngineSettings, Parallelism, RetryPolicy};
    use crate::testing::{Reply, ScriptedGenerator};

    fn coordinator(generator: ScriptedGenerator, parallelism: usize) -> BatchCoordinator {
        let settings = EngineSettings {
            retry: RetryPolicy::none(),
            parallelism: Parallelism::new(parallelism),
            ..EngineSettings::default()
        };
        let gateway = Arc::new(Gateway::new(Arc::new(generator), "m"));
        BatchCoordinator::new(Arc::new(GradingEngine::new(gateway, settings)))
    }

    fn submission(id: &str, topic: &str, points: f64, answer: &str) -> Submission {
        Submission {
            id: id.into(),
            student_id: format!("stu-{id}"),
            topic: topic.into(),
            closed_questions: vec![ClosedQuestion {
                id: format!("{id}-q1"),
                text: "Pick one".into(),
                question_type: ClosedQuestionType::Mcq,
                correct_answer: "B".into(),
                student_answer: answer.into(),
                max_points: points,
            }],
            open_questions: Vec::new(),
        }
    }

    #[tokio::test]
    async fn invalid_submission_fails_alone() {
        let batch = coordinator(ScriptedGenerator::fixed(Reply::text("Well done.")), 2);
        let subs = vec![
            submission("a", "Wiring", 5.0, "B"),
            submission("b", "Wiring", -5.0, "B"),
            submission("c", "Wiring", 5.0, "A"),
        ];
        let report = batch.grade_batch(&subs, None, &NoopProgress).await;

        let ids: Vec<&str> = report.entries.iter().map(|e| e.submission_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert!(matches!(report.entries[0].outcome, BatchOutcome::Graded { .. }));
        assert!(matches!(report.entries[1].outcome, BatchOutcome::Failed { .. }));
        assert!(matches!(report.entries[2].outcome, BatchOutcome::Graded { .. }));
        assert!(report.complete);
        assert_eq!(report.summary.graded, 2);
        assert_eq!(report.summary.failed, 1);
        assert_eq!(report.summary.highest_percentage, Some(1.0));
        assert_eq!(report.summary.lowest_percentage, Some(0.0));
        assert_eq!(report.summary.average_percentage, Some(0.5));
    }

    #[tokio::test]
    async fn panic_is_isolated() {
        let batch = coordinator(
            ScriptedGenerator::fixed(Reply::text("Nice.")).when("Topic: Boom", Reply::Panic),
            1,
        );
        let subs = vec![
            submission("a", "Boom", 5.0, "B"),
            submission("b", "Plumbing", 5.0, "B"),
        ];
        let report = batch.grade_batch(&subs, None, &NoopProgress).await;
        match &report.entries[0].outcome {
            BatchOutcome::Failed { reason } => assert!(reason.contains("scripted generator panic")),
            other => panic!("expected failure, got {other:?}"),
        }
        assert!(matches!(report.entries[1].outcome, BatchOutcome::Graded { .. }));
    }

    #[tokio::test]
    async fn cancelled_before_start_marks_everything() {
        let batch = coordinator(ScriptedGenerator::fixed(Reply::text("ok")), 2);
        let (tx, rx) = watch::channel(true);
        let subs = vec![submission("a", "Wiring", 5.0, "B")];
        let report = batch.grade_batch(&subs, Some(rx), &NoopProgress).await;
        drop(tx);
        assert!(!report.complete);
        assert!(matches!(report.entries[0].outcome, BatchOutcome::Cancelled));
        assert_eq!(report.summary.cancelled, 1);
        assert_eq!(report.summary.average_percentage, None);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_mid_batch_keeps_finished_entries() {
        let batch = coordinator(
            ScriptedGenerator::fixed(Reply::Hang).when("Topic: Fast", Reply::text("Good job.")),
            2,
        );
        let (tx, rx) = watch::channel(false);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            let _ = tx.send(true);
        });
        let subs = vec![
            submission("fast", "Fast", 5.0, "B"),
            submission("slow", "Slow", 5.0, "B"),
        ];
        let report = batch.grade_batch(&subs, Some(rx), &NoopProgress).await;
        assert!(!report.complete);
        assert!(matches!(report.entries[0].outcome, BatchOutcome::Graded { .. }));
        assert!(matches!(report.entries[1].outcome, BatchOutcome::Cancelled));
    }

    #[tokio::test]
    async fn empty_batch_is_complete() {
        let batch = coordinator(ScriptedGenerator::fixed(Reply::text("ok")), 4);
        let report = batch.grade_batch(&[], None, &NoopProgress).await;
        assert!(report.complete);
        assert!(report.entries.is_empty());
        assert_eq!(report.summary, BatchSummary::default());
    }
}
