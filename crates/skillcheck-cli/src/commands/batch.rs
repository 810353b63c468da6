//! The `skillcheck batch` command.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use comfy_table::{Cell, Table};

use skillcheck_core::batch::{
    BatchCoordinator, BatchEntry, BatchOutcome, BatchProgress, BatchReport, BatchSummary,
};
use skillcheck_core::grading::GradingEngine;
use skillcheck_core::model::Submission;
use skillcheck_core::settings::Parallelism;

use super::{cancel_on_ctrl_c, percent, read_json, write_json, GlobalOptions};

/// Console progress reporter.
struct ConsoleProgress;

impl BatchProgress for ConsoleProgress {
    fn on_submission_start(&self, submission_id: &str) {
        eprintln!("  Grading: {submission_id}");
    }

    fn on_submission_complete(&self, entry: &BatchEntry) {
        match &entry.outcome {
            BatchOutcome::Graded { result } => eprintln!(
                "  Done: {} {} grade {}",
                entry.submission_id,
                percent(result.percentage),
                result.letter_grade
            ),
            BatchOutcome::Failed { reason } => {
                eprintln!("  ERROR: {}: {reason}", entry.submission_id)
            }
            BatchOutcome::Cancelled => eprintln!("  Cancelled: {}", entry.submission_id),
        }
    }

    fn on_batch_complete(&self, summary: &BatchSummary, elapsed: Duration) {
        eprintln!(
            "\nComplete: {}/{} graded, {} failed, {} cancelled ({:.1}s)",
            summary.graded,
            summary.total,
            summary.failed,
            summary.cancelled,
            elapsed.as_secs_f64()
        );
    }
}

pub async fn execute(
    submissions_path: PathBuf,
    parallelism: Option<usize>,
    options: &GlobalOptions,
) -> Result<()> {
    if let Some(n) = parallelism {
        anyhow::ensure!(n >= 1, "parallelism must be at least 1");
    }

    let config = options.load_config()?;
    let submissions: Vec<Submission> = read_json(&submissions_path)?;
    let mut settings = config.engine_settings();
    if let Some(n) = parallelism {
        settings.parallelism = Parallelism::new(n);
    }

    eprintln!(
        "skillcheck v{} - grading {} submissions ({} at a time)",
        env!("CARGO_PKG_VERSION"),
        submissions.len(),
        settings.parallelism.get()
    );
    eprintln!();

    let engine = Arc::new(GradingEngine::new(options.gateway(&config)?, settings));
    let coordinator = BatchCoordinator::new(engine);
    let report = coordinator
        .grade_batch(&submissions, Some(cancel_on_ctrl_c()), &ConsoleProgress)
        .await;

    print_summary(&report);
    write_json(&report, options.output.as_deref())
}

fn print_summary(report: &BatchReport) {
    let mut table = Table::new();
    table.set_header(vec!["Submission", "Student", "Status", "Score", "Grade"]);

    for entry in &report.entries {
        let row = match &entry.outcome {
            BatchOutcome::Graded { result } => vec![
                Cell::new(&entry.submission_id),
                Cell::new(&result.student_id),
                Cell::new("graded"),
                Cell::new(percent(result.percentage)),
                Cell::new(result.letter_grade),
            ],
            BatchOutcome::Failed { .. } => vec![
                Cell::new(&entry.submission_id),
                Cell::new(""),
                Cell::new("failed"),
                Cell::new("-"),
                Cell::new("-"),
            ],
            BatchOutcome::Cancelled => vec![
                Cell::new(&entry.submission_id),
                Cell::new(""),
                Cell::new("cancelled"),
                Cell::new("-"),
                Cell::new("-"),
            ],
        };
        table.add_row(row);
    }
    eprintln!("\n{table}");

    let summary = &report.summary;
    if let (Some(avg), Some(high), Some(low)) = (
        summary.average_percentage,
        summary.highest_percentage,
        summary.lowest_percentage,
    ) {
        eprintln!(
            "Average {}  highest {}  lowest {}",
            percent(avg),
            percent(high),
            percent(low)
        );
    }
    if !report.complete {
        eprintln!("Batch incomplete: {} submission(s) not graded", summary.cancelled);
    }
}
