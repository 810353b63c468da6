//! The `skillcheck grade` command.

use std::path::PathBuf;

use anyhow::{Context, Result};
use comfy_table::{Cell, Table};

use skillcheck_core::grading::GradingEngine;
use skillcheck_core::model::{Submission, SubmissionResult};

use super::{percent, read_json, write_json, GlobalOptions};

pub async fn execute(submission_path: PathBuf, options: &GlobalOptions) -> Result<()> {
    let config = options.load_config()?;
    let submission: Submission = read_json(&submission_path)?;
    let engine = GradingEngine::new(options.gateway(&config)?, config.engine_settings());

    let result = engine
        .grade_submission(&submission)
        .await
        .with_context(|| format!("cannot grade submission {}", submission.id))?;

    print_result(&result);
    write_json(&result, options.output.as_deref())
}

fn print_result(result: &SubmissionResult) {
    let mut table = Table::new();
    table.set_header(vec!["Question", "Type", "Score", "Result", "Source"]);

    for q in &result.question_results {
        let mut outcome = format!("{:?}", q.correctness).to_lowercase();
        if q.needs_review {
            outcome.push_str(" (review)");
        }
        table.add_row(vec![
            Cell::new(&q.question_id),
            Cell::new(q.question_type),
            Cell::new(format!("{}/{}", q.awarded, q.max_points)),
            Cell::new(outcome),
            Cell::new(format!("{:?}", q.source).to_lowercase()),
        ]);
    }

    eprintln!("\n{table}");
    eprintln!(
        "{} :: {}  {}/{} ({}) grade {}",
        result.student_id,
        result.topic,
        result.total_awarded,
        result.total_possible,
        percent(result.percentage),
        result.letter_grade,
    );
    let fallbacks = result.fallback_count();
    if fallbacks > 0 {
        eprintln!("{fallbacks} open question(s) scored by keyword fallback");
    }
    eprintln!("\n{}", result.overall_feedback);
}
