//! The `skillcheck quiz` command.

use std::path::PathBuf;

use anyhow::{Context, Result};
use comfy_table::{Cell, Table};
use serde::Deserialize;

use skillcheck_core::model::{QuizPlan, QuizSpec, TopicMetrics};
use skillcheck_core::quiz::{adaptive_spec, plan_quiz, QuizEngine};

use super::{cancel_on_ctrl_c, read_json, write_json, GlobalOptions};

/// Input document for `--adaptive`.
#[derive(Debug, Deserialize)]
struct AdaptiveInput {
    topic: String,
    total_questions: u32,
    /// Recent mastery per topic.
    #[serde(default)]
    recent: TopicMetrics,
}

pub async fn execute(
    spec_path: Option<PathBuf>,
    adaptive_path: Option<PathBuf>,
    plan_only: bool,
    options: &GlobalOptions,
) -> Result<()> {
    let config = options.load_config()?;

    let spec: QuizSpec = match (spec_path, adaptive_path) {
        (Some(path), None) => read_json(&path)?,
        (None, Some(path)) => {
            let input: AdaptiveInput = read_json(&path)?;
            adaptive_spec(
                &input.topic,
                input.total_questions,
                &input.recent,
                &config.thresholds,
            )
        }
        _ => anyhow::bail!("pass exactly one of --spec or --adaptive"),
    };
    let plan = plan_quiz(&spec).context("invalid quiz spec")?;
    print_plan(&plan);

    if plan_only {
        return write_json(&plan, options.output.as_deref());
    }

    let engine = QuizEngine::new(options.gateway(&config)?, config.engine_settings());
    let quiz = engine.generate_quiz(&plan, Some(cancel_on_ctrl_c())).await;

    eprintln!(
        "Generated {} questions worth {} points (~{} min)",
        quiz.questions.len(),
        quiz.total_points,
        quiz.estimated_duration_secs.div_ceil(60)
    );
    if quiz.placeholder_count > 0 {
        eprintln!(
            "{} placeholder question(s) need editing before use",
            quiz.placeholder_count
        );
    }
    if !quiz.complete {
        eprintln!("Quiz generation was interrupted");
    }
    write_json(&quiz, options.output.as_deref())
}

fn print_plan(plan: &QuizPlan) {
    let mut table = Table::new();
    table.set_header(vec!["Type", "Count", "Difficulty", "Focus"]);

    for bucket in &plan.buckets {
        table.add_row(vec![
            Cell::new(bucket.question_type),
            Cell::new(bucket.count),
            Cell::new(bucket.difficulty),
            Cell::new(bucket.focus.as_deref().unwrap_or("general")),
        ]);
    }

    eprintln!("\n{table}");
    eprintln!(
        "{}: {} questions, {} difficulty",
        plan.topic, plan.total_questions, plan.difficulty
    );
}
