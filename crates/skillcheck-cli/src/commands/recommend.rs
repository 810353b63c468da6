//! The `skillcheck recommend` command.

use std::path::PathBuf;

use anyhow::{Context, Result};
use comfy_table::{Cell, Table};
use serde::Deserialize;

use skillcheck_core::model::{PerformanceRecord, TopicMetrics};
use skillcheck_core::recommend::{RecommendationEngine, StudentReport};

use super::{percent, read_json, write_json, GlobalOptions};

/// Input document for a recommendation run.
#[derive(Debug, Deserialize)]
struct RecommendInput {
    student_id: String,
    #[serde(default)]
    history: Vec<PerformanceRecord>,
    /// Explicit mastery values; these win over history-derived ones.
    #[serde(default)]
    topic_scores: TopicMetrics,
    /// Earlier snapshot to compute the improvement trend against.
    #[serde(default)]
    previous: Option<TopicMetrics>,
}

pub async fn execute(input_path: PathBuf, options: &GlobalOptions) -> Result<()> {
    let config = options.load_config()?;
    let input: RecommendInput = read_json(&input_path)?;
    let engine = RecommendationEngine::new(options.gateway(&config)?, config.engine_settings());

    let report = engine
        .generate_report(
            &input.student_id,
            &input.history,
            &input.topic_scores,
            input.previous.as_ref(),
        )
        .await
        .with_context(|| format!("cannot build report for {}", input.student_id))?;

    print_report(&report);
    write_json(&report, options.output.as_deref())
}

fn print_report(report: &StudentReport) {
    let mut table = Table::new();
    table.set_header(vec!["Priority", "Topic", "Tier", "Mastery", "Trend"]);

    for rec in &report.recommendations {
        let trend = report
            .history_trends
            .get(&rec.topic)
            .map(|t| t.classification.to_string())
            .unwrap_or_else(|| "-".to_string());
        table.add_row(vec![
            Cell::new(rec.priority),
            Cell::new(&rec.topic),
            Cell::new(rec.tier),
            Cell::new(percent(rec.mastery)),
            Cell::new(trend),
        ]);
    }

    eprintln!("\n{table}");
    eprintln!(
        "Suggested study time: {:.1} h/week",
        report.total_suggested_hours
    );
    if let Some(trend) = &report.trend {
        eprintln!("Overall since last snapshot: {}", trend.overall);
    }
    eprintln!("\n{}\n\n{}", report.narrative, report.motivation);
}
