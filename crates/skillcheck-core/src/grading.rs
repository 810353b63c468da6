//! Grading Engine.
//!
//! Closed questions are scored by exact match. Open questions go to the
//! gateway; when generation degrades they fall back to keyword-coverage
//! partial credit. A submission is graded closed-first, then open, each in
//! input order.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::stream::{self, StreamExt};

use crate::error::AssessError;
use crate::gateway::{
    Gateway, GenerationOutcome, GenerationPayload, OpenGrading, FALLBACK_GRADING_FEEDBACK,
};
use crate::model::{
    ClosedQuestion, Correctness, GradingSource, MasteryTag, OpenQuestion, QuestionResult,
    Submission, SubmissionResult,
};
use crate::prompts::{PromptKind, PromptParams};
use crate::retry::generate_with_retry;
use crate::rubric::{contradicts_coverage, keyword_coverage, KeywordCoverage};
use crate::settings::{EngineSettings, Thresholds};

/// Coverage assumed for the fallback when a question has no keywords.
pub const NEUTRAL_COVERAGE: f64 = 0.6;

/// Score a closed question. Pure and idempotent.
pub fn grade_closed(question: &ClosedQuestion) -> QuestionResult {
    let is_correct = normalize_answer(&question.correct_answer)
        == normalize_answer(&question.student_answer);

    let (awarded, correctness, feedback) = if is_correct {
        (
            question.max_points,
            Correctness::Correct,
            "Correct! Well done.".to_string(),
        )
    } else {
        (
            0.0,
            Correctness::Incorrect,
            format!(
                "Incorrect. The correct answer is: {}",
                question.correct_answer.trim()
            ),
        )
    };

    QuestionResult {
        question_id: question.id.clone(),
        question_type: question.question_type.into(),
        max_points: question.max_points,
        awarded,
        correctness,
        feedback,
        matched_keywords: None,
        missing_keywords: None,
        strengths: if is_correct {
            vec!["Accurate response".to_string()]
        } else {
            Vec::new()
        },
        improvements: if is_correct {
            Vec::new()
        } else {
            vec!["Review this concept".to_string()]
        },
        source: GradingSource::Deterministic,
        needs_review: false,
    }
}

/// Trimmed, lowercased, and for comma-separated answers an order-free set.
fn normalize_answer(answer: &str) -> Vec<String> {
    let mut parts: Vec<String> = answer
        .split(',')
        .map(|p| p.trim().to_lowercase())
        .filter(|p| !p.is_empty())
        .collect();
    parts.sort();
    parts.dedup();
    parts
}

/// Reject input the validation layer should have caught.
pub fn validate_submission(submission: &Submission) -> Result<(), AssessError> {
    if submission.id.trim().is_empty() {
        return Err(AssessError::ContractViolation(
            "submission id is empty".into(),
        ));
    }
    let points = submission
        .closed_questions
        .iter()
        .map(|q| (q.id.as_str(), q.max_points))
        .chain(
            submission
                .open_questions
                .iter()
                .map(|q| (q.id.as_str(), q.max_points)),
        );
    for (id, max_points) in points {
        if id.trim().is_empty() {
            return Err(AssessError::ContractViolation(format!(
                "submission {} has a question with an empty id",
                submission.id
            )));
        }
        if !max_points.is_finite() || max_points < 0.0 {
            return Err(AssessError::ContractViolation(format!(
                "question {id} has invalid max points {max_points}"
            )));
        }
    }
    Ok(())
}

/// Letter grade for a fraction in `[0, 1]`.
pub fn letter_grade(percentage: f64) -> char {
    match percentage * 100.0 {
        p if p >= 90.0 => 'A',
        p if p >= 80.0 => 'B',
        p if p >= 70.0 => 'C',
        p if p >= 60.0 => 'D',
        _ => 'F',
    }
}

pub fn mastery_tag(percentage: f64, thresholds: &Thresholds) -> MasteryTag {
    if percentage >= thresholds.mastered_from {
        MasteryTag::Mastered
    } else if percentage >= thresholds.developing_from {
        MasteryTag::Developing
    } else {
        MasteryTag::NeedsSupport
    }
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

fn correctness_for(awarded: f64, max_points: f64) -> Correctness {
    if max_points > 0.0 && awarded >= max_points {
        Correctness::Correct
    } else if awarded <= 0.0 {
        Correctness::Incorrect
    } else {
        Correctness::Partial
    }
}

/// Grades submissions through a shared gateway.
pub struct GradingEngine {
    gateway: Arc<Gateway>,
    settings: EngineSettings,
}

impl GradingEngine {
    pub fn new(gateway: Arc<Gateway>, settings: EngineSettings) -> Self {
        Self { gateway, settings }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Score an open question via the model, falling back to keyword coverage.
    pub async fn grade_open(&self, question: &OpenQuestion) -> QuestionResult {
        let coverage = keyword_coverage(&question.student_answer, &question.keywords);

        let params = PromptParams::new()
            .with("max_points", format!("{}", question.max_points))
            .with("question", question.text.as_str())
            .with("rubric", question.rubric.as_str())
            .with(
                "keywords",
                if question.keywords.is_empty() {
                    "none specified".to_string()
                } else {
                    question.keywords.join(", ")
                },
            )
            .with("context", question.context.as_deref().unwrap_or("none"))
            .with("answer", question.student_answer.as_str());

        let outcome = generate_with_retry(
            &self.gateway,
            PromptKind::GradeOpenQuestion,
            &params,
            self.settings.timeouts.grading,
            &self.settings.retry,
        )
        .await;

        match outcome {
            GenerationOutcome::Success {
                payload: GenerationPayload::Grading(grading),
            } => model_result(question, grading, coverage),
            GenerationOutcome::Degraded {
                payload: GenerationPayload::Grading(grading),
                ..
            } => fallback_result(question, grading, coverage),
            _ => {
                tracing::warn!(
                    question_id = %question.id,
                    "grading produced a non-grading payload, using fallback"
                );
                let grading = OpenGrading {
                    score_percentage: 0.0,
                    feedback: FALLBACK_GRADING_FEEDBACK.to_string(),
                    strengths: Vec::new(),
                    improvements: Vec::new(),
                };
                fallback_result(question, grading, coverage)
            }
        }
    }

    /// Grade every question of a submission and aggregate the result.
    pub async fn grade_submission(
        &self,
        submission: &Submission,
    ) -> Result<SubmissionResult, AssessError> {
        validate_submission(submission)?;
        tracing::info!(
            submission_id = %submission.id,
            closed = submission.closed_questions.len(),
            open = submission.open_questions.len(),
            "grading submission"
        );

        let mut question_results: Vec<QuestionResult> =
            submission.closed_questions.iter().map(grade_closed).collect();

        let open_results: Vec<QuestionResult> = stream::iter(
            submission
                .open_questions
                .iter()
                .map(|question| self.grade_open(question)),
        )
        .buffered(self.settings.parallelism.get())
        .collect()
        .await;
        question_results.extend(open_results);

        let total_possible: f64 = question_results.iter().map(|r| r.max_points).sum();
        // Rounding must not lift the total past what the questions allow.
        let total_awarded =
            round2(question_results.iter().map(|r| r.awarded).sum()).min(total_possible);
        let percentage = if total_possible > 0.0 {
            (total_awarded / total_possible).clamp(0.0, 1.0)
        } else {
            0.0
        };

        let (overall_feedback, feedback_degraded) = self
            .overall_feedback(&submission.topic, percentage, &question_results)
            .await;

        let mut topic_mastery = BTreeMap::new();
        topic_mastery.insert(
            submission.topic.clone(),
            mastery_tag(percentage, &self.settings.thresholds),
        );

        let result = SubmissionResult {
            submission_id: submission.id.clone(),
            student_id: submission.student_id.clone(),
            topic: submission.topic.clone(),
            question_results,
            total_awarded,
            total_possible,
            percentage,
            letter_grade: letter_grade(percentage),
            overall_feedback,
            feedback_degraded,
            topic_mastery,
            graded_at: chrono::Utc::now(),
        };
        tracing::info!(
            submission_id = %result.submission_id,
            percentage = result.percentage,
            fallback_questions = result.fallback_count(),
            "submission graded"
        );
        Ok(result)
    }

    async fn overall_feedback(
        &self,
        topic: &str,
        percentage: f64,
        results: &[QuestionResult],
    ) -> (String, bool) {
        let params = PromptParams::new()
            .with("topic", topic)
            .with("percentage", format!("{:.1}", percentage * 100.0))
            .with("question_count", results.len().to_string())
            .with(
                "strengths",
                distinct_list(
                    results.iter().flat_map(|r| r.strengths.iter()),
                    "Basic understanding shown",
                ),
            )
            .with(
                "improvements",
                distinct_list(
                    results.iter().flat_map(|r| r.improvements.iter()),
                    "Continue practicing",
                ),
            );

        let outcome = generate_with_retry(
            &self.gateway,
            PromptKind::OverallFeedback,
            &params,
            self.settings.timeouts.summary,
            &self.settings.retry,
        )
        .await;
        let degraded = outcome.is_degraded();
        match outcome.into_payload() {
            GenerationPayload::Text { text } => (text, degraded),
            _ => (String::new(), true),
        }
    }
}

/// First five distinct items joined with commas, or `empty`.
fn distinct_list<'a>(items: impl Iterator<Item = &'a String>, empty: &str) -> String {
    let mut picked: Vec<&str> = Vec::new();
    for item in items {
        if picked.len() == 5 {
            break;
        }
        if !picked.contains(&item.as_str()) {
            picked.push(item);
        }
    }
    if picked.is_empty() {
        empty.to_string()
    } else {
        picked.join(", ")
    }
}

fn keyword_lists(
    question: &OpenQuestion,
    coverage: &KeywordCoverage,
) -> (Option<Vec<String>>, Option<Vec<String>>) {
    if question.keywords.is_empty() {
        (None, None)
    } else {
        (
            Some(coverage.matched.clone()),
            Some(coverage.missing.clone()),
        )
    }
}

fn model_result(
    question: &OpenQuestion,
    grading: OpenGrading,
    coverage: KeywordCoverage,
) -> QuestionResult {
    let max_points = question.max_points;
    let awarded = round2(grading.score_percentage / 100.0 * max_points).clamp(0.0, max_points);
    let needs_review =
        max_points > 0.0 && contradicts_coverage(awarded / max_points, &coverage);
    if needs_review {
        tracing::warn!(
            question_id = %question.id,
            awarded,
            coverage = coverage.ratio.unwrap_or_default(),
            "model score contradicts keyword coverage"
        );
    }
    let (matched_keywords, missing_keywords) = keyword_lists(question, &coverage);

    QuestionResult {
        question_id: question.id.clone(),
        question_type: question.question_type.into(),
        max_points,
        awarded,
        correctness: correctness_for(awarded, max_points),
        feedback: grading.feedback,
        matched_keywords,
        missing_keywords,
        strengths: grading.strengths,
        improvements: grading.improvements,
        source: GradingSource::Model,
        needs_review,
    }
}

fn fallback_result(
    question: &OpenQuestion,
    grading: OpenGrading,
    coverage: KeywordCoverage,
) -> QuestionResult {
    let max_points = question.max_points;
    let fraction = coverage.ratio.unwrap_or(NEUTRAL_COVERAGE);
    let awarded = (max_points * fraction).round().clamp(0.0, max_points);

    let correctness = match coverage.ratio {
        Some(r) if r <= 0.0 => Correctness::Incorrect,
        Some(r) if r >= 1.0 => Correctness::Correct,
        _ => Correctness::Partial,
    };

    let mut feedback = grading.feedback;
    if let Some(total) = coverage.ratio.map(|_| coverage.matched.len() + coverage.missing.len()) {
        feedback.push_str(&format!(
            " Found {}/{} key concepts in your answer.",
            coverage.matched.len(),
            total
        ));
    }
    let strengths = if fraction > 0.5 {
        vec!["Answered the question".to_string()]
    } else {
        Vec::new()
    };
    let (matched_keywords, missing_keywords) = keyword_lists(question, &coverage);

    QuestionResult {
        question_id: question.id.clone(),
        question_type: question.question_type.into(),
        max_points,
        awarded,
        correctness,
        feedback,
        matched_keywords,
        missing_keywords,
        strengths,
        improvements: grading.improvements,
        source: GradingSource::Fallback,
        needs_review: false,
    }
}
