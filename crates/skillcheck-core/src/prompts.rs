//! Prompt templates, one per [`PromptKind`].
//!
//! User templates use `{name}` placeholders filled from [`PromptParams`].
//! Rendering fails on an unknown placeholder so a half-filled prompt never
//! reaches the upstream model.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Closed set of prompts the engines can send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PromptKind {
    GradeOpenQuestion,
    OverallFeedback,
    SummarizePerformance,
    GenerateQuestion,
}

impl PromptKind {
    pub fn system_prompt(self) -> &'static str {
        match self {
            PromptKind::GradeOpenQuestion => GRADE_SYSTEM,
            PromptKind::OverallFeedback => FEEDBACK_SYSTEM,
            PromptKind::SummarizePerformance => SUMMARY_SYSTEM,
            PromptKind::GenerateQuestion => QUESTION_SYSTEM,
        }
    }

    pub fn user_template(self) -> &'static str {
        match self {
            PromptKind::GradeOpenQuestion => GRADE_TEMPLATE,
            PromptKind::OverallFeedback => FEEDBACK_TEMPLATE,
            PromptKind::SummarizePerformance => SUMMARY_TEMPLATE,
            PromptKind::GenerateQuestion => QUESTION_TEMPLATE,
        }
    }

    pub fn temperature(self) -> f64 {
        match self {
            PromptKind::GradeOpenQuestion => 0.3,
            PromptKind::OverallFeedback | PromptKind::SummarizePerformance => 0.7,
            PromptKind::GenerateQuestion => 0.8,
        }
    }

    pub fn max_tokens(self) -> u32 {
        match self {
            PromptKind::GradeOpenQuestion => 500,
            PromptKind::OverallFeedback => 200,
            PromptKind::SummarizePerformance => 300,
            PromptKind::GenerateQuestion => 800,
        }
    }

    /// Whether the response is a JSON document rather than free prose.
    pub fn expects_json(self) -> bool {
        matches!(
            self,
            PromptKind::GradeOpenQuestion | PromptKind::GenerateQuestion
        )
    }
}

impl fmt::Display for PromptKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PromptKind::GradeOpenQuestion => "grade-open-question",
            PromptKind::OverallFeedback => "overall-feedback",
            PromptKind::SummarizePerformance => "summarize-performance",
            PromptKind::GenerateQuestion => "generate-question",
        };
        f.write_str(s)
    }
}

/// Named template parameters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PromptParams(BTreeMap<String, String>);

impl PromptParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.0.insert(key.to_string(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Parse a numeric parameter, if present and well-formed.
    pub fn number(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(|v| v.trim().parse::<f64>().ok())
    }
}

/// Fill `{name}` placeholders in `template`.
///
/// Returns the name of the first placeholder without a value.
pub fn render(template: &str, params: &PromptParams) -> Result<String, String> {
    let mut out = String::with_capacity(template.len() + 256);
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        match after.find('}') {
            Some(end) if is_placeholder(&after[..end]) => {
                let name = &after[..end];
                let value = params.get(name).ok_or_else(|| name.to_string())?;
                out.push_str(value);
                rest = &after[end + 1..];
            }
            _ => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    Ok(out)
}

fn is_placeholder(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_lowercase() || c == '_')
}

const GRADE_SYSTEM: &str = r#"You are an experienced TVET instructor grading student responses for trade courses such as wiring and plumbing.
Evaluate answers fairly and give constructive feedback.

GRADING GUIDELINES:
- Be fair but strict in technical accuracy
- Award partial credit for partially correct answers
- Consider practical application knowledge
- Identify both strengths and areas for improvement
- Provide specific, actionable feedback

OUTPUT FORMAT (JSON only, no markdown):
{
  "score_percentage": <0-100>,
  "strengths": ["strength1", "strength2"],
  "improvements": ["improvement1", "improvement2"],
  "feedback": "detailed feedback text"
}"#;

const GRADE_TEMPLATE: &str = "Grade this student response (worth {max_points} points):

QUESTION: {question}

RUBRIC/EXPECTED ANSWER: {rubric}

Key concepts to look for: {keywords}
Topic context: {context}

STUDENT ANSWER: {answer}

Return ONLY a JSON object with score_percentage (0-100), strengths (list), improvements (list), and feedback (string).";

const FEEDBACK_SYSTEM: &str =
    "You are an encouraging TVET instructor providing constructive feedback.";

const FEEDBACK_TEMPLATE: &str = "Generate brief, encouraging feedback for a TVET student:

Topic: {topic}
Overall Score: {percentage}%
Questions: {question_count}
Key Strengths: {strengths}
Areas to Improve: {improvements}

Provide 2-3 sentences of constructive feedback that's specific and encouraging.";

const SUMMARY_SYSTEM: &str = "You are a supportive TVET instructor. Be encouraging, specific, and practical. Focus on trade skills like wiring and plumbing. Avoid inventing facts that are not in the data.";

const SUMMARY_TEMPLATE: &str = "Student Performance Summary for {student_id}:
- Topics needing urgent review ({urgent_count}): {urgent_topics}
- Topics for skill building ({building_count}): {building_topics}
- Topics ready for advancement ({advancement_count}): {advancement_topics}
- Topic mastery (0-1): {metrics}
- Trends: {trends}

Write two parts separated by a blank line:
1. A short explanation (2-3 sentences) of the learning pattern and what to focus on next.
2. An encouraging motivational message (2-3 sentences) specific to this student's situation.";

const QUESTION_SYSTEM: &str = r#"You are an expert TVET instructor writing assessment questions for trade courses.
Questions test practical, real-world understanding and must be technically accurate.

OUTPUT FORMAT (a single JSON object, no markdown). Include only the fields that apply to the question type:
{
  "question_text": "question here",
  "options": [{"option_id": "A", "text": "..."}, {"option_id": "B", "text": "..."}, {"option_id": "C", "text": "..."}, {"option_id": "D", "text": "..."}],
  "correct_answer": "A" (mcq) or true/false (true_false),
  "explanation": "why the answer is correct",
  "rubric": "grading criteria and key points" (open questions),
  "sample_answer": "exemplary answer" (open questions),
  "keywords": ["key1", "key2"] (open questions)
}"#;

const QUESTION_TEMPLATE: &str = "Write ONE {question_type} question on: {topic}

Difficulty: {difficulty} - {difficulty_guidance}
Focus: {focus}
Reference material:
{reference}

Do not repeat or closely paraphrase any of these existing questions:
{used_questions}

Return a single JSON object following the format specified.";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_fills_placeholders() {
        let params = PromptParams::new().with("name", "Ada").with("topic", "wiring");
        let out = render("Hi {name}, today: {topic}.", &params).unwrap();
        assert_eq!(out, "Hi Ada, today: wiring.");
    }

    #[test]
    fn render_reports_missing_parameter() {
        let err = render("Hi {name}", &PromptParams::new()).unwrap_err();
        assert_eq!(err, "name");
    }

    #[test]
    fn render_leaves_json_braces_alone() {
        let params = PromptParams::new().with("x", "1");
        let out = render(r#"{"a": {x}}"#, &params).unwrap();
        assert_eq!(out, r#"{"a": 1}"#);
    }

    #[test]
    fn every_template_is_fully_specified_by_its_builder_keys() {
        // Keys as built by the grading, recommendation and quiz engines.
        let cases: [(PromptKind, &[&str]); 4] = [
            (
                PromptKind::GradeOpenQuestion,
                &["max_points", "question", "rubric", "keywords", "context", "answer"],
            ),
            (
                PromptKind::OverallFeedback,
                &["topic", "percentage", "question_count", "strengths", "improvements"],
            ),
            (
                PromptKind::SummarizePerformance,
                &[
                    "student_id",
                    "urgent_count",
                    "urgent_topics",
                    "building_count",
                    "building_topics",
                    "advancement_count",
                    "advancement_topics",
                    "metrics",
                    "trends",
                ],
            ),
            (
                PromptKind::GenerateQuestion,
                &[
                    "question_type",
                    "topic",
                    "difficulty",
                    "difficulty_guidance",
                    "focus",
                    "reference",
                    "used_questions",
                ],
            ),
        ];

        for (kind, keys) in cases {
            let full = keys.iter().fold(PromptParams::new(), |p, k| p.with(k, "x"));
            assert!(render(kind.user_template(), &full).is_ok(), "{kind}");

            // Every builder key is actually consumed by the template.
            for missing in keys.iter() {
                let partial = keys
                    .iter()
                    .filter(|k| *k != missing)
                    .fold(PromptParams::new(), |p, k| p.with(k, "x"));
                assert_eq!(
                    render(kind.user_template(), &partial).unwrap_err(),
                    *missing,
                    "{kind}"
                );
            }
        }
    }

    #[test]
    fn kind_display_matches_serde() {
        let json = serde_json::to_string(&PromptKind::SummarizePerformance).unwrap();
        assert_eq!(json, "\"summarize-performance\"");
        assert_eq!(
            PromptKind::SummarizePerformance.to_string(),
            "summarize-performance"
        );
    }
}
