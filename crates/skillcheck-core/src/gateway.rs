//! Text-Generation Gateway.
//!
//! Wraps one [`TextGenerator`] call per invocation: render the prompt for a
//! [`PromptKind`], bound the wait with a timeout, parse the kind-specific
//! payload. Every failure is folded into [`GenerationOutcome::Degraded`]
//! carrying a deterministic fallback payload, so callers always get a value
//! and must branch on the tag. No retries happen here; see [`crate::retry`].

use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::instrument;

use crate::error::ProviderError;
use crate::model::{QuestionType, QuizOption};
use crate::prompts::{render, PromptKind, PromptParams};
use crate::traits::{extract_json_payload, CompletionRequest, TextGenerator};

/// Parsed grading verdict for an open question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenGrading {
    /// Clamped to `[0, 100]`.
    pub score_percentage: f64,
    pub feedback: String,
    pub strengths: Vec<String>,
    pub improvements: Vec<String>,
}

/// A single generated quiz question, validated for its type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedQuestion {
    pub question_type: QuestionType,
    pub text: String,
    pub options: Vec<QuizOption>,
    pub correct_answer: Option<String>,
    pub explanation: String,
    pub rubric: Option<String>,
    pub sample_answer: Option<String>,
    pub keywords: Vec<String>,
}

/// Kind-specific result body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GenerationPayload {
    Grading(OpenGrading),
    Text { text: String },
    Question(GeneratedQuestion),
}

/// Why a generation call did not succeed.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum DegradedReason {
    #[error("timed out after {secs}s")]
    Timeout { secs: u64 },

    #[error("rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    #[error("upstream returned HTTP {status}: {message}")]
    UpstreamStatus { status: u16, message: String },

    #[error("transport failure: {message}")]
    Transport { message: String },

    #[error("generation unavailable: {message}")]
    Unavailable { message: String },

    #[error("unparseable response: {message}")]
    Unparseable { message: String },

    #[error("response missing field `{field}`")]
    MissingField { field: String },

    #[error("prompt parameter `{name}` not supplied")]
    MissingParameter { name: String },
}

impl DegradedReason {
    /// Whether another attempt could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            DegradedReason::Timeout { .. }
            | DegradedReason::RateLimited { .. }
            | DegradedReason::Transport { .. } => true,
            DegradedReason::UpstreamStatus { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Upstream-provided wait hint.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            DegradedReason::RateLimited { retry_after_ms } => {
                Some(Duration::from_millis(*retry_after_ms))
            }
            _ => None,
        }
    }
}

/// Tagged result of one gateway call.
#[derive(Debug, Clone, PartialEq)]
pub enum GenerationOutcome {
    Success {
        payload: GenerationPayload,
    },
    Degraded {
        reason: DegradedReason,
        payload: GenerationPayload,
    },
}

impl GenerationOutcome {
    pub fn is_degraded(&self) -> bool {
        matches!(self, GenerationOutcome::Degraded { .. })
    }

    pub fn payload(&self) -> &GenerationPayload {
        match self {
            GenerationOutcome::Success { payload } | GenerationOutcome::Degraded { payload, .. } => {
                payload
            }
        }
    }

    pub fn into_payload(self) -> GenerationPayload {
        match self {
            GenerationOutcome::Success { payload } | GenerationOutcome::Degraded { payload, .. } => {
                payload
            }
        }
    }
}

/// The single outbound path to the text-generation model.
pub struct Gateway {
    generator: Arc<dyn TextGenerator>,
    model: String,
}

impl Gateway {
    pub fn new(generator: Arc<dyn TextGenerator>, model: impl Into<String>) -> Self {
        Self {
            generator,
            model: model.into(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn provider_name(&self) -> &str {
        self.generator.name()
    }

    /// Run one generation of `kind`. Never fails; inspect the outcome tag.
    #[instrument(skip(self, params), fields(kind = %kind, model = %self.model))]
    pub async fn generate(
        &self,
        kind: PromptKind,
        params: &PromptParams,
        timeout: Duration,
    ) -> GenerationOutcome {
        let start = Instant::now();
        match self.try_generate(kind, params, timeout).await {
            Ok(payload) => {
                tracing::debug!(elapsed_ms = start.elapsed().as_millis() as u64, "generation succeeded");
                GenerationOutcome::Success { payload }
            }
            Err(reason) => {
                tracing::warn!(%reason, "generation degraded, using fallback");
                GenerationOutcome::Degraded {
                    payload: fallback_payload(kind, params),
                    reason,
                }
            }
        }
    }

    async fn try_generate(
        &self,
        kind: PromptKind,
        params: &PromptParams,
        timeout: Duration,
    ) -> Result<GenerationPayload, DegradedReason> {
        let prompt = render(kind.user_template(), params)
            .map_err(|name| DegradedReason::MissingParameter { name })?;
        tracing::debug!(prompt_chars = prompt.len(), "prompt rendered");

        let request = CompletionRequest {
            model: self.model.clone(),
            system_prompt: Some(kind.system_prompt().to_string()),
            prompt,
            max_tokens: kind.max_tokens(),
            temperature: kind.temperature(),
            json_mode: kind.expects_json(),
        };

        let response = match tokio::time::timeout(timeout, self.generator.complete(&request)).await
        {
            Err(_) => {
                return Err(DegradedReason::Timeout {
                    secs: timeout.as_secs(),
                })
            }
            Ok(Err(e)) => return Err(classify_error(&e)),
            Ok(Ok(response)) => response,
        };
        tracing::debug!(
            model = %response.model,
            prompt_tokens = response.token_usage.prompt_tokens,
            completion_tokens = response.token_usage.completion_tokens,
            total_tokens = response.token_usage.total_tokens,
            latency_ms = response.latency_ms,
            "completion received"
        );

        parse_payload(kind, params, &response.content)
    }
}

/// Map a transport error onto a degraded reason.
fn classify_error(err: &anyhow::Error) -> DegradedReason {
    match err.downcast_ref::<ProviderError>() {
        Some(ProviderError::RateLimited { retry_after_ms }) => DegradedReason::RateLimited {
            retry_after_ms: *retry_after_ms,
        },
        Some(ProviderError::Timeout(secs)) => DegradedReason::Timeout { secs: *secs },
        Some(ProviderError::ApiError { status: 0, message }) => DegradedReason::Unparseable {
            message: message.clone(),
        },
        Some(ProviderError::ApiError { status, message }) => DegradedReason::UpstreamStatus {
            status: *status,
            message: message.clone(),
        },
        Some(ProviderError::NetworkError(message)) => DegradedReason::Transport {
            message: message.clone(),
        },
        Some(e) => DegradedReason::Unavailable {
            message: e.to_string(),
        },
        None => DegradedReason::Transport {
            message: format!("{err:#}"),
        },
    }
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Parse the raw model output for `kind`.
pub fn parse_payload(
    kind: PromptKind,
    params: &PromptParams,
    content: &str,
) -> Result<GenerationPayload, DegradedReason> {
    match kind {
        PromptKind::GradeOpenQuestion => parse_grading(content).map(GenerationPayload::Grading),
        PromptKind::OverallFeedback | PromptKind::SummarizePerformance => {
            let text = content.trim();
            if text.is_empty() {
                return Err(DegradedReason::MissingField {
                    field: "content".into(),
                });
            }
            Ok(GenerationPayload::Text {
                text: text.to_string(),
            })
        }
        PromptKind::GenerateQuestion => {
            let question_type = requested_question_type(params);
            parse_question(content, question_type).map(GenerationPayload::Question)
        }
    }
}

fn parse_json(content: &str) -> Result<Value, DegradedReason> {
    let json = extract_json_payload(content);
    serde_json::from_str::<Value>(&json).map_err(|e| DegradedReason::Unparseable {
        message: e.to_string(),
    })
}

fn missing(field: &str) -> DegradedReason {
    DegradedReason::MissingField {
        field: field.to_string(),
    }
}

fn string_list(value: &Value, key: &str) -> Vec<String> {
    value
        .get(key)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().trim_end_matches('%').parse().ok(),
        _ => None,
    }
}

fn parse_grading(content: &str) -> Result<OpenGrading, DegradedReason> {
    let value = parse_json(content)?;
    let score = value
        .get("score_percentage")
        .and_then(number)
        .filter(|s| s.is_finite())
        .ok_or_else(|| missing("score_percentage"))?;

    let feedback = value
        .get("feedback")
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .unwrap_or("Response evaluated.")
        .to_string();

    Ok(OpenGrading {
        score_percentage: score.clamp(0.0, 100.0),
        feedback,
        strengths: string_list(&value, "strengths"),
        improvements: string_list(&value, "improvements"),
    })
}

fn requested_question_type(params: &PromptParams) -> QuestionType {
    params
        .get("question_type")
        .and_then(|t| QuestionType::from_str(t).ok())
        .unwrap_or(QuestionType::Mcq)
}

const MCQ_LABELS: [&str; 4] = ["A", "B", "C", "D"];

fn parse_question(
    content: &str,
    question_type: QuestionType,
) -> Result<GeneratedQuestion, DegradedReason> {
    let value = parse_json(content)?;
    let text = value
        .get("question_text")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| missing("question_text"))?
        .to_string();
    let explanation = value
        .get("explanation")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let mut question = GeneratedQuestion {
        question_type,
        text,
        options: Vec::new(),
        correct_answer: None,
        explanation,
        rubric: None,
        sample_answer: None,
        keywords: Vec::new(),
    };

    match question_type {
        QuestionType::Mcq => {
            let options: Vec<QuizOption> = value
                .get("options")
                .and_then(Value::as_array)
                .ok_or_else(|| missing("options"))?
                .iter()
                .filter_map(|o| {
                    Some(QuizOption {
                        option_id: o.get("option_id")?.as_str()?.trim().to_uppercase(),
                        text: o.get("text")?.as_str()?.to_string(),
                    })
                })
                .collect();
            let labels: Vec<&str> = options.iter().map(|o| o.option_id.as_str()).collect();
            if labels != MCQ_LABELS {
                return Err(missing("options"));
            }
            let answer = value
                .get("correct_answer")
                .and_then(Value::as_str)
                .map(|a| a.trim().to_uppercase())
                .filter(|a| MCQ_LABELS.contains(&a.as_str()))
                .ok_or_else(|| missing("correct_answer"))?;
            question.options = options;
            question.correct_answer = Some(answer);
        }
        QuestionType::TrueFalse => {
            let answer = match value.get("correct_answer") {
                Some(Value::Bool(b)) => *b,
                Some(Value::String(s)) if s.eq_ignore_ascii_case("true") => true,
                Some(Value::String(s)) if s.eq_ignore_ascii_case("false") => false,
                _ => return Err(missing("correct_answer")),
            };
            question.correct_answer = Some(answer.to_string());
        }
        QuestionType::ShortAnswer | QuestionType::Essay | QuestionType::Practical => {
            let rubric = value
                .get("rubric")
                .and_then(Value::as_str)
                .filter(|s| !s.trim().is_empty())
                .ok_or_else(|| missing("rubric"))?;
            question.rubric = Some(rubric.to_string());
            question.sample_answer = value
                .get("sample_answer")
                .and_then(Value::as_str)
                .map(str::to_string);
            question.keywords = string_list(&value, "keywords");
        }
    }

    Ok(question)
}

// ---------------------------------------------------------------------------
// Fallbacks
// ---------------------------------------------------------------------------

/// Generic feedback attached to keyword-scored answers.
pub const FALLBACK_GRADING_FEEDBACK: &str =
    "Automated evaluation was unavailable, so this answer was scored by key-concept matching.";

/// Deterministic stand-in payload used when generation degrades.
pub fn fallback_payload(kind: PromptKind, params: &PromptParams) -> GenerationPayload {
    match kind {
        PromptKind::GradeOpenQuestion => GenerationPayload::Grading(OpenGrading {
            score_percentage: 0.0,
            feedback: FALLBACK_GRADING_FEEDBACK.to_string(),
            strengths: Vec::new(),
            improvements: vec![
                "Include more key concepts".to_string(),
                "Add technical details".to_string(),
            ],
        }),
        PromptKind::OverallFeedback => GenerationPayload::Text {
            text: fallback_overall_feedback(params),
        },
        PromptKind::SummarizePerformance => GenerationPayload::Text {
            text: fallback_summary(params),
        },
        PromptKind::GenerateQuestion => {
            GenerationPayload::Question(placeholder_question(params))
        }
    }
}

fn fallback_overall_feedback(params: &PromptParams) -> String {
    let topic = params.get("topic").unwrap_or("this topic");
    let percentage = params.number("percentage").unwrap_or(0.0);
    if percentage >= 80.0 {
        format!(
            "Excellent work on {topic}! You've demonstrated strong understanding. Keep up the great effort!"
        )
    } else if percentage >= 60.0 {
        format!(
            "Good effort on {topic}. You're on the right track. Focus on the areas marked for improvement to reach mastery."
        )
    } else {
        format!(
            "You're making progress on {topic}. Review the feedback carefully and practice the concepts that need work."
        )
    }
}

fn fallback_summary(params: &PromptParams) -> String {
    let student = params.get("student_id").unwrap_or("This student");
    let count = |key: &str| params.number(key).unwrap_or(0.0) as u64;
    let urgent = count("urgent_count");
    let building = count("building_count");
    let advancement = count("advancement_count");

    let mut text = format!(
        "{student} has {urgent} topic(s) needing urgent review, {building} for skill building and {advancement} ready for advancement."
    );
    if urgent > 0 {
        if let Some(topics) = params.get("urgent_topics") {
            text.push_str(&format!(" Start with {topics}."));
        }
    } else if building > 0 {
        if let Some(topics) = params.get("building_topics") {
            text.push_str(&format!(" Focus practice on {topics}."));
        }
    }
    text
}

fn placeholder_question(params: &PromptParams) -> GeneratedQuestion {
    let question_type = requested_question_type(params);
    let topic = params.get("topic").unwrap_or("the course");
    let focus = params
        .get("focus")
        .filter(|f| !f.is_empty() && *f != "general")
        .map(|f| format!(" ({f})"))
        .unwrap_or_default();
    let text = format!(
        "Question about {topic}{focus} (automatic generation unavailable - please regenerate)"
    );

    let mut question = GeneratedQuestion {
        question_type,
        text,
        options: Vec::new(),
        correct_answer: None,
        explanation: "Explanation pending - regenerate quiz".to_string(),
        rubric: None,
        sample_answer: None,
        keywords: Vec::new(),
    };
    match question_type {
        QuestionType::Mcq => {
            question.options = MCQ_LABELS
                .iter()
                .map(|label| QuizOption {
                    option_id: label.to_string(),
                    text: format!("Option {label}"),
                })
                .collect();
            question.correct_answer = Some("A".to_string());
        }
        QuestionType::TrueFalse => question.correct_answer = Some("true".to_string()),
        _ => question.rubric = Some(format!("Assess against the course material on {topic}.")),
    }
    question
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Reply, ScriptedGenerator};

    fn gateway(generator: ScriptedGenerator) -> Gateway {
        Gateway::new(Arc::new(generator), "test-model")
    }

    fn grade_params() -> PromptParams {
        PromptParams::new()
            .with("max_points", "10")
            .with("question", "Explain series circuits")
            .with("rubric", "Current is the same everywhere")
            .with("keywords", "series, current")
            .with("context", "none")
            .with("answer", "In series the current is the same")
    }

    #[tokio::test]
    async fn success_parses_grading_payload() {
        let gen = ScriptedGenerator::fixed(Reply::text(
            "```json\n{\"score_percentage\": 120, \"feedback\": \"Good\", \"strengths\": [\"clear\"]}\n```",
        ));
        let outcome = gateway(gen)
            .generate(PromptKind::GradeOpenQuestion, &grade_params(), Duration::from_secs(5))
            .await;
        match outcome {
            GenerationOutcome::Success {
                payload: GenerationPayload::Grading(g),
            } => {
                assert_eq!(g.score_percentage, 100.0);
                assert_eq!(g.feedback, "Good");
                assert_eq!(g.strengths, vec!["clear".to_string()]);
            }
            other => panic!("expected success, got {other:?}"),
        }
    }

    #[derive(Clone, Default)]
    struct LogBuffer(Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn completion_usage_is_logged() {
        let logs = LogBuffer::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let gen = ScriptedGenerator::fixed(Reply::text("{\"score_percentage\": 50, \"feedback\": \"ok\"}"));
        let outcome = gateway(gen)
            .generate(PromptKind::GradeOpenQuestion, &grade_params(), Duration::from_secs(5))
            .await;
        assert!(!outcome.is_degraded());

        let output = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        let line = output
            .lines()
            .find(|l| l.contains("completion received"))
            .expect("completion event");
        assert!(line.contains("model=test-model"), "{line}");
        assert!(line.contains("prompt_tokens=0"), "{line}");
        assert!(line.contains("latency_ms=1"), "{line}");
    }

    #[tokio::test]
    async fn missing_score_degrades() {
        let gen = ScriptedGenerator::fixed(Reply::text("{\"feedback\": \"no score\"}"));
        let outcome = gateway(gen)
            .generate(PromptKind::GradeOpenQuestion, &grade_params(), Duration::from_secs(5))
            .await;
        match outcome {
            GenerationOutcome::Degraded { reason, payload } => {
                assert_eq!(
                    reason,
                    DegradedReason::MissingField {
                        field: "score_percentage".into()
                    }
                );
                assert!(matches!(payload, GenerationPayload::Grading(g) if g.score_percentage == 0.0));
            }
            other => panic!("expected degraded, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn malformed_json_degrades() {
        let gen = ScriptedGenerator::fixed(Reply::text("I think it deserves a B"));
        let outcome = gateway(gen)
            .generate(PromptKind::GradeOpenQuestion, &grade_params(), Duration::from_secs(5))
            .await;
        assert!(matches!(
            outcome,
            GenerationOutcome::Degraded {
                reason: DegradedReason::Unparseable { .. },
                ..
            }
        ));
    }

    #[tokio::test]
    async fn upstream_status_degrades() {
        let gen = ScriptedGenerator::fixed(Reply::Status(503));
        let outcome = gateway(gen)
            .generate(PromptKind::GradeOpenQuestion, &grade_params(), Duration::from_secs(5))
            .await;
        match outcome {
            GenerationOutcome::Degraded { reason, .. } => {
                assert!(matches!(reason, DegradedReason::UpstreamStatus { status: 503, .. }));
                assert!(reason.is_transient());
            }
            other => panic!("expected degraded, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_degrades() {
        let gen = ScriptedGenerator::fixed(Reply::Hang);
        let outcome = gateway(gen)
            .generate(PromptKind::GradeOpenQuestion, &grade_params(), Duration::from_secs(30))
            .await;
        assert!(matches!(
            outcome,
            GenerationOutcome::Degraded {
                reason: DegradedReason::Timeout { secs: 30 },
                ..
            }
        ));
    }

    #[tokio::test]
    async fn missing_parameter_degrades_without_calling_upstream() {
        let gen = Arc::new(ScriptedGenerator::fixed(Reply::text("{}")));
        let gateway = Gateway::new(gen.clone(), "m");
        let outcome = gateway
            .generate(PromptKind::GradeOpenQuestion, &PromptParams::new(), Duration::from_secs(5))
            .await;
        assert!(matches!(
            outcome,
            GenerationOutcome::Degraded {
                reason: DegradedReason::MissingParameter { .. },
                ..
            }
        ));
        assert_eq!(gen.call_count(), 0);
    }

    #[test]
    fn mcq_requires_four_labelled_options() {
        let three = r#"{"question_text": "Q", "options": [
            {"option_id": "A", "text": "a"}, {"option_id": "B", "text": "b"},
            {"option_id": "C", "text": "c"}], "correct_answer": "A"}"#;
        assert_eq!(
            parse_question(three, QuestionType::Mcq),
            Err(DegradedReason::MissingField {
                field: "options".into()
            })
        );

        let four = r#"{"question_text": "Q", "options": [
            {"option_id": "a", "text": "a"}, {"option_id": "B", "text": "b"},
            {"option_id": "C", "text": "c"}, {"option_id": "D", "text": "d"}],
            "correct_answer": "d"}"#;
        let q = parse_question(four, QuestionType::Mcq).unwrap();
        assert_eq!(q.correct_answer.as_deref(), Some("D"));
        assert_eq!(q.options[0].option_id, "A");
    }

    #[test]
    fn true_false_accepts_bool_or_string() {
        let q = parse_question(
            r#"{"question_text": "Water is wet", "correct_answer": "False"}"#,
            QuestionType::TrueFalse,
        )
        .unwrap();
        assert_eq!(q.correct_answer.as_deref(), Some("false"));
    }

    #[test]
    fn open_question_requires_rubric() {
        let err = parse_question(r#"{"question_text": "Why?"}"#, QuestionType::Essay).unwrap_err();
        assert_eq!(err, DegradedReason::MissingField { field: "rubric".into() });
    }

    #[test]
    fn summary_fallback_is_built_from_counts() {
        let params = PromptParams::new()
            .with("student_id", "stu-1")
            .with("urgent_count", "1")
            .with("building_count", "2")
            .with("advancement_count", "0")
            .with("urgent_topics", "Safety");
        let GenerationPayload::Text { text } =
            fallback_payload(PromptKind::SummarizePerformance, &params)
        else {
            panic!("expected text payload");
        };
        assert_eq!(
            text,
            "stu-1 has 1 topic(s) needing urgent review, 2 for skill building and 0 ready for advancement. Start with Safety."
        );
    }

    #[test]
    fn placeholder_keeps_requested_type() {
        let params = PromptParams::new()
            .with("question_type", "true_false")
            .with("topic", "Plumbing");
        let GenerationPayload::Question(q) = fallback_payload(PromptKind::GenerateQuestion, &params)
        else {
            panic!("expected question payload");
        };
        assert_eq!(q.question_type, QuestionType::TrueFalse);
        assert_eq!(q.correct_answer.as_deref(), Some("true"));
    }

    #[test]
    fn classify_downcasts_provider_errors() {
        let err: anyhow::Error = ProviderError::RateLimited {
            retry_after_ms: 2000,
        }
        .into();
        let reason = classify_error(&err);
        assert_eq!(reason.retry_after(), Some(Duration::from_millis(2000)));

        let err: anyhow::Error = ProviderError::AuthenticationFailed("bad key".into()).into();
        assert!(!classify_error(&err).is_transient());
    }
}
