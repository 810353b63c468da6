//! Core data model for skillcheck.
//!
//! Input records (`Submission`, `PerformanceRecord`, `QuizSpec`) arrive
//! already schema-validated from the surrounding service. Output records are
//! derived values; nothing here is mutated after construction.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Question types
// ---------------------------------------------------------------------------

/// Deterministically scorable question types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClosedQuestionType {
    Mcq,
    TrueFalse,
}

/// Question types that need qualitative judgement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpenQuestionType {
    ShortAnswer,
    Essay,
    Practical,
}

/// Every question type, in canonical quiz order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    Mcq,
    TrueFalse,
    ShortAnswer,
    Essay,
    Practical,
}

impl QuestionType {
    pub const ALL: [QuestionType; 5] = [
        QuestionType::Mcq,
        QuestionType::TrueFalse,
        QuestionType::ShortAnswer,
        QuestionType::Essay,
        QuestionType::Practical,
    ];

    pub fn is_closed(self) -> bool {
        matches!(self, QuestionType::Mcq | QuestionType::TrueFalse)
    }

    /// Points a generated question of this type is worth.
    pub fn default_points(self) -> f64 {
        match self {
            QuestionType::Mcq => 5.0,
            QuestionType::TrueFalse => 3.0,
            QuestionType::ShortAnswer => 10.0,
            QuestionType::Essay => 20.0,
            QuestionType::Practical => 15.0,
        }
    }

    /// Average time a learner spends on one question of this type.
    pub fn average_seconds(self) -> u64 {
        match self {
            QuestionType::Mcq | QuestionType::TrueFalse => 90,
            QuestionType::ShortAnswer => 300,
            QuestionType::Essay => 900,
            QuestionType::Practical => 600,
        }
    }
}

impl From<ClosedQuestionType> for QuestionType {
    fn from(t: ClosedQuestionType) -> Self {
        match t {
            ClosedQuestionType::Mcq => QuestionType::Mcq,
            ClosedQuestionType::TrueFalse => QuestionType::TrueFalse,
        }
    }
}

impl From<OpenQuestionType> for QuestionType {
    fn from(t: OpenQuestionType) -> Self {
        match t {
            OpenQuestionType::ShortAnswer => QuestionType::ShortAnswer,
            OpenQuestionType::Essay => QuestionType::Essay,
            OpenQuestionType::Practical => QuestionType::Practical,
        }
    }
}

impl fmt::Display for QuestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            QuestionType::Mcq => "mcq",
            QuestionType::TrueFalse => "true_false",
            QuestionType::ShortAnswer => "short_answer",
            QuestionType::Essay => "essay",
            QuestionType::Practical => "practical",
        };
        f.write_str(s)
    }
}

impl FromStr for QuestionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "mcq" | "multiple_choice" => Ok(QuestionType::Mcq),
            "true_false" | "tf" => Ok(QuestionType::TrueFalse),
            "short_answer" | "short" => Ok(QuestionType::ShortAnswer),
            "essay" => Ok(QuestionType::Essay),
            "practical" => Ok(QuestionType::Practical),
            other => Err(format!("unknown question type: {other}")),
        }
    }
}

/// Requested quiz difficulty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Beginner,
    #[default]
    Intermediate,
    Advanced,
}

impl Difficulty {
    /// One-line guidance for the question writer.
    pub fn guidance(self) -> &'static str {
        match self {
            Difficulty::Beginner => "Basic concepts and definitions. Simple scenarios.",
            Difficulty::Intermediate => "Application of concepts. Problem-solving scenarios.",
            Difficulty::Advanced => {
                "Complex scenarios. Integration of multiple concepts. Troubleshooting."
            }
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Difficulty::Beginner => write!(f, "beginner"),
            Difficulty::Intermediate => write!(f, "intermediate"),
            Difficulty::Advanced => write!(f, "advanced"),
        }
    }
}

impl FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "beginner" => Ok(Difficulty::Beginner),
            "intermediate" => Ok(Difficulty::Intermediate),
            "advanced" => Ok(Difficulty::Advanced),
            other => Err(format!("unknown difficulty: {other}")),
        }
    }
}

// ---------------------------------------------------------------------------
// Submissions
// ---------------------------------------------------------------------------

/// An mcq or true/false question with the student's answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClosedQuestion {
    pub id: String,
    pub text: String,
    #[serde(rename = "type")]
    pub question_type: ClosedQuestionType,
    pub correct_answer: String,
    pub student_answer: String,
    pub max_points: f64,
}

/// A short-answer, essay or practical question with the student's answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenQuestion {
    pub id: String,
    pub text: String,
    #[serde(rename = "type")]
    pub question_type: OpenQuestionType,
    pub rubric: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    pub student_answer: String,
    pub max_points: f64,
    /// Optional topic context handed to the grader.
    #[serde(default)]
    pub context: Option<String>,
}

/// One student's answers for one topic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Submission {
    pub id: String,
    pub student_id: String,
    pub topic: String,
    #[serde(default)]
    pub closed_questions: Vec<ClosedQuestion>,
    #[serde(default)]
    pub open_questions: Vec<OpenQuestion>,
}

// ---------------------------------------------------------------------------
// Grading results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Correctness {
    Correct,
    Partial,
    Incorrect,
}

/// Who produced a question's score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GradingSource {
    /// Exact-match scoring of a closed question.
    Deterministic,
    /// Score taken from the text-generation model.
    Model,
    /// Keyword-coverage credit used because the model was unavailable.
    Fallback,
}

/// Score and feedback for one question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionResult {
    pub question_id: String,
    pub question_type: QuestionType,
    pub max_points: f64,
    pub awarded: f64,
    pub correctness: Correctness,
    pub feedback: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched_keywords: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub missing_keywords: Option<Vec<String>>,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub improvements: Vec<String>,
    pub source: GradingSource,
    /// The model's score disagrees sharply with the keyword heuristic.
    #[serde(default)]
    pub needs_review: bool,
}

impl QuestionResult {
    pub fn is_fallback(&self) -> bool {
        self.source == GradingSource::Fallback
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MasteryTag {
    Mastered,
    Developing,
    NeedsSupport,
}

/// Graded submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionResult {
    pub submission_id: String,
    pub student_id: String,
    pub topic: String,
    /// Closed questions first, then open questions, each in input order.
    pub question_results: Vec<QuestionResult>,
    pub total_awarded: f64,
    pub total_possible: f64,
    /// `total_awarded / total_possible` in `[0, 1]`; zero when nothing was possible.
    pub percentage: f64,
    pub letter_grade: char,
    pub overall_feedback: String,
    /// The overall feedback is templated because generation degraded.
    pub feedback_degraded: bool,
    pub topic_mastery: BTreeMap<String, MasteryTag>,
    pub graded_at: DateTime<Utc>,
}

impl SubmissionResult {
    /// Number of open questions scored by the keyword fallback.
    pub fn fallback_count(&self) -> usize {
        self.question_results
            .iter()
            .filter(|r| r.is_fallback())
            .count()
    }
}

// ---------------------------------------------------------------------------
// Performance & recommendations
// ---------------------------------------------------------------------------

/// One observed score for one topic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceRecord {
    pub topic: String,
    pub score: f64,
    pub max_score: f64,
    /// When the observation was made; input order is used when absent.
    #[serde(default)]
    pub recorded_at: Option<DateTime<Utc>>,
}

/// Topic name to normalized mastery in `[0, 1]`. A missing key means no data.
pub type TopicMetrics = BTreeMap<String, f64>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TierTag {
    UrgentReview,
    SkillBuilding,
    Advancement,
}

impl TierTag {
    pub fn rationale(self) -> &'static str {
        match self {
            TierTag::UrgentReview => "Below the foundation threshold - immediate review needed",
            TierTag::SkillBuilding => "Below mastery threshold - targeted practice needed",
            TierTag::Advancement => "Strong foundation - ready for advanced concepts",
        }
    }

    /// Suggested weekly study hours per topic in this tier.
    pub fn hours_per_topic(self) -> f64 {
        match self {
            TierTag::UrgentReview => 3.0,
            TierTag::SkillBuilding => 2.0,
            TierTag::Advancement => 1.5,
        }
    }
}

impl fmt::Display for TierTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TierTag::UrgentReview => write!(f, "urgent_review"),
            TierTag::SkillBuilding => write!(f, "skill_building"),
            TierTag::Advancement => write!(f, "advancement"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudyPlanTier {
    pub tag: TierTag,
    /// Weakest first.
    pub topics: Vec<String>,
    pub rationale: String,
    pub suggested_hours: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendClass {
    Improving,
    Declining,
    Stable,
    InsufficientData,
}

impl fmt::Display for TrendClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TrendClass::Improving => "improving",
            TrendClass::Declining => "declining",
            TrendClass::Stable => "stable",
            TrendClass::InsufficientData => "insufficient data",
        })
    }
}

/// Change in one topic between two snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicTrend {
    pub classification: TrendClass,
    /// `current - previous`; absent when the topic is in only one snapshot.
    pub magnitude: Option<f64>,
    pub previous: Option<f64>,
    pub current: Option<f64>,
}

/// Result of comparing two metric snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendResult {
    pub topics: BTreeMap<String, TopicTrend>,
    /// No topic is shared between the snapshots.
    pub insufficient_data: bool,
    /// Classification of the mean change over shared topics.
    pub overall: TrendClass,
    pub overall_magnitude: Option<f64>,
}

// ---------------------------------------------------------------------------
// Quizzes
// ---------------------------------------------------------------------------

/// A request for a quiz.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuizSpec {
    pub topic: String,
    #[serde(default)]
    pub subtopics: Vec<String>,
    #[serde(default)]
    pub difficulty: Difficulty,
    /// Requested count per question type. Signed so that negative requests
    /// can be rejected instead of wrapping.
    pub counts: BTreeMap<QuestionType, i64>,
    #[serde(default)]
    pub reference_material: Option<String>,
    #[serde(default)]
    pub excluded_topics: Vec<String>,
    /// Weak-area signals; non-empty switches on adaptive reallocation.
    #[serde(default)]
    pub weak_areas: Vec<String>,
}

/// One group of identical question slots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizBucket {
    pub question_type: QuestionType,
    pub count: u32,
    pub difficulty: Difficulty,
    /// Weak area this bucket targets; `None` for the general pool.
    #[serde(default)]
    pub focus: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizPlan {
    pub topic: String,
    pub difficulty: Difficulty,
    /// Subtopics left after exclusions.
    pub subtopics: Vec<String>,
    #[serde(default)]
    pub reference_material: Option<String>,
    pub buckets: Vec<QuizBucket>,
    pub total_questions: u32,
    pub estimated_duration_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizOption {
    pub option_id: String,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionOrigin {
    Generated,
    Placeholder,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizQuestion {
    pub question_type: QuestionType,
    pub difficulty: Difficulty,
    #[serde(default)]
    pub subtopic: Option<String>,
    pub text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<QuizOption>,
    #[serde(default)]
    pub correct_answer: Option<String>,
    #[serde(default)]
    pub explanation: String,
    #[serde(default)]
    pub rubric: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub sample_answer: Option<String>,
    pub points: f64,
    pub origin: QuestionOrigin,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quiz {
    pub quiz_id: uuid::Uuid,
    pub topic: String,
    pub difficulty: Difficulty,
    pub questions: Vec<QuizQuestion>,
    pub total_points: f64,
    pub estimated_duration_secs: u64,
    /// `false` when generation was cancelled before every slot was filled.
    pub complete: bool,
    pub placeholder_count: usize,
    pub generated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn question_type_display_and_parse() {
        assert_eq!(QuestionType::TrueFalse.to_string(), "true_false");
        assert_eq!("MCQ".parse::<QuestionType>().unwrap(), QuestionType::Mcq);
        assert_eq!(
            "short-answer".parse::<QuestionType>().unwrap(),
            QuestionType::ShortAnswer
        );
        assert!("matching".parse::<QuestionType>().is_err());
        assert_eq!("Advanced".parse::<Difficulty>().unwrap(), Difficulty::Advanced);
        assert!("expert".parse::<Difficulty>().is_err());
    }

    #[test]
    fn submission_deserializes_with_type_field() {
        let json = r#"{
            "id": "s1", "student_id": "st", "topic": "Wiring",
            "closed_questions": [{
                "id": "q1", "text": "Pick", "type": "mcq",
                "correct_answer": "C", "student_answer": "c", "max_points": 5
            }]
        }"#;
        let sub: Submission = serde_json::from_str(json).unwrap();
        assert_eq!(sub.closed_questions[0].question_type, ClosedQuestionType::Mcq);
        assert!(sub.open_questions.is_empty());
    }

    #[test]
    fn quiz_spec_counts_keyed_by_type() {
        let json = r#"{"topic": "Plumbing", "counts": {"mcq": 3, "essay": 1}}"#;
        let spec: QuizSpec = serde_json::from_str(json).unwrap();
        assert_eq!(spec.counts[&QuestionType::Mcq], 3);
        assert_eq!(spec.difficulty, Difficulty::Intermediate);
    }

    #[test]
    fn canonical_type_order() {
        let mut types = vec![QuestionType::Essay, QuestionType::Mcq, QuestionType::TrueFalse];
        types.sort();
        assert_eq!(
            types,
            vec![QuestionType::Mcq, QuestionType::TrueFalse, QuestionType::Essay]
        );
    }
}
