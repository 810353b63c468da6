//! Quiz Composition Engine.
//!
//! [`plan_quiz`] is pure: it validates a [`QuizSpec`] and turns it into
//! buckets, reallocating part of the quiz toward weak areas in adaptive mode.
//! [`QuizEngine::generate_quiz`] fills every planned slot with one gateway
//! call; a degraded call yields a placeholder of the same type, so the quiz
//! always has exactly the planned number of questions.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::stream::{FuturesUnordered, StreamExt};
use tokio::sync::watch;

use crate::batch::{is_cancelled, wait_for_cancel};
use crate::error::AssessError;
use crate::gateway::{fallback_payload, Gateway, GeneratedQuestion, GenerationPayload};
use crate::model::{
    Difficulty, QuestionOrigin, QuestionType, Quiz, QuizBucket, QuizPlan, QuizQuestion, QuizSpec,
    TopicMetrics,
};
use crate::prompts::{PromptKind, PromptParams};
use crate::retry::generate_with_retry;
use crate::settings::{EngineSettings, Thresholds};

/// Longest reference excerpt sent with a generation prompt, in characters.
pub const MAX_REFERENCE_CHARS: usize = 1000;

/// Earlier question texts passed along to discourage duplicates.
const MAX_USED_QUESTIONS: usize = 20;

/// Largest-remainder apportionment of `total` proportionally to `weights`.
///
/// Ties in the remainder go to the earlier index. The result always sums to
/// `total` when at least one weight is positive.
fn apportion(total: u64, weights: &[u64]) -> Vec<u64> {
    let weight_sum: u64 = weights.iter().sum();
    if weight_sum == 0 {
        return vec![0; weights.len()];
    }
    let mut shares: Vec<u64> = weights.iter().map(|w| total * w / weight_sum).collect();
    let mut remainders: Vec<(usize, u64)> = weights
        .iter()
        .enumerate()
        .map(|(i, w)| (i, total * w % weight_sum))
        .collect();
    remainders.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

    let leftover = total - shares.iter().sum::<u64>();
    for (i, _) in remainders.into_iter().take(leftover as usize) {
        shares[i] += 1;
    }
    shares
}

/// Trimmed, non-empty, case-insensitively unique, and not excluded.
fn filter_topics(topics: &[String], excluded: &[String]) -> Vec<String> {
    let excluded: Vec<String> = excluded.iter().map(|e| e.trim().to_lowercase()).collect();
    let mut kept: Vec<String> = Vec::new();
    for topic in topics {
        let topic = topic.trim();
        let key = topic.to_lowercase();
        if topic.is_empty()
            || excluded.contains(&key)
            || kept.iter().any(|k| k.to_lowercase() == key)
        {
            continue;
        }
        kept.push(topic.to_string());
    }
    kept
}

/// Validate a quiz spec and lay out its question buckets.
pub fn plan_quiz(spec: &QuizSpec) -> Result<QuizPlan, AssessError> {
    if spec.topic.trim().is_empty() {
        return Err(AssessError::InvalidSpec("quiz topic is empty".into()));
    }
    let mut counts: BTreeMap<QuestionType, u64> = BTreeMap::new();
    for (question_type, count) in &spec.counts {
        if *count < 0 {
            return Err(AssessError::InvalidSpec(format!(
                "requested {count} {question_type} questions"
            )));
        }
        counts.insert(*question_type, *count as u64);
    }
    let total: u64 = counts.values().sum();
    if total < 1 {
        return Err(AssessError::InvalidSpec(
            "quiz must request at least one question".into(),
        ));
    }
    let total_questions = u32::try_from(total)
        .map_err(|_| AssessError::InvalidSpec(format!("{total} questions is too many")))?;

    let subtopics = filter_topics(&spec.subtopics, &spec.excluded_topics);
    let weak_areas = filter_topics(&spec.weak_areas, &spec.excluded_topics);

    let types: Vec<QuestionType> = QuestionType::ALL
        .into_iter()
        .filter(|t| counts.get(t).copied().unwrap_or(0) > 0)
        .collect();
    let requested: Vec<u64> = types.iter().map(|t| counts[t]).collect();

    let weak_per_type = if weak_areas.is_empty() {
        vec![0; types.len()]
    } else {
        apportion(total / 2, &requested)
    };

    let bucket = |question_type: QuestionType, count: u64, focus: Option<String>| QuizBucket {
        question_type,
        count: count as u32,
        difficulty: spec.difficulty,
        focus,
    };

    let mut buckets = Vec::new();
    for ((t, asked), weak) in types.iter().zip(&requested).zip(&weak_per_type) {
        let general = asked - weak;
        if general > 0 {
            buckets.push(bucket(*t, general, None));
        }
    }

    // Each type's weak share is split evenly across areas; the area that
    // receives the next leftover question rotates so no area is favoured.
    let mut offset = 0;
    for (t, weak) in types.iter().zip(&weak_per_type) {
        if *weak == 0 {
            continue;
        }
        let areas = weak_areas.len() as u64;
        let base = weak / areas;
        let extra = (weak % areas) as usize;
        for (i, area) in weak_areas.iter().enumerate() {
            let rotated = (i + weak_areas.len() - offset) % weak_areas.len();
            let count = base + u64::from(rotated < extra);
            if count > 0 {
                buckets.push(bucket(*t, count, Some(area.clone())));
            }
        }
        offset = (offset + extra) % weak_areas.len();
    }

    let estimated_duration_secs = buckets
        .iter()
        .map(|b| b.question_type.average_seconds() * u64::from(b.count))
        .sum();

    tracing::debug!(
        topic = %spec.topic,
        total_questions,
        buckets = buckets.len(),
        adaptive = !weak_areas.is_empty(),
        "quiz planned"
    );

    Ok(QuizPlan {
        topic: spec.topic.trim().to_string(),
        difficulty: spec.difficulty,
        subtopics,
        reference_material: spec.reference_material.clone(),
        buckets,
        total_questions,
        estimated_duration_secs,
    })
}

/// Difficulty suited to a learner's recent mean mastery.
pub fn adaptive_difficulty(recent: &TopicMetrics) -> Difficulty {
    if recent.is_empty() {
        return Difficulty::Intermediate;
    }
    let mean = recent.values().sum::<f64>() / recent.len() as f64;
    if mean >= 0.8 {
        Difficulty::Advanced
    } else if mean >= 0.6 {
        Difficulty::Intermediate
    } else {
        Difficulty::Beginner
    }
}

/// Build a personalised quiz spec from recent mastery.
///
/// Half the questions are mcq, 30% true/false and the rest short answer.
/// Topics below the skill-building threshold become weak areas, weakest first.
pub fn adaptive_spec(
    topic: &str,
    total: u32,
    recent: &TopicMetrics,
    thresholds: &Thresholds,
) -> QuizSpec {
    let total = i64::from(total);
    let mcq = total * 5 / 10;
    let true_false = total * 3 / 10;
    let short = total - mcq - true_false;

    let mut weak: Vec<(&String, f64)> = recent
        .iter()
        .filter(|(_, m)| **m < thresholds.skill_building_from)
        .map(|(t, m)| (t, *m))
        .collect();
    weak.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(b.0)));

    QuizSpec {
        topic: topic.to_string(),
        difficulty: adaptive_difficulty(recent),
        counts: BTreeMap::from([
            (QuestionType::Mcq, mcq),
            (QuestionType::TrueFalse, true_false),
            (QuestionType::ShortAnswer, short),
        ]),
        weak_areas: weak.into_iter().map(|(t, _)| t.clone()).collect(),
        ..QuizSpec::default()
    }
}

/// One question slot to fill.
#[derive(Debug, Clone)]
struct Slot {
    question_type: QuestionType,
    difficulty: Difficulty,
    subtopic: Option<String>,
}

/// Expand buckets into slots; general slots cycle through the subtopics.
fn expand_slots(plan: &QuizPlan) -> Vec<Slot> {
    let mut subtopics = plan.subtopics.iter().cycle();
    let mut slots = Vec::with_capacity(plan.total_questions as usize);
    for bucket in &plan.buckets {
        for _ in 0..bucket.count {
            let subtopic = match &bucket.focus {
                Some(focus) => Some(focus.clone()),
                None => subtopics.next().cloned(),
            };
            slots.push(Slot {
                question_type: bucket.question_type,
                difficulty: bucket.difficulty,
                subtopic,
            });
        }
    }
    slots
}

fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((end, _)) => text[..end].to_string(),
        None => text.to_string(),
    }
}

fn to_quiz_question(slot: &Slot, generated: GeneratedQuestion, origin: QuestionOrigin) -> QuizQuestion {
    QuizQuestion {
        question_type: slot.question_type,
        difficulty: slot.difficulty,
        subtopic: slot.subtopic.clone(),
        text: generated.text,
        options: generated.options,
        correct_answer: generated.correct_answer,
        explanation: generated.explanation,
        rubric: generated.rubric,
        keywords: generated.keywords,
        sample_answer: generated.sample_answer,
        points: slot.question_type.default_points(),
        origin,
    }
}

/// Generates quizzes through a shared gateway.
pub struct QuizEngine {
    gateway: Arc<Gateway>,
    settings: EngineSettings,
}

impl QuizEngine {
    pub fn new(gateway: Arc<Gateway>, settings: EngineSettings) -> Self {
        Self { gateway, settings }
    }

    fn slot_params(&self, plan: &QuizPlan, slot: &Slot, reference: &str, used: &str) -> PromptParams {
        PromptParams::new()
            .with("question_type", slot.question_type.to_string())
            .with("topic", plan.topic.as_str())
            .with("difficulty", slot.difficulty.to_string())
            .with("difficulty_guidance", slot.difficulty.guidance())
            .with("focus", slot.subtopic.as_deref().unwrap_or("general"))
            .with("reference", reference)
            .with("used_questions", used)
    }

    async fn generate_one(&self, params: PromptParams, slot: &Slot) -> QuizQuestion {
        let outcome = generate_with_retry(
            &self.gateway,
            PromptKind::GenerateQuestion,
            &params,
            self.settings.timeouts.quiz,
            &self.settings.retry,
        )
        .await;
        let origin = if outcome.is_degraded() {
            QuestionOrigin::Placeholder
        } else {
            QuestionOrigin::Generated
        };
        match outcome.into_payload() {
            GenerationPayload::Question(q) => to_quiz_question(slot, q, origin),
            _ => self.placeholder(&params, slot),
        }
    }

    fn placeholder(&self, params: &PromptParams, slot: &Slot) -> QuizQuestion {
        match fallback_payload(PromptKind::GenerateQuestion, params) {
            GenerationPayload::Question(q) => {
                to_quiz_question(slot, q, QuestionOrigin::Placeholder)
            }
            _ => QuizQuestion {
                question_type: slot.question_type,
                difficulty: slot.difficulty,
                subtopic: slot.subtopic.clone(),
                text: format!("Question about {}", params.get("topic").unwrap_or_default()),
                options: Vec::new(),
                correct_answer: None,
                explanation: String::new(),
                rubric: None,
                keywords: Vec::new(),
                sample_answer: None,
                points: slot.question_type.default_points(),
                origin: QuestionOrigin::Placeholder,
            },
        }
    }

    /// Fill every slot of `plan`.
    ///
    /// Slots are generated in waves of at most `parallelism` concurrent calls;
    /// each wave sees the question texts produced by earlier waves. When
    /// `cancel` fires, finished questions are kept, the remaining slots get
    /// placeholders and the quiz is marked incomplete.
    pub async fn generate_quiz(
        &self,
        plan: &QuizPlan,
        cancel: Option<watch::Receiver<bool>>,
    ) -> Quiz {
        let slots = expand_slots(plan);
        let reference = plan
            .reference_material
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(|r| truncate_chars(r, MAX_REFERENCE_CHARS))
            .unwrap_or_else(|| "No specific reference material provided.".to_string());
        tracing::info!(
            topic = %plan.topic,
            questions = slots.len(),
            difficulty = %plan.difficulty,
            "generating quiz"
        );

        let mut cancel = cancel;
        let mut filled: Vec<QuizQuestion> = Vec::with_capacity(slots.len());
        let mut complete = true;

        for wave in slots.chunks(self.settings.parallelism.get()) {
            if is_cancelled(&cancel) {
                complete = false;
                break;
            }
            let used = used_questions(&filled);
            let mut pending: FuturesUnordered<_> = wave
                .iter()
                .enumerate()
                .map(|(i, slot)| {
                    let params = self.slot_params(plan, slot, &reference, &used);
                    async move { (i, self.generate_one(params, slot).await) }
                })
                .collect();

            // Indexed slots keep wave order and survive a cancel mid-wave.
            let mut finished: Vec<Option<QuizQuestion>> = wave.iter().map(|_| None).collect();
            loop {
                tokio::select! {
                    next = pending.next() => match next {
                        Some((i, question)) => finished[i] = Some(question),
                        None => break,
                    },
                    _ = wait_for_cancel(&mut cancel) => {
                        complete = false;
                        break;
                    }
                }
            }
            drop(pending);

            for (slot, question) in wave.iter().zip(finished) {
                let question = match question {
                    Some(question) => question,
                    None => {
                        let params = self.slot_params(plan, slot, &reference, "");
                        self.placeholder(&params, slot)
                    }
                };
                filled.push(question);
            }
            if !complete {
                break;
            }
        }

        if !complete {
            tracing::warn!(
                topic = %plan.topic,
                generated = filled.iter().filter(|q| q.origin == QuestionOrigin::Generated).count(),
                planned = slots.len(),
                "quiz generation cancelled, filling remaining slots with placeholders"
            );
            for slot in &slots[filled.len()..] {
                let params = self.slot_params(plan, slot, &reference, "");
                filled.push(self.placeholder(&params, slot));
            }
        }

        let placeholder_count = filled
            .iter()
            .filter(|q| q.origin == QuestionOrigin::Placeholder)
            .count();
        if placeholder_count > 0 {
            tracing::warn!(placeholder_count, "quiz contains placeholder questions");
        }

        Quiz {
            quiz_id: uuid::Uuid::new_v4(),
            topic: plan.topic.clone(),
            difficulty: plan.difficulty,
            total_points: filled.iter().map(|q| q.points).sum(),
            questions: filled,
            estimated_duration_secs: plan.estimated_duration_secs,
            complete,
            placeholder_count,
            generated_at: chrono::Utc::now(),
        }
    }
}

fn used_questions(filled: &[QuizQuestion]) -> String {
    let recent: Vec<String> = filled
        .iter()
        .filter(|q| q.origin == QuestionOrigin::Generated)
        .rev()
        .take(MAX_USED_QUESTIONS)
        .map(|q| format!("- {}", q.text))
        .collect();
    if recent.is_empty() {
        "none yet".to_string()
    } else {
        recent.join("\n")
    }
}
