//! Recommendation Engine.
//!
//! Turns performance history into per-topic mastery, a three-tier study
//! plan, trend signals and a narrative summary. Everything except the
//! narrative is a pure function of its inputs.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AssessError;
use crate::gateway::{Gateway, GenerationPayload};
use crate::model::{
    PerformanceRecord, StudyPlanTier, TierTag, TopicMetrics, TopicTrend, TrendClass, TrendResult,
};
use crate::prompts::{PromptKind, PromptParams};
use crate::retry::generate_with_retry;
use crate::settings::{EngineSettings, Thresholds};

/// Observations per end of the history used for the history trend.
const HISTORY_WINDOW: usize = 3;

/// Mastery per topic plus the derived study plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceAnalysis {
    pub metrics: TopicMetrics,
    /// Always `urgent_review`, `skill_building`, `advancement`, in that order.
    pub tiers: [StudyPlanTier; 3],
}

impl PerformanceAnalysis {
    pub fn tier(&self, tag: TierTag) -> &StudyPlanTier {
        match tag {
            TierTag::UrgentReview => &self.tiers[0],
            TierTag::SkillBuilding => &self.tiers[1],
            TierTag::Advancement => &self.tiers[2],
        }
    }
}

/// One prioritized study action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicRecommendation {
    pub priority: usize,
    pub topic: String,
    pub tier: TierTag,
    pub mastery: f64,
    pub action: String,
}

/// Full recommendation report for one student.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudentReport {
    pub student_id: String,
    pub metrics: TopicMetrics,
    pub tiers: [StudyPlanTier; 3],
    /// Present only when a previous snapshot was supplied.
    pub trend: Option<TrendResult>,
    pub history_trends: BTreeMap<String, TopicTrend>,
    pub recommendations: Vec<TopicRecommendation>,
    pub strengths: Vec<String>,
    pub total_suggested_hours: f64,
    pub narrative: String,
    /// Second part of the generated summary, templated when absent.
    pub motivation: String,
    pub narrative_degraded: bool,
    pub generated_at: DateTime<Utc>,
}

fn round4(x: f64) -> f64 {
    (x * 10_000.0).round() / 10_000.0
}

fn validate_record(record: &PerformanceRecord) -> Result<(), AssessError> {
    if !record.max_score.is_finite() || record.max_score <= 0.0 {
        return Err(AssessError::ContractViolation(format!(
            "topic {} has non-positive max score {}",
            record.topic, record.max_score
        )));
    }
    if !record.score.is_finite() || record.score < 0.0 {
        return Err(AssessError::ContractViolation(format!(
            "topic {} has invalid score {}",
            record.topic, record.score
        )));
    }
    Ok(())
}

fn normalized(record: &PerformanceRecord) -> f64 {
    (record.score / record.max_score).clamp(0.0, 1.0)
}

/// Mean normalized score per topic.
pub fn topic_metrics(history: &[PerformanceRecord]) -> Result<TopicMetrics, AssessError> {
    let mut sums: BTreeMap<String, (f64, usize)> = BTreeMap::new();
    for record in history {
        validate_record(record)?;
        let entry = sums.entry(record.topic.clone()).or_default();
        entry.0 += normalized(record);
        entry.1 += 1;
    }
    Ok(sums
        .into_iter()
        .map(|(topic, (sum, n))| (topic, sum / n as f64))
        .collect())
}

/// Sort key for "most recent observation": timestamp, then input position.
type Recency = (Option<DateTime<Utc>>, Option<usize>);

fn last_seen(history: &[PerformanceRecord]) -> BTreeMap<&str, Recency> {
    let mut seen: BTreeMap<&str, Recency> = BTreeMap::new();
    for (index, record) in history.iter().enumerate() {
        let candidate = (record.recorded_at, Some(index));
        let slot = seen.entry(record.topic.as_str()).or_insert(candidate);
        if candidate > *slot {
            *slot = candidate;
        }
    }
    seen
}

/// Compute topic mastery and tier the topics.
///
/// `topic_scores` are already-normalized values that take precedence over
/// history-derived metrics for the same topic.
pub fn analyze_performance(
    history: &[PerformanceRecord],
    topic_scores: &TopicMetrics,
    thresholds: &Thresholds,
) -> Result<PerformanceAnalysis, AssessError> {
    let mut metrics = topic_metrics(history)?;
    for (topic, score) in topic_scores {
        if !score.is_finite() || !(0.0..=1.0).contains(score) {
            return Err(AssessError::ContractViolation(format!(
                "topic score for {topic} is outside [0, 1]: {score}"
            )));
        }
        metrics.insert(topic.clone(), *score);
    }

    let recency = last_seen(history);
    let mut ordered: Vec<(&String, f64)> = metrics.iter().map(|(t, m)| (t, *m)).collect();
    ordered.sort_by(|(ta, ma), (tb, mb)| {
        ma.total_cmp(mb)
            .then_with(|| {
                let ra = recency.get(ta.as_str()).copied().unwrap_or_default();
                let rb = recency.get(tb.as_str()).copied().unwrap_or_default();
                rb.cmp(&ra)
            })
            .then_with(|| ta.cmp(tb))
    });

    let mut urgent = Vec::new();
    let mut building = Vec::new();
    let mut advancement = Vec::new();
    for (topic, mastery) in ordered {
        if mastery < thresholds.skill_building_from {
            urgent.push(topic.clone());
        } else if mastery < thresholds.advancement_from {
            building.push(topic.clone());
        } else {
            advancement.push(topic.clone());
        }
    }

    let tier = |tag: TierTag, topics: Vec<String>| StudyPlanTier {
        tag,
        rationale: tag.rationale().to_string(),
        suggested_hours: tag.hours_per_topic() * topics.len() as f64,
        topics,
    };

    Ok(PerformanceAnalysis {
        metrics,
        tiers: [
            tier(TierTag::UrgentReview, urgent),
            tier(TierTag::SkillBuilding, building),
            tier(TierTag::Advancement, advancement),
        ],
    })
}

/// Classify a change with the symmetric ±`trend_delta` band.
pub fn classify_change(magnitude: f64, thresholds: &Thresholds) -> TrendClass {
    if magnitude >= thresholds.trend_delta {
        TrendClass::Improving
    } else if magnitude <= -thresholds.trend_delta {
        TrendClass::Declining
    } else {
        TrendClass::Stable
    }
}

fn one_sided(previous: Option<f64>, current: Option<f64>) -> TopicTrend {
    TopicTrend {
        classification: TrendClass::InsufficientData,
        magnitude: None,
        previous,
        current,
    }
}

/// Compare two metric snapshots.
///
/// Topics present in only one snapshot are reported as insufficient data.
/// When no topic is shared the result carries `insufficient_data`.
pub fn track_improvement(
    current: &TopicMetrics,
    previous: &TopicMetrics,
    thresholds: &Thresholds,
) -> TrendResult {
    let mut topics = BTreeMap::new();
    let mut shared_deltas = Vec::new();

    for (topic, now) in current {
        let trend = match previous.get(topic) {
            Some(before) => {
                let delta = now - before;
                shared_deltas.push(delta);
                let magnitude = round4(delta);
                TopicTrend {
                    classification: classify_change(magnitude, thresholds),
                    magnitude: Some(magnitude),
                    previous: Some(*before),
                    current: Some(*now),
                }
            }
            None => one_sided(None, Some(*now)),
        };
        topics.insert(topic.clone(), trend);
    }
    for (topic, before) in previous {
        if !current.contains_key(topic) {
            topics.insert(topic.clone(), one_sided(Some(*before), None));
        }
    }

    let (overall, overall_magnitude) = if shared_deltas.is_empty() {
        (TrendClass::InsufficientData, None)
    } else {
        let mean = round4(shared_deltas.iter().sum::<f64>() / shared_deltas.len() as f64);
        (classify_change(mean, thresholds), Some(mean))
    };

    TrendResult {
        topics,
        insufficient_data: shared_deltas.is_empty(),
        overall,
        overall_magnitude,
    }
}

/// Per-topic trend inside one history: early observations versus late ones.
pub fn history_trends(
    history: &[PerformanceRecord],
    thresholds: &Thresholds,
) -> Result<BTreeMap<String, TopicTrend>, AssessError> {
    // Timestamps order the history only when every record has one.
    let mut ordered: Vec<&PerformanceRecord> = history.iter().collect();
    if ordered.iter().all(|r| r.recorded_at.is_some()) {
        ordered.sort_by_key(|r| r.recorded_at);
    }

    let mut series: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    for record in ordered {
        validate_record(record)?;
        series
            .entry(record.topic.clone())
            .or_default()
            .push(normalized(record));
    }

    let mean = |xs: &[f64]| xs.iter().sum::<f64>() / xs.len() as f64;
    Ok(series
        .into_iter()
        .map(|(topic, scores)| {
            let trend = if scores.len() < 2 {
                one_sided(None, scores.last().copied())
            } else {
                let window = HISTORY_WINDOW.min(scores.len() / 2).max(1);
                let early = mean(&scores[..window]);
                let late = mean(&scores[scores.len() - window..]);
                let magnitude = round4(late - early);
                TopicTrend {
                    classification: classify_change(magnitude, thresholds),
                    magnitude: Some(magnitude),
                    previous: Some(early),
                    current: Some(late),
                }
            };
            (topic, trend)
        })
        .collect())
}

fn action_for(tag: TierTag, topic: &str) -> String {
    match tag {
        TierTag::UrgentReview => {
            format!("Review the fundamentals of {topic} and redo the practice exercises")
        }
        TierTag::SkillBuilding => format!("Practise applied problems in {topic}"),
        TierTag::Advancement => format!("Move on to advanced material in {topic}"),
    }
}

/// Split a generated summary at its first blank line into the explanation
/// and the motivational message.
fn split_summary(text: &str) -> (String, Option<String>) {
    let text = text.replace("\r\n", "\n");
    let strip = |part: &str| {
        let part = part.trim();
        part.strip_prefix("1.")
            .or_else(|| part.strip_prefix("2."))
            .unwrap_or(part)
            .trim()
            .to_string()
    };
    match text.split_once("\n\n") {
        Some((explanation, rest)) => {
            let motivation = strip(rest);
            (strip(explanation), (!motivation.is_empty()).then_some(motivation))
        }
        None => (strip(text.as_str()), None),
    }
}

fn fallback_motivation(analysis: &PerformanceAnalysis) -> String {
    let urgent = &analysis.tier(TierTag::UrgentReview).topics;
    let advancement = &analysis.tier(TierTag::Advancement).topics;
    match (urgent.first(), advancement.first()) {
        (Some(weak), Some(strong)) => format!(
            "Your work in {strong} shows what steady practice can do. Bring the same effort to {weak} and it will follow."
        ),
        (Some(weak), None) => format!(
            "Every expert was once a beginner. Regular hands-on practice with {weak} will build your confidence."
        ),
        (None, Some(strong)) => format!(
            "Great progress in {strong}. Keep challenging yourself with harder tasks."
        ),
        (None, None) => {
            "Stay focused on your goals. Practical skills take time and consistent effort.".to_string()
        }
    }
}

fn list_or_none(topics: &[String]) -> String {
    if topics.is_empty() {
        "none".to_string()
    } else {
        topics.join(", ")
    }
}

/// Builds student reports; the narrative goes through the gateway.
pub struct RecommendationEngine {
    gateway: Arc<Gateway>,
    settings: EngineSettings,
}

impl RecommendationEngine {
    pub fn new(gateway: Arc<Gateway>, settings: EngineSettings) -> Self {
        Self { gateway, settings }
    }

    /// Assemble the tier plan, trends and narrative for one student.
    ///
    /// A degraded narrative is replaced by a templated sentence; report
    /// generation never fails on the gateway.
    pub async fn generate_report(
        &self,
        student_id: &str,
        history: &[PerformanceRecord],
        topic_scores: &TopicMetrics,
        previous: Option<&TopicMetrics>,
    ) -> Result<StudentReport, AssessError> {
        let thresholds = &self.settings.thresholds;
        let analysis = analyze_performance(history, topic_scores, thresholds)?;
        let history_trends = history_trends(history, thresholds)?;
        let trend = previous.map(|prev| track_improvement(&analysis.metrics, prev, thresholds));
        tracing::info!(
            student_id,
            topics = analysis.metrics.len(),
            observations = history.len(),
            "generating report"
        );

        let recommendations: Vec<TopicRecommendation> = analysis
            .tiers
            .iter()
            .flat_map(|tier| tier.topics.iter().map(move |topic| (tier.tag, topic)))
            .enumerate()
            .map(|(i, (tag, topic))| TopicRecommendation {
                priority: i + 1,
                topic: topic.clone(),
                tier: tag,
                mastery: analysis.metrics.get(topic).copied().unwrap_or_default(),
                action: action_for(tag, topic),
            })
            .collect();

        let (summary, narrative_degraded) = self
            .narrative(student_id, &analysis, trend.as_ref())
            .await;
        let (narrative, motivation) = split_summary(&summary);
        let motivation = motivation.unwrap_or_else(|| fallback_motivation(&analysis));

        Ok(StudentReport {
            student_id: student_id.to_string(),
            strengths: analysis.tier(TierTag::Advancement).topics.clone(),
            total_suggested_hours: analysis.tiers.iter().map(|t| t.suggested_hours).sum(),
            metrics: analysis.metrics,
            tiers: analysis.tiers,
            trend,
            history_trends,
            recommendations,
            narrative,
            motivation,
            narrative_degraded,
            generated_at: Utc::now(),
        })
    }

    async fn narrative(
        &self,
        student_id: &str,
        analysis: &PerformanceAnalysis,
        trend: Option<&TrendResult>,
    ) -> (String, bool) {
        let urgent = analysis.tier(TierTag::UrgentReview);
        let building = analysis.tier(TierTag::SkillBuilding);
        let advancement = analysis.tier(TierTag::Advancement);

        let metrics = analysis
            .metrics
            .iter()
            .map(|(topic, m)| format!("{topic}: {m:.2}"))
            .collect::<Vec<_>>()
            .join(", ");
        let trends = match trend {
            Some(t) if !t.insufficient_data => t
                .topics
                .iter()
                .filter_map(|(topic, tt)| {
                    tt.magnitude.map(|m| {
                        format!("{topic} {} ({m:+.2})", tt.classification)
                    })
                })
                .collect::<Vec<_>>()
                .join(", "),
            _ => "no comparable earlier snapshot".to_string(),
        };

        let params = PromptParams::new()
            .with("student_id", student_id)
            .with("urgent_count", urgent.topics.len().to_string())
            .with("urgent_topics", list_or_none(&urgent.topics))
            .with("building_count", building.topics.len().to_string())
            .with("building_topics", list_or_none(&building.topics))
            .with("advancement_count", advancement.topics.len().to_string())
            .with("advancement_topics", list_or_none(&advancement.topics))
            .with("metrics", if metrics.is_empty() { "none".to_string() } else { metrics })
            .with("trends", trends);

        let outcome = generate_with_retry(
            &self.gateway,
            PromptKind::SummarizePerformance,
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
