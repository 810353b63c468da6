//! Keyword-coverage heuristic for open answers.
//!
//! Pure functions of (answer text, keyword set). The coverage ratio seeds the
//! partial-credit fallback and acts as a sanity band for model scores.

use serde::{Deserialize, Serialize};

/// Which keywords an answer covers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordCoverage {
    pub matched: Vec<String>,
    pub missing: Vec<String>,
    /// `matched / total`, or `None` when there were no usable keywords.
    pub ratio: Option<f64>,
}

/// Coarse correctness band derived from coverage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoverageBand {
    Low,
    Medium,
    High,
}

impl CoverageBand {
    pub fn from_fraction(fraction: f64) -> Self {
        if fraction < 1.0 / 3.0 {
            CoverageBand::Low
        } else if fraction < 2.0 / 3.0 {
            CoverageBand::Medium
        } else {
            CoverageBand::High
        }
    }
}

/// Lowercased alphanumeric runs.
fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Compute which keywords appear in `answer`.
///
/// Matching is token-based and case-insensitive; a multi-word keyword must
/// appear as a contiguous run of tokens. Blank and duplicate keywords are
/// ignored.
pub fn keyword_coverage(answer: &str, keywords: &[String]) -> KeywordCoverage {
    let answer_tokens = tokenize(answer);
    let mut seen: Vec<Vec<String>> = Vec::new();
    let mut matched = Vec::new();
    let mut missing = Vec::new();

    for keyword in keywords {
        let needle = tokenize(keyword);
        if needle.is_empty() || seen.contains(&needle) {
            continue;
        }
        let found = answer_tokens
            .windows(needle.len())
            .any(|window| window == needle.as_slice());
        seen.push(needle);
        if found {
            matched.push(keyword.trim().to_string());
        } else {
            missing.push(keyword.trim().to_string());
        }
    }

    let total = matched.len() + missing.len();
    let ratio = (total > 0).then(|| matched.len() as f64 / total as f64);
    KeywordCoverage {
        matched,
        missing,
        ratio,
    }
}

/// Whether a model-awarded fraction sits two bands away from coverage.
pub fn contradicts_coverage(model_fraction: f64, coverage: &KeywordCoverage) -> bool {
    let Some(ratio) = coverage.ratio else {
        return false;
    };
    let model = CoverageBand::from_fraction(model_fraction);
    let heuristic = CoverageBand::from_fraction(ratio);
    matches!(
        (model, heuristic),
        (CoverageBand::High, CoverageBand::Low) | (CoverageBand::Low, CoverageBand::High)
    )
}
