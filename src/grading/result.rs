//! Output contract shared by the deterministic and the LLM-assisted grader.

use serde::{Deserialize, Serialize};

use super::rubric::{CriterionScore, RubricWeights};

pub const PASS_THRESHOLD: u8 = 70;
pub const BORDERLINE_THRESHOLD: u8 = 50;

/// Maximum number of notes carried by a result.
pub const MAX_NOTES: usize = 2;

/// Categorical outcome, always derived from `final_score`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Pass,
    Borderline,
    Fail,
}

impl Verdict {
    /// `>= 70` pass, `50..70` borderline, below fail.
    pub fn from_score(score: u8) -> Self {
        if score >= PASS_THRESHOLD {
            Verdict::Pass
        } else if score >= BORDERLINE_THRESHOLD {
            Verdict::Borderline
        } else {
            Verdict::Fail
        }
    }

    /// Parse one of the three wire values; anything else is `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pass" => Some(Verdict::Pass),
            "borderline" => Some(Verdict::Borderline),
            "fail" => Some(Verdict::Fail),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Pass => "pass",
            Verdict::Borderline => "borderline",
            Verdict::Fail => "fail",
        }
    }
}

/// Which path produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GradeSource {
    Deterministic,
    Llm,
}

impl GradeSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            GradeSource::Deterministic => "deterministic",
            GradeSource::Llm => "llm",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Feedback {
    pub strengths: Vec<String>,
    pub improvements: Vec<String>,
    pub next_step: String,
}

/// Final graded answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeResult {
    /// Rounded, clamped to `0..=100`.
    pub final_score: u8,
    pub criteria: CriterionScore,
    pub verdict: Verdict,
    #[serde(default)]
    pub notes: Vec<String>,
    pub source: GradeSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<Feedback>,
}

impl GradeResult {
    /// `final_score / 100`, the quality index read by the simulation layer.
    pub fn quality_index(&self) -> f32 {
        f32::from(self.final_score) / 100.0
    }
}

/// Round and clamp a raw total into the `0..=100` score range.
pub fn clamp_final(raw: f32) -> u8 {
    if !raw.is_finite() {
        return 0;
    }
    raw.round().clamp(0.0, 100.0) as u8
}

/// Inbound grading call, consumed once.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeRequest {
    #[serde(default)]
    pub question_prompt: String,
    #[serde(default)]
    pub user_answer: String,
    #[serde(default)]
    pub expected_answer: Option<String>,
    #[serde(default)]
    pub rubric: Option<RubricWeights>,
    #[serde(default, rename = "useLLM", alias = "useLlm")]
    pub use_llm: bool,
    #[serde(default)]
    pub request_feedback: bool,
}

impl GradeRequest {
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            question_prompt: question.into(),
            user_answer: answer.into(),
            ..Default::default()
        }
    }

    /// Effective rubric: the caller override (sanitized) or `fallback`.
    pub fn rubric_or(&self, fallback: RubricWeights) -> RubricWeights {
        self.rubric.map(RubricWeights::sanitized).unwrap_or(fallback)
    }
}
