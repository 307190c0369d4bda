//! Rubric weights and the per-criterion score they bound.
//!
//! Default caps: correctness 40, completeness 20, reasoning 15, specificity 10,
//! clarity 10 (sum 95); penalty ceilings −15 (hallucination) and −10 (fluff).

use serde::{Deserialize, Serialize};

pub const MAX_CORRECTNESS: f32 = 40.0;
pub const MAX_COMPLETENESS: f32 = 20.0;
pub const MAX_REASONING: f32 = 15.0;
pub const MAX_SPECIFICITY: f32 = 10.0;
pub const MAX_CLARITY: f32 = 10.0;
pub const DEFAULT_HALLUCINATION_PENALTY_MAX: f32 = -15.0;
pub const DEFAULT_FLUFF_PENALTY_MAX: f32 = -10.0;

/// Lowest value a caller-supplied penalty ceiling may take.
const PENALTY_CEILING_FLOOR: f32 = -100.0;

fn d_correctness() -> f32 {
    MAX_CORRECTNESS
}
fn d_completeness() -> f32 {
    MAX_COMPLETENESS
}
fn d_reasoning() -> f32 {
    MAX_REASONING
}
fn d_specificity() -> f32 {
    MAX_SPECIFICITY
}
fn d_clarity() -> f32 {
    MAX_CLARITY
}
fn d_hallucination() -> f32 {
    DEFAULT_HALLUCINATION_PENALTY_MAX
}
fn d_fluff() -> f32 {
    DEFAULT_FLUFF_PENALTY_MAX
}

/// Named caps for each positive criterion plus the two penalty ceilings.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RubricWeights {
    #[serde(default = "d_correctness")]
    pub correctness: f32,
    #[serde(default = "d_completeness")]
    pub completeness: f32,
    #[serde(default = "d_reasoning")]
    pub reasoning: f32,
    #[serde(default = "d_specificity")]
    pub specificity: f32,
    #[serde(default = "d_clarity")]
    pub clarity: f32,
    #[serde(default = "d_hallucination")]
    pub hallucination_penalty_max: f32,
    #[serde(default = "d_fluff")]
    pub fluff_penalty_max: f32,
}

impl Default for RubricWeights {
    fn default() -> Self {
        Self {
            correctness: MAX_CORRECTNESS,
            completeness: MAX_COMPLETENESS,
            reasoning: MAX_REASONING,
            specificity: MAX_SPECIFICITY,
            clarity: MAX_CLARITY,
            hallucination_penalty_max: DEFAULT_HALLUCINATION_PENALTY_MAX,
            fluff_penalty_max: DEFAULT_FLUFF_PENALTY_MAX,
        }
    }
}

impl RubricWeights {
    /// Force caller-supplied weights back into their documented ranges.
    /// Positive caps land in `[0, default cap]`, ceilings in `[-100, 0]`;
    /// non-finite values fall back to the default.
    pub fn sanitized(self) -> Self {
        fn cap(x: f32, max: f32) -> f32 {
            if x.is_finite() {
                x.clamp(0.0, max)
            } else {
                max
            }
        }
        fn ceiling(x: f32, default: f32) -> f32 {
            if x.is_finite() {
                x.clamp(PENALTY_CEILING_FLOOR, 0.0)
            } else {
                default
            }
        }
        Self {
            correctness: cap(self.correctness, MAX_CORRECTNESS),
            completeness: cap(self.completeness, MAX_COMPLETENESS),
            reasoning: cap(self.reasoning, MAX_REASONING),
            specificity: cap(self.specificity, MAX_SPECIFICITY),
            clarity: cap(self.clarity, MAX_CLARITY),
            hallucination_penalty_max: ceiling(
                self.hallucination_penalty_max,
                DEFAULT_HALLUCINATION_PENALTY_MAX,
            ),
            fluff_penalty_max: ceiling(self.fluff_penalty_max, DEFAULT_FLUFF_PENALTY_MAX),
        }
    }

    /// Sum of the five positive caps.
    pub fn positive_total(&self) -> f32 {
        self.correctness + self.completeness + self.reasoning + self.specificity + self.clarity
    }

    /// Most negative value the combined penalties may reach.
    pub fn penalty_floor(&self) -> f32 {
        self.hallucination_penalty_max + self.fluff_penalty_max
    }
}

/// Six sub-scores of one graded answer. Built once per call, never mutated.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CriterionScore {
    pub correctness: f32,
    pub completeness: f32,
    pub reasoning: f32,
    pub specificity: f32,
    pub clarity: f32,
    /// Always within `[rubric.penalty_floor(), 0]`.
    pub penalties: f32,
}

impl CriterionScore {
    pub fn total(&self) -> f32 {
        self.correctness
            + self.completeness
            + self.reasoning
            + self.specificity
            + self.clarity
            + self.penalties
    }

    /// True when every field sits inside the bounds `rubric` documents.
    pub fn within(&self, rubric: &RubricWeights) -> bool {
        let inside = |x: f32, max: f32| (0.0..=max).contains(&x);
        inside(self.correctness, rubric.correctness)
            && inside(self.completeness, rubric.completeness)
            && inside(self.reasoning, rubric.reasoning)
            && inside(self.specificity, rubric.specificity)
            && inside(self.clarity, rubric.clarity)
            && (rubric.penalty_floor()..=0.0).contains(&self.penalties)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_sum_to_ninety_five() {
        let r = RubricWeights::default();
        assert!((r.positive_total() - 95.0).abs() < f32::EPSILON);
        assert!((r.penalty_floor() + 25.0).abs() < f32::EPSILON);
    }

    #[test]
    fn partial_override_keeps_remaining_defaults() {
        let r: RubricWeights = serde_json::from_str(r#"{"correctness": 30}"#).unwrap();
        assert_eq!(r.correctness, 30.0);
        assert_eq!(r.clarity, MAX_CLARITY);
        assert_eq!(r.fluff_penalty_max, DEFAULT_FLUFF_PENALTY_MAX);
    }

    #[test]
    fn sanitize_clamps_out_of_range_weights() {
        let r = RubricWeights {
            correctness: 80.0,
            completeness: -3.0,
            reasoning: f32::NAN,
            hallucination_penalty_max: 7.0,
            fluff_penalty_max: -500.0,
            ..Default::default()
        }
        .sanitized();
        assert_eq!(r.correctness, MAX_CORRECTNESS);
        assert_eq!(r.completeness, 0.0);
        assert_eq!(r.reasoning, MAX_REASONING);
        assert_eq!(r.hallucination_penalty_max, 0.0);
        assert_eq!(r.fluff_penalty_max, -100.0);
    }
}
