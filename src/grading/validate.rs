//! Boundary validation for externally produced grades.
//!
//! Any candidate (an LLM reply today, another scorer tomorrow) arrives as an
//! untyped `serde_json::Value` and leaves as a structurally valid
//! `GradeResult`. Nothing here panics or rejects: missing, NaN or non-numeric
//! fields become 0, out-of-range values are clamped field by field.

use serde_json::Value;
use tracing::debug;

use super::result::{clamp_final, Feedback, GradeResult, GradeSource, Verdict, MAX_NOTES};
use super::rubric::{CriterionScore, RubricWeights};

pub const MAX_NOTE_CHARS: usize = 160;
pub const MAX_FEEDBACK_ITEMS: usize = 3;
pub const MAX_FEEDBACK_ITEM_CHARS: usize = 200;
pub const MAX_NEXT_STEP_CHARS: usize = 240;
pub const DEFAULT_NEXT_STEP: &str =
    "Revise the answer with one concrete metric and the assumption it depends on.";

/// Clamp each criterion of `candidate["criteria"]` (or of `candidate` itself
/// when it has no `criteria` object) into the rubric's bounds.
pub fn clamp_criteria(candidate: &Value, rubric: &RubricWeights) -> CriterionScore {
    let rubric = rubric.sanitized();
    let src = match candidate.get("criteria") {
        Some(obj @ Value::Object(_)) => obj,
        _ => candidate,
    };
    let field = |name: &str| number_or_zero(src.get(name));
    CriterionScore {
        correctness: field("correctness").clamp(0.0, rubric.correctness),
        completeness: field("completeness").clamp(0.0, rubric.completeness),
        reasoning: field("reasoning").clamp(0.0, rubric.reasoning),
        specificity: field("specificity").clamp(0.0, rubric.specificity),
        clarity: field("clarity").clamp(0.0, rubric.clarity),
        penalties: field("penalties").clamp(rubric.penalty_floor(), 0.0),
    }
}

/// Turn an arbitrary candidate into a `GradeResult` tagged with `source`.
///
/// `finalScore` is rounded and clamped to `0..=100`; when it is absent or not a
/// finite number it is recomputed from the clamped criteria. The verdict is
/// always re-derived from the final score so the two can never disagree.
/// Feedback is left to [`clamp_feedback`], since attaching it is the caller's call.
pub fn accept_candidate(candidate: &Value, rubric: &RubricWeights, source: GradeSource) -> GradeResult {
    let criteria = clamp_criteria(candidate, rubric);

    let final_score = match candidate.get("finalScore").and_then(finite_number) {
        Some(n) => clamp_final(n),
        None => clamp_final(criteria.total()),
    };
    let verdict = Verdict::from_score(final_score);

    match candidate.get("verdict").and_then(Value::as_str).map(Verdict::parse) {
        Some(Some(claimed)) if claimed != verdict => {
            debug!(claimed = claimed.as_str(), derived = verdict.as_str(), "candidate verdict overridden");
        }
        Some(None) => debug!("candidate verdict not a known value; derived from score"),
        _ => {}
    }

    GradeResult {
        final_score,
        criteria,
        verdict,
        notes: clamp_notes(candidate.get("notes")),
        source,
        feedback: None,
    }
}

/// At most two non-empty, single-line notes of bounded length.
pub fn clamp_notes(raw: Option<&Value>) -> Vec<String> {
    string_list(raw, MAX_NOTES, MAX_NOTE_CHARS)
}

/// Shape-check and clamp a feedback object. `None` unless `raw` is an object.
pub fn clamp_feedback(raw: Option<&Value>) -> Option<Feedback> {
    let obj = raw?.as_object()?;
    let next_step = obj
        .get("nextStep")
        .and_then(Value::as_str)
        .map(|s| sanitize_line(s, MAX_NEXT_STEP_CHARS))
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| DEFAULT_NEXT_STEP.to_string());
    Some(Feedback {
        strengths: string_list(obj.get("strengths"), MAX_FEEDBACK_ITEMS, MAX_FEEDBACK_ITEM_CHARS),
        improvements: string_list(
            obj.get("improvements"),
            MAX_FEEDBACK_ITEMS,
            MAX_FEEDBACK_ITEM_CHARS,
        ),
        next_step,
    })
}

/// Collapse whitespace to single spaces, drop control characters and cut to
/// `max_chars` characters.
pub fn sanitize_line(input: &str, max_chars: usize) -> String {
    let mut out = String::with_capacity(input.len().min(max_chars * 4));
    let mut count = 0usize;
    let mut prev_space = false;
    for ch in input.chars() {
        if count >= max_chars {
            break;
        }
        let c = if ch.is_whitespace() || ch.is_control() { ' ' } else { ch };
        if c == ' ' {
            if !prev_space && !out.is_empty() {
                out.push(' ');
                count += 1;
            }
            prev_space = true;
        } else {
            out.push(c);
            count += 1;
            prev_space = false;
        }
    }
    out.trim_end().to_string()
}

// --- internals ---

fn finite_number(v: &Value) -> Option<f32> {
    v.as_f64().filter(|n| n.is_finite()).map(|n| n as f32).filter(|n| n.is_finite())
}

fn number_or_zero(v: Option<&Value>) -> f32 {
    v.and_then(finite_number).unwrap_or(0.0)
}

fn string_list(raw: Option<&Value>, max_items: usize, max_chars: usize) -> Vec<String> {
    let Some(Value::Array(items)) = raw else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(Value::as_str)
        .map(|s| sanitize_line(s, max_chars))
        .filter(|s| !s.is_empty())
        .take(max_items)
        .collect()
}
