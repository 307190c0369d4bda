//! Feature extractors: pure `text × context → bounded score` functions.
//!
//! Every extractor returns a value inside its documented range and yields 0 for
//! empty or whitespace-only answers.

use std::collections::BTreeSet;

use once_cell::sync::Lazy;
use regex::Regex;

use super::lexicon::lexicon;
use super::rubric::{CriterionScore, RubricWeights};

/// Two adjacent capitalized words, a cheap proxy for a named specific
/// ("Shopify Plus", "Series B").
static CAPITALIZED_PHRASE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b[A-Z][a-z]+\s+[A-Z][a-z]+\b").expect("capitalized phrase regex"));
static SENTENCE_END: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[.!?](?:\s|$)").expect("sentence boundary regex"));
static NUMBERED_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*\d+[.)]\s").expect("numbered list regex"));
static BULLET_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*(?:[-*•]|\d+[.)])\s+\S").expect("bullet line regex"));
static IF_THEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)\bif\b.+?\bthen\b").expect("if-then regex"));
static QUANTIFIED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\d+(?:\.\d+)?\s*(?:%|percent\b|months?\b|weeks?\b|years?\b)")
        .expect("quantified unit regex")
});
static DIGIT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d").expect("digit regex"));
static BECAUSE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bbecause\b").expect("because regex"));
static QUESTION_SPLIT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[.?!]+").expect("question split regex"));

const REFERENCE_OVERSHOOT: f32 = 1.2;
const MIN_COMPLETE_CHARS: usize = 20;
const CHARS_PER_SUBQUESTION: usize = 30;
const MAX_SUBQUESTIONS: usize = 3;
const RAMBLING_CHARS: usize = 500;

/// Run all six extractors against one answer.
pub fn extract_all(
    question: &str,
    answer: &str,
    expected_answer: Option<&str>,
    rubric: &RubricWeights,
) -> CriterionScore {
    let rubric = &rubric.sanitized();
    CriterionScore {
        correctness: correctness(answer, expected_answer, rubric.correctness),
        completeness: completeness(answer, question, rubric.completeness),
        reasoning: reasoning(answer, rubric.reasoning),
        specificity: specificity(answer, rubric.specificity),
        clarity: clarity(answer, rubric.clarity),
        penalties: penalties(answer, rubric),
    }
}

/// Reference overlap when `expected_answer` has usable tokens, otherwise
/// lower-fidelity signals (numbers, named specifics, no hedging, no vagueness).
pub fn correctness(answer: &str, expected_answer: Option<&str>, cap: f32) -> f32 {
    if is_blank(answer) {
        return 0.0;
    }
    if let Some(fraction) = expected_answer.and_then(|exp| reference_overlap(answer, exp)) {
        return (fraction * cap * REFERENCE_OVERSHOOT).clamp(0.0, cap);
    }

    let lx = lexicon();
    let mut score: f32 = 10.0;
    if has_digit(answer) {
        score += 12.0;
    }
    if has_capitalized_phrase(answer) {
        score += 8.0;
    }
    if !lx.hedging.contains_any(answer) {
        score += 10.0;
    }
    score -= 3.0 * lx.vague.count(answer) as f32;
    score.clamp(0.0, cap)
}

/// Fraction of reference tokens (longer than two chars) found in the answer.
/// `None` when the reference has no such tokens.
fn reference_overlap(answer: &str, expected: &str) -> Option<f32> {
    let tokens: BTreeSet<String> = expected
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() > 2)
        .map(str::to_string)
        .collect();
    if tokens.is_empty() {
        return None;
    }
    let haystack = answer.to_lowercase();
    let hits = tokens.iter().filter(|t| haystack.contains(t.as_str())).count();
    Some(hits as f32 / tokens.len() as f32)
}

pub fn completeness(answer: &str, question: &str, cap: f32) -> f32 {
    let trimmed = answer.trim();
    let len = trimmed.chars().count();
    if len < MIN_COMPLETE_CHARS {
        return 0.0;
    }

    let min_len = CHARS_PER_SUBQUESTION * subquestion_count(question);
    if len < min_len {
        return (cap * len as f32 / min_len as f32).clamp(0.0, cap);
    }
    if has_multiple_points(trimmed) {
        cap
    } else {
        cap * 0.6
    }
}

/// Distinct asks in the prompt, clamped to `1..=3`.
pub fn subquestion_count(question: &str) -> usize {
    QUESTION_SPLIT
        .split(question)
        .filter(|frag| frag.trim().chars().count() > 10)
        .count()
        .clamp(1, MAX_SUBQUESTIONS)
}

fn has_multiple_points(text: &str) -> bool {
    sentence_boundaries(text) >= 2
        || text.contains(';')
        || text.contains('\n')
        || NUMBERED_LINE.is_match(text)
}

pub fn reasoning(answer: &str, cap: f32) -> f32 {
    if is_blank(answer) {
        return 0.0;
    }
    let mut score: f32 = 0.0;
    if BECAUSE.is_match(answer) {
        score += 5.0;
    }
    if IF_THEN.is_match(answer) {
        score += 4.0;
    }
    if lexicon().causal.contains_any(answer) {
        score += 2.0;
    }
    if QUANTIFIED.is_match(answer) {
        score += 4.0;
    }
    f32::min(score, cap).max(0.0)
}

pub fn specificity(answer: &str, cap: f32) -> f32 {
    if is_blank(answer) {
        return 0.0;
    }
    let mut score: f32 = 0.0;
    if has_digit(answer) {
        score += 4.0;
    }
    if has_capitalized_phrase(answer) {
        score += 3.0;
    }
    if BULLET_LINE.find_iter(answer).count() >= 2 {
        score += 3.0;
    }
    f32::min(score, cap).max(0.0)
}

pub fn clarity(answer: &str, cap: f32) -> f32 {
    let trimmed = answer.trim();
    if trimmed.is_empty() {
        return 0.0;
    }
    let len = trimmed.chars().count();
    let mut score: f32 = 5.0;
    if len > RAMBLING_CHARS {
        score -= 2.0;
    }
    if sentence_boundaries(trimmed) >= 2 && len >= 50 {
        score += 3.0;
    }
    score -= lexicon().fluff.count(answer) as f32;
    f32::clamp(score, 0.0, cap)
}

/// Confident-but-vague, unsupported assertions and fluff density, stacked and
/// floored at `hallucination_penalty_max + fluff_penalty_max`.
pub fn penalties(answer: &str, rubric: &RubricWeights) -> f32 {
    if is_blank(answer) {
        return 0.0;
    }
    let lx = lexicon();
    let h_max = rubric.hallucination_penalty_max;
    let mut total: f32 = 0.0;

    if lx.confident.count(answer) >= 2 && !has_digit(answer) {
        total += 0.5 * h_max;
    }

    // Each digit is its own occurrence: "10" is two.
    let support = BECAUSE.find_iter(answer).count() + DIGIT.find_iter(answer).count();
    if lx.assertive.count(answer) >= 2 && support < 2 {
        total += 0.4 * h_max;
    }

    let fluff = lx.fluff.count(answer);
    if fluff >= 2 {
        total += rubric.fluff_penalty_max * f32::min(1.0, fluff as f32 / 3.0);
    }

    total.clamp(rubric.penalty_floor(), 0.0)
}

// --- shared signals ---

pub(crate) fn is_blank(text: &str) -> bool {
    text.trim().is_empty()
}

pub(crate) fn has_digit(text: &str) -> bool {
    text.chars().any(|c| c.is_ascii_digit())
}

pub(crate) fn has_capitalized_phrase(text: &str) -> bool {
    CAPITALIZED_PHRASE.is_match(text)
}

pub(crate) fn sentence_boundaries(text: &str) -> usize {
    SENTENCE_END.find_iter(text).count()
}
