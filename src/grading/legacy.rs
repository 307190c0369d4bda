//! Compatibility adapter for the business-simulation layer, which still reads
//! the older five-dimension 0–10 grade shape.
//!
//! Correspondence table (fixed, rubric-normalized):
//!
//! | legacy        | rubric criterion |
//! |---------------|------------------|
//! | `clarity`     | `clarity`        |
//! | `evidence`    | `correctness`    |
//! | `logic`       | `reasoning`      |
//! | `specificity` | `specificity`    |
//! | `depth`       | `completeness`   |
//!
//! Penalties have no legacy dimension; they surface through `overall` and
//! `red_flags` only.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::extract::{has_capitalized_phrase, has_digit};
use super::lexicon::lexicon;
use super::result::{GradeResult, GradeSource};
use super::rubric::RubricWeights;
use super::validate::sanitize_line;

pub const LLM_CONFIDENCE: f32 = 0.8;
pub const DETERMINISTIC_CONFIDENCE: f32 = 0.5;
pub const HEURISTIC_CONFIDENCE: f32 = 0.3;

const RED_FLAG_MARKERS: [&str; 4] = ["penalty", "unsupported", "vague", "fluff"];
const MAX_EVIDENCE_QUOTES: usize = 3;
const MAX_QUOTE_CHARS: usize = 160;
/// Legacy dimension below this counts as weak and earns a suggestion.
const WEAK_DIMENSION: f32 = 5.0;

static SENTENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^.!?\n]+[.!?]?").expect("sentence regex"));

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LegacyRubric {
    pub clarity: f32,
    pub evidence: f32,
    pub logic: f32,
    pub specificity: f32,
    pub depth: f32,
}

impl LegacyRubric {
    fn uniform(score: f32) -> Self {
        Self {
            clarity: score,
            evidence: score,
            logic: score,
            specificity: score,
            depth: score,
        }
    }

    fn dimensions(&self) -> [(&'static str, f32); 5] {
        [
            ("clarity", self.clarity),
            ("evidence", self.evidence),
            ("logic", self.logic),
            ("specificity", self.specificity),
            ("depth", self.depth),
        ]
    }
}

/// Older grade shape. Derived, never authoritative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyGrade {
    /// 0–10.
    pub overall: f32,
    pub rubric: LegacyRubric,
    /// 0–1.
    pub confidence: f32,
    pub red_flags: Vec<String>,
    pub evidence_quotes: Vec<String>,
    pub suggestions: Vec<String>,
}

impl LegacyGrade {
    /// `overall / 10`, the quality index read by the simulation layer.
    pub fn quality_index(&self) -> f32 {
        self.overall / 10.0
    }
}

/// Map a rubric result onto the legacy shape. `answer`, when supplied, feeds
/// `evidence_quotes` with up to three sentences that carry a number.
pub fn from_grade(result: &GradeResult, rubric: &RubricWeights, answer: Option<&str>) -> LegacyGrade {
    let c = &result.criteria;
    let legacy = LegacyRubric {
        clarity: to_ten(c.clarity, rubric.clarity),
        evidence: to_ten(c.correctness, rubric.correctness),
        logic: to_ten(c.reasoning, rubric.reasoning),
        specificity: to_ten(c.specificity, rubric.specificity),
        depth: to_ten(c.completeness, rubric.completeness),
    };

    let red_flags = result
        .notes
        .iter()
        .filter(|n| {
            let lower = n.to_lowercase();
            RED_FLAG_MARKERS.iter().any(|m| lower.contains(m))
        })
        .cloned()
        .collect();

    let suggestions = match &result.feedback {
        Some(fb) if !fb.improvements.is_empty() => fb.improvements.clone(),
        _ => weak_dimension_suggestions(&legacy),
    };

    LegacyGrade {
        overall: round1(f32::from(result.final_score) / 10.0),
        rubric: legacy,
        confidence: match result.source {
            GradeSource::Llm => LLM_CONFIDENCE,
            GradeSource::Deterministic => DETERMINISTIC_CONFIDENCE,
        },
        red_flags,
        evidence_quotes: answer.map(evidence_quotes).unwrap_or_default(),
        suggestions,
    }
}

/// Heuristic legacy grade for structured module answers (field name → text)
/// when no single free-text answer exists. Every field counts toward the
/// average, blank ones as 0.
pub fn from_module_answers(answers: &BTreeMap<String, String>) -> LegacyGrade {
    if answers.is_empty() {
        return LegacyGrade {
            overall: 0.0,
            rubric: LegacyRubric::default(),
            confidence: HEURISTIC_CONFIDENCE,
            red_flags: vec!["no answers provided".to_string()],
            evidence_quotes: Vec::new(),
            suggestions: vec!["Complete every field of the module.".to_string()],
        };
    }

    let mut total: f32 = 0.0;
    let mut short = false;
    let mut generic = false;
    let mut quotes = Vec::new();
    for text in answers.values() {
        let q = assess_field(text);
        total += q.score;
        short |= q.short;
        generic |= q.generic;
        if quotes.len() < MAX_EVIDENCE_QUOTES {
            quotes.extend(evidence_quotes(text).into_iter().take(MAX_EVIDENCE_QUOTES - quotes.len()));
        }
    }
    let overall = round1(total / answers.len() as f32);

    let mut red_flags = Vec::new();
    let mut suggestions = Vec::new();
    if short {
        red_flags.push("short or missing answers".to_string());
        suggestions.push("Expand short answers to at least two full sentences.".to_string());
    }
    if generic {
        red_flags.push("generic language".to_string());
        suggestions.push("Replace generic words with named customers, channels, or numbers.".to_string());
    }
    if quotes.is_empty() {
        suggestions.push("Support at least one answer with a concrete metric.".to_string());
    }

    LegacyGrade {
        overall,
        rubric: LegacyRubric::uniform(overall),
        confidence: HEURISTIC_CONFIDENCE,
        red_flags,
        evidence_quotes: quotes,
        suggestions,
    }
}

struct FieldQuality {
    score: f32,
    short: bool,
    generic: bool,
}

/// 0–10 quality of one answer field.
fn assess_field(text: &str) -> FieldQuality {
    let trimmed = text.trim();
    let len = trimmed.chars().count();
    let lx = lexicon();
    let generic = lx.generic.contains_any(trimmed);

    let mut score: f32 = match len {
        0 => {
            return FieldQuality {
                score: 0.0,
                short: true,
                generic: false,
            }
        }
        1..=19 => 2.0,
        20..=39 => 4.0,
        _ => 5.0,
    };
    if len > 1500 {
        score -= 1.0;
    }
    if has_digit(trimmed) {
        score += 1.5;
    }
    if has_capitalized_phrase(trimmed) {
        score += 1.5;
    }
    if !generic {
        score += 1.0;
    }
    if lx.positive.contains_any(trimmed) {
        score += 1.0;
    }
    FieldQuality {
        score: score.clamp(0.0, 10.0),
        short: len < 20,
        generic,
    }
}

fn evidence_quotes(answer: &str) -> Vec<String> {
    SENTENCE
        .find_iter(answer)
        .map(|m| m.as_str().trim())
        .filter(|s| has_digit(s))
        .map(|s| sanitize_line(s, MAX_QUOTE_CHARS))
        .take(MAX_EVIDENCE_QUOTES)
        .collect()
}

fn weak_dimension_suggestions(r: &LegacyRubric) -> Vec<String> {
    r.dimensions()
        .iter()
        .filter(|(_, v)| *v < WEAK_DIMENSION)
        .map(|(name, _)| {
            let hint = match *name {
                "clarity" => "Use short sentences and drop buzzwords.",
                "evidence" => "Back the main claim with a figure or a named example.",
                "logic" => "Spell out why: link cause and effect explicitly.",
                "specificity" => "Name the customer, competitor, or channel concretely.",
                _ => "Answer every part of the question.",
            };
            hint.to_string()
        })
        .collect()
}

fn to_ten(value: f32, cap: f32) -> f32 {
    if cap <= 0.0 || !value.is_finite() {
        return 0.0;
    }
    round1((value / cap * 10.0).clamp(0.0, 10.0))
}

fn round1(x: f32) -> f32 {
    (x * 10.0).round() / 10.0
}
