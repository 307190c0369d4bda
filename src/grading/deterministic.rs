//! # Deterministic grader
//! Pure, synchronous composition of the feature extractors and the keyword
//! modifier. No I/O: identical inputs always produce identical results.

use super::extract::extract_all;
use super::modifier::keyword_modifier;
use super::result::{clamp_final, Feedback, GradeResult, GradeSource, Verdict, MAX_NOTES};
use super::rubric::{CriterionScore, RubricWeights};

pub const NOTE_KEY_POINTS: &str = "addresses key points";
pub const NOTE_REASONING: &str = "shows reasoning";
pub const NOTE_UNSUPPORTED: &str = "unsupported or vague claims";
pub const PLACEHOLDER_STRENGTH: &str = "Attempted response.";

const KEY_POINTS_MIN: f32 = 30.0;
const REASONING_MIN: f32 = 8.0;

const GENERIC_IMPROVEMENTS: [&str; 3] = [
    "Anchor each claim in a concrete number: a metric, a price, or a timeline.",
    "Connect claims to causes with 'because' or an explicit if/then condition.",
    "Name the specific customer segment, competitor, or channel you mean.",
];
const GENERIC_NEXT_STEP: &str =
    "Rewrite your answer around one measurable assumption and what would prove it wrong.";

/// Knobs for one grading call.
#[derive(Debug, Clone, Copy)]
pub struct GradeOptions<'a> {
    pub expected_answer: Option<&'a str>,
    pub rubric: RubricWeights,
    pub include_keyword_modifier: bool,
    pub request_feedback: bool,
}

impl Default for GradeOptions<'_> {
    fn default() -> Self {
        Self {
            expected_answer: None,
            rubric: RubricWeights::default(),
            include_keyword_modifier: true,
            request_feedback: false,
        }
    }
}

impl<'a> GradeOptions<'a> {
    pub fn with_expected(mut self, expected: Option<&'a str>) -> Self {
        self.expected_answer = expected.filter(|e| !e.trim().is_empty());
        self
    }

    pub fn with_rubric(mut self, rubric: RubricWeights) -> Self {
        self.rubric = rubric.sanitized();
        self
    }

    pub fn with_feedback(mut self, on: bool) -> Self {
        self.request_feedback = on;
        self
    }

    pub fn without_keyword_modifier(mut self) -> Self {
        self.include_keyword_modifier = false;
        self
    }
}

/// Grade `answer` against `question`.
pub fn grade(question: &str, answer: &str, opts: &GradeOptions<'_>) -> GradeResult {
    let criteria = extract_all(question, answer, opts.expected_answer, &opts.rubric);

    let mut raw = criteria.total();
    if opts.include_keyword_modifier {
        raw += keyword_modifier(answer);
    }
    let final_score = clamp_final(raw);
    let verdict = Verdict::from_score(final_score);
    let notes = select_notes(&criteria);

    let feedback = (opts.request_feedback && verdict != Verdict::Pass)
        .then(|| generic_feedback(&notes));

    GradeResult {
        final_score,
        criteria,
        verdict,
        notes,
        source: GradeSource::Deterministic,
        feedback,
    }
}

/// Threshold-based notes, at most two, in a fixed priority order.
pub fn select_notes(c: &CriterionScore) -> Vec<String> {
    let mut notes = Vec::with_capacity(MAX_NOTES);
    if c.correctness >= KEY_POINTS_MIN {
        notes.push(NOTE_KEY_POINTS.to_string());
    }
    if c.reasoning >= REASONING_MIN {
        notes.push(NOTE_REASONING.to_string());
    }
    if c.penalties < 0.0 {
        notes.push(NOTE_UNSUPPORTED.to_string());
    }
    notes.truncate(MAX_NOTES);
    notes
}

/// Fixed improvement suggestions; notes become strengths (never empty).
pub fn generic_feedback(notes: &[String]) -> Feedback {
    let strengths = if notes.is_empty() {
        vec![PLACEHOLDER_STRENGTH.to_string()]
    } else {
        notes.to_vec()
    };
    Feedback {
        strengths,
        improvements: GENERIC_IMPROVEMENTS.iter().map(|s| s.to_string()).collect(),
        next_step: GENERIC_NEXT_STEP.to_string(),
    }
}
