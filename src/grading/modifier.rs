//! Anti-gaming keyword modifier.
//!
//! Rewards the *breadth* of domain vocabulary, not its volume: each lexicon term
//! counts once, and every extra repetition of an already-matched term feeds a
//! spam penalty. Output is bounded to `[-5, 5]`.
//!
//! ```text
//! modifier = (unique_positive - unique_negative) * 0.5
//!          - min(3, 0.2 * (total_hits - distinct_hits))
//! ```

use super::lexicon::lexicon;

pub const MODIFIER_BOUND: f32 = 5.0;
const UNIQUE_HIT_WEIGHT: f32 = 0.5;
const REPEAT_WEIGHT: f32 = 0.2;
const MAX_SPAM_PENALTY: f32 = 3.0;

/// Raw keyword tallies behind one modifier value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeywordHits {
    pub unique_positive: usize,
    pub unique_negative: usize,
    /// Occurrences of all matched terms, duplicates included.
    pub total: usize,
    /// Number of distinct terms matched (positive and negative).
    pub distinct: usize,
}

impl KeywordHits {
    /// Excess repetitions beyond the first mention of each term.
    pub fn repeats(&self) -> usize {
        self.total.saturating_sub(self.distinct)
    }

    pub fn spam_penalty(&self) -> f32 {
        f32::min(MAX_SPAM_PENALTY, REPEAT_WEIGHT * self.repeats() as f32)
    }

    pub fn modifier(&self) -> f32 {
        let breadth = (self.unique_positive as f32 - self.unique_negative as f32) * UNIQUE_HIT_WEIGHT;
        (breadth - self.spam_penalty()).clamp(-MODIFIER_BOUND, MODIFIER_BOUND)
    }
}

pub fn keyword_hits(text: &str) -> KeywordHits {
    if text.trim().is_empty() {
        return KeywordHits::default();
    }
    let lx = lexicon();
    let mut hits = KeywordHits::default();
    for (_, n) in lx.positive.hits(text) {
        hits.unique_positive += 1;
        hits.distinct += 1;
        hits.total += n;
    }
    for (_, n) in lx.negative.hits(text) {
        hits.unique_negative += 1;
        hits.distinct += 1;
        hits.total += n;
    }
    hits
}

/// Bounded adjustment in `[-5, 5]`; exactly 0 for blank text.
pub fn keyword_modifier(text: &str) -> f32 {
    keyword_hits(text).modifier()
}
