//! Versioned keyword tables shared by the feature extractors, the keyword
//! modifier and the legacy heuristic.
//!
//! The tables ship as `lexicon.json` at the crate root and are compiled into the
//! binary. Every term becomes a case-insensitive, word-bounded regex, so
//! "scaled" never counts as "scale" and "sober" never counts as "so".

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

static LEXICON: Lazy<Lexicon> = Lazy::new(|| {
    let raw = include_str!("../../lexicon.json");
    let parsed: RawLexicon = serde_json::from_str(raw).expect("valid grading lexicon");
    Lexicon::compile(parsed)
});

/// Shared, immutable lexicon instance.
pub fn lexicon() -> &'static Lexicon {
    &LEXICON
}

#[derive(Debug, Deserialize)]
struct RawLexicon {
    version: String,
    positive: Vec<String>,
    negative: Vec<String>,
    hedging: Vec<String>,
    vague: Vec<String>,
    fluff: Vec<String>,
    confident: Vec<String>,
    assertive: Vec<String>,
    causal: Vec<String>,
    generic: Vec<String>,
}

/// All keyword tables, compiled.
#[derive(Debug)]
pub struct Lexicon {
    pub version: String,
    /// Domain-strategy terms rewarded by the keyword modifier.
    pub positive: TermTable,
    /// Buzzwords penalized by the keyword modifier.
    pub negative: TermTable,
    pub hedging: TermTable,
    /// Words that signal a claim without substance ("better", "growth").
    pub vague: TermTable,
    pub fluff: TermTable,
    pub confident: TermTable,
    pub assertive: TermTable,
    pub causal: TermTable,
    pub generic: TermTable,
}

impl Lexicon {
    fn compile(raw: RawLexicon) -> Self {
        Self {
            version: raw.version,
            // Modifier tables tolerate a plural ("moats", "network effects").
            positive: TermTable::compile(&raw.positive, true),
            negative: TermTable::compile(&raw.negative, true),
            hedging: TermTable::compile(&raw.hedging, false),
            vague: TermTable::compile(&raw.vague, false),
            fluff: TermTable::compile(&raw.fluff, false),
            confident: TermTable::compile(&raw.confident, false),
            assertive: TermTable::compile(&raw.assertive, false),
            causal: TermTable::compile(&raw.causal, false),
            generic: TermTable::compile(&raw.generic, false),
        }
    }
}

/// One named list of terms with its compiled matchers.
#[derive(Debug)]
pub struct TermTable {
    terms: Vec<(String, Regex)>,
}

impl TermTable {
    fn compile(words: &[String], allow_plural: bool) -> Self {
        let suffix = if allow_plural { "s?" } else { "" };
        let terms = words
            .iter()
            .map(|w| w.trim().to_lowercase())
            .filter(|w| !w.is_empty())
            .map(|w| {
                let body = w
                    .split_whitespace()
                    .map(regex::escape)
                    .collect::<Vec<_>>()
                    .join(r"\s+");
                let re = Regex::new(&format!(r"(?i)\b{body}{suffix}\b")).expect("lexicon term regex");
                (w, re)
            })
            .collect();
        Self { terms }
    }

    /// Total occurrences of every term, duplicates included.
    pub fn count(&self, text: &str) -> usize {
        self.terms.iter().map(|(_, re)| re.find_iter(text).count()).sum()
    }

    pub fn contains_any(&self, text: &str) -> bool {
        self.terms.iter().any(|(_, re)| re.is_match(text))
    }

    /// `(term, occurrences)` for each term found at least once, in table order.
    pub fn hits<'a>(&'a self, text: &'a str) -> impl Iterator<Item = (&'a str, usize)> + 'a {
        self.terms.iter().filter_map(move |(term, re)| {
            let n = re.find_iter(text).count();
            (n > 0).then_some((term.as_str(), n))
        })
    }

    pub fn terms(&self) -> impl Iterator<Item = &str> {
        self.terms.iter().map(|(t, _)| t.as_str())
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}
