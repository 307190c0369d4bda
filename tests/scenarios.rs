// tests/scenarios.rs
//
// End-to-end checks of the deterministic grader on realistic answers.
//
// Covered:
// - strong, evidence-backed answer passes
// - keyword stuffing cannot buy a pass
// - confident but unsupported claims are penalized
// - determinism, bounds, empty-input law, verdict bands

use strategy_grader::grading::{grade, GradeOptions, RubricWeights, Verdict};

const QUESTION: &str =
    "What is your defensible advantage, and what would have to be true for it to hold in 18 months?";

const STRONG: &str = "Our advantage is proprietary data: we hold 4 years of Shopify Plus checkout logs that competitors cannot buy. Customers stay because switching means retraining their fraud models, and cohort retention sits at 94% after 12 months. For this to hold in 18 months, CAC must stay under $400 per account; if CAC rises above that, then payback stretches past 14 months and the moat erodes. We are not betting on features; we are betting on the data flywheel, so every new merchant makes the model sharper for everyone else.";

const STUFFED: &str = "Our moat is our advantage. The moat protects the advantage, and the advantage deepens the moat. Moat and advantage, advantage and moat: that moat is the advantage that keeps our advantage a moat.";

const CONFIDENT_VAGUE: &str = "We will definitely win this market. Customers clearly love us and we obviously have the strongest team. We guarantee that we will always stay ahead of every competitor.";

fn opts() -> GradeOptions<'static> {
    GradeOptions::default()
}

#[test]
fn strong_answer_passes_with_evidence_and_reasoning() {
    let r = grade(QUESTION, STRONG, &opts());
    assert!(r.final_score >= 65, "score was {}", r.final_score);
    assert_eq!(r.verdict, Verdict::Pass);
    assert!(r.criteria.correctness >= 20.0, "{:?}", r.criteria);
    assert!(r.criteria.reasoning >= 8.0, "{:?}", r.criteria);
    assert_eq!(r.criteria.penalties, 0.0);
    assert!(r.notes.iter().any(|n| n == "shows reasoning"));
}

#[test]
fn keyword_stuffing_does_not_pass() {
    let r = grade(QUESTION, STUFFED, &opts());
    assert!(r.final_score < 55, "score was {}", r.final_score);
    assert!(r.criteria.correctness < 25.0, "{:?}", r.criteria);
    assert!(r.criteria.penalties <= 0.0);
    assert_ne!(r.verdict, Verdict::Pass);
}

#[test]
fn confident_unsupported_claims_are_penalized() {
    let r = grade(QUESTION, CONFIDENT_VAGUE, &opts());
    assert!(r.criteria.penalties <= -5.0, "{:?}", r.criteria);
    assert!(r.final_score < 60, "score was {}", r.final_score);
    assert!(r.notes.iter().any(|n| n == "unsupported or vague claims"));
}

#[test]
fn scenarios_rank_in_expected_order() {
    let strong = grade(QUESTION, STRONG, &opts()).final_score;
    let stuffed = grade(QUESTION, STUFFED, &opts()).final_score;
    let vague = grade(QUESTION, CONFIDENT_VAGUE, &opts()).final_score;
    assert!(strong > stuffed && stuffed > vague, "{strong} / {stuffed} / {vague}");
}

#[test]
fn grading_is_deterministic() {
    let reference = Some("Proprietary data and switching costs; CAC under $400.");
    for answer in [STRONG, STUFFED, CONFIDENT_VAGUE, "", "ok"] {
        let o = opts().with_expected(reference).with_feedback(true);
        assert_eq!(grade(QUESTION, answer, &o), grade(QUESTION, answer, &o));
    }
}

#[test]
fn every_result_stays_within_bounds() {
    let rubrics = [
        RubricWeights::default(),
        RubricWeights {
            correctness: 10.0,
            reasoning: 30.0,
            fluff_penalty_max: -2.0,
            ..Default::default()
        },
        RubricWeights {
            correctness: 500.0,
            hallucination_penalty_max: 7.0,
            ..Default::default()
        },
    ];
    let answers = [
        STRONG,
        STUFFED,
        CONFIDENT_VAGUE,
        "   ",
        "synergy synergy leverage optimize robust scale paradigm ecosystem",
        "1. Price 2. Channel 3. Team 4. Data",
    ];
    for rubric in rubrics {
        let o = opts().with_rubric(rubric);
        for a in answers {
            let r = grade(QUESTION, a, &o);
            assert!(r.final_score <= 100);
            assert!(r.criteria.within(&o.rubric), "{a:?} -> {:?}", r.criteria);
            assert!(r.notes.len() <= 2);
        }
    }
}

#[test]
fn empty_answer_scores_zero_under_any_rubric() {
    for rubric in [
        RubricWeights::default(),
        RubricWeights {
            completeness: 60.0,
            ..Default::default()
        },
    ] {
        for blank in ["", " ", "\n\t  "] {
            let r = grade(QUESTION, blank, &opts().with_rubric(rubric));
            assert_eq!(r.final_score, 0);
            assert_eq!(r.verdict, Verdict::Fail);
            assert_eq!(r.criteria.correctness, 0.0);
            assert_eq!(r.criteria.completeness, 0.0);
        }
    }
}

#[test]
fn verdict_bands_follow_final_score() {
    for answer in [STRONG, STUFFED, CONFIDENT_VAGUE, "We sell to dentists.", ""] {
        let r = grade(QUESTION, answer, &opts());
        let expected = match r.final_score {
            70..=100 => Verdict::Pass,
            50..=69 => Verdict::Borderline,
            _ => Verdict::Fail,
        };
        assert_eq!(r.verdict, expected, "score {}", r.final_score);
    }
    for s in 0..=100u8 {
        let v = Verdict::from_score(s);
        assert_eq!(v == Verdict::Pass, s >= 70);
        assert_eq!(v == Verdict::Borderline, (50..70).contains(&s));
        assert_eq!(v == Verdict::Fail, s < 50);
    }
}

#[test]
fn feedback_is_attached_only_below_pass() {
    let weak = grade(QUESTION, CONFIDENT_VAGUE, &opts().with_feedback(true));
    let fb = weak.feedback.expect("feedback for non-passing answer");
    assert!(!fb.strengths.is_empty());
    assert!(!fb.next_step.is_empty());

    let strong = grade(QUESTION, STRONG, &opts().with_feedback(true));
    assert!(strong.feedback.is_none());
}
