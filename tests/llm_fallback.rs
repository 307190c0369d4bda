// tests/llm_fallback.rs
//
// The LLM path must always resolve to a valid grade. Every simulated failure
// (status, timeout, empty or malformed body, wrong shape) falls back to the
// exact deterministic result.
//
// Provider doubles: in-process MockProvider, plus a local axum stub that
// speaks the chat-completions wire format for OpenAiProvider.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use serde_json::{json, Value};
use serial_test::serial;

use strategy_grader::config::LlmConfig;
use strategy_grader::grading::llm::{MockProvider, MockReply, OpenAiProvider, MOCK_REPLY};
use strategy_grader::grading::{
    grade_request, GradeRequest, GradeResult, GradeSource, LlmGrader, RubricWeights, Verdict,
};

const QUESTION: &str = "Who pays first, and why now?";
const ANSWER: &str = "Regional dental clinics pay first because no-shows cost them 18% of revenue; \
                      if we cut no-shows by half, then a $300 monthly plan pays back in 3 weeks.";

fn req() -> GradeRequest {
    GradeRequest::new(QUESTION, ANSWER)
}

fn deterministic(req: &GradeRequest) -> GradeResult {
    grade_request(req, RubricWeights::default())
}

fn mock_grader(reply: MockReply) -> LlmGrader {
    LlmGrader::new(Arc::new(MockProvider::new(reply)))
}

fn assert_valid(r: &GradeResult) {
    assert!(r.final_score <= 100);
    assert!(r.criteria.within(&RubricWeights::default()), "{:?}", r.criteria);
    assert_eq!(r.verdict, Verdict::from_score(r.final_score));
    assert!(r.notes.len() <= 2);
}

#[tokio::test]
async fn http_500_falls_back_to_deterministic() {
    let r = mock_grader(MockReply::Status(500)).grade(&req()).await;
    assert_eq!(r.source, GradeSource::Deterministic);
    assert_eq!(r, deterministic(&req()));
    assert_valid(&r);
}

#[tokio::test]
async fn empty_content_falls_back() {
    let r = mock_grader(MockReply::Empty).grade(&req()).await;
    assert_eq!(r, deterministic(&req()));
}

#[tokio::test]
async fn malformed_or_misshapen_json_falls_back() {
    for body in [
        "{not json",
        "Sure! Here is the grade: 80",
        "```json\n{\"finalScore\": 80}\n```",
        "[1, 2, 3]",
        "\"pass\"",
        "",
        "{}",
        r#"{"answer":"great job"}"#,
        r#"{"finalScore": 90, "verdict": "pass"}"#,
        r#"{"finalScore": 90, "criteria": {"correctness": 40, "clarity": 10}}"#,
    ] {
        let r = mock_grader(MockReply::Content(body.to_string())).grade(&req()).await;
        assert_eq!(r.source, GradeSource::Deterministic, "body {body:?}");
        assert_eq!(r, deterministic(&req()));
    }
}

#[tokio::test]
async fn slow_provider_times_out_and_falls_back() {
    let grader = LlmGrader::new(Arc::new(
        MockProvider::content(MOCK_REPLY).with_delay(Duration::from_millis(500)),
    ))
    .with_timeout(Duration::from_millis(50));

    let started = std::time::Instant::now();
    let r = grader.grade(&req()).await;
    assert!(started.elapsed() < Duration::from_millis(450));
    assert_eq!(r.source, GradeSource::Deterministic);
    assert_eq!(r, deterministic(&req()));
}

#[tokio::test]
async fn out_of_range_reply_is_clamped() {
    let body = json!({
        "finalScore": 140,
        "criteria": {"correctness": 90, "completeness": 20, "reasoning": -3,
                     "specificity": "high", "clarity": 10, "penalties": 12},
        "verdict": "borderline",
        "notes": ["solid", "evidence", "third note dropped"],
        "feedback": null
    });
    let r = mock_grader(MockReply::Content(body.to_string())).grade(&req()).await;
    assert_eq!(r.source, GradeSource::Llm);
    assert_eq!(r.final_score, 100);
    assert_eq!(r.verdict, Verdict::Pass);
    assert_eq!(r.criteria.correctness, 40.0);
    assert_eq!(r.criteria.reasoning, 0.0);
    assert_eq!(r.criteria.specificity, 0.0);
    assert_eq!(r.criteria.penalties, 0.0);
    assert_eq!(r.notes, vec!["solid", "evidence"]);
    assert_valid(&r);
}

#[tokio::test]
async fn feedback_kept_only_when_requested() {
    let body = json!({
        "finalScore": 55,
        "criteria": {"correctness": 20, "completeness": 15, "reasoning": 8,
                     "specificity": 6, "clarity": 6, "penalties": 0},
        "verdict": "borderline",
        "notes": [],
        "feedback": {"strengths": ["clear"], "improvements": ["add a metric"], "nextStep": "Quantify churn."}
    })
    .to_string();

    let r = mock_grader(MockReply::Content(body.clone())).grade(&req()).await;
    assert!(r.feedback.is_none());

    let mut with = req();
    with.request_feedback = true;
    let r = mock_grader(MockReply::Content(body)).grade(&with).await;
    let fb = r.feedback.expect("feedback requested and supplied");
    assert_eq!(fb.improvements, vec!["add a metric"]);
    assert_eq!(fb.next_step, "Quantify churn.");
}

#[tokio::test]
async fn blank_answer_never_reaches_the_provider() {
    // A provider that would award 72 must not be consulted for an empty answer.
    let grader = LlmGrader::new(Arc::new(MockProvider::content(MOCK_REPLY)));
    let mut blank = GradeRequest::new(QUESTION, "   ");
    blank.request_feedback = true;
    let r = grader.grade(&blank).await;
    assert_eq!(r.final_score, 0);
    assert_eq!(r.source, GradeSource::Deterministic);
    assert!(r.feedback.is_some());
}

#[tokio::test]
#[serial]
async fn ai_test_mode_error_provider_falls_back() {
    std::env::set_var("AI_TEST_MODE", "error");
    let grader = LlmGrader::from_config(&LlmConfig::default(), RubricWeights::default())
        .expect("test-mode provider");
    std::env::remove_var("AI_TEST_MODE");

    assert_eq!(grader.provider_name(), "mock");
    let r = grader.grade(&req()).await;
    assert_eq!(r, deterministic(&req()));
}

// ------------------------------------------------------------
// OpenAiProvider against a local stub
// ------------------------------------------------------------

fn completion(content: &str) -> Value {
    json!({"choices": [{"index": 0, "message": {"role": "assistant", "content": content}}]})
}

async fn ok_route(headers: HeaderMap, Json(body): Json<Value>) -> impl IntoResponse {
    let authorized = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == "Bearer test-key");
    let well_formed = body["temperature"] == json!(0.0)
        && body["messages"].as_array().map(Vec::len) == Some(2)
        && body["response_format"]["type"] == "json_schema";
    if !authorized || !well_formed {
        return (StatusCode::BAD_REQUEST, Json(json!({"error": "unexpected request"})));
    }
    (StatusCode::OK, Json(completion(MOCK_REPLY)))
}

async fn spawn_stub() -> SocketAddr {
    let app = Router::new()
        .route("/ok/chat/completions", post(ok_route))
        .route(
            "/fail/chat/completions",
            post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "upstream exploded") }),
        )
        .route(
            "/garbage/chat/completions",
            post(|| async { "<html>definitely not json</html>" }),
        )
        .route(
            "/prose/chat/completions",
            post(|| async { Json(completion("I think this answer deserves a 90.")) }),
        )
        .route(
            "/nochoices/chat/completions",
            post(|| async { Json(json!({"choices": []})) }),
        );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind stub");
    let addr = listener.local_addr().expect("stub addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

fn stub_grader(addr: SocketAddr, prefix: &str, key: &str) -> LlmGrader {
    let cfg = LlmConfig {
        base_url: format!("http://{addr}/{prefix}"),
        timeout_ms: 3_000,
        connect_timeout_ms: 1_000,
        ..Default::default()
    };
    let provider = OpenAiProvider::new(&cfg, key).expect("client");
    LlmGrader::new(Arc::new(provider)).with_timeout(cfg.timeout())
}

#[tokio::test]
async fn openai_provider_accepts_valid_reply() {
    let addr = spawn_stub().await;
    let r = stub_grader(addr, "ok", "test-key").grade(&req()).await;
    assert_eq!(r.source, GradeSource::Llm);
    assert_eq!(r.final_score, 72);
    assert_eq!(r.verdict, Verdict::Pass);
    assert_eq!(r.notes, vec!["mock grade"]);
}

#[tokio::test]
async fn openai_provider_failures_fall_back() {
    let addr = spawn_stub().await;
    for prefix in ["fail", "garbage", "prose", "nochoices", "missing-route"] {
        let r = stub_grader(addr, prefix, "test-key").grade(&req()).await;
        assert_eq!(r.source, GradeSource::Deterministic, "prefix {prefix}");
        assert_eq!(r, deterministic(&req()));
    }
}

#[tokio::test]
async fn openai_provider_without_key_falls_back() {
    let addr = spawn_stub().await;
    let r = stub_grader(addr, "ok", "").grade(&req()).await;
    assert_eq!(r.source, GradeSource::Deterministic);
}

#[tokio::test]
async fn unreachable_endpoint_falls_back() {
    // Bind then drop to get a port with nothing listening.
    let addr = {
        let l = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
        l.local_addr().expect("addr")
    };
    let r = stub_grader(addr, "ok", "test-key").grade(&req()).await;
    assert_eq!(r, deterministic(&req()));
}

#[tokio::test]
async fn one_shot_helper_without_key_is_deterministic() {
    let r = strategy_grader::grade_with_llm(&req(), "").await;
    assert_eq!(r.source, GradeSource::Deterministic);
    assert_eq!(r, deterministic(&req()));
}
