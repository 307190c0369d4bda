use std::collections::BTreeMap;
use std::sync::Arc;

use metrics::counter;
use serde_json::json;
use shuttle_axum::axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tower_http::cors::CorsLayer;
use tracing::{debug, info, warn};

use crate::config::GraderConfig;
use crate::grading::{
    answer_id, from_grade, from_module_answers, grade_request, lexicon::lexicon, GradeRequest,
    GradeResult, LlmGrader, RubricWeights,
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GraderConfig>,
    /// Present only when the LLM path is enabled and its provider could be built.
    pub llm: Option<Arc<LlmGrader>>,
}

impl AppState {
    /// Build state from a loaded config. A provider that fails to build is
    /// logged and the service runs deterministic-only.
    pub fn from_config(config: GraderConfig) -> Self {
        let llm = if config.llm.enabled {
            match LlmGrader::from_config(&config.llm, config.rubric) {
                Ok(g) => {
                    info!(provider = g.provider_name(), model = %config.llm.model, "llm grading enabled");
                    Some(Arc::new(g))
                }
                Err(e) => {
                    warn!(error = %e, "llm grading disabled: provider unavailable");
                    None
                }
            }
        } else {
            None
        };
        Self {
            config: Arc::new(config),
            llm,
        }
    }

    /// Deterministic-only state with built-in defaults.
    pub fn deterministic() -> Self {
        Self::from_config(GraderConfig::default())
    }

    pub fn with_llm(mut self, grader: LlmGrader) -> Self {
        self.llm = Some(Arc::new(grader));
        self
    }

    fn rubric(&self) -> RubricWeights {
        self.config.rubric
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/health/lexicon", get(lexicon_version))
        .route("/grade", post(grade_handler))
        .route("/grade/legacy", post(grade_legacy_handler))
        .route("/legacy/heuristic", post(legacy_heuristic_handler))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

/// Client-side input error. The grader itself never fails.
struct BadRequest(&'static str);

impl IntoResponse for BadRequest {
    fn into_response(self) -> Response {
        (StatusCode::BAD_REQUEST, Json(json!({ "error": self.0 }))).into_response()
    }
}

async fn lexicon_version() -> Json<serde_json::Value> {
    Json(json!({ "version": lexicon().version }))
}

async fn grade_handler(
    State(state): State<AppState>,
    Json(req): Json<GradeRequest>,
) -> Result<Json<GradeResult>, BadRequest> {
    Ok(Json(run_grade(&state, &req).await?))
}

async fn grade_legacy_handler(
    State(state): State<AppState>,
    Json(req): Json<GradeRequest>,
) -> Result<Json<crate::grading::LegacyGrade>, BadRequest> {
    let result = run_grade(&state, &req).await?;
    let rubric = req.rubric_or(state.rubric());
    Ok(Json(from_grade(&result, &rubric, Some(&req.user_answer))))
}

#[derive(serde::Deserialize)]
struct HeuristicReq {
    #[serde(default)]
    answers: BTreeMap<String, String>,
}

async fn legacy_heuristic_handler(Json(body): Json<HeuristicReq>) -> Json<crate::grading::LegacyGrade> {
    Json(from_module_answers(&body.answers))
}

async fn run_grade(state: &AppState, req: &GradeRequest) -> Result<GradeResult, BadRequest> {
    if req.question_prompt.trim().is_empty() {
        return Err(BadRequest("questionPrompt must not be empty"));
    }

    let result = match (&state.llm, req.use_llm) {
        (Some(llm), true) => llm.grade(req).await,
        (None, true) => {
            debug!("useLLM requested but llm grading is disabled");
            grade_request(req, state.rubric())
        }
        _ => grade_request(req, state.rubric()),
    };

    counter!("grader_grades_total", "source" => result.source.as_str()).increment(1);
    debug!(
        id = %answer_id(&req.user_answer),
        score = result.final_score,
        verdict = result.verdict.as_str(),
        source = result.source.as_str(),
        "graded"
    );
    Ok(result)
}
