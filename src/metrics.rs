use axum::{routing::get, Router};
use metrics::{describe_counter, describe_histogram, Unit};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

/// Upper bounds (ms) for `grader_llm_duration_ms`.
const LLM_DURATION_BUCKETS: &[f64] = &[
    50.0, 100.0, 250.0, 500.0, 1_000.0, 2_500.0, 5_000.0, 10_000.0, 15_000.0,
];

static METRICS: OnceCell<Metrics> = OnceCell::new();

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the Prometheus recorder once per process and describe the
    /// grader series. Later calls return the same instance.
    pub fn init() -> anyhow::Result<&'static Self> {
        METRICS.get_or_try_init(|| {
            let handle = PrometheusBuilder::new()
                .set_buckets_for_metric(
                    Matcher::Full("grader_llm_duration_ms".to_string()),
                    LLM_DURATION_BUCKETS,
                )?
                .install_recorder()
                .map_err(|e| anyhow::anyhow!("prometheus: install recorder: {e}"))?;

            describe_counter!("grader_grades_total", "Graded answers by result source");
            describe_counter!(
                "grader_llm_fallback_total",
                "LLM grades replaced by the deterministic grade, by reason"
            );
            describe_histogram!(
                "grader_llm_duration_ms",
                Unit::Milliseconds,
                "Wall time of one LLM grading attempt"
            );

            Ok(Self { handle })
        })
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}
