//! Strategy Grader: Binary Entrypoint
//! Boots the Axum HTTP server with config, grading routes and Prometheus metrics.

use shuttle_axum::ShuttleAxum;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Structured logs are opt-in: GRADER_LOG=1 enables them, GRADER_LOG_JSON=1
/// switches to JSON lines. Filter comes from RUST_LOG when set.
fn enable_tracing() {
    let on = std::env::var("GRADER_LOG").ok().is_some_and(|v| v == "1");
    if !on {
        return;
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("strategy_grader=info,warn"));
    let json = std::env::var("GRADER_LOG_JSON").ok().is_some_and(|v| v == "1");

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact())
            .init();
    }
}

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();

    enable_tracing();

    let router = strategy_grader::app().await?;
    tracing::info!("strategy grader ready");

    Ok(router.into())
}
