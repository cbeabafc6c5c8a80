//! HTTP route definitions

use axum::{extract::State, response::Json, routing::get, Router};
use serde::Serialize;
use tower_http::trace::TraceLayer;

use crate::app::AppState;
use crate::stream::{ClockRunState, DeliveryMode};
use crate::util::time::uptime_secs;
use crate::ws::handler::ws_handler;

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/ws", get(ws_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn root_handler() -> &'static str {
    "Arcade stream server is running"
}

// ============================================================================
// Health endpoint
// ============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    game: &'static str,
    /// The clock is running and producing frames
    streaming: bool,
    /// False after the simulation failed to start or terminated fatally
    loaded: bool,
    run_state: ClockRunState,
    delivery_mode: DeliveryMode,
    sessions: usize,
    uptime_secs: u64,
    ticks: u64,
    frames_encoded: u64,
    tick_errors: u64,
    encode_errors: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_error: Option<String>,
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let clock = state.lifecycle.status();
    let last_error = clock.last_error();
    let run_state = clock.run_state();

    Json(HealthResponse {
        status: "ok",
        game: state.lifecycle.game_name(),
        streaming: run_state == ClockRunState::Running,
        loaded: last_error.is_none(),
        run_state,
        delivery_mode: state.channel.mode(),
        sessions: state.channel.session_count(),
        uptime_secs: uptime_secs(),
        ticks: clock.ticks(),
        frames_encoded: clock.frames_encoded(),
        tick_errors: clock.tick_errors(),
        encode_errors: clock.encode_errors(),
        last_error,
    })
}
