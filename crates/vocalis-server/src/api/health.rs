//! Health and connectivity endpoints

use axum::{extract::State, Json};
use serde::Serialize;
use serde_json::{json, Value};

use vocalis_core::{memory, InitializationState, MemorySample};

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub model_loaded: bool,
    pub device: String,
    pub config: Value,
    pub memory_info: MemorySample,
    pub initialization_state: InitializationState,
    pub initialization_progress: String,
    pub initialization_error: Option<String>,
    pub uptime_seconds: u64,
}

/// Always answers, including while the model is still loading
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let readiness = state.adapter().readiness();
    let engine = &state.config.engine;

    let status = match readiness.state {
        InitializationState::Ready => "healthy",
        InitializationState::Initializing => "initializing",
        InitializationState::Error => "error",
        InitializationState::NotStarted => "starting",
    };

    Json(HealthResponse {
        status,
        model_loaded: readiness.is_ready(),
        device: readiness
            .device
            .clone()
            .unwrap_or_else(|| "unknown".to_string()),
        config: json!({
            "max_chunk_length": engine.max_chunk_length,
            "max_total_length": engine.max_total_length,
            "voice_sample_path": engine.voice_sample_path,
            "default_exaggeration": engine.exaggeration,
            "default_cfg_weight": engine.cfg_weight,
            "default_temperature": engine.temperature,
        }),
        memory_info: memory::sample(),
        initialization_state: readiness.state,
        initialization_progress: readiness.progress,
        initialization_error: readiness.error,
        uptime_seconds: state.started_at.elapsed().as_secs(),
    })
}

pub async fn ping() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "message": "Server is running"
    }))
}
