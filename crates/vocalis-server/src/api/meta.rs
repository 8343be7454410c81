//! Read-only service description: configuration, routes and models

use axum::{extract::State, Json};
use serde::Serialize;
use serde_json::{json, Map, Value};

use super::aliases::ENDPOINT_ALIASES;
use crate::state::AppState;

/// Model id advertised to OpenAI-compatible clients
const MODEL_ID: &str = "chatterbox-tts-1";
const MODEL_CREATED: u64 = 1677649963;
const MODEL_OWNER: &str = "resemble-ai";

#[derive(Debug, Serialize)]
pub struct ModelInfo {
    pub id: &'static str,
    pub object: &'static str,
    pub created: u64,
    pub owned_by: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ModelsResponse {
    pub object: &'static str,
    pub data: Vec<ModelInfo>,
}

/// Current server, model and default parameter configuration
pub async fn config(State(state): State<AppState>) -> Json<Value> {
    let server = &state.config.server;
    let engine = &state.config.engine;
    let device = state
        .adapter()
        .readiness()
        .device
        .unwrap_or_else(|| engine.device.clone());

    Json(json!({
        "server": {
            "host": server.host,
            "port": server.port,
        },
        "model": {
            "device": device,
            "voice_sample_path": engine.voice_sample_path,
            "sample_rate": state.adapter().sample_rate(),
        },
        "defaults": {
            "exaggeration": engine.exaggeration,
            "cfg_weight": engine.cfg_weight,
            "temperature": engine.temperature,
            "max_chunk_length": engine.max_chunk_length,
            "max_total_length": engine.max_total_length,
        },
        "memory_management": {
            "memory_cleanup_interval": engine.memory_cleanup_interval,
            "enable_memory_monitoring": engine.enable_memory_monitoring,
        },
    }))
}

/// Every primary path with the aliases served by the same handler
pub async fn endpoints() -> Json<Value> {
    let mappings: Map<String, Value> = ENDPOINT_ALIASES
        .iter()
        .map(|(primary, aliases)| {
            (
                primary.to_string(),
                json!({
                    "primary": primary,
                    "aliases": aliases,
                    "total_paths": 1 + aliases.len(),
                }),
            )
        })
        .collect();

    Json(json!({
        "total_endpoints": ENDPOINT_ALIASES.len(),
        "total_aliases": ENDPOINT_ALIASES.iter().map(|(_, a)| a.len()).sum::<usize>(),
        "mappings": mappings,
        "description": "Every endpoint is also served under its aliases",
        "usage": {
            "primary_endpoints": "Short paths, recommended for new integrations",
            "v1_aliases": "OpenAI-compatible paths for existing tools",
            "example": {
                "primary": "/audio/speech",
                "aliases": ["/v1/audio/speech"],
            },
        },
    }))
}

pub async fn models() -> Json<ModelsResponse> {
    Json(ModelsResponse {
        object: "list",
        data: vec![ModelInfo {
            id: MODEL_ID,
            object: "model",
            created: MODEL_CREATED,
            owned_by: MODEL_OWNER,
        }],
    })
}
