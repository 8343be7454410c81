//! Processing status endpoints

use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use vocalis_core::{memory, status::ProgressSnapshot};

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    #[serde(default)]
    pub include_memory: bool,
    #[serde(default)]
    pub include_history: bool,
    #[serde(default)]
    pub include_stats: bool,
    #[serde(default = "default_status_history_limit")]
    pub history_limit: usize,
}

fn default_status_history_limit() -> usize {
    5
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    #[serde(default = "default_history_limit")]
    pub limit: usize,
}

fn default_history_limit() -> usize {
    10
}

#[derive(Debug, Deserialize)]
pub struct StatisticsQuery {
    #[serde(default)]
    pub include_memory: bool,
}

#[derive(Debug, Deserialize)]
pub struct ClearQuery {
    #[serde(default)]
    pub confirm: bool,
}

fn check_limit(name: &str, value: usize, max: usize) -> Result<(), ApiError> {
    if (1..=max).contains(&value) {
        Ok(())
    } else {
        Err(ApiError::bad_request(format!(
            "{} must be between 1 and {}, got {}",
            name, max, value
        )))
    }
}

fn to_value<T: serde::Serialize>(value: &T) -> Result<Value, ApiError> {
    serde_json::to_value(value).map_err(|e| ApiError::internal(e.to_string()))
}

/// Current processing status with optional extras
pub async fn status(
    State(state): State<AppState>,
    Query(query): Query<StatusQuery>,
) -> Result<Json<Value>, ApiError> {
    check_limit("history_limit", query.history_limit, 20)?;

    let mut body = to_value(&state.status().snapshot())?;
    if let Some(map) = body.as_object_mut() {
        if query.include_memory {
            map.insert("memory_info".to_string(), to_value(&memory::sample())?);
        }
        if query.include_history {
            map.insert(
                "request_history".to_string(),
                to_value(&state.status().history(query.history_limit))?,
            );
        }
        if query.include_stats {
            map.insert(
                "statistics".to_string(),
                to_value(&state.status().statistics())?,
            );
        }
    }
    Ok(Json(body))
}

pub async fn progress(State(state): State<AppState>) -> Json<ProgressSnapshot> {
    Json(state.status().progress())
}

pub async fn history(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Value>, ApiError> {
    check_limit("limit", query.limit, 50)?;

    let history = state.status().history(query.limit);
    Ok(Json(json!({
        "total_records": history.len(),
        "request_history": history,
        "limit": query.limit,
    })))
}

pub async fn statistics(
    State(state): State<AppState>,
    Query(query): Query<StatisticsQuery>,
) -> Result<Json<Value>, ApiError> {
    let mut body = to_value(&state.status().statistics())?;
    if query.include_memory {
        if let Some(map) = body.as_object_mut() {
            map.insert("current_memory".to_string(), to_value(&memory::sample())?);
        }
    }
    Ok(Json(body))
}

pub async fn clear_history(
    State(state): State<AppState>,
    Query(query): Query<ClearQuery>,
) -> Json<Value> {
    if !query.confirm {
        return Json(json!({
            "message": "History clear requires confirmation. Set confirm=true to proceed.",
            "warning": "This will clear all request history except the current active request."
        }));
    }

    state.status().clear_history();
    Json(json!({
        "success": true,
        "message": "TTS request history cleared successfully"
    }))
}

/// Service overview: version, status, statistics, memory and recent requests
pub async fn info(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let status = state.status().snapshot();
    let stats = state.status().statistics();

    Ok(Json(json!({
        "api_name": "Vocalis TTS API",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "operational",
        "uptime_info": {
            "uptime_seconds": state.started_at.elapsed().as_secs(),
            "total_requests": stats.total_requests,
            "success_rate": stats.success_rate,
            "is_processing": status.is_processing(),
        },
        "tts_status": to_value(&status)?,
        "statistics": to_value(&stats)?,
        "memory_info": to_value(&memory::sample())?,
        "recent_requests": to_value(&state.status().history(3))?,
    })))
}
