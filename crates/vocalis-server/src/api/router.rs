use axum::{
    extract::DefaultBodyLimit,
    http::HeaderValue,
    routing::{get, post, MethodRouter},
    Router,
};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use super::{aliases, health, meta, speech, status};
use crate::state::AppState;

/// Headroom for form fields around an uploaded voice sample
const FORM_OVERHEAD_BYTES: usize = 1024 * 1024;

/// Register `method` under `primary` and every alias of it
fn route_with_aliases(
    router: Router<AppState>,
    primary: &'static str,
    method: MethodRouter<AppState>,
) -> Router<AppState> {
    aliases::all_paths(primary).fold(router, |router, path| router.route(path, method.clone()))
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() {
        return layer.allow_origin(Any);
    }

    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin '{}'", origin);
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(parsed))
}

/// Create the main API router.
pub fn create_router(state: AppState) -> Router {
    let upload_limit = DefaultBodyLimit::max(speech::MAX_VOICE_FILE_BYTES + FORM_OVERHEAD_BYTES);

    let routes: [(&'static str, MethodRouter<AppState>); 15] = [
        ("/audio/speech", post(speech::speech)),
        (
            "/audio/speech/upload",
            post(speech::speech_upload).layer(upload_limit),
        ),
        ("/audio/speech/stream", post(speech::speech_stream)),
        (
            "/audio/speech/stream/upload",
            post(speech::speech_stream_upload).layer(upload_limit),
        ),
        ("/health", get(health::health)),
        ("/ping", get(health::ping)),
        ("/status", get(status::status)),
        ("/status/progress", get(status::progress)),
        ("/status/history", get(status::history)),
        ("/status/statistics", get(status::statistics)),
        ("/status/history/clear", post(status::clear_history)),
        ("/info", get(status::info)),
        ("/config", get(meta::config)),
        ("/endpoints", get(meta::endpoints)),
        ("/models", get(meta::models)),
    ];

    let cors = cors_layer(&state.config.server.allowed_origins());
    routes
        .into_iter()
        .fold(Router::new(), |router, (primary, method)| {
            route_with_aliases(router, primary, method)
        })
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
