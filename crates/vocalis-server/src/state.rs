//! Application state management

use std::sync::Arc;
use std::time::Instant;

use vocalis_core::{InferenceAdapter, SpeechSynthesizer, StatusManager};

use crate::config::AppConfig;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub synthesizer: Arc<SpeechSynthesizer>,
    pub config: Arc<AppConfig>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(adapter: Arc<dyn InferenceAdapter>, config: AppConfig) -> Self {
        let synthesizer = SpeechSynthesizer::new(
            adapter,
            Arc::new(StatusManager::new()),
            config.engine.clone(),
        );
        Self {
            synthesizer: Arc::new(synthesizer),
            config: Arc::new(config),
            started_at: Instant::now(),
        }
    }

    pub fn status(&self) -> &StatusManager {
        self.synthesizer.status()
    }

    pub fn adapter(&self) -> &Arc<dyn InferenceAdapter> {
        self.synthesizer.adapter()
    }
}
