//! Thread-safe tracker for the live request and recent history

use chrono::{Duration, Utc};
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

use super::types::{
    Progress, ProgressSnapshot, RecordView, RequestParameters, RequestRecord, RequestState,
    StatusSnapshot, Statistics,
};
use crate::memory::MemorySample;
use crate::text::preview;

/// Archived records kept for history and statistics
pub const HISTORY_CAPACITY: usize = 10;

/// Optional fields carried by a status update
#[derive(Debug, Clone, Default)]
pub struct StatusUpdate {
    pub step: Option<String>,
    pub current_chunk: Option<usize>,
    pub total_chunks: Option<usize>,
    pub memory: Option<MemorySample>,
    pub error: Option<String>,
}

impl StatusUpdate {
    pub fn step(step: impl Into<String>) -> Self {
        Self {
            step: Some(step.into()),
            ..Default::default()
        }
    }

    pub fn chunks(mut self, current: usize, total: usize) -> Self {
        self.current_chunk = Some(current);
        self.total_chunks = Some(total);
        self
    }

    pub fn memory(mut self, sample: MemorySample) -> Self {
        self.memory = Some(sample);
        self
    }

    pub fn error(mut self, message: impl Into<String>) -> Self {
        self.error = Some(message.into());
        self
    }
}

#[derive(Default)]
struct StatusInner {
    current: Option<RequestRecord>,
    /// Records displaced by a newer request; they only accept their final update
    superseded: Vec<RequestRecord>,
    history: VecDeque<RequestRecord>,
    total_requests: u64,
}

impl StatusInner {
    fn archive(&mut self, record: RequestRecord) {
        self.history.push_back(record);
        while self.history.len() > HISTORY_CAPACITY {
            self.history.pop_front();
        }
    }
}

/// Process-wide request status tracker.
///
/// One instance is created at startup and shared by handle. Every operation
/// takes the single internal lock once, so readers never observe a record
/// half-way through an update.
#[derive(Default)]
pub struct StatusManager {
    inner: Mutex<StatusInner>,
}

impl StatusManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, StatusInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Begin tracking a request and make it the live record.
    ///
    /// Returns the short request id used by every later update.
    pub fn start(
        &self,
        text: &str,
        voice_source: impl Into<String>,
        parameters: impl Into<RequestParameters>,
    ) -> String {
        let mut request_id = uuid::Uuid::new_v4().simple().to_string();
        request_id.truncate(8);

        let record = RequestRecord {
            request_id: request_id.clone(),
            state: RequestState::Initializing,
            start_time: Utc::now(),
            end_time: None,
            text_length: text.chars().count(),
            text_preview: preview(text),
            voice_source: voice_source.into(),
            parameters: parameters.into(),
            progress: Progress::default(),
            error_message: None,
            memory_usage: MemorySample::default(),
        };

        let mut inner = self.lock();
        if let Some(previous) = inner.current.replace(record) {
            if previous.is_active() {
                debug!(
                    "Request {} superseded by {} as the live record",
                    previous.request_id, request_id
                );
                inner.superseded.push(previous);
                while inner.superseded.len() > HISTORY_CAPACITY {
                    let dropped = inner.superseded.remove(0);
                    warn!("Dropping unfinished request {}", dropped.request_id);
                }
            }
        }
        inner.total_requests += 1;
        request_id
    }

    /// Apply an update to the live record.
    ///
    /// Returns false when `request_id` is not the live record. A displaced
    /// record still accepts its terminal update, which archives it.
    pub fn update(&self, request_id: &str, state: RequestState, update: StatusUpdate) -> bool {
        let mut inner = self.lock();

        let is_live = inner
            .current
            .as_ref()
            .is_some_and(|record| record.request_id == request_id);

        if is_live {
            if let Some(record) = inner.current.as_mut() {
                apply(record, state, update);
            }
            if state.is_terminal() {
                if let Some(record) = inner.current.take() {
                    inner.archive(record);
                }
            }
            return true;
        }

        if state.is_terminal() {
            if let Some(pos) = inner
                .superseded
                .iter()
                .position(|record| record.request_id == request_id)
            {
                let mut record = inner.superseded.remove(pos);
                apply(&mut record, state, update);
                inner.archive(record);
                return true;
            }
        }

        false
    }

    /// Current live record, or the idle sentinel
    pub fn snapshot(&self) -> StatusSnapshot {
        let inner = self.lock();
        match &inner.current {
            Some(record) => StatusSnapshot::Active {
                record: record.view(),
                is_processing: true,
                total_requests: inner.total_requests,
            },
            None => StatusSnapshot::Idle {
                status: RequestState::Idle,
                is_processing: false,
                total_requests: inner.total_requests,
                message: "No active requests".to_string(),
            },
        }
    }

    /// Lightweight progress of the live record
    pub fn progress(&self) -> ProgressSnapshot {
        let inner = self.lock();
        match &inner.current {
            Some(record) => ProgressSnapshot::Active {
                is_processing: true,
                status: record.state,
                current_step: record.progress.current_step.clone(),
                current_chunk: record.progress.current_chunk,
                total_chunks: record.progress.total_chunks,
                progress_percentage: record.progress.progress_percentage(),
                duration_seconds: record.duration_seconds(),
                estimated_completion: record
                    .progress
                    .estimated_completion
                    .map(|t| t.timestamp_millis() as f64 / 1000.0),
                text_preview: record.text_preview.clone(),
            },
            None => ProgressSnapshot::Idle {
                is_processing: false,
                status: RequestState::Idle,
                message: "No active TTS requests".to_string(),
            },
        }
    }

    /// Up to `limit` archived records, most recent first
    pub fn history(&self, limit: usize) -> Vec<RecordView> {
        let inner = self.lock();
        inner
            .history
            .iter()
            .rev()
            .take(limit)
            .map(RequestRecord::view)
            .collect()
    }

    pub fn statistics(&self) -> Statistics {
        let inner = self.lock();

        let completed: Vec<&RequestRecord> = inner
            .history
            .iter()
            .filter(|r| r.state == RequestState::Completed)
            .collect();
        let errored = inner
            .history
            .iter()
            .filter(|r| r.state == RequestState::Error)
            .count();

        let (average_duration_seconds, average_text_length) = if completed.is_empty() {
            (0.0, 0.0)
        } else {
            let n = completed.len() as f64;
            (
                completed.iter().map(|r| r.duration_seconds()).sum::<f64>() / n,
                completed.iter().map(|r| r.text_length as f64).sum::<f64>() / n,
            )
        };

        Statistics {
            total_requests: inner.total_requests,
            completed_requests: completed.len(),
            error_requests: errored,
            success_rate: completed.len() as f64 / (completed.len() + errored).max(1) as f64
                * 100.0,
            average_duration_seconds,
            average_text_length,
            is_processing: inner.current.is_some(),
        }
    }

    /// Drop archived records; the live record is kept
    pub fn clear_history(&self) {
        self.lock().history.clear();
    }

    pub fn total_requests(&self) -> u64 {
        self.lock().total_requests
    }
}

fn apply(record: &mut RequestRecord, state: RequestState, update: StatusUpdate) {
    let now = Utc::now();
    record.state = state;

    if let Some(step) = update.step.filter(|s| !s.is_empty()) {
        record.progress.current_step = step;
    }

    let previous = record.progress.progress_percentage();
    let candidate = Progress {
        current_chunk: update.current_chunk.unwrap_or(record.progress.current_chunk),
        total_chunks: update.total_chunks.unwrap_or(record.progress.total_chunks),
        ..Progress::default()
    };
    // Progress never moves backwards for a given request
    if candidate.progress_percentage() >= previous {
        record.progress.current_chunk = candidate.current_chunk;
        record.progress.total_chunks = candidate.total_chunks;
    }

    let progress = &mut record.progress;
    if progress.current_chunk > 0 && progress.total_chunks > 0 {
        let elapsed_ms = (now - record.start_time).num_milliseconds().max(0) as f64;
        let remaining_chunks = progress.total_chunks.saturating_sub(progress.current_chunk) as f64;
        let remaining_ms = elapsed_ms / progress.current_chunk as f64 * remaining_chunks;
        progress.estimated_completion = Some(now + Duration::milliseconds(remaining_ms as i64));
    }

    if let Some(sample) = update.memory {
        if sample.cpu_memory_mb.is_some() {
            record.memory_usage.cpu_memory_mb = sample.cpu_memory_mb;
        }
        if sample.cpu_memory_percent.is_some() {
            record.memory_usage.cpu_memory_percent = sample.cpu_memory_percent;
        }
    }

    if let Some(error) = update.error.filter(|e| !e.is_empty()) {
        record.error_message = Some(error);
    }

    if state.is_terminal() {
        record.end_time = Some(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::{GenerationParameters, VoiceReference};
    use std::sync::Arc;

    fn params() -> GenerationParameters {
        GenerationParameters {
            exaggeration: 0.5,
            cfg_weight: 0.5,
            temperature: 0.8,
            voice: VoiceReference::configured("voice.wav"),
        }
    }

    fn live(manager: &StatusManager) -> RecordView {
        match manager.snapshot() {
            StatusSnapshot::Active { record, .. } => record,
            StatusSnapshot::Idle { .. } => panic!("expected a live record"),
        }
    }

    #[test]
    fn test_idle_sentinel() {
        let manager = StatusManager::new();
        let snapshot = manager.snapshot();
        assert!(!snapshot.is_processing());
        match snapshot {
            StatusSnapshot::Idle {
                status,
                total_requests,
                ..
            } => {
                assert_eq!(status, RequestState::Idle);
                assert_eq!(total_requests, 0);
            }
            StatusSnapshot::Active { .. } => panic!("expected idle"),
        }
    }

    #[test]
    fn test_start_creates_initializing_record() {
        let manager = StatusManager::new();
        let long_text = "x".repeat(150);
        let id = manager.start(&long_text, "configured sample", params());

        assert_eq!(id.len(), 8);
        let record = live(&manager);
        assert_eq!(record.request_id, id);
        assert_eq!(record.status, RequestState::Initializing);
        assert_eq!(record.text_length, 150);
        assert_eq!(record.text_preview.chars().count(), 103);
        assert_eq!(record.voice_source, "configured sample");
        assert!(record.is_active);
        assert_eq!(manager.total_requests(), 1);
    }

    #[test]
    fn test_progress_is_monotonic_and_reaches_100() {
        let manager = StatusManager::new();
        let id = manager.start("text", "configured sample", params());

        let mut last = 0.0;
        for chunk in 1..=4 {
            manager.update(
                &id,
                RequestState::GeneratingAudio,
                StatusUpdate::step(format!("chunk {}", chunk)).chunks(chunk, 4),
            );
            let pct = live(&manager).progress.progress_percentage;
            assert!(pct >= last);
            last = pct;
        }
        assert_eq!(last, 100.0);

        // A regressive update does not move progress backwards
        manager.update(
            &id,
            RequestState::GeneratingAudio,
            StatusUpdate::default().chunks(1, 4),
        );
        let record = live(&manager);
        assert_eq!(record.progress.progress_percentage, 100.0);
        assert_eq!(record.progress.current_chunk, 4);
    }

    #[test]
    fn test_estimated_completion_set_once_chunks_progress() {
        let manager = StatusManager::new();
        let id = manager.start("text", "configured sample", params());

        manager.update(&id, RequestState::Chunking, StatusUpdate::default().chunks(0, 3));
        assert!(live(&manager).progress.estimated_completion.is_none());

        manager.update(
            &id,
            RequestState::GeneratingAudio,
            StatusUpdate::default().chunks(1, 3),
        );
        let record = live(&manager);
        let eta = record.progress.estimated_completion.unwrap();
        assert!(eta >= record.start_time);
    }

    #[test]
    fn test_mismatched_id_is_noop() {
        let manager = StatusManager::new();
        let id = manager.start("text", "configured sample", params());
        manager.update(
            &id,
            RequestState::GeneratingAudio,
            StatusUpdate::step("working").chunks(1, 2),
        );
        let before = live(&manager);

        let applied = manager.update(
            "deadbeef",
            RequestState::Error,
            StatusUpdate::step("hijack").chunks(2, 2).error("boom"),
        );
        assert!(!applied);

        let after = live(&manager);
        assert_eq!(after.status, before.status);
        assert_eq!(after.progress.current_step, "working");
        assert_eq!(after.progress.current_chunk, 1);
        assert!(after.error_message.is_none());
        assert!(manager.history(10).is_empty());
    }

    #[test]
    fn test_terminal_update_archives_record() {
        let manager = StatusManager::new();
        let id = manager.start("text", "configured sample", params());
        manager.update(
            &id,
            RequestState::Error,
            StatusUpdate::step("failed").error("TTS generation failed: boom"),
        );

        assert!(!manager.snapshot().is_processing());
        let history = manager.history(5);
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].status, RequestState::Error);
        assert_eq!(
            history[0].error_message.as_deref(),
            Some("TTS generation failed: boom")
        );
        assert!(history[0].end_time.is_some());
        assert!(!history[0].is_active);

        // Records are immutable once finalized
        assert!(!manager.update(&id, RequestState::Completed, StatusUpdate::default()));
        assert_eq!(manager.history(5)[0].status, RequestState::Error);
    }

    #[test]
    fn test_history_capacity_and_order() {
        let manager = StatusManager::new();
        let mut ids = Vec::new();
        for i in 0..11 {
            let id = manager.start(&format!("request {}", i), "configured sample", params());
            manager.update(&id, RequestState::Completed, StatusUpdate::default());
            ids.push(id);
        }

        let history = manager.history(50);
        assert_eq!(history.len(), HISTORY_CAPACITY);
        assert_eq!(history[0].request_id, ids[10]);
        assert_eq!(history[9].request_id, ids[1]);
        assert!(history.iter().all(|r| r.request_id != ids[0]));

        assert_eq!(manager.history(3).len(), 3);
        assert_eq!(manager.total_requests(), 11);
    }

    #[test]
    fn test_overlapping_requests_archive_independently() {
        let manager = StatusManager::new();
        let first = manager.start("first", "configured sample", params());
        let second = manager.start("second", "uploaded file", params());

        // Only the newest request is observable; the older one cannot change it
        assert!(!manager.update(
            &first,
            RequestState::GeneratingAudio,
            StatusUpdate::default().chunks(1, 2),
        ));
        assert_eq!(live(&manager).request_id, second);

        assert!(manager.update(&first, RequestState::Completed, StatusUpdate::default()));
        assert_eq!(live(&manager).request_id, second);

        manager.update(&second, RequestState::Completed, StatusUpdate::default());
        let history = manager.history(10);
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].request_id, second);
        assert_eq!(history[1].request_id, first);
    }

    #[test]
    fn test_statistics() {
        let manager = StatusManager::new();
        let stats = manager.statistics();
        assert_eq!(stats.success_rate, 0.0);
        assert_eq!(stats.average_text_length, 0.0);

        for (text, state) in [
            ("aaaa", RequestState::Completed),
            ("bb", RequestState::Completed),
            ("c", RequestState::Completed),
            ("dddddd", RequestState::Error),
        ] {
            let id = manager.start(text, "configured sample", params());
            manager.update(&id, state, StatusUpdate::default());
        }

        let stats = manager.statistics();
        assert_eq!(stats.total_requests, 4);
        assert_eq!(stats.completed_requests, 3);
        assert_eq!(stats.error_requests, 1);
        assert_eq!(stats.success_rate, 75.0);
        assert!((stats.average_text_length - 7.0 / 3.0).abs() < 1e-9);
        assert!(!stats.is_processing);
    }

    #[test]
    fn test_clear_history_keeps_live_record() {
        let manager = StatusManager::new();
        let done = manager.start("done", "configured sample", params());
        manager.update(&done, RequestState::Completed, StatusUpdate::default());
        let live_id = manager.start("live", "configured sample", params());

        manager.clear_history();
        assert!(manager.history(10).is_empty());
        assert_eq!(live(&manager).request_id, live_id);
    }

    #[test]
    fn test_memory_sample_merged() {
        let manager = StatusManager::new();
        let id = manager.start("text", "configured sample", params());
        manager.update(
            &id,
            RequestState::Initializing,
            StatusUpdate::default().memory(MemorySample {
                cpu_memory_mb: Some(512.0),
                cpu_memory_percent: Some(5.0),
            }),
        );
        manager.update(
            &id,
            RequestState::Completed,
            StatusUpdate::default().memory(MemorySample {
                cpu_memory_mb: Some(600.0),
                cpu_memory_percent: None,
            }),
        );
        let record = &manager.history(1)[0];
        assert_eq!(record.memory_usage.cpu_memory_mb, Some(600.0));
        assert_eq!(record.memory_usage.cpu_memory_percent, Some(5.0));
    }

    #[test]
    fn test_concurrent_updates() {
        let manager = Arc::new(StatusManager::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let manager = Arc::clone(&manager);
                std::thread::spawn(move || {
                    let id = manager.start(&format!("thread {}", i), "configured sample", params());
                    for chunk in 1..=5 {
                        manager.update(
                            &id,
                            RequestState::GeneratingAudio,
                            StatusUpdate::default().chunks(chunk, 5),
                        );
                        let _ = manager.snapshot();
                    }
                    manager.update(&id, RequestState::Completed, StatusUpdate::default());
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert!(!manager.snapshot().is_processing());
        assert_eq!(manager.total_requests(), 8);
        assert_eq!(manager.history(10).len(), 8);
        assert_eq!(manager.statistics().completed_requests, 8);
    }
}
