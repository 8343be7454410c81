//! Text segmentation for chunked synthesis

mod segmenter;
mod settings;

pub use segmenter::{split, ChunkStrategy};
pub use settings::{StreamingQuality, StreamingSettings, STREAMING_CHUNK_SIZE_RANGE};

/// Characters kept in a record's text preview
const PREVIEW_CHARS: usize = 100;

/// First 100 characters of `text`, with "..." appended when truncated
pub fn preview(text: &str) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{}...", head)
    } else {
        head
    }
}
