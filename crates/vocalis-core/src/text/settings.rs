//! Streaming chunk settings and quality presets

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::segmenter::ChunkStrategy;
use crate::error::Error;

/// Lower and upper bound accepted for an explicit streaming chunk size
pub const STREAMING_CHUNK_SIZE_RANGE: std::ops::RangeInclusive<usize> = 50..=500;

/// Speed versus quality trade-off for streaming
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamingQuality {
    Fast,
    #[default]
    Balanced,
    High,
}

impl StreamingQuality {
    /// Chunk size and strategy implied by the preset
    pub fn preset(&self) -> (usize, ChunkStrategy) {
        match self {
            StreamingQuality::Fast => (100, ChunkStrategy::Word),
            StreamingQuality::Balanced => (200, ChunkStrategy::Sentence),
            StreamingQuality::High => (300, ChunkStrategy::Paragraph),
        }
    }
}

impl FromStr for StreamingQuality {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fast" => Ok(StreamingQuality::Fast),
            "balanced" => Ok(StreamingQuality::Balanced),
            "high" => Ok(StreamingQuality::High),
            other => Err(Error::Validation(format!(
                "streaming_quality must be one of: fast, balanced, high (got '{}')",
                other
            ))),
        }
    }
}

/// Resolved chunking settings for one streaming request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StreamingSettings {
    pub chunk_size: usize,
    pub strategy: ChunkStrategy,
    pub quality: StreamingQuality,
}

impl Default for StreamingSettings {
    fn default() -> Self {
        Self::resolve(None, None, None)
    }
}

impl StreamingSettings {
    /// Explicit values always win; the quality preset fills whatever is missing.
    pub fn resolve(
        chunk_size: Option<usize>,
        strategy: Option<ChunkStrategy>,
        quality: Option<StreamingQuality>,
    ) -> Self {
        let quality = quality.unwrap_or_default();
        let (preset_size, preset_strategy) = quality.preset();
        Self {
            chunk_size: chunk_size.unwrap_or(preset_size),
            strategy: strategy.unwrap_or(preset_strategy),
            quality,
        }
    }

    /// Split `text` according to these settings
    pub fn split(&self, text: &str) -> Vec<String> {
        super::split(text, self.chunk_size, self.strategy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fast_preset() {
        let settings = StreamingSettings::resolve(None, None, Some(StreamingQuality::Fast));
        assert_eq!(settings.chunk_size, 100);
        assert_eq!(settings.strategy, ChunkStrategy::Word);
    }

    #[test]
    fn test_high_preset() {
        let settings = StreamingSettings::resolve(None, None, Some(StreamingQuality::High));
        assert_eq!(settings.chunk_size, 300);
        assert_eq!(settings.strategy, ChunkStrategy::Paragraph);
    }

    #[test]
    fn test_defaults_without_quality() {
        let settings = StreamingSettings::default();
        assert_eq!(settings.chunk_size, 200);
        assert_eq!(settings.strategy, ChunkStrategy::Sentence);
        assert_eq!(settings.quality, StreamingQuality::Balanced);
    }

    #[test]
    fn test_explicit_values_override_preset() {
        let settings = StreamingSettings::resolve(
            Some(75),
            Some(ChunkStrategy::Fixed),
            Some(StreamingQuality::High),
        );
        assert_eq!(settings.chunk_size, 75);
        assert_eq!(settings.strategy, ChunkStrategy::Fixed);
        assert_eq!(settings.quality, StreamingQuality::High);

        let partial =
            StreamingSettings::resolve(Some(450), None, Some(StreamingQuality::Fast));
        assert_eq!(partial.chunk_size, 450);
        assert_eq!(partial.strategy, ChunkStrategy::Word);
    }

    #[test]
    fn test_quality_deserialization() {
        let quality: StreamingQuality = serde_json::from_str("\"fast\"").unwrap();
        assert_eq!(quality, StreamingQuality::Fast);
        assert!(serde_json::from_str::<StreamingQuality>("\"ultra\"").is_err());
        assert!("ultra".parse::<StreamingQuality>().is_err());
    }
}
