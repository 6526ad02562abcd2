//! Source separation service interface
//!
//! A separation backend splits a mix into a vocal stem and an
//! accompaniment stem. Backends are optional: the pipeline asks
//! `is_available()` first and falls back to the raw mix on any failure.

use crate::engine::AudioBuffer;
use crate::error::{MasteringError, Result};

/// Output of a two-stem separation
#[derive(Debug, Clone, PartialEq)]
pub struct SeparatedStems {
    pub vocal: AudioBuffer,
    pub accompaniment: AudioBuffer,
}

impl SeparatedStems {
    /// Check both stems line up with `source` (same length and rate)
    pub fn matches(&self, source: &AudioBuffer) -> bool {
        [&self.vocal, &self.accompaniment]
            .iter()
            .all(|stem| stem.len() == source.len() && stem.sample_rate() == source.sample_rate())
    }
}

/// Vocal/accompaniment separation backend
pub trait SeparationService: Send + Sync {
    /// Short backend name for logs
    fn name(&self) -> &str;

    /// Whether the backend can run right now (model present, device ready)
    fn is_available(&self) -> bool;

    /// Split `input` into vocal and accompaniment stems
    fn separate(&self, input: &AudioBuffer) -> Result<SeparatedStems>;
}

/// Placeholder backend used when no separator is installed
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSeparation;

impl SeparationService for NoSeparation {
    fn name(&self) -> &str {
        "none"
    }

    fn is_available(&self) -> bool {
        false
    }

    fn separate(&self, _input: &AudioBuffer) -> Result<SeparatedStems> {
        Err(MasteringError::SeparationUnavailable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_separation_is_unavailable() {
        let service = NoSeparation;
        assert!(!service.is_available());
        let err = service
            .separate(&AudioBuffer::silence(0.1, 8000))
            .unwrap_err();
        assert_eq!(err.error_code(), "SEPARATION_UNAVAILABLE");
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_stems_match_source() {
        let source = AudioBuffer::silence(0.1, 8000);
        let stems = SeparatedStems {
            vocal: source.clone(),
            accompaniment: AudioBuffer::silence(0.2, 8000),
        };
        assert!(!stems.matches(&source));
    }
}
