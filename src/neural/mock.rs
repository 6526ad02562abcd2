//! Mock separation backends for testing
//!
//! These don't run a model. They split the mix by a fixed gain ratio so
//! pipeline tests can check that stems are recombined, and they can be
//! told to fail or to return misaligned stems.

use super::separation::{SeparatedStems, SeparationService};
use crate::engine::AudioBuffer;
use crate::error::{MasteringError, Result, StageId};

/// How the mock misbehaves, if at all
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MockBehavior {
    #[default]
    Split,
    /// `separate` returns an error
    Fail,
    /// Stems come back one sample short
    Truncate,
}

/// Mock separator: vocal = `vocal_ratio` * mix, accompaniment = the rest
#[derive(Debug, Clone)]
pub struct MockSeparation {
    vocal_ratio: f32,
    available: bool,
    behavior: MockBehavior,
}

impl MockSeparation {
    pub fn new(vocal_ratio: f32) -> Self {
        Self {
            vocal_ratio: vocal_ratio.clamp(0.0, 1.0),
            available: true,
            behavior: MockBehavior::Split,
        }
    }

    pub fn with_behavior(mut self, behavior: MockBehavior) -> Self {
        self.behavior = behavior;
        self
    }

    pub fn unavailable(mut self) -> Self {
        self.available = false;
        self
    }

    fn scaled(input: &AudioBuffer, gain: f32, len: usize) -> Result<AudioBuffer> {
        input.with_samples(input.samples()[..len].iter().map(|s| s * gain).collect())
    }
}

impl Default for MockSeparation {
    fn default() -> Self {
        Self::new(0.5)
    }
}

impl SeparationService for MockSeparation {
    fn name(&self) -> &str {
        "mock"
    }

    fn is_available(&self) -> bool {
        self.available
    }

    fn separate(&self, input: &AudioBuffer) -> Result<SeparatedStems> {
        let len = match self.behavior {
            MockBehavior::Split => input.len(),
            MockBehavior::Fail => {
                return Err(MasteringError::degraded(
                    StageId::Separation,
                    "mock separator failure",
                ))
            }
            MockBehavior::Truncate => input.len().saturating_sub(1).max(1),
        };

        Ok(SeparatedStems {
            vocal: Self::scaled(input, self.vocal_ratio, len)?,
            accompaniment: Self::scaled(input, 1.0 - self.vocal_ratio, len)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_sums_to_input() {
        let input = AudioBuffer::sine_wave(440.0, 0.5, 0.1, 8000);
        let stems = MockSeparation::new(0.3).separate(&input).unwrap();
        assert!(stems.matches(&input));

        let mixed = stems.vocal.mix(&stems.accompaniment).unwrap();
        for (a, b) in mixed.samples().iter().zip(input.samples()) {
            assert!((a - b).abs() < 1e-6);
        }
    }

    #[test]
    fn test_truncate_misaligns() {
        let input = AudioBuffer::silence(0.1, 8000);
        let stems = MockSeparation::default()
            .with_behavior(MockBehavior::Truncate)
            .separate(&input)
            .unwrap();
        assert!(!stems.matches(&input));
    }
}
