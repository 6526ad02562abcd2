//! Peak Limiter
//!
//! Final safety stage. If the buffer's peak is above the ceiling, the whole
//! buffer is scaled down by one uniform gain so the peak lands on the
//! ceiling; afterwards every sample is clipped into
//! [-SAFETY_CLIP, SAFETY_CLIP] so no encoder can overflow.

use log::debug;

use crate::dsp::stage::{FailurePolicy, MasteringStage};
use crate::engine::{db_to_linear, AudioBuffer};
use crate::error::{MasteringError, Result, StageId};

// ============================================================================
// Constants
// ============================================================================

/// Hard clip bound applied after gain, strictly inside full scale
pub const SAFETY_CLIP: f32 = 0.9999;

/// Added to the peak before taking its log
const PEAK_EPSILON: f64 = 1e-9;

/// Peaks within this distance of the ceiling count as already limited
const CEILING_TOLERANCE_DB: f64 = 1e-4;

// ============================================================================
// Limiter
// ============================================================================

/// Uniform-gain peak limiter with a hard safety clip
///
/// # Parameters
/// - `ceiling_db`: Maximum output peak in dBFS. Ceilings above full scale
///   are still bounded by the safety clip.
#[derive(Debug, Clone)]
pub struct Limiter {
    ceiling_db: f32,
}

impl Limiter {
    /// Create a new limiter with the given ceiling
    pub fn new(ceiling_db: f32) -> Self {
        Self { ceiling_db }
    }

    /// Get ceiling in dB
    pub fn ceiling_db(&self) -> f32 {
        self.ceiling_db
    }

    /// Get ceiling in linear
    pub fn ceiling_linear(&self) -> f32 {
        db_to_linear(self.ceiling_db)
    }

    /// Limit `samples` in place, returning the linear gain that was applied
    pub fn limit_in_place(&self, samples: &mut [f32]) -> f32 {
        let peak = samples.iter().map(|s| s.abs()).fold(0.0_f32, f32::max) as f64 + PEAK_EPSILON;
        let peak_db = 20.0 * peak.log10();
        let ceiling_db = self.ceiling_db as f64;

        let gain = if peak_db > ceiling_db + CEILING_TOLERANCE_DB {
            10.0_f64.powf((ceiling_db - peak_db) / 20.0) as f32
        } else {
            1.0
        };

        for sample in samples.iter_mut() {
            *sample = (*sample * gain).clamp(-SAFETY_CLIP, SAFETY_CLIP);
        }

        gain
    }
}

impl Default for Limiter {
    fn default() -> Self {
        Self::new(crate::presets::DEFAULT_CEILING_DB)
    }
}

impl MasteringStage for Limiter {
    fn id(&self) -> StageId {
        StageId::Limit
    }

    fn policy(&self) -> FailurePolicy {
        FailurePolicy::Hard
    }

    fn display_name(&self) -> &'static str {
        "Peak Limiter"
    }

    fn process(&self, input: &AudioBuffer) -> Result<AudioBuffer> {
        if input.is_empty() {
            return Err(MasteringError::fatal(StageId::Limit, "empty buffer"));
        }

        let mut samples = input.samples().to_vec();
        let gain = self.limit_in_place(&mut samples);
        if gain < 1.0 {
            debug!(
                "Limiter: peak above {:.1} dBFS, applied {:.2} dB",
                self.ceiling_db,
                20.0 * gain.log10()
            );
        }

        input.with_samples(samples)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn buffer_of(samples: Vec<f32>) -> AudioBuffer {
        AudioBuffer::new(samples, 44100).unwrap()
    }

    #[test]
    fn test_limiter_default() {
        let limiter = Limiter::default();
        assert!((limiter.ceiling_db() - (-0.5)).abs() < f32::EPSILON);
    }

    #[test]
    fn test_limiter_deep_ceiling_is_honoured() {
        let limiter = Limiter::new(-20.0);
        assert_eq!(limiter.ceiling_db(), -20.0);

        let input = AudioBuffer::sine_wave(440.0, 0.9, 0.1, 44100);
        let output = limiter.process(&input).unwrap();
        assert_relative_eq!(output.peak(), 0.1, max_relative = 1e-4);
    }

    #[test]
    fn test_limiter_ceiling_above_full_scale_still_clips() {
        let limiter = Limiter::new(6.0);
        let input = buffer_of(vec![0.5, -1.5, 1.2]);
        let output = limiter.process(&input).unwrap();
        assert_eq!(output.samples()[0], 0.5);
        assert!(output.samples().iter().all(|s| s.abs() <= SAFETY_CLIP));
    }

    #[test]
    fn test_limiter_below_ceiling_untouched() {
        let limiter = Limiter::new(-1.0);
        let input = buffer_of(vec![0.1, -0.3, 0.5, -0.2]);
        let output = limiter.process(&input).unwrap();
        assert_eq!(output.samples(), input.samples());
    }

    #[test]
    fn test_limiter_peak_lands_on_ceiling() {
        let limiter = Limiter::new(-6.0);
        let input = buffer_of(vec![0.2, -1.5, 0.7, 1.0]);
        let output = limiter.process(&input).unwrap();

        assert_relative_eq!(output.peak(), limiter.ceiling_linear(), max_relative = 1e-4);
        // Uniform gain keeps ratios between samples
        let ratio = output.samples()[2] / output.samples()[0];
        assert_relative_eq!(ratio, 3.5, max_relative = 1e-4);
    }

    #[test]
    fn test_limiter_safety_clip_at_zero_ceiling() {
        let limiter = Limiter::new(0.0);
        let input = buffer_of(vec![1.0, -1.0, 0.99999, 2.0]);
        let output = limiter.process(&input).unwrap();
        assert!(output.samples().iter().all(|s| s.abs() <= SAFETY_CLIP));
    }

    #[test]
    fn test_limiter_is_idempotent() {
        let limiter = Limiter::default();
        let input = AudioBuffer::sine_wave(220.0, 1.4, 0.5, 44100);

        let once = limiter.process(&input).unwrap();
        let twice = limiter.process(&once).unwrap();
        assert_eq!(once.samples(), twice.samples());
    }

    #[test]
    fn test_limiter_silence() {
        let limiter = Limiter::default();
        let output = limiter.process(&AudioBuffer::silence(0.1, 44100)).unwrap();
        assert!(output.is_silent());
    }

    #[test]
    fn test_limiter_policy() {
        let limiter = Limiter::default();
        assert_eq!(limiter.id(), StageId::Limit);
        assert_eq!(limiter.policy(), FailurePolicy::Hard);
    }
}
