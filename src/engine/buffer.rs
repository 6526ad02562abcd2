//! Signal Buffer
//!
//! The mono sample container handed from stage to stage. Construction
//! enforces the invariants every stage relies on: at least one sample and
//! a positive sample rate. Stages never resample.

use crate::error::{MasteringError, Result};

// ============================================================================
// Helper Functions
// ============================================================================

/// Convert decibels to linear amplitude
#[inline]
pub fn db_to_linear(db: f32) -> f32 {
    10.0_f32.powf(db / 20.0)
}

/// Convert linear amplitude to decibels
///
/// Returns `f32::NEG_INFINITY` for zero input.
#[inline]
pub fn linear_to_db(linear: f32) -> f32 {
    if linear <= 0.0 {
        f32::NEG_INFINITY
    } else {
        20.0 * linear.log10()
    }
}

// ============================================================================
// Audio Buffer
// ============================================================================

/// Mono floating-point signal with a fixed sample rate
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    /// Samples, nominally within -1.0..=1.0
    samples: Vec<f32>,
    /// Sample rate in Hz
    sample_rate: u32,
}

impl AudioBuffer {
    /// Create a buffer from decoded samples
    ///
    /// # Errors
    /// * `InvalidInput` - if `samples` is empty or `sample_rate` is zero
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Result<Self> {
        if samples.is_empty() {
            return Err(MasteringError::InvalidInput {
                reason: "buffer contains no samples".to_string(),
            });
        }
        if sample_rate == 0 {
            return Err(MasteringError::InvalidInput {
                reason: "sample rate must be positive".to_string(),
            });
        }
        Ok(Self {
            samples,
            sample_rate,
        })
    }

    /// Create a silent buffer of the given duration (at least one sample)
    pub fn silence(duration_secs: f32, sample_rate: u32) -> Self {
        let num_samples = ((duration_secs * sample_rate as f32) as usize).max(1);
        Self {
            samples: vec![0.0; num_samples],
            sample_rate: sample_rate.max(1),
        }
    }

    /// Create a sine wave test tone
    pub fn sine_wave(frequency: f32, amplitude: f32, duration_secs: f32, sample_rate: u32) -> Self {
        let sample_rate = sample_rate.max(1);
        let num_samples = ((duration_secs * sample_rate as f32) as usize).max(1);
        let samples = (0..num_samples)
            .map(|i| {
                let t = i as f64 / sample_rate as f64;
                (amplitude as f64 * (2.0 * std::f64::consts::PI * frequency as f64 * t).sin())
                    as f32
            })
            .collect();

        Self {
            samples,
            sample_rate,
        }
    }

    /// Build a new buffer at this buffer's sample rate
    pub fn with_samples(&self, samples: Vec<f32>) -> Result<Self> {
        Self::new(samples, self.sample_rate)
    }

    /// Re-check the construction invariants
    pub fn validate(&self) -> Result<()> {
        if self.samples.is_empty() || self.sample_rate == 0 {
            return Err(MasteringError::InvalidInput {
                reason: format!(
                    "{} samples at {} Hz",
                    self.samples.len(),
                    self.sample_rate
                ),
            });
        }
        Ok(())
    }

    /// Get a reference to the samples
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Consume the buffer, returning its samples
    pub fn into_samples(self) -> Vec<f32> {
        self.samples
    }

    /// Sample rate in Hz
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Number of samples
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Always false for a constructed buffer; kept for API symmetry
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Duration in seconds
    pub fn duration(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }

    /// Apply gain in linear scale
    pub fn apply_gain(&mut self, gain: f32) {
        for sample in &mut self.samples {
            *sample *= gain;
        }
    }

    /// Largest absolute sample value
    pub fn peak(&self) -> f32 {
        self.samples.iter().map(|s| s.abs()).fold(0.0_f32, f32::max)
    }

    /// True if no sample is NaN or infinite
    pub fn is_finite(&self) -> bool {
        self.samples.iter().all(|s| s.is_finite())
    }

    /// True if every sample is exactly zero
    pub fn is_silent(&self) -> bool {
        self.samples.iter().all(|&s| s == 0.0)
    }

    /// Sample-wise sum with another buffer of the same rate
    ///
    /// The shorter buffer is treated as zero-padded; the result has the
    /// length of the longer one.
    pub fn mix(&self, other: &AudioBuffer) -> Result<AudioBuffer> {
        if self.sample_rate != other.sample_rate {
            return Err(MasteringError::InvalidInput {
                reason: format!(
                    "sample rate mismatch: {} Hz vs {} Hz",
                    self.sample_rate, other.sample_rate
                ),
            });
        }
        let len = self.len().max(other.len());
        let mixed = (0..len)
            .map(|i| {
                self.samples.get(i).copied().unwrap_or(0.0)
                    + other.samples.get(i).copied().unwrap_or(0.0)
            })
            .collect();
        AudioBuffer::new(mixed, self.sample_rate)
    }
}
