//! Dynamics Compressor
//!
//! Frame-wise RMS compressor. Each 20 ms frame gets one target gain from
//! the hard-knee gain computer; a single-pole smoother moves the running
//! gain toward it, using the attack constant when the gain is falling
//! (more reduction) and the release constant when it is rising.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::dsp::stage::{FailurePolicy, MasteringStage};
use crate::engine::{db_to_linear, AudioBuffer};
use crate::error::{MasteringError, Result, StageId};
use crate::presets::{
    PresetConfig, DEFAULT_ATTACK_MS, DEFAULT_RATIO, DEFAULT_RELEASE_MS, DEFAULT_THRESHOLD_DB,
};

/// Analysis frame length in seconds
pub const FRAME_SECS: f32 = 0.02;

/// Floor added inside and outside the RMS square root
const RMS_EPSILON: f32 = 1e-9;

/// Compressor parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompressorParams {
    /// Threshold level in dB
    pub threshold_db: f32,
    /// Compression ratio, at least 1 (1:1)
    pub ratio: f32,
    /// Attack time in milliseconds, above zero
    pub attack_ms: f32,
    /// Release time in milliseconds, above zero
    pub release_ms: f32,
}

impl Default for CompressorParams {
    fn default() -> Self {
        Self {
            threshold_db: DEFAULT_THRESHOLD_DB,
            ratio: DEFAULT_RATIO,
            attack_ms: DEFAULT_ATTACK_MS,
            release_ms: DEFAULT_RELEASE_MS,
        }
    }
}

impl CompressorParams {
    /// Take the compressor settings from a resolved preset
    pub fn from_preset(config: &PresetConfig) -> Self {
        Self {
            threshold_db: config.threshold_db,
            ratio: config.ratio,
            attack_ms: config.attack_ms,
            release_ms: config.release_ms,
        }
    }

    /// Check that the gain computer and smoother stay well defined
    ///
    /// Presets are checked with this when they load; the stage itself
    /// never rejects its parameters.
    pub fn validate(&self) -> Result<()> {
        let checks: [(&str, f32, bool, &str); 4] = [
            ("threshold_db", self.threshold_db, true, "a finite level in dB"),
            ("ratio", self.ratio, self.ratio >= 1.0, "at least 1"),
            ("attack_ms", self.attack_ms, self.attack_ms > 0.0, "above 0 ms"),
            ("release_ms", self.release_ms, self.release_ms > 0.0, "above 0 ms"),
        ];
        for (param, value, in_range, expected) in checks {
            if !value.is_finite() || !in_range {
                return Err(MasteringError::InvalidParameter {
                    param: param.to_string(),
                    value: value.to_string(),
                    expected: expected.to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Smoothed gain threaded from frame to frame within one pass
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnvelopeState {
    /// Current linear gain
    pub gain: f32,
}

impl EnvelopeState {
    /// Fresh state: no gain reduction
    pub fn new() -> Self {
        Self { gain: 1.0 }
    }

    /// Move toward `target` with the attack or release coefficient
    fn follow(&mut self, target: f32, attack_coeff: f32, release_coeff: f32) -> f32 {
        let coeff = if target < self.gain {
            attack_coeff
        } else {
            release_coeff
        };
        self.gain = coeff * self.gain + (1.0 - coeff) * target;
        self.gain
    }
}

impl Default for EnvelopeState {
    fn default() -> Self {
        Self::new()
    }
}

/// Frame-wise RMS compressor
#[derive(Debug, Clone, Default)]
pub struct Compressor {
    params: CompressorParams,
}

impl Compressor {
    /// Create a new compressor with default parameters
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new compressor with custom parameters
    pub fn with_params(params: CompressorParams) -> Self {
        Self { params }
    }

    /// Get the current parameters
    pub fn params(&self) -> &CompressorParams {
        &self.params
    }

    /// Target gain reduction in dB for a frame level (0 or negative)
    pub fn gain_reduction_db(&self, level_db: f32) -> f32 {
        if level_db > self.params.threshold_db {
            (self.params.threshold_db - level_db) * (1.0 - 1.0 / self.params.ratio)
        } else {
            0.0
        }
    }

    /// One-pole coefficient for a step of `step_secs` toward a time constant
    fn coefficient(time_ms: f32, step_secs: f32) -> f32 {
        (-step_secs / (time_ms / 1000.0)).exp()
    }

    /// Compress `samples` in place
    ///
    /// Returns the smoothed gain used for each frame, in order. The last
    /// frame may be shorter than 20 ms; it is measured and smoothed over its
    /// own length.
    pub fn compress_in_place(&self, samples: &mut [f32], sample_rate: u32) -> Vec<f32> {
        let frame_len = ((sample_rate as f32 * FRAME_SECS) as usize).max(1);
        let mut envelope = EnvelopeState::new();
        let mut trace = Vec::with_capacity(samples.len() / frame_len + 1);

        for frame in samples.chunks_mut(frame_len) {
            let mean_square =
                frame.iter().map(|&s| s * s).sum::<f32>() / frame.len() as f32;
            let rms = (mean_square + RMS_EPSILON).sqrt();
            let level_db = 20.0 * (rms + RMS_EPSILON).log10();

            let target = db_to_linear(self.gain_reduction_db(level_db));

            let step_secs = frame.len() as f32 / sample_rate as f32;
            let gain = envelope.follow(
                target,
                Self::coefficient(self.params.attack_ms, step_secs),
                Self::coefficient(self.params.release_ms, step_secs),
            );

            for sample in frame.iter_mut() {
                *sample *= gain;
            }
            trace.push(gain);
        }

        trace
    }
}

impl MasteringStage for Compressor {
    fn id(&self) -> StageId {
        StageId::Compress
    }

    fn policy(&self) -> FailurePolicy {
        FailurePolicy::Hard
    }

    fn display_name(&self) -> &'static str {
        "Compressor"
    }

    fn process(&self, input: &AudioBuffer) -> Result<AudioBuffer> {
        if input.is_empty() {
            return Err(MasteringError::fatal(StageId::Compress, "empty buffer"));
        }

        let mut samples = input.samples().to_vec();
        let trace = self.compress_in_place(&mut samples, input.sample_rate());

        let min_gain = trace.iter().copied().fold(1.0_f32, f32::min);
        debug!(
            "Compressor: {} frames, max reduction {:.2} dB",
            trace.len(),
            20.0 * min_gain.log10()
        );

        input.with_samples(samples)
    }
}
