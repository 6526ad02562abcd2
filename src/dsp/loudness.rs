//! Loudness Normalizer
//!
//! Measures ITU-R BS.1770 integrated loudness with `ebur128` and applies
//! one broadband gain so the buffer hits the preset's LUFS target.
//! Anything that makes the measurement meaningless (too short, silent,
//! meter error) degrades the stage instead of failing the run.

use ebur128::{EbuR128, Mode};
use log::debug;

use crate::dsp::stage::{FailurePolicy, MasteringStage};
use crate::engine::AudioBuffer;
use crate::error::{MasteringError, Result, StageId};
use crate::presets::DEFAULT_TARGET_LUFS;

/// Length of one gating block; shorter buffers cannot be measured
pub const MIN_MEASURABLE_SECS: f64 = 0.4;

/// Measure integrated loudness of a mono buffer in LUFS
///
/// # Errors
/// * `StageDegraded` - if the buffer is shorter than one gating block, the
///   meter rejects it, or the result is not finite (silence)
pub fn measure_integrated_loudness(buffer: &AudioBuffer) -> Result<f64> {
    if buffer.duration() < MIN_MEASURABLE_SECS {
        return Err(MasteringError::degraded(
            StageId::Loudness,
            format!(
                "{:.3}s is shorter than one {}ms gating block",
                buffer.duration(),
                (MIN_MEASURABLE_SECS * 1000.0) as u32
            ),
        ));
    }

    let meter_error = |e: ebur128::Error| MasteringError::degraded(StageId::Loudness, e.to_string());

    let mut meter = EbuR128::new(1, buffer.sample_rate(), Mode::I).map_err(meter_error)?;
    meter.add_frames_f32(buffer.samples()).map_err(meter_error)?;
    let lufs = meter.loudness_global().map_err(meter_error)?;

    if !lufs.is_finite() {
        return Err(MasteringError::degraded(
            StageId::Loudness,
            "signal is below the absolute gate",
        ));
    }
    Ok(lufs)
}

/// Broadband gain stage targeting an integrated loudness
#[derive(Debug, Clone)]
pub struct LoudnessNormalizer {
    target_lufs: f32,
}

impl LoudnessNormalizer {
    pub fn new(target_lufs: f32) -> Self {
        Self { target_lufs }
    }

    pub fn target_lufs(&self) -> f32 {
        self.target_lufs
    }

    /// Linear gain that moves `measured_lufs` onto the target
    pub fn gain_for(&self, measured_lufs: f64) -> f32 {
        10.0_f64.powf((self.target_lufs as f64 - measured_lufs) / 20.0) as f32
    }
}

impl Default for LoudnessNormalizer {
    fn default() -> Self {
        Self::new(DEFAULT_TARGET_LUFS)
    }
}

impl MasteringStage for LoudnessNormalizer {
    fn id(&self) -> StageId {
        StageId::Loudness
    }

    fn policy(&self) -> FailurePolicy {
        FailurePolicy::Soft
    }

    fn display_name(&self) -> &'static str {
        "Loudness Normalizer"
    }

    fn process(&self, input: &AudioBuffer) -> Result<AudioBuffer> {
        let measured = measure_integrated_loudness(input)?;
        let gain = self.gain_for(measured);
        debug!(
            "Loudness: measured {:.2} LUFS, target {:.1} LUFS, gain {:+.2} dB",
            measured,
            self.target_lufs,
            20.0 * gain.log10()
        );

        let mut output = input.clone();
        output.apply_gain(gain);
        Ok(output)
    }
}
