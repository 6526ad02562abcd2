//! Signal measurements
//!
//! Objective level measurements used by the `analyze` command and by the
//! test suite to verify stage behavior without listening.

use crate::dsp::loudness::measure_integrated_loudness;
use crate::engine::buffer::{linear_to_db, AudioBuffer};

/// Samples at or above this magnitude count as clipped
const CLIP_THRESHOLD: f32 = 0.9999;

/// Level summary for one buffer
#[derive(Debug, Clone)]
pub struct AudioAnalysis {
    /// RMS level in linear scale
    pub rms_linear: f32,
    /// RMS level in dBFS
    pub rms_db: f32,
    /// Peak level in linear scale
    pub peak_linear: f32,
    /// Peak level in dBFS
    pub peak_db: f32,
    /// Crest factor (peak/RMS) in dB
    pub crest_factor_db: f32,
    /// Number of samples at the clip threshold
    pub clipped_samples: usize,
    /// Integrated loudness in LUFS, if measurable
    pub integrated_lufs: Option<f64>,
    /// Duration in seconds
    pub duration: f64,
    /// Sample rate in Hz
    pub sample_rate: u32,
}

impl AudioAnalysis {
    /// Analyze a buffer
    pub fn analyze(buffer: &AudioBuffer) -> Self {
        let samples = buffer.samples();

        let rms_linear = calculate_rms(samples);
        let rms_db = linear_to_db(rms_linear);
        let peak_linear = calculate_peak(samples);
        let peak_db = linear_to_db(peak_linear);

        let crest_factor_db = if rms_linear > 0.0 {
            peak_db - rms_db
        } else {
            0.0
        };

        Self {
            rms_linear,
            rms_db,
            peak_linear,
            peak_db,
            crest_factor_db,
            clipped_samples: count_clipped_samples(samples),
            integrated_lufs: measure_integrated_loudness(buffer).ok(),
            duration: buffer.duration(),
            sample_rate: buffer.sample_rate(),
        }
    }

    /// Generate a summary string for display
    pub fn summary(&self) -> String {
        let loudness = match self.integrated_lufs {
            Some(lufs) => format!("{:.1} LUFS", lufs),
            None => "unmeasurable".to_string(),
        };
        let mut s = format!(
            "Duration: {:.2}s @ {} Hz\n\
             RMS: {:.1} dBFS | Peak: {:.1} dBFS | Crest: {:.1} dB\n\
             Integrated loudness: {}",
            self.duration,
            self.sample_rate,
            self.rms_db,
            self.peak_db,
            self.crest_factor_db,
            loudness
        );

        if self.clipped_samples > 0 {
            s.push_str(&format!("\nClipping: {} samples", self.clipped_samples));
        }

        s
    }
}

/// Calculate RMS (Root Mean Square) of samples
pub fn calculate_rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_squares: f64 = samples.iter().map(|&s| (s as f64) * (s as f64)).sum();
    (sum_squares / samples.len() as f64).sqrt() as f32
}

/// Calculate peak (maximum absolute value) of samples
pub fn calculate_peak(samples: &[f32]) -> f32 {
    samples.iter().map(|s| s.abs()).fold(0.0_f32, f32::max)
}

/// Count samples that are clipped (at or near digital maximum)
pub fn count_clipped_samples(samples: &[f32]) -> usize {
    samples.iter().filter(|s| s.abs() >= CLIP_THRESHOLD).count()
}
