//! Spectral Shaper
//!
//! Whole-buffer tonal shaping in the frequency domain. The full signal is
//! transformed once, every bin's magnitude is scaled by a 40 Hz rumble
//! high-pass and a broad presence lift centred on 3 kHz, and the result is
//! transformed back. Phase is left untouched, so the high-pass acts as a
//! zero-phase filter.
//!
//! This is a coarse fixed curve, not a parametric EQ: there are no
//! user-facing bands, Q, or gain controls.

use std::f64::consts::PI;

use log::debug;
use rustfft::num_complex::Complex;
use rustfft::FftPlanner;

use crate::dsp::stage::{FailurePolicy, MasteringStage};
use crate::engine::AudioBuffer;
use crate::error::{MasteringError, Result, StageId};

/// High-pass corner in Hz
pub const HIGH_PASS_HZ: f64 = 40.0;

/// Section Q values of a 4th-order Butterworth cascade
const BUTTERWORTH_Q: [f64; 2] = [0.5412, 1.3066];

/// Presence curve centre in Hz
pub const PRESENCE_CENTER_HZ: f64 = 3000.0;
/// Presence curve width (Gaussian sigma) in Hz
pub const PRESENCE_WIDTH_HZ: f64 = 2500.0;
/// Peak linear lift of the presence curve above unity
pub const PRESENCE_AMOUNT: f64 = 0.18;

/// Normalized biquad coefficients (a0 = 1)
///
/// Transfer function: H(z) = (b0 + b1*z^-1 + b2*z^-2) / (1 + a1*z^-1 + a2*z^-2)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BiquadCoeffs {
    b0: f64,
    b1: f64,
    b2: f64,
    a1: f64,
    a2: f64,
}

impl BiquadCoeffs {
    /// High-pass section from the Audio EQ Cookbook
    /// Reference: https://www.w3.org/2011/audio/audio-eq-cookbook.html
    ///
    /// Returns `None` unless `frequency` lies strictly between 0 and Nyquist.
    pub fn high_pass(sample_rate: f64, frequency: f64, q: f64) -> Option<Self> {
        if !(frequency > 0.0 && frequency < sample_rate / 2.0) {
            return None;
        }

        let w0 = 2.0 * PI * frequency / sample_rate;
        let cos_w0 = w0.cos();
        let alpha = w0.sin() / (2.0 * q);

        let a0 = 1.0 + alpha;
        Some(BiquadCoeffs {
            b0: (1.0 + cos_w0) / 2.0 / a0,
            b1: -(1.0 + cos_w0) / a0,
            b2: (1.0 + cos_w0) / 2.0 / a0,
            a1: -2.0 * cos_w0 / a0,
            a2: (1.0 - alpha) / a0,
        })
    }

    /// |H(e^jw)| at `frequency` Hz
    pub fn magnitude_at(&self, frequency: f64, sample_rate: f64) -> f64 {
        let w = 2.0 * PI * frequency / sample_rate;
        let z1 = Complex::from_polar(1.0, -w);
        let z2 = Complex::from_polar(1.0, -2.0 * w);

        let num = z1 * self.b1 + z2 * self.b2 + self.b0;
        let den = z1 * self.a1 + z2 * self.a2 + 1.0;
        let den_norm = den.norm();
        if den_norm < f64::MIN_POSITIVE {
            return 0.0;
        }
        num.norm() / den_norm
    }
}

/// Fixed tonal curve: Butterworth rumble filter times presence lift
///
/// At sample rates whose Nyquist frequency does not exceed the high-pass
/// corner the rumble filter is left out and only the presence lift applies.
#[derive(Debug, Clone)]
pub struct ShapingCurve {
    sample_rate: f64,
    sections: Option<[BiquadCoeffs; 2]>,
}

impl ShapingCurve {
    pub fn new(sample_rate: u32) -> Self {
        let sample_rate = sample_rate as f64;
        let sections = match BUTTERWORTH_Q.map(|q| BiquadCoeffs::high_pass(sample_rate, HIGH_PASS_HZ, q)) {
            [Some(low), Some(high)] => Some([low, high]),
            _ => None,
        };
        if sections.is_none() {
            debug!(
                "Spectral shaper: {} Hz Nyquist is below the {} Hz high-pass, skipping it",
                sample_rate / 2.0,
                HIGH_PASS_HZ
            );
        }
        Self {
            sample_rate,
            sections,
        }
    }

    /// Whether the rumble high-pass is part of the curve
    pub fn has_high_pass(&self) -> bool {
        self.sections.is_some()
    }

    /// High-pass magnitude response at `frequency`
    pub fn high_pass_gain(&self, frequency: f64) -> f64 {
        match &self.sections {
            Some(sections) => sections
                .iter()
                .map(|s| s.magnitude_at(frequency, self.sample_rate))
                .product(),
            None => 1.0,
        }
    }

    /// Presence lift at `frequency`
    pub fn presence_gain(frequency: f64) -> f64 {
        let offset = frequency - PRESENCE_CENTER_HZ;
        1.0 + PRESENCE_AMOUNT * (-(offset * offset) / (2.0 * PRESENCE_WIDTH_HZ * PRESENCE_WIDTH_HZ)).exp()
    }

    /// Combined gain at `frequency`
    pub fn gain(&self, frequency: f64) -> f64 {
        self.high_pass_gain(frequency) * Self::presence_gain(frequency)
    }
}

/// Full-length FFT shaping stage
#[derive(Debug, Clone, Default)]
pub struct SpectralShaper;

impl SpectralShaper {
    pub fn new() -> Self {
        Self
    }

    /// Shape `samples` recorded at `sample_rate`, returning a new vector of
    /// identical length
    pub fn shape(&self, samples: &[f32], sample_rate: u32) -> Result<Vec<f32>> {
        let n = samples.len();
        if n == 0 {
            return Err(MasteringError::fatal(StageId::Shape, "empty buffer"));
        }

        let mut planner = FftPlanner::<f64>::new();
        let forward = planner.plan_fft_forward(n);
        let inverse = planner.plan_fft_inverse(n);

        let mut spectrum: Vec<Complex<f64>> =
            samples.iter().map(|&s| Complex::new(s as f64, 0.0)).collect();
        forward.process(&mut spectrum);

        if spectrum.len() != n {
            return Err(MasteringError::fatal(
                StageId::Shape,
                format!("transform length {} != input length {}", spectrum.len(), n),
            ));
        }

        // Bin k and bin n-k share a frequency, which keeps the spectrum
        // conjugate-symmetric and the inverse real.
        let curve = ShapingCurve::new(sample_rate);
        let bin_hz = sample_rate as f64 / n as f64;
        for (k, bin) in spectrum.iter_mut().enumerate() {
            let freq = k.min(n - k) as f64 * bin_hz;
            *bin *= curve.gain(freq);
        }

        inverse.process(&mut spectrum);

        let scale = 1.0 / n as f64;
        let output: Vec<f32> = spectrum.iter().map(|c| (c.re * scale) as f32).collect();

        if output.iter().any(|s| !s.is_finite()) {
            return Err(MasteringError::fatal(
                StageId::Shape,
                "non-finite samples after inverse transform",
            ));
        }
        Ok(output)
    }
}

impl MasteringStage for SpectralShaper {
    fn id(&self) -> StageId {
        StageId::Shape
    }

    fn policy(&self) -> FailurePolicy {
        FailurePolicy::Hard
    }

    fn display_name(&self) -> &'static str {
        "Spectral Shaper"
    }

    fn process(&self, input: &AudioBuffer) -> Result<AudioBuffer> {
        let output = self.shape(input.samples(), input.sample_rate())?;
        debug!("Spectral shaper: {}-point transform", output.len());
        input.with_samples(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const RATE: u32 = 48000;

    #[test]
    fn test_high_pass_response() {
        let curve = ShapingCurve::new(RATE);
        // Butterworth: -3 dB at the corner
        assert_relative_eq!(curve.high_pass_gain(40.0), 0.7071, epsilon = 0.01);
        assert!(curve.high_pass_gain(0.0) < 1e-9);
        assert!(curve.high_pass_gain(20.0) < 0.08);
        assert_relative_eq!(curve.high_pass_gain(1000.0), 1.0, epsilon = 1e-3);
    }

    #[test]
    fn test_presence_curve() {
        assert_relative_eq!(ShapingCurve::presence_gain(3000.0), 1.18, epsilon = 1e-9);
        assert!(ShapingCurve::presence_gain(20000.0) < 1.001);
        assert!(ShapingCurve::presence_gain(1000.0) > ShapingCurve::presence_gain(200.0));
    }

    #[test]
    fn test_length_preserved_for_awkward_sizes() {
        let shaper = SpectralShaper::new();
        for len in [1usize, 2, 97, 1000, 4801] {
            let samples = (0..len).map(|i| (i as f32 * 0.05).sin() * 0.5).collect();
            let input = AudioBuffer::new(samples, RATE).unwrap();
            let output = shaper.process(&input).unwrap();
            assert_eq!(output.len(), input.len());
            assert!(output.is_finite());
        }
    }

    #[test]
    fn test_presence_boost_on_bin_centred_tone() {
        // One second at 48 kHz puts every integer frequency on a bin
        let input = AudioBuffer::sine_wave(3000.0, 0.5, 1.0, RATE);
        let output = SpectralShaper::new().process(&input).unwrap();
        assert_relative_eq!(output.peak() / input.peak(), 1.18, epsilon = 0.01);
    }

    #[test]
    fn test_rumble_removed() {
        let input = AudioBuffer::sine_wave(20.0, 0.5, 1.0, RATE);
        let output = SpectralShaper::new().process(&input).unwrap();
        assert!(output.peak() < 0.1 * input.peak());
    }

    #[test]
    fn test_dc_removed() {
        let input = AudioBuffer::new(vec![0.25; 4800], RATE).unwrap();
        let output = SpectralShaper::new().process(&input).unwrap();
        assert!(output.peak() < 1e-4);
    }

    #[test]
    fn test_sub_corner_nyquist_skips_high_pass() {
        assert!(BiquadCoeffs::high_pass(2.0, HIGH_PASS_HZ, BUTTERWORTH_Q[0]).is_none());
        assert!(BiquadCoeffs::high_pass(80.0, HIGH_PASS_HZ, BUTTERWORTH_Q[0]).is_none());
        assert!(BiquadCoeffs::high_pass(81.0, HIGH_PASS_HZ, BUTTERWORTH_Q[0]).is_some());

        let curve = ShapingCurve::new(2);
        assert!(!curve.has_high_pass());
        assert_eq!(curve.high_pass_gain(0.5), 1.0);

        let input = AudioBuffer::new(vec![0.1, -0.2, 0.3, 0.1], 2).unwrap();
        let output = SpectralShaper::new().process(&input).unwrap();
        assert_eq!(output.len(), 4);
        assert!(output.is_finite());
    }

    #[test]
    fn test_non_finite_input_is_fatal() {
        let mut samples = vec![0.1; 512];
        samples[10] = f32::NAN;
        let input = AudioBuffer::new(samples, RATE).unwrap();
        let err = SpectralShaper::new().process(&input).unwrap_err();
        assert_eq!(err.error_code(), "STAGE_FATAL");
        assert_eq!(err.stage(), Some(StageId::Shape));
    }
}
