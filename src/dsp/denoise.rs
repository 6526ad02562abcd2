//! Noise Reduction (spectral gating)
//!
//! Non-stationary spectral gate over a Hann-windowed STFT. Each bin gets a
//! noise floor that is the larger of
//! - a reference threshold learned from the noise profile (mean + n_std * std
//!   of the profile's magnitudes), and
//! - a scaled moving average of the bin's own magnitude over nearby frames.
//!
//! Bins under the floor are attenuated by `prop_decrease`, the mask is
//! smoothed over time, and the signal is resynthesised by weighted
//! overlap-add with the original phase.
//!
//! With no profile (buffer shorter than one profile frame, or a separated
//! vocal stem) the reference comes from the quietest fifth of the signal's
//! own frames.

use std::collections::VecDeque;
use std::sync::Arc;

use log::debug;
use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};

use crate::dsp::noise_profile::{select_noise_profile, NoiseProfile};
use crate::dsp::stage::{FailurePolicy, MasteringStage};
use crate::engine::AudioBuffer;
use crate::error::{MasteringError, Result, StageId};
use crate::presets::DenoiseStrength;

// -----------------------------------------------------------------------------
// Constants
// -----------------------------------------------------------------------------

pub const FFT_SIZE: usize = 2048;
pub const HOP_SIZE: usize = 512;
const NUM_BINS: usize = FFT_SIZE / 2 + 1;

/// Standard deviations above the mean noise magnitude that count as signal
const N_STD_THRESHOLD: f32 = 1.5;

/// Frames either side of the current one in the moving-average floor
const SMOOTHING_RADIUS: usize = 4;

/// Scale applied to the moving average before it competes with the reference
const NONSTATIONARY_SENSITIVITY: f32 = 0.5;

/// Fraction of frames treated as noise in blind mode
const BLIND_QUANTILE: f32 = 0.2;

/// One-pole coefficient for the per-bin gain mask
const MASK_SMOOTHING: f32 = 0.5;

const EPS: f32 = 1e-12;

// -----------------------------------------------------------------------------
// STFT helpers
// -----------------------------------------------------------------------------

fn make_hann_window(size: usize) -> Vec<f32> {
    (0..size)
        .map(|i| {
            let phase = 2.0 * std::f32::consts::PI * i as f32 / size as f32;
            0.5 - 0.5 * phase.cos()
        })
        .collect()
}

/// Shared transform state for one noise reduction call
struct Stft {
    forward: Arc<dyn Fft<f32>>,
    inverse: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
}

impl Stft {
    fn new() -> Self {
        let mut planner = FftPlanner::new();
        Self {
            forward: planner.plan_fft_forward(FFT_SIZE),
            inverse: planner.plan_fft_inverse(FFT_SIZE),
            window: make_hann_window(FFT_SIZE),
        }
    }

    /// Centre-pad `samples` by half a window each side and round up to a
    /// whole number of hops
    fn pad(samples: &[f32]) -> Vec<f32> {
        let half = FFT_SIZE / 2;
        let body = samples.len() + 2 * half;
        let hops = (body - FFT_SIZE).div_ceil(HOP_SIZE);
        let mut padded = vec![0.0; hops * HOP_SIZE + FFT_SIZE];
        padded[half..half + samples.len()].copy_from_slice(samples);
        padded
    }

    /// Windowed spectrum of the frame starting at `start`
    fn spectrum(&self, signal: &[f32], start: usize, buf: &mut [Complex<f32>]) {
        for (i, slot) in buf.iter_mut().enumerate() {
            *slot = Complex::new(signal[start + i] * self.window[i], 0.0);
        }
        self.forward.process(buf);
    }

    /// Magnitudes (first `NUM_BINS` bins) of the frame starting at `start`
    fn magnitudes_into(
        &self,
        signal: &[f32],
        start: usize,
        buf: &mut [Complex<f32>],
        out: &mut Vec<f32>,
    ) {
        self.spectrum(signal, start, buf);
        out.clear();
        out.extend(buf[..NUM_BINS].iter().map(|c| c.norm()));
    }
}

/// Number of complete frames that fit in `len` samples
fn frame_count(len: usize) -> usize {
    if len < FFT_SIZE {
        0
    } else {
        1 + (len - FFT_SIZE) / HOP_SIZE
    }
}

/// Running per-bin magnitude sums for mean and deviation
struct BinStats {
    count: usize,
    sum: Vec<f64>,
    sum_sq: Vec<f64>,
}

impl BinStats {
    fn new() -> Self {
        Self {
            count: 0,
            sum: vec![0.0; NUM_BINS],
            sum_sq: vec![0.0; NUM_BINS],
        }
    }

    fn add(&mut self, magnitudes: &[f32]) {
        for ((s, sq), &m) in self.sum.iter_mut().zip(self.sum_sq.iter_mut()).zip(magnitudes) {
            let m = m as f64;
            *s += m;
            *sq += m * m;
        }
        self.count += 1;
    }

    /// Per-bin mean + n_std * std
    fn threshold(&self) -> Vec<f32> {
        let count = self.count.max(1) as f64;
        self.sum
            .iter()
            .zip(&self.sum_sq)
            .map(|(&s, &sq)| {
                let mean = s / count;
                let var = (sq / count - mean * mean).max(0.0);
                (mean + N_STD_THRESHOLD as f64 * var.sqrt()) as f32
            })
            .collect()
    }
}

/// Reference threshold over every frame of `signal`
fn reference_threshold(stft: &Stft, signal: &[f32]) -> Vec<f32> {
    let mut stats = BinStats::new();
    let mut buf = vec![Complex::new(0.0, 0.0); FFT_SIZE];
    let mut mags = Vec::with_capacity(NUM_BINS);
    for frame in 0..frame_count(signal.len()) {
        stft.magnitudes_into(signal, frame * HOP_SIZE, &mut buf, &mut mags);
        stats.add(&mags);
    }
    stats.threshold()
}

/// Reference from the quietest fifth of the signal's own frames
fn blind_threshold(stft: &Stft, signal: &[f32]) -> Vec<f32> {
    let mut buf = vec![Complex::new(0.0, 0.0); FFT_SIZE];
    let mut mags = Vec::with_capacity(NUM_BINS);

    let num_frames = frame_count(signal.len());
    let mut order: Vec<(usize, f32)> = (0..num_frames)
        .map(|frame| {
            stft.magnitudes_into(signal, frame * HOP_SIZE, &mut buf, &mut mags);
            (frame, mags.iter().map(|m| m * m).sum())
        })
        .collect();
    order.sort_by(|a, b| a.1.total_cmp(&b.1));

    let keep = ((num_frames as f32 * BLIND_QUANTILE).ceil() as usize).max(1);
    let mut stats = BinStats::new();
    for &(frame, _) in order.iter().take(keep) {
        stft.magnitudes_into(signal, frame * HOP_SIZE, &mut buf, &mut mags);
        stats.add(&mags);
    }
    stats.threshold()
}

/// Magnitudes of the frames within `SMOOTHING_RADIUS` of the current one
///
/// Holds at most `2 * SMOOTHING_RADIUS + 1` frames; frames are computed as
/// they enter the window and dropped once they fall behind it.
struct MagnitudeWindow<'a> {
    stft: &'a Stft,
    signal: &'a [f32],
    num_frames: usize,
    frames: VecDeque<Vec<f32>>,
    /// Frame index of `frames[0]`
    first: usize,
    buf: Vec<Complex<f32>>,
    /// Dropped frame vectors kept for reuse
    spare: Vec<Vec<f32>>,
}

impl<'a> MagnitudeWindow<'a> {
    fn new(stft: &'a Stft, signal: &'a [f32]) -> Self {
        Self {
            stft,
            signal,
            num_frames: frame_count(signal.len()),
            frames: VecDeque::with_capacity(2 * SMOOTHING_RADIUS + 1),
            first: 0,
            buf: vec![Complex::new(0.0, 0.0); FFT_SIZE],
            spare: Vec::new(),
        }
    }

    fn num_frames(&self) -> usize {
        self.num_frames
    }

    /// Slide the window so it covers the neighbourhood of `frame`
    fn advance_to(&mut self, frame: usize) {
        let lo = frame.saturating_sub(SMOOTHING_RADIUS);
        let hi = (frame + SMOOTHING_RADIUS).min(self.num_frames - 1);

        while self.first < lo {
            if let Some(old) = self.frames.pop_front() {
                self.spare.push(old);
            }
            self.first += 1;
        }
        while self.first + self.frames.len() <= hi {
            let next = self.first + self.frames.len();
            let mut mags = self
                .spare
                .pop()
                .unwrap_or_else(|| Vec::with_capacity(NUM_BINS));
            self.stft
                .magnitudes_into(self.signal, next * HOP_SIZE, &mut self.buf, &mut mags);
            self.frames.push_back(mags);
        }
    }

    /// Magnitude of `bin` in `frame`, which must lie inside the window
    fn magnitude(&self, frame: usize, bin: usize) -> f32 {
        self.frames[frame - self.first][bin]
    }

    /// Mean magnitude of `bin` across the window
    fn mean(&self, bin: usize) -> f32 {
        let sum: f32 = self.frames.iter().map(|m| m[bin]).sum();
        sum / self.frames.len() as f32
    }
}

// -----------------------------------------------------------------------------
// Noise reduction
// -----------------------------------------------------------------------------

/// Spectral-gate `buffer`, learning the noise from `profile` when given
///
/// `prop_decrease` is the fraction of gated energy removed (0 = no change,
/// 1 = gated bins muted). Output length and rate match the input.
///
/// # Errors
/// * `StageDegraded` - non-finite input or output
pub fn reduce_noise(
    buffer: &AudioBuffer,
    profile: Option<&NoiseProfile<'_>>,
    prop_decrease: f32,
) -> Result<AudioBuffer> {
    if !buffer.is_finite() {
        return Err(MasteringError::degraded(
            StageId::Denoise,
            "input contains non-finite samples",
        ));
    }
    let prop_decrease = prop_decrease.clamp(0.0, 1.0);
    let stft = Stft::new();

    let padded = Stft::pad(buffer.samples());

    // Zero padding would bias the profile statistics; pad only when the
    // profile is shorter than one window.
    let reference = match profile {
        Some(p) if p.len() >= FFT_SIZE => reference_threshold(&stft, p.samples),
        Some(p) => reference_threshold(&stft, &Stft::pad(p.samples)),
        None => blind_threshold(&stft, &padded),
    };

    let mut window = MagnitudeWindow::new(&stft, &padded);
    let num_frames = window.num_frames();

    let gated_gain = 1.0 - prop_decrease;
    let mut mask = vec![1.0_f32; NUM_BINS];
    let mut output = vec![0.0_f32; padded.len()];
    let mut norm = vec![0.0_f32; padded.len()];
    let mut spectrum = vec![Complex::new(0.0, 0.0); FFT_SIZE];
    let mut gated_bins = 0usize;

    for frame in 0..num_frames {
        window.advance_to(frame);
        for bin in 0..NUM_BINS {
            let floor = reference[bin].max(NONSTATIONARY_SENSITIVITY * window.mean(bin));
            let raw = if window.magnitude(frame, bin) < floor {
                gated_bins += 1;
                gated_gain
            } else {
                1.0
            };
            mask[bin] = if frame == 0 {
                raw
            } else {
                MASK_SMOOTHING * mask[bin] + (1.0 - MASK_SMOOTHING) * raw
            };
        }

        let start = frame * HOP_SIZE;
        stft.spectrum(&padded, start, &mut spectrum);
        for (k, bin) in spectrum.iter_mut().enumerate() {
            *bin *= mask[k.min(FFT_SIZE - k)];
        }
        stft.inverse.process(&mut spectrum);

        for (i, c) in spectrum.iter().enumerate() {
            let w = stft.window[i];
            output[start + i] += c.re / FFT_SIZE as f32 * w;
            norm[start + i] += w * w;
        }
    }

    let half = FFT_SIZE / 2;
    let samples: Vec<f32> = output[half..half + buffer.len()]
        .iter()
        .zip(&norm[half..half + buffer.len()])
        .map(|(&y, &n)| if n > EPS { y / n } else { 0.0 })
        .collect();

    if samples.iter().any(|s| !s.is_finite()) {
        return Err(MasteringError::degraded(
            StageId::Denoise,
            "non-finite samples after resynthesis",
        ));
    }

    debug!(
        "Noise reduction: {} frames, {:.1}% of bins gated, prop_decrease {:.2}",
        num_frames,
        100.0 * gated_bins as f32 / (num_frames * NUM_BINS) as f32,
        prop_decrease
    );

    buffer.with_samples(samples)
}

/// Noise reduction stage: profile selection followed by spectral gating
#[derive(Debug, Clone)]
pub struct NoiseReducer {
    strength: DenoiseStrength,
}

impl NoiseReducer {
    pub fn new(strength: DenoiseStrength) -> Self {
        Self { strength }
    }

    pub fn strength(&self) -> DenoiseStrength {
        self.strength
    }

    /// Reduce noise using an explicit profile (or blind when `None`)
    pub fn reduce(
        &self,
        input: &AudioBuffer,
        profile: Option<&NoiseProfile<'_>>,
    ) -> Result<AudioBuffer> {
        reduce_noise(input, profile, self.strength.prop_decrease())
    }
}

impl Default for NoiseReducer {
    fn default() -> Self {
        Self::new(DenoiseStrength::default())
    }
}

impl MasteringStage for NoiseReducer {
    fn id(&self) -> StageId {
        StageId::Denoise
    }

    fn policy(&self) -> FailurePolicy {
        FailurePolicy::Soft
    }

    fn display_name(&self) -> &'static str {
        "Noise Reduction"
    }

    fn process(&self, input: &AudioBuffer) -> Result<AudioBuffer> {
        let profile = select_noise_profile(input);
        match &profile {
            Some(p) => debug!(
                "Noise profile at sample {} (mean |x| {:.5})",
                p.offset, p.energy
            ),
            None => debug!("No complete profile frame, denoising blind"),
        }
        self.reduce(input, profile.as_ref())
    }
}
