//! Mastering chain orchestration
//!
//! Stages run in a fixed order:
//! 1. Separation (optional, only with an available backend)
//! 2. Noise profile selection
//! 3. Noise reduction
//! 4. Spectral shaping
//! 5. Compression
//! 6. Loudness normalization
//! 7. Peak limiting (always last)
//!
//! Profile selection and noise reduction are skipped when the preset turns
//! denoising off. Soft stages that fail leave the buffer as it was; hard
//! stages abort the run with an error naming the stage.

use std::fmt;
use std::time::Instant;

use log::{debug, info, warn};

use super::compressor::{Compressor, CompressorParams};
use super::denoise::{reduce_noise, NoiseReducer};
use super::limiter::Limiter;
use super::loudness::LoudnessNormalizer;
use super::noise_profile::select_noise_profile;
use super::spectral::SpectralShaper;
use super::stage::{FailurePolicy, MasteringStage};
use crate::engine::AudioBuffer;
use crate::error::{MasteringError, Result, StageId};
use crate::neural::{NoSeparation, SeparationService};
use crate::presets::{PresetConfig, PresetStore};

/// What happened to one stage during a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageOutcome {
    Applied,
    Skipped,
    /// Noise profile only: no complete profile frame, so noise reduction
    /// learns from the signal itself
    Blind,
    /// The stage failed softly and its input was passed through
    Degraded(String),
}

/// One line of a processing report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageRecord {
    pub stage: StageId,
    pub outcome: StageOutcome,
}

/// Per-stage outcomes of one pipeline run, in execution order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessingReport {
    pub preset: String,
    pub stages: Vec<StageRecord>,
}

impl ProcessingReport {
    pub fn new(preset: &str) -> Self {
        Self {
            preset: preset.to_string(),
            stages: Vec::new(),
        }
    }

    fn record(&mut self, stage: StageId, outcome: StageOutcome) {
        self.stages.push(StageRecord { stage, outcome });
    }

    /// Outcome of `stage`, if it was reached
    pub fn outcome(&self, stage: StageId) -> Option<&StageOutcome> {
        self.stages
            .iter()
            .find(|r| r.stage == stage)
            .map(|r| &r.outcome)
    }

    /// Stages that degraded, with their reasons
    pub fn degraded(&self) -> impl Iterator<Item = (StageId, &str)> {
        self.stages.iter().filter_map(|r| match &r.outcome {
            StageOutcome::Degraded(reason) => Some((r.stage, reason.as_str())),
            _ => None,
        })
    }

    /// True if no stage degraded
    pub fn is_clean(&self) -> bool {
        self.degraded().next().is_none()
    }
}

impl fmt::Display for ProcessingReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Preset: {}", self.preset)?;
        for record in &self.stages {
            match &record.outcome {
                StageOutcome::Applied => writeln!(f, "  {:<14} applied", record.stage.as_str())?,
                StageOutcome::Skipped => writeln!(f, "  {:<14} skipped", record.stage.as_str())?,
                StageOutcome::Blind => writeln!(f, "  {:<14} blind", record.stage.as_str())?,
                StageOutcome::Degraded(reason) => {
                    writeln!(f, "  {:<14} degraded ({})", record.stage.as_str(), reason)?
                }
            }
        }
        Ok(())
    }
}

/// The mastering pipeline
///
/// Holds the preset store and an optional separation backend. It keeps no
/// per-run state, so one instance can serve concurrent calls.
pub struct MasteringPipeline {
    presets: PresetStore,
    separation: Box<dyn SeparationService>,
}

impl MasteringPipeline {
    /// Pipeline with the built-in presets and no separation backend
    pub fn new() -> Self {
        Self {
            presets: PresetStore::with_defaults(),
            separation: Box::new(NoSeparation),
        }
    }

    /// Replace the preset store
    pub fn with_presets(mut self, presets: PresetStore) -> Self {
        self.presets = presets;
        self
    }

    /// Attach a separation backend
    pub fn with_separation(mut self, separation: Box<dyn SeparationService>) -> Self {
        self.separation = separation;
        self
    }

    pub fn presets(&self) -> &PresetStore {
        &self.presets
    }

    /// Post-denoise stages for `config`, in execution order
    fn build_stages(config: &PresetConfig) -> Vec<Box<dyn MasteringStage>> {
        vec![
            Box::new(SpectralShaper::new()),
            Box::new(Compressor::with_params(CompressorParams::from_preset(config))),
            Box::new(LoudnessNormalizer::new(config.target_loudness)),
            Box::new(Limiter::new(config.ceiling_db)),
        ]
    }

    /// Master `input` with `config`
    pub fn process(&self, input: &AudioBuffer, config: &PresetConfig) -> Result<AudioBuffer> {
        self.process_with_report(input, config).map(|(output, _)| output)
    }

    /// Master `input` with the named preset from the attached store
    ///
    /// Unknown names fall back to the stage defaults.
    pub fn process_preset(&self, input: &AudioBuffer, preset: &str) -> Result<AudioBuffer> {
        self.process(input, &self.presets.resolve(preset))
    }

    /// Master raw mono samples
    ///
    /// # Errors
    /// * `InvalidInput` - if `samples` is empty or `sample_rate` is zero
    pub fn process_samples(
        &self,
        samples: Vec<f32>,
        sample_rate: u32,
        config: &PresetConfig,
    ) -> Result<AudioBuffer> {
        let input = AudioBuffer::new(samples, sample_rate)?;
        self.process(&input, config)
    }

    /// Master `input` and report what each stage did
    pub fn process_with_report(
        &self,
        input: &AudioBuffer,
        config: &PresetConfig,
    ) -> Result<(AudioBuffer, ProcessingReport)> {
        input.validate()?;
        let start = Instant::now();
        info!(
            "Mastering {:.2}s @ {} Hz with preset '{}' (denoise {}, target {:.1} LUFS)",
            input.duration(),
            input.sample_rate(),
            config.name,
            config.denoise_strength.as_str(),
            config.target_loudness
        );

        let mut report = ProcessingReport::new(&config.name);
        let mut current = input.clone();

        if config.denoise_strength.is_enabled() {
            current = self.separate_vocals(current, config, &mut report);

            let reducer = NoiseReducer::new(config.denoise_strength);
            let denoised = {
                let profile = select_noise_profile(&current);
                report.record(
                    StageId::NoiseProfile,
                    match &profile {
                        Some(_) => StageOutcome::Applied,
                        None => StageOutcome::Blind,
                    },
                );
                Self::run_stage(&reducer, &current, &mut report, |buf| {
                    reducer.reduce(buf, profile.as_ref())
                })?
            };
            current = denoised;
        } else {
            report.record(StageId::Separation, StageOutcome::Skipped);
            report.record(StageId::NoiseProfile, StageOutcome::Skipped);
            report.record(StageId::Denoise, StageOutcome::Skipped);
        }

        for stage in Self::build_stages(config) {
            current = Self::run_stage(stage.as_ref(), &current, &mut report, |buf| {
                stage.process(buf)
            })?;
        }

        info!(
            "Mastering finished in {} ms, peak {:.2} dBFS",
            start.elapsed().as_millis(),
            20.0 * current.peak().max(1e-9).log10()
        );
        Ok((current, report))
    }

    /// Run one stage under its failure policy
    ///
    /// Output whose length, rate or finiteness differs from what the stage
    /// contract promises is treated as a failure of that stage.
    fn run_stage<F>(
        stage: &dyn MasteringStage,
        input: &AudioBuffer,
        report: &mut ProcessingReport,
        run: F,
    ) -> Result<AudioBuffer>
    where
        F: FnOnce(&AudioBuffer) -> Result<AudioBuffer>,
    {
        let id = stage.id();
        let result = run(input).and_then(|output| {
            if output.len() != input.len() || output.sample_rate() != input.sample_rate() {
                Err(MasteringError::fatal(
                    id,
                    format!(
                        "output is {} samples @ {} Hz, expected {} @ {} Hz",
                        output.len(),
                        output.sample_rate(),
                        input.len(),
                        input.sample_rate()
                    ),
                ))
            } else if !output.is_finite() {
                Err(MasteringError::fatal(id, "output contains non-finite samples"))
            } else {
                Ok(output)
            }
        });

        match (result, stage.policy()) {
            (Ok(output), _) => {
                debug!("{} applied", stage.display_name());
                report.record(id, StageOutcome::Applied);
                Ok(output)
            }
            (Err(err), FailurePolicy::Soft) => {
                let reason = failure_reason(&err);
                warn!(
                    "{} degraded, passing input through: {}",
                    stage.display_name(),
                    reason
                );
                report.record(id, StageOutcome::Degraded(reason));
                Ok(input.clone())
            }
            (Err(err), FailurePolicy::Hard) => Err(match err {
                MasteringError::StageFatal { .. } => err,
                other => MasteringError::fatal(id, other.to_string()),
            }),
        }
    }

    /// Separate vocals, denoise them blind, and remix with the accompaniment
    ///
    /// Falls back to `input` when no backend is available or anything fails.
    fn separate_vocals(
        &self,
        input: AudioBuffer,
        config: &PresetConfig,
        report: &mut ProcessingReport,
    ) -> AudioBuffer {
        if !self.separation.is_available() {
            debug!("Separation backend '{}' unavailable", self.separation.name());
            report.record(StageId::Separation, StageOutcome::Skipped);
            return input;
        }

        let remixed = self.separation.separate(&input).and_then(|stems| {
            if !stems.matches(&input) {
                return Err(MasteringError::degraded(
                    StageId::Separation,
                    format!(
                        "stems are {}/{} samples, source is {}",
                        stems.vocal.len(),
                        stems.accompaniment.len(),
                        input.len()
                    ),
                ));
            }
            let vocal = reduce_noise(&stems.vocal, None, config.denoise_strength.prop_decrease())?;
            stems.accompaniment.mix(&vocal)
        });

        match remixed {
            Ok(output) => {
                info!("Separated vocals with '{}'", self.separation.name());
                report.record(StageId::Separation, StageOutcome::Applied);
                output
            }
            Err(err) => {
                let reason = failure_reason(&err);
                warn!("Separation fallback to raw input: {}", reason);
                report.record(StageId::Separation, StageOutcome::Degraded(reason));
                input
            }
        }
    }
}

impl Default for MasteringPipeline {
    fn default() -> Self {
        Self::new()
    }
}

fn failure_reason(err: &MasteringError) -> String {
    match err {
        MasteringError::StageDegraded { reason, .. } | MasteringError::StageFatal { reason, .. } => {
            reason.clone()
        }
        other => other.to_string(),
    }
}
