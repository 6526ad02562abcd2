//! DSP stages of the mastering chain
//!
//! Every stage implements `MasteringStage` and is run by
//! `MasteringPipeline` in a fixed order:
//! Noise Reduction → Spectral Shaper → Compressor → Loudness → Limiter

mod chain;
pub mod compressor;
pub mod denoise;
mod limiter;
pub mod loudness;
mod noise_profile;
pub mod spectral;
mod stage;

pub use chain::{MasteringPipeline, ProcessingReport, StageOutcome, StageRecord};
pub use compressor::{Compressor, CompressorParams, EnvelopeState};
pub use denoise::{reduce_noise, NoiseReducer};
pub use limiter::{Limiter, SAFETY_CLIP};
pub use loudness::{measure_integrated_loudness, LoudnessNormalizer};
pub use noise_profile::{select_noise_profile, NoiseProfile, PROFILE_FRAME_SECS};
pub use spectral::SpectralShaper;
pub use stage::{FailurePolicy, MasteringStage};
