//! Masterchain - offline audio mastering
//!
//! Takes a mono signal and a named preset and produces a denoised,
//! tonally shaped, compressed, loudness-normalized and peak-limited
//! master.
//!
//! # Architecture
//!
//! - `engine`: signal buffer, WAV codec, measurements
//! - `dsp`: the mastering stages and the `MasteringPipeline` that runs them
//! - `presets`: preset store and resolved stage parameters
//! - `neural`: optional vocal separation service interface

pub mod cli;
pub mod dsp;
pub mod engine;
pub mod error;
pub mod neural;
pub mod presets;

pub use dsp::{MasteringPipeline, ProcessingReport, StageOutcome};
pub use engine::AudioBuffer;
pub use error::{MasteringError, Result, StageId};
pub use presets::{DenoiseStrength, PresetConfig, PresetStore};
