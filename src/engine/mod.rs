//! Audio Engine Module
//!
//! Signal buffer, codec collaborators and level analysis.

pub mod analysis;
pub mod buffer;
pub mod io;

pub use analysis::AudioAnalysis;
pub use buffer::{db_to_linear, linear_to_db, AudioBuffer};
pub use io::{export_audio, import_audio, Decoder, Encoder, WavCodec};
