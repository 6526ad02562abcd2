//! Error handling for masterchain
//!
//! Stage failures are split into soft (`StageDegraded`) and hard
//! (`StageFatal`) kinds. The pipeline absorbs the soft ones; everything
//! else reaches the caller with the stage that produced it.

use thiserror::Error;

/// Result type alias for masterchain operations
pub type Result<T> = std::result::Result<T, MasteringError>;

/// Pipeline stage identifiers used in error context and reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageId {
    Separation,
    NoiseProfile,
    Denoise,
    Shape,
    Compress,
    Loudness,
    Limit,
}

impl StageId {
    /// Stable lowercase name, used in logs and CLI output
    pub fn as_str(&self) -> &'static str {
        match self {
            StageId::Separation => "separation",
            StageId::NoiseProfile => "noise-profile",
            StageId::Denoise => "denoise",
            StageId::Shape => "shape",
            StageId::Compress => "compress",
            StageId::Loudness => "loudness",
            StageId::Limit => "limit",
        }
    }
}

impl std::fmt::Display for StageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Main error type for masterchain operations
#[derive(Error, Debug)]
pub enum MasteringError {
    // Input validation
    #[error("Invalid input: {reason}")]
    InvalidInput { reason: String },

    // Stage failures
    #[error("Stage '{stage}' degraded: {reason}")]
    StageDegraded { stage: StageId, reason: String },

    #[error("Stage '{stage}' failed: {reason}")]
    StageFatal { stage: StageId, reason: String },

    #[error("Invalid parameter: {param} = {value} (expected {expected})")]
    InvalidParameter {
        param: String,
        value: String,
        expected: String,
    },

    // Collaborators
    #[error("Separation service unavailable")]
    SeparationUnavailable,

    #[error("Preset error: {reason}")]
    PresetError { reason: String },

    // Audio I/O
    #[error("Failed to read audio: {reason}")]
    AudioRead {
        reason: String,
        #[source]
        source: Option<hound::Error>,
    },

    #[error("Failed to write audio: {reason}")]
    AudioWrite {
        reason: String,
        #[source]
        source: Option<hound::Error>,
    },

    #[error("Unsupported audio format: {format}")]
    UnsupportedFormat { format: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl MasteringError {
    /// Shorthand for a soft failure inside `stage`
    pub fn degraded(stage: StageId, reason: impl Into<String>) -> Self {
        MasteringError::StageDegraded {
            stage,
            reason: reason.into(),
        }
    }

    /// Shorthand for a hard failure inside `stage`
    pub fn fatal(stage: StageId, reason: impl Into<String>) -> Self {
        MasteringError::StageFatal {
            stage,
            reason: reason.into(),
        }
    }

    /// Get the error code for this error type
    pub fn error_code(&self) -> &'static str {
        match self {
            MasteringError::InvalidInput { .. } => "INVALID_INPUT",
            MasteringError::StageDegraded { .. } => "STAGE_DEGRADED",
            MasteringError::StageFatal { .. } => "STAGE_FATAL",
            MasteringError::InvalidParameter { .. } => "INVALID_PARAMETER",
            MasteringError::SeparationUnavailable => "SEPARATION_UNAVAILABLE",
            MasteringError::PresetError { .. } => "PRESET_ERROR",
            MasteringError::AudioRead { .. } => "AUDIO_READ",
            MasteringError::AudioWrite { .. } => "AUDIO_WRITE",
            MasteringError::UnsupportedFormat { .. } => "UNSUPPORTED_FORMAT",
            MasteringError::Io(_) => "IO_ERROR",
            MasteringError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }

    /// The stage this error originated in, if any
    pub fn stage(&self) -> Option<StageId> {
        match self {
            MasteringError::StageDegraded { stage, .. }
            | MasteringError::StageFatal { stage, .. } => Some(*stage),
            MasteringError::SeparationUnavailable => Some(StageId::Separation),
            _ => None,
        }
    }

    /// Check if the pipeline can continue past this error
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            MasteringError::StageDegraded { .. } | MasteringError::SeparationUnavailable
        )
    }

    /// Returns a suggested recovery action for this error
    pub fn recovery_hint(&self) -> &'static str {
        match self {
            MasteringError::InvalidInput { .. } => {
                "Decode the source to a non-empty mono signal with a positive sample rate"
            }
            MasteringError::StageFatal { .. } => {
                "Check the input for NaN/Inf samples or an unusable length"
            }
            MasteringError::InvalidParameter { .. } => {
                "Adjust the preset value to be within the valid range"
            }
            MasteringError::PresetError { .. } => "Check the presets JSON file syntax and values",
            MasteringError::AudioRead { .. } => {
                "Check that the file exists and is a valid WAV file"
            }
            MasteringError::UnsupportedFormat { .. } => {
                "Convert to WAV (8/16/24/32-bit integer or 32-bit float)"
            }
            MasteringError::AudioWrite { .. } | MasteringError::Io(_) => {
                "Check the output path is writable and the disk has free space"
            }
            _ => "Check the error details and try again",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let err = MasteringError::InvalidInput {
            reason: "empty".to_string(),
        };
        assert_eq!(err.error_code(), "INVALID_INPUT");
        assert_eq!(err.stage(), None);
    }

    #[test]
    fn test_stage_context() {
        let err = MasteringError::fatal(StageId::Shape, "transform size mismatch");
        assert_eq!(err.stage(), Some(StageId::Shape));
        assert!(!err.is_recoverable());
        assert_eq!(
            err.to_string(),
            "Stage 'shape' failed: transform size mismatch"
        );

        let soft = MasteringError::degraded(StageId::Loudness, "silent input");
        assert!(soft.is_recoverable());
        assert_eq!(soft.error_code(), "STAGE_DEGRADED");
    }
}
