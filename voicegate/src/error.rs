use thiserror::Error;

/// Errors returned by voicegate operations.
///
/// These are hard failures of a single operation. Rejections that are a
/// normal outcome of matching (ambiguous command, unknown speaker) live in
/// [`crate::Rejection`] and are carried inside the [`crate::Verdict`].
#[derive(Debug, Error)]
pub enum VoiceGateError {
    #[error("invalid waveform: {reason}")]
    InvalidWaveform { reason: String },

    #[error("no valid speech detected: {remaining} samples left after trimming, need at least {min_samples}")]
    PreprocessingRejected { remaining: usize, min_samples: usize },

    #[error("label {label:?} has no enrolled samples")]
    InsufficientSamples { label: String },

    #[error("no command labels enrolled besides the owner label {owner:?}")]
    NoCommandsEnrolled { owner: String },

    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("feature form does not match metric {metric}")]
    FormMismatch { metric: String },

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("store error: {0}")]
    Store(String),

    #[error("command {command} is not allowed while {state}")]
    InvalidTransition { state: String, command: String },
}

impl VoiceGateError {
    pub(crate) fn invalid_waveform(reason: impl Into<String>) -> Self {
        Self::InvalidWaveform {
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, VoiceGateError>;
