//! Voice-activated access control.
//!
//! A short utterance is checked two ways at once: **which command** was
//! spoken (nearest enrolled command model) and **who** spoke it (distance
//! to the enrolled owner model). Access is granted only when both pass.
//!
//! # Architecture
//!
//! 1. [`Preprocessor::process`]: raw mono waveform -> trimmed, normalized,
//!    optionally denoised waveform
//! 2. [`FeatureExtractor::extract`]: waveform -> [`Features`], either an
//!    aggregate MFCC/delta vector or a per-frame LPC/pitch/energy sequence
//! 3. [`ModelBuilder::build`]: references of one label -> [`EnrollmentModel`]
//!    (centroid or medoid plus intra-class spread)
//! 4. [`DistanceEngine::distance`]: cosine, Euclidean, DTW or frame
//!    correlation
//! 5. [`DecisionEngine::evaluate`]: scoring, ranking and rejection policy
//!    -> [`Verdict`]
//!
//! [`VoiceGate`] wires all stages from one [`Config`]; [`Session`] drives
//! enrollment and testing over a [`SampleStore`].
//!
//! # Rejection policies
//!
//! ```text
//! absolute_threshold      best > ceiling                 -> reject
//! relative_margin         best / runner_up > ratio       -> ambiguous
//! adaptive_spread_margin  d >= model.spread + margin     -> reject
//! ```

mod capture;
mod config;
mod decision;
mod distance;
mod engine;
mod enroll;
mod error;
pub mod features;
mod preprocess;
mod session;
mod store;
mod waveform;

pub use capture::{fit_to_duration, Capture, ReplayCapture};
pub use config::{
    AudioConfig, Config, DecisionConfig, DistanceConfig, FeatureConfig, NoiseSuppressionConfig,
    Normalization, PreprocessConfig,
};
pub use decision::{
    rank, CommandDecision, DecisionEngine, DecisionPolicy, Rejection, Score, SpeakerDecision,
    Verdict,
};
pub use distance::{
    cosine_distance, cosine_similarity, dtw_distance, euclidean_distance, frame_correlation,
    DistanceEngine, Metric,
};
pub use engine::VoiceGate;
pub use enroll::{EnrollmentModel, ModelBuilder, ModelSet};
pub use error::{Result, VoiceGateError};
pub use features::{FeatureExtractor, FeatureForm, FeatureVector, Features, FrameSequence};
pub use preprocess::{trim_bounds, Cleaned, NoiseSuppressor, Preprocessor, SpectralGate};
pub use session::{Session, SessionCommand, SessionEvent, SessionState};
pub use store::{label_from_file_name, validate_label, MemoryStore, SampleStore, LABEL_SEPARATOR};
pub use waveform::Waveform;
