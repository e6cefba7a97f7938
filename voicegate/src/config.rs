//! Engine configuration.
//!
//! One [`Config`] value is passed to [`crate::VoiceGate::new`]; each component
//! receives its own section at construction. All fields have defaults, so a
//! YAML file only needs the keys it overrides:
//!
//! ```yaml
//! preprocess:
//!   trim_top_db: 25
//!   noise_suppression:
//!     enabled: true
//! decision:
//!   command_policy:
//!     kind: relative_margin
//!     ratio: 0.8
//!   speaker_policy:
//!     kind: adaptive_spread_margin
//!     margin: 0.05
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::decision::DecisionPolicy;
use crate::distance::Metric;
use crate::error::{Result, VoiceGateError};

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub audio: AudioConfig,
    pub preprocess: PreprocessConfig,
    pub features: FeatureConfig,
    pub distance: DistanceConfig,
    pub decision: DecisionConfig,
}

/// Shape of the audio the capture collaborator delivers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Sample rate in Hz (default: 16000).
    pub sample_rate: u32,
    /// Length of one captured utterance in seconds (default: 3.0).
    pub utterance_secs: f32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16000,
            utterance_secs: 3.0,
        }
    }
}

/// Amplitude normalization rule. The same rule applies to every waveform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Normalization {
    /// Divide by the largest absolute sample.
    #[default]
    Peak,
    /// Divide by the root-mean-square energy.
    Rms,
    None,
}

/// Waveform cleaning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    /// Trim leading/trailing quiet frames (default: true).
    pub trim_enabled: bool,
    /// Frames quieter than `peak - trim_top_db` dB are silence (default: 20).
    pub trim_top_db: f32,
    /// Trim analysis frame in samples (default: 2048).
    pub trim_frame_length: usize,
    /// Trim analysis hop in samples (default: 512).
    pub trim_hop: usize,
    /// Waveforms whose peak is at or below this are treated as silent (default: 1e-4).
    pub silence_floor: f32,
    /// Minimum samples left after trimming (default: 400, one analysis frame).
    pub min_samples: usize,
    pub normalization: Normalization,
    pub noise_suppression: NoiseSuppressionConfig,
    /// Pad or truncate to this many seconds when the metric compares
    /// aggregate vectors or time-aligned frames (default: 1.0).
    /// `None` keeps the trimmed length.
    pub fixed_duration_secs: Option<f32>,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            trim_enabled: true,
            trim_top_db: 20.0,
            trim_frame_length: 2048,
            trim_hop: 512,
            silence_floor: 1e-4,
            min_samples: 400,
            normalization: Normalization::Peak,
            noise_suppression: NoiseSuppressionConfig::default(),
            fixed_duration_secs: Some(1.0),
        }
    }
}

/// Spectral-gate noise suppression.
///
/// Disabled by default: thresholds in [`DecisionConfig`] must be calibrated
/// with the same setting used at enrollment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoiseSuppressionConfig {
    pub enabled: bool,
    /// STFT size, power of two (default: 512).
    pub fft_size: usize,
    /// Quantile of per-bin magnitudes taken as the noise estimate (default: 0.1).
    pub noise_quantile: f32,
    /// Multiple of the noise estimate subtracted from each bin (default: 1.5).
    pub reduction: f32,
    /// Fraction of the original magnitude always kept (default: 0.05).
    pub floor: f32,
}

impl Default for NoiseSuppressionConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            fft_size: 512,
            noise_quantile: 0.1,
            reduction: 1.5,
            floor: 0.05,
        }
    }
}

/// Acoustic feature extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    /// Analysis frame in samples (default: 400 = 25ms @ 16kHz).
    pub frame_length: usize,
    /// Hop between frames in samples (default: 160 = 10ms @ 16kHz).
    pub frame_shift: usize,
    /// FFT size, power of two >= frame_length (default: 512).
    pub fft_size: usize,
    /// Mel filterbank channels (default: 40).
    pub num_mels: usize,
    /// Cepstral coefficients kept per frame, including c0 (default: 13).
    pub num_ceps: usize,
    /// Lowest mel edge in Hz (default: 20).
    pub low_freq: f64,
    /// Highest mel edge in Hz; zero or negative is an offset from Nyquist (default: 0).
    pub high_freq: f64,
    /// Pre-emphasis coefficient (default: 0.97).
    pub pre_emphasis: f64,
    /// Floor for log energies (default: 1e-10).
    pub energy_floor: f64,
    /// Append per-stream standard deviations to the aggregate vector (default: true).
    pub include_std: bool,
    /// Half-width of the delta regression window (default: 2).
    pub delta_width: usize,
    /// Linear-prediction order for frame features (default: 12).
    pub lpc_order: usize,
    /// Pitch search range in Hz (default: 60..400).
    pub pitch_min_hz: f64,
    pub pitch_max_hz: f64,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            frame_length: 400,
            frame_shift: 160,
            fft_size: 512,
            num_mels: 40,
            num_ceps: 13,
            low_freq: 20.0,
            high_freq: 0.0,
            pre_emphasis: 0.97,
            energy_floor: 1e-10,
            include_std: true,
            delta_width: 2,
            lpc_order: 12,
            pitch_min_hz: 60.0,
            pitch_max_hz: 400.0,
        }
    }
}

impl FeatureConfig {
    pub(crate) fn resolved_high_freq(&self, sample_rate: u32) -> f64 {
        if self.high_freq <= 0.0 {
            sample_rate as f64 / 2.0 + self.high_freq
        } else {
            self.high_freq
        }
    }
}

/// Which dissimilarity the engine computes.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DistanceConfig {
    pub metric: Metric,
    /// Sakoe-Chiba half-width in frames for DTW; `None` is unconstrained.
    pub dtw_band: Option<usize>,
}

/// Rejection policies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecisionConfig {
    /// Default: relative margin 0.8 with no absolute ceiling.
    pub command_policy: DecisionPolicy,
    /// Default: adaptive spread + 0.1.
    pub speaker_policy: DecisionPolicy,
    /// Label under which owner voice samples are enrolled (default: "owner").
    pub owner_label: String,
    /// Command vocabulary. Empty means every stored label except the
    /// owner's; when set, each listed command must have references.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub commands: Vec<String>,
}

impl Default for DecisionConfig {
    fn default() -> Self {
        Self {
            command_policy: DecisionPolicy::RelativeMargin {
                ratio: 0.8,
                ceiling: None,
            },
            speaker_policy: DecisionPolicy::AdaptiveSpreadMargin { margin: 0.1 },
            owner_label: "owner".into(),
            commands: Vec::new(),
        }
    }
}

impl Config {
    /// Parses YAML; missing keys take their defaults. The result is validated.
    pub fn from_yaml_str(s: &str) -> Result<Self> {
        let cfg: Config = serde_yaml::from_str(s)
            .map_err(|e| VoiceGateError::InvalidConfig(format!("parse yaml: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn to_yaml_string(&self) -> Result<String> {
        serde_yaml::to_string(self)
            .map_err(|e| VoiceGateError::InvalidConfig(format!("encode yaml: {e}")))
    }

    /// Reads and validates a YAML config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            VoiceGateError::InvalidConfig(format!("read {}: {e}", path.display()))
        })?;
        Self::from_yaml_str(&content)
    }

    /// Samples per utterance at the configured rate.
    pub fn utterance_samples(&self) -> usize {
        (self.audio.utterance_secs * self.audio.sample_rate as f32).round() as usize
    }

    /// Checks cross-field consistency.
    pub fn validate(&self) -> Result<()> {
        let a = &self.audio;
        if a.sample_rate == 0 {
            return invalid("audio.sample_rate must be positive");
        }
        if !(a.utterance_secs > 0.0) {
            return invalid("audio.utterance_secs must be positive");
        }

        let f = &self.features;
        if f.frame_length == 0 || f.frame_shift == 0 {
            return invalid("features.frame_length and frame_shift must be positive");
        }
        if f.frame_shift > f.frame_length {
            return invalid("features.frame_shift must not exceed frame_length");
        }
        if !f.fft_size.is_power_of_two() || f.fft_size < f.frame_length {
            return invalid("features.fft_size must be a power of two >= frame_length");
        }
        if f.num_mels == 0 || f.num_ceps == 0 || f.num_ceps > f.num_mels {
            return invalid("features.num_ceps must be in 1..=num_mels");
        }
        let nyquist = a.sample_rate as f64 / 2.0;
        let high = f.resolved_high_freq(a.sample_rate);
        if f.low_freq < 0.0 || high <= f.low_freq || high > nyquist {
            return invalid("features.low_freq/high_freq must satisfy 0 <= low < high <= nyquist");
        }
        if f.lpc_order == 0 || f.lpc_order >= f.frame_length {
            return invalid("features.lpc_order must be in 1..frame_length");
        }
        if !(f.pitch_min_hz > 0.0) || f.pitch_max_hz <= f.pitch_min_hz || f.pitch_max_hz >= nyquist {
            return invalid("features.pitch range must satisfy 0 < min < max < nyquist");
        }
        if (a.sample_rate as f64 / f.pitch_min_hz) >= f.frame_length as f64 {
            return invalid("features.frame_length must cover one period of pitch_min_hz");
        }

        let p = &self.preprocess;
        if !(p.trim_top_db > 0.0) {
            return invalid("preprocess.trim_top_db must be positive");
        }
        if p.trim_frame_length == 0 || p.trim_hop == 0 {
            return invalid("preprocess.trim_frame_length and trim_hop must be positive");
        }
        if p.silence_floor < 0.0 {
            return invalid("preprocess.silence_floor must not be negative");
        }
        if p.min_samples < f.frame_length {
            return invalid("preprocess.min_samples must be at least features.frame_length");
        }
        if let Some(secs) = p.fixed_duration_secs {
            if !(secs > 0.0) {
                return invalid("preprocess.fixed_duration_secs must be positive");
            }
            if ((secs * a.sample_rate as f32) as usize) < p.min_samples {
                return invalid("preprocess.fixed_duration_secs is shorter than min_samples");
            }
        }
        let n = &p.noise_suppression;
        if !n.fft_size.is_power_of_two() || n.fft_size < 4 {
            return invalid("preprocess.noise_suppression.fft_size must be a power of two >= 4");
        }
        if !(0.0..=1.0).contains(&n.noise_quantile) || !(0.0..=1.0).contains(&n.floor) {
            return invalid("preprocess.noise_suppression quantile and floor must be in [0, 1]");
        }
        if n.reduction < 0.0 {
            return invalid("preprocess.noise_suppression.reduction must not be negative");
        }

        if self.distance.dtw_band == Some(0) {
            return invalid("distance.dtw_band must be positive when set");
        }

        let d = &self.decision;
        d.command_policy.validate("decision.command_policy")?;
        d.speaker_policy.validate("decision.speaker_policy")?;
        if matches!(d.speaker_policy, DecisionPolicy::RelativeMargin { .. }) {
            return invalid("decision.speaker_policy cannot be relative_margin: there is only one owner model");
        }
        if d.owner_label.is_empty() {
            return invalid("decision.owner_label must not be empty");
        }
        if d.commands.iter().any(|c| c == &d.owner_label) {
            return invalid("decision.commands must not contain the owner label");
        }
        Ok(())
    }
}

fn invalid(msg: &str) -> Result<()> {
    Err(VoiceGateError::InvalidConfig(msg.into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn yaml_partial_override() {
        let cfg = Config::from_yaml_str(
            r#"
preprocess:
  trim_top_db: 30
  normalization: rms
distance:
  metric: dtw_sequence
  dtw_band: 20
decision:
  command_policy:
    kind: absolute_threshold
    ceiling: 0.4
"#,
        )
        .unwrap();
        assert_eq!(cfg.preprocess.trim_top_db, 30.0);
        assert_eq!(cfg.preprocess.normalization, Normalization::Rms);
        assert_eq!(cfg.preprocess.trim_hop, 512);
        assert_eq!(cfg.distance.metric, Metric::DtwSequence);
        assert_eq!(cfg.distance.dtw_band, Some(20));
        assert_eq!(
            cfg.decision.command_policy,
            DecisionPolicy::AbsoluteThreshold { ceiling: 0.4 }
        );
        assert_eq!(cfg.decision.owner_label, "owner");
    }

    #[test]
    fn yaml_roundtrip() {
        let cfg = Config::default();
        let back = Config::from_yaml_str(&cfg.to_yaml_string().unwrap()).unwrap();
        assert_eq!(cfg, back);
    }

    #[test]
    fn rejects_relative_margin_for_speaker() {
        let mut cfg = Config::default();
        cfg.decision.speaker_policy = DecisionPolicy::RelativeMargin {
            ratio: 0.5,
            ceiling: None,
        };
        assert!(matches!(cfg.validate(), Err(VoiceGateError::InvalidConfig(_))));
    }

    #[test]
    fn rejects_short_min_samples() {
        let mut cfg = Config::default();
        cfg.preprocess.min_samples = 10;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_bad_fft_size() {
        let mut cfg = Config::default();
        cfg.features.fft_size = 300;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn unknown_yaml_is_error() {
        assert!(Config::from_yaml_str("decision: [1, 2").is_err());
    }

    #[test]
    fn high_freq_offset_from_nyquist() {
        let f = FeatureConfig {
            high_freq: -400.0,
            ..FeatureConfig::default()
        };
        assert_eq!(f.resolved_high_freq(16000), 7600.0);
        assert_eq!(FeatureConfig::default().resolved_high_freq(16000), 8000.0);
    }
}
