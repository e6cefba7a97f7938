//! Acoustic feature extraction.
//!
//! Two representations are produced from a cleaned [`Waveform`]:
//!
//! - **Aggregate** ([`FeatureVector`]): MFCCs plus delta and delta-delta
//!   trajectories, summarized by per-coefficient mean (and optionally
//!   standard deviation) and L2-normalized. Dimensionality depends only on
//!   configuration, never on utterance length.
//! - **Frames** ([`FrameSequence`]): one vector per analysis window made of
//!   LPC coefficients, normalized pitch and log energy. Length grows with
//!   the utterance; used by the alignment metrics.
//!
//! MFCC front-end:
//! - Pre-emphasis 0.97
//! - Hamming window
//! - Radix-2 FFT
//! - Triangular mel filterbank, log with floor
//! - Orthonormal DCT-II

mod delta;
mod fft;
mod lpc;
mod mel;
mod mfcc;
mod pitch;

pub(crate) use fft::{fft, ifft, Complex};
pub(crate) use mel::hann_window;

use crate::config::FeatureConfig;
use crate::error::{Result, VoiceGateError};
use crate::waveform::Waveform;

/// Fixed-length acoustic fingerprint of one waveform.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector(Vec<f32>);

impl FeatureVector {
    pub fn new(values: Vec<f32>) -> Self {
        Self(values)
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn dim(&self) -> usize {
        self.0.len()
    }

    pub fn into_inner(self) -> Vec<f32> {
        self.0
    }
}

impl From<Vec<f32>> for FeatureVector {
    fn from(v: Vec<f32>) -> Self {
        Self(v)
    }
}

/// Ordered short-time feature vectors, one per analysis window.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameSequence(Vec<Vec<f32>>);

impl FrameSequence {
    pub fn new(frames: Vec<Vec<f32>>) -> Self {
        Self(frames)
    }

    pub fn frames(&self) -> &[Vec<f32>] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Which representation a metric consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureForm {
    Aggregate,
    Frames,
}

/// Features of one waveform in either representation.
#[derive(Debug, Clone, PartialEq)]
pub enum Features {
    Aggregate(FeatureVector),
    Frames(FrameSequence),
}

impl Features {
    pub fn form(&self) -> FeatureForm {
        match self {
            Self::Aggregate(_) => FeatureForm::Aggregate,
            Self::Frames(_) => FeatureForm::Frames,
        }
    }

    pub fn as_aggregate(&self) -> Option<&FeatureVector> {
        match self {
            Self::Aggregate(v) => Some(v),
            Self::Frames(_) => None,
        }
    }

    pub fn as_frames(&self) -> Option<&FrameSequence> {
        match self {
            Self::Frames(f) => Some(f),
            Self::Aggregate(_) => None,
        }
    }
}

/// L2-normalizes `v` in place, dividing by `max(norm, eps)`.
/// Uses f64 intermediate precision.
pub fn l2_normalize(v: &mut [f32], eps: f64) {
    let norm: f64 = v.iter().map(|&x| (x as f64) * (x as f64)).sum::<f64>().sqrt();
    let scale = (1.0 / norm.max(eps)) as f32;
    for x in v.iter_mut() {
        *x *= scale;
    }
}

const NORM_EPSILON: f64 = 1e-10;

/// Turns cleaned waveforms into [`Features`].
///
/// Extraction is a pure function of the samples and the configuration, so
/// one extractor can be shared across threads.
pub struct FeatureExtractor {
    cfg: FeatureConfig,
    sample_rate: u32,
    mfcc: mfcc::Mfcc,
    window: Vec<f64>,
}

impl FeatureExtractor {
    pub fn new(cfg: FeatureConfig, sample_rate: u32) -> Self {
        let mfcc = mfcc::Mfcc::new(&cfg, sample_rate);
        let window = mel::hamming_window(cfg.frame_length);
        Self {
            cfg,
            sample_rate,
            mfcc,
            window,
        }
    }

    /// Length of every aggregate vector.
    pub fn aggregate_dim(&self) -> usize {
        let streams = if self.cfg.include_std { 6 } else { 3 };
        self.cfg.num_ceps * streams
    }

    /// Length of every frame vector: LPC coefficients, pitch, energy.
    pub fn frame_dim(&self) -> usize {
        self.cfg.lpc_order + 2
    }

    pub fn extract(&self, waveform: &Waveform, form: FeatureForm) -> Result<Features> {
        match form {
            FeatureForm::Aggregate => self.extract_aggregate(waveform).map(Features::Aggregate),
            FeatureForm::Frames => self.extract_frames(waveform).map(Features::Frames),
        }
    }

    /// Like [`FeatureExtractor::extract`] for a zero-padded waveform:
    /// aggregate statistics cover only the first `active_len` samples (at
    /// least one frame), so the padding does not enter the means.
    pub fn extract_active(
        &self,
        waveform: &Waveform,
        active_len: usize,
        form: FeatureForm,
    ) -> Result<Features> {
        match form {
            FeatureForm::Aggregate => {
                self.check(waveform)?;
                let end = active_len.clamp(self.cfg.frame_length, waveform.len());
                Ok(Features::Aggregate(self.aggregate(&waveform.samples()[..end])))
            }
            FeatureForm::Frames => self.extract_frames(waveform).map(Features::Frames),
        }
    }

    /// MFCC + delta + delta-delta summary, L2-normalized.
    pub fn extract_aggregate(&self, waveform: &Waveform) -> Result<FeatureVector> {
        self.check(waveform)?;
        Ok(self.aggregate(waveform.samples()))
    }

    fn aggregate(&self, samples: &[f32]) -> FeatureVector {
        let ceps = self.mfcc.compute(samples);
        let d1 = delta::deltas(&ceps, self.cfg.delta_width);
        let d2 = delta::deltas(&d1, self.cfg.delta_width);

        let mut out = Vec::with_capacity(self.aggregate_dim());
        let streams = [&ceps, &d1, &d2];
        for s in streams {
            out.extend(column_means(s, self.cfg.num_ceps));
        }
        if self.cfg.include_std {
            for s in streams {
                out.extend(column_stds(s, self.cfg.num_ceps));
            }
        }
        l2_normalize(&mut out, NORM_EPSILON);
        tracing::debug!(frames = ceps.len(), dim = out.len(), "aggregate features");
        FeatureVector(out)
    }

    /// Per-frame LPC, pitch and log energy.
    pub fn extract_frames(&self, waveform: &Waveform) -> Result<FrameSequence> {
        self.check(waveform)?;
        let samples = waveform.samples();
        let cfg = &self.cfg;
        let num_frames = self.mfcc.num_frames(samples.len());
        let mut frames = Vec::with_capacity(num_frames);
        let mut raw = vec![0.0f64; cfg.frame_length];
        let mut shaped = vec![0.0f64; cfg.frame_length];

        for t in 0..num_frames {
            let start = t * cfg.frame_shift;
            for (i, v) in raw.iter_mut().enumerate() {
                *v = samples[start + i] as f64;
            }
            shaped[0] = raw[0] * (1.0 - cfg.pre_emphasis) * self.window[0];
            for i in 1..cfg.frame_length {
                shaped[i] = (raw[i] - cfg.pre_emphasis * raw[i - 1]) * self.window[i];
            }

            let r = lpc::autocorrelation(&shaped, cfg.lpc_order);
            let mut v: Vec<f32> = lpc::levinson_durbin(&r, cfg.lpc_order, cfg.energy_floor)
                .into_iter()
                .map(|a| a as f32)
                .collect();

            let f0 = pitch::estimate_pitch(&raw, self.sample_rate, cfg.pitch_min_hz, cfg.pitch_max_hz);
            v.push((f0 / cfg.pitch_max_hz) as f32);

            let mean_sq = raw.iter().map(|x| x * x).sum::<f64>() / cfg.frame_length as f64;
            v.push(mean_sq.max(cfg.energy_floor).ln() as f32);
            frames.push(v);
        }
        tracing::debug!(frames = frames.len(), dim = self.frame_dim(), "frame features");
        Ok(FrameSequence(frames))
    }

    fn check(&self, waveform: &Waveform) -> Result<()> {
        waveform.check_shape(self.sample_rate)?;
        if waveform.len() < self.cfg.frame_length {
            return Err(VoiceGateError::invalid_waveform(format!(
                "{} samples is shorter than one {}-sample analysis frame",
                waveform.len(),
                self.cfg.frame_length
            )));
        }
        Ok(())
    }
}

fn column_means(frames: &[Vec<f32>], dim: usize) -> Vec<f32> {
    let n = frames.len().max(1) as f64;
    (0..dim)
        .map(|i| (frames.iter().map(|f| f[i] as f64).sum::<f64>() / n) as f32)
        .collect()
}

fn column_stds(frames: &[Vec<f32>], dim: usize) -> Vec<f32> {
    let n = frames.len().max(1) as f64;
    (0..dim)
        .map(|i| {
            let mean = frames.iter().map(|f| f[i] as f64).sum::<f64>() / n;
            let var = frames.iter().map(|f| (f[i] as f64 - mean).powi(2)).sum::<f64>() / n;
            var.sqrt() as f32
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn tone(freq: f64, secs: f64) -> Waveform {
        let n = (16000.0 * secs) as usize;
        let samples = (0..n)
            .map(|i| (2.0 * PI * freq * i as f64 / 16000.0).sin() as f32 * 0.5)
            .collect();
        Waveform::new(samples, 16000).unwrap()
    }

    #[test]
    fn aggregate_dim_is_constant() {
        let ex = FeatureExtractor::new(FeatureConfig::default(), 16000);
        for secs in [0.05, 0.3, 1.0, 2.5] {
            let v = ex.extract_aggregate(&tone(300.0, secs)).unwrap();
            assert_eq!(v.dim(), ex.aggregate_dim());
            assert_eq!(v.dim(), 78);
        }
    }

    #[test]
    fn aggregate_without_std() {
        let cfg = FeatureConfig {
            include_std: false,
            ..FeatureConfig::default()
        };
        let ex = FeatureExtractor::new(cfg, 16000);
        assert_eq!(ex.extract_aggregate(&tone(300.0, 0.5)).unwrap().dim(), 39);
    }

    #[test]
    fn aggregate_is_unit_length() {
        let ex = FeatureExtractor::new(FeatureConfig::default(), 16000);
        let v = ex.extract_aggregate(&tone(440.0, 0.5)).unwrap();
        let norm: f64 = v.as_slice().iter().map(|&x| (x as f64).powi(2)).sum::<f64>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5, "norm = {norm}");
    }

    #[test]
    fn extraction_is_deterministic() {
        let ex = FeatureExtractor::new(FeatureConfig::default(), 16000);
        let w = tone(523.0, 0.7);
        assert_eq!(ex.extract_aggregate(&w).unwrap(), ex.extract_aggregate(&w).unwrap());
        assert_eq!(ex.extract_frames(&w).unwrap(), ex.extract_frames(&w).unwrap());
    }

    #[test]
    fn frames_scale_with_duration() {
        let ex = FeatureExtractor::new(FeatureConfig::default(), 16000);
        let short = ex.extract_frames(&tone(200.0, 0.5)).unwrap();
        let long = ex.extract_frames(&tone(200.0, 1.0)).unwrap();
        assert_eq!(short.len(), 48);
        assert_eq!(long.len(), 98);
        assert!(long.frames().iter().all(|f| f.len() == ex.frame_dim()));
    }

    #[test]
    fn frame_pitch_tracks_tone() {
        let ex = FeatureExtractor::new(FeatureConfig::default(), 16000);
        let seq = ex.extract_frames(&tone(200.0, 0.5)).unwrap();
        let pitch_idx = ex.frame_dim() - 2;
        let f0 = seq.frames()[10][pitch_idx] as f64 * 400.0;
        assert!((f0 - 200.0).abs() < 5.0, "f0 = {f0}");
    }

    #[test]
    fn padding_does_not_enter_aggregate() {
        let ex = FeatureExtractor::new(FeatureConfig::default(), 16000);
        let speech = tone(300.0, 0.3);
        let mut padded = speech.samples().to_vec();
        padded.resize(16000, 0.0);
        let padded = Waveform::new(padded, 16000).unwrap();

        let got = ex.extract_active(&padded, speech.len(), FeatureForm::Aggregate).unwrap();
        let want = Features::Aggregate(ex.extract_aggregate(&speech).unwrap());
        assert_eq!(got, want);
        assert_ne!(got, Features::Aggregate(ex.extract_aggregate(&padded).unwrap()));

        // Shorter than one frame still yields one frame.
        let tiny = ex.extract_active(&padded, 10, FeatureForm::Aggregate).unwrap();
        assert_eq!(tiny.as_aggregate().unwrap().dim(), ex.aggregate_dim());
    }

    #[test]
    fn rejects_too_short() {
        let ex = FeatureExtractor::new(FeatureConfig::default(), 16000);
        let w = Waveform::new(vec![0.1; 100], 16000).unwrap();
        assert!(matches!(
            ex.extract_aggregate(&w),
            Err(VoiceGateError::InvalidWaveform { .. })
        ));
    }

    #[test]
    fn rejects_wrong_rate() {
        let ex = FeatureExtractor::new(FeatureConfig::default(), 16000);
        let w = Waveform::new(vec![0.1; 1000], 8000).unwrap();
        assert!(ex.extract_frames(&w).is_err());
    }

    #[test]
    fn l2_normalize_zero_stays_zero() {
        let mut v = vec![0.0f32; 4];
        l2_normalize(&mut v, 1e-10);
        assert_eq!(v, vec![0.0; 4]);
    }

    #[test]
    fn l2_normalize_unit() {
        let mut v = vec![3.0f32, 4.0];
        l2_normalize(&mut v, 1e-10);
        assert!((v[0] - 0.6).abs() < 1e-6 && (v[1] - 0.8).abs() < 1e-6);
    }
}
