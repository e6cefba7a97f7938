//! Waveform cleaning ahead of feature extraction.
//!
//! Enrollment and verification audio go through the same [`Preprocessor`],
//! so their features are comparable. Steps, in order:
//!
//! 1. Shape check (rate, finiteness)
//! 2. Silence trim by frame RMS relative to the loudest frame
//! 3. Minimum-length check
//! 4. Amplitude normalization
//! 5. Optional noise suppression ([`NoiseSuppressor`])
//! 6. Optional pad/truncate to a fixed length; [`Cleaned::active_len`]
//!    marks where the padding starts

use tracing::debug;

use crate::config::{NoiseSuppressionConfig, Normalization, PreprocessConfig};
use crate::error::{Result, VoiceGateError};
use crate::features::{fft, hann_window, ifft, Complex};
use crate::waveform::{self, Waveform};

/// Removes stationary background noise from a waveform.
pub trait NoiseSuppressor: Send + Sync {
    fn suppress(&self, samples: &[f32], sample_rate: u32) -> Vec<f32>;
}

/// Output of [`Preprocessor::clean`].
#[derive(Debug, Clone, PartialEq)]
pub struct Cleaned {
    pub waveform: Waveform,
    /// Leading samples that carry signal; the rest is zero padding.
    pub active_len: usize,
}

/// Cleans raw waveforms.
pub struct Preprocessor {
    cfg: PreprocessConfig,
    sample_rate: u32,
    fixed_len: Option<usize>,
    suppressor: Option<Box<dyn NoiseSuppressor>>,
}

impl Preprocessor {
    /// `fixed_length` enables the pad/truncate step; it is turned off for
    /// metrics that align sequences of different length.
    pub fn new(cfg: PreprocessConfig, sample_rate: u32, fixed_length: bool) -> Self {
        let fixed_len = cfg
            .fixed_duration_secs
            .filter(|_| fixed_length)
            .map(|secs| (secs * sample_rate as f32).round() as usize);
        let suppressor: Option<Box<dyn NoiseSuppressor>> = if cfg.noise_suppression.enabled {
            Some(Box::new(SpectralGate::new(cfg.noise_suppression.clone())))
        } else {
            None
        };
        Self {
            cfg,
            sample_rate,
            fixed_len,
            suppressor,
        }
    }

    /// Replaces the noise suppression step.
    pub fn with_suppressor(mut self, suppressor: Box<dyn NoiseSuppressor>) -> Self {
        self.suppressor = Some(suppressor);
        self
    }

    pub fn fixed_len(&self) -> Option<usize> {
        self.fixed_len
    }

    /// Runs every step on `input`.
    ///
    /// Silent or too-short input yields
    /// [`VoiceGateError::PreprocessingRejected`] instead of a degenerate
    /// waveform.
    pub fn process(&self, input: &Waveform) -> Result<Waveform> {
        self.clean(input).map(|c| c.waveform)
    }

    /// Like [`Preprocessor::process`], also reporting where the signal ends
    /// and the fixed-length padding begins.
    pub fn clean(&self, input: &Waveform) -> Result<Cleaned> {
        input.check_shape(self.sample_rate)?;
        let cfg = &self.cfg;

        if input.peak() <= cfg.silence_floor {
            return Err(VoiceGateError::PreprocessingRejected {
                remaining: 0,
                min_samples: cfg.min_samples,
            });
        }

        let samples = input.samples();
        let (start, end) = if cfg.trim_enabled {
            trim_bounds(samples, cfg.trim_frame_length, cfg.trim_hop, cfg.trim_top_db)
        } else {
            (0, samples.len())
        };
        let trimmed = &samples[start..end];
        if trimmed.len() < cfg.min_samples {
            return Err(VoiceGateError::PreprocessingRejected {
                remaining: trimmed.len(),
                min_samples: cfg.min_samples,
            });
        }

        let mut out = normalize(trimmed, cfg.normalization);
        if let Some(s) = &self.suppressor {
            out = s.suppress(&out, self.sample_rate);
        }
        let mut active_len = out.len();
        if let Some(n) = self.fixed_len {
            out.resize(n, 0.0);
            active_len = active_len.min(n);
        }

        debug!(
            input = samples.len(),
            trimmed_start = start,
            trimmed_end = end,
            active = active_len,
            output = out.len(),
            "preprocessed"
        );
        Ok(Cleaned {
            waveform: Waveform::new(out, self.sample_rate)?,
            active_len,
        })
    }
}

/// Returns `[start, end)` covering every frame within `top_db` of the
/// loudest frame.
///
/// Frames are centered at multiples of `hop` and zero-padded at the edges;
/// frame RMS is compared in dB against the maximum frame RMS.
pub fn trim_bounds(samples: &[f32], frame_length: usize, hop: usize, top_db: f32) -> (usize, usize) {
    let n = samples.len();
    if n == 0 {
        return (0, 0);
    }
    let half = frame_length / 2;
    let num_frames = 1 + n / hop;
    let rms: Vec<f64> = (0..num_frames)
        .map(|i| {
            let center = i * hop;
            let lo = center.saturating_sub(half);
            let hi = (center + frame_length - half).min(n);
            let sum: f64 = samples[lo.min(n)..hi].iter().map(|&x| (x as f64).powi(2)).sum();
            (sum / frame_length as f64).sqrt()
        })
        .collect();

    let max = rms.iter().copied().fold(0.0f64, f64::max);
    if max <= 0.0 {
        return (0, 0);
    }
    let floor = max * 10f64.powf(-(top_db as f64) / 20.0);
    let first = rms.iter().position(|&r| r > floor);
    let last = rms.iter().rposition(|&r| r > floor);
    match (first, last) {
        (Some(f), Some(l)) => (f * hop, ((l + 1) * hop).min(n)),
        _ => (0, 0),
    }
}

fn normalize(samples: &[f32], rule: Normalization) -> Vec<f32> {
    let scale = match rule {
        Normalization::Peak => waveform::peak(samples),
        Normalization::Rms => waveform::rms(samples),
        Normalization::None => 1.0,
    };
    if scale > 0.0 {
        samples.iter().map(|&x| x / scale).collect()
    } else {
        samples.to_vec()
    }
}

/// Per-bin spectral gate.
///
/// The noise floor of each frequency bin is estimated as a low quantile of
/// its magnitudes over the whole utterance, then subtracted (scaled by
/// `reduction`) from every frame. Gains never drop below `floor`.
/// Analysis uses a periodic Hann window at 50% overlap, which sums to one,
/// so a unity gain reconstructs the input.
pub struct SpectralGate {
    cfg: NoiseSuppressionConfig,
    window: Vec<f64>,
}

impl SpectralGate {
    pub fn new(cfg: NoiseSuppressionConfig) -> Self {
        let window = hann_window(cfg.fft_size);
        Self { cfg, window }
    }
}

impl NoiseSuppressor for SpectralGate {
    fn suppress(&self, samples: &[f32], _sample_rate: u32) -> Vec<f32> {
        let size = self.cfg.fft_size;
        let hop = size / 2;
        let len = samples.len();

        // Half a window of padding on each side so every sample is covered
        // by two frames.
        let padded_len = (len + size).div_ceil(hop) * hop + hop;
        let mut padded = vec![0.0f64; padded_len];
        for (i, &x) in samples.iter().enumerate() {
            padded[hop + i] = x as f64;
        }
        let num_frames = (padded_len - size) / hop + 1;

        let mut spectra: Vec<Vec<Complex>> = Vec::with_capacity(num_frames);
        for t in 0..num_frames {
            let start = t * hop;
            let mut buf: Vec<Complex> = (0..size)
                .map(|i| (padded[start + i] * self.window[i], 0.0))
                .collect();
            fft(&mut buf);
            spectra.push(buf);
        }

        let noise: Vec<f64> = (0..size)
            .map(|k| {
                let mut mags: Vec<f64> = spectra.iter().map(|s| magnitude(s[k])).collect();
                quantile(&mut mags, self.cfg.noise_quantile as f64)
            })
            .collect();

        let reduction = self.cfg.reduction as f64;
        let floor = self.cfg.floor as f64;
        let mut out = vec![0.0f64; padded_len];
        for (t, spec) in spectra.iter_mut().enumerate() {
            for (k, bin) in spec.iter_mut().enumerate() {
                let mag = magnitude(*bin);
                let gain = if mag > 0.0 {
                    (1.0 - reduction * noise[k] / mag).max(floor)
                } else {
                    floor
                };
                bin.0 *= gain;
                bin.1 *= gain;
            }
            ifft(spec);
            let start = t * hop;
            for (i, &(re, _)) in spec.iter().enumerate() {
                out[start + i] += re;
            }
        }

        out[hop..hop + len].iter().map(|&x| x as f32).collect()
    }
}

fn magnitude((re, im): Complex) -> f64 {
    (re * re + im * im).sqrt()
}

fn quantile(values: &mut [f64], q: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let idx = (q.clamp(0.0, 1.0) * (values.len() - 1) as f64).round() as usize;
    values[idx]
}
