//! Mel-frequency cepstral coefficients.

use std::f64::consts::PI;

use super::fft::{power_spectrum, Complex};
use super::mel::{hamming_window, mel_filterbank};
use crate::config::FeatureConfig;

/// Per-frame MFCC front-end.
///
/// Window, filterbank and DCT basis are computed once in [`Mfcc::new`];
/// [`Mfcc::compute`] is a pure function of its input.
pub(crate) struct Mfcc {
    frame_length: usize,
    frame_shift: usize,
    fft_size: usize,
    pre_emphasis: f64,
    energy_floor: f64,
    window: Vec<f64>,
    filterbank: Vec<Vec<f64>>,
    /// `[num_ceps][num_mels]` orthonormal DCT-II basis.
    dct: Vec<Vec<f64>>,
}

impl Mfcc {
    pub(crate) fn new(cfg: &FeatureConfig, sample_rate: u32) -> Self {
        let high_freq = cfg.resolved_high_freq(sample_rate);
        Self {
            frame_length: cfg.frame_length,
            frame_shift: cfg.frame_shift,
            fft_size: cfg.fft_size,
            pre_emphasis: cfg.pre_emphasis,
            energy_floor: cfg.energy_floor,
            window: hamming_window(cfg.frame_length),
            filterbank: mel_filterbank(cfg.num_mels, cfg.fft_size, sample_rate, cfg.low_freq, high_freq),
            dct: dct_basis(cfg.num_ceps, cfg.num_mels),
        }
    }

    pub(crate) fn num_frames(&self, n_samples: usize) -> usize {
        if n_samples < self.frame_length {
            0
        } else {
            (n_samples - self.frame_length) / self.frame_shift + 1
        }
    }

    /// Returns `[num_frames][num_ceps]`; empty when `samples` is shorter
    /// than one frame.
    pub(crate) fn compute(&self, samples: &[f32]) -> Vec<Vec<f32>> {
        let num_frames = self.num_frames(samples.len());
        let mut out = Vec::with_capacity(num_frames);
        let mut frame = vec![0.0f64; self.frame_length];
        let mut buf: Vec<Complex> = Vec::with_capacity(self.fft_size);
        let mut log_mel = vec![0.0f64; self.filterbank.len()];

        for t in 0..num_frames {
            let start = t * self.frame_shift;
            for i in 0..self.frame_length {
                let idx = start + i;
                let mut s = samples[idx] as f64;
                if idx > 0 {
                    s -= self.pre_emphasis * samples[idx - 1] as f64;
                }
                frame[i] = s * self.window[i];
            }

            let power = power_spectrum(&frame, self.fft_size, &mut buf);

            for (m, filter) in self.filterbank.iter().enumerate() {
                let energy: f64 = filter.iter().zip(&power).map(|(w, p)| w * p).sum();
                log_mel[m] = energy.max(self.energy_floor).ln();
            }

            let ceps = self
                .dct
                .iter()
                .map(|basis| basis.iter().zip(&log_mel).map(|(b, e)| b * e).sum::<f64>() as f32)
                .collect();
            out.push(ceps);
        }
        out
    }
}

fn dct_basis(num_ceps: usize, num_mels: usize) -> Vec<Vec<f64>> {
    let m = num_mels as f64;
    (0..num_ceps)
        .map(|k| {
            let scale = if k == 0 { (1.0 / m).sqrt() } else { (2.0 / m).sqrt() };
            (0..num_mels)
                .map(|n| scale * (PI * k as f64 * (n as f64 + 0.5) / m).cos())
                .collect()
        })
        .collect()
}
