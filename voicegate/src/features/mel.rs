//! Windows, mel scale and the triangular mel filterbank.

use std::f64::consts::PI;

pub(crate) fn hamming_window(n: usize) -> Vec<f64> {
    if n <= 1 {
        return vec![1.0; n];
    }
    (0..n)
        .map(|i| 0.54 - 0.46 * (2.0 * PI * i as f64 / (n - 1) as f64).cos())
        .collect()
}

/// Periodic Hann window; sums to a constant under 50% overlap-add.
pub(crate) fn hann_window(n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f64 / n as f64).cos())
        .collect()
}

fn hz_to_mel(hz: f64) -> f64 {
    2595.0 * (1.0 + hz / 700.0).log10()
}

fn mel_to_hz(mel: f64) -> f64 {
    700.0 * (10.0_f64.powf(mel / 2595.0) - 1.0)
}

/// Builds `[num_mels][fft_size/2 + 1]` triangular filter weights between
/// `low_freq` and `high_freq` Hz.
///
/// Filter edges are placed on fractional bin positions so narrow low
/// filters never collapse to zero width.
pub(crate) fn mel_filterbank(
    num_mels: usize,
    fft_size: usize,
    sample_rate: u32,
    low_freq: f64,
    high_freq: f64,
) -> Vec<Vec<f64>> {
    let half_fft = fft_size / 2 + 1;
    let mel_low = hz_to_mel(low_freq);
    let mel_high = hz_to_mel(high_freq);
    let bin_hz = sample_rate as f64 / fft_size as f64;

    let edges: Vec<f64> = (0..num_mels + 2)
        .map(|i| mel_to_hz(mel_low + i as f64 * (mel_high - mel_low) / (num_mels + 1) as f64))
        .collect();

    let mut bank = Vec::with_capacity(num_mels);
    for m in 0..num_mels {
        let (left, center, right) = (edges[m], edges[m + 1], edges[m + 2]);
        let filter = (0..half_fft)
            .map(|k| {
                let f = k as f64 * bin_hz;
                if f <= left || f >= right {
                    0.0
                } else if f <= center {
                    (f - left) / (center - left)
                } else {
                    (right - f) / (right - center)
                }
            })
            .collect();
        bank.push(filter);
    }
    bank
}
