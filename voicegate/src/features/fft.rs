//! Radix-2 FFT over `(re, im)` tuples.

use std::f64::consts::PI;

/// Complex sample as `(real, imag)`.
pub(crate) type Complex = (f64, f64);

/// In-place forward FFT. `x.len()` must be a power of two.
pub(crate) fn fft(x: &mut [Complex]) {
    transform(x, -1.0);
}

/// In-place inverse FFT, scaled by `1/N` so `ifft(fft(x)) == x`.
pub(crate) fn ifft(x: &mut [Complex]) {
    transform(x, 1.0);
    let n = x.len() as f64;
    for v in x.iter_mut() {
        v.0 /= n;
        v.1 /= n;
    }
}

fn transform(x: &mut [Complex], sign: f64) {
    let n = x.len();
    if n <= 1 {
        return;
    }
    debug_assert!(n.is_power_of_two(), "fft length {n} is not a power of two");

    let mut j = 0usize;
    for i in 1..n {
        let mut bit = n >> 1;
        while j & bit != 0 {
            j ^= bit;
            bit >>= 1;
        }
        j ^= bit;
        if i < j {
            x.swap(i, j);
        }
    }

    let mut len = 2;
    while len <= n {
        let half = len / 2;
        let theta = sign * 2.0 * PI / len as f64;
        let step = (theta.cos(), theta.sin());
        for start in (0..n).step_by(len) {
            let mut w = (1.0, 0.0);
            for k in 0..half {
                let a = x[start + k];
                let b = x[start + k + half];
                let t = (w.0 * b.0 - w.1 * b.1, w.0 * b.1 + w.1 * b.0);
                x[start + k] = (a.0 + t.0, a.1 + t.1);
                x[start + k + half] = (a.0 - t.0, a.1 - t.1);
                w = (w.0 * step.0 - w.1 * step.1, w.0 * step.1 + w.1 * step.0);
            }
        }
        len <<= 1;
    }
}

/// Zero-pads `frame` to `fft_size`, transforms it and returns the one-sided
/// power spectrum `|X[k]|^2` for `k in 0..=fft_size/2`.
pub(crate) fn power_spectrum(frame: &[f64], fft_size: usize, buf: &mut Vec<Complex>) -> Vec<f64> {
    buf.clear();
    buf.extend(frame.iter().take(fft_size).map(|&s| (s, 0.0)));
    buf.resize(fft_size, (0.0, 0.0));
    fft(buf);
    buf[..fft_size / 2 + 1]
        .iter()
        .map(|&(re, im)| re * re + im * im)
        .collect()
}
