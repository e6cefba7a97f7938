/// Normalized autocorrelation peak below which a frame counts as unvoiced.
const VOICING_THRESHOLD: f64 = 0.3;

/// Estimates the fundamental frequency of `frame` in Hz.
///
/// Searches lags corresponding to `[min_hz, max_hz]` for the maximum of the
/// normalized autocorrelation. Returns 0 for silent or unvoiced frames.
pub(crate) fn estimate_pitch(frame: &[f64], sample_rate: u32, min_hz: f64, max_hz: f64) -> f64 {
    let n = frame.len();
    let rate = sample_rate as f64;
    let min_lag = ((rate / max_hz).floor() as usize).max(1);
    let max_lag = ((rate / min_hz).ceil() as usize).min(n.saturating_sub(1));
    if min_lag >= max_lag {
        return 0.0;
    }

    let mean = frame.iter().sum::<f64>() / n as f64;
    let x: Vec<f64> = frame.iter().map(|v| v - mean).collect();
    let energy: f64 = x.iter().map(|v| v * v).sum();
    if energy <= 1e-12 {
        return 0.0;
    }

    let mut best_lag = 0;
    let mut best = 0.0f64;
    for lag in min_lag..=max_lag {
        let head = &x[..n - lag];
        let tail = &x[lag..];
        let num: f64 = head.iter().zip(tail).map(|(a, b)| a * b).sum();
        let e0: f64 = head.iter().map(|v| v * v).sum();
        let e1: f64 = tail.iter().map(|v| v * v).sum();
        let denom = (e0 * e1).sqrt();
        if denom <= 0.0 {
            continue;
        }
        let c = num / denom;
        // Strict margin keeps the shortest lag when multiples of the period tie.
        if c > best + 1e-9 {
            best = c;
            best_lag = lag;
        }
    }

    if best_lag == 0 || best < VOICING_THRESHOLD {
        return 0.0;
    }
    rate / best_lag as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn finds_tone_frequency() {
        let rate = 16000;
        let frame: Vec<f64> = (0..640)
            .map(|i| (2.0 * PI * 200.0 * i as f64 / rate as f64).sin())
            .collect();
        let f0 = estimate_pitch(&frame, rate, 60.0, 400.0);
        assert!((f0 - 200.0).abs() < 5.0, "f0 = {f0}");
    }

    #[test]
    fn silence_is_unvoiced() {
        assert_eq!(estimate_pitch(&[0.0; 400], 16000, 60.0, 400.0), 0.0);
    }

    #[test]
    fn noise_is_mostly_unvoiced() {
        // Deterministic pseudo-noise with no periodicity in range.
        let mut state = 12345u64;
        let frame: Vec<f64> = (0..400)
            .map(|_| {
                state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
                ((state >> 33) as f64 / (1u64 << 31) as f64) - 0.5
            })
            .collect();
        let f0 = estimate_pitch(&frame, 16000, 60.0, 400.0);
        assert!(f0 == 0.0 || (60.0..=400.0).contains(&f0));
    }
}
