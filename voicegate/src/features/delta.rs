/// Regression deltas of a `[frames][coeffs]` trajectory.
///
/// `d[t] = sum_{n=1..=width} n * (c[t+n] - c[t-n]) / (2 * sum n^2)`, with
/// out-of-range frames replaced by the nearest edge frame.
pub(crate) fn deltas(frames: &[Vec<f32>], width: usize) -> Vec<Vec<f32>> {
    let t_len = frames.len();
    if t_len == 0 || width == 0 {
        return frames.iter().map(|f| vec![0.0; f.len()]).collect();
    }
    let dim = frames[0].len();
    let denom: f32 = 2.0 * (1..=width).map(|n| (n * n) as f32).sum::<f32>();

    let mut out = Vec::with_capacity(t_len);
    for t in 0..t_len {
        let mut d = vec![0.0f32; dim];
        for n in 1..=width {
            let next = &frames[(t + n).min(t_len - 1)];
            let prev = &frames[t.saturating_sub(n)];
            for (i, v) in d.iter_mut().enumerate() {
                *v += n as f32 * (next[i] - prev[i]);
            }
        }
        for v in d.iter_mut() {
            *v /= denom;
        }
        out.push(d);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linear_ramp_has_unit_slope_inside() {
        let frames: Vec<Vec<f32>> = (0..10).map(|t| vec![t as f32, 2.0 * t as f32]).collect();
        let d = deltas(&frames, 2);
        for t in 2..8 {
            assert!((d[t][0] - 1.0).abs() < 1e-6, "t={t} got {}", d[t][0]);
            assert!((d[t][1] - 2.0).abs() < 1e-6);
        }
    }

    #[test]
    fn constant_has_zero_delta() {
        let frames = vec![vec![3.0f32; 4]; 6];
        let d = deltas(&frames, 2);
        assert!(d.iter().flatten().all(|&v| v == 0.0));
    }

    #[test]
    fn single_frame() {
        let d = deltas(&[vec![1.0, 2.0]], 2);
        assert_eq!(d, vec![vec![0.0, 0.0]]);
    }
}
