/// Biased autocorrelation `r[k] = sum x[n] x[n+k]` for `k in 0..=max_lag`.
pub(crate) fn autocorrelation(x: &[f64], max_lag: usize) -> Vec<f64> {
    (0..=max_lag)
        .map(|k| {
            if k >= x.len() {
                0.0
            } else {
                x[..x.len() - k].iter().zip(&x[k..]).map(|(a, b)| a * b).sum()
            }
        })
        .collect()
}

/// Solves for `order` linear-prediction coefficients with Levinson-Durbin.
///
/// Returns `a[1..=order]` of the predictor `x[n] ~ -sum a[k] x[n-k]`.
/// A silent frame (`r[0]` at or below `floor`) yields all zeros.
pub(crate) fn levinson_durbin(r: &[f64], order: usize, floor: f64) -> Vec<f64> {
    let mut a = vec![0.0f64; order + 1];
    if r.len() <= order || r[0] <= floor {
        return vec![0.0; order];
    }
    a[0] = 1.0;
    let mut err = r[0];
    let mut prev = vec![0.0f64; order + 1];

    for i in 1..=order {
        let mut acc = r[i];
        for j in 1..i {
            acc += a[j] * r[i - j];
        }
        let k = -acc / err;
        prev[..i].copy_from_slice(&a[..i]);
        for j in 1..i {
            a[j] = prev[j] + k * prev[i - j];
        }
        a[i] = k;
        err *= 1.0 - k * k;
        if err <= floor {
            break;
        }
    }
    a[1..].to_vec()
}
