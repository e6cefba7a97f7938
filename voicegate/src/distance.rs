//! Dissimilarity between two feature representations.
//!
//! | metric               | input            | range    |
//! |----------------------|------------------|----------|
//! | `cosine_aggregate`   | aggregate vector | [0, 2]   |
//! | `euclidean_aggregate`| aggregate vector | [0, inf) |
//! | `dtw_sequence`       | frame sequence   | [0, inf) |
//! | `frame_correlation`  | frame sequence   | [0, 2]   |
//!
//! Smaller is always more similar. No metric divides by a zero norm: a
//! zero vector scores cosine similarity 0 against anything.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::DistanceConfig;
use crate::error::{Result, VoiceGateError};
use crate::features::{FeatureForm, Features};

/// Selects the distance function and the feature form it consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    /// `1 - cos(angle)` between aggregate vectors.
    #[default]
    CosineAggregate,
    /// L2 norm of the difference between aggregate vectors.
    EuclideanAggregate,
    /// Dynamic time warping over frame sequences with Euclidean frame cost.
    DtwSequence,
    /// `1 - mean per-frame cosine similarity` of time-aligned sequences.
    FrameCorrelation,
}

impl Metric {
    pub fn form(self) -> FeatureForm {
        match self {
            Self::CosineAggregate | Self::EuclideanAggregate => FeatureForm::Aggregate,
            Self::DtwSequence | Self::FrameCorrelation => FeatureForm::Frames,
        }
    }

    /// Whether waveforms are padded/truncated to a fixed length first.
    /// Only warping tolerates differing lengths.
    pub fn wants_fixed_length(self) -> bool {
        self != Self::DtwSequence
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::CosineAggregate => "cosine_aggregate",
            Self::EuclideanAggregate => "euclidean_aggregate",
            Self::DtwSequence => "dtw_sequence",
            Self::FrameCorrelation => "frame_correlation",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Computes distances under one configured [`Metric`].
#[derive(Debug, Clone)]
pub struct DistanceEngine {
    metric: Metric,
    band: Option<usize>,
}

impl DistanceEngine {
    pub fn new(cfg: &DistanceConfig) -> Self {
        Self {
            metric: cfg.metric,
            band: cfg.dtw_band,
        }
    }

    pub fn with_metric(metric: Metric) -> Self {
        Self { metric, band: None }
    }

    pub fn metric(&self) -> Metric {
        self.metric
    }

    /// Distance between two feature values of the metric's form.
    ///
    /// Fails with `FormMismatch` when either input has the wrong form and
    /// with `DimensionMismatch` when vector or frame lengths disagree.
    pub fn distance(&self, a: &Features, b: &Features) -> Result<f32> {
        let mismatch = || VoiceGateError::FormMismatch {
            metric: self.metric.to_string(),
        };
        match self.metric.form() {
            FeatureForm::Aggregate => {
                let (a, b) = (
                    a.as_aggregate().ok_or_else(mismatch)?,
                    b.as_aggregate().ok_or_else(mismatch)?,
                );
                check_dim(a.dim(), b.dim())?;
                Ok(match self.metric {
                    Metric::EuclideanAggregate => euclidean_distance(a.as_slice(), b.as_slice()),
                    _ => cosine_distance(a.as_slice(), b.as_slice()),
                })
            }
            FeatureForm::Frames => {
                let (a, b) = (
                    a.as_frames().ok_or_else(mismatch)?,
                    b.as_frames().ok_or_else(mismatch)?,
                );
                if a.is_empty() || b.is_empty() {
                    return Err(VoiceGateError::invalid_waveform("empty frame sequence"));
                }
                let dim = a.frames()[0].len();
                for f in a.frames().iter().chain(b.frames()) {
                    check_dim(dim, f.len())?;
                }
                Ok(match self.metric {
                    Metric::DtwSequence => dtw_distance(a.frames(), b.frames(), self.band),
                    _ => 1.0 - frame_correlation(a.frames(), b.frames()),
                })
            }
        }
    }
}

fn check_dim(expected: usize, got: usize) -> Result<()> {
    if expected != got {
        return Err(VoiceGateError::DimensionMismatch { expected, got });
    }
    Ok(())
}

/// Cosine similarity in [-1, 1]; 0 when either vector has zero norm.
/// Uses f64 intermediate precision.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (&x, &y) in a.iter().zip(b) {
        let (x, y) = (x as f64, y as f64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a.sqrt() * norm_b.sqrt())).clamp(-1.0, 1.0) as f32
}

/// `1 - cosine_similarity`, in [0, 2]. For L2-normalized inputs this is
/// `1 - dot(a, b)`. A zero vector scores 1 (orthogonal) against anything.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    1.0 - cosine_similarity(a, b)
}

pub fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(&x, &y)| {
            let d = x as f64 - y as f64;
            d * d
        })
        .sum::<f64>()
        .sqrt() as f32
}

/// Total cost of the cheapest monotonic alignment between `a` and `b`
/// under Euclidean frame cost.
///
/// `band` is a Sakoe-Chiba half-width; it is widened to the length
/// difference so the end cell stays reachable. Returns infinity when either
/// sequence is empty.
pub fn dtw_distance(a: &[Vec<f32>], b: &[Vec<f32>], band: Option<usize>) -> f32 {
    let (rows, cols) = (a.len(), b.len());
    if rows == 0 || cols == 0 {
        return f32::INFINITY;
    }
    let w = band.map_or(usize::MAX, |w| w.max(rows.abs_diff(cols)));

    // Two rolling rows of the accumulated cost matrix.
    let mut prev = vec![f64::INFINITY; cols];
    let mut cur = vec![f64::INFINITY; cols];

    for r in 0..rows {
        cur.fill(f64::INFINITY);
        let start = r.saturating_sub(w);
        let end = r.saturating_add(w).min(cols - 1);
        for c in start..=end {
            let d = euclidean_distance(&a[r], &b[c]) as f64;
            let best_prev = match (r, c) {
                (0, 0) => 0.0,
                (0, _) => cur[c - 1],
                (_, 0) => prev[0],
                _ => prev[c].min(cur[c - 1]).min(prev[c - 1]),
            };
            cur[c] = d + best_prev;
        }
        std::mem::swap(&mut prev, &mut cur);
    }
    prev[cols - 1] as f32
}

/// Mean per-frame cosine similarity of two time-aligned sequences.
///
/// Frames are paired by index without warping. When lengths differ, the
/// unpaired frames of the longer sequence count as correlation 0, so the
/// mean is taken over the longer length. Zero-norm frames also score 0.
pub fn frame_correlation(a: &[Vec<f32>], b: &[Vec<f32>]) -> f32 {
    let n = a.len().max(b.len());
    if n == 0 {
        return 0.0;
    }
    let sum: f64 = a
        .iter()
        .zip(b)
        .map(|(x, y)| cosine_similarity(x, y) as f64)
        .sum();
    (sum / n as f64) as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::{FeatureVector, FrameSequence};

    #[test]
    fn cosine_identical_is_zero() {
        let v = [0.6f32, 0.8, 0.0];
        assert!(cosine_distance(&v, &v).abs() < 1e-6);
    }

    #[test]
    fn cosine_orthogonal_and_opposite() {
        assert!((cosine_distance(&[1.0, 0.0], &[0.0, 1.0]) - 1.0).abs() < 1e-6);
        assert!((cosine_distance(&[1.0, 0.0], &[-1.0, 0.0]) - 2.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_is_symmetric() {
        let a = [0.3f32, -0.2, 0.9, 0.1];
        let b = [-0.5f32, 0.4, 0.2, 0.7];
        assert_eq!(cosine_distance(&a, &b), cosine_distance(&b, &a));
    }

    #[test]
    fn cosine_zero_vector_is_indifferent() {
        assert_eq!(cosine_distance(&[0.0, 0.0], &[1.0, 0.0]), 1.0);
        assert!(!cosine_distance(&[0.0, 0.0], &[0.0, 0.0]).is_nan());
    }

    #[test]
    fn euclidean_basic() {
        assert!((euclidean_distance(&[0.0, 0.0], &[3.0, 4.0]) - 5.0).abs() < 1e-6);
        assert_eq!(euclidean_distance(&[1.0, 2.0], &[1.0, 2.0]), 0.0);
    }

    fn seq(values: &[f32]) -> Vec<Vec<f32>> {
        values.iter().map(|&v| vec![v]).collect()
    }

    #[test]
    fn dtw_self_is_zero() {
        let a = seq(&[0.0, 1.0, 2.0, 1.0, 0.0]);
        assert_eq!(dtw_distance(&a, &a, None), 0.0);
        assert_eq!(dtw_distance(&a, &a, Some(1)), 0.0);
    }

    #[test]
    fn dtw_absorbs_time_stretch() {
        let a = seq(&[0.0, 1.0, 1.0, 2.0, 3.0]);
        let b = seq(&[0.0, 1.0, 2.0, 2.0, 2.0, 3.0]);
        assert!(dtw_distance(&a, &b, None) < 1e-6);
    }

    #[test]
    fn dtw_known_cost() {
        // Best path pairs (0,0) (1,1) (2,2): |1-2| + |2-2| + |3-3| = 1
        let a = seq(&[1.0, 2.0, 3.0]);
        let b = seq(&[2.0, 2.0, 3.0]);
        assert!((dtw_distance(&a, &b, None) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn dtw_non_negative_and_symmetric() {
        let a = seq(&[0.5, -1.0, 2.0, 0.0]);
        let b = seq(&[1.0, 1.5, -0.5]);
        let ab = dtw_distance(&a, &b, None);
        let ba = dtw_distance(&b, &a, None);
        assert!(ab >= 0.0);
        assert!((ab - ba).abs() < 1e-6);
    }

    #[test]
    fn dtw_narrow_band_still_reaches_end() {
        let a = seq(&[0.0; 10]);
        let b = seq(&[0.0; 3]);
        assert_eq!(dtw_distance(&a, &b, Some(1)), 0.0);
    }

    #[test]
    fn dtw_band_never_beats_unconstrained() {
        let a: Vec<Vec<f32>> = (0..30).map(|i| vec![(i as f32 * 0.3).sin()]).collect();
        let b: Vec<Vec<f32>> = (0..25).map(|i| vec![(i as f32 * 0.4).cos()]).collect();
        assert!(dtw_distance(&a, &b, Some(3)) >= dtw_distance(&a, &b, None));
    }

    #[test]
    fn dtw_empty_is_infinite() {
        assert!(dtw_distance(&[], &seq(&[1.0]), None).is_infinite());
    }

    #[test]
    fn frame_correlation_zero_frames() {
        let a = vec![vec![1.0, 0.0], vec![0.0, 0.0]];
        let b = vec![vec![1.0, 0.0], vec![1.0, 1.0]];
        // Frame 0 correlates 1, frame 1 has a zero-norm side and scores 0.
        assert!((frame_correlation(&a, &b) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn frame_correlation_length_mismatch_penalized() {
        let a = vec![vec![1.0, 1.0]; 4];
        let b = vec![vec![1.0, 1.0]; 2];
        assert!((frame_correlation(&a, &b) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn engine_rejects_wrong_form() {
        let engine = DistanceEngine::with_metric(Metric::DtwSequence);
        let v = Features::Aggregate(FeatureVector::new(vec![1.0]));
        assert!(matches!(
            engine.distance(&v, &v),
            Err(VoiceGateError::FormMismatch { .. })
        ));
    }

    #[test]
    fn engine_rejects_dimension_mismatch() {
        let engine = DistanceEngine::with_metric(Metric::CosineAggregate);
        let a = Features::Aggregate(FeatureVector::new(vec![1.0, 0.0]));
        let b = Features::Aggregate(FeatureVector::new(vec![1.0, 0.0, 0.0]));
        assert!(matches!(
            engine.distance(&a, &b),
            Err(VoiceGateError::DimensionMismatch { expected: 2, got: 3 })
        ));
    }

    #[test]
    fn engine_frame_correlation() {
        let engine = DistanceEngine::with_metric(Metric::FrameCorrelation);
        let a = Features::Frames(FrameSequence::new(vec![vec![1.0, 0.0], vec![0.0, 1.0]]));
        assert!(engine.distance(&a, &a).unwrap().abs() < 1e-6);
    }

    #[test]
    fn metric_serde_names() {
        let m: Metric = serde_yaml::from_str("frame_correlation").unwrap();
        assert_eq!(m, Metric::FrameCorrelation);
        assert_eq!(Metric::DtwSequence.to_string(), "dtw_sequence");
        assert!(!Metric::DtwSequence.wants_fixed_length());
    }
}
