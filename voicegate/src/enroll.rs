//! Per-label enrollment models.
//!
//! A model summarizes every reference of one label:
//!
//! - aggregate metrics: the centroid (element-wise mean) of the reference
//!   vectors, and the spread (mean reference-to-centroid distance);
//! - sequence metrics: the medoid reference as representative, the spread
//!   is the mean reference-to-medoid distance, and queries are scored
//!   against the nearest reference.
//!
//! Models are derived state: rebuild them whenever references change.

use std::fmt;

#[cfg(feature = "parallel")]
use rayon::prelude::*;
use tracing::{debug, warn};

use crate::distance::DistanceEngine;
use crate::error::{Result, VoiceGateError};
use crate::features::{FeatureExtractor, FeatureForm, FeatureVector, Features};
use crate::preprocess::Preprocessor;
use crate::waveform::Waveform;

/// Summary of one label's references.
#[derive(Clone)]
pub struct EnrollmentModel {
    label: String,
    references: Vec<Features>,
    representative: Features,
    spread: f32,
}

impl fmt::Debug for EnrollmentModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnrollmentModel")
            .field("label", &self.label)
            .field("references", &self.references.len())
            .field("form", &self.representative.form())
            .field("spread", &self.spread)
            .finish()
    }
}

impl EnrollmentModel {
    /// Builds a model from already-extracted reference features.
    ///
    /// All references must have the metric's form and, for aggregate
    /// vectors, the same dimension.
    pub fn from_features(
        label: impl Into<String>,
        references: Vec<Features>,
        engine: &DistanceEngine,
    ) -> Result<Self> {
        let label = label.into();
        if references.is_empty() {
            return Err(VoiceGateError::InsufficientSamples { label });
        }
        let form = engine.metric().form();
        if references.iter().any(|f| f.form() != form) {
            return Err(VoiceGateError::FormMismatch {
                metric: engine.metric().to_string(),
            });
        }

        let representative = match form {
            FeatureForm::Aggregate => Features::Aggregate(centroid(&references)?),
            FeatureForm::Frames => references[medoid(&references, engine)?].clone(),
        };
        let spread = mean_distance(&references, &representative, engine)?;
        debug!(label = %label, references = references.len(), spread, "model built");

        Ok(Self {
            label,
            references,
            representative,
            spread,
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn references(&self) -> &[Features] {
        &self.references
    }

    /// Centroid for aggregate models, `None` for sequence models.
    pub fn centroid(&self) -> Option<&FeatureVector> {
        self.representative.as_aggregate()
    }

    /// Centroid or medoid.
    pub fn representative(&self) -> &Features {
        &self.representative
    }

    /// Mean intra-class distance.
    pub fn spread(&self) -> f32 {
        self.spread
    }

    /// Query-to-model distance: to the centroid for aggregate metrics, to
    /// the nearest reference for sequence metrics.
    pub fn distance_to(&self, query: &Features, engine: &DistanceEngine) -> Result<f32> {
        match self.representative.form() {
            FeatureForm::Aggregate => engine.distance(query, &self.representative),
            FeatureForm::Frames => self
                .references
                .iter()
                .map(|r| engine.distance(query, r))
                .try_fold(f32::INFINITY, |best, d| d.map(|d| best.min(d))),
        }
    }
}

/// Command models plus the owner model, rebuilt per verification.
#[derive(Debug, Clone)]
pub struct ModelSet {
    pub commands: Vec<EnrollmentModel>,
    pub owner: EnrollmentModel,
}

impl ModelSet {
    pub fn command(&self, label: &str) -> Option<&EnrollmentModel> {
        self.commands.iter().find(|m| m.label == label)
    }

    pub fn command_labels(&self) -> impl Iterator<Item = &str> {
        self.commands.iter().map(|m| m.label.as_str())
    }
}

/// Turns raw reference waveforms into models with the same preprocessing
/// and extraction used for queries.
pub struct ModelBuilder<'a> {
    preprocessor: &'a Preprocessor,
    extractor: &'a FeatureExtractor,
    engine: &'a DistanceEngine,
}

impl<'a> ModelBuilder<'a> {
    pub fn new(
        preprocessor: &'a Preprocessor,
        extractor: &'a FeatureExtractor,
        engine: &'a DistanceEngine,
    ) -> Self {
        Self {
            preprocessor,
            extractor,
            engine,
        }
    }

    /// Builds the model for `label`.
    ///
    /// References the preprocessor rejects as silent or too short are
    /// skipped with a warning; other errors abort. Fails with
    /// [`VoiceGateError::InsufficientSamples`] if nothing usable remains.
    pub fn build(&self, label: &str, waveforms: &[Waveform]) -> Result<EnrollmentModel> {
        let form = self.engine.metric().form();
        let analyze = |w: &Waveform| -> Result<Features> {
            let clean = self.preprocessor.clean(w)?;
            self.extractor.extract_active(&clean.waveform, clean.active_len, form)
        };

        #[cfg(feature = "parallel")]
        let results: Vec<Result<Features>> = waveforms.par_iter().map(analyze).collect();
        #[cfg(not(feature = "parallel"))]
        let results: Vec<Result<Features>> = waveforms.iter().map(analyze).collect();

        let mut references = Vec::with_capacity(results.len());
        for (i, r) in results.into_iter().enumerate() {
            match r {
                Ok(f) => references.push(f),
                Err(e @ VoiceGateError::PreprocessingRejected { .. }) => {
                    warn!(label, index = i, error = %e, "skipping unusable reference");
                }
                Err(e) => return Err(e),
            }
        }
        EnrollmentModel::from_features(label, references, self.engine)
    }
}

/// Element-wise mean, accumulated in f64.
fn centroid(references: &[Features]) -> Result<FeatureVector> {
    let vectors: Vec<&[f32]> = references
        .iter()
        .filter_map(|f| f.as_aggregate().map(FeatureVector::as_slice))
        .collect();
    let dim = vectors.first().map_or(0, |v| v.len());
    let mut sum = vec![0.0f64; dim];
    for v in &vectors {
        if v.len() != dim {
            return Err(VoiceGateError::DimensionMismatch {
                expected: dim,
                got: v.len(),
            });
        }
        for (s, &x) in sum.iter_mut().zip(v.iter()) {
            *s += x as f64;
        }
    }
    let n = vectors.len().max(1) as f64;
    Ok(FeatureVector::new(sum.into_iter().map(|s| (s / n) as f32).collect()))
}

/// Index of the reference with the smallest summed distance to the others.
/// Ties keep the earliest reference.
fn medoid(references: &[Features], engine: &DistanceEngine) -> Result<usize> {
    let n = references.len();
    let mut totals = vec![0.0f64; n];
    for i in 0..n {
        for j in (i + 1)..n {
            let d = engine.distance(&references[i], &references[j])? as f64;
            totals[i] += d;
            totals[j] += d;
        }
    }
    let mut best = 0;
    for (i, &t) in totals.iter().enumerate() {
        if t < totals[best] {
            best = i;
        }
    }
    Ok(best)
}

fn mean_distance(references: &[Features], to: &Features, engine: &DistanceEngine) -> Result<f32> {
    let mut total = 0.0f64;
    for r in references {
        total += engine.distance(r, to)? as f64;
    }
    Ok((total / references.len().max(1) as f64) as f32)
}
