use tracing::{debug, info};

use crate::capture::Capture;
use crate::config::Config;
use crate::decision::{DecisionEngine, Verdict};
use crate::distance::DistanceEngine;
use crate::enroll::{EnrollmentModel, ModelBuilder, ModelSet};
use crate::error::{Result, VoiceGateError};
use crate::features::{FeatureExtractor, Features};
use crate::preprocess::Preprocessor;
use crate::store::SampleStore;
use crate::waveform::Waveform;

/// Voice gate: preprocessing, extraction, models and decisions wired from
/// one [`Config`].
///
/// Holds no per-utterance state. Enrolled audio lives in a
/// [`SampleStore`]; models are rebuilt from it on every verification so
/// they always reflect the latest references.
///
/// # Example
///
/// ```no_run
/// use voicegate::{Config, MemoryStore, VoiceGate, Waveform};
///
/// # fn main() -> voicegate::Result<()> {
/// let gate = VoiceGate::new(Config::default())?;
/// let store = MemoryStore::new();
/// // ... enroll "owner" and command samples into `store` ...
/// let query = Waveform::new(vec![0.0; 48000], 16000)?;
/// let verdict = gate.test(&query, &store)?;
/// if verdict.access_granted() {
///     println!("executing {:?}", verdict.matched_command());
/// }
/// # Ok(())
/// # }
/// ```
pub struct VoiceGate {
    cfg: Config,
    preprocessor: Preprocessor,
    extractor: FeatureExtractor,
    decision: DecisionEngine,
}

impl VoiceGate {
    /// Validates `cfg` and builds every stage.
    pub fn new(cfg: Config) -> Result<Self> {
        cfg.validate()?;
        let rate = cfg.audio.sample_rate;
        let distance = DistanceEngine::new(&cfg.distance);
        let metric = distance.metric();
        let preprocessor =
            Preprocessor::new(cfg.preprocess.clone(), rate, metric.wants_fixed_length());
        let extractor = FeatureExtractor::new(cfg.features.clone(), rate);
        let decision = DecisionEngine::new(
            distance,
            cfg.decision.command_policy,
            cfg.decision.speaker_policy,
        )?;
        info!(
            sample_rate = rate,
            metric = %metric,
            fixed_len = ?preprocessor.fixed_len(),
            "voice gate ready"
        );
        Ok(Self {
            cfg,
            preprocessor,
            extractor,
            decision,
        })
    }

    /// Replaces the preprocessor, e.g. to plug in another noise suppressor.
    pub fn with_preprocessor(mut self, preprocessor: Preprocessor) -> Self {
        self.preprocessor = preprocessor;
        self
    }

    pub fn config(&self) -> &Config {
        &self.cfg
    }

    pub fn distance_engine(&self) -> &DistanceEngine {
        self.decision.distance_engine()
    }

    pub fn extractor(&self) -> &FeatureExtractor {
        &self.extractor
    }

    /// Cleans a raw waveform. Used to validate recordings before storing
    /// them.
    pub fn preprocess(&self, waveform: &Waveform) -> Result<Waveform> {
        self.preprocessor.process(waveform)
    }

    /// Preprocesses and extracts features in the metric's form.
    pub fn analyze(&self, waveform: &Waveform) -> Result<Features> {
        let clean = self.preprocessor.clean(waveform)?;
        let form = self.distance_engine().metric().form();
        self.extractor.extract_active(&clean.waveform, clean.active_len, form)
    }

    /// Builds one label's model from raw references.
    pub fn build_model(&self, label: &str, waveforms: &[Waveform]) -> Result<EnrollmentModel> {
        ModelBuilder::new(&self.preprocessor, &self.extractor, self.distance_engine())
            .build(label, waveforms)
    }

    /// Rebuilds the owner and command models from `store`.
    ///
    /// Commands are the configured vocabulary or, when none is configured,
    /// every stored label other than the owner's.
    pub fn build_models<S: SampleStore + ?Sized>(&self, store: &S) -> Result<ModelSet> {
        let owner_label = &self.cfg.decision.owner_label;
        let labels = if self.cfg.decision.commands.is_empty() {
            store
                .labels()?
                .into_iter()
                .filter(|l| l != owner_label)
                .collect()
        } else {
            self.cfg.decision.commands.clone()
        };
        if labels.is_empty() {
            return Err(VoiceGateError::NoCommandsEnrolled {
                owner: owner_label.clone(),
            });
        }

        let owner = self.build_model(owner_label, &store.reference_waveforms(owner_label)?)?;
        let commands = labels
            .iter()
            .map(|l| self.build_model(l, &store.reference_waveforms(l)?))
            .collect::<Result<Vec<_>>>()?;
        debug!(commands = commands.len(), owner_refs = owner.references().len(), "models rebuilt");
        Ok(ModelSet { commands, owner })
    }

    /// Verifies a raw utterance against prebuilt models.
    pub fn evaluate(&self, waveform: &Waveform, models: &ModelSet) -> Result<Verdict> {
        let query = self.analyze(waveform)?;
        self.evaluate_features(&query, models)
    }

    /// Verifies already-extracted features against prebuilt models.
    pub fn evaluate_features(&self, query: &Features, models: &ModelSet) -> Result<Verdict> {
        self.decision.evaluate(query, models)
    }

    /// Rebuilds models from `store` and verifies `waveform`.
    pub fn test<S: SampleStore + ?Sized>(&self, waveform: &Waveform, store: &S) -> Result<Verdict> {
        let models = self.build_models(store)?;
        self.evaluate(waveform, &models)
    }

    /// Captures one utterance of the configured duration.
    pub fn capture<C: Capture + ?Sized>(&self, capture: &mut C) -> Result<Waveform> {
        capture.capture_utterance(self.cfg.audio.utterance_secs, self.cfg.audio.sample_rate)
    }

    /// Captures one utterance and verifies it against `store`.
    pub fn capture_and_test<C, S>(&self, capture: &mut C, store: &S) -> Result<Verdict>
    where
        C: Capture + ?Sized,
        S: SampleStore + ?Sized,
    {
        let waveform = self.capture(capture)?;
        self.test(&waveform, store)
    }
}
