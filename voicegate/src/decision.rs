//! Command detection and speaker verification.
//!
//! Both decisions run the same three steps:
//!
//! 1. **Scoring**: distance from the query to every candidate model.
//! 2. **Ranking**: ascending by distance (ties keep model order).
//! 3. **Accept/Reject**: the configured [`DecisionPolicy`].
//!
//! Rejections are ordinary outcomes, reported as [`Rejection`] values inside
//! the [`Verdict`]. Command-level and speaker-level rejections are kept
//! apart so neither is mistaken for the other.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::distance::DistanceEngine;
use crate::enroll::{EnrollmentModel, ModelSet};
use crate::error::{Result, VoiceGateError};
use crate::features::Features;

/// Rejection rule applied to a ranked candidate list.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DecisionPolicy {
    /// Reject when the best distance exceeds `ceiling`.
    AbsoluteThreshold { ceiling: f32 },
    /// Reject when `best / runner_up > ratio`. Needs two or more
    /// candidates; with fewer it fails closed. The optional `ceiling` is
    /// applied after the margin test.
    RelativeMargin {
        ratio: f32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        ceiling: Option<f32>,
    },
    /// Reject unless the distance is below the matched model's mean
    /// intra-class distance plus `margin`. `margin` must be non-negative.
    AdaptiveSpreadMargin { margin: f32 },
}

impl DecisionPolicy {
    pub(crate) fn validate(&self, field: &str) -> Result<()> {
        let ok = match *self {
            Self::AbsoluteThreshold { ceiling } => ceiling.is_finite() && ceiling > 0.0,
            Self::RelativeMargin { ratio, ceiling } => {
                ratio > 0.0 && ratio <= 1.0 && ceiling.is_none_or(|c| c.is_finite() && c > 0.0)
            }
            Self::AdaptiveSpreadMargin { margin } => margin.is_finite() && margin >= 0.0,
        };
        if !ok {
            return Err(VoiceGateError::InvalidConfig(format!(
                "{field}: out-of-range value in {self:?}"
            )));
        }
        Ok(())
    }
}

/// Why a decision was negative.
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Rejection {
    #[error("ambiguous command: {best_label} at {best:.3} vs runner-up at {runner_up:.3} (ratio {ratio:.3} > {max_ratio:.3}), please repeat")]
    AmbiguousCommand {
        best_label: String,
        best: f32,
        runner_up: f32,
        ratio: f32,
        max_ratio: f32,
    },

    #[error("no command recognized: closest is {label} at {distance:.3}, threshold {threshold:.3}")]
    CommandRejected {
        label: String,
        distance: f32,
        threshold: f32,
    },

    #[error("no command decision: {enrolled} command(s) enrolled, the margin rule needs at least 2")]
    NoCommandDecision { enrolled: usize },

    #[error("speaker rejected: distance {distance:.3} is not below threshold {threshold:.3}")]
    SpeakerRejected { distance: f32, threshold: f32 },
}

impl Rejection {
    pub fn is_command_level(&self) -> bool {
        !matches!(self, Self::SpeakerRejected { .. })
    }
}

/// Distance from the query to one model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Score {
    pub label: String,
    pub distance: f32,
    /// Mean intra-class distance of the model.
    pub spread: f32,
}

/// Outcome of command detection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandDecision {
    /// Recognized command, `None` when rejected.
    pub command: Option<String>,
    /// Best distance, if any command was scored.
    pub distance: Option<f32>,
    /// Threshold or ratio limit the best distance was held to.
    pub threshold: Option<f32>,
    /// `best / runner_up` when a runner-up exists.
    pub margin_ratio: Option<f32>,
    /// All candidates, nearest first.
    pub ranking: Vec<Score>,
    pub rejection: Option<Rejection>,
}

/// Outcome of speaker verification.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpeakerDecision {
    pub authorized: bool,
    pub distance: f32,
    pub threshold: f32,
    pub rejection: Option<Rejection>,
}

/// Combined result for one utterance.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Verdict {
    pub command: CommandDecision,
    pub speaker: SpeakerDecision,
}

impl Verdict {
    pub fn matched_command(&self) -> Option<&str> {
        self.command.command.as_deref()
    }

    pub fn command_distance(&self) -> Option<f32> {
        self.command.distance
    }

    pub fn speaker_authorized(&self) -> bool {
        self.speaker.authorized
    }

    pub fn speaker_distance(&self) -> f32 {
        self.speaker.distance
    }

    /// True only when a command was recognized and the speaker verified.
    pub fn access_granted(&self) -> bool {
        self.command.command.is_some() && self.speaker.authorized
    }

    /// Every rejection, command-level first.
    pub fn rejections(&self) -> Vec<&Rejection> {
        self.command
            .rejection
            .iter()
            .chain(self.speaker.rejection.iter())
            .collect()
    }
}

/// Applies the configured policies to a query's distances.
///
/// Holds no state beyond configuration: a verdict is a pure function of
/// the query, the models and the thresholds.
#[derive(Debug, Clone)]
pub struct DecisionEngine {
    distance: DistanceEngine,
    command_policy: DecisionPolicy,
    speaker_policy: DecisionPolicy,
}

impl DecisionEngine {
    pub fn new(
        distance: DistanceEngine,
        command_policy: DecisionPolicy,
        speaker_policy: DecisionPolicy,
    ) -> Result<Self> {
        command_policy.validate("command_policy")?;
        speaker_policy.validate("speaker_policy")?;
        if matches!(speaker_policy, DecisionPolicy::RelativeMargin { .. }) {
            return Err(VoiceGateError::InvalidConfig(
                "speaker_policy cannot be relative_margin".into(),
            ));
        }
        Ok(Self {
            distance,
            command_policy,
            speaker_policy,
        })
    }

    pub fn distance_engine(&self) -> &DistanceEngine {
        &self.distance
    }

    /// Runs both decisions for `query`.
    pub fn evaluate(&self, query: &Features, models: &ModelSet) -> Result<Verdict> {
        let scores = self.score(query, &models.commands)?;
        let command = self.decide_command(rank(scores));

        let owner_distance = models.owner.distance_to(query, &self.distance)?;
        let speaker = self.decide_speaker(owner_distance, models.owner.spread());

        let verdict = Verdict { command, speaker };
        info!(
            command = ?verdict.matched_command(),
            command_distance = ?verdict.command_distance(),
            authorized = verdict.speaker_authorized(),
            speaker_distance = verdict.speaker_distance(),
            granted = verdict.access_granted(),
            "verdict"
        );
        Ok(verdict)
    }

    /// Scoring: distance from `query` to each model.
    pub fn score(&self, query: &Features, models: &[EnrollmentModel]) -> Result<Vec<Score>> {
        models
            .iter()
            .map(|m| {
                let distance = m.distance_to(query, &self.distance)?;
                debug!(label = m.label(), distance, spread = m.spread(), "score");
                Ok(Score {
                    label: m.label().to_string(),
                    distance,
                    spread: m.spread(),
                })
            })
            .collect()
    }

    /// Accept/Reject for a ranked command list.
    pub fn decide_command(&self, ranking: Vec<Score>) -> CommandDecision {
        let mut decision = CommandDecision {
            command: None,
            distance: ranking.first().map(|s| s.distance),
            threshold: None,
            margin_ratio: None,
            ranking: Vec::new(),
            rejection: None,
        };

        let Some(best) = ranking.first() else {
            decision.rejection = Some(Rejection::NoCommandDecision { enrolled: 0 });
            return decision;
        };
        if let Some(second) = ranking.get(1) {
            decision.margin_ratio = Some(margin_ratio(best.distance, second.distance));
        }

        let rejection = match self.command_policy {
            DecisionPolicy::AbsoluteThreshold { ceiling } => {
                decision.threshold = Some(ceiling);
                exceeds(best, ceiling, false)
            }
            DecisionPolicy::RelativeMargin { ratio, ceiling } => {
                decision.threshold = Some(ratio);
                match (ranking.get(1), decision.margin_ratio) {
                    (Some(second), Some(r)) if r > ratio || r.is_nan() => {
                        Some(Rejection::AmbiguousCommand {
                            best_label: best.label.clone(),
                            best: best.distance,
                            runner_up: second.distance,
                            ratio: r,
                            max_ratio: ratio,
                        })
                    }
                    (Some(_), Some(_)) => ceiling.and_then(|c| exceeds(best, c, false)),
                    _ => Some(Rejection::NoCommandDecision {
                        enrolled: ranking.len(),
                    }),
                }
            }
            DecisionPolicy::AdaptiveSpreadMargin { margin } => {
                let threshold = best.spread + margin;
                decision.threshold = Some(threshold);
                exceeds(best, threshold, true)
            }
        };

        match rejection {
            Some(r) => {
                warn!(reason = %r, "command rejected");
                decision.rejection = Some(r);
            }
            None => decision.command = Some(best.label.clone()),
        }
        decision.ranking = ranking;
        decision
    }

    /// Accept/Reject for the owner model: authorized iff `distance < threshold`.
    pub fn decide_speaker(&self, distance: f32, spread: f32) -> SpeakerDecision {
        let threshold = match self.speaker_policy {
            DecisionPolicy::AbsoluteThreshold { ceiling } => ceiling,
            DecisionPolicy::AdaptiveSpreadMargin { margin } => spread + margin,
            // Rejected by `new`; fail closed if it ever gets here.
            DecisionPolicy::RelativeMargin { .. } => f32::NEG_INFINITY,
        };
        let authorized = distance < threshold;
        let rejection = if authorized {
            None
        } else {
            let r = Rejection::SpeakerRejected {
                distance,
                threshold,
            };
            warn!(reason = %r, "speaker rejected");
            Some(r)
        };
        SpeakerDecision {
            authorized,
            distance,
            threshold,
            rejection,
        }
    }
}

/// Ranking: ascending by distance, stable on ties.
pub fn rank(mut scores: Vec<Score>) -> Vec<Score> {
    scores.sort_by(|a, b| a.distance.total_cmp(&b.distance));
    scores
}

/// `best / runner_up`; two zero distances count as fully ambiguous (1.0).
fn margin_ratio(best: f32, runner_up: f32) -> f32 {
    if runner_up <= 0.0 {
        if best <= 0.0 { 1.0 } else { f32::INFINITY }
    } else {
        best / runner_up
    }
}

/// `strict`: reject when `distance >= threshold`; otherwise when `distance > threshold`.
fn exceeds(best: &Score, threshold: f32, strict: bool) -> Option<Rejection> {
    let over = if strict {
        !(best.distance < threshold)
    } else {
        !(best.distance <= threshold)
    };
    over.then(|| Rejection::CommandRejected {
        label: best.label.clone(),
        distance: best.distance,
        threshold,
    })
}
