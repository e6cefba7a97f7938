//! Audio acquisition.

use std::collections::VecDeque;

use crate::error::{Result, VoiceGateError};
use crate::waveform::Waveform;

/// Produces one fixed-duration mono utterance per call.
pub trait Capture {
    fn capture_utterance(&mut self, duration_secs: f32, sample_rate: u32) -> Result<Waveform>;
}

/// Replays queued waveforms in order, cut or zero-padded to the requested
/// duration.
#[derive(Debug, Default)]
pub struct ReplayCapture {
    queue: VecDeque<Waveform>,
}

impl ReplayCapture {
    pub fn new(waveforms: impl IntoIterator<Item = Waveform>) -> Self {
        Self {
            queue: waveforms.into_iter().collect(),
        }
    }

    pub fn push(&mut self, waveform: Waveform) {
        self.queue.push_back(waveform);
    }

    pub fn remaining(&self) -> usize {
        self.queue.len()
    }
}

impl Capture for ReplayCapture {
    fn capture_utterance(&mut self, duration_secs: f32, sample_rate: u32) -> Result<Waveform> {
        let w = self
            .queue
            .pop_front()
            .ok_or_else(|| VoiceGateError::invalid_waveform("capture source exhausted"))?;
        w.check_shape(sample_rate)?;
        fit_to_duration(w, duration_secs)
    }
}

/// Truncates or zero-pads `waveform` to `duration_secs`.
pub fn fit_to_duration(waveform: Waveform, duration_secs: f32) -> Result<Waveform> {
    let rate = waveform.sample_rate();
    let n = (duration_secs * rate as f32).round() as usize;
    let mut samples = waveform.into_samples();
    samples.resize(n, 0.0);
    Waveform::new(samples, rate)
}
