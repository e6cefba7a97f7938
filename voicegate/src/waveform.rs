use crate::error::{Result, VoiceGateError};

/// Mono audio samples at a fixed sample rate.
///
/// Samples are f32 in roughly [-1, 1]. A `Waveform` is never empty and never
/// holds NaN or infinite samples; the constructors enforce both.
#[derive(Debug, Clone, PartialEq)]
pub struct Waveform {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl Waveform {
    /// Wraps mono samples. Rejects empty or non-finite input.
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Result<Self> {
        if sample_rate == 0 {
            return Err(VoiceGateError::invalid_waveform("sample rate is zero"));
        }
        if samples.is_empty() {
            return Err(VoiceGateError::invalid_waveform("no samples"));
        }
        if let Some(i) = samples.iter().position(|s| !s.is_finite()) {
            return Err(VoiceGateError::invalid_waveform(format!(
                "sample {i} is not finite"
            )));
        }
        Ok(Self {
            samples,
            sample_rate,
        })
    }

    /// Decodes PCM16 signed little-endian mono audio.
    pub fn from_pcm16_le(audio: &[u8], sample_rate: u32) -> Result<Self> {
        if audio.len() % 2 != 0 {
            return Err(VoiceGateError::invalid_waveform(format!(
                "PCM16 data has odd length {}",
                audio.len()
            )));
        }
        let samples = audio
            .chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]) as f32 / 32768.0)
            .collect();
        Self::new(samples, sample_rate)
    }

    /// Accepts interleaved samples but only when they are mono.
    pub fn from_interleaved(samples: Vec<f32>, channels: u16, sample_rate: u32) -> Result<Self> {
        if channels != 1 {
            return Err(VoiceGateError::invalid_waveform(format!(
                "expected 1 channel, got {channels}"
            )));
        }
        Self::new(samples, sample_rate)
    }

    /// Rejects a waveform recorded at a rate other than `expected_rate`.
    pub fn check_shape(&self, expected_rate: u32) -> Result<()> {
        if self.sample_rate != expected_rate {
            return Err(VoiceGateError::invalid_waveform(format!(
                "sample rate {} Hz, expected {expected_rate} Hz",
                self.sample_rate
            )));
        }
        Ok(())
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn into_samples(self) -> Vec<f32> {
        self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Always false for a constructed waveform.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_secs(&self) -> f32 {
        self.samples.len() as f32 / self.sample_rate as f32
    }

    /// Largest absolute sample value.
    pub fn peak(&self) -> f32 {
        peak(&self.samples)
    }

    /// Root-mean-square energy.
    pub fn rms(&self) -> f32 {
        rms(&self.samples)
    }

    /// Encodes as PCM16 signed little-endian, clamping to the i16 range.
    pub fn to_pcm16_le(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.samples.len() * 2);
        for &s in &self.samples {
            let v = (s * 32768.0).round().clamp(i16::MIN as f32, i16::MAX as f32) as i16;
            out.extend_from_slice(&v.to_le_bytes());
        }
        out
    }
}

pub(crate) fn peak(samples: &[f32]) -> f32 {
    samples.iter().fold(0.0f32, |m, &s| m.max(s.abs()))
}

/// Uses f64 accumulation so long buffers do not lose precision.
pub(crate) fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f64 = samples.iter().map(|&s| (s as f64) * (s as f64)).sum();
    (sum / samples.len() as f64).sqrt() as f32
}
