//! Reference sample storage.
//!
//! The engine only reads labels and waveforms through [`SampleStore`];
//! where the audio lives (memory, a directory of WAV files) is up to the
//! implementation. Enrollment appends; nothing is overwritten.

use std::collections::BTreeMap;

use crate::error::{Result, VoiceGateError};
use crate::waveform::Waveform;

/// Separator between a label and its sample index in stored names,
/// e.g. `open_3.wav`.
pub const LABEL_SEPARATOR: char = '_';

/// Labeled collection of raw reference waveforms.
pub trait SampleStore {
    /// All labels with at least one reference, sorted.
    fn labels(&self) -> Result<Vec<String>>;

    /// Raw references for `label`; empty when the label is unknown.
    fn reference_waveforms(&self, label: &str) -> Result<Vec<Waveform>>;

    /// Appends a reference. Returns the label's new reference count.
    fn add_reference(&mut self, label: &str, waveform: &Waveform) -> Result<usize>;
}

/// Rejects labels that cannot round-trip through a stored file name.
pub fn validate_label(label: &str) -> Result<()> {
    if label.is_empty() {
        return Err(VoiceGateError::Store("label must not be empty".into()));
    }
    if let Some(c) = label
        .chars()
        .find(|&c| c == LABEL_SEPARATOR || c == '/' || c == '\\' || c == '.' || c.is_whitespace())
    {
        return Err(VoiceGateError::Store(format!(
            "label {label:?} contains reserved character {c:?}"
        )));
    }
    Ok(())
}

/// Extracts the label from a stored name: the part before the first
/// `separator`, or the whole stem when there is none.
///
/// ```
/// use voicegate::label_from_file_name;
/// assert_eq!(label_from_file_name("open_3.wav", '_'), Some("open"));
/// assert_eq!(label_from_file_name("owner.wav", '_'), Some("owner"));
/// assert_eq!(label_from_file_name("_x.wav", '_'), None);
/// ```
pub fn label_from_file_name(name: &str, separator: char) -> Option<&str> {
    let stem = match name.rfind('.') {
        Some(i) if i > 0 => &name[..i],
        _ => name,
    };
    let label = stem.split(separator).next().unwrap_or(stem);
    (!label.is_empty()).then_some(label)
}

/// In-memory store.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    samples: BTreeMap<String, Vec<Waveform>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, label: &str) -> usize {
        self.samples.get(label).map_or(0, Vec::len)
    }
}

impl SampleStore for MemoryStore {
    fn labels(&self) -> Result<Vec<String>> {
        Ok(self
            .samples
            .iter()
            .filter(|(_, v)| !v.is_empty())
            .map(|(k, _)| k.clone())
            .collect())
    }

    fn reference_waveforms(&self, label: &str) -> Result<Vec<Waveform>> {
        Ok(self.samples.get(label).cloned().unwrap_or_default())
    }

    fn add_reference(&mut self, label: &str, waveform: &Waveform) -> Result<usize> {
        validate_label(label)?;
        let refs = self.samples.entry(label.to_string()).or_default();
        refs.push(waveform.clone());
        Ok(refs.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wave() -> Waveform {
        Waveform::new(vec![0.1; 10], 16000).unwrap()
    }

    #[test]
    fn memory_store_appends() {
        let mut s = MemoryStore::new();
        assert_eq!(s.add_reference("open", &wave()).unwrap(), 1);
        assert_eq!(s.add_reference("open", &wave()).unwrap(), 2);
        assert_eq!(s.add_reference("close", &wave()).unwrap(), 1);
        assert_eq!(s.labels().unwrap(), vec!["close", "open"]);
        assert_eq!(s.reference_waveforms("open").unwrap().len(), 2);
        assert!(s.reference_waveforms("missing").unwrap().is_empty());
        assert_eq!(s.count("close"), 1);
    }

    #[test]
    fn rejects_bad_labels() {
        let mut s = MemoryStore::new();
        for bad in ["", "turn_on", "a/b", "x.y", "two words"] {
            assert!(s.add_reference(bad, &wave()).is_err(), "{bad:?}");
        }
        assert!(s.labels().unwrap().is_empty());
    }

    #[test]
    fn label_from_names() {
        assert_eq!(label_from_file_name("close_12.wav", '_'), Some("close"));
        assert_eq!(label_from_file_name("owner", '_'), Some("owner"));
        assert_eq!(label_from_file_name("lights-on_1.wav", '_'), Some("lights-on"));
        assert_eq!(label_from_file_name(".wav", '_'), Some(".wav"));
        assert_eq!(label_from_file_name("_1.wav", '_'), None);
    }
}
