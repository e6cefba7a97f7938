//! WAV file I/O: directory-backed sample store and file capture.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::Context as _;
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use tracing::debug;
use voicegate::{
    fit_to_duration, label_from_file_name, validate_label, Capture, SampleStore, VoiceGateError,
    Waveform, LABEL_SEPARATOR,
};

/// Reads a mono WAV file. Integer samples are scaled to [-1, 1).
pub fn read_wav(path: &Path) -> anyhow::Result<Waveform> {
    let reader =
        WavReader::open(path).with_context(|| format!("open {}", path.display()))?;
    let spec = reader.spec();
    let samples: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<Result<_, _>>()
            .with_context(|| format!("decode {}", path.display()))?,
        SampleFormat::Int => {
            let scale = 1.0 / (1i64 << (spec.bits_per_sample.clamp(1, 32) - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 * scale))
                .collect::<Result<_, _>>()
                .with_context(|| format!("decode {}", path.display()))?
        }
    };
    let w = Waveform::from_interleaved(samples, spec.channels, spec.sample_rate)
        .with_context(|| format!("load {}", path.display()))?;
    Ok(w)
}

/// Writes `waveform` as 32-bit float mono so stored references keep the
/// exact samples.
pub fn write_wav(path: &Path, waveform: &Waveform) -> anyhow::Result<()> {
    let spec = WavSpec {
        channels: 1,
        sample_rate: waveform.sample_rate(),
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };
    let mut writer =
        WavWriter::create(path, spec).with_context(|| format!("create {}", path.display()))?;
    for &s in waveform.samples() {
        writer.write_sample(s)?;
    }
    writer.finalize()?;
    Ok(())
}

fn is_wav(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("wav"))
}

fn store_err(e: impl std::fmt::Display) -> VoiceGateError {
    VoiceGateError::Store(e.to_string())
}

/// Sample store rooted at a directory.
///
/// References are written to `<root>/<label>/<label>_<n>.wav`. Loose files
/// directly under `<root>` are also read, labeled by their name prefix
/// (`open_3.wav` belongs to `open`).
#[derive(Debug, Clone)]
pub struct WavDirStore {
    root: PathBuf,
}

impl WavDirStore {
    /// Opens (and creates) the store directory.
    pub fn open(root: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)
            .with_context(|| format!("create {}", root.display()))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn wav_files(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut files = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_file() && is_wav(&path) {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    fn files_for(&self, label: &str) -> std::io::Result<Vec<PathBuf>> {
        let mut files = Self::wav_files(&self.root.join(label))?;
        for path in Self::wav_files(&self.root)? {
            let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
            if label_from_file_name(name, LABEL_SEPARATOR) == Some(label) {
                files.push(path);
            }
        }
        Ok(files)
    }

    fn next_index(&self, label: &str) -> std::io::Result<usize> {
        let prefix = format!("{label}{LABEL_SEPARATOR}");
        let max = Self::wav_files(&self.root.join(label))?
            .iter()
            .filter_map(|p| p.file_stem()?.to_str()?.strip_prefix(&prefix)?.parse::<usize>().ok())
            .max();
        Ok(max.map_or(1, |n| n + 1))
    }

    /// Links the finished `partial` file under the next free
    /// `<label>_<n>.wav`. Linking fails on an existing name, so a concurrent
    /// writer that took the same index makes this one move on instead of
    /// overwriting.
    fn publish(&self, label: &str, partial: &Path) -> std::io::Result<PathBuf> {
        let dir = self.root.join(label);
        let mut n = self.next_index(label)?;
        loop {
            let path = dir.join(format!("{label}{LABEL_SEPARATOR}{n}.wav"));
            match std::fs::hard_link(partial, &path) {
                Ok(()) => return Ok(path),
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => n += 1,
                Err(e) => return Err(e),
            }
        }
    }
}

impl SampleStore for WavDirStore {
    fn labels(&self) -> voicegate::Result<Vec<String>> {
        let mut labels = BTreeSet::new();
        for entry in std::fs::read_dir(&self.root).map_err(store_err)? {
            let path = entry.map_err(store_err)?.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if path.is_dir() {
                if !Self::wav_files(&path).map_err(store_err)?.is_empty() {
                    labels.insert(name.to_string());
                }
            } else if is_wav(&path) {
                if let Some(label) = label_from_file_name(name, LABEL_SEPARATOR) {
                    labels.insert(label.to_string());
                }
            }
        }
        Ok(labels.into_iter().collect())
    }

    fn reference_waveforms(&self, label: &str) -> voicegate::Result<Vec<Waveform>> {
        let files = self.files_for(label).map_err(store_err)?;
        debug!(label, files = files.len(), "loading references");
        files
            .iter()
            .map(|p| read_wav(p).map_err(|e| store_err(format!("{e:#}"))))
            .collect()
    }

    fn add_reference(&mut self, label: &str, waveform: &Waveform) -> voicegate::Result<usize> {
        validate_label(label)?;
        let dir = self.root.join(label);
        std::fs::create_dir_all(&dir).map_err(store_err)?;

        // Readers only see `.wav` names, so the file is invisible until it is
        // complete.
        let partial = dir.join(format!(".{label}.{}.part", std::process::id()));
        write_wav(&partial, waveform).map_err(|e| store_err(format!("{e:#}")))?;
        let published = self.publish(label, &partial);
        let _ = std::fs::remove_file(&partial);
        let path = published.map_err(store_err)?;

        debug!(path = %path.display(), "reference written");
        Ok(self.files_for(label).map_err(store_err)?.len())
    }
}

/// Capture backed by a recorded WAV file.
///
/// The file must already be mono at the configured rate; it is cut or
/// zero-padded to the utterance length like a live recording.
#[derive(Debug, Clone)]
pub struct WavFileCapture {
    path: PathBuf,
}

impl WavFileCapture {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Capture for WavFileCapture {
    fn capture_utterance(&mut self, duration_secs: f32, sample_rate: u32) -> voicegate::Result<Waveform> {
        let w = read_wav(&self.path).map_err(|e| VoiceGateError::InvalidWaveform {
            reason: format!("{e:#}"),
        })?;
        w.check_shape(sample_rate)?;
        fit_to_duration(w, duration_secs)
    }
}
