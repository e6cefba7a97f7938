//! Enroll command.

use std::path::PathBuf;

use clap::Args;
use serde::Serialize;
use voicegate::{Session, SessionCommand, SessionEvent, VoiceGateError};

use super::{build_gate, open_store, output_format};
use crate::output;
use crate::wav::read_wav;
use crate::Cli;

/// Enroll reference recordings for a label.
#[derive(Args)]
pub struct EnrollCommand {
    /// Command word, or the owner label (default "owner") for voice samples
    pub label: String,

    /// Mono WAV recordings at the configured sample rate
    #[arg(required = true)]
    pub files: Vec<PathBuf>,
}

#[derive(Debug, Serialize)]
struct EnrollReport {
    label: String,
    stored: usize,
    total: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    skipped: Vec<Skipped>,
}

#[derive(Debug, Serialize)]
struct Skipped {
    file: String,
    reason: String,
}

impl EnrollCommand {
    pub fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        let report = self.enroll(cli)?;
        output::print(&report, output_format(cli))?;
        if report.stored == 0 {
            anyhow::bail!("no usable recordings for {:?}", report.label);
        }
        Ok(())
    }

    fn enroll(&self, cli: &Cli) -> anyhow::Result<EnrollReport> {
        let mut session = Session::new(build_gate(cli)?, open_store(cli)?);
        session.handle(SessionCommand::StartEnroll(self.label.clone()))?;

        let mut report = EnrollReport {
            label: self.label.clone(),
            stored: 0,
            total: 0,
            skipped: Vec::new(),
        };
        for file in &self.files {
            let skip = |reason: String| Skipped {
                file: file.display().to_string(),
                reason,
            };
            let waveform = match read_wav(file) {
                Ok(w) => w,
                Err(e) => {
                    tracing::warn!(file = %file.display(), error = %format!("{e:#}"), "skipping");
                    report.skipped.push(skip(format!("{e:#}")));
                    continue;
                }
            };
            match session.handle(SessionCommand::Record(waveform)) {
                Ok(SessionEvent::Recorded { count, .. }) => {
                    report.stored += 1;
                    report.total = count;
                }
                Ok(other) => anyhow::bail!("unexpected session event {other:?}"),
                Err(
                    e @ (VoiceGateError::PreprocessingRejected { .. }
                    | VoiceGateError::InvalidWaveform { .. }),
                ) => {
                    tracing::warn!(file = %file.display(), error = %e, "skipping");
                    report.skipped.push(skip(e.to_string()));
                }
                Err(e) => return Err(e.into()),
            }
        }
        session.handle(SessionCommand::Finish)?;
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;
    use voicegate::{SampleStore, Waveform};

    use super::*;
    use crate::Commands;
    use crate::wav::{write_wav, WavDirStore};

    fn tone_file(dir: &std::path::Path, name: &str, rate: u32) -> PathBuf {
        let s = (0..16000)
            .map(|i| (2.0 * std::f32::consts::PI * 220.0 * i as f32 / 16000.0).sin() * 0.5)
            .collect();
        let path = dir.join(name);
        write_wav(&path, &Waveform::new(s, rate).unwrap()).unwrap();
        path
    }

    #[test]
    fn enrolls_and_skips_unusable_files() {
        let dir = tempfile::tempdir().unwrap();
        let samples = dir.path().join("samples");
        let good = tone_file(dir.path(), "good.wav", 16000);
        let wrong_rate = tone_file(dir.path(), "slow.wav", 8000);
        let silent = dir.path().join("silent.wav");
        write_wav(&silent, &Waveform::new(vec![0.0; 16000], 16000).unwrap()).unwrap();

        let cli = Cli::parse_from([
            "voicegate",
            "--config",
            dir.path().join("none.yaml").to_str().unwrap(),
            "--samples",
            samples.to_str().unwrap(),
            "enroll",
            "open",
            good.to_str().unwrap(),
            wrong_rate.to_str().unwrap(),
            silent.to_str().unwrap(),
        ]);
        // Explicit config must exist.
        std::fs::write(dir.path().join("none.yaml"), "{}\n").unwrap();

        let Commands::Enroll(cmd) = &cli.command else {
            panic!("expected enroll");
        };
        let report = cmd.enroll(&cli).unwrap();
        assert_eq!(report.stored, 1);
        assert_eq!(report.total, 1);
        assert_eq!(report.skipped.len(), 2);

        let store = WavDirStore::open(&samples).unwrap();
        assert_eq!(store.labels().unwrap(), vec!["open"]);
    }

    #[test]
    fn rejects_reserved_label() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("c.yaml"), "{}\n").unwrap();
        let good = tone_file(dir.path(), "good.wav", 16000);
        let cli = Cli::parse_from([
            "voicegate",
            "--config",
            dir.path().join("c.yaml").to_str().unwrap(),
            "--samples",
            dir.path().join("s").to_str().unwrap(),
            "enroll",
            "turn_on",
            good.to_str().unwrap(),
        ]);
        let Commands::Enroll(cmd) = &cli.command else {
            panic!("expected enroll");
        };
        assert!(cmd.enroll(&cli).is_err());
    }
}
