//! Test command.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Args;
use serde::Serialize;
use voicegate::{Session, SessionCommand, SessionEvent, Verdict};

use super::{build_gate, open_store, output_format};
use crate::output;
use crate::wav::WavFileCapture;
use crate::Cli;

/// Test a recording against the enrolled samples.
#[derive(Args)]
pub struct TestCommand {
    /// Mono WAV recording at the configured sample rate
    pub file: PathBuf,
}

#[derive(Debug, Serialize)]
struct TestReport {
    file: String,
    granted: bool,
    #[serde(flatten)]
    verdict: Verdict,
}

impl TestCommand {
    /// Exit code 0 when access is granted, 1 when denied.
    pub fn run(&self, cli: &Cli) -> anyhow::Result<ExitCode> {
        let verdict = self.verify(cli)?;
        let report = TestReport {
            file: self.file.display().to_string(),
            granted: verdict.access_granted(),
            verdict,
        };
        output::print(&report, output_format(cli))?;

        if report.granted {
            let command = report.verdict.matched_command().unwrap_or_default();
            eprintln!("ACCESS GRANTED: executing {command:?}");
            Ok(ExitCode::SUCCESS)
        } else {
            for r in report.verdict.rejections() {
                eprintln!("ACCESS DENIED: {r}");
            }
            Ok(ExitCode::from(1))
        }
    }

    fn verify(&self, cli: &Cli) -> anyhow::Result<Verdict> {
        let mut session = Session::new(build_gate(cli)?, open_store(cli)?);
        session.handle(SessionCommand::StartTest)?;
        let waveform = session.gate().capture(&mut WavFileCapture::new(&self.file))?;
        match session.handle(SessionCommand::Test(waveform))? {
            SessionEvent::Tested(verdict) => Ok(*verdict),
            other => anyhow::bail!("unexpected session event {other:?}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;
    use voicegate::{SampleStore, Waveform};

    use super::*;
    use crate::wav::{write_wav, WavDirStore};
    use crate::Commands;

    fn voiced(f0: f32, amp: f32) -> Waveform {
        let s = (0..12800)
            .map(|i| {
                let t = i as f32 / 16000.0;
                (1..=6)
                    .map(|k| (2.0 * std::f32::consts::PI * f0 * k as f32 * t).sin() / k as f32)
                    .sum::<f32>()
                    * amp
                    * 0.4
            })
            .collect();
        Waveform::new(s, 16000).unwrap()
    }

    fn hiss(amp: f32) -> Waveform {
        let s = (0..12800)
            .map(|i| {
                let t = i as f32 / 16000.0;
                ((2.0 * std::f32::consts::PI * 2500.0 * t).sin()
                    + (2.0 * std::f32::consts::PI * 3100.0 * t).sin())
                    * amp
                    * 0.5
            })
            .collect();
        Waveform::new(s, 16000).unwrap()
    }

    fn cli_for(dir: &std::path::Path, query: &std::path::Path) -> Cli {
        std::fs::write(dir.join("config.yaml"), "{}\n").unwrap();
        Cli::parse_from([
            "voicegate",
            "--config",
            dir.join("config.yaml").to_str().unwrap(),
            "--samples",
            dir.join("samples").to_str().unwrap(),
            "--json",
            "test",
            query.to_str().unwrap(),
        ])
    }

    #[test]
    fn ranks_enrolled_command_first() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = WavDirStore::open(dir.path().join("samples")).unwrap();
        for amp in [0.3, 0.6, 0.9] {
            store.add_reference("open", &voiced(150.0, amp)).unwrap();
            store.add_reference("close", &hiss(amp)).unwrap();
            store.add_reference("owner", &voiced(150.0, amp)).unwrap();
            store.add_reference("owner", &hiss(amp)).unwrap();
        }
        let query = dir.path().join("query.wav");
        write_wav(&query, &voiced(150.0, 0.45)).unwrap();

        let cli = cli_for(dir.path(), &query);
        let Commands::Test(cmd) = &cli.command else {
            panic!("expected test");
        };
        let verdict = cmd.verify(&cli).unwrap();
        assert_eq!(verdict.command.ranking[0].label, "open");
        assert_eq!(verdict.command.ranking.len(), 2);
        assert!(cmd.run(&cli).is_ok());
    }

    #[test]
    fn missing_enrollment_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let query = dir.path().join("query.wav");
        write_wav(&query, &voiced(150.0, 0.6)).unwrap();
        let cli = cli_for(dir.path(), &query);
        let Commands::Test(cmd) = &cli.command else {
            panic!("expected test");
        };
        assert!(cmd.run(&cli).is_err());
    }
}
