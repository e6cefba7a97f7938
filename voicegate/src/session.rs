//! Interactive enroll/test session.
//!
//! | state       | command            | next        |
//! |-------------|--------------------|-------------|
//! | `Idle`      | `StartEnroll(l)`   | `Enrolling` |
//! | `Enrolling` | `Record(w)`        | `Enrolling` |
//! | `Idle`      | `StartTest`        | `Testing`   |
//! | `Testing`   | `Test(w)`          | `Testing`   |
//! | `Enrolling`, `Testing` | `Finish` | `Idle`     |
//!
//! Every other command/state pair fails with
//! [`VoiceGateError::InvalidTransition`] and leaves the state unchanged.

use std::fmt;

use tracing::info;

use crate::decision::Verdict;
use crate::engine::VoiceGate;
use crate::error::{Result, VoiceGateError};
use crate::store::{validate_label, SampleStore};
use crate::waveform::Waveform;

/// Where the session is.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    /// Recording references for the label.
    Enrolling(String),
    Testing,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Enrolling(_) => "enrolling",
            SessionState::Testing => "testing",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Enrolling(label) => write!(f, "enrolling {label:?}"),
            other => f.write_str(other.as_str()),
        }
    }
}

/// Input to [`Session::handle`].
#[derive(Debug, Clone)]
pub enum SessionCommand {
    StartEnroll(String),
    Record(Waveform),
    StartTest,
    Test(Waveform),
    Finish,
}

impl SessionCommand {
    pub fn name(&self) -> &'static str {
        match self {
            SessionCommand::StartEnroll(_) => "start_enroll",
            SessionCommand::Record(_) => "record",
            SessionCommand::StartTest => "start_test",
            SessionCommand::Test(_) => "test",
            SessionCommand::Finish => "finish",
        }
    }
}

/// Result of a handled command.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    EnrollStarted { label: String },
    /// A recording passed preprocessing and was stored.
    Recorded { label: String, count: usize },
    TestStarted,
    Tested(Box<Verdict>),
    Finished,
}

/// Drives a [`VoiceGate`] and a [`SampleStore`] through enrollment and
/// testing.
pub struct Session<S: SampleStore> {
    gate: VoiceGate,
    store: S,
    state: SessionState,
}

impl<S: SampleStore> Session<S> {
    pub fn new(gate: VoiceGate, store: S) -> Self {
        Self {
            gate,
            store,
            state: SessionState::Idle,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn gate(&self) -> &VoiceGate {
        &self.gate
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Applies `cmd` in the current state.
    ///
    /// A failed `Record` or `Test` (e.g. a silent recording) leaves the
    /// state unchanged so the user can retry.
    pub fn handle(&mut self, cmd: SessionCommand) -> Result<SessionEvent> {
        let state = std::mem::take(&mut self.state);
        let (next, result) = self.step(state, cmd);
        self.state = next;
        result
    }

    fn step(
        &mut self,
        state: SessionState,
        cmd: SessionCommand,
    ) -> (SessionState, Result<SessionEvent>) {
        match (state, cmd) {
            (SessionState::Idle, SessionCommand::StartEnroll(label)) => {
                if let Err(e) = validate_label(&label) {
                    return (SessionState::Idle, Err(e));
                }
                info!(label = %label, "enrollment started");
                (
                    SessionState::Enrolling(label.clone()),
                    Ok(SessionEvent::EnrollStarted { label }),
                )
            }
            (SessionState::Enrolling(label), SessionCommand::Record(w)) => {
                let result = self.record(&label, &w);
                (SessionState::Enrolling(label), result)
            }
            (SessionState::Idle, SessionCommand::StartTest) => {
                (SessionState::Testing, Ok(SessionEvent::TestStarted))
            }
            (SessionState::Testing, SessionCommand::Test(w)) => {
                let result = self
                    .gate
                    .test(&w, &self.store)
                    .map(|v| SessionEvent::Tested(Box::new(v)));
                (SessionState::Testing, result)
            }
            (SessionState::Enrolling(_) | SessionState::Testing, SessionCommand::Finish) => {
                (SessionState::Idle, Ok(SessionEvent::Finished))
            }
            (state, cmd) => {
                let err = VoiceGateError::InvalidTransition {
                    state: state.to_string(),
                    command: cmd.name().to_string(),
                };
                (state, Err(err))
            }
        }
    }

    fn record(&mut self, label: &str, waveform: &Waveform) -> Result<SessionEvent> {
        // Store the raw recording; preprocessing only decides if it is usable.
        self.gate.preprocess(waveform)?;
        let count = self.store.add_reference(label, waveform)?;
        info!(label, count, "reference stored");
        Ok(SessionEvent::Recorded {
            label: label.to_string(),
            count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::store::MemoryStore;

    fn session() -> Session<MemoryStore> {
        Session::new(VoiceGate::new(Config::default()).unwrap(), MemoryStore::new())
    }

    fn tone() -> Waveform {
        let s = (0..16000)
            .map(|i| (2.0 * std::f32::consts::PI * 220.0 * i as f32 / 16000.0).sin() * 0.5)
            .collect();
        Waveform::new(s, 16000).unwrap()
    }

    #[test]
    fn enroll_flow() {
        let mut s = session();
        s.handle(SessionCommand::StartEnroll("open".into())).unwrap();
        assert_eq!(s.state(), &SessionState::Enrolling("open".into()));

        match s.handle(SessionCommand::Record(tone())).unwrap() {
            SessionEvent::Recorded { label, count } => {
                assert_eq!(label, "open");
                assert_eq!(count, 1);
            }
            other => panic!("unexpected event {other:?}"),
        }
        s.handle(SessionCommand::Record(tone())).unwrap();
        s.handle(SessionCommand::Finish).unwrap();
        assert_eq!(s.state(), &SessionState::Idle);
        assert_eq!(s.store().count("open"), 2);
    }

    #[test]
    fn silent_recording_is_not_stored() {
        let mut s = session();
        s.handle(SessionCommand::StartEnroll("open".into())).unwrap();
        let silent = Waveform::new(vec![0.0; 16000], 16000).unwrap();
        assert!(matches!(
            s.handle(SessionCommand::Record(silent)),
            Err(VoiceGateError::PreprocessingRejected { .. })
        ));
        assert_eq!(s.state(), &SessionState::Enrolling("open".into()));
        assert_eq!(s.store().count("open"), 0);
    }

    #[test]
    fn invalid_transitions_keep_state() {
        let mut s = session();
        for cmd in [SessionCommand::Record(tone()), SessionCommand::Test(tone()), SessionCommand::Finish] {
            let err = s.handle(cmd).unwrap_err();
            assert!(matches!(err, VoiceGateError::InvalidTransition { .. }));
            assert_eq!(s.state(), &SessionState::Idle);
        }

        s.handle(SessionCommand::StartTest).unwrap();
        let err = s.handle(SessionCommand::StartEnroll("open".into())).unwrap_err();
        assert!(matches!(err, VoiceGateError::InvalidTransition { ref state, .. } if state == "testing"));
        assert_eq!(s.state(), &SessionState::Testing);
    }

    #[test]
    fn bad_label_stays_idle() {
        let mut s = session();
        assert!(matches!(
            s.handle(SessionCommand::StartEnroll("turn_on".into())),
            Err(VoiceGateError::Store(_))
        ));
        assert_eq!(s.state(), &SessionState::Idle);
    }

    #[test]
    fn test_without_enrollment_fails_without_leaving_testing() {
        let mut s = session();
        s.handle(SessionCommand::StartTest).unwrap();
        assert!(matches!(
            s.handle(SessionCommand::Test(tone())),
            Err(VoiceGateError::NoCommandsEnrolled { .. })
        ));
        assert_eq!(s.state(), &SessionState::Testing);
    }
}
