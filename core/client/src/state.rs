//! Upload attempt state machine.
//!
//! One attempt moves monotonically along
//! `Idle -> Preparing -> Uploading -> {Complete | Error}`; once a terminal
//! phase is reached the state is frozen and later inputs are ignored. A new
//! attempt constructs a new machine, never reuses one.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

use sealpost_common::Error;

use crate::frame::ProgressRecord;

/// Phase of an upload attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Phase {
    /// Attempt constructed, nothing started.
    Idle,
    /// Encrypting and building the envelope, before network I/O.
    Preparing,
    /// Request dispatched, consuming the response stream.
    Uploading,
    /// Terminal: summary and verification data available.
    Complete,
    /// Terminal: attempt failed.
    Error,
}

impl Phase {
    /// Whether this phase ends the attempt.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Complete | Phase::Error)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Idle => "idle",
            Phase::Preparing => "preparing",
            Phase::Uploading => "uploading",
            Phase::Complete => "complete",
            Phase::Error => "error",
        };
        write!(f, "{}", name)
    }
}

/// Observable state of one upload attempt.
///
/// `summary`/`phi_verification` are only set in `Complete`; `error` is only
/// set in `Error`.
#[derive(Debug, Clone, Serialize)]
pub struct UploadState {
    /// Current phase.
    pub phase: Phase,
    /// Seconds spent in `Uploading`; frozen on phase exit.
    pub elapsed_seconds: u64,
    /// Label of the most recent progress record.
    pub last_progress: String,
    /// Failure reason, terminal.
    pub error: Option<String>,
    /// Final summary text, terminal.
    pub summary: Option<String>,
    /// PHI compliance checks, terminal.
    pub phi_verification: Option<BTreeMap<String, bool>>,
}

impl UploadState {
    fn new() -> Self {
        Self {
            phase: Phase::Idle,
            elapsed_seconds: 0,
            last_progress: String::new(),
            error: None,
            summary: None,
            phi_verification: None,
        }
    }
}

/// Terminal result of a successful upload.
#[derive(Debug, Clone)]
pub struct UploadOutcome {
    /// Summary text produced by the backend.
    pub summary: String,
    /// PHI compliance checks, check name to pass/fail.
    pub phi_verification: BTreeMap<String, bool>,
    /// Total seconds spent uploading and streaming.
    pub elapsed_seconds: u64,
}

/// State machine driving one upload attempt.
pub struct StateMachine {
    state: UploadState,
}

impl StateMachine {
    /// Create a machine in `Idle`.
    pub fn new() -> Self {
        Self {
            state: UploadState::new(),
        }
    }

    /// Borrow the current state.
    pub fn state(&self) -> &UploadState {
        &self.state
    }

    /// Clone the current state for observers.
    pub fn snapshot(&self) -> UploadState {
        self.state.clone()
    }

    /// `Idle -> Preparing`, on upload start before any network I/O.
    pub fn begin_preparing(&mut self) {
        if self.state.phase == Phase::Idle {
            self.state.phase = Phase::Preparing;
            self.state.last_progress = "Preparing".to_string();
        }
    }

    /// `Preparing -> Uploading`, once the request is dispatched.
    ///
    /// Resets the elapsed counter; ticking starts from zero.
    pub fn begin_uploading(&mut self) {
        if self.state.phase == Phase::Preparing {
            self.state.phase = Phase::Uploading;
            self.state.elapsed_seconds = 0;
        }
    }

    /// Advance the elapsed counter by one second.
    ///
    /// Only counts while `Uploading`; frozen in every other phase.
    pub fn tick(&mut self) {
        if self.state.phase == Phase::Uploading {
            self.state.elapsed_seconds += 1;
        }
    }

    /// Apply one progress record while `Uploading`.
    ///
    /// Non-terminal records update the progress label; a record with `error`
    /// moves to `Error`; a record with `done` moves to `Complete`. Records
    /// arriving in any other phase (including after a terminal record) are
    /// ignored.
    pub fn apply(&mut self, record: &ProgressRecord) {
        if self.state.phase != Phase::Uploading {
            return;
        }

        if let Some(message) = &record.error {
            self.state.phase = Phase::Error;
            self.state.error = Some(message.clone());
        } else if record.done {
            self.state.phase = Phase::Complete;
            self.state.summary = record.summary.clone();
            self.state.phi_verification = record.phi_verification.clone();
        } else {
            self.state.last_progress = record.progress.clone();
        }
    }

    /// Move to `Error` with the given failure, unless already terminal.
    pub fn fail(&mut self, error: &Error) {
        if !self.state.phase.is_terminal() {
            self.state.phase = Phase::Error;
            self.state.error = Some(error.to_string());
        }
    }

    /// Signal end-of-stream.
    ///
    /// A stream that ends without a terminal record is a protocol violation;
    /// the machine resolves to `Error` with the `IncompleteStream` reason
    /// instead of hanging.
    pub fn finish_stream(&mut self) -> sealpost_common::Result<()> {
        if self.state.phase.is_terminal() {
            return Ok(());
        }
        self.state.phase = Phase::Error;
        self.state.error = Some(Error::IncompleteStream.to_string());
        Err(Error::IncompleteStream)
    }

    /// Extract the outcome after reaching `Complete`.
    pub fn outcome(&self) -> Option<UploadOutcome> {
        if self.state.phase != Phase::Complete {
            return None;
        }
        Some(UploadOutcome {
            summary: self.state.summary.clone().unwrap_or_default(),
            phi_verification: self.state.phi_verification.clone().unwrap_or_default(),
            elapsed_seconds: self.state.elapsed_seconds,
        })
    }
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

/// Format elapsed seconds as `MM:SS` for display.
pub fn format_elapsed(seconds: u64) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}
