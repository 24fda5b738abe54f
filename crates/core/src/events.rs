// crates/core/src/events.rs
use serde::{Deserialize, Serialize};

use crate::intent::CommandResult;
use crate::summary::ConfirmationSummary;

/// Per-utterance processing state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Parsing,
    Unauthenticated,
    AwaitingConfirmation,
    Executing,
    Responding,
}

/// Emitted by the command session.
#[derive(Debug, Clone, Serialize)]
pub enum SessionEvent {
    StateChanged(SessionState),
    ConfirmationRequested(ConfirmationSummary),
    Responded(CommandResult),
}

/// Capture-side state of the listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListenerState {
    Idle,
    /// Passive wake-word listening.
    Listening,
    /// Wake word heard, waiting for the command.
    Activated,
    /// Push-to-talk, accumulating transcript until silence.
    Direct,
}

/// Input from a speech recognizer (or anything that produces transcripts).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureEvent {
    StartWakeWord,
    StartDirect,
    Transcript { text: String, is_final: bool },
    /// Recognizer ended its current run; pending direct text is flushed.
    RecognitionEnded,
    Stop,
}

/// Emitted by the listener towards the command side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ListenerEvent {
    StateChanged(ListenerState),
    WakeWordDetected,
    Partial(String),
    Command(String),
}
