// src/session.rs

use std::sync::Arc;
use std::time::Duration;

use hisho_actions::Gate;
use hisho_config::SessionConfig;
use hisho_core::{CommandResult, ConfirmationSummary, Intent, SessionEvent, SessionState};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{debug, info, warn};

use crate::app::Assistant;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("task already running")]
    AlreadyRunning,
    #[error("task not running")]
    NotRunning,
    #[error("failed to send message: {0}")]
    SendError(String),
    #[error("task failed: {0}")]
    Join(String),
}

#[derive(Debug)]
enum SessionInput {
    Command(String),
    Confirm(bool),
    Shutdown { ack: oneshot::Sender<()> },
}

/// Outcome of waiting for a yes/no answer.
enum Answer {
    Yes,
    No,
    /// Shutdown arrived mid-confirmation; the ack is sent once the result is out.
    Shutdown(Option<oneshot::Sender<()>>),
}

/// Host-side view of whether the session is waiting for a yes/no answer.
/// Fed every [`SessionEvent`]; a confirmation that was answered, timed out
/// or cancelled leaves nothing pending, so the next line is a new command.
#[derive(Debug, Default)]
pub struct ConfirmationTracker {
    pending: Option<ConfirmationSummary>,
}

impl ConfirmationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, event: &SessionEvent) {
        match event {
            SessionEvent::ConfirmationRequested(summary) => self.pending = Some(summary.clone()),
            SessionEvent::Responded(_) | SessionEvent::StateChanged(SessionState::Idle) => {
                self.pending = None;
            }
            SessionEvent::StateChanged(_) => {}
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Reads `line` as the answer when a confirmation is pending and clears it.
    pub fn answer(&mut self, line: &str) -> Option<bool> {
        self.pending.take().map(|_| is_affirmative(line))
    }
}

/// `はい`, `yes` or `y`, ignoring case and surrounding whitespace.
pub fn is_affirmative(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "はい" | "yes" | "y")
}

/// Runs one utterance at a time through parse, gate, confirmation and
/// execution. Commands arriving while one is in flight wait in the queue,
/// except during a confirmation, where they are dropped.
pub struct Session {
    assistant: Arc<Assistant>,
    config: SessionConfig,
    input_tx: Option<mpsc::UnboundedSender<SessionInput>>,
    task: Option<JoinHandle<()>>,
    events_rx: Option<mpsc::UnboundedReceiver<SessionEvent>>,
}

impl Session {
    pub fn new(assistant: Arc<Assistant>, config: SessionConfig) -> Self {
        Self {
            assistant,
            config,
            input_tx: None,
            task: None,
            events_rx: None,
        }
    }

    pub fn start(&mut self) -> Result<(), SessionError> {
        if self.task.is_some() {
            return Err(SessionError::AlreadyRunning);
        }

        let (input_tx, input_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let assistant = Arc::clone(&self.assistant);
        let timeout = Duration::from_secs(self.config.confirmation_timeout_s);

        let task = tokio::spawn(async move {
            run_session(assistant, timeout, input_rx, events_tx).await;
        });

        self.input_tx = Some(input_tx);
        self.task = Some(task);
        self.events_rx = Some(events_rx);

        info!("Command session started");
        Ok(())
    }

    pub fn submit(&self, text: impl Into<String>) -> Result<(), SessionError> {
        self.send(SessionInput::Command(text.into()))
    }

    pub fn confirm(&self, approved: bool) -> Result<(), SessionError> {
        self.send(SessionInput::Confirm(approved))
    }

    pub fn take_event_receiver(&mut self) -> Option<mpsc::UnboundedReceiver<SessionEvent>> {
        self.events_rx.take()
    }

    pub fn is_running(&self) -> bool {
        self.task.is_some()
    }

    pub async fn stop(&mut self) -> Result<(), SessionError> {
        let tx = self.input_tx.take().ok_or(SessionError::NotRunning)?;
        let task = self.task.take().ok_or(SessionError::NotRunning)?;

        let (ack_tx, ack_rx) = oneshot::channel();
        tx.send(SessionInput::Shutdown { ack: ack_tx })
            .map_err(|err| SessionError::SendError(err.to_string()))?;

        if ack_rx.await.is_err() {
            warn!("Session shutdown acknowledgement was dropped");
        }

        task.await.map_err(|err| SessionError::Join(err.to_string()))?;
        info!("Command session stopped");
        Ok(())
    }

    fn send(&self, input: SessionInput) -> Result<(), SessionError> {
        self.input_tx
            .as_ref()
            .ok_or(SessionError::NotRunning)?
            .send(input)
            .map_err(|err| SessionError::SendError(err.to_string()))
    }
}

async fn run_session(
    assistant: Arc<Assistant>,
    confirmation_timeout: Duration,
    mut input_rx: mpsc::UnboundedReceiver<SessionInput>,
    events_tx: mpsc::UnboundedSender<SessionEvent>,
) {
    let emit = |event: SessionEvent| {
        let _ = events_tx.send(event);
    };

    while let Some(input) = input_rx.recv().await {
        match input {
            SessionInput::Shutdown { ack } => {
                let _ = ack.send(());
                break;
            }
            SessionInput::Confirm(_) => {
                warn!("Confirmation received with nothing pending");
            }
            SessionInput::Command(text) => {
                let raw_text = text.trim().to_string();
                if raw_text.is_empty() {
                    continue;
                }

                emit(SessionEvent::StateChanged(SessionState::Parsing));
                let intent = assistant.parse_intent(&raw_text).await;

                let (result, shutdown) = match assistant.gate(&intent, &raw_text) {
                    Gate::Done(result) => {
                        if intent.requires_auth() && !assistant.dispatcher().is_authenticated() {
                            emit(SessionEvent::StateChanged(SessionState::Unauthenticated));
                        }
                        (result, None)
                    }
                    Gate::Confirm(summary) => {
                        emit(SessionEvent::StateChanged(SessionState::AwaitingConfirmation));
                        emit(SessionEvent::ConfirmationRequested(summary.clone()));

                        match await_answer(&mut input_rx, &summary, confirmation_timeout).await {
                            Answer::Yes => {
                                emit(SessionEvent::StateChanged(SessionState::Executing));
                                (execute(&assistant, &intent, &raw_text).await, None)
                            }
                            Answer::No => (assistant.cancelled(&intent, &raw_text), None),
                            Answer::Shutdown(ack) => {
                                (assistant.cancelled(&intent, &raw_text), Some(ack))
                            }
                        }
                    }
                    Gate::Execute => {
                        emit(SessionEvent::StateChanged(SessionState::Executing));
                        (execute(&assistant, &intent, &raw_text).await, None)
                    }
                };

                assistant.record(&result);
                emit(SessionEvent::StateChanged(SessionState::Responding));
                emit(SessionEvent::Responded(result));
                emit(SessionEvent::StateChanged(SessionState::Idle));

                if let Some(ack) = shutdown {
                    if let Some(ack) = ack {
                        let _ = ack.send(());
                    }
                    break;
                }
            }
        }
    }

    debug!("Command session loop finished");
}

async fn execute(assistant: &Assistant, intent: &Intent, raw_text: &str) -> CommandResult {
    assistant.dispatcher().execute(intent, raw_text).await
}

/// Waits for Confirm; new commands are dropped. Silence past the timeout is a no.
async fn await_answer(
    input_rx: &mut mpsc::UnboundedReceiver<SessionInput>,
    summary: &ConfirmationSummary,
    timeout: Duration,
) -> Answer {
    let deadline = time::sleep(timeout);
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            input = input_rx.recv() => match input {
                Some(SessionInput::Confirm(true)) => return Answer::Yes,
                Some(SessionInput::Confirm(false)) => return Answer::No,
                Some(SessionInput::Command(text)) => {
                    warn!(command = %text, "Ignoring command while awaiting confirmation");
                }
                Some(SessionInput::Shutdown { ack }) => return Answer::Shutdown(Some(ack)),
                None => return Answer::Shutdown(None),
            },
            _ = &mut deadline => {
                info!(title = %summary.title, "Confirmation timed out");
                return Answer::No;
            }
        }
    }
}
