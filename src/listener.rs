// src/listener.rs

use std::sync::Arc;
use std::time::Duration;

use hisho_config::ListenerConfig;
use hisho_core::{CaptureEvent, ListenerEvent, ListenerState};
use hisho_observability::{MetricType, MetricsCollector};
use regex::{Regex, RegexBuilder};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tracing::{debug, info, warn};

use crate::session::SessionError;

/// Always recognised in addition to the configured wake word.
pub const BUILTIN_WAKE_WORDS: [&str; 2] = ["ヘイエージェント", "hey agent"];

/// Transcript-driven listening logic. Time is passed in, so the machine itself
/// never sleeps; [`Listener`] drives it from a task.
#[derive(Debug)]
pub struct ListenerMachine {
    wake_word: String,
    wake_patterns: Vec<Regex>,
    wake_window: Duration,
    silence_flush: Duration,
    state: ListenerState,
    pending: String,
    deadline: Option<Instant>,
}

impl ListenerMachine {
    pub fn new(config: &ListenerConfig) -> Self {
        let wake_word = config.wake_word.trim().to_string();
        Self {
            wake_patterns: wake_patterns(&wake_word),
            wake_word,
            wake_window: Duration::from_millis(config.wake_window_ms),
            silence_flush: Duration::from_millis(config.silence_flush_ms),
            state: ListenerState::Idle,
            pending: String::new(),
            deadline: None,
        }
    }

    pub fn state(&self) -> ListenerState {
        self.state
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn pending(&self) -> &str {
        &self.pending
    }

    pub fn set_wake_word(&mut self, wake_word: &str) {
        let wake_word = wake_word.trim();
        if !wake_word.is_empty() {
            self.wake_word = wake_word.to_string();
            self.wake_patterns = wake_patterns(wake_word);
        }
    }

    pub fn handle(&mut self, event: CaptureEvent, now: Instant) -> Vec<ListenerEvent> {
        match event {
            CaptureEvent::StartWakeWord => {
                self.reset();
                self.transition(ListenerState::Listening)
            }
            CaptureEvent::StartDirect => {
                self.reset();
                self.transition(ListenerState::Direct)
            }
            CaptureEvent::Stop => {
                self.reset();
                if self.state == ListenerState::Idle {
                    Vec::new()
                } else {
                    self.transition(ListenerState::Idle)
                }
            }
            CaptureEvent::Transcript { text, is_final } => {
                let text = text.trim().to_string();
                if text.is_empty() || self.state == ListenerState::Idle {
                    return Vec::new();
                }
                if is_final {
                    self.on_final(text, now)
                } else {
                    vec![ListenerEvent::Partial(text)]
                }
            }
            CaptureEvent::RecognitionEnded => {
                if self.state != ListenerState::Direct {
                    return Vec::new();
                }
                let mut events = self.flush();
                self.deadline = None;
                events.extend(self.transition(ListenerState::Idle));
                events
            }
        }
    }

    /// Called once `deadline` has passed.
    pub fn on_deadline(&mut self, now: Instant) -> Vec<ListenerEvent> {
        match self.deadline {
            Some(deadline) if deadline <= now => {}
            _ => return Vec::new(),
        }
        self.deadline = None;

        match self.state {
            ListenerState::Activated => {
                debug!("Command window expired");
                self.transition(ListenerState::Listening)
            }
            ListenerState::Direct => {
                let mut events = self.flush();
                events.extend(self.transition(ListenerState::Idle));
                events
            }
            _ => Vec::new(),
        }
    }

    fn on_final(&mut self, text: String, now: Instant) -> Vec<ListenerEvent> {
        match self.state {
            ListenerState::Direct => {
                if !self.pending.is_empty() {
                    self.pending.push(' ');
                }
                self.pending.push_str(&text);
                self.deadline = Some(now + self.silence_flush);
                vec![ListenerEvent::Partial(self.pending.clone())]
            }
            ListenerState::Listening => {
                let mut events = vec![ListenerEvent::Partial(text.clone())];
                let Some(after) = self.after_wake_word(&text) else {
                    return events;
                };

                events.push(ListenerEvent::WakeWordDetected);
                events.extend(self.transition(ListenerState::Activated));
                if after.chars().count() > 2 {
                    events.push(ListenerEvent::Command(after));
                    self.deadline = None;
                    events.extend(self.transition(ListenerState::Listening));
                } else {
                    self.deadline = Some(now + self.wake_window);
                }
                events
            }
            ListenerState::Activated => {
                let mut events = vec![ListenerEvent::Partial(text.clone())];
                let command = self.after_wake_word(&text).unwrap_or(text);
                if command.chars().count() > 1 {
                    events.push(ListenerEvent::Command(command));
                    self.deadline = None;
                    events.extend(self.transition(ListenerState::Listening));
                }
                events
            }
            ListenerState::Idle => Vec::new(),
        }
    }

    /// Text following the first wake word found, or `None` without one.
    fn after_wake_word(&self, text: &str) -> Option<String> {
        self.wake_patterns
            .iter()
            .find_map(|re| re.find(text))
            .map(|m| text[m.end()..].trim().to_string())
    }

    fn flush(&mut self) -> Vec<ListenerEvent> {
        let text = std::mem::take(&mut self.pending);
        let text = text.trim();
        if text.is_empty() {
            Vec::new()
        } else {
            vec![ListenerEvent::Command(text.to_string())]
        }
    }

    fn reset(&mut self) {
        self.pending.clear();
        self.deadline = None;
    }

    fn transition(&mut self, state: ListenerState) -> Vec<ListenerEvent> {
        self.state = state;
        vec![ListenerEvent::StateChanged(state)]
    }
}

#[derive(Debug)]
enum ControlMessage {
    SetWakeWord(String),
    Shutdown { ack: oneshot::Sender<()> },
}

/// Task wrapper around [`ListenerMachine`]: capture events in, listener events out.
pub struct Listener {
    config: ListenerConfig,
    metrics: Arc<MetricsCollector>,
    capture_tx: Option<mpsc::UnboundedSender<CaptureEvent>>,
    control_tx: Option<mpsc::Sender<ControlMessage>>,
    task: Option<JoinHandle<()>>,
    events_rx: Option<mpsc::UnboundedReceiver<ListenerEvent>>,
}

impl Listener {
    pub fn new(config: ListenerConfig, metrics: Arc<MetricsCollector>) -> Self {
        Self {
            config,
            metrics,
            capture_tx: None,
            control_tx: None,
            task: None,
            events_rx: None,
        }
    }

    pub fn start(&mut self) -> Result<(), SessionError> {
        if self.task.is_some() {
            return Err(SessionError::AlreadyRunning);
        }

        let (capture_tx, capture_rx) = mpsc::unbounded_channel();
        let (control_tx, control_rx) = mpsc::channel(4);
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let machine = ListenerMachine::new(&self.config);
        let metrics = Arc::clone(&self.metrics);

        let task = tokio::spawn(async move {
            run_listener(machine, metrics, capture_rx, control_rx, events_tx).await;
        });

        self.capture_tx = Some(capture_tx);
        self.control_tx = Some(control_tx);
        self.task = Some(task);
        self.events_rx = Some(events_rx);

        info!(wake_word = %self.config.wake_word, "Listener started");
        Ok(())
    }

    /// Sender for the speech recognizer side.
    pub fn capture_sender(&self) -> Option<mpsc::UnboundedSender<CaptureEvent>> {
        self.capture_tx.clone()
    }

    pub fn send(&self, event: CaptureEvent) -> Result<(), SessionError> {
        self.capture_tx
            .as_ref()
            .ok_or(SessionError::NotRunning)?
            .send(event)
            .map_err(|err| SessionError::SendError(err.to_string()))
    }

    pub fn take_event_receiver(&mut self) -> Option<mpsc::UnboundedReceiver<ListenerEvent>> {
        self.events_rx.take()
    }

    pub async fn set_wake_word(&mut self, wake_word: &str) -> Result<(), SessionError> {
        self.config.wake_word = wake_word.to_string();
        let tx = self.control_tx.as_ref().ok_or(SessionError::NotRunning)?;
        tx.send(ControlMessage::SetWakeWord(wake_word.to_string()))
            .await
            .map_err(|err| SessionError::SendError(err.to_string()))
    }

    pub async fn stop(&mut self) -> Result<(), SessionError> {
        let tx = self.control_tx.take().ok_or(SessionError::NotRunning)?;
        let task = self.task.take().ok_or(SessionError::NotRunning)?;
        self.capture_tx = None;

        let (ack_tx, ack_rx) = oneshot::channel();
        tx.send(ControlMessage::Shutdown { ack: ack_tx })
            .await
            .map_err(|err| SessionError::SendError(err.to_string()))?;

        if ack_rx.await.is_err() {
            warn!("Listener shutdown acknowledgement was dropped");
        }

        task.await.map_err(|err| SessionError::Join(err.to_string()))?;
        info!("Listener stopped");
        Ok(())
    }
}

async fn run_listener(
    mut machine: ListenerMachine,
    metrics: Arc<MetricsCollector>,
    mut capture_rx: mpsc::UnboundedReceiver<CaptureEvent>,
    mut control_rx: mpsc::Receiver<ControlMessage>,
    events_tx: mpsc::UnboundedSender<ListenerEvent>,
) {
    loop {
        let deadline = machine.deadline();
        let events = tokio::select! {
            biased;

            Some(message) = control_rx.recv() => match message {
                ControlMessage::SetWakeWord(word) => {
                    machine.set_wake_word(&word);
                    info!(wake_word = %word, "Wake word updated");
                    continue;
                }
                ControlMessage::Shutdown { ack } => {
                    let _ = ack.send(());
                    break;
                }
            },
            event = capture_rx.recv() => match event {
                Some(event) => machine.handle(event, Instant::now()),
                None => break,
            },
            _ = time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                if machine.state() == ListenerState::Activated {
                    metrics.increment(MetricType::ListenerTimeouts);
                }
                machine.on_deadline(Instant::now())
            }
        };

        for event in events {
            if event == ListenerEvent::WakeWordDetected {
                metrics.increment(MetricType::WakeWordsDetected);
            }
            if events_tx.send(event).is_err() {
                debug!("Listener event receiver dropped");
            }
        }
    }

    debug!("Listener loop finished");
}

/// Case-insensitive matchers for the configured word and the built-in ones.
/// Matching runs on the original text, so offsets always fall on its char
/// boundaries.
fn wake_patterns(configured: &str) -> Vec<Regex> {
    std::iter::once(configured)
        .chain(BUILTIN_WAKE_WORDS)
        .filter(|w| !w.is_empty())
        .filter_map(|word| {
            match RegexBuilder::new(&regex::escape(word))
                .case_insensitive(true)
                .build()
            {
                Ok(re) => Some(re),
                Err(e) => {
                    warn!(wake_word = %word, error = %e, "Skipping unusable wake word");
                    None
                }
            }
        })
        .collect()
}
