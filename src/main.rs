// src/main.rs

use std::sync::Arc;

use anyhow::{Context, Result};
use hisho::{build_assistant, build_parser, ConfirmationTracker, Listener, Session};
use hisho_actions::Collaborators;
use hisho_config::{ConfigManager, JsonFileStore, Settings, DEFAULT_CONFIG_PATH};
use hisho_core::{CaptureEvent, KeyValueStore, ListenerEvent, SessionEvent};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    init_logging()?;

    info!("Starting hisho v{}", env!("CARGO_PKG_VERSION"));

    let config_path =
        std::env::var("HISHO_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let mut manager = ConfigManager::open(&config_path).context("failed to load configuration")?;
    let mut config = manager.get();

    let store: Arc<dyn KeyValueStore> = Arc::new(
        JsonFileStore::open(&config.storage.settings_file).context("failed to open settings")?,
    );
    let settings = Settings::new(store.clone());
    if let Some(wake_word) = settings.wake_word()? {
        config.listener.wake_word = wake_word;
    }

    let runtime = build_assistant(&config, store, Collaborators::default())?;
    let assistant = runtime.assistant.clone();
    let mut timer_rx = runtime.timer_rx;

    let mut session = Session::new(assistant.clone(), config.session.clone());
    session.start()?;
    let mut session_events = session
        .take_event_receiver()
        .context("session events already taken")?;

    let mut listener = Listener::new(config.listener.clone(), assistant.metrics().clone());
    listener.start()?;
    let mut listener_events = listener
        .take_event_receiver()
        .context("listener events already taken")?;
    let start_event = if config.listener.direct_mode {
        CaptureEvent::StartDirect
    } else {
        CaptureEvent::StartWakeWord
    };
    listener.send(start_event.clone())?;

    let mut config_updates = match manager.enable_hot_reload() {
        Ok(rx) => rx,
        Err(e) => {
            warn!(error = %e, "Configuration hot reload disabled");
            mpsc::unbounded_channel().1
        }
    };

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut confirmation = ConfirmationTracker::new();

    println!("入力してください (:history / :status / :quit)");

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let line = line.trim().to_string();
                if line.is_empty() {
                    continue;
                }

                if let Some(approved) = confirmation.answer(&line) {
                    session.confirm(approved)?;
                    continue;
                }

                match line.as_str() {
                    ":quit" => break,
                    ":history" => {
                        for entry in assistant.history().entries() {
                            println!(
                                "{} [{}] {} -> {}",
                                entry.timestamp().format("%m/%d %H:%M"),
                                entry.kind().label(),
                                entry.raw_text(),
                                entry.response()
                            );
                        }
                    }
                    ":status" => {
                        let health = assistant.metrics().get_health_status();
                        println!("{}", serde_json::to_string_pretty(&health)?);
                        println!("{}", assistant.metrics().render_prometheus()?);
                    }
                    _ => listener.send(CaptureEvent::Transcript { text: line, is_final: true })?,
                }
            }
            Some(event) = listener_events.recv() => match event {
                ListenerEvent::Command(text) => {
                    session.submit(text)?;
                    if config.listener.direct_mode {
                        listener.send(start_event.clone())?;
                    }
                }
                ListenerEvent::WakeWordDetected => println!("はい、どうぞ"),
                ListenerEvent::StateChanged(state) => debug!(?state, "Listener state"),
                ListenerEvent::Partial(text) => debug!(%text, "Partial transcript"),
            },
            Some(event) = session_events.recv() => {
                confirmation.observe(&event);
                match event {
                    SessionEvent::ConfirmationRequested(summary) => {
                        println!("{}", summary.render());
                        println!("{} (はい/いいえ)", summary.message);
                    }
                    SessionEvent::Responded(result) => println!("{}", result.response()),
                    SessionEvent::StateChanged(state) => debug!(?state, "Session state"),
                }
            }
            Some(fired) = timer_rx.recv() => println!("{}", fired.message),
            Some(update) = config_updates.recv() => {
                info!(sections = ?update.changed_sections, "Configuration updated");
                if update.changed_sections.iter().any(|s| s == "nlu") {
                    match build_parser(update.new_config.nlu.clone(), &settings) {
                        Ok(parser) => assistant.refresh_parser(parser),
                        Err(e) => error!(error = %e, "Failed to rebuild intent parser"),
                    }
                }
                if update.changed_sections.iter().any(|s| s == "listener") {
                    listener.set_wake_word(&update.new_config.listener.wake_word).await?;
                }
            }
            _ = signal::ctrl_c() => {
                info!("Received shutdown signal");
                break;
            }
        }
    }

    listener.stop().await?;
    session.stop().await?;
    runtime.timer.cancel_all();

    info!("hisho shut down successfully");
    Ok(())
}

fn init_logging() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hisho=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    Ok(())
}
