// src/app.rs

use std::sync::Arc;

use hisho_actions::{
    ActionsConfig, Collaborators, Confirmer, Gate, IntentDispatcher, NoteStore, StaticTokenAuth,
    TimerFired, TokioTimer, WebSearch,
};
use hisho_config::{HishoConfig, Settings};
use hisho_core::{CommandResult, HishoResult, Intent, KeyValueStore};
use hisho_llm_connector::LlmConnector;
use hisho_nlu::{IntentParser, NluConfig, NluMode, RemoteClassifier};
use hisho_observability::{MetricType, MetricsCollector};
use parking_lot::RwLock;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::history::CommandHistory;

/// Parser, dispatcher and history behind one object. This is what a UI or
/// voice host talks to.
pub struct Assistant {
    parser: RwLock<Arc<IntentParser>>,
    dispatcher: IntentDispatcher,
    history: CommandHistory,
    metrics: Arc<MetricsCollector>,
}

impl Assistant {
    pub fn new(
        parser: IntentParser,
        dispatcher: IntentDispatcher,
        history: CommandHistory,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        Self {
            parser: RwLock::new(Arc::new(parser)),
            dispatcher,
            history,
            metrics,
        }
    }

    /// Rules only, no collaborators, in-memory history.
    pub fn local() -> HishoResult<Self> {
        let parser = IntentParser::new(NluConfig {
            mode: NluMode::Local,
            ..NluConfig::default()
        })?;
        Ok(Self::new(
            parser,
            IntentDispatcher::new(ActionsConfig::default(), Collaborators::default()),
            CommandHistory::new(crate::history::DEFAULT_HISTORY_LIMIT),
            Arc::new(MetricsCollector::new(true)),
        ))
    }

    pub fn parser(&self) -> Arc<IntentParser> {
        self.parser.read().clone()
    }

    pub fn dispatcher(&self) -> &IntentDispatcher {
        &self.dispatcher
    }

    pub fn history(&self) -> &CommandHistory {
        &self.history
    }

    pub fn metrics(&self) -> &Arc<MetricsCollector> {
        &self.metrics
    }

    pub async fn parse_intent(&self, text: &str) -> Intent {
        let parser = self.parser();
        self.metrics.increment(MetricType::Utterances);
        if parser.remote_enabled() {
            self.metrics.increment(MetricType::RemoteClassifications);
        }
        let intent = parser.parse(text).await;
        debug!(intent = %intent.kind(), "Utterance classified");
        intent
    }

    /// Runs the confirmation gate and the collaborator call, then records the result.
    pub async fn dispatch(
        &self,
        intent: &Intent,
        raw_text: &str,
        confirmer: &dyn Confirmer,
    ) -> CommandResult {
        let result = match self.gate(intent, raw_text) {
            Gate::Done(result) => result,
            Gate::Confirm(summary) => {
                if confirmer.confirm(&summary).await {
                    self.dispatcher.execute(intent, raw_text).await
                } else {
                    self.cancelled(intent, raw_text)
                }
            }
            Gate::Execute => self.dispatcher.execute(intent, raw_text).await,
        };
        self.record(&result);
        result
    }

    /// Parse and dispatch in one step.
    pub async fn handle(&self, text: &str, confirmer: &dyn Confirmer) -> CommandResult {
        let raw_text = text.trim();
        let intent = self.parse_intent(raw_text).await;
        self.dispatch(&intent, raw_text, confirmer).await
    }

    pub(crate) fn gate(&self, intent: &Intent, raw_text: &str) -> Gate {
        let gate = self.dispatcher.gate(intent, raw_text);
        if matches!(gate, Gate::Confirm(_)) {
            self.metrics.increment(MetricType::ConfirmationsRequested);
        }
        gate
    }

    pub(crate) fn cancelled(&self, intent: &Intent, raw_text: &str) -> CommandResult {
        self.metrics.increment(MetricType::Cancellations);
        self.dispatcher.cancelled(intent, raw_text)
    }

    /// Appends a terminal result to history and counters.
    pub(crate) fn record(&self, result: &CommandResult) {
        self.metrics.record_command(result);
        self.history.push(result.clone());
    }

    /// Swaps in a parser built from new settings, e.g. after a config reload
    /// or a credential change.
    pub fn refresh_parser(&self, parser: IntentParser) {
        *self.parser.write() = Arc::new(parser);
        info!("Intent parser refreshed");
    }
}

/// Services created by [`build_assistant`] that the host still needs.
pub struct Runtime {
    pub assistant: Arc<Assistant>,
    pub auth: Arc<StaticTokenAuth>,
    pub timer: Arc<TokioTimer>,
    pub timer_rx: mpsc::UnboundedReceiver<TimerFired>,
}

/// Wires the assistant from configuration and the settings store. Services in
/// `collaborators` win over the built-in ones.
pub fn build_assistant(
    config: &HishoConfig,
    store: Arc<dyn KeyValueStore>,
    mut collaborators: Collaborators,
) -> HishoResult<Runtime> {
    let settings = Settings::new(store.clone());
    let parser = build_parser(config.nlu.clone(), &settings)?;

    let auth = Arc::new(StaticTokenAuth::new());
    let (timer, timer_rx) = TokioTimer::new();
    let timer = Arc::new(timer);

    if collaborators.auth.is_none() {
        collaborators.auth = Some(auth.clone());
    }
    if collaborators.timer.is_none() {
        collaborators.timer = Some(timer.clone());
    }
    if collaborators.notes.is_none() {
        collaborators.notes = Some(Arc::new(NoteStore::open(
            store.clone(),
            config.actions.notes_list_limit,
        )));
    }
    if collaborators.search.is_none() {
        collaborators.search = Some(Arc::new(WebSearch::new(
            config.actions.search_base_url.clone(),
            config.actions.open_in_browser,
        )));
    }

    let dispatcher = IntentDispatcher::new(config.actions.clone(), collaborators);
    let history = CommandHistory::open(store, config.app.history_limit);
    let metrics = Arc::new(MetricsCollector::new(config.metrics.enabled));

    Ok(Runtime {
        assistant: Arc::new(Assistant::new(parser, dispatcher, history, metrics)),
        auth,
        timer,
        timer_rx,
    })
}

/// Builds the parser, attaching the remote classifier when the mode allows it
/// and a credential is found in settings or the environment.
pub fn build_parser(config: NluConfig, settings: &Settings) -> HishoResult<IntentParser> {
    let remote = match config.mode {
        NluMode::Local => None,
        NluMode::Hybrid => remote_credential(&config, settings).and_then(|key| {
            match LlmConnector::openai(config.remote.clone(), key) {
                Ok(connector) => Some(RemoteClassifier::new(connector)),
                Err(e) => {
                    warn!(error = %e, "Remote classifier disabled");
                    None
                }
            }
        }),
    };

    let mut parser = IntentParser::new(config)?;
    parser.set_remote(remote);
    Ok(parser)
}

fn remote_credential(config: &NluConfig, settings: &Settings) -> Option<String> {
    match settings.remote_classifier_key() {
        Ok(Some(key)) => return Some(key),
        Ok(None) => {}
        Err(e) => warn!(error = %e, "Failed to read remote classifier key"),
    }
    std::env::var(&config.remote.api_key_env)
        .ok()
        .map(|key| key.trim().to_string())
        .filter(|key| !key.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use hisho_core::{ConfirmationSummary, IntentKind, MemoryStore};
    use async_trait::async_trait;

    struct Always(bool);

    #[async_trait]
    impl Confirmer for Always {
        async fn confirm(&self, _summary: &ConfirmationSummary) -> bool {
            self.0
        }
    }

    #[tokio::test]
    async fn local_assistant_records_every_result() {
        let assistant = Assistant::local().unwrap();
        let unknown = assistant.handle("こんにちは", &Always(true)).await;
        assert!(!unknown.is_success());

        let calc = assistant.handle("100+200を計算して", &Always(true)).await;
        assert_eq!(calc.kind(), IntentKind::Calculate);
        assert_eq!(calc.response(), "100+200 = 300");

        let entries = assistant.history().entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].kind(), IntentKind::Calculate);
        let summary = assistant.metrics().get_health_status().metrics;
        assert_eq!(summary.utterances, 2);
        assert_eq!(summary.commands_failed, 1);
    }

    #[tokio::test]
    async fn built_in_notes_and_search_are_wired() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let mut config = HishoConfig::default();
        config.nlu.mode = NluMode::Local;
        let runtime = build_assistant(&config, store.clone(), Collaborators::default()).unwrap();
        let assistant = runtime.assistant;

        let saved = assistant.handle("牛乳を買うをメモして", &Always(true)).await;
        assert!(saved.is_success(), "{}", saved.response());
        let listed = assistant.handle("メモ一覧", &Always(true)).await;
        assert!(listed.response().contains("牛乳を買う"));

        let search = assistant.handle("rustを検索して", &Always(true)).await;
        assert!(search.response().contains("https://www.google.com/search?q=rust"));

        assert!(store.get(crate::history::HISTORY_KEY).unwrap().is_some());
    }

    #[tokio::test]
    async fn sign_in_unlocks_google_intents() {
        let mut config = HishoConfig::default();
        config.nlu.mode = NluMode::Local;
        let runtime =
            build_assistant(&config, Arc::new(MemoryStore::new()), Collaborators::default())
                .unwrap();

        let before = runtime.assistant.handle("タスクを確認して", &Always(true)).await;
        assert_eq!(before.response(), hisho_actions::dispatcher::SIGN_IN_MESSAGE);

        runtime.auth.sign_in("token", chrono::Duration::hours(1));
        let after = runtime.assistant.handle("タスクを確認して", &Always(true)).await;
        // Signed in, but no task service is wired.
        assert!(after.response().starts_with("エラー: "));
    }

    #[test]
    fn local_mode_never_builds_remote() {
        let settings = Settings::new(Arc::new(MemoryStore::new()));
        settings.set_remote_classifier_key("sk-test").unwrap();

        let local = build_parser(
            NluConfig {
                mode: NluMode::Local,
                ..NluConfig::default()
            },
            &settings,
        )
        .unwrap();
        assert!(!local.remote_enabled());

        let hybrid = build_parser(NluConfig::default(), &settings).unwrap();
        assert!(hybrid.remote_enabled());
    }
}
