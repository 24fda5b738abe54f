// tests/assistant_flow.rs

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use hisho::{build_assistant, Assistant, Session};
use hisho_actions::dispatcher::{CANCELLED_MESSAGE, SIGN_IN_MESSAGE};
use hisho_actions::{
    AuthProvider, CalendarService, Collaborators, Confirmer, MailService, TaskService,
};
use hisho_config::{HishoConfig, JsonFileStore, NluMode, SessionConfig};
use hisho_core::{
    AuthError, CommandResult, ConfirmationSummary, HishoError, HishoResult, Intent, IntentKind,
    MemoryStore, SessionEvent, SessionState,
};
use hisho_llm_connector::{CompletionProvider, CompletionRequest, CompletionResponse, LlmConfig, LlmConnector};
use hisho_nlu::{IntentParser, NluConfig, RemoteClassifier};
use parking_lot::Mutex;

struct SignedIn(bool);

#[async_trait]
impl AuthProvider for SignedIn {
    fn is_authenticated(&self) -> bool {
        self.0
    }

    async fn access_token(&self) -> Result<String, AuthError> {
        if self.0 {
            Ok("token".to_string())
        } else {
            Err(AuthError::Unauthenticated)
        }
    }
}

/// Counts every call and remembers the arguments.
#[derive(Default)]
struct Google {
    calls: AtomicUsize,
    args: Mutex<Vec<String>>,
}

impl Google {
    fn hit(&self, args: String) -> HishoResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.args.lock().push(args.clone());
        Ok(format!("done: {}", args))
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MailService for Google {
    async fn send_email(&self, to: &str, subject: &str, body: &str) -> HishoResult<String> {
        self.hit(format!("mail {}|{}|{}", to, subject, body))
    }

    async fn unread_summary(&self) -> HishoResult<String> {
        self.hit("unread".to_string())
    }
}

#[async_trait]
impl CalendarService for Google {
    async fn create_event(&self, title: &str, date: &str, time: &str) -> HishoResult<String> {
        self.hit(format!("event {}|{}|{}", title, date, time))
    }

    async fn events_summary(&self, date: &str) -> HishoResult<String> {
        self.hit(format!("events {}", date))
    }
}

#[async_trait]
impl TaskService for Google {
    async fn create_task(&self, title: &str, notes: &str, due: Option<&str>) -> HishoResult<String> {
        self.hit(format!("task {}|{}|{:?}", title, notes, due))
    }

    async fn tasks_summary(&self) -> HishoResult<String> {
        self.hit("tasks".to_string())
    }
}

struct Answer {
    approve: bool,
    asked: Mutex<Vec<ConfirmationSummary>>,
}

impl Answer {
    fn new(approve: bool) -> Self {
        Self {
            approve,
            asked: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl Confirmer for Answer {
    async fn confirm(&self, summary: &ConfirmationSummary) -> bool {
        self.asked.lock().push(summary.clone());
        self.approve
    }
}

fn local_config() -> HishoConfig {
    let mut config = HishoConfig::default();
    config.nlu.mode = NluMode::Local;
    config
}

fn assistant(signed_in: bool, google: &Arc<Google>) -> Arc<Assistant> {
    let collaborators = Collaborators {
        auth: Some(Arc::new(SignedIn(signed_in))),
        mail: Some(google.clone()),
        calendar: Some(google.clone()),
        tasks: Some(google.clone()),
        ..Collaborators::default()
    };
    build_assistant(&local_config(), Arc::new(MemoryStore::new()), collaborators)
        .unwrap()
        .assistant
}

#[tokio::test]
async fn email_request_is_parsed_and_confirmed() {
    let google = Arc::new(Google::default());
    let assistant = assistant(true, &google);

    let intent = assistant.parse_intent("田中さんにメールして").await;
    assert_eq!(
        intent,
        Intent::SendEmail {
            to: "田中さん".to_string(),
            subject: String::new(),
            body: String::new(),
        }
    );

    let answer = Answer::new(true);
    let result = assistant.dispatch(&intent, "田中さんにメールして", &answer).await;
    assert!(result.is_success());
    assert_eq!(answer.asked.lock().len(), 1);
    assert_eq!(google.args.lock()[0], "mail 田中さん||");
}

#[tokio::test]
async fn event_request_uses_extracted_slots() {
    let google = Arc::new(Google::default());
    let assistant = assistant(true, &google);
    let answer = Answer::new(true);

    let result = assistant.handle("明日の10時に会議を予定に入れて", &answer).await;
    assert_eq!(
        result.intent(),
        &Intent::CreateEvent {
            title: "会議".to_string(),
            date: "tomorrow".to_string(),
            time: "10:00".to_string(),
        }
    );
    assert!(result.is_success());

    let summary = answer.asked.lock()[0].clone();
    assert!(summary.message.contains("会議"));
    assert_eq!(google.args.lock()[0], "event 会議|tomorrow|10:00");
}

#[tokio::test]
async fn unread_mail_skips_confirmation() {
    let google = Arc::new(Google::default());
    let assistant = assistant(true, &google);
    let answer = Answer::new(false);

    let result = assistant.handle("未読メールを確認して", &answer).await;
    assert_eq!(result.kind(), IntentKind::CheckEmail);
    assert!(result.is_success());
    assert!(answer.asked.lock().is_empty());
    assert_eq!(google.calls(), 1);
}

#[tokio::test]
async fn greeting_is_not_understood() {
    let google = Arc::new(Google::default());
    let assistant = assistant(true, &google);

    let result = assistant.handle("こんにちは", &Answer::new(true)).await;
    assert_eq!(
        result.intent(),
        &Intent::Unknown {
            raw_text: "こんにちは".to_string()
        }
    );
    assert!(!result.is_success());
    assert_eq!(
        result.response(),
        "「こんにちは」を理解できませんでした。もう一度お試しください。"
    );
    assert_eq!(google.calls(), 0);
}

#[tokio::test]
async fn signed_out_task_list_prompts_for_sign_in() {
    let google = Arc::new(Google::default());
    let assistant = assistant(false, &google);
    let answer = Answer::new(true);

    let result = assistant.handle("タスクを確認して", &answer).await;
    assert!(!result.is_success());
    assert_eq!(result.response(), SIGN_IN_MESSAGE);
    assert_eq!(google.calls(), 0);

    // Sign-in is checked before anything is asked.
    assistant.handle("会議をタスクに追加", &answer).await;
    assert!(answer.asked.lock().is_empty());
    assert_eq!(google.calls(), 0);
}

#[tokio::test]
async fn declined_confirmation_never_calls_the_service() {
    let google = Arc::new(Google::default());
    let assistant = assistant(true, &google);

    let result = assistant.handle("田中さんにメールして", &Answer::new(false)).await;
    assert!(!result.is_success());
    assert_eq!(result.response(), CANCELLED_MESSAGE);
    assert_eq!(google.calls(), 0);

    let latest = assistant.history().latest().unwrap();
    assert_eq!(latest.id(), result.id());
}

#[tokio::test]
async fn history_is_capped_and_newest_first() {
    let google = Arc::new(Google::default());
    let assistant = assistant(true, &google);
    let answer = Answer::new(true);

    for n in 0..55 {
        assistant.handle(&format!("{}+1を計算して", n), &answer).await;
    }

    let entries = assistant.history().entries();
    assert_eq!(entries.len(), 50);
    assert_eq!(entries[0].response(), "54+1 = 55");
}

async fn wait_for_confirmation(
    events: &mut tokio::sync::mpsc::UnboundedReceiver<SessionEvent>,
) -> (Vec<SessionState>, ConfirmationSummary) {
    let mut states = Vec::new();
    while let Some(event) = events.recv().await {
        match event {
            SessionEvent::StateChanged(state) => states.push(state),
            SessionEvent::ConfirmationRequested(summary) => return (states, summary),
            SessionEvent::Responded(result) => panic!("unexpected result: {}", result.response()),
        }
    }
    panic!("session closed before asking for confirmation");
}

async fn wait_for_result(
    events: &mut tokio::sync::mpsc::UnboundedReceiver<SessionEvent>,
) -> CommandResult {
    while let Some(event) = events.recv().await {
        if let SessionEvent::Responded(result) = event {
            return result;
        }
    }
    panic!("session closed without a result");
}

#[tokio::test]
async fn session_confirm_round_trip() {
    let google = Arc::new(Google::default());
    let mut session = Session::new(assistant(true, &google), SessionConfig::default());
    session.start().unwrap();
    let mut events = session.take_event_receiver().unwrap();

    session.submit("田中さんにメールして").unwrap();
    let (states, summary) = wait_for_confirmation(&mut events).await;
    assert_eq!(
        states,
        vec![SessionState::Parsing, SessionState::AwaitingConfirmation]
    );
    assert_eq!(summary.title, "メール送信");

    // Dropped while the confirmation is pending.
    session.submit("未読メールを確認して").unwrap();
    session.confirm(true).unwrap();

    let result = wait_for_result(&mut events).await;
    assert!(result.is_success());
    assert_eq!(result.kind(), IntentKind::SendEmail);
    assert_eq!(google.calls(), 1);

    session.stop().await.unwrap();
    assert_eq!(google.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn unanswered_confirmation_times_out_as_cancel() {
    let google = Arc::new(Google::default());
    let mut session = Session::new(
        assistant(true, &google),
        SessionConfig {
            confirmation_timeout_s: 5,
        },
    );
    session.start().unwrap();
    let mut events = session.take_event_receiver().unwrap();

    session.submit("牛乳を買うをメモして").unwrap();
    let result = wait_for_result(&mut events).await;
    assert_eq!(result.response(), CANCELLED_MESSAGE);
    assert_eq!(google.calls(), 0);

    session.stop().await.unwrap();
}

struct Scripted {
    reply: HishoResult<&'static str>,
    calls: AtomicUsize,
}

#[async_trait]
impl CompletionProvider for Scripted {
    async fn complete(&self, _request: CompletionRequest) -> HishoResult<CompletionResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.reply {
            Ok(content) => Ok(CompletionResponse {
                content: content.to_string(),
                ..CompletionResponse::default()
            }),
            Err(e) => Err(HishoError::Network(e.to_string())),
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

fn hybrid_parser(provider: Arc<Scripted>) -> IntentParser {
    let connector = LlmConnector::new(
        LlmConfig {
            cache_enabled: false,
            ..LlmConfig::default()
        },
        provider,
    );
    IntentParser::new(NluConfig::default())
        .unwrap()
        .with_remote(RemoteClassifier::new(connector))
}

#[tokio::test]
async fn remote_classification_is_preferred_when_valid() {
    let provider = Arc::new(Scripted {
        reply: Ok(r#"{"intent":"weather","params":{"location":"大阪"}}"#),
        calls: AtomicUsize::new(0),
    });
    let parser = hybrid_parser(provider.clone());

    let intent = parser.parse("明日の大阪ってどう").await;
    assert_eq!(
        intent,
        Intent::Weather {
            location: "大阪".to_string(),
        }
    );
    assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn remote_failures_fall_back_to_rules() {
    for reply in [
        Err(HishoError::Network("connection refused".to_string())),
        Ok("I think you want the weather"),
        Ok(r#"{"intent":"order_pizza","params":{}}"#),
    ] {
        let provider = Arc::new(Scripted {
            reply,
            calls: AtomicUsize::new(0),
        });
        let parser = hybrid_parser(provider.clone());

        let intent = parser.parse("未読メールを確認して").await;
        assert_eq!(intent, Intent::CheckEmail);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }
}

#[tokio::test]
async fn swapped_parser_is_used_for_new_utterances() {
    let assistant = Assistant::local().unwrap();
    let provider = Arc::new(Scripted {
        reply: Ok(r#"{"intent":"help","params":{}}"#),
        calls: AtomicUsize::new(0),
    });
    assistant.refresh_parser(hybrid_parser(provider.clone()));

    let intent = assistant.parse_intent("こんにちは").await;
    assert_eq!(intent, Intent::Help);
    assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn history_and_notes_survive_a_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("settings.json");

    {
        let store = Arc::new(JsonFileStore::open(&path).unwrap());
        let runtime = build_assistant(&local_config(), store, Collaborators::default()).unwrap();
        let result = runtime
            .assistant
            .handle("牛乳を買うをメモして", &Answer::new(true))
            .await;
        assert!(result.is_success());
    }

    let store = Arc::new(JsonFileStore::open(&path).unwrap());
    let runtime = build_assistant(&local_config(), store, Collaborators::default()).unwrap();
    let history = runtime.assistant.history().entries();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].kind(), IntentKind::SaveNote);

    let listed = runtime
        .assistant
        .handle("メモ一覧", &Answer::new(true))
        .await;
    assert!(listed.response().contains("牛乳を買う"));
}
