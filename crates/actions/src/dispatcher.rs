// crates/actions/src/dispatcher.rs

use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

use hisho_core::{
    slot_or, CommandResult, ConfirmationSummary, HishoError, HishoResult, Intent, IntentKind,
    DEFAULT_EVENT_TIME,
};

use crate::calculator;
use crate::{ActionsConfig, Collaborators, Confirmer};

pub const SIGN_IN_MESSAGE: &str = "Googleアカウントにログインしてください（設定タブから）";
pub const CANCELLED_MESSAGE: &str = "キャンセルしました";
const REMINDER_NOTES: &str = "リマインダー";
const DEFAULT_NEWS_CATEGORY: &str = "general";
const DEFAULT_TIMER_SECONDS: u64 = 180;

const HELP_TEXT: &str = "使える機能一覧:

【Google連携】※要ログイン
・メール送信「〇〇にメールして」
・メール確認「未読メール確認」
・予定作成「明日10時に会議」
・予定確認「今日の予定」
・タスク作成「〇〇をタスクに追加」
・タスク確認「タスク一覧」
・リマインダー「〇〇をリマインド」
・領収書登録「レシートを登録」

【その他】※ログイン不要
・天気「東京の天気」「明日の天気」
・検索「〇〇を検索」
・翻訳「〇〇を英語に」
・計算「100+200」
・ニュース「ニュース」「スポーツニュース」
・タイマー「3分タイマー」
・メモ「〇〇をメモ」「メモ一覧」";

/// What has to happen before an intent may execute.
#[derive(Debug)]
pub enum Gate {
    /// Terminal without executing (unknown intent, missing sign-in).
    Done(CommandResult),
    /// Mutating intent; execute only after approval.
    Confirm(ConfirmationSummary),
    Execute,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DispatchMetrics {
    pub total_executed: u64,
    pub successful: u64,
    pub failed: u64,
    pub unauthenticated: u64,
    pub cancelled: u64,
    pub unknown: u64,
    pub average_execution_time_ms: f64,
}

/// Routes each intent to exactly one collaborator call and converts every
/// outcome into a [`CommandResult`].
pub struct IntentDispatcher {
    config: ActionsConfig,
    collaborators: Collaborators,
    metrics: Arc<RwLock<DispatchMetrics>>,
}

impl IntentDispatcher {
    pub fn new(config: ActionsConfig, collaborators: Collaborators) -> Self {
        info!(collaborators = ?collaborators, "Intent dispatcher ready");
        Self {
            config,
            collaborators,
            metrics: Arc::new(RwLock::new(DispatchMetrics::default())),
        }
    }

    pub fn config(&self) -> &ActionsConfig {
        &self.config
    }

    pub fn collaborators(&self) -> &Collaborators {
        &self.collaborators
    }

    pub fn is_authenticated(&self) -> bool {
        self.collaborators
            .auth
            .as_ref()
            .map(|auth| auth.is_authenticated())
            .unwrap_or(false)
    }

    /// Decides the path for an intent. Sign-in is checked before confirmation.
    pub fn gate(&self, intent: &Intent, raw_text: &str) -> Gate {
        if intent.kind() == IntentKind::Unknown {
            self.metrics.write().unknown += 1;
            return Gate::Done(CommandResult::failure(
                intent.clone(),
                raw_text,
                format!(
                    "「{}」を理解できませんでした。もう一度お試しください。",
                    raw_text
                ),
            ));
        }

        if intent.requires_auth() && !self.is_authenticated() {
            warn!(intent = %intent.kind(), "Sign-in required");
            self.metrics.write().unauthenticated += 1;
            return Gate::Done(CommandResult::failure(
                intent.clone(),
                raw_text,
                SIGN_IN_MESSAGE,
            ));
        }

        if intent.requires_confirmation() {
            return Gate::Confirm(ConfirmationSummary::for_intent(intent, raw_text));
        }

        Gate::Execute
    }

    /// Result for a declined confirmation. No collaborator is called.
    pub fn cancelled(&self, intent: &Intent, raw_text: &str) -> CommandResult {
        self.metrics.write().cancelled += 1;
        info!(intent = %intent.kind(), "Action cancelled");
        CommandResult::failure(intent.clone(), raw_text, CANCELLED_MESSAGE)
    }

    /// Full gate: unknown and sign-in short-circuits, confirmation, execution.
    pub async fn dispatch(
        &self,
        intent: &Intent,
        raw_text: &str,
        confirmer: &dyn Confirmer,
    ) -> CommandResult {
        match self.gate(intent, raw_text) {
            Gate::Done(result) => result,
            Gate::Confirm(summary) => {
                if confirmer.confirm(&summary).await {
                    self.execute(intent, raw_text).await
                } else {
                    self.cancelled(intent, raw_text)
                }
            }
            Gate::Execute => self.execute(intent, raw_text).await,
        }
    }

    /// Runs the collaborator call for an intent that already passed the gate.
    pub async fn execute(&self, intent: &Intent, raw_text: &str) -> CommandResult {
        let start = Instant::now();
        debug!(intent = %intent.kind(), "Executing intent");

        let result = match self.run(intent, raw_text).await {
            Ok((response, success)) => {
                CommandResult::new(intent.clone(), raw_text, response, success)
            }
            Err(e) => {
                error!(intent = %intent.kind(), error = %e, "Action execution failed");
                CommandResult::failure(intent.clone(), raw_text, format!("エラー: {}", e))
            }
        };

        let execution_time = start.elapsed().as_secs_f64() * 1000.0;
        let mut metrics = self.metrics.write();
        metrics.total_executed += 1;
        if result.is_success() {
            metrics.successful += 1;
        } else {
            metrics.failed += 1;
        }
        metrics.average_execution_time_ms = (metrics.average_execution_time_ms
            * (metrics.total_executed - 1) as f64
            + execution_time)
            / metrics.total_executed as f64;

        info!(
            intent = %intent.kind(),
            success = result.is_success(),
            elapsed_ms = execution_time,
            "Intent executed"
        );
        result
    }

    pub fn metrics(&self) -> DispatchMetrics {
        self.metrics.read().clone()
    }

    async fn run(&self, intent: &Intent, raw_text: &str) -> HishoResult<(String, bool)> {
        let c = &self.collaborators;
        let response = match intent {
            Intent::SendEmail { to, subject, body } => {
                require(&c.mail, intent)?.send_email(to, subject, body).await?
            }
            Intent::CheckEmail => require(&c.mail, intent)?.unread_summary().await?,
            Intent::CreateEvent { title, date, time } => {
                require(&c.calendar, intent)?
                    .create_event(
                        slot_or(title, raw_text),
                        slot_or(date, "today"),
                        slot_or(time, DEFAULT_EVENT_TIME),
                    )
                    .await?
            }
            Intent::CheckSchedule { date } => {
                require(&c.calendar, intent)?
                    .events_summary(slot_or(date, "today"))
                    .await?
            }
            Intent::CreateTask { title, notes } => {
                require(&c.tasks, intent)?
                    .create_task(slot_or(title, raw_text), notes, None)
                    .await?
            }
            Intent::ListTasks => require(&c.tasks, intent)?.tasks_summary().await?,
            Intent::SetReminder { title, date, time } => {
                let notes = if time.trim().is_empty() {
                    REMINDER_NOTES.to_string()
                } else {
                    format!("{} {}", REMINDER_NOTES, time)
                };
                let due = (!date.trim().is_empty()).then_some(date.as_str());
                require(&c.tasks, intent)?
                    .create_task(slot_or(title, raw_text), &notes, due)
                    .await?
            }
            Intent::Weather { location } => {
                require(&c.weather, intent)?
                    .weather(slot_or(location, &self.config.default_location))
                    .await?
            }
            Intent::WebSearch { query } => {
                require(&c.search, intent)?
                    .search(slot_or(query, raw_text))
                    .await?
            }
            Intent::Translate { text, target_lang } => {
                require(&c.translate, intent)?
                    .translate(slot_or(text, raw_text), slot_or(target_lang, "en"))
                    .await?
            }
            Intent::Calculate { expression } => {
                return Ok(match calculator::try_calculate(slot_or(expression, raw_text)) {
                    Ok(answer) => (answer, true),
                    Err(e) => {
                        debug!(error = %e, "Calculation failed");
                        (e.user_message().to_string(), false)
                    }
                });
            }
            Intent::News { category } => {
                require(&c.news, intent)?
                    .headlines(slot_or(category, DEFAULT_NEWS_CATEGORY))
                    .await?
            }
            Intent::SetTimer { seconds } => {
                let seconds = if *seconds == 0 {
                    DEFAULT_TIMER_SECONDS
                } else {
                    *seconds
                };
                require(&c.timer, intent)?.start_timer(seconds).await?
            }
            Intent::SaveNote { content } => {
                require(&c.notes, intent)?
                    .save_note(slot_or(content, raw_text))
                    .await?
            }
            Intent::ListNotes => require(&c.notes, intent)?.list_notes().await?,
            Intent::CaptureReceipt => require(&c.receipts, intent)?.capture_receipt().await?,
            Intent::Help => HELP_TEXT.to_string(),
            Intent::Unknown { .. } => {
                return Ok((
                    format!(
                        "「{}」を理解できませんでした。もう一度お試しください。",
                        raw_text
                    ),
                    false,
                ))
            }
        };
        Ok((response, true))
    }
}

fn require<'a, T: ?Sized>(
    service: &'a Option<Arc<T>>,
    intent: &Intent,
) -> HishoResult<&'a Arc<T>> {
    service
        .as_ref()
        .ok_or_else(|| HishoError::Unavailable(intent.kind().label().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AuthProvider, CalendarService, MailService, TaskService, WeatherService};
    use async_trait::async_trait;
    use hisho_core::AuthError;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<String>>,
        fail: bool,
    }

    impl Recorder {
        fn failing() -> Self {
            Self {
                fail: true,
                ..Self::default()
            }
        }

        fn record(&self, call: String) -> HishoResult<String> {
            self.calls.lock().push(call.clone());
            if self.fail {
                Err(HishoError::Network("quota exceeded".to_string()))
            } else {
                Ok(format!("ok: {}", call))
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().clone()
        }
    }

    #[async_trait]
    impl MailService for Recorder {
        async fn send_email(&self, to: &str, subject: &str, body: &str) -> HishoResult<String> {
            self.record(format!("send_email({},{},{})", to, subject, body))
        }
        async fn unread_summary(&self) -> HishoResult<String> {
            self.record("unread_summary".to_string())
        }
    }

    #[async_trait]
    impl CalendarService for Recorder {
        async fn create_event(&self, title: &str, date: &str, time: &str) -> HishoResult<String> {
            self.record(format!("create_event({},{},{})", title, date, time))
        }
        async fn events_summary(&self, date: &str) -> HishoResult<String> {
            self.record(format!("events_summary({})", date))
        }
    }

    #[async_trait]
    impl TaskService for Recorder {
        async fn create_task(
            &self,
            title: &str,
            notes: &str,
            due: Option<&str>,
        ) -> HishoResult<String> {
            self.record(format!("create_task({},{},{:?})", title, notes, due))
        }
        async fn tasks_summary(&self) -> HishoResult<String> {
            self.record("tasks_summary".to_string())
        }
    }

    #[async_trait]
    impl WeatherService for Recorder {
        async fn weather(&self, location: &str) -> HishoResult<String> {
            self.record(format!("weather({})", location))
        }
    }

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

    struct Answer(bool);

    #[async_trait]
    impl Confirmer for Answer {
        async fn confirm(&self, _summary: &ConfirmationSummary) -> bool {
            self.0
        }
    }

    fn dispatcher(signed_in: bool, service: Arc<Recorder>) -> IntentDispatcher {
        let collaborators = Collaborators {
            auth: Some(Arc::new(SignedIn(signed_in))),
            mail: Some(service.clone()),
            calendar: Some(service.clone()),
            tasks: Some(service.clone()),
            weather: Some(service),
            ..Collaborators::default()
        };
        IntentDispatcher::new(ActionsConfig::default(), collaborators)
    }

    #[tokio::test]
    async fn unknown_yields_apology() {
        let service = Arc::new(Recorder::default());
        let d = dispatcher(true, service.clone());
        let result = d
            .dispatch(&Intent::unknown("こんにちは"), "こんにちは", &Answer(true))
            .await;
        assert!(!result.is_success());
        assert_eq!(
            result.response(),
            "「こんにちは」を理解できませんでした。もう一度お試しください。"
        );
        assert!(service.calls().is_empty());
    }

    #[tokio::test]
    async fn unauthenticated_short_circuits_before_confirmation() {
        let service = Arc::new(Recorder::default());
        let d = dispatcher(false, service.clone());
        let intent = Intent::CreateTask {
            title: "牛乳".to_string(),
            notes: String::new(),
        };
        assert!(matches!(d.gate(&intent, "牛乳をタスクに"), Gate::Done(_)));

        let result = d.dispatch(&Intent::ListTasks, "タスクを確認して", &Answer(true)).await;
        assert!(!result.is_success());
        assert_eq!(result.response(), SIGN_IN_MESSAGE);
        assert!(service.calls().is_empty());
        assert_eq!(d.metrics().unauthenticated, 2);
    }

    #[tokio::test]
    async fn confirmed_event_uses_summary_slots() {
        let service = Arc::new(Recorder::default());
        let d = dispatcher(true, service.clone());
        let intent = Intent::CreateEvent {
            title: "会議".to_string(),
            date: "tomorrow".to_string(),
            time: String::new(),
        };

        let Gate::Confirm(summary) = d.gate(&intent, "明日会議") else {
            panic!("expected confirmation");
        };
        assert_eq!(summary.rows[2].value, "09:00 (デフォルト)");

        let result = d.dispatch(&intent, "明日会議", &Answer(true)).await;
        assert!(result.is_success());
        assert_eq!(service.calls(), vec!["create_event(会議,tomorrow,09:00)"]);
    }

    #[tokio::test]
    async fn whitespace_slots_get_the_defaults_the_summary_shows() {
        let service = Arc::new(Recorder::default());
        let d = dispatcher(true, service.clone());
        let intent = Intent::CreateEvent {
            title: "  ".to_string(),
            date: " ".to_string(),
            time: "\u{3000}".to_string(),
        };

        let Gate::Confirm(summary) = d.gate(&intent, "予定を入れて") else {
            panic!("expected confirmation");
        };
        assert_eq!(summary.message, "予定作成: 予定を入れて / 今日 09:00");

        let result = d.dispatch(&intent, "予定を入れて", &Answer(true)).await;
        assert!(result.is_success());
        assert_eq!(service.calls(), vec!["create_event(予定を入れて,today,09:00)"]);
    }

    #[tokio::test]
    async fn cancelled_confirmation_calls_nothing() {
        let service = Arc::new(Recorder::default());
        let d = dispatcher(true, service.clone());
        let intent = Intent::SendEmail {
            to: "田中さん".to_string(),
            subject: String::new(),
            body: String::new(),
        };
        let result = d.dispatch(&intent, "田中さんにメールして", &Answer(false)).await;
        assert!(!result.is_success());
        assert_eq!(result.response(), CANCELLED_MESSAGE);
        assert!(service.calls().is_empty());
        assert_eq!(d.metrics().cancelled, 1);
    }

    #[tokio::test]
    async fn reminder_goes_to_tasks_with_due_date() {
        let service = Arc::new(Recorder::default());
        let d = dispatcher(true, service.clone());
        let intent = Intent::SetReminder {
            title: "薬".to_string(),
            date: "tomorrow".to_string(),
            time: "08:00".to_string(),
        };
        d.dispatch(&intent, "明日8時に薬をリマインド", &Answer(true)).await;

        let undated = Intent::SetReminder {
            title: String::new(),
            date: String::new(),
            time: String::new(),
        };
        d.dispatch(&undated, "リマインド", &Answer(true)).await;

        assert_eq!(
            service.calls(),
            vec![
                "create_task(薬,リマインダー 08:00,Some(\"tomorrow\"))",
                "create_task(リマインド,リマインダー,None)",
            ]
        );
    }

    #[tokio::test]
    async fn collaborator_error_becomes_failed_result() {
        let service = Arc::new(Recorder::failing());
        let d = dispatcher(true, service.clone());
        let result = d.dispatch(&Intent::CheckEmail, "メール確認", &Answer(true)).await;
        assert!(!result.is_success());
        assert_eq!(result.response(), "エラー: Network error: quota exceeded");
        assert_eq!(service.calls().len(), 1);
        assert_eq!(d.metrics().failed, 1);
    }

    #[tokio::test]
    async fn missing_collaborator_is_unavailable() {
        let d = IntentDispatcher::new(ActionsConfig::default(), Collaborators::default());
        let result = d
            .dispatch(
                &Intent::News {
                    category: String::new(),
                },
                "ニュース",
                &Answer(true),
            )
            .await;
        assert!(!result.is_success());
        assert!(result.response().starts_with("エラー: "));
    }

    #[tokio::test]
    async fn utility_intents_skip_auth_and_fill_defaults() {
        let service = Arc::new(Recorder::default());
        let d = dispatcher(false, service.clone());
        let result = d
            .dispatch(
                &Intent::Weather {
                    location: String::new(),
                },
                "天気",
                &Answer(false),
            )
            .await;
        assert!(result.is_success());
        assert_eq!(service.calls(), vec!["weather(東京)"]);
    }

    #[tokio::test]
    async fn calculate_and_help_are_built_in() {
        let d = IntentDispatcher::new(ActionsConfig::default(), Collaborators::default());
        let ok = d
            .dispatch(
                &Intent::Calculate {
                    expression: "100+200".to_string(),
                },
                "100+200",
                &Answer(true),
            )
            .await;
        assert!(ok.is_success());
        assert_eq!(ok.response(), "100+200 = 300");

        let zero = d
            .dispatch(
                &Intent::Calculate {
                    expression: "10/0".to_string(),
                },
                "10/0",
                &Answer(true),
            )
            .await;
        assert!(!zero.is_success());
        assert_eq!(zero.response(), "0で割ることはできません");

        let help = d.dispatch(&Intent::Help, "ヘルプ", &Answer(true)).await;
        assert!(help.response().contains("使える機能一覧"));
    }
}
