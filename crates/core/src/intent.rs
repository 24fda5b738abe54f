// crates/core/src/intent.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Closed set of things the assistant knows how to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentKind {
    SendEmail,
    CheckEmail,
    CreateEvent,
    CheckSchedule,
    CreateTask,
    ListTasks,
    SetReminder,
    Weather,
    WebSearch,
    Translate,
    Calculate,
    News,
    SetTimer,
    SaveNote,
    ListNotes,
    CaptureReceipt,
    Help,
    Unknown,
}

impl IntentKind {
    pub const ALL: [IntentKind; 18] = [
        IntentKind::SendEmail,
        IntentKind::CheckEmail,
        IntentKind::CreateEvent,
        IntentKind::CheckSchedule,
        IntentKind::CreateTask,
        IntentKind::ListTasks,
        IntentKind::SetReminder,
        IntentKind::Weather,
        IntentKind::WebSearch,
        IntentKind::Translate,
        IntentKind::Calculate,
        IntentKind::News,
        IntentKind::SetTimer,
        IntentKind::SaveNote,
        IntentKind::ListNotes,
        IntentKind::CaptureReceipt,
        IntentKind::Help,
        IntentKind::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            IntentKind::SendEmail => "send_email",
            IntentKind::CheckEmail => "check_email",
            IntentKind::CreateEvent => "create_event",
            IntentKind::CheckSchedule => "check_schedule",
            IntentKind::CreateTask => "create_task",
            IntentKind::ListTasks => "list_tasks",
            IntentKind::SetReminder => "set_reminder",
            IntentKind::Weather => "weather",
            IntentKind::WebSearch => "web_search",
            IntentKind::Translate => "translate",
            IntentKind::Calculate => "calculate",
            IntentKind::News => "news",
            IntentKind::SetTimer => "set_timer",
            IntentKind::SaveNote => "save_note",
            IntentKind::ListNotes => "list_notes",
            IntentKind::CaptureReceipt => "capture_receipt",
            IntentKind::Help => "help",
            IntentKind::Unknown => "unknown",
        }
    }

    /// Case-insensitive lookup by wire name.
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(name))
    }

    /// Display label shown in history and confirmation prompts.
    pub fn label(&self) -> &'static str {
        match self {
            IntentKind::SendEmail => "メール送信",
            IntentKind::CheckEmail => "メール確認",
            IntentKind::CreateEvent => "予定作成",
            IntentKind::CheckSchedule => "予定確認",
            IntentKind::CreateTask => "タスク作成",
            IntentKind::ListTasks => "タスク一覧",
            IntentKind::SetReminder => "リマインダー",
            IntentKind::Weather => "天気",
            IntentKind::WebSearch => "検索",
            IntentKind::Translate => "翻訳",
            IntentKind::Calculate => "計算",
            IntentKind::News => "ニュース",
            IntentKind::SetTimer => "タイマー",
            IntentKind::SaveNote => "メモ保存",
            IntentKind::ListNotes => "メモ一覧",
            IntentKind::CaptureReceipt => "領収書登録",
            IntentKind::Help => "ヘルプ",
            IntentKind::Unknown => "不明",
        }
    }

    /// Intents with side effects that wait for an explicit yes.
    pub fn requires_confirmation(&self) -> bool {
        matches!(
            self,
            IntentKind::SendEmail
                | IntentKind::CreateEvent
                | IntentKind::CreateTask
                | IntentKind::SetReminder
                | IntentKind::SaveNote
        )
    }

    /// Intents backed by the signed-in account services.
    pub fn requires_auth(&self) -> bool {
        matches!(
            self,
            IntentKind::SendEmail
                | IntentKind::CheckEmail
                | IntentKind::CreateEvent
                | IntentKind::CheckSchedule
                | IntentKind::CreateTask
                | IntentKind::ListTasks
                | IntentKind::SetReminder
                | IntentKind::CaptureReceipt
        )
    }
}

impl fmt::Display for IntentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified utterance with its extracted slots.
///
/// Empty strings mean "not extracted". Date slots hold either a relative
/// token (`today`, `tomorrow`, `day_after_tomorrow`) or `YYYY-MM-DD`; time
/// slots hold `HH:MM`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "intent", content = "params", rename_all = "snake_case")]
pub enum Intent {
    SendEmail {
        to: String,
        subject: String,
        body: String,
    },
    CheckEmail,
    CreateEvent {
        title: String,
        date: String,
        time: String,
    },
    CheckSchedule {
        date: String,
    },
    CreateTask {
        title: String,
        notes: String,
    },
    ListTasks,
    SetReminder {
        title: String,
        date: String,
        time: String,
    },
    Weather {
        location: String,
    },
    WebSearch {
        query: String,
    },
    Translate {
        text: String,
        target_lang: String,
    },
    Calculate {
        expression: String,
    },
    News {
        category: String,
    },
    SetTimer {
        seconds: u64,
    },
    SaveNote {
        content: String,
    },
    ListNotes,
    CaptureReceipt,
    Help,
    Unknown {
        raw_text: String,
    },
}

impl Intent {
    pub fn unknown(raw_text: impl Into<String>) -> Self {
        Intent::Unknown {
            raw_text: raw_text.into(),
        }
    }

    pub fn kind(&self) -> IntentKind {
        match self {
            Intent::SendEmail { .. } => IntentKind::SendEmail,
            Intent::CheckEmail => IntentKind::CheckEmail,
            Intent::CreateEvent { .. } => IntentKind::CreateEvent,
            Intent::CheckSchedule { .. } => IntentKind::CheckSchedule,
            Intent::CreateTask { .. } => IntentKind::CreateTask,
            Intent::ListTasks => IntentKind::ListTasks,
            Intent::SetReminder { .. } => IntentKind::SetReminder,
            Intent::Weather { .. } => IntentKind::Weather,
            Intent::WebSearch { .. } => IntentKind::WebSearch,
            Intent::Translate { .. } => IntentKind::Translate,
            Intent::Calculate { .. } => IntentKind::Calculate,
            Intent::News { .. } => IntentKind::News,
            Intent::SetTimer { .. } => IntentKind::SetTimer,
            Intent::SaveNote { .. } => IntentKind::SaveNote,
            Intent::ListNotes => IntentKind::ListNotes,
            Intent::CaptureReceipt => IntentKind::CaptureReceipt,
            Intent::Help => IntentKind::Help,
            Intent::Unknown { .. } => IntentKind::Unknown,
        }
    }

    pub fn requires_confirmation(&self) -> bool {
        self.kind().requires_confirmation()
    }

    pub fn requires_auth(&self) -> bool {
        self.kind().requires_auth()
    }
}

/// Outcome of one processed utterance. Built once, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandResult {
    id: Uuid,
    intent: Intent,
    raw_text: String,
    response: String,
    success: bool,
    timestamp: DateTime<Utc>,
}

impl CommandResult {
    pub fn new(
        intent: Intent,
        raw_text: impl Into<String>,
        response: impl Into<String>,
        success: bool,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            intent,
            raw_text: raw_text.into(),
            response: response.into(),
            success,
            timestamp: Utc::now(),
        }
    }

    pub fn success(intent: Intent, raw_text: impl Into<String>, response: impl Into<String>) -> Self {
        Self::new(intent, raw_text, response, true)
    }

    pub fn failure(intent: Intent, raw_text: impl Into<String>, response: impl Into<String>) -> Self {
        Self::new(intent, raw_text, response, false)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn intent(&self) -> &Intent {
        &self.intent
    }

    pub fn kind(&self) -> IntentKind {
        self.intent.kind()
    }

    pub fn raw_text(&self) -> &str {
        &self.raw_text
    }

    pub fn response(&self) -> &str {
        &self.response
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}
