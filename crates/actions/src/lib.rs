// crates/actions/src/lib.rs

use async_trait::async_trait;
use hisho_core::{AuthError, ConfirmationSummary, HishoResult};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub mod auth;
pub mod calculator;
pub mod dispatcher;
pub mod notes;
pub mod timer;
pub mod web;

pub use auth::StaticTokenAuth;
pub use calculator::{calculate, CalcError};
pub use dispatcher::{DispatchMetrics, Gate, IntentDispatcher};
pub use notes::NoteStore;
pub use timer::{TimerFired, TokioTimer};
pub use web::WebSearch;

/// Action configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionsConfig {
    #[serde(default = "default_location")]
    pub default_location: String,
    #[serde(default = "default_search_url")]
    pub search_base_url: String,
    #[serde(default)]
    pub open_in_browser: bool,
    #[serde(default = "default_notes_limit")]
    pub notes_list_limit: usize,
}

fn default_location() -> String {
    "東京".to_string()
}

fn default_search_url() -> String {
    "https://www.google.com/search?q=".to_string()
}

fn default_notes_limit() -> usize {
    10
}

impl Default for ActionsConfig {
    fn default() -> Self {
        Self {
            default_location: default_location(),
            search_base_url: default_search_url(),
            open_in_browser: false,
            notes_list_limit: default_notes_limit(),
        }
    }
}

/// Sign-in state owned outside the assistant.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    fn is_authenticated(&self) -> bool;
    async fn access_token(&self) -> Result<String, AuthError>;
}

#[async_trait]
pub trait MailService: Send + Sync {
    async fn send_email(&self, to: &str, subject: &str, body: &str) -> HishoResult<String>;
    async fn unread_summary(&self) -> HishoResult<String>;
}

#[async_trait]
pub trait CalendarService: Send + Sync {
    async fn create_event(&self, title: &str, date: &str, time: &str) -> HishoResult<String>;
    async fn events_summary(&self, date: &str) -> HishoResult<String>;
}

#[async_trait]
pub trait TaskService: Send + Sync {
    async fn create_task(&self, title: &str, notes: &str, due: Option<&str>)
        -> HishoResult<String>;
    async fn tasks_summary(&self) -> HishoResult<String>;
}

#[async_trait]
pub trait WeatherService: Send + Sync {
    async fn weather(&self, location: &str) -> HishoResult<String>;
}

#[async_trait]
pub trait SearchService: Send + Sync {
    async fn search(&self, query: &str) -> HishoResult<String>;
}

#[async_trait]
pub trait TranslateService: Send + Sync {
    async fn translate(&self, text: &str, target_lang: &str) -> HishoResult<String>;
}

#[async_trait]
pub trait NewsService: Send + Sync {
    async fn headlines(&self, category: &str) -> HishoResult<String>;
}

/// Starts a countdown; completion is reported out of band.
#[async_trait]
pub trait TimerService: Send + Sync {
    async fn start_timer(&self, seconds: u64) -> HishoResult<String>;
}

#[async_trait]
pub trait NoteService: Send + Sync {
    async fn save_note(&self, content: &str) -> HishoResult<String>;
    async fn list_notes(&self) -> HishoResult<String>;
}

#[async_trait]
pub trait ReceiptService: Send + Sync {
    async fn capture_receipt(&self) -> HishoResult<String>;
}

/// Asks the user to approve a mutating action.
#[async_trait]
pub trait Confirmer: Send + Sync {
    async fn confirm(&self, summary: &ConfirmationSummary) -> bool;
}

/// External services the dispatcher may call. A missing service turns the
/// matching intents into failed results.
#[derive(Clone, Default)]
pub struct Collaborators {
    pub auth: Option<Arc<dyn AuthProvider>>,
    pub mail: Option<Arc<dyn MailService>>,
    pub calendar: Option<Arc<dyn CalendarService>>,
    pub tasks: Option<Arc<dyn TaskService>>,
    pub weather: Option<Arc<dyn WeatherService>>,
    pub search: Option<Arc<dyn SearchService>>,
    pub translate: Option<Arc<dyn TranslateService>>,
    pub news: Option<Arc<dyn NewsService>>,
    pub timer: Option<Arc<dyn TimerService>>,
    pub notes: Option<Arc<dyn NoteService>>,
    pub receipts: Option<Arc<dyn ReceiptService>>,
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators")
            .field("auth", &self.auth.is_some())
            .field("mail", &self.mail.is_some())
            .field("calendar", &self.calendar.is_some())
            .field("tasks", &self.tasks.is_some())
            .field("weather", &self.weather.is_some())
            .field("search", &self.search.is_some())
            .field("translate", &self.translate.is_some())
            .field("news", &self.news.is_some())
            .field("timer", &self.timer.is_some())
            .field("notes", &self.notes.is_some())
            .field("receipts", &self.receipts.is_some())
            .finish()
    }
}
