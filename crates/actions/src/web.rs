// crates/actions/src/web.rs

use async_trait::async_trait;
use std::process::Command as ProcessCommand;
use tracing::{info, warn};

use hisho_core::{HishoError, HishoResult};

use crate::SearchService;

/// Builds a search URL and optionally hands it to the platform browser.
pub struct WebSearch {
    base_url: String,
    open_in_browser: bool,
}

impl WebSearch {
    pub fn new(base_url: impl Into<String>, open_in_browser: bool) -> Self {
        Self {
            base_url: base_url.into(),
            open_in_browser,
        }
    }

    pub fn search_url(&self, query: &str) -> String {
        format!("{}{}", self.base_url, urlencoding::encode(query.trim()))
    }

    fn open(url: &str) -> HishoResult<()> {
        let mut command = if cfg!(target_os = "windows") {
            let mut c = ProcessCommand::new("cmd");
            c.args(["/c", "start", url]);
            c
        } else if cfg!(target_os = "macos") {
            let mut c = ProcessCommand::new("open");
            c.arg(url);
            c
        } else {
            let mut c = ProcessCommand::new("xdg-open");
            c.arg(url);
            c
        };

        command
            .spawn()
            .map(|_| ())
            .map_err(|e| HishoError::Action(format!("ブラウザを開けませんでした: {}", e)))
    }
}

#[async_trait]
impl SearchService for WebSearch {
    async fn search(&self, query: &str) -> HishoResult<String> {
        let query = query.trim();
        if query.is_empty() {
            return Err(HishoError::Action("検索ワードがありません".to_string()));
        }

        let url = self.search_url(query);
        info!(%url, "Web search");

        if self.open_in_browser {
            if let Err(e) = Self::open(&url) {
                warn!(error = %e, "Browser launch failed");
            }
        }

        Ok(format!("「{}」を検索します: {}", query, url))
    }
}
