// crates/nlu/src/remote.rs

use hisho_core::{HishoError, HishoResult, Intent, IntentKind};
use hisho_llm_connector::{LlmConnector, PromptBuilder};
use serde_json::{Map as JsonMap, Value};
use tracing::{debug, warn};

use crate::slots::{DEFAULT_TARGET_LANG, DEFAULT_TIMER_SECONDS};

const SYSTEM_PROMPT: &str =
    "日本語の音声コマンドを解析するアシスタント。{\"intent\":\"...\",\"params\":{...}}のJSON形式のみで返答。";

const USER_TEMPLATE: &str = r#"ユーザーの発話から意図を解析し、以下のJSON形式で返してください。

意図の種類:
- send_email: メール送信 (to, subject, body)
- check_email: 未読メール確認
- create_event: 予定作成 (title, date, time)
- check_schedule: 予定確認 (date)
- create_task: タスク作成 (title, notes)
- list_tasks: タスク一覧
- set_reminder: リマインダー (title, date, time)
- weather: 天気 (location)
- web_search: 検索 (query)
- translate: 翻訳 (text, targetLang: ja/en/zh/ko)
- calculate: 計算 (expression)
- news: ニュース (category)
- set_timer: タイマー (seconds)
- save_note: メモ保存 (content)
- list_notes: メモ一覧
- capture_receipt: 領収書登録
- help: ヘルプ
- unknown: 不明

日付は today/tomorrow/day_after_tomorrow または YYYY-MM-DD 形式。
時間は HH:MM 形式。

発話: "{utterance}"

JSON形式で返答:"#;

/// Classifies through a completion endpoint. Any failure yields `None`.
pub struct RemoteClassifier {
    connector: LlmConnector,
    prompt: PromptBuilder,
}

impl RemoteClassifier {
    pub fn new(connector: LlmConnector) -> Self {
        Self {
            connector,
            prompt: PromptBuilder::new(SYSTEM_PROMPT, USER_TEMPLATE),
        }
    }

    pub fn connector(&self) -> &LlmConnector {
        &self.connector
    }

    pub async fn classify(&self, text: &str) -> Option<Intent> {
        let request = self.prompt.build_request(text);
        let response = match self.connector.complete(request).await {
            Ok(response) => response,
            Err(err) => {
                warn!(error = %err, "Remote classification failed, using rules");
                return None;
            }
        };

        match parse_reply(&response.content) {
            Ok(intent) if intent.kind() == IntentKind::Unknown => {
                debug!("Remote classifier returned unknown, deferring to rules");
                None
            }
            Ok(intent) => {
                debug!(intent = %intent.kind(), "Remote classification accepted");
                Some(intent)
            }
            Err(err) => {
                warn!(error = %err, "Rejected remote classifier reply");
                None
            }
        }
    }
}

/// Parses a `{"intent": ..., "params": {...}}` reply, tolerating code fences.
/// The intent name is checked against the closed kind set before any slot is read.
pub fn parse_reply(content: &str) -> HishoResult<Intent> {
    let json: Value = serde_json::from_str(strip_code_fences(content))
        .map_err(|e| HishoError::Nlu(format!("Reply is not JSON: {}", e)))?;

    let name = json
        .get("intent")
        .and_then(Value::as_str)
        .ok_or_else(|| HishoError::Nlu("Reply has no intent name".to_string()))?;
    let kind = IntentKind::from_name(name)
        .ok_or_else(|| HishoError::Nlu(format!("Unrecognized intent '{}'", name)))?;

    let empty = JsonMap::new();
    let params = match json.get("params") {
        None | Some(Value::Null) => &empty,
        Some(Value::Object(map)) => map,
        Some(_) => return Err(HishoError::Nlu("params is not an object".to_string())),
    };

    intent_from_params(kind, params)
}

fn intent_from_params(kind: IntentKind, params: &JsonMap<String, Value>) -> HishoResult<Intent> {
    let text = |key: &str| string_slot(params, &[key]);

    Ok(match kind {
        IntentKind::SendEmail => Intent::SendEmail {
            to: text("to")?,
            subject: text("subject")?,
            body: text("body")?,
        },
        IntentKind::CheckEmail => Intent::CheckEmail,
        IntentKind::CreateEvent => Intent::CreateEvent {
            title: text("title")?,
            date: text("date")?,
            time: text("time")?,
        },
        IntentKind::CheckSchedule => {
            let date = text("date")?;
            Intent::CheckSchedule {
                date: if date.is_empty() {
                    "today".to_string()
                } else {
                    date
                },
            }
        }
        IntentKind::CreateTask => Intent::CreateTask {
            title: text("title")?,
            notes: text("notes")?,
        },
        IntentKind::ListTasks => Intent::ListTasks,
        IntentKind::SetReminder => Intent::SetReminder {
            title: text("title")?,
            date: text("date")?,
            time: text("time")?,
        },
        IntentKind::Weather => Intent::Weather {
            location: text("location")?,
        },
        IntentKind::WebSearch => Intent::WebSearch {
            query: text("query")?,
        },
        IntentKind::Translate => {
            let target_lang = string_slot(params, &["targetLang", "target_lang"])?;
            Intent::Translate {
                text: text("text")?,
                target_lang: if target_lang.is_empty() {
                    DEFAULT_TARGET_LANG.to_string()
                } else {
                    target_lang
                },
            }
        }
        IntentKind::Calculate => Intent::Calculate {
            expression: text("expression")?,
        },
        IntentKind::News => Intent::News {
            category: text("category")?,
        },
        IntentKind::SetTimer => Intent::SetTimer {
            seconds: seconds_slot(params)?,
        },
        IntentKind::SaveNote => Intent::SaveNote {
            content: text("content")?,
        },
        IntentKind::ListNotes => Intent::ListNotes,
        IntentKind::CaptureReceipt => Intent::CaptureReceipt,
        IntentKind::Help => Intent::Help,
        IntentKind::Unknown => Intent::unknown(string_slot(params, &["rawText", "raw_text"])?),
    })
}

/// First present key wins; missing or null means empty, anything but a string is rejected.
fn string_slot(params: &JsonMap<String, Value>, keys: &[&str]) -> HishoResult<String> {
    for key in keys {
        match params.get(*key) {
            None | Some(Value::Null) => continue,
            Some(Value::String(s)) => return Ok(s.trim().to_string()),
            Some(other) => {
                return Err(HishoError::Nlu(format!(
                    "Slot '{}' has wrong type: {}",
                    key, other
                )))
            }
        }
    }
    Ok(String::new())
}

fn seconds_slot(params: &JsonMap<String, Value>) -> HishoResult<u64> {
    match params.get("seconds") {
        None | Some(Value::Null) => Ok(DEFAULT_TIMER_SECONDS),
        Some(Value::Number(n)) => n
            .as_u64()
            .filter(|s| *s > 0)
            .ok_or_else(|| HishoError::Nlu(format!("Invalid timer seconds: {}", n))),
        Some(Value::String(s)) => s
            .trim()
            .parse::<u64>()
            .ok()
            .filter(|s| *s > 0)
            .ok_or_else(|| HishoError::Nlu(format!("Invalid timer seconds: {}", s))),
        Some(other) => Err(HishoError::Nlu(format!(
            "Slot 'seconds' has wrong type: {}",
            other
        ))),
    }
}

fn strip_code_fences(content: &str) -> &str {
    let trimmed = content.trim();
    let without_open = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    without_open
        .strip_suffix("```")
        .unwrap_or(without_open)
        .trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use hisho_llm_connector::{
        CompletionProvider, CompletionRequest, CompletionResponse, LlmConfig,
    };
    use std::sync::Arc;

    struct Scripted(Result<&'static str, &'static str>);

    #[async_trait]
    impl CompletionProvider for Scripted {
        async fn complete(&self, _request: CompletionRequest) -> HishoResult<CompletionResponse> {
            match self.0 {
                Ok(content) => Ok(CompletionResponse {
                    content: content.to_string(),
                    ..CompletionResponse::default()
                }),
                Err(msg) => Err(HishoError::Network(msg.to_string())),
            }
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    fn classifier(reply: Result<&'static str, &'static str>) -> RemoteClassifier {
        let config = LlmConfig {
            cache_enabled: false,
            ..LlmConfig::default()
        };
        RemoteClassifier::new(LlmConnector::new(config, Arc::new(Scripted(reply))))
    }

    #[test]
    fn parses_fenced_reply() {
        let reply = "```json\n{\"intent\":\"create_event\",\"params\":{\"title\":\"会議\",\"date\":\"tomorrow\",\"time\":\"10:00\"}}\n```";
        assert_eq!(
            parse_reply(reply).unwrap(),
            Intent::CreateEvent {
                title: "会議".to_string(),
                date: "tomorrow".to_string(),
                time: "10:00".to_string(),
            }
        );
    }

    #[test]
    fn accepts_camel_case_target_lang_and_missing_params() {
        let intent =
            parse_reply(r#"{"intent":"translate","params":{"text":"hi","targetLang":"ja"}}"#).unwrap();
        assert_eq!(
            intent,
            Intent::Translate {
                text: "hi".to_string(),
                target_lang: "ja".to_string()
            }
        );
        assert_eq!(parse_reply(r#"{"intent":"LIST_TASKS"}"#).unwrap(), Intent::ListTasks);
    }

    #[test]
    fn rejects_invalid_replies() {
        assert!(parse_reply("sure, here you go").is_err());
        assert!(parse_reply(r#"{"intent":"order_pizza","params":{}}"#).is_err());
        assert!(parse_reply(r#"{"params":{}}"#).is_err());
        assert!(parse_reply(r#"{"intent":"weather","params":"東京"}"#).is_err());
        assert!(parse_reply(r#"{"intent":"send_email","params":{"to":42}}"#).is_err());
        assert!(parse_reply(r#"{"intent":"set_timer","params":{"seconds":-5}}"#).is_err());
    }

    #[test]
    fn timer_seconds_accepts_numeric_strings() {
        assert_eq!(
            parse_reply(r#"{"intent":"set_timer","params":{"seconds":"90"}}"#).unwrap(),
            Intent::SetTimer { seconds: 90 }
        );
        assert_eq!(
            parse_reply(r#"{"intent":"set_timer","params":{}}"#).unwrap(),
            Intent::SetTimer {
                seconds: DEFAULT_TIMER_SECONDS
            }
        );
    }

    #[tokio::test]
    async fn network_failure_yields_none() {
        assert!(classifier(Err("offline")).classify("x").await.is_none());
    }

    #[tokio::test]
    async fn unknown_and_garbage_yield_none() {
        assert!(classifier(Ok(r#"{"intent":"unknown","params":{}}"#))
            .classify("x")
            .await
            .is_none());
        assert!(classifier(Ok("not json")).classify("x").await.is_none());
    }

    #[tokio::test]
    async fn valid_reply_is_returned() {
        let intent = classifier(Ok(r#"{"intent":"check_email","params":{}}"#))
            .classify("メール来てる？")
            .await;
        assert_eq!(intent, Some(Intent::CheckEmail));
    }
}
