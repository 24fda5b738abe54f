// crates/core/src/summary.rs
use serde::{Deserialize, Serialize};

use crate::intent::Intent;

pub const DEFAULT_EVENT_TIME: &str = "09:00";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryRow {
    pub label: String,
    pub value: String,
}

impl SummaryRow {
    fn new(label: &str, value: impl Into<String>) -> Self {
        Self {
            label: label.to_string(),
            value: value.into(),
        }
    }
}

/// What the user is asked to approve before a mutating intent runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmationSummary {
    pub title: String,
    pub message: String,
    pub rows: Vec<SummaryRow>,
}

impl ConfirmationSummary {
    pub fn for_intent(intent: &Intent, raw_text: &str) -> Self {
        match intent {
            Intent::SendEmail { to, subject, body } => Self {
                title: "メール送信".to_string(),
                message: format!(
                    "メール送信: {} / 件名: {}",
                    slot_or(to, "(宛先未指定)"),
                    slot_or(subject, "(なし)")
                ),
                rows: vec![
                    SummaryRow::new("宛先", slot_or(to, "(未指定)")),
                    SummaryRow::new("件名", slot_or(subject, "(なし)")),
                    SummaryRow::new("本文", slot_or(body, "(なし)")),
                ],
            },
            Intent::CreateEvent { title, date, time } => {
                let title = slot_or(title, raw_text);
                let date = date_name(date).unwrap_or("今日");
                Self {
                    title: "予定を作成".to_string(),
                    message: format!(
                        "予定作成: {} / {} {}",
                        title,
                        date,
                        slot_or(time, DEFAULT_EVENT_TIME)
                    ),
                    rows: vec![
                        SummaryRow::new("タイトル", title),
                        SummaryRow::new("日付", date),
                        SummaryRow::new(
                            "時間",
                            if time.trim().is_empty() {
                                format!("{} (デフォルト)", DEFAULT_EVENT_TIME)
                            } else {
                                time.clone()
                            },
                        ),
                    ],
                }
            }
            Intent::CreateTask { title, notes } => {
                let title = slot_or(title, raw_text);
                Self {
                    title: "タスクを作成".to_string(),
                    message: format!("タスク作成: {}", title),
                    rows: vec![
                        SummaryRow::new("タスク名", title),
                        SummaryRow::new("メモ", slot_or(notes, "(なし)")),
                    ],
                }
            }
            Intent::SetReminder { title, date, time } => {
                let title = slot_or(title, raw_text);
                let mut rows = vec![
                    SummaryRow::new("内容", title),
                    SummaryRow::new("日付", date_name(date).unwrap_or("(未指定)")),
                ];
                if !time.trim().is_empty() {
                    rows.push(SummaryRow::new("時間", time.clone()));
                }
                Self {
                    title: "リマインダーを作成".to_string(),
                    message: format!("リマインダー: {}", title),
                    rows,
                }
            }
            Intent::SaveNote { content } => {
                let content = slot_or(content, raw_text);
                Self {
                    title: "メモを保存".to_string(),
                    message: format!("メモ: {}", content),
                    rows: vec![SummaryRow::new("内容", content)],
                }
            }
            _ => Self {
                title: "実行確認".to_string(),
                message: raw_text.to_string(),
                rows: vec![SummaryRow::new("内容", raw_text)],
            },
        }
    }

    /// Plain-text rendering for terminals and logs.
    pub fn render(&self) -> String {
        let mut out = format!("【{}】", self.title);
        for row in &self.rows {
            out.push_str(&format!("\n  {}: {}", row.label, row.value));
        }
        out
    }
}

/// Human name for a date slot; literal dates are returned unchanged.
pub fn date_name(date: &str) -> Option<&str> {
    match date.trim() {
        "" => None,
        "today" => Some("今日"),
        "tomorrow" => Some("明日"),
        "day_after_tomorrow" => Some("明後日"),
        other => Some(other),
    }
}

/// `fallback` when the slot is empty or whitespace. The confirmation summary and
/// the dispatcher both go through this, so what is shown is what gets sent.
pub fn slot_or<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    if value.trim().is_empty() {
        fallback
    } else {
        value
    }
}
