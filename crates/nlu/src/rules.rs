// crates/nlu/src/rules.rs

use std::collections::{HashMap, HashSet};
use std::path::Path;

use hisho_core::{HishoError, HishoResult, Intent, IntentKind};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::normalize::normalize;
use crate::slots;

/// Keyword groups in priority order. The first group with a hit wins.
const DEFAULT_RULES: &[(IntentKind, &[&str])] = &[
    (
        IntentKind::Help,
        &["どんな機能", "何ができる", "使い方", "ヘルプ", "機能一覧", "何ができ", "できること", "使える機能"],
    ),
    (
        IntentKind::CheckEmail,
        &["未読", "メール確認", "メールチェック", "受信", "メールを見", "メールを確認"],
    ),
    (IntentKind::SendEmail, &["メール", "メールして", "メールを送", "mail", "送信"]),
    (
        IntentKind::CreateEvent,
        &[
            "予定を入れ",
            "予定を作",
            "予定に入れ",
            "予定に追加",
            "スケジュールに",
            "スケジュールを入れ",
            "カレンダーに",
            "会議を入れ",
            "予定を追加",
            "予定入れ",
        ],
    ),
    (
        IntentKind::CheckSchedule,
        &["今日の予定", "明日の予定", "予定を教え", "スケジュール確認", "予定は", "予定を確認", "予定教え"],
    ),
    (
        IntentKind::SetReminder,
        &["リマインド", "リマインダー", "忘れない", "思い出させ", "通知して"],
    ),
    (
        IntentKind::ListTasks,
        &["タスク一覧", "タスクを見", "やること一覧", "タスク確認", "タスクを確認"],
    ),
    (IntentKind::CreateTask, &["タスク", "やること", "todo", "追加して", "登録して"]),
    (IntentKind::Weather, &["天気", "気温", "降水", "傘"]),
    (IntentKind::WebSearch, &["検索", "調べて", "ググ"]),
    (IntentKind::Translate, &["翻訳", "英語に", "日本語に", "通訳", "英訳", "和訳"]),
    (
        IntentKind::Calculate,
        &["計算", "足す", "引く", "掛ける", "割る", "+", "*", "/", "×", "÷", "＋", "="],
    ),
    (IntentKind::News, &["ニュース", "最新情報", "ヘッドライン"]),
    (
        IntentKind::SetTimer,
        &["タイマー", "分後", "秒後", "時間後", "アラーム", "カウントダウン"],
    ),
    (
        IntentKind::ListNotes,
        &["メモ一覧", "メモを見", "メモ確認", "メモを確認", "ノート一覧"],
    ),
    (IntentKind::CaptureReceipt, &["領収書", "レシート", "経費", "精算"]),
    (IntentKind::SaveNote, &["メモ", "ノート", "記録", "書いて", "めも"]),
];

/// How a rules file entry combines with the built-in keywords.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeMode {
    #[default]
    Extend,
    Replace,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleOverride {
    pub intent: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub mode: MergeMode,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RulesFile {
    #[serde(default)]
    pub rules: Vec<RuleOverride>,
    #[serde(default)]
    pub disabled: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    pub kind: IntentKind,
    pub keywords: Vec<String>,
}

impl Rule {
    fn matches(&self, normalized: &str) -> bool {
        self.keywords.iter().any(|k| normalized.contains(k.as_str()))
    }
}

/// Ordered first-match keyword classifier.
#[derive(Debug, Clone)]
pub struct RuleClassifier {
    rules: Vec<Rule>,
}

impl Default for RuleClassifier {
    fn default() -> Self {
        let rules = DEFAULT_RULES
            .iter()
            .map(|(kind, keywords)| Rule {
                kind: *kind,
                keywords: keywords.iter().map(|k| normalize(k)).collect(),
            })
            .collect();
        Self { rules }
    }
}

impl RuleClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Built-in table adjusted by per-kind keyword overrides and disabled kinds.
    /// Priority order never changes; a replaced group keeps its slot.
    pub fn with_overrides(
        overrides: &[RuleOverride],
        extra: &HashMap<String, Vec<String>>,
        disabled: &[String],
    ) -> HishoResult<Self> {
        let mut classifier = Self::default();

        for entry in overrides {
            let kind = parse_kind(&entry.intent)?;
            let keywords = entry.keywords.iter().map(|k| normalize(k));
            let rule = classifier.rule_mut(kind)?;
            match entry.mode {
                MergeMode::Extend => rule.keywords.extend(keywords),
                MergeMode::Replace => rule.keywords = keywords.collect(),
            }
        }

        for (name, keywords) in extra {
            let kind = parse_kind(name)?;
            let rule = classifier.rule_mut(kind)?;
            rule.keywords.extend(keywords.iter().map(|k| normalize(k)));
        }

        let disabled = disabled
            .iter()
            .map(|name| parse_kind(name))
            .collect::<HishoResult<Vec<_>>>()?;
        classifier.rules.retain(|rule| !disabled.contains(&rule.kind));

        for rule in &mut classifier.rules {
            let mut seen = HashSet::new();
            rule.keywords
                .retain(|k| !k.is_empty() && seen.insert(k.clone()));
        }

        Ok(classifier)
    }

    pub fn from_file(
        path: &Path,
        extra: &HashMap<String, Vec<String>>,
        disabled: &[String],
    ) -> HishoResult<Self> {
        let file: RulesFile = crate::load_config(path)?;
        let mut all_disabled = file.disabled.clone();
        all_disabled.extend(disabled.iter().cloned());
        Self::with_overrides(&file.rules, extra, &all_disabled)
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn is_enabled(&self, kind: IntentKind) -> bool {
        self.rules.iter().any(|rule| rule.kind == kind)
    }

    /// Kind of the first rule whose keyword set hits `normalized`.
    pub fn matched_kind(&self, normalized: &str) -> Option<IntentKind> {
        self.rules
            .iter()
            .find(|rule| rule.matches(normalized))
            .map(|rule| rule.kind)
    }

    pub fn classify(&self, normalized: &str, original: &str) -> Intent {
        match self.matched_kind(normalized) {
            Some(kind) => {
                debug!(intent = %kind, "Rule matched");
                build_intent(kind, original)
            }
            None => Intent::unknown(original),
        }
    }

    fn rule_mut(&mut self, kind: IntentKind) -> HishoResult<&mut Rule> {
        self.rules
            .iter_mut()
            .find(|rule| rule.kind == kind)
            .ok_or_else(|| HishoError::Nlu(format!("No keyword rule for intent '{}'", kind)))
    }
}

fn parse_kind(name: &str) -> HishoResult<IntentKind> {
    IntentKind::from_name(name)
        .ok_or_else(|| HishoError::Nlu(format!("Unknown intent '{}' in rules", name)))
}

/// Runs the slot extractors for `kind` over the original-case text.
pub fn build_intent(kind: IntentKind, text: &str) -> Intent {
    match kind {
        IntentKind::SendEmail => Intent::SendEmail {
            to: slots::extract_recipient(text),
            subject: slots::extract_subject(text),
            body: slots::extract_body(text),
        },
        IntentKind::CheckEmail => Intent::CheckEmail,
        IntentKind::CreateEvent => Intent::CreateEvent {
            title: slots::extract_event_title(text),
            date: slots::extract_date(text),
            time: slots::extract_time(text),
        },
        IntentKind::CheckSchedule => {
            let date = slots::extract_date(text);
            Intent::CheckSchedule {
                date: if date.is_empty() {
                    "today".to_string()
                } else {
                    date
                },
            }
        }
        IntentKind::CreateTask => Intent::CreateTask {
            title: slots::extract_task_title(text),
            notes: String::new(),
        },
        IntentKind::ListTasks => Intent::ListTasks,
        IntentKind::SetReminder => Intent::SetReminder {
            title: slots::extract_reminder_title(text),
            date: slots::extract_date(text),
            time: slots::extract_time(text),
        },
        IntentKind::Weather => Intent::Weather {
            location: slots::extract_weather_location(text),
        },
        IntentKind::WebSearch => Intent::WebSearch {
            query: slots::extract_search_query(text),
        },
        IntentKind::Translate => Intent::Translate {
            text: slots::extract_translate_text(text),
            target_lang: slots::extract_target_lang(text),
        },
        IntentKind::Calculate => Intent::Calculate {
            expression: slots::extract_expression(text),
        },
        IntentKind::News => Intent::News {
            category: slots::extract_news_category(text),
        },
        IntentKind::SetTimer => Intent::SetTimer {
            seconds: slots::extract_timer_seconds(text),
        },
        IntentKind::SaveNote => Intent::SaveNote {
            content: slots::extract_note_content(text),
        },
        IntentKind::ListNotes => Intent::ListNotes,
        IntentKind::CaptureReceipt => Intent::CaptureReceipt,
        IntentKind::Help => Intent::Help,
        IntentKind::Unknown => Intent::unknown(text),
    }
}
