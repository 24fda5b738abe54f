// crates/nlu/src/slots.rs
//
// Slot extractors. Every function takes the original-case utterance, tries
// its patterns in order and falls back to a fixed value. None of them fail.

use chrono::Datelike;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::normalize::to_ascii_digits;

pub const DEFAULT_TIMER_SECONDS: u64 = 180;
pub const DEFAULT_TARGET_LANG: &str = "en";

static QUOTED: Lazy<Regex> = Lazy::new(|| Regex::new(r"「(.+?)」").unwrap());

static RECIPIENT_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"(.+?)に(?:メール|送信)").unwrap(),
        Regex::new(r"(.+?)宛て?").unwrap(),
        Regex::new(r"(.+?)へ(?:メール|送信)").unwrap(),
    ]
});
static SUBJECT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:件名|タイトル)は(.+?)(?:で|、|,|，|$)").unwrap());
static BODY: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?:内容|本文)は(.+)$").unwrap());
static BODY_TAIL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:と|で)?(?:送って|送信して|伝えて|送信)?(?:ください)?[。.]?$").unwrap()
});

static EVENT_TITLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(.+?)(?:を|の)(?:予定|スケジュール|カレンダー)").unwrap());
static EVENT_NOISE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"予定|スケジュール|カレンダー|入れて|追加|作成|して|登録").unwrap()
});

static REMINDER_TITLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(.+?)を(?:リマインド|リマインダー|忘れない|通知)").unwrap());
static REMINDER_AFTER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:リマインド|リマインダー|通知)して(.+?)$").unwrap());
static REMINDER_NOISE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"リマインダー|リマインド|通知して|通知|忘れないように|忘れない|思い出させて|して|までに|まで")
        .unwrap()
});

static TASK_TITLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(.+?)を(?:タスク|追加|登録)").unwrap());
static TASK_AFTER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:タスク|追加|登録)して(.+?)$").unwrap());
static TASK_NOISE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"タスク|やること|(?i:todo)|追加して|追加|登録して|登録|して|までに|まで").unwrap()
});

static TRANSLATE_TEXT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(.+?)を(?:翻訳|英語|日本語|中国語|韓国語|英訳|和訳)").unwrap()
});
static TRANSLATE_NOISE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"翻訳|英語に|日本語に|中国語に|韓国語に|英訳|和訳|して").unwrap()
});

static NOTE_BEFORE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(.+?)を(?:メモ|ノート|記録)").unwrap());
static NOTE_AFTER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:メモ|ノート|記録)[：:\s]*(.+)").unwrap());
static NOTE_NOISE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"メモ|ノート|記録|書いて|して|おいて").unwrap());

static WEATHER_LOCATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(.+?)の(?:天気|気温|降水)").unwrap());

static SEARCH_QUERY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(.+?)(?:を|について|で)?(?:検索|調べて|ググ)").unwrap()
});
static SEARCH_NOISE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"検索して|検索|調べて|ググって").unwrap());

static CALC_NOISE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"を?計算して|計算|って何|はいくつ|いくつ|は何|ですか|ください|[？?＝=]").unwrap()
});

static MONTH_DAY: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d{1,2})月(\d{1,2})日").unwrap());
static CLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:^|[^\d])(午前|午後)?\s*(\d{1,2})\s*時(間)?\s*(?:(\d{1,2})\s*分|(半))?").unwrap()
});
static DATE_TIME_TOKENS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"明後日|明日|今日|今夜|今晩|\d{1,2}月\d{1,2}日|(?:午前|午後)?\d{1,2}\s*時\s*(?:\d{1,2}\s*分|半)?")
        .unwrap()
});

static TIMER_HOURS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+)\s*時間").unwrap());
static TIMER_MINUTES: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+)\s*分").unwrap());
static TIMER_SECONDS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+)\s*秒").unwrap());

const PARTICLES: &[char] = &['の', 'に', 'を', 'で', 'へ', 'は', '、', '。', ',', '.'];

pub fn extract_recipient(text: &str) -> String {
    RECIPIENT_PATTERNS
        .iter()
        .filter_map(|re| re.captures(text))
        .map(|caps| {
            let name = caps[1].trim();
            name.strip_suffix("宛て")
                .or_else(|| name.strip_suffix('宛'))
                .unwrap_or(name)
                .trim()
                .to_string()
        })
        .find(|name| !name.is_empty())
        .unwrap_or_default()
}

pub fn extract_subject(text: &str) -> String {
    SUBJECT
        .captures(text)
        .map(|caps| caps[1].trim().to_string())
        .unwrap_or_default()
}

pub fn extract_body(text: &str) -> String {
    BODY.captures(text)
        .map(|caps| BODY_TAIL.replace(caps[1].trim(), "").trim().to_string())
        .unwrap_or_default()
}

pub fn extract_event_title(text: &str) -> String {
    quoted(text)
        .or_else(|| capture_title(&EVENT_TITLE, text, &["予定", "スケジュール", "カレンダー"]))
        .or_else(|| strip_to_title(text, &EVENT_NOISE))
        .unwrap_or_else(|| text.to_string())
}

pub fn extract_reminder_title(text: &str) -> String {
    quoted(text)
        .or_else(|| capture_title(&REMINDER_TITLE, text, &["リマインド", "リマインダー", "通知"]))
        .or_else(|| capture_title(&REMINDER_AFTER, text, &[]))
        .or_else(|| strip_to_title(text, &REMINDER_NOISE))
        .unwrap_or_else(|| text.to_string())
}

pub fn extract_task_title(text: &str) -> String {
    quoted(text)
        .or_else(|| capture_title(&TASK_TITLE, text, &["タスク", "追加", "登録"]))
        .or_else(|| capture_title(&TASK_AFTER, text, &[]))
        .or_else(|| strip_to_title(text, &TASK_NOISE))
        .unwrap_or_else(|| text.to_string())
}

pub fn extract_translate_text(text: &str) -> String {
    quoted(text)
        .or_else(|| {
            TRANSLATE_TEXT
                .captures(text)
                .map(|caps| trim_particles(&caps[1]))
                .filter(|s| !s.is_empty())
        })
        .or_else(|| strip_to_title(text, &TRANSLATE_NOISE))
        .unwrap_or_else(|| text.to_string())
}

pub fn extract_target_lang(text: &str) -> String {
    let code = if contains_any(text, &["日本語", "和訳"]) {
        "ja"
    } else if contains_any(text, &["英語", "英訳"]) {
        "en"
    } else if text.contains("中国語") {
        "zh"
    } else if text.contains("韓国語") {
        "ko"
    } else {
        DEFAULT_TARGET_LANG
    };
    code.to_string()
}

pub fn extract_note_content(text: &str) -> String {
    quoted(text)
        .or_else(|| {
            NOTE_BEFORE
                .captures(text)
                .map(|caps| trim_particles(&caps[1]))
                .filter(|s| !s.is_empty())
        })
        .or_else(|| {
            NOTE_AFTER
                .captures(text)
                .map(|caps| trim_particles(&NOTE_NOISE.replace_all(&caps[1], "")))
                .filter(|s| !s.is_empty())
        })
        .or_else(|| {
            let stripped = trim_particles(&NOTE_NOISE.replace_all(text, ""));
            (!stripped.is_empty()).then_some(stripped)
        })
        .unwrap_or_else(|| text.to_string())
}

pub fn extract_weather_location(text: &str) -> String {
    WEATHER_LOCATION
        .captures(text)
        .map(|caps| trim_particles(&DATE_TIME_TOKENS.replace_all(&caps[1], "")))
        .unwrap_or_default()
}

pub fn extract_search_query(text: &str) -> String {
    quoted(text)
        .or_else(|| {
            SEARCH_QUERY
                .captures(text)
                .map(|caps| trim_particles(&caps[1]))
                .filter(|s| !s.is_empty())
        })
        .or_else(|| strip_to_title(text, &SEARCH_NOISE))
        .unwrap_or_else(|| text.to_string())
}

/// Expression text handed to the calculator; operator words are kept for it to map.
pub fn extract_expression(text: &str) -> String {
    let text = to_ascii_digits(text);
    quoted(&text).unwrap_or_else(|| CALC_NOISE.replace_all(&text, "").trim().to_string())
}

pub fn extract_news_category(text: &str) -> String {
    let category = if contains_any(text, &["スポーツ", "野球", "サッカー"]) {
        "sports"
    } else if contains_any(text, &["経済", "ビジネス", "株"]) {
        "business"
    } else if contains_any(text, &["テクノロジー", "技術", "IT"]) {
        "technology"
    } else if contains_any(text, &["エンタメ", "芸能"]) {
        "entertainment"
    } else if text.contains("科学") {
        "science"
    } else if text.contains("健康") {
        "health"
    } else {
        "general"
    };
    category.to_string()
}

pub fn extract_date(text: &str) -> String {
    extract_date_in_year(text, chrono::Local::now().year())
}

/// Same as [`extract_date`] with an explicit year for literal `M月D日` dates.
pub fn extract_date_in_year(text: &str, year: i32) -> String {
    if text.contains("今日") {
        return "today".to_string();
    }
    if text.contains("明後日") {
        return "day_after_tomorrow".to_string();
    }
    if text.contains("明日") {
        return "tomorrow".to_string();
    }

    let normalized = to_ascii_digits(text);
    MONTH_DAY
        .captures_iter(&normalized)
        .filter_map(|caps| {
            let month: u32 = caps[1].parse().ok()?;
            let day: u32 = caps[2].parse().ok()?;
            ((1..=12).contains(&month) && (1..=31).contains(&day))
                .then(|| format!("{}-{:02}-{:02}", year, month, day))
        })
        .next()
        .unwrap_or_default()
}

pub fn extract_time(text: &str) -> String {
    let normalized = to_ascii_digits(text);
    for caps in CLOCK.captures_iter(&normalized) {
        // "3時間" is a duration, not a clock time.
        if caps.get(3).is_some() {
            continue;
        }
        let Ok(mut hour) = caps[2].parse::<u32>() else {
            continue;
        };
        let minute = match (caps.get(4), caps.get(5)) {
            (Some(m), _) => m.as_str().parse::<u32>().unwrap_or(60),
            (None, Some(_)) => 30,
            (None, None) => 0,
        };
        if caps.get(1).map(|m| m.as_str()) == Some("午後") && hour < 12 {
            hour += 12;
        }
        if hour > 23 || minute > 59 {
            return String::new();
        }
        return format!("{:02}:{:02}", hour, minute);
    }
    String::new()
}

pub fn extract_timer_seconds(text: &str) -> u64 {
    let normalized = to_ascii_digits(text);
    let amount = |re: &Regex| -> u64 {
        re.captures(&normalized)
            .and_then(|caps| caps[1].parse::<u64>().ok())
            .unwrap_or(0)
    };

    let total = amount(&TIMER_HOURS)
        .saturating_mul(3600)
        .saturating_add(amount(&TIMER_MINUTES).saturating_mul(60))
        .saturating_add(amount(&TIMER_SECONDS));

    if total == 0 {
        DEFAULT_TIMER_SECONDS
    } else {
        total
    }
}

pub(crate) fn contains_any(text: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|k| text.contains(k))
}

fn quoted(text: &str) -> Option<String> {
    QUOTED
        .captures(text)
        .map(|caps| caps[1].trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Runs `re`, cleans date/time tokens out of the capture and rejects stop words.
fn capture_title(re: &Regex, text: &str, stop_words: &[&str]) -> Option<String> {
    let caps = re.captures(text)?;
    let cleaned = trim_particles(&DATE_TIME_TOKENS.replace_all(&caps[1], ""));
    if cleaned.is_empty() || stop_words.contains(&cleaned.as_str()) {
        None
    } else {
        Some(cleaned)
    }
}

fn strip_to_title(text: &str, noise: &Regex) -> Option<String> {
    let without_dates = DATE_TIME_TOKENS.replace_all(text, "");
    let stripped = trim_particles(&noise.replace_all(&without_dates, ""));
    (!stripped.is_empty()).then_some(stripped)
}

fn trim_particles(text: &str) -> String {
    text.trim_matches(|c: char| c.is_whitespace() || PARTICLES.contains(&c))
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_and_literal_dates() {
        assert_eq!(extract_date("今日の予定"), "today");
        assert_eq!(extract_date("明日の予定"), "tomorrow");
        assert_eq!(extract_date("明後日の会議"), "day_after_tomorrow");
        assert_eq!(extract_date_in_year("3月5日に歯医者", 2026), "2026-03-05");
        assert_eq!(extract_date_in_year("１２月２４日に", 2026), "2026-12-24");
        assert_eq!(extract_date_in_year("13月40日", 2026), "");
        assert_eq!(extract_date("そのうち"), "");
    }

    #[test]
    fn literal_date_uses_current_year() {
        let year = chrono::Local::now().year();
        assert_eq!(extract_date("3月5日に"), format!("{}-03-05", year));
    }

    #[test]
    fn clock_times() {
        assert_eq!(extract_time("15時30分に"), "15:30");
        assert_eq!(extract_time("10時に"), "10:00");
        assert_eq!(extract_time("9時半に"), "09:30");
        assert_eq!(extract_time("１０時５分"), "10:05");
        assert_eq!(extract_time("午後3時に"), "15:00");
        assert_eq!(extract_time("25時に"), "");
        assert_eq!(extract_time("3時間後"), "");
        assert_eq!(extract_time("123時に"), "");
        assert_eq!(extract_time("明日の10時に"), "10:00");
        assert_eq!(extract_time("会議"), "");
    }

    #[test]
    fn recipient_patterns() {
        assert_eq!(extract_recipient("田中さんにメールして"), "田中さん");
        assert_eq!(extract_recipient("佐藤部長宛てに送って"), "佐藤部長");
        assert_eq!(extract_recipient("佐藤部長宛てにメールして"), "佐藤部長");
        assert_eq!(extract_recipient("鈴木課長宛にメール"), "鈴木課長");
        assert_eq!(extract_recipient("山田へ送信"), "山田");
        assert_eq!(extract_recipient("メールして"), "");
    }

    #[test]
    fn subject_and_body() {
        let text = "田中さんに件名は打ち合わせで本文は明日遅れますと送って";
        assert_eq!(extract_subject(text), "打ち合わせ");
        assert_eq!(extract_body(text), "明日遅れます");
        assert_eq!(extract_subject("田中さんにメール"), "");
        assert_eq!(extract_body("田中さんにメール"), "");
    }

    #[test]
    fn event_title_strips_dates_and_particles() {
        assert_eq!(extract_event_title("明日の10時に会議を予定に入れて"), "会議");
        assert_eq!(extract_event_title("「歯医者」を予定に入れて"), "歯医者");
        assert_eq!(extract_event_title("明日10時にランチの予定を追加"), "ランチ");
    }

    #[test]
    fn event_title_falls_back_to_verbatim() {
        assert_eq!(extract_event_title("予定を入れて"), "予定を入れて");
    }

    #[test]
    fn reminder_title_rejects_stop_words() {
        assert_eq!(extract_reminder_title("薬を飲むことをリマインドして"), "薬を飲むこと");
        assert_eq!(extract_reminder_title("リマインドして牛乳を買う"), "牛乳を買う");
        assert_eq!(extract_reminder_title("リマインダー"), "リマインダー");
    }

    #[test]
    fn reminder_title_strips_dates_and_connectors() {
        assert_eq!(extract_reminder_title("明日の10時に歯医者リマインド"), "歯医者");
        assert_eq!(extract_reminder_title("ゴミ出し 明日 リマインダー"), "ゴミ出し");
    }

    #[test]
    fn task_title() {
        assert_eq!(extract_task_title("請求書の送付をタスクに追加"), "請求書の送付");
        assert_eq!(extract_task_title("タスクを追加"), "タスクを追加");
    }

    #[test]
    fn task_title_strips_dates_and_connectors() {
        assert_eq!(extract_task_title("明日までに牛乳を買うタスク"), "牛乳を買う");
        assert_eq!(extract_task_title("追加して資料の準備"), "資料の準備");
        assert_eq!(extract_task_title("TODO 明後日 経費精算"), "経費精算");
    }

    #[test]
    fn translation_slots() {
        assert_eq!(extract_translate_text("「おはよう」を英語に翻訳して"), "おはよう");
        assert_eq!(extract_translate_text("ありがとうを英語にして"), "ありがとう");
        assert_eq!(extract_target_lang("ありがとうを英語にして"), "en");
        assert_eq!(extract_target_lang("helloを和訳して"), "ja");
        assert_eq!(extract_target_lang("中国語に翻訳"), "zh");
        assert_eq!(extract_target_lang("韓国語に翻訳"), "ko");
        assert_eq!(extract_target_lang("翻訳して"), "en");
    }

    #[test]
    fn timer_durations() {
        assert_eq!(extract_timer_seconds("3分タイマー"), 180);
        assert_eq!(extract_timer_seconds("1時間30分後に"), 5400);
        assert_eq!(extract_timer_seconds("４５秒のタイマー"), 45);
        assert_eq!(extract_timer_seconds("タイマーをセット"), DEFAULT_TIMER_SECONDS);
    }

    #[test]
    fn note_content() {
        assert_eq!(extract_note_content("牛乳を買うをメモして"), "牛乳を買う");
        assert_eq!(extract_note_content("メモ：駐車場はB2"), "駐車場はB2");
        assert_eq!(extract_note_content("「鍵は棚の上」とメモ"), "鍵は棚の上");
    }

    #[test]
    fn utility_slots() {
        assert_eq!(extract_weather_location("東京の天気"), "東京");
        assert_eq!(extract_weather_location("明日の天気"), "");
        assert_eq!(extract_search_query("Rustの所有権を検索して"), "Rustの所有権");
        assert_eq!(extract_expression("１００+２００を計算して"), "100+200");
        assert_eq!(extract_news_category("スポーツニュース"), "sports");
        assert_eq!(extract_news_category("ニュース"), "general");
    }
}
