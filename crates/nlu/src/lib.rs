// crates/nlu/src/lib.rs

use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

use hisho_core::{HishoError, HishoResult, Intent};
use hisho_llm_connector::LlmConfig;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, info};

pub mod normalize;
pub mod remote;
pub mod rules;
pub mod slots;

pub use normalize::normalize;
pub use remote::RemoteClassifier;
pub use rules::{build_intent, RuleClassifier};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NluMode {
    /// Rules only.
    Local,
    /// Remote classifier first when a credential is configured, rules as fallback.
    #[default]
    Hybrid,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NluConfig {
    #[serde(default)]
    pub mode: NluMode,
    /// YAML or JSON keyword overrides.
    #[serde(default)]
    pub rules_file: Option<PathBuf>,
    #[serde(default)]
    pub disabled_intents: Vec<String>,
    #[serde(default)]
    pub extra_keywords: HashMap<String, Vec<String>>,
    /// Completion endpoint for the remote classifier.
    #[serde(default)]
    pub remote: LlmConfig,
}

/// Text to intent. Owns the rule table and, optionally, a remote classifier.
pub struct IntentParser {
    config: NluConfig,
    rules: RuleClassifier,
    remote: Option<RemoteClassifier>,
}

impl IntentParser {
    pub fn new(config: NluConfig) -> HishoResult<Self> {
        let rules = build_rules(&config)?;
        info!(
            mode = ?config.mode,
            rules = rules.rules().len(),
            "Intent parser ready"
        );
        Ok(Self {
            config,
            rules,
            remote: None,
        })
    }

    pub fn with_remote(mut self, remote: RemoteClassifier) -> Self {
        self.remote = Some(remote);
        self
    }

    /// Swaps the remote classifier, e.g. after the stored credential changed.
    pub fn set_remote(&mut self, remote: Option<RemoteClassifier>) {
        info!(enabled = remote.is_some(), "Remote classifier updated");
        self.remote = remote;
    }

    /// Rebuilds the rule table from a new configuration.
    pub fn refresh(&mut self, config: NluConfig) -> HishoResult<()> {
        self.rules = build_rules(&config)?;
        self.config = config;
        Ok(())
    }

    pub fn remote_enabled(&self) -> bool {
        self.config.mode == NluMode::Hybrid && self.remote.is_some()
    }

    pub fn remote(&self) -> Option<&RemoteClassifier> {
        self.remote.as_ref()
    }

    pub fn rules(&self) -> &RuleClassifier {
        &self.rules
    }

    pub fn config(&self) -> &NluConfig {
        &self.config
    }

    /// Rules-only classification. Pure and deterministic.
    pub fn classify_local(&self, text: &str) -> Intent {
        let original = text.trim();
        self.rules.classify(&normalize(original), original)
    }

    pub async fn parse(&self, text: &str) -> Intent {
        let original = text.trim();
        if original.is_empty() {
            return Intent::unknown(original);
        }

        if self.remote_enabled() {
            if let Some(remote) = &self.remote {
                if let Some(intent) = remote.classify(original).await {
                    if self.rules.is_enabled(intent.kind()) {
                        return intent;
                    }
                    debug!(intent = %intent.kind(), "Remote intent is disabled, using rules");
                }
            }
        }

        self.classify_local(original)
    }
}

fn build_rules(config: &NluConfig) -> HishoResult<RuleClassifier> {
    match &config.rules_file {
        Some(path) => {
            RuleClassifier::from_file(path, &config.extra_keywords, &config.disabled_intents)
        }
        None => RuleClassifier::with_overrides(
            &[],
            &config.extra_keywords,
            &config.disabled_intents,
        ),
    }
}

/// Reads JSON or YAML depending on the file extension.
pub(crate) fn load_config<T: DeserializeOwned>(path: &Path) -> HishoResult<T> {
    let contents = fs::read_to_string(path)
        .map_err(|e| HishoError::Config(format!("Failed to read {}: {}", path.display(), e)))?;

    let ext = path.extension().and_then(|s| s.to_str()).unwrap_or("");

    if ext.eq_ignore_ascii_case("json") {
        serde_json::from_str(&contents)
            .map_err(|e| HishoError::Config(format!("Failed to parse {}: {}", path.display(), e)))
    } else {
        serde_yaml::from_str(&contents)
            .map_err(|e| HishoError::Config(format!("Failed to parse {}: {}", path.display(), e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use hisho_core::IntentKind;
    use hisho_llm_connector::{
        CompletionProvider, CompletionRequest, CompletionResponse, LlmConnector,
    };
    use parking_lot::Mutex;
    use std::sync::Arc;
    use tempfile::tempdir;

    struct Fixed {
        reply: &'static str,
        calls: Arc<Mutex<usize>>,
    }

    #[async_trait]
    impl CompletionProvider for Fixed {
        async fn complete(&self, _request: CompletionRequest) -> HishoResult<CompletionResponse> {
            *self.calls.lock() += 1;
            Ok(CompletionResponse {
                content: self.reply.to_string(),
                ..CompletionResponse::default()
            })
        }

        fn name(&self) -> &str {
            "fixed"
        }
    }

    fn remote(reply: &'static str) -> (RemoteClassifier, Arc<Mutex<usize>>) {
        let calls = Arc::new(Mutex::new(0));
        let provider = Fixed {
            reply,
            calls: calls.clone(),
        };
        let connector = LlmConnector::new(LlmConfig::default(), Arc::new(provider));
        (RemoteClassifier::new(connector), calls)
    }

    #[tokio::test]
    async fn local_parse_without_credential() {
        let parser = IntentParser::new(NluConfig::default()).unwrap();
        assert!(!parser.remote_enabled());
        assert_eq!(parser.parse("未読メールを確認して").await, Intent::CheckEmail);
        assert_eq!(parser.parse("  ").await.kind(), IntentKind::Unknown);
    }

    #[tokio::test]
    async fn remote_reply_takes_precedence() {
        let (remote, calls) = remote(r#"{"intent":"news","params":{"category":"sports"}}"#);
        let parser = IntentParser::new(NluConfig::default())
            .unwrap()
            .with_remote(remote);

        let intent = parser.parse("野球どうなった").await;
        assert_eq!(
            intent,
            Intent::News {
                category: "sports".to_string()
            }
        );
        assert_eq!(*calls.lock(), 1);
    }

    #[tokio::test]
    async fn invalid_remote_reply_falls_back_to_rules() {
        let (remote, _) = remote(r#"{"intent":"dance","params":{}}"#);
        let parser = IntentParser::new(NluConfig::default())
            .unwrap()
            .with_remote(remote);

        assert_eq!(parser.parse("タスクを確認して").await, Intent::ListTasks);
    }

    #[tokio::test]
    async fn local_mode_never_calls_remote() {
        let (remote, calls) = remote(r#"{"intent":"help"}"#);
        let config = NluConfig {
            mode: NluMode::Local,
            ..NluConfig::default()
        };
        let parser = IntentParser::new(config).unwrap().with_remote(remote);

        assert_eq!(parser.parse("こんにちは").await, Intent::unknown("こんにちは"));
        assert_eq!(*calls.lock(), 0);
    }

    #[tokio::test]
    async fn disabled_kind_from_remote_is_ignored() {
        let (remote, _) = remote(r#"{"intent":"capture_receipt"}"#);
        let config = NluConfig {
            disabled_intents: vec!["capture_receipt".to_string()],
            ..NluConfig::default()
        };
        let parser = IntentParser::new(config).unwrap().with_remote(remote);

        assert_eq!(parser.parse("レシート").await, Intent::unknown("レシート"));
    }

    #[test]
    fn refresh_rebuilds_rules() {
        let mut parser = IntentParser::new(NluConfig::default()).unwrap();
        assert_eq!(parser.classify_local("速報").kind(), IntentKind::Unknown);

        let mut extra = HashMap::new();
        extra.insert("news".to_string(), vec!["速報".to_string()]);
        parser
            .refresh(NluConfig {
                extra_keywords: extra,
                ..NluConfig::default()
            })
            .unwrap();
        assert_eq!(parser.classify_local("速報").kind(), IntentKind::News);
    }

    #[test]
    fn loads_json_rules_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("rules.json");
        fs::write(&path, r#"{"rules":[{"intent":"help","keywords":["助けて"]}]}"#).unwrap();

        let parser = IntentParser::new(NluConfig {
            rules_file: Some(path),
            ..NluConfig::default()
        })
        .unwrap();
        assert_eq!(parser.classify_local("助けて"), Intent::Help);
    }

    #[test]
    fn missing_rules_file_is_config_error() {
        let result = IntentParser::new(NluConfig {
            rules_file: Some(PathBuf::from("/nonexistent/rules.yaml")),
            ..NluConfig::default()
        });
        assert!(matches!(result, Err(HishoError::Config(_))));
    }
}
