// crates/config/src/lib.rs

use hisho_core::{HishoError, HishoResult};
use notify::{Event, RecursiveMode, Watcher};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info};

pub mod loader;
pub mod settings;
pub mod validator;

pub use hisho_actions::ActionsConfig;
pub use hisho_nlu::{NluConfig, NluMode};
pub use loader::ConfigLoader;
pub use settings::{JsonFileStore, Settings};
pub use validator::ConfigValidator;

pub const DEFAULT_CONFIG_PATH: &str = "config/hisho.toml";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HishoConfig {
    #[serde(default)]
    pub app: AppConfig,
    #[serde(default)]
    pub nlu: NluConfig,
    #[serde(default)]
    pub listener: ListenerConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub actions: ActionsConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
}

fn default_language() -> String {
    "ja".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

const fn default_history_limit() -> usize {
    50
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            language: default_language(),
            log_level: default_log_level(),
            history_limit: default_history_limit(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListenerConfig {
    #[serde(default = "default_wake_word")]
    pub wake_word: String,
    /// How long a detected wake word keeps the command window open.
    #[serde(default = "default_wake_window_ms")]
    pub wake_window_ms: u64,
    /// Silence after which push-to-talk text is flushed.
    #[serde(default = "default_silence_flush_ms")]
    pub silence_flush_ms: u64,
    #[serde(default)]
    pub direct_mode: bool,
}

fn default_wake_word() -> String {
    "ヘイエージェント".to_string()
}

const fn default_wake_window_ms() -> u64 {
    10_000
}

const fn default_silence_flush_ms() -> u64 {
    1_500
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            wake_word: default_wake_word(),
            wake_window_ms: default_wake_window_ms(),
            silence_flush_ms: default_silence_flush_ms(),
            direct_mode: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// An unanswered confirmation counts as a cancel after this long.
    #[serde(default = "default_confirmation_timeout_s")]
    pub confirmation_timeout_s: u64,
}

const fn default_confirmation_timeout_s() -> u64 {
    30
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            confirmation_timeout_s: default_confirmation_timeout_s(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_settings_file")]
    pub settings_file: PathBuf,
}

fn default_settings_file() -> PathBuf {
    PathBuf::from("data/settings.json")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            settings_file: default_settings_file(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_enabled")]
    pub enabled: bool,
}

const fn default_metrics_enabled() -> bool {
    true
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_metrics_enabled(),
        }
    }
}

/// Configuration manager with explicit reload and optional file watching
pub struct ConfigManager {
    config_path: PathBuf,
    config: Arc<RwLock<HishoConfig>>,
    watcher: Option<notify::RecommendedWatcher>,
}

#[derive(Debug, Clone)]
pub struct ConfigUpdateEvent {
    pub old_config: HishoConfig,
    pub new_config: HishoConfig,
    pub changed_sections: Vec<String>,
}

impl ConfigManager {
    pub fn new(config_path: impl AsRef<Path>) -> HishoResult<Self> {
        let config_path = config_path.as_ref().to_path_buf();
        let mut config = ConfigLoader::load_from_file(&config_path)?;
        ConfigLoader::apply_env_overrides(&mut config)?;
        ConfigValidator::validate(&config)?;

        info!(path = %config_path.display(), "Configuration loaded");
        Ok(Self {
            config_path,
            config: Arc::new(RwLock::new(config)),
            watcher: None,
        })
    }

    pub fn with_defaults() -> Self {
        Self {
            config_path: PathBuf::from(DEFAULT_CONFIG_PATH),
            config: Arc::new(RwLock::new(HishoConfig::default())),
            watcher: None,
        }
    }

    /// Loads the file when it exists, defaults (plus env overrides) otherwise.
    pub fn open(config_path: impl AsRef<Path>) -> HishoResult<Self> {
        let path = config_path.as_ref();
        if path.exists() {
            return Self::new(path);
        }

        info!(path = %path.display(), "No configuration file, using defaults");
        let config = ConfigLoader::load_from_env()?;
        ConfigValidator::validate(&config)?;
        Ok(Self {
            config_path: path.to_path_buf(),
            config: Arc::new(RwLock::new(config)),
            watcher: None,
        })
    }

    pub fn path(&self) -> &Path {
        &self.config_path
    }

    pub fn get(&self) -> HishoConfig {
        self.config.read().clone()
    }

    /// Applies `f` to a copy; the change is kept only if it validates.
    pub fn update<F>(&self, f: F) -> HishoResult<()>
    where
        F: FnOnce(&mut HishoConfig),
    {
        let mut config = self.config.write();
        let mut candidate = config.clone();
        f(&mut candidate);
        ConfigValidator::validate(&candidate)?;
        ConfigValidator::validate_runtime_change(&config, &candidate)?;
        *config = candidate;
        Ok(())
    }

    pub fn save(&self) -> HishoResult<()> {
        let config = self.config.read();
        ConfigLoader::save_to_file(&self.config_path, &config)
    }

    /// Re-reads the file. Returns the change set, or `None` when nothing changed.
    pub fn reload(&self) -> HishoResult<Option<ConfigUpdateEvent>> {
        reload_from(&self.config_path, &self.config)
    }

    pub fn enable_hot_reload(
        &mut self,
    ) -> HishoResult<mpsc::UnboundedReceiver<ConfigUpdateEvent>> {
        let (tx, rx) = mpsc::unbounded_channel();

        let config_path = self.config_path.clone();
        let config_arc = self.config.clone();

        let mut watcher = notify::recommended_watcher(move |res: Result<Event, notify::Error>| {
            match res {
                Ok(event) => {
                    if event.kind.is_modify() {
                        info!("Configuration file changed, reloading...");
                        match reload_from(&config_path, &config_arc) {
                            Ok(Some(update)) => {
                                let _ = tx.send(update);
                            }
                            Ok(None) => {}
                            Err(e) => error!(error = %e, "Failed to reload configuration"),
                        }
                    }
                }
                Err(e) => {
                    error!(error = %e, "Configuration watcher error");
                }
            }
        })
        .map_err(|e| HishoError::Config(format!("Failed to create watcher: {}", e)))?;

        watcher
            .watch(&self.config_path, RecursiveMode::NonRecursive)
            .map_err(|e| HishoError::Config(format!("Failed to watch config: {}", e)))?;

        self.watcher = Some(watcher);
        Ok(rx)
    }

    /// Names of the top-level sections that differ.
    pub fn detect_changes(old: &HishoConfig, new: &HishoConfig) -> Vec<String> {
        let (Ok(old), Ok(new)) = (serde_json::to_value(old), serde_json::to_value(new)) else {
            return Vec::new();
        };
        let (Some(old), Some(new)) = (old.as_object(), new.as_object()) else {
            return Vec::new();
        };

        new.iter()
            .filter(|(section, value)| old.get(*section) != Some(*value))
            .map(|(section, _)| section.clone())
            .collect()
    }
}

fn reload_from(
    path: &Path,
    config: &RwLock<HishoConfig>,
) -> HishoResult<Option<ConfigUpdateEvent>> {
    let mut new_config = ConfigLoader::load_from_file(path)?;
    ConfigLoader::apply_env_overrides(&mut new_config)?;
    ConfigValidator::validate(&new_config)?;

    let old_config = config.read().clone();
    ConfigValidator::validate_runtime_change(&old_config, &new_config)?;

    let changed_sections = ConfigManager::detect_changes(&old_config, &new_config);
    if changed_sections.is_empty() {
        return Ok(None);
    }

    info!(changed = ?changed_sections, "Configuration changes detected");
    *config.write() = new_config.clone();
    Ok(Some(ConfigUpdateEvent {
        old_config,
        new_config,
        changed_sections,
    }))
}
