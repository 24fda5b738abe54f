// crates/config/src/loader.rs

use std::path::Path;

use hisho_core::{HishoError, HishoResult};
use hisho_nlu::NluMode;
use tracing::debug;

use crate::HishoConfig;

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn load_from_file(path: &Path) -> HishoResult<HishoConfig> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| HishoError::Config(format!("Failed to read config: {}", e)))?;

        let config: HishoConfig = toml::from_str(&content)
            .map_err(|e| HishoError::Config(format!("Failed to parse config: {}", e)))?;

        Ok(config)
    }

    pub fn save_to_file(path: &Path, config: &HishoConfig) -> HishoResult<()> {
        let content = toml::to_string_pretty(config)
            .map_err(|e| HishoError::Config(format!("Failed to serialize config: {}", e)))?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| HishoError::Config(format!("Failed to create config dir: {}", e)))?;
        }

        std::fs::write(path, content)
            .map_err(|e| HishoError::Config(format!("Failed to write config: {}", e)))?;

        Ok(())
    }

    pub fn load_from_env() -> HishoResult<HishoConfig> {
        let mut config = HishoConfig::default();
        Self::apply_env_overrides(&mut config)?;
        Ok(config)
    }

    /// Applies `HISHO_*` variables on top of `config`.
    pub fn apply_env_overrides(config: &mut HishoConfig) -> HishoResult<()> {
        Self::apply_overrides(config, |key| std::env::var(key).ok())
    }

    fn apply_overrides<F>(config: &mut HishoConfig, lookup: F) -> HishoResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(lang) = lookup("HISHO_LANGUAGE") {
            config.app.language = lang;
        }
        if let Some(level) = lookup("HISHO_LOG_LEVEL") {
            config.app.log_level = level;
        }
        if let Some(wake_word) = lookup("HISHO_WAKE_WORD") {
            config.listener.wake_word = wake_word;
        }
        if let Some(mode) = lookup("HISHO_NLU_MODE") {
            config.nlu.mode = match mode.trim().to_lowercase().as_str() {
                "local" => NluMode::Local,
                "hybrid" => NluMode::Hybrid,
                other => {
                    return Err(HishoError::Config(format!("Invalid NLU mode: {}", other)));
                }
            };
        }
        if let Some(model) = lookup("HISHO_REMOTE_MODEL") {
            config.nlu.remote.model = model;
        }
        if let Some(url) = lookup("HISHO_REMOTE_BASE_URL") {
            config.nlu.remote.base_url = Some(url);
        }
        if let Some(limit) = lookup("HISHO_HISTORY_LIMIT") {
            config.app.history_limit = limit
                .trim()
                .parse()
                .map_err(|_| HishoError::Config("Invalid history limit".to_string()))?;
        }
        if let Some(path) = lookup("HISHO_SETTINGS_FILE") {
            config.storage.settings_file = path.into();
        }

        debug!("Environment overrides applied");
        Ok(())
    }
}
