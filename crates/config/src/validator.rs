// crates/config/src/validator.rs

use hisho_core::{HishoError, HishoResult, IntentKind};
use tracing::warn;

use crate::HishoConfig;

pub struct ConfigValidator;

impl ConfigValidator {
    pub fn validate(config: &HishoConfig) -> HishoResult<()> {
        if config.app.history_limit == 0 {
            return Err(HishoError::Config("History limit must be > 0".to_string()));
        }

        // Listener
        if config.listener.wake_word.trim().is_empty() {
            return Err(HishoError::Config("Wake word must not be empty".to_string()));
        }
        if config.listener.wake_window_ms == 0 {
            return Err(HishoError::Config("Wake window must be > 0 ms".to_string()));
        }
        if config.listener.silence_flush_ms == 0 {
            return Err(HishoError::Config("Silence flush must be > 0 ms".to_string()));
        }

        if config.session.confirmation_timeout_s == 0 {
            return Err(HishoError::Config(
                "Confirmation timeout must be > 0 s".to_string(),
            ));
        }

        // NLU
        for name in config
            .nlu
            .disabled_intents
            .iter()
            .chain(config.nlu.extra_keywords.keys())
        {
            if IntentKind::from_name(name).is_none() {
                return Err(HishoError::Config(format!("Unknown intent: {}", name)));
            }
        }
        if let Some(path) = &config.nlu.rules_file {
            if !path.exists() {
                warn!(path = %path.display(), "Rules file does not exist");
            }
        }
        let remote = &config.nlu.remote;
        if !(0.0..=2.0).contains(&remote.temperature) {
            return Err(HishoError::Config("Temperature must be 0.0-2.0".to_string()));
        }
        if remote.max_tokens == 0 {
            return Err(HishoError::Config("max_tokens must be > 0".to_string()));
        }
        if remote.timeout_s == 0 {
            return Err(HishoError::Config("Remote timeout must be > 0 s".to_string()));
        }

        if config.actions.notes_list_limit == 0 {
            return Err(HishoError::Config("Notes list limit must be > 0".to_string()));
        }

        Ok(())
    }

    pub fn validate_runtime_change(old: &HishoConfig, new: &HishoConfig) -> HishoResult<()> {
        if old.storage.settings_file != new.storage.settings_file {
            return Err(HishoError::Config(
                "Cannot change settings file at runtime".to_string(),
            ));
        }

        Ok(())
    }
}
