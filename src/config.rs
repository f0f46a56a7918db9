use crate::i18n::Language;
use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    // Backend
    pub api_base_url: String,
    pub request_timeout: Duration,

    // Translations
    pub i18n_base_url: Option<String>,
    pub default_language: Language,

    // Forms
    pub availability_debounce: Duration,
    pub preserve_values_on_language_change: bool,

    // Storage
    pub storage_path: PathBuf,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let default_language = match std::env::var("DEFAULT_LANGUAGE") {
            Ok(tag) => Language::parse(&tag)
                .with_context(|| format!("DEFAULT_LANGUAGE={} is not usable", tag))?,
            Err(_) => Language::default_language(),
        };

        Ok(Self {
            // Backend
            api_base_url: std::env::var("API_BASE_URL")
                .context("API_BASE_URL not set")?
                .trim_end_matches('/')
                .to_string(),
            request_timeout: Duration::from_secs(
                std::env::var("REQUEST_TIMEOUT_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(10),
            ),

            // Translations, built-in catalogs when unset
            i18n_base_url: std::env::var("I18N_BASE_URL")
                .ok()
                .map(|v| v.trim().trim_end_matches('/').to_string())
                .filter(|v| !v.is_empty()),
            default_language,

            // Forms
            availability_debounce: Duration::from_millis(
                std::env::var("AVAILABILITY_DEBOUNCE_MS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(300),
            ),
            preserve_values_on_language_change: std::env::var(
                "PRESERVE_VALUES_ON_LANGUAGE_CHANGE",
            )
            .ok()
            .and_then(|v| v.trim().to_ascii_lowercase().parse().ok())
            .unwrap_or(true),

            // Storage
            storage_path: std::env::var("STORAGE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("data/storage.json")),
        })
    }
}
