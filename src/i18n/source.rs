//! Where catalogs come from: compiled-in tables or a translation resource server.

use crate::api::ApiError;
use crate::i18n::{Catalog, Language};
use crate::retry::{with_retry_if, RetryConfig};
use anyhow::{Context, Result};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info};

/// Asynchronous provider of translated catalogs.
pub trait TranslationSource: Send + Sync {
    fn load(&self, language: Language) -> impl Future<Output = Result<Catalog>> + Send;
}

/// Catalogs compiled into the crate. Never fails, never suspends on I/O.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinTranslations;

impl TranslationSource for BuiltinTranslations {
    async fn load(&self, language: Language) -> Result<Catalog> {
        Ok(Catalog::builtin(language))
    }
}

/// Fetches `{base_url}/assets/i18n/{code}.json` and layers it over the
/// built-in catalog, so keys the server omits still translate.
#[derive(Debug, Clone)]
pub struct HttpTranslations {
    client: reqwest::Client,
    base_url: String,
    retry: RetryConfig,
}

impl HttpTranslations {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            retry: RetryConfig::catalog_fetch(),
        })
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    fn resource_url(&self, language: Language) -> String {
        format!("{}/assets/i18n/{}.json", self.base_url, language.code())
    }

    async fn fetch_document(&self, url: &str) -> Result<serde_json::Value, ApiError> {
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(ApiError::from_response(response).await);
        }
        Ok(response.json().await?)
    }
}

impl TranslationSource for HttpTranslations {
    async fn load(&self, language: Language) -> Result<Catalog> {
        let url = self.resource_url(language);
        debug!("Fetching translations from {}", url);

        let document = with_retry_if(
            &self.retry,
            "translation fetch",
            || self.fetch_document(&url),
            ApiError::is_transient,
        )
        .await
        .with_context(|| format!("Failed to load {} translations from {}", language, url))?;

        let remote = Catalog::from_json(language, &document);
        info!("Loaded {} remote translations for {}", remote.len(), language);

        let mut catalog = Catalog::builtin(language);
        catalog.extend(remote);
        Ok(catalog)
    }
}
