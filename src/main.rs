//! Registration from the command line.
//!
//! Usage:
//!   translated-forms [--lang=<code>] username=alice email=alice@example.com \
//!       password=... confirmPassword=...
//!
//! Values left out are restored from the saved registration draft. The
//! outcome is printed as JSON.
//!
//! Required environment variables:
//! - API_BASE_URL
//!
//! Optional:
//! - I18N_BASE_URL (built-in translations when unset)
//! - DEFAULT_LANGUAGE (defaults to en)
//! - AVAILABILITY_DEBOUNCE_MS (defaults to 300)
//! - REQUEST_TIMEOUT_SECS (defaults to 10)
//! - STORAGE_PATH (defaults to data/storage.json)
//! - PRESERVE_VALUES_ON_LANGUAGE_CHANGE (defaults to true)

use anyhow::{bail, Context, Result};
use std::sync::Arc;
use tracing::info;
use translated_forms::api::ApiClient;
use translated_forms::config::Config;
use translated_forms::forms::{FormKind, Registration, RegistrationOutcome};
use translated_forms::i18n::{BuiltinTranslations, HttpTranslations, Language, TranslationSource};
use translated_forms::retry::RetryConfig;
use translated_forms::storage::{DraftStore, FileStore, LanguagePreference};
use translated_forms::validation::FormValues;

/// Parsed command line.
#[derive(Debug, Default, PartialEq)]
struct Args {
    language: Option<String>,
    values: FormValues,
}

fn parse_args(args: impl IntoIterator<Item = String>) -> Result<Args> {
    let mut parsed = Args::default();
    for arg in args {
        if let Some(tag) = arg.strip_prefix("--lang=") {
            parsed.language = Some(tag.to_string());
        } else if let Some((name, value)) = arg.split_once('=') {
            if name.is_empty() || name.starts_with('-') {
                bail!("Invalid field argument '{}'", arg);
            }
            parsed.values.insert(name.to_string(), value.to_string());
        } else {
            bail!("Expected --lang=<code> or field=value, got '{}'", arg);
        }
    }
    Ok(parsed)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("translated_forms=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = parse_args(std::env::args().skip(1))?;
    let config = Config::from_env()?;

    let store = Arc::new(FileStore::open(&config.storage_path)?);
    let preference = LanguagePreference::new(store.clone());
    let language = match &args.language {
        Some(tag) => {
            let language = Language::parse(tag)?;
            preference.save(language)?;
            language
        }
        None => preference.load_or(config.default_language),
    };
    info!("Using language {} ({})", language.name(), language);

    let drafts = DraftStore::new(store);
    let mut values = drafts
        .load(FormKind::Registration)?
        .map(|draft| {
            info!("Restored registration draft from {}", draft.saved_at);
            draft.values
        })
        .unwrap_or_default();
    values.extend(args.values);

    let api = ApiClient::new(&config.api_base_url, config.request_timeout)?;
    let outcome = match &config.i18n_base_url {
        Some(url) => {
            let source = HttpTranslations::new(url, config.request_timeout)?
                .with_retry(RetryConfig::catalog_fetch());
            register(&config, api, source, language, values.clone()).await?
        }
        None => register(&config, api, BuiltinTranslations, language, values.clone()).await?,
    };

    if outcome.is_registered() {
        drafts.clear(FormKind::Registration)?;
    } else {
        drafts.save(FormKind::Registration, &values)?;
    }

    let output = serde_json::to_string_pretty(&outcome).context("Failed to serialize outcome")?;
    println!("{}", output);
    Ok(())
}

async fn register<S: TranslationSource>(
    config: &Config,
    api: ApiClient,
    source: S,
    language: Language,
    values: FormValues,
) -> Result<RegistrationOutcome> {
    Registration::new(api, source)
        .with_debounce(config.availability_debounce)
        .with_preserve_values(config.preserve_values_on_language_change)
        .run(language, values)
        .await
}
