//! End-to-end registration: translated form, availability watchers, submit.

use crate::api::{ApiClient, AvailabilityKind, RegisteredUser};
use crate::forms::{
    CatalogSchemaProvider, FormKind, Notification, TranslatedForm, TranslatedFormOptions,
};
use crate::i18n::{keys, Language, TranslationSource};
use crate::validation::{
    AvailabilityChecker, AvailabilityResult, CheckMetrics, CheckMetricsReport, CheckOutcome,
    FieldAvailability, FieldErrors, FormValues, UNAVAILABLE_KEY,
};
use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::{info, warn};

/// What a registration attempt produced.
#[derive(Debug, Clone, Serialize)]
pub struct RegistrationOutcome {
    pub language: Language,
    /// The schema accepted the values and no availability check objected.
    pub submitted: bool,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub errors: FieldErrors,
    pub availability: BTreeMap<String, AvailabilityResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registered: Option<RegisteredUser>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub notifications: Vec<String>,
    pub checks: CheckMetricsReport,
}

impl RegistrationOutcome {
    /// The account was created.
    pub fn is_registered(&self) -> bool {
        self.registered.is_some()
    }
}

/// Runs the registration form once against the backend.
pub struct Registration<S> {
    api: ApiClient,
    source: S,
    debounce: Duration,
    preserve_values: bool,
}

impl<S: TranslationSource> Registration<S> {
    pub fn new(api: ApiClient, source: S) -> Self {
        Self {
            api,
            source,
            debounce: Duration::ZERO,
            preserve_values: true,
        }
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    pub fn with_preserve_values(mut self, preserve: bool) -> Self {
        self.preserve_values = preserve;
        self
    }

    pub async fn run(self, language: Language, values: FormValues) -> Result<RegistrationOutcome> {
        let catalog = self
            .source
            .load(language)
            .await
            .with_context(|| format!("Failed to load {} translations", language))?;

        let registered: Arc<Mutex<Option<RegisteredUser>>> = Arc::default();
        let slot = registered.clone();
        let submit_api = self.api.clone();
        let generic_failure = catalog.t(keys::SUBMISSION_FAILED);

        let form = TranslatedForm::new(
            CatalogSchemaProvider::for_form(self.source, FormKind::Registration),
            TranslatedFormOptions {
                preserve_values_on_language_change: self.preserve_values,
                initial_values: values,
            },
        )
        .on_submit(move |data| {
            let api = submit_api.clone();
            let slot = slot.clone();
            let generic_failure = generic_failure.clone();
            async move {
                match api.register(&data).await {
                    Ok(user) => {
                        info!("Registered user {} with id {}", user.username, user.id);
                        *slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(user);
                        Ok(())
                    }
                    Err(e) => {
                        warn!("Registration request failed: {}", e);
                        let message = e
                            .server_message()
                            .map(str::to_string)
                            .unwrap_or(generic_failure);
                        Err(anyhow::anyhow!(message))
                    }
                }
            }
        });

        let mut notifications = form.notifications();
        let handle = form.initialize(language).await?;

        let metrics = Arc::new(CheckMetrics::new());
        let watcher = |kind| {
            FieldAvailability::new(
                AvailabilityChecker::for_catalog(self.api.clone(), kind, &catalog)
                    .with_metrics(metrics.clone()),
                self.debounce,
            )
        };
        let username = watcher(AvailabilityKind::Username);
        let email = watcher(AvailabilityKind::Email);
        let (username_outcome, email_outcome) =
            tokio::join!(username.check(&handle), email.check(&handle));

        let mut availability = BTreeMap::new();
        for (field, outcome) in [(&username, username_outcome), (&email, email_outcome)] {
            if let CheckOutcome::Applied(result) = outcome {
                availability.insert(field.field().to_string(), result);
            }
        }
        let conflict = availability.values().any(|result| !result.is_valid);

        // A value the backend already holds is not worth a register call.
        let submitted = if conflict {
            handle.validate();
            false
        } else {
            form.submit().await.is_some()
        };

        let mut errors = FieldErrors::new();
        for (name, control) in handle.snapshot().controls() {
            let message = control
                .message()
                .or_else(|| control.error(UNAVAILABLE_KEY).and_then(|v| v.as_str()));
            if let Some(message) = message {
                errors.insert(name.to_string(), message.to_string());
            }
        }

        let mut messages = Vec::new();
        while let Ok(notification) = notifications.try_recv() {
            match notification {
                Notification::SubmissionFailed { message }
                | Notification::SchemaRebuildFailed { message, .. } => messages.push(message),
            }
        }

        let registered = registered
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        Ok(RegistrationOutcome {
            language,
            submitted,
            errors,
            availability,
            registered,
            notifications: messages,
            checks: metrics.report(),
        })
    }
}
