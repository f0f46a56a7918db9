//! Advisory remote availability checks for usernames and e-mail addresses.
//!
//! A broken check never blocks the user: lookup failures count as "available"
//! unless the backend explicitly rejected the value with a message.

use crate::api::{AvailabilityApi, AvailabilityKind};
use crate::i18n::{keys, Catalog, Language};
use crate::validation::form::{FormHandle, FormState, UNAVAILABLE_KEY};
use crate::validation::metrics::CheckMetrics;
use crate::validation::schema::looks_like_email;
use serde::Serialize;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Verdict of one availability check. `is_valid == false` always carries a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AvailabilityResult {
    pub is_valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl AvailabilityResult {
    pub fn valid() -> Self {
        Self {
            is_valid: true,
            message: None,
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            message: Some(message.into()),
        }
    }
}

/// Checks one kind of identifier against the backend.
pub struct AvailabilityChecker<A> {
    api: A,
    kind: AvailabilityKind,
    default_message: String,
    metrics: Arc<CheckMetrics>,
}

impl<A: AvailabilityApi> AvailabilityChecker<A> {
    /// Checker whose fallback conflict message comes from the default
    /// language's built-in catalog.
    pub fn new(api: A, kind: AvailabilityKind) -> Self {
        Self::for_catalog(api, kind, &Catalog::builtin(Language::default_language()))
    }

    /// Checker whose fallback conflict message is translated by `catalog`.
    pub fn for_catalog(api: A, kind: AvailabilityKind, catalog: &Catalog) -> Self {
        let key = match kind {
            AvailabilityKind::Username => keys::USERNAME_TAKEN,
            AvailabilityKind::Email => keys::EMAIL_TAKEN,
        };
        Self {
            api,
            kind,
            default_message: catalog.t(key),
            metrics: Arc::new(CheckMetrics::new()),
        }
    }

    pub fn with_default_message(mut self, message: impl Into<String>) -> Self {
        self.default_message = message.into();
        self
    }

    /// Count into counters shared with other checkers.
    pub fn with_metrics(mut self, metrics: Arc<CheckMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn kind(&self) -> AvailabilityKind {
        self.kind
    }

    pub fn default_message(&self) -> &str {
        &self.default_message
    }

    pub fn metrics(&self) -> &Arc<CheckMetrics> {
        &self.metrics
    }

    /// Whether `value` is worth a lookup. Other rules report empty or
    /// malformed input.
    fn is_actionable(&self, value: &str) -> bool {
        let value = value.trim();
        if value.is_empty() {
            return false;
        }
        match self.kind {
            AvailabilityKind::Email => looks_like_email(value),
            AvailabilityKind::Username => true,
        }
    }

    /// Check whether `value` is still free.
    pub async fn check(&self, value: &str) -> AvailabilityResult {
        if !self.is_actionable(value) {
            self.metrics.record_short_circuit();
            return AvailabilityResult::valid();
        }

        self.metrics.record_lookup();
        match self.api.lookup(self.kind, value.trim()).await {
            Ok(response) if response.available => AvailabilityResult::valid(),
            Ok(response) => {
                self.metrics.record_conflict();
                let message = response
                    .message
                    .filter(|m| !m.trim().is_empty())
                    .unwrap_or_else(|| self.default_message.clone());
                AvailabilityResult::invalid(message)
            }
            Err(e) => match e.server_message() {
                Some(message) => {
                    debug!("{} rejected by server: {}", self.kind.field(), message);
                    self.metrics.record_conflict();
                    AvailabilityResult::invalid(message)
                }
                None => {
                    warn!("{} availability check failed, ignoring: {}", self.kind.field(), e);
                    self.metrics.record_swallowed_failure();
                    AvailabilityResult::valid()
                }
            },
        }
    }
}

/// Result of a field watcher's check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckOutcome {
    /// The result was written to the control.
    Applied(AvailabilityResult),
    /// A newer check, a new value or a retired form superseded this one;
    /// the control was left untouched.
    Stale,
    /// The form has no control with the watched name.
    MissingField,
}

/// Binds a checker to one control of a form.
///
/// Every call takes a new request id. Only the newest request may write its
/// result, and only while the control still holds the value that was
/// checked and the form has not been retired.
pub struct FieldAvailability<A> {
    checker: AvailabilityChecker<A>,
    field: String,
    debounce: Duration,
    latest: AtomicU64,
}

impl<A: AvailabilityApi> FieldAvailability<A> {
    pub fn new(checker: AvailabilityChecker<A>, debounce: Duration) -> Self {
        let field = checker.kind().field().to_string();
        Self {
            checker,
            field,
            debounce,
            latest: AtomicU64::new(0),
        }
    }

    /// Watch a control whose name differs from the checker's default field.
    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = field.into();
        self
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn checker(&self) -> &AvailabilityChecker<A> {
        &self.checker
    }

    fn is_current(&self, id: u64) -> bool {
        self.latest.load(Ordering::SeqCst) == id
    }

    fn stale(&self) -> CheckOutcome {
        self.checker.metrics().record_stale();
        CheckOutcome::Stale
    }

    /// Debounce, check the control's current value, and merge the verdict
    /// into its error state.
    pub async fn check(&self, form: &FormHandle) -> CheckOutcome {
        let id = self.latest.fetch_add(1, Ordering::SeqCst) + 1;

        if !self.debounce.is_zero() {
            sleep(self.debounce).await;
            if !self.is_current(id) {
                return self.stale();
            }
        }

        let Some(value) = form.value(&self.field) else {
            debug!("Form has no '{}' control, skipping availability check", self.field);
            return CheckOutcome::MissingField;
        };

        let result = self.checker.check(&value).await;

        let unchanged = form.value(&self.field).as_deref() == Some(value.as_str());
        if !self.is_current(id) || !unchanged || form.is_retired() {
            debug!("Discarding stale availability result for '{}'", self.field);
            return self.stale();
        }

        form.update(|state| apply_result(state, &self.field, &result));
        CheckOutcome::Applied(result)
    }
}

/// Merge an availability verdict into a control, touching only
/// [`UNAVAILABLE_KEY`].
pub fn apply_result(state: &mut FormState, field: &str, result: &AvailabilityResult) {
    let Some(control) = state.control_mut(field) else {
        return;
    };
    match (&result.is_valid, &result.message) {
        (false, Some(message)) => {
            control.set_error(UNAVAILABLE_KEY, Value::String(message.clone()))
        }
        (false, None) => control.set_error(UNAVAILABLE_KEY, Value::Bool(true)),
        (true, _) => {
            control.clear_error(UNAVAILABLE_KEY);
        }
    }
}
