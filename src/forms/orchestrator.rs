//! A form whose schema follows the active language.

use crate::forms::SchemaProvider;
use crate::i18n::Language;
use crate::validation::{FormHandle, FormValues, ValidationResult};
use anyhow::Result;
use futures::future::BoxFuture;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

/// Lifecycle of a [`TranslatedForm`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormPhase {
    /// No schema has been built yet.
    Uninitialized,
    /// A form is published and accepts submissions.
    Ready,
    /// A language change is building the replacement schema.
    Rebuilding,
}

/// Transient messages for the user, never attached to a field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    SubmissionFailed { message: String },
    SchemaRebuildFailed { language: Language, message: String },
}

#[derive(Debug, Clone)]
pub struct TranslatedFormOptions {
    /// Carry the current values into the form built for a new language.
    pub preserve_values_on_language_change: bool,
    /// Values of a freshly built form when nothing is carried over.
    pub initial_values: FormValues,
}

impl Default for TranslatedFormOptions {
    fn default() -> Self {
        Self {
            preserve_values_on_language_change: true,
            initial_values: FormValues::new(),
        }
    }
}

type SubmitHandler = Box<dyn Fn(FormValues) -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// Stream of published form instances. `None` until the first build.
pub type FormStream = watch::Receiver<Option<Arc<FormHandle>>>;

/// Resets the busy flag when a submission ends, however it ends.
struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Puts the phase back to where a rebuild started unless the rebuild
/// publishes. Covers errors, superseded results and dropped futures.
struct PhaseGuard<'a> {
    phase: &'a Mutex<FormPhase>,
    restore: FormPhase,
    armed: bool,
}

impl PhaseGuard<'_> {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for PhaseGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            *self.phase.lock().unwrap_or_else(PoisonError::into_inner) = self.restore;
        }
    }
}

/// Owns the schema-bound form across language changes.
///
/// Each language change builds a new schema and a new [`FormHandle`],
/// retires the previous handle and publishes the new one on the form
/// stream. Anything bound to a handle (availability watchers, UI bindings)
/// must rebind to the published replacement.
pub struct TranslatedForm<P> {
    provider: P,
    options: TranslatedFormOptions,
    phase: Mutex<FormPhase>,
    current: watch::Sender<Option<Arc<FormHandle>>>,
    rebuild_lock: tokio::sync::Mutex<()>,
    rebuild_requests: AtomicU64,
    generations: AtomicU64,
    submitting: AtomicBool,
    on_submit: Option<SubmitHandler>,
    notifications: broadcast::Sender<Notification>,
}

impl<P: SchemaProvider> TranslatedForm<P> {
    pub fn new(provider: P, options: TranslatedFormOptions) -> Self {
        let (current, _) = watch::channel(None);
        let (notifications, _) = broadcast::channel(16);
        Self {
            provider,
            options,
            phase: Mutex::new(FormPhase::Uninitialized),
            current,
            rebuild_lock: tokio::sync::Mutex::new(()),
            rebuild_requests: AtomicU64::new(0),
            generations: AtomicU64::new(0),
            submitting: AtomicBool::new(false),
            on_submit: None,
            notifications,
        }
    }

    /// Callback run with the validated data after every successful submit.
    /// An error it returns becomes a [`Notification::SubmissionFailed`].
    pub fn on_submit<F, Fut>(mut self, handler: F) -> Self
    where
        F: Fn(FormValues) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.on_submit = Some(Box::new(move |data| Box::pin(handler(data))));
        self
    }

    pub fn phase(&self) -> FormPhase {
        *self.phase.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_phase(&self, phase: FormPhase) {
        *self.phase.lock().unwrap_or_else(PoisonError::into_inner) = phase;
    }

    /// The live form, if one has been built.
    pub fn form(&self) -> Option<Arc<FormHandle>> {
        self.current.borrow().clone()
    }

    pub fn form_stream(&self) -> FormStream {
        self.current.subscribe()
    }

    pub fn notifications(&self) -> broadcast::Receiver<Notification> {
        self.notifications.subscribe()
    }

    pub fn is_submitting(&self) -> bool {
        self.submitting.load(Ordering::SeqCst)
    }

    fn notify(&self, notification: Notification) {
        // No subscribers is fine.
        let _ = self.notifications.send(notification);
    }

    /// Build the first form for `language`.
    pub async fn initialize(&self, language: Language) -> Result<Arc<FormHandle>> {
        self.change_language(language)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Initialization superseded by a language change"))
    }

    /// Rebuild the schema and form for `language` and publish the result.
    ///
    /// Requests are applied in call order. A request that a newer one
    /// supersedes, either before its turn comes or while its schema loads,
    /// publishes nothing and returns `Ok(None)`. On failure or cancellation
    /// the previous form stays live and the phase is restored.
    pub async fn change_language(&self, language: Language) -> Result<Option<Arc<FormHandle>>> {
        let request = self.rebuild_requests.fetch_add(1, Ordering::SeqCst) + 1;
        let _turn = self.rebuild_lock.lock().await;

        if self.is_superseded(request) {
            debug!("Skipping superseded rebuild for {}", language);
            return Ok(None);
        }

        let previous = self.form();
        let guard = PhaseGuard {
            phase: &self.phase,
            restore: self.phase(),
            armed: true,
        };
        if previous.is_some() {
            self.set_phase(FormPhase::Rebuilding);
        }

        let schema = match self.provider.schema(language).await {
            Ok(schema) => Arc::new(schema),
            Err(e) => {
                warn!("Schema rebuild for {} failed: {:#}", language, e);
                drop(guard);
                self.notify(Notification::SchemaRebuildFailed {
                    language,
                    message: format!("{:#}", e),
                });
                return Err(e.context(format!("Failed to build schema for {}", language)));
            }
        };

        if self.is_superseded(request) {
            debug!("Discarding {} schema, a newer language change is pending", language);
            return Ok(None);
        }

        // Values are read after the schema resolves so edits made during the
        // rebuild are carried over.
        let seed = match (&previous, self.options.preserve_values_on_language_change) {
            (Some(form), true) => form.values(),
            _ => self.options.initial_values.clone(),
        };

        let generation = self.generations.fetch_add(1, Ordering::SeqCst) + 1;
        let form = Arc::new(FormHandle::new(generation, language, schema, &seed));

        if let Some(old) = self.current.send_replace(Some(form.clone())) {
            old.retire();
        }
        guard.disarm();
        self.set_phase(FormPhase::Ready);
        info!("Published form generation {} for {}", generation, language);

        Ok(Some(form))
    }

    fn is_superseded(&self, request: u64) -> bool {
        self.rebuild_requests.load(Ordering::SeqCst) != request
    }

    /// Follow a language setting until its sender is dropped.
    ///
    /// Builds the first form from the current language if none exists, then
    /// rebuilds on every change. Rebuild failures are logged and notified;
    /// the loop keeps running.
    pub async fn follow_language(&self, mut languages: watch::Receiver<Language>) -> Result<()> {
        if self.form().is_none() {
            let language = *languages.borrow_and_update();
            self.initialize(language).await?;
        }

        while languages.changed().await.is_ok() {
            let language = *languages.borrow_and_update();
            if let Err(e) = self.change_language(language).await {
                warn!("Keeping previous form: {:#}", e);
            }
        }

        debug!("Language source closed, no longer following");
        Ok(())
    }

    /// Validate the live form and, on success, run the submit callback.
    ///
    /// Returns the validated data, or `None` when the form is invalid, not
    /// yet built, or another submission is still running. Callback errors
    /// are reported through [`TranslatedForm::notifications`] and do not
    /// change the return value or the form.
    pub async fn submit(&self) -> Option<FormValues> {
        if self
            .submitting
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("Submit ignored, previous submission still running");
            return None;
        }
        let _busy = BusyGuard(&self.submitting);

        let form = self.form()?;
        let data = match form.validate() {
            ValidationResult::Valid(data) => data,
            ValidationResult::Invalid(errors) => {
                debug!("Submit blocked by {} invalid field(s)", errors.len());
                return None;
            }
        };

        if let Some(handler) = &self.on_submit {
            if let Err(e) = handler(data.clone()).await {
                warn!("Submission failed: {:#}", e);
                self.notify(Notification::SubmissionFailed {
                    message: format!("{:#}", e),
                });
            }
        }

        Some(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::{Schema, MESSAGE_KEY};
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;
    use tokio::sync::Notify;

    /// Builds a one-field schema whose message names the language.
    #[derive(Default)]
    struct LabelProvider {
        calls: AtomicUsize,
        fail_on: Option<Language>,
        delay: Duration,
    }

    impl SchemaProvider for LabelProvider {
        async fn schema(&self, language: Language) -> Result<Schema> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if self.fail_on == Some(language) {
                anyhow::bail!("no translations for {}", language);
            }
            Ok(Schema::builder()
                .field("name", |f| f.required(format!("required:{}", language)))
                .build())
        }
    }

    fn options() -> TranslatedFormOptions {
        TranslatedFormOptions::default()
    }

    #[tokio::test]
    async fn test_starts_uninitialized() {
        let form = TranslatedForm::new(LabelProvider::default(), options());
        assert_eq!(form.phase(), FormPhase::Uninitialized);
        assert!(form.form().is_none());
        assert_eq!(form.submit().await, None);
    }

    #[tokio::test]
    async fn test_initialize_publishes_form() {
        let form = TranslatedForm::new(LabelProvider::default(), options());
        let mut stream = form.form_stream();

        let handle = form.initialize(Language::ENGLISH).await.unwrap();

        assert_eq!(form.phase(), FormPhase::Ready);
        assert!(stream.has_changed().unwrap());
        let published = stream.borrow_and_update().clone().unwrap();
        assert!(Arc::ptr_eq(&published, &handle));
        assert_eq!(handle.language(), Language::ENGLISH);
    }

    #[tokio::test]
    async fn test_initial_values_seed_first_form() {
        let mut opts = options();
        opts.initial_values.insert("name".to_string(), "draft".to_string());
        let form = TranslatedForm::new(LabelProvider::default(), opts);

        let handle = form.initialize(Language::ENGLISH).await.unwrap();
        assert_eq!(handle.value("name").as_deref(), Some("draft"));
    }

    #[tokio::test]
    async fn test_language_change_preserves_values_and_retires_old_form() {
        let form = TranslatedForm::new(LabelProvider::default(), options());
        let first = form.initialize(Language::ENGLISH).await.unwrap();
        first.set_value("name", "Ana");

        let second = form.change_language(Language::SPANISH).await.unwrap().unwrap();

        assert!(first.is_retired());
        assert!(!second.is_retired());
        assert_eq!(second.value("name").as_deref(), Some("Ana"));
        assert_eq!(second.generation(), first.generation() + 1);
        assert!(Arc::ptr_eq(&form.form().unwrap(), &second));
    }

    #[tokio::test]
    async fn test_language_change_without_preserve_resets_values() {
        let mut opts = options();
        opts.preserve_values_on_language_change = false;
        let form = TranslatedForm::new(LabelProvider::default(), opts);
        form.initialize(Language::ENGLISH).await.unwrap().set_value("name", "Ana");

        let second = form.change_language(Language::SPANISH).await.unwrap().unwrap();
        assert_eq!(second.value("name").as_deref(), Some(""));
    }

    #[tokio::test]
    async fn test_messages_follow_language() {
        let form = TranslatedForm::new(LabelProvider::default(), options());
        form.initialize(Language::ENGLISH).await.unwrap();
        form.change_language(Language::SPANISH).await.unwrap();

        assert_eq!(form.submit().await, None);
        let state = form.form().unwrap().snapshot();
        assert_eq!(state.control("name").unwrap().message(), Some("required:es"));
    }

    #[tokio::test]
    async fn test_failed_rebuild_keeps_previous_form() {
        let provider = LabelProvider {
            fail_on: Some(Language::SPANISH),
            ..LabelProvider::default()
        };
        let form = TranslatedForm::new(provider, options());
        let mut notifications = form.notifications();
        let first = form.initialize(Language::ENGLISH).await.unwrap();

        let err = form.change_language(Language::SPANISH).await.unwrap_err();

        assert!(err.to_string().contains("Failed to build schema for es"));
        assert_eq!(form.phase(), FormPhase::Ready);
        assert!(!first.is_retired());
        assert!(Arc::ptr_eq(&form.form().unwrap(), &first));
        assert!(matches!(
            notifications.try_recv(),
            Ok(Notification::SchemaRebuildFailed { language: Language::SPANISH, .. })
        ));
    }

    #[tokio::test]
    async fn test_failed_initialization_stays_uninitialized() {
        let provider = LabelProvider {
            fail_on: Some(Language::ENGLISH),
            ..LabelProvider::default()
        };
        let form = TranslatedForm::new(provider, options());

        assert!(form.initialize(Language::ENGLISH).await.is_err());
        assert_eq!(form.phase(), FormPhase::Uninitialized);
    }

    #[tokio::test]
    async fn test_superseded_rebuild_is_skipped() {
        let provider = LabelProvider {
            delay: Duration::from_millis(20),
            ..LabelProvider::default()
        };
        let form = TranslatedForm::new(provider, options());
        form.initialize(Language::ENGLISH).await.unwrap();

        let (to_spanish, back_to_english, to_spanish_again) = tokio::join!(
            form.change_language(Language::SPANISH),
            form.change_language(Language::ENGLISH),
            form.change_language(Language::SPANISH),
        );

        assert!(to_spanish.unwrap().is_none());
        assert!(back_to_english.unwrap().is_none());
        assert!(to_spanish_again.unwrap().is_some());
        assert_eq!(form.form().unwrap().language(), Language::SPANISH);
        assert_eq!(form.provider.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_rebuild_overtaken_while_loading_publishes_nothing() {
        let provider = LabelProvider {
            delay: Duration::from_millis(30),
            ..LabelProvider::default()
        };
        let form = TranslatedForm::new(provider, options());
        let first = form.initialize(Language::ENGLISH).await.unwrap();
        let mut stream = form.form_stream();

        let newer = async {
            tokio::time::sleep(Duration::from_millis(5)).await;
            form.change_language(Language::ENGLISH).await
        };
        let (older, newer) = tokio::join!(form.change_language(Language::SPANISH), newer);

        assert!(older.unwrap().is_none());
        let newer = newer.unwrap().unwrap();
        assert_eq!(newer.generation(), first.generation() + 1);
        assert!(first.is_retired());

        // Only the newer form ever reached the stream.
        assert!(stream.has_changed().unwrap());
        let published = stream.borrow_and_update().clone().unwrap();
        assert!(Arc::ptr_eq(&published, &newer));
        assert_eq!(form.phase(), FormPhase::Ready);
    }

    #[tokio::test]
    async fn test_cancelled_rebuild_restores_phase() {
        let provider = LabelProvider {
            delay: Duration::from_millis(30),
            ..LabelProvider::default()
        };
        let form = TranslatedForm::new(provider, options());
        let first = form.initialize(Language::ENGLISH).await.unwrap();

        let cancelled = tokio::time::timeout(
            Duration::from_millis(5),
            form.change_language(Language::SPANISH),
        )
        .await;
        assert!(cancelled.is_err());
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(form.phase(), FormPhase::Ready);
        assert!(Arc::ptr_eq(&form.form().unwrap(), &first));
        assert!(!first.is_retired());

        let spanish = form.change_language(Language::SPANISH).await.unwrap().unwrap();
        assert_eq!(spanish.language(), Language::SPANISH);
    }

    #[tokio::test]
    async fn test_cancelled_initialization_stays_uninitialized() {
        let provider = LabelProvider {
            delay: Duration::from_millis(30),
            ..LabelProvider::default()
        };
        let form = TranslatedForm::new(provider, options());

        let cancelled = tokio::time::timeout(
            Duration::from_millis(5),
            form.initialize(Language::ENGLISH),
        )
        .await;

        assert!(cancelled.is_err());
        assert_eq!(form.phase(), FormPhase::Uninitialized);
        assert!(form.form().is_none());
    }

    #[tokio::test]
    async fn test_phase_is_rebuilding_while_schema_loads() {
        let provider = LabelProvider {
            delay: Duration::from_millis(30),
            ..LabelProvider::default()
        };
        let form = TranslatedForm::new(provider, options());
        form.initialize(Language::ENGLISH).await.unwrap();

        let observe = async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            form.phase()
        };
        let (_, during) = tokio::join!(form.change_language(Language::SPANISH), observe);

        assert_eq!(during, FormPhase::Rebuilding);
        assert_eq!(form.phase(), FormPhase::Ready);
    }

    #[tokio::test]
    async fn test_submit_success_runs_callback() {
        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = received.clone();
        let form = TranslatedForm::new(LabelProvider::default(), options()).on_submit(move |data| {
            let sink = sink.clone();
            async move {
                sink.lock().unwrap().push(data);
                Ok(())
            }
        });
        form.initialize(Language::ENGLISH).await.unwrap().set_value("name", "Ana");

        let data = form.submit().await.expect("should submit");

        assert_eq!(data["name"], "Ana");
        assert_eq!(received.lock().unwrap().len(), 1);
        assert!(!form.is_submitting());
    }

    #[tokio::test]
    async fn test_submit_invalid_skips_callback_and_keeps_errors() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let form = TranslatedForm::new(LabelProvider::default(), options()).on_submit(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Ok(()) }
        });
        let handle = form.initialize(Language::ENGLISH).await.unwrap();

        assert_eq!(form.submit().await, None);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(handle.snapshot().control("name").unwrap().error(MESSAGE_KEY).is_some());
    }

    #[tokio::test]
    async fn test_callback_error_becomes_notification() {
        let form = TranslatedForm::new(LabelProvider::default(), options())
            .on_submit(|_| async { anyhow::bail!("backend unavailable") });
        let mut notifications = form.notifications();
        let handle = form.initialize(Language::ENGLISH).await.unwrap();
        handle.set_value("name", "Ana");

        assert!(form.submit().await.is_some());
        assert_eq!(
            notifications.try_recv().unwrap(),
            Notification::SubmissionFailed {
                message: "backend unavailable".to_string()
            }
        );
        assert!(handle.snapshot().control("name").unwrap().is_valid());
    }

    #[tokio::test]
    async fn test_concurrent_submit_is_noop() {
        let gate = Arc::new(Notify::new());
        let release = gate.clone();
        let form = TranslatedForm::new(LabelProvider::default(), options()).on_submit(move |_| {
            let gate = release.clone();
            async move {
                gate.notified().await;
                Ok(())
            }
        });
        form.initialize(Language::ENGLISH).await.unwrap().set_value("name", "Ana");

        let second = async {
            tokio::task::yield_now().await;
            let result = form.submit().await;
            gate.notify_one();
            result
        };
        let (first, second) = tokio::join!(form.submit(), second);

        assert!(first.is_some());
        assert_eq!(second, None);
        assert!(!form.is_submitting());
    }

    #[tokio::test]
    async fn test_follow_language_rebuilds_until_closed() {
        let form = Arc::new(TranslatedForm::new(LabelProvider::default(), options()));
        let (tx, rx) = watch::channel(Language::ENGLISH);
        let mut stream = form.form_stream();

        let follower = tokio::spawn({
            let form = form.clone();
            async move { form.follow_language(rx).await }
        });

        stream.changed().await.unwrap();
        assert_eq!(stream.borrow().as_ref().unwrap().language(), Language::ENGLISH);

        tx.send(Language::SPANISH).unwrap();
        stream.changed().await.unwrap();
        assert_eq!(stream.borrow().as_ref().unwrap().language(), Language::SPANISH);

        drop(tx);
        follower.await.unwrap().unwrap();
    }
}
