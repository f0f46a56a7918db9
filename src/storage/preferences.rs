use crate::forms::FormKind;
use crate::i18n::Language;
use crate::storage::KeyValueStore;
use crate::validation::FormValues;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub const LANGUAGE_KEY: &str = "language";

/// The user's chosen interface language.
pub struct LanguagePreference<S> {
    store: S,
}

impl<S: KeyValueStore> LanguagePreference<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Stored language, or the registry default when nothing usable is stored.
    pub fn load(&self) -> Language {
        self.load_or(Language::default_language())
    }

    pub fn load_or(&self, fallback: Language) -> Language {
        let stored = match self.store.get(LANGUAGE_KEY) {
            Ok(stored) => stored,
            Err(e) => {
                warn!("Failed to read language preference: {:#}", e);
                None
            }
        };

        match stored.as_deref().map(Language::parse) {
            Some(Ok(language)) => language,
            Some(Err(e)) => {
                warn!("Ignoring stored language preference: {}", e);
                fallback
            }
            None => fallback,
        }
    }

    pub fn save(&self, language: Language) -> Result<()> {
        self.store
            .set(LANGUAGE_KEY, language.code())
            .with_context(|| format!("Failed to save language preference {}", language))
    }
}

fn is_secret(field: &str) -> bool {
    field.to_ascii_lowercase().contains("password")
}

/// Unsubmitted form values kept between sessions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Draft {
    pub values: FormValues,
    pub saved_at: DateTime<Utc>,
}

/// One draft per form kind.
pub struct DraftStore<S> {
    store: S,
}

impl<S: KeyValueStore> DraftStore<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    fn key(kind: FormKind) -> String {
        format!("draft:{}", kind.name())
    }

    /// Password fields are never written.
    pub fn save(&self, kind: FormKind, values: &FormValues) -> Result<Draft> {
        let draft = Draft {
            values: values
                .iter()
                .filter(|(name, _)| !is_secret(name))
                .map(|(name, value)| (name.clone(), value.clone()))
                .collect(),
            saved_at: Utc::now(),
        };
        let body = serde_json::to_string(&draft).context("Failed to serialize draft")?;
        self.store
            .set(&Self::key(kind), &body)
            .with_context(|| format!("Failed to save {} draft", kind.name()))?;
        debug!("Saved {} draft with {} fields", kind.name(), draft.values.len());
        Ok(draft)
    }

    /// A draft that no longer parses is discarded rather than reported.
    pub fn load(&self, kind: FormKind) -> Result<Option<Draft>> {
        let key = Self::key(kind);
        let Some(body) = self
            .store
            .get(&key)
            .with_context(|| format!("Failed to read {} draft", kind.name()))?
        else {
            return Ok(None);
        };

        match serde_json::from_str::<Draft>(&body) {
            Ok(draft) => Ok(Some(draft)),
            Err(e) => {
                warn!("Discarding unreadable {} draft: {}", kind.name(), e);
                self.store.remove(&key)?;
                Ok(None)
            }
        }
    }

    pub fn clear(&self, kind: FormKind) -> Result<()> {
        self.store
            .remove(&Self::key(kind))
            .with_context(|| format!("Failed to clear {} draft", kind.name()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use std::sync::Arc;

    struct BrokenStore;

    impl KeyValueStore for BrokenStore {
        fn get(&self, _key: &str) -> Result<Option<String>> {
            anyhow::bail!("disk unavailable")
        }
        fn set(&self, _key: &str, _value: &str) -> Result<()> {
            anyhow::bail!("disk unavailable")
        }
        fn remove(&self, _key: &str) -> Result<()> {
            anyhow::bail!("disk unavailable")
        }
    }

    fn values(pairs: &[(&str, &str)]) -> FormValues {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    // ==================== Language Preference Tests ====================

    #[test]
    fn test_language_defaults_when_unset() {
        let pref = LanguagePreference::new(MemoryStore::new());
        assert_eq!(pref.load(), Language::ENGLISH);
    }

    #[test]
    fn test_language_fallback_is_configurable() {
        let pref = LanguagePreference::new(MemoryStore::new());
        assert_eq!(pref.load_or(Language::SPANISH), Language::SPANISH);
    }

    #[test]
    fn test_language_roundtrip() {
        let pref = LanguagePreference::new(MemoryStore::new());
        pref.save(Language::SPANISH).unwrap();
        assert_eq!(pref.load(), Language::SPANISH);
    }

    #[test]
    fn test_language_accepts_region_tag() {
        let store = Arc::new(MemoryStore::new());
        store.set(LANGUAGE_KEY, "es-MX").unwrap();
        assert_eq!(LanguagePreference::new(store).load(), Language::SPANISH);
    }

    #[test]
    fn test_unknown_language_falls_back_to_default() {
        let store = Arc::new(MemoryStore::new());
        store.set(LANGUAGE_KEY, "klingon").unwrap();
        assert_eq!(LanguagePreference::new(store).load(), Language::ENGLISH);
    }

    #[test]
    fn test_unreadable_store_falls_back_to_default() {
        let pref = LanguagePreference::new(BrokenStore);
        assert_eq!(pref.load(), Language::ENGLISH);
        assert!(pref.save(Language::SPANISH).is_err());
    }

    // ==================== Draft Tests ====================

    #[test]
    fn test_draft_roundtrip() {
        let drafts = DraftStore::new(MemoryStore::new());
        let saved = drafts
            .save(FormKind::Registration, &values(&[("username", "alice")]))
            .unwrap();

        let loaded = drafts.load(FormKind::Registration).unwrap().unwrap();
        assert_eq!(loaded, saved);
        assert_eq!(loaded.values["username"], "alice");
    }

    #[test]
    fn test_draft_never_stores_passwords() {
        let store = Arc::new(MemoryStore::new());
        let drafts = DraftStore::new(store.clone());
        let saved = drafts
            .save(
                FormKind::Registration,
                &values(&[
                    ("username", "alice"),
                    ("password", "Secret123"),
                    ("confirmPassword", "Secret123"),
                ]),
            )
            .unwrap();

        assert_eq!(saved.values.keys().collect::<Vec<_>>(), vec!["username"]);
        assert!(!store.get("draft:registration").unwrap().unwrap().contains("Secret123"));
    }

    #[test]
    fn test_drafts_are_per_form() {
        let drafts = DraftStore::new(MemoryStore::new());
        drafts
            .save(FormKind::Login, &values(&[("username", "bob")]))
            .unwrap();

        assert!(drafts.load(FormKind::Registration).unwrap().is_none());
        assert!(drafts.load(FormKind::Login).unwrap().is_some());
    }

    #[test]
    fn test_clear_removes_draft() {
        let drafts = DraftStore::new(MemoryStore::new());
        drafts.save(FormKind::GameGroup, &values(&[("name", "x")])).unwrap();
        drafts.clear(FormKind::GameGroup).unwrap();
        assert!(drafts.load(FormKind::GameGroup).unwrap().is_none());
    }

    #[test]
    fn test_corrupt_draft_is_discarded() {
        let store = Arc::new(MemoryStore::new());
        store.set("draft:login", "not json").unwrap();

        let drafts = DraftStore::new(store.clone());
        assert!(drafts.load(FormKind::Login).unwrap().is_none());
        assert!(store.get("draft:login").unwrap().is_none());
    }

    #[test]
    fn test_draft_store_errors_propagate() {
        let drafts = DraftStore::new(BrokenStore);
        let err = drafts.load(FormKind::Login).unwrap_err();
        assert!(err.to_string().contains("Failed to read login draft"));
    }
}
