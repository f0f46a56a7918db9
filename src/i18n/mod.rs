//! Internationalization: supported languages and translated message catalogs.
//!
//! # Architecture
//!
//! - `registry`: single source of truth for the supported languages
//! - `language`: validated `Language` handle
//! - `catalog`: translated strings for one language, with `{{placeholder}}` interpolation
//! - `source`: asynchronous catalog providers (built-in tables, HTTP resources)
//!
//! # Example
//!
//! ```rust,ignore
//! use translated_forms::i18n::{keys, BuiltinTranslations, Language, TranslationSource};
//!
//! let catalog = BuiltinTranslations.load(Language::parse("es-MX")?).await?;
//! let message = catalog.t(keys::EMAIL_REQUIRED);
//! ```

mod catalog;
mod language;
mod registry;
mod source;

pub use catalog::{keys, Catalog};
pub use language::Language;
pub use registry::{LanguageConfig, LanguageRegistry};
pub use source::{BuiltinTranslations, HttpTranslations, TranslationSource};
