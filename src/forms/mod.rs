//! The application's forms and the orchestration that keeps their schemas
//! in step with the active language.

mod orchestrator;
mod provider;
mod registration;
pub mod schemas;

pub use orchestrator::{FormPhase, FormStream, Notification, TranslatedForm, TranslatedFormOptions};
pub use provider::{CatalogSchemaProvider, SchemaProvider};
pub use registration::{Registration, RegistrationOutcome};
pub use schemas::FormKind;
