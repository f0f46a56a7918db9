use crate::forms::FormKind;
use crate::i18n::{Catalog, Language, TranslationSource};
use crate::validation::Schema;
use anyhow::{Context, Result};
use std::future::Future;
use tracing::debug;

/// Produces the validation schema for a language.
///
/// Construction is asynchronous because translated messages have to be
/// loaded before any rule can be built.
pub trait SchemaProvider: Send + Sync {
    fn schema(&self, language: Language) -> impl Future<Output = Result<Schema>> + Send;
}

/// Loads a catalog, then hands it to a pure schema builder.
pub struct CatalogSchemaProvider<S> {
    source: S,
    build: fn(&Catalog) -> Schema,
}

impl<S: TranslationSource> CatalogSchemaProvider<S> {
    pub fn new(source: S, build: fn(&Catalog) -> Schema) -> Self {
        Self { source, build }
    }

    pub fn for_form(source: S, kind: FormKind) -> Self {
        Self::new(source, kind.builder())
    }
}

impl<S: TranslationSource> SchemaProvider for CatalogSchemaProvider<S> {
    async fn schema(&self, language: Language) -> Result<Schema> {
        let catalog = self
            .source
            .load(language)
            .await
            .with_context(|| format!("Failed to load {} catalog for schema", language))?;
        debug!("Building schema from {} {} translations", catalog.len(), language);
        Ok((self.build)(&catalog))
    }
}
