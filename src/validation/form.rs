//! Form controls and their error state.
//!
//! Each control carries an error map shared by several writers. Schema
//! validation owns [`MESSAGE_KEY`]; availability checks own
//! [`UNAVAILABLE_KEY`]. Writers only ever insert or remove their own key.

use crate::i18n::Language;
use crate::validation::schema::{FormValues, Schema};
use crate::validation::validator::{self, ValidationResult};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Error flags on a control, keyed by the writer that set them.
pub type ControlErrors = BTreeMap<String, Value>;

/// Key under which schema validation stores its message.
pub const MESSAGE_KEY: &str = "message";

/// Key under which availability checks store their message.
pub const UNAVAILABLE_KEY: &str = "unavailable";

/// A single input.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Control {
    value: String,
    errors: ControlErrors,
    touched: bool,
    dirty: bool,
}

impl Control {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            ..Self::default()
        }
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn errors(&self) -> &ControlErrors {
        &self.errors
    }

    pub fn error(&self, key: &str) -> Option<&Value> {
        self.errors.get(key)
    }

    /// The schema validation message currently shown for this control.
    pub fn message(&self) -> Option<&str> {
        self.error(MESSAGE_KEY).and_then(Value::as_str)
    }

    pub fn is_touched(&self) -> bool {
        self.touched
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// User edit: changes the value and marks the control dirty.
    pub fn set_value(&mut self, value: impl Into<String>) {
        let value = value.into();
        if value != self.value {
            self.value = value;
            self.dirty = true;
        }
    }

    /// Programmatic fill: changes the value without marking it dirty.
    pub fn patch_value(&mut self, value: impl Into<String>) {
        self.value = value.into();
    }

    pub fn mark_touched(&mut self) {
        self.touched = true;
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Insert or replace one error flag, leaving the others in place.
    pub fn set_error(&mut self, key: &str, value: Value) {
        self.errors.insert(key.to_string(), value);
    }

    /// Remove one error flag, leaving the others in place.
    pub fn clear_error(&mut self, key: &str) -> Option<Value> {
        self.errors.remove(key)
    }
}

/// The controls of one form, keyed by field name.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FormState {
    controls: BTreeMap<String, Control>,
}

impl FormState {
    /// One empty control per field.
    pub fn new<'a>(fields: impl IntoIterator<Item = &'a str>) -> Self {
        Self::with_values(fields, &FormValues::new())
    }

    /// One control per field, seeded from `values` where present.
    pub fn with_values<'a>(fields: impl IntoIterator<Item = &'a str>, values: &FormValues) -> Self {
        let controls = fields
            .into_iter()
            .map(|name| {
                let value = values.get(name).cloned().unwrap_or_default();
                (name.to_string(), Control::new(value))
            })
            .collect();
        Self { controls }
    }

    pub fn control(&self, name: &str) -> Option<&Control> {
        self.controls.get(name)
    }

    pub fn control_mut(&mut self, name: &str) -> Option<&mut Control> {
        self.controls.get_mut(name)
    }

    pub fn controls(&self) -> impl Iterator<Item = (&str, &Control)> {
        self.controls.iter().map(|(name, control)| (name.as_str(), control))
    }

    pub(crate) fn controls_mut(&mut self) -> impl Iterator<Item = (&str, &mut Control)> {
        self.controls.iter_mut().map(|(name, control)| (name.as_str(), control))
    }

    /// User edit of one control. Returns `false` if the form has no such field.
    pub fn set_value(&mut self, name: &str, value: impl Into<String>) -> bool {
        match self.controls.get_mut(name) {
            Some(control) => {
                control.set_value(value);
                true
            }
            None => false,
        }
    }

    /// Programmatic fill of every known field present in `values`.
    pub fn patch_values(&mut self, values: &FormValues) {
        for (name, value) in values {
            if let Some(control) = self.controls.get_mut(name) {
                control.patch_value(value.clone());
            }
        }
    }

    /// Current raw values of every control.
    pub fn values(&self) -> FormValues {
        self.controls
            .iter()
            .map(|(name, control)| (name.clone(), control.value.clone()))
            .collect()
    }

    /// True when no control carries any error flag.
    pub fn is_valid(&self) -> bool {
        self.controls.values().all(Control::is_valid)
    }
}

/// A live form instance bound to the schema of one language.
///
/// Instances are shared between the orchestrator and anything watching the
/// form. When the language changes the orchestrator retires the instance and
/// publishes a replacement; retired instances keep working but are no longer
/// submitted.
#[derive(Debug)]
pub struct FormHandle {
    generation: u64,
    language: Language,
    schema: Arc<Schema>,
    state: Mutex<FormState>,
    retired: AtomicBool,
}

impl FormHandle {
    pub fn new(
        generation: u64,
        language: Language,
        schema: Arc<Schema>,
        initial: &FormValues,
    ) -> Self {
        let state = FormState::with_values(schema.field_names(), initial);
        Self {
            generation,
            language,
            schema,
            state: Mutex::new(state),
            retired: AtomicBool::new(false),
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn is_retired(&self) -> bool {
        self.retired.load(Ordering::SeqCst)
    }

    pub(crate) fn retire(&self) {
        self.retired.store(true, Ordering::SeqCst);
    }

    fn lock(&self) -> MutexGuard<'_, FormState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn value(&self, field: &str) -> Option<String> {
        self.lock().control(field).map(|c| c.value().to_string())
    }

    pub fn values(&self) -> FormValues {
        self.lock().values()
    }

    pub fn set_value(&self, field: &str, value: impl Into<String>) -> bool {
        self.lock().set_value(field, value)
    }

    /// A copy of the current state.
    pub fn snapshot(&self) -> FormState {
        self.lock().clone()
    }

    /// Run `f` with exclusive access to the state.
    pub fn update<R>(&self, f: impl FnOnce(&mut FormState) -> R) -> R {
        f(&mut self.lock())
    }

    /// Validate the current values against this instance's schema.
    pub fn validate(&self) -> ValidationResult {
        let mut state = self.lock();
        validator::validate(&mut state, &self.schema)
    }
}
