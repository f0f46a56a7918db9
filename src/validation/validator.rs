//! Stateless validation pass: run a schema over a form and reconcile the
//! controls' error state with the outcome.

use crate::validation::form::{FormState, MESSAGE_KEY};
use crate::validation::schema::{FormValues, ParseError, Schema, SchemaIssue};
use serde::ser::{Serialize, SerializeStruct, Serializer};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Field name to the message shown for it.
pub type FieldErrors = BTreeMap<String, String>;

/// First error for a field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// Outcome of one validation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationResult {
    /// Declared fields only, unknown fields stripped.
    Valid(FormValues),
    /// One message per invalid field.
    Invalid(FieldErrors),
}

impl ValidationResult {
    pub fn is_success(&self) -> bool {
        matches!(self, ValidationResult::Valid(_))
    }

    pub fn data(&self) -> Option<&FormValues> {
        match self {
            ValidationResult::Valid(data) => Some(data),
            ValidationResult::Invalid(_) => None,
        }
    }

    pub fn errors(&self) -> Option<&FieldErrors> {
        match self {
            ValidationResult::Valid(_) => None,
            ValidationResult::Invalid(errors) => Some(errors),
        }
    }

    pub fn into_data(self) -> Option<FormValues> {
        match self {
            ValidationResult::Valid(data) => Some(data),
            ValidationResult::Invalid(_) => None,
        }
    }
}

/// Serializes as `{"success": true, "data": {...}}` or
/// `{"success": false, "errors": {...}}`.
impl Serialize for ValidationResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("ValidationResult", 2)?;
        match self {
            ValidationResult::Valid(data) => {
                state.serialize_field("success", &true)?;
                state.serialize_field("data", data)?;
            }
            ValidationResult::Invalid(errors) => {
                state.serialize_field("success", &false)?;
                state.serialize_field("errors", errors)?;
            }
        }
        state.end()
    }
}

/// Collapse issues to one per field, keeping the first message seen.
/// Fields appear in the order of their first issue.
pub fn collect_field_errors(issues: &[SchemaIssue]) -> Vec<FieldError> {
    let mut errors: Vec<FieldError> = Vec::new();
    for issue in issues {
        if !errors.iter().any(|e| e.field == issue.path) {
            errors.push(FieldError {
                field: issue.path.clone(),
                message: issue.message.clone(),
            });
        }
    }
    errors
}

/// Field to message table for a parse failure. Failures that are not schema
/// issues produce an empty table.
pub fn field_errors(error: &ParseError) -> FieldErrors {
    match error {
        ParseError::Issues(issues) => collect_field_errors(issues)
            .into_iter()
            .map(|e| (e.field, e.message))
            .collect(),
        ParseError::Other(_) => FieldErrors::new(),
    }
}

/// Validate `form` against `schema` and write the outcome onto its controls.
///
/// On success every control loses its `message` flag. On failure each
/// offending control gets one, and is marked touched and dirty. Other flags
/// are never touched.
pub fn validate(form: &mut FormState, schema: &Schema) -> ValidationResult {
    match schema.safe_parse(&form.values()) {
        Ok(data) => {
            for (_, control) in form.controls_mut() {
                control.clear_error(MESSAGE_KEY);
            }
            ValidationResult::Valid(data)
        }
        Err(error) => {
            if let ParseError::Other(e) = &error {
                warn!("Validation did not complete: {:#}", e);
            }

            let errors = field_errors(&error);
            debug!("Validation failed on {} field(s)", errors.len());

            for (field, message) in &errors {
                if let Some(control) = form.control_mut(field) {
                    control.set_error(MESSAGE_KEY, Value::String(message.clone()));
                    control.mark_touched();
                    control.mark_dirty();
                }
            }

            ValidationResult::Invalid(errors)
        }
    }
}
