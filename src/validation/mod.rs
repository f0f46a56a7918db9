//! Schema-driven form validation.
//!
//! - `schema`: declarative field rules and the parser
//! - `form`: controls, their shared error state, and live form instances
//! - `validator`: the stateless pass reconciling schema output with controls
//! - `availability`: advisory remote checks with stale-result protection
//! - `metrics`: counters for availability checks

mod availability;
mod form;
mod metrics;
mod schema;
mod validator;

pub use availability::{
    apply_result, AvailabilityChecker, AvailabilityResult, CheckOutcome, FieldAvailability,
};
pub use form::{Control, ControlErrors, FormHandle, FormState, MESSAGE_KEY, UNAVAILABLE_KEY};
pub use metrics::{CheckMetrics, CheckMetricsReport};
pub use schema::{
    looks_like_email, CustomCheck, FieldRules, FormValues, ParseError, Schema, SchemaBuilder,
    SchemaIssue,
};
pub use validator::{
    collect_field_errors, field_errors, validate, FieldError, FieldErrors, ValidationResult,
};
