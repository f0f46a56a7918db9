//! Declarative field rules and the parser that runs them.
//!
//! A `Schema` is an ordered list of fields, each with an ordered list of
//! rules. Parsing runs every rule of every field and reports all failures in
//! that order; it never stops at the first one.

use regex::Regex;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, OnceLock};
use thiserror::Error;

/// Raw or validated form values keyed by field name.
pub type FormValues = BTreeMap<String, String>;

/// Fallible predicate for rules the built-in set cannot express.
/// `Ok(false)` is a validation failure, `Err` aborts the parse.
pub type CustomCheck = Arc<dyn Fn(&str, &FormValues) -> anyhow::Result<bool> + Send + Sync>;

static EMAIL_REGEX: OnceLock<Regex> = OnceLock::new();

/// Basic `local@domain.tld` shape test shared by the email rule and the
/// availability short-circuit.
pub fn looks_like_email(value: &str) -> bool {
    EMAIL_REGEX
        .get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap())
        .is_match(value)
}

/// One failed rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaIssue {
    pub path: String,
    pub message: String,
}

/// Why a parse did not produce data.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("{} validation issue(s)", .0.len())]
    Issues(Vec<SchemaIssue>),

    #[error("validation could not run: {0}")]
    Other(anyhow::Error),
}

#[derive(Clone)]
enum Rule {
    Required { message: String },
    Email { message: String },
    MinLength { min: usize, message: String },
    MaxLength { max: usize, message: String },
    Pattern { regex: Regex, message: String },
    IntegerRange { min: i64, max: i64, message: String },
    Matches { other: String, message: String },
    Custom { check: CustomCheck, message: String },
}

impl Rule {
    fn name(&self) -> &'static str {
        match self {
            Rule::Required { .. } => "required",
            Rule::Email { .. } => "email",
            Rule::MinLength { .. } => "min_length",
            Rule::MaxLength { .. } => "max_length",
            Rule::Pattern { .. } => "pattern",
            Rule::IntegerRange { .. } => "integer_range",
            Rule::Matches { .. } => "matches",
            Rule::Custom { .. } => "custom",
        }
    }

    /// `Ok(None)` when the rule passes, `Ok(Some(message))` when it fails.
    fn check(&self, value: &str, values: &FormValues) -> anyhow::Result<Option<&str>> {
        let passed = match self {
            Rule::Required { .. } => !value.trim().is_empty(),
            Rule::Email { .. } => looks_like_email(value),
            Rule::MinLength { min, .. } => value.chars().count() >= *min,
            Rule::MaxLength { max, .. } => value.chars().count() <= *max,
            Rule::Pattern { regex, .. } => regex.is_match(value),
            Rule::IntegerRange { min, max, .. } => value
                .trim()
                .parse::<i64>()
                .map(|n| n >= *min && n <= *max)
                .unwrap_or(false),
            Rule::Matches { other, .. } => {
                values.get(other).map(String::as_str).unwrap_or("") == value
            }
            Rule::Custom { check, .. } => check(value, values)?,
        };

        Ok(if passed { None } else { Some(self.message()) })
    }

    fn message(&self) -> &str {
        match self {
            Rule::Required { message }
            | Rule::Email { message }
            | Rule::MinLength { message, .. }
            | Rule::MaxLength { message, .. }
            | Rule::Pattern { message, .. }
            | Rule::IntegerRange { message, .. }
            | Rule::Matches { message, .. }
            | Rule::Custom { message, .. } => message,
        }
    }
}

/// Rules for one field, built fluently.
#[derive(Clone, Default)]
pub struct FieldRules {
    rules: Vec<Rule>,
}

impl FieldRules {
    pub fn required(mut self, message: impl Into<String>) -> Self {
        self.rules.push(Rule::Required { message: message.into() });
        self
    }

    pub fn email(mut self, message: impl Into<String>) -> Self {
        self.rules.push(Rule::Email { message: message.into() });
        self
    }

    pub fn min_length(mut self, min: usize, message: impl Into<String>) -> Self {
        self.rules.push(Rule::MinLength { min, message: message.into() });
        self
    }

    pub fn max_length(mut self, max: usize, message: impl Into<String>) -> Self {
        self.rules.push(Rule::MaxLength { max, message: message.into() });
        self
    }

    pub fn pattern(mut self, regex: Regex, message: impl Into<String>) -> Self {
        self.rules.push(Rule::Pattern { regex, message: message.into() });
        self
    }

    pub fn integer_range(mut self, min: i64, max: i64, message: impl Into<String>) -> Self {
        self.rules.push(Rule::IntegerRange { min, max, message: message.into() });
        self
    }

    /// Fails unless this field equals `other`. The issue is reported on this field.
    pub fn matches(mut self, other: impl Into<String>, message: impl Into<String>) -> Self {
        self.rules.push(Rule::Matches {
            other: other.into(),
            message: message.into(),
        });
        self
    }

    pub fn custom<F>(mut self, check: F, message: impl Into<String>) -> Self
    where
        F: Fn(&str, &FormValues) -> anyhow::Result<bool> + Send + Sync + 'static,
    {
        self.rules.push(Rule::Custom {
            check: Arc::new(check),
            message: message.into(),
        });
        self
    }

    fn is_required(&self) -> bool {
        self.rules.iter().any(|rule| matches!(rule, Rule::Required { .. }))
    }
}

#[derive(Clone)]
struct FieldSchema {
    name: String,
    rules: FieldRules,
}

/// Builder for [`Schema`].
#[derive(Default)]
pub struct SchemaBuilder {
    fields: Vec<FieldSchema>,
}

impl SchemaBuilder {
    /// Declare a field. Declaring the same name twice replaces the earlier rules.
    pub fn field(mut self, name: &str, rules: impl FnOnce(FieldRules) -> FieldRules) -> Self {
        let rules = rules(FieldRules::default());
        match self.fields.iter_mut().find(|f| f.name == name) {
            Some(existing) => existing.rules = rules,
            None => self.fields.push(FieldSchema {
                name: name.to_string(),
                rules,
            }),
        }
        self
    }

    pub fn build(self) -> Schema {
        Schema { fields: self.fields }
    }
}

/// An immutable set of field rules.
#[derive(Clone)]
pub struct Schema {
    fields: Vec<FieldSchema>,
}

impl Schema {
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::default()
    }

    /// Field names in declaration order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.fields.iter().any(|f| f.name == name)
    }

    /// Run every rule against `values`.
    ///
    /// Missing fields are treated as empty strings. Empty optional fields
    /// skip their rules; empty required fields run all of them, so a field
    /// may collect several issues. On success the result holds exactly the
    /// declared fields; anything else in `values` is dropped.
    pub fn safe_parse(&self, values: &FormValues) -> Result<FormValues, ParseError> {
        let mut issues = Vec::new();
        let mut data = FormValues::new();

        for field in &self.fields {
            let value = values.get(&field.name).map(String::as_str).unwrap_or("");

            if value.trim().is_empty() && !field.rules.is_required() {
                data.insert(field.name.clone(), value.to_string());
                continue;
            }

            for rule in &field.rules.rules {
                if let Some(message) = rule.check(value, values).map_err(ParseError::Other)? {
                    issues.push(SchemaIssue {
                        path: field.name.clone(),
                        message: message.to_string(),
                    });
                }
            }

            data.insert(field.name.clone(), value.to_string());
        }

        if issues.is_empty() {
            Ok(data)
        } else {
            Err(ParseError::Issues(issues))
        }
    }
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for field in &self.fields {
            let rules: Vec<_> = field.rules.rules.iter().map(Rule::name).collect();
            map.entry(&field.name, &rules);
        }
        map.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(pairs: &[(&str, &str)]) -> FormValues {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn issues(result: Result<FormValues, ParseError>) -> Vec<SchemaIssue> {
        match result {
            Err(ParseError::Issues(issues)) => issues,
            other => panic!("expected issues, got {:?}", other),
        }
    }

    fn signup() -> Schema {
        Schema::builder()
            .field("email", |f| f.required("email required").email("email invalid"))
            .field("password", |f| f.required("password required").min_length(8, "too short"))
            .field("confirm", |f| f.matches("password", "mismatch"))
            .build()
    }

    #[test]
    fn test_looks_like_email() {
        assert!(looks_like_email("a@b.co"));
        assert!(looks_like_email("first.last+tag@sub.example.org"));
        assert!(!looks_like_email("a@b"));
        assert!(!looks_like_email("a b@c.de"));
        assert!(!looks_like_email("@b.co"));
        assert!(!looks_like_email(""));
    }

    #[test]
    fn test_valid_values_strip_unknown_fields() {
        let input = values(&[
            ("email", "a@b.co"),
            ("password", "longenough"),
            ("confirm", "longenough"),
            ("extra", "dropped"),
        ]);

        let data = signup().safe_parse(&input).expect("should be valid");
        assert_eq!(data.len(), 3);
        assert!(!data.contains_key("extra"));
        assert_eq!(data["email"], "a@b.co");
    }

    #[test]
    fn test_collects_all_issues_in_rule_order() {
        let found = issues(signup().safe_parse(&values(&[("password", "short")])));

        assert_eq!(
            found,
            vec![
                SchemaIssue {
                    path: "email".into(),
                    message: "email required".into(),
                },
                SchemaIssue {
                    path: "email".into(),
                    message: "email invalid".into(),
                },
                SchemaIssue {
                    path: "password".into(),
                    message: "too short".into(),
                },
            ]
        );
    }

    #[test]
    fn test_empty_optional_field_skips_rules() {
        let schema = Schema::builder()
            .field("bio", |f| f.max_length(3, "too long").min_length(2, "too short"))
            .build();

        let data = schema.safe_parse(&FormValues::new()).expect("optional field may be empty");
        assert_eq!(data["bio"], "");
    }

    #[test]
    fn test_matches_reports_on_declaring_field() {
        let input = values(&[
            ("email", "a@b.co"),
            ("password", "longenough"),
            ("confirm", "other"),
        ]);
        let found = issues(signup().safe_parse(&input));
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].path, "confirm");
    }

    #[test]
    fn test_length_counts_characters_not_bytes() {
        let schema = Schema::builder()
            .field("name", |f| f.required("req").max_length(4, "too long"))
            .build();
        assert!(schema.safe_parse(&values(&[("name", "ñandú")])).is_err());
        assert!(schema.safe_parse(&values(&[("name", "ñand")])).is_ok());
    }

    #[test]
    fn test_integer_range() {
        let schema = Schema::builder()
            .field("players", |f| f.required("req").integer_range(2, 10, "range"))
            .build();

        assert!(schema.safe_parse(&values(&[("players", " 4 ")])).is_ok());
        assert!(schema.safe_parse(&values(&[("players", "11")])).is_err());
        assert!(schema.safe_parse(&values(&[("players", "four")])).is_err());
    }

    #[test]
    fn test_pattern_rule() {
        let schema = Schema::builder()
            .field("code", |f| f.required("req").pattern(Regex::new(r"^[A-Z]{3}$").unwrap(), "bad"))
            .build();
        assert!(schema.safe_parse(&values(&[("code", "ABC")])).is_ok());
        assert_eq!(issues(schema.safe_parse(&values(&[("code", "abc")])))[0].message, "bad");
    }

    #[test]
    fn test_custom_rule_error_aborts_parse() {
        let schema = Schema::builder()
            .field("name", |f| {
                f.required("req")
                    .custom(|_, _| Err(anyhow::anyhow!("lookup table unavailable")), "never shown")
            })
            .build();

        let err = schema.safe_parse(&values(&[("name", "x")])).unwrap_err();
        assert!(matches!(err, ParseError::Other(_)));
        assert!(err.to_string().contains("lookup table unavailable"));
    }

    #[test]
    fn test_custom_rule_sees_all_values() {
        let schema = Schema::builder()
            .field("end", |f| {
                f.required("req").custom(
                    |end, all| Ok(all.get("start").map(|s| s.as_str() < end).unwrap_or(true)),
                    "end before start",
                )
            })
            .build();

        assert!(schema.safe_parse(&values(&[("start", "a"), ("end", "b")])).is_ok());
        assert!(schema.safe_parse(&values(&[("start", "c"), ("end", "b")])).is_err());
    }

    #[test]
    fn test_redeclared_field_replaces_rules() {
        let schema = Schema::builder()
            .field("a", |f| f.required("first"))
            .field("a", |f| f.max_length(1, "second"))
            .build();

        assert_eq!(schema.field_names().collect::<Vec<_>>(), vec!["a"]);
        assert!(schema.safe_parse(&FormValues::new()).is_ok());
    }

    #[test]
    fn test_debug_lists_rule_names() {
        let debug = format!("{:?}", signup());
        assert!(debug.contains("\"email\": [\"required\", \"email\"]"));
    }
}
