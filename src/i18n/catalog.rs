//! Message catalogs: translated strings keyed by dotted identifiers.
//!
//! Keys follow the resource-file convention (`VALIDATION.EMAIL_REQUIRED`).
//! Placeholders use double braces: `"At least {{min}} characters"`.

use crate::i18n::Language;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

/// Keys used by the built-in form schemas.
pub mod keys {
    pub const USERNAME_REQUIRED: &str = "VALIDATION.USERNAME_REQUIRED";
    pub const USERNAME_MIN_LENGTH: &str = "VALIDATION.USERNAME_MIN_LENGTH";
    pub const USERNAME_MAX_LENGTH: &str = "VALIDATION.USERNAME_MAX_LENGTH";
    pub const USERNAME_PATTERN: &str = "VALIDATION.USERNAME_PATTERN";
    pub const USERNAME_TAKEN: &str = "VALIDATION.USERNAME_TAKEN";

    pub const EMAIL_REQUIRED: &str = "VALIDATION.EMAIL_REQUIRED";
    pub const EMAIL_INVALID: &str = "VALIDATION.EMAIL_INVALID";
    pub const EMAIL_TAKEN: &str = "VALIDATION.EMAIL_TAKEN";

    pub const PASSWORD_REQUIRED: &str = "VALIDATION.PASSWORD_REQUIRED";
    pub const PASSWORD_MIN_LENGTH: &str = "VALIDATION.PASSWORD_MIN_LENGTH";
    pub const PASSWORD_WEAK: &str = "VALIDATION.PASSWORD_WEAK";
    pub const CONFIRM_PASSWORD_REQUIRED: &str = "VALIDATION.CONFIRM_PASSWORD_REQUIRED";
    pub const PASSWORDS_DO_NOT_MATCH: &str = "VALIDATION.PASSWORDS_DO_NOT_MATCH";

    pub const FIRST_NAME_MAX_LENGTH: &str = "VALIDATION.FIRST_NAME_MAX_LENGTH";
    pub const LAST_NAME_MAX_LENGTH: &str = "VALIDATION.LAST_NAME_MAX_LENGTH";

    pub const GROUP_NAME_REQUIRED: &str = "VALIDATION.GROUP_NAME_REQUIRED";
    pub const GROUP_NAME_MIN_LENGTH: &str = "VALIDATION.GROUP_NAME_MIN_LENGTH";
    pub const GROUP_NAME_MAX_LENGTH: &str = "VALIDATION.GROUP_NAME_MAX_LENGTH";
    pub const GROUP_DESCRIPTION_MAX_LENGTH: &str = "VALIDATION.GROUP_DESCRIPTION_MAX_LENGTH";
    pub const GROUP_MAX_PLAYERS_REQUIRED: &str = "VALIDATION.GROUP_MAX_PLAYERS_REQUIRED";
    pub const GROUP_MAX_PLAYERS_RANGE: &str = "VALIDATION.GROUP_MAX_PLAYERS_RANGE";

    pub const SUBMISSION_FAILED: &str = "NOTIFICATIONS.SUBMISSION_FAILED";
}

// ==================== Built-in Strings ====================

const ENGLISH_ENTRIES: &[(&str, &str)] = &[
    (keys::USERNAME_REQUIRED, "Username is required"),
    (keys::USERNAME_MIN_LENGTH, "Username must be at least {{min}} characters"),
    (keys::USERNAME_MAX_LENGTH, "Username must be at most {{max}} characters"),
    (
        keys::USERNAME_PATTERN,
        "Username may only contain letters, numbers, dots, dashes and underscores",
    ),
    (keys::USERNAME_TAKEN, "This username is already taken"),
    (keys::EMAIL_REQUIRED, "Email is required"),
    (keys::EMAIL_INVALID, "Please enter a valid email address"),
    (keys::EMAIL_TAKEN, "This email is already registered"),
    (keys::PASSWORD_REQUIRED, "Password is required"),
    (keys::PASSWORD_MIN_LENGTH, "Password must be at least {{min}} characters"),
    (
        keys::PASSWORD_WEAK,
        "Password must contain an uppercase letter, a lowercase letter and a digit",
    ),
    (keys::CONFIRM_PASSWORD_REQUIRED, "Please confirm your password"),
    (keys::PASSWORDS_DO_NOT_MATCH, "Passwords do not match"),
    (keys::FIRST_NAME_MAX_LENGTH, "First name must be at most {{max}} characters"),
    (keys::LAST_NAME_MAX_LENGTH, "Last name must be at most {{max}} characters"),
    (keys::GROUP_NAME_REQUIRED, "Group name is required"),
    (keys::GROUP_NAME_MIN_LENGTH, "Group name must be at least {{min}} characters"),
    (keys::GROUP_NAME_MAX_LENGTH, "Group name must be at most {{max}} characters"),
    (keys::GROUP_DESCRIPTION_MAX_LENGTH, "Description must be at most {{max}} characters"),
    (keys::GROUP_MAX_PLAYERS_REQUIRED, "Maximum number of players is required"),
    (keys::GROUP_MAX_PLAYERS_RANGE, "Maximum players must be between {{min}} and {{max}}"),
    (keys::SUBMISSION_FAILED, "Something went wrong. Please try again."),
];

const SPANISH_ENTRIES: &[(&str, &str)] = &[
    (keys::USERNAME_REQUIRED, "El nombre de usuario es obligatorio"),
    (keys::USERNAME_MIN_LENGTH, "El nombre de usuario debe tener al menos {{min}} caracteres"),
    (keys::USERNAME_MAX_LENGTH, "El nombre de usuario debe tener como máximo {{max}} caracteres"),
    (
        keys::USERNAME_PATTERN,
        "El nombre de usuario solo puede contener letras, números, puntos, guiones y guiones bajos",
    ),
    (keys::USERNAME_TAKEN, "Este nombre de usuario ya está en uso"),
    (keys::EMAIL_REQUIRED, "El correo electrónico es obligatorio"),
    (keys::EMAIL_INVALID, "Introduce un correo electrónico válido"),
    (keys::EMAIL_TAKEN, "Este correo electrónico ya está registrado"),
    (keys::PASSWORD_REQUIRED, "La contraseña es obligatoria"),
    (keys::PASSWORD_MIN_LENGTH, "La contraseña debe tener al menos {{min}} caracteres"),
    (keys::PASSWORD_WEAK, "La contraseña debe contener una mayúscula, una minúscula y un dígito"),
    (keys::CONFIRM_PASSWORD_REQUIRED, "Confirma tu contraseña"),
    (keys::PASSWORDS_DO_NOT_MATCH, "Las contraseñas no coinciden"),
    (keys::FIRST_NAME_MAX_LENGTH, "El nombre debe tener como máximo {{max}} caracteres"),
    (keys::LAST_NAME_MAX_LENGTH, "El apellido debe tener como máximo {{max}} caracteres"),
    (keys::GROUP_NAME_REQUIRED, "El nombre del grupo es obligatorio"),
    (keys::GROUP_NAME_MIN_LENGTH, "El nombre del grupo debe tener al menos {{min}} caracteres"),
    (keys::GROUP_NAME_MAX_LENGTH, "El nombre del grupo debe tener como máximo {{max}} caracteres"),
    (
        keys::GROUP_DESCRIPTION_MAX_LENGTH,
        "La descripción debe tener como máximo {{max}} caracteres",
    ),
    (keys::GROUP_MAX_PLAYERS_REQUIRED, "El número máximo de jugadores es obligatorio"),
    (keys::GROUP_MAX_PLAYERS_RANGE, "El máximo de jugadores debe estar entre {{min}} y {{max}}"),
    (keys::SUBMISSION_FAILED, "Algo salió mal. Inténtalo de nuevo."),
];

fn builtin_entries(language: Language) -> &'static [(&'static str, &'static str)] {
    match language.code() {
        "es" => SPANISH_ENTRIES,
        _ => ENGLISH_ENTRIES,
    }
}

/// Translated strings for one language.
#[derive(Debug, Clone)]
pub struct Catalog {
    language: Language,
    entries: HashMap<String, String>,
}

impl Catalog {
    /// An empty catalog; every lookup falls back to its key.
    pub fn new(language: Language) -> Self {
        Self {
            language,
            entries: HashMap::new(),
        }
    }

    /// The catalog compiled into the crate for `language`.
    pub fn builtin(language: Language) -> Self {
        let mut catalog = Self::new(language);
        for (key, text) in builtin_entries(language) {
            catalog.insert(*key, *text);
        }
        catalog
    }

    /// Build a catalog from a translation resource document.
    ///
    /// Nested objects become dotted keys; non-string leaves are ignored.
    pub fn from_json(language: Language, document: &Value) -> Self {
        let mut catalog = Self::new(language);
        flatten_into(document, String::new(), &mut catalog.entries);
        catalog
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn insert(&mut self, key: impl Into<String>, text: impl Into<String>) {
        self.entries.insert(key.into(), text.into());
    }

    /// Overlay `other` on top of this catalog; its entries win.
    pub fn extend(&mut self, other: Catalog) {
        self.entries.extend(other.entries);
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Translate `key`, falling back to the key itself when missing.
    pub fn t(&self, key: &str) -> String {
        self.get(key).unwrap_or(key).to_string()
    }

    /// Translate `key` and substitute `{{name}}` placeholders.
    pub fn t_with(&self, key: &str, args: &[(&str, &dyn fmt::Display)]) -> String {
        let mut text = self.t(key);
        for (name, value) in args {
            text = text.replace(&format!("{{{{{}}}}}", name), &value.to_string());
        }
        text
    }
}

fn flatten_into(value: &Value, prefix: String, out: &mut HashMap<String, String>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                let path = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{}.{}", prefix, key)
                };
                flatten_into(child, path, out);
            }
        }
        Value::String(text) if !prefix.is_empty() => {
            out.insert(prefix, text.clone());
        }
        _ => {}
    }
}
