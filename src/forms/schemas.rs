//! Schemas of the application's forms.
//!
//! Each builder is a pure function of a catalog: all translated messages are
//! resolved before the first rule exists.

use crate::i18n::{keys, Catalog};
use crate::validation::Schema;
use regex::Regex;
use std::sync::OnceLock;

pub const USERNAME_MIN_LENGTH: usize = 3;
pub const USERNAME_MAX_LENGTH: usize = 20;
pub const PASSWORD_MIN_LENGTH: usize = 8;
pub const NAME_MAX_LENGTH: usize = 50;
pub const GROUP_NAME_MIN_LENGTH: usize = 3;
pub const GROUP_NAME_MAX_LENGTH: usize = 50;
pub const GROUP_DESCRIPTION_MAX_LENGTH: usize = 500;
pub const GROUP_MIN_PLAYERS: i64 = 2;
pub const GROUP_MAX_PLAYERS: i64 = 100;

static USERNAME_REGEX: OnceLock<Regex> = OnceLock::new();

fn username_regex() -> Regex {
    USERNAME_REGEX
        .get_or_init(|| Regex::new(r"^[A-Za-z0-9._-]+$").unwrap())
        .clone()
}

fn is_strong_password(password: &str) -> bool {
    password.chars().any(|c| c.is_uppercase())
        && password.chars().any(|c| c.is_lowercase())
        && password.chars().any(|c| c.is_ascii_digit())
}

/// The forms the application renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormKind {
    Registration,
    Login,
    UserEdit,
    GameGroup,
}

impl FormKind {
    /// Stable identifier, used as the draft storage key.
    pub fn name(&self) -> &'static str {
        match self {
            FormKind::Registration => "registration",
            FormKind::Login => "login",
            FormKind::UserEdit => "user-edit",
            FormKind::GameGroup => "game-group",
        }
    }

    /// The schema builder for this form.
    pub fn builder(&self) -> fn(&Catalog) -> Schema {
        match self {
            FormKind::Registration => registration,
            FormKind::Login => login,
            FormKind::UserEdit => user_edit,
            FormKind::GameGroup => game_group,
        }
    }
}

/// Sign-up: `username`, `email`, `password`, `confirmPassword`.
pub fn registration(catalog: &Catalog) -> Schema {
    Schema::builder()
        .field("username", |f| {
            f.required(catalog.t(keys::USERNAME_REQUIRED))
                .min_length(
                    USERNAME_MIN_LENGTH,
                    catalog.t_with(keys::USERNAME_MIN_LENGTH, &[("min", &USERNAME_MIN_LENGTH)]),
                )
                .max_length(
                    USERNAME_MAX_LENGTH,
                    catalog.t_with(keys::USERNAME_MAX_LENGTH, &[("max", &USERNAME_MAX_LENGTH)]),
                )
                .pattern(username_regex(), catalog.t(keys::USERNAME_PATTERN))
        })
        .field("email", |f| {
            f.required(catalog.t(keys::EMAIL_REQUIRED))
                .email(catalog.t(keys::EMAIL_INVALID))
        })
        .field("password", |f| {
            f.required(catalog.t(keys::PASSWORD_REQUIRED))
                .min_length(
                    PASSWORD_MIN_LENGTH,
                    catalog.t_with(keys::PASSWORD_MIN_LENGTH, &[("min", &PASSWORD_MIN_LENGTH)]),
                )
                .custom(|value, _| Ok(is_strong_password(value)), catalog.t(keys::PASSWORD_WEAK))
        })
        .field("confirmPassword", |f| {
            f.required(catalog.t(keys::CONFIRM_PASSWORD_REQUIRED))
                .matches("password", catalog.t(keys::PASSWORDS_DO_NOT_MATCH))
        })
        .build()
}

/// Sign-in: presence only, the backend decides the rest.
pub fn login(catalog: &Catalog) -> Schema {
    Schema::builder()
        .field("username", |f| f.required(catalog.t(keys::USERNAME_REQUIRED)))
        .field("password", |f| f.required(catalog.t(keys::PASSWORD_REQUIRED)))
        .build()
}

/// Administrative user edit: optional names, mandatory e-mail.
pub fn user_edit(catalog: &Catalog) -> Schema {
    Schema::builder()
        .field("firstName", |f| {
            f.max_length(
                NAME_MAX_LENGTH,
                catalog.t_with(keys::FIRST_NAME_MAX_LENGTH, &[("max", &NAME_MAX_LENGTH)]),
            )
        })
        .field("lastName", |f| {
            f.max_length(
                NAME_MAX_LENGTH,
                catalog.t_with(keys::LAST_NAME_MAX_LENGTH, &[("max", &NAME_MAX_LENGTH)]),
            )
        })
        .field("email", |f| {
            f.required(catalog.t(keys::EMAIL_REQUIRED))
                .email(catalog.t(keys::EMAIL_INVALID))
        })
        .build()
}

/// Game group creation wizard.
pub fn game_group(catalog: &Catalog) -> Schema {
    Schema::builder()
        .field("name", |f| {
            f.required(catalog.t(keys::GROUP_NAME_REQUIRED))
                .min_length(
                    GROUP_NAME_MIN_LENGTH,
                    catalog.t_with(keys::GROUP_NAME_MIN_LENGTH, &[("min", &GROUP_NAME_MIN_LENGTH)]),
                )
                .max_length(
                    GROUP_NAME_MAX_LENGTH,
                    catalog.t_with(keys::GROUP_NAME_MAX_LENGTH, &[("max", &GROUP_NAME_MAX_LENGTH)]),
                )
        })
        .field("description", |f| {
            f.max_length(
                GROUP_DESCRIPTION_MAX_LENGTH,
                catalog.t_with(
                    keys::GROUP_DESCRIPTION_MAX_LENGTH,
                    &[("max", &GROUP_DESCRIPTION_MAX_LENGTH)],
                ),
            )
        })
        .field("maxPlayers", |f| {
            f.required(catalog.t(keys::GROUP_MAX_PLAYERS_REQUIRED)).integer_range(
                GROUP_MIN_PLAYERS,
                GROUP_MAX_PLAYERS,
                catalog.t_with(
                    keys::GROUP_MAX_PLAYERS_RANGE,
                    &[("min", &GROUP_MIN_PLAYERS), ("max", &GROUP_MAX_PLAYERS)],
                ),
            )
        })
        .build()
}
