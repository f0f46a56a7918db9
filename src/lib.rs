//! Translated forms with asynchronous validation.
//!
//! Schemas are built from translated message catalogs and rebuilt when the
//! active language changes. Username and e-mail controls are checked
//! against the backend for availability without ever blocking the user.

pub mod api;
pub mod config;
pub mod forms;
pub mod i18n;
pub mod retry;
pub mod storage;
pub mod validation;
