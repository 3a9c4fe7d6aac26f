//! Common library for the project showcase services
//!
//! This crate holds the validated mutation pipeline shared by the `api` and
//! `auth` services: form decoding, the constraint catalog and schema
//! registry, the record-store contract and its adapters, keyed locking,
//! session tokens and the action error taxonomy.

pub mod cache;
pub mod error;
pub mod form;
pub mod identity;
pub mod lock;
pub mod session;
pub mod store;
pub mod validation;

/// Example usage of the validation pipeline
///
/// ```rust,no_run
/// use common::form::FormData;
/// use common::validation::{Schema, schemas::comment::CREATE_COMMENT};
///
/// let form = FormData::new().with_text("content", "Looks great!");
/// let comment = CREATE_COMMENT.validate(&form).expect("valid comment");
/// assert_eq!(comment.content, "Looks great!");
/// ```
pub fn example_usage() {}
