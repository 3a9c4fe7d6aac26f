//! Input validation
//!
//! A [`Schema`] maps a decoded [`FormData`] to a typed value or to a
//! [`FieldErrors`] map. Every field is checked independently so all problems
//! are reported at once; cross-field rules run after the per-field checks.

pub mod constraints;
pub mod schemas;

use std::collections::BTreeMap;

use reqwest::Url;
use serde::Serialize;

use crate::{
    error::ActionError,
    form::{Blob, FormData},
    store::RecordId,
};
use constraints::{EqualFields, FileField, TextField, Violation};

/// Field path → ordered failure messages
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_default().push(message.into());
    }

    pub fn record(&mut self, violations: impl IntoIterator<Item = Violation>) {
        for violation in violations {
            self.add(violation.field, violation.message);
        }
    }

    /// Messages reported for `field`
    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    /// Fields with at least one failure, in name order
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// An optional field that is constrained only when it carries a value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionalField<T> {
    /// Not part of the submission
    Absent,
    /// Submitted blank
    Empty,
    Present(T),
}

impl<T> OptionalField<T> {
    pub fn as_present(&self) -> Option<&T> {
        match self {
            OptionalField::Present(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, OptionalField::Absent)
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> OptionalField<U> {
        match self {
            OptionalField::Absent => OptionalField::Absent,
            OptionalField::Empty => OptionalField::Empty,
            OptionalField::Present(value) => OptionalField::Present(f(value)),
        }
    }
}

/// A named validator for one kind of mutation
///
/// Implementations are immutable and shared across requests.
pub trait Schema: Sync {
    type Output;

    /// Name used in logs
    fn name(&self) -> &'static str;

    fn validate(&self, form: &FormData) -> Result<Self::Output, FieldErrors>;
}

/// Validate `form`, turning failures into a re-displayable [`ActionError::Invalid`]
pub fn parse<S: Schema>(schema: &S, form: &FormData) -> Result<S::Output, ActionError> {
    schema.validate(form).map_err(|errors| {
        tracing::debug!(
            "{} rejected submission on fields: {:?}",
            schema.name(),
            errors.fields().collect::<Vec<_>>()
        );
        ActionError::Invalid {
            data: form.echo(),
            errors,
        }
    })
}

/// Accumulates field errors while a schema reads its fields
pub struct Validator<'a> {
    form: &'a FormData,
    errors: FieldErrors,
}

impl<'a> Validator<'a> {
    pub fn new(form: &'a FormData) -> Self {
        Self {
            form,
            errors: FieldErrors::default(),
        }
    }

    /// A text field that must be submitted
    pub fn required(&mut self, field: &TextField) -> Option<String> {
        let Some(raw) = self.form().text(field.name()) else {
            self.errors.add(field.name(), field.required_message());
            return None;
        };
        self.apply(field, raw)
    }

    /// A text field that may be left out entirely
    pub fn optional(&mut self, field: &TextField) -> Option<String> {
        let raw = self.form().text(field.name())?;
        self.apply(field, raw)
    }

    /// A text field that may be left out or submitted blank
    pub fn blankable(&mut self, field: &TextField) -> OptionalField<String> {
        match self.form().text(field.name()) {
            None => OptionalField::Absent,
            Some(raw) if raw.trim().is_empty() => OptionalField::Empty,
            Some(raw) => match self.apply(field, raw) {
                Some(value) => OptionalField::Present(value),
                None => OptionalField::Absent,
            },
        }
    }

    /// A required URL field
    pub fn required_url(&mut self, field: &TextField) -> Option<Url> {
        let value = self.required(field)?;
        self.parse_url(field, &value)
    }

    /// A URL field that may be left out or submitted blank
    pub fn blankable_url(&mut self, field: &TextField) -> OptionalField<Url> {
        match self.blankable(field) {
            OptionalField::Absent => OptionalField::Absent,
            OptionalField::Empty => OptionalField::Empty,
            OptionalField::Present(value) => match self.parse_url(field, &value) {
                Some(url) => OptionalField::Present(url),
                None => OptionalField::Absent,
            },
        }
    }

    /// A record id that must be submitted
    pub fn required_id(&mut self, name: &str, required: &str) -> Option<RecordId> {
        let id = self.form().text(name).and_then(RecordId::parse);
        if id.is_none() {
            self.errors.add(name, required);
        }
        id
    }

    /// A record id that may be left out; a blank value counts as left out
    pub fn optional_id(&mut self, name: &str, invalid: &str) -> Option<RecordId> {
        let raw = self.form().text(name)?;
        if raw.trim().is_empty() {
            return None;
        }
        let id = RecordId::parse(raw);
        if id.is_none() {
            self.errors.add(name, invalid);
        }
        id
    }

    /// A repeatable text field: trimmed, blanks dropped, duplicates removed
    pub fn repeated(&mut self, name: &str) -> Vec<String> {
        let mut values: Vec<String> = Vec::new();
        for raw in self.form().texts(name) {
            let value = raw.trim();
            if !value.is_empty() && !values.iter().any(|existing| existing == value) {
                values.push(value.to_string());
            }
        }
        values
    }

    /// A file field that may be left out
    pub fn optional_file(&mut self, field: &FileField) -> Option<Blob> {
        self.reject_text(field);
        let blob = self.form().file(field.name())?;
        match field.apply(blob) {
            Ok(()) => Some(blob.clone()),
            Err(violations) => {
                self.errors.record(violations);
                None
            }
        }
    }

    /// A file field that must be submitted
    pub fn required_file(&mut self, field: &FileField, required: &str) -> Option<Blob> {
        if self.form().file(field.name()).is_none() {
            if !self.reject_text(field) {
                self.errors.add(field.name(), required);
            }
            return None;
        }
        self.optional_file(field)
    }

    /// A repeatable file field; each file is checked on its own
    pub fn files(&mut self, field: &FileField) -> Vec<Blob> {
        self.reject_text(field);
        let mut accepted = Vec::new();
        for blob in self.form().files(field.name()) {
            match field.apply(blob) {
                Ok(()) => accepted.push(blob.clone()),
                Err(violations) => self.errors.record(violations),
            }
        }
        accepted
    }

    /// Cross-field equality on the raw submitted values
    ///
    /// Skipped when either field is missing; that is already reported.
    pub fn equal(&mut self, rule: &EqualFields) {
        let [field, other] = rule.fields();
        if let (Some(left), Some(right)) = (self.form().text(field), self.form().text(other)) {
            let violations = rule.check(left, right);
            self.errors.record(violations);
        }
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn into_errors(self) -> FieldErrors {
        self.errors
    }

    /// The submission, borrowed independently of the error accumulator
    fn form(&self) -> &'a FormData {
        self.form
    }

    /// Non-blank text under a file field is an error, never silently dropped
    fn reject_text(&mut self, field: &FileField) -> bool {
        let texts = self.form().texts(field.name());
        if texts.iter().all(|text| text.trim().is_empty()) {
            return false;
        }
        self.errors.add(field.name(), field.not_a_file());
        true
    }

    fn apply(&mut self, field: &TextField, raw: &str) -> Option<String> {
        match field.apply(raw) {
            Ok(value) => Some(value),
            Err(violations) => {
                self.errors.record(violations);
                None
            }
        }
    }

    fn parse_url(&mut self, field: &TextField, value: &str) -> Option<Url> {
        match Url::parse(value) {
            Ok(url) => Some(url),
            Err(_) => {
                let message = field.url_message().unwrap_or("Must be a valid URL");
                self.errors.add(field.name(), message);
                None
            }
        }
    }
}
