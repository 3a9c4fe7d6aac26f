//! Constraint catalog
//!
//! Declarative, side-effect-free field rules reused by every schema. The
//! builders are `const fn` so schemas can be assembled as immutable statics.

use std::sync::OnceLock;

use regex::Regex;
use reqwest::Url;

use crate::form::Blob;

/// MIME types accepted for thumbnails, avatars and project images
pub const IMAGE_TYPES: &[&str] = &[
    "image/jpeg",
    "image/jpg",
    "image/png",
    "image/webp",
    "image/svg+xml",
    "image/gif",
];

/// Smallest accepted image, in bytes
pub const MIN_IMAGE_BYTES: u64 = 10_000;

/// Largest accepted image, in bytes
pub const MAX_IMAGE_BYTES: u64 = 2_000_000;

/// A failed constraint, attributed to a field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub field: String,
    pub message: String,
}

impl Violation {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// A regular expression compiled on first use
#[derive(Debug)]
pub struct Pattern {
    source: &'static str,
    compiled: OnceLock<Regex>,
}

impl Pattern {
    pub const fn new(source: &'static str) -> Self {
        Self {
            source,
            compiled: OnceLock::new(),
        }
    }

    pub fn is_match(&self, value: &str) -> bool {
        self.compiled
            .get_or_init(|| Regex::new(self.source).expect("Failed to compile field pattern"))
            .is_match(value)
    }
}

static EMAIL: Pattern = Pattern::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$");

/// Rule applied to a (possibly trimmed) text value
#[derive(Debug)]
pub enum TextRule {
    Length {
        min: usize,
        max: usize,
        too_short: &'static str,
        too_long: &'static str,
    },
    Matches {
        pattern: &'static Pattern,
        message: &'static str,
    },
    Email {
        message: &'static str,
    },
    Url {
        message: &'static str,
    },
}

impl TextRule {
    /// Message of the failed rule, `None` when the value satisfies it
    pub fn check(&self, value: &str) -> Option<&'static str> {
        match self {
            TextRule::Length {
                min,
                max,
                too_short,
                too_long,
            } => {
                let count = value.chars().count();
                if count < *min {
                    Some(*too_short)
                } else if count > *max {
                    Some(*too_long)
                } else {
                    None
                }
            }
            TextRule::Matches { pattern, message } => (!pattern.is_match(value)).then_some(*message),
            TextRule::Email { message } => (!EMAIL.is_match(value)).then_some(*message),
            TextRule::Url { message } => Url::parse(value).is_err().then_some(*message),
        }
    }
}

/// Character count between `min` and `max`, inclusive
pub const fn length(
    min: usize,
    max: usize,
    too_short: &'static str,
    too_long: &'static str,
) -> TextRule {
    TextRule::Length {
        min,
        max,
        too_short,
        too_long,
    }
}

pub const fn matches(pattern: &'static Pattern, message: &'static str) -> TextRule {
    TextRule::Matches { pattern, message }
}

pub const fn email_format(message: &'static str) -> TextRule {
    TextRule::Email { message }
}

/// Absolute URL as understood by the WHATWG URL parser
pub const fn url_format(message: &'static str) -> TextRule {
    TextRule::Url { message }
}

/// A named text field and the rules bound to it
#[derive(Debug)]
pub struct TextField {
    name: &'static str,
    required: &'static str,
    trim: bool,
    rules: &'static [TextRule],
}

impl TextField {
    /// Field checked on its raw value
    pub const fn new(name: &'static str, required: &'static str, rules: &'static [TextRule]) -> Self {
        Self {
            name,
            required,
            trim: false,
            rules,
        }
    }

    /// Field whose value is trimmed before any rule runs
    pub const fn trimmed(
        name: &'static str,
        required: &'static str,
        rules: &'static [TextRule],
    ) -> Self {
        Self {
            name,
            required,
            trim: true,
            rules,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Message reported when the field is missing from the submission
    pub fn required_message(&self) -> &'static str {
        self.required
    }

    /// Normalize `raw` and run every rule, collecting all failures
    pub fn apply(&self, raw: &str) -> Result<String, Vec<Violation>> {
        let value = self.normalize(raw);
        let violations: Vec<Violation> = self
            .rules
            .iter()
            .filter_map(|rule| rule.check(value))
            .map(|message| Violation::new(self.name, message))
            .collect();

        if violations.is_empty() {
            Ok(value.to_string())
        } else {
            Err(violations)
        }
    }

    /// The value rules are checked against
    pub fn normalize<'a>(&self, raw: &'a str) -> &'a str {
        if self.trim { raw.trim() } else { raw }
    }

    /// Message of the field's URL rule, if it has one
    pub fn url_message(&self) -> Option<&'static str> {
        self.rules.iter().find_map(|rule| match rule {
            TextRule::Url { message } => Some(*message),
            _ => None,
        })
    }
}

/// Rule applied to an uploaded file
#[derive(Debug)]
pub enum FileRule {
    SizeBetween {
        min: u64,
        max: u64,
        message: &'static str,
    },
    MimeTypeIn {
        allowed: &'static [&'static str],
        message: &'static str,
    },
}

impl FileRule {
    pub fn check(&self, blob: &Blob) -> Option<&'static str> {
        match self {
            FileRule::SizeBetween { min, max, message } => {
                let size = blob.len();
                (size < *min || size > *max).then_some(*message)
            }
            FileRule::MimeTypeIn { allowed, message } => {
                let essence = essence(blob.content_type());
                (!allowed.iter().any(|allowed| *allowed == essence)).then_some(*message)
            }
        }
    }
}

/// Byte size between `min` and `max`, inclusive
pub const fn file_size_between(min: u64, max: u64, message: &'static str) -> FileRule {
    FileRule::SizeBetween { min, max, message }
}

pub const fn mime_type_in(allowed: &'static [&'static str], message: &'static str) -> FileRule {
    FileRule::MimeTypeIn { allowed, message }
}

/// A named file field and the rules bound to it
#[derive(Debug)]
pub struct FileField {
    name: &'static str,
    rules: &'static [FileRule],
}

impl FileField {
    pub const fn new(name: &'static str, rules: &'static [FileRule]) -> Self {
        Self { name, rules }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Message reported when text arrives where a file is expected
    pub fn not_a_file(&self) -> &'static str {
        self.rules
            .iter()
            .map(|rule| match rule {
                FileRule::SizeBetween { message, .. } | FileRule::MimeTypeIn { message, .. } => {
                    *message
                }
            })
            .next()
            .unwrap_or("Must be a file")
    }

    /// Run every rule against `blob`, collecting all failures
    pub fn apply(&self, blob: &Blob) -> Result<(), Vec<Violation>> {
        let violations: Vec<Violation> = self
            .rules
            .iter()
            .filter_map(|rule| rule.check(blob))
            .map(|message| Violation::new(self.name, message))
            .collect();

        if violations.is_empty() {
            Ok(())
        } else {
            Err(violations)
        }
    }
}

/// Cross-field equality; a mismatch is reported on both fields
#[derive(Debug)]
pub struct EqualFields {
    field: &'static str,
    other: &'static str,
    message: &'static str,
}

impl EqualFields {
    pub fn fields(&self) -> [&'static str; 2] {
        [self.field, self.other]
    }

    pub fn check(&self, left: &str, right: &str) -> Vec<Violation> {
        if left == right {
            return Vec::new();
        }
        self.fields()
            .into_iter()
            .map(|field| Violation::new(field, self.message))
            .collect()
    }
}

pub const fn equals_field(
    field: &'static str,
    other: &'static str,
    message: &'static str,
) -> EqualFields {
    EqualFields {
        field,
        other,
        message,
    }
}

/// MIME type without parameters, lowercased
fn essence(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}
