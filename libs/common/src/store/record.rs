//! Record, identifier and payload types exchanged with the record store

use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::form::Blob;

/// Collections the showcase reads and writes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Collection {
    Users,
    Projects,
    Votes,
    Comments,
}

impl Collection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Users => "users",
            Collection::Projects => "projects",
            Collection::Votes => "votes",
            Collection::Comments => "comments",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque record identifier assigned by the store
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    /// Parse a submitted identifier; blank or whitespace-containing values are rejected
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.chars().any(char::is_whitespace) {
            return None;
        }
        Some(Self(trimmed.to_string()))
    }

    /// Identifier minted by a store implementation
    pub(super) fn generated(value: String) -> Self {
        Self(value)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A stored record: system fields plus the collection's own fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    #[serde(with = "timestamp")]
    pub created: DateTime<Utc>,
    #[serde(with = "timestamp")]
    pub updated: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub expand: Map<String, Value>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Record {
    /// String value of `field`
    pub fn text(&self, field: &str) -> Option<&str> {
        self.fields.get(field).and_then(Value::as_str)
    }

    /// Relation stored in `field`, if set
    pub fn relation(&self, field: &str) -> Option<RecordId> {
        self.text(field).and_then(RecordId::parse)
    }

    pub fn flag(&self, field: &str) -> bool {
        self.fields
            .get(field)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// Records expanded under `key`; single relations yield one element
    pub fn expanded(&self, key: &str) -> Vec<Record> {
        match self.expand.get(key) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|item| serde_json::from_value(item.clone()).ok())
                .collect(),
            Some(item @ Value::Object(_)) => serde_json::from_value(item.clone())
                .map(|record| vec![record])
                .unwrap_or_default(),
            _ => Vec::new(),
        }
    }
}

/// Timestamps as the store writes them (`2024-01-31 12:00:00.123Z`), RFC 3339 also accepted
mod timestamp {
    use super::*;
    use serde::{Deserializer, Serializer, de::Error};

    const FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3fZ";
    const PARSE_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.fZ";

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        if let Ok(naive) = NaiveDateTime::parse_from_str(&raw, PARSE_FORMAT) {
            return Ok(naive.and_utc());
        }
        DateTime::parse_from_rfc3339(&raw)
            .map(|value| value.with_timezone(&Utc))
            .map_err(D::Error::custom)
    }
}

/// A single value written to a record field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayloadValue {
    Text(String),
    List(Vec<String>),
    File(Blob),
    Files(Vec<Blob>),
}

/// Field values for a create or update call, in insertion order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Payload {
    fields: Vec<(String, PayloadValue)>,
}

impl Payload {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(name, PayloadValue::Text(value.into()));
        self
    }

    pub fn list(mut self, name: impl Into<String>, values: Vec<String>) -> Self {
        self.set(name, PayloadValue::List(values));
        self
    }

    pub fn file(mut self, name: impl Into<String>, blob: Blob) -> Self {
        self.set(name, PayloadValue::File(blob));
        self
    }

    pub fn files(mut self, name: impl Into<String>, blobs: Vec<Blob>) -> Self {
        self.set(name, PayloadValue::Files(blobs));
        self
    }

    /// Set `name`, replacing any earlier value
    pub fn set(&mut self, name: impl Into<String>, value: PayloadValue) {
        let name = name.into();
        match self.fields.iter_mut().find(|(existing, _)| *existing == name) {
            Some((_, slot)) => *slot = value,
            None => self.fields.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&PayloadValue> {
        self.fields
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PayloadValue)> {
        self.fields.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Whether the payload must be sent as multipart
    pub fn has_files(&self) -> bool {
        self.fields
            .iter()
            .any(|(_, value)| matches!(value, PayloadValue::File(_) | PayloadValue::Files(_)))
    }

    /// JSON body for payloads without files
    pub fn to_json(&self) -> Value {
        let body: Map<String, Value> = self
            .fields
            .iter()
            .filter_map(|(name, value)| {
                let value = match value {
                    PayloadValue::Text(text) => Value::String(text.clone()),
                    PayloadValue::List(items) => {
                        Value::Array(items.iter().cloned().map(Value::String).collect())
                    }
                    PayloadValue::File(_) | PayloadValue::Files(_) => return None,
                };
                Some((name.clone(), value))
            })
            .collect();
        Value::Object(body)
    }
}
