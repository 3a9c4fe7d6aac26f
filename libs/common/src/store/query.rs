//! Typed list queries rendered into the store's filter language

use std::cmp::Ordering;

use serde_json::Value;

use super::record::Record;

/// Conjunction of field equalities
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    clauses: Vec<(String, String)>,
}

impl Filter {
    pub fn eq(field: impl Into<String>, value: impl ToString) -> Self {
        Self {
            clauses: vec![(field.into(), value.to_string())],
        }
    }

    pub fn and(mut self, field: impl Into<String>, value: impl ToString) -> Self {
        self.clauses.push((field.into(), value.to_string()));
        self
    }

    /// Render as `field = "value" && ...` with values escaped
    pub fn render(&self) -> String {
        self.clauses
            .iter()
            .map(|(field, value)| format!("{field} = \"{}\"", escape(value)))
            .collect::<Vec<_>>()
            .join(" && ")
    }

    /// Evaluate against a record held locally
    pub fn matches(&self, record: &Record) -> bool {
        self.clauses.iter().all(|(field, expected)| {
            if field == "id" {
                return record.id.as_str() == expected;
            }
            match record.fields.get(field) {
                Some(Value::String(actual)) => actual == expected,
                Some(Value::Array(items)) => items.iter().any(|item| item.as_str() == Some(expected)),
                Some(Value::Bool(actual)) => actual.to_string() == *expected,
                Some(Value::Number(actual)) => actual.to_string() == *expected,
                _ => expected.is_empty(),
            }
        })
    }
}

fn escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Ordering on a single field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sort {
    field: String,
    descending: bool,
}

impl Sort {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            descending: false,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            descending: true,
        }
    }

    pub fn render(&self) -> String {
        if self.descending {
            format!("-{}", self.field)
        } else {
            self.field.clone()
        }
    }

    pub fn compare(&self, a: &Record, b: &Record) -> Ordering {
        let ordering = match self.field.as_str() {
            "created" => a.created.cmp(&b.created),
            "updated" => a.updated.cmp(&b.updated),
            "id" => a.id.cmp(&b.id),
            field => a.text(field).cmp(&b.text(field)),
        };
        if self.descending {
            ordering.reverse()
        } else {
            ordering
        }
    }
}

/// Default page size used while fetching a full list
pub const DEFAULT_BATCH: usize = 200;

/// Options for [`RecordStore::get_full_list`](super::RecordStore::get_full_list)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListOptions {
    pub filter: Option<Filter>,
    pub sort: Option<Sort>,
    pub expand: Vec<String>,
    /// Page size, at least 1; set through [`ListOptions::batch`]
    batch: usize,
}

impl Default for ListOptions {
    fn default() -> Self {
        Self {
            filter: None,
            sort: None,
            expand: Vec::new(),
            batch: DEFAULT_BATCH,
        }
    }
}

impl ListOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn sort(mut self, sort: Sort) -> Self {
        self.sort = Some(sort);
        self
    }

    pub fn expand(mut self, relation: impl Into<String>) -> Self {
        self.expand.push(relation.into());
        self
    }

    pub fn batch(mut self, batch: usize) -> Self {
        self.batch = batch.max(1);
        self
    }

    pub fn batch_size(&self) -> usize {
        self.batch
    }
}
