//! Form decoding
//!
//! Turns an incoming `multipart/form-data` or `application/x-www-form-urlencoded`
//! body into an ordered field-name → value mapping. Decoding never checks
//! semantic constraints; that is the job of the schema registry.

use axum::{
    Form, async_trait,
    extract::{FromRequest, Multipart, Request},
    http::header::CONTENT_TYPE,
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::error::ActionError;

/// Content type assumed for file parts that do not declare one
const DEFAULT_FILE_TYPE: &str = "application/octet-stream";

/// The submission could not be shaped into form fields
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("unsupported content type: {0:?}")]
    UnsupportedContentType(Option<String>),

    #[error("malformed multipart body: {0}")]
    Multipart(String),

    #[error("malformed urlencoded body: {0}")]
    Urlencoded(String),
}

impl IntoResponse for DecodeError {
    fn into_response(self) -> Response {
        ActionError::from(self).into_response()
    }
}

/// An uploaded file: its bytes and declared MIME type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    bytes: Bytes,
    content_type: String,
    filename: Option<String>,
}

impl Blob {
    pub fn new(bytes: impl Into<Bytes>, content_type: impl Into<String>) -> Self {
        Self {
            bytes: bytes.into(),
            content_type: content_type.into(),
            filename: None,
        }
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    /// Size in bytes
    pub fn len(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Declared MIME type, as sent by the client
    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn filename(&self) -> Option<&str> {
        self.filename.as_deref()
    }

    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }
}

/// A single decoded field value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Text(String),
    File(Blob),
}

/// Decoded submission, preserving field order and repeated fields
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormData {
    entries: Vec<(String, FieldValue)>,
}

impl FormData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from urlencoded key/value pairs
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let entries = pairs
            .into_iter()
            .map(|(name, value)| (name.into(), FieldValue::Text(value.into())))
            .collect();
        Self { entries }
    }

    pub fn push_text(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries
            .push((name.into(), FieldValue::Text(value.into())));
    }

    pub fn push_file(&mut self, name: impl Into<String>, blob: Blob) {
        self.entries.push((name.into(), FieldValue::File(blob)));
    }

    pub fn with_text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.push_text(name, value);
        self
    }

    pub fn with_file(mut self, name: impl Into<String>, blob: Blob) -> Self {
        self.push_file(name, blob);
        self
    }

    /// First text value submitted under `name`
    pub fn text(&self, name: &str) -> Option<&str> {
        self.values(name).find_map(|value| match value {
            FieldValue::Text(text) => Some(text.as_str()),
            FieldValue::File(_) => None,
        })
    }

    /// Every text value submitted under `name`, in submission order
    pub fn texts(&self, name: &str) -> Vec<&str> {
        self.values(name)
            .filter_map(|value| match value {
                FieldValue::Text(text) => Some(text.as_str()),
                FieldValue::File(_) => None,
            })
            .collect()
    }

    /// First file submitted under `name`
    pub fn file(&self, name: &str) -> Option<&Blob> {
        self.files(name).into_iter().next()
    }

    /// Every file submitted under `name`, in submission order
    pub fn files(&self, name: &str) -> Vec<&Blob> {
        self.values(name)
            .filter_map(|value| match value {
                FieldValue::File(blob) => Some(blob),
                FieldValue::Text(_) => None,
            })
            .collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values(name).next().is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Re-displayable copy of the submission: text fields only, file blobs are dropped
    ///
    /// Repeated fields become arrays.
    pub fn echo(&self) -> Map<String, Value> {
        let mut data = Map::new();
        for (name, value) in &self.entries {
            let FieldValue::Text(text) = value else {
                continue;
            };
            match data.get_mut(name) {
                None => {
                    data.insert(name.clone(), Value::String(text.clone()));
                }
                Some(Value::Array(items)) => items.push(Value::String(text.clone())),
                Some(existing) => {
                    let first = existing.take();
                    *existing = Value::Array(vec![first, Value::String(text.clone())]);
                }
            }
        }
        data
    }

    fn values<'a>(&'a self, name: &str) -> impl Iterator<Item = &'a FieldValue> {
        self.entries
            .iter()
            .filter(move |(field, _)| field == name)
            .map(|(_, value)| value)
    }
}

/// Decode every part of a multipart body
///
/// Parts declaring a filename become files, the rest text whatever their
/// content type. An empty file input (blank filename, no bytes) counts as
/// not submitted.
pub async fn decode_multipart(mut multipart: Multipart) -> Result<FormData, DecodeError> {
    let mut form = FormData::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| DecodeError::Multipart(e.body_text()))?
    {
        let name = field
            .name()
            .map(str::to_owned)
            .ok_or_else(|| DecodeError::Multipart("part without a field name".to_string()))?;

        let filename = field.file_name().map(str::to_owned);
        let content_type = field.content_type().map(str::to_owned);

        if filename.is_none() {
            let text = field
                .text()
                .await
                .map_err(|e| DecodeError::Multipart(e.body_text()))?;
            form.push_text(name, text);
            continue;
        }

        let bytes = field
            .bytes()
            .await
            .map_err(|e| DecodeError::Multipart(e.body_text()))?;
        if bytes.is_empty() && filename.as_deref().unwrap_or_default().is_empty() {
            continue;
        }

        let mut blob = Blob::new(
            bytes,
            content_type.unwrap_or_else(|| DEFAULT_FILE_TYPE.to_string()),
        );
        if let Some(filename) = filename {
            blob = blob.with_filename(filename);
        }
        form.push_file(name, blob);
    }

    Ok(form)
}

#[async_trait]
impl<S> FromRequest<S> for FormData
where
    S: Send + Sync,
{
    type Rejection = DecodeError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let content_type = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_ascii_lowercase);

        match content_type.as_deref() {
            Some(ct) if ct.starts_with("multipart/form-data") => {
                let multipart = Multipart::from_request(req, state)
                    .await
                    .map_err(|e| DecodeError::Multipart(e.body_text()))?;
                decode_multipart(multipart).await
            }
            Some(ct) if ct.starts_with("application/x-www-form-urlencoded") => {
                let Form(pairs) = Form::<Vec<(String, String)>>::from_request(req, state)
                    .await
                    .map_err(|e| DecodeError::Urlencoded(e.body_text()))?;
                Ok(FormData::from_pairs(pairs))
            }
            _ => Err(DecodeError::UnsupportedContentType(content_type)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http};
    use serde_json::json;

    const BOUNDARY: &str = "showcase-boundary";

    fn multipart_request(body: String) -> Request {
        http::Request::builder()
            .method("POST")
            .uri("/")
            .header(
                CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    fn text_part(name: &str, value: &str) -> String {
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
        )
    }

    fn file_part(name: &str, filename: &str, content_type: &str, bytes: &str) -> String {
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n{bytes}\r\n"
        )
    }

    #[tokio::test]
    async fn decodes_multipart_text_and_files() {
        let body = [
            text_part("name", "Showcase"),
            text_part("topics", "rust"),
            text_part("topics", "web"),
            file_part("thumbnail", "logo.png", "image/png", "PNGDATA"),
        ]
        .concat()
            + &format!("--{BOUNDARY}--\r\n");

        let form = FormData::from_request(multipart_request(body), &())
            .await
            .unwrap();

        assert_eq!(form.text("name"), Some("Showcase"));
        assert_eq!(form.texts("topics"), vec!["rust", "web"]);
        let thumbnail = form.file("thumbnail").unwrap();
        assert_eq!(thumbnail.content_type(), "image/png");
        assert_eq!(thumbnail.len(), 7);
        assert_eq!(thumbnail.filename(), Some("logo.png"));
    }

    #[tokio::test]
    async fn typed_parts_without_filename_are_text() {
        let body = format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"content\"\r\nContent-Type: text/plain; charset=UTF-8\r\n\r\nLooks great\r\n--{BOUNDARY}--\r\n"
        );

        let form = FormData::from_request(multipart_request(body), &())
            .await
            .unwrap();

        assert_eq!(form.text("content"), Some("Looks great"));
        assert!(form.file("content").is_none());
    }

    #[test]
    fn lookups_outlive_the_field_name() {
        let form = FormData::new()
            .with_text("content", "hello")
            .with_file("thumbnail", Blob::new(vec![1u8; 4], "image/png"));

        let (content, thumbnail) = {
            let content_name = String::from("content");
            let thumbnail_name = String::from("thumbnail");
            (form.text(&content_name), form.file(&thumbnail_name))
        };
        assert_eq!(content, Some("hello"));
        assert_eq!(thumbnail.map(Blob::len), Some(4));
    }

    #[tokio::test]
    async fn empty_file_input_is_not_submitted() {
        let body = [
            text_part("name", "Showcase"),
            file_part("thumbnail", "", "application/octet-stream", ""),
        ]
        .concat()
            + &format!("--{BOUNDARY}--\r\n");

        let form = FormData::from_request(multipart_request(body), &())
            .await
            .unwrap();

        assert!(!form.contains("thumbnail"));
    }

    #[tokio::test]
    async fn decodes_urlencoded_pairs_in_order() {
        let req = http::Request::builder()
            .method("POST")
            .uri("/")
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from("technologies=rust&technologies=axum&content=hi%20there"))
            .unwrap();

        let form = FormData::from_request(req, &()).await.unwrap();

        assert_eq!(form.texts("technologies"), vec!["rust", "axum"]);
        assert_eq!(form.text("content"), Some("hi there"));
    }

    #[tokio::test]
    async fn rejects_unsupported_content_type() {
        let req = http::Request::builder()
            .method("POST")
            .uri("/")
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from("{}"))
            .unwrap();

        let err = FormData::from_request(req, &()).await.unwrap_err();
        assert!(matches!(err, DecodeError::UnsupportedContentType(Some(_))));
    }

    #[tokio::test]
    async fn rejects_truncated_multipart() {
        let body = format!("--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"x\"\r\n\r\nunterminated");
        let result = FormData::from_request(multipart_request(body), &()).await;
        assert!(matches!(result, Err(DecodeError::Multipart(_))));
    }

    #[test]
    fn repeatable_field_reads_as_sequence_even_when_missing() {
        let form = FormData::new().with_text("topics", "rust");
        assert_eq!(form.texts("topics"), vec!["rust"]);
        assert!(form.texts("technologies").is_empty());
    }

    #[test]
    fn echo_drops_files_and_groups_repeats() {
        let form = FormData::new()
            .with_text("name", "Showcase")
            .with_text("topics", "rust")
            .with_text("topics", "web")
            .with_file("thumbnail", Blob::new(vec![0u8; 16], "image/png"));

        let echoed = Value::Object(form.echo());
        assert_eq!(
            echoed,
            json!({ "name": "Showcase", "topics": ["rust", "web"] })
        );
    }
}
