//! PocketBase-compatible HTTP record store

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::{
    Client, Method, RequestBuilder, Response, Url,
    header::AUTHORIZATION,
    multipart::{Form, Part},
};
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::json;
use tracing::{debug, info, warn};

use super::{
    AuthSession, AuthStore, Collection, ListOptions, Payload, PayloadValue, Record, RecordId,
    RecordStore,
};
use crate::{
    error::{StoreError, StoreResult},
    form::Blob,
    identity::{Caller, Identity},
};

/// Configuration for the record store connection
#[derive(Debug, Clone)]
pub struct RecordStoreConfig {
    /// Base URL of the store (e.g., "http://127.0.0.1:8090")
    pub url: String,
    /// Request timeout in seconds
    pub timeout_seconds: u64,
}

impl RecordStoreConfig {
    /// Create a new RecordStoreConfig from environment variables
    ///
    /// # Environment Variables
    /// - `RECORD_STORE_URL`: Store URL (default: "http://127.0.0.1:8090")
    /// - `RECORD_STORE_TIMEOUT`: Request timeout in seconds (default: 10)
    pub fn from_env() -> Result<Self> {
        let url = std::env::var("RECORD_STORE_URL")
            .unwrap_or_else(|_| "http://127.0.0.1:8090".to_string());
        let timeout_seconds = std::env::var("RECORD_STORE_TIMEOUT")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .unwrap_or(10);

        Ok(RecordStoreConfig {
            url,
            timeout_seconds,
        })
    }

    /// Whether the in-process store was requested
    pub fn is_memory(&self) -> bool {
        self.url.starts_with("memory://")
    }
}

/// Error body returned by the store
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct Page {
    items: Vec<Record>,
}

#[derive(Debug, Deserialize)]
struct AuthBody {
    token: String,
    record: Record,
}

/// Record store reached over HTTP
#[derive(Clone)]
pub struct HttpRecordStore {
    client: Client,
    base_url: Url,
}

impl HttpRecordStore {
    pub fn new(config: &RecordStoreConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;
        let base_url = Url::parse(&config.url)?;
        info!("Record store client initialized with URL: {}", base_url);
        Ok(Self { client, base_url })
    }

    fn endpoint(&self, segments: &[&str]) -> StoreResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| StoreError::Transport(format!("invalid base url {}", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn records_url(&self, collection: Collection, id: Option<&RecordId>) -> StoreResult<Url> {
        match id {
            Some(id) => self.endpoint(&["api", "collections", collection.as_str(), "records", id.as_str()]),
            None => self.endpoint(&["api", "collections", collection.as_str(), "records"]),
        }
    }

    fn request(&self, method: Method, url: Url, caller: Caller<'_>) -> RequestBuilder {
        let builder = self.client.request(method, url);
        match caller {
            Caller::User(identity) => builder.header(AUTHORIZATION, identity.store_token()),
            Caller::Anonymous => builder,
        }
    }

    fn with_payload(builder: RequestBuilder, payload: Payload) -> StoreResult<RequestBuilder> {
        if !payload.has_files() {
            return Ok(builder.json(&payload.to_json()));
        }

        let mut form = Form::new();
        for (name, value) in payload.iter() {
            let name = name.to_string();
            form = match value {
                PayloadValue::Text(text) => form.text(name, text.clone()),
                PayloadValue::List(items) => items
                    .iter()
                    .fold(form, |form, item| form.text(name.clone(), item.clone())),
                PayloadValue::File(blob) => form.part(name, file_part(blob)?),
                PayloadValue::Files(blobs) => {
                    let mut form = form;
                    for blob in blobs {
                        form = form.part(name.clone(), file_part(blob)?);
                    }
                    form
                }
            };
        }
        Ok(builder.multipart(form))
    }

    async fn send(builder: RequestBuilder) -> StoreResult<Response> {
        let response = builder
            .send()
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let message = match response.json::<ErrorBody>().await {
            Ok(body) if !body.message.is_empty() => body.message,
            _ => status
                .canonical_reason()
                .unwrap_or("Unknown error")
                .to_string(),
        };
        warn!("Record store responded {}: {}", status, message);
        Err(StoreError::response(status.as_u16(), message))
    }

    async fn send_json<T: DeserializeOwned>(builder: RequestBuilder) -> StoreResult<T> {
        Self::send(builder)
            .await?
            .json::<T>()
            .await
            .map_err(|e| StoreError::Payload(e.to_string()))
    }
}

fn file_part(blob: &Blob) -> StoreResult<Part> {
    Part::bytes(blob.bytes().to_vec())
        .file_name(blob.filename().unwrap_or("upload").to_string())
        .mime_str(blob.content_type())
        .map_err(|e| StoreError::Payload(e.to_string()))
}

#[async_trait]
impl RecordStore for HttpRecordStore {
    async fn get_one(
        &self,
        caller: Caller<'_>,
        collection: Collection,
        id: &RecordId,
        expand: &[&str],
    ) -> StoreResult<Record> {
        let mut url = self.records_url(collection, Some(id))?;
        if !expand.is_empty() {
            url.query_pairs_mut().append_pair("expand", &expand.join(","));
        }
        Self::send_json(self.request(Method::GET, url, caller)).await
    }

    async fn get_full_list(
        &self,
        caller: Caller<'_>,
        collection: Collection,
        options: &ListOptions,
    ) -> StoreResult<Vec<Record>> {
        let mut records = Vec::new();
        let mut page = 1usize;
        let per_page = options.batch_size();

        loop {
            let mut url = self.records_url(collection, None)?;
            {
                let mut query = url.query_pairs_mut();
                query
                    .append_pair("page", &page.to_string())
                    .append_pair("perPage", &per_page.to_string())
                    .append_pair("skipTotal", "1");
                if let Some(filter) = &options.filter {
                    query.append_pair("filter", &filter.render());
                }
                if let Some(sort) = &options.sort {
                    query.append_pair("sort", &sort.render());
                }
                if !options.expand.is_empty() {
                    query.append_pair("expand", &options.expand.join(","));
                }
            }

            let batch: Page = Self::send_json(self.request(Method::GET, url, caller)).await?;
            let fetched = batch.items.len();
            records.extend(batch.items);
            if fetched < per_page {
                break;
            }
            page += 1;
        }

        debug!("Fetched {} {} record(s)", records.len(), collection);
        Ok(records)
    }

    async fn create(
        &self,
        caller: Caller<'_>,
        collection: Collection,
        payload: Payload,
    ) -> StoreResult<Record> {
        let url = self.records_url(collection, None)?;
        let builder = Self::with_payload(self.request(Method::POST, url, caller), payload)?;
        Self::send_json(builder).await
    }

    async fn update(
        &self,
        caller: Caller<'_>,
        collection: Collection,
        id: &RecordId,
        payload: Payload,
    ) -> StoreResult<Record> {
        let url = self.records_url(collection, Some(id))?;
        let builder = Self::with_payload(self.request(Method::PATCH, url, caller), payload)?;
        Self::send_json(builder).await
    }

    async fn delete(
        &self,
        caller: Caller<'_>,
        collection: Collection,
        id: &RecordId,
    ) -> StoreResult<()> {
        let url = self.records_url(collection, Some(id))?;
        Self::send(self.request(Method::DELETE, url, caller)).await?;
        Ok(())
    }
}

#[async_trait]
impl AuthStore for HttpRecordStore {
    async fn auth_with_password(&self, email: &str, password: &str) -> StoreResult<AuthSession> {
        let url = self.endpoint(&["api", "collections", "users", "auth-with-password"])?;
        let body: AuthBody = Self::send_json(
            self.request(Method::POST, url, Caller::Anonymous)
                .json(&json!({ "identity": email, "password": password })),
        )
        .await?;
        Ok(AuthSession {
            token: body.token,
            record: body.record,
        })
    }

    async fn request_verification(&self, email: &str) -> StoreResult<()> {
        let url = self.endpoint(&["api", "collections", "users", "request-verification"])?;
        Self::send(
            self.request(Method::POST, url, Caller::Anonymous)
                .json(&json!({ "email": email })),
        )
        .await?;
        Ok(())
    }

    async fn request_password_reset(&self, email: &str) -> StoreResult<()> {
        let url = self.endpoint(&["api", "collections", "users", "request-password-reset"])?;
        Self::send(
            self.request(Method::POST, url, Caller::Anonymous)
                .json(&json!({ "email": email })),
        )
        .await?;
        Ok(())
    }

    async fn request_email_change(&self, identity: &Identity, new_email: &str) -> StoreResult<()> {
        let url = self.endpoint(&["api", "collections", "users", "request-email-change"])?;
        Self::send(
            self.request(Method::POST, url, Caller::User(identity))
                .json(&json!({ "newEmail": new_email })),
        )
        .await?;
        Ok(())
    }
}
