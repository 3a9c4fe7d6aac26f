//! Record store contract
//!
//! The showcase persists everything in an external record store that offers
//! CRUD, filtered full-list reads and relation expansion per collection.
//! [`http::HttpRecordStore`] talks to a PocketBase-compatible server;
//! [`memory::InMemoryStore`] keeps records in process.

pub mod http;
pub mod memory;
mod query;
mod record;

use async_trait::async_trait;

use crate::{
    error::StoreResult,
    identity::{Caller, Identity},
};

pub use query::{DEFAULT_BATCH, Filter, ListOptions, Sort};
pub use record::{Collection, Payload, PayloadValue, Record, RecordId};

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Fetch one record, expanding the named relations
    async fn get_one(
        &self,
        caller: Caller<'_>,
        collection: Collection,
        id: &RecordId,
        expand: &[&str],
    ) -> StoreResult<Record>;

    /// Fetch every record matching `options`, page by page
    async fn get_full_list(
        &self,
        caller: Caller<'_>,
        collection: Collection,
        options: &ListOptions,
    ) -> StoreResult<Vec<Record>>;

    async fn create(
        &self,
        caller: Caller<'_>,
        collection: Collection,
        payload: Payload,
    ) -> StoreResult<Record>;

    async fn update(
        &self,
        caller: Caller<'_>,
        collection: Collection,
        id: &RecordId,
        payload: Payload,
    ) -> StoreResult<Record>;

    async fn delete(
        &self,
        caller: Caller<'_>,
        collection: Collection,
        id: &RecordId,
    ) -> StoreResult<()>;
}

/// Result of a successful password authentication
#[derive(Debug, Clone, PartialEq)]
pub struct AuthSession {
    /// Token the store expects on later calls made for this user
    pub token: String,
    pub record: Record,
}

/// Account operations of the `users` collection
#[async_trait]
pub trait AuthStore: Send + Sync {
    async fn auth_with_password(&self, email: &str, password: &str) -> StoreResult<AuthSession>;

    async fn request_verification(&self, email: &str) -> StoreResult<()>;

    async fn request_password_reset(&self, email: &str) -> StoreResult<()>;

    async fn request_email_change(&self, identity: &Identity, new_email: &str) -> StoreResult<()>;
}

/// A store offering both record access and account operations
pub trait AccountStore: RecordStore + AuthStore {}

impl<T: RecordStore + AuthStore> AccountStore for T {}
