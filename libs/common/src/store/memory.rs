//! In-process record store
//!
//! Mirrors the access rules the showcase configures on the remote store:
//! anyone may read, only authenticated users may create, and only the owner
//! of a record may change or delete it (others get a 404). Useful for local
//! runs (`RECORD_STORE_URL=memory://`) and for tests.

use std::{
    collections::{HashMap, VecDeque},
    sync::Arc,
};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde_json::{Map, Value};
use tokio::sync::Mutex;
use tracing::debug;

use super::{
    AuthSession, AuthStore, Collection, ListOptions, Payload, PayloadValue, Record, RecordId,
    RecordStore,
};
use crate::{
    error::{StoreError, StoreResult},
    form::Blob,
    identity::{Caller, Identity},
};

/// Account mail the store would have sent
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthRequest {
    Verification { email: String },
    PasswordReset { email: String },
    EmailChange { user: RecordId, new_email: String },
}

#[derive(Default)]
struct State {
    sequence: u64,
    last_created: Option<DateTime<Utc>>,
    collections: HashMap<Collection, Vec<Record>>,
    passwords: HashMap<RecordId, String>,
    failures: VecDeque<StoreError>,
    outbox: Vec<AuthRequest>,
}

impl State {
    fn next_id(&mut self) -> RecordId {
        self.sequence += 1;
        RecordId::generated(format!("r{:014}", self.sequence))
    }

    /// Strictly increasing so `-created` ordering is deterministic
    fn next_timestamp(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let timestamp = match self.last_created {
            Some(last) if now <= last => last + Duration::milliseconds(1),
            _ => now,
        };
        self.last_created = Some(timestamp);
        timestamp
    }

    fn take_failure(&mut self) -> StoreResult<()> {
        match self.failures.pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn records(&self, collection: Collection) -> &[Record] {
        self.collections
            .get(&collection)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    fn find(&self, collection: Collection, id: &RecordId) -> Option<&Record> {
        self.records(collection).iter().find(|record| record.id == *id)
    }

    fn position_owned_by(
        &self,
        caller: Caller<'_>,
        collection: Collection,
        id: &RecordId,
    ) -> StoreResult<usize> {
        let caller = caller.user_id().ok_or_else(StoreError::not_found)?;
        let records = self.records(collection);
        let index = records
            .iter()
            .position(|record| record.id == *id)
            .ok_or_else(StoreError::not_found)?;

        let owner = match collection {
            Collection::Users => Some(records[index].id.clone()),
            _ => records[index].relation("user"),
        };
        if owner.as_ref() == Some(caller) {
            Ok(index)
        } else {
            Err(StoreError::not_found())
        }
    }

    fn expand(&self, record: &Record, relations: &[&str]) -> Record {
        let mut expanded = record.clone();
        for relation in relations {
            let value = match back_relation(relation) {
                Some((collection, field)) => {
                    let related: Vec<Value> = self
                        .records(collection)
                        .iter()
                        .filter(|candidate| candidate.relation(field).as_ref() == Some(&record.id))
                        .filter_map(|candidate| serde_json::to_value(candidate).ok())
                        .collect();
                    (!related.is_empty()).then_some(Value::Array(related))
                }
                None => forward_collection(relation)
                    .zip(record.relation(relation))
                    .and_then(|(collection, id)| self.find(collection, &id))
                    .and_then(|related| serde_json::to_value(related).ok()),
            };
            if let Some(value) = value {
                expanded.expand.insert(relation.to_string(), value);
            }
        }
        expanded
    }

    fn ensure_unique(
        &self,
        field: &str,
        value: Option<&str>,
        except: Option<&RecordId>,
    ) -> StoreResult<()> {
        let Some(value) = value else {
            return Ok(());
        };
        let taken = self.records(Collection::Users).iter().any(|user| {
            Some(&user.id) != except && user.text(field).is_some_and(|existing| existing == value)
        });
        if taken {
            Err(StoreError::response(
                400,
                format!("The {field} is invalid or already in use."),
            ))
        } else {
            Ok(())
        }
    }
}

/// `votes(project)` → (votes, project)
fn back_relation(relation: &str) -> Option<(Collection, &str)> {
    let (collection, field) = relation.strip_suffix(')')?.split_once('(')?;
    let collection = match collection {
        "users" => Collection::Users,
        "projects" => Collection::Projects,
        "votes" => Collection::Votes,
        "comments" => Collection::Comments,
        _ => return None,
    };
    Some((collection, field))
}

fn forward_collection(field: &str) -> Option<Collection> {
    match field {
        "user" => Some(Collection::Users),
        "project" => Some(Collection::Projects),
        "parentId" | "replyTo" => Some(Collection::Comments),
        _ => None,
    }
}

fn stored_name(blob: &Blob) -> Value {
    Value::String(blob.filename().unwrap_or("upload").to_string())
}

fn write_fields(fields: &mut Map<String, Value>, payload: &Payload) {
    for (name, value) in payload.iter() {
        let value = match value {
            PayloadValue::Text(text) => Value::String(text.clone()),
            PayloadValue::List(items) => Value::Array(items.iter().cloned().map(Value::String).collect()),
            PayloadValue::File(blob) => stored_name(blob),
            PayloadValue::Files(blobs) => Value::Array(blobs.iter().map(stored_name).collect()),
        };
        fields.insert(name.to_string(), value);
    }
}

fn payload_text<'a>(payload: &'a Payload, name: &str) -> Option<&'a str> {
    match payload.get(name) {
        Some(PayloadValue::Text(text)) => Some(text.as_str()),
        _ => None,
    }
}

/// Record store kept in process memory
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<State>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next store call fail with `err`
    pub async fn fail_next(&self, err: StoreError) {
        self.state.lock().await.failures.push_back(err);
    }

    /// Insert a record directly, bypassing access rules
    pub async fn insert(&self, collection: Collection, fields: Map<String, Value>) -> Record {
        let mut state = self.state.lock().await;
        let created = state.next_timestamp();
        let record = Record {
            id: state.next_id(),
            created,
            updated: created,
            expand: Map::new(),
            fields,
        };
        state
            .collections
            .entry(collection)
            .or_default()
            .push(record.clone());
        record
    }

    /// Snapshot of a collection in insertion order
    pub async fn records(&self, collection: Collection) -> Vec<Record> {
        self.state.lock().await.records(collection).to_vec()
    }

    /// Mark a user as having confirmed their email
    pub async fn verify(&self, user: &RecordId) {
        let mut state = self.state.lock().await;
        if let Some(record) = state
            .collections
            .entry(Collection::Users)
            .or_default()
            .iter_mut()
            .find(|record| record.id == *user)
        {
            record.fields.insert("verified".to_string(), Value::Bool(true));
        }
    }

    /// Account mail requested so far
    pub async fn sent(&self) -> Vec<AuthRequest> {
        self.state.lock().await.outbox.clone()
    }

    fn create_user(state: &mut State, payload: &Payload) -> StoreResult<Map<String, Value>> {
        let password = payload_text(payload, "password").unwrap_or_default();
        if password.is_empty() || payload_text(payload, "passwordConfirm") != Some(password) {
            return Err(StoreError::response(400, "Failed to create record."));
        }
        state.ensure_unique("email", payload_text(payload, "email"), None)?;
        state.ensure_unique("username", payload_text(payload, "username"), None)?;

        let mut fields = Map::new();
        write_fields(&mut fields, payload);
        for secret in ["password", "passwordConfirm"] {
            fields.remove(secret);
        }
        fields.insert("verified".to_string(), Value::Bool(false));
        Ok(fields)
    }

    fn update_user(state: &mut State, id: &RecordId, payload: &Payload) -> StoreResult<Map<String, Value>> {
        state.ensure_unique("email", payload_text(payload, "email"), Some(id))?;
        state.ensure_unique("username", payload_text(payload, "username"), Some(id))?;

        let mut changes = Map::new();
        write_fields(&mut changes, payload);
        for secret in ["password", "passwordConfirm", "oldPassword"] {
            changes.remove(secret);
        }

        if let Some(password) = payload_text(payload, "password") {
            let current = state.passwords.get(id).map(String::as_str);
            if payload_text(payload, "oldPassword") != current
                || payload_text(payload, "passwordConfirm") != Some(password)
            {
                return Err(StoreError::response(400, "Failed to update record."));
            }
            state.passwords.insert(id.clone(), password.to_string());
        }
        Ok(changes)
    }
}

#[async_trait]
impl RecordStore for InMemoryStore {
    async fn get_one(
        &self,
        _caller: Caller<'_>,
        collection: Collection,
        id: &RecordId,
        expand: &[&str],
    ) -> StoreResult<Record> {
        let mut state = self.state.lock().await;
        state.take_failure()?;
        let record = state.find(collection, id).ok_or_else(StoreError::not_found)?;
        Ok(state.expand(record, expand))
    }

    async fn get_full_list(
        &self,
        _caller: Caller<'_>,
        collection: Collection,
        options: &ListOptions,
    ) -> StoreResult<Vec<Record>> {
        let mut state = self.state.lock().await;
        state.take_failure()?;

        let mut records: Vec<&Record> = state
            .records(collection)
            .iter()
            .filter(|record| options.filter.as_ref().is_none_or(|filter| filter.matches(record)))
            .collect();
        if let Some(sort) = &options.sort {
            records.sort_by(|a, b| sort.compare(a, b));
        }

        let relations: Vec<&str> = options.expand.iter().map(String::as_str).collect();
        Ok(records
            .into_iter()
            .map(|record| state.expand(record, &relations))
            .collect())
    }

    async fn create(
        &self,
        caller: Caller<'_>,
        collection: Collection,
        payload: Payload,
    ) -> StoreResult<Record> {
        let mut state = self.state.lock().await;
        state.take_failure()?;

        let fields = match collection {
            Collection::Users => Self::create_user(&mut state, &payload)?,
            _ => {
                if caller.user_id().is_none() {
                    return Err(StoreError::response(
                        403,
                        "Only authenticated users can perform this action.",
                    ));
                }
                let mut fields = Map::new();
                write_fields(&mut fields, &payload);
                fields
            }
        };

        let created = state.next_timestamp();
        let record = Record {
            id: state.next_id(),
            created,
            updated: created,
            expand: Map::new(),
            fields,
        };
        if let (Collection::Users, Some(password)) = (collection, payload_text(&payload, "password")) {
            state.passwords.insert(record.id.clone(), password.to_string());
        }
        state
            .collections
            .entry(collection)
            .or_default()
            .push(record.clone());
        debug!("Created {} record {}", collection, record.id);
        Ok(record)
    }

    async fn update(
        &self,
        caller: Caller<'_>,
        collection: Collection,
        id: &RecordId,
        payload: Payload,
    ) -> StoreResult<Record> {
        let mut state = self.state.lock().await;
        state.take_failure()?;

        let index = state.position_owned_by(caller, collection, id)?;
        let changes = match collection {
            Collection::Users => Self::update_user(&mut state, id, &payload)?,
            _ => {
                let mut changes = Map::new();
                write_fields(&mut changes, &payload);
                changes
            }
        };

        let updated = Utc::now();
        let record = &mut state.collections.entry(collection).or_default()[index];
        record.fields.extend(changes);
        record.updated = updated;
        Ok(record.clone())
    }

    async fn delete(
        &self,
        caller: Caller<'_>,
        collection: Collection,
        id: &RecordId,
    ) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        state.take_failure()?;

        let index = state.position_owned_by(caller, collection, id)?;
        state.collections.entry(collection).or_default().remove(index);
        debug!("Deleted {} record {}", collection, id);
        Ok(())
    }
}

#[async_trait]
impl AuthStore for InMemoryStore {
    async fn auth_with_password(&self, email: &str, password: &str) -> StoreResult<AuthSession> {
        let mut state = self.state.lock().await;
        state.take_failure()?;

        let record = state
            .records(Collection::Users)
            .iter()
            .find(|user| {
                user.text("email") == Some(email)
                    && state.passwords.get(&user.id).map(String::as_str) == Some(password)
            })
            .cloned()
            .ok_or_else(|| StoreError::response(400, "Failed to authenticate."))?;

        Ok(AuthSession {
            token: format!("memory:{}", record.id),
            record,
        })
    }

    async fn request_verification(&self, email: &str) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        state.take_failure()?;
        state.outbox.push(AuthRequest::Verification {
            email: email.to_string(),
        });
        Ok(())
    }

    async fn request_password_reset(&self, email: &str) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        state.take_failure()?;
        state.outbox.push(AuthRequest::PasswordReset {
            email: email.to_string(),
        });
        Ok(())
    }

    async fn request_email_change(&self, identity: &Identity, new_email: &str) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        state.take_failure()?;
        state.ensure_unique("email", Some(new_email), Some(identity.user_id()))?;
        state.outbox.push(AuthRequest::EmailChange {
            user: identity.user_id().clone(),
            new_email: new_email.to_string(),
        });
        Ok(())
    }
}
