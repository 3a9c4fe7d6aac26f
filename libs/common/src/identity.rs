//! Authenticated identity and the caller context passed to the record store

use crate::store::RecordId;

/// The authenticated user behind a request
///
/// Ownership fields of every mutation are taken from here, never from the
/// submitted form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    user_id: RecordId,
    store_token: String,
}

impl Identity {
    /// Create an identity for `user_id`, authenticated against the store with `store_token`
    pub fn new(user_id: RecordId, store_token: impl Into<String>) -> Self {
        Self {
            user_id,
            store_token: store_token.into(),
        }
    }

    pub fn user_id(&self) -> &RecordId {
        &self.user_id
    }

    /// Token forwarded to the record store so its access rules apply to this user
    pub fn store_token(&self) -> &str {
        &self.store_token
    }
}

/// On whose behalf a record-store call is made
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Caller<'a> {
    Anonymous,
    User(&'a Identity),
}

impl Caller<'_> {
    /// User id of the caller, if authenticated
    pub fn user_id(&self) -> Option<&RecordId> {
        match self {
            Caller::Anonymous => None,
            Caller::User(identity) => Some(identity.user_id()),
        }
    }
}

impl<'a> From<&'a Identity> for Caller<'a> {
    fn from(identity: &'a Identity) -> Self {
        Caller::User(identity)
    }
}
