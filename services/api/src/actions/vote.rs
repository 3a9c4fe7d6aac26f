//! Vote toggle
//!
//! Voting twice on the same project undoes the first vote. The lookup and
//! the create/delete are separate store calls, so the whole sequence runs
//! while holding the `(user, project)` key of the vote lock.

use common::{
    error::{ActionError, StoreResult},
    identity::Identity,
    lock::KeyedLock,
    store::{Collection, Filter, ListOptions, Payload, RecordId, RecordStore, Sort},
};
use tracing::{error, info, warn};

use crate::{error::ApiResult, models::VoteState};

/// Message returned for any failed toggle
pub const VOTE_FAILURE: &str = "Something went wrong with voting.";

/// Lock key serializing the votes of `user` on `project`
pub fn vote_key(user: &RecordId, project: &RecordId) -> String {
    format!("vote:{user}:{project}")
}

/// Flip the session user's vote on `project_id`
pub async fn toggle_vote(
    store: &dyn RecordStore,
    lock: &dyn KeyedLock,
    identity: &Identity,
    project_id: &RecordId,
) -> ApiResult<VoteState> {
    let key = vote_key(identity.user_id(), project_id);
    let guard = lock.acquire(&key).await.map_err(|e| {
        error!("Failed to acquire vote lock: {}", e);
        ActionError::Internal(VOTE_FAILURE)
    })?;

    let outcome = apply_toggle(store, identity, project_id).await;

    if let Err(e) = lock.release(guard).await {
        warn!("Failed to release vote lock {}: {}", key, e);
    }

    let state = outcome.map_err(|e| {
        error!("Vote toggle failed: {}", e);
        ActionError::Internal(VOTE_FAILURE)
    })?;
    info!("User {} {:?} project {}", identity.user_id(), state, project_id);
    Ok(state)
}

async fn apply_toggle(
    store: &dyn RecordStore,
    identity: &Identity,
    project_id: &RecordId,
) -> StoreResult<VoteState> {
    let options = ListOptions::new()
        .filter(Filter::eq("user", identity.user_id()).and("project", project_id))
        .sort(Sort::desc("created"));
    let existing = store
        .get_full_list(identity.into(), Collection::Votes, &options)
        .await?;

    match existing.first() {
        None => {
            let payload = Payload::new()
                .text("user", identity.user_id().as_str())
                .text("project", project_id.as_str());
            store
                .create(identity.into(), Collection::Votes, payload)
                .await?;
            Ok(VoteState::Voted)
        }
        Some(latest) => {
            if existing.len() > 1 {
                warn!(
                    "Found {} votes by user {} on project {}",
                    existing.len(),
                    identity.user_id(),
                    project_id
                );
            }
            store
                .delete(identity.into(), Collection::Votes, &latest.id)
                .await?;
            Ok(VoteState::Unvoted)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use common::{
        error::StoreError,
        lock::{LocalLock, LockConfig},
        store::memory::InMemoryStore,
    };
    use serde_json::{Map, json};
    use tokio_test::assert_ok;

    async fn setup() -> (InMemoryStore, LocalLock, Identity, RecordId) {
        let store = InMemoryStore::new();
        let user = store.insert(Collection::Users, Map::new()).await;
        let project = store.insert(Collection::Projects, Map::new()).await;
        (
            store,
            LocalLock::new(&LockConfig::default()),
            Identity::new(user.id, "memory-token"),
            project.id,
        )
    }

    #[tokio::test]
    async fn voting_twice_removes_the_vote() {
        let (store, lock, identity, project) = setup().await;

        let first = assert_ok!(toggle_vote(&store, &lock, &identity, &project).await);
        assert_eq!(first, VoteState::Voted);
        let votes = store.records(Collection::Votes).await;
        assert_eq!(votes.len(), 1);
        assert_eq!(votes[0].relation("user").as_ref(), Some(identity.user_id()));
        assert_eq!(votes[0].relation("project"), Some(project.clone()));

        let second = assert_ok!(toggle_vote(&store, &lock, &identity, &project).await);
        assert_eq!(second, VoteState::Unvoted);
        assert!(store.records(Collection::Votes).await.is_empty());
        assert_eq!(lock.tracked().await, 0);
    }

    #[tokio::test]
    async fn votes_of_other_users_are_untouched() {
        let (store, lock, identity, project) = setup().await;
        let other = store.insert(Collection::Users, Map::new()).await;
        let other = Identity::new(other.id, "memory-token");

        assert_ok!(toggle_vote(&store, &lock, &other, &project).await);
        assert_ok!(toggle_vote(&store, &lock, &identity, &project).await);
        assert_ok!(toggle_vote(&store, &lock, &identity, &project).await);

        let votes = store.records(Collection::Votes).await;
        assert_eq!(votes.len(), 1);
        assert_eq!(votes[0].relation("user").as_ref(), Some(other.user_id()));
    }

    #[tokio::test]
    async fn duplicate_votes_lose_the_most_recent_first() {
        let (store, lock, identity, project) = setup().await;
        let fields = |n: u8| {
            serde_json::from_value::<Map<String, serde_json::Value>>(json!({
                "user": identity.user_id(),
                "project": project,
                "n": n,
            }))
            .unwrap()
        };
        store.insert(Collection::Votes, fields(1)).await;
        store.insert(Collection::Votes, fields(2)).await;

        assert_ok!(toggle_vote(&store, &lock, &identity, &project).await);
        let left = store.records(Collection::Votes).await;
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].fields["n"], json!(1));
    }

    #[tokio::test]
    async fn concurrent_toggles_never_leave_duplicates() {
        let (store, lock, identity, project) = setup().await;
        let store = Arc::new(store);
        let lock = Arc::new(lock);

        let mut handles = Vec::new();
        for _ in 0..5 {
            let (store, lock) = (store.clone(), lock.clone());
            let (identity, project) = (identity.clone(), project.clone());
            handles.push(tokio::spawn(async move {
                toggle_vote(store.as_ref(), lock.as_ref(), &identity, &project).await
            }));
        }
        for handle in handles {
            assert_ok!(handle.await.unwrap());
        }

        // five flips from unvoted end voted
        assert_eq!(store.records(Collection::Votes).await.len(), 1);
    }

    #[tokio::test]
    async fn store_failures_become_the_vote_failure() {
        let (store, lock, identity, project) = setup().await;
        store
            .fail_next(StoreError::response(400, "Failed to load votes"))
            .await;

        let err = toggle_vote(&store, &lock, &identity, &project)
            .await
            .unwrap_err();
        assert_eq!(err.status().as_u16(), 500);
        assert_eq!(err.to_string(), VOTE_FAILURE);
        assert_eq!(lock.tracked().await, 0);
    }

    #[tokio::test]
    async fn a_held_key_times_out_as_the_vote_failure() {
        let (store, _, identity, project) = setup().await;
        let lock = LocalLock::new(&LockConfig {
            ttl_ms: 5_000,
            wait_ms: 20,
        });
        let held = lock
            .acquire(&vote_key(identity.user_id(), &project))
            .await
            .unwrap();

        let err = toggle_vote(&store, &lock, &identity, &project)
            .await
            .unwrap_err();
        assert!(matches!(err, ActionError::Internal(VOTE_FAILURE)));
        lock.release(held).await.unwrap();
    }

    #[test]
    fn keys_are_scoped_to_user_and_project() {
        let user = RecordId::parse("u1").unwrap();
        let project = RecordId::parse("p1").unwrap();
        assert_eq!(vote_key(&user, &project), "vote:u1:p1");
    }
}
