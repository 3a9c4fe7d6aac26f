//! Mutations of the session user's own account

use common::{
    error::ActionError,
    form::FormData,
    identity::Identity,
    store::{AccountStore, AuthStore, Collection, Filter, ListOptions, Payload, Record, RecordStore},
    validation::{
        FieldErrors, OptionalField, parse,
        schemas::user::{UPDATE_EMAIL, UPDATE_PASSWORD, UPDATE_PROFILE, UPDATE_USERNAME},
    },
};
use tracing::info;

use crate::{
    error::{AuthResult, redact, store_failure},
    models::Success,
};

pub const USERNAME_TAKEN: &str = "Username is already taken";

/// Write an optional field: absent stays untouched, blank clears it
fn set_optional(payload: Payload, name: &str, value: OptionalField<String>) -> Payload {
    match value {
        OptionalField::Absent => payload,
        OptionalField::Empty => payload.text(name, ""),
        OptionalField::Present(value) => payload.text(name, value),
    }
}

/// Update name, avatar, bio and links; returns the stored user
pub async fn update_profile(
    store: &dyn AccountStore,
    identity: &Identity,
    form: &FormData,
) -> AuthResult<Record> {
    let profile = parse(&UPDATE_PROFILE, form)?;
    info!("Updating profile of user {}", identity.user_id());

    let mut payload = Payload::new();
    if let Some(name) = profile.name {
        payload = payload.text("name", name);
    }
    if let Some(avatar) = profile.avatar {
        payload = payload.file("avatar", avatar);
    }
    payload = set_optional(payload, "bio", profile.bio);
    for (name, link) in [
        ("website", profile.website),
        ("twitter", profile.twitter),
        ("youtube", profile.youtube),
        ("github", profile.github),
    ] {
        payload = set_optional(payload, name, link.map(String::from));
    }

    let user = store
        .update(identity.into(), Collection::Users, identity.user_id(), payload)
        .await
        .map_err(store_failure("update_profile"))?;
    Ok(user)
}

/// Rename the session user, refusing names held by someone else
pub async fn update_username(
    store: &dyn AccountStore,
    identity: &Identity,
    form: &FormData,
) -> AuthResult<Success> {
    let change = parse(&UPDATE_USERNAME, form)?;

    let holders = store
        .get_full_list(
            identity.into(),
            Collection::Users,
            &ListOptions::new()
                .filter(Filter::eq("username", &change.username))
                .batch(1),
        )
        .await
        .map_err(store_failure("update_username"))?;
    if holders.iter().any(|user| user.id != *identity.user_id()) {
        let mut errors = FieldErrors::default();
        errors.add("username", USERNAME_TAKEN);
        return Err(ActionError::Invalid {
            data: form.echo(),
            errors,
        }
        .into());
    }

    info!("User {} changing username", identity.user_id());
    store
        .update(
            identity.into(),
            Collection::Users,
            identity.user_id(),
            Payload::new().text("username", change.username),
        )
        .await
        .map_err(store_failure("update_username"))?;

    Ok(Success::ok())
}

/// Ask the store to confirm a new email address
pub async fn update_email(
    store: &dyn AccountStore,
    identity: &Identity,
    form: &FormData,
) -> AuthResult<Success> {
    let target = parse(&UPDATE_EMAIL, form)?;
    info!("User {} requested an email change", identity.user_id());

    store
        .request_email_change(identity, &target.email)
        .await
        .map_err(store_failure("update_email"))?;

    Ok(Success::ok())
}

/// Change the password; the store checks the current one
pub async fn update_password(
    store: &dyn AccountStore,
    identity: &Identity,
    form: &FormData,
) -> AuthResult<Success> {
    let change = parse(&UPDATE_PASSWORD, form).map_err(redact)?;
    info!("User {} changing password", identity.user_id());

    let payload = Payload::new()
        .text("oldPassword", change.old_password)
        .text("password", change.password)
        .text("passwordConfirm", change.password_confirm);
    store
        .update(identity.into(), Collection::Users, identity.user_id(), payload)
        .await
        .map_err(store_failure("update_password"))?;

    Ok(Success::ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{actions::account::register, error::AuthError};
    use common::{
        form::Blob,
        identity::Caller,
        store::memory::{AuthRequest, InMemoryStore},
    };
    use serde_json::json;
    use tokio_test::assert_ok;

    /// Registered Jane with her store identity
    async fn jane(store: &InMemoryStore) -> Identity {
        let form = FormData::new()
            .with_text("name", "Jane Doe")
            .with_text("email", "jane@x.com")
            .with_text("password", "secret")
            .with_text("passwordConfirm", "secret");
        assert_ok!(register(store, &form).await);

        let session = store.auth_with_password("jane@x.com", "secret").await.unwrap();
        Identity::new(session.record.id, session.token)
    }

    #[tokio::test]
    async fn absent_fields_are_untouched_and_blank_ones_cleared() {
        let store = InMemoryStore::new();
        let identity = jane(&store).await;

        let first = FormData::new()
            .with_text("bio", "Builds things")
            .with_text("github", "https://github.com/jane");
        assert_ok!(update_profile(&store, &identity, &first).await);

        let second = FormData::new().with_text("github", "");
        let user = update_profile(&store, &identity, &second).await.unwrap();

        assert_eq!(user.text("bio"), Some("Builds things"));
        assert_eq!(user.text("github"), Some(""));
        assert_eq!(user.text("name"), Some("Jane Doe"));
    }

    #[tokio::test]
    async fn avatar_is_uploaded_as_a_file() {
        let store = InMemoryStore::new();
        let identity = jane(&store).await;

        let form = FormData::new().with_file(
            "avatar",
            Blob::new(vec![0u8; 50_000], "image/png").with_filename("me.png"),
        );
        let user = update_profile(&store, &identity, &form).await.unwrap();
        assert_eq!(user.text("avatar"), Some("me.png"));
    }

    #[tokio::test]
    async fn invalid_links_are_rejected_before_the_store() {
        let store = InMemoryStore::new();
        let identity = jane(&store).await;

        let form = FormData::new().with_text("website", "not a url");
        let err = update_profile(&store, &identity, &form).await.unwrap_err();
        assert_eq!(err.status().as_u16(), 400);
        assert!(matches!(err, AuthError::Action(ActionError::Invalid { .. })));
    }

    #[tokio::test]
    async fn usernames_held_by_others_are_refused() {
        let store = InMemoryStore::new();
        let identity = jane(&store).await;
        store
            .insert(
                Collection::Users,
                serde_json::from_value(json!({ "username": "taken_name" })).unwrap(),
            )
            .await;

        let taken = FormData::new().with_text("username", "taken_name");
        match update_username(&store, &identity, &taken).await.unwrap_err() {
            AuthError::Action(ActionError::Invalid { errors, .. }) => {
                assert_eq!(errors.get("username"), Some(&[USERNAME_TAKEN.to_string()][..]));
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let free = FormData::new().with_text("username", "jane_builds");
        assert_ok!(update_username(&store, &identity, &free).await);
        let me = store
            .get_one(Caller::User(&identity), Collection::Users, identity.user_id(), &[])
            .await
            .unwrap();
        assert_eq!(me.text("username"), Some("jane_builds"));
    }

    #[tokio::test]
    async fn email_change_is_requested_not_applied() {
        let store = InMemoryStore::new();
        let identity = jane(&store).await;

        let form = FormData::new().with_text("email", "jane@new.dev");
        assert_ok!(update_email(&store, &identity, &form).await);

        assert!(store.sent().await.contains(&AuthRequest::EmailChange {
            user: identity.user_id().clone(),
            new_email: "jane@new.dev".to_string(),
        }));
        let users = store.records(Collection::Users).await;
        assert_eq!(users[0].text("email"), Some("jane@x.com"));
    }

    #[tokio::test]
    async fn password_change_requires_the_current_password() {
        let store = InMemoryStore::new();
        let identity = jane(&store).await;

        let wrong = FormData::new()
            .with_text("oldPassword", "guessed")
            .with_text("password", "better-secret")
            .with_text("passwordConfirm", "better-secret");
        let err = update_password(&store, &identity, &wrong).await.unwrap_err();
        assert_eq!(err.status().as_u16(), 400);

        let right = FormData::new()
            .with_text("oldPassword", "secret")
            .with_text("password", "better-secret")
            .with_text("passwordConfirm", "better-secret");
        assert_ok!(update_password(&store, &identity, &right).await);
        assert!(store.auth_with_password("jane@x.com", "better-secret").await.is_ok());
    }
}
