//! Comment mutations

use common::{
    form::FormData,
    identity::Identity,
    store::{Collection, Payload, RecordId, RecordStore},
    validation::{
        parse,
        schemas::comment::{CREATE_COMMENT, CREATE_REPLY, DELETE_COMMENT, UPDATE_COMMENT},
    },
};
use tracing::info;

use crate::{
    error::{ApiResult, GENERIC_FAILURE, store_failure},
    models::Success,
};

/// Comment on `project_id` as the session user
pub async fn create_comment(
    store: &dyn RecordStore,
    identity: &Identity,
    project_id: &RecordId,
    form: &FormData,
) -> ApiResult<Success> {
    let comment = parse(&CREATE_COMMENT, form)?;
    info!("User {} commenting on project {}", identity.user_id(), project_id);

    let mut payload = Payload::new()
        .text("content", comment.content)
        .text("project", project_id.as_str())
        .text("user", identity.user_id().as_str());
    if let Some(parent) = comment.parent {
        payload = payload.text("parentId", parent.as_str());
    }

    store
        .create(identity.into(), Collection::Comments, payload)
        .await
        .map_err(store_failure("create_comment", GENERIC_FAILURE))?;

    Ok(Success::ok())
}

/// Edit the content of one of the session user's comments
pub async fn update_comment(
    store: &dyn RecordStore,
    identity: &Identity,
    project_id: &RecordId,
    form: &FormData,
) -> ApiResult<Success> {
    let edit = parse(&UPDATE_COMMENT, form)?;
    info!("User {} editing comment {} on project {}", identity.user_id(), edit.id, project_id);

    store
        .update(
            identity.into(),
            Collection::Comments,
            &edit.id,
            Payload::new().text("content", edit.content),
        )
        .await
        .map_err(store_failure("update_comment", GENERIC_FAILURE))?;

    Ok(Success::ok())
}

/// Delete one of the session user's comments
pub async fn delete_comment(
    store: &dyn RecordStore,
    identity: &Identity,
    form: &FormData,
) -> ApiResult<Success> {
    let target = parse(&DELETE_COMMENT, form)?;
    info!("User {} deleting comment {}", identity.user_id(), target.id);

    store
        .delete(identity.into(), Collection::Comments, &target.id)
        .await
        .map_err(store_failure("delete_comment", GENERIC_FAILURE))?;

    Ok(Success::ok())
}

/// Reply within a comment thread
pub async fn create_reply(
    store: &dyn RecordStore,
    identity: &Identity,
    project_id: &RecordId,
    form: &FormData,
) -> ApiResult<Success> {
    let reply = parse(&CREATE_REPLY, form)?;
    info!(
        "User {} replying to comment {} on project {}",
        identity.user_id(),
        reply.reply,
        project_id
    );

    let payload = Payload::new()
        .text("content", reply.content)
        .text("project", project_id.as_str())
        .text("user", identity.user_id().as_str())
        .text("parentId", reply.comment.as_str())
        .text("replyTo", reply.reply.as_str());

    store
        .create(identity.into(), Collection::Comments, payload)
        .await
        .map_err(store_failure("create_reply", GENERIC_FAILURE))?;

    Ok(Success::ok())
}
