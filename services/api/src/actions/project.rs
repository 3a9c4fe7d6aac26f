//! Project reads and mutations

use common::{
    form::FormData,
    identity::{Caller, Identity},
    store::{Collection, Filter, ListOptions, Payload, Record, RecordId, RecordStore},
    validation::{
        parse,
        schemas::project::{
            CREATE_PROJECT, UPDATE_PROJECT_IMAGES, UPDATE_PROJECT_TAGS, UPDATE_PROJECT_THUMBNAIL,
        },
    },
};
use serde_json::Value;
use tracing::info;

use crate::{
    error::{ApiResult, GENERIC_FAILURE, store_failure},
    models::{ProjectDetail, Success},
};

/// Back-relation listing the votes of a project
pub const VOTES_RELATION: &str = "votes(project)";

/// Load a project with its votes, and its comments with their authors
pub async fn project_detail(store: &dyn RecordStore, project_id: &RecordId) -> ApiResult<ProjectDetail> {
    let mut project = store
        .get_one(
            Caller::Anonymous,
            Collection::Projects,
            project_id,
            &[VOTES_RELATION],
        )
        .await
        .map_err(store_failure("project_detail", GENERIC_FAILURE))?;

    // A project without votes comes back without the expansion
    project
        .expand
        .entry(VOTES_RELATION)
        .or_insert_with(|| Value::Array(Vec::new()));

    let comments = store
        .get_full_list(
            Caller::Anonymous,
            Collection::Comments,
            &ListOptions::new()
                .filter(Filter::eq("project", project_id))
                .expand("user"),
        )
        .await
        .map_err(store_failure("project_detail", GENERIC_FAILURE))?;

    Ok(ProjectDetail { project, comments })
}

/// Create a project owned by `identity`
pub async fn create_project(
    store: &dyn RecordStore,
    identity: &Identity,
    form: &FormData,
) -> ApiResult<Record> {
    let project = parse(&CREATE_PROJECT, form)?;
    info!("Creating project for user {}", identity.user_id());

    let mut payload = Payload::new()
        .text("name", project.name)
        .text("tagline", project.tagline)
        .text("url", project.url.as_str())
        .text("description", project.description)
        .text("user", identity.user_id().as_str());
    if let Some(thumbnail) = project.thumbnail {
        payload = payload.file("thumbnail", thumbnail);
    }

    store
        .create(identity.into(), Collection::Projects, payload)
        .await
        .map_err(store_failure("create_project", GENERIC_FAILURE))
}

/// Replace the project's technology and topic tags
pub async fn update_tags(
    store: &dyn RecordStore,
    identity: &Identity,
    project_id: &RecordId,
    form: &FormData,
) -> ApiResult<Success> {
    let tags = parse(&UPDATE_PROJECT_TAGS, form)?;
    info!(
        "Updating tags of project {} ({} technologies, {} topics)",
        project_id,
        tags.technologies.len(),
        tags.topics.len()
    );

    let payload = Payload::new()
        .list("technologies", tags.technologies)
        .list("topics", tags.topics);
    store
        .update(identity.into(), Collection::Projects, project_id, payload)
        .await
        .map_err(store_failure("update_tags", GENERIC_FAILURE))?;

    Ok(Success::ok())
}

/// Replace the project's gallery images
pub async fn update_images(
    store: &dyn RecordStore,
    identity: &Identity,
    project_id: &RecordId,
    form: &FormData,
) -> ApiResult<Success> {
    let images = parse(&UPDATE_PROJECT_IMAGES, form)?;
    info!("Uploading {} image(s) to project {}", images.images.len(), project_id);

    store
        .update(
            identity.into(),
            Collection::Projects,
            project_id,
            Payload::new().files("images", images.images),
        )
        .await
        .map_err(store_failure("update_images", GENERIC_FAILURE))?;

    Ok(Success::ok())
}

/// Replace the project's thumbnail
pub async fn update_thumbnail(
    store: &dyn RecordStore,
    identity: &Identity,
    project_id: &RecordId,
    form: &FormData,
) -> ApiResult<Success> {
    let thumbnail = parse(&UPDATE_PROJECT_THUMBNAIL, form)?;
    info!("Replacing thumbnail of project {}", project_id);

    store
        .update(
            identity.into(),
            Collection::Projects,
            project_id,
            Payload::new().file("thumbnail", thumbnail.thumbnail),
        )
        .await
        .map_err(store_failure("update_thumbnail", GENERIC_FAILURE))?;

    Ok(Success::ok())
}
