//! Comment and reply schemas
//!
//! Ownership (author and project) is never read from the form; callers
//! attach it from the session and the route.

use crate::{
    form::FormData,
    store::RecordId,
    validation::{
        FieldErrors, Schema, Validator,
        constraints::{TextField, TextRule, length},
    },
};

static CONTENT_RULES: [TextRule; 1] = [length(
    2,
    240,
    "Comment must be at least 2 characters",
    "Comment must be less than 241 characters",
)];
static CONTENT: TextField = TextField::trimmed("content", "Content is required", &CONTENT_RULES);

/// Validated new comment, optionally a reply to `parent`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewComment {
    pub content: String,
    pub parent: Option<RecordId>,
}

#[derive(Debug)]
pub struct CreateComment {
    content: &'static TextField,
}

pub static CREATE_COMMENT: CreateComment = CreateComment { content: &CONTENT };

impl Schema for CreateComment {
    type Output = NewComment;

    fn name(&self) -> &'static str {
        "create_comment"
    }

    fn validate(&self, form: &FormData) -> Result<NewComment, FieldErrors> {
        let mut v = Validator::new(form);
        let content = v.required(self.content);
        let parent = v.optional_id("parentId", "Parent comment is invalid");

        match content {
            Some(content) if v.is_valid() => Ok(NewComment { content, parent }),
            _ => Err(v.into_errors()),
        }
    }
}

/// Validated edit of an existing comment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentEdit {
    pub id: RecordId,
    pub content: String,
}

#[derive(Debug)]
pub struct UpdateComment {
    content: &'static TextField,
}

pub static UPDATE_COMMENT: UpdateComment = UpdateComment { content: &CONTENT };

impl Schema for UpdateComment {
    type Output = CommentEdit;

    fn name(&self) -> &'static str {
        "update_comment"
    }

    fn validate(&self, form: &FormData) -> Result<CommentEdit, FieldErrors> {
        let mut v = Validator::new(form);
        let id = v.required_id("id", "An ID must be passed with the comment to update it");
        let content = v.required(self.content);

        match (id, content) {
            (Some(id), Some(content)) if v.is_valid() => Ok(CommentEdit { id, content }),
            _ => Err(v.into_errors()),
        }
    }
}

/// A comment targeted for deletion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentRef {
    pub id: RecordId,
}

#[derive(Debug)]
pub struct DeleteComment;

pub static DELETE_COMMENT: DeleteComment = DeleteComment;

impl Schema for DeleteComment {
    type Output = CommentRef;

    fn name(&self) -> &'static str {
        "delete_comment"
    }

    fn validate(&self, form: &FormData) -> Result<CommentRef, FieldErrors> {
        let mut v = Validator::new(form);
        let id = v.required_id("id", "An ID must be passed with the comment to delete it");

        match id {
            Some(id) if v.is_valid() => Ok(CommentRef { id }),
            _ => Err(v.into_errors()),
        }
    }
}

/// Validated reply: `comment` is the thread's parent, `reply` the comment answered
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewReply {
    pub content: String,
    pub comment: RecordId,
    pub reply: RecordId,
}

#[derive(Debug)]
pub struct CreateReply {
    content: &'static TextField,
}

pub static CREATE_REPLY: CreateReply = CreateReply { content: &CONTENT };

impl Schema for CreateReply {
    type Output = NewReply;

    fn name(&self) -> &'static str {
        "create_reply"
    }

    fn validate(&self, form: &FormData) -> Result<NewReply, FieldErrors> {
        let mut v = Validator::new(form);
        let content = v.required(self.content);
        let comment = v.required_id("comment", "Parent comment is required");
        let reply = v.required_id("reply", "Reply target is required");

        match (content, comment, reply) {
            (Some(content), Some(comment), Some(reply)) if v.is_valid() => Ok(NewReply {
                content,
                comment,
                reply,
            }),
            _ => Err(v.into_errors()),
        }
    }
}
