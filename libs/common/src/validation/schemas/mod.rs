//! Schema registry
//!
//! One immutable schema per mutation, each a `static` built from the
//! constraint catalog.

pub mod comment;
pub mod project;
pub mod user;

use super::constraints::{
    FileRule, IMAGE_TYPES, MAX_IMAGE_BYTES, MIN_IMAGE_BYTES, file_size_between, mime_type_in,
};

const UNSUPPORTED_IMAGE: &str = "Unsupported file type. Supported formats: jpeg, jpg, png, webp, svg, gif";

/// Size and type rules shared by every image upload, differing only in the size message
const fn image_rules(size_message: &'static str) -> [FileRule; 2] {
    [
        file_size_between(MIN_IMAGE_BYTES, MAX_IMAGE_BYTES, size_message),
        mime_type_in(IMAGE_TYPES, UNSUPPORTED_IMAGE),
    ]
}
