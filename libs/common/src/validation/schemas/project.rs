//! Project schemas: creation, tags, images and thumbnail

use reqwest::Url;

use super::image_rules;
use crate::{
    form::{Blob, FormData},
    validation::{
        FieldErrors, Schema, Validator,
        constraints::{FileField, FileRule, TextField, TextRule, length, url_format},
    },
};

static NAME_RULES: [TextRule; 1] = [length(
    1,
    40,
    "Name is required",
    "Name must be 40 characters or less",
)];
static TAGLINE_RULES: [TextRule; 1] = [length(
    1,
    60,
    "Tagline is required",
    "Tagline must be 60 characters or less",
)];
static URL_RULES: [TextRule; 1] = [url_format("URL must be a valid URL.")];
static DESCRIPTION_RULES: [TextRule; 1] = [length(
    1,
    240,
    "Description is required",
    "Description must be less than 240 characters",
)];
static THUMBNAIL_RULES: [FileRule; 2] = image_rules("Thumbnail must be between 10KB & 2MB");
static IMAGES_RULES: [FileRule; 2] = image_rules("Images must be between 10KB & 2MB");

/// Validated project creation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProject {
    pub name: String,
    pub tagline: String,
    pub url: Url,
    pub description: String,
    pub thumbnail: Option<Blob>,
}

#[derive(Debug)]
pub struct CreateProject {
    name: TextField,
    tagline: TextField,
    url: TextField,
    description: TextField,
    thumbnail: FileField,
}

pub static CREATE_PROJECT: CreateProject = CreateProject {
    name: TextField::trimmed("name", "Name is required", &NAME_RULES),
    tagline: TextField::trimmed("tagline", "Tagline is required", &TAGLINE_RULES),
    url: TextField::new("url", "URL is required", &URL_RULES),
    description: TextField::trimmed("description", "Description is required", &DESCRIPTION_RULES),
    thumbnail: FileField::new("thumbnail", &THUMBNAIL_RULES),
};

impl Schema for CreateProject {
    type Output = NewProject;

    fn name(&self) -> &'static str {
        "create_project"
    }

    fn validate(&self, form: &FormData) -> Result<NewProject, FieldErrors> {
        let mut v = Validator::new(form);
        let name = v.required(&self.name);
        let tagline = v.required(&self.tagline);
        let url = v.required_url(&self.url);
        let description = v.required(&self.description);
        let thumbnail = v.optional_file(&self.thumbnail);

        match (name, tagline, url, description) {
            (Some(name), Some(tagline), Some(url), Some(description)) if v.is_valid() => {
                Ok(NewProject {
                    name,
                    tagline,
                    url,
                    description,
                    thumbnail,
                })
            }
            _ => Err(v.into_errors()),
        }
    }
}

/// Validated tag collections; each is a set, submission order kept
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectTags {
    pub technologies: Vec<String>,
    pub topics: Vec<String>,
}

#[derive(Debug)]
pub struct UpdateProjectTags;

pub static UPDATE_PROJECT_TAGS: UpdateProjectTags = UpdateProjectTags;

impl Schema for UpdateProjectTags {
    type Output = ProjectTags;

    fn name(&self) -> &'static str {
        "update_project_tags"
    }

    fn validate(&self, form: &FormData) -> Result<ProjectTags, FieldErrors> {
        let mut v = Validator::new(form);
        let technologies = v.repeated("technologies");
        let topics = v.repeated("topics");

        if v.is_valid() {
            Ok(ProjectTags {
                technologies,
                topics,
            })
        } else {
            Err(v.into_errors())
        }
    }
}

/// Validated image attachments
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectImages {
    pub images: Vec<Blob>,
}

#[derive(Debug)]
pub struct UpdateProjectImages {
    images: FileField,
}

pub static UPDATE_PROJECT_IMAGES: UpdateProjectImages = UpdateProjectImages {
    images: FileField::new("images", &IMAGES_RULES),
};

impl Schema for UpdateProjectImages {
    type Output = ProjectImages;

    fn name(&self) -> &'static str {
        "update_project_images"
    }

    fn validate(&self, form: &FormData) -> Result<ProjectImages, FieldErrors> {
        let mut v = Validator::new(form);
        let images = v.files(&self.images);

        if v.is_valid() {
            Ok(ProjectImages { images })
        } else {
            Err(v.into_errors())
        }
    }
}

/// Validated replacement thumbnail
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectThumbnail {
    pub thumbnail: Blob,
}

#[derive(Debug)]
pub struct UpdateProjectThumbnail {
    thumbnail: FileField,
}

pub static UPDATE_PROJECT_THUMBNAIL: UpdateProjectThumbnail = UpdateProjectThumbnail {
    thumbnail: FileField::new("thumbnail", &THUMBNAIL_RULES),
};

impl Schema for UpdateProjectThumbnail {
    type Output = ProjectThumbnail;

    fn name(&self) -> &'static str {
        "update_project_thumbnail"
    }

    fn validate(&self, form: &FormData) -> Result<ProjectThumbnail, FieldErrors> {
        let mut v = Validator::new(form);
        let thumbnail = v.required_file(&self.thumbnail, "Thumbnail is required");

        match thumbnail {
            Some(thumbnail) if v.is_valid() => Ok(ProjectThumbnail { thumbnail }),
            _ => Err(v.into_errors()),
        }
    }
}
