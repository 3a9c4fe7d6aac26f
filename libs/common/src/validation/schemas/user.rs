//! Account schemas: registration, login and profile mutations

use reqwest::Url;

use super::image_rules;
use crate::{
    form::{Blob, FormData},
    validation::{
        FieldErrors, OptionalField, Schema, Validator,
        constraints::{
            EqualFields, FileField, FileRule, Pattern, TextField, TextRule, email_format,
            equals_field, length, matches, url_format,
        },
    },
};

static LETTERS_AND_SPACES: Pattern = Pattern::new(r"^[a-zA-Z\s]*$");

static REGISTRATION_NAME_RULES: [TextRule; 2] = [
    matches(&LETTERS_AND_SPACES, "Name can only contain letters and spaces."),
    length(
        2,
        64,
        "Name must be at least 2 characters",
        "Name must be less than 64 characters",
    ),
];
static PROFILE_NAME_RULES: [TextRule; 1] = [length(
    2,
    64,
    "Name must be at least 2 characters",
    "Name must be less than 64 characters",
)];
static EMAIL_RULES: [TextRule; 1] = [email_format("Email must be a valid email.")];
static PASSWORD_RULES: [TextRule; 1] = [length(
    6,
    64,
    "Password must be at least 6 characters",
    "Password must be less than 64 characters",
)];
static LOGIN_PASSWORD_RULES: [TextRule; 1] = [length(
    1,
    usize::MAX,
    "Password is required",
    "Password is required",
)];
static OLD_PASSWORD_RULES: [TextRule; 1] = [length(
    6,
    64,
    "Passwords must be at least 6 characters",
    "Passwords must be less than 64 characters",
)];
static BIO_RULES: [TextRule; 1] = [length(
    2,
    512,
    "Bio must be at least 2 characters",
    "Bio must be less than 512 characters",
)];
static WEBSITE_RULES: [TextRule; 2] = [
    url_format("Website must be a valid URL"),
    length(
        2,
        96,
        "Website must be at least 2 characters",
        "Website must be 96 characters or less",
    ),
];
static TWITTER_RULES: [TextRule; 2] = [
    url_format("Twitter must be a valid URL"),
    length(
        2,
        96,
        "Twitter must be at least 2 characters",
        "Twitter must be 96 characters or less",
    ),
];
static YOUTUBE_RULES: [TextRule; 2] = [
    url_format("YouTube must be a valid URL"),
    length(
        2,
        96,
        "YouTube must be at least 2 characters",
        "YouTube must be 96 characters or less",
    ),
];
static GITHUB_RULES: [TextRule; 2] = [
    url_format("GitHub must be a valid URL"),
    length(
        2,
        96,
        "GitHub must be at least 2 characters",
        "GitHub must be 96 characters or less",
    ),
];
static USERNAME_RULES: [TextRule; 1] = [length(
    3,
    24,
    "Username is too short (minimum is 3 characters)",
    "Username is too long (maximum is 24 characters)",
)];
static AVATAR_RULES: [FileRule; 2] = image_rules("Avatar must be between 10KB & 2MB");

static EMAIL: TextField = TextField::trimmed("email", "Email is required", &EMAIL_RULES);
static PASSWORD: TextField = TextField::new("password", "Password is required", &PASSWORD_RULES);
static PASSWORD_CONFIRM: TextField =
    TextField::new("passwordConfirm", "Password is required", &PASSWORD_RULES);

/// Validated registration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub name: String,
    pub email: String,
    pub password: String,
    pub password_confirm: String,
}

#[derive(Debug)]
pub struct RegisterUser {
    name: TextField,
    email: &'static TextField,
    password: &'static TextField,
    password_confirm: &'static TextField,
    confirmation: EqualFields,
}

pub static REGISTER_USER: RegisterUser = RegisterUser {
    name: TextField::trimmed("name", "Name is required.", &REGISTRATION_NAME_RULES),
    email: &EMAIL,
    password: &PASSWORD,
    password_confirm: &PASSWORD_CONFIRM,
    confirmation: equals_field(
        "password",
        "passwordConfirm",
        "Password and Confirm Password must match",
    ),
};

impl Schema for RegisterUser {
    type Output = Registration;

    fn name(&self) -> &'static str {
        "register_user"
    }

    fn validate(&self, form: &FormData) -> Result<Registration, FieldErrors> {
        let mut v = Validator::new(form);
        let name = v.required(&self.name);
        let email = v.required(self.email);
        let password = v.required(self.password);
        let password_confirm = v.required(self.password_confirm);
        v.equal(&self.confirmation);

        match (name, email, password, password_confirm) {
            (Some(name), Some(email), Some(password), Some(password_confirm)) if v.is_valid() => {
                Ok(Registration {
                    name,
                    email,
                    password,
                    password_confirm,
                })
            }
            _ => Err(v.into_errors()),
        }
    }
}

/// Validated login credentials
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

#[derive(Debug)]
pub struct LoginUser {
    email: &'static TextField,
    password: TextField,
}

pub static LOGIN_USER: LoginUser = LoginUser {
    email: &EMAIL,
    password: TextField::new("password", "Password is required", &LOGIN_PASSWORD_RULES),
};

impl Schema for LoginUser {
    type Output = Credentials;

    fn name(&self) -> &'static str {
        "login_user"
    }

    fn validate(&self, form: &FormData) -> Result<Credentials, FieldErrors> {
        let mut v = Validator::new(form);
        let email = v.required(self.email);
        let password = v.required(&self.password);

        match (email, password) {
            (Some(email), Some(password)) if v.is_valid() => Ok(Credentials { email, password }),
            _ => Err(v.into_errors()),
        }
    }
}

/// Validated profile changes
///
/// `Absent` leaves the stored value untouched; `Empty` clears it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub avatar: Option<Blob>,
    pub bio: OptionalField<String>,
    pub website: OptionalField<Url>,
    pub twitter: OptionalField<Url>,
    pub youtube: OptionalField<Url>,
    pub github: OptionalField<Url>,
}

#[derive(Debug)]
pub struct UpdateProfile {
    name: TextField,
    avatar: FileField,
    bio: TextField,
    website: TextField,
    twitter: TextField,
    youtube: TextField,
    github: TextField,
}

pub static UPDATE_PROFILE: UpdateProfile = UpdateProfile {
    name: TextField::trimmed("name", "Name is required.", &PROFILE_NAME_RULES),
    avatar: FileField::new("avatar", &AVATAR_RULES),
    bio: TextField::trimmed("bio", "Bio is required.", &BIO_RULES),
    website: TextField::trimmed("website", "Website is required.", &WEBSITE_RULES),
    twitter: TextField::trimmed("twitter", "Twitter is required.", &TWITTER_RULES),
    youtube: TextField::trimmed("youtube", "YouTube is required.", &YOUTUBE_RULES),
    github: TextField::trimmed("github", "GitHub is required.", &GITHUB_RULES),
};

impl Schema for UpdateProfile {
    type Output = ProfileUpdate;

    fn name(&self) -> &'static str {
        "update_profile"
    }

    fn validate(&self, form: &FormData) -> Result<ProfileUpdate, FieldErrors> {
        let mut v = Validator::new(form);
        let update = ProfileUpdate {
            name: v.optional(&self.name),
            avatar: v.optional_file(&self.avatar),
            bio: v.blankable(&self.bio),
            website: v.blankable_url(&self.website),
            twitter: v.blankable_url(&self.twitter),
            youtube: v.blankable_url(&self.youtube),
            github: v.blankable_url(&self.github),
        };

        if v.is_valid() {
            Ok(update)
        } else {
            Err(v.into_errors())
        }
    }
}

/// Validated username change
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsernameChange {
    pub username: String,
}

#[derive(Debug)]
pub struct UpdateUsername {
    username: TextField,
}

pub static UPDATE_USERNAME: UpdateUsername = UpdateUsername {
    username: TextField::trimmed("username", "Username is required.", &USERNAME_RULES),
};

impl Schema for UpdateUsername {
    type Output = UsernameChange;

    fn name(&self) -> &'static str {
        "update_username"
    }

    fn validate(&self, form: &FormData) -> Result<UsernameChange, FieldErrors> {
        let mut v = Validator::new(form);
        let username = v.required(&self.username);

        match username {
            Some(username) if v.is_valid() => Ok(UsernameChange { username }),
            _ => Err(v.into_errors()),
        }
    }
}

/// A single validated email address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailAddress {
    pub email: String,
}

/// Reads only the `email` field, with the login constraint
#[derive(Debug)]
pub struct EmailOnly {
    name: &'static str,
    email: &'static TextField,
}

pub static UPDATE_EMAIL: EmailOnly = EmailOnly {
    name: "update_email",
    email: &EMAIL,
};

pub static RESET_PASSWORD: EmailOnly = EmailOnly {
    name: "reset_password",
    email: &EMAIL,
};

impl Schema for EmailOnly {
    type Output = EmailAddress;

    fn name(&self) -> &'static str {
        self.name
    }

    fn validate(&self, form: &FormData) -> Result<EmailAddress, FieldErrors> {
        let mut v = Validator::new(form);
        let email = v.required(self.email);

        match email {
            Some(email) if v.is_valid() => Ok(EmailAddress { email }),
            _ => Err(v.into_errors()),
        }
    }
}

/// Validated password change
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordChange {
    pub old_password: String,
    pub password: String,
    pub password_confirm: String,
}

#[derive(Debug)]
pub struct UpdatePassword {
    old_password: TextField,
    password: &'static TextField,
    password_confirm: &'static TextField,
    confirmation: EqualFields,
}

pub static UPDATE_PASSWORD: UpdatePassword = UpdatePassword {
    old_password: TextField::trimmed(
        "oldPassword",
        "Current password is required.",
        &OLD_PASSWORD_RULES,
    ),
    password: &PASSWORD,
    password_confirm: &PASSWORD_CONFIRM,
    confirmation: equals_field(
        "password",
        "passwordConfirm",
        "New Password and Confirm New Password must match",
    ),
};

impl Schema for UpdatePassword {
    type Output = PasswordChange;

    fn name(&self) -> &'static str {
        "update_password"
    }

    fn validate(&self, form: &FormData) -> Result<PasswordChange, FieldErrors> {
        let mut v = Validator::new(form);
        let old_password = v.required(&self.old_password);
        let password = v.required(self.password);
        let password_confirm = v.required(self.password_confirm);
        v.equal(&self.confirmation);

        match (old_password, password, password_confirm) {
            (Some(old_password), Some(password), Some(password_confirm)) if v.is_valid() => {
                Ok(PasswordChange {
                    old_password,
                    password,
                    password_confirm,
                })
            }
            _ => Err(v.into_errors()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registration(password: &str, confirm: &str) -> FormData {
        FormData::new()
            .with_text("name", "Jane Doe")
            .with_text("email", "jane@x.com")
            .with_text("password", password)
            .with_text("passwordConfirm", confirm)
    }

    #[test]
    fn registration_mismatch_marks_both_password_fields() {
        let errors = REGISTER_USER
            .validate(&registration("secret", "secreto"))
            .unwrap_err();

        assert_eq!(
            errors.fields().collect::<Vec<_>>(),
            vec!["password", "passwordConfirm"]
        );
        for field in ["password", "passwordConfirm"] {
            assert_eq!(
                errors.get(field).unwrap(),
                ["Password and Confirm Password must match"]
            );
        }
    }

    #[test]
    fn mismatch_is_symmetric() {
        let forward = REGISTER_USER
            .validate(&registration("abc123", "xyz987"))
            .unwrap_err();
        let backward = REGISTER_USER
            .validate(&registration("xyz987", "abc123"))
            .unwrap_err();
        assert_eq!(forward, backward);
        assert!(forward.get("password").is_some());
        assert!(forward.get("passwordConfirm").is_some());
    }

    #[test]
    fn accepts_a_valid_registration() {
        let user = REGISTER_USER
            .validate(&registration("secret", "secret"))
            .unwrap();
        assert_eq!(user.name, "Jane Doe");
        assert_eq!(user.email, "jane@x.com");
    }

    #[test]
    fn registration_name_allows_only_letters_and_spaces() {
        let form = FormData::new()
            .with_text("name", "R2-D2")
            .with_text("email", "r2@x.com")
            .with_text("password", "secret")
            .with_text("passwordConfirm", "secret");
        let errors = REGISTER_USER.validate(&form).unwrap_err();
        assert_eq!(
            errors.get("name").unwrap(),
            ["Name can only contain letters and spaces."]
        );
    }

    #[test]
    fn login_needs_a_password() {
        let form = FormData::new()
            .with_text("email", "jane@x.com")
            .with_text("password", "");
        let errors = LOGIN_USER.validate(&form).unwrap_err();
        assert_eq!(errors.get("password").unwrap(), ["Password is required"]);

        let errors = LOGIN_USER
            .validate(&FormData::new().with_text("email", "nope"))
            .unwrap_err();
        assert_eq!(errors.get("email").unwrap(), ["Email must be a valid email."]);
        assert_eq!(errors.get("password").unwrap(), ["Password is required"]);
    }

    #[test]
    fn profile_distinguishes_absent_and_empty() {
        let form = FormData::new()
            .with_text("bio", "")
            .with_text("website", "https://jane.dev");
        let update = UPDATE_PROFILE.validate(&form).unwrap();

        assert_eq!(update.name, None);
        assert_eq!(update.bio, OptionalField::Empty);
        assert_eq!(
            update.website.as_present().map(Url::as_str),
            Some("https://jane.dev/")
        );
        assert!(update.github.is_absent());
    }

    #[test]
    fn profile_links_use_their_own_labels() {
        let form = FormData::new()
            .with_text("twitter", "not-a-url")
            .with_text("bio", "x");
        let errors = UPDATE_PROFILE.validate(&form).unwrap_err();
        assert_eq!(errors.get("twitter").unwrap(), ["Twitter must be a valid URL"]);
        assert_eq!(
            errors.get("bio").unwrap(),
            ["Bio must be at least 2 characters"]
        );
    }

    #[test]
    fn avatar_rejects_unsupported_types() {
        let form = FormData::new().with_file("avatar", Blob::new(vec![1u8; 20_000], "image/bmp"));
        let errors = UPDATE_PROFILE.validate(&form).unwrap_err();
        assert_eq!(errors.fields().collect::<Vec<_>>(), vec!["avatar"]);
    }

    #[test]
    fn avatar_given_as_text_is_rejected() {
        let form = FormData::new()
            .with_text("bio", "Hello")
            .with_text("avatar", "foo");
        let errors = UPDATE_PROFILE.validate(&form).unwrap_err();
        assert_eq!(
            errors.get("avatar").unwrap(),
            ["Avatar must be between 10KB & 2MB"]
        );
    }

    #[test]
    fn username_bounds() {
        let short = UPDATE_USERNAME
            .validate(&FormData::new().with_text("username", "ab"))
            .unwrap_err();
        assert_eq!(
            short.get("username").unwrap(),
            ["Username is too short (minimum is 3 characters)"]
        );

        let long = UPDATE_USERNAME
            .validate(&FormData::new().with_text("username", "a".repeat(25)))
            .unwrap_err();
        assert_eq!(
            long.get("username").unwrap(),
            ["Username is too long (maximum is 24 characters)"]
        );

        let ok = UPDATE_USERNAME
            .validate(&FormData::new().with_text("username", " jane1234 "))
            .unwrap();
        assert_eq!(ok.username, "jane1234");
    }

    #[test]
    fn email_only_schemas_share_the_login_rule() {
        for schema in [&UPDATE_EMAIL, &RESET_PASSWORD] {
            assert!(schema.validate(&FormData::new().with_text("email", "a@b")).is_err());
            let ok = schema
                .validate(&FormData::new().with_text("email", "jane@x.com"))
                .unwrap();
            assert_eq!(ok.email, "jane@x.com");
        }
        assert_ne!(UPDATE_EMAIL.name(), RESET_PASSWORD.name());
    }

    #[test]
    fn password_change_has_its_own_mismatch_message() {
        let form = FormData::new()
            .with_text("oldPassword", "hunter2")
            .with_text("password", "abc123")
            .with_text("passwordConfirm", "xyz987");
        let errors = UPDATE_PASSWORD.validate(&form).unwrap_err();
        assert_eq!(
            errors.get("passwordConfirm").unwrap(),
            ["New Password and Confirm New Password must match"]
        );
        assert!(errors.get("oldPassword").is_none());

        let errors = UPDATE_PASSWORD
            .validate(
                &FormData::new()
                    .with_text("password", "abc123")
                    .with_text("passwordConfirm", "abc123"),
            )
            .unwrap_err();
        assert_eq!(
            errors.get("oldPassword").unwrap(),
            ["Current password is required."]
        );
    }
}
