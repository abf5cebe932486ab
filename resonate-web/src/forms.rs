//! Request forms and their validation rules
//!
//! Each form derives `validator::Validate` for per-field rules. `CleanForm`
//! adds trimming and the checks that span several fields, and turns every
//! failure into `ApiError::Validation` keyed by field name.

use serde::Deserialize;
use std::borrow::Cow;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::error::{ApiError, ApiResult, FieldErrors, NON_FIELD_ERRORS};

const REQUIRED: &str = "This field is required.";

/// Passwords rejected outright regardless of length
const COMMON_PASSWORDS: &[&str] = &[
    "password", "password1", "password123", "12345678", "123456789", "1234567890",
    "qwertyuiop", "qwerty123", "iloveyou", "sunshine", "princess", "football",
    "baseball", "welcome1", "abc12345", "letmein1", "trustno1", "passw0rd",
    "11111111", "00000000", "musician", "guitar123", "drummer1",
];

/// Trim, validate, then run cross-field checks
pub trait CleanForm: Validate + Sized {
    /// Normalize raw input before validation (trim, blank → `None`)
    fn normalize(&mut self) {}

    /// Checks that need more than one field
    fn check(&self, _errors: &mut FieldErrors) {}

    fn clean(mut self) -> ApiResult<Self> {
        self.normalize();

        let mut errors = match self.validate() {
            Ok(()) => FieldErrors::new(),
            Err(e) => field_errors(&e),
        };
        self.check(&mut errors);

        if errors.is_empty() {
            Ok(self)
        } else {
            Err(ApiError::Validation(errors))
        }
    }
}

/// Flatten `validator` output into field → messages
pub fn field_errors(errors: &ValidationErrors) -> FieldErrors {
    errors
        .field_errors()
        .into_iter()
        .map(|(field, errs)| {
            let messages = errs
                .iter()
                .map(|e| match &e.message {
                    Some(message) => message.to_string(),
                    None => e.code.to_string(),
                })
                .collect();
            (field.to_string(), messages)
        })
        .collect()
}

fn push_error(errors: &mut FieldErrors, field: &str, message: impl Into<String>) {
    errors.entry(field.to_string()).or_default().push(message.into());
}

fn blank_to_none(value: &mut Option<String>) {
    *value = value
        .take()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());
}

fn validate_username_chars(username: &str) -> Result<(), ValidationError> {
    let ok = username
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_'));
    if ok {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_username"))
    }
}

/// Reject entirely numeric and well-known passwords
fn validate_password_strength(password: &str) -> Result<(), ValidationError> {
    if !password.is_empty() && password.chars().all(|c| c.is_ascii_digit()) {
        return Err(ValidationError::new("password_entirely_numeric")
            .with_message(Cow::Borrowed("This password is entirely numeric.")));
    }

    let lowered = password.to_lowercase();
    if COMMON_PASSWORDS.contains(&lowered.as_str()) {
        return Err(ValidationError::new("password_too_common")
            .with_message(Cow::Borrowed("This password is too common.")));
    }

    Ok(())
}

/// Usernames shorter than this are too short to compare against
const MIN_SIMILARITY_LEN: usize = 3;

/// `Some(message)` when the password is too close to the username
pub fn password_similarity(password: &str, username: &str) -> Option<String> {
    let password = password.to_lowercase();
    let username = username.to_lowercase();
    if username.chars().count() < MIN_SIMILARITY_LEN || password.is_empty() {
        return None;
    }
    if password.contains(&username) || username.contains(&password) {
        return Some("The password is too similar to the username.".to_string());
    }
    None
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(default)]
pub struct SignupForm {
    #[validate(length(min = 1, max = 150, message = "Username must be between 1 and 150 characters."))]
    #[validate(custom(
        function = "validate_username_chars",
        message = "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters."
    ))]
    pub username: String,

    #[validate(email(message = "Enter a valid email address."))]
    pub email: String,

    #[validate(length(min = 8, message = "This password is too short. It must contain at least 8 characters."))]
    #[validate(custom(function = "validate_password_strength"))]
    pub password: String,

    pub password_confirm: String,
}

impl CleanForm for SignupForm {
    fn normalize(&mut self) {
        self.username = self.username.trim().to_string();
        self.email = self.email.trim().to_string();
    }

    fn check(&self, errors: &mut FieldErrors) {
        if let Some(message) = password_similarity(&self.password, &self.username) {
            push_error(errors, "password", message);
        }
        if self.password != self.password_confirm {
            push_error(errors, "password_confirm", "The two password fields didn't match.");
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(default)]
pub struct LoginForm {
    #[validate(length(min = 1, message = "This field is required."))]
    pub username: String,

    #[validate(length(min = 1, message = "This field is required."))]
    pub password: String,
}

impl CleanForm for LoginForm {
    fn normalize(&mut self) {
        self.username = self.username.trim().to_string();
    }
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(default)]
pub struct PasswordChangeForm {
    #[validate(length(min = 1, message = "This field is required."))]
    pub old_password: String,

    #[validate(length(min = 8, message = "This password is too short. It must contain at least 8 characters."))]
    #[validate(custom(function = "validate_password_strength"))]
    pub new_password1: String,

    pub new_password2: String,

    /// Account the password belongs to; set by the handler, never read from input
    #[serde(skip)]
    pub username: String,
}

impl PasswordChangeForm {
    pub fn for_user(mut self, username: &str) -> Self {
        self.username = username.to_string();
        self
    }
}

impl CleanForm for PasswordChangeForm {
    fn check(&self, errors: &mut FieldErrors) {
        if let Some(message) = password_similarity(&self.new_password1, &self.username) {
            push_error(errors, "new_password1", message);
        }
        if self.new_password1 != self.new_password2 {
            push_error(errors, "new_password2", "The two password fields didn't match.");
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(default)]
pub struct ProfileForm {
    #[validate(email(message = "Enter a valid email address."))]
    pub email: Option<String>,

    #[validate(length(max = 500, message = "Bio must be at most 500 characters."))]
    pub bio: String,

    #[validate(length(max = 100, message = "Instrument must be at most 100 characters."))]
    pub instrument: String,

    #[validate(length(max = 100, message = "Location must be at most 100 characters."))]
    pub location: String,

    #[validate(length(max = 200, message = "Genres must be at most 200 characters."))]
    pub genres: String,

    #[validate(url(message = "Enter a valid URL."))]
    pub avatar_url: Option<String>,
}

impl CleanForm for ProfileForm {
    fn normalize(&mut self) {
        blank_to_none(&mut self.email);
        blank_to_none(&mut self.avatar_url);
        self.bio = self.bio.trim().to_string();
        self.instrument = self.instrument.trim().to_string();
        self.location = self.location.trim().to_string();
        self.genres = self.genres.trim().to_string();
    }
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(default)]
pub struct PostForm {
    #[validate(length(max = 5000, message = "Posts must be at most 5000 characters."))]
    pub content: String,

    #[validate(url(message = "Enter a valid URL."))]
    pub media_url: Option<String>,
}

impl CleanForm for PostForm {
    fn normalize(&mut self) {
        self.content = self.content.trim().to_string();
        blank_to_none(&mut self.media_url);
    }

    fn check(&self, errors: &mut FieldErrors) {
        if self.content.is_empty() && self.media_url.is_none() {
            push_error(errors, NON_FIELD_ERRORS, "A post needs some text or a media link.");
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(default)]
pub struct CommentForm {
    #[validate(length(min = 1, max = 2000, message = "Comments must be at most 2000 characters."))]
    pub content: String,
}

impl CleanForm for CommentForm {
    fn normalize(&mut self) {
        self.content = self.content.trim().to_string();
    }

    fn check(&self, errors: &mut FieldErrors) {
        require_content(&self.content, errors);
    }
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(default)]
pub struct MessageForm {
    #[validate(length(min = 1, max = 5000, message = "Enter a message of at most 5000 characters."))]
    pub content: String,
}

impl CleanForm for MessageForm {
    fn normalize(&mut self) {
        self.content = self.content.trim().to_string();
    }

    fn check(&self, errors: &mut FieldErrors) {
        require_content(&self.content, errors);
    }
}

/// Empty content trips the length rule too; report it as missing instead
fn require_content(content: &str, errors: &mut FieldErrors) {
    if content.is_empty() {
        errors.insert("content".to_string(), vec![REQUIRED.to_string()]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signup(username: &str, password: &str, confirm: &str) -> SignupForm {
        SignupForm {
            username: username.to_string(),
            email: "nina@example.com".to_string(),
            password: password.to_string(),
            password_confirm: confirm.to_string(),
        }
    }

    fn errors_of<T: CleanForm + std::fmt::Debug>(form: T) -> FieldErrors {
        match form.clean() {
            Err(ApiError::Validation(errors)) => errors,
            other => panic!("expected validation errors, got {:?}", other),
        }
    }

    #[test]
    fn test_valid_signup_is_trimmed() {
        let form = signup("  nina.s  ", "upright-groove-7", "upright-groove-7")
            .clean()
            .unwrap();
        assert_eq!(form.username, "nina.s");
    }

    #[test]
    fn test_signup_rejects_bad_username_chars() {
        let errors = errors_of(signup("nina simone", "upright-groove-7", "upright-groove-7"));
        assert!(errors.contains_key("username"));
    }

    #[test]
    fn test_signup_password_rules() {
        let errors = errors_of(signup("nina", "short", "short"));
        assert!(errors["password"][0].contains("too short"));

        let errors = errors_of(signup("nina", "8675309012", "8675309012"));
        assert!(errors["password"].iter().any(|m| m.contains("entirely numeric")));

        let errors = errors_of(signup("nina", "Password123", "Password123"));
        assert!(errors["password"].iter().any(|m| m.contains("too common")));

        let errors = errors_of(signup("ninasimone", "ninasimone!!", "ninasimone!!"));
        assert!(errors["password"].iter().any(|m| m.contains("too similar")));
    }

    #[test]
    fn test_similarity_skips_very_short_usernames() {
        assert!(password_similarity("jam-session-42", "jam").is_some());
        assert!(password_similarity("jo-upright-groove", "jo").is_none());
        assert!(password_similarity("ja", "jam").is_some());
    }

    #[test]
    fn test_signup_confirmation_must_match() {
        let errors = errors_of(signup("nina", "upright-groove-7", "upright-groove-8"));
        assert_eq!(errors.len(), 1);
        assert!(errors.contains_key("password_confirm"));
    }

    #[test]
    fn test_signup_requires_valid_email() {
        let mut form = signup("nina", "upright-groove-7", "upright-groove-7");
        form.email = "not-an-email".to_string();
        assert!(errors_of(form).contains_key("email"));
    }

    #[test]
    fn test_password_change_checks_similarity_and_match() {
        let form = PasswordChangeForm {
            old_password: "old".to_string(),
            new_password1: "xXbassnina99".to_string(),
            new_password2: "different-one".to_string(),
            ..Default::default()
        }
        .for_user("nina");

        let errors = errors_of(form);
        assert!(errors.contains_key("new_password1"));
        assert!(errors.contains_key("new_password2"));
    }

    #[test]
    fn test_profile_blank_optionals_become_none() {
        let form = ProfileForm {
            email: Some("   ".to_string()),
            avatar_url: Some("".to_string()),
            bio: "  jazz  ".to_string(),
            ..Default::default()
        }
        .clean()
        .unwrap();
        assert!(form.email.is_none());
        assert!(form.avatar_url.is_none());
        assert_eq!(form.bio, "jazz");
    }

    #[test]
    fn test_profile_limits() {
        let errors = errors_of(ProfileForm {
            bio: "a".repeat(501),
            instrument: "b".repeat(101),
            avatar_url: Some("not a url".to_string()),
            ..Default::default()
        });
        assert!(errors.contains_key("bio"));
        assert!(errors.contains_key("instrument"));
        assert!(errors.contains_key("avatar_url"));
    }

    #[test]
    fn test_post_needs_content_or_media() {
        let errors = errors_of(PostForm {
            content: "   ".to_string(),
            media_url: None,
        });
        assert!(errors.contains_key(NON_FIELD_ERRORS));

        let form = PostForm {
            content: String::new(),
            media_url: Some("https://cdn.example/take1.mp3".to_string()),
        };
        assert!(form.clean().is_ok());
    }

    #[test]
    fn test_comment_and_message_require_content() {
        let errors = errors_of(CommentForm { content: " \n ".to_string() });
        assert_eq!(errors["content"], vec![REQUIRED.to_string()]);
        let errors = errors_of(CommentForm { content: "x".repeat(2001) });
        assert!(errors["content"][0].contains("2000"));

        let errors = errors_of(MessageForm { content: "   ".to_string() });
        assert_eq!(errors["content"], vec![REQUIRED.to_string()]);
    }
}
