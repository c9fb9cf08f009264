//! Local input validation
//!
//! Runs before any request is issued. The backend validates again; these
//! checks only save a round trip for input that can never succeed.

use crate::error::{Result, SdkError};
use bitforge_client::types::{
    CreateClanInput, CreatePostInput, CreateThreadInput, LoginRequest, ProfileUpdate, ReportInput,
    SignupRequest, UpdateThreadInput,
};

pub const CLAN_NAME_LEN: (usize, usize) = (3, 32);
pub const CLAN_TAG_LEN: (usize, usize) = (2, 5);
pub const USERNAME_LEN: (usize, usize) = (3, 24);
pub const PASSWORD_MIN_LEN: usize = 8;
pub const THREAD_TITLE_LEN: (usize, usize) = (3, 120);
pub const BODY_MAX_LEN: usize = 10_000;
pub const BIO_MAX_LEN: usize = 280;
pub const SEARCH_MIN_LEN: usize = 2;

/// Input that can be checked locally
pub trait Validate {
    fn validate(&self) -> Result<()>;
}

fn length_between(field: &str, value: &str, (min, max): (usize, usize)) -> Result<()> {
    let len = value.trim().chars().count();
    if len < min || len > max {
        return Err(SdkError::validation(
            field,
            format!("must be between {} and {} characters", min, max),
        ));
    }
    Ok(())
}

fn not_blank(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(SdkError::validation(field, "must not be empty"));
    }
    Ok(())
}

fn at_most(field: &str, value: &str, max: usize) -> Result<()> {
    if value.chars().count() > max {
        return Err(SdkError::validation(
            field,
            format!("must be at most {} characters", max),
        ));
    }
    Ok(())
}

impl Validate for CreateClanInput {
    fn validate(&self) -> Result<()> {
        length_between("name", &self.name, CLAN_NAME_LEN)?;
        length_between("tag", &self.tag, CLAN_TAG_LEN)?;
        if !self.tag.trim().chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(SdkError::validation("tag", "letters and digits only"));
        }
        if let Some(ref description) = self.description {
            at_most("description", description, BIO_MAX_LEN)?;
        }
        Ok(())
    }
}

impl Validate for CreateThreadInput {
    fn validate(&self) -> Result<()> {
        not_blank("categoryId", &self.category_id)?;
        length_between("title", &self.title, THREAD_TITLE_LEN)?;
        not_blank("body", &self.body)?;
        at_most("body", &self.body, BODY_MAX_LEN)
    }
}

impl Validate for UpdateThreadInput {
    fn validate(&self) -> Result<()> {
        if self.title.is_none() && self.body.is_none() {
            return Err(SdkError::validation("thread", "nothing to update"));
        }
        if let Some(ref title) = self.title {
            length_between("title", title, THREAD_TITLE_LEN)?;
        }
        if let Some(ref body) = self.body {
            not_blank("body", body)?;
            at_most("body", body, BODY_MAX_LEN)?;
        }
        Ok(())
    }
}

impl Validate for CreatePostInput {
    fn validate(&self) -> Result<()> {
        not_blank("body", &self.body)?;
        at_most("body", &self.body, BODY_MAX_LEN)
    }
}

impl Validate for ReportInput {
    fn validate(&self) -> Result<()> {
        not_blank("targetId", &self.target_id)?;
        not_blank("reason", &self.reason)
    }
}

impl Validate for LoginRequest {
    fn validate(&self) -> Result<()> {
        not_blank("email", &self.email)?;
        not_blank("password", &self.password)
    }
}

impl Validate for SignupRequest {
    fn validate(&self) -> Result<()> {
        length_between("username", &self.username, USERNAME_LEN)?;
        if !self
            .username
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(SdkError::validation(
                "username",
                "letters, digits, '_' and '-' only",
            ));
        }
        let email = self.email.trim();
        match email.split_once('@') {
            Some((local, domain)) if !local.is_empty() && domain.contains('.') => {}
            _ => return Err(SdkError::validation("email", "not a valid address")),
        }
        if self.password.chars().count() < PASSWORD_MIN_LEN {
            return Err(SdkError::validation(
                "password",
                format!("must be at least {} characters", PASSWORD_MIN_LEN),
            ));
        }
        Ok(())
    }
}

impl Validate for ProfileUpdate {
    fn validate(&self) -> Result<()> {
        if self.is_empty() {
            return Err(SdkError::validation("profile", "nothing to update"));
        }
        if let Some(ref name) = self.display_name {
            length_between("displayName", name, USERNAME_LEN)?;
        }
        if let Some(ref bio) = self.bio {
            at_most("bio", bio, BIO_MAX_LEN)?;
        }
        if let Some(ref url) = self.avatar_url {
            if !(url.starts_with("https://") || url.starts_with("http://")) {
                return Err(SdkError::validation("avatarUrl", "must be an http(s) URL"));
            }
        }
        Ok(())
    }
}

/// Trimmed search query, or `None` when too short to send
pub fn normalize_search(query: &str) -> Option<String> {
    let query = query.trim();
    if query.chars().count() < SEARCH_MIN_LEN {
        None
    } else {
        Some(query.to_string())
    }
}
