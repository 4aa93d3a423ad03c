//! Validated input forms
//!
//! Every form is normalised (surrounding whitespace trimmed, blank optional
//! strings turned into `None`) before validation, via `clean()`.

use crate::db::models::IdeaStatus;
use crate::errors::{AppError, Result};
use serde::Deserialize;
use validator::{Validate, ValidationError};

fn trimmed(value: String) -> String {
    value.trim().to_string()
}

/// Trim an optional string, dropping it when blank
pub fn normalize_optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn validate_status(value: &str) -> std::result::Result<(), ValidationError> {
    value
        .parse::<IdeaStatus>()
        .map(|_| ())
        .map_err(|_| ValidationError::new("status").with_message("Неизвестный статус".into()))
}

fn parse_status(value: &str) -> Result<IdeaStatus> {
    value
        .parse()
        .map_err(|_| AppError::invalid("status", "Неизвестный статус"))
}

/// Public idea submission
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct IdeaSubmission {
    #[validate(length(min = 1, max = 100, message = "Обязательное поле, не более 100 символов"))]
    pub title: String,

    #[validate(length(min = 10, message = "Минимум 10 символов"))]
    pub essence: String,

    #[validate(length(min = 10, message = "Минимум 10 символов"))]
    pub solution: String,

    #[validate(length(max = 500, message = "Не более 500 символов"))]
    pub description: Option<String>,

    #[validate(length(max = 50, message = "Не более 50 символов"))]
    pub author_name: Option<String>,

    #[validate(
        email(message = "Введите корректный email"),
        length(max = 120, message = "Не более 120 символов")
    )]
    pub contact_email: Option<String>,

    #[validate(length(min = 1, message = "Выберите категорию"))]
    pub category: String,
}

impl IdeaSubmission {
    pub fn clean(self) -> Result<Self> {
        let form = Self {
            title: trimmed(self.title),
            essence: trimmed(self.essence),
            solution: trimmed(self.solution),
            description: normalize_optional(self.description),
            author_name: normalize_optional(self.author_name),
            contact_email: normalize_optional(self.contact_email),
            category: trimmed(self.category),
        };
        form.validate()?;
        Ok(form)
    }
}

/// Moderator edit of an existing idea
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct IdeaEdit {
    #[validate(length(min = 1, max = 100, message = "Обязательное поле, не более 100 символов"))]
    pub title: String,

    #[validate(length(min = 10, message = "Минимум 10 символов"))]
    pub essence: String,

    #[validate(length(min = 10, message = "Минимум 10 символов"))]
    pub solution: String,

    #[validate(length(max = 500, message = "Не более 500 символов"))]
    pub description: Option<String>,

    #[validate(length(min = 1, message = "Выберите категорию"))]
    pub category: String,

    #[validate(custom(function = "validate_status"))]
    pub status: String,

    pub moderator_feedback: Option<String>,
}

impl IdeaEdit {
    pub fn clean(self) -> Result<Self> {
        let form = Self {
            title: trimmed(self.title),
            essence: trimmed(self.essence),
            solution: trimmed(self.solution),
            description: normalize_optional(self.description),
            category: trimmed(self.category),
            status: trimmed(self.status),
            moderator_feedback: normalize_optional(self.moderator_feedback),
        };
        form.validate()?;
        Ok(form)
    }

    pub fn parsed_status(&self) -> Result<IdeaStatus> {
        parse_status(&self.status)
    }
}

/// Direct status change, optionally with feedback for the author
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct StatusChange {
    #[validate(custom(function = "validate_status"))]
    pub status: String,

    pub moderator_feedback: Option<String>,
}

impl StatusChange {
    pub fn clean(self) -> Result<Self> {
        let form = Self {
            status: trimmed(self.status),
            moderator_feedback: normalize_optional(self.moderator_feedback),
        };
        form.validate()?;
        Ok(form)
    }

    pub fn parsed_status(&self) -> Result<IdeaStatus> {
        parse_status(&self.status)
    }
}

/// Category create/rename input
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct CategoryInput {
    #[validate(length(min = 2, max = 100, message = "От 2 до 100 символов"))]
    pub name: String,

    #[validate(length(max = 500, message = "Не более 500 символов"))]
    pub description: Option<String>,
}

impl CategoryInput {
    pub fn clean(self) -> Result<Self> {
        let form = Self {
            name: trimmed(self.name),
            description: normalize_optional(self.description),
        };
        form.validate()?;
        Ok(form)
    }
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct LoginInput {
    #[validate(length(min = 1, message = "Поле обязательно"))]
    pub username: String,

    #[validate(length(min = 1, message = "Поле обязательно"))]
    pub password: String,
}

impl LoginInput {
    /// Passwords are kept verbatim
    pub fn clean(self) -> Result<Self> {
        let form = Self {
            username: trimmed(self.username),
            password: self.password,
        };
        form.validate()?;
        Ok(form)
    }
}
