//! HTTP request handlers

pub mod attachments;
pub mod categories;
pub mod health;
pub mod ideas;
pub mod moderator;
pub mod session;

use ideabox_common::db::models::Idea;
use serde::Serialize;

/// Body of every successful mutation
#[derive(Debug, Serialize)]
pub struct MutationResponse<T> {
    /// Human-readable outcome
    pub message: String,
    /// Non-fatal problems, e.g. files that could not be removed
    pub warnings: Vec<String>,
    pub data: T,
}

impl<T> MutationResponse<T> {
    pub fn new(message: impl Into<String>, data: T) -> Self {
        Self {
            message: message.into(),
            warnings: Vec::new(),
            data,
        }
    }

    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.warnings = warnings;
        self
    }
}

/// Idea as listed on a page
#[derive(Debug, Serialize)]
pub struct IdeaCard {
    #[serde(flatten)]
    pub idea: Idea,
    pub status_label: &'static str,
}

impl IdeaCard {
    /// Full record for moderators
    pub fn full(idea: Idea) -> Self {
        Self {
            status_label: idea.status.label(),
            idea,
        }
    }

    /// Public view; the author's contact address is withheld
    pub fn public(mut idea: Idea) -> Self {
        idea.contact_email = None;
        Self::full(idea)
    }
}
