//! Idea lifecycle: submission, moderation, publication and deletion
//!
//! Every mutation runs in one database transaction. Notifications are sent
//! after commit and never affect the outcome.

use super::{notify_best_effort, DEFAULT_CATEGORY};
use crate::auth::Actor;
use crate::config::UploadConfig;
use crate::db::models::*;
use crate::db::{DbPool, Repository};
use crate::errors::{AppError, Result};
use crate::forms::{IdeaEdit, IdeaSubmission};
use crate::metrics;
use crate::notify::Notifier;
use crate::storage::{is_allowed_extension, sanitize_filename, storage_path, FileStore};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseTransaction, EntityTrait,
    PaginatorTrait, QueryFilter, Set, TransactionTrait,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

/// A file received with a submission
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: String,
    pub content: Vec<u8>,
}

/// A newly created idea with its attachments
#[derive(Debug, Clone, Serialize)]
pub struct Submission {
    pub idea: Idea,
    pub attachments: Vec<Attachment>,
}

/// Idea as shown on its detail page
#[derive(Debug, Clone, Serialize)]
pub struct IdeaDetail {
    #[serde(flatten)]
    pub idea: Idea,
    pub status_label: &'static str,
    pub attachments: Vec<Attachment>,
}

impl IdeaDetail {
    pub fn new(idea: Idea, attachments: Vec<Attachment>) -> Self {
        Self {
            status_label: idea.status.label(),
            idea,
            attachments,
        }
    }
}

/// Result of deleting an idea
#[derive(Debug, Clone, Serialize)]
pub struct Removal {
    pub idea_id: i32,
    pub removed_files: usize,
    /// File cleanup problems; the idea itself is gone regardless
    pub warnings: Vec<String>,
}

#[derive(Clone)]
pub struct IdeaLifecycle {
    pool: DbPool,
    repo: Repository,
    store: Arc<dyn FileStore>,
    notifier: Arc<dyn Notifier>,
    allowed_extensions: Vec<String>,
}

impl IdeaLifecycle {
    pub fn new(
        pool: DbPool,
        store: Arc<dyn FileStore>,
        notifier: Arc<dyn Notifier>,
        uploads: &UploadConfig,
    ) -> Self {
        Self {
            repo: Repository::new(pool.clone()),
            pool,
            store,
            notifier,
            allowed_extensions: uploads.allowed_extensions.clone(),
        }
    }

    // ========================================================================
    // Submission
    // ========================================================================

    /// Create a pending, unpublished idea with its attachments
    pub async fn submit(&self, form: IdeaSubmission, files: Vec<UploadedFile>) -> Result<Submission> {
        let form = form.clean()?;

        let files: Vec<UploadedFile> = files
            .into_iter()
            .filter(|file| !file.filename.trim().is_empty())
            .collect();
        for file in &files {
            if !is_allowed_extension(&file.filename, &self.allowed_extensions) {
                return Err(AppError::invalid(
                    "attachments",
                    format!(
                        "Файл \"{}\" имеет недопустимый формат; разрешены: {}",
                        file.filename,
                        self.allowed_extensions.join(", ")
                    ),
                ));
            }
        }

        let category = resolve_category(self.pool.conn(), &form.category, None).await?;

        let txn = self.pool.conn().begin().await?;
        let mut written = Vec::new();

        let (idea, attachments) = match self
            .persist_submission(&txn, form, category, files, &mut written)
            .await
        {
            Ok(created) => created,
            Err(e) => {
                if let Err(rollback) = txn.rollback().await {
                    warn!(error = %rollback, "Rollback after failed submission also failed");
                }
                self.discard_files(&written).await;
                return Err(e);
            }
        };

        if let Err(e) = txn.commit().await {
            self.discard_files(&written).await;
            return Err(e.into());
        }

        info!(
            idea_id = idea.id,
            category = %idea.category,
            attachments = attachments.len(),
            "Idea submitted"
        );
        metrics::record_submission(attachments.len());

        notify_best_effort("new_idea", idea.id, self.notifier.notify_new_idea(&idea)).await;
        notify_best_effort(
            "author_confirmation",
            idea.id,
            self.notifier.notify_author_confirmation(&idea),
        )
        .await;

        Ok(Submission { idea, attachments })
    }

    async fn persist_submission(
        &self,
        txn: &DatabaseTransaction,
        form: IdeaSubmission,
        category: String,
        files: Vec<UploadedFile>,
        written: &mut Vec<String>,
    ) -> Result<(Idea, Vec<Attachment>)> {
        let idea = IdeaActiveModel {
            title: Set(form.title),
            essence: Set(form.essence),
            solution: Set(form.solution),
            description: Set(form.description),
            author_name: Set(form.author_name),
            contact_email: Set(form.contact_email),
            category: Set(category),
            is_published: Set(false),
            status: Set(IdeaStatus::Pending),
            moderator_feedback: Set(None),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(txn)
        .await?;

        let mut attachments = Vec::with_capacity(files.len());
        for (index, file) in files.into_iter().enumerate() {
            let sanitized = sanitize_filename(&file.filename);
            let mut filename = sanitized.clone();
            let mut path = storage_path(idea.id, &filename);
            // A prefixed name can itself collide with an earlier upload
            let mut prefix = index + 1;
            while written.contains(&path) {
                filename = format!("{}_{}", prefix, sanitized);
                path = storage_path(idea.id, &filename);
                prefix += 1;
            }

            self.store.write(&path, &file.content).await?;
            written.push(path.clone());

            let attachment = AttachmentActiveModel {
                filename: Set(filename),
                filepath: Set(path),
                idea_id: Set(idea.id),
                ..Default::default()
            }
            .insert(txn)
            .await?;
            attachments.push(attachment);
        }

        Ok((idea, attachments))
    }

    /// Remove files written for a submission that did not commit
    async fn discard_files(&self, paths: &[String]) {
        for path in paths {
            if let Err(e) = self.store.delete(path).await {
                warn!(path = %path, error = %e, "Could not remove file of a failed submission");
            }
        }
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Load an idea for display. Anonymous viewers only see published ideas.
    pub async fn get_for_viewer(&self, id: i32, viewer: Option<&Actor>) -> Result<IdeaDetail> {
        let idea = self.repo.get_idea(id).await?;
        if !idea.is_published && viewer.is_none() {
            return Err(AppError::Forbidden {
                message: "This idea is not published".to_string(),
            });
        }

        let attachments = self.repo.attachments_for_idea(id).await?;
        Ok(IdeaDetail::new(idea, attachments))
    }

    /// Attachment metadata and bytes, with the same visibility rule as the idea
    pub async fn download(&self, attachment_id: i32, viewer: Option<&Actor>) -> Result<(Attachment, Vec<u8>)> {
        let attachment = self
            .repo
            .find_attachment(attachment_id)
            .await?
            .ok_or(AppError::AttachmentNotFound { id: attachment_id })?;

        let idea = self.repo.get_idea(attachment.idea_id).await?;
        if !idea.is_published && viewer.is_none() {
            return Err(AppError::Forbidden {
                message: "This idea is not published".to_string(),
            });
        }

        match self.store.read(&attachment.filepath).await? {
            Some(bytes) => Ok((attachment, bytes)),
            None => {
                warn!(
                    attachment_id,
                    path = %attachment.filepath,
                    "Attachment record has no backing file"
                );
                Err(AppError::NotFound {
                    resource_type: "file".to_string(),
                    id: attachment.filename,
                })
            }
        }
    }

    // ========================================================================
    // Moderation
    // ========================================================================

    /// Overwrite the status. Publication is never touched.
    ///
    /// `feedback`, when given, replaces the moderator feedback.
    pub async fn set_status(
        &self,
        id: i32,
        new_status: IdeaStatus,
        feedback: Option<String>,
        actor: &Actor,
    ) -> Result<Idea> {
        let txn = self.pool.conn().begin().await?;
        let idea = find_idea(&txn, id).await?;
        let old_status = idea.status;

        let mut active: IdeaActiveModel = idea.into();
        active.status = Set(new_status);
        if let Some(feedback) = feedback {
            active.moderator_feedback = Set(Some(feedback));
        }
        let updated = active.update(&txn).await?;
        txn.commit().await?;

        info!(
            idea_id = id,
            moderator_id = actor.moderator_id,
            old_status = %old_status,
            new_status = %new_status,
            "Idea status changed"
        );
        metrics::record_status_change(new_status);

        notify_best_effort(
            "status_change",
            id,
            self.notifier.notify_status_change(&updated, old_status, new_status),
        )
        .await;

        Ok(updated)
    }

    pub async fn approve(&self, id: i32, feedback: Option<String>, actor: &Actor) -> Result<Idea> {
        self.set_status(id, IdeaStatus::Approved, feedback, actor).await
    }

    pub async fn partially_approve(&self, id: i32, feedback: Option<String>, actor: &Actor) -> Result<Idea> {
        self.set_status(id, IdeaStatus::PartiallyApproved, feedback, actor).await
    }

    pub async fn reject(&self, id: i32, feedback: Option<String>, actor: &Actor) -> Result<Idea> {
        self.set_status(id, IdeaStatus::Rejected, feedback, actor).await
    }

    pub async fn start_implementation(&self, id: i32, feedback: Option<String>, actor: &Actor) -> Result<Idea> {
        self.set_status(id, IdeaStatus::InProgress, feedback, actor).await
    }

    pub async fn mark_implemented(&self, id: i32, feedback: Option<String>, actor: &Actor) -> Result<Idea> {
        self.set_status(id, IdeaStatus::Implemented, feedback, actor).await
    }

    /// Set publication directly; status is untouched and nobody is notified
    pub async fn toggle_publish(&self, id: i32, published: bool, actor: &Actor) -> Result<Idea> {
        let txn = self.pool.conn().begin().await?;
        let idea = find_idea(&txn, id).await?;

        let mut active: IdeaActiveModel = idea.into();
        active.is_published = Set(published);
        let updated = active.update(&txn).await?;
        txn.commit().await?;

        info!(idea_id = id, moderator_id = actor.moderator_id, published, "Idea publication changed");
        Ok(updated)
    }

    /// Moderator edit of content, category, status and feedback.
    ///
    /// The author is notified only if the status actually changed.
    pub async fn edit(&self, id: i32, form: IdeaEdit, actor: &Actor) -> Result<Idea> {
        let form = form.clean()?;
        let new_status = form.parsed_status()?;

        let txn = self.pool.conn().begin().await?;
        let idea = find_idea(&txn, id).await?;
        let old_status = idea.status;
        let category = resolve_category(&txn, &form.category, Some(&idea.category)).await?;

        let mut active: IdeaActiveModel = idea.into();
        active.title = Set(form.title);
        active.essence = Set(form.essence);
        active.solution = Set(form.solution);
        active.description = Set(form.description);
        active.category = Set(category);
        active.status = Set(new_status);
        active.moderator_feedback = Set(form.moderator_feedback);
        let updated = active.update(&txn).await?;
        txn.commit().await?;

        info!(
            idea_id = id,
            moderator_id = actor.moderator_id,
            old_status = %old_status,
            new_status = %new_status,
            "Idea edited"
        );

        if old_status != new_status {
            metrics::record_status_change(new_status);
            notify_best_effort(
                "status_change",
                id,
                self.notifier.notify_status_change(&updated, old_status, new_status),
            )
            .await;
        }

        Ok(updated)
    }

    /// Delete an idea and its attachments, then try to remove the files
    pub async fn delete(&self, id: i32, actor: &Actor) -> Result<Removal> {
        let txn = self.pool.conn().begin().await?;
        find_idea(&txn, id).await?;

        let attachments = AttachmentEntity::find()
            .filter(AttachmentColumn::IdeaId.eq(id))
            .all(&txn)
            .await?;
        AttachmentEntity::delete_many()
            .filter(AttachmentColumn::IdeaId.eq(id))
            .exec(&txn)
            .await?;
        IdeaEntity::delete_by_id(id).exec(&txn).await?;
        txn.commit().await?;

        let mut removed_files = 0;
        let mut warnings = Vec::new();
        for attachment in &attachments {
            match self.store.delete(&attachment.filepath).await {
                Ok(()) => removed_files += 1,
                Err(e) => {
                    metrics::record_cleanup_failure();
                    warn!(
                        idea_id = id,
                        path = %attachment.filepath,
                        error = %e,
                        "Attachment file could not be removed"
                    );
                    warnings.push(format!(
                        "Не удалось удалить файл \"{}\": {}",
                        attachment.filename, e
                    ));
                }
            }
        }

        info!(
            idea_id = id,
            moderator_id = actor.moderator_id,
            removed_files,
            cleanup_failures = warnings.len(),
            "Idea deleted"
        );

        Ok(Removal {
            idea_id: id,
            removed_files,
            warnings,
        })
    }
}

async fn find_idea<C: ConnectionTrait>(conn: &C, id: i32) -> Result<Idea> {
    IdeaEntity::find_by_id(id)
        .one(conn)
        .await?
        .ok_or(AppError::IdeaNotFound { id })
}

/// Map a requested category to the stored name of an active category.
///
/// `current` is the idea's existing category, which stays acceptable even
/// if it is no longer active. With an empty registry only the default
/// category is accepted.
async fn resolve_category<C: ConnectionTrait>(
    conn: &C,
    requested: &str,
    current: Option<&str>,
) -> Result<String> {
    let key = name_key(requested);

    if let Some(current) = current {
        if name_key(current) == key {
            return Ok(current.to_string());
        }
    }

    let active = CategoryEntity::find().filter(CategoryColumn::IsActive.eq(true));

    if let Some(category) = active
        .clone()
        .filter(CategoryColumn::NameKey.eq(key.as_str()))
        .one(conn)
        .await?
    {
        return Ok(category.name);
    }

    if key == name_key(DEFAULT_CATEGORY) && active.count(conn).await? == 0 {
        return Ok(DEFAULT_CATEGORY.to_string());
    }

    Err(AppError::invalid("category", "Выберите категорию из списка"))
}
