//! Repository pattern for database reads
//!
//! Lookups shared by the services and the HTTP handlers. Mutations live in
//! the services, where they run inside a transaction.

use crate::db::models::*;
use crate::db::DbPool;
use crate::errors::{AppError, Result};
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect,
};
use std::collections::HashMap;

/// Repository for data access operations
#[derive(Clone)]
pub struct Repository {
    pool: DbPool,
}

impl Repository {
    /// Create a new repository with the given connection pool
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn conn(&self) -> &DatabaseConnection {
        self.pool.conn()
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    // ========================================================================
    // Health Check
    // ========================================================================

    /// Ping the database
    pub async fn ping(&self) -> Result<()> {
        self.pool.ping().await
    }

    // ========================================================================
    // Idea Operations
    // ========================================================================

    pub async fn find_idea(&self, id: i32) -> Result<Option<Idea>> {
        IdeaEntity::find_by_id(id)
            .one(self.conn())
            .await
            .map_err(Into::into)
    }

    /// Find idea by ID, failing with `IdeaNotFound`
    pub async fn get_idea(&self, id: i32) -> Result<Idea> {
        self.find_idea(id)
            .await?
            .ok_or(AppError::IdeaNotFound { id })
    }

    pub async fn count_ideas(&self) -> Result<u64> {
        IdeaEntity::find()
            .count(self.conn())
            .await
            .map_err(Into::into)
    }

    /// Number of ideas per stored category name
    pub async fn idea_counts_by_category(&self) -> Result<HashMap<String, u64>> {
        let rows: Vec<(String, i64)> = IdeaEntity::find()
            .select_only()
            .column(IdeaColumn::Category)
            .column_as(IdeaColumn::Id.count(), "count")
            .group_by(IdeaColumn::Category)
            .into_tuple()
            .all(self.conn())
            .await?;

        Ok(rows
            .into_iter()
            .map(|(name, count)| (name, count.max(0) as u64))
            .collect())
    }

    /// Number of ideas per status; statuses without ideas are absent
    pub async fn idea_counts_by_status(&self) -> Result<HashMap<IdeaStatus, u64>> {
        let rows: Vec<(IdeaStatus, i64)> = IdeaEntity::find()
            .select_only()
            .column(IdeaColumn::Status)
            .column_as(IdeaColumn::Id.count(), "count")
            .group_by(IdeaColumn::Status)
            .into_tuple()
            .all(self.conn())
            .await?;

        Ok(rows
            .into_iter()
            .map(|(status, count)| (status, count.max(0) as u64))
            .collect())
    }

    // ========================================================================
    // Attachment Operations
    // ========================================================================

    pub async fn find_attachment(&self, id: i32) -> Result<Option<Attachment>> {
        AttachmentEntity::find_by_id(id)
            .one(self.conn())
            .await
            .map_err(Into::into)
    }

    /// Attachments of an idea in upload order
    pub async fn attachments_for_idea(&self, idea_id: i32) -> Result<Vec<Attachment>> {
        AttachmentEntity::find()
            .filter(AttachmentColumn::IdeaId.eq(idea_id))
            .order_by_asc(AttachmentColumn::Id)
            .all(self.conn())
            .await
            .map_err(Into::into)
    }

    // ========================================================================
    // Moderator Operations
    // ========================================================================

    pub async fn find_moderator(&self, id: i32) -> Result<Option<Moderator>> {
        ModeratorEntity::find_by_id(id)
            .one(self.conn())
            .await
            .map_err(Into::into)
    }

    pub async fn find_moderator_by_username(&self, username: &str) -> Result<Option<Moderator>> {
        ModeratorEntity::find()
            .filter(ModeratorColumn::Username.eq(username))
            .one(self.conn())
            .await
            .map_err(Into::into)
    }

    // ========================================================================
    // Category Operations
    // ========================================================================

    /// Find category by ID, failing with `CategoryNotFound`
    pub async fn get_category(&self, id: i32) -> Result<Category> {
        CategoryEntity::find_by_id(id)
            .one(self.conn())
            .await?
            .ok_or(AppError::CategoryNotFound { id })
    }

    /// Active categories ordered by name, for selection lists
    pub async fn active_categories(&self) -> Result<Vec<Category>> {
        CategoryEntity::find()
            .filter(CategoryColumn::IsActive.eq(true))
            .order_by_asc(CategoryColumn::Name)
            .all(self.conn())
            .await
            .map_err(Into::into)
    }

    /// Every category in registry order (by id)
    pub async fn all_categories(&self) -> Result<Vec<Category>> {
        CategoryEntity::find()
            .order_by_asc(CategoryColumn::Id)
            .all(self.conn())
            .await
            .map_err(Into::into)
    }

    pub async fn find_active_category_by_name(&self, name: &str) -> Result<Option<Category>> {
        CategoryEntity::find()
            .filter(CategoryColumn::IsActive.eq(true))
            .filter(CategoryColumn::NameKey.eq(name_key(name)))
            .one(self.conn())
            .await
            .map_err(Into::into)
    }
}
