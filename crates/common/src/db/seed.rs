//! Start-up seeding of moderators and default categories

use crate::auth::hash_password;
use crate::config::BootstrapConfig;
use crate::db::models::*;
use crate::db::DbPool;
use crate::errors::Result;
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use tracing::{info, warn};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SeedReport {
    pub moderators_created: usize,
    pub moderators_skipped: usize,
    pub categories_created: usize,
}

/// Insert configured moderators and categories that do not exist yet.
///
/// Existing rows are never modified. Moderators without a password are
/// skipped.
pub async fn bootstrap(pool: &DbPool, config: &BootstrapConfig) -> Result<SeedReport> {
    let conn = pool.conn();
    let mut report = SeedReport::default();

    for seed in &config.moderators {
        let exists = ModeratorEntity::find()
            .filter(ModeratorColumn::Username.eq(seed.username.as_str()))
            .one(conn)
            .await?
            .is_some();
        if exists {
            continue;
        }

        let Some(password) = seed.resolve_password() else {
            warn!(username = %seed.username, "No password configured for moderator, skipping");
            report.moderators_skipped += 1;
            continue;
        };

        ModeratorActiveModel {
            username: Set(seed.username.clone()),
            password_hash: Set(hash_password(&password)?),
            first_name: Set(seed.first_name.clone()),
            last_name: Set(seed.last_name.clone()),
            is_super_moderator: Set(seed.is_super_moderator),
            can_manage_categories: Set(seed.can_manage_categories),
            ..Default::default()
        }
        .insert(conn)
        .await?;

        info!(username = %seed.username, "Moderator created");
        report.moderators_created += 1;
    }

    let mut existing: Vec<String> = CategoryEntity::find()
        .all(conn)
        .await?
        .into_iter()
        .map(|c| c.name_key)
        .collect();

    for seed in &config.categories {
        let name = seed.name.trim();
        if name.is_empty() || existing.contains(&name_key(name)) {
            continue;
        }

        CategoryActiveModel {
            name: Set(name.to_string()),
            description: Set(seed.description.clone()),
            is_active: Set(true),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(conn)
        .await?;

        info!(name = %name, "Category created");
        existing.push(name_key(name));
        report.categories_created += 1;
    }

    Ok(report)
}
