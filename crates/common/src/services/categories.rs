//! Category registry
//!
//! Ideas reference categories by name, so a rename rewrites every idea
//! holding the old name and a deletion moves ideas to a fallback category,
//! each inside the same transaction as the category change.

use crate::auth::Actor;
use crate::db::models::*;
use crate::db::{DbPool, Repository};
use crate::errors::{AppError, Result};
use crate::forms::CategoryInput;
use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseTransaction, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde::Serialize;
use tracing::info;

/// Category with the number of ideas currently referencing it
#[derive(Debug, Clone, Serialize)]
pub struct CategorySummary {
    #[serde(flatten)]
    pub category: Category,
    pub idea_count: u64,
}

/// Outcome of a category deletion
#[derive(Debug, Clone, Serialize)]
pub struct CategoryDeletion {
    pub deleted: Category,
    /// Category that received the ideas, if any were moved
    pub reassigned_to: Option<String>,
    pub moved_ideas: u64,
}

#[derive(Clone)]
pub struct CategoryRegistry {
    pool: DbPool,
    repo: Repository,
}

impl CategoryRegistry {
    pub fn new(pool: DbPool) -> Self {
        Self {
            repo: Repository::new(pool.clone()),
            pool,
        }
    }

    /// Active categories for selection lists, ordered by name
    pub async fn active(&self) -> Result<Vec<Category>> {
        self.repo.active_categories().await
    }

    /// Every category in registry order with its idea count
    pub async fn summaries(&self, actor: &Actor) -> Result<Vec<CategorySummary>> {
        actor.require_category_manager()?;

        let counts = self.repo.idea_counts_by_category().await?;
        Ok(self
            .repo
            .all_categories()
            .await?
            .into_iter()
            .map(|category| CategorySummary {
                idea_count: counts.get(&category.name).copied().unwrap_or(0),
                category,
            })
            .collect())
    }

    /// Create a category. A matching inactive category is reactivated.
    pub async fn create(&self, input: CategoryInput, actor: &Actor) -> Result<Category> {
        actor.require_category_manager()?;
        let input = input.clean()?;
        let key = name_key(&input.name);

        let txn = self.pool.conn().begin().await?;
        let existing = CategoryEntity::find()
            .filter(CategoryColumn::NameKey.eq(key))
            .one(&txn)
            .await?;

        let category = match existing {
            Some(category) if category.is_active => {
                return Err(AppError::DuplicateName {
                    name: category.name,
                });
            }
            Some(category) => {
                let mut active: CategoryActiveModel = category.into();
                active.is_active = Set(true);
                active.description = Set(input.description);
                active.update(&txn).await?
            }
            None => {
                CategoryActiveModel {
                    name: Set(input.name),
                    description: Set(input.description),
                    is_active: Set(true),
                    created_at: Set(Utc::now()),
                    ..Default::default()
                }
                .insert(&txn)
                .await?
            }
        };
        txn.commit().await?;

        info!(
            category_id = category.id,
            name = %category.name,
            moderator_id = actor.moderator_id,
            "Category created"
        );
        Ok(category)
    }

    /// Update name and description; a new name is propagated to ideas
    pub async fn update(&self, id: i32, input: CategoryInput, actor: &Actor) -> Result<Category> {
        actor.require_category_manager()?;
        let input = input.clean()?;
        self.rewrite(id, input.name, Some(input.description), actor).await
    }

    /// Rename only, keeping the description
    pub async fn rename(&self, id: i32, new_name: &str, actor: &Actor) -> Result<Category> {
        actor.require_category_manager()?;
        let input = CategoryInput {
            name: new_name.to_string(),
            description: None,
        }
        .clean()?;
        self.rewrite(id, input.name, None, actor).await
    }

    async fn rewrite(
        &self,
        id: i32,
        new_name: String,
        description: Option<Option<String>>,
        actor: &Actor,
    ) -> Result<Category> {
        let key = name_key(&new_name);

        let txn = self.pool.conn().begin().await?;
        let category = find_category(&txn, id).await?;

        let taken = CategoryEntity::find()
            .filter(CategoryColumn::Id.ne(id))
            .filter(CategoryColumn::NameKey.eq(key))
            .count(&txn)
            .await?;
        if taken > 0 {
            return Err(AppError::DuplicateName { name: new_name });
        }

        let old_name = category.name.clone();
        let mut active: CategoryActiveModel = category.into();
        active.name = Set(new_name.clone());
        if let Some(description) = description {
            active.description = Set(description);
        }
        let updated = active.update(&txn).await?;

        let moved = if old_name != new_name {
            move_ideas(&txn, &old_name, &new_name).await?
        } else {
            0
        };
        txn.commit().await?;

        info!(
            category_id = id,
            old_name = %old_name,
            new_name = %new_name,
            moved_ideas = moved,
            moderator_id = actor.moderator_id,
            "Category updated"
        );
        Ok(updated)
    }

    /// Delete a category, moving its ideas to the first other active
    /// category by id.
    ///
    /// Fails with `LastCategoryInUse` when ideas reference the category and
    /// no other active category exists.
    pub async fn delete(&self, id: i32, actor: &Actor) -> Result<CategoryDeletion> {
        actor.require_category_manager()?;

        let txn = self.pool.conn().begin().await?;
        let category = find_category(&txn, id).await?;

        let referencing = IdeaEntity::find()
            .filter(IdeaColumn::Category.eq(category.name.as_str()))
            .count(&txn)
            .await?;

        let fallback = CategoryEntity::find()
            .filter(CategoryColumn::IsActive.eq(true))
            .filter(CategoryColumn::Id.ne(id))
            .order_by_asc(CategoryColumn::Id)
            .one(&txn)
            .await?;

        let (reassigned_to, moved_ideas) = match fallback {
            Some(fallback) if referencing > 0 => {
                let moved = move_ideas(&txn, &category.name, &fallback.name).await?;
                (Some(fallback.name), moved)
            }
            Some(_) => (None, 0),
            None if referencing > 0 => {
                return Err(AppError::LastCategoryInUse {
                    name: category.name,
                    ideas: referencing as usize,
                });
            }
            None => (None, 0),
        };

        CategoryEntity::delete_by_id(id).exec(&txn).await?;
        txn.commit().await?;

        info!(
            category_id = id,
            name = %category.name,
            reassigned_to = reassigned_to.as_deref().unwrap_or("-"),
            moved_ideas,
            moderator_id = actor.moderator_id,
            "Category deleted"
        );

        Ok(CategoryDeletion {
            deleted: category,
            reassigned_to,
            moved_ideas,
        })
    }
}

async fn find_category(txn: &DatabaseTransaction, id: i32) -> Result<Category> {
    CategoryEntity::find_by_id(id)
        .one(txn)
        .await?
        .ok_or(AppError::CategoryNotFound { id })
}

/// Point every idea holding `from` at `to`
async fn move_ideas(txn: &DatabaseTransaction, from: &str, to: &str) -> Result<u64> {
    let result = IdeaEntity::update_many()
        .col_expr(IdeaColumn::Category, Expr::value(to))
        .filter(IdeaColumn::Category.eq(from))
        .exec(txn)
        .await?;
    Ok(result.rows_affected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support;

    fn manager() -> Actor {
        Actor {
            moderator_id: 1,
            username: "admin".to_string(),
            display_name: "Admin".to_string(),
            can_manage_categories: true,
            is_super_moderator: true,
        }
    }

    fn input(name: &str) -> CategoryInput {
        CategoryInput {
            name: name.to_string(),
            description: None,
        }
    }

    async fn category_of(pool: &DbPool, idea_id: i32) -> String {
        Repository::new(pool.clone())
            .get_idea(idea_id)
            .await
            .unwrap()
            .category
    }

    #[tokio::test]
    async fn test_mutations_require_capability() {
        let pool = test_support::memory_pool().await;
        let registry = CategoryRegistry::new(pool);
        let plain = Actor {
            can_manage_categories: false,
            ..manager()
        };

        assert!(matches!(
            registry.create(input("Новая"), &plain).await,
            Err(AppError::Forbidden { .. })
        ));
        assert!(matches!(
            registry.delete(1, &plain).await,
            Err(AppError::Forbidden { .. })
        ));
    }

    #[tokio::test]
    async fn test_create_trims_and_rejects_case_insensitive_duplicates() {
        let pool = test_support::memory_pool().await;
        let registry = CategoryRegistry::new(pool);

        let created = registry.create(input("  Safety  "), &manager()).await.unwrap();
        assert_eq!(created.name, "Safety");

        let err = registry.create(input("SAFETY"), &manager()).await.unwrap_err();
        assert!(matches!(err, AppError::DuplicateName { .. }));
    }

    #[tokio::test]
    async fn test_cyrillic_names_collide_regardless_of_case() {
        let pool = test_support::memory_pool().await;
        let transport = test_support::insert_category(&pool, "Транспорт", true).await;
        let office = test_support::insert_category(&pool, "Офис", true).await;
        assert_eq!(transport.name_key, "транспорт");
        let registry = CategoryRegistry::new(pool);

        let err = registry.create(input("ТРАНСПОРТ"), &manager()).await.unwrap_err();
        assert!(matches!(err, AppError::DuplicateName { .. }));

        let err = registry.rename(office.id, "транспорт", &manager()).await.unwrap_err();
        assert!(matches!(err, AppError::DuplicateName { .. }));

        let renamed = registry.rename(office.id, "ОФИС", &manager()).await.unwrap();
        assert_eq!(renamed.name_key, "офис");
    }

    #[tokio::test]
    async fn test_create_reactivates_inactive_category() {
        let pool = test_support::memory_pool().await;
        let hidden = test_support::insert_category(&pool, "Архив", false).await;
        let registry = CategoryRegistry::new(pool);

        let category = registry.create(input("архив"), &manager()).await.unwrap();
        assert_eq!(category.id, hidden.id);
        assert!(category.is_active);
    }

    #[tokio::test]
    async fn test_rename_rewrites_every_referencing_idea() {
        let pool = test_support::memory_pool().await;
        let category = test_support::insert_category(&pool, "Кухня", true).await;
        test_support::insert_category(&pool, "Общее", true).await;
        let a = test_support::insert_idea(&pool, "A", "Кухня", true).await;
        let b = test_support::insert_idea(&pool, "B", "Кухня", false).await;
        let c = test_support::insert_idea(&pool, "C", "Общее", true).await;
        let registry = CategoryRegistry::new(pool.clone());

        let renamed = registry.rename(category.id, "Столовая", &manager()).await.unwrap();
        assert_eq!(renamed.name, "Столовая");

        assert_eq!(category_of(&pool, a.id).await, "Столовая");
        assert_eq!(category_of(&pool, b.id).await, "Столовая");
        assert_eq!(category_of(&pool, c.id).await, "Общее");

        let counts = Repository::new(pool).idea_counts_by_category().await.unwrap();
        assert_eq!(counts.get("Кухня"), None);
        assert_eq!(counts.get("Столовая"), Some(&2));
    }

    #[tokio::test]
    async fn test_rename_to_taken_name_fails_without_changes() {
        let pool = test_support::memory_pool().await;
        let kitchen = test_support::insert_category(&pool, "Kitchen", true).await;
        test_support::insert_category(&pool, "General", true).await;
        let idea = test_support::insert_idea(&pool, "A", "Kitchen", true).await;
        let registry = CategoryRegistry::new(pool.clone());

        let err = registry.rename(kitchen.id, "general", &manager()).await.unwrap_err();
        assert!(matches!(err, AppError::DuplicateName { .. }));
        assert_eq!(category_of(&pool, idea.id).await, "Kitchen");

        // Changing only the case of its own name is allowed
        let renamed = registry.rename(kitchen.id, "KITCHEN", &manager()).await.unwrap();
        assert_eq!(renamed.name, "KITCHEN");
        assert_eq!(category_of(&pool, idea.id).await, "KITCHEN");
    }

    #[tokio::test]
    async fn test_delete_reassigns_to_fallback() {
        let pool = test_support::memory_pool().await;
        let a = test_support::insert_category(&pool, "A", true).await;
        test_support::insert_category(&pool, "B", true).await;
        let idea = test_support::insert_idea(&pool, "X", "A", true).await;
        let registry = CategoryRegistry::new(pool.clone());

        let deletion = registry.delete(a.id, &manager()).await.unwrap();

        assert_eq!(deletion.reassigned_to.as_deref(), Some("B"));
        assert_eq!(deletion.moved_ideas, 1);
        assert_eq!(category_of(&pool, idea.id).await, "B");
        let names: Vec<String> = registry.active().await.unwrap().into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["B"]);
    }

    #[tokio::test]
    async fn test_delete_fallback_skips_inactive_and_uses_id_order() {
        let pool = test_support::memory_pool().await;
        let doomed = test_support::insert_category(&pool, "Doomed", true).await;
        test_support::insert_category(&pool, "Hidden", false).await;
        test_support::insert_category(&pool, "Zeta", true).await;
        test_support::insert_category(&pool, "Alpha", true).await;
        let idea = test_support::insert_idea(&pool, "X", "Doomed", false).await;
        let registry = CategoryRegistry::new(pool.clone());

        registry.delete(doomed.id, &manager()).await.unwrap();
        assert_eq!(category_of(&pool, idea.id).await, "Zeta");
    }

    #[tokio::test]
    async fn test_delete_last_category_in_use_fails() {
        let pool = test_support::memory_pool().await;
        let only = test_support::insert_category(&pool, "A", true).await;
        let idea = test_support::insert_idea(&pool, "X", "A", true).await;
        let registry = CategoryRegistry::new(pool.clone());

        let err = registry.delete(only.id, &manager()).await.unwrap_err();
        assert!(matches!(err, AppError::LastCategoryInUse { ideas: 1, .. }));
        assert_eq!(category_of(&pool, idea.id).await, "A");
        assert_eq!(registry.active().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_unused_last_category_empties_registry() {
        let pool = test_support::memory_pool().await;
        let only = test_support::insert_category(&pool, "A", true).await;
        let registry = CategoryRegistry::new(pool);

        let deletion = registry.delete(only.id, &manager()).await.unwrap();
        assert_eq!(deletion.reassigned_to, None);
        assert!(registry.active().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_summaries_include_counts() {
        let pool = test_support::memory_pool().await;
        test_support::insert_category(&pool, "A", true).await;
        test_support::insert_category(&pool, "B", false).await;
        test_support::insert_idea(&pool, "X", "A", true).await;
        let registry = CategoryRegistry::new(pool);

        let summaries = registry.summaries(&manager()).await.unwrap();
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].idea_count, 1);
        assert_eq!(summaries[1].idea_count, 0);
    }

    #[tokio::test]
    async fn test_missing_category() {
        let pool = test_support::memory_pool().await;
        let registry = CategoryRegistry::new(pool);
        let err = registry.update(5, input("Name"), &manager()).await.unwrap_err();
        assert!(matches!(err, AppError::CategoryNotFound { id: 5 }));
    }
}
