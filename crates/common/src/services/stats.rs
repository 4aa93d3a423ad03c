//! Moderator dashboard statistics

use crate::db::models::IdeaStatus;
use crate::db::Repository;
use crate::errors::Result;
use serde::Serialize;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct StatusCount {
    pub status: IdeaStatus,
    pub label: &'static str,
    pub count: u64,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CategoryCount {
    pub name: String,
    pub count: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Statistics {
    pub total: u64,
    /// Every status, in lifecycle order, including zero counts
    pub by_status: Vec<StatusCount>,
    /// Active categories by name
    pub by_category: Vec<CategoryCount>,
}

impl Statistics {
    pub async fn collect(repo: &Repository) -> Result<Self> {
        let total = repo.count_ideas().await?;

        let status_counts = repo.idea_counts_by_status().await?;
        let by_status = IdeaStatus::ALL
            .into_iter()
            .map(|status| StatusCount {
                status,
                label: status.label(),
                count: status_counts.get(&status).copied().unwrap_or(0),
            })
            .collect();

        let category_counts = repo.idea_counts_by_category().await?;
        let by_category = repo
            .active_categories()
            .await?
            .into_iter()
            .map(|category| CategoryCount {
                count: category_counts.get(&category.name).copied().unwrap_or(0),
                name: category.name,
            })
            .collect();

        Ok(Self {
            total,
            by_status,
            by_category,
        })
    }
}
