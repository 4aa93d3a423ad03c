//! Idea entity and its review status

use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue, ConnectionTrait, Value};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Review lifecycle state of an idea.
///
/// Stored as its snake_case string value, so ordering by the column sorts
/// lexicographically by that value.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
pub enum IdeaStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "approved")]
    Approved,
    #[sea_orm(string_value = "partially_approved")]
    PartiallyApproved,
    #[sea_orm(string_value = "in_progress")]
    InProgress,
    #[sea_orm(string_value = "implemented")]
    Implemented,
    #[sea_orm(string_value = "rejected")]
    Rejected,
}

impl IdeaStatus {
    pub const ALL: [IdeaStatus; 6] = [
        IdeaStatus::Pending,
        IdeaStatus::Approved,
        IdeaStatus::PartiallyApproved,
        IdeaStatus::InProgress,
        IdeaStatus::Implemented,
        IdeaStatus::Rejected,
    ];

    /// Storage value
    pub fn as_str(&self) -> &'static str {
        match self {
            IdeaStatus::Pending => "pending",
            IdeaStatus::Approved => "approved",
            IdeaStatus::PartiallyApproved => "partially_approved",
            IdeaStatus::InProgress => "in_progress",
            IdeaStatus::Implemented => "implemented",
            IdeaStatus::Rejected => "rejected",
        }
    }

    /// Human-readable label shown to users
    pub fn label(&self) -> &'static str {
        match self {
            IdeaStatus::Pending => "На рассмотрении",
            IdeaStatus::Approved => "Одобрено",
            IdeaStatus::PartiallyApproved => "Одобрено (частично)",
            IdeaStatus::InProgress => "На реализации",
            IdeaStatus::Implemented => "Реализовано",
            IdeaStatus::Rejected => "Отклонено",
        }
    }
}

impl fmt::Display for IdeaStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IdeaStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        IdeaStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("unknown idea status: {}", s))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "ideas")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub title: String,

    /// The problem being addressed
    #[sea_orm(column_type = "Text")]
    pub essence: String,

    #[sea_orm(column_type = "Text")]
    pub solution: String,

    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,

    pub author_name: Option<String>,

    /// Only used for outbound notifications
    pub contact_email: Option<String>,

    /// Category *name*, not id. Renames rewrite this column in bulk.
    pub category: String,

    pub is_published: bool,

    pub status: IdeaStatus,

    #[sea_orm(column_type = "Text", nullable)]
    pub moderator_feedback: Option<String>,

    pub created_at: DateTimeUtc,

    /// Lowercased title, essence, solution and description, kept current by
    /// `before_save`. SQLite's `LOWER()` only folds ASCII.
    #[sea_orm(column_type = "Text")]
    #[serde(skip)]
    pub search_text: String,
}

impl Model {
    pub fn status_display(&self) -> &'static str {
        self.status.label()
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::attachment::Entity")]
    Attachments,
}

impl Related<super::attachment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Attachments.def()
    }
}

/// Text matched by listing search, one field per line
pub fn search_text(
    title: &str,
    essence: &str,
    solution: &str,
    description: Option<&str>,
) -> String {
    let mut text = [title, essence, solution].join("\n");
    if let Some(description) = description {
        text.push('\n');
        text.push_str(description);
    }
    text.to_lowercase()
}

fn current<V>(value: &ActiveValue<V>) -> Option<&V>
where
    V: Into<Value>,
{
    match value {
        ActiveValue::Set(v) | ActiveValue::Unchanged(v) => Some(v),
        ActiveValue::NotSet => None,
    }
}

#[async_trait::async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C>(mut self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let text_changed = self.title.is_set()
            || self.essence.is_set()
            || self.solution.is_set()
            || self.description.is_set();

        if insert || text_changed {
            let text = search_text(
                current(&self.title).map(String::as_str).unwrap_or_default(),
                current(&self.essence).map(String::as_str).unwrap_or_default(),
                current(&self.solution).map(String::as_str).unwrap_or_default(),
                current(&self.description).and_then(|d| d.as_deref()),
            );
            self.search_text = ActiveValue::Set(text);
        }

        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trips_through_str() {
        for status in IdeaStatus::ALL {
            assert_eq!(status.as_str().parse::<IdeaStatus>().unwrap(), status);
        }
        assert!("draft".parse::<IdeaStatus>().is_err());
    }

    #[test]
    fn test_labels_differ_from_storage_values() {
        assert_eq!(IdeaStatus::Pending.label(), "На рассмотрении");
        assert_eq!(IdeaStatus::PartiallyApproved.label(), "Одобрено (частично)");
        assert_ne!(IdeaStatus::Rejected.label(), IdeaStatus::Rejected.as_str());
    }

    #[test]
    fn test_search_text_folds_cyrillic() {
        let text = search_text("Парковка", "Мало МЕСТ", "Solution", Some("Второй Этаж"));
        assert_eq!(text, "парковка\nмало мест\nsolution\nвторой этаж");
        assert!(!search_text("A", "B", "C", None).ends_with('\n'));
    }

    #[test]
    fn test_serde_uses_storage_value() {
        let json = serde_json::to_string(&IdeaStatus::InProgress).unwrap();
        assert_eq!(json, "\"in_progress\"");
    }
}
