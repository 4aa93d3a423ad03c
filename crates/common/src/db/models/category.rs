//! Idea category entity

use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue, ConnectionTrait};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "categories")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    /// Natural key; ideas reference categories by this value
    #[sea_orm(unique)]
    pub name: String,

    pub description: Option<String>,

    /// Inactive categories are hidden from selection lists
    pub is_active: bool,

    pub created_at: DateTimeUtc,

    /// Lowercased name for case-insensitive lookups, set by `before_save`
    #[sea_orm(unique)]
    #[serde(skip)]
    pub name_key: String,
}

/// Case-insensitive comparison key for category names
pub fn name_key(name: &str) -> String {
    name.trim().to_lowercase()
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

#[async_trait::async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C>(mut self, _db: &C, _insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        if let ActiveValue::Set(name) = &self.name {
            self.name_key = ActiveValue::Set(name_key(name));
        }
        Ok(self)
    }
}
