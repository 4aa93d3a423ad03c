//! Fixtures shared by the unit tests of this crate

use crate::db::models::*;
use crate::db::{schema, DbPool};
use chrono::{Duration, Utc};
use sea_orm::{ActiveModelTrait, ConnectOptions, Database, Set};

/// Fresh in-memory SQLite database with every table created.
///
/// A single connection keeps the in-memory database alive and shared.
pub async fn memory_pool() -> DbPool {
    let mut opts = ConnectOptions::new("sqlite::memory:");
    opts.max_connections(1).min_connections(1).sqlx_logging(false);

    let conn = Database::connect(opts).await.unwrap();
    schema::create_tables(&conn).await.unwrap();
    DbPool::from_connection(conn)
}

pub async fn insert_category(pool: &DbPool, name: &str, active: bool) -> Category {
    CategoryActiveModel {
        name: Set(name.to_string()),
        description: Set(None),
        is_active: Set(active),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(pool.conn())
    .await
    .unwrap()
}

pub async fn insert_idea(pool: &DbPool, title: &str, category: &str, published: bool) -> Idea {
    insert_idea_with(pool, title, category, published, IdeaStatus::Pending, 0).await
}

/// Insert an idea created `age_minutes` before now
pub async fn insert_idea_with(
    pool: &DbPool,
    title: &str,
    category: &str,
    published: bool,
    status: IdeaStatus,
    age_minutes: i64,
) -> Idea {
    IdeaActiveModel {
        title: Set(title.to_string()),
        essence: Set(format!("{} essence text", title)),
        solution: Set(format!("{} solution text", title)),
        description: Set(None),
        author_name: Set(None),
        contact_email: Set(Some("author@example.com".to_string())),
        category: Set(category.to_string()),
        is_published: Set(published),
        status: Set(status),
        moderator_feedback: Set(None),
        created_at: Set(Utc::now() - Duration::minutes(age_minutes)),
        ..Default::default()
    }
    .insert(pool.conn())
    .await
    .unwrap()
}

pub async fn insert_moderator(pool: &DbPool, username: &str, can_manage_categories: bool) -> Moderator {
    ModeratorActiveModel {
        username: Set(username.to_string()),
        password_hash: Set(crate::auth::hash_password("secret-pass").unwrap()),
        first_name: Set("Test".to_string()),
        last_name: Set(username.to_string()),
        is_super_moderator: Set(false),
        can_manage_categories: Set(can_manage_categories),
        ..Default::default()
    }
    .insert(pool.conn())
    .await
    .unwrap()
}
