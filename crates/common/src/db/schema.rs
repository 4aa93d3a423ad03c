//! Table creation derived from the entity definitions

use crate::db::models::{AttachmentEntity, CategoryEntity, IdeaEntity, ModeratorEntity};
use crate::errors::Result;
use sea_orm::{ConnectionTrait, EntityTrait, Schema};
use tracing::info;

/// Create every table if it does not exist yet.
///
/// Ideas come before attachments so the foreign key target exists.
pub async fn create_tables<C: ConnectionTrait>(conn: &C) -> Result<()> {
    create_table(conn, CategoryEntity).await?;
    create_table(conn, ModeratorEntity).await?;
    create_table(conn, IdeaEntity).await?;
    create_table(conn, AttachmentEntity).await?;

    info!("Database schema ready");
    Ok(())
}

async fn create_table<C, E>(conn: &C, entity: E) -> Result<()>
where
    C: ConnectionTrait,
    E: EntityTrait,
{
    let backend = conn.get_database_backend();
    let schema = Schema::new(backend);

    let mut stmt = schema.create_table_from_entity(entity);
    stmt.if_not_exists();

    conn.execute(backend.build(&stmt)).await?;
    Ok(())
}
