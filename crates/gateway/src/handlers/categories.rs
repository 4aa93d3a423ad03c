//! Category management handlers (require `can_manage_categories`)

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use ideabox_common::{
    db::models::Category,
    errors::Result,
    forms::CategoryInput,
    services::{CategoryDeletion, CategorySummary},
};

use super::MutationResponse;
use crate::middleware::session::ModeratorSession;
use crate::AppState;

pub async fn list_categories(
    State(state): State<AppState>,
    ModeratorSession(actor): ModeratorSession,
) -> Result<Json<Vec<CategorySummary>>> {
    Ok(Json(state.categories.summaries(&actor).await?))
}

pub async fn create_category(
    State(state): State<AppState>,
    ModeratorSession(actor): ModeratorSession,
    Json(input): Json<CategoryInput>,
) -> Result<(StatusCode, Json<MutationResponse<Category>>)> {
    let category = state.categories.create(input, &actor).await?;

    Ok((
        StatusCode::CREATED,
        Json(MutationResponse::new(
            format!("Категория «{}» создана", category.name),
            category,
        )),
    ))
}

pub async fn update_category(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    ModeratorSession(actor): ModeratorSession,
    Json(input): Json<CategoryInput>,
) -> Result<Json<MutationResponse<Category>>> {
    let category = state.categories.update(id, input, &actor).await?;

    Ok(Json(MutationResponse::new(
        format!("Категория «{}» обновлена", category.name),
        category,
    )))
}

pub async fn delete_category(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    ModeratorSession(actor): ModeratorSession,
) -> Result<Json<MutationResponse<CategoryDeletion>>> {
    let deletion = state.categories.delete(id, &actor).await?;

    let message = match &deletion.reassigned_to {
        Some(fallback) => format!(
            "Категория «{}» удалена, идеи ({}) перенесены в «{}»",
            deletion.deleted.name, deletion.moved_ideas, fallback
        ),
        None => format!("Категория «{}» удалена", deletion.deleted.name),
    };

    Ok(Json(MutationResponse::new(message, deletion)))
}
