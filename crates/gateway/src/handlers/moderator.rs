//! Moderator dashboard and idea moderation handlers
//!
//! Every handler requires a [`ModeratorSession`]; the resulting actor is
//! passed explicitly into the lifecycle service.

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    Json,
};
use ideabox_common::{
    auth::Actor,
    db::models::Idea,
    errors::{AppError, Result},
    forms::{normalize_optional, IdeaEdit, StatusChange},
    services::{Audience, ListingParams, Page, Removal, Statistics},
};
use serde::{de::DeserializeOwned, Deserialize};

use super::{IdeaCard, MutationResponse};
use crate::middleware::session::ModeratorSession;
use crate::AppState;

type IdeaMutation = Json<MutationResponse<IdeaCard>>;

/// Optional feedback accompanying a transition
#[derive(Debug, Default, Deserialize)]
pub struct TransitionInput {
    #[serde(default)]
    pub moderator_feedback: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PublishInput {
    pub published: bool,
}

#[derive(Debug, Clone, Copy)]
enum Transition {
    Approve,
    PartiallyApprove,
    Reject,
    StartImplementation,
    MarkImplemented,
}

/// JSON body that may be omitted entirely
fn optional_json<T: DeserializeOwned + Default>(body: &Bytes) -> Result<T> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| AppError::invalid("body", format!("Invalid JSON: {}", e)))
}

fn idea_mutation(message: String, idea: Idea) -> IdeaMutation {
    Json(MutationResponse::new(message, IdeaCard::full(idea)))
}

/// All ideas with moderator filters, sorting and pagination
pub async fn dashboard(
    State(state): State<AppState>,
    ModeratorSession(_actor): ModeratorSession,
    Query(params): Query<ListingParams>,
) -> Result<Json<Page<IdeaCard>>> {
    let query = params.into_query(Audience::Moderator)?;
    let page = state.listing.list(&query).await?;

    Ok(Json(page.map(IdeaCard::full)))
}

pub async fn stats(
    State(state): State<AppState>,
    ModeratorSession(_actor): ModeratorSession,
) -> Result<Json<Statistics>> {
    Ok(Json(Statistics::collect(&state.repo).await?))
}

pub async fn edit_idea(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    ModeratorSession(actor): ModeratorSession,
    Json(form): Json<IdeaEdit>,
) -> Result<IdeaMutation> {
    let idea = state.lifecycle.edit(id, form, &actor).await?;
    Ok(idea_mutation(format!("Идея #{} обновлена", id), idea))
}

pub async fn change_status(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    ModeratorSession(actor): ModeratorSession,
    Json(form): Json<StatusChange>,
) -> Result<IdeaMutation> {
    let form = form.clean()?;
    let status = form.parsed_status()?;

    let idea = state
        .lifecycle
        .set_status(id, status, form.moderator_feedback, &actor)
        .await?;
    Ok(idea_mutation(
        format!("Статус идеи #{} изменен на «{}»", id, status.label()),
        idea,
    ))
}

async fn transition(
    state: &AppState,
    id: i32,
    actor: &Actor,
    body: &Bytes,
    transition: Transition,
) -> Result<IdeaMutation> {
    let input: TransitionInput = optional_json(body)?;
    let feedback = normalize_optional(input.moderator_feedback);
    let lifecycle = &state.lifecycle;

    let idea = match transition {
        Transition::Approve => lifecycle.approve(id, feedback, actor).await?,
        Transition::PartiallyApprove => lifecycle.partially_approve(id, feedback, actor).await?,
        Transition::Reject => lifecycle.reject(id, feedback, actor).await?,
        Transition::StartImplementation => lifecycle.start_implementation(id, feedback, actor).await?,
        Transition::MarkImplemented => lifecycle.mark_implemented(id, feedback, actor).await?,
    };

    Ok(idea_mutation(
        format!("Статус идеи #{} изменен на «{}»", id, idea.status.label()),
        idea,
    ))
}

pub async fn approve(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    ModeratorSession(actor): ModeratorSession,
    body: Bytes,
) -> Result<IdeaMutation> {
    transition(&state, id, &actor, &body, Transition::Approve).await
}

pub async fn partially_approve(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    ModeratorSession(actor): ModeratorSession,
    body: Bytes,
) -> Result<IdeaMutation> {
    transition(&state, id, &actor, &body, Transition::PartiallyApprove).await
}

pub async fn reject(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    ModeratorSession(actor): ModeratorSession,
    body: Bytes,
) -> Result<IdeaMutation> {
    transition(&state, id, &actor, &body, Transition::Reject).await
}

pub async fn start_implementation(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    ModeratorSession(actor): ModeratorSession,
    body: Bytes,
) -> Result<IdeaMutation> {
    transition(&state, id, &actor, &body, Transition::StartImplementation).await
}

pub async fn mark_implemented(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    ModeratorSession(actor): ModeratorSession,
    body: Bytes,
) -> Result<IdeaMutation> {
    transition(&state, id, &actor, &body, Transition::MarkImplemented).await
}

pub async fn set_published(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    ModeratorSession(actor): ModeratorSession,
    Json(input): Json<PublishInput>,
) -> Result<IdeaMutation> {
    let idea = state.lifecycle.toggle_publish(id, input.published, &actor).await?;
    let message = if idea.is_published {
        format!("Идея #{} опубликована", id)
    } else {
        format!("Идея #{} снята с публикации", id)
    };
    Ok(idea_mutation(message, idea))
}

pub async fn delete_idea(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    ModeratorSession(actor): ModeratorSession,
) -> Result<Json<MutationResponse<Removal>>> {
    let removal = state.lifecycle.delete(id, &actor).await?;
    let warnings = removal.warnings.clone();

    Ok(Json(
        MutationResponse::new(format!("Идея #{} удалена", id), removal).with_warnings(warnings),
    ))
}
