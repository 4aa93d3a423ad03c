//! Moderator login, logout and session introspection

use axum::{
    extract::State,
    http::header,
    response::{AppendHeaders, IntoResponse},
    Json,
};
use ideabox_common::{
    auth::{verify_password, Actor},
    errors::{AppError, Result},
    forms::LoginInput,
};
use serde::Serialize;
use tracing::{info, warn};

use super::MutationResponse;
use crate::middleware::session::ModeratorSession;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub moderator: Actor,
}

/// Verify credentials and set the session cookie
pub async fn login(
    State(state): State<AppState>,
    Json(input): Json<LoginInput>,
) -> Result<impl IntoResponse> {
    let input = input.clean()?;

    let moderator = state
        .repo
        .find_moderator_by_username(&input.username)
        .await?
        .filter(|m| verify_password(&input.password, &m.password_hash))
        .ok_or_else(|| {
            warn!(username = %input.username, "Failed login attempt");
            AppError::InvalidCredentials
        })?;

    let token = state.sessions.issue(moderator.id)?;
    let actor = Actor::from(&moderator);
    info!(moderator_id = actor.moderator_id, "Moderator logged in");

    Ok((
        AppendHeaders([(header::SET_COOKIE, state.sessions.session_cookie(&token))]),
        Json(MutationResponse::new(
            format!("Добро пожаловать, {}", actor.display_name),
            SessionResponse { moderator: actor },
        )),
    ))
}

pub async fn current(ModeratorSession(actor): ModeratorSession) -> Json<SessionResponse> {
    Json(SessionResponse { moderator: actor })
}

/// Clear the session cookie; succeeds without a session too
pub async fn logout(State(state): State<AppState>) -> impl IntoResponse {
    (
        AppendHeaders([(header::SET_COOKIE, state.sessions.clear_cookie())]),
        Json(MutationResponse::new("Вы вышли из системы", ())),
    )
}
