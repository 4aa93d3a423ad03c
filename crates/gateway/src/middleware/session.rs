//! Moderator session extractors
//!
//! The session cookie only carries a signed moderator id. The moderator is
//! reloaded on every request, so deleted accounts lose access immediately.

use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use ideabox_common::{
    auth::{Actor, SessionManager},
    errors::{AppError, Result},
};
use tracing::debug;

use crate::AppState;

/// A logged-in moderator; rejects with 401 otherwise
#[derive(Debug, Clone)]
pub struct ModeratorSession(pub Actor);

/// The moderator, if the request carries a valid session
#[derive(Debug, Clone)]
pub struct OptionalModerator(pub Option<Actor>);

fn session_token<'a>(parts: &'a Parts, sessions: &SessionManager) -> Option<&'a str> {
    parts
        .headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(|cookies| sessions.token_from_cookie_header(cookies))
}

async fn load_actor(state: &AppState, token: &str) -> Result<Actor> {
    let moderator_id = state.sessions.validate(token)?;

    let moderator = state
        .repo
        .find_moderator(moderator_id)
        .await?
        .ok_or_else(|| AppError::Unauthorized {
            message: "Session is no longer valid".to_string(),
        })?;

    Ok(Actor::from(&moderator))
}

impl FromRequestParts<AppState> for ModeratorSession {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let token = session_token(parts, &state.sessions).ok_or_else(|| AppError::Unauthorized {
            message: "Login required".to_string(),
        })?;

        load_actor(state, token).await.map(ModeratorSession)
    }
}

impl FromRequestParts<AppState> for OptionalModerator {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let Some(token) = session_token(parts, &state.sessions) else {
            return Ok(OptionalModerator(None));
        };

        match load_actor(state, token).await {
            Ok(actor) => Ok(OptionalModerator(Some(actor))),
            Err(AppError::Unauthorized { message }) => {
                debug!(reason = %message, "Ignoring invalid session on public route");
                Ok(OptionalModerator(None))
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support;
    use axum::http::Request;

    fn parts_with_cookie(cookie: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/api/session");
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[tokio::test]
    async fn test_missing_cookie_is_unauthorized() {
        let ctx = test_support::TestContext::new().await;
        let mut parts = parts_with_cookie(None);

        let err = ModeratorSession::from_request_parts(&mut parts, &ctx.state)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthorized { .. }));

        let optional = OptionalModerator::from_request_parts(&mut parts, &ctx.state)
            .await
            .unwrap();
        assert!(optional.0.is_none());
    }

    #[tokio::test]
    async fn test_valid_cookie_yields_actor() {
        let ctx = test_support::TestContext::new().await;
        let cookie = ctx.session_cookie(test_support::MANAGER).await;
        let mut parts = parts_with_cookie(Some(&format!("theme=dark; {}", cookie)));

        let ModeratorSession(actor) =
            tokio_test::assert_ok!(ModeratorSession::from_request_parts(&mut parts, &ctx.state).await);
        assert_eq!(actor.username, test_support::MANAGER);
        assert!(actor.can_manage_categories);
    }

    #[tokio::test]
    async fn test_token_for_unknown_moderator_is_stale() {
        let ctx = test_support::TestContext::new().await;
        let token = ctx.state.sessions.issue(9999).unwrap();
        let cookie = format!("{}={}", ctx.state.sessions.cookie_name(), token);
        let mut parts = parts_with_cookie(Some(&cookie));

        let err = ModeratorSession::from_request_parts(&mut parts, &ctx.state)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthorized { .. }));

        let optional = OptionalModerator::from_request_parts(&mut parts, &ctx.state)
            .await
            .unwrap();
        assert!(optional.0.is_none());
    }

    #[tokio::test]
    async fn test_garbage_token_is_rejected() {
        let ctx = test_support::TestContext::new().await;
        let cookie = format!("{}=not-a-token", ctx.state.sessions.cookie_name());
        let mut parts = parts_with_cookie(Some(&cookie));

        let err = ModeratorSession::from_request_parts(&mut parts, &ctx.state)
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), axum::http::StatusCode::UNAUTHORIZED);
    }
}
