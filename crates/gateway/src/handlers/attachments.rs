//! Attachment downloads

use axum::{
    extract::{Path, State},
    http::header,
    response::IntoResponse,
};
use ideabox_common::errors::Result;

use crate::middleware::session::OptionalModerator;
use crate::AppState;

/// Serve an attachment as a download. Unpublished ideas need a moderator.
pub async fn download(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    OptionalModerator(viewer): OptionalModerator,
) -> Result<impl IntoResponse> {
    let (attachment, bytes) = state.lifecycle.download(id, viewer.as_ref()).await?;

    let content_type = mime_guess::from_path(&attachment.filename)
        .first_or_octet_stream()
        .to_string();
    let disposition = format!("attachment; filename=\"{}\"", attachment.filename);

    Ok((
        [
            (header::CONTENT_TYPE, content_type),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    ))
}
