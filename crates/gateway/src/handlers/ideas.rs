//! Public idea handlers: listing, detail, submission

use axum::{
    extract::{multipart::MultipartError, Multipart, Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    Json,
};
use ideabox_common::{
    db::models::{Category, IdeaStatus},
    errors::{AppError, Result},
    forms::IdeaSubmission,
    services::{Audience, IdeaDetail, ListingParams, Page, Submission, UploadedFile},
};
use serde::Serialize;
use tracing::debug;

use super::{IdeaCard, MutationResponse};
use crate::middleware::session::OptionalModerator;
use crate::AppState;

/// Form field carrying attachment files
const ATTACHMENT_FIELD: &str = "attachments";

#[derive(Debug, Serialize)]
pub struct StatusOption {
    pub value: &'static str,
    pub label: &'static str,
}

/// Published ideas, filtered and paginated
pub async fn list_ideas(
    State(state): State<AppState>,
    Query(params): Query<ListingParams>,
) -> Result<Json<Page<IdeaCard>>> {
    let query = params.into_query(Audience::Public)?;
    let page = state.listing.list(&query).await?;

    Ok(Json(page.map(IdeaCard::public)))
}

/// One idea with its attachments; unpublished ideas need a moderator session
pub async fn get_idea(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    OptionalModerator(viewer): OptionalModerator,
) -> Result<Json<IdeaDetail>> {
    let mut detail = state.lifecycle.get_for_viewer(id, viewer.as_ref()).await?;
    if viewer.is_none() {
        detail.idea.contact_email = None;
    }

    Ok(Json(detail))
}

/// Multipart submission of a new idea
pub async fn submit_idea(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<MutationResponse<Submission>>)> {
    let limit = state.config.uploads.max_content_length;
    let declared_size = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok());
    let read_error = |e: MultipartError| multipart_error(e, declared_size, limit);

    let mut form = IdeaSubmission::default();
    let mut files = Vec::new();

    while let Some(field) = multipart.next_field().await.map_err(read_error)? {
        let name = field.name().unwrap_or_default().to_string();

        if let Some(filename) = field.file_name().map(str::to_string) {
            if name != ATTACHMENT_FIELD {
                debug!(field = %name, "Ignoring unexpected file field");
                continue;
            }
            let content = field.bytes().await.map_err(read_error)?;
            files.push(UploadedFile {
                filename,
                content: content.to_vec(),
            });
            continue;
        }

        let value = field.text().await.map_err(read_error)?;
        match name.as_str() {
            "title" => form.title = value,
            "essence" => form.essence = value,
            "solution" => form.solution = value,
            "description" => form.description = Some(value),
            "author_name" => form.author_name = Some(value),
            "contact_email" => form.contact_email = Some(value),
            "category" => form.category = value,
            other => debug!(field = %other, "Ignoring unknown form field"),
        }
    }

    let submission = state.lifecycle.submit(form, files).await?;

    Ok((
        StatusCode::CREATED,
        Json(MutationResponse::new(
            "Спасибо! Ваша идея отправлена на модерацию",
            submission,
        )),
    ))
}

fn multipart_error(e: MultipartError, declared_size: Option<usize>, limit: usize) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge {
            size: declared_size.unwrap_or(limit),
            limit,
        }
    } else {
        AppError::invalid("attachments", format!("Malformed form data: {}", e.body_text()))
    }
}

/// Active categories for the submission form
pub async fn active_categories(State(state): State<AppState>) -> Result<Json<Vec<Category>>> {
    Ok(Json(state.categories.active().await?))
}

/// Every status with its display label
pub async fn statuses() -> Json<Vec<StatusOption>> {
    Json(
        IdeaStatus::ALL
            .iter()
            .map(|status| StatusOption {
                value: status.as_str(),
                label: status.label(),
            })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use crate::test_support::*;
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    async fn submit(ctx: &TestContext, title: &str) -> i64 {
        let body = multipart_body(&submission_fields(title), &[]);
        let (status, body) = ctx.send_json(multipart_request("/api/ideas", body)).await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["data"]["idea"]["id"].as_i64().unwrap()
    }

    async fn publish(ctx: &TestContext, id: i64) {
        let cookie = ctx.session_cookie(MODERATOR).await;
        let (status, _) = ctx
            .send_json(json_request(
                Method::POST,
                &format!("/api/moderator/ideas/{id}/publish"),
                Some(&cookie),
                Some(json!({ "published": true })),
            ))
            .await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_submission_with_attachment() {
        let ctx = TestContext::new().await;
        let body = multipart_body(
            &submission_fields("Велопарковка"),
            &[
                ("attachments", "plan 2024.pdf", b"%PDF-1.4".as_slice()),
                ("attachments", "", b"".as_slice()),
            ],
        );

        let (status, body) = ctx.send_json(multipart_request("/api/ideas", body)).await;

        assert_eq!(status, StatusCode::CREATED, "{body}");
        assert_eq!(body["data"]["idea"]["status"], "pending");
        assert_eq!(body["data"]["idea"]["is_published"], false);
        assert_eq!(body["data"]["idea"]["category"], "Транспорт");
        assert_eq!(body["data"]["attachments"].as_array().unwrap().len(), 1);
        assert!(body["warnings"].as_array().unwrap().is_empty());

        let id = body["data"]["idea"]["id"].as_i64().unwrap();
        assert_eq!(ctx.store.paths(), vec![format!("{id}_plan_2024.pdf")]);
        // moderator notice and author confirmation
        assert_eq!(ctx.notifier.sent().len(), 2);
    }

    #[tokio::test]
    async fn test_submission_validation_errors() {
        let ctx = TestContext::new().await;
        let mut fields = submission_fields("");
        fields.retain(|(name, _)| *name != "essence");
        fields.push(("essence", "short".to_string()));

        let (status, body) = ctx
            .send_json(multipart_request("/api/ideas", multipart_body(&fields, &[])))
            .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "INVALID_FORM");
        assert!(body["error"]["details"]["title"].is_array());
        assert!(body["error"]["details"]["essence"].is_array());
        assert!(ctx.notifier.sent().is_empty());
    }

    #[tokio::test]
    async fn test_submission_rejects_disallowed_extension() {
        let ctx = TestContext::new().await;
        let body = multipart_body(
            &submission_fields("Скрипт"),
            &[("attachments", "run.exe", b"MZ".as_slice())],
        );

        let (status, body) = ctx.send_json(multipart_request("/api/ideas", body)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"]["details"]["attachments"].is_array());
        assert!(ctx.store.paths().is_empty());
    }

    #[tokio::test]
    async fn test_submission_rejects_unknown_category() {
        let ctx = TestContext::new().await;
        let mut fields = submission_fields("Идея");
        fields.retain(|(name, _)| *name != "category");
        fields.push(("category", "Несуществующая".to_string()));

        let (status, _) = ctx
            .send_json(multipart_request("/api/ideas", multipart_body(&fields, &[])))
            .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(ctx.state.repo.count_ideas().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_public_listing_only_shows_published() {
        let ctx = TestContext::new().await;
        let hidden = submit(&ctx, "Скрытая").await;
        let shown = submit(&ctx, "Опубликованная").await;
        publish(&ctx, shown).await;

        let (status, body) = ctx
            .send_json(json_request(Method::GET, "/api/ideas", None, None))
            .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total_items"], 1);
        let items = body["items"].as_array().unwrap();
        assert_eq!(items[0]["id"].as_i64(), Some(shown));
        assert!(items[0]["contact_email"].is_null());
        assert_eq!(items[0]["status_label"], "На рассмотрении");
        assert!(items.iter().all(|i| i["id"].as_i64() != Some(hidden)));

        // the publication filter is not offered publicly
        let (status, body) = ctx
            .send_json(json_request(Method::GET, "/api/ideas?published=unpublished", None, None))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"]["details"]["published"].is_array());
    }

    #[tokio::test]
    async fn test_public_search_ignores_cyrillic_case() {
        let ctx = TestContext::new().await;
        let parking = submit(&ctx, "Парковка").await;
        let canteen = submit(&ctx, "Столовая").await;
        publish(&ctx, parking).await;
        publish(&ctx, canteen).await;

        // search=ПАРКОВКА
        let (status, body) = ctx
            .send_json(json_request(
                Method::GET,
                "/api/ideas?search=%D0%9F%D0%90%D0%A0%D0%9A%D0%9E%D0%92%D0%9A%D0%90",
                None,
                None,
            ))
            .await;

        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["total_items"], 1);
        assert_eq!(body["items"][0]["id"].as_i64(), Some(parking));
        assert!(body["items"][0].get("search_text").is_none());
    }

    #[tokio::test]
    async fn test_public_listing_rejects_unknown_status() {
        let ctx = TestContext::new().await;
        let (status, body) = ctx
            .send_json(json_request(Method::GET, "/api/ideas?status=bogus", None, None))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_unpublished_detail_requires_moderator() {
        let ctx = TestContext::new().await;
        let id = submit(&ctx, "Черновик").await;
        let uri = format!("/api/ideas/{id}");

        let (status, _) = ctx.send_json(json_request(Method::GET, &uri, None, None)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let cookie = ctx.session_cookie(MODERATOR).await;
        let (status, body) = ctx
            .send_json(json_request(Method::GET, &uri, Some(&cookie), None))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["contact_email"], "ivan@example.com");
        assert_eq!(body["status_label"], "На рассмотрении");
    }

    #[tokio::test]
    async fn test_missing_idea_is_404() {
        let ctx = TestContext::new().await;
        let (status, body) = ctx
            .send_json(json_request(Method::GET, "/api/ideas/4242", None, None))
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "IDEA_NOT_FOUND");
    }

    #[tokio::test]
    async fn test_categories_and_statuses() {
        let ctx = TestContext::new().await;

        let (status, body) = ctx
            .send_json(json_request(Method::GET, "/api/categories", None, None))
            .await;
        assert_eq!(status, StatusCode::OK);
        let names: Vec<&str> = body
            .as_array()
            .unwrap()
            .iter()
            .map(|c| c["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["Общее", "Транспорт"]);

        let (_, body) = ctx
            .send_json(json_request(Method::GET, "/api/statuses", None, None))
            .await;
        let statuses = body.as_array().unwrap();
        assert_eq!(statuses.len(), 6);
        assert_eq!(statuses[0]["value"], "pending");
    }
}
