//! Core idea-box services
//!
//! - [`IdeaLifecycle`]: submission, moderation transitions, publication, deletion
//! - [`IdeaListing`]: filtered, sorted, paginated idea pages
//! - [`CategoryRegistry`]: category management with name-keyed idea rewrites
//! - [`stats`]: dashboard counters

pub mod categories;
pub mod lifecycle;
pub mod listing;
pub mod stats;

pub use categories::{CategoryDeletion, CategoryRegistry, CategorySummary};
pub use lifecycle::{IdeaDetail, IdeaLifecycle, Removal, Submission, UploadedFile};
pub use listing::{Audience, IdeaListing, ListingParams, ListingQuery, Page};
pub use stats::Statistics;

use crate::metrics;
use crate::notify::{Delivery, NotifyError};
use std::future::Future;
use tracing::{info, warn};

/// Category name used when the registry is empty
pub const DEFAULT_CATEGORY: &str = "Общее";

/// Await a notification, logging and counting the outcome. Never fails.
pub(crate) async fn notify_best_effort<F>(kind: &'static str, idea_id: i32, send: F)
where
    F: Future<Output = Result<Delivery, NotifyError>>,
{
    match send.await {
        Ok(delivery) => {
            metrics::record_notification(kind, delivery.as_str());
            info!(idea_id, kind, outcome = delivery.as_str(), "Notification processed");
        }
        Err(e) => {
            metrics::record_notification(kind, "failed");
            warn!(idea_id, kind, error = %e, "Notification failed");
        }
    }
}
