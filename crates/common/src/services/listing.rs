//! Filtered, sorted and paginated idea listings
//!
//! The public audience is always restricted to published ideas before any
//! caller-supplied filter is applied.

use crate::db::models::*;
use crate::db::DbPool;
use crate::errors::{AppError, Result};
use sea_orm::sea_query::{Expr, LikeExpr, Order};
use sea_orm::{
    ColumnTrait, Condition, EntityTrait, ItemsAndPagesNumber, PaginatorTrait, QueryFilter,
    QueryOrder, Select,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Audience {
    Public,
    Moderator,
}

/// Moderator-only filter on publication state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PublishedFilter {
    #[default]
    All,
    Published,
    Unpublished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    #[default]
    CreatedAt,
    Title,
    Author,
    Category,
    Status,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl From<SortDirection> for Order {
    fn from(direction: SortDirection) -> Self {
        match direction {
            SortDirection::Asc => Order::Asc,
            SortDirection::Desc => Order::Desc,
        }
    }
}

/// Raw query-string parameters as received from a client
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListingParams {
    pub status: Option<String>,
    pub category: Option<String>,
    #[serde(alias = "q")]
    pub search: Option<String>,
    pub sort: Option<String>,
    #[serde(alias = "direction")]
    pub dir: Option<String>,
    pub published: Option<String>,
    pub page: Option<i64>,
}

/// A validated listing request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingQuery {
    pub audience: Audience,
    pub status: Option<IdeaStatus>,
    pub category: Option<String>,
    pub search: Option<String>,
    pub published: PublishedFilter,
    pub sort: SortKey,
    pub direction: SortDirection,
    /// 1-based
    pub page: u64,
}

impl ListingQuery {
    /// Newest first, no filters, first page
    pub fn new(audience: Audience) -> Self {
        Self {
            audience,
            status: None,
            category: None,
            search: None,
            published: PublishedFilter::All,
            sort: SortKey::CreatedAt,
            direction: SortDirection::Desc,
            page: 1,
        }
    }
}

/// `None`, blank and `all` all mean "no filter"
fn filter_value(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty() && !v.eq_ignore_ascii_case("all"))
}

impl ListingParams {
    pub fn into_query(self, audience: Audience) -> Result<ListingQuery> {
        let mut query = ListingQuery::new(audience);

        query.status = filter_value(self.status)
            .map(|s| {
                s.parse::<IdeaStatus>()
                    .map_err(|_| AppError::invalid("status", format!("Unknown status: {}", s)))
            })
            .transpose()?;
        query.category = filter_value(self.category);
        query.search = self
            .search
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        // Sort keys: `newest`/`oldest` everywhere, column keys for moderators
        if let Some(sort) = filter_value(self.sort) {
            match (sort.as_str(), audience) {
                ("newest", _) => {
                    query.sort = SortKey::CreatedAt;
                    query.direction = SortDirection::Desc;
                }
                ("oldest", _) => {
                    query.sort = SortKey::CreatedAt;
                    query.direction = SortDirection::Asc;
                }
                ("created_at", Audience::Moderator) => query.sort = SortKey::CreatedAt,
                ("title", Audience::Moderator) => query.sort = SortKey::Title,
                ("author", Audience::Moderator) => query.sort = SortKey::Author,
                ("category", Audience::Moderator) => query.sort = SortKey::Category,
                ("status", Audience::Moderator) => query.sort = SortKey::Status,
                _ => return Err(AppError::invalid("sort", format!("Unsupported sort key: {}", sort))),
            }
        }

        if let Some(dir) = filter_value(self.dir) {
            query.direction = match dir.to_ascii_lowercase().as_str() {
                "asc" => SortDirection::Asc,
                "desc" => SortDirection::Desc,
                _ => return Err(AppError::invalid("dir", "Direction must be asc or desc")),
            };
        }

        if let Some(published) = filter_value(self.published) {
            if audience == Audience::Public {
                return Err(AppError::invalid("published", "Filter not available"));
            }
            query.published = match published.as_str() {
                "published" | "true" => PublishedFilter::Published,
                "unpublished" | "false" => PublishedFilter::Unpublished,
                _ => {
                    return Err(AppError::invalid(
                        "published",
                        "Use all, published or unpublished",
                    ))
                }
            };
        }

        // Pages below 1 are treated as the first page
        query.page = self.page.unwrap_or(1).max(1) as u64;

        Ok(query)
    }
}

/// One page of results plus navigation metadata
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u64,
    pub per_page: u64,
    pub total_items: u64,
    pub total_pages: u64,
    pub has_next: bool,
    pub has_prev: bool,
}

impl<T> Page<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            page: self.page,
            per_page: self.per_page,
            total_items: self.total_items,
            total_pages: self.total_pages,
            has_next: self.has_next,
            has_prev: self.has_prev,
        }
    }
}

/// Escape LIKE wildcards so the term matches literally
fn like_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for c in term.to_lowercase().chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

/// Case-insensitive substring match in any of the four text fields.
/// Both sides are folded in Rust, so Cyrillic matches on every backend.
fn search_condition(term: &str) -> Condition {
    Condition::all().add(
        Expr::col(IdeaColumn::SearchText).like(LikeExpr::new(like_pattern(term)).escape('\\')),
    )
}

#[derive(Clone)]
pub struct IdeaListing {
    pool: DbPool,
    page_size: u64,
}

impl IdeaListing {
    pub fn new(pool: DbPool, page_size: u64) -> Self {
        Self {
            pool,
            page_size: page_size.max(1),
        }
    }

    pub fn page_size(&self) -> u64 {
        self.page_size
    }

    fn select(query: &ListingQuery) -> Select<IdeaEntity> {
        let mut select = IdeaEntity::find();

        select = match (query.audience, query.published) {
            (Audience::Public, _) => select.filter(IdeaColumn::IsPublished.eq(true)),
            (Audience::Moderator, PublishedFilter::All) => select,
            (Audience::Moderator, PublishedFilter::Published) => {
                select.filter(IdeaColumn::IsPublished.eq(true))
            }
            (Audience::Moderator, PublishedFilter::Unpublished) => {
                select.filter(IdeaColumn::IsPublished.eq(false))
            }
        };

        if let Some(status) = query.status {
            select = select.filter(IdeaColumn::Status.eq(status));
        }
        if let Some(category) = &query.category {
            select = select.filter(IdeaColumn::Category.eq(category.as_str()));
        }
        if let Some(term) = &query.search {
            select = select.filter(search_condition(term));
        }

        let order: Order = query.direction.into();
        select = match query.sort {
            SortKey::CreatedAt => select.order_by(IdeaColumn::CreatedAt, order.clone()),
            SortKey::Title => select.order_by(IdeaColumn::Title, order.clone()),
            SortKey::Author => select.order_by(IdeaColumn::AuthorName, order.clone()),
            SortKey::Category => select.order_by(IdeaColumn::Category, order.clone()),
            SortKey::Status => select.order_by(IdeaColumn::Status, order.clone()),
        };
        if query.sort != SortKey::CreatedAt {
            select = select.order_by_desc(IdeaColumn::CreatedAt);
        }
        // Id breaks timestamp ties so pages never overlap
        select.order_by(IdeaColumn::Id, order)
    }

    /// Produce the requested page. Pages past the end are empty.
    pub async fn list(&self, query: &ListingQuery) -> Result<Page<Idea>> {
        let paginator = Self::select(query).paginate(self.pool.conn(), self.page_size);

        let ItemsAndPagesNumber {
            number_of_items,
            number_of_pages,
        } = paginator.num_items_and_pages().await?;

        let page = query.page.max(1);
        let items = if page <= number_of_pages {
            paginator.fetch_page(page - 1).await?
        } else {
            Vec::new()
        };

        Ok(Page {
            items,
            page,
            per_page: self.page_size,
            total_items: number_of_items,
            total_pages: number_of_pages,
            has_next: page < number_of_pages,
            has_prev: page > 1,
        })
    }
}
