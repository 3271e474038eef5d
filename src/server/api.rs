//! REST API routes and handlers
//!
//! JSON in, JSON out, wrapped in a uniform [`ApiResponse`] envelope. The
//! auth collaborator in front of this service identifies the caller via the
//! `x-actor-id` / `x-actor-role` headers; absent headers mean an anonymous
//! visitor keyed by IP. Bulk actions are best-effort per item: one item's
//! failure lands in its own result row and the rest proceed.

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::ads::{AdvertisementUpdate, NewAdvertisement};
use crate::content::{NewNews, NewsOrder, NewsQuery, NewsUpdate};
use crate::error::{Error, ErrorCategory};
use crate::feed::export::{render_rss, ChannelInfo};
use crate::feed::{FeedUpdate, NewFeed};
use crate::media::NewMedia;
use crate::models::{
    Actor, AdPosition, CommentAuthor, Identity, NewsStatus, ReactionKind, Role,
};
use crate::settings::{SettingOptions, SettingValue};
use crate::taxonomy::{CategoryFilter, CategoryUpdate, NewCategory, NewTag};

use super::app::AppState;

// ============================================================================
// API Response Types
// ============================================================================

/// Generic API response wrapper
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

/// Simple error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match self.category() {
            ErrorCategory::Validation => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorCategory::Conflict => StatusCode::CONFLICT,
            ErrorCategory::NotFound => StatusCode::NOT_FOUND,
            ErrorCategory::Forbidden => StatusCode::FORBIDDEN,
            ErrorCategory::Network | ErrorCategory::Format => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "request failed");
        }

        let body = Json(ErrorResponse {
            success: false,
            error: self.to_string(),
        });
        (status, body).into_response()
    }
}

type ApiResult<T> = std::result::Result<Json<ApiResponse<T>>, Error>;

fn ok<T: Serialize>(data: T) -> ApiResult<T> {
    Ok(Json(ApiResponse::success(data)))
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
}

// ============================================================================
// Caller identity
// ============================================================================

/// Actor supplied by the upstream auth layer, if any
fn actor_from(headers: &HeaderMap) -> Option<Actor> {
    let user_id = headers
        .get("x-actor-id")?
        .to_str()
        .ok()?
        .parse::<i64>()
        .ok()?;
    let role = headers
        .get("x-actor-role")
        .and_then(|v| v.to_str().ok())
        .and_then(Role::parse)
        .unwrap_or(Role::Subscriber);
    Some(Actor::new(user_id, role))
}

/// Attribution identity: the actor when present, else the visitor IP
fn identity_from(headers: &HeaderMap) -> Identity {
    if let Some(actor) = actor_from(headers) {
        return Identity::registered(actor.user_id);
    }

    let ip = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .unwrap_or_else(|| "0.0.0.0".to_string());
    Identity::anonymous(ip)
}

// ============================================================================
// Router
// ============================================================================

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health
        .route("/api/health", get(health_check))
        // News
        .route("/api/news", get(list_news).post(create_news))
        .route("/api/news/trending", get(trending_news))
        .route("/api/news/bulk", post(bulk_news_action))
        .route(
            "/api/news/{id}",
            get(get_news).put(update_news).delete(delete_news),
        )
        .route("/api/news/{id}/publish", post(publish_news))
        .route("/api/news/{id}/archive", post(archive_news))
        .route("/api/news/{id}/related", get(related_news))
        .route("/api/news/{id}/view", post(record_view))
        .route("/api/news/{id}/reaction", post(set_reaction))
        .route(
            "/api/news/{id}/comments",
            get(list_comments).post(submit_comment),
        )
        // Categories
        .route("/api/categories", get(list_categories).post(create_category))
        .route("/api/categories/popular", get(popular_categories))
        .route(
            "/api/categories/{id}",
            get(get_category).put(update_category).delete(delete_category),
        )
        .route("/api/categories/{id}/breadcrumb", get(category_breadcrumb))
        // Tags
        .route("/api/tags", get(list_tags).post(create_tag))
        .route("/api/tags/{id}", axum::routing::delete(delete_tag))
        // Comments
        .route(
            "/api/comments/{id}",
            put(update_comment).delete(delete_comment),
        )
        .route("/api/comments/{id}/approve", post(approve_comment))
        .route("/api/comments/{id}/reject", post(reject_comment))
        .route("/api/comments/{id}/spam", post(spam_comment))
        .route("/api/comments/{id}/pin", post(pin_comment))
        // Media
        .route("/api/media", get(list_media).post(create_media))
        .route("/api/media/{id}", axum::routing::delete(delete_media))
        // Feeds
        .route("/api/feeds", get(list_feeds).post(create_feed))
        .route("/api/feeds/stats", get(feed_statistics))
        .route("/api/feeds/test", post(test_feed))
        .route("/api/feeds/fetch-all", post(fetch_all_feeds))
        .route("/api/feeds/bulk", post(bulk_feed_action))
        .route(
            "/api/feeds/{id}",
            get(get_feed).put(update_feed).delete(delete_feed),
        )
        .route("/api/feeds/{id}/fetch", post(fetch_feed))
        // Advertisements
        .route("/api/ads", get(list_ads).post(create_ad))
        .route(
            "/api/ads/{id}",
            get(get_ad).put(update_ad).delete(delete_ad),
        )
        .route("/api/ads/{id}/impression", post(ad_impression))
        .route("/api/ads/{id}/click", post(ad_click))
        .route("/api/ads/position/{position}", get(ads_for_position))
        // Settings
        .route("/api/settings", get(list_settings))
        .route("/api/settings/{key}", put(put_setting).delete(delete_setting))
        // Public RSS export
        .route("/rss", get(rss_export))
        .with_state(state)
}

// ============================================================================
// Health
// ============================================================================

async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(ApiResponse::success(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
    }))
}

// ============================================================================
// News
// ============================================================================

#[derive(Debug, Default, Deserialize)]
struct NewsListParams {
    status: Option<String>,
    category: Option<i64>,
    author: Option<i64>,
    language: Option<String>,
    search: Option<String>,
    #[serde(default)]
    featured: bool,
    /// "latest" (default) or "popular"
    sort: Option<String>,
    #[serde(default)]
    page: usize,
    per_page: Option<usize>,
    /// "1" restricts to publicly visible articles
    #[serde(default)]
    public: bool,
}

async fn list_news(
    State(state): State<AppState>,
    Query(params): Query<NewsListParams>,
) -> ApiResult<Vec<crate::content::News>> {
    let status = match &params.status {
        Some(raw) => Some(
            NewsStatus::parse(raw)
                .ok_or_else(|| Error::validation(format!("invalid status: {raw}")))?,
        ),
        None => None,
    };

    // Category scope includes subcategories
    let category_ids = match params.category {
        Some(id) => state.categories.descendant_ids(id)?,
        None => Vec::new(),
    };

    let per_page = params
        .per_page
        .unwrap_or_else(|| state.settings.get_i64("articles_per_page", 12) as usize)
        .clamp(1, 100);
    let page = params.page.max(1);

    let articles = state.news.list(&NewsQuery {
        status,
        effectively_published: params.public,
        category_ids,
        author_id: params.author,
        language: params.language,
        featured_only: params.featured,
        search: params.search,
        order: match params.sort.as_deref() {
            Some("popular") => NewsOrder::Popular,
            _ => NewsOrder::Latest,
        },
        limit: Some(per_page),
        offset: (page - 1) * per_page,
    })?;

    ok(articles)
}

async fn create_news(
    State(state): State<AppState>,
    Json(new): Json<NewNews>,
) -> ApiResult<crate::content::News> {
    ok(state.news.create(new)?)
}

async fn get_news(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<crate::content::News> {
    ok(state.news.get(id)?)
}

async fn update_news(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(update): Json<NewsUpdate>,
) -> ApiResult<crate::content::News> {
    ok(state.news.update(id, update)?)
}

async fn delete_news(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<()> {
    ok(state.news.delete(id)?)
}

async fn publish_news(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<crate::content::News> {
    ok(state.news.publish(id)?)
}

async fn archive_news(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<crate::content::News> {
    ok(state.news.archive(id)?)
}

#[derive(Debug, Deserialize)]
struct TrendingParams {
    #[serde(default = "default_trending_days")]
    days: i64,
    #[serde(default = "default_limit")]
    limit: usize,
}

fn default_trending_days() -> i64 {
    7
}

fn default_limit() -> usize {
    10
}

async fn trending_news(
    State(state): State<AppState>,
    Query(params): Query<TrendingParams>,
) -> ApiResult<Vec<crate::content::TrendingArticle>> {
    ok(state.news.trending(params.days, params.limit)?)
}

#[derive(Debug, Deserialize)]
struct RelatedParams {
    #[serde(default = "default_related_limit")]
    limit: usize,
}

fn default_related_limit() -> usize {
    5
}

async fn related_news(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(params): Query<RelatedParams>,
) -> ApiResult<Vec<crate::content::News>> {
    ok(state.news.related(id, params.limit)?)
}

async fn record_view(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> ApiResult<crate::engagement::NewsView> {
    let identity = identity_from(&headers);
    let context = crate::engagement::ViewContext {
        user_agent: headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(String::from),
        referer: headers
            .get(header::REFERER)
            .and_then(|v| v.to_str().ok())
            .map(String::from),
    };
    ok(state.views.record(id, &identity, &context)?)
}

#[derive(Debug, Deserialize)]
struct ReactionRequest {
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Debug, Serialize)]
struct ReactionResponse {
    change: crate::engagement::ReactionChange,
    #[serde(flatten)]
    counts: crate::engagement::ReactionCounts,
}

async fn set_reaction(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    headers: HeaderMap,
    Json(request): Json<ReactionRequest>,
) -> ApiResult<ReactionResponse> {
    let kind = ReactionKind::parse(&request.kind)
        .ok_or_else(|| Error::validation(format!("invalid reaction type: {}", request.kind)))?;

    let identity = identity_from(&headers);
    let change = state.reactions.set_reaction(id, kind, &identity)?;
    let counts = state.reactions.counts(id)?;

    ok(ReactionResponse { change, counts })
}

/// Bulk action over selected articles; one failure does not stop the rest
#[derive(Debug, Deserialize)]
struct BulkActionRequest {
    action: String,
    selected: Vec<i64>,
}

#[derive(Debug, Serialize)]
struct BulkItemResult {
    id: i64,
    outcome: std::result::Result<(), String>,
}

async fn bulk_news_action(
    State(state): State<AppState>,
    Json(request): Json<BulkActionRequest>,
) -> ApiResult<Vec<BulkItemResult>> {
    if request.selected.is_empty() {
        return Err(Error::validation("no items selected"));
    }

    let mut results = Vec::with_capacity(request.selected.len());
    for id in request.selected {
        let outcome = match request.action.as_str() {
            "publish" => state.news.publish(id).map(|_| ()),
            "archive" => state.news.archive(id).map(|_| ()),
            "draft" => state.news.make_draft(id).map(|_| ()),
            "delete" => state.news.delete(id),
            other => Err(Error::validation(format!("unknown bulk action: {other}"))),
        };
        results.push(BulkItemResult {
            id,
            outcome: outcome.map_err(|e| e.to_string()),
        });
    }

    ok(results)
}

// ============================================================================
// Categories
// ============================================================================

#[derive(Debug, Default, Deserialize)]
struct CategoryListParams {
    #[serde(default)]
    active: bool,
    #[serde(default)]
    root: bool,
    language: Option<String>,
    search: Option<String>,
}

async fn list_categories(
    State(state): State<AppState>,
    Query(params): Query<CategoryListParams>,
) -> ApiResult<Vec<crate::taxonomy::Category>> {
    ok(state.categories.list(&CategoryFilter {
        active_only: params.active,
        root_only: params.root,
        language: params.language,
        search: params.search,
    })?)
}

async fn create_category(
    State(state): State<AppState>,
    Json(new): Json<NewCategory>,
) -> ApiResult<crate::taxonomy::Category> {
    ok(state.categories.create(new)?)
}

async fn get_category(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<crate::taxonomy::Category> {
    ok(state.categories.get(id)?)
}

async fn update_category(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(update): Json<CategoryUpdate>,
) -> ApiResult<crate::taxonomy::Category> {
    ok(state.categories.update(id, update)?)
}

async fn delete_category(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<()> {
    ok(state.categories.delete(id)?)
}

async fn category_breadcrumb(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Vec<crate::taxonomy::Category>> {
    ok(state.categories.breadcrumb(id)?)
}

async fn popular_categories(
    State(state): State<AppState>,
    Query(params): Query<RelatedParams>,
) -> ApiResult<Vec<crate::taxonomy::PopularCategory>> {
    ok(state.categories.popular(params.limit, chrono::Utc::now())?)
}

// ============================================================================
// Tags
// ============================================================================

async fn list_tags(State(state): State<AppState>) -> ApiResult<Vec<crate::taxonomy::Tag>> {
    ok(state.tags.list(false)?)
}

async fn create_tag(
    State(state): State<AppState>,
    Json(new): Json<NewTag>,
) -> ApiResult<crate::taxonomy::Tag> {
    ok(state.tags.create(new)?)
}

async fn delete_tag(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<()> {
    ok(state.tags.delete(id)?)
}

// ============================================================================
// Comments
// ============================================================================

#[derive(Debug, Deserialize)]
struct CommentRequest {
    content: String,
    parent_id: Option<i64>,
    guest_name: Option<String>,
    guest_email: Option<String>,
}

async fn list_comments(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Vec<crate::engagement::Comment>> {
    ok(state.comments.for_news(id)?)
}

async fn submit_comment(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    headers: HeaderMap,
    Json(request): Json<CommentRequest>,
) -> ApiResult<crate::engagement::Comment> {
    let actor = actor_from(&headers);

    let author = match &actor {
        Some(actor) => CommentAuthor::Registered {
            user_id: actor.user_id,
        },
        None => CommentAuthor::Guest {
            name: request.guest_name.unwrap_or_default(),
            email: request.guest_email.unwrap_or_default(),
        },
    };

    let ip_address = match identity_from(&headers) {
        Identity::Anonymous { ip } => Some(ip),
        Identity::Registered { .. } => None,
    };

    ok(state.comments.submit(
        crate::engagement::NewComment {
            news_id: id,
            parent_id: request.parent_id,
            content: request.content,
            author,
            ip_address,
        },
        actor.as_ref(),
    )?)
}

#[derive(Debug, Deserialize)]
struct CommentEditRequest {
    content: String,
}

fn require_actor(headers: &HeaderMap) -> Result<Actor, Error> {
    actor_from(headers).ok_or_else(|| Error::forbidden("authentication required"))
}

async fn update_comment(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    headers: HeaderMap,
    Json(request): Json<CommentEditRequest>,
) -> ApiResult<crate::engagement::Comment> {
    let actor = require_actor(&headers)?;
    ok(state.comments.update_content(id, &request.content, &actor)?)
}

async fn delete_comment(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> ApiResult<()> {
    let actor = require_actor(&headers)?;
    ok(state.comments.delete(id, &actor)?)
}

async fn approve_comment(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<crate::engagement::Comment> {
    ok(state.comments.approve(id)?)
}

async fn reject_comment(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<crate::engagement::Comment> {
    ok(state.comments.reject(id)?)
}

async fn spam_comment(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<crate::engagement::Comment> {
    ok(state.comments.mark_spam(id)?)
}

async fn pin_comment(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<crate::engagement::Comment> {
    ok(state.comments.toggle_pin(id)?)
}

// ============================================================================
// Media
// ============================================================================

async fn list_media(State(state): State<AppState>) -> ApiResult<Vec<crate::media::Media>> {
    ok(state.media.list(&Default::default())?)
}

async fn create_media(
    State(state): State<AppState>,
    Json(new): Json<NewMedia>,
) -> ApiResult<crate::media::Media> {
    ok(state.media.create(new)?)
}

async fn delete_media(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<()> {
    ok(state.media.delete(id)?)
}

// ============================================================================
// Feeds
// ============================================================================

async fn list_feeds(State(state): State<AppState>) -> ApiResult<Vec<crate::feed::RssFeed>> {
    ok(state.feeds.list(None)?)
}

async fn create_feed(
    State(state): State<AppState>,
    Json(new): Json<NewFeed>,
) -> ApiResult<crate::feed::RssFeed> {
    ok(state.feeds.create(new)?)
}

async fn get_feed(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<crate::feed::RssFeed> {
    ok(state.feeds.get(id)?)
}

async fn update_feed(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(update): Json<FeedUpdate>,
) -> ApiResult<crate::feed::RssFeed> {
    ok(state.feeds.update(id, update)?)
}

async fn delete_feed(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<()> {
    ok(state.feeds.delete(id)?)
}

async fn fetch_feed(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<crate::feed::FetchOutcome> {
    ok(state.importer.fetch_one(id).await?)
}

async fn fetch_all_feeds(
    State(state): State<AppState>,
) -> ApiResult<Vec<crate::feed::BulkFetchResult>> {
    ok(state.importer.fetch_all().await?)
}

#[derive(Debug, Deserialize)]
struct TestFeedRequest {
    url: String,
}

async fn test_feed(
    State(state): State<AppState>,
    Json(request): Json<TestFeedRequest>,
) -> ApiResult<crate::feed::FeedProbe> {
    ok(state.importer.test_url(&request.url).await?)
}

async fn feed_statistics(
    State(state): State<AppState>,
) -> ApiResult<crate::feed::FeedStatistics> {
    ok(state.feeds.statistics()?)
}

async fn bulk_feed_action(
    State(state): State<AppState>,
    Json(request): Json<BulkActionRequest>,
) -> ApiResult<Vec<BulkItemResult>> {
    if request.selected.is_empty() {
        return Err(Error::validation("no items selected"));
    }

    let mut results = Vec::with_capacity(request.selected.len());
    for id in request.selected {
        let outcome = match request.action.as_str() {
            "activate" => state
                .feeds
                .update(
                    id,
                    FeedUpdate {
                        status: Some(crate::models::FeedStatus::Active),
                        ..Default::default()
                    },
                )
                .map(|_| ()),
            "deactivate" => state
                .feeds
                .update(
                    id,
                    FeedUpdate {
                        status: Some(crate::models::FeedStatus::Inactive),
                        ..Default::default()
                    },
                )
                .map(|_| ()),
            "delete" => state.feeds.delete(id),
            "fetch" => state.importer.fetch_one(id).await.map(|_| ()),
            other => Err(Error::validation(format!("unknown bulk action: {other}"))),
        };
        results.push(BulkItemResult {
            id,
            outcome: outcome.map_err(|e| e.to_string()),
        });
    }

    ok(results)
}

// ============================================================================
// Advertisements
// ============================================================================

async fn list_ads(State(state): State<AppState>) -> ApiResult<Vec<crate::ads::Advertisement>> {
    ok(state.ads.list(None)?)
}

async fn create_ad(
    State(state): State<AppState>,
    Json(new): Json<NewAdvertisement>,
) -> ApiResult<crate::ads::Advertisement> {
    ok(state.ads.create(new)?)
}

async fn get_ad(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<crate::ads::Advertisement> {
    ok(state.ads.get(id)?)
}

async fn update_ad(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(update): Json<AdvertisementUpdate>,
) -> ApiResult<crate::ads::Advertisement> {
    ok(state.ads.update(id, update)?)
}

async fn delete_ad(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<()> {
    ok(state.ads.delete(id)?)
}

async fn ad_impression(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<crate::ads::Advertisement> {
    ok(state.ads.record_impression(id)?)
}

async fn ad_click(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<crate::ads::Advertisement> {
    ok(state.ads.record_click(id)?)
}

async fn ads_for_position(
    State(state): State<AppState>,
    Path(position): Path<String>,
    Query(params): Query<RelatedParams>,
) -> ApiResult<Vec<crate::ads::Advertisement>> {
    let position = AdPosition::parse(&position)
        .ok_or_else(|| Error::validation(format!("invalid position: {position}")))?;
    ok(state.ads.get_for_position(position, Some(params.limit))?)
}

// ============================================================================
// Settings
// ============================================================================

async fn list_settings(
    State(state): State<AppState>,
) -> ApiResult<Vec<crate::settings::Setting>> {
    let mut settings: Vec<_> = state.settings.all()?.into_values().collect();
    settings.sort_by(|a, b| a.group.cmp(&b.group).then(a.key.cmp(&b.key)));
    ok(settings)
}

#[derive(Debug, Deserialize)]
struct PutSettingRequest {
    #[serde(flatten)]
    value: SettingValue,
    #[serde(flatten)]
    options: SettingOptions,
}

async fn put_setting(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Json(request): Json<PutSettingRequest>,
) -> ApiResult<crate::settings::Setting> {
    ok(state.settings.set(&key, request.value, request.options)?)
}

async fn delete_setting(State(state): State<AppState>, Path(key): Path<String>) -> ApiResult<bool> {
    ok(state.settings.forget(&key)?)
}

// ============================================================================
// RSS export
// ============================================================================

#[derive(Debug, Default, Deserialize)]
struct RssParams {
    category: Option<i64>,
    #[serde(default = "default_rss_limit")]
    limit: usize,
}

fn default_rss_limit() -> usize {
    20
}

async fn rss_export(
    State(state): State<AppState>,
    Query(params): Query<RssParams>,
) -> Result<Response, Error> {
    if !state.settings.get_bool("enable_rss", true) {
        return Err(Error::conflict("RSS export is disabled"));
    }

    let site_name = state
        .settings
        .get("site_name")?
        .and_then(|v| v.as_str().map(String::from))
        .unwrap_or_else(|| state.config.site.name.clone());

    let mut description = state
        .settings
        .get("site_description")?
        .and_then(|v| v.as_str().map(String::from))
        .unwrap_or_else(|| format!("Latest news from {site_name}"));

    let category_ids = match params.category {
        Some(id) => {
            let category = state.categories.get(id)?;
            description = format!("Latest news from {} - {site_name}", category.name);
            state.categories.descendant_ids(id)?
        }
        None => Vec::new(),
    };

    let articles = state.news.list(&NewsQuery {
        effectively_published: true,
        category_ids,
        order: NewsOrder::Latest,
        limit: Some(params.limit.clamp(1, 100)),
        ..Default::default()
    })?;

    let xml = render_rss(
        &ChannelInfo {
            title: site_name,
            description,
            link: state.config.site.base_url.clone(),
        },
        &articles,
    );

    Ok((
        [(header::CONTENT_TYPE, "application/rss+xml; charset=utf-8")],
        xml,
    )
        .into_response())
}
