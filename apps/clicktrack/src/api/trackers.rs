//! Tracker app handlers: the public redirect and the admin views.

use super::client::ClientMeta;
use super::error::ApiError;
use super::extract::{ApiJson, ApiPath, ApiQuery};
use super::views::{ClickPageView, PageNav, TrackerPageView, TrackerView};
use super::{AppState, found, unix_now};
use crate::tasks::Task;
use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Response;
use clicktrack_core::{Attribution, Click, ClickFilter, Cursor, LinkBuilder, PageRequest, TrackerId};
use serde::Deserialize;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Deserialize)]
pub struct CreateTrackerRequest {
    pub url: String,
    #[serde(default)]
    pub user: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateTrackerRequest {
    pub url: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TrackerListQuery {
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub page: Option<usize>,
    #[serde(default)]
    pub cursor: Option<Cursor>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClickListQuery {
    #[serde(default)]
    pub campaign: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub medium: String,
    #[serde(default)]
    pub page: Option<usize>,
    #[serde(default)]
    pub cursor: Option<Cursor>,
}

impl ClickListQuery {
    fn split(self) -> (ClickFilter, PageRequest) {
        let filter = ClickFilter {
            campaign: self.campaign,
            source: self.source,
            medium: self.medium,
        };
        let request = PageRequest {
            page: self.page,
            cursor: self.cursor,
        };
        (filter, request)
    }
}

fn not_found(id: TrackerId) -> ApiError {
    ApiError::NotFound(format!("tracker {id} not found"))
}

/// `GET /trackers/{id}`: queue a click and redirect.
///
/// The redirect does not wait for the click to be stored. If the queue cannot
/// take the click, it is dropped and the visitor is still redirected.
pub async fn follow_tracker(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<u64>,
    ApiQuery(attribution): ApiQuery<Attribution>,
    client: ClientMeta,
) -> Result<Response, ApiError> {
    let id = TrackerId(id);
    let tracker = state.lookup_tracker(id).await?.ok_or_else(|| not_found(id))?;

    let click = Click {
        remote_addr: client.remote_addr,
        user_agent: client.user_agent,
        attribution,
        date: unix_now(),
    };
    match state.queue.enqueue(Task::record_click(id, click)) {
        Ok(task_id) => debug!(tracker = %id, %task_id, "click queued"),
        Err(err) => warn!(tracker = %id, error = %err, "click dropped"),
    }

    Ok(found(&tracker.url))
}

/// `POST /trackers`
pub async fn create_tracker(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<CreateTrackerRequest>,
) -> Result<(StatusCode, Json<TrackerView>), ApiError> {
    let user = body.user.unwrap_or_default();
    let tracker = state
        .with_store(move |store| store.create_tracker(&body.url, &user))
        .await?;
    info!(tracker = %tracker.id, url = %tracker.url, "tracker created");
    Ok((
        StatusCode::CREATED,
        Json(TrackerView::new(&tracker, &state.config.base_url)),
    ))
}

/// `GET /trackers`
pub async fn list_trackers(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<TrackerListQuery>,
) -> Result<Json<TrackerPageView>, ApiError> {
    let per_page = state.config.per_page;
    let request = PageRequest {
        page: query.page,
        cursor: query.cursor,
    };
    let user = query.user.filter(|u| !u.is_empty());
    let links = LinkBuilder::new("/trackers").with_params(user.as_deref().map(|u| ("user", u)));

    let page = state
        .with_store(move |store| store.trackers_page(user.as_deref(), &request, per_page))
        .await?;

    let base_url = state.config.base_url.as_str();
    Ok(Json(TrackerPageView {
        nav: PageNav::new(&page, &links),
        trackers: page
            .items
            .iter()
            .map(|tracker| TrackerView::new(tracker, base_url))
            .collect(),
    }))
}

/// `GET /trackers/{id}/edit`
pub async fn show_tracker(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<u64>,
) -> Result<Json<TrackerView>, ApiError> {
    let id = TrackerId(id);
    let tracker = state
        .with_store(move |store| store.tracker(id))
        .await?
        .ok_or_else(|| not_found(id))?;
    Ok(Json(TrackerView::new(&tracker, &state.config.base_url)))
}

/// `POST /trackers/{id}/edit`
pub async fn update_tracker(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<u64>,
    ApiJson(body): ApiJson<UpdateTrackerRequest>,
) -> Result<Json<TrackerView>, ApiError> {
    let id = TrackerId(id);
    let tracker = state
        .with_store(move |store| store.update_tracker_url(id, &body.url))
        .await?;
    state.forget_tracker(id);
    info!(tracker = %id, url = %tracker.url, "tracker updated");
    Ok(Json(TrackerView::new(&tracker, &state.config.base_url)))
}

/// `GET /trackers/{id}/clicks`
pub async fn list_clicks(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<u64>,
    ApiQuery(query): ApiQuery<ClickListQuery>,
) -> Result<Json<ClickPageView>, ApiError> {
    let id = TrackerId(id);
    let per_page = state.config.per_page;
    let (filter, request) = query.split();

    let store_filter = filter.clone();
    let (tracker, page) = state
        .with_store(move |store| {
            let Some(tracker) = store.tracker(id)? else {
                return Err(clicktrack_core::Error::TrackerNotFound(id));
            };
            let page = store.clicks_page(id, &store_filter, &request, per_page)?;
            Ok((tracker, page))
        })
        .await?;

    Ok(Json(ClickPageView::new(
        &tracker,
        &filter,
        page,
        &state.config.base_url,
    )))
}
