//! # HTTP API
//!
//! axum server for the tracker app and the sign-up app.
//!
//! ## Routes
//!
//! | method | path                    | access | purpose                         |
//! |--------|-------------------------|--------|---------------------------------|
//! | GET    | `/`                     | public | sign-up form                    |
//! | POST   | `/signups`              | public | capture an email address        |
//! | GET    | `/signups`              | admin  | sign-up listing                 |
//! | GET    | `/trackers/{id}`        | public | record a click and redirect     |
//! | GET    | `/trackers`             | admin  | tracker listing                 |
//! | POST   | `/trackers`             | admin  | create a tracker                |
//! | GET    | `/trackers/{id}/edit`   | admin  | tracker details and links       |
//! | POST   | `/trackers/{id}/edit`   | admin  | change the destination URL      |
//! | GET    | `/trackers/{id}/clicks` | admin  | filtered click listing          |
//! | GET    | `/health`               | public | liveness                        |

pub mod auth;
pub mod client;
pub mod error;
pub mod extract;
pub mod rate_limit;
pub mod signups;
pub mod trackers;
pub mod views;

use crate::config::ServerConfig;
use crate::tasks::{SharedCache, Task, TaskQueue, Worker};
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE, LOCATION};
use axum::http::{HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router, middleware};
use clicktrack_core::{Store, Tracker, TrackerCache, TrackerId};
use error::ApiError;
use signups::EmailValidator;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use views::HealthResponse;

/// Shared state handed to every handler.
#[derive(Debug, Clone)]
pub struct AppState {
    pub store: Arc<Store>,
    pub cache: SharedCache,
    pub queue: TaskQueue,
    pub config: Arc<ServerConfig>,
    pub email: Arc<EmailValidator>,
    /// Bumped under the cache lock whenever a tracker is forgotten.
    cache_epoch: Arc<AtomicU64>,
}

impl AppState {
    /// Build the state and the receiving end of its task queue.
    pub fn new(
        store: Arc<Store>,
        config: ServerConfig,
    ) -> Result<(Self, mpsc::Receiver<Task>), regex::Error> {
        let (queue, receiver) = TaskQueue::bounded(config.queue_capacity);
        let cache = Arc::new(Mutex::new(TrackerCache::new(config.cache_size)));
        let state = Self {
            store,
            cache,
            queue,
            config: Arc::new(config),
            email: Arc::new(EmailValidator::new()?),
            cache_epoch: Arc::new(AtomicU64::new(0)),
        };
        Ok((state, receiver))
    }

    /// A worker writing to this state's store and cache.
    #[must_use]
    pub fn worker(&self) -> Worker {
        Worker::new(Arc::clone(&self.store), Arc::clone(&self.cache))
            .with_retry(self.config.max_attempts, self.config.retry_backoff)
    }

    /// Run a store operation on the blocking pool.
    pub async fn with_store<T, F>(&self, f: F) -> Result<T, ApiError>
    where
        F: FnOnce(&Store) -> clicktrack_core::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || f(&store))
            .await
            .map_err(|e| ApiError::Internal(format!("store task failed: {e}")))?
            .map_err(ApiError::from)
    }

    /// Cache-aside tracker lookup.
    ///
    /// A poisoned cache lock counts as a miss.
    pub async fn lookup_tracker(&self, id: TrackerId) -> Result<Option<Tracker>, ApiError> {
        let cached = self.cache.lock().ok().and_then(|mut cache| cache.get(&id));
        if cached.is_some() {
            return Ok(cached);
        }

        let epoch = self.cache_epoch();
        let tracker = self.with_store(move |store| store.tracker(id)).await?;
        if let Some(tracker) = &tracker {
            self.remember_tracker(tracker, epoch);
        }
        Ok(tracker)
    }

    fn cache_epoch(&self) -> u64 {
        self.cache_epoch.load(Ordering::SeqCst)
    }

    /// Cache a tracker read from the store, unless a tracker was forgotten
    /// since `epoch`. The read may predate that change.
    fn remember_tracker(&self, tracker: &Tracker, epoch: u64) -> bool {
        let Ok(mut cache) = self.cache.lock() else {
            return false;
        };
        if self.cache_epoch() != epoch {
            return false;
        }
        cache.insert(tracker.id, tracker.clone());
        true
    }

    /// Drop a tracker from the cache after it changed.
    pub fn forget_tracker(&self, id: TrackerId) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.invalidate(&id);
            self.cache_epoch.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// Current unix time in seconds.
pub(crate) fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}

/// `302 Found` to `location`.
pub(crate) fn found(location: &str) -> Response {
    match HeaderValue::from_str(location) {
        Ok(value) => (StatusCode::FOUND, [(LOCATION, value)]).into_response(),
        Err(_) => ApiError::Internal(format!("unusable redirect target: {location}")).into_response(),
    }
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(origins.iter().filter_map(|o| HeaderValue::from_str(o).ok()))
    };
    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE])
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    let admin = middleware::from_fn_with_state(state.clone(), auth::require_api_key);

    let mut app = Router::new()
        .route("/", get(signups::signup_form))
        .route("/health", get(health))
        .route(
            "/signups",
            get(signups::list_signups)
                .route_layer(admin.clone())
                .post(signups::create_signup),
        )
        .route(
            "/trackers",
            get(trackers::list_trackers)
                .post(trackers::create_tracker)
                .route_layer(admin.clone()),
        )
        .route("/trackers/{id}", get(trackers::follow_tracker))
        .route(
            "/trackers/{id}/edit",
            get(trackers::show_tracker)
                .post(trackers::update_tracker)
                .route_layer(admin.clone()),
        )
        .route(
            "/trackers/{id}/clicks",
            get(trackers::list_clicks).route_layer(admin),
        )
        .with_state(state.clone());

    if let Some(limiter) = rate_limit::limiter(state.config.rate_limit) {
        app = app.layer(middleware::from_fn_with_state(limiter, rate_limit::enforce));
    }

    app.layer(cors_layer(&state.config.cors_origins))
        .layer(TraceLayer::new_for_http())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "failed to listen for shutdown signal");
        return;
    }
    info!("shutdown signal received");
}

/// Serve until Ctrl-C, then drain the task queue.
pub async fn serve(
    store: Store,
    config: ServerConfig,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    if config.api_key.is_none() {
        warn!("no API key configured; admin routes are open");
    }
    let addr = config.bind_addr();
    let (state, receiver) = AppState::new(Arc::new(store), config)?;
    let worker = state.worker().spawn(receiver);

    let listener = TcpListener::bind(&addr).await?;
    info!(%addr, "clicktrack listening");

    axum::serve(
        listener,
        router(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("server stopped, draining task queue");
    worker.await?;
    Ok(())
}
