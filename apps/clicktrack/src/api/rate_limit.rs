//! Global request rate limit.

use super::error::ApiError;
use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;

pub type SharedLimiter = Arc<DefaultDirectRateLimiter>;

/// Limiter allowing `per_second` requests per second. `0` disables limiting.
#[must_use]
pub fn limiter(per_second: u32) -> Option<SharedLimiter> {
    let per_second = NonZeroU32::new(per_second)?;
    Some(Arc::new(RateLimiter::direct(Quota::per_second(per_second))))
}

pub async fn enforce(State(limiter): State<SharedLimiter>, request: Request, next: Next) -> Response {
    if limiter.check().is_err() {
        tracing::warn!(path = %request.uri().path(), "rate limit exceeded");
        return ApiError::TooManyRequests.into_response();
    }
    next.run(request).await
}
