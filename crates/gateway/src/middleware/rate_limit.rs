//! Rate limiting middleware using token bucket algorithm

use axum::{extract::Request, middleware::Next, response::Response};
use contractdesk_common::errors::AppError;
use governor::{
    clock::QuantaClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use std::num::NonZeroU32;
use std::sync::Arc;

/// Rate limiter using governor crate
pub type GlobalRateLimiter = RateLimiter<NotKeyed, InMemoryState, QuantaClock>;

/// Global limiter plus the rate it was built with, reported on rejection
pub struct RequestLimiter {
    limiter: GlobalRateLimiter,
    requests_per_second: u32,
}

impl RequestLimiter {
    pub fn check(&self) -> bool {
        self.limiter.check().is_ok()
    }
}

/// Create a new rate limiter. Both limits must be non-zero.
pub fn create_rate_limiter(requests_per_second: u32, burst: u32) -> Result<Arc<RequestLimiter>, AppError> {
    let rate = NonZeroU32::new(requests_per_second).ok_or_else(|| AppError::Configuration {
        message: "rate_limit.requests_per_second must be greater than 0".to_string(),
    })?;
    let burst = NonZeroU32::new(burst).ok_or_else(|| AppError::Configuration {
        message: "rate_limit.burst must be greater than 0".to_string(),
    })?;

    Ok(Arc::new(RequestLimiter {
        limiter: RateLimiter::direct(Quota::per_second(rate).allow_burst(burst)),
        requests_per_second,
    }))
}

/// Rate limiting middleware
pub async fn rate_limit_middleware(
    request: Request,
    next: Next,
    limiter: Arc<RequestLimiter>,
) -> Result<Response, AppError> {
    if limiter.check() {
        return Ok(next.run(request).await);
    }

    tracing::warn!(path = %request.uri().path(), "Rate limit exceeded");
    Err(AppError::RateLimited {
        limit: limiter.requests_per_second,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::assert_ok;

    #[test]
    fn test_rate_limiter_creation() {
        let limiter = assert_ok!(create_rate_limiter(100, 200));
        assert!(limiter.check());
    }

    #[test]
    fn test_zero_limits_are_rejected() {
        assert!(matches!(create_rate_limiter(0, 10), Err(AppError::Configuration { .. })));
        assert!(matches!(create_rate_limiter(10, 0), Err(AppError::Configuration { .. })));
    }

    #[test]
    fn test_burst_is_enforced() {
        let limiter = create_rate_limiter(1, 2).unwrap();
        assert!(limiter.check());
        assert!(limiter.check());
        assert!(!limiter.check());
    }
}
