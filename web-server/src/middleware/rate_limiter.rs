// web-server/src/middleware/rate_limiter.rs
use actix_web::{
    body::EitherBody,
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::{header, StatusCode},
    Error, HttpResponse, ResponseError,
};
use dashmap::DashMap;
use futures_util::future::{ready, LocalBoxFuture, Ready};
use sneradar_common::{ErrorBody, RateLimitConfig};
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

#[derive(Debug)]
struct RateLimitExceeded {
    retry_after_secs: u64,
}

impl fmt::Display for RateLimitExceeded {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Rate limit exceeded")
    }
}

impl ResponseError for RateLimitExceeded {
    fn status_code(&self) -> StatusCode {
        StatusCode::TOO_MANY_REQUESTS
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::TooManyRequests()
            .append_header((header::RETRY_AFTER, self.retry_after_secs.to_string()))
            .json(ErrorBody::new(
                "RATE_LIMITED",
                "Too many authentication attempts. Please try again later.",
            ))
    }
}

/// Sliding-window limiter keyed by client IP, applied to path prefixes.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    paths: Arc<Vec<String>>,
    max_requests: usize,
    window: Duration,
    hits: Arc<DashMap<String, VecDeque<Instant>>>,
    last_prune: Arc<Mutex<Option<Instant>>>,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            paths: Arc::new(config.paths.clone()),
            max_requests: config.max_requests,
            window: Duration::from_secs(config.window_secs),
            hits: Arc::new(DashMap::new()),
            last_prune: Arc::new(Mutex::new(None)),
        }
    }

    fn applies_to(&self, path: &str) -> bool {
        self.paths.iter().any(|p| path.starts_with(p.as_str()))
    }

    /// Record a hit for `ip` at `now`. On refusal returns the seconds until
    /// the oldest hit leaves the window.
    fn check(&self, ip: &str, now: Instant) -> Result<(), u64> {
        self.maybe_prune(now);

        let mut hits = self.hits.entry(ip.to_string()).or_default();
        while hits
            .front()
            .is_some_and(|first| now.duration_since(*first) >= self.window)
        {
            hits.pop_front();
        }

        if hits.len() >= self.max_requests {
            let oldest = hits.front().copied().unwrap_or(now);
            let remaining = self.window.saturating_sub(now.duration_since(oldest));
            return Err(remaining.as_secs().max(1));
        }
        hits.push_back(now);
        Ok(())
    }

    /// Drop clients with no hit inside the window, at most once per window.
    /// Must not run while an entry of `hits` is borrowed.
    fn maybe_prune(&self, now: Instant) {
        let Ok(mut last) = self.last_prune.lock() else {
            return;
        };
        if last.is_some_and(|at| now.saturating_duration_since(at) < self.window) {
            return;
        }
        *last = Some(now);
        drop(last);

        let before = self.hits.len();
        self.hits.retain(|_, hits| {
            hits.back()
                .is_some_and(|latest| now.saturating_duration_since(*latest) < self.window)
        });
        let removed = before.saturating_sub(self.hits.len());
        if removed > 0 {
            tracing::debug!("Rate limiter forgot {} idle clients", removed);
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for RateLimiter
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = RateLimiterMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RateLimiterMiddleware {
            service,
            limiter: self.clone(),
        }))
    }
}

pub struct RateLimiterMiddleware<S> {
    service: S,
    limiter: RateLimiter,
}

impl<S, B> Service<ServiceRequest> for RateLimiterMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        if self.limiter.applies_to(req.path()) {
            let ip = req
                .connection_info()
                .realip_remote_addr()
                .unwrap_or("unknown")
                .to_string();

            if let Err(retry_after_secs) = self.limiter.check(&ip, Instant::now()) {
                tracing::warn!("Rate limit exceeded for {} on {}", ip, req.path());
                let response = req
                    .error_response(RateLimitExceeded { retry_after_secs })
                    .map_into_right_body();
                return Box::pin(async move { Ok(response) });
            }
        }

        let fut = self.service.call(req);
        Box::pin(async move { fut.await.map(ServiceResponse::map_into_left_body) })
    }
}
