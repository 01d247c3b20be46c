// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Request middleware: client identification, the abuse shield, the
//! per-request timeout, and cache headers for static assets.

use crate::error::AppError;
use crate::handlers::AppState;
use crate::limiter::{ceil_secs, Admission, Quota, Rejection, Route, Tier, UNKNOWN_CLIENT};
use axum::{
    extract::{ConnectInfo, MatchedPath, Request, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, Method},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

pub const X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
pub const X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
pub const X_RATELIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");
pub const RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("ratelimit-limit");
pub const RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("ratelimit-remaining");
pub const RATELIMIT_RESET: HeaderName = HeaderName::from_static("ratelimit-reset");

/// Identity the shield counted the request under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientId(pub String);

/// Resolve the client identity: first `X-Forwarded-For` entry when trusted,
/// else the peer address, else [`UNKNOWN_CLIENT`].
pub fn client_id(headers: &HeaderMap, peer: Option<SocketAddr>, trust_forwarded: bool) -> String {
    if trust_forwarded {
        let forwarded = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty());
        if let Some(first) = forwarded {
            return first.to_string();
        }
    }
    peer.map_or_else(|| UNKNOWN_CLIENT.to_string(), |addr| addr.ip().to_string())
}

/// Map a request onto the route class the shield cares about.
pub fn classify(method: &Method, path: &str) -> Route {
    match (method, path) {
        (_, "/health") => Route::Health,
        (_, "/favicon.ico") => Route::Favicon,
        (&Method::POST, "/api/contact/submit") => Route::Submission,
        _ => Route::Other,
    }
}

/// Abuse shield. Rejected requests never reach the handler; admitted ones
/// are settled against the handler status and annotated with quota headers.
pub async fn shield(State(state): State<Arc<AppState>>, mut request: Request, next: Next) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let client = client_id(
        request.headers(),
        peer,
        state.config.server.trust_forwarded_for,
    );
    let route = classify(request.method(), request.uri().path());

    let admission = match state.shield.admit(&client, route, Instant::now()).await {
        Ok(admission) => admission,
        Err(rejection) => {
            state
                .metrics
                .shield_decisions
                .with_label_values(&[rejection.tier.as_str(), "limited"])
                .inc();
            warn!(
                client = %client,
                tier = %rejection.tier,
                reason = ?rejection.reason,
                retry_after_secs = rejection.retry_after_secs(),
                path = %request.uri().path(),
                "Request rate limited"
            );
            return rejected(rejection);
        }
    };

    for (tier, quota) in [
        (Tier::Abuse, admission.abuse),
        (Tier::Global, admission.global),
        (Tier::Submission, admission.submission),
    ] {
        if quota.is_some() {
            state
                .metrics
                .shield_decisions
                .with_label_values(&[tier.as_str(), "allowed"])
                .inc();
        }
    }

    request.extensions_mut().insert(ClientId(client));
    let mut response = next.run(request).await;
    state
        .shield
        .settle(&admission, response.status().as_u16())
        .await;
    annotate(response.headers_mut(), &admission);
    response
}

fn rejected(rejection: Rejection) -> Response {
    let limit = rejection.limit;
    let reset = unix_now().saturating_add(rejection.retry_after_secs());
    let abuse = rejection.tier == Tier::Abuse;

    let mut response = AppError::RateLimited(rejection).into_response();
    if abuse {
        let headers = response.headers_mut();
        headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(limit));
        headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(0u32));
        headers.insert(X_RATELIMIT_RESET, HeaderValue::from(reset));
    }
    response
}

/// Abuse tier quota as `X-RateLimit-*` (reset is a unix timestamp), global
/// tier quota as `RateLimit-*` (reset in seconds).
fn annotate(headers: &mut HeaderMap, admission: &Admission) {
    if let Some(Quota {
        limit,
        remaining,
        reset_in,
    }) = admission.abuse
    {
        let reset = unix_now().saturating_add(ceil_secs(reset_in));
        headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(limit));
        headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(remaining));
        headers.insert(X_RATELIMIT_RESET, HeaderValue::from(reset));
    }
    if let Some(Quota {
        limit,
        remaining,
        reset_in,
    }) = admission.global
    {
        headers.insert(RATELIMIT_LIMIT, HeaderValue::from(limit));
        headers.insert(RATELIMIT_REMAINING, HeaderValue::from(remaining));
        headers.insert(RATELIMIT_RESET, HeaderValue::from(ceil_secs(reset_in)));
    }
}

fn unix_now() -> u64 {
    Utc::now().timestamp().max(0) as u64
}

/// Abort requests that outlive the configured timeout with a 408.
///
/// The request-log row is keyed by the route template and written from a
/// detached task, so a stalled database cannot hold the 408 back.
pub async fn request_timeout(State(state): State<Arc<AppState>>, request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let endpoint = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| path.clone(), |matched| matched.as_str().to_string());
    let limit = state.config.request_timeout();

    match tokio::time::timeout(limit, next.run(request)).await {
        Ok(response) => response,
        Err(_) => {
            warn!(method = %method, path = %path, timeout_secs = limit.as_secs(), "Request timed out");
            let err = AppError::Timeout;
            if path.starts_with("/api/") {
                let (status, message) = (err.status(), err.log_message());
                tokio::spawn(async move {
                    state.audit(&endpoint, &method, status, message).await;
                });
            }
            err.into_response()
        }
    }
}

/// HTML is never cached; other static assets are cacheable for
/// `static_files.max_age_secs`.
pub async fn static_cache_control(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let mut response = next.run(request).await;
    if !response.status().is_success() {
        return response;
    }

    let is_html = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("text/html"));
    let headers = response.headers_mut();
    if is_html {
        headers.insert(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-cache, no-store, must-revalidate"),
        );
        headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
        headers.insert(header::EXPIRES, HeaderValue::from_static("0"));
    } else {
        let value = format!("public, max-age={}", state.config.static_files.max_age_secs);
        match HeaderValue::from_str(&value) {
            Ok(value) => {
                headers.insert(header::CACHE_CONTROL, value);
            }
            Err(e) => debug!(error = %e, "Skipping cache header"),
        }
    }
    response
}
