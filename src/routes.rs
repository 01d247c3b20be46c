// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Router assembly.

use crate::config::CorsConfig;
use crate::handlers::{health, list, metrics, not_found, stats, submit, update_status, AppState};
use crate::middleware::{
    request_timeout, shield, static_cache_control, RATELIMIT_LIMIT, RATELIMIT_REMAINING,
    RATELIMIT_RESET, X_RATELIMIT_LIMIT, X_RATELIMIT_REMAINING, X_RATELIMIT_RESET,
};
use axum::{
    extract::DefaultBodyLimit,
    handler::HandlerWithoutStateExt,
    http::{header, request::Parts, HeaderName, HeaderValue, Method},
    middleware::from_fn_with_state,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower::{limit::GlobalConcurrencyLimitLayer, ServiceBuilder};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

/// Build the application router.
///
/// Layers, outermost first: tracing, CORS, concurrency cap, shield, timeout,
/// body limit. The timeout sits inside the shield so a 408 is settled like
/// any other failed response. Unmatched paths fall through to the static
/// directory (when configured) and then to a JSON 404.
pub fn router(state: Arc<AppState>) -> Router {
    let mut app = Router::new()
        .route("/health", get(health).fallback(not_found))
        .route("/api/contact/submit", post(submit).fallback(not_found))
        .route("/api/contact/list", get(list).fallback(not_found))
        .route("/api/contact/stats", get(stats).fallback(not_found))
        .route(
            "/api/contact/:id/status",
            put(update_status).fallback(not_found),
        );

    if state.config.metrics.enabled {
        app = app.route(&state.config.metrics.path, get(metrics));
    }

    app = match state.config.static_files.dir.as_deref() {
        Some(dir) => {
            let files = ServeDir::new(dir)
                .call_fallback_on_method_not_allowed(true)
                .fallback(not_found.into_service());
            app.fallback_service(
                ServiceBuilder::new()
                    .layer(from_fn_with_state(state.clone(), static_cache_control))
                    .service(files),
            )
        }
        None => app.fallback(not_found),
    };

    app.layer(DefaultBodyLimit::max(state.config.server.max_body_bytes))
        .layer(from_fn_with_state(state.clone(), request_timeout))
        .layer(from_fn_with_state(state.clone(), shield))
        .layer(GlobalConcurrencyLimitLayer::new(state.config.concurrency_limit()))
        .layer(cors_layer(&state.config.cors))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// CORS policy: mirror any origin, or restrict to the configured list plus
/// an optional host suffix.
pub fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let origin = if config.allow_any_origin {
        AllowOrigin::mirror_request()
    } else {
        let allowed = config.allowed_origins.clone();
        let suffix = config.allowed_suffix.clone();
        AllowOrigin::predicate(move |origin: &HeaderValue, _: &Parts| {
            origin_allowed(origin, &allowed, suffix.as_deref())
        })
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static("x-api-key"),
        ])
        .expose_headers([
            X_RATELIMIT_LIMIT,
            X_RATELIMIT_REMAINING,
            X_RATELIMIT_RESET,
            RATELIMIT_LIMIT,
            RATELIMIT_REMAINING,
            RATELIMIT_RESET,
            header::RETRY_AFTER,
        ])
        .allow_credentials(true)
}

fn origin_allowed(origin: &HeaderValue, allowed: &[String], suffix: Option<&str>) -> bool {
    let Ok(origin) = origin.to_str() else {
        return false;
    };
    if allowed.iter().any(|a| a == origin) {
        return true;
    }
    match (suffix, url::Url::parse(origin)) {
        (Some(suffix), Ok(url)) => url.host_str().is_some_and(|host| host.ends_with(suffix)),
        _ => false,
    }
}
