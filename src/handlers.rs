// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! HTTP handlers for the contact form service.
//!
//! Every handler on the `/api/contact` surface appends one row to the request
//! log. Logging is best-effort and never changes the response.

use crate::config::Config;
use crate::db::Database;
use crate::error::{AppError, Result};
use crate::limiter::{Shield, UNKNOWN_CLIENT};
use crate::metrics::Metrics;
use crate::middleware::ClientId;
use crate::models::{
    ContactForm, ContactStats, ContactStatus, ContactSubmission, NewSubmission, RequestLogEntry,
};
use crate::validator::ContactValidator;
use axum::{
    extract::{rejection::JsonRejection, rejection::PathRejection, Path, State},
    http::{header, HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Maximum rows returned by the listing endpoint.
pub const LIST_LIMIT: u32 = 100;

const SUBMIT_PATH: &str = "/api/contact/submit";
const LIST_PATH: &str = "/api/contact/list";
const STATS_PATH: &str = "/api/contact/stats";

/// Shared application state.
pub struct AppState {
    pub shield: Arc<Shield>,
    pub validator: ContactValidator,
    pub db: Database,
    pub metrics: Metrics,
    pub config: Config,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(config: Config, db: Database) -> prometheus::Result<Self> {
        Ok(Self {
            shield: Arc::new(Shield::new(&config.rate_limit)),
            validator: ContactValidator::new(config.validation.clone()),
            db,
            metrics: Metrics::new()?,
            config,
            started_at: Instant::now(),
        })
    }

    /// Append a request-log row, downgrading failures to a warning.
    pub async fn audit(&self, endpoint: &str, method: &Method, status: StatusCode, message: String) {
        let entry = RequestLogEntry::new(endpoint, method.as_str(), status.as_u16(), message);
        if let Err(e) = self.db.append_log(entry).await {
            warn!(endpoint, error = %e, "Failed to append request log");
        }
    }

    fn storage_error(&self, message: &'static str, err: &crate::db::StorageError) -> AppError {
        warn!(error = %err, "{message}");
        AppError::storage(message, err, self.config.expose_error_detail())
    }

    /// Require a matching `X-API-Key` header. Without a configured key the
    /// protected endpoints are closed.
    fn require_api_key(&self, headers: &HeaderMap) -> Result<()> {
        let expected = self
            .config
            .admin
            .api_key
            .as_deref()
            .filter(|key| !key.is_empty())
            .ok_or(AppError::Unauthorized)?;
        let provided = headers.get("x-api-key").and_then(|v| v.to_str().ok());
        if provided == Some(expected) {
            Ok(())
        } else {
            Err(AppError::Unauthorized)
        }
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: DateTime<Utc>,
    pub service: String,
    pub version: &'static str,
    pub uptime: String,
    pub request_stats: RequestStats,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestStats {
    pub tracked_clients: usize,
    pub window: String,
    pub max_requests: u32,
}

/// Successful submission response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    pub success: bool,
    pub message: &'static str,
    pub contact_id: i64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ListResponse {
    pub success: bool,
    pub data: Vec<ContactSubmission>,
    pub count: usize,
}

/// Body of a status update.
#[derive(Debug, Deserialize)]
pub struct StatusUpdate {
    #[serde(default)]
    pub status: String,
}

/// Health check endpoint. Exempt from every shield tier.
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let abuse = state.config.rate_limit.tier(crate::limiter::Tier::Abuse);
    Json(HealthResponse {
        status: "healthy",
        timestamp: Utc::now(),
        service: state.config.service_name.clone(),
        version: env!("CARGO_PKG_VERSION"),
        uptime: format_uptime(state.started_at.elapsed().as_secs()),
        request_stats: RequestStats {
            tracked_clients: state.shield.tracked_clients().await,
            window: format!("{} minutes", abuse.window.as_secs() / 60),
            max_requests: abuse.max_requests,
        },
    })
}

/// Accept a contact form submission.
pub async fn submit(
    State(state): State<Arc<AppState>>,
    client: Option<Extension<ClientId>>,
    headers: HeaderMap,
    body: std::result::Result<Json<ContactForm>, JsonRejection>,
) -> Response {
    let client = client.map_or_else(|| UNKNOWN_CLIENT.to_string(), |Extension(id)| id.0);
    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let outcome = create_submission(&state, client, user_agent, body).await;

    let (status, note, label) = match &outcome {
        Ok(response) => (
            StatusCode::CREATED,
            format!("Contact form submitted successfully - ID: {}", response.contact_id),
            "created",
        ),
        Err(err) => (
            err.status(),
            err.log_message(),
            match err {
                AppError::Validation(_) => "invalid",
                AppError::TooFrequent => "duplicate",
                AppError::Storage { .. } => "error",
                _ => "rejected",
            },
        ),
    };
    state.metrics.submissions.with_label_values(&[label]).inc();
    state.audit(SUBMIT_PATH, &Method::POST, status, note).await;

    match outcome {
        Ok(response) => (StatusCode::CREATED, Json(response)).into_response(),
        Err(err) => err.into_response(),
    }
}

async fn create_submission(
    state: &AppState,
    client: String,
    user_agent: Option<String>,
    body: std::result::Result<Json<ContactForm>, JsonRejection>,
) -> Result<SubmitResponse> {
    let Json(form) = body.map_err(body_error)?;

    let validation = state.validator.validate(&form);
    if !validation.is_valid() {
        debug!(client = %client, errors = ?validation.messages(), "Submission failed validation");
        return Err(AppError::Validation(validation.messages()));
    }

    let ip_address = (client != UNKNOWN_CLIENT).then_some(client);
    let submission = NewSubmission::from_form(&form, ip_address, user_agent);

    let since = Utc::now()
        - chrono::Duration::from_std(state.validator.config().duplicate_window())
            .unwrap_or_else(|_| chrono::Duration::hours(1));
    let recent = state
        .db
        .count_recent_by_email(&submission.email, since)
        .await
        .map_err(|e| state.storage_error("Failed to save contact", &e))?;
    if recent > 0 {
        info!(email = %submission.email, "Duplicate submission rejected");
        return Err(AppError::TooFrequent);
    }

    let contact_id = state
        .db
        .insert_submission(submission)
        .await
        .map_err(|e| state.storage_error("Failed to save contact", &e))?;
    info!(contact_id, "Contact form submitted");

    Ok(SubmitResponse {
        success: true,
        message: "Thank you for your message! We will get back to you soon.",
        contact_id,
        timestamp: Utc::now(),
    })
}

/// List the newest submissions.
pub async fn list(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    let outcome = list_submissions(&state, &headers).await;
    let (status, note) = match &outcome {
        Ok(response) => (StatusCode::OK, format!("Retrieved {} contacts", response.count)),
        Err(err) => (err.status(), err.log_message()),
    };
    state.audit(LIST_PATH, &Method::GET, status, note).await;

    match outcome {
        Ok(response) => Json(response).into_response(),
        Err(err) => err.into_response(),
    }
}

async fn list_submissions(state: &AppState, headers: &HeaderMap) -> Result<ListResponse> {
    if state.config.admin.protect_listing {
        state.require_api_key(headers)?;
    }
    let data = state
        .db
        .list_submissions(LIST_LIMIT)
        .await
        .map_err(|e| state.storage_error("Failed to retrieve contacts", &e))?;
    Ok(ListResponse {
        success: true,
        count: data.len(),
        data,
    })
}

/// Change the status of one submission.
pub async fn update_status(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    id: std::result::Result<Path<i64>, PathRejection>,
    body: std::result::Result<Json<StatusUpdate>, JsonRejection>,
) -> Response {
    let outcome = change_status(&state, &headers, id, body).await;
    let (status, note) = match &outcome {
        Ok((id, new_status)) => (StatusCode::OK, format!("Contact {id} marked {new_status}")),
        Err(err) => (err.status(), err.log_message()),
    };
    state
        .audit("/api/contact/:id/status", &Method::PUT, status, note)
        .await;

    match outcome {
        Ok(_) => Json(json!({
            "success": true,
            "message": "Contact status updated successfully"
        }))
        .into_response(),
        Err(err) => err.into_response(),
    }
}

async fn change_status(
    state: &AppState,
    headers: &HeaderMap,
    id: std::result::Result<Path<i64>, PathRejection>,
    body: std::result::Result<Json<StatusUpdate>, JsonRejection>,
) -> Result<(i64, ContactStatus)> {
    if state.config.admin.protect_listing {
        state.require_api_key(headers)?;
    }
    let Path(id) = id.map_err(|_| AppError::BadRequest("Invalid contact id".to_string()))?;
    let Json(update) = body.map_err(body_error)?;
    let status: ContactStatus = update
        .status
        .parse()
        .map_err(|_| AppError::BadRequest("Invalid status value".to_string()))?;

    let changed = state
        .db
        .update_status(id, status)
        .await
        .map_err(|e| state.storage_error("Failed to update contact status", &e))?;
    if changed == 0 {
        return Err(AppError::NotFound("Contact not found".to_string()));
    }
    info!(contact_id = id, status = %status, "Contact status updated");
    Ok((id, status))
}

/// Aggregate counters; always requires the admin key.
pub async fn stats(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    let outcome = load_stats(&state, &headers).await;

    let (status, note) = match &outcome {
        Ok(stats) => (StatusCode::OK, format!("Stats: {} total", stats.total)),
        Err(err) => (err.status(), err.log_message()),
    };
    state.audit(STATS_PATH, &Method::GET, status, note).await;

    match outcome {
        Ok(stats) => Json(json!({ "success": true, "data": stats })).into_response(),
        Err(err) => err.into_response(),
    }
}

async fn load_stats(state: &AppState, headers: &HeaderMap) -> Result<ContactStats> {
    state.require_api_key(headers)?;
    state
        .db
        .stats(Utc::now())
        .await
        .map_err(|e| state.storage_error("Failed to retrieve stats", &e))
}

/// Prometheus text exposition.
pub async fn metrics(State(state): State<Arc<AppState>>) -> Response {
    state
        .metrics
        .tracked_clients
        .set(state.shield.tracked_clients().await as i64);

    match state.metrics.render() {
        Ok(body) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => {
            warn!(error = %e, "Failed to render metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// JSON 404 for anything no route or static file matched.
pub async fn not_found(uri: Uri) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "success": false,
            "message": format!("Route {} not found", uri.path()),
            "suggestion": "Check the URL or visit /health for service status"
        })),
    )
        .into_response()
}

fn body_error(rejection: JsonRejection) -> AppError {
    if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge
    } else {
        debug!(error = %rejection.body_text(), "Rejected request body");
        AppError::BadRequest("Malformed request body".to_string())
    }
}

fn format_uptime(secs: u64) -> String {
    format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
}
