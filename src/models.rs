// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Data models for contact submissions and the request log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

/// Lifecycle state of a contact submission.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContactStatus {
    #[default]
    New,
    Contacted,
    Resolved,
    Spam,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Invalid status value: {0}")]
pub struct InvalidStatus(pub String);

impl ContactStatus {
    pub const ALL: [ContactStatus; 4] = [Self::New, Self::Contacted, Self::Resolved, Self::Spam];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Contacted => "contacted",
            Self::Resolved => "resolved",
            Self::Spam => "spam",
        }
    }
}

impl FromStr for ContactStatus {
    type Err = InvalidStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| InvalidStatus(s.to_string()))
    }
}

impl std::fmt::Display for ContactStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Contact form body as posted by the frontend.
///
/// Missing fields deserialize as empty strings so that validation can report
/// every problem at once.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContactForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub message: String,
}

/// A validated submission ready to be stored.
#[derive(Debug, Clone)]
pub struct NewSubmission {
    pub name: String,
    pub email: String,
    pub message: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl NewSubmission {
    /// Build a submission from a form, trimming every field.
    pub fn from_form(form: &ContactForm, ip_address: Option<String>, user_agent: Option<String>) -> Self {
        Self {
            name: form.name.trim().to_string(),
            email: form.email.trim().to_string(),
            message: form.message.trim().to_string(),
            ip_address,
            user_agent,
        }
    }
}

/// A stored contact submission.
#[derive(Debug, Clone, Serialize)]
pub struct ContactSubmission {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub message: String,
    #[serde(skip_serializing)]
    pub ip_address: Option<String>,
    #[serde(skip_serializing)]
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
    pub status: ContactStatus,
}

/// One row of the append-only request log.
#[derive(Debug, Clone)]
pub struct RequestLogEntry {
    pub endpoint: String,
    pub method: String,
    pub status_code: u16,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

impl RequestLogEntry {
    pub fn new(
        endpoint: impl Into<String>,
        method: impl Into<String>,
        status_code: u16,
        message: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            method: method.into(),
            status_code,
            message: message.into(),
            created_at: Utc::now(),
        }
    }
}

/// Aggregate counters for the admin stats endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactStats {
    pub total: u64,
    pub pending: u64,
    #[serde(rename = "last24h")]
    pub last_24h: u64,
    pub unique_ips: u64,
}
