// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Contact Shield
//!
//! Contact-form backend with an in-process abuse shield:
//!
//! - Abuse tier: 100 requests / 15 min per client, then a 30 min block
//! - Global tier: 100 requests / 15 min per client, favicon exempt
//! - Submission tier: 5 submissions / hour, failed submissions not counted
//! - Field validation with spam keyword and disposable domain checks
//! - SQLite persistence for submissions and the request log

pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod limiter;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod validator;

pub use config::Config;
pub use db::Database;
pub use error::AppError;
pub use handlers::AppState;
pub use limiter::{RateLimitResult, Shield, SlidingWindow};
pub use routes::router;
pub use validator::{ContactValidator, ValidationResult};
