// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: Apache-2.0

//! Contact form validator.
//!
//! Implements field-level validation for contact submissions:
//! - Name and message length
//! - Email shape (`local@domain.tld`)
//! - Spam keyword counting
//! - Disposable email domain blocking
//!
//! Every rule is evaluated so that all violations are reported together.

use crate::config::ValidationConfig;
use crate::models::ContactForm;
use thiserror::Error;
use tracing::debug;

/// Validation error types.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Name must be at least {min} characters")]
    NameTooShort { min: usize },

    #[error("Please provide a valid email address")]
    InvalidEmail,

    #[error("Message must be at least {min} characters")]
    MessageTooShort { min: usize },

    #[error("Message must not exceed {max} characters")]
    MessageTooLong { max: usize },

    #[error("Message looks like spam")]
    SpamDetected { matches: usize },

    #[error("Disposable email addresses are not accepted")]
    DisposableEmail { domain: String },
}

/// Result of validation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationResult {
    errors: Vec<ValidationError>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn errors(&self) -> &[ValidationError] {
        &self.errors
    }

    /// Error messages in rule order.
    pub fn messages(&self) -> Vec<String> {
        self.errors.iter().map(ToString::to_string).collect()
    }
}

/// Contact form validator.
pub struct ContactValidator {
    config: ValidationConfig,
    spam_keywords: Vec<String>,
    blocked_domains: Vec<String>,
}

impl ContactValidator {
    /// Create a new validator with the given configuration.
    pub fn new(config: ValidationConfig) -> Self {
        let spam_keywords = config.spam_keywords.iter().map(|k| k.to_lowercase()).collect();
        let blocked_domains = config.blocked_domains.iter().map(|d| d.to_lowercase()).collect();
        Self {
            config,
            spam_keywords,
            blocked_domains,
        }
    }

    pub fn config(&self) -> &ValidationConfig {
        &self.config
    }

    /// Validate a complete contact form.
    pub fn validate(&self, form: &ContactForm) -> ValidationResult {
        let mut errors = Vec::new();

        if form.name.trim().chars().count() < self.config.min_name_len {
            errors.push(ValidationError::NameTooShort {
                min: self.config.min_name_len,
            });
        }

        if !is_valid_email(form.email.trim()) {
            errors.push(ValidationError::InvalidEmail);
        }

        let message_len = form.message.trim().chars().count();
        if message_len < self.config.min_message_len {
            errors.push(ValidationError::MessageTooShort {
                min: self.config.min_message_len,
            });
        }
        if message_len > self.config.max_message_len {
            errors.push(ValidationError::MessageTooLong {
                max: self.config.max_message_len,
            });
        }

        let matches = self.spam_matches(&form.message);
        if matches > self.config.spam_threshold {
            debug!(matches, "Spam keywords detected");
            errors.push(ValidationError::SpamDetected { matches });
        }

        if let Some(domain) = self.blocked_domain(form.email.trim()) {
            debug!(domain = %domain, "Disposable email domain");
            errors.push(ValidationError::DisposableEmail { domain });
        }

        ValidationResult { errors }
    }

    /// Number of distinct spam keywords contained in `message`.
    pub fn spam_matches(&self, message: &str) -> usize {
        let lower = message.to_lowercase();
        self.spam_keywords
            .iter()
            .filter(|keyword| lower.contains(keyword.as_str()))
            .count()
    }

    fn blocked_domain(&self, email: &str) -> Option<String> {
        let (_, domain) = email.split_once('@')?;
        let domain = domain.to_lowercase();
        self.blocked_domains.contains(&domain).then_some(domain)
    }
}

/// Check the `local@domain.tld` shape: ASCII, no whitespace, exactly one `@`,
/// and a dot inside the domain with text on both sides.
fn is_valid_email(email: &str) -> bool {
    if !email.is_ascii() || email.chars().any(|c| c.is_ascii_whitespace()) {
        return false;
    }

    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }

    domain
        .match_indices('.')
        .any(|(i, _)| i > 0 && i + 1 < domain.len())
}
