// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: Apache-2.0

//! Attack simulation patterns for security testing.

use std::time::Duration;

/// What each simulated request does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Payload {
    /// Plain page or API reads
    Browse,
    /// Well-formed contact submissions with unique emails
    ValidSubmission,
    /// Submissions stuffed with spam keywords
    SpamSubmission,
    /// Submissions from disposable email domains
    DisposableSubmission,
}

/// Attack pattern configuration.
#[derive(Debug, Clone)]
pub struct AttackConfig {
    /// Total number of requests to send
    pub total_requests: usize,
    /// Simulated requests per second
    pub requests_per_second: f64,
    /// Number of unique clients to simulate
    pub unique_clients: usize,
    pub payload: Payload,
}

impl Default for AttackConfig {
    fn default() -> Self {
        Self {
            total_requests: 100,
            requests_per_second: 10.0,
            unique_clients: 1,
            payload: Payload::Browse,
        }
    }
}

/// Predefined attack patterns.
impl AttackConfig {
    /// Single client flood: basic DoS from one address.
    pub fn single_client_flood() -> Self {
        Self {
            total_requests: 300,
            requests_per_second: 50.0,
            ..Default::default()
        }
    }

    /// Many clients, each well under its budget.
    pub fn distributed_attack() -> Self {
        Self {
            total_requests: 1000,
            requests_per_second: 100.0,
            unique_clients: 100,
            ..Default::default()
        }
    }

    /// One client hammering the contact form with valid-looking messages.
    pub fn submission_flood() -> Self {
        Self {
            total_requests: 50,
            requests_per_second: 5.0,
            payload: Payload::ValidSubmission,
            ..Default::default()
        }
    }

    pub fn spam_campaign() -> Self {
        Self {
            total_requests: 40,
            requests_per_second: 2.0,
            unique_clients: 40,
            payload: Payload::SpamSubmission,
        }
    }

    pub fn disposable_campaign() -> Self {
        Self {
            total_requests: 40,
            requests_per_second: 2.0,
            unique_clients: 40,
            payload: Payload::DisposableSubmission,
        }
    }

    /// Slow drip: stay under the abuse budget for the whole window.
    pub fn slow_drip() -> Self {
        Self {
            total_requests: 200,
            requests_per_second: 0.1,
            ..Default::default()
        }
    }

    /// Simulated gap between consecutive requests.
    pub fn interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.requests_per_second)
    }

    /// Calculate expected duration for the attack.
    pub fn expected_duration(&self) -> Duration {
        Duration::from_secs_f64(self.total_requests as f64 / self.requests_per_second)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slow_drip_spans_window() {
        let config = AttackConfig::slow_drip();
        assert_eq!(config.interval(), Duration::from_secs(10));
        assert!(config.expected_duration() > Duration::from_secs(900));
    }
}
