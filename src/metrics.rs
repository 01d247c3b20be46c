// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Prometheus metrics owned by the application state.

use prometheus::{Encoder, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

pub struct Metrics {
    registry: Registry,
    /// Shield decisions by tier and outcome
    pub shield_decisions: IntCounterVec,
    /// Contact submissions by outcome
    pub submissions: IntCounterVec,
    /// Clients currently tracked by the abuse tier
    pub tracked_clients: IntGauge,
}

impl Metrics {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let shield_decisions = IntCounterVec::new(
            Opts::new("shield_decisions_total", "Rate limiter decisions"),
            &["tier", "outcome"],
        )?;
        let submissions = IntCounterVec::new(
            Opts::new("contact_submissions_total", "Contact form submissions"),
            &["outcome"],
        )?;
        let tracked_clients =
            IntGauge::new("shield_tracked_clients", "Clients with a live request window")?;

        registry.register(Box::new(shield_decisions.clone()))?;
        registry.register(Box::new(submissions.clone()))?;
        registry.register(Box::new(tracked_clients.clone()))?;

        Ok(Self {
            registry,
            shield_decisions,
            submissions,
            tracked_clients,
        })
    }

    /// Text exposition of every registered metric.
    pub fn render(&self) -> prometheus::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
