// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Sliding-window abuse protection for the contact backend.
//!
//! Implements three independent tiers behind one engine:
//! 1. Abuse tier: per-client window with a hard temporary block (100 / 15 min, 30 min block)
//! 2. Global tier: per-client traffic shaping (100 / 15 min)
//! 3. Submission tier: contact-form route only (5 / hour, failed submissions released)
//!
//! Every tier keeps its windows and blocks behind a single lock so that
//! admission, release and the periodic sweep never interleave for a key.

use crate::config::{RateLimitConfig, TierConfig};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Identifier used when a request carries no usable client address.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Longest block a tier can impose. Longer configured blocks are clamped.
pub const MAX_BLOCK: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Shield tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tier {
    Abuse,
    Global,
    Submission,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Abuse => "abuse",
            Self::Global => "global",
            Self::Submission => "submission",
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Remaining budget of an admitted request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quota {
    /// Maximum requests per window
    pub limit: u32,
    /// Requests left in the current window
    pub remaining: u32,
    /// Time until the oldest counted request leaves the window
    pub reset_in: Duration,
}

/// Reason for rate limiting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitReason {
    /// Window exhausted on a tier without a block
    WindowExceeded,
    /// Window exhausted, a block was just started
    BlockTriggered,
    /// Client is still inside an earlier block
    BlockActive,
}

impl std::fmt::Display for RateLimitReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::WindowExceeded => write!(f, "Rate limit exceeded"),
            Self::BlockTriggered => write!(f, "Too many requests, client blocked"),
            Self::BlockActive => write!(f, "Client temporarily blocked"),
        }
    }
}

/// A rejected request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rejection {
    pub tier: Tier,
    pub reason: RateLimitReason,
    pub limit: u32,
    /// Time until the client may retry
    pub retry_after: Duration,
}

impl Rejection {
    /// Whole seconds until retry, rounded up and never zero.
    pub fn retry_after_secs(&self) -> u64 {
        ceil_secs(self.retry_after).max(1)
    }

    /// Human-readable message for the response body.
    pub fn message(&self) -> String {
        match (self.tier, self.reason) {
            (_, RateLimitReason::BlockActive) => format!(
                "Client temporarily blocked, retry in {} seconds",
                self.retry_after_secs()
            ),
            (Tier::Abuse, _) => "Too many requests, please try again later".to_string(),
            (Tier::Submission, _) => format!(
                "Too many contact form submissions, please try again in {}",
                humanize(self.retry_after)
            ),
            (Tier::Global, _) => format!(
                "Too many requests, please try again in {}",
                humanize(self.retry_after)
            ),
        }
    }
}

/// Result of a rate limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitResult {
    /// Request is allowed
    Allowed(Quota),
    /// Request is rate limited
    Limited(Rejection),
}

/// Request instants of one client inside the trailing window.
#[derive(Debug, Default)]
struct ClientWindow {
    hits: VecDeque<Instant>,
}

impl ClientWindow {
    /// Drop every hit whose age has reached the window.
    fn prune(&mut self, now: Instant, window: Duration) {
        self.hits
            .retain(|hit| now.saturating_duration_since(*hit) < window);
    }

    fn len(&self) -> u32 {
        self.hits.len() as u32
    }

    fn reset_in(&self, now: Instant, window: Duration) -> Duration {
        self.hits
            .iter()
            .min()
            .map(|oldest| window.saturating_sub(now.saturating_duration_since(*oldest)))
            .unwrap_or(window)
    }
}

/// Temporary full rejection of a client.
#[derive(Debug, Clone, Copy)]
struct BlockEntry {
    until: Instant,
}

#[derive(Debug, Default)]
struct TierState {
    windows: HashMap<String, ClientWindow>,
    blocks: HashMap<String, BlockEntry>,
}

/// Outcome of a sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub windows_removed: usize,
    pub blocks_removed: usize,
}

/// Thread-safe sliding-window counter for one tier.
pub struct SlidingWindow {
    tier: Tier,
    config: TierConfig,
    state: Mutex<TierState>,
}

impl SlidingWindow {
    /// Create a new tier counter with the given parameters.
    pub fn new(tier: Tier, config: TierConfig) -> Self {
        Self {
            tier,
            config,
            state: Mutex::new(TierState::default()),
        }
    }

    pub fn tier(&self) -> Tier {
        self.tier
    }

    pub fn config(&self) -> &TierConfig {
        &self.config
    }

    /// Count a request from `client_id` made at `now`, or reject it.
    pub async fn admit(&self, client_id: &str, now: Instant) -> RateLimitResult {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;

        // Check block first
        if let Some(block) = state.blocks.get(client_id).copied() {
            if block.until > now {
                let retry_after = block.until.duration_since(now);
                debug!(tier = %self.tier, client = %client_id, ?retry_after, "Client blocked");
                return RateLimitResult::Limited(Rejection {
                    tier: self.tier,
                    reason: RateLimitReason::BlockActive,
                    limit: self.config.max_requests,
                    retry_after,
                });
            }
            state.blocks.remove(client_id);
        }

        let window = state.windows.entry(client_id.to_string()).or_default();
        window.prune(now, self.config.window);

        if window.len() >= self.config.max_requests {
            let rejection = match self.config.block {
                Some(block) => {
                    let block = block.min(MAX_BLOCK);
                    let until = now.checked_add(block).unwrap_or(now);
                    state
                        .blocks
                        .insert(client_id.to_string(), BlockEntry { until });
                    warn!(
                        tier = %self.tier,
                        client = %client_id,
                        block_secs = block.as_secs(),
                        "Request window exhausted, blocking client"
                    );
                    Rejection {
                        tier: self.tier,
                        reason: RateLimitReason::BlockTriggered,
                        limit: self.config.max_requests,
                        retry_after: block,
                    }
                }
                None => {
                    let retry_after = window.reset_in(now, self.config.window);
                    debug!(tier = %self.tier, client = %client_id, ?retry_after, "Rate limit exceeded");
                    Rejection {
                        tier: self.tier,
                        reason: RateLimitReason::WindowExceeded,
                        limit: self.config.max_requests,
                        retry_after,
                    }
                }
            };
            return RateLimitResult::Limited(rejection);
        }

        window.hits.push_back(now);
        RateLimitResult::Allowed(Quota {
            limit: self.config.max_requests,
            remaining: self.config.max_requests.saturating_sub(window.len()),
            reset_in: window.reset_in(now, self.config.window),
        })
    }

    /// Un-count the request recorded for `client_id` at `at`.
    pub async fn release(&self, client_id: &str, at: Instant) -> bool {
        let mut state = self.state.lock().await;
        let Some(window) = state.windows.get_mut(client_id) else {
            return false;
        };
        match window.hits.iter().rposition(|hit| *hit == at) {
            Some(pos) => {
                window.hits.remove(pos);
                true
            }
            None => false,
        }
    }

    /// Prune stale hits, drop empty windows and expired blocks.
    pub async fn sweep(&self, now: Instant) -> SweepReport {
        let mut state = self.state.lock().await;
        let window = self.config.window;

        let windows_before = state.windows.len();
        state.windows.retain(|_, client| {
            client.prune(now, window);
            !client.hits.is_empty()
        });

        let blocks_before = state.blocks.len();
        state.blocks.retain(|_, block| block.until > now);

        SweepReport {
            windows_removed: windows_before - state.windows.len(),
            blocks_removed: blocks_before - state.blocks.len(),
        }
    }

    /// Drop all counters and blocks.
    pub async fn clear(&self) {
        let mut state = self.state.lock().await;
        state.windows.clear();
        state.blocks.clear();
    }

    /// Number of clients with a live window.
    pub async fn tracked_clients(&self) -> usize {
        self.state.lock().await.windows.len()
    }

    /// Whether `client_id` is blocked at `now`.
    pub async fn is_blocked(&self, client_id: &str, now: Instant) -> bool {
        self.state
            .lock()
            .await
            .blocks
            .get(client_id)
            .is_some_and(|block| block.until > now)
    }
}

/// Route classes the shield distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Exempt from every tier
    Health,
    /// Exempt from the global tier only
    Favicon,
    /// The contact-form submission route
    Submission,
    Other,
}

/// Budgets of an admitted request, one per tier that counted it.
#[derive(Debug, Clone)]
pub struct Admission {
    pub client_id: String,
    pub at: Instant,
    pub abuse: Option<Quota>,
    pub global: Option<Quota>,
    pub submission: Option<Quota>,
}

/// The abuse-protection engine: all tiers for one process.
pub struct Shield {
    abuse: SlidingWindow,
    global: SlidingWindow,
    submission: SlidingWindow,
}

impl Shield {
    /// Create a new shield with the given configuration.
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            abuse: SlidingWindow::new(Tier::Abuse, config.tier(Tier::Abuse)),
            global: SlidingWindow::new(Tier::Global, config.tier(Tier::Global)),
            submission: SlidingWindow::new(Tier::Submission, config.tier(Tier::Submission)),
        }
    }

    pub fn tier(&self, tier: Tier) -> &SlidingWindow {
        match tier {
            Tier::Abuse => &self.abuse,
            Tier::Global => &self.global,
            Tier::Submission => &self.submission,
        }
    }

    /// Run a request through every tier that applies to `route`.
    ///
    /// Tiers are checked abuse, global, submission; a later rejection does
    /// not un-count earlier tiers.
    pub async fn admit(
        &self,
        client_id: &str,
        route: Route,
        now: Instant,
    ) -> Result<Admission, Rejection> {
        let mut admission = Admission {
            client_id: client_id.to_string(),
            at: now,
            abuse: None,
            global: None,
            submission: None,
        };

        if route == Route::Health {
            return Ok(admission);
        }

        admission.abuse = Some(allowed(self.abuse.admit(client_id, now).await)?);

        if route != Route::Favicon {
            admission.global = Some(allowed(self.global.admit(client_id, now).await)?);
        }

        if route == Route::Submission {
            admission.submission = Some(allowed(self.submission.admit(client_id, now).await)?);
        }

        Ok(admission)
    }

    /// Settle an admission once the handler status is known.
    ///
    /// Failed submissions (status >= 400) do not count against the
    /// submission budget.
    pub async fn settle(&self, admission: &Admission, status: u16) {
        if admission.submission.is_some() && status >= 400 {
            let released = self.submission.release(&admission.client_id, admission.at).await;
            debug!(client = %admission.client_id, status, released, "Failed submission released");
        }
    }

    /// Sweep every tier.
    pub async fn sweep(&self, now: Instant) -> SweepReport {
        let mut report = SweepReport::default();
        for tier in [&self.abuse, &self.global, &self.submission] {
            let tier_report = tier.sweep(now).await;
            report.windows_removed += tier_report.windows_removed;
            report.blocks_removed += tier_report.blocks_removed;
        }
        report
    }

    /// Drop all state (graceful shutdown).
    pub async fn clear(&self) {
        for tier in [&self.abuse, &self.global, &self.submission] {
            tier.clear().await;
        }
    }

    /// Number of clients currently tracked by the abuse tier.
    pub async fn tracked_clients(&self) -> usize {
        self.abuse.tracked_clients().await
    }

    /// Spawn the periodic sweep on the runtime.
    pub fn spawn_sweeper(self: &Arc<Self>, period: Duration) -> JoinHandle<()> {
        let shield = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                let report = shield.sweep(Instant::now()).await;
                if report != SweepReport::default() {
                    debug!(
                        windows_removed = report.windows_removed,
                        blocks_removed = report.blocks_removed,
                        "Shield sweep"
                    );
                }
            }
        })
    }
}

fn allowed(result: RateLimitResult) -> Result<Quota, Rejection> {
    match result {
        RateLimitResult::Allowed(quota) => Ok(quota),
        RateLimitResult::Limited(rejection) => Err(rejection),
    }
}

/// Whole seconds, rounding any fraction up.
pub(crate) fn ceil_secs(duration: Duration) -> u64 {
    duration
        .as_secs()
        .saturating_add(u64::from(duration.subsec_nanos() > 0))
}

fn humanize(duration: Duration) -> String {
    let secs = ceil_secs(duration).max(1);
    match secs {
        s if s % 3600 == 0 => plural(s / 3600, "hour"),
        s if s % 60 == 0 => plural(s / 60, "minute"),
        s => plural(s, "second"),
    }
}

fn plural(n: u64, unit: &str) -> String {
    if n == 1 {
        format!("1 {unit}")
    } else {
        format!("{n} {unit}s")
    }
}
