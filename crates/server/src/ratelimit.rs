//! Fixed-window rate limiting for session creation and adoption.
//!
//! Each guarded operation keeps its own table of client windows. A client's
//! first request opens a window and every further request inside it counts
//! against the guard's limit.
//!
//! # Memory Safety
//!
//! Tables are bounded by `max_entries`. Elapsed windows are swept inline when
//! the table fills up or two windows have passed since the last sweep, and a
//! background task sweeps on the same period.
//!
//! # Security Note
//!
//! By default, X-Forwarded-For and X-Real-IP headers are NOT trusted to prevent
//! IP spoofing attacks. You must explicitly configure `trusted_proxies` to enable
//! header-based IP detection:
//!
//! - Empty list (default): Only direct connection IP is used (most secure)
//! - List of IPs/CIDRs: Headers trusted only when request comes from these IPs
//! - ["*"]: Trust headers from all sources (NOT recommended for production)

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use beacon_core::config::RateLimitConfig;
use ipnet::IpNet;
use std::{
    collections::HashMap,
    net::{IpAddr, SocketAddr},
    sync::{
        Arc, Mutex, MutexGuard,
        atomic::{AtomicBool, Ordering},
    },
    time::{Duration, Instant},
};

/// Operation a limiter protects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Guard {
    Create,
    Adopt,
}

impl Guard {
    pub fn as_str(self) -> &'static str {
        match self {
            Guard::Create => "create",
            Guard::Adopt => "adopt",
        }
    }
}

/// Rate limiter state shared across requests.
#[derive(Clone)]
pub struct RateLimitState {
    inner: Option<Arc<RateLimitStateInner>>,
}

/// Inner state that's only allocated when at least one guard is enabled.
struct RateLimitStateInner {
    create: Option<WindowLimiter>,
    adopt: Option<WindowLimiter>,
    /// Trusted proxy configuration.
    trusted_proxies: TrustedProxies,
    /// Whether ConnectInfo missing warning has been logged.
    connect_info_warned: AtomicBool,
}

struct ClientWindow {
    count: u32,
    reset_at: Instant,
}

struct WindowTable {
    entries: HashMap<String, ClientWindow>,
    last_sweep: Instant,
}

/// One guard's fixed-window counters.
struct WindowLimiter {
    guard: Guard,
    limit: u32,
    window: Duration,
    max_entries: usize,
    table: Mutex<WindowTable>,
    /// Prevents log spam while the table stays full.
    at_capacity_warned: AtomicBool,
}

impl WindowLimiter {
    fn new(guard: Guard, limit: u32, window: Duration, max_entries: usize) -> Self {
        Self {
            guard,
            limit,
            window,
            max_entries,
            table: Mutex::new(WindowTable {
                entries: HashMap::new(),
                last_sweep: Instant::now(),
            }),
            at_capacity_warned: AtomicBool::new(false),
        }
    }

    fn lock(&self) -> MutexGuard<'_, WindowTable> {
        self.table.lock().unwrap_or_else(|poisoned| {
            tracing::warn!("rate limit table Mutex was poisoned, recovering with into_inner()");
            poisoned.into_inner()
        })
    }

    fn check(&self, key: &str) -> Result<(), RateLimitError> {
        self.check_at(key, Instant::now())
    }

    fn check_at(&self, key: &str, now: Instant) -> Result<(), RateLimitError> {
        let mut table = self.lock();

        if now.duration_since(table.last_sweep) > self.window * 2
            || table.entries.len() >= self.max_entries
        {
            sweep(&mut table, now);
        }

        if let Some(entry) = table.entries.get_mut(key) {
            if now >= entry.reset_at {
                entry.count = 1;
                entry.reset_at = now + self.window;
                return Ok(());
            }
            if entry.count >= self.limit {
                return Err(RateLimitError {
                    guard: self.guard,
                    retry_after_secs: entry.reset_at.duration_since(now).as_secs() + 1,
                    reason: RateLimitReason::RateLimited,
                });
            }
            entry.count += 1;
            return Ok(());
        }

        if table.entries.len() >= self.max_entries {
            self.warn_at_capacity(table.entries.len());
            return Err(RateLimitError {
                guard: self.guard,
                retry_after_secs: self.window.as_secs().max(1),
                reason: RateLimitReason::AtCapacity,
            });
        }
        self.at_capacity_warned.store(false, Ordering::Relaxed);
        table.entries.insert(
            key.to_string(),
            ClientWindow {
                count: 1,
                reset_at: now + self.window,
            },
        );
        Ok(())
    }

    fn cleanup(&self) -> usize {
        let mut table = self.lock();
        sweep(&mut table, Instant::now())
    }

    fn len(&self) -> usize {
        self.lock().entries.len()
    }

    fn warn_at_capacity(&self, current_entries: usize) {
        if !self.at_capacity_warned.swap(true, Ordering::Relaxed) {
            tracing::warn!(
                guard = self.guard.as_str(),
                current_entries = current_entries,
                max_entries = self.max_entries,
                "Rate limiter at capacity, rejecting new clients. \
                 This warning is logged once per capacity event to prevent log spam."
            );
        }
    }
}

/// Drop elapsed windows, returning how many were removed.
fn sweep(table: &mut WindowTable, now: Instant) -> usize {
    let before = table.entries.len();
    table.entries.retain(|_, entry| now < entry.reset_at);
    table.last_sweep = now;
    before - table.entries.len()
}

/// A parsed trusted proxy entry (either an IP or CIDR range).
#[derive(Clone, Debug)]
enum TrustedEntry {
    Ip(IpAddr),
    Cidr(IpNet),
}

/// Trusted proxy configuration for IP extraction.
#[derive(Clone, Debug)]
enum TrustedProxies {
    /// Never trust forwarded headers (default, most secure).
    None,
    /// Trust headers from all sources (dangerous, for development only).
    All,
    /// Trust headers only from specific IPs/CIDRs.
    List(Vec<TrustedEntry>),
}

impl TrustedProxies {
    fn from_config(proxies: &[String]) -> Self {
        if proxies.is_empty() {
            Self::None
        } else if proxies.len() == 1 && proxies[0] == "*" {
            Self::All
        } else {
            let entries: Vec<TrustedEntry> = proxies
                .iter()
                .filter_map(|p| {
                    if p.contains('/') {
                        match p.parse::<IpNet>() {
                            Ok(net) => Some(TrustedEntry::Cidr(net)),
                            Err(e) => {
                                tracing::warn!("Invalid CIDR in trusted_proxies: '{}': {}", p, e);
                                None
                            }
                        }
                    } else {
                        match p.parse::<IpAddr>() {
                            Ok(ip) => Some(TrustedEntry::Ip(ip)),
                            Err(e) => {
                                tracing::warn!("Invalid IP in trusted_proxies: '{}': {}", p, e);
                                None
                            }
                        }
                    }
                })
                .collect();
            Self::List(entries)
        }
    }

    /// Check if the given connection IP is a trusted proxy.
    fn is_trusted(&self, connection_ip: &str) -> bool {
        match self {
            Self::None => false,
            Self::All => true,
            Self::List(entries) => {
                let Ok(ip) = connection_ip.parse::<IpAddr>() else {
                    return false;
                };
                entries.iter().any(|entry| match entry {
                    TrustedEntry::Ip(trusted) => *trusted == ip,
                    TrustedEntry::Cidr(network) => network.contains(&ip),
                })
            }
        }
    }
}

impl RateLimitState {
    /// Create a new rate limit state from configuration.
    pub fn new(config: &RateLimitConfig) -> Self {
        if !config.enabled() {
            return Self { inner: None };
        }

        let window = config.window();
        let limiter = |guard, limit: u32| {
            (limit > 0).then(|| WindowLimiter::new(guard, limit, window, config.max_entries))
        };

        Self {
            inner: Some(Arc::new(RateLimitStateInner {
                create: limiter(Guard::Create, config.create_per_window),
                adopt: limiter(Guard::Adopt, config.adopt_per_window),
                trusted_proxies: TrustedProxies::from_config(&config.trusted_proxies),
                connect_info_warned: AtomicBool::new(false),
            })),
        }
    }

    fn limiter(&self, guard: Guard) -> Option<&WindowLimiter> {
        let inner = self.inner.as_ref()?;
        match guard {
            Guard::Create => inner.create.as_ref(),
            Guard::Adopt => inner.adopt.as_ref(),
        }
    }

    /// Count a request from `key` against `guard`.
    pub fn check(&self, guard: Guard, key: &str) -> Result<(), RateLimitError> {
        match self.limiter(guard) {
            Some(limiter) => limiter.check(key),
            None => Ok(()),
        }
    }

    /// Check if any guard is enabled.
    pub fn is_enabled(&self) -> bool {
        self.inner.is_some()
    }

    /// Check if a specific guard is enabled.
    pub fn guard_enabled(&self, guard: Guard) -> bool {
        self.limiter(guard).is_some()
    }

    /// Drop elapsed windows from every guard.
    /// Returns the number of entries evicted.
    pub fn cleanup(&self) -> usize {
        let Some(inner) = &self.inner else {
            return 0;
        };
        [&inner.create, &inner.adopt]
            .into_iter()
            .flatten()
            .map(WindowLimiter::cleanup)
            .sum()
    }

    /// Number of clients tracked by `guard`.
    pub fn entry_count(&self, guard: Guard) -> usize {
        self.limiter(guard).map_or(0, WindowLimiter::len)
    }

    /// Log a warning if ConnectInfo is not available (only once).
    fn warn_connect_info_missing(&self) {
        if let Some(inner) = &self.inner
            && !inner.connect_info_warned.swap(true, Ordering::Relaxed)
        {
            tracing::warn!(
                "ConnectInfo not available for rate limiting. All requests will share a single \
                     rate limit bucket ('unknown' IP). Add .into_make_service_with_connect_info::<SocketAddr>() \
                     to your server configuration to enable per-IP rate limiting."
            );
        }
    }
}

/// Reason for rate limit rejection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitReason {
    /// Request exceeded rate limit.
    RateLimited,
    /// Rate limiter at capacity, cannot track new entries.
    AtCapacity,
}

/// Error returned when rate limit is exceeded.
#[derive(Debug)]
pub struct RateLimitError {
    pub guard: Guard,
    /// Number of seconds to wait before retrying.
    pub retry_after_secs: u64,
    /// Reason for the rate limit.
    pub reason: RateLimitReason,
}

impl IntoResponse for RateLimitError {
    fn into_response(self) -> Response {
        let message = match self.reason {
            RateLimitReason::RateLimited => "Rate limit exceeded!",
            RateLimitReason::AtCapacity => "Server is busy, please retry later!",
        };

        (
            StatusCode::TOO_MANY_REQUESTS,
            [("Retry-After", self.retry_after_secs.to_string())],
            format!("{message}\n"),
        )
            .into_response()
    }
}

/// Extract client IP address from request headers (only if trusted).
fn extract_forwarded_ip(req: &Request<Body>) -> Option<String> {
    if let Some(forwarded) = req.headers().get("x-forwarded-for")
        && let Ok(s) = forwarded.to_str()
    {
        // Take the first IP in the chain (client IP)
        if let Some(ip) = s.split(',').next() {
            return Some(ip.trim().to_string());
        }
    }

    if let Some(real_ip) = req.headers().get("x-real-ip")
        && let Ok(s) = real_ip.to_str()
    {
        return Some(s.trim().to_string());
    }

    None
}

/// Extract connection IP from request extensions (set by ConnectInfo).
fn extract_connection_ip(req: &Request<Body>) -> Option<String> {
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0.ip().to_string())
}

/// Extract client IP address from request.
///
/// # Security
///
/// This function respects the trusted_proxies configuration:
/// - If no proxies are trusted, always uses the direct connection IP
/// - If specific proxies are trusted, only reads forwarded headers when
///   the connection comes from a trusted proxy IP
/// - If all proxies are trusted ("*"), always reads forwarded headers (unsafe)
fn extract_ip(req: &Request<Body>, state: &RateLimitState) -> String {
    let Some(inner) = &state.inner else {
        return "unknown".to_string();
    };

    let connection_ip = extract_connection_ip(req);

    let trust_headers = match (&connection_ip, &inner.trusted_proxies) {
        (None, TrustedProxies::All) => true,
        // Can't verify proxy without connection IP, default to not trusting
        (None, TrustedProxies::List(_)) => false,
        (None, TrustedProxies::None) => false,
        (Some(conn_ip), trusted_proxies) => trusted_proxies.is_trusted(conn_ip),
    };

    if trust_headers && let Some(forwarded_ip) = extract_forwarded_ip(req) {
        return forwarded_ip;
    }

    match connection_ip {
        Some(ip) => ip,
        None => {
            state.warn_connect_info_missing();
            "unknown".to_string()
        }
    }
}

async fn guard_request(
    guard: Guard,
    rate_limit: &RateLimitState,
    req: Request<Body>,
    next: Next,
) -> Response {
    if !rate_limit.guard_enabled(guard) {
        return next.run(req).await;
    }

    let ip = extract_ip(&req, rate_limit);

    match rate_limit.check(guard, &ip) {
        Ok(()) => next.run(req).await,
        Err(e) => {
            crate::metrics::record_rate_limited(guard.as_str());
            tracing::debug!(guard = guard.as_str(), client = %ip, reason = ?e.reason, "Request rate limited");
            e.into_response()
        }
    }
}

/// Per-IP limit on session creation.
pub async fn create_rate_limit_middleware(
    State(rate_limit): State<RateLimitState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    guard_request(Guard::Create, &rate_limit, req, next).await
}

/// Per-IP limit on share adoption.
pub async fn adopt_rate_limit_middleware(
    State(rate_limit): State<RateLimitState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    guard_request(Guard::Adopt, &rate_limit, req, next).await
}

/// Spawn a background task that periodically cleans up elapsed windows.
/// Returns a handle that can be used to stop the cleanup task.
pub fn spawn_cleanup_task(
    state: RateLimitState,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            let evicted = state.cleanup();
            if evicted > 0 {
                tracing::info!(
                    evicted = evicted,
                    "Rate limiter cleanup task evicted stale entries"
                );
            }
        }
    })
}
