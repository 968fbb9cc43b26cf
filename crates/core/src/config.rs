//! Configuration types shared across crates.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Server configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Base URL viewers open; share links are `public_url?<share id>`.
    #[serde(default = "default_public_url")]
    pub public_url: String,
    /// Deadline for a single API operation in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Enable the /metrics endpoint for Prometheus scraping (default: true).
    /// SECURITY: When enabled, ensure this endpoint is network-restricted
    /// to authorized Prometheus scraper IPs only at the infrastructure level.
    #[serde(default = "default_metrics_enabled")]
    pub metrics_enabled: bool,
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_public_url() -> String {
    "http://localhost:8080/".to_string()
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_metrics_enabled() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            public_url: default_public_url(),
            request_timeout_secs: default_request_timeout_secs(),
            metrics_enabled: default_metrics_enabled(),
        }
    }
}

impl ServerConfig {
    pub fn request_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.request_timeout_secs)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.request_timeout_secs == 0 {
            return Err("server.request_timeout_secs cannot be 0".to_string());
        }
        if self.public_url.is_empty() {
            return Err("server.public_url cannot be empty".to_string());
        }
        Ok(())
    }
}

/// Key-value store backend configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StoreConfig {
    /// In-process store; contents are lost on restart.
    Memory {
        /// Seconds between sweeps that physically drop expired records.
        #[serde(default = "default_sweep_interval_secs")]
        sweep_interval_secs: u64,
    },
    /// Redis (or compatible) server.
    Redis {
        /// Connection URL, e.g. `redis://:password@localhost:6379/0`.
        /// WARNING: Prefer BEACON_STORE__URL over storing passwords in config files.
        url: String,
        /// Prefix prepended to every key as `<prefix>-<key>`.
        #[serde(default = "default_redis_prefix")]
        prefix: String,
    },
}

fn default_sweep_interval_secs() -> u64 {
    60
}

fn default_redis_prefix() -> String {
    "beacon".to_string()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::Memory {
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

impl StoreConfig {
    pub fn validate(&self) -> Result<(), String> {
        match self {
            StoreConfig::Memory {
                sweep_interval_secs,
            } if *sweep_interval_secs == 0 => {
                // tokio::time::interval panics on a zero period
                Err("store.sweep_interval_secs cannot be 0".to_string())
            }
            StoreConfig::Redis { url, .. } if url.trim().is_empty() => {
                Err("store.url is required for the redis backend".to_string())
            }
            _ => Ok(()),
        }
    }
}

/// Credential check applied to session creation.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AuthConfig {
    /// Single shared password; the user name is ignored.
    Password {
        /// Bcrypt hash of the password. An empty hash rejects every attempt.
        #[serde(default)]
        hash: String,
    },
    /// Apache-style `user:bcrypt-hash` file, re-read on every attempt.
    Htpasswd { path: PathBuf },
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self::Password {
            hash: String::new(),
        }
    }
}

impl AuthConfig {
    /// Returns warnings for configurations that work but lock everyone out.
    pub fn validate(&self) -> Result<Vec<String>, String> {
        let mut warnings = Vec::new();
        match self {
            AuthConfig::Password { hash } if hash.is_empty() => {
                warnings.push(
                    "auth.hash is empty; every session creation will be rejected".to_string(),
                );
            }
            AuthConfig::Htpasswd { path } if path.as_os_str().is_empty() => {
                return Err("auth.path is required for the htpasswd method".to_string());
            }
            _ => {}
        }
        Ok(warnings)
    }
}

/// Bounds on what clients may request.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Longest share duration in seconds.
    #[serde(default = "default_max_duration_secs")]
    pub max_duration_secs: u64,
    /// Shortest accepted reporting interval in seconds.
    #[serde(default = "default_min_interval_secs")]
    pub min_interval_secs: f64,
    /// Points kept per session; older points are evicted first.
    #[serde(default = "default_max_cached_points")]
    pub max_cached_points: usize,
}

fn default_max_duration_secs() -> u64 {
    86400
}

fn default_min_interval_secs() -> f64 {
    1.0
}

fn default_max_cached_points() -> usize {
    3
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_duration_secs: default_max_duration_secs(),
            min_interval_secs: default_min_interval_secs(),
            max_cached_points: default_max_cached_points(),
        }
    }
}

impl LimitsConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.max_cached_points == 0 {
            return Err("limits.max_cached_points must be at least 1".to_string());
        }
        if !(self.min_interval_secs.is_finite() && self.min_interval_secs > 0.0) {
            return Err(format!(
                "limits.min_interval_secs must be positive, got {}",
                self.min_interval_secs
            ));
        }
        if self.max_duration_secs == 0 {
            return Err("limits.max_duration_secs cannot be 0".to_string());
        }
        // OffsetDateTime arithmetic overflows well before i64::MAX seconds
        if self.max_duration_secs > 10 * 365 * 86400 {
            return Err(format!(
                "limits.max_duration_secs {} exceeds ten years",
                self.max_duration_secs
            ));
        }
        Ok(())
    }
}

/// Format of generated share link ids.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum LinkStyle {
    /// `XXXX-XXXX`, uppercase alphabet without ambiguous `O`/`0`.
    #[default]
    #[serde(rename = "four-plus-four-upper")]
    FourPlusFourUpper,
    #[serde(rename = "four-plus-four-lower")]
    FourPlusFourLower,
    #[serde(rename = "four-plus-four-mixed")]
    FourPlusFourMixed,
    #[serde(rename = "uuid-v4")]
    UuidV4,
    #[serde(rename = "hex-16")]
    Hex16,
    #[serde(rename = "upper-16")]
    Upper16,
    #[serde(rename = "lower-16")]
    Lower16,
    #[serde(rename = "mixed-16")]
    Mixed16,
    #[serde(rename = "hex-32")]
    Hex32,
    #[serde(rename = "upper-32")]
    Upper32,
    #[serde(rename = "lower-32")]
    Lower32,
    #[serde(rename = "mixed-32")]
    Mixed32,
}

/// Share link generation and custom link policy.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LinkConfig {
    #[serde(default)]
    pub style: LinkStyle,
    /// Let clients request their own link id.
    #[serde(default = "default_allow_custom")]
    pub allow_custom: bool,
    /// Link ids reserved for specific users.
    #[serde(default)]
    pub reserved: HashMap<String, Vec<String>>,
    /// Only reserved ids may be requested.
    #[serde(default)]
    pub reserved_whitelist: bool,
}

fn default_allow_custom() -> bool {
    true
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            style: LinkStyle::default(),
            allow_custom: default_allow_custom(),
            reserved: HashMap::new(),
            reserved_whitelist: false,
        }
    }
}

impl LinkConfig {
    pub fn validate(&self) -> Result<(), String> {
        for id in self.reserved.keys() {
            crate::share::validate_link_id(id)
                .map_err(|_| format!("links.reserved contains invalid link id {id:?}"))?;
        }
        Ok(())
    }
}

/// Rate limiting for the create and adopt operations.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Session creations allowed per client per window (0 disables).
    #[serde(default = "default_create_per_window")]
    pub create_per_window: u32,
    /// Adoptions allowed per client per window (0 disables).
    #[serde(default = "default_adopt_per_window")]
    pub adopt_per_window: u32,
    /// Window length in seconds.
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
    /// Maximum number of tracked clients before new ones are rejected.
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
    /// Trusted proxy IP addresses/CIDR ranges.
    /// Only requests from these IPs will have X-Forwarded-For/X-Real-IP headers trusted.
    /// If empty, forwarded headers are never trusted (only direct connection IP is used).
    /// Use ["*"] to trust all proxies (NOT recommended for production).
    #[serde(default)]
    pub trusted_proxies: Vec<String>,
}

fn default_create_per_window() -> u32 {
    20
}

fn default_adopt_per_window() -> u32 {
    10
}

fn default_window_secs() -> u64 {
    60
}

fn default_max_entries() -> usize {
    10_000
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            create_per_window: default_create_per_window(),
            adopt_per_window: default_adopt_per_window(),
            window_secs: default_window_secs(),
            max_entries: default_max_entries(),
            trusted_proxies: Vec::new(),
        }
    }
}

impl RateLimitConfig {
    pub fn window(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.window_secs)
    }

    pub fn enabled(&self) -> bool {
        self.create_per_window > 0 || self.adopt_per_window > 0
    }

    /// Validate rate limit configuration for dangerous settings.
    /// Returns warnings for configs that are insecure but allowed,
    /// and errors for configs that are unsafe and should be rejected.
    pub fn validate(&self) -> Result<Vec<String>, String> {
        let mut warnings = Vec::new();

        if !self.enabled() {
            return Ok(warnings);
        }

        if self.window_secs == 0 {
            return Err("rate_limit.window_secs cannot be 0. \
                 The cleanup timer runs every two windows and would panic. \
                 Use a value >= 1 second."
                .to_string());
        }

        if self.max_entries == 0 {
            return Err("rate_limit.max_entries cannot be 0".to_string());
        }

        if self.trusted_proxies.len() == 1 && self.trusted_proxies[0] == "*" {
            warnings.push(
                "rate_limit.trusted_proxies=['*'] trusts ALL forwarded headers. \
                 This allows clients to spoof their IP address and bypass rate limits. \
                 Only use this setting in development or behind a trusted reverse proxy."
                    .to_string(),
            );
        }

        Ok(warnings)
    }
}

/// Speed unit shown by the web viewer.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum VelocityUnit {
    #[default]
    Kmh,
    Mph,
    Mps,
}

impl VelocityUnit {
    /// Factor converting m/s into this unit.
    pub fn mps_multiplier(self) -> f64 {
        match self {
            Self::Kmh => 3.6,
            Self::Mph => 3.6 * 0.621_371_2,
            Self::Mps => 1.0,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Kmh => "km/h",
            Self::Mph => "mph",
            Self::Mps => "m/s",
        }
    }
}

/// Settings handed to the bundled web viewer.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ViewerConfig {
    #[serde(default = "default_tile_uri")]
    pub tile_uri: String,
    #[serde(default = "default_attribution")]
    pub attribution: String,
    #[serde(default = "default_zoom")]
    pub default_zoom: u32,
    #[serde(default = "default_max_zoom")]
    pub max_zoom: u32,
    /// Trail length drawn per host.
    #[serde(default = "default_max_shown_points")]
    pub max_shown_points: u32,
    /// Points used to estimate speed.
    #[serde(default = "default_velocity_delta_points")]
    pub velocity_delta_points: u32,
    #[serde(default = "default_trail_color")]
    pub trail_color: String,
    #[serde(default)]
    pub velocity_unit: VelocityUnit,
    /// Seconds without updates before a host is shown as offline.
    #[serde(default = "default_offline_timeout_secs")]
    pub offline_timeout_secs: u64,
    #[serde(default = "default_viewer_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_tile_uri() -> String {
    "https://tile.openstreetmap.org/{z}/{x}/{y}.png".to_string()
}

fn default_attribution() -> String {
    r#"&copy; <a href="https://www.openstreetmap.org/copyright">OpenStreetMap</a> contributors"#
        .to_string()
}

fn default_zoom() -> u32 {
    14
}

fn default_max_zoom() -> u32 {
    19
}

fn default_max_shown_points() -> u32 {
    100
}

fn default_velocity_delta_points() -> u32 {
    2
}

fn default_trail_color() -> String {
    "#d80037".to_string()
}

fn default_offline_timeout_secs() -> u64 {
    30
}

fn default_viewer_request_timeout_secs() -> u64 {
    10
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            tile_uri: default_tile_uri(),
            attribution: default_attribution(),
            default_zoom: default_zoom(),
            max_zoom: default_max_zoom(),
            max_shown_points: default_max_shown_points(),
            velocity_delta_points: default_velocity_delta_points(),
            trail_color: default_trail_color(),
            velocity_unit: VelocityUnit::default(),
            offline_timeout_secs: default_offline_timeout_secs(),
            request_timeout_secs: default_viewer_request_timeout_secs(),
        }
    }
}

impl ViewerConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.default_zoom > self.max_zoom {
            return Err(format!(
                "viewer.default_zoom {} exceeds viewer.max_zoom {}",
                self.default_zoom, self.max_zoom
            ));
        }
        Ok(())
    }
}

/// Complete application configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub links: LinkConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub viewer: ViewerConfig,
}

impl AppConfig {
    /// Create a test configuration.
    ///
    /// **For testing only.** Uses the in-memory store and disables rate
    /// limiting. The auth hash is left empty; tests install their own.
    pub fn for_testing() -> Self {
        Self {
            rate_limit: RateLimitConfig {
                create_per_window: 0,
                adopt_per_window: 0,
                ..RateLimitConfig::default()
            },
            ..Self::default()
        }
    }

    /// Validate every section, collecting warnings.
    pub fn validate(&self) -> Result<Vec<String>, String> {
        self.server.validate()?;
        self.store.validate()?;
        self.limits.validate()?;
        self.links.validate()?;
        self.viewer.validate()?;

        let mut warnings = self.auth.validate()?;
        warnings.extend(self.rate_limit.validate()?);
        Ok(warnings)
    }
}
