use std::net::SocketAddr;
use std::time::Duration;

use serde::Deserialize;

use crate::gate::GatePolicy;

/// Top-level configuration
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Address the demo admission server listens on
    #[serde(default = "default_listen")]
    pub listen: SocketAddr,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Admission gate configuration
    #[serde(default)]
    pub gate: GateConfig,
    /// Coalescing queue configuration
    #[serde(default)]
    pub coalesce: CoalesceConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            logging: LoggingConfig::default(),
            gate: GateConfig::default(),
            coalesce: CoalesceConfig::default(),
        }
    }
}

fn default_listen() -> SocketAddr {
    "127.0.0.1:8080".parse().expect("static default listen address")
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Log level filter when RUST_LOG is unset
    /// Default: "info"
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Include the log target in output
    /// Default: false
    #[serde(default)]
    pub show_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: default_log_level(), show_target: false }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Admission gate configuration
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct GateConfig {
    /// Enable admission control
    /// Default: true
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Counting window in milliseconds
    /// Default: 60000
    #[serde(default = "default_window_ms")]
    pub window_ms: u64,
    /// Requests admitted per identity per window
    /// Default: 100
    #[serde(default = "default_max_requests")]
    pub max_requests: u32,
    /// Trust the first X-Forwarded-For hop as the client identity
    /// Default: true
    #[serde(default = "default_enabled")]
    pub trust_forwarded_for: bool,
    /// Override for the auth preset
    pub auth: Option<PolicyOverride>,
    /// Override for the api preset
    pub api: Option<PolicyOverride>,
    /// Override for the search preset
    pub search: Option<PolicyOverride>,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            window_ms: default_window_ms(),
            max_requests: default_max_requests(),
            trust_forwarded_for: default_enabled(),
            auth: None,
            api: None,
            search: None,
        }
    }
}

impl GateConfig {
    /// The globally-configured policy.
    pub fn base_policy(&self) -> GatePolicy {
        GatePolicy::new(Duration::from_millis(self.window_ms), self.max_requests)
    }

    /// The auth preset with any configured override applied.
    pub fn auth_policy(&self) -> GatePolicy {
        resolve(self.auth.as_ref(), GatePolicy::auth())
    }

    /// The api preset with any configured override applied.
    pub fn api_policy(&self) -> GatePolicy {
        resolve(self.api.as_ref(), GatePolicy::api())
    }

    /// The search preset with any configured override applied.
    pub fn search_policy(&self) -> GatePolicy {
        resolve(self.search.as_ref(), GatePolicy::search())
    }
}

/// Per-preset override; unspecified fields inherit the preset's numbers
#[derive(Debug, Deserialize, Clone, PartialEq, Default)]
pub struct PolicyOverride {
    /// Counting window in milliseconds
    pub window_ms: Option<u64>,
    /// Requests admitted per identity per window
    pub max_requests: Option<u32>,
}

fn resolve(over: Option<&PolicyOverride>, preset: GatePolicy) -> GatePolicy {
    match over {
        Some(o) => GatePolicy::new(
            o.window_ms.map_or(preset.window, Duration::from_millis),
            o.max_requests.unwrap_or(preset.max_requests),
        ),
        None => preset,
    }
}

/// Coalescing queue configuration
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct CoalesceConfig {
    /// Debounce delay in milliseconds: a batch flushes this long after the
    /// last submission in a burst
    /// Default: 50
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
}

impl Default for CoalesceConfig {
    fn default() -> Self {
        Self { delay_ms: default_delay_ms() }
    }
}

impl CoalesceConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

fn default_enabled() -> bool {
    true
}

fn default_window_ms() -> u64 {
    60_000
}

fn default_max_requests() -> u32 {
    100
}

fn default_delay_ms() -> u64 {
    50
}
