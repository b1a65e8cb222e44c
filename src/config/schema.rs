//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

use crate::http::status::StatusSpec;

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address, body limit, health check).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Extra dispatch-failure translations on top of the defaults.
    pub translation: TranslationConfig,

    /// Route definitions, each bound to one upstream.
    pub routes: Vec<RouteConfig>,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Maximum inbound request body size in bytes.
    pub max_body_size: usize,

    /// Maximum upstream response body size in bytes.
    pub max_response_body_size: usize,

    /// Path answered with 200 by the gateway itself, if set.
    pub health_check_path: Option<String>,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            max_body_size: 2 * 1024 * 1024,
            max_response_body_size: 8 * 1024 * 1024,
            health_check_path: None,
        }
    }
}

/// Timeout configuration for upstream calls.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5,
            request_secs: 30,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Status for each dispatch failure kind. Unset kinds keep the default behavior.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct TranslationConfig {
    pub unknown_host: Option<StatusSpec>,
    pub connection_refused: Option<StatusSpec>,
    pub no_healthy_endpoint: Option<StatusSpec>,
    pub timeout: Option<StatusSpec>,
    pub transport: Option<StatusSpec>,
}

/// Route configuration binding matching requests to an upstream.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RouteConfig {
    /// Route identifier for logging/metrics.
    pub name: String,

    /// Path template to match, e.g. `/items/{id}`.
    pub path: Option<String>,

    /// Path prefix to match.
    pub path_prefix: Option<String>,

    /// Allowed methods; empty means any.
    #[serde(default)]
    pub methods: Vec<String>,

    /// Host header to match (exact match).
    pub host: Option<String>,

    /// Header predicates; all must hold.
    #[serde(default)]
    pub headers: Vec<PredicateConfig>,

    /// Query parameter predicates; all must hold.
    #[serde(default)]
    pub query: Vec<PredicateConfig>,

    /// Route priority (higher = checked first).
    #[serde(default)]
    pub priority: i32,

    /// Where matching requests are forwarded.
    pub upstream: UpstreamConfig,

    /// Outbound path and method rewriting.
    #[serde(default)]
    pub remapping: RemappingConfig,

    /// Filter applied to outbound request headers.
    pub request_headers: Option<HeaderFilterConfig>,

    /// Filter applied to upstream response headers.
    pub response_headers: Option<HeaderFilterConfig>,

    /// Status remapping rules, applied in order.
    #[serde(default)]
    pub status: Vec<StatusRuleConfig>,
}

/// Presence (`value` unset) or equality predicate.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PredicateConfig {
    pub name: String,
    pub value: Option<String>,
}

/// Upstream target: either `uri`, or `scheme` + `endpoints` (+ `path`).
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct UpstreamConfig {
    pub uri: Option<String>,
    pub scheme: Option<String>,
    pub endpoints: Vec<String>,
    pub path: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RemappingConfig {
    /// Template rendered from route parameters; replaces the whole request target.
    pub path: Option<String>,

    /// Outbound method override.
    pub method: Option<String>,
}

/// Exactly one of `allow` or `deny`.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct HeaderFilterConfig {
    pub allow: Option<Vec<String>>,
    pub deny: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StatusRuleConfig {
    pub from: Vec<StatusSpec>,
    pub to: StatusSpec,
}
