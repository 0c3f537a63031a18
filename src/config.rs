//! Operator configuration read from the environment at startup.

use std::time::Duration;

use tracing::warn;

use crate::cache::readiness::{DEFAULT_COMMAND_TIMEOUT, DEFAULT_CONNECTION_TIMEOUT};

/// Default port of the health and metrics server.
pub const DEFAULT_HEALTH_PORT: u16 = 8080;

/// Runtime settings of the operator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OperatorConfig {
    /// Leader election identity.
    pub pod_name: Option<String>,
    /// Namespace holding the leader election lease.
    pub pod_namespace: String,
    /// Restrict the controller to one namespace.
    pub watch_namespace: Option<String>,
    pub health_port: u16,
    /// Time allowed to open a cache connection during a probe.
    pub connect_timeout: Duration,
    /// Time allowed for the PING command.
    pub command_timeout: Duration,
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            pod_name: None,
            pod_namespace: "default".to_string(),
            watch_namespace: None,
            health_port: DEFAULT_HEALTH_PORT,
            connect_timeout: DEFAULT_CONNECTION_TIMEOUT,
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }
}

impl OperatorConfig {
    /// Read the configuration from process environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable lookup.
    ///
    /// Empty values count as unset. Malformed numbers fall back to the
    /// default with a warning.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        Self {
            pod_name: get("POD_NAME"),
            pod_namespace: get("POD_NAMESPACE").unwrap_or(defaults.pod_namespace),
            watch_namespace: get("WATCH_NAMESPACE"),
            health_port: parse_or("HEALTH_PORT", get("HEALTH_PORT"), defaults.health_port),
            connect_timeout: seconds_or(
                "CACHE_CONNECT_TIMEOUT_SECS",
                get("CACHE_CONNECT_TIMEOUT_SECS"),
                defaults.connect_timeout,
            ),
            command_timeout: seconds_or(
                "CACHE_COMMAND_TIMEOUT_SECS",
                get("CACHE_COMMAND_TIMEOUT_SECS"),
                defaults.command_timeout,
            ),
        }
    }
}

fn parse_or<T>(key: &str, value: Option<String>, default: T) -> T
where
    T: std::str::FromStr + std::fmt::Display + Copy,
{
    match value {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!(key = %key, value = %raw, default = %default, "Invalid value, using default");
            default
        }),
    }
}

fn seconds_or(key: &str, value: Option<String>, default: Duration) -> Duration {
    let secs = parse_or(key, value, default.as_secs());
    if secs == 0 {
        warn!(key = %key, "Timeout must be positive, using default");
        return default;
    }
    Duration::from_secs(secs)
}
