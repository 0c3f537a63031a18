//! HarborCluster Custom Resource Definition.
//!
//! Only the cache section of a Harbor deployment is modelled here. The
//! operator reads `spec.redis`, checks that the cache is usable and reports
//! the published per-component secrets under `status.cache`.

use std::collections::BTreeMap;

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// HarborCluster declares how a Harbor installation reaches its cache.
///
/// Example (external sentinel group):
/// ```yaml
/// apiVersion: goharbor.io/v1
/// kind: HarborCluster
/// metadata:
///   name: harbor
/// spec:
///   redis:
///     kind: external
///     spec:
///       schema: sentinel
///       groupName: mymaster
///       secretName: harbor-redis-auth
///       hosts:
///         - host: sentinel-0.cache.svc
///           port: "26379"
/// ```
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "goharbor.io",
    version = "v1",
    kind = "HarborCluster",
    plural = "harborclusters",
    shortname = "hc",
    status = "HarborClusterStatus",
    namespaced,
    printcolumn = r#"{"name":"Cache", "type":"string", "jsonPath":".status.phase"}"#,
    printcolumn = r#"{"name":"Reason", "type":"string", "jsonPath":".status.cache.reason"}"#,
    printcolumn = r#"{"name":"Age", "type":"date", "jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct HarborClusterSpec {
    /// Cache (Redis) configuration.
    pub redis: RedisComponent,

    /// Additional labels to apply to published secrets.
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

/// Where the cache runs.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Deserialize, Serialize, JsonSchema)]
pub enum ComponentKind {
    /// Provided outside of the cluster; endpoints are declared in the spec.
    #[serde(rename = "external")]
    External,
    /// Deployed in-cluster as a sentinel failover group.
    #[default]
    #[serde(rename = "inCluster")]
    InCluster,
}

impl std::fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ComponentKind::External => write!(f, "external"),
            ComponentKind::InCluster => write!(f, "inCluster"),
        }
    }
}

/// Cache component declaration.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RedisComponent {
    /// `external` or `inCluster`.
    #[serde(default)]
    pub kind: ComponentKind,

    /// Connection details, required for `external`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spec: Option<ExternalRedisSpec>,
}

/// Connection schema of an external cache.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Deserialize, Serialize, JsonSchema)]
pub enum RedisSchema {
    /// Single Redis server.
    #[default]
    #[serde(rename = "redis")]
    Redis,
    /// Sentinel-managed failover group.
    #[serde(rename = "sentinel")]
    Sentinel,
}

/// External cache endpoints and credentials.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExternalRedisSpec {
    /// `redis` (single server) or `sentinel`.
    #[serde(default)]
    pub schema: RedisSchema,

    /// Server (or sentinel) endpoints.
    #[serde(default)]
    pub hosts: Vec<RedisHost>,

    /// Sentinel master group name. Required for `sentinel`.
    #[serde(default)]
    pub group_name: String,

    /// Secret holding the cache password. Unset means no password.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_name: Option<String>,
}

/// One `host:port` endpoint.
#[derive(Clone, Debug, Default, Eq, PartialEq, Deserialize, Serialize, JsonSchema)]
pub struct RedisHost {
    pub host: String,
    pub port: String,
}

impl RedisHost {
    pub fn new(host: impl Into<String>, port: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: port.into(),
        }
    }
}

/// Status of a HarborCluster.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct HarborClusterStatus {
    /// Readiness phase of the cache.
    #[serde(default)]
    pub phase: CachePhase,

    /// The generation most recently observed by the controller.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,

    /// Conditions describing the current state.
    #[serde(default)]
    pub conditions: Vec<Condition>,

    /// Result of the last cache readiness pass.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache: Option<CacheStatus>,
}

/// Outcome of the last cache readiness pass.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CacheStatus {
    /// Whether the cache is reachable and all component secrets exist.
    pub ready: bool,

    /// Reason code (`InvalidConfig`, `WaitingForDependency`, ...) when not ready.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// Human-readable detail.
    #[serde(default)]
    pub message: String,

    /// Redacted connection URL of the cache.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    /// Published secrets, keyed by property name (e.g. `registrySecret`).
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

/// CachePhase represents the readiness of the cache for a HarborCluster.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Deserialize, Serialize, JsonSchema)]
pub enum CachePhase {
    /// Not reconciled yet.
    #[default]
    Pending,
    /// Cache is reachable and component secrets are published.
    Ready,
    /// Cache is not usable yet; the controller keeps retrying.
    NotReady,
    /// The cache configuration is invalid and needs operator action.
    Failed,
}

impl std::fmt::Display for CachePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CachePhase::Pending => write!(f, "Pending"),
            CachePhase::Ready => write!(f, "Ready"),
            CachePhase::NotReady => write!(f, "NotReady"),
            CachePhase::Failed => write!(f, "Failed"),
        }
    }
}

/// Condition describes the state of a resource at a certain point.
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Type of condition.
    pub r#type: String,
    /// Status of the condition ("True", "False", "Unknown").
    pub status: String,
    /// Machine-readable reason for the condition's last transition.
    pub reason: String,
    /// Human-readable message indicating details about last transition.
    pub message: String,
    /// Last time the condition transitioned from one status to another.
    pub last_transition_time: String,
    /// The generation of the resource this condition was observed for.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
}

impl Condition {
    /// Create a new condition.
    pub fn new(
        condition_type: &str,
        status: bool,
        reason: &str,
        message: &str,
        generation: Option<i64>,
    ) -> Self {
        Self {
            r#type: condition_type.to_string(),
            status: if status {
                "True".to_string()
            } else {
                "False".to_string()
            },
            reason: reason.to_string(),
            message: message.to_string(),
            last_transition_time: jiff::Timestamp::now().to_string(),
            observed_generation: generation,
        }
    }

    /// Create a "Ready" condition.
    pub fn ready(ready: bool, reason: &str, message: &str, generation: Option<i64>) -> Self {
        Self::new("Ready", ready, reason, message, generation)
    }

    /// Create a "Degraded" condition.
    pub fn degraded(degraded: bool, reason: &str, message: &str, generation: Option<i64>) -> Self {
        Self::new("Degraded", degraded, reason, message, generation)
    }
}
