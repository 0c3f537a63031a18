//! RedisFailover resource of the spotahome redis-operator.
//!
//! The in-cluster cache is deployed as a RedisFailover. This operator never
//! writes it; it only reads it to own the published component secrets, so
//! the spec is kept opaque.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Sentinel-managed Redis deployment.
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "databases.spotahome.com",
    version = "v1",
    kind = "RedisFailover",
    plural = "redisfailovers",
    namespaced
)]
pub struct RedisFailoverSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sentinel: Option<serde_json::Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redis: Option<serde_json::Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<serde_json::Value>,
}
