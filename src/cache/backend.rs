//! Contracts for the collaborators a readiness pass depends on.
//!
//! The core never talks to the Kubernetes API directly. The controller
//! provides [`KubeBackend`](crate::controller::kube_backend::KubeBackend);
//! tests provide in-memory implementations.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;

use super::error::StoreError;

/// Role of a pod in the in-cluster failover group.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum WorkloadRole {
    /// Sentinel coordinators.
    Coordinator,
    /// Redis servers.
    Server,
}

impl WorkloadRole {
    /// Value of the `app.kubernetes.io/component` label for this role.
    pub fn component_label(self) -> &'static str {
        match self {
            WorkloadRole::Coordinator => "sentinel",
            WorkloadRole::Server => "redis",
        }
    }
}

impl std::fmt::Display for WorkloadRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.component_label())
    }
}

/// Health of a single workload member.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MemberHealth {
    Healthy,
    Unhealthy,
    Unknown,
}

/// A pod belonging to the failover group.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkloadMember {
    pub name: String,
    pub health: MemberHealth,
}

impl WorkloadMember {
    pub fn new(name: impl Into<String>, health: MemberHealth) -> Self {
        Self {
            name: name.into(),
            health,
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.health == MemberHealth::Healthy
    }
}

/// Password lookup by secret name.
#[async_trait]
pub trait CredentialSource: Send + Sync {
    /// Read the cache password stored in `secret_name`.
    async fn password(&self, namespace: &str, secret_name: &str) -> Result<String, StoreError>;
}

/// Pod status enumeration for the in-cluster failover group.
#[async_trait]
pub trait WorkloadSource: Send + Sync {
    /// List the members of `cluster`'s failover group that have `role`.
    async fn members(
        &self,
        namespace: &str,
        cluster: &str,
        role: WorkloadRole,
    ) -> Result<Vec<WorkloadMember>, StoreError>;
}

/// Get-or-create access to credential Secrets.
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Fetch a secret, `StoreError::NotFound` if it does not exist.
    async fn get(&self, name: &str, namespace: &str) -> Result<Secret, StoreError>;

    /// Create a secret. The namespace is taken from its metadata.
    async fn create(&self, secret: &Secret) -> Result<(), StoreError>;
}

/// Lookup of the in-cluster failover group resource.
#[async_trait]
pub trait FailoverGroupSource: Send + Sync {
    /// Controller owner reference pointing at the RedisFailover named `name`.
    async fn failover_owner(&self, namespace: &str, name: &str)
    -> Result<OwnerReference, StoreError>;
}

/// Everything a readiness pass needs from the control plane.
pub trait CacheBackend: CredentialSource + WorkloadSource + SecretStore + FailoverGroupSource {}

impl<T> CacheBackend for T where
    T: CredentialSource + WorkloadSource + SecretStore + FailoverGroupSource
{
}
