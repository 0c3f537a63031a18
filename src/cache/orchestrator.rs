//! One cache readiness pass.
//!
//! Sequence: resolve topology, probe, resolve the secret owner, publish one
//! secret per component. The first failure ends the pass and is reported as
//! [`ReadinessStatus::NotReady`]; nothing here retries on its own.

use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::{Resource, ResourceExt};
use tracing::{error, info, warn};

use super::backend::CacheBackend;
use super::components::CONSUMER_COMPONENTS;
use super::connection::ConnectionDescriptor;
use super::error::{PublishError, ResolveError};
use super::publisher::{CredentialOwner, CredentialPublisher};
use super::readiness::{self, CacheConnector};
use super::topology::{CacheTarget, TopologyResolver};
use crate::crd::HarborCluster;

/// Why the cache is not ready.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NotReadyReason {
    /// The declared cache configuration is malformed; needs operator action.
    InvalidConfig,
    /// Topology or credentials have not materialised yet.
    WaitingForDependency,
    /// The liveness probe failed or timed out.
    HealthCheckFailed,
    /// A component secret could not be published.
    CredentialPublishFailed,
}

impl NotReadyReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotReadyReason::InvalidConfig => "InvalidConfig",
            NotReadyReason::WaitingForDependency => "WaitingForDependency",
            NotReadyReason::HealthCheckFailed => "HealthCheckFailed",
            NotReadyReason::CredentialPublishFailed => "CredentialPublishFailed",
        }
    }
}

impl std::fmt::Display for NotReadyReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure detail of a pass.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NotReady {
    pub reason: NotReadyReason,
    pub message: String,
    /// Whether the next scheduled pass can be expected to succeed without a spec change.
    pub retryable: bool,
}

impl NotReady {
    fn from_resolve(e: &ResolveError) -> Self {
        let retryable = e.is_retryable();
        Self {
            reason: if retryable {
                NotReadyReason::WaitingForDependency
            } else {
                NotReadyReason::InvalidConfig
            },
            message: e.to_string(),
            retryable,
        }
    }

    fn from_publish(e: &PublishError) -> Self {
        Self {
            reason: NotReadyReason::CredentialPublishFailed,
            message: e.to_string(),
            retryable: e.is_retryable(),
        }
    }
}

/// Result of a readiness pass.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReadinessStatus {
    Ready {
        /// Property name (e.g. `registrySecret`) to secret name.
        properties: BTreeMap<String, String>,
        /// Redacted connection URL.
        endpoint: String,
    },
    NotReady(NotReady),
}

impl ReadinessStatus {
    pub fn is_ready(&self) -> bool {
        matches!(self, ReadinessStatus::Ready { .. })
    }

    pub fn reason(&self) -> Option<NotReadyReason> {
        match self {
            ReadinessStatus::Ready { .. } => None,
            ReadinessStatus::NotReady(n) => Some(n.reason),
        }
    }
}

/// Drives readiness passes against a backend and a cache connector.
pub struct CacheReadiness<B, C> {
    backend: B,
    connector: C,
}

impl<B, C> CacheReadiness<B, C>
where
    B: CacheBackend,
    C: CacheConnector,
{
    pub fn new(backend: B, connector: C) -> Self {
        Self { backend, connector }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// Run one pass for `cluster`.
    pub async fn reconcile(&self, cluster: &HarborCluster) -> ReadinessStatus {
        let name = cluster.name_any();
        let namespace = cluster.namespace().unwrap_or_else(|| "default".to_string());

        let status = match CacheTarget::from_cluster(cluster) {
            Ok(target) => self.run(cluster, &target).await,
            Err(e) => ReadinessStatus::NotReady(NotReady::from_resolve(&e)),
        };

        match &status {
            ReadinessStatus::Ready { properties, .. } => {
                info!(
                    name = %name,
                    namespace = %namespace,
                    secrets = properties.len(),
                    "Redis already ready"
                );
            }
            ReadinessStatus::NotReady(n) if n.retryable => {
                warn!(
                    name = %name,
                    namespace = %namespace,
                    reason = %n.reason,
                    error = %n.message,
                    "Redis not ready"
                );
            }
            ReadinessStatus::NotReady(n) => {
                error!(
                    name = %name,
                    namespace = %namespace,
                    reason = %n.reason,
                    error = %n.message,
                    "Redis not ready, operator action required"
                );
            }
        }

        status
    }

    async fn run(&self, cluster: &HarborCluster, target: &CacheTarget) -> ReadinessStatus {
        let descriptor = match TopologyResolver::new(&self.backend).resolve(target).await {
            Ok(d) => d,
            Err(e) => return ReadinessStatus::NotReady(NotReady::from_resolve(&e)),
        };

        if let Err(e) = readiness::check(&self.connector, &descriptor).await {
            return ReadinessStatus::NotReady(NotReady {
                reason: NotReadyReason::HealthCheckFailed,
                message: e.to_string(),
                retryable: true,
            });
        }

        let owner = match self.credential_owner(cluster, target).await {
            Ok(owner) => owner,
            Err(e) => return ReadinessStatus::NotReady(NotReady::from_publish(&e)),
        };

        match self.publish_all(&descriptor, &owner).await {
            Ok(properties) => ReadinessStatus::Ready {
                properties,
                endpoint: descriptor.redacted_url(),
            },
            Err(e) => ReadinessStatus::NotReady(NotReady::from_publish(&e)),
        }
    }

    /// Resolve who owns the component secrets: the HarborCluster for an
    /// external cache, the RedisFailover for the in-cluster one.
    async fn credential_owner(
        &self,
        cluster: &HarborCluster,
        target: &CacheTarget,
    ) -> Result<CredentialOwner, PublishError> {
        let reference = if target.topology.is_in_cluster() {
            self.backend
                .failover_owner(&target.namespace, &target.name)
                .await
                .map_err(|e| PublishError::Owner(e.to_string()))?
        } else {
            cluster_owner_reference(cluster)?
        };

        Ok(CredentialOwner {
            namespace: target.namespace.clone(),
            instance: target.name.clone(),
            reference,
            labels: cluster.spec.labels.clone(),
        })
    }

    async fn publish_all(
        &self,
        descriptor: &ConnectionDescriptor,
        owner: &CredentialOwner,
    ) -> Result<BTreeMap<String, String>, PublishError> {
        let publisher = CredentialPublisher::new(&self.backend);
        let mut properties = BTreeMap::new();

        for component in &CONSUMER_COMPONENTS {
            let secret_name = publisher.publish(component, descriptor, owner).await?;
            properties.insert(component.property_name(), secret_name);
        }

        Ok(properties)
    }
}

/// Controller owner reference to a HarborCluster.
pub fn cluster_owner_reference(cluster: &HarborCluster) -> Result<OwnerReference, PublishError> {
    cluster.controller_owner_ref(&()).ok_or_else(|| {
        PublishError::Owner(format!(
            "HarborCluster {} has no uid",
            cluster.name_any()
        ))
    })
}
