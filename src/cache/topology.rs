//! Topology resolution.
//!
//! Turns the declared cache mode into a [`ConnectionDescriptor`]. External
//! caches are validated and their password looked up; the in-cluster
//! failover group is discovered from pod status.

use kube::ResourceExt;
use tracing::{debug, info, instrument, warn};

use super::backend::{CredentialSource, WorkloadRole, WorkloadSource};
use super::connection::{ConnectionDescriptor, Schema};
use super::error::ResolveError;
use crate::crd::{ComponentKind, HarborCluster, RedisComponent, RedisHost, RedisSchema};

/// Sentinel port of the in-cluster failover group.
pub const SENTINEL_PORT: &str = "26379";

/// Master group name of the in-cluster failover group.
pub const SENTINEL_GROUP_NAME: &str = "mymaster";

/// Service name prefix the redis-operator uses for sentinels.
const SENTINEL_SERVICE_PREFIX: &str = "rfs";

/// Declared endpoints of an external cache.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExternalCache {
    pub schema: Schema,
    pub hosts: Vec<RedisHost>,
    pub group_name: String,
    pub secret_name: Option<String>,
}

/// Where the cache lives.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CacheTopology {
    External(ExternalCache),
    InCluster,
}

impl CacheTopology {
    /// Map the CRD declaration onto a topology.
    pub fn from_spec(redis: &RedisComponent) -> Result<Self, ResolveError> {
        match redis.kind {
            ComponentKind::InCluster => Ok(CacheTopology::InCluster),
            ComponentKind::External => {
                let spec = redis.spec.as_ref().ok_or_else(|| {
                    ResolveError::InvalidSpec(".redis.spec is required for external redis".into())
                })?;
                let schema = match spec.schema {
                    RedisSchema::Redis => Schema::Server,
                    RedisSchema::Sentinel => Schema::SentinelGroup,
                };
                Ok(CacheTopology::External(ExternalCache {
                    schema,
                    hosts: spec.hosts.clone(),
                    group_name: spec.group_name.clone(),
                    secret_name: spec.secret_name.clone().filter(|s| !s.is_empty()),
                }))
            }
        }
    }

    pub fn is_in_cluster(&self) -> bool {
        matches!(self, CacheTopology::InCluster)
    }
}

/// The cache of one HarborCluster.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CacheTarget {
    pub name: String,
    pub namespace: String,
    pub topology: CacheTopology,
}

impl CacheTarget {
    pub fn new(
        name: impl Into<String>,
        namespace: impl Into<String>,
        topology: CacheTopology,
    ) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            topology,
        }
    }

    /// Build the target from a HarborCluster resource.
    pub fn from_cluster(cluster: &HarborCluster) -> Result<Self, ResolveError> {
        let namespace = cluster.namespace().unwrap_or_else(|| "default".to_string());
        let topology = CacheTopology::from_spec(&cluster.spec.redis)?;
        Ok(Self::new(cluster.name_any(), namespace, topology))
    }
}

/// Address of the Service fronting the sentinels of `cluster`.
pub fn sentinel_service_host(cluster: &str, namespace: &str) -> String {
    format!("{SENTINEL_SERVICE_PREFIX}-{cluster}.{namespace}.svc")
}

/// Resolves a [`CacheTarget`] into a connection descriptor.
pub struct TopologyResolver<'a, B: ?Sized> {
    backend: &'a B,
}

impl<'a, B> TopologyResolver<'a, B>
where
    B: CredentialSource + WorkloadSource + ?Sized,
{
    pub fn new(backend: &'a B) -> Self {
        Self { backend }
    }

    /// Produce the connection descriptor for `target`.
    #[instrument(skip_all, fields(name = %target.name, namespace = %target.namespace))]
    pub async fn resolve(
        &self,
        target: &CacheTarget,
    ) -> Result<ConnectionDescriptor, ResolveError> {
        match &target.topology {
            CacheTopology::External(external) => {
                self.resolve_external(&target.namespace, external).await
            }
            CacheTopology::InCluster => {
                self.resolve_in_cluster(&target.name, &target.namespace)
                    .await
            }
        }
    }

    async fn resolve_external(
        &self,
        namespace: &str,
        external: &ExternalCache,
    ) -> Result<ConnectionDescriptor, ResolveError> {
        let (endpoints, port) = external_endpoints(&external.hosts);

        // Shape is validated before any lookup so a bad spec never touches the network.
        let descriptor = match external.schema {
            Schema::Server => {
                let [host] = endpoints.as_slice() else {
                    return Err(ResolveError::InvalidSpec(
                        ".redis.spec.hosts is invalid".to_string(),
                    ));
                };
                ConnectionDescriptor::server(host.clone(), port, "")?
            }
            Schema::SentinelGroup => {
                if endpoints.is_empty() || external.group_name.is_empty() {
                    return Err(ResolveError::InvalidSpec(
                        ".redis.spec.hosts or .redis.spec.groupName is invalid".to_string(),
                    ));
                }
                ConnectionDescriptor::sentinel(endpoints, port, "", external.group_name.clone())?
            }
        };

        let descriptor = match &external.secret_name {
            Some(secret) => {
                let password = self.lookup_password(namespace, secret).await?;
                descriptor.with_password(password)
            }
            None => {
                debug!("No secret configured for external redis, connecting without password");
                descriptor
            }
        };

        info!(
            schema = %descriptor.schema(),
            endpoint = %descriptor.redacted_url(),
            "Resolved external redis"
        );
        Ok(descriptor)
    }

    async fn resolve_in_cluster(
        &self,
        name: &str,
        namespace: &str,
    ) -> Result<ConnectionDescriptor, ResolveError> {
        let password = self.lookup_password(namespace, name).await?;

        let coordinators = self.members(namespace, name, WorkloadRole::Coordinator).await?;
        let servers = self.members(namespace, name, WorkloadRole::Server).await?;

        if coordinators.is_empty() || servers.is_empty() {
            info!(
                sentinels = coordinators.len(),
                servers = servers.len(),
                "Redis pod list is empty, waiting"
            );
            return Err(ResolveError::PodsNotReady {
                coordinators: coordinators.len(),
                servers: servers.len(),
            });
        }

        let healthy = coordinators.iter().filter(|m| m.is_healthy()).count();
        if healthy == 0 {
            warn!(sentinels = coordinators.len(), "No healthy sentinel pods");
            return Err(ResolveError::NoHealthyCoordinators {
                total: coordinators.len(),
            });
        }

        let descriptor = ConnectionDescriptor::sentinel(
            vec![sentinel_service_host(name, namespace)],
            SENTINEL_PORT,
            password,
            SENTINEL_GROUP_NAME,
        )?;

        info!(
            healthy_sentinels = healthy,
            servers = servers.len(),
            endpoint = %descriptor.redacted_url(),
            "Resolved in-cluster redis"
        );
        Ok(descriptor)
    }

    async fn lookup_password(&self, namespace: &str, secret: &str) -> Result<String, ResolveError> {
        self.backend
            .password(namespace, secret)
            .await
            .map_err(|source| ResolveError::Credential {
                secret: secret.to_string(),
                source,
            })
    }

    async fn members(
        &self,
        namespace: &str,
        cluster: &str,
        role: WorkloadRole,
    ) -> Result<Vec<super::backend::WorkloadMember>, ResolveError> {
        self.backend
            .members(namespace, cluster, role)
            .await
            .map_err(|source| ResolveError::Workload {
                role: role.to_string(),
                source,
            })
    }
}

/// Endpoint hosts in declaration order, and the port of the last entry.
fn external_endpoints(hosts: &[RedisHost]) -> (Vec<String>, String) {
    let endpoints = hosts.iter().map(|h| h.host.clone()).collect();
    let port = hosts.last().map(|h| h.port.clone()).unwrap_or_default();
    (endpoints, port)
}
